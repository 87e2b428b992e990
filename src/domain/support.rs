//! Support-ticket and return-request state machines. Same family as the
//! order lifecycle, just smaller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn allowed_next(self) -> &'static [TicketStatus] {
        use TicketStatus::*;
        match self {
            Open => &[InProgress],
            InProgress => &[Resolved, Closed],
            // A reply from either party reopens; see `after_reply`.
            Resolved => &[Closed, InProgress],
            Closed => &[InProgress],
        }
    }

    pub fn can_move_to(self, to: TicketStatus) -> bool {
        self == to || self.allowed_next().contains(&to)
    }

    /// Status after a reply lands on the ticket. A reply from either party
    /// reopens a settled ticket; an admin picking up a fresh ticket moves
    /// it to in-progress.
    pub fn after_reply(self, from_admin: bool) -> TicketStatus {
        match self {
            TicketStatus::Resolved | TicketStatus::Closed => TicketStatus::InProgress,
            TicketStatus::Open if from_admin => TicketStatus::InProgress,
            other => other,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(format!("invalid ticket status: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
    PickedUp,
    Refunded,
}

impl ReturnStatus {
    pub fn allowed_next(self) -> &'static [ReturnStatus] {
        use ReturnStatus::*;
        match self {
            Pending => &[Approved, Rejected],
            Approved => &[PickedUp],
            PickedUp => &[Refunded],
            Rejected | Refunded => &[],
        }
    }

    pub fn can_move_to(self, to: ReturnStatus) -> bool {
        self == to || self.allowed_next().contains(&to)
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::Approved => "approved",
            ReturnStatus::Rejected => "rejected",
            ReturnStatus::PickedUp => "picked_up",
            ReturnStatus::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ReturnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReturnStatus::Pending),
            "approved" => Ok(ReturnStatus::Approved),
            "rejected" => Ok(ReturnStatus::Rejected),
            "picked_up" => Ok(ReturnStatus::PickedUp),
            "refunded" => Ok(ReturnStatus::Refunded),
            other => Err(format!("invalid return status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_happy_path() {
        assert!(TicketStatus::Open.can_move_to(TicketStatus::InProgress));
        assert!(TicketStatus::InProgress.can_move_to(TicketStatus::Resolved));
        assert!(TicketStatus::Resolved.can_move_to(TicketStatus::Closed));
    }

    #[test]
    fn replies_reopen_settled_tickets() {
        for from_admin in [true, false] {
            assert_eq!(TicketStatus::Resolved.after_reply(from_admin), TicketStatus::InProgress);
            assert_eq!(TicketStatus::Closed.after_reply(from_admin), TicketStatus::InProgress);
            assert_eq!(TicketStatus::InProgress.after_reply(from_admin), TicketStatus::InProgress);
        }
        // Only an admin picking the ticket up moves a fresh one along.
        assert_eq!(TicketStatus::Open.after_reply(true), TicketStatus::InProgress);
        assert_eq!(TicketStatus::Open.after_reply(false), TicketStatus::Open);
    }

    #[test]
    fn return_branches() {
        use ReturnStatus::*;
        assert!(Pending.can_move_to(Approved));
        assert!(Pending.can_move_to(Rejected));
        assert!(Approved.can_move_to(PickedUp));
        assert!(PickedUp.can_move_to(Refunded));
        assert!(!Pending.can_move_to(Refunded));
        assert!(!Rejected.can_move_to(Approved));
        assert!(!Refunded.can_move_to(Pending));
    }

    #[test]
    fn statuses_parse_back() {
        for s in ["pending", "approved", "rejected", "picked_up", "refunded"] {
            assert_eq!(s.parse::<ReturnStatus>().unwrap().to_string(), s);
        }
        for s in ["open", "in_progress", "resolved", "closed"] {
            assert_eq!(s.parse::<TicketStatus>().unwrap().to_string(), s);
        }
    }
}
