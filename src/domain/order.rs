//! Order lifecycle state machine.
//!
//! Statuses move forward along a fixed table, with `Cancelled` reachable
//! from every non-terminal state except `OutForDelivery`. Requesting the
//! current status again is a no-op; anything else off-table is rejected
//! with the allowed set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CANCEL_REASON: &str = "No reason provided";

/// Every status, in lifecycle order.
pub const ALL_STATUSES: [OrderStatus; 7] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Packed,
    OrderStatus::Shipped,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
];

/// Statuses from which the customer may still cancel. Guard clauses and
/// the conditional UPDATE in the cancel path both key off this set.
pub const USER_CANCELLABLE: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Confirmed];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Packed,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Statuses reachable from `self` in one step.
    pub fn allowed_next(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Packed, Cancelled],
            Packed => &[Shipped, Cancelled],
            Shipped => &[OutForDelivery, Cancelled],
            OutForDelivery => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Validate a requested transition. Same-status requests succeed as a
    /// no-op so that retried updates stay idempotent.
    pub fn transition(self, to: OrderStatus) -> Result<Transition, TransitionError> {
        if self == to {
            return Ok(Transition::Unchanged);
        }
        if self.is_terminal() {
            return Err(TransitionError::Terminal { current: self });
        }
        if self.allowed_next().contains(&to) {
            Ok(Transition::Moved)
        } else {
            Err(TransitionError::NotAllowed {
                from: self,
                to,
                allowed: self.allowed_next(),
            })
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Requested status equals the current one; nothing to persist.
    Unchanged,
    Moved,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("order is already {current}, no further status changes are possible")]
    Terminal { current: OrderStatus },
    #[error("cannot move from {from} to {to}; allowed: {}", format_allowed(.allowed))]
    NotAllowed {
        from: OrderStatus,
        to: OrderStatus,
        allowed: &'static [OrderStatus],
    },
}

fn format_allowed(allowed: &[OrderStatus]) -> String {
    allowed
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Packed => "Packed",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Confirmed" => Ok(OrderStatus::Confirmed),
            "Packed" => Ok(OrderStatus::Packed),
            "Shipped" => Ok(OrderStatus::Shipped),
            "Out for Delivery" => Ok(OrderStatus::OutForDelivery),
            "Delivered" => Ok(OrderStatus::Delivered),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("invalid order status: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    CashOnDelivery,
    Gateway,
}

impl PaymentMethod {
    /// Anything that is not recognizably cash-on-delivery pays through the
    /// gateway.
    pub fn normalize(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "cod" | "cash_on_delivery" | "cashondelivery" | "cash on delivery" => {
                PaymentMethod::CashOnDelivery
            }
            _ => PaymentMethod::Gateway,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "COD",
            PaymentMethod::Gateway => "Gateway",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(PaymentMethod::CashOnDelivery),
            "Gateway" => Ok(PaymentMethod::Gateway),
            other => Err(format!("invalid payment method: {other}")),
        }
    }
}

/// Whether cancelling this order must hand stock back. COD orders reserve
/// stock at creation; gateway orders only once payment is verified. An
/// unpaid gateway order never took stock, so there is nothing to restore.
pub fn stock_was_reserved(method: PaymentMethod, is_paid: bool) -> bool {
    match method {
        PaymentMethod::CashOnDelivery => true,
        PaymentMethod::Gateway => is_paid,
    }
}

/// User-initiated cancellation is gated tighter than the transition table:
/// only orders that have not started fulfilment can be cancelled.
pub fn user_can_cancel(status: OrderStatus) -> bool {
    USER_CANCELLABLE.contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn forward_path_is_allowed() {
        let path = [Pending, Confirmed, Packed, Shipped, OutForDelivery, Delivered];
        for pair in path.windows(2) {
            assert_eq!(pair[0].transition(pair[1]), Ok(Transition::Moved));
        }
    }

    #[test]
    fn same_status_is_idempotent() {
        for s in [Pending, Confirmed, Packed, Shipped, OutForDelivery, Delivered, Cancelled] {
            assert_eq!(s.transition(s), Ok(Transition::Unchanged));
        }
    }

    #[test]
    fn skipping_states_is_rejected() {
        let err = Pending.transition(Shipped).unwrap_err();
        match err {
            TransitionError::NotAllowed { allowed, .. } => {
                assert_eq!(allowed, &[Confirmed, Cancelled]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(Confirmed.transition(Delivered).is_err());
    }

    #[test]
    fn delivered_is_terminal() {
        for target in [Pending, Confirmed, Packed, Shipped, OutForDelivery, Cancelled] {
            let err = Delivered.transition(target).unwrap_err();
            assert_eq!(err, TransitionError::Terminal { current: Delivered });
            assert!(err.to_string().contains("already Delivered"));
        }
    }

    #[test]
    fn cancelled_is_terminal() {
        assert!(Cancelled.transition(Pending).is_err());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn out_for_delivery_cannot_cancel() {
        let err = OutForDelivery.transition(Cancelled).unwrap_err();
        assert!(matches!(err, TransitionError::NotAllowed { .. }));
        assert_eq!(OutForDelivery.allowed_next(), &[Delivered]);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in [Pending, Confirmed, Packed, Shipped, OutForDelivery, Delivered, Cancelled] {
            assert_eq!(s.to_string().parse::<OrderStatus>().unwrap(), s);
        }
        assert!("Refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn unknown_payment_methods_default_to_gateway() {
        assert_eq!(PaymentMethod::normalize("COD"), PaymentMethod::CashOnDelivery);
        assert_eq!(PaymentMethod::normalize("cash on delivery"), PaymentMethod::CashOnDelivery);
        assert_eq!(PaymentMethod::normalize("Razorpay"), PaymentMethod::Gateway);
        assert_eq!(PaymentMethod::normalize(""), PaymentMethod::Gateway);
    }

    #[test]
    fn stock_restore_policy() {
        assert!(stock_was_reserved(PaymentMethod::CashOnDelivery, false));
        assert!(stock_was_reserved(PaymentMethod::CashOnDelivery, true));
        assert!(stock_was_reserved(PaymentMethod::Gateway, true));
        assert!(!stock_was_reserved(PaymentMethod::Gateway, false));
    }

    #[test]
    fn cancellation_window() {
        assert!(user_can_cancel(Pending));
        assert!(user_can_cancel(Confirmed));
        assert!(!user_can_cancel(Packed));
        assert!(!user_can_cancel(Delivered));
    }

    #[test]
    fn cancellable_set_excludes_fulfilment_and_terminal_states() {
        assert_eq!(USER_CANCELLABLE, [Pending, Confirmed]);
        for status in ALL_STATUSES {
            assert_eq!(user_can_cancel(status), USER_CANCELLABLE.contains(&status));
        }
    }
}
