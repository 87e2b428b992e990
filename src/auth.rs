//! Caller identity, as asserted by the upstream auth proxy.
//!
//! Session handling lives outside this service; requests arrive with
//! `x-user-id` and `x-user-role` headers already validated upstream.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Customer,
}

#[derive(Clone, Copy, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("admin access required".into()))
        }
    }

    /// Owner-or-admin check used by the read endpoints.
    pub fn may_access(&self, owner: Uuid) -> Result<(), ApiError> {
        if self.id == owner || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("not authorized to access this resource".into()))
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or(ApiError::Unauthorized)?;
        let role = match parts.headers.get("x-user-role").and_then(|v| v.to_str().ok()) {
            Some("admin") => Role::Admin,
            _ => Role::Customer,
        };
        Ok(AuthUser { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_checks() {
        let admin = AuthUser { id: Uuid::new_v4(), role: Role::Admin };
        let customer = AuthUser { id: Uuid::new_v4(), role: Role::Customer };
        assert!(admin.require_admin().is_ok());
        assert!(customer.require_admin().is_err());
    }

    #[test]
    fn owner_or_admin_may_access() {
        let owner_id = Uuid::new_v4();
        let owner = AuthUser { id: owner_id, role: Role::Customer };
        let admin = AuthUser { id: Uuid::new_v4(), role: Role::Admin };
        let stranger = AuthUser { id: Uuid::new_v4(), role: Role::Customer };
        assert!(owner.may_access(owner_id).is_ok());
        assert!(admin.may_access(owner_id).is_ok());
        assert!(stranger.may_access(owner_id).is_err());
    }
}
