use serde::{Deserialize, Serialize};
use thiserror::Error;

use aquabill_core::{RoleId, TenantId, UserId};

use crate::RoleType;

/// JWT claims embedded in every session token.
///
/// This is the minimal set of claims AquaBill expects once a token has been
/// decoded and its signature verified. `tenant_id` is `None` only for
/// platform-admin tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the authenticated user.
    pub sub: UserId,

    /// Tenant context for the token (absent for platform admins).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,

    /// Built-in role type of the subject.
    pub role_type: RoleType,

    /// Assigned tenant-scoped role, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<RoleId>,

    /// Subject email (display/audit only; never used for lookup after issue).
    pub email: String,

    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,

    /// Expiration (Unix timestamp, seconds).
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate claim timestamps.
///
/// Note: this validates the *claims* only. Signature verification/decoding
/// lives in [`crate::TokenCodec`], which also runs this check so that a
/// decoded-but-inconsistent payload is still rejected.
pub fn validate_claims(claims: &Claims, now_ts: i64) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now_ts < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now_ts >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(iat: i64, exp: i64) -> Claims {
        Claims {
            sub: UserId::new(),
            tenant_id: Some(TenantId::new()),
            role_type: RoleType::Staff,
            role_id: None,
            email: "staff@example.com".to_string(),
            iat,
            exp,
        }
    }

    #[test]
    fn claims_within_window_are_valid() {
        assert!(validate_claims(&claims(100, 200), 150).is_ok());
    }

    #[test]
    fn expired_claims_are_rejected() {
        assert_eq!(
            validate_claims(&claims(100, 200), 200),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn future_issued_claims_are_rejected() {
        assert_eq!(
            validate_claims(&claims(100, 200), 50),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert_eq!(
            validate_claims(&claims(200, 100), 150),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
