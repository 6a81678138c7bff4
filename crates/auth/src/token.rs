//! Session token issuance and validation (HS256, symmetric secret).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use aquabill_core::{RoleId, TenantId, UserId};

use crate::claims::{Claims, validate_claims};
use crate::roles::RoleType;

/// Fixed session lifetime. There is no refresh or rotation protocol;
/// callers re-authenticate after expiry.
pub const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Single fail-closed outcome for every validation failure: expired,
    /// tampered, malformed, or wrong algorithm. Callers must not be able to
    /// distinguish these; the cause is logged server-side only.
    #[error("token invalid or expired")]
    InvalidOrExpired,

    #[error("token issuance failed: {0}")]
    Encode(String),
}

/// Identity material embedded into a session token at issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSubject {
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub role_type: RoleType,
    pub role_id: Option<RoleId>,
    pub email: String,
}

/// Issues and validates signed session tokens.
///
/// The signing secret is supplied at process start; this codec has no other
/// state and is cheap to clone behind an `Arc`.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token for `subject`, valid for [`TOKEN_TTL_DAYS`] from `now`.
    pub fn issue(&self, subject: &SessionSubject, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.user_id,
            tenant_id: subject.tenant_id,
            role_type: subject.role_type,
            role_id: subject.role_id,
            email: subject.email.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Decode and verify a token.
    ///
    /// Fails closed: every rejection collapses to
    /// [`TokenError::InvalidOrExpired`].
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "session token rejected");
                TokenError::InvalidOrExpired
            })?;

        validate_claims(&data.claims, Utc::now().timestamp()).map_err(|e| {
            tracing::debug!(error = %e, "session token claims rejected");
            TokenError::InvalidOrExpired
        })?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"test-secret")
    }

    fn subject(tenant_id: Option<TenantId>, role_type: RoleType) -> SessionSubject {
        SessionSubject {
            user_id: UserId::new(),
            tenant_id,
            role_type,
            role_id: None,
            email: "cashier@waterworks.example".to_string(),
        }
    }

    #[test]
    fn round_trip_recovers_identity_claims() {
        let codec = codec();
        let tenant_id = TenantId::new();
        let subject = subject(Some(tenant_id), RoleType::Collector);

        let token = codec.issue(&subject, Utc::now()).unwrap();
        let claims = codec.validate(&token).unwrap();

        assert_eq!(claims.sub, subject.user_id);
        assert_eq!(claims.tenant_id, Some(tenant_id));
        assert_eq!(claims.role_type, RoleType::Collector);
        assert_eq!(claims.email, subject.email);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_DAYS * 24 * 3600);
    }

    #[test]
    fn platform_admin_tokens_carry_no_tenant() {
        let codec = codec();
        let token = codec
            .issue(&subject(None, RoleType::PlatformAdmin), Utc::now())
            .unwrap();
        let claims = codec.validate(&token).unwrap();
        assert_eq!(claims.tenant_id, None);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec();
        let issued = Utc::now() - Duration::days(TOKEN_TTL_DAYS) - Duration::seconds(1);
        let token = codec
            .issue(&subject(Some(TenantId::new()), RoleType::Staff), issued)
            .unwrap();

        assert_eq!(codec.validate(&token), Err(TokenError::InvalidOrExpired));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let codec = codec();
        let token = codec
            .issue(&subject(Some(TenantId::new()), RoleType::Staff), Utc::now())
            .unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        assert_eq!(codec.validate(&tampered), Err(TokenError::InvalidOrExpired));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = TokenCodec::new(b"other-secret");
        let token = other
            .issue(&subject(Some(TenantId::new()), RoleType::Staff), Utc::now())
            .unwrap();

        assert_eq!(codec().validate(&token), Err(TokenError::InvalidOrExpired));
    }

    #[test]
    fn garbage_is_rejected_with_the_same_error() {
        assert_eq!(
            codec().validate("not-a-token"),
            Err(TokenError::InvalidOrExpired)
        );
    }
}
