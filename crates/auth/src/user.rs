//! Staff account records and lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aquabill_core::{DomainError, DomainResult, RoleId, TenantId, UserId};

use crate::RoleType;

/// A staff account.
///
/// # Invariants
/// - Email is globally unique across all tenants (enforced by the store).
/// - `tenant_id` is `None` if and only if `role_type` is `PlatformAdmin`.
/// - An inactive user cannot resolve an identity, regardless of role type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    /// Optional handle for non-web clients; display only.
    pub username: Option<String>,
    /// One-way PHC hash; the plaintext never reaches this type.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_type: RoleType,
    pub role_id: Option<RoleId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: UserId,
        tenant_id: Option<TenantId>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role_type: RoleType,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let email = email.into().trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        match (role_type, tenant_id) {
            (RoleType::PlatformAdmin, Some(_)) => {
                return Err(DomainError::invariant(
                    "platform admins are not tenant-owned",
                ));
            }
            (RoleType::PlatformAdmin, None) => {}
            (_, None) => {
                return Err(DomainError::invariant(
                    "tenant-scoped users must belong to a tenant",
                ));
            }
            (_, Some(_)) => {}
        }

        Ok(Self {
            id,
            tenant_id,
            email,
            username: None,
            password_hash: password_hash.into(),
            role_type,
            role_id: None,
            is_active: true,
            created_at,
        })
    }

    pub fn belongs_to(&self, tenant_id: TenantId) -> bool {
        self.tenant_id == Some(tenant_id)
    }

    pub fn deactivate(&mut self) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::invariant("user already inactive"));
        }
        self.is_active = false;
        Ok(())
    }

    pub fn activate(&mut self) -> DomainResult<()> {
        if self.is_active {
            return Err(DomainError::invariant("user already active"));
        }
        self.is_active = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        let u = User::new(
            UserId::new(),
            Some(TenantId::new()),
            " Clerk@Waterworks.Example ",
            "$argon2id$stub",
            RoleType::Staff,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(u.email, "clerk@waterworks.example");
        assert!(u.is_active);
    }

    #[test]
    fn platform_admin_cannot_be_tenant_owned() {
        let err = User::new(
            UserId::new(),
            Some(TenantId::new()),
            "ops@aquabill.example",
            "$argon2id$stub",
            RoleType::PlatformAdmin,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn tenant_staff_requires_a_tenant() {
        let err = User::new(
            UserId::new(),
            None,
            "clerk@waterworks.example",
            "$argon2id$stub",
            RoleType::Collector,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn deactivate_is_not_idempotent() {
        let mut u = User::new(
            UserId::new(),
            Some(TenantId::new()),
            "clerk@waterworks.example",
            "$argon2id$stub",
            RoleType::Staff,
            Utc::now(),
        )
        .unwrap();
        u.deactivate().unwrap();
        assert!(u.deactivate().is_err());
        u.activate().unwrap();
        assert!(u.is_active);
    }
}
