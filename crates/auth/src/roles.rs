//! Role types and tenant-scoped role records.

use core::str::FromStr;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use aquabill_core::{DomainError, DomainResult, RoleId, TenantId};

use crate::Capability;

/// Built-in role type of a user account.
///
/// `RoleType` is a fixed classification, distinct from tenant-scoped `Role`
/// records (named bundles of capability grants). The superuser rule is
/// expressed once, in [`RoleType::is_superuser`], and consulted only by the
/// permission evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    /// Operates the platform itself; not bound to any tenant.
    PlatformAdmin,
    /// Administers one tenant; unconditional grant within it.
    TenantAdmin,
    Staff,
    Collector,
    Accountant,
}

impl RoleType {
    /// Superuser role types bypass capability checks entirely.
    pub fn is_superuser(self) -> bool {
        matches!(self, RoleType::PlatformAdmin | RoleType::TenantAdmin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoleType::PlatformAdmin => "platform_admin",
            RoleType::TenantAdmin => "tenant_admin",
            RoleType::Staff => "staff",
            RoleType::Collector => "collector",
            RoleType::Accountant => "accountant",
        }
    }
}

impl core::fmt::Display for RoleType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role type: {0}")]
pub struct ParseRoleTypeError(String);

impl FromStr for RoleType {
    type Err = ParseRoleTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform_admin" => Ok(RoleType::PlatformAdmin),
            "tenant_admin" => Ok(RoleType::TenantAdmin),
            "staff" => Ok(RoleType::Staff),
            "collector" => Ok(RoleType::Collector),
            "accountant" => Ok(RoleType::Accountant),
            other => Err(ParseRoleTypeError(other.to_string())),
        }
    }
}

/// A named bundle of capability grants, assignable to users within one
/// tenant. Deletable only while no user references it (enforced by the
/// store as a referential guard).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub grants: HashSet<Capability>,
}

impl Role {
    pub fn new(
        id: RoleId,
        tenant_id: TenantId,
        name: impl Into<String>,
        description: Option<String>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }
        Ok(Self {
            id,
            tenant_id,
            name: name.trim().to_string(),
            description,
            grants: HashSet::new(),
        })
    }

    /// Replace the grant set. Duplicate codes collapse; granting is
    /// idempotent by construction.
    pub fn set_grants(&mut self, grants: impl IntoIterator<Item = Capability>) {
        self.grants = grants.into_iter().collect();
    }

    pub fn grant(&mut self, capability: Capability) {
        self.grants.insert(capability);
    }

    pub fn revoke(&mut self, capability: &Capability) {
        self.grants.remove(capability);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_types_are_superusers() {
        assert!(RoleType::PlatformAdmin.is_superuser());
        assert!(RoleType::TenantAdmin.is_superuser());
        assert!(!RoleType::Staff.is_superuser());
        assert!(!RoleType::Collector.is_superuser());
        assert!(!RoleType::Accountant.is_superuser());
    }

    #[test]
    fn role_type_round_trips_through_str() {
        for rt in [
            RoleType::PlatformAdmin,
            RoleType::TenantAdmin,
            RoleType::Staff,
            RoleType::Collector,
            RoleType::Accountant,
        ] {
            assert_eq!(rt.as_str().parse::<RoleType>().unwrap(), rt);
        }
    }

    #[test]
    fn grants_are_idempotent() {
        let mut role = Role::new(RoleId::new(), TenantId::new(), "cashier", None).unwrap();
        role.grant(Capability::new("payments:record"));
        role.grant(Capability::new("payments:record"));
        assert_eq!(role.grants.len(), 1);
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(Role::new(RoleId::new(), TenantId::new(), "  ", None).is_err());
    }
}
