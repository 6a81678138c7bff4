use std::collections::HashSet;

use thiserror::Error;

use aquabill_core::{RoleId, TenantId, UserId};

use crate::{Capability, RoleType};

/// A fully resolved identity for authorization decisions.
///
/// Built by the identity resolver in one eager fetch: the evaluator is
/// synchronous and must not issue further queries. `tenant_id` is `None`
/// only for platform admins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    pub role_type: RoleType,
    pub role_id: Option<RoleId>,
    /// Capability codes granted by the assigned role, if any.
    pub role_grants: HashSet<Capability>,
    /// Capability codes granted directly to the user. Direct grants augment
    /// role grants; they can never restrict them.
    pub direct_grants: HashSet<Capability>,
}

impl ResolvedIdentity {
    /// Permission evaluation.
    ///
    /// 1. Superuser role types pass unconditionally, for every code —
    ///    including codes absent from the seeded catalog.
    /// 2. Otherwise the code must appear in the union of role grants and
    ///    direct grants. There is no explicit-deny in this model.
    pub fn has_capability(&self, required: &Capability) -> bool {
        if self.role_type.is_superuser() {
            return true;
        }
        self.role_grants.contains(required) || self.direct_grants.contains(required)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing capability '{0}'")]
    Forbidden(String),
}

/// Authorize an identity for a required capability.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(identity: &ResolvedIdentity, required: &Capability) -> Result<(), AuthzError> {
    if identity.has_capability(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role_type: RoleType) -> ResolvedIdentity {
        ResolvedIdentity {
            user_id: UserId::new(),
            tenant_id: Some(TenantId::new()),
            email: "staff@waterworks.example".to_string(),
            role_type,
            role_id: None,
            role_grants: HashSet::new(),
            direct_grants: HashSet::new(),
        }
    }

    #[test]
    fn superusers_pass_every_capability_check() {
        for rt in [RoleType::TenantAdmin, RoleType::PlatformAdmin] {
            let id = identity(rt);
            assert!(id.has_capability(&Capability::new("customers:view")));
            // Even codes no seeded permission list contains.
            assert!(id.has_capability(&Capability::new("definitely:not:seeded")));
        }
    }

    #[test]
    fn non_admin_needs_a_grant() {
        let id = identity(RoleType::Collector);
        assert!(!id.has_capability(&Capability::new("payments:record")));
        assert!(authorize(&id, &Capability::new("payments:record")).is_err());
    }

    #[test]
    fn role_grant_alone_is_sufficient() {
        let mut id = identity(RoleType::Staff);
        id.role_grants.insert(Capability::new("customers:view"));
        assert!(id.has_capability(&Capability::new("customers:view")));
    }

    #[test]
    fn direct_grant_alone_is_sufficient() {
        let mut id = identity(RoleType::Collector);
        id.direct_grants.insert(Capability::new("payments:record"));
        assert!(id.has_capability(&Capability::new("payments:record")));
    }

    #[test]
    fn union_semantics_survive_duplicate_grant_removal() {
        // The same code granted via role and directly: dropping the direct
        // grant must not revoke access.
        let mut id = identity(RoleType::Staff);
        id.role_grants.insert(Capability::new("invoices:view"));
        id.direct_grants.insert(Capability::new("invoices:view"));
        assert!(id.has_capability(&Capability::new("invoices:view")));

        id.direct_grants.remove(&Capability::new("invoices:view"));
        assert!(id.has_capability(&Capability::new("invoices:view")));
    }

    #[test]
    fn no_wildcard_and_no_hierarchy() {
        let mut id = identity(RoleType::Staff);
        id.role_grants.insert(Capability::new("customers:*"));
        assert!(!id.has_capability(&Capability::new("customers:view")));

        id.role_grants.insert(Capability::new("customers:edit"));
        assert!(!id.has_capability(&Capability::new("customers:view")));
    }
}
