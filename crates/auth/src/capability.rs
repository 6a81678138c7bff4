use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Capability identifier.
///
/// Capabilities are modeled as opaque strings (e.g. "customers:edit").
/// Matching is case-sensitive and exact: there is no wildcard and no
/// hierarchy — `customers:edit` does not imply `customers:view`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A seeded capability definition: code, human name, and module grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityDef {
    pub code: &'static str,
    pub name: &'static str,
    pub module: &'static str,
}

/// The closed-world capability catalog, seeded at deployment.
///
/// Endpoints must name a capability from this list; an endpoint with no
/// matching check is a policy bug, not an intentionally open endpoint.
pub fn capability_catalog() -> &'static [CapabilityDef] {
    const CATALOG: &[CapabilityDef] = &[
        CapabilityDef { code: "customers:view", name: "View customers", module: "customers" },
        CapabilityDef { code: "customers:create", name: "Register customers", module: "customers" },
        CapabilityDef { code: "customers:edit", name: "Edit customers", module: "customers" },
        CapabilityDef { code: "customers:delete", name: "Remove customers", module: "customers" },
        CapabilityDef { code: "users:view", name: "View staff", module: "users" },
        CapabilityDef { code: "users:create", name: "Create staff", module: "users" },
        CapabilityDef { code: "users:edit", name: "Edit staff", module: "users" },
        CapabilityDef { code: "users:delete", name: "Remove staff", module: "users" },
        CapabilityDef { code: "roles:view", name: "View roles", module: "roles" },
        CapabilityDef { code: "roles:manage", name: "Manage roles", module: "roles" },
        CapabilityDef { code: "invoices:view", name: "View invoices", module: "invoices" },
        CapabilityDef { code: "invoices:create", name: "Issue invoices", module: "invoices" },
        CapabilityDef { code: "payments:view", name: "View payments", module: "payments" },
        CapabilityDef { code: "payments:record", name: "Record payments", module: "payments" },
        CapabilityDef { code: "reports:view", name: "View reports", module: "reports" },
    ];
    CATALOG
}

/// Whether a code appears in the seeded catalog.
pub fn is_known_capability(code: &str) -> bool {
    capability_catalog().iter().any(|def| def.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_codes_are_unique() {
        let catalog = capability_catalog();
        for (i, a) in catalog.iter().enumerate() {
            for b in &catalog[i + 1..] {
                assert_ne!(a.code, b.code, "duplicate capability code in catalog");
            }
        }
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(is_known_capability("customers:view"));
        assert!(!is_known_capability("Customers:View"));
        assert!(!is_known_capability("customers:*"));
    }
}
