//! Tenant records, subscription plans, and plan-limit reference data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aquabill_core::{DomainError, DomainResult, TenantId};

use crate::quota::CountedResource;

/// Tenant lifecycle status.
///
/// A suspended tenant admits no authenticated tenant-scoped operation —
/// suspension is a circuit breaker above the user level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
    Pending,
}

impl core::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TenantStatus::Active => f.write_str("active"),
            TenantStatus::Suspended => f.write_str("suspended"),
            TenantStatus::Pending => f.write_str("pending"),
        }
    }
}

/// Subscription plan of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    Basic,
    Standard,
    Premium,
    Enterprise,
}

impl SubscriptionPlan {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionPlan::Basic => "basic",
            SubscriptionPlan::Standard => "standard",
            SubscriptionPlan::Premium => "premium",
            SubscriptionPlan::Enterprise => "enterprise",
        }
    }

    pub const ALL: [SubscriptionPlan; 4] = [
        SubscriptionPlan::Basic,
        SubscriptionPlan::Standard,
        SubscriptionPlan::Premium,
        SubscriptionPlan::Enterprise,
    ];
}

impl core::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default ceilings for one plan. `None` means unlimited.
///
/// Read-only reference data, consulted when a tenant carries no override
/// for a given ceiling. Seeded at bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub plan: SubscriptionPlan,
    pub max_staff: Option<u32>,
    pub max_customers: Option<u32>,
    pub max_transactions: Option<u32>,
}

impl PlanLimits {
    /// Built-in defaults per plan.
    pub fn defaults_for(plan: SubscriptionPlan) -> Self {
        match plan {
            SubscriptionPlan::Basic => Self {
                plan,
                max_staff: Some(5),
                max_customers: Some(500),
                max_transactions: Some(1_000),
            },
            SubscriptionPlan::Standard => Self {
                plan,
                max_staff: Some(20),
                max_customers: Some(5_000),
                max_transactions: Some(10_000),
            },
            SubscriptionPlan::Premium => Self {
                plan,
                max_staff: Some(100),
                max_customers: Some(50_000),
                max_transactions: Some(100_000),
            },
            SubscriptionPlan::Enterprise => Self {
                plan,
                max_staff: None,
                max_customers: None,
                max_transactions: None,
            },
        }
    }

    pub fn ceiling(&self, resource: CountedResource) -> Option<u32> {
        match resource {
            CountedResource::Staff => self.max_staff,
            CountedResource::CustomerOrMeter => self.max_customers,
            CountedResource::Transaction => self.max_transactions,
        }
    }
}

/// Per-tenant ceiling override for one counted resource.
///
/// Three states are distinct: inheriting the plan default, an explicit
/// "unlimited" override, and an explicit numeric ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeilingOverride {
    /// Use the plan default.
    #[default]
    Inherit,
    /// Explicitly unlimited for this tenant, regardless of plan.
    Unlimited,
    /// Explicit ceiling for this tenant, regardless of plan.
    Limit(u32),
}

/// A billed customer organization of the platform; the unit of data
/// isolation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub slug: String,
    pub display_name: String,
    pub status: TenantStatus,
    pub plan: SubscriptionPlan,
    pub max_staff: CeilingOverride,
    pub max_customers: CeilingOverride,
    pub max_transactions: CeilingOverride,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Create a tenant in `Pending` status (activated by the platform admin).
    pub fn new(
        id: TenantId,
        slug: impl Into<String>,
        display_name: impl Into<String>,
        plan: SubscriptionPlan,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let slug = slug.into();
        let display_name = display_name.into();

        if slug.is_empty()
            || !slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(DomainError::validation(
                "slug must be non-empty lowercase alphanumeric with hyphens",
            ));
        }
        if display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        Ok(Self {
            id,
            slug,
            display_name: display_name.trim().to_string(),
            status: TenantStatus::Pending,
            plan,
            max_staff: CeilingOverride::Inherit,
            max_customers: CeilingOverride::Inherit,
            max_transactions: CeilingOverride::Inherit,
            created_at,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    pub fn activate(&mut self) -> DomainResult<()> {
        if self.status == TenantStatus::Active {
            return Err(DomainError::invariant("tenant already active"));
        }
        self.status = TenantStatus::Active;
        Ok(())
    }

    pub fn suspend(&mut self) -> DomainResult<()> {
        if self.status == TenantStatus::Suspended {
            return Err(DomainError::invariant("tenant already suspended"));
        }
        self.status = TenantStatus::Suspended;
        Ok(())
    }

    fn override_for(&self, resource: CountedResource) -> CeilingOverride {
        match resource {
            CountedResource::Staff => self.max_staff,
            CountedResource::CustomerOrMeter => self.max_customers,
            CountedResource::Transaction => self.max_transactions,
        }
    }

    /// Resolve the effective ceiling for one counted resource.
    ///
    /// Tenant override wins over the plan default; an explicit `Unlimited`
    /// override wins even when the plan carries a numeric default. `None`
    /// means no ceiling applies.
    pub fn effective_ceiling(
        &self,
        resource: CountedResource,
        plan_limits: &PlanLimits,
    ) -> Option<u32> {
        match self.override_for(resource) {
            CeilingOverride::Inherit => plan_limits.ceiling(resource),
            CeilingOverride::Unlimited => None,
            CeilingOverride::Limit(n) => Some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(plan: SubscriptionPlan) -> Tenant {
        Tenant::new(
            TenantId::new(),
            "springfield-water",
            "Springfield Water Co.",
            plan,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn new_tenant_starts_pending() {
        let t = tenant(SubscriptionPlan::Basic);
        assert_eq!(t.status, TenantStatus::Pending);
        assert!(!t.is_active());
    }

    #[test]
    fn slug_is_validated() {
        let bad = Tenant::new(
            TenantId::new(),
            "Springfield Water",
            "Springfield Water Co.",
            SubscriptionPlan::Basic,
            Utc::now(),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn activate_then_suspend_round_trip() {
        let mut t = tenant(SubscriptionPlan::Standard);
        t.activate().unwrap();
        assert!(t.is_active());
        assert!(t.activate().is_err());

        t.suspend().unwrap();
        assert_eq!(t.status, TenantStatus::Suspended);
        assert!(t.suspend().is_err());
    }

    #[test]
    fn inherit_falls_back_to_plan_default() {
        let t = tenant(SubscriptionPlan::Basic);
        let limits = PlanLimits::defaults_for(SubscriptionPlan::Basic);
        assert_eq!(
            t.effective_ceiling(CountedResource::CustomerOrMeter, &limits),
            Some(500)
        );
    }

    #[test]
    fn unlimited_override_beats_plan_default() {
        let mut t = tenant(SubscriptionPlan::Basic);
        t.max_customers = CeilingOverride::Unlimited;
        let limits = PlanLimits::defaults_for(SubscriptionPlan::Basic);
        assert_eq!(
            t.effective_ceiling(CountedResource::CustomerOrMeter, &limits),
            None
        );
    }

    #[test]
    fn numeric_override_beats_plan_default() {
        let mut t = tenant(SubscriptionPlan::Premium);
        t.max_staff = CeilingOverride::Limit(3);
        let limits = PlanLimits::defaults_for(SubscriptionPlan::Premium);
        assert_eq!(
            t.effective_ceiling(CountedResource::Staff, &limits),
            Some(3)
        );
    }

    #[test]
    fn enterprise_plan_is_unlimited_by_default() {
        let t = tenant(SubscriptionPlan::Enterprise);
        let limits = PlanLimits::defaults_for(SubscriptionPlan::Enterprise);
        for resource in [
            CountedResource::Staff,
            CountedResource::CustomerOrMeter,
            CountedResource::Transaction,
        ] {
            assert_eq!(t.effective_ceiling(resource, &limits), None);
        }
    }
}
