//! `aquabill-tenancy` — tenants, subscription plans, and quota policy.

pub mod quota;
pub mod tenant;

pub use quota::{CountedResource, QuotaExceeded, admit, transaction_window_start};
pub use tenant::{CeilingOverride, PlanLimits, SubscriptionPlan, Tenant, TenantStatus};
