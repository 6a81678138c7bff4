//! Repository traits over the transactional store.
//!
//! Every method is tenant-scoped where the data is tenant-owned: the
//! tenant id is part of the query, which makes cross-tenant access
//! architecturally impossible rather than a matter of handler discipline.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use aquabill_auth::{Capability, Role, User};
use aquabill_billing::{Invoice, Payment};
use aquabill_core::{CustomerId, DomainError, InvoiceId, RoleId, TenantId, UserId};
use aquabill_metering::Customer;
use aquabill_tenancy::{PlanLimits, SubscriptionPlan, Tenant};

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Store-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    /// Unique constraint or stale-write conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A row cannot be removed while other rows still reference it.
    #[error("referential conflict: {0}")]
    ReferentialConflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Backend fault (connection, serialization, unexpected shape).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound => StoreError::NotFound,
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            DomainError::ReferentialConflict(msg) => StoreError::ReferentialConflict(msg),
            other => StoreError::Validation(other.to_string()),
        }
    }
}

/// Everything the identity resolver needs about a subject, loaded eagerly
/// in one logical fetch: the permission evaluator is synchronous and must
/// not issue further queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationBundle {
    pub user: User,
    /// Assigned role with its grants, when the user has one.
    pub role: Option<Role>,
    /// Direct (per-user) capability grants.
    pub direct_grants: HashSet<Capability>,
}

/// Users, roles, and capability grants.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Insert a user. Fails with `Conflict` when the email is taken —
    /// emails are unique across all tenants.
    async fn insert_user(&self, user: User) -> Result<(), StoreError>;

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self, tenant_id: TenantId) -> Result<Vec<User>, StoreError>;

    /// Number of user rows owned by the tenant (the "staff" counter).
    async fn count_users(&self, tenant_id: TenantId) -> Result<u64, StoreError>;

    async fn update_user(&self, user: User) -> Result<(), StoreError>;

    async fn delete_user(&self, tenant_id: TenantId, id: UserId) -> Result<(), StoreError>;

    async fn insert_role(&self, role: Role) -> Result<(), StoreError>;

    async fn role_by_id(
        &self,
        tenant_id: TenantId,
        id: RoleId,
    ) -> Result<Option<Role>, StoreError>;

    async fn list_roles(&self, tenant_id: TenantId) -> Result<Vec<Role>, StoreError>;

    async fn update_role(&self, role: Role) -> Result<(), StoreError>;

    /// Delete a role. Fails with `ReferentialConflict` while any user still
    /// references it.
    async fn delete_role(&self, tenant_id: TenantId, id: RoleId) -> Result<(), StoreError>;

    async fn grant_direct(&self, user_id: UserId, capability: Capability)
    -> Result<(), StoreError>;

    async fn revoke_direct(
        &self,
        user_id: UserId,
        capability: &Capability,
    ) -> Result<(), StoreError>;

    /// One logical fetch of user ⨝ role ⨝ role grants ⨝ direct grants.
    async fn load_authorization_bundle(
        &self,
        user_id: UserId,
    ) -> Result<Option<AuthorizationBundle>, StoreError>;
}

/// Tenants and plan-limit reference data.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Insert a tenant. Fails with `Conflict` when the slug is taken.
    async fn insert_tenant(&self, tenant: Tenant) -> Result<(), StoreError>;

    async fn tenant_by_id(&self, id: TenantId) -> Result<Option<Tenant>, StoreError>;

    async fn list_tenants(&self) -> Result<Vec<Tenant>, StoreError>;

    async fn update_tenant(&self, tenant: Tenant) -> Result<(), StoreError>;

    /// Delete a tenant. Fails with `ReferentialConflict` while the tenant
    /// still owns users, customers, or payments.
    async fn delete_tenant(&self, id: TenantId) -> Result<(), StoreError>;

    /// Plan-limit row for a plan. Falls back to built-in defaults when the
    /// reference row has not been seeded.
    async fn plan_limits(&self, plan: SubscriptionPlan) -> Result<PlanLimits, StoreError>;

    async fn upsert_plan_limits(&self, limits: PlanLimits) -> Result<(), StoreError>;
}

/// Customers and their metered connections.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn insert_customer(&self, customer: Customer) -> Result<(), StoreError>;

    async fn customer_by_id(
        &self,
        tenant_id: TenantId,
        id: CustomerId,
    ) -> Result<Option<Customer>, StoreError>;

    async fn list_customers(&self, tenant_id: TenantId) -> Result<Vec<Customer>, StoreError>;

    async fn update_customer(&self, customer: Customer) -> Result<(), StoreError>;

    /// Number of customer rows owned by the tenant.
    async fn count_customers(&self, tenant_id: TenantId) -> Result<u64, StoreError>;
}

/// Invoices and payments.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn insert_invoice(&self, invoice: Invoice) -> Result<(), StoreError>;

    async fn invoice_by_id(
        &self,
        tenant_id: TenantId,
        id: InvoiceId,
    ) -> Result<Option<Invoice>, StoreError>;

    async fn list_invoices(&self, tenant_id: TenantId) -> Result<Vec<Invoice>, StoreError>;

    async fn list_payments(&self, tenant_id: TenantId) -> Result<Vec<Payment>, StoreError>;

    /// Payments recorded at or after `since` (the monthly transaction
    /// counter). Re-read on every call; never cached.
    async fn count_payments_since(
        &self,
        tenant_id: TenantId,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Create the payment and reconcile its linked invoice in ONE
    /// transaction. Returns the updated invoice when the payment is linked
    /// to one. A crash can no longer leave the balance inconsistent with
    /// recorded payments.
    async fn record_payment(&self, payment: Payment) -> Result<Option<Invoice>, StoreError>;
}
