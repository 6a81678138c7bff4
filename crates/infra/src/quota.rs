//! Store-backed quota guard.
//!
//! The guard re-reads the tenant, its plan limits, and the live count on
//! every call — no caching, so sequential requests never see a stale
//! count. Concurrent check-then-create sequences are not serialized: the
//! ceiling is soft, and a brief overshoot by racing requests is an
//! accepted risk rather than a correctness violation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use aquabill_core::TenantId;
use aquabill_tenancy::{CountedResource, QuotaExceeded, admit, transaction_window_start};

use crate::store::{BillingStore, CustomerStore, DirectoryStore, StoreError, TenantStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuotaError {
    #[error(transparent)]
    Exceeded(#[from] QuotaExceeded),

    /// The tenant row disappeared between resolution and admission.
    #[error("not found")]
    TenantNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Admits or rejects creations of counted resources against the tenant's
/// effective ceilings.
pub struct QuotaGuard {
    tenants: Arc<dyn TenantStore>,
    directory: Arc<dyn DirectoryStore>,
    customers: Arc<dyn CustomerStore>,
    billing: Arc<dyn BillingStore>,
}

impl QuotaGuard {
    pub fn new(
        tenants: Arc<dyn TenantStore>,
        directory: Arc<dyn DirectoryStore>,
        customers: Arc<dyn CustomerStore>,
        billing: Arc<dyn BillingStore>,
    ) -> Self {
        Self {
            tenants,
            directory,
            customers,
            billing,
        }
    }

    /// Check whether `proposed_delta` more rows of `resource` fit under the
    /// tenant's effective ceiling.
    ///
    /// Ceiling resolution: tenant override, else plan default, else
    /// unlimited. The transaction counter covers payments since the start
    /// of the current calendar month (UTC) — it resets implicitly at each
    /// month boundary.
    pub async fn admit(
        &self,
        tenant_id: TenantId,
        resource: CountedResource,
        proposed_delta: u64,
        now: DateTime<Utc>,
    ) -> Result<(), QuotaError> {
        let tenant = self
            .tenants
            .tenant_by_id(tenant_id)
            .await?
            .ok_or(QuotaError::TenantNotFound)?;
        let plan_limits = self.tenants.plan_limits(tenant.plan).await?;
        let ceiling = tenant.effective_ceiling(resource, &plan_limits);

        // Unlimited: skip the count query entirely.
        let Some(ceiling) = ceiling else {
            return Ok(());
        };

        let current = match resource {
            CountedResource::Staff => self.directory.count_users(tenant_id).await?,
            CountedResource::CustomerOrMeter => self.customers.count_customers(tenant_id).await?,
            CountedResource::Transaction => {
                self.billing
                    .count_payments_since(tenant_id, transaction_window_start(now))
                    .await?
            }
        };

        admit(resource, current, proposed_delta, Some(ceiling))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use aquabill_billing::{Payment, PaymentMethod};
    use aquabill_core::{CustomerId, PaymentId};
    use aquabill_metering::Customer;
    use aquabill_tenancy::{CeilingOverride, SubscriptionPlan, Tenant};

    use crate::store::InMemoryStore;

    async fn setup(plan: SubscriptionPlan) -> (Arc<InMemoryStore>, QuotaGuard, Tenant) {
        let store = Arc::new(InMemoryStore::new());
        let guard = QuotaGuard::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );

        let mut tenant = Tenant::new(
            TenantId::new(),
            "springfield-water",
            "Springfield Water Co.",
            plan,
            Utc::now(),
        )
        .unwrap();
        tenant.activate().unwrap();
        store.insert_tenant(tenant.clone()).await.unwrap();

        (store, guard, tenant)
    }

    async fn add_customer(store: &InMemoryStore, tenant_id: TenantId, serial: &str) {
        store
            .insert_customer(
                Customer::new(
                    CustomerId::new(),
                    tenant_id,
                    "Amina Diallo",
                    serial,
                    "12 Borehole Rd",
                    Utc::now(),
                )
                .unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn third_customer_is_denied_at_ceiling_two() {
        let (store, guard, mut tenant) = setup(SubscriptionPlan::Standard).await;
        tenant.max_customers = CeilingOverride::Limit(2);
        store.update_tenant(tenant.clone()).await.unwrap();

        add_customer(&store, tenant.id, "MTR-0001").await;
        add_customer(&store, tenant.id, "MTR-0002").await;

        let err = guard
            .admit(tenant.id, CountedResource::CustomerOrMeter, 1, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::Exceeded(e) if e.ceiling == 2));
    }

    #[tokio::test]
    async fn unlimited_override_beats_plan_default() {
        let (store, guard, mut tenant) = setup(SubscriptionPlan::Basic).await;
        tenant.max_customers = CeilingOverride::Unlimited;
        store.update_tenant(tenant.clone()).await.unwrap();

        // Far beyond the Basic plan's 500-customer default.
        for i in 0..600 {
            add_customer(&store, tenant.id, &format!("MTR-{i:04}")).await;
        }

        guard
            .admit(tenant.id, CountedResource::CustomerOrMeter, 1, Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn count_is_reread_on_every_call() {
        let (store, guard, mut tenant) = setup(SubscriptionPlan::Standard).await;
        tenant.max_customers = CeilingOverride::Limit(1);
        store.update_tenant(tenant.clone()).await.unwrap();

        guard
            .admit(tenant.id, CountedResource::CustomerOrMeter, 1, Utc::now())
            .await
            .unwrap();

        add_customer(&store, tenant.id, "MTR-0001").await;

        // Same guard, sequential call: must see the new row.
        assert!(
            guard
                .admit(tenant.id, CountedResource::CustomerOrMeter, 1, Utc::now())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn transaction_counter_resets_at_month_boundary() {
        let (store, guard, mut tenant) = setup(SubscriptionPlan::Standard).await;
        tenant.max_transactions = CeilingOverride::Limit(1);
        store.update_tenant(tenant.clone()).await.unwrap();

        let last_month = Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap();
        let this_month = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();

        store
            .record_payment(
                Payment::record(
                    PaymentId::new(),
                    tenant.id,
                    CustomerId::new(),
                    None,
                    1_000,
                    PaymentMethod::Cash,
                    None,
                    last_month,
                )
                .unwrap(),
            )
            .await
            .unwrap();

        // The May payment fills May's window but not June's.
        assert!(
            guard
                .admit(tenant.id, CountedResource::Transaction, 1, last_month)
                .await
                .is_err()
        );
        guard
            .admit(tenant.id, CountedResource::Transaction, 1, this_month)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn staff_counter_uses_user_rows() {
        let (store, guard, mut tenant) = setup(SubscriptionPlan::Standard).await;
        tenant.max_staff = CeilingOverride::Limit(1);
        store.update_tenant(tenant.clone()).await.unwrap();

        let user = aquabill_auth::User::new(
            aquabill_core::UserId::new(),
            Some(tenant.id),
            "clerk@springfield.example",
            "$argon2id$stub",
            aquabill_auth::RoleType::Staff,
            Utc::now(),
        )
        .unwrap();
        store.insert_user(user).await.unwrap();

        assert!(
            guard
                .admit(tenant.id, CountedResource::Staff, 1, Utc::now())
                .await
                .is_err()
        );
    }
}
