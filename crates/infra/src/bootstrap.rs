//! Idempotent startup reconciliation.
//!
//! Runs once at process start, outside the authorization core: seeds the
//! plan-limit reference rows and ensures at least one platform admin
//! exists. Re-running is a no-op.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use aquabill_auth::{RoleType, User, capability_catalog, hash_password};
use aquabill_core::UserId;
use aquabill_tenancy::{PlanLimits, SubscriptionPlan};

use crate::store::{DirectoryStore, TenantStore};

/// Bootstrap configuration, read from the environment by `main`.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub admin_email: String,
    pub admin_password: String,
}

/// Seed reference data and reconcile the platform admin account.
pub async fn run(
    tenants: Arc<dyn TenantStore>,
    directory: Arc<dyn DirectoryStore>,
    config: &BootstrapConfig,
) -> anyhow::Result<()> {
    seed_reference_data(tenants).await?;
    ensure_platform_admin(directory, config).await
}

/// Seed the plan-limit reference rows (idempotent upsert).
pub async fn seed_reference_data(tenants: Arc<dyn TenantStore>) -> anyhow::Result<()> {
    for plan in SubscriptionPlan::ALL {
        tenants
            .upsert_plan_limits(PlanLimits::defaults_for(plan))
            .await
            .with_context(|| format!("seeding plan limits for '{plan}'"))?;
    }

    tracing::info!(
        capabilities = capability_catalog().len(),
        "capability catalog loaded"
    );
    Ok(())
}

/// Ensure at least one platform admin exists (no-op when present).
pub async fn ensure_platform_admin(
    directory: Arc<dyn DirectoryStore>,
    config: &BootstrapConfig,
) -> anyhow::Result<()> {
    let email = config.admin_email.trim().to_lowercase();
    if directory
        .user_by_email(&email)
        .await
        .context("looking up platform admin")?
        .is_some()
    {
        tracing::debug!(%email, "platform admin present; bootstrap is a no-op");
        return Ok(());
    }

    let admin = User::new(
        UserId::new(),
        None,
        email.clone(),
        hash_password(&config.admin_password).context("hashing platform admin password")?,
        RoleType::PlatformAdmin,
        Utc::now(),
    )
    .map_err(|e| anyhow::anyhow!("platform admin record invalid: {e}"))?;

    directory
        .insert_user(admin)
        .await
        .context("creating platform admin")?;
    tracing::info!(%email, "platform admin created");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::InMemoryStore;

    fn config() -> BootstrapConfig {
        BootstrapConfig {
            admin_email: "Ops@AquaBill.example".to_string(),
            admin_password: "change-me-now".to_string(),
        }
    }

    #[tokio::test]
    async fn bootstrap_creates_the_platform_admin_once() {
        let store = Arc::new(InMemoryStore::new());

        run(store.clone(), store.clone(), &config()).await.unwrap();
        let admin = store
            .user_by_email("ops@aquabill.example")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role_type, RoleType::PlatformAdmin);
        assert_eq!(admin.tenant_id, None);

        // Idempotent: a second run changes nothing and does not conflict.
        run(store.clone(), store.clone(), &config()).await.unwrap();
    }

    #[tokio::test]
    async fn bootstrap_seeds_plan_limits() {
        let store = Arc::new(InMemoryStore::new());
        run(store.clone(), store.clone(), &config()).await.unwrap();

        let limits = store.plan_limits(SubscriptionPlan::Basic).await.unwrap();
        assert_eq!(limits.max_customers, Some(500));
    }
}
