//! Infrastructure wiring: stores, token codec, resolver, quota guard.

use std::sync::Arc;

use aquabill_auth::TokenCodec;
use aquabill_infra::{
    BillingStore, CustomerStore, DirectoryStore, IdentityResolver, InMemoryStore, PostgresStore,
    QuotaGuard, TenantStore,
};

/// Shared service handles for the HTTP layer.
///
/// Store handles are trait objects so the same routing code runs against
/// the in-memory backend (dev, tests) and Postgres (production).
pub struct AppServices {
    pub directory: Arc<dyn DirectoryStore>,
    pub tenants: Arc<dyn TenantStore>,
    pub customers: Arc<dyn CustomerStore>,
    pub billing: Arc<dyn BillingStore>,
    pub resolver: IdentityResolver,
    pub quota: QuotaGuard,
    pub codec: TokenCodec,
}

impl AppServices {
    fn from_parts(
        directory: Arc<dyn DirectoryStore>,
        tenants: Arc<dyn TenantStore>,
        customers: Arc<dyn CustomerStore>,
        billing: Arc<dyn BillingStore>,
        jwt_secret: &[u8],
    ) -> Arc<Self> {
        let resolver = IdentityResolver::new(directory.clone(), tenants.clone());
        let quota = QuotaGuard::new(
            tenants.clone(),
            directory.clone(),
            customers.clone(),
            billing.clone(),
        );
        Arc::new(Self {
            directory,
            tenants,
            customers,
            billing,
            resolver,
            quota,
            codec: TokenCodec::new(jwt_secret),
        })
    }

    /// In-memory backend for dev and tests.
    pub fn in_memory(jwt_secret: &[u8]) -> Arc<Self> {
        let store = Arc::new(InMemoryStore::new());
        Self::from_parts(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            jwt_secret,
        )
    }

    /// Postgres backend.
    pub async fn postgres(database_url: &str, jwt_secret: &[u8]) -> anyhow::Result<Arc<Self>> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Arc::new(PostgresStore::new(pool));
        Ok(Self::from_parts(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            jwt_secret,
        ))
    }
}

/// Select a backend: Postgres when `DATABASE_URL` is configured,
/// in-memory otherwise.
pub async fn build_services(
    jwt_secret: &str,
    database_url: Option<&str>,
) -> anyhow::Result<Arc<AppServices>> {
    match database_url {
        Some(url) => {
            tracing::info!("using postgres store");
            AppServices::postgres(url, jwt_secret.as_bytes()).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is not persisted)");
            Ok(AppServices::in_memory(jwt_secret.as_bytes()))
        }
    }
}
