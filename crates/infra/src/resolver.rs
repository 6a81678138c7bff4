//! Store-backed identity resolution with the tenant gate.
//!
//! Every failure surfaces uniformly as `Unauthorized` — the distinction
//! between a bad token, an inactive user, and a suspended tenant is
//! deliberately not exposed to callers (anti-enumeration), but each cause
//! is logged server-side.

use std::sync::Arc;

use thiserror::Error;

use aquabill_auth::{Claims, ResolvedIdentity, RoleType};

use crate::store::{DirectoryStore, StoreError, TenantStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Uniform outcome for every gate failure.
    #[error("unauthorized")]
    Unauthorized,

    /// Backend fault — not an authorization decision.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ResolveError {
    fn from(err: StoreError) -> Self {
        ResolveError::Store(err)
    }
}

/// Resolves validated token claims to a [`ResolvedIdentity`].
pub struct IdentityResolver {
    directory: Arc<dyn DirectoryStore>,
    tenants: Arc<dyn TenantStore>,
}

impl IdentityResolver {
    pub fn new(directory: Arc<dyn DirectoryStore>, tenants: Arc<dyn TenantStore>) -> Self {
        Self { directory, tenants }
    }

    /// Resolve claims through the hard gates, in order:
    ///
    /// 1. Claim shape: tenant-scoped claims carry a tenant id; platform-admin
    ///    claims carry `role_type = PlatformAdmin` and no tenant id.
    /// 2. The subject's user row exists, belongs to the claimed tenant, and
    ///    is active.
    /// 3. The tenant exists and is `Active`. Suspension gates every
    ///    tenant-scoped call regardless of the user's own flags.
    /// 4. The returned identity carries the role grants and direct grants,
    ///    loaded eagerly — the permission evaluator issues no further
    ///    queries.
    pub async fn resolve(&self, claims: &Claims) -> Result<ResolvedIdentity, ResolveError> {
        match (claims.role_type, claims.tenant_id) {
            (RoleType::PlatformAdmin, Some(_)) => {
                tracing::warn!(user_id = %claims.sub, "platform-admin claims carrying a tenant id");
                return Err(ResolveError::Unauthorized);
            }
            (RoleType::PlatformAdmin, None) => {}
            (_, None) => {
                tracing::warn!(user_id = %claims.sub, "tenant-scoped claims missing tenant id");
                return Err(ResolveError::Unauthorized);
            }
            (_, Some(_)) => {}
        }

        let Some(bundle) = self.directory.load_authorization_bundle(claims.sub).await? else {
            tracing::warn!(user_id = %claims.sub, "token subject has no user row");
            return Err(ResolveError::Unauthorized);
        };

        let user = bundle.user;
        if !user.is_active {
            tracing::warn!(user_id = %user.id, "resolution refused: user deactivated");
            return Err(ResolveError::Unauthorized);
        }
        if user.tenant_id != claims.tenant_id {
            tracing::warn!(user_id = %user.id, "resolution refused: token tenant mismatch");
            return Err(ResolveError::Unauthorized);
        }
        if user.role_type != claims.role_type {
            tracing::warn!(user_id = %user.id, "resolution refused: token role_type stale");
            return Err(ResolveError::Unauthorized);
        }

        if let Some(tenant_id) = user.tenant_id {
            let Some(tenant) = self.tenants.tenant_by_id(tenant_id).await? else {
                tracing::warn!(%tenant_id, "resolution refused: tenant row missing");
                return Err(ResolveError::Unauthorized);
            };
            if !tenant.is_active() {
                tracing::warn!(%tenant_id, status = %tenant.status, "resolution refused: tenant not active");
                return Err(ResolveError::Unauthorized);
            }
        }

        Ok(ResolvedIdentity {
            user_id: user.id,
            tenant_id: user.tenant_id,
            email: user.email,
            role_type: user.role_type,
            role_id: user.role_id,
            role_grants: bundle.role.map(|r| r.grants).unwrap_or_default(),
            direct_grants: bundle.direct_grants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use aquabill_auth::{Capability, User};
    use aquabill_core::{TenantId, UserId};
    use aquabill_tenancy::{SubscriptionPlan, Tenant};

    use crate::store::InMemoryStore;

    fn claims_for(user: &User) -> Claims {
        Claims {
            sub: user.id,
            tenant_id: user.tenant_id,
            role_type: user.role_type,
            role_id: user.role_id,
            email: user.email.clone(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 3600,
        }
    }

    async fn setup() -> (Arc<InMemoryStore>, IdentityResolver, Tenant) {
        let store = Arc::new(InMemoryStore::new());
        let resolver = IdentityResolver::new(store.clone(), store.clone());

        let mut tenant = Tenant::new(
            TenantId::new(),
            "springfield-water",
            "Springfield Water Co.",
            SubscriptionPlan::Standard,
            Utc::now(),
        )
        .unwrap();
        tenant.activate().unwrap();
        store.insert_tenant(tenant.clone()).await.unwrap();

        (store, resolver, tenant)
    }

    fn staff_user(tenant_id: TenantId, email: &str) -> User {
        User::new(
            UserId::new(),
            Some(tenant_id),
            email,
            "$argon2id$stub",
            RoleType::Staff,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn active_user_in_active_tenant_resolves() {
        let (store, resolver, tenant) = setup().await;
        let user = staff_user(tenant.id, "clerk@springfield.example");
        store.insert_user(user.clone()).await.unwrap();
        store
            .grant_direct(user.id, Capability::new("customers:view"))
            .await
            .unwrap();

        let identity = resolver.resolve(&claims_for(&user)).await.unwrap();
        assert_eq!(identity.user_id, user.id);
        assert!(identity.has_capability(&Capability::new("customers:view")));
        assert!(!identity.has_capability(&Capability::new("customers:edit")));
    }

    #[tokio::test]
    async fn unknown_subject_is_unauthorized() {
        let (_store, resolver, tenant) = setup().await;
        let user = staff_user(tenant.id, "ghost@springfield.example");

        assert_eq!(
            resolver.resolve(&claims_for(&user)).await,
            Err(ResolveError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn deactivated_user_is_unauthorized() {
        let (store, resolver, tenant) = setup().await;
        let mut user = staff_user(tenant.id, "clerk@springfield.example");
        user.deactivate().unwrap();
        store.insert_user(user.clone()).await.unwrap();

        assert_eq!(
            resolver.resolve(&claims_for(&user)).await,
            Err(ResolveError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn suspended_tenant_gates_even_tenant_admins() {
        let (store, resolver, mut tenant) = setup().await;
        let user = User::new(
            UserId::new(),
            Some(tenant.id),
            "boss@springfield.example",
            "$argon2id$stub",
            RoleType::TenantAdmin,
            Utc::now(),
        )
        .unwrap();
        store.insert_user(user.clone()).await.unwrap();

        // Resolves while the tenant is active.
        assert!(resolver.resolve(&claims_for(&user)).await.is_ok());

        tenant.suspend().unwrap();
        store.update_tenant(tenant).await.unwrap();

        assert_eq!(
            resolver.resolve(&claims_for(&user)).await,
            Err(ResolveError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn tenant_mismatch_is_unauthorized() {
        let (store, resolver, tenant) = setup().await;
        let user = staff_user(tenant.id, "clerk@springfield.example");
        store.insert_user(user.clone()).await.unwrap();

        let mut claims = claims_for(&user);
        claims.tenant_id = Some(TenantId::new());

        assert_eq!(
            resolver.resolve(&claims).await,
            Err(ResolveError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn platform_admin_resolves_without_tenant() {
        let (store, resolver, _tenant) = setup().await;
        let admin = User::new(
            UserId::new(),
            None,
            "ops@aquabill.example",
            "$argon2id$stub",
            RoleType::PlatformAdmin,
            Utc::now(),
        )
        .unwrap();
        store.insert_user(admin.clone()).await.unwrap();

        let identity = resolver.resolve(&claims_for(&admin)).await.unwrap();
        assert_eq!(identity.tenant_id, None);
        assert!(identity.has_capability(&Capability::new("anything:at-all")));
    }

    #[tokio::test]
    async fn platform_admin_claims_with_tenant_are_refused() {
        let (store, resolver, tenant) = setup().await;
        let admin = User::new(
            UserId::new(),
            None,
            "ops@aquabill.example",
            "$argon2id$stub",
            RoleType::PlatformAdmin,
            Utc::now(),
        )
        .unwrap();
        store.insert_user(admin.clone()).await.unwrap();

        let mut claims = claims_for(&admin);
        claims.tenant_id = Some(tenant.id);

        assert_eq!(
            resolver.resolve(&claims).await,
            Err(ResolveError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn role_grants_are_loaded_eagerly() {
        let (store, resolver, tenant) = setup().await;

        let mut role =
            aquabill_auth::Role::new(aquabill_core::RoleId::new(), tenant.id, "cashier", None)
                .unwrap();
        role.grant(Capability::new("payments:record"));
        store.insert_role(role.clone()).await.unwrap();

        let mut user = staff_user(tenant.id, "cashier@springfield.example");
        user.role_id = Some(role.id);
        store.insert_user(user.clone()).await.unwrap();

        let identity = resolver.resolve(&claims_for(&user)).await.unwrap();
        assert!(identity.has_capability(&Capability::new("payments:record")));
    }
}
