//! Benchmarks for the per-request authorization hot path: token
//! validation, identity resolution, and quota admission.

use std::sync::Arc;

use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use aquabill_auth::{Capability, Claims, RoleType, SessionSubject, TokenCodec, User};
use aquabill_core::{CustomerId, TenantId, UserId};
use aquabill_infra::{
    CustomerStore as _, DirectoryStore as _, IdentityResolver, InMemoryStore, QuotaGuard,
    TenantStore as _,
};
use aquabill_metering::Customer;
use aquabill_tenancy::{CeilingOverride, CountedResource, SubscriptionPlan, Tenant};

fn bench_token_validate(c: &mut Criterion) {
    let codec = TokenCodec::new(b"bench-secret");
    let token = codec
        .issue(
            &SessionSubject {
                user_id: UserId::new(),
                tenant_id: Some(TenantId::new()),
                role_type: RoleType::Staff,
                role_id: None,
                email: "clerk@springfield.example".to_string(),
            },
            Utc::now(),
        )
        .expect("issue");

    c.bench_function("token_validate", |b| {
        b.iter(|| codec.validate(&token).expect("validate"))
    });
}

fn seeded_store(rt: &Runtime) -> (Arc<InMemoryStore>, Tenant, User) {
    let store = Arc::new(InMemoryStore::new());

    let mut tenant = Tenant::new(
        TenantId::new(),
        "springfield-water",
        "Springfield Water Co.",
        SubscriptionPlan::Standard,
        Utc::now(),
    )
    .expect("tenant");
    tenant.activate().expect("activate");
    tenant.max_customers = CeilingOverride::Limit(5_000);

    let user = User::new(
        UserId::new(),
        Some(tenant.id),
        "clerk@springfield.example",
        "$argon2id$stub",
        RoleType::Staff,
        Utc::now(),
    )
    .expect("user");

    rt.block_on(async {
        store.insert_tenant(tenant.clone()).await.expect("tenant");
        store.insert_user(user.clone()).await.expect("user");
        store
            .grant_direct(user.id, Capability::new("customers:view"))
            .await
            .expect("grant");
        for i in 0..500 {
            store
                .insert_customer(
                    Customer::new(
                        CustomerId::new(),
                        tenant.id,
                        "Amina Diallo",
                        format!("MTR-{i:04}"),
                        "12 Borehole Rd",
                        Utc::now(),
                    )
                    .expect("customer"),
                )
                .await
                .expect("insert");
        }
    });

    (store, tenant, user)
}

fn bench_resolve(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let (store, _tenant, user) = seeded_store(&rt);
    let resolver = IdentityResolver::new(store.clone(), store.clone());

    let claims = Claims {
        sub: user.id,
        tenant_id: user.tenant_id,
        role_type: user.role_type,
        role_id: None,
        email: user.email.clone(),
        iat: Utc::now().timestamp(),
        exp: Utc::now().timestamp() + 3600,
    };

    c.bench_function("identity_resolve", |b| {
        b.iter(|| {
            rt.block_on(resolver.resolve(&claims)).expect("resolve");
        })
    });
}

fn bench_quota_admit(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let (store, tenant, _user) = seeded_store(&rt);
    let guard = QuotaGuard::new(store.clone(), store.clone(), store.clone(), store.clone());

    c.bench_function("quota_admit_customer", |b| {
        b.iter(|| {
            rt.block_on(guard.admit(
                tenant.id,
                CountedResource::CustomerOrMeter,
                1,
                Utc::now(),
            ))
            .expect("admit");
        })
    });
}

criterion_group!(benches, bench_token_validate, bench_resolve, bench_quota_admit);
criterion_main!(benches);
