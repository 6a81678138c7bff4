//! `aquabill-infra` — storage adapters and store-backed authorization
//! services.
//!
//! The domain crates stay IO-free; this crate supplies the repository
//! traits, their in-memory and Postgres implementations, and the two
//! store-backed cores: the identity resolver (with the tenant gate) and
//! the quota guard.

pub mod bootstrap;
pub mod quota;
pub mod resolver;
pub mod store;

pub use quota::{QuotaError, QuotaGuard};
pub use resolver::{IdentityResolver, ResolveError};
pub use store::{
    AuthorizationBundle, BillingStore, CustomerStore, DirectoryStore, InMemoryStore,
    PostgresStore, StoreError, TenantStore,
};
