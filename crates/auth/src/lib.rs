//! `aquabill-auth` — pure authentication/authorization boundary (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod capability;
pub mod claims;
pub mod identity;
pub mod password;
pub mod roles;
pub mod token;
pub mod user;

pub use capability::{Capability, CapabilityDef, capability_catalog, is_known_capability};
pub use claims::{Claims, TokenValidationError, validate_claims};
pub use identity::{AuthzError, ResolvedIdentity, authorize};
pub use password::{CredentialError, hash_password, verify_password};
pub use roles::{Role, RoleType};
pub use token::{SessionSubject, TOKEN_TTL_DAYS, TokenCodec, TokenError};
pub use user::User;
