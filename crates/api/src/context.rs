use aquabill_auth::ResolvedIdentity;

/// Authenticated principal for a request.
///
/// Inserted by the auth middleware after token validation and identity
/// resolution; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext(ResolvedIdentity);

impl PrincipalContext {
    pub fn new(identity: ResolvedIdentity) -> Self {
        Self(identity)
    }

    pub fn identity(&self) -> &ResolvedIdentity {
        &self.0
    }
}
