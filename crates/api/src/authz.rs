//! API-side authorization guards.
//!
//! These enforce capability checks at the handler boundary (before any
//! store access), while keeping domain crates and infra auth-agnostic.
//! Denial bodies never reveal whether a resource exists versus whether the
//! caller lacks permission on it.

use axum::http::StatusCode;
use axum::response::Response;

use aquabill_auth::{Capability, ResolvedIdentity, RoleType, authorize};
use aquabill_core::TenantId;

use crate::app::errors;

/// Check a required capability for the current principal.
///
/// Intended to be called first in every mutating or listing handler; an
/// endpoint with no check is a policy bug, not an open endpoint.
pub fn require_capability(identity: &ResolvedIdentity, code: &str) -> Result<(), Response> {
    authorize(identity, &Capability::new(code.to_string())).map_err(|e| {
        tracing::info!(user_id = %identity.user_id, capability = code, "request forbidden");
        errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string())
    })
}

/// Tenant context of the current principal.
///
/// Platform admins carry no tenant and cannot act on tenant-scoped routes.
pub fn require_tenant(identity: &ResolvedIdentity) -> Result<TenantId, Response> {
    identity.tenant_id.ok_or_else(|| {
        errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "this endpoint requires a tenant context",
        )
    })
}

/// Platform scope: reserved for platform admins, never tenant admins.
pub fn require_platform_admin(identity: &ResolvedIdentity) -> Result<(), Response> {
    if identity.role_type == RoleType::PlatformAdmin && identity.tenant_id.is_none() {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "platform scope required",
        ))
    }
}
