//! Tenant-scoped role management.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
};

use aquabill_auth::{Capability, Role, is_known_capability};
use aquabill_core::RoleId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_role).get(list_roles))
        .route("/:id/grants", put(update_grants))
        .route("/:id", axum::routing::delete(delete_role))
}

fn validate_grants(codes: &[String]) -> Result<Vec<Capability>, axum::response::Response> {
    let mut grants = Vec::with_capacity(codes.len());
    for code in codes {
        if !is_known_capability(code) {
            return Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "unknown_capability",
                format!("'{code}' is not a seeded capability"),
            ));
        }
        grants.push(Capability::new(code.clone()));
    }
    Ok(grants)
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateRoleRequest>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "roles:manage") {
        return resp;
    }

    let grants = match validate_grants(&body.grants) {
        Ok(g) => g,
        Err(resp) => return resp,
    };

    let mut role = match Role::new(RoleId::new(), tenant_id, body.name, body.description) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };
    role.set_grants(grants);

    if let Err(e) = services.directory.insert_role(role.clone()).await {
        return errors::store_error_to_response(e);
    }

    (StatusCode::CREATED, Json(dto::role_to_json(&role))).into_response()
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "roles:view") {
        return resp;
    }

    match services.directory.list_roles(tenant_id).await {
        Ok(roles) => {
            let items: Vec<_> = roles.iter().map(dto::role_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_grants(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateRoleGrantsRequest>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "roles:manage") {
        return resp;
    }

    let id: RoleId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid role id");
        }
    };
    let grants = match validate_grants(&body.grants) {
        Ok(g) => g,
        Err(resp) => return resp,
    };

    let mut role = match services.directory.role_by_id(tenant_id, id).await {
        Ok(Some(r)) => r,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "role not found"),
        Err(e) => return errors::store_error_to_response(e),
    };

    role.set_grants(grants);
    if let Err(e) = services.directory.update_role(role.clone()).await {
        return errors::store_error_to_response(e);
    }

    (StatusCode::OK, Json(dto::role_to_json(&role))).into_response()
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "roles:manage") {
        return resp;
    }

    let id: RoleId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid role id");
        }
    };

    match services.directory.delete_role(tenant_id, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
