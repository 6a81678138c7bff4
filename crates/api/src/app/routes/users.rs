//! Staff account management (tenant scope).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
};
use chrono::Utc;

use aquabill_auth::{Capability, User, hash_password, is_known_capability};
use aquabill_core::{RoleId, UserId};
use aquabill_tenancy::CountedResource;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_user).get(list_users))
        .route("/:id", delete(delete_user))
        .route("/:id/deactivate", post(deactivate_user))
        .route("/:id/permissions", post(grant_permission))
        .route("/:id/permissions/:capability", delete(revoke_permission))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateUserRequest>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "users:create") {
        return resp;
    }

    let role_type = match errors::parse_staff_role_type(&body.role_type) {
        Ok(rt) => rt,
        Err(resp) => return resp,
    };

    let role_id = match body.role_id.as_deref() {
        Some(raw) => match raw.parse::<RoleId>() {
            Ok(rid) => match services.directory.role_by_id(tenant_id, rid).await {
                Ok(Some(_)) => Some(rid),
                Ok(None) => {
                    return errors::json_error(
                        StatusCode::NOT_FOUND,
                        "not_found",
                        "role not found",
                    );
                }
                Err(e) => return errors::store_error_to_response(e),
            },
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid role id");
            }
        },
        None => None,
    };

    // Staff quota: check against the live count before the insert.
    if let Err(e) = services
        .quota
        .admit(tenant_id, CountedResource::Staff, 1, Utc::now())
        .await
    {
        return errors::quota_error_to_response(e);
    }

    let password_hash = match hash_password(&body.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(error = %e, "password hashing failed");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "credential_error",
                "could not create user",
            );
        }
    };

    let mut user = match User::new(
        UserId::new(),
        Some(tenant_id),
        body.email,
        password_hash,
        role_type,
        Utc::now(),
    ) {
        Ok(u) => u,
        Err(e) => return errors::domain_error_to_response(e),
    };
    user.username = body.username;
    user.role_id = role_id;

    if let Err(e) = services.directory.insert_user(user.clone()).await {
        return errors::store_error_to_response(e);
    }

    (StatusCode::CREATED, Json(dto::user_to_json(&user))).into_response()
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "users:view") {
        return resp;
    }

    match services.directory.list_users(tenant_id).await {
        Ok(users) => {
            let items: Vec<_> = users.iter().map(dto::user_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "users:edit") {
        return resp;
    }

    let id: UserId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id");
        }
    };
    if id == identity.user_id {
        return errors::json_error(
            StatusCode::CONFLICT,
            "conflict",
            "cannot deactivate your own account",
        );
    }

    let mut user = match services.directory.user_by_id(id).await {
        Ok(Some(u)) if u.belongs_to(tenant_id) => u,
        Ok(_) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
        Err(e) => return errors::store_error_to_response(e),
    };

    if let Err(e) = user.deactivate() {
        return errors::domain_error_to_response(e);
    }
    if let Err(e) = services.directory.update_user(user.clone()).await {
        return errors::store_error_to_response(e);
    }

    (StatusCode::OK, Json(dto::user_to_json(&user))).into_response()
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "users:delete") {
        return resp;
    }

    let id: UserId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id");
        }
    };
    if id == identity.user_id {
        return errors::json_error(
            StatusCode::CONFLICT,
            "conflict",
            "cannot delete your own account",
        );
    }

    match services.directory.delete_user(tenant_id, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn grant_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::GrantPermissionRequest>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "users:edit") {
        return resp;
    }

    if !is_known_capability(&body.capability) {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_capability",
            format!("'{}' is not a seeded capability", body.capability),
        );
    }

    let id: UserId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id");
        }
    };

    // Direct grants are tenant-scoped through the user row.
    match services.directory.user_by_id(id).await {
        Ok(Some(u)) if u.belongs_to(tenant_id) => {}
        Ok(_) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
        Err(e) => return errors::store_error_to_response(e),
    }

    match services
        .directory
        .grant_direct(id, Capability::new(body.capability))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn revoke_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, capability)): Path<(String, String)>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "users:edit") {
        return resp;
    }

    let id: UserId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id");
        }
    };

    match services.directory.user_by_id(id).await {
        Ok(Some(u)) if u.belongs_to(tenant_id) => {}
        Ok(_) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
        Err(e) => return errors::store_error_to_response(e),
    }

    match services
        .directory
        .revoke_direct(id, &Capability::new(capability))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
