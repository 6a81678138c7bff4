//! Platform-scope tenant administration.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use aquabill_core::TenantId;
use aquabill_tenancy::Tenant;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_tenant).get(list_tenants))
        .route("/:id", get(get_tenant).delete(delete_tenant))
        .route("/:id/activate", post(activate_tenant))
        .route("/:id/suspend", post(suspend_tenant))
}

pub async fn create_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateTenantRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_platform_admin(principal.identity()) {
        return resp;
    }

    let plan = match errors::parse_plan(&body.plan) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    let mut tenant = match Tenant::new(
        TenantId::new(),
        body.slug,
        body.display_name,
        plan,
        Utc::now(),
    ) {
        Ok(t) => t,
        Err(e) => return errors::domain_error_to_response(e),
    };
    tenant.max_staff = body.max_staff;
    tenant.max_customers = body.max_customers;
    tenant.max_transactions = body.max_transactions;

    if let Err(e) = services.tenants.insert_tenant(tenant.clone()).await {
        return errors::store_error_to_response(e);
    }

    (StatusCode::CREATED, Json(dto::tenant_to_json(&tenant))).into_response()
}

pub async fn list_tenants(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_platform_admin(principal.identity()) {
        return resp;
    }

    match services.tenants.list_tenants().await {
        Ok(tenants) => {
            let items: Vec<_> = tenants.iter().map(dto::tenant_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_platform_admin(principal.identity()) {
        return resp;
    }

    let id: TenantId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tenant id");
        }
    };

    match services.tenants.tenant_by_id(id).await {
        Ok(Some(tenant)) => (StatusCode::OK, Json(dto::tenant_to_json(&tenant))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "tenant not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn transition_tenant(
    services: &AppServices,
    id: &str,
    apply: impl FnOnce(&mut Tenant) -> Result<(), aquabill_core::DomainError>,
) -> axum::response::Response {
    let id: TenantId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tenant id");
        }
    };

    let mut tenant = match services.tenants.tenant_by_id(id).await {
        Ok(Some(t)) => t,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "tenant not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    if let Err(e) = apply(&mut tenant) {
        return errors::domain_error_to_response(e);
    }
    if let Err(e) = services.tenants.update_tenant(tenant.clone()).await {
        return errors::store_error_to_response(e);
    }

    (StatusCode::OK, Json(dto::tenant_to_json(&tenant))).into_response()
}

pub async fn activate_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_platform_admin(principal.identity()) {
        return resp;
    }
    transition_tenant(&services, &id, |t| t.activate()).await
}

pub async fn suspend_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_platform_admin(principal.identity()) {
        return resp;
    }
    transition_tenant(&services, &id, |t| t.suspend()).await
}

pub async fn delete_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_platform_admin(principal.identity()) {
        return resp;
    }

    let id: TenantId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tenant id");
        }
    };

    match services.tenants.delete_tenant(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
