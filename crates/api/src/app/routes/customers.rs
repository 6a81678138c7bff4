//! Customer/meter management (tenant scope).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use aquabill_core::CustomerId;
use aquabill_metering::{Customer, CustomerStatus};
use aquabill_tenancy::CountedResource;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_customer).get(list_customers))
        .route("/:id", get(get_customer).put(update_customer))
}

pub async fn create_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateCustomerRequest>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "customers:create") {
        return resp;
    }

    // Customer quota: check against the live count before the insert.
    if let Err(e) = services
        .quota
        .admit(tenant_id, CountedResource::CustomerOrMeter, 1, Utc::now())
        .await
    {
        return errors::quota_error_to_response(e);
    }

    let mut customer = match Customer::new(
        CustomerId::new(),
        tenant_id,
        body.full_name,
        body.meter_serial,
        body.service_address,
        Utc::now(),
    ) {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };
    customer.phone = body.phone;

    if let Err(e) = services.customers.insert_customer(customer.clone()).await {
        return errors::store_error_to_response(e);
    }

    (StatusCode::CREATED, Json(dto::customer_to_json(&customer))).into_response()
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "customers:view") {
        return resp;
    }

    match services.customers.list_customers(tenant_id).await {
        Ok(customers) => {
            let items: Vec<_> = customers.iter().map(dto::customer_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "customers:view") {
        return resp;
    }

    let id: CustomerId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid customer id");
        }
    };

    match services.customers.customer_by_id(tenant_id, id).await {
        Ok(Some(customer)) => {
            (StatusCode::OK, Json(dto::customer_to_json(&customer))).into_response()
        }
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "customer not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateCustomerRequest>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "customers:edit") {
        return resp;
    }

    let id: CustomerId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid customer id");
        }
    };

    let mut customer = match services.customers.customer_by_id(tenant_id, id).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "customer not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    if let Some(full_name) = body.full_name {
        if full_name.trim().is_empty() {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "customer name cannot be empty",
            );
        }
        customer.full_name = full_name.trim().to_string();
    }
    if let Some(address) = body.service_address {
        customer.service_address = address.trim().to_string();
    }
    if let Some(phone) = body.phone {
        customer.phone = Some(phone);
    }
    if let Some(disconnected) = body.disconnected {
        customer.status = if disconnected {
            CustomerStatus::Disconnected
        } else {
            CustomerStatus::Active
        };
    }

    if let Err(e) = services.customers.update_customer(customer.clone()).await {
        return errors::store_error_to_response(e);
    }

    (StatusCode::OK, Json(dto::customer_to_json(&customer))).into_response()
}
