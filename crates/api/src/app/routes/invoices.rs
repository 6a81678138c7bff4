//! Invoice issuance and inspection (tenant scope).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use aquabill_billing::Invoice;
use aquabill_core::{CustomerId, InvoiceId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(issue_invoice).get(list_invoices))
        .route("/:id", get(get_invoice))
}

pub async fn issue_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::IssueInvoiceRequest>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "invoices:create") {
        return resp;
    }

    let customer_id: CustomerId = match body.customer_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid customer id");
        }
    };
    let due_date = match chrono::DateTime::parse_from_rfc3339(&body.due_date) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_due_date",
                "due_date must be RFC3339",
            );
        }
    };

    match services.customers.customer_by_id(tenant_id, customer_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "customer not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    }

    let invoice = match Invoice::issue(
        InvoiceId::new(),
        tenant_id,
        customer_id,
        body.amount_cents,
        due_date,
        Utc::now(),
    ) {
        Ok(i) => i,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = services.billing.insert_invoice(invoice.clone()).await {
        return errors::store_error_to_response(e);
    }

    (StatusCode::CREATED, Json(dto::invoice_to_json(&invoice))).into_response()
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "invoices:view") {
        return resp;
    }

    match services.billing.list_invoices(tenant_id).await {
        Ok(invoices) => {
            let now = Utc::now();
            let items: Vec<_> = invoices
                .into_iter()
                .map(|mut i| {
                    i.refresh_overdue(now);
                    dto::invoice_to_json(&i)
                })
                .collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "invoices:view") {
        return resp;
    }

    let id: InvoiceId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };

    match services.billing.invoice_by_id(tenant_id, id).await {
        Ok(Some(mut invoice)) => {
            invoice.refresh_overdue(Utc::now());
            (StatusCode::OK, Json(dto::invoice_to_json(&invoice))).into_response()
        }
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}
