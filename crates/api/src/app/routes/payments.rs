//! Payment recording (tenant scope).
//!
//! Recording is the transaction-counted operation: quota check first,
//! then the payment insert and the invoice reconciliation in one store
//! transaction.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;

use aquabill_billing::Payment;
use aquabill_core::{CustomerId, InvoiceId, PaymentId};
use aquabill_tenancy::CountedResource;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", post(record_payment).get(list_payments))
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "payments:record") {
        return resp;
    }

    let customer_id: CustomerId = match body.customer_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid customer id");
        }
    };
    let invoice_id = match body.invoice_id.as_deref() {
        Some(raw) => match raw.parse::<InvoiceId>() {
            Ok(v) => Some(v),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid invoice id",
                );
            }
        },
        None => None,
    };
    let method = match errors::parse_payment_method(&body.method) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    match services.customers.customer_by_id(tenant_id, customer_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "customer not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    }

    let now = Utc::now();

    // Monthly transaction quota: re-reads the count for the current window.
    if let Err(e) = services
        .quota
        .admit(tenant_id, CountedResource::Transaction, 1, now)
        .await
    {
        return errors::quota_error_to_response(e);
    }

    let payment = match Payment::record(
        PaymentId::new(),
        tenant_id,
        customer_id,
        invoice_id,
        body.amount_cents,
        method,
        Some(identity.user_id),
        now,
    ) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.billing.record_payment(payment.clone()).await {
        Ok(updated_invoice) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "payment": dto::payment_to_json(&payment),
                "invoice": updated_invoice.map(|i| dto::invoice_to_json(&i)),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let identity = principal.identity();
    let tenant_id = match authz::require_tenant(identity) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_capability(identity, "payments:view") {
        return resp;
    }

    match services.billing.list_payments(tenant_id).await {
        Ok(payments) => {
            let items: Vec<_> = payments.iter().map(dto::payment_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
