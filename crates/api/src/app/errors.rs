use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use aquabill_auth::RoleType;
use aquabill_billing::PaymentMethod;
use aquabill_core::DomainError;
use aquabill_infra::{QuotaError, StoreError};
use aquabill_tenancy::SubscriptionPlan;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::ReferentialConflict(msg) => {
            json_error(StatusCode::CONFLICT, "referential_conflict", msg)
        }
        DomainError::PermissionDenied(msg) => {
            json_error(StatusCode::FORBIDDEN, "forbidden", msg)
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::ReferentialConflict(msg) => {
            json_error(StatusCode::CONFLICT, "referential_conflict", msg)
        }
        StoreError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "store backend failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "storage failure",
            )
        }
    }
}

/// Quota denials are routine business conditions: 403 with an actionable
/// message (which limit, which ceiling).
pub fn quota_error_to_response(err: QuotaError) -> axum::response::Response {
    match err {
        QuotaError::Exceeded(e) => {
            json_error(StatusCode::FORBIDDEN, "quota_exceeded", e.to_string())
        }
        QuotaError::TenantNotFound => {
            json_error(StatusCode::NOT_FOUND, "not_found", "not found")
        }
        QuotaError::Store(e) => store_error_to_response(e),
    }
}

pub fn parse_plan(s: &str) -> Result<SubscriptionPlan, axum::response::Response> {
    match s {
        "basic" => Ok(SubscriptionPlan::Basic),
        "standard" => Ok(SubscriptionPlan::Standard),
        "premium" => Ok(SubscriptionPlan::Premium),
        "enterprise" => Ok(SubscriptionPlan::Enterprise),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_plan",
            "plan must be one of: basic, standard, premium, enterprise",
        )),
    }
}

pub fn parse_payment_method(s: &str) -> Result<PaymentMethod, axum::response::Response> {
    match s {
        "cash" => Ok(PaymentMethod::Cash),
        "bank_transfer" => Ok(PaymentMethod::BankTransfer),
        "mobile_money" => Ok(PaymentMethod::MobileMoney),
        "card" => Ok(PaymentMethod::Card),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_method",
            "method must be one of: cash, bank_transfer, mobile_money, card",
        )),
    }
}

/// Role types assignable through the staff endpoint. Platform admins are
/// provisioned by bootstrap only.
pub fn parse_staff_role_type(s: &str) -> Result<RoleType, axum::response::Response> {
    match s {
        "tenant_admin" => Ok(RoleType::TenantAdmin),
        "staff" => Ok(RoleType::Staff),
        "collector" => Ok(RoleType::Collector),
        "accountant" => Ok(RoleType::Accountant),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_role_type",
            "role_type must be one of: tenant_admin, staff, collector, accountant",
        )),
    }
}
