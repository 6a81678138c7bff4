//! Login: credentials → session token.

use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use chrono::Utc;

use aquabill_auth::{SessionSubject, verify_password};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Every login failure — unknown email, wrong password, deactivated user,
/// suspended tenant — collapses to the same 401 body, so probing cannot
/// distinguish accounts or tenant states. Causes are logged server-side.
fn invalid_credentials() -> axum::response::Response {
    errors::json_error(
        StatusCode::UNAUTHORIZED,
        "invalid_credentials",
        "invalid credentials",
    )
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let email = body.email.trim().to_lowercase();

    let user = match services.directory.user_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::info!("login refused: unknown email");
            return invalid_credentials();
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    match verify_password(&body.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(user_id = %user.id, "login refused: wrong password");
            return invalid_credentials();
        }
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "login failed: credential fault");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "credential_error",
                "login unavailable",
            );
        }
    }

    if !user.is_active {
        tracing::info!(user_id = %user.id, "login refused: user deactivated");
        return invalid_credentials();
    }

    if let Some(tenant_id) = user.tenant_id {
        match services.tenants.tenant_by_id(tenant_id).await {
            Ok(Some(tenant)) if tenant.is_active() => {}
            Ok(_) => {
                tracing::info!(user_id = %user.id, %tenant_id, "login refused: tenant not active");
                return invalid_credentials();
            }
            Err(e) => return errors::store_error_to_response(e),
        }
    }

    let subject = SessionSubject {
        user_id: user.id,
        tenant_id: user.tenant_id,
        role_type: user.role_type,
        role_id: user.role_id,
        email: user.email.clone(),
    };

    match services.codec.issue(&subject, Utc::now()) {
        Ok(token) => (
            StatusCode::OK,
            Json(serde_json::json!({ "token": token })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "token issuance failed");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "token_error",
                "login unavailable",
            )
        }
    }
}
