use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let identity = principal.identity();
    Json(serde_json::json!({
        "user_id": identity.user_id.to_string(),
        "tenant_id": identity.tenant_id.map(|t| t.to_string()),
        "email": identity.email,
        "role_type": identity.role_type.as_str(),
    }))
}
