use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Bearer-token authentication for every protected route.
///
/// Token validation and identity resolution both fail closed to a bare
/// 401 with no distinguishing detail; causes are logged server-side by
/// the codec and the resolver.
pub async fn auth_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?;

    let claims = services
        .codec
        .validate(token)
        .map_err(|_e| StatusCode::UNAUTHORIZED)?;

    let identity = services.resolver.resolve(&claims).await.map_err(|e| match e {
        aquabill_infra::ResolveError::Unauthorized => StatusCode::UNAUTHORIZED,
        aquabill_infra::ResolveError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    })?;

    req.extensions_mut().insert(PrincipalContext::new(identity));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
