//! HTTP API application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: infrastructure wiring (stores, token codec, resolver,
//!   quota guard)
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get, routing::post};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router over prepared services.
///
/// Split from service construction so tests can seed the store before
/// mounting the router.
pub fn build_router(services: Arc<AppServices>) -> Router {
    // Protected routes: token + resolved identity required.
    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            services.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/auth/login", post(routes::auth::login))
        .layer(Extension(services))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
