use axum::{Router, routing::get};

pub mod auth;
pub mod customers;
pub mod invoices;
pub mod payments;
pub mod roles;
pub mod system;
pub mod tenants;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/platform/tenants", tenants::router())
        .nest("/users", users::router())
        .nest("/roles", roles::router())
        .nest("/customers", customers::router())
        .nest("/invoices", invoices::router())
        .nest("/payments", payments::router())
}
