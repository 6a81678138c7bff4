use aquabill_infra::bootstrap::{self, BootstrapConfig};

#[tokio::main]
async fn main() {
    aquabill_observability::init();

    // A wrongly configured signing secret is the one startup condition that
    // halts the process; release builds refuse to run without one.
    let jwt_secret = match std::env::var("JWT_SECRET") {
        Ok(s) if !s.trim().is_empty() => s,
        _ if cfg!(debug_assertions) => {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        }
        _ => {
            tracing::error!("JWT_SECRET must be set in production builds");
            std::process::exit(1);
        }
    };

    let database_url = std::env::var("DATABASE_URL").ok();
    let services = aquabill_api::app::build_services(&jwt_secret, database_url.as_deref())
        .await
        .expect("failed to build services");

    bootstrap::seed_reference_data(services.tenants.clone())
        .await
        .expect("reference data seeding failed");

    match std::env::var("ADMIN_PASSWORD") {
        Ok(admin_password) if !admin_password.is_empty() => {
            let config = BootstrapConfig {
                admin_email: std::env::var("ADMIN_EMAIL")
                    .unwrap_or_else(|_| "admin@aquabill.local".to_string()),
                admin_password,
            };
            bootstrap::ensure_platform_admin(services.directory.clone(), &config)
                .await
                .expect("bootstrap failed");
        }
        _ => {
            tracing::warn!("ADMIN_PASSWORD not set; skipping platform admin reconciliation");
        }
    }

    let app = aquabill_api::app::build_router(services);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
