use axum::{routing::get, routing::post, routing::put, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::coordinator::CoordinatorHandle;

use super::api::control as control_handlers;
use super::api::telemetry as telemetry_handlers;
use super::api_doc::ApiDoc;
use super::auth::AppState;

pub fn router(config: Arc<Config>, coordinator: CoordinatorHandle) -> Router {
    let state = AppState {
        config,
        coordinator,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Control API endpoints
        .route("/api/control/enable", post(control_handlers::enable))
        .route("/api/control/disable", post(control_handlers::disable))
        .route(
            "/api/control/reset_fault",
            post(control_handlers::reset_fault),
        )
        .route("/api/algorithm", put(control_handlers::configure))
        .route("/api/status", get(control_handlers::status))
        // Telemetry ingress
        .route(
            "/api/telemetry/telescope",
            post(telemetry_handlers::telescope),
        )
        .route("/api/telemetry/dome", post(telemetry_handlers::dome))
        .route("/api/telemetry/failure", post(telemetry_handlers::failure))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(
    bind_addr: String,
    config: Arc<Config>,
    coordinator: CoordinatorHandle,
) -> std::io::Result<()> {
    let app = router(config, coordinator);

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await
}
