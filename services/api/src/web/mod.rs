pub mod protocol;
pub mod report_task;
pub mod rest;
pub mod state;
pub mod views;
pub mod ws_handler;

use crate::error::ApiError;
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{delete, get, post},
    Router,
};
use rest::{
    citations_handler, create_session_handler, dashboard_handler, get_usage_handler,
    remove_upload_handler, reset_handler, stage_uploads_handler, submit_report_handler, ApiDoc,
};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use ws_handler::ws_handler;

/// Builds the complete application: REST routes, the progress socket and Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS origin: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let api_router = Router::new()
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{id}/usage", get(get_usage_handler))
        .route("/sessions/{id}/uploads", post(stage_uploads_handler))
        .route("/sessions/{id}/uploads/{name}", delete(remove_upload_handler))
        .route("/sessions/{id}/reports", post(submit_report_handler))
        .route("/sessions/{id}/dashboard", get(dashboard_handler))
        .route("/sessions/{id}/reset", post(reset_handler))
        .route("/results/{id}/citations", get(citations_handler))
        .route("/ws/{id}", get(ws_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
