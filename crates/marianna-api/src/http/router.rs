//! Axum router configuration with middleware.
//!
//! JSON routes live under `/api/`, stored media is served from `/uploads/`.
//! Middleware: CORS, request tracing, and a body limit sized for one
//! maximum upload plus multipart overhead.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.uploads.max_bytes() + MULTIPART_OVERHEAD_BYTES;
    let uploads = ServeDir::new(state.uploads.root());

    let api_routes = Router::new()
        .route(
            "/conversations",
            get(handlers::conversation::list_conversations)
                .post(handlers::conversation::create_conversation),
        )
        .route(
            "/conversations/{id}",
            delete(handlers::conversation::delete_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            get(handlers::message::list_messages).post(handlers::message::create_message),
        )
        .route(
            "/messages/{id}/reactions",
            post(handlers::reaction::add_reaction),
        )
        .route(
            "/messages/{id}/reactions/{reaction}",
            delete(handlers::reaction::remove_reaction),
        );

    Router::new()
        .nest("/api", api_routes)
        .nest_service("/uploads", uploads)
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
