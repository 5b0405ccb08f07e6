//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, body limits,
//! the REST handlers and the `/ws` relay endpoint.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use parley_core::error::ParleyError;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Browser clients are served from the same host and port.
    let port = state.config.server.port;
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ]
    .iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let api_routes = Router::new()
        .route("/chat-session", post(handlers::create_session))
        .route("/messages/{session_id}", get(handlers::get_messages))
        .route(
            "/settings/{user_id}",
            get(handlers::get_settings)
                .post(handlers::update_settings)
                .layer(DefaultBodyLimit::max(64 * 1024)), // 64KB for settings
        )
        .route("/status", get(handlers::status))
        .route("/chat", post(handlers::chat));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(ws::ws_upgrade))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB global limit
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind the configured address and serve until the process exits.
pub async fn start_server(state: AppState) -> Result<(), ParleyError> {
    let addr = state.config.server.bind_addr();
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ParleyError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Starting API server on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| ParleyError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
