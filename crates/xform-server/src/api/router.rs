//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::{AllowedOrigins, Config, CorsConfig};
use crate::error::{Result, ServerError};
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, config: &Config) -> Result<Router> {
    let api_routes = Router::new()
        .route("/evaluate", post(handlers::evaluate))
        .route("/engines", get(handlers::list_engines));

    Ok(Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health_check))
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors)?)
        .with_state(state))
}

/// Build the CORS layer from the configured allow-list
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer> {
    let origin = match config.origins() {
        AllowedOrigins::Any => AllowOrigin::from(Any),
        AllowedOrigins::List(origins) => {
            let values = origins
                .iter()
                .map(|origin| {
                    HeaderValue::from_str(origin).map_err(|e| {
                        ServerError::config(format!("Invalid CORS origin '{}': {}", origin, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            AllowOrigin::list(values)
        }
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any))
}
