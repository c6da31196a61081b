//! Profile picture service.
//!
//! - `config`: environment-driven settings, read once at startup
//! - `error`: request error kinds and their HTTP mapping
//! - `imaging`: upload validation and JPEG normalization
//! - `store`: capability traits the handlers depend on
//! - `directory`: MySQL-backed username lookup
//! - `routes`: axum handlers and shared state

pub mod config;
pub mod directory;
pub mod error;
pub mod imaging;
pub mod routes;
pub mod store;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routes::AppState;

/// Request body cap. Sits above the image limit so oversize files still reach
/// the size check and get its message.
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Assemble the HTTP router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/profile-picture/{user_id}",
            get(routes::get_profile_picture).post(routes::upload_profile_picture),
        )
        .route("/api/user-id", get(routes::get_user_id))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
