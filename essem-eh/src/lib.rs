//! essem-eh library - Essence Event Handler module
//!
//! Consumes essence lifecycle events (linked / unlinked / deleted) from the
//! broker, confirms linked essences against the media repository, and
//! republishes a get-metadata request for every qualifying linked event.

use axum::Router;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod classify;
pub mod decision;
pub mod dispatch;
pub mod outbound;
pub mod services;

/// Build the application router (health endpoint only)
pub fn build_router() -> Router {
    Router::new()
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
}
