//! HTTP server and routes.

mod handlers;
mod openapi;
mod state;

pub use state::AppState;

use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/books", get(handlers::api_books))
        .route("/genres", get(handlers::api_genres))
        .route("/openapi.json", get(handlers::api_openapi));

    Router::new()
        .route("/", get(handlers::index))
        .route("/genre/{genre}", get(handlers::index))
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
