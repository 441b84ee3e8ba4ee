//! HTTP request handlers.

use crate::catalog::{self, BookFilter, BookPage, BooksQuery, GenreList};
use crate::error::{AppError, Result};
use crate::server::{AppState, openapi};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, Uri, header},
    response::Html,
};
use serde::Serialize;

/// Browsing page, with the configured title substituted in.
const INDEX_HTML: &str = include_str!("index.html");

// ============================================================================
// WEB PAGES
// ============================================================================

/// Single-page browsing client.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(INDEX_HTML.replace("{{title}}", &escape_html(&state.config.server.title)))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// CATALOG API
// ============================================================================

/// API: Filtered, paginated book listing.
pub async fn api_books(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<BookPage>> {
    let raw: BooksQuery = pairs.into_iter().collect();
    let filter = BookFilter::from_query(&raw);
    tracing::debug!(?filter, "Book listing request");

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok());
    let endpoint = format!("{}/api/books", state.base_url(host));

    let page = catalog::list_books(&state.db, &raw, &filter, &endpoint)?;
    Ok(Json(page))
}

/// API: Bookshelf names.
pub async fn api_genres(State(state): State<AppState>) -> Result<Json<GenreList>> {
    Ok(Json(catalog::list_genres(&state.db)?))
}

/// API: OpenAPI description of the catalog endpoints.
pub async fn api_openapi(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(openapi::document(&state.config.server.title))
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    books: i64,
}

/// Liveness probe that also checks the catalog is readable.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "ok",
        books: state.db.book_count()?,
    }))
}

/// Unknown route.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
