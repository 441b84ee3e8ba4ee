//! guten-books: a read API over a public-domain book catalog.
//!
//! Serves a filtered, paginated JSON listing of books backed by a
//! relational catalog of titles, authors, languages, subjects, bookshelves
//! and download formats, plus a small browsing page.
//!
//! # Features
//!
//! - Comma-separated filters on ids, languages, MIME types, topics and authors
//! - Title and multi-word title-or-author search
//! - Stable pagination by download count with `next`/`previous` links
//! - Genre listing from bookshelves

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Book listing: filters, SQL assembly and response shaping.
pub mod catalog;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// HTTP server.
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
