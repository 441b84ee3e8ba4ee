mod schema;

pub use schema::Database;

use serde::{Deserialize, Serialize};

/// Core book row from `books_book`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRow {
    /// Row id.
    pub id: i64,
    /// Project Gutenberg id.
    pub gutenberg_id: i64,
    /// Book title.
    pub title: String,
    /// Download counter.
    pub download_count: i64,
}

/// Author linked to a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRow {
    /// Owning book row id.
    pub book_id: i64,
    /// Author name.
    pub name: String,
    /// Birth year, if known.
    pub birth_year: Option<i32>,
    /// Death year, if known.
    pub death_year: Option<i32>,
}

/// Language code, subject or bookshelf name linked to a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRow {
    /// Owning book row id.
    pub book_id: i64,
    /// Code or name.
    pub name: String,
}

/// Download format of a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRow {
    /// Owning book row id.
    pub book_id: i64,
    /// MIME type, e.g. `text/html; charset=utf-8`.
    pub mime_type: String,
    /// Download URL.
    pub url: String,
}

/// Author data for [`NewBook`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAuthor {
    /// Author name.
    pub name: String,
    /// Birth year.
    pub birth_year: Option<i32>,
    /// Death year.
    pub death_year: Option<i32>,
}

/// A book together with its relations, as loaded into the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBook {
    /// Project Gutenberg id.
    pub gutenberg_id: i64,
    /// Title.
    pub title: String,
    /// Download counter.
    pub download_count: i64,
    /// Authors in display order.
    #[serde(default)]
    pub authors: Vec<NewAuthor>,
    /// Language codes.
    #[serde(default)]
    pub languages: Vec<String>,
    /// Subject names.
    #[serde(default)]
    pub subjects: Vec<String>,
    /// Bookshelf names.
    #[serde(default)]
    pub bookshelves: Vec<String>,
    /// `(mime_type, url)` pairs.
    #[serde(default)]
    pub formats: Vec<(String, String)>,
}
