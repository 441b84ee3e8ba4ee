//! Book listing: filter parsing, query assembly and response shaping.

pub mod filter;
pub mod query;

pub use filter::{BookFilter, BooksQuery, MAX_LIMIT};
pub use query::BookQuery;

use crate::db::{AuthorRow, Database, FormatRow, NameRow};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Author as rendered in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Author name.
    pub name: String,
    /// Birth year.
    pub birth_year: Option<i32>,
    /// Death year.
    pub death_year: Option<i32>,
}

/// Downloadable representation of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    /// MIME type.
    pub mime_type: String,
    /// Download URL.
    pub url: String,
}

/// One book in a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSummary {
    /// Gutenberg id.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Authors in link order.
    pub authors: Vec<Author>,
    /// First bookshelf, else first subject.
    pub genre: Option<String>,
    /// Language codes.
    pub languages: Vec<String>,
    /// Subject names.
    pub subjects: Vec<String>,
    /// Bookshelf names.
    pub bookshelves: Vec<String>,
    /// Download counter.
    pub downloads: i64,
    /// Available formats.
    pub download_links: Vec<DownloadLink>,
}

/// Paginated `/api/books` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookPage {
    /// Number of matching books across all pages.
    pub count: i64,
    /// URL of the next page.
    pub next: Option<String>,
    /// URL of the previous page.
    pub previous: Option<String>,
    /// Books on this page.
    pub results: Vec<BookSummary>,
}

/// `/api/genres` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreList {
    /// Number of genres.
    pub count: usize,
    /// Bookshelf names, alphabetically.
    pub results: Vec<String>,
}

/// Derive a genre: first bookshelf, otherwise first subject.
pub fn derive_genre(bookshelves: &[String], subjects: &[String]) -> Option<String> {
    bookshelves.first().or_else(|| subjects.first()).cloned()
}

/// Run a filtered, paginated listing.
///
/// `endpoint` is the absolute URL of the listing (e.g.
/// `http://host/api/books`), used for the `next` and `previous` links.
pub fn list_books(
    db: &Database,
    raw: &BooksQuery,
    filter: &BookFilter,
    endpoint: &str,
) -> Result<BookPage> {
    let query = BookQuery::from_filter(filter);

    let count = db.count_books(&query)?;
    let page_ids = db.page_book_ids(&query, filter.limit, filter.offset())?;

    tracing::debug!(
        count,
        page = filter.page,
        limit = filter.limit,
        returned = page_ids.len(),
        "Listed books"
    );

    let next = filter
        .has_next(count)
        .then(|| page_url(endpoint, raw, filter.limit, filter.page + 1));
    let previous = filter
        .has_previous()
        .then(|| page_url(endpoint, raw, filter.limit, filter.page - 1));

    let results = if page_ids.is_empty() {
        Vec::new()
    } else {
        assemble_page(db, &page_ids)?
    };

    Ok(BookPage {
        count,
        next,
        previous,
        results,
    })
}

/// Batch-load relations for a page and build summaries in page order.
fn assemble_page(db: &Database, page_ids: &[i64]) -> Result<Vec<BookSummary>> {
    let books: HashMap<i64, _> = db
        .get_books(page_ids)?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();

    let mut authors_by_book = group_by_book(db.get_authors(page_ids)?, |a: AuthorRow| {
        (
            a.book_id,
            Author {
                name: a.name,
                birth_year: a.birth_year,
                death_year: a.death_year,
            },
        )
    });
    let mut languages_by_book = group_by_book(db.get_languages(page_ids)?, name_entry);
    let mut subjects_by_book = group_by_book(db.get_subjects(page_ids)?, name_entry);
    let mut shelves_by_book = group_by_book(db.get_bookshelves(page_ids)?, name_entry);
    let mut formats_by_book = group_by_book(db.get_formats(page_ids)?, |f: FormatRow| {
        (
            f.book_id,
            DownloadLink {
                mime_type: f.mime_type,
                url: f.url,
            },
        )
    });

    let results = page_ids
        .iter()
        .filter_map(|id| {
            let book = books.get(id)?;
            let subjects = subjects_by_book.remove(id).unwrap_or_default();
            let bookshelves = shelves_by_book.remove(id).unwrap_or_default();

            Some(BookSummary {
                id: book.gutenberg_id,
                title: book.title.clone(),
                authors: authors_by_book.remove(id).unwrap_or_default(),
                genre: derive_genre(&bookshelves, &subjects),
                languages: languages_by_book.remove(id).unwrap_or_default(),
                subjects,
                bookshelves,
                downloads: book.download_count,
                download_links: formats_by_book.remove(id).unwrap_or_default(),
            })
        })
        .collect();

    Ok(results)
}

fn name_entry(row: NameRow) -> (i64, String) {
    (row.book_id, row.name)
}

/// Fold rows into per-book lists, keeping fetch order.
fn group_by_book<R, T>(rows: Vec<R>, entry: impl Fn(R) -> (i64, T)) -> HashMap<i64, Vec<T>> {
    let mut grouped: HashMap<i64, Vec<T>> = HashMap::new();
    for row in rows {
        let (book_id, item) = entry(row);
        grouped.entry(book_id).or_default().push(item);
    }
    grouped
}

/// Listing URL carrying the same filter parameters with a new page.
pub fn page_url(endpoint: &str, raw: &BooksQuery, limit: i64, page: i64) -> String {
    let filters = [
        ("ids", &raw.ids),
        ("languages", &raw.languages),
        ("mime_type", &raw.mime_type),
        ("topic", &raw.topic),
        ("author", &raw.author),
        ("title", &raw.title),
        ("search", &raw.search),
        ("has_cover", &raw.has_cover),
    ];

    let mut pairs: Vec<String> = filters
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(|v| format!("{}={}", key, urlencoding::encode(v)))
        })
        .collect();
    pairs.push(format!("limit={}", limit));
    pairs.push(format!("page={}", page));

    format!("{}?{}", endpoint, pairs.join("&"))
}

/// Distinct bookshelf names.
pub fn list_genres(db: &Database) -> Result<GenreList> {
    let results = db.list_bookshelf_names()?;
    Ok(GenreList {
        count: results.len(),
        results,
    })
}
