//! Query-string parsing for the book listing.

use std::collections::BTreeSet;

/// Largest page size a client may request.
pub const MAX_LIMIT: i64 = 25;

/// Raw `/api/books` query parameters, exactly as sent by the client.
///
/// Everything is kept as a string so that malformed numbers never reject
/// the request; [`BookFilter::from_query`] normalizes them. Built from the
/// decoded key/value pairs, where a repeated key keeps its last value and
/// unknown keys are ignored.
#[derive(Debug, Clone, Default)]
pub struct BooksQuery {
    /// Comma-separated Gutenberg ids.
    pub ids: Option<String>,
    /// Comma-separated language codes.
    pub languages: Option<String>,
    /// Comma-separated MIME types or prefixes.
    pub mime_type: Option<String>,
    /// Comma-separated subject/bookshelf fragments.
    pub topic: Option<String>,
    /// Comma-separated author name fragments.
    pub author: Option<String>,
    /// Title fragment.
    pub title: Option<String>,
    /// Whitespace-separated words matched against title or author.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: Option<String>,
    /// Page size.
    pub limit: Option<String>,
    /// Only books with an `image/*` format.
    pub has_cover: Option<String>,
}

impl BooksQuery {
    /// Store one query-string pair.
    pub fn set(&mut self, key: &str, value: String) {
        let slot = match key {
            "ids" => &mut self.ids,
            "languages" => &mut self.languages,
            "mime_type" => &mut self.mime_type,
            "topic" => &mut self.topic,
            "author" => &mut self.author,
            "title" => &mut self.title,
            "search" => &mut self.search,
            "page" => &mut self.page,
            "limit" => &mut self.limit,
            "has_cover" => &mut self.has_cover,
            _ => return,
        };
        *slot = Some(value);
    }
}

impl FromIterator<(String, String)> for BooksQuery {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            query.set(&key, value);
        }
        query
    }
}

/// Typed filter criteria for the book listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFilter {
    /// Gutenberg ids. `Some` with an empty set when ids were given but none
    /// parsed, which matches no book.
    pub ids: Option<BTreeSet<i64>>,
    /// Language codes.
    pub languages: Vec<String>,
    /// MIME types or prefixes.
    pub mime_types: Vec<String>,
    /// Subject/bookshelf fragments.
    pub topics: Vec<String>,
    /// Author name fragments.
    pub authors: Vec<String>,
    /// Title fragment.
    pub title: Option<String>,
    /// Search words; each must match title or an author.
    pub search: Vec<String>,
    /// 1-based page number, never below 1.
    pub page: i64,
    /// Page size in `1..=MAX_LIMIT`.
    pub limit: i64,
    /// Require an `image/*` format.
    pub has_cover: bool,
}

impl Default for BookFilter {
    fn default() -> Self {
        Self {
            ids: None,
            languages: Vec::new(),
            mime_types: Vec::new(),
            topics: Vec::new(),
            authors: Vec::new(),
            title: None,
            search: Vec::new(),
            page: 1,
            limit: MAX_LIMIT,
            has_cover: false,
        }
    }
}

impl BookFilter {
    /// Normalize raw query parameters.
    pub fn from_query(query: &BooksQuery) -> Self {
        Self {
            ids: query
                .ids
                .as_deref()
                .map(split_list)
                .filter(|tokens| !tokens.is_empty())
                .map(|tokens| tokens.iter().filter_map(|id| id.parse().ok()).collect()),
            languages: query.languages.as_deref().map(split_list).unwrap_or_default(),
            mime_types: query.mime_type.as_deref().map(split_list).unwrap_or_default(),
            topics: query.topic.as_deref().map(split_list).unwrap_or_default(),
            authors: query.author.as_deref().map(split_list).unwrap_or_default(),
            title: query
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            search: query
                .search
                .as_deref()
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            page: parse_page(query.page.as_deref()),
            limit: parse_limit(query.limit.as_deref()),
            has_cover: query.has_cover.as_deref().is_some_and(is_truthy),
        }
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Whether a page after this one holds results.
    pub fn has_next(&self, total: i64) -> bool {
        self.page.saturating_mul(self.limit) < total
    }

    /// Whether a page before this one exists.
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Split on commas, trim, drop empties.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .unwrap_or(1)
        .max(1)
}

fn parse_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|l| l.trim().parse::<i64>().ok())
        .unwrap_or(MAX_LIMIT)
        .clamp(1, MAX_LIMIT)
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}
