//! SQL assembly for the filtered book listing.

use super::filter::BookFilter;
use rusqlite::types::Value;

const LIKE_ESCAPE: &str = r"ESCAPE '\'";

const JOIN_LANGUAGES: &str = "JOIN books_book_languages bl ON bl.book_id = b.id \
     JOIN books_language lang ON lang.id = bl.language_id";
const JOIN_FORMATS: &str = "JOIN books_format f ON f.book_id = b.id";
const JOIN_TOPICS: &str = "LEFT JOIN books_book_subjects bsj ON bsj.book_id = b.id \
     LEFT JOIN books_subject subj ON subj.id = bsj.subject_id \
     LEFT JOIN books_book_bookshelves bb ON bb.book_id = b.id \
     LEFT JOIN books_bookshelf shelf ON shelf.id = bb.bookshelf_id";
const JOIN_AUTHORS: &str = "JOIN books_book_authors ba ON ba.book_id = b.id \
     JOIN books_author a ON a.id = ba.author_id";

/// Filtered base query over `books_book b`.
///
/// Joins may fan out rows, so every statement built from it counts or
/// groups by `b.id`. Conditions use positional `?` placeholders bound from
/// [`BookQuery::params`] in order. Text fragments are matched through the
/// connection's `casefold` function, which folds non-ASCII letters too.
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
    joins: Vec<&'static str>,
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl BookQuery {
    /// Build the predicate for every present filter.
    pub fn from_filter(filter: &BookFilter) -> Self {
        let mut query = Self::default();

        match &filter.ids {
            Some(ids) if ids.is_empty() => query.conditions.push("0".to_string()),
            Some(ids) => query.push_condition(
                format!("b.gutenberg_id IN ({})", placeholders(ids.len())),
                ids.iter().map(|id| Value::Integer(*id)),
            ),
            None => {}
        }

        if !filter.languages.is_empty() {
            query.joins.push(JOIN_LANGUAGES);
            query.push_condition(
                format!("lang.code IN ({})", placeholders(filter.languages.len())),
                filter.languages.iter().map(|l| Value::Text(l.clone())),
            );
        }

        if !filter.mime_types.is_empty() {
            query.joins.push(JOIN_FORMATS);
            let mut alternatives = Vec::with_capacity(filter.mime_types.len() * 2);
            let mut params = Vec::with_capacity(filter.mime_types.len() * 2);
            for mime in &filter.mime_types {
                alternatives.push("LOWER(f.mime_type) = LOWER(?)".to_string());
                params.push(Value::Text(mime.clone()));
                alternatives.push(format!("f.mime_type LIKE ? {}", LIKE_ESCAPE));
                params.push(Value::Text(prefix_pattern(mime.trim_end_matches('%'))));
            }
            query.push_condition(any_of(&alternatives), params);
        }

        if filter.has_cover {
            query.conditions.push(
                "EXISTS (SELECT 1 FROM books_format fimg \
                 WHERE fimg.book_id = b.id AND fimg.mime_type LIKE 'image/%')"
                    .to_string(),
            );
        }

        if !filter.topics.is_empty() {
            query.joins.push(JOIN_TOPICS);
            let mut alternatives = Vec::with_capacity(filter.topics.len() * 2);
            let mut params = Vec::with_capacity(filter.topics.len() * 2);
            for topic in &filter.topics {
                for column in ["subj.name", "shelf.name"] {
                    alternatives.push(format!("casefold({}) LIKE ? {}", column, LIKE_ESCAPE));
                    params.push(Value::Text(contains_pattern(topic)));
                }
            }
            query.push_condition(any_of(&alternatives), params);
        }

        if !filter.authors.is_empty() {
            query.joins.push(JOIN_AUTHORS);
            let alternatives: Vec<String> = filter
                .authors
                .iter()
                .map(|_| format!("casefold(a.name) LIKE ? {}", LIKE_ESCAPE))
                .collect();
            query.push_condition(
                any_of(&alternatives),
                filter.authors.iter().map(|a| Value::Text(contains_pattern(a))),
            );
        }

        if let Some(title) = &filter.title {
            query.push_condition(
                format!("casefold(b.title) LIKE ? {}", LIKE_ESCAPE),
                [Value::Text(contains_pattern(title))],
            );
        }

        for word in &filter.search {
            let pattern = contains_pattern(word);
            query.push_condition(
                format!(
                    "(casefold(b.title) LIKE ? {esc} OR EXISTS (SELECT 1 FROM books_book_authors sba \
                     JOIN books_author sa ON sa.id = sba.author_id \
                     WHERE sba.book_id = b.id AND casefold(sa.name) LIKE ? {esc}))",
                    esc = LIKE_ESCAPE
                ),
                [Value::Text(pattern.clone()), Value::Text(pattern)],
            );
        }

        query
    }

    fn push_condition(&mut self, condition: String, params: impl IntoIterator<Item = Value>) {
        self.conditions.push(condition);
        self.params.extend(params);
    }

    /// `FROM ... WHERE ...` shared by the count and page statements.
    fn from_where(&self) -> String {
        let mut sql = String::from("FROM books_book b");
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        sql
    }

    /// Statement counting distinct matching books.
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(DISTINCT b.id) {}", self.from_where())
    }

    /// Statement selecting one page of book row ids, most downloaded first.
    ///
    /// Takes two extra trailing parameters: `LIMIT` then `OFFSET`.
    pub fn page_sql(&self) -> String {
        format!(
            "SELECT b.id {} GROUP BY b.id, b.download_count \
             ORDER BY b.download_count DESC, b.id ASC LIMIT ? OFFSET ?",
            self.from_where()
        )
    }

    /// Bound values for the predicate, in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

fn any_of(alternatives: &[String]) -> String {
    format!("({})", alternatives.join(" OR "))
}

/// `?, ?, ...` for an `IN` list.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Escape `LIKE` wildcards so the text matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Pattern matching any `casefold`ed value containing `fragment`.
pub fn contains_pattern(fragment: &str) -> String {
    format!("%{}%", escape_like(&fragment.to_lowercase()))
}

/// Pattern matching any value starting with `prefix`.
pub fn prefix_pattern(prefix: &str) -> String {
    format!("{}%", escape_like(prefix))
}
