use crate::catalog::query::{BookQuery, placeholders};
use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::Path;
use std::sync::Arc;

/// `casefold(text)`: lowercase across all of Unicode. SQLite's own `LIKE`
/// and `LOWER` only fold ASCII letters.
const CASEFOLD: &str = "casefold";

fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        CASEFOLD,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|text| text.to_lowercase())),
    )
    .map_err(|e| AppError::Internal(format!("Failed to register SQL functions: {}", e)))
}

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        Self::from_connection(conn)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        register_functions(&conn)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS books_book (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                gutenberg_id INTEGER UNIQUE NOT NULL,
                title TEXT NOT NULL,
                download_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS books_author (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                birth_year INTEGER,
                death_year INTEGER
            );

            CREATE TABLE IF NOT EXISTS books_book_authors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books_book(id) ON DELETE CASCADE,
                FOREIGN KEY (author_id) REFERENCES books_author(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS books_language (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT UNIQUE NOT NULL
            );

            CREATE TABLE IF NOT EXISTS books_book_languages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id INTEGER NOT NULL,
                language_id INTEGER NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books_book(id) ON DELETE CASCADE,
                FOREIGN KEY (language_id) REFERENCES books_language(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS books_subject (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL
            );

            CREATE TABLE IF NOT EXISTS books_book_subjects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id INTEGER NOT NULL,
                subject_id INTEGER NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books_book(id) ON DELETE CASCADE,
                FOREIGN KEY (subject_id) REFERENCES books_subject(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS books_bookshelf (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL
            );

            CREATE TABLE IF NOT EXISTS books_book_bookshelves (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id INTEGER NOT NULL,
                bookshelf_id INTEGER NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books_book(id) ON DELETE CASCADE,
                FOREIGN KEY (bookshelf_id) REFERENCES books_bookshelf(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS books_format (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                url TEXT NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books_book(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_books_downloads ON books_book(download_count DESC);
            CREATE INDEX IF NOT EXISTS idx_books_gutenberg_id ON books_book(gutenberg_id);
            CREATE INDEX IF NOT EXISTS idx_lang_code ON books_language(code);
            CREATE INDEX IF NOT EXISTS idx_format_mime ON books_format(mime_type);
            CREATE INDEX IF NOT EXISTS idx_format_book ON books_format(book_id);
            CREATE INDEX IF NOT EXISTS idx_bl_book ON books_book_languages(book_id);
            CREATE INDEX IF NOT EXISTS idx_bsj_book ON books_book_subjects(book_id);
            CREATE INDEX IF NOT EXISTS idx_bb_book ON books_book_bookshelves(book_id);
            CREATE INDEX IF NOT EXISTS idx_ba_book ON books_book_authors(book_id);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== LISTING ==========

    /// Count distinct books matching the query.
    pub fn count_books(&self, query: &BookQuery) -> Result<i64> {
        let conn = self.conn.lock();
        let total = conn.query_row(
            &query.count_sql(),
            params_from_iter(query.params().iter()),
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Row ids of one page of matching books, most downloaded first.
    pub fn page_book_ids(&self, query: &BookQuery, limit: i64, offset: i64) -> Result<Vec<i64>> {
        let conn = self.conn.lock();
        let tail = [Value::Integer(limit), Value::Integer(offset)];
        let mut stmt = conn.prepare(&query.page_sql())?;

        let ids = stmt
            .query_map(
                params_from_iter(query.params().iter().chain(tail.iter())),
                |row| row.get(0),
            )?
            .collect::<std::result::Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    /// Total number of books in the catalog.
    pub fn book_count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM books_book", [], |row| row.get(0))?;
        Ok(count)
    }

    // ========== PAGE RELATIONS ==========

    /// Core rows for the given book ids (unordered).
    pub fn get_books(&self, ids: &[i64]) -> Result<Vec<BookRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, gutenberg_id, title, download_count
             FROM books_book WHERE id IN ({})",
            placeholders(ids.len())
        ))?;

        let books = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok(BookRow {
                    id: row.get(0)?,
                    gutenberg_id: row.get(1)?,
                    title: row.get(2)?,
                    download_count: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(books)
    }

    /// Authors of the given books, in link order.
    pub fn get_authors(&self, ids: &[i64]) -> Result<Vec<AuthorRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT ba.book_id, a.name, a.birth_year, a.death_year
             FROM books_book_authors ba
             JOIN books_author a ON a.id = ba.author_id
             WHERE ba.book_id IN ({})
             ORDER BY ba.id",
            placeholders(ids.len())
        ))?;

        let authors = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok(AuthorRow {
                    book_id: row.get(0)?,
                    name: row.get(1)?,
                    birth_year: row.get(2)?,
                    death_year: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(authors)
    }

    /// Language codes of the given books, in link order.
    pub fn get_languages(&self, ids: &[i64]) -> Result<Vec<NameRow>> {
        self.get_linked_names(ids, "books_book_languages", "books_language", "language_id", "code")
    }

    /// Subject names of the given books, in link order.
    pub fn get_subjects(&self, ids: &[i64]) -> Result<Vec<NameRow>> {
        self.get_linked_names(ids, "books_book_subjects", "books_subject", "subject_id", "name")
    }

    /// Bookshelf names of the given books, in link order.
    pub fn get_bookshelves(&self, ids: &[i64]) -> Result<Vec<NameRow>> {
        self.get_linked_names(
            ids,
            "books_book_bookshelves",
            "books_bookshelf",
            "bookshelf_id",
            "name",
        )
    }

    /// Shared lookup through a junction table, ordered by junction row id.
    fn get_linked_names(
        &self,
        ids: &[i64],
        junction: &str,
        table: &str,
        foreign_key: &str,
        column: &str,
    ) -> Result<Vec<NameRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT j.book_id, t.{column}
             FROM {junction} j
             JOIN {table} t ON t.id = j.{foreign_key}
             WHERE j.book_id IN ({ids})
             ORDER BY j.id",
            ids = placeholders(ids.len())
        ))?;

        let rows = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok(NameRow {
                    book_id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Download formats of the given books, in insertion order.
    pub fn get_formats(&self, ids: &[i64]) -> Result<Vec<FormatRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT book_id, mime_type, url FROM books_format
             WHERE book_id IN ({})
             ORDER BY id",
            placeholders(ids.len())
        ))?;

        let formats = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok(FormatRow {
                    book_id: row.get(0)?,
                    mime_type: row.get(1)?,
                    url: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(formats)
    }

    // ========== GENRES ==========

    /// Distinct bookshelf names, alphabetically.
    pub fn list_bookshelf_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT DISTINCT name FROM books_bookshelf ORDER BY name")?;

        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(names)
    }

    // ========== CATALOG LOADING ==========

    /// Insert a book with all of its relations; returns the new row id.
    ///
    /// Authors, languages, subjects and bookshelves already present are
    /// reused. Fails if the Gutenberg id is already in the catalog.
    pub fn insert_book(&self, book: &NewBook) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO books_book (gutenberg_id, title, download_count) VALUES (?1, ?2, ?3)",
            params![book.gutenberg_id, book.title, book.download_count],
        )?;
        let book_id = tx.last_insert_rowid();

        for author in &book.authors {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM books_author
                     WHERE name = ?1 AND birth_year IS ?2 AND death_year IS ?3",
                    params![author.name, author.birth_year, author.death_year],
                    |row| row.get(0),
                )
                .optional()?;

            let author_id = match existing {
                Some(id) => id,
                None => {
                    tx.execute(
                        "INSERT INTO books_author (name, birth_year, death_year) VALUES (?1, ?2, ?3)",
                        params![author.name, author.birth_year, author.death_year],
                    )?;
                    tx.last_insert_rowid()
                }
            };

            tx.execute(
                "INSERT INTO books_book_authors (book_id, author_id) VALUES (?1, ?2)",
                params![book_id, author_id],
            )?;
        }

        let relations = [
            (&book.languages, "books_language", "code", "books_book_languages", "language_id"),
            (&book.subjects, "books_subject", "name", "books_book_subjects", "subject_id"),
            (
                &book.bookshelves,
                "books_bookshelf",
                "name",
                "books_book_bookshelves",
                "bookshelf_id",
            ),
        ];
        for (values, table, column, junction, foreign_key) in relations {
            for value in values {
                tx.execute(
                    &format!("INSERT OR IGNORE INTO {table} ({column}) VALUES (?1)"),
                    params![value],
                )?;
                let related_id: i64 = tx.query_row(
                    &format!("SELECT id FROM {table} WHERE {column} = ?1"),
                    params![value],
                    |row| row.get(0),
                )?;
                tx.execute(
                    &format!("INSERT INTO {junction} (book_id, {foreign_key}) VALUES (?1, ?2)"),
                    params![book_id, related_id],
                )?;
            }
        }

        for (mime_type, url) in &book.formats {
            tx.execute(
                "INSERT INTO books_format (book_id, mime_type, url) VALUES (?1, ?2, ?3)",
                params![book_id, mime_type, url],
            )?;
        }

        tx.commit()?;
        Ok(book_id)
    }
}
