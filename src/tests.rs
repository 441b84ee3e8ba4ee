use crate::catalog::{BookFilter, BookPage, BooksQuery, list_books, list_genres};
use crate::config::Config;
use crate::db::{Database, NewAuthor, NewBook};
use crate::server::{AppState, create_router};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use std::collections::HashSet;
use tower::ServiceExt;

const ENDPOINT: &str = "http://books.test/api/books";

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn book(gutenberg_id: i64, title: &str, download_count: i64) -> NewBook {
    NewBook {
        gutenberg_id,
        title: title.to_string(),
        download_count,
        ..NewBook::default()
    }
}

fn author(name: &str, birth_year: Option<i32>, death_year: Option<i32>) -> NewAuthor {
    NewAuthor {
        name: name.to_string(),
        birth_year,
        death_year,
    }
}

fn formats(mime_types: &[&str]) -> Vec<(String, String)> {
    mime_types
        .iter()
        .enumerate()
        .map(|(i, m)| (m.to_string(), format!("https://files.test/{}", i)))
        .collect()
}

/// Small mixed catalog.
///
/// | id | title | downloads | notes |
/// |---|---|---|---|
/// | 1 | War and Peace | 500 | Tolstoy, en, html + jpeg |
/// | 2 | Peace Pipe | 400 | Jane Warfield, en, text/plain |
/// | 3 | Anna Karenina | 300 | Tolstoy, ru, epub + png |
/// | 4 | Le Petit Prince | 200 | fr, TEXT/HTML, no shelves or subjects |
/// | 5 | Warlords | 100 | Harold Peace, en, pdf |
/// | 6 | War Stories | 50 | Smith, en, text/plain |
fn seed_catalog(db: &Database) {
    let tolstoy = author("Tolstoy, Leo, graf", Some(1828), Some(1910));

    db.insert_book(&NewBook {
        authors: vec![tolstoy.clone()],
        languages: strings(&["en"]),
        subjects: strings(&["Napoleonic Wars, 1800-1815 -- Fiction", "Historical fiction"]),
        bookshelves: strings(&["Best Books Ever Listings"]),
        formats: formats(&["text/html", "image/jpeg"]),
        ..book(1, "War and Peace", 500)
    })
    .unwrap();

    db.insert_book(&NewBook {
        authors: vec![author("Warfield, Jane", None, None)],
        languages: strings(&["en"]),
        subjects: strings(&["Drama", "Comedy"]),
        formats: formats(&["text/plain; charset=utf-8"]),
        ..book(2, "Peace Pipe", 400)
    })
    .unwrap();

    db.insert_book(&NewBook {
        authors: vec![tolstoy],
        languages: strings(&["ru"]),
        subjects: strings(&["Adultery -- Fiction"]),
        bookshelves: strings(&["Russian Literature", "Best Books Ever Listings"]),
        formats: formats(&["application/epub+zip", "image/png"]),
        ..book(3, "Anna Karenina", 300)
    })
    .unwrap();

    db.insert_book(&NewBook {
        authors: vec![author("Saint-Exupéry, Antoine de", Some(1900), Some(1944))],
        languages: strings(&["fr"]),
        formats: formats(&["TEXT/HTML"]),
        ..book(4, "Le Petit Prince", 200)
    })
    .unwrap();

    db.insert_book(&NewBook {
        authors: vec![author("Peace, Harold", None, Some(1950))],
        languages: strings(&["en"]),
        subjects: strings(&["Adventure stories"]),
        formats: formats(&["application/pdf"]),
        ..book(5, "Warlords", 100)
    })
    .unwrap();

    db.insert_book(&NewBook {
        authors: vec![author("Smith, John", None, None)],
        languages: strings(&["en"]),
        subjects: strings(&["Short stories"]),
        bookshelves: strings(&["Adventure"]),
        formats: formats(&["text/plain"]),
        ..book(6, "War Stories", 50)
    })
    .unwrap();
}

/// Six books tagged with children's topics, five of which have covers.
fn seed_children(db: &Database) {
    for i in 0..6 {
        let mut mime_types = vec!["text/html", "application/epub+zip"];
        if i != 3 {
            mime_types.push("image/jpeg");
        }
        db.insert_book(&NewBook {
            authors: vec![author(&format!("Author {}", i), None, None)],
            languages: strings(&["en"]),
            subjects: strings(&["Children's stories", "Fairy tales", "Child care"]),
            bookshelves: strings(&["Children's Literature", "Children's Picture Books"]),
            formats: formats(&mime_types),
            ..book(100 + i, &format!("Tale {}", i), 1000 - i * 10)
        })
        .unwrap();
    }
    db.insert_book(&NewBook {
        bookshelves: strings(&["Science Fiction"]),
        formats: formats(&["image/jpeg"]),
        ..book(200, "Unrelated", 5000)
    })
    .unwrap();
}

fn query(pairs: &[(&str, &str)]) -> BooksQuery {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn list(db: &Database, pairs: &[(&str, &str)]) -> BookPage {
    let raw = query(pairs);
    let filter = BookFilter::from_query(&raw);
    list_books(db, &raw, &filter, ENDPOINT).unwrap()
}

fn ids(page: &BookPage) -> Vec<i64> {
    page.results.iter().map(|b| b.id).collect()
}

// ========== DATABASE ==========

#[test]
fn db_insert_reuses_related_rows() {
    let db = test_db();
    seed_catalog(&db);

    assert_eq!(db.book_count().unwrap(), 6);

    let page = list(&db, &[("author", "tolstoy")]);
    let authors: Vec<_> = page.results.iter().map(|b| &b.authors[0]).collect();
    assert_eq!(authors.len(), 2);
    assert_eq!(authors[0], authors[1]);
    assert_eq!(authors[0].birth_year, Some(1828));
    assert_eq!(authors[0].death_year, Some(1910));

    let genres = list_genres(&db).unwrap();
    assert_eq!(
        genres.results.iter().filter(|g| *g == "Best Books Ever Listings").count(),
        1
    );
}

#[test]
fn db_duplicate_gutenberg_id_fails() {
    let db = test_db();
    db.insert_book(&book(1, "First", 1)).unwrap();
    assert!(db.insert_book(&book(1, "Second", 2)).is_err());
    assert_eq!(db.book_count().unwrap(), 1);
}

#[test]
fn db_relation_lookups_skip_empty_id_list() {
    let db = test_db();
    seed_catalog(&db);

    assert!(db.get_books(&[]).unwrap().is_empty());
    assert!(db.get_authors(&[]).unwrap().is_empty());
    assert!(db.get_languages(&[]).unwrap().is_empty());
    assert!(db.get_subjects(&[]).unwrap().is_empty());
    assert!(db.get_bookshelves(&[]).unwrap().is_empty());
    assert!(db.get_formats(&[]).unwrap().is_empty());
}

#[test]
fn db_open_on_disk_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("catalog.db");

    {
        let db = Database::open(&path).unwrap();
        db.insert_book(&book(7, "Persisted", 3)).unwrap();
    }

    let db = Database::open(&path).unwrap();
    assert_eq!(db.book_count().unwrap(), 1);
}

// ========== GENRES ==========

#[test]
fn genres_are_distinct_and_sorted() {
    let db = test_db();
    seed_catalog(&db);

    let genres = list_genres(&db).unwrap();
    assert_eq!(
        genres.results,
        strings(&["Adventure", "Best Books Ever Listings", "Russian Literature"])
    );
    assert_eq!(genres.count, 3);
}

#[test]
fn genres_empty_catalog() {
    let genres = list_genres(&test_db()).unwrap();
    assert_eq!(genres.count, 0);
    assert!(genres.results.is_empty());
}

// ========== LISTING ==========

#[test]
fn list_unfiltered_orders_by_downloads() {
    let db = test_db();
    seed_catalog(&db);

    let page = list(&db, &[]);
    assert_eq!(page.count, 6);
    assert_eq!(ids(&page), vec![1, 2, 3, 4, 5, 6]);
    assert!(page.next.is_none());
    assert!(page.previous.is_none());

    for pair in page.results.windows(2) {
        assert!(pair[0].downloads >= pair[1].downloads);
    }
}

#[test]
fn list_assembles_relations() {
    let db = test_db();
    seed_catalog(&db);

    let page = list(&db, &[("ids", "3")]);
    let anna = &page.results[0];
    assert_eq!(anna.title, "Anna Karenina");
    assert_eq!(anna.downloads, 300);
    assert_eq!(anna.languages, strings(&["ru"]));
    assert_eq!(anna.subjects, strings(&["Adultery -- Fiction"]));
    assert_eq!(
        anna.bookshelves,
        strings(&["Russian Literature", "Best Books Ever Listings"])
    );
    assert_eq!(anna.genre.as_deref(), Some("Russian Literature"));
    let mimes: Vec<_> = anna.download_links.iter().map(|l| l.mime_type.as_str()).collect();
    assert_eq!(mimes, vec!["application/epub+zip", "image/png"]);
    assert_eq!(anna.download_links[0].url, "https://files.test/0");
}

#[test]
fn list_genre_derivation() {
    let db = test_db();
    seed_catalog(&db);

    let page = list(&db, &[]);
    let genre = |id: i64| {
        page.results
            .iter()
            .find(|b| b.id == id)
            .and_then(|b| b.genre.clone())
    };
    assert_eq!(genre(1).as_deref(), Some("Best Books Ever Listings"));
    assert_eq!(genre(2).as_deref(), Some("Drama"));
    assert_eq!(genre(4), None);
}

#[test]
fn list_filter_ids() {
    let db = test_db();
    seed_catalog(&db);

    let page = list(&db, &[("ids", "3, 1,999,abc")]);
    assert_eq!(ids(&page), vec![1, 3]);
    assert_eq!(page.count, 2);

    let page = list(&db, &[("ids", "abc")]);
    assert!(page.results.is_empty());
    assert_eq!(page.count, 0);

    assert_eq!(list(&db, &[("ids", " , ")]).count, 6);
}

#[test]
fn list_filter_languages() {
    let db = test_db();
    seed_catalog(&db);

    assert_eq!(ids(&list(&db, &[("languages", "fr")])), vec![4]);
    assert_eq!(ids(&list(&db, &[("languages", "fr,ru")])), vec![3, 4]);
    assert_eq!(list(&db, &[("languages", "en")]).count, 4);
}

#[test]
fn list_filter_mime_type_prefix() {
    let db = test_db();
    seed_catalog(&db);

    assert_eq!(ids(&list(&db, &[("mime_type", "text/")])), vec![1, 2, 4, 6]);
    assert_eq!(ids(&list(&db, &[("mime_type", "text/html")])), vec![1, 4]);
    assert_eq!(ids(&list(&db, &[("mime_type", "application/epub%")])), vec![3]);
    assert_eq!(
        ids(&list(&db, &[("mime_type", "application/pdf,image/png")])),
        vec![3, 5]
    );
}

#[test]
fn list_filter_has_cover() {
    let db = test_db();
    seed_catalog(&db);

    assert_eq!(ids(&list(&db, &[("has_cover", "true")])), vec![1, 3]);
    assert_eq!(list(&db, &[("has_cover", "0")]).count, 6);
}

#[test]
fn list_filter_topic_matches_subjects_or_bookshelves() {
    let db = test_db();
    seed_catalog(&db);

    assert_eq!(ids(&list(&db, &[("topic", "FICTION")])), vec![1, 3]);
    assert_eq!(ids(&list(&db, &[("topic", "best books")])), vec![1, 3]);
    assert_eq!(ids(&list(&db, &[("topic", "drama,adventure")])), vec![2, 5, 6]);
}

#[test]
fn list_filter_author_and_title() {
    let db = test_db();
    seed_catalog(&db);

    assert_eq!(ids(&list(&db, &[("author", "tolstoy")])), vec![1, 3]);
    assert_eq!(ids(&list(&db, &[("author", "TOLSTOY, smith")])), vec![1, 3, 6]);
    assert_eq!(ids(&list(&db, &[("title", "peace")])), vec![1, 2]);
    assert_eq!(
        ids(&list(&db, &[("title", "war"), ("author", "tolstoy")])),
        vec![1]
    );
}

#[test]
fn list_search_requires_every_word() {
    let db = test_db();
    seed_catalog(&db);

    let page = list(&db, &[("search", "war peace")]);
    assert_eq!(ids(&page), vec![1, 2, 5]);

    let page = list(&db, &[("search", "  tolstoy   anna ")]);
    assert_eq!(ids(&page), vec![3]);
}

#[test]
fn list_patterns_match_literally() {
    let db = test_db();
    seed_catalog(&db);
    db.insert_book(&book(50, "100% Pure", 1)).unwrap();

    assert_eq!(ids(&list(&db, &[("title", "100%")])), vec![50]);
    assert_eq!(list(&db, &[("title", "%")]).count, 1);
    assert_eq!(list(&db, &[("author", "_")]).count, 0);
}

#[test]
fn list_text_filters_fold_non_ascii_case() {
    let db = test_db();
    seed_catalog(&db);
    db.insert_book(&NewBook {
        authors: vec![author("Émile Zola", Some(1840), Some(1902))],
        subjects: strings(&["Ästhetik"]),
        ..book(60, "Über Allem", 10)
    })
    .unwrap();

    assert_eq!(ids(&list(&db, &[("title", "über")])), vec![60]);
    assert_eq!(ids(&list(&db, &[("search", "émile")])), vec![60]);
    assert_eq!(ids(&list(&db, &[("author", "ÉMILE")])), vec![60]);
    assert_eq!(ids(&list(&db, &[("topic", "äSTHETIK")])), vec![60]);
    assert_eq!(ids(&list(&db, &[("author", "EXUPÉRY")])), vec![4]);
}

#[test]
fn list_fan_out_does_not_duplicate() {
    let db = test_db();
    seed_children(&db);

    // Every book matches through several subjects and shelves at once.
    let page = list(&db, &[("topic", "child,fairy"), ("mime_type", "text/,application/")]);
    assert_eq!(page.count, 6);
    assert_eq!(page.results.len(), 6);
    let unique: HashSet<_> = ids(&page).into_iter().collect();
    assert_eq!(unique.len(), 6);
}

#[test]
fn list_walking_pages_yields_each_book_once() {
    let db = test_db();
    seed_catalog(&db);
    seed_children(&db);

    let filters = [("topic", "i"), ("limit", "2")];
    let first = list(&db, &filters);
    let total = first.count;
    assert!(total > 4);

    let mut seen = Vec::new();
    let mut page_no = 1;
    loop {
        let page_str = page_no.to_string();
        let page = list(&db, &[filters[0], filters[1], ("page", page_str.as_str())]);
        assert_eq!(page.count, total);
        assert!(page.results.len() <= 2);
        seen.extend(ids(&page));
        if page.next.is_none() {
            break;
        }
        page_no += 1;
    }

    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(seen.len() as i64, total);
    assert_eq!(unique.len(), seen.len());
}

#[test]
fn list_count_independent_of_page() {
    let db = test_db();
    seed_catalog(&db);

    for (page, limit) in [("1", "1"), ("2", "4"), ("9", "25")] {
        let result = list(&db, &[("page", page), ("limit", limit)]);
        assert_eq!(result.count, 6, "page {} limit {}", page, limit);
    }
}

#[test]
fn list_pagination_links() {
    let db = test_db();
    seed_catalog(&db);

    let page = list(&db, &[("limit", "2"), ("page", "2"), ("languages", "en")]);
    assert_eq!(page.count, 4);
    assert_eq!(ids(&page), vec![5, 6]);
    assert!(page.next.is_none());
    assert_eq!(
        page.previous.as_deref(),
        Some("http://books.test/api/books?languages=en&limit=2&page=1")
    );

    let page = list(&db, &[("limit", "2"), ("languages", "en")]);
    assert_eq!(
        page.next.as_deref(),
        Some("http://books.test/api/books?languages=en&limit=2&page=2")
    );
    assert!(page.previous.is_none());
}

#[test]
fn list_out_of_range_page_is_empty() {
    let db = test_db();
    seed_catalog(&db);

    let page = list(&db, &[("page", "10"), ("limit", "5")]);
    assert_eq!(page.count, 6);
    assert!(page.results.is_empty());
    assert!(page.next.is_none());
    assert_eq!(
        page.previous.as_deref(),
        Some("http://books.test/api/books?limit=5&page=9")
    );
}

#[test]
fn list_no_matches() {
    let db = test_db();
    seed_catalog(&db);

    let page = list(&db, &[("author", "nobody at all")]);
    assert_eq!(page.count, 0);
    assert!(page.results.is_empty());
    assert!(page.next.is_none());
    assert!(page.previous.is_none());
}

#[test]
fn list_ties_break_by_insertion() {
    let db = test_db();
    db.insert_book(&book(10, "B", 7)).unwrap();
    db.insert_book(&book(11, "A", 7)).unwrap();
    db.insert_book(&book(12, "C", 9)).unwrap();

    assert_eq!(ids(&list(&db, &[])), vec![12, 10, 11]);
    assert_eq!(ids(&list(&db, &[("limit", "1"), ("page", "3")])), vec![11]);
}

// ========== CONFIG ==========

#[test]
fn config_parse_toml() {
    let toml_str = r#"
        [server]
        bind = "127.0.0.1:9000"
        title = "Test Catalog"
        public_url = "https://books.example.org/"

        [database]
        path = "/tmp/catalog.db"
    "#;

    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.bind.port(), 9000);
    assert_eq!(config.server.title, "Test Catalog");
    assert_eq!(config.database.path.to_str(), Some("/tmp/catalog.db"));
    assert_eq!(config.base_url(Some("ignored:1")), "https://books.example.org");
}

#[test]
fn config_default_values() {
    let config = Config::default();
    assert_eq!(config.server.bind.port(), 8080);
    assert_eq!(config.server.title, "Guten Books");
    assert!(config.server.public_url.is_none());
    assert_eq!(config.base_url(Some("localhost:3000")), "http://localhost:3000");
    assert_eq!(config.base_url(None), "http://0.0.0.0:8080");
}

#[test]
fn config_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, Config::generate_default()).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.server.bind.port(), 8080);

    std::fs::write(&path, "[server\nbroken").unwrap();
    assert!(Config::load(&path).is_err());
}

// ========== HTTP ==========

fn test_app(db: Database) -> Router {
    create_router(AppState::new(Config::default(), db))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("host", "books.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn http_books_child_covers_example() {
    let db = test_db();
    seed_children(&db);

    let (status, json) = get_json(
        test_app(db),
        "/api/books?topic=child&has_cover=true&page=1&limit=2",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 5);
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
    assert_eq!(
        json["next"],
        "http://books.test/api/books?topic=child&has_cover=true&limit=2&page=2"
    );
    assert!(json["previous"].is_null());
}

#[tokio::test]
async fn http_books_response_shape() {
    let db = test_db();
    seed_catalog(&db);

    let (status, json) = get_json(test_app(db), "/api/books?ids=4").await;
    assert_eq!(status, StatusCode::OK);

    let book = &json["results"][0];
    assert_eq!(book["id"], 4);
    assert_eq!(book["title"], "Le Petit Prince");
    assert_eq!(book["authors"][0]["name"], "Saint-Exupéry, Antoine de");
    assert_eq!(book["authors"][0]["birth_year"], 1900);
    assert!(book["genre"].is_null());
    assert_eq!(book["languages"], serde_json::json!(["fr"]));
    assert_eq!(book["subjects"], serde_json::json!([]));
    assert_eq!(book["bookshelves"], serde_json::json!([]));
    assert_eq!(book["downloads"], 200);
    assert_eq!(book["download_links"][0]["mime_type"], "TEXT/HTML");
}

#[tokio::test]
async fn http_books_tolerates_malformed_numbers() {
    let db = test_db();
    seed_catalog(&db);

    let (status, json) = get_json(test_app(db), "/api/books?page=abc&limit=-5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 6);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
    assert_eq!(json["next"], "http://books.test/api/books?limit=1&page=2");
}

#[tokio::test]
async fn http_books_repeated_key_uses_last_value() {
    let db = test_db();
    seed_catalog(&db);

    let (status, json) = get_json(test_app(db), "/api/books?topic=drama&topic=adventure").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![5, 6]);
}

#[tokio::test]
async fn http_books_search_is_url_decoded() {
    let db = test_db();
    seed_catalog(&db);

    let (_, json) = get_json(test_app(db), "/api/books?search=war+peace").await;
    assert_eq!(json["count"], 3);
}

#[tokio::test]
async fn http_books_uses_public_url() {
    let db = test_db();
    seed_catalog(&db);

    let mut config = Config::default();
    config.server.public_url = Some("https://books.example.org".to_string());
    let app = create_router(AppState::new(config, db));

    let (_, json) = get_json(app, "/api/books?limit=2").await;
    assert_eq!(
        json["next"],
        "https://books.example.org/api/books?limit=2&page=2"
    );
}

#[tokio::test]
async fn http_genres() {
    let db = test_db();
    seed_catalog(&db);

    let (status, json) = get_json(test_app(db), "/api/genres").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 3);
    assert_eq!(json["results"][0], "Adventure");
}

#[tokio::test]
async fn http_openapi_describes_filters() {
    let (status, json) = get_json(test_app(test_db()), "/api/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["info"]["title"], "Guten Books");

    let names: Vec<&str> = json["paths"]["/api/books"]["get"]["parameters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "ids", "languages", "mime_type", "topic", "author", "title", "search", "page",
            "limit", "has_cover"
        ]
    );
    assert!(json["paths"]["/api/genres"]["get"].is_object());
}

#[tokio::test]
async fn http_health() {
    let db = test_db();
    seed_catalog(&db);

    let (status, json) = get_json(test_app(db), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["books"], 6);
}

#[tokio::test]
async fn http_index_page() {
    let (status, body) = get(test_app(test_db()), "/genre/Adventure").await;
    assert_eq!(status, StatusCode::OK);

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("<title>Guten Books</title>"));
    assert!(html.contains("/api/genres"));
    assert!(html.contains("if (current !== generation) return;"));
}

#[tokio::test]
async fn http_unknown_route_is_404() {
    let (status, body) = get(test_app(test_db()), "/api/nothing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(String::from_utf8(body).unwrap(), "Not found: /api/nothing");
}
