//! OpenAPI description of the catalog API.

use crate::catalog::MAX_LIMIT;
use serde_json::{Value, json};

fn string_param(name: &str, description: &str, example: &str) -> Value {
    json!({
        "name": name,
        "in": "query",
        "required": false,
        "description": description,
        "schema": { "type": "string", "example": example },
    })
}

/// OpenAPI 3 document for `/api/books` and `/api/genres`.
pub fn document(title: &str) -> Value {
    let parameters = json!([
        string_param("ids", "Comma-separated Gutenberg ids", "84,1342"),
        string_param("languages", "Comma-separated language codes", "en,fr"),
        string_param(
            "mime_type",
            "Comma-separated MIME types or prefixes",
            "text/plain,application/epub+zip"
        ),
        string_param(
            "topic",
            "Comma-separated fragments matched against subjects or bookshelves, case-insensitive",
            "child,infant"
        ),
        string_param(
            "author",
            "Comma-separated author name fragments, case-insensitive",
            "tolstoy"
        ),
        string_param("title", "Title fragment, case-insensitive", "war"),
        string_param(
            "search",
            "Space-separated words, each matched in the title or an author name",
            "tolstoy war"
        ),
        {
            "name": "page",
            "in": "query",
            "required": false,
            "description": "Page number, 1-based",
            "schema": { "type": "integer", "default": 1, "minimum": 1 },
        },
        {
            "name": "limit",
            "in": "query",
            "required": false,
            "description": "Items per page",
            "schema": { "type": "integer", "default": MAX_LIMIT, "minimum": 1, "maximum": MAX_LIMIT },
        },
        string_param(
            "has_cover",
            "Only books with an image/* format when 1, true, on or yes",
            "1"
        ),
    ]);

    json!({
        "openapi": "3.0.3",
        "info": { "title": title, "version": env!("CARGO_PKG_VERSION") },
        "paths": {
            "/api/books": {
                "get": {
                    "summary": "Books matching the filters, most downloaded first",
                    "tags": ["Books"],
                    "parameters": parameters,
                    "responses": {
                        "200": {
                            "description": "One page of books",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/BookPage" }
                                }
                            }
                        }
                    }
                }
            },
            "/api/genres": {
                "get": {
                    "summary": "Distinct bookshelf names, alphabetically",
                    "tags": ["Genres"],
                    "responses": {
                        "200": {
                            "description": "All genres",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/GenreList" }
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Author": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "birth_year": { "type": "integer", "nullable": true },
                        "death_year": { "type": "integer", "nullable": true }
                    }
                },
                "DownloadLink": {
                    "type": "object",
                    "properties": {
                        "mime_type": { "type": "string" },
                        "url": { "type": "string" }
                    }
                },
                "BookSummary": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "title": { "type": "string" },
                        "authors": { "type": "array", "items": { "$ref": "#/components/schemas/Author" } },
                        "genre": { "type": "string", "nullable": true },
                        "languages": { "type": "array", "items": { "type": "string" } },
                        "subjects": { "type": "array", "items": { "type": "string" } },
                        "bookshelves": { "type": "array", "items": { "type": "string" } },
                        "downloads": { "type": "integer" },
                        "download_links": {
                            "type": "array",
                            "items": { "$ref": "#/components/schemas/DownloadLink" }
                        }
                    }
                },
                "BookPage": {
                    "type": "object",
                    "properties": {
                        "count": { "type": "integer" },
                        "next": { "type": "string", "nullable": true },
                        "previous": { "type": "string", "nullable": true },
                        "results": { "type": "array", "items": { "$ref": "#/components/schemas/BookSummary" } }
                    }
                },
                "GenreList": {
                    "type": "object",
                    "properties": {
                        "count": { "type": "integer" },
                        "results": { "type": "array", "items": { "type": "string" } }
                    }
                }
            }
        }
    })
}
