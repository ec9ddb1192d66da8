pub mod files;
pub mod models;
pub mod routes;
pub mod store;

use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use bookstore_kernel::{AppState, InitCtx, Migration, Module};
use serde_json::json;

/// Book catalog and reviews
pub struct BooksModule;

impl BooksModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            extensions = ?ctx.settings.books.file_valid_extensions,
            size_limit_mb = ctx.settings.books.file_size_limit_mb,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router<AppState> {
        Router::new()
            .route("/books/", get(routes::list_books))
            .route("/books/{id}/", get(routes::get_book))
            .route("/books/{id}/add_review/", post(routes::add_review))
            .route("/reviews/", get(routes::list_reviews))
            .route("/reviews/{id}/", get(routes::get_review))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({
            "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } }
        });
        let secured = json!([{ "bearerAuth": [] }]);
        let id_param = json!([{
            "name": "id",
            "in": "path",
            "required": true,
            "schema": { "type": "integer" }
        }]);

        Some(json!({
            "paths": {
                "/books/": {
                    "get": {
                        "summary": "List books with their reviews",
                        "tags": ["Books"],
                        "security": secured,
                        "responses": {
                            "200": {
                                "description": "List of books",
                                "content": {
                                    "application/json": {
                                        "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } }
                                    }
                                }
                            },
                            "401": { "description": "Not authenticated", "content": error }
                        }
                    }
                },
                "/books/{id}/": {
                    "get": {
                        "summary": "Book detail with reviews",
                        "tags": ["Books"],
                        "security": secured,
                        "parameters": id_param,
                        "responses": {
                            "200": {
                                "description": "Book",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Book" } } }
                            },
                            "401": { "description": "Not authenticated", "content": error },
                            "404": { "description": "Book not found", "content": error }
                        }
                    }
                },
                "/books/{id}/add_review/": {
                    "post": {
                        "summary": "Review a book as the calling user",
                        "tags": ["Books"],
                        "security": secured,
                        "parameters": id_param,
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/CreateReview" } } }
                        },
                        "responses": {
                            "201": {
                                "description": "Created review",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Review" } } }
                            },
                            "400": { "description": "Invalid rating or duplicate review", "content": error },
                            "401": { "description": "Not authenticated", "content": error },
                            "404": { "description": "Book not found", "content": error }
                        }
                    }
                },
                "/reviews/": {
                    "get": {
                        "summary": "List reviews",
                        "tags": ["Reviews"],
                        "responses": {
                            "200": {
                                "description": "List of reviews",
                                "content": {
                                    "application/json": {
                                        "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Review" } }
                                    }
                                }
                            }
                        }
                    }
                },
                "/reviews/{id}/": {
                    "get": {
                        "summary": "Review detail",
                        "tags": ["Reviews"],
                        "parameters": id_param,
                        "responses": {
                            "200": {
                                "description": "Review",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Review" } } }
                            },
                            "404": { "description": "Review not found", "content": error }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "description": { "type": "string" },
                            "file": {
                                "type": ["string", "null"],
                                "description": "Public URL of the uploaded book file"
                            },
                            "publish_date": { "type": "string", "format": "date-time" },
                            "created_at": { "type": "string", "format": "date-time" },
                            "reviews": { "type": "array", "items": { "$ref": "#/components/schemas/Review" } }
                        },
                        "required": ["id", "title", "author", "description", "publish_date", "created_at", "reviews"]
                    },
                    "Review": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "user": { "type": "integer", "description": "Id of the reviewing user" },
                            "book": { "type": "integer" },
                            "review_text": { "type": "string" },
                            "rating": { "type": "integer", "minimum": 0, "maximum": 5 },
                            "created_at": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "user", "book", "review_text", "rating", "created_at"]
                    },
                    "CreateReview": {
                        "type": "object",
                        "properties": {
                            "review_text": { "type": "string" },
                            "rating": { "type": "integer", "minimum": 0, "maximum": 5 }
                        },
                        "required": ["review_text", "rating"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE book (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    title        TEXT NOT NULL CHECK (length(title) BETWEEN 1 AND 255),
                    author       TEXT NOT NULL CHECK (length(author) BETWEEN 1 AND 255),
                    description  TEXT NOT NULL DEFAULT '',
                    file         TEXT,
                    publish_date TEXT NOT NULL,
                    created_at   TEXT NOT NULL
                );

                CREATE TABLE review (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id     INTEGER NOT NULL REFERENCES auth_user (id) ON DELETE CASCADE,
                    book_id     INTEGER NOT NULL REFERENCES book (id) ON DELETE CASCADE,
                    review_text TEXT    NOT NULL,
                    rating      INTEGER NOT NULL CHECK (rating BETWEEN 0 AND 5),
                    created_at  TEXT    NOT NULL
                );

                CREATE UNIQUE INDEX review_user_book_unique ON review (user_id, book_id);
                CREATE INDEX review_book_id ON review (book_id);
                "#,
        }]
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let reviews = store::count_reviews(ctx.db).await?;
        tracing::info!(module = self.name(), reviews, "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new())
}
