pub mod error;
pub mod merge;
pub mod models;
pub mod service;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde_json::json;

use libris_http::error::AppError;
use libris_kernel::{InitCtx, Module};

use crate::utils;
use models::{BookDetailPatch, BookId, BookPatch, BookRequest, BookResponse};
use service::BookService;
use store::InMemoryBookStore;

/// Books module: CRUD plus partial updates for the catalog
pub struct BooksModule {
    service: Arc<BookService>,
}

impl BooksModule {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryBookStore::new());
        Self {
            service: Arc::new(BookService::new(store)),
        }
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
            target: "libris.modules",
            prefix = %utils::log_prefix(self.name()),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_books).post(create_book))
            .route("/health", get(health_check))
            .route(
                "/{id}",
                get(get_book)
                    .put(replace_book)
                    .patch(patch_book)
                    .delete(delete_book),
            )
            .route("/{id}/detail", patch(patch_book_detail))
            .route("/isbn/{isbn}", get(get_book_by_isbn))
            .route("/search/author/{author}", get(search_by_author))
            .route("/search/title/{title}", get(search_by_title))
            .with_state(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "List of books",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": {"$ref": "#/components/schemas/Book"}
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/BookRequest"}
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Book created",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Book"}
                                    }
                                }
                            },
                            "409": {
                                "description": "ISBN already in use",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            },
                            "422": {
                                "description": "Validation error",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            }
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a book by id",
                        "tags": ["Books"],
                        "parameters": [
                            {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
                        ],
                        "responses": {
                            "200": {
                                "description": "The book",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Book"}
                                    }
                                }
                            },
                            "404": {
                                "description": "Book not found",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            }
                        }
                    },
                    "put": {
                        "summary": "Replace every field of a book",
                        "tags": ["Books"],
                        "parameters": [
                            {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
                        ],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/BookRequest"}
                                }
                            }
                        },
                        "responses": {
                            "200": {"description": "Replaced book"},
                            "404": {"description": "Book not found"},
                            "409": {"description": "ISBN already in use"},
                            "422": {"description": "Validation error"}
                        }
                    },
                    "patch": {
                        "summary": "Partially update a book; only supplied fields change",
                        "tags": ["Books"],
                        "parameters": [
                            {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
                        ],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/BookPatch"}
                                }
                            }
                        },
                        "responses": {
                            "200": {"description": "Patched book"},
                            "404": {"description": "Book not found"},
                            "409": {"description": "ISBN already in use"},
                            "422": {"description": "Validation error"}
                        }
                    },
                    "delete": {
                        "summary": "Delete a book and its detail",
                        "tags": ["Books"],
                        "parameters": [
                            {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
                        ],
                        "responses": {
                            "204": {"description": "Deleted"},
                            "404": {"description": "Book not found"}
                        }
                    }
                },
                "/{id}/detail": {
                    "patch": {
                        "summary": "Partially update only the detail record",
                        "tags": ["Books"],
                        "parameters": [
                            {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
                        ],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/BookDetailPatch"}
                                }
                            }
                        },
                        "responses": {
                            "200": {"description": "Patched book"},
                            "404": {"description": "Book not found"},
                            "422": {"description": "Validation error"}
                        }
                    }
                },
                "/isbn/{isbn}": {
                    "get": {
                        "summary": "Get a book by ISBN",
                        "tags": ["Books"],
                        "parameters": [
                            {"name": "isbn", "in": "path", "required": true, "schema": {"type": "string"}}
                        ],
                        "responses": {
                            "200": {"description": "The book"},
                            "404": {"description": "Book not found"}
                        }
                    }
                },
                "/search/author/{author}": {
                    "get": {
                        "summary": "Find books by exact author match",
                        "tags": ["Books"],
                        "parameters": [
                            {"name": "author", "in": "path", "required": true, "schema": {"type": "string"}}
                        ],
                        "responses": {
                            "200": {"description": "Matching books"}
                        }
                    }
                },
                "/search/title/{title}": {
                    "get": {
                        "summary": "Find books by case-insensitive title substring",
                        "tags": ["Books"],
                        "parameters": [
                            {"name": "title", "in": "path", "required": true, "schema": {"type": "string"}}
                        ],
                        "responses": {
                            "200": {"description": "Matching books"}
                        }
                    }
                },
                "/health": {
                    "get": {
                        "summary": "Books health check",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": {
                                    "text/plain": {"schema": {"type": "string"}}
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer", "description": "Store-assigned identifier"},
                            "title": {"type": "string"},
                            "author": {"type": "string"},
                            "isbn": {"type": "string", "description": "Globally unique"},
                            "price": {"type": "integer", "minimum": 0},
                            "publishDate": {"type": "string", "format": "date", "example": "2025-05-07"},
                            "detail": {"$ref": "#/components/schemas/BookDetail"}
                        },
                        "required": ["id", "title", "author", "isbn", "price", "publishDate"]
                    },
                    "BookDetail": {
                        "type": "object",
                        "properties": {
                            "description": {"type": "string"},
                            "language": {"type": "string"},
                            "pageCount": {"type": "integer", "minimum": 0},
                            "publisher": {"type": "string"},
                            "coverImageUrl": {"type": "string"},
                            "edition": {"type": "string"}
                        }
                    },
                    "BookRequest": {
                        "type": "object",
                        "properties": {
                            "title": {"type": "string"},
                            "author": {"type": "string"},
                            "isbn": {"type": "string"},
                            "price": {"type": "integer", "minimum": 0},
                            "publishDate": {"type": "string", "format": "date"}
                        },
                        "required": ["title", "author", "isbn", "price", "publishDate"]
                    },
                    "BookPatch": {
                        "type": "object",
                        "description": "Sparse update: only supplied fields change; unknown keys are ignored",
                        "properties": {
                            "title": {"type": "string"},
                            "author": {"type": "string"},
                            "isbn": {"type": "string"},
                            "price": {"type": "integer", "minimum": 0},
                            "publishDate": {"type": "string", "format": "date"},
                            "detail": {"$ref": "#/components/schemas/BookDetailPatch"}
                        }
                    },
                    "BookDetailPatch": {
                        "type": "object",
                        "description": "Sparse detail update; null clears a field",
                        "properties": {
                            "description": {"type": "string", "nullable": true},
                            "language": {"type": "string", "nullable": true},
                            "pageCount": {"type": "integer", "minimum": 0, "nullable": true},
                            "publisher": {"type": "string", "nullable": true},
                            "coverImageUrl": {"type": "string", "nullable": true},
                            "edition": {"type": "string", "nullable": true}
                        }
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn list_books(
    State(service): State<Arc<BookService>>,
) -> Result<Json<Vec<BookResponse>>, AppError> {
    Ok(Json(service.list().await?))
}

async fn create_book(
    State(service): State<Arc<BookService>>,
    Json(request): Json<BookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    let created = service.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<BookId>,
) -> Result<Json<BookResponse>, AppError> {
    Ok(Json(service.get_by_id(id).await?))
}

async fn get_book_by_isbn(
    State(service): State<Arc<BookService>>,
    Path(isbn): Path<String>,
) -> Result<Json<BookResponse>, AppError> {
    Ok(Json(service.get_by_isbn(&isbn).await?))
}

async fn search_by_author(
    State(service): State<Arc<BookService>>,
    Path(author): Path<String>,
) -> Result<Json<Vec<BookResponse>>, AppError> {
    Ok(Json(service.search_by_author(&author).await?))
}

async fn search_by_title(
    State(service): State<Arc<BookService>>,
    Path(title): Path<String>,
) -> Result<Json<Vec<BookResponse>>, AppError> {
    Ok(Json(service.search_by_title(&title).await?))
}

async fn replace_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<BookId>,
    Json(request): Json<BookRequest>,
) -> Result<Json<BookResponse>, AppError> {
    Ok(Json(service.full_replace(id, request).await?))
}

async fn patch_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<BookId>,
    Json(patch): Json<BookPatch>,
) -> Result<Json<BookResponse>, AppError> {
    Ok(Json(service.partial_update(id, patch).await?))
}

async fn patch_book_detail(
    State(service): State<Arc<BookService>>,
    Path(id): Path<BookId>,
    Json(patch): Json<BookDetailPatch>,
) -> Result<Json<BookResponse>, AppError> {
    Ok(Json(service.partial_update_detail(id, patch).await?))
}

async fn delete_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<BookId>,
) -> Result<StatusCode, AppError> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a new instance of the books module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(BooksModule::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_router() -> Router {
        BooksModule::new().routes()
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(payload) => builder
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    fn create_payload(isbn: &str) -> Value {
        json!({
            "title": "A",
            "author": "B",
            "isbn": isbn,
            "price": 1000,
            "publishDate": "2025-01-01"
        })
    }

    #[tokio::test]
    async fn create_and_fetch_round_trip() {
        let router = test_router();

        let (status, body) = send(&router, "POST", "/", Some(create_payload("123"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 1);
        assert_eq!(body["publishDate"], "2025-01-01");
        assert!(body.get("detail").is_none());

        let (status, body) = send(&router, "GET", "/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isbn"], "123");

        let (status, body) = send(&router, "GET", "/isbn/123", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
    }

    #[tokio::test]
    async fn patch_applies_sparse_fields_and_creates_detail() {
        let router = test_router();
        send(&router, "POST", "/", Some(create_payload("123"))).await;

        let (status, body) = send(
            &router,
            "PATCH",
            "/1",
            Some(json!({"price": 2000, "detail": {"language": "en"}})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], 2000);
        assert_eq!(body["title"], "A");
        assert_eq!(body["detail"]["language"], "en");
        assert!(body["detail"].get("publisher").is_none());
    }

    #[tokio::test]
    async fn patch_detail_endpoint_operates_on_detail_only() {
        let router = test_router();
        send(&router, "POST", "/", Some(create_payload("123"))).await;

        let (status, body) = send(
            &router,
            "PATCH",
            "/1/detail",
            Some(json!({"publisher": "P", "pageCount": 320})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["detail"]["publisher"], "P");
        assert_eq!(body["detail"]["pageCount"], 320);
        assert_eq!(body["price"], 1000);
    }

    #[tokio::test]
    async fn conflicting_isbn_returns_409_with_value() {
        let router = test_router();
        send(&router, "POST", "/", Some(create_payload("111"))).await;
        send(&router, "POST", "/", Some(create_payload("222"))).await;

        let (status, body) = send(&router, "PATCH", "/1", Some(json!({"isbn": "222"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "conflict");
        assert_eq!(body["error"]["details"][0]["value"], "222");
    }

    #[tokio::test]
    async fn invalid_date_returns_422_naming_the_field() {
        let router = test_router();
        send(&router, "POST", "/", Some(create_payload("123"))).await;

        let (status, body) = send(
            &router,
            "PATCH",
            "/1",
            Some(json!({"publishDate": "01-01-2025"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["details"][0]["field"], "publishDate");
    }

    #[tokio::test]
    async fn delete_returns_204_then_404() {
        let router = test_router();
        send(&router, "POST", "/", Some(create_payload("123"))).await;

        let (status, _) = send(&router, "DELETE", "/1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&router, "GET", "/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&router, "DELETE", "/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_routes_filter_books() {
        let router = test_router();
        send(
            &router,
            "POST",
            "/",
            Some(json!({
                "title": "The Rust Programming Language",
                "author": "Jane",
                "isbn": "1",
                "price": 1000,
                "publishDate": "2025-01-01"
            })),
        )
        .await;
        send(
            &router,
            "POST",
            "/",
            Some(json!({
                "title": "Gardening",
                "author": "Jane",
                "isbn": "2",
                "price": 1000,
                "publishDate": "2025-01-01"
            })),
        )
        .await;

        let (status, body) = send(&router, "GET", "/search/author/Jane", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = send(&router, "GET", "/search/title/rust", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn full_replace_requires_every_field() {
        let router = test_router();
        send(&router, "POST", "/", Some(create_payload("123"))).await;

        // Missing mandatory fields is a deserialization failure, not a merge.
        let (status, _) = send(&router, "PUT", "/1", Some(json!({"title": "New"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(
            &router,
            "PUT",
            "/1",
            Some(json!({
                "title": "New",
                "author": "C",
                "isbn": "123",
                "price": 1,
                "publishDate": "2024-12-31"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "New");
        assert_eq!(body["publishDate"], "2024-12-31");
    }

    #[tokio::test]
    async fn module_exposes_openapi_fragment() {
        let module = BooksModule::new();
        let spec = module.openapi().unwrap();
        assert!(spec["paths"].get("/{id}").is_some());
        assert!(spec["components"]["schemas"].get("BookPatch").is_some());
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let router = test_router();
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
