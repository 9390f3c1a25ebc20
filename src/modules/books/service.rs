//! Service facade sequencing catalog operations: load, merge, persist,
//! project. Each call operates on a freshly loaded aggregate; there is no
//! shared mutable state here beyond the store handle.

use std::sync::Arc;

use super::error::CatalogError;
use super::merge;
use super::models::{
    Book, BookDetailPatch, BookId, BookPatch, BookRequest, BookResponse, NewBook,
};
use super::store::BookStore;

pub struct BookService {
    store: Arc<dyn BookStore>,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<BookResponse>, CatalogError> {
        let books = self.store.list().await?;
        Ok(books.into_iter().map(BookResponse::from).collect())
    }

    pub async fn get_by_id(&self, id: BookId) -> Result<BookResponse, CatalogError> {
        Ok(self.load(id).await?.into())
    }

    pub async fn get_by_isbn(&self, isbn: &str) -> Result<BookResponse, CatalogError> {
        self.store
            .find_by_isbn(isbn)
            .await?
            .map(BookResponse::from)
            .ok_or_else(|| CatalogError::not_found(format!("no book with isbn {isbn}")))
    }

    pub async fn search_by_author(&self, author: &str) -> Result<Vec<BookResponse>, CatalogError> {
        let books = self.store.find_by_author(author).await?;
        Ok(books.into_iter().map(BookResponse::from).collect())
    }

    pub async fn search_by_title(&self, title: &str) -> Result<Vec<BookResponse>, CatalogError> {
        let books = self.store.search_by_title(title).await?;
        Ok(books.into_iter().map(BookResponse::from).collect())
    }

    pub async fn create(&self, request: BookRequest) -> Result<BookResponse, CatalogError> {
        let book = validate_request(request)?;

        // Best-effort pre-check for a friendlier error; the store's unique
        // index is the actual guarantor under concurrency.
        if self.store.isbn_exists(&book.isbn, None).await? {
            return Err(CatalogError::DuplicateIsbn { isbn: book.isbn });
        }

        let saved = self.store.insert(book).await?;
        tracing::info!(book_id = saved.id, "book created");
        Ok(saved.into())
    }

    /// Full replace: every top-level field is mandatory and overwritten.
    /// The detail record is left as it is; only partial updates touch it.
    pub async fn full_replace(
        &self,
        id: BookId,
        request: BookRequest,
    ) -> Result<BookResponse, CatalogError> {
        let mut book = self.load(id).await?;
        let fields = validate_request(request)?;

        if fields.isbn != book.isbn && self.store.isbn_exists(&fields.isbn, Some(id)).await? {
            return Err(CatalogError::DuplicateIsbn { isbn: fields.isbn });
        }

        book.title = fields.title;
        book.author = fields.author;
        book.isbn = fields.isbn;
        book.price = fields.price;
        book.publish_date = fields.publish_date;

        let saved = self.store.save(book).await?;
        tracing::info!(book_id = saved.id, "book replaced");
        Ok(saved.into())
    }

    /// Partial update: coerce the sparse patch, probe isbn uniqueness only
    /// when the value actually changes, then apply and persist.
    pub async fn partial_update(
        &self,
        id: BookId,
        patch: BookPatch,
    ) -> Result<BookResponse, CatalogError> {
        let mut book = self.load(id).await?;
        let changes = merge::coerce_book_patch(&patch)?;

        if let Some(new_isbn) = changes.isbn_change(&book.isbn) {
            if self.store.isbn_exists(new_isbn, Some(id)).await? {
                return Err(CatalogError::DuplicateIsbn {
                    isbn: new_isbn.to_string(),
                });
            }
        }

        merge::apply_changes(&mut book, changes);

        let saved = self.store.save(book).await?;
        tracing::info!(book_id = saved.id, "book patched");
        Ok(saved.into())
    }

    /// Detail-only partial update; no uniqueness check applies here.
    pub async fn partial_update_detail(
        &self,
        id: BookId,
        patch: BookDetailPatch,
    ) -> Result<BookResponse, CatalogError> {
        let mut book = self.load(id).await?;
        let changes = merge::coerce_detail_patch(&patch)?;
        merge::apply_detail_changes(&mut book, changes);

        let saved = self.store.save(book).await?;
        tracing::info!(book_id = saved.id, "book detail patched");
        Ok(saved.into())
    }

    /// Delete the aggregate; the store cascades to the owned detail.
    pub async fn delete(&self, id: BookId) -> Result<(), CatalogError> {
        let book = self.load(id).await?;
        self.store.delete(book.id).await?;
        tracing::info!(book_id = book.id, "book deleted");
        Ok(())
    }

    async fn load(&self, id: BookId) -> Result<Book, CatalogError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("no book with id {id}")))
    }
}

fn validate_request(request: BookRequest) -> Result<NewBook, CatalogError> {
    if request.title.is_empty() {
        return Err(CatalogError::validation("title", "must not be empty"));
    }
    if request.author.is_empty() {
        return Err(CatalogError::validation("author", "must not be empty"));
    }
    if request.isbn.is_empty() {
        return Err(CatalogError::validation("isbn", "must not be empty"));
    }
    let price = u32::try_from(request.price)
        .map_err(|_| CatalogError::validation("price", "must be a non-negative integer"))?;

    Ok(NewBook {
        title: request.title,
        author: request.author,
        isbn: request.isbn,
        price,
        publish_date: request.publish_date,
    })
}
