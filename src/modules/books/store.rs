//! Record store adapter for the catalog.
//!
//! The service talks to storage only through [`BookStore`], so the in-memory
//! implementation used here can be swapped for a database-backed one without
//! touching the merge engine or the facade. The store owns the authoritative
//! isbn uniqueness constraint: any pre-check in the service is best-effort,
//! while `insert`/`save` re-validate under the write lock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

use super::models::{Book, BookId, NewBook};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("isbn already in use: {isbn}")]
    DuplicateIsbn { isbn: String },

    #[error("book {0} does not exist")]
    Missing(BookId),
}

/// External collaborator interface: lookups, existence check, persist, delete.
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError>;

    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError>;

    /// Whether any book other than `excluding` holds the given isbn.
    async fn isbn_exists(
        &self,
        isbn: &str,
        excluding: Option<BookId>,
    ) -> Result<bool, StoreError>;

    /// Persist a new book, assigning its id. Fails on an isbn collision.
    async fn insert(&self, book: NewBook) -> Result<Book, StoreError>;

    /// Persist a mutated aggregate. Assigns an id to a newly attached detail
    /// and re-validates the isbn constraint.
    async fn save(&self, book: Book) -> Result<Book, StoreError>;

    /// Delete a book together with its owned detail. Idempotent: deleting an
    /// id that is already gone is a no-op.
    async fn delete(&self, id: BookId) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<Book>, StoreError>;

    /// Exact author match.
    async fn find_by_author(&self, author: &str) -> Result<Vec<Book>, StoreError>;

    /// Case-insensitive substring match on the title.
    async fn search_by_title(&self, title: &str) -> Result<Vec<Book>, StoreError>;
}

#[derive(Default)]
struct StoreInner {
    books: HashMap<BookId, Book>,
    /// Unique index: this is the storage-level guarantor for isbn uniqueness.
    isbn_index: HashMap<String, BookId>,
    next_book_id: BookId,
    next_detail_id: u64,
}

/// In-memory [`BookStore`]. A single write lock spans the uniqueness check
/// and the mutation, so two concurrent writers cannot both claim one isbn.
pub struct InMemoryBookStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                next_book_id: 1,
                next_detail_id: 1,
                ..StoreInner::default()
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().expect("book store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().expect("book store lock poisoned")
    }
}

impl Default for InMemoryBookStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        Ok(self.read().books.get(&id).cloned())
    }

    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError> {
        let inner = self.read();
        Ok(inner
            .isbn_index
            .get(isbn)
            .and_then(|id| inner.books.get(id))
            .cloned())
    }

    async fn isbn_exists(
        &self,
        isbn: &str,
        excluding: Option<BookId>,
    ) -> Result<bool, StoreError> {
        let inner = self.read();
        Ok(inner
            .isbn_index
            .get(isbn)
            .is_some_and(|holder| Some(*holder) != excluding))
    }

    async fn insert(&self, book: NewBook) -> Result<Book, StoreError> {
        let mut inner = self.write();

        if inner.isbn_index.contains_key(&book.isbn) {
            return Err(StoreError::DuplicateIsbn { isbn: book.isbn });
        }

        let id = inner.next_book_id;
        inner.next_book_id += 1;

        let book = Book {
            id,
            title: book.title,
            author: book.author,
            isbn: book.isbn,
            price: book.price,
            publish_date: book.publish_date,
            detail: None,
        };
        inner.isbn_index.insert(book.isbn.clone(), id);
        inner.books.insert(id, book.clone());

        Ok(book)
    }

    async fn save(&self, mut book: Book) -> Result<Book, StoreError> {
        let mut inner = self.write();

        let previous_isbn = match inner.books.get(&book.id) {
            Some(current) => current.isbn.clone(),
            None => return Err(StoreError::Missing(book.id)),
        };

        if let Some(&holder) = inner.isbn_index.get(&book.isbn) {
            if holder != book.id {
                return Err(StoreError::DuplicateIsbn { isbn: book.isbn });
            }
        }

        if let Some(detail) = book.detail.as_mut() {
            if detail.id.is_none() {
                detail.id = Some(inner.next_detail_id);
                inner.next_detail_id += 1;
            }
        }

        if previous_isbn != book.isbn {
            inner.isbn_index.remove(&previous_isbn);
            inner.isbn_index.insert(book.isbn.clone(), book.id);
        }
        inner.books.insert(book.id, book.clone());

        Ok(book)
    }

    async fn delete(&self, id: BookId) -> Result<(), StoreError> {
        let mut inner = self.write();

        // Removing the aggregate removes its owned detail with it.
        if let Some(book) = inner.books.remove(&id) {
            inner.isbn_index.remove(&book.isbn);
        }

        Ok(())
    }

    async fn list(&self) -> Result<Vec<Book>, StoreError> {
        let mut books: Vec<Book> = self.read().books.values().cloned().collect();
        books.sort_by_key(|book| book.id);
        Ok(books)
    }

    async fn find_by_author(&self, author: &str) -> Result<Vec<Book>, StoreError> {
        let mut books: Vec<Book> = self
            .read()
            .books
            .values()
            .filter(|book| book.author == author)
            .cloned()
            .collect();
        books.sort_by_key(|book| book.id);
        Ok(books)
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<Book>, StoreError> {
        let needle = title.to_lowercase();
        let mut books: Vec<Book> = self
            .read()
            .books
            .values()
            .filter(|book| book.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        books.sort_by_key(|book| book.id);
        Ok(books)
    }
}
