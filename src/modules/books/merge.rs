//! Field coercion and the partial-update merge engine.
//!
//! The engine is pure: it turns a sparse patch descriptor into typed changes
//! and applies them to an in-memory aggregate, touching only the fields the
//! caller supplied. It performs no I/O; the isbn uniqueness probe and the
//! final persist are sequenced by the service facade.

use serde_json::Value;
use time::Date;

use super::error::CatalogError;
use super::models::{parse_iso_date, Book, BookDetailPatch, BookPatch};

/// Result of coercing one raw value: either a typed value, or "absent"
/// (the caller supplied `null` or a blank numeric string).
#[derive(Debug, PartialEq, Eq)]
enum Coerced<T> {
    Value(T),
    Absent,
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn coerce_string(field: &'static str, raw: &Value) -> Result<Coerced<String>, CatalogError> {
    match raw {
        Value::Null => Ok(Coerced::Absent),
        Value::String(s) => Ok(Coerced::Value(s.clone())),
        other => Err(CatalogError::validation(
            field,
            format!("expected a string, got {}", json_type_name(other)),
        )),
    }
}

fn coerce_integer(field: &'static str, raw: &Value) -> Result<Coerced<i64>, CatalogError> {
    match raw {
        Value::Null => Ok(Coerced::Absent),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Coerced::Value)
            .ok_or_else(|| {
                CatalogError::validation(field, "number is not representable as an integer")
            }),
        Value::String(s) if s.trim().is_empty() => Ok(Coerced::Absent),
        Value::String(s) => s.parse::<i64>().map(Coerced::Value).map_err(|_| {
            CatalogError::validation(field, format!("'{s}' is not a valid integer"))
        }),
        other => Err(CatalogError::validation(
            field,
            format!("expected an integer, got {}", json_type_name(other)),
        )),
    }
}

fn coerce_date(field: &'static str, raw: &Value) -> Result<Coerced<Date>, CatalogError> {
    match raw {
        Value::Null => Ok(Coerced::Absent),
        Value::String(s) => parse_iso_date(s).map(Coerced::Value).map_err(|_| {
            CatalogError::validation(field, "expected a date in YYYY-MM-DD format")
        }),
        other => Err(CatalogError::validation(
            field,
            format!(
                "expected a date string in YYYY-MM-DD format, got {}",
                json_type_name(other)
            ),
        )),
    }
}

/// Unwrap a coercion for a non-nullable field: explicit `null` is rejected
/// instead of clearing the field.
fn required<T>(field: &'static str, coerced: Coerced<T>) -> Result<T, CatalogError> {
    match coerced {
        Coerced::Value(v) => Ok(v),
        Coerced::Absent => Err(CatalogError::validation(field, "cannot be null or blank")),
    }
}

/// Unwrap a coercion for a nullable detail field: absence clears the field.
fn optional<T>(coerced: Coerced<T>) -> Option<T> {
    match coerced {
        Coerced::Value(v) => Some(v),
        Coerced::Absent => None,
    }
}

fn non_empty(field: &'static str, value: String) -> Result<String, CatalogError> {
    if value.is_empty() {
        Err(CatalogError::validation(field, "must not be empty"))
    } else {
        Ok(value)
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u32, CatalogError> {
    u32::try_from(value)
        .map_err(|_| CatalogError::validation(field, "must be a non-negative integer"))
}

/// Typed changes coerced from a [`BookPatch`]: each slot is `Some` only when
/// the caller supplied the corresponding key.
#[derive(Debug, Default)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub price: Option<u32>,
    pub publish_date: Option<Date>,
    pub detail: Option<DetailChanges>,
}

impl BookChanges {
    /// The isbn this patch proposes, when it differs from the current value.
    /// Updating a book to its own isbn is never a conflict.
    pub fn isbn_change(&self, current: &str) -> Option<&str> {
        self.isbn.as_deref().filter(|new_isbn| *new_isbn != current)
    }
}

/// Typed changes for the detail record. The outer option tracks whether the
/// key was supplied; the inner one carries "set" vs "clear".
#[derive(Debug, Default)]
pub struct DetailChanges {
    pub description: Option<Option<String>>,
    pub language: Option<Option<String>>,
    pub page_count: Option<Option<u32>>,
    pub publisher: Option<Option<String>>,
    pub cover_image_url: Option<Option<String>>,
    pub edition: Option<Option<String>>,
}

/// Coerce a sparse book patch into typed changes, validating every supplied
/// value. Field names in errors use the wire (camelCase) spelling.
pub fn coerce_book_patch(patch: &BookPatch) -> Result<BookChanges, CatalogError> {
    let mut changes = BookChanges::default();

    if let Some(raw) = &patch.title {
        let title = required("title", coerce_string("title", raw)?)?;
        changes.title = Some(non_empty("title", title)?);
    }
    if let Some(raw) = &patch.author {
        let author = required("author", coerce_string("author", raw)?)?;
        changes.author = Some(non_empty("author", author)?);
    }
    if let Some(raw) = &patch.isbn {
        let isbn = required("isbn", coerce_string("isbn", raw)?)?;
        changes.isbn = Some(non_empty("isbn", isbn)?);
    }
    if let Some(raw) = &patch.price {
        let price = required("price", coerce_integer("price", raw)?)?;
        changes.price = Some(non_negative("price", price)?);
    }
    if let Some(raw) = &patch.publish_date {
        changes.publish_date = Some(required("publishDate", coerce_date("publishDate", raw)?)?);
    }
    if let Some(detail) = &patch.detail {
        changes.detail = Some(coerce_detail_patch(detail)?);
    }

    Ok(changes)
}

/// Coerce a sparse detail patch. All detail fields are nullable, so an
/// explicit `null` (or blank numeric string) clears the field.
pub fn coerce_detail_patch(patch: &BookDetailPatch) -> Result<DetailChanges, CatalogError> {
    let mut changes = DetailChanges::default();

    if let Some(raw) = &patch.description {
        changes.description = Some(optional(coerce_string("description", raw)?));
    }
    if let Some(raw) = &patch.language {
        changes.language = Some(optional(coerce_string("language", raw)?));
    }
    if let Some(raw) = &patch.page_count {
        let page_count = match coerce_integer("pageCount", raw)? {
            Coerced::Value(v) => Some(non_negative("pageCount", v)?),
            Coerced::Absent => None,
        };
        changes.page_count = Some(page_count);
    }
    if let Some(raw) = &patch.publisher {
        changes.publisher = Some(optional(coerce_string("publisher", raw)?));
    }
    if let Some(raw) = &patch.cover_image_url {
        changes.cover_image_url = Some(optional(coerce_string("coverImageUrl", raw)?));
    }
    if let Some(raw) = &patch.edition {
        changes.edition = Some(optional(coerce_string("edition", raw)?));
    }

    Ok(changes)
}

/// Apply typed changes to the aggregate, leaving unsupplied fields untouched.
/// The isbn slot is applied as-is; the conflict check happens in the service
/// before this call.
pub fn apply_changes(book: &mut Book, changes: BookChanges) {
    if let Some(title) = changes.title {
        book.title = title;
    }
    if let Some(author) = changes.author {
        book.author = author;
    }
    if let Some(isbn) = changes.isbn {
        book.isbn = isbn;
    }
    if let Some(price) = changes.price {
        book.price = price;
    }
    if let Some(publish_date) = changes.publish_date {
        book.publish_date = publish_date;
    }
    if let Some(detail_changes) = changes.detail {
        apply_detail_changes(book, detail_changes);
    }
}

/// Detail-only merge: lazily attaches an empty detail record (even for an
/// empty change set, matching the "detail map present" rule), then applies
/// each supplied slot.
pub fn apply_detail_changes(book: &mut Book, changes: DetailChanges) {
    let detail = book.attach_detail();

    if let Some(description) = changes.description {
        detail.description = description;
    }
    if let Some(language) = changes.language {
        detail.language = language;
    }
    if let Some(page_count) = changes.page_count {
        detail.page_count = page_count;
    }
    if let Some(publisher) = changes.publisher {
        detail.publisher = publisher;
    }
    if let Some(cover_image_url) = changes.cover_image_url {
        detail.cover_image_url = cover_image_url;
    }
    if let Some(edition) = changes.edition {
        detail.edition = edition;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::Month;

    fn sample_book() -> Book {
        Book {
            id: 7,
            title: "A".to_string(),
            author: "B".to_string(),
            isbn: "123".to_string(),
            price: 1000,
            publish_date: Date::from_calendar_date(2025, Month::January, 1).unwrap(),
            detail: None,
        }
    }

    fn field_of(err: CatalogError) -> &'static str {
        match err {
            CatalogError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn integer_accepts_number_and_numeric_string() {
        assert_eq!(
            coerce_integer("price", &json!(2000)).unwrap(),
            Coerced::Value(2000)
        );
        assert_eq!(
            coerce_integer("price", &json!("2000")).unwrap(),
            Coerced::Value(2000)
        );
        // Fractional input truncates.
        assert_eq!(
            coerce_integer("price", &json!(19.99)).unwrap(),
            Coerced::Value(19)
        );
    }

    #[test]
    fn integer_blank_or_null_is_absent() {
        assert_eq!(coerce_integer("price", &json!("")).unwrap(), Coerced::Absent);
        assert_eq!(
            coerce_integer("price", &json!("   ")).unwrap(),
            Coerced::Absent
        );
        assert_eq!(
            coerce_integer("price", &Value::Null).unwrap(),
            Coerced::Absent
        );
    }

    #[test]
    fn integer_rejects_garbage() {
        let err = coerce_integer("price", &json!("abc")).unwrap_err();
        assert_eq!(field_of(err), "price");

        let err = coerce_integer("price", &json!([1])).unwrap_err();
        assert_eq!(field_of(err), "price");
    }

    #[test]
    fn date_parses_strictly_and_names_format() {
        assert_eq!(
            coerce_date("publishDate", &json!("2025-05-07")).unwrap(),
            Coerced::Value(Date::from_calendar_date(2025, Month::May, 7).unwrap())
        );

        let err = coerce_date("publishDate", &json!("05/07/2025")).unwrap_err();
        match err {
            CatalogError::Validation { field, reason } => {
                assert_eq!(field, "publishDate");
                assert!(reason.contains("YYYY-MM-DD"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn null_on_non_nullable_field_is_rejected() {
        let patch: BookPatch = serde_json::from_value(json!({"title": null})).unwrap();
        let err = coerce_book_patch(&patch).unwrap_err();
        assert_eq!(field_of(err), "title");
    }

    #[test]
    fn null_on_nullable_detail_field_clears_it() {
        let mut book = sample_book();
        book.attach_detail().language = Some("en".to_string());

        let patch: BookDetailPatch = serde_json::from_value(json!({"language": null})).unwrap();
        let changes = coerce_detail_patch(&patch).unwrap();
        apply_detail_changes(&mut book, changes);

        assert_eq!(book.detail.as_ref().unwrap().language, None);
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let mut book = sample_book();
        let before = book.clone();

        let changes = coerce_book_patch(&BookPatch::default()).unwrap();
        apply_changes(&mut book, changes);

        assert_eq!(book, before);
    }

    #[test]
    fn untouched_fields_keep_their_values() {
        let mut book = sample_book();
        let patch: BookPatch =
            serde_json::from_value(json!({"price": 2000, "author": "C"})).unwrap();

        let changes = coerce_book_patch(&patch).unwrap();
        apply_changes(&mut book, changes);

        assert_eq!(book.price, 2000);
        assert_eq!(book.author, "C");
        assert_eq!(book.title, "A");
        assert_eq!(book.isbn, "123");
        assert!(book.detail.is_none());
    }

    #[test]
    fn detail_map_creates_detail_lazily() {
        let mut book = sample_book();
        let patch: BookPatch =
            serde_json::from_value(json!({"detail": {"language": "en"}})).unwrap();

        let changes = coerce_book_patch(&patch).unwrap();
        apply_changes(&mut book, changes);

        let detail = book.detail.as_ref().unwrap();
        assert_eq!(detail.book_id, book.id);
        assert_eq!(detail.language.as_deref(), Some("en"));
        assert_eq!(detail.description, None);
        assert_eq!(detail.page_count, None);
    }

    #[test]
    fn empty_detail_map_still_attaches_a_detail() {
        let mut book = sample_book();
        let patch: BookPatch = serde_json::from_value(json!({"detail": {}})).unwrap();

        let changes = coerce_book_patch(&patch).unwrap();
        apply_changes(&mut book, changes);

        assert!(book.detail.is_some());
    }

    #[test]
    fn page_count_coerces_from_string_and_rejects_negative() {
        let patch: BookDetailPatch =
            serde_json::from_value(json!({"pageCount": "320"})).unwrap();
        let changes = coerce_detail_patch(&patch).unwrap();
        assert_eq!(changes.page_count, Some(Some(320)));

        let patch: BookDetailPatch =
            serde_json::from_value(json!({"pageCount": -5})).unwrap();
        let err = coerce_detail_patch(&patch).unwrap_err();
        assert_eq!(field_of(err), "pageCount");
    }

    #[test]
    fn isbn_change_ignores_same_value() {
        let patch: BookPatch = serde_json::from_value(json!({"isbn": "123"})).unwrap();
        let changes = coerce_book_patch(&patch).unwrap();
        assert_eq!(changes.isbn_change("123"), None);
        assert_eq!(changes.isbn_change("456"), Some("123"));
    }

    #[test]
    fn negative_price_is_rejected() {
        let patch: BookPatch = serde_json::from_value(json!({"price": -1})).unwrap();
        let err = coerce_book_patch(&patch).unwrap_err();
        assert_eq!(field_of(err), "price");
    }
}
