use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::format_description::BorrowedFormatItem;
use time::Date;

/// Surrogate identifier assigned by the store on first persist.
pub type BookId = u64;

/// Canonical textual form for publish dates.
const DATE_FORMAT: &'static [BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]");

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Parse a date in the canonical `YYYY-MM-DD` form, strictly.
pub(crate) fn parse_iso_date(value: &str) -> Result<Date, time::error::Parse> {
    Date::parse(value, DATE_FORMAT)
}

/// Aggregate root for the catalog: a book and its optional detail record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub price: u32,
    pub publish_date: Date,
    /// Exclusively owned: the detail cannot outlive this book or be shared.
    pub detail: Option<BookDetail>,
}

impl Book {
    /// Return the detail record, lazily attaching an empty one first if the
    /// book has none yet. The back reference is set here and nowhere else,
    /// so the two sides of the relation can never disagree.
    pub fn attach_detail(&mut self) -> &mut BookDetail {
        let book_id = self.id;
        self.detail.get_or_insert_with(|| BookDetail::new(book_id))
    }
}

/// Dependent record joined 1:1 with exactly one book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDetail {
    /// Assigned by the store on the first save after the detail is attached.
    pub id: Option<u64>,
    /// Back reference to the owning book; never mutated after attach.
    pub book_id: BookId,
    pub description: Option<String>,
    pub language: Option<String>,
    pub page_count: Option<u32>,
    pub publisher: Option<String>,
    pub cover_image_url: Option<String>,
    pub edition: Option<String>,
}

impl BookDetail {
    pub(crate) fn new(book_id: BookId) -> Self {
        Self {
            id: None,
            book_id,
            description: None,
            language: None,
            page_count: None,
            publisher: None,
            cover_image_url: None,
            edition: None,
        }
    }
}

/// A book that has not been persisted yet; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub price: u32,
    pub publish_date: Date,
}

/// Request body for create and full-replace: every field is mandatory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub price: i64,
    #[serde(with = "iso_date")]
    pub publish_date: Date,
}

/// Deserialization helper that keeps an explicitly supplied `null` around as
/// `Some(Value::Null)`, so it can be told apart from an omitted key (`None`
/// via `#[serde(default)]`).
fn raw_field<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Sparse update descriptor for a book: each schema field is an explicit
/// optional slot holding the raw, not-yet-coerced JSON value.
///
/// Unknown keys in the payload are ignored by policy, so callers can send
/// forward-compatible payloads without breaking.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    #[serde(default, deserialize_with = "raw_field")]
    pub title: Option<Value>,
    #[serde(default, deserialize_with = "raw_field")]
    pub author: Option<Value>,
    #[serde(default, deserialize_with = "raw_field")]
    pub isbn: Option<Value>,
    #[serde(default, deserialize_with = "raw_field")]
    pub price: Option<Value>,
    #[serde(default, deserialize_with = "raw_field")]
    pub publish_date: Option<Value>,
    #[serde(default)]
    pub detail: Option<BookDetailPatch>,
}

/// Sparse update descriptor for the detail record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetailPatch {
    #[serde(default, deserialize_with = "raw_field")]
    pub description: Option<Value>,
    #[serde(default, deserialize_with = "raw_field")]
    pub language: Option<Value>,
    #[serde(default, deserialize_with = "raw_field")]
    pub page_count: Option<Value>,
    #[serde(default, deserialize_with = "raw_field")]
    pub publisher: Option<Value>,
    #[serde(default, deserialize_with = "raw_field")]
    pub cover_image_url: Option<Value>,
    #[serde(default, deserialize_with = "raw_field")]
    pub edition: Option<Value>,
}

/// Response projection for a book; the detail is inlined when present and
/// omitted entirely when absent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub price: u32,
    #[serde(with = "iso_date")]
    pub publish_date: Date,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<BookDetailResponse>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            isbn: book.isbn,
            price: book.price,
            publish_date: book.publish_date,
            detail: book.detail.map(BookDetailResponse::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetailResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
}

impl From<BookDetail> for BookDetailResponse {
    fn from(detail: BookDetail) -> Self {
        Self {
            description: detail.description,
            language: detail.language,
            page_count: detail.page_count,
            publisher: detail.publisher,
            cover_image_url: detail.cover_image_url,
            edition: detail.edition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::Month;

    fn sample_book() -> Book {
        Book {
            id: 1,
            title: "A".to_string(),
            author: "B".to_string(),
            isbn: "123".to_string(),
            price: 1000,
            publish_date: Date::from_calendar_date(2025, Month::January, 1).unwrap(),
            detail: None,
        }
    }

    #[test]
    fn iso_date_round_trip() {
        let date = parse_iso_date("2025-05-07").unwrap();
        assert_eq!(
            date,
            Date::from_calendar_date(2025, Month::May, 7).unwrap()
        );

        // Re-renders through the response projection in canonical form.
        let mut book = sample_book();
        book.publish_date = date;
        let body = serde_json::to_value(BookResponse::from(book)).unwrap();
        assert_eq!(body["publishDate"], "2025-05-07");
    }

    #[test]
    fn iso_date_rejects_other_forms() {
        assert!(parse_iso_date("07/05/2025").is_err());
        assert!(parse_iso_date("2025-5-7").is_err());
        assert!(parse_iso_date("").is_err());
    }

    #[test]
    fn attach_detail_sets_back_reference_once() {
        let mut book = sample_book();
        book.attach_detail().language = Some("en".to_string());

        let detail = book.detail.as_ref().unwrap();
        assert_eq!(detail.book_id, 1);
        assert_eq!(detail.language.as_deref(), Some("en"));

        // Re-attaching returns the existing record instead of replacing it.
        book.attach_detail().edition = Some("2nd".to_string());
        let detail = book.detail.as_ref().unwrap();
        assert_eq!(detail.language.as_deref(), Some("en"));
        assert_eq!(detail.edition.as_deref(), Some("2nd"));
    }

    #[test]
    fn response_omits_absent_detail() {
        let response = BookResponse::from(sample_book());
        let body = serde_json::to_value(&response).unwrap();
        assert!(body.get("detail").is_none());
        assert_eq!(body["publishDate"], "2025-01-01");
    }

    #[test]
    fn response_inlines_present_detail() {
        let mut book = sample_book();
        book.attach_detail().language = Some("en".to_string());

        let body = serde_json::to_value(BookResponse::from(book)).unwrap();
        assert_eq!(body["detail"]["language"], "en");
        assert!(body["detail"].get("publisher").is_none());
    }

    #[test]
    fn patch_distinguishes_null_from_missing() {
        let patch: BookPatch = serde_json::from_value(json!({"title": null})).unwrap();
        assert_eq!(patch.title, Some(Value::Null));
        assert!(patch.author.is_none());
    }

    #[test]
    fn patch_ignores_unknown_keys() {
        let patch: BookPatch =
            serde_json::from_value(json!({"price": 2000, "futureField": true})).unwrap();
        assert_eq!(patch.price, Some(json!(2000)));
    }
}
