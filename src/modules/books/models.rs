use bookstore_kernel::settings::MediaSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use validator::{Validate, ValidationError};

pub const RATING_MIN: i64 = 0;
pub const RATING_MAX: i64 = 5;

/// A stored book row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Path relative to the media root, e.g. `books/dune.pdf`
    pub file: Option<String>,
    pub publish_date: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

/// A stored review row. At most one per `(user_id, book_id)`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub review_text: String,
    pub rating: i64,
    pub created_at: OffsetDateTime,
}

/// Fields needed to insert a book.
#[derive(Debug, Clone, Validate)]
pub struct NewBook {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub author: String,
    pub description: String,
    pub file: Option<String>,
    pub publish_date: OffsetDateTime,
}

/// Body of `POST /books/{id}/add_review/`. The owner and the book come from
/// the caller's token and the path; anything the client sends for them is
/// ignored.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(
        required(message = "This field is required."),
        custom(function = "validate_not_blank")
    )]
    pub review_text: Option<String>,
    /// Raw JSON; any non-integral or out-of-range value is a `rating` error
    #[validate(
        required(message = "This field is required."),
        custom(function = "validate_rating")
    )]
    pub rating: Option<Value>,
}

impl CreateReviewRequest {
    /// Review text with surrounding whitespace removed
    pub fn text(&self) -> &str {
        self.review_text.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn rating_value(&self) -> Option<i64> {
        self.rating.as_ref().and_then(|raw| parse_rating(raw).ok())
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank").with_message("This field may not be blank.".into()))
    } else {
        Ok(())
    }
}

fn validate_rating(value: &Value) -> Result<(), ValidationError> {
    parse_rating(value).map(|_| ())
}

/// Accepts integral numbers (`4`, `4.0`) and numeric strings (`"4"`), then
/// bounds-checks against `RATING_MIN..=RATING_MAX`.
pub fn parse_rating(value: &Value) -> Result<i64, ValidationError> {
    let raw = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    let rating = raw
        .filter(|r| r.is_finite() && r.fract() == 0.0)
        .ok_or_else(|| {
            ValidationError::new("invalid").with_message("A valid integer is required.".into())
        })?;

    if rating < RATING_MIN as f64 || rating > RATING_MAX as f64 {
        return Err(ValidationError::new("range").with_message(
            format!("Ensure this value is between {RATING_MIN} and {RATING_MAX}.").into(),
        ));
    }
    Ok(rating as i64)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub id: i64,
    pub user: i64,
    pub book: i64,
    pub review_text: String,
    pub rating: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            user: review.user_id,
            book: review.book_id,
            review_text: review.review_text,
            rating: review.rating,
            created_at: review.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookResponse {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Public URL of the uploaded file
    pub file: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub publish_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub reviews: Vec<ReviewResponse>,
}

impl BookResponse {
    pub fn new(book: Book, reviews: Vec<Review>, media: &MediaSettings) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            description: book.description,
            file: book.file.as_deref().map(|path| media.url_for(path)),
            publish_date: book.publish_date,
            created_at: book.created_at,
            reviews: reviews.into_iter().map(ReviewResponse::from).collect(),
        }
    }
}
