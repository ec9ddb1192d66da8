//! SQL access for books and reviews.

use std::collections::HashMap;

use sqlx::SqlitePool;
use thiserror::Error;
use time::OffsetDateTime;

use super::models::{Book, NewBook, Review};

const BOOK_COLUMNS: &str = "id, title, author, description, file, publish_date, created_at";
const REVIEW_COLUMNS: &str = "id, user_id, book_id, review_text, rating, created_at";

#[derive(Debug, Error)]
pub enum ReviewInsertError {
    #[error("The fields user, book must make a unique set.")]
    Duplicate,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub async fn create_book(pool: &SqlitePool, new_book: &NewBook) -> Result<Book, sqlx::Error> {
    let book = sqlx::query_as::<_, Book>(&format!(
        "INSERT INTO book (title, author, description, file, publish_date, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING {BOOK_COLUMNS}"
    ))
    .bind(&new_book.title)
    .bind(&new_book.author)
    .bind(&new_book.description)
    .bind(&new_book.file)
    .bind(new_book.publish_date)
    .bind(OffsetDateTime::now_utc())
    .fetch_one(pool)
    .await?;

    tracing::info!(book_id = book.id, title = %book.title, "book created");
    Ok(book)
}

pub async fn list_books(pool: &SqlitePool) -> Result<Vec<Book>, sqlx::Error> {
    sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM book ORDER BY id"))
        .fetch_all(pool)
        .await
}

pub async fn get_book(pool: &SqlitePool, id: i64) -> Result<Option<Book>, sqlx::Error> {
    sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM book WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Every review grouped by book id, each group ordered by review id.
pub async fn reviews_by_book(pool: &SqlitePool) -> Result<HashMap<i64, Vec<Review>>, sqlx::Error> {
    let reviews = list_reviews(pool).await?;

    let mut grouped: HashMap<i64, Vec<Review>> = HashMap::new();
    for review in reviews {
        grouped.entry(review.book_id).or_default().push(review);
    }
    Ok(grouped)
}

pub async fn reviews_for_book(pool: &SqlitePool, book_id: i64) -> Result<Vec<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM review WHERE book_id = ? ORDER BY id"
    ))
    .bind(book_id)
    .fetch_all(pool)
    .await
}

pub async fn list_reviews(pool: &SqlitePool) -> Result<Vec<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>(&format!("SELECT {REVIEW_COLUMNS} FROM review ORDER BY id"))
        .fetch_all(pool)
        .await
}

pub async fn get_review(pool: &SqlitePool, id: i64) -> Result<Option<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>(&format!("SELECT {REVIEW_COLUMNS} FROM review WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn review_exists(
    pool: &SqlitePool,
    user_id: i64,
    book_id: i64,
) -> Result<bool, sqlx::Error> {
    let found: i64 =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM review WHERE user_id = ? AND book_id = ?)")
            .bind(user_id)
            .bind(book_id)
            .fetch_one(pool)
            .await?;
    Ok(found != 0)
}

pub async fn count_reviews(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM review")
        .fetch_one(pool)
        .await
}

/// Insert a review. The `(user_id, book_id)` unique index is the final
/// arbiter; its violation is reported as [`ReviewInsertError::Duplicate`].
pub async fn insert_review(
    pool: &SqlitePool,
    user_id: i64,
    book_id: i64,
    review_text: &str,
    rating: i64,
) -> Result<Review, ReviewInsertError> {
    sqlx::query_as::<_, Review>(&format!(
        "INSERT INTO review (user_id, book_id, review_text, rating, created_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(user_id)
    .bind(book_id)
    .bind(review_text)
    .bind(rating)
    .bind(OffsetDateTime::now_utc())
    .fetch_one(pool)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => ReviewInsertError::Duplicate,
        other => ReviewInsertError::Database(other),
    })
}
