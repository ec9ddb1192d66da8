use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bookstore_authz::AuthUser;
use bookstore_http::{error::NON_FIELD_ERRORS, AppError, ValidatedJson};
use bookstore_kernel::AppState;

use super::models::{BookResponse, CreateReviewRequest, ReviewResponse};
use super::store::{self, ReviewInsertError};

/// Non-numeric ids cannot match any row.
fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::not_found(format!("No {what} matches the given query.")))
}

/// `GET /books/`
pub async fn list_books(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<BookResponse>>, AppError> {
    let books = store::list_books(&state.db).await?;
    let mut reviews = store::reviews_by_book(&state.db).await?;

    let media = &state.settings.media;
    let response = books
        .into_iter()
        .map(|book| {
            let book_reviews = reviews.remove(&book.id).unwrap_or_default();
            BookResponse::new(book, book_reviews, media)
        })
        .collect();

    Ok(Json(response))
}

/// `GET /books/{id}/`
pub async fn get_book(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<BookResponse>, AppError> {
    let id = parse_id(&id, "Book")?;
    let book = store::get_book(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("No Book matches the given query."))?;
    let reviews = store::reviews_for_book(&state.db, book.id).await?;

    Ok(Json(BookResponse::new(book, reviews, &state.settings.media)))
}

/// `POST /books/{id}/add_review/`
///
/// The book is looked up before the body is validated, so an unknown book is
/// a 404 whatever the payload.
pub async fn add_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: Result<ValidatedJson<CreateReviewRequest>, AppError>,
) -> Result<(StatusCode, Json<ReviewResponse>), AppError> {
    let book_id = parse_id(&id, "Book")?;
    let book = store::get_book(&state.db, book_id)
        .await?
        .ok_or_else(|| AppError::not_found("No Book matches the given query."))?;

    let ValidatedJson(body) = payload?;
    let Some(rating) = body.rating_value() else {
        return Err(AppError::field("rating", "A valid integer is required."));
    };
    let review_text = body.text();

    let duplicate = || AppError::field(NON_FIELD_ERRORS, ReviewInsertError::Duplicate.to_string());

    if store::review_exists(&state.db, user.id, book.id).await? {
        return Err(duplicate());
    }

    let review = store::insert_review(&state.db, user.id, book.id, review_text, rating)
        .await
        .map_err(|err| match err {
            ReviewInsertError::Duplicate => duplicate(),
            ReviewInsertError::Database(db) => AppError::from(db),
        })?;

    tracing::info!(
        review_id = review.id,
        book_id = book.id,
        user_id = user.id,
        rating,
        "review added"
    );

    Ok((StatusCode::CREATED, Json(review.into())))
}

/// `GET /reviews/`
pub async fn list_reviews(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReviewResponse>>, AppError> {
    let reviews = store::list_reviews(&state.db).await?;
    Ok(Json(reviews.into_iter().map(ReviewResponse::from).collect()))
}

/// `GET /reviews/{id}/`
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReviewResponse>, AppError> {
    let id = parse_id(&id, "Review")?;
    let review = store::get_review(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("No Review matches the given query."))?;
    Ok(Json(review.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_numeric_id_is_not_found() {
        assert!(matches!(parse_id("abc", "Book"), Err(AppError::NotFound { .. })));
        assert_eq!(parse_id("12", "Book").unwrap(), 12);
    }
}
