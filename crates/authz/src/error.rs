use bookstore_http::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No active account found with the given credentials")]
    InvalidCredentials,

    #[error("Authentication credentials were not provided.")]
    MissingCredentials,

    #[error("Given token not valid for any token type")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("A user with that username already exists.")]
    UsernameTaken,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::InvalidCredentials => {
                AppError::unauthorized_with_code("no_active_account", message)
            }
            AuthError::MissingCredentials => {
                AppError::unauthorized_with_code("not_authenticated", message)
            }
            AuthError::InvalidToken => AppError::unauthorized_with_code("token_not_valid", message),
            AuthError::UserNotFound => AppError::unauthorized_with_code("user_not_found", message),
            AuthError::UsernameTaken => AppError::field("username", message),
            AuthError::Hashing(_) | AuthError::Encoding(_) => {
                AppError::Internal(anyhow::Error::new(err))
            }
            AuthError::Database(db) => AppError::from(db),
        }
    }
}
