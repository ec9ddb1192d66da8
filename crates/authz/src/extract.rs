use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
};
use bookstore_http::AppError;
use bookstore_kernel::AppState;

use crate::error::AuthError;
use crate::tokens::{TokenService, TokenType};
use crate::users;

/// The caller behind a valid `Authorization: Bearer <access token>` header.
///
/// Rejects with 401 when the header is missing, the token does not verify,
/// or the account no longer exists or was deactivated.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)?;
        let token = bearer_token(header)?;

        let claims =
            TokenService::from_settings(&state.settings.auth).verify(token, TokenType::Access)?;

        let user = users::find_by_id(&state.db, claims.user_id()?)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AuthError::UserNotFound)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
        })
    }
}

/// Extract the token from a `Bearer` header. Other schemes count as no
/// credentials at all; a bare `Bearer` is a malformed token.
fn bearer_token(header: &HeaderValue) -> Result<&str, AuthError> {
    let value = header.to_str().map_err(|_| AuthError::InvalidToken)?;
    let mut parts = value.split_whitespace();

    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        (Some(scheme), _, _) if scheme.eq_ignore_ascii_case("bearer") => {
            Err(AuthError::InvalidToken)
        }
        _ => Err(AuthError::MissingCredentials),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(value: &'static str) -> HeaderValue {
        HeaderValue::from_static(value)
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token(&header("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(&header("bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn other_schemes_are_missing_credentials() {
        assert!(matches!(
            bearer_token(&header("Basic dXNlcjpwYXNz")),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[test]
    fn malformed_bearer_is_invalid() {
        assert!(matches!(
            bearer_token(&header("Bearer")),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            bearer_token(&header("Bearer a b")),
            Err(AuthError::InvalidToken)
        ));
    }
}
