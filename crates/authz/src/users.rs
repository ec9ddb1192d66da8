//! The `auth_user` account store.

use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use validator::{ValidateEmail, ValidationError};

use crate::error::AuthError;
use crate::password;

pub const USERNAME_MAX_LEN: usize = 150;

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, date_joined";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: OffsetDateTime,
}

/// Public view of a user; never carries the password hash
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Usernames are letters, digits and `@ . + - _`.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_username").with_message(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .into(),
        ))
    }
}

/// Email is optional; when given it must be a well-formed address.
pub fn validate_optional_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() || email.validate_email() {
        Ok(())
    } else {
        Err(ValidationError::new("email").with_message("Enter a valid email address.".into()))
    }
}

/// Hash the password and insert the account. A duplicate username maps to
/// [`AuthError::UsernameTaken`] whichever request lost the race.
pub async fn create_user(pool: &SqlitePool, new_user: NewUser) -> Result<User, AuthError> {
    let password_hash = password::hash_password_blocking(new_user.password).await?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO auth_user (username, email, password_hash, is_active, date_joined)
         VALUES (?, ?, ?, 1, ?)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&password_hash)
    .bind(OffsetDateTime::now_utc())
    .fetch_one(pool)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => AuthError::UsernameTaken,
        other => AuthError::Database(other),
    })?;

    tracing::info!(user_id = user.id, username = %user.username, "user created");
    Ok(user)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM auth_user WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM auth_user WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM auth_user")
        .fetch_one(pool)
        .await
}

/// Resolve an active account from a username/password pair.
pub async fn authenticate(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let Some(user) = find_by_username(pool, username).await? else {
        // Spend the same hashing time as a wrong password would.
        let _ = password::hash_password_blocking(password.to_string()).await;
        return Err(AuthError::InvalidCredentials);
    };

    let verified =
        password::verify_password_blocking(password.to_string(), user.password_hash.clone())
            .await;

    if !verified || !user.is_active {
        tracing::info!(username = %username, "authentication failed");
        return Err(AuthError::InvalidCredentials);
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::AUTH_MIGRATIONS;
    use bookstore_kernel::{settings::DatabaseSettings, Migration};

    async fn pool() -> SqlitePool {
        let pool = bookstore_db::connect(&DatabaseSettings::in_memory())
            .await
            .unwrap();
        let migrations: Vec<(String, Migration)> = AUTH_MIGRATIONS
            .iter()
            .map(|m| ("authz".to_string(), m.clone()))
            .collect();
        bookstore_db::migrate(&pool, &migrations).await.unwrap();
        pool
    }

    fn mohammed() -> NewUser {
        NewUser {
            username: "Mohammed".to_string(),
            email: "mohammed@example.com".to_string(),
            password: "passw0rd".to_string(),
        }
    }

    #[test]
    fn email_is_optional_but_checked() {
        assert!(validate_optional_email("").is_ok());
        assert!(validate_optional_email("mohammed@example.com").is_ok());
        let err = validate_optional_email("not-an-email").unwrap_err();
        assert_eq!(err.to_string(), "Enter a valid email address.");
    }

    #[tokio::test]
    async fn create_and_authenticate() {
        let pool = pool().await;
        let user = create_user(&pool, mohammed()).await.unwrap();
        assert_ne!(user.password_hash, "passw0rd");
        assert!(user.is_active);

        let found = authenticate(&pool, "Mohammed", "passw0rd").await.unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(count_users(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let pool = pool().await;
        create_user(&pool, mohammed()).await.unwrap();

        assert!(matches!(
            authenticate(&pool, "Mohammed", "wr0ng").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&pool, "nobody", "passw0rd").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn inactive_user_cannot_authenticate() {
        let pool = pool().await;
        let user = create_user(&pool, mohammed()).await.unwrap();
        sqlx::query("UPDATE auth_user SET is_active = 0 WHERE id = ?")
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            authenticate(&pool, "Mohammed", "passw0rd").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let pool = pool().await;
        create_user(&pool, mohammed()).await.unwrap();
        assert!(matches!(
            create_user(&pool, mohammed()).await,
            Err(AuthError::UsernameTaken)
        ));
        assert_eq!(count_users(&pool).await.unwrap(), 1);
    }

    #[test]
    fn username_charset() {
        assert!(validate_username("jane.doe+books@home_1-2").is_ok());
        assert!(validate_username("jane doe").is_err());
        assert!(validate_username("semi;colon").is_err());
    }
}
