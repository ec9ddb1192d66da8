//! User accounts and bearer-token authentication.
//!
//! Owns the `auth_user` table, argon2 password hashing, JWT access/refresh
//! token issuance and the [`AuthUser`] request guard. The login and
//! token-refresh endpoints are exposed by [`AuthModule`].

pub mod error;
pub mod extract;
pub mod module;
pub mod password;
pub mod tokens;
pub mod users;

pub use error::AuthError;
pub use extract::AuthUser;
pub use module::{create_module, AuthModule};
pub use tokens::{Claims, TokenPair, TokenService, TokenType};
pub use users::{NewUser, User};
