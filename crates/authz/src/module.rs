use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use bookstore_http::{AppError, ValidatedJson};
use bookstore_kernel::{AppState, InitCtx, Migration, Module};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::tokens::{TokenPair, TokenService};
use crate::users;

pub const AUTH_MIGRATIONS: &[Migration] = &[Migration {
    id: "001_auth_user",
    up: r#"
        CREATE TABLE auth_user (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            username      TEXT    NOT NULL UNIQUE CHECK (length(username) > 0),
            email         TEXT    NOT NULL DEFAULT '',
            password_hash TEXT    NOT NULL,
            is_active     INTEGER NOT NULL DEFAULT 1,
            date_joined   TEXT    NOT NULL
        );
    "#,
}];

/// Token exchange endpoints and the account table
pub struct AuthModule;

impl AuthModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for AuthModule {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(required(message = "This field is required."))]
    pub username: Option<String>,
    #[validate(required(message = "This field is required."))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(required(message = "This field is required."))]
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access: String,
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "authz"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let accounts = users::count_users(ctx.db).await?;
        tracing::info!(
            module = self.name(),
            accounts,
            access_ttl_secs = ctx.settings.auth.access_token_ttl_secs,
            refresh_ttl_secs = ctx.settings.auth.refresh_token_ttl_secs,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router<AppState> {
        Router::new()
            .route("/user/login/", post(login))
            .route("/user/token/refresh/", post(refresh))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({
            "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } }
        });

        Some(json!({
            "paths": {
                "/user/login/": {
                    "post": {
                        "summary": "Exchange credentials for an access/refresh token pair",
                        "tags": ["Auth"],
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/LoginRequest" } } }
                        },
                        "responses": {
                            "200": {
                                "description": "Token pair",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/TokenPair" } } }
                            },
                            "400": { "description": "Missing fields", "content": error },
                            "401": { "description": "Bad credentials", "content": error }
                        }
                    }
                },
                "/user/token/refresh/": {
                    "post": {
                        "summary": "Exchange a refresh token for a new access token",
                        "tags": ["Auth"],
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/RefreshRequest" } } }
                        },
                        "responses": {
                            "200": {
                                "description": "New access token",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/AccessToken" } } }
                            },
                            "400": { "description": "Missing fields", "content": error },
                            "401": { "description": "Invalid or expired token", "content": error }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "LoginRequest": {
                        "type": "object",
                        "properties": {
                            "username": { "type": "string" },
                            "password": { "type": "string", "format": "password" }
                        },
                        "required": ["username", "password"]
                    },
                    "RefreshRequest": {
                        "type": "object",
                        "properties": { "refresh": { "type": "string" } },
                        "required": ["refresh"]
                    },
                    "TokenPair": {
                        "type": "object",
                        "properties": {
                            "refresh": { "type": "string" },
                            "access": { "type": "string" }
                        },
                        "required": ["refresh", "access"]
                    },
                    "AccessToken": {
                        "type": "object",
                        "properties": { "access": { "type": "string" } },
                        "required": ["access"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        AUTH_MIGRATIONS.to_vec()
    }
}

/// `POST /user/login/`
async fn login(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let username = body.username.unwrap_or_default();
    let password = body.password.unwrap_or_default();

    let user = users::authenticate(&state.db, &username, &password).await?;
    let pair = TokenService::from_settings(&state.settings.auth).issue_pair(user.id)?;

    tracing::info!(user_id = user.id, "token pair issued");
    Ok(Json(pair))
}

/// `POST /user/token/refresh/`
async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RefreshRequest>,
) -> Result<Json<AccessToken>, AppError> {
    let refresh = body.refresh.unwrap_or_default();
    let access = TokenService::from_settings(&state.settings.auth).refresh(&refresh)?;
    Ok(Json(AccessToken { access }))
}

/// Create a new instance of the auth module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(AuthModule::new())
}
