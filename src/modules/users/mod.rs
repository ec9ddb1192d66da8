use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use bookstore_authz::users::{
    self, validate_optional_email, validate_username, NewUser, UserSummary, USERNAME_MAX_LEN,
};
use bookstore_http::{AppError, ValidatedJson};
use bookstore_kernel::{AppState, Module};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

/// Self-service account registration
pub struct UsersModule;

impl UsersModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for UsersModule {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        required(message = "This field is required."),
        length(
            min = 1,
            max = 150,
            message = "Ensure this field has between 1 and 150 characters."
        ),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,
    /// May be omitted or blank
    #[validate(custom(function = "validate_optional_email"))]
    pub email: Option<String>,
    #[validate(
        required(message = "This field is required."),
        length(min = 1, message = "This field may not be blank.")
    )]
    pub password: Option<String>,
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    fn routes(&self) -> Router<AppState> {
        Router::new().route("/user/register/", post(register))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/user/register/": {
                    "post": {
                        "summary": "Register a new user",
                        "tags": ["Users"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": { "schema": { "$ref": "#/components/schemas/RegisterRequest" } }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "User created",
                                "content": {
                                    "application/json": { "schema": { "$ref": "#/components/schemas/User" } }
                                }
                            },
                            "400": {
                                "description": "Missing or invalid fields, or username taken",
                                "content": {
                                    "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "RegisterRequest": {
                        "type": "object",
                        "properties": {
                            "username": { "type": "string", "maxLength": USERNAME_MAX_LEN },
                            "email": { "type": "string", "format": "email" },
                            "password": { "type": "string", "format": "password", "writeOnly": true }
                        },
                        "required": ["username", "password"]
                    },
                    "User": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "username": { "type": "string" },
                            "email": { "type": "string", "format": "email" }
                        },
                        "required": ["id", "username", "email"]
                    }
                }
            }
        }))
    }
}

/// `POST /user/register/`
async fn register(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserSummary>), AppError> {
    let user = users::create_user(
        &state.db,
        NewUser {
            username: body.username.unwrap_or_default(),
            email: body.email.unwrap_or_default(),
            password: body.password.unwrap_or_default(),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Create a new instance of the users module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(UsersModule::new())
}
