use async_trait::async_trait;
use axum::Router;
use sqlx::SqlitePool;

use crate::settings::Settings;
use crate::state::AppState;

/// Borrowed view of the application handed to lifecycle hooks.
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
    pub db: &'a SqlitePool,
}

/// A named SQL script. `(module, id)` is recorded once applied.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// A feature slice of the service: routes, schema, docs and lifecycle.
///
/// Every hook has a no-op default so a module only overrides what it owns.
#[async_trait]
pub trait Module: Sync + Send {
    /// Stable identifier, also used as the migration namespace
    fn name(&self) -> &'static str;

    /// Runs once the schema is migrated, before the server accepts requests
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes with absolute paths, merged into the application router
    fn routes(&self) -> Router<AppState> {
        Router::new()
    }

    /// OpenAPI `paths` and `components.schemas` contributed to the merged document
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Schema scripts; applied in `id` order within this module
    fn migrations(&self) -> Vec<Migration> {
        Vec::new()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
