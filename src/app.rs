//! Application bootstrap shared by the server binary, the admin CLI and tests.

use anyhow::Context;
use bookstore_kernel::{settings::Settings, AppState, InitCtx, ModuleRegistry};

use crate::modules;

/// A connected, migrated application ready to serve.
pub struct Prepared {
    pub registry: ModuleRegistry,
    pub state: AppState,
}

impl Prepared {
    pub fn router(&self) -> axum::Router {
        bookstore_http::build_router(&self.registry, self.state.clone())
    }
}

/// Build the registry, open the database and apply pending migrations.
pub async fn prepare(settings: Settings) -> anyhow::Result<Prepared> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);

    let db = bookstore_db::connect(&settings.database)
        .await
        .context("failed to open database")?;

    let applied = bookstore_db::migrate(&db, &registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, "migrations complete");

    Ok(Prepared {
        registry,
        state: AppState::new(settings, db),
    })
}

/// Boot every module, serve HTTP until shutdown, then stop the modules.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let prepared = prepare(settings).await?;
    let Prepared { registry, state } = &prepared;

    let ctx = InitCtx {
        settings: &state.settings,
        db: &state.db,
    };
    registry.boot(&ctx).await?;

    let served = bookstore_http::start_server(registry, state.clone()).await;

    registry.shutdown().await?;
    state.db.close().await;
    served
}
