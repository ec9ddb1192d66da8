use bookstore_kernel::Migration;
use sqlx::SqlitePool;
use thiserror::Error;

const LEDGER_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    );
"#;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to prepare migration ledger: {0}")]
    Ledger(#[source] sqlx::Error),

    #[error("migration {module}/{id} failed: {source}")]
    Apply {
        module: String,
        id: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Apply every migration not yet recorded in the `_migrations` ledger.
///
/// Each migration runs in its own transaction together with its ledger row,
/// so a failure leaves earlier migrations applied and the failing one absent.
/// Returns the number of migrations applied by this call.
pub async fn migrate(
    pool: &SqlitePool,
    migrations: &[(String, Migration)],
) -> Result<usize, MigrationError> {
    sqlx::raw_sql(LEDGER_DDL)
        .execute(pool)
        .await
        .map_err(MigrationError::Ledger)?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let apply = |source| MigrationError::Apply {
            module: module.clone(),
            id: migration.id,
            source,
        };

        let already: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM _migrations WHERE module = ? AND id = ?")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(pool)
                .await
                .map_err(apply)?;
        if already.is_some() {
            tracing::debug!(module = %module, id = migration.id, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await.map_err(apply)?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .map_err(apply)?;
        sqlx::query("INSERT INTO _migrations (module, id) VALUES (?, ?)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .map_err(apply)?;
        tx.commit().await.map_err(apply)?;

        tracing::info!(module = %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect;
    use bookstore_kernel::settings::DatabaseSettings;

    fn migrations() -> Vec<(String, Migration)> {
        vec![
            (
                "books".to_string(),
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE shelf (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
                },
            ),
            (
                "books".to_string(),
                Migration {
                    id: "002_seed",
                    up: "INSERT INTO shelf (name) VALUES ('fiction');",
                },
            ),
        ]
    }

    #[tokio::test]
    async fn applies_each_migration_once() {
        let pool = connect(&DatabaseSettings::in_memory()).await.unwrap();

        assert_eq!(migrate(&pool, &migrations()).await.unwrap(), 2);
        assert_eq!(migrate(&pool, &migrations()).await.unwrap(), 0);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shelf")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let pool = connect(&DatabaseSettings::in_memory()).await.unwrap();
        let broken = vec![(
            "books".to_string(),
            Migration {
                id: "001_broken",
                up: "CREATE TABLE nope (",
            },
        )];

        let err = migrate(&pool, &broken).await.unwrap_err();
        assert!(matches!(err, MigrationError::Apply { id: "001_broken", .. }));

        let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(recorded, 0);
    }
}
