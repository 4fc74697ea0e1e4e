//! Version-tracked schema migrations for the libSQL registry backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::RegistryError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "merchants_schema",
    sql: r#"
        CREATE TABLE IF NOT EXISTS merchants (
            merchant_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            shop_name TEXT,
            shop_url TEXT,
            bot_name TEXT,
            platform TEXT,
            custom_url_pattern TEXT,
            target_customer TEXT,
            customer_persona TEXT,
            bot_tone TEXT,
            prompt_text TEXT,
            top_questions TEXT,
            top_products TEXT,
            primary_color TEXT,
            secondary_color TEXT,
            logo_url TEXT,

            onboarding_status TEXT NOT NULL DEFAULT 'pending',

            step_merchant_record_completed INTEGER NOT NULL DEFAULT 0,
            step_merchant_record_completed_at TEXT,
            step_folders_created INTEGER NOT NULL DEFAULT 0,
            step_folders_created_at TEXT,
            step_products_processed INTEGER NOT NULL DEFAULT 0,
            step_products_processed_at TEXT,
            step_categories_processed INTEGER NOT NULL DEFAULT 0,
            step_categories_processed_at TEXT,
            step_documents_converted INTEGER NOT NULL DEFAULT 0,
            step_documents_converted_at TEXT,
            step_search_index_setup INTEGER NOT NULL DEFAULT 0,
            step_search_index_setup_at TEXT,
            step_config_generated INTEGER NOT NULL DEFAULT 0,
            step_config_generated_at TEXT,
            step_onboarding_completed INTEGER NOT NULL DEFAULT 0,
            step_onboarding_completed_at TEXT,

            product_count INTEGER NOT NULL DEFAULT 0,
            category_count INTEGER NOT NULL DEFAULT 0,
            document_count INTEGER NOT NULL DEFAULT 0,

            datastore_id TEXT,
            datastore_status TEXT,
            config_path TEXT,
            last_error TEXT,
            last_run_at TEXT,

            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_merchants_user ON merchants(user_id);
        CREATE INDEX IF NOT EXISTS idx_merchants_updated ON merchants(updated_at);
    "#,
}];

/// Apply all pending migrations.
pub async fn run_migrations(conn: &Connection) -> Result<(), RegistryError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| RegistryError::Migration(format!("Failed to create _migrations: {e}")))?;

    let current = current_version(conn).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql)
            .await
            .map_err(|e| {
                RegistryError::Migration(format!(
                    "Migration v{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
        conn.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            libsql::params![migration.version, migration.name],
        )
        .await
        .map_err(|e| {
            RegistryError::Migration(format!(
                "Failed to record migration v{}: {e}",
                migration.version
            ))
        })?;
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applied migration"
        );
    }

    Ok(())
}

async fn current_version(conn: &Connection) -> Result<i64, RegistryError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| RegistryError::Migration(format!("Failed to read version: {e}")))?;
    match rows
        .next()
        .await
        .map_err(|e| RegistryError::Migration(e.to_string()))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| RegistryError::Migration(e.to_string())),
        None => Ok(0),
    }
}
