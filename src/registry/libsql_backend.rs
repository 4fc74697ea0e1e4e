//! libSQL registry backend — async `MerchantRegistry` implementation.
//!
//! Supports local file and in-memory databases. Step updates are single
//! UPDATE statements targeting named columns only, so concurrent updates
//! to different steps of the same row never require a prior read.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Value};
use tracing::info;

use crate::error::RegistryError;
use crate::registry::migrations;
use crate::registry::model::{
    LedgerStep, MerchantFields, MerchantRecord, StepMark, StepUpdate,
};
use crate::registry::traits::MerchantRegistry;

/// libSQL merchant registry.
pub struct LibSqlRegistry {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlRegistry {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, RegistryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RegistryError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| RegistryError::Pool(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| RegistryError::Pool(format!("Failed to create connection: {e}")))?;
        let registry = Self {
            db: Arc::new(db),
            conn,
        };
        registry.run_migrations().await?;
        info!(path = %path.display(), "Merchant registry opened");
        Ok(registry)
    }

    /// Create an in-memory registry (for tests).
    pub async fn new_memory() -> Result<Self, RegistryError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| RegistryError::Pool(format!("Failed to create in-memory db: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| RegistryError::Pool(format!("Failed to create connection: {e}")))?;
        let registry = Self {
            db: Arc::new(db),
            conn,
        };
        registry.run_migrations().await?;
        Ok(registry)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_datetime(&s))
}

fn query_err(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Query(e.to_string())
}

/// Fixed column order shared by every SELECT; must match `row_to_record`.
const SELECT_COLUMNS: &str = "merchant_id, user_id, shop_name, shop_url, bot_name, platform, \
     custom_url_pattern, target_customer, customer_persona, bot_tone, prompt_text, \
     top_questions, top_products, primary_color, secondary_color, logo_url, \
     onboarding_status, \
     step_merchant_record_completed, step_merchant_record_completed_at, \
     step_folders_created, step_folders_created_at, \
     step_products_processed, step_products_processed_at, \
     step_categories_processed, step_categories_processed_at, \
     step_documents_converted, step_documents_converted_at, \
     step_search_index_setup, step_search_index_setup_at, \
     step_config_generated, step_config_generated_at, \
     step_onboarding_completed, step_onboarding_completed_at, \
     product_count, category_count, document_count, \
     datastore_id, datastore_status, config_path, last_error, last_run_at, \
     created_at, updated_at";

fn step_mark(row: &libsql::Row, flag_idx: i32) -> Result<StepMark, libsql::Error> {
    Ok(StepMark {
        completed: row.get::<i64>(flag_idx)? != 0,
        completed_at: parse_optional_datetime(row.get::<Option<String>>(flag_idx + 1)?),
    })
}

fn row_to_record(row: &libsql::Row) -> Result<MerchantRecord, libsql::Error> {
    let fields = MerchantFields {
        shop_name: row.get(2)?,
        shop_url: row.get(3)?,
        bot_name: row.get(4)?,
        platform: row.get(5)?,
        custom_url_pattern: row.get(6)?,
        target_customer: row.get(7)?,
        customer_persona: row.get(8)?,
        bot_tone: row.get(9)?,
        prompt_text: row.get(10)?,
        top_questions: row.get(11)?,
        top_products: row.get(12)?,
        primary_color: row.get(13)?,
        secondary_color: row.get(14)?,
        logo_url: row.get(15)?,
    };

    Ok(MerchantRecord {
        merchant_id: row.get(0)?,
        user_id: row.get(1)?,
        fields,
        onboarding_status: row.get(16)?,
        merchant_record: step_mark(row, 17)?,
        folders: step_mark(row, 19)?,
        products: step_mark(row, 21)?,
        categories: step_mark(row, 23)?,
        documents: step_mark(row, 25)?,
        search_index: step_mark(row, 27)?,
        config: step_mark(row, 29)?,
        onboarding: step_mark(row, 31)?,
        product_count: row.get(33)?,
        category_count: row.get(34)?,
        document_count: row.get(35)?,
        datastore_id: row.get(36)?,
        datastore_status: row.get(37)?,
        config_path: row.get(38)?,
        last_error: row.get(39)?,
        last_run_at: parse_optional_datetime(row.get::<Option<String>>(40)?),
        created_at: parse_datetime(&row.get::<String>(41)?),
        updated_at: parse_datetime(&row.get::<String>(42)?),
    })
}

#[async_trait]
impl MerchantRegistry for LibSqlRegistry {
    async fn run_migrations(&self) -> Result<(), RegistryError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn upsert_record(
        &self,
        merchant_id: &str,
        user_id: &str,
        fields: &MerchantFields,
    ) -> Result<(), RegistryError> {
        let now = Utc::now().to_rfc3339();
        let set_cols = fields.set_columns();

        // Column names come from a compile-time whitelist; only values are
        // bound as parameters.
        let mut columns = vec!["merchant_id", "user_id"];
        let mut values: Vec<Value> = vec![
            Value::Text(merchant_id.to_string()),
            Value::Text(user_id.to_string()),
        ];
        for (col, val) in &set_cols {
            columns.push(col);
            values.push(Value::Text(val.clone()));
        }
        columns.push("created_at");
        values.push(Value::Text(now.clone()));
        columns.push("updated_at");
        values.push(Value::Text(now));

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        // Only supplied columns are overwritten on conflict; absent fields
        // keep their existing values. created_at is never rewritten.
        let mut conflict_updates = vec!["user_id = excluded.user_id".to_string()];
        for (col, _) in &set_cols {
            conflict_updates.push(format!("{col} = excluded.{col}"));
        }
        conflict_updates.push("updated_at = excluded.updated_at".to_string());

        let sql = format!(
            "INSERT INTO merchants ({}) VALUES ({}) \
             ON CONFLICT(merchant_id) DO UPDATE SET {}",
            columns.join(", "),
            placeholders.join(", "),
            conflict_updates.join(", "),
        );

        self.conn()
            .execute(&sql, libsql::params_from_iter(values))
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn mark_step(
        &self,
        merchant_id: &str,
        step: LedgerStep,
        completed: bool,
        update: &StepUpdate,
    ) -> Result<(), RegistryError> {
        let now = Utc::now().to_rfc3339();
        let flag = step.flag_column();

        let mut sets = vec![
            format!("{flag} = ?"),
            format!("{flag}_at = ?"),
            "updated_at = ?".to_string(),
        ];
        let mut values: Vec<Value> = vec![
            Value::Integer(completed as i64),
            Value::Text(now.clone()),
            Value::Text(now.clone()),
        ];

        if let Some(n) = update.counts.product_count {
            sets.push("product_count = ?".to_string());
            values.push(Value::Integer(n));
        }
        if let Some(n) = update.counts.category_count {
            sets.push("category_count = ?".to_string());
            values.push(Value::Integer(n));
        }
        if let Some(n) = update.counts.document_count {
            sets.push("document_count = ?".to_string());
            values.push(Value::Integer(n));
        }
        if let Some(path) = &update.config_path {
            sets.push("config_path = ?".to_string());
            values.push(Value::Text(path.clone()));
        }
        if let Some(error) = &update.error {
            sets.push("last_error = ?".to_string());
            values.push(Value::Text(error.clone()));
        }

        // The finalize step also carries the overall outcome and run time.
        if step == LedgerStep::Onboarding {
            sets.push("onboarding_status = ?".to_string());
            values.push(Value::Text(
                if completed { "completed" } else { "failed" }.to_string(),
            ));
            sets.push("last_run_at = ?".to_string());
            values.push(Value::Text(now));
        }

        values.push(Value::Text(merchant_id.to_string()));
        let sql = format!(
            "UPDATE merchants SET {} WHERE merchant_id = ?",
            sets.join(", ")
        );

        let affected = self
            .conn()
            .execute(&sql, libsql::params_from_iter(values))
            .await
            .map_err(query_err)?;
        if affected == 0 {
            return Err(RegistryError::NotFound {
                merchant_id: merchant_id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_datastore_ref(
        &self,
        merchant_id: &str,
        datastore_id: &str,
        status: &str,
    ) -> Result<(), RegistryError> {
        self.conn()
            .execute(
                "UPDATE merchants SET datastore_id = ?1, datastore_status = ?2, updated_at = ?3 \
                 WHERE merchant_id = ?4",
                libsql::params![
                    datastore_id,
                    status,
                    Utc::now().to_rfc3339(),
                    merchant_id
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_record(
        &self,
        merchant_id: &str,
        user_id: Option<&str>,
    ) -> Result<Option<MerchantRecord>, RegistryError> {
        let mut rows = match user_id {
            Some(user_id) => self
                .conn()
                .query(
                    &format!(
                        "SELECT {SELECT_COLUMNS} FROM merchants \
                         WHERE merchant_id = ?1 AND user_id = ?2"
                    ),
                    libsql::params![merchant_id, user_id],
                )
                .await
                .map_err(query_err)?,
            None => self
                .conn()
                .query(
                    &format!("SELECT {SELECT_COLUMNS} FROM merchants WHERE merchant_id = ?1"),
                    libsql::params![merchant_id],
                )
                .await
                .map_err(query_err)?,
        };

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_record(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<MerchantRecord>, RegistryError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM merchants \
                     WHERE user_id = ?1 ORDER BY updated_at DESC"
                ),
                libsql::params![user_id],
            )
            .await
            .map_err(query_err)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            records.push(row_to_record(&row).map_err(query_err)?);
        }
        Ok(records)
    }

    async fn delete_record(
        &self,
        merchant_id: &str,
        user_id: &str,
    ) -> Result<bool, RegistryError> {
        let affected = self
            .conn()
            .execute(
                "DELETE FROM merchants WHERE merchant_id = ?1 AND user_id = ?2",
                libsql::params![merchant_id, user_id],
            )
            .await
            .map_err(query_err)?;
        Ok(affected > 0)
    }
}
