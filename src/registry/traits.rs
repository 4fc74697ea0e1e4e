//! `MerchantRegistry` trait — single async interface for merchant rows
//! and the step ledger.

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::registry::model::{LedgerStep, MerchantFields, MerchantRecord, StepUpdate};

/// Backend-agnostic merchant registry.
///
/// Reads take an optional `user_id`: when supplied it acts as an
/// ownership filter, so a row owned by a different user reads as absent.
#[async_trait]
pub trait MerchantRegistry: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), RegistryError>;

    /// Insert or merge a merchant row. On conflict only the supplied
    /// fields overwrite; absent fields keep their existing values.
    async fn upsert_record(
        &self,
        merchant_id: &str,
        user_id: &str,
        fields: &MerchantFields,
    ) -> Result<(), RegistryError>;

    /// Flip exactly one step's flag+timestamp, optionally setting the
    /// counters / config path / last_error named in `update`. Other
    /// steps' flags are never touched.
    async fn mark_step(
        &self,
        merchant_id: &str,
        step: LedgerStep,
        completed: bool,
        update: &StepUpdate,
    ) -> Result<(), RegistryError>;

    /// Record the provisioned datastore reference.
    async fn set_datastore_ref(
        &self,
        merchant_id: &str,
        datastore_id: &str,
        status: &str,
    ) -> Result<(), RegistryError>;

    /// Read a merchant row. `user_id: Some(_)` makes ownership part of
    /// the lookup: a mismatch reads as `None`, not as an error.
    async fn get_record(
        &self,
        merchant_id: &str,
        user_id: Option<&str>,
    ) -> Result<Option<MerchantRecord>, RegistryError>;

    /// All merchants owned by a user, most recently updated first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<MerchantRecord>, RegistryError>;

    /// Delete a merchant row, ownership-checked. Returns whether a row
    /// was deleted.
    async fn delete_record(&self, merchant_id: &str, user_id: &str)
    -> Result<bool, RegistryError>;
}
