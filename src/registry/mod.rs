//! Merchant registry — durable merchant records and the step ledger.
//!
//! One row per merchant, owned by a user. Step completion flags are
//! independent columns: each update flips exactly one named flag, so
//! concurrent step updates for the same merchant never lose writes.

pub mod libsql_backend;
pub mod migrations;
pub mod model;
pub mod traits;

pub use libsql_backend::LibSqlRegistry;
pub use model::{LedgerStep, MerchantFields, MerchantRecord, StepCounts, StepMark, StepUpdate};
pub use traits::MerchantRegistry;
