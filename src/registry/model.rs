//! Registry data model — merchant rows and the step ledger vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable ledger steps, one flag column per step.
///
/// The run-facing step names (`create_merchant_record`, ...) live in
/// `pipeline::step`; these are the ledger's own shorter names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStep {
    MerchantRecord,
    Folders,
    Products,
    Categories,
    Documents,
    SearchIndex,
    Config,
    Onboarding,
}

impl LedgerStep {
    pub const ALL: [LedgerStep; 8] = [
        Self::MerchantRecord,
        Self::Folders,
        Self::Products,
        Self::Categories,
        Self::Documents,
        Self::SearchIndex,
        Self::Config,
        Self::Onboarding,
    ];

    /// Wire/ledger name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MerchantRecord => "merchant_record",
            Self::Folders => "folders",
            Self::Products => "products",
            Self::Categories => "categories",
            Self::Documents => "documents",
            Self::SearchIndex => "search_index",
            Self::Config => "config",
            Self::Onboarding => "onboarding",
        }
    }

    /// Boolean column holding the completion flag.
    pub fn flag_column(&self) -> &'static str {
        match self {
            Self::MerchantRecord => "step_merchant_record_completed",
            Self::Folders => "step_folders_created",
            Self::Products => "step_products_processed",
            Self::Categories => "step_categories_processed",
            Self::Documents => "step_documents_converted",
            Self::SearchIndex => "step_search_index_setup",
            Self::Config => "step_config_generated",
            Self::Onboarding => "step_onboarding_completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|step| step.as_str() == s)
    }
}

impl std::fmt::Display for LedgerStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Completion flag plus timestamp for one ledger step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepMark {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Optional merchant fields for `upsert_record`.
///
/// On conflict, `None` fields leave the existing column untouched. This is
/// what keeps a later partial save (say, persona fields) from wiping
/// earlier-collected fields (say, knowledge-base associations).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MerchantFields {
    pub shop_name: Option<String>,
    pub shop_url: Option<String>,
    pub bot_name: Option<String>,
    pub platform: Option<String>,
    pub custom_url_pattern: Option<String>,
    pub target_customer: Option<String>,
    pub customer_persona: Option<String>,
    pub bot_tone: Option<String>,
    pub prompt_text: Option<String>,
    pub top_questions: Option<String>,
    pub top_products: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub logo_url: Option<String>,
}

impl MerchantFields {
    /// Pairs of (column, value) for the fields actually supplied.
    pub fn set_columns(&self) -> Vec<(&'static str, String)> {
        let mut cols = Vec::new();
        let mut push = |name: &'static str, value: &Option<String>| {
            if let Some(v) = value {
                cols.push((name, v.clone()));
            }
        };
        push("shop_name", &self.shop_name);
        push("shop_url", &self.shop_url);
        push("bot_name", &self.bot_name);
        push("platform", &self.platform);
        push("custom_url_pattern", &self.custom_url_pattern);
        push("target_customer", &self.target_customer);
        push("customer_persona", &self.customer_persona);
        push("bot_tone", &self.bot_tone);
        push("prompt_text", &self.prompt_text);
        push("top_questions", &self.top_questions);
        push("top_products", &self.top_products);
        push("primary_color", &self.primary_color);
        push("secondary_color", &self.secondary_color);
        push("logo_url", &self.logo_url);
        cols
    }
}

/// Counters attached to step updates. `None` leaves the column untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepCounts {
    pub product_count: Option<i64>,
    pub category_count: Option<i64>,
    pub document_count: Option<i64>,
}

/// Optional extras carried by a `mark_step` call.
#[derive(Debug, Clone, Default)]
pub struct StepUpdate {
    pub counts: StepCounts,
    /// Config artifact path, only set by the config step.
    pub config_path: Option<String>,
    /// Error text recorded as `last_error`.
    pub error: Option<String>,
}

/// One durable merchant row: identity, profile fields, and the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct MerchantRecord {
    pub merchant_id: String,
    pub user_id: String,
    pub fields: MerchantFields,
    /// Overall onboarding outcome: pending, completed, or failed.
    pub onboarding_status: String,

    pub merchant_record: StepMark,
    pub folders: StepMark,
    pub products: StepMark,
    pub categories: StepMark,
    pub documents: StepMark,
    pub search_index: StepMark,
    pub config: StepMark,
    pub onboarding: StepMark,

    pub product_count: i64,
    pub category_count: i64,
    pub document_count: i64,

    pub datastore_id: Option<String>,
    pub datastore_status: Option<String>,
    pub config_path: Option<String>,
    pub last_error: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MerchantRecord {
    /// Ledger mark for a step.
    pub fn step(&self, step: LedgerStep) -> StepMark {
        match step {
            LedgerStep::MerchantRecord => self.merchant_record,
            LedgerStep::Folders => self.folders,
            LedgerStep::Products => self.products,
            LedgerStep::Categories => self.categories,
            LedgerStep::Documents => self.documents,
            LedgerStep::SearchIndex => self.search_index,
            LedgerStep::Config => self.config,
            LedgerStep::Onboarding => self.onboarding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_step_roundtrip() {
        for step in LedgerStep::ALL {
            assert_eq!(LedgerStep::parse(step.as_str()), Some(step));
        }
        assert_eq!(LedgerStep::parse("bogus"), None);
    }

    #[test]
    fn flag_columns_are_distinct() {
        let mut cols: Vec<&str> = LedgerStep::ALL.iter().map(|s| s.flag_column()).collect();
        cols.sort();
        cols.dedup();
        assert_eq!(cols.len(), LedgerStep::ALL.len());
    }

    #[test]
    fn set_columns_only_includes_supplied_fields() {
        let fields = MerchantFields {
            shop_name: Some("Acme".to_string()),
            bot_tone: Some("friendly".to_string()),
            ..Default::default()
        };
        let cols = fields.set_columns();
        assert_eq!(cols.len(), 2);
        assert!(cols.iter().any(|(c, v)| *c == "shop_name" && v == "Acme"));
        assert!(cols.iter().any(|(c, _)| *c == "bot_tone"));
    }
}
