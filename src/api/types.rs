//! Request/response bodies for the REST surface.

use serde::{Deserialize, Serialize};

use crate::pipeline::{OnboardRequest, OnboardingRun};
use crate::registry::{MerchantFields, MerchantRecord};
use crate::storage::SignedUpload;

/// POST /api/onboard body.
#[derive(Debug, Clone, Deserialize)]
pub struct StartOnboardingPayload {
    pub merchant_id: String,
    pub user_id: String,
    pub shop_name: String,
    #[serde(default)]
    pub shop_url: Option<String>,
    #[serde(default)]
    pub bot_name: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub target_customer: Option<String>,
    #[serde(default)]
    pub customer_persona: Option<String>,
    #[serde(default)]
    pub bot_tone: Option<String>,
    #[serde(default)]
    pub prompt_text: Option<String>,
    #[serde(default)]
    pub top_questions: Option<String>,
    #[serde(default)]
    pub top_products: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

impl StartOnboardingPayload {
    pub fn into_request(self) -> OnboardRequest {
        OnboardRequest {
            fields: MerchantFields {
                shop_name: Some(self.shop_name.clone()),
                shop_url: self.shop_url.clone(),
                bot_name: self.bot_name,
                platform: self.platform,
                custom_url_pattern: None,
                target_customer: self.target_customer,
                customer_persona: self.customer_persona,
                bot_tone: self.bot_tone,
                prompt_text: self.prompt_text,
                top_questions: self.top_questions,
                top_products: self.top_products,
                primary_color: self.primary_color,
                secondary_color: self.secondary_color,
                logo_url: self.logo_url,
            },
            merchant_id: self.merchant_id,
            user_id: self.user_id,
            shop_name: self.shop_name,
            shop_url: self.shop_url,
        }
    }
}

/// 202 response to a run start.
#[derive(Debug, Clone, Serialize)]
pub struct StartOnboardingResponse {
    pub run_id: String,
    pub merchant_id: String,
    pub status: &'static str,
    /// Where the caller polls for progress.
    pub status_url: String,
}

/// Merged status view: the live run (when the process has one) plus the
/// durable ledger row (when one exists).
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub merchant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<OnboardingRun>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<MerchantRecord>,
}

/// POST /api/files/upload-url body.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadUrlPayload {
    pub merchant_id: String,
    /// One of the fixed merchant folders.
    pub folder: String,
    pub filename: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

/// Response to an upload-URL request.
#[derive(Debug, Clone, Serialize)]
pub struct UploadUrlResponse {
    #[serde(flatten)]
    pub upload: SignedUpload,
}
