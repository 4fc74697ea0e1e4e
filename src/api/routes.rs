//! REST endpoints — start runs, poll status, issue upload URLs, read
//! merchant rows. Thin by intent: every handler validates, delegates,
//! and maps errors to a JSON body.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::context::AppContext;
use crate::error::{Error, OnboardError};
use crate::storage::paths;

use super::types::{
    StartOnboardingPayload, StartOnboardingResponse, StatusResponse, UploadUrlPayload,
    UploadUrlResponse,
};

fn error_body(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// POST /api/onboard
///
/// Kicks off a background onboarding run and returns 202 with the run
/// id. 409 when a run for the merchant is already in flight.
async fn start_onboarding(
    State(ctx): State<AppContext>,
    Json(payload): Json<StartOnboardingPayload>,
) -> impl IntoResponse {
    if payload.merchant_id.trim().is_empty()
        || payload.user_id.trim().is_empty()
        || payload.shop_name.trim().is_empty()
    {
        return error_body(
            StatusCode::BAD_REQUEST,
            "merchant_id, user_id and shop_name are required",
        );
    }

    let merchant_id = payload.merchant_id.clone();
    match ctx.dispatcher.dispatch(payload.into_request()).await {
        Ok(run_id) => (
            StatusCode::ACCEPTED,
            Json(StartOnboardingResponse {
                run_id,
                status_url: format!("/api/onboard/status/{merchant_id}"),
                merchant_id,
                status: "accepted",
            }),
        )
            .into_response(),
        Err(Error::Onboard(OnboardError::AlreadyRunning(id))) => error_body(
            StatusCode::CONFLICT,
            format!("Onboarding already running for merchant {id}"),
        ),
        Err(e) => {
            error!(merchant_id, error = %e, "Failed to start onboarding");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/onboard/status/{merchant_id}
///
/// Live run snapshot merged with the durable ledger row. 404 only when
/// neither exists.
async fn onboarding_status(
    State(ctx): State<AppContext>,
    Path(merchant_id): Path<String>,
) -> impl IntoResponse {
    let run = ctx.tracker.get(&merchant_id).await;
    let ledger = match ctx.registry.get_record(&merchant_id, None).await {
        Ok(record) => record,
        Err(e) => {
            error!(merchant_id, error = %e, "Ledger read failed");
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    if run.is_none() && ledger.is_none() {
        return error_body(
            StatusCode::NOT_FOUND,
            format!("No onboarding found for merchant {merchant_id}"),
        );
    }
    Json(StatusResponse {
        merchant_id,
        run,
        ledger,
    })
    .into_response()
}

/// POST /api/files/upload-url
///
/// Issues a signed upload URL into one of the fixed merchant folders.
async fn upload_url(
    State(ctx): State<AppContext>,
    Json(payload): Json<UploadUrlPayload>,
) -> impl IntoResponse {
    if !paths::MERCHANT_FOLDERS.contains(&payload.folder.as_str()) {
        return error_body(
            StatusCode::BAD_REQUEST,
            format!(
                "Unknown folder {:?}; allowed: {}",
                payload.folder,
                paths::MERCHANT_FOLDERS.join(", ")
            ),
        );
    }
    if payload.filename.is_empty() || payload.filename.contains('/') {
        return error_body(StatusCode::BAD_REQUEST, "Invalid filename");
    }

    let object_path = format!(
        "merchants/{}/{}/{}",
        payload.merchant_id, payload.folder, payload.filename
    );
    match ctx
        .blob
        .signed_upload_url(&object_path, &payload.content_type, ctx.config.upload_url_ttl)
        .await
    {
        Ok(upload) => Json(UploadUrlResponse { upload }).into_response(),
        Err(e) => {
            error!(object_path, error = %e, "Signed URL issuance failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwnerQuery {
    user_id: Option<String>,
}

/// GET /api/merchants/{merchant_id}?user_id=
///
/// Durable merchant row. With `user_id` the lookup is ownership-checked
/// and a row owned by someone else reads as 404.
async fn get_merchant(
    State(ctx): State<AppContext>,
    Path(merchant_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> impl IntoResponse {
    match ctx
        .registry
        .get_record(&merchant_id, query.user_id.as_deref())
        .await
    {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_body(
            StatusCode::NOT_FOUND,
            format!("Merchant {merchant_id} not found"),
        ),
        Err(e) => {
            error!(merchant_id, error = %e, "Merchant read failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Build the REST routes.
pub fn onboard_routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/onboard", post(start_onboarding))
        .route("/api/onboard/status/{merchant_id}", get(onboarding_status))
        .route("/api/files/upload-url", post(upload_url))
        .route("/api/merchants/{merchant_id}", get(get_merchant))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
