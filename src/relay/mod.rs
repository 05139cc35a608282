//! Save-data relay: the HTTP endpoint the result submitter talks to.
//!
//! `POST /api/save-data` takes `{ userData }`, checks that spreadsheet
//! credentials are configured, and appends one row to the sheet. Duplicate
//! suppression and row placement stay on the spreadsheet side.

mod sheets;

pub use sheets::{sheet_row, SheetsClient};

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};

use crate::config::{Config, RelayConfig, RequestConfig};
use crate::error::{AppError, AppResult, SubmissionError, SubmissionResult};
use crate::submission::{SaveDataRequest, SaveDataResponse};

/// Shared state of the relay handlers.
pub struct RelayState {
    config: RelayConfig,
    sheets: SheetsClient,
}

impl RelayState {
    /// Build relay state from configuration.
    pub fn new(config: RelayConfig, request_config: &RequestConfig) -> SubmissionResult<Self> {
        let sheets = SheetsClient::new(&config.sheets_base_url, request_config)?;
        Ok(Self { config, sheets })
    }
}

/// Router exposing `/api/save-data`.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/api/save-data", post(save_data).get(method_not_allowed))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

type SaveDataReply = (StatusCode, Json<SaveDataResponse>);

fn failure(status: StatusCode, message: &str) -> SaveDataReply {
    (status, Json(SaveDataResponse::failure(message)))
}

async fn save_data(
    State(state): State<Arc<RelayState>>,
    body: Result<Json<SaveDataRequest>, JsonRejection>,
) -> SaveDataReply {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Malformed save-data body");
            return failure(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    let Some((api_key, sheet_id)) = state.config.credentials() else {
        error!("Spreadsheet API credentials not configured");
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "API credentials not configured",
        );
    };

    let record = &request.user_data;
    match state
        .sheets
        .append_row(sheet_id, api_key, sheet_row(record))
        .await
    {
        Ok(()) => {
            info!(examinee = %record.name, test_date = %record.test_date, "Assessment record saved");
            (StatusCode::OK, Json(SaveDataResponse::ok()))
        }
        Err(SubmissionError::Api { status, message }) => {
            error!(status, error = %message, "Spreadsheet API error");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save to spreadsheet",
            )
        }
        Err(e) => {
            error!(error = %e, "Spreadsheet request failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

async fn method_not_allowed() -> (StatusCode, Json<Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

/// Serve the relay until ctrl-c.
pub async fn serve(config: &Config) -> AppResult<()> {
    let state = Arc::new(RelayState::new(config.relay.clone(), &config.request)?);
    if config.relay.credentials().is_none() {
        warn!("GOOGLE_API_KEY or GOOGLE_SHEET_ID missing; every save will fail");
    }

    let listener = TcpListener::bind(config.relay.bind)
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Failed to bind {}: {}", config.relay.bind, e),
        })?;
    info!(addr = %config.relay.bind, "Save-data relay listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down relay");
        })
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Relay server error: {}", e),
        })
}
