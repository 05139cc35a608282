//! Integration tests for the save-data relay
//!
//! Drives the axum router with tower's `oneshot` and stands the spreadsheet
//! API up with wiremock.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{
    matchers::{body_partial_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use assessment_engine::ability::AbilityAggregator;
use assessment_engine::config::{RelayConfig, RequestConfig};
use assessment_engine::problems::standard_catalog;
use assessment_engine::relay::{build_router, RelayState};
use assessment_engine::scoring::CanonicalKeys;
use assessment_engine::storage::PersistedAnswers;
use assessment_engine::submission::{AssessmentResult, SubmissionRecord};

fn relay_config(base_url: &str, credentials: bool) -> RelayConfig {
    RelayConfig {
        bind: "127.0.0.1:0".parse().unwrap(),
        sheets_base_url: base_url.to_string(),
        api_key: credentials.then(|| "test-key".to_string()),
        sheet_id: credentials.then(|| "sheet-1".to_string()),
    }
}

fn router(config: RelayConfig) -> axum::Router {
    let request = RequestConfig {
        timeout_ms: 5000,
        ..RequestConfig::default()
    };
    build_router(Arc::new(RelayState::new(config, &request).unwrap()))
}

fn user_data() -> Value {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
    let persisted = PersistedAnswers {
        examinee: Some("山田太郎".to_string()),
        started_at: Some(start),
        answers: BTreeMap::from([(6, json!(7))]),
        completed_at: BTreeMap::new(),
    };
    let result = AssessmentResult::compute(
        &persisted.answers,
        &CanonicalKeys::default(),
        &AbilityAggregator::new(),
    );
    let record = SubmissionRecord::assemble(
        &persisted,
        &standard_catalog(),
        &result,
        start + Duration::minutes(10),
    );
    serde_json::to_value(record).unwrap()
}

fn post(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/save-data")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_save_appends_row() {
    let sheets = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sheet-1/values/Sheet1!A:R:append"))
        .and(query_param("valueInputOption", "RAW"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "values": [["山田太郎", "2024-06-01", "09:10:00",
                0.0, 0.0, 0.0, 0.0, 0.0, 2.5, 0.0, 0.0, 2.5,
                "0.00", "0.00", "0.00", "2.50", "認知", "読解"]]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updates": {}})))
        .expect(1)
        .mount(&sheets)
        .await;

    let response = router(relay_config(&sheets.uri(), true))
        .oneshot(post(json!({ "userData": user_data() }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({"success": true}));
}

#[tokio::test]
async fn test_upstream_failure_is_reported() {
    let sheets = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&sheets)
        .await;

    let response = router(relay_config(&sheets.uri(), true))
        .oneshot(post(json!({ "userData": user_data() }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        read_json(response).await,
        json!({"success": false, "error": "Failed to save to spreadsheet"})
    );
}

#[tokio::test]
async fn test_missing_credentials() {
    let sheets = MockServer::start().await;

    let response = router(relay_config(&sheets.uri(), false))
        .oneshot(post(json!({ "userData": user_data() }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        read_json(response).await,
        json!({"success": false, "error": "API credentials not configured"})
    );
    assert!(sheets.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body() {
    let response = router(relay_config("http://127.0.0.1:9", true))
        .oneshot(post("{\"userData\": 12".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await,
        json!({"success": false, "error": "Invalid request body"})
    );
}

#[tokio::test]
async fn test_unreachable_upstream() {
    // nothing listens on the discard port
    let response = router(relay_config("http://127.0.0.1:9", true))
        .oneshot(post(json!({ "userData": user_data() }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        read_json(response).await,
        json!({"success": false, "error": "Internal server error"})
    );
}

#[tokio::test]
async fn test_get_not_allowed() {
    let request = Request::builder()
        .method("GET")
        .uri("/api/save-data")
        .body(Body::empty())
        .unwrap();

    let response = router(relay_config("http://127.0.0.1:9", true))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(read_json(response).await, json!({"error": "Method not allowed"}));
}
