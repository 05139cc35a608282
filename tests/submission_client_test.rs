//! Integration tests for the record store client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use assessment_engine::ability::AbilityAggregator;
use assessment_engine::config::{RecordStoreConfig, RequestConfig};
use assessment_engine::error::SubmissionError;
use assessment_engine::problems::standard_catalog;
use assessment_engine::scoring::CanonicalKeys;
use assessment_engine::storage::{
    record_answer, record_session_start, MemoryAnswerStore, PersistedAnswers,
};
use assessment_engine::submission::{
    AssessmentResult, RecordSink, RecordStoreClient, ResultSubmitter, RetryMode, RetryPolicy,
    SubmissionRecord, SubmissionState,
};
use assessment_engine::time::Clock;

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str) -> RecordStoreClient {
    let config = RecordStoreConfig {
        base_url: base_url.to_string(),
    };

    let request_config = RequestConfig {
        timeout_ms: 5000,
        max_retries: 0,
        retry_delay_ms: 10,
    };

    RecordStoreClient::new(&config, request_config).expect("Failed to create client")
}

/// A record for an examinee who answered problem 6 only.
fn create_test_record() -> SubmissionRecord {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
    let persisted = PersistedAnswers {
        examinee: Some("山田太郎".to_string()),
        started_at: Some(start),
        answers: BTreeMap::from([(6, json!(7))]),
        completed_at: BTreeMap::from([(6, start + Duration::minutes(8))]),
    };
    let result = AssessmentResult::compute(
        &persisted.answers,
        &CanonicalKeys::default(),
        &AbilityAggregator::new(),
    );
    SubmissionRecord::assemble(
        &persisted,
        &standard_catalog(),
        &result,
        start + Duration::minutes(10),
    )
}

#[cfg(test)]
mod save_tests {
    use super::*;

    #[tokio::test]
    async fn test_save_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/save-data"))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(json!({
                "userData": {
                    "name": "山田太郎",
                    "testDate": "2024-06-01",
                    "scores": {"problem6": 2.5, "total": 2.5}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client.save(&create_test_record()).await;

        assert!(result.is_ok(), "Save should succeed: {:?}", result);
    }

    #[tokio::test]
    async fn test_save_server_error_carries_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/save-data"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "success": false,
                "error": "Failed to save to spreadsheet"
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client.save(&create_test_record()).await.unwrap_err();

        match err {
            SubmissionError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Failed to save to spreadsheet");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_plain_text_error_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/save-data"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client.save(&create_test_record()).await.unwrap_err();

        assert!(matches!(
            err,
            SubmissionError::Api { status: 502, ref message } if message == "Bad Gateway"
        ));
    }

    #[tokio::test]
    async fn test_save_rejected_by_store() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/save-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "duplicate"
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client.save(&create_test_record()).await.unwrap_err();

        assert!(matches!(err, SubmissionError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_save_malformed_reply() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/save-data"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client.save(&create_test_record()).await.unwrap_err();

        assert!(matches!(err, SubmissionError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_base_url_trailing_slash() {
        let client = create_test_client("http://localhost:3000/");
        assert_eq!(client.base_url(), "http://localhost:3000");
    }
}

#[cfg(test)]
mod submitter_tests {
    use super::*;

    /// Answers as a finished session leaves them in the store.
    async fn stored_answers() -> PersistedAnswers {
        let store = MemoryAnswerStore::new();
        let catalog = standard_catalog();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        record_session_start(&store, "山田太郎", start).await.unwrap();
        record_answer(&store, &catalog[5], &json!(7), start + Duration::minutes(8))
            .await
            .unwrap();
        PersistedAnswers::load(&store, &catalog).await.unwrap()
    }

    #[tokio::test]
    async fn test_blocking_retries_until_store_recovers() {
        let mock_server = MockServer::start().await;

        // first two attempts fail, the third succeeds
        Mock::given(method("POST"))
            .and(path("/api/save-data"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/save-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let policy = RetryPolicy {
            max_retries: 3,
            delay: std::time::Duration::from_millis(10),
            mode: RetryMode::Blocking,
        };
        let submitter = ResultSubmitter::new(
            Arc::new(create_test_client(&mock_server.uri())),
            policy,
        )
        .with_clock(Clock::fixed(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 10, 0).unwrap(),
        ));

        let answers = stored_answers().await;
        let outcome = submitter
            .submit(&answers, &standard_catalog(), Arc::new(|_: SubmissionState| {}))
            .await;

        assert_eq!(outcome.state, SubmissionState::Succeeded);
        assert_eq!(outcome.result.scores.total, 2.5);
        assert_eq!(outcome.record.test_time, "09:10:00");
        assert!(outcome.retry.is_none());
    }

    #[tokio::test]
    async fn test_background_result_available_before_retries_finish() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/save-data"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;

        let policy = RetryPolicy {
            max_retries: 2,
            delay: std::time::Duration::from_millis(10),
            mode: RetryMode::Background,
        };
        let submitter = ResultSubmitter::new(
            Arc::new(create_test_client(&mock_server.uri())),
            policy,
        );

        let answers = stored_answers().await;
        let outcome = submitter
            .submit(&answers, &standard_catalog(), Arc::new(|_: SubmissionState| {}))
            .await;

        assert_eq!(outcome.state, SubmissionState::Retrying { attempt: 1 });
        assert_eq!(outcome.result.scores.problem(6), 2.5);

        let retry = outcome.retry.expect("background retry handle");
        assert_eq!(retry.finished().await, SubmissionState::FailedFinal);
    }
}
