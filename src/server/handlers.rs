use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::SharedState;
use crate::error::{ProtocolError, ProtocolResult};
use crate::session::{InputOutcome, SessionSnapshot};

/// Result body of every `session/*` method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReply {
    /// Present for token-guarded methods (`session/draft`, `session/submit`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<InputOutcome>,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Deserialize)]
struct StartParams {
    name: String,
}

#[derive(Debug, Deserialize)]
struct InputParams {
    token: u64,
    #[serde(default)]
    answer: Value,
}

/// Route a `session/*` method to the session runtime.
pub async fn handle_session_method(
    state: &SharedState,
    method: &str,
    params: Option<Value>,
) -> ProtocolResult<Value> {
    info!(method = %method, "Routing session method");

    let session = &state.session;
    let reply = match method {
        "session/start" => {
            let params: StartParams = parse_params(method, params)?;
            snapshot_reply(session.start(params.name).await?)
        }
        "session/advance" => snapshot_reply(session.advance().await?),
        "session/draft" => {
            let params: InputParams = parse_params(method, params)?;
            let outcome = session.draft(params.token, params.answer).await?;
            outcome_reply(outcome, session.snapshot().await?)
        }
        "session/submit" => {
            let params: InputParams = parse_params(method, params)?;
            let outcome = session.submit(params.token, params.answer).await?;
            outcome_reply(outcome, session.snapshot().await?)
        }
        "session/reset" => snapshot_reply(session.reset().await?),
        "session/state" => snapshot_reply(session.snapshot().await?),
        _ => {
            return Err(ProtocolError::UnknownMethod {
                method: method.to_string(),
            })
        }
    };

    serde_json::to_value(reply).map_err(ProtocolError::Json)
}

fn snapshot_reply(snapshot: SessionSnapshot) -> SessionReply {
    SessionReply {
        outcome: None,
        snapshot,
    }
}

fn outcome_reply(outcome: InputOutcome, snapshot: SessionSnapshot) -> SessionReply {
    SessionReply {
        outcome: Some(outcome),
        snapshot,
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(
    method: &str,
    params: Option<Value>,
) -> ProtocolResult<T> {
    match params {
        Some(params) => {
            serde_json::from_value(params).map_err(|e| ProtocolError::InvalidParameters {
                method: method.to_string(),
                message: e.to_string(),
            })
        }
        None => Err(ProtocolError::InvalidParameters {
            method: method.to_string(),
            message: "Missing params".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::tests::test_state;
    use serde_json::json;

    #[tokio::test]
    async fn test_start_returns_snapshot() {
        let (state, _notes) = test_state();
        let value = handle_session_method(&state, "session/start", Some(json!({"name": "佐藤"})))
            .await
            .unwrap();

        assert!(value.get("outcome").is_none());
        assert_eq!(value["snapshot"]["examineeName"], json!("佐藤"));
        assert_eq!(value["snapshot"]["phase"], json!("main"));
        assert_eq!(value["snapshot"]["kind"], json!("input"));
    }

    #[tokio::test]
    async fn test_missing_params_rejected() {
        let (state, _notes) = test_state();
        let err = handle_session_method(&state, "session/start", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);

        let err = handle_session_method(&state, "session/submit", Some(json!({"answer": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidParameters { .. }));
    }

    #[tokio::test]
    async fn test_session_errors_become_execution_failures() {
        let (state, _notes) = test_state();
        let err = handle_session_method(&state, "session/advance", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32000);
        assert!(err.to_string().contains("No session"));
    }

    #[tokio::test]
    async fn test_stale_submit_reports_ignored() {
        let (state, _notes) = test_state();
        handle_session_method(&state, "session/start", Some(json!({"name": "佐藤"})))
            .await
            .unwrap();

        let value = handle_session_method(
            &state,
            "session/submit",
            Some(json!({"token": 999, "answer": 7})),
        )
        .await
        .unwrap();
        assert_eq!(value["outcome"], json!("ignored"));
        assert_eq!(value["snapshot"]["phase"], json!("main"));
    }

    #[tokio::test]
    async fn test_unknown_session_method() {
        let (state, _notes) = test_state();
        let err = handle_session_method(&state, "session/pause", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32601);
    }
}
