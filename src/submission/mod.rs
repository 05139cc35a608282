//! Result assembly and submission to the external record store.
//!
//! At session completion the [`ResultSubmitter`] takes the session's answers,
//! computes scores and abilities, and sends one [`SubmissionRecord`] through
//! a [`RecordSink`]. A failed first attempt never hides the result: it is
//! returned right away while bounded retries continue in the background.

mod client;
mod record;
mod submitter;

pub use client::RecordStoreClient;
#[cfg(test)]
pub(crate) use record::sample_record;
pub use record::{AnalysisLabels, AssessmentResult, ScoreSummary, SubmissionRecord};
pub use submitter::{
    ResultSubmitter, RetryHandle, RetryMode, RetryPolicy, SubmissionObserver, SubmissionOutcome,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SubmissionResult;

/// Where a submission currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionState {
    /// The session has not completed yet.
    #[default]
    NotSubmitted,
    /// First attempt in flight.
    Pending,
    Succeeded,
    /// Waiting for, or running, retry number `attempt`.
    Retrying { attempt: u32 },
    /// Every attempt failed; nothing more will be tried.
    FailedFinal,
}

impl SubmissionState {
    /// Whether no further state change can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionState::Succeeded | SubmissionState::FailedFinal)
    }

    /// Whether moving from `current` to `self` is forward progress.
    /// States never move backwards, so late or duplicate reports can be dropped.
    pub fn supersedes(&self, current: &SubmissionState) -> bool {
        self.progress() > current.progress()
    }

    fn progress(&self) -> u32 {
        match self {
            SubmissionState::NotSubmitted => 0,
            SubmissionState::Pending => 1,
            SubmissionState::Retrying { attempt } => attempt.saturating_add(1),
            SubmissionState::Succeeded | SubmissionState::FailedFinal => u32::MAX,
        }
    }
}

/// Body of `POST /api/save-data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDataRequest {
    pub user_data: SubmissionRecord,
}

/// Reply of `POST /api/save-data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveDataResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveDataResponse {
    /// Successful reply.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Failed reply carrying a message for the caller.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Destination of finished assessment records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Deliver one record. A single attempt; retrying is the caller's concern.
    async fn save(&self, record: &SubmissionRecord) -> SubmissionResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_only_move_forward() {
        let pending = SubmissionState::Pending;
        let first = SubmissionState::Retrying { attempt: 1 };
        let second = SubmissionState::Retrying { attempt: 2 };

        assert!(first.supersedes(&pending));
        assert!(second.supersedes(&first));
        assert!(!pending.supersedes(&first));
        assert!(SubmissionState::Succeeded.supersedes(&second));
        assert!(!SubmissionState::FailedFinal.supersedes(&SubmissionState::Succeeded));
    }

    #[test]
    fn test_state_wire_format() {
        let value = serde_json::to_value(SubmissionState::Retrying { attempt: 2 }).unwrap();
        assert_eq!(value, serde_json::json!({"status": "retrying", "attempt": 2}));
    }
}
