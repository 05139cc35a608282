//! Session state machine and its single-task runtime.
//!
//! A [`SessionStateMachine`] walks one examinee through the catalog:
//!
//! ```text
//! NotStarted -> [Explanation] -> [Example(hidden -> revealed)]
//!            -> Main{ item 1: stage 0 -> stage 1 -> .. -> Input } .. { item n }
//!            -> next problem .. -> Complete
//! ```
//!
//! Explanation and example stages advance on examinee request. Display and
//! countdown stages advance on timer expiry only. An input stage ends on the
//! first of submit or expiry; every stage entry gets a fresh stage token, so
//! the loser of that race (and any late event) carries a stale token and is
//! ignored.
//!
//! [`SessionRuntime`] owns the machine on one task and serialises examinee
//! commands with timer events; [`SessionHandle`] is the cloneable front end.

mod machine;
mod runtime;

pub use machine::SessionStateMachine;
pub use runtime::{SessionHandle, SessionRuntime};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::problems::{ProblemId, StageKind};
use crate::storage::PersistedAnswers;
use crate::submission::{AssessmentResult, SubmissionState};

/// Where a session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Phase {
    #[default]
    NotStarted,
    Explanation,
    Example {
        revealed: bool,
    },
    Main {
        stage_index: usize,
        kind: StageKind,
    },
    Complete,
}

impl Phase {
    /// Short name used in logs and errors.
    pub fn name(&self) -> String {
        match self {
            Phase::NotStarted => "not_started".to_string(),
            Phase::Explanation => "explanation".to_string(),
            Phase::Example { revealed: false } => "example".to_string(),
            Phase::Example { revealed: true } => "example_revealed".to_string(),
            Phase::Main { kind, .. } => kind.to_string(),
            Phase::Complete => "complete".to_string(),
        }
    }

    /// Whether this is an input stage accepting answers.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Phase::Main {
                kind: StageKind::Input,
                ..
            }
        )
    }
}

/// One examinee's run. Owned and mutated only by the state machine.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub examinee_name: String,
    pub started_at: DateTime<Utc>,
    pub problem_index: usize,
    pub item_index: usize,
    pub phase: Phase,
    /// Seconds left in a timed stage.
    pub time_remaining: Option<u32>,
    /// Token of the current stage; commands must echo it.
    pub stage_token: u64,
    /// Answers of the finished items of the current problem.
    item_answers: Vec<Value>,
    /// Latest partial answer for the current input stage.
    draft: Option<Value>,
    /// Coerced answer of every problem answered so far, by problem id.
    answers: BTreeMap<ProblemId, Value>,
    completed_at: BTreeMap<ProblemId, DateTime<Utc>>,
    pub result: Option<AssessmentResult>,
    pub submission: SubmissionState,
}

impl Session {
    fn new(examinee_name: String, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            examinee_name,
            started_at,
            problem_index: 0,
            item_index: 0,
            phase: Phase::NotStarted,
            time_remaining: None,
            stage_token: 0,
            item_answers: Vec::new(),
            draft: None,
            answers: BTreeMap::new(),
            completed_at: BTreeMap::new(),
            result: None,
            submission: SubmissionState::NotSubmitted,
        }
    }

    /// Everything this session answered, in the layout the store holds.
    pub fn answered(&self) -> PersistedAnswers {
        PersistedAnswers {
            examinee: Some(self.examinee_name.clone()),
            started_at: Some(self.started_at),
            answers: self.answers.clone(),
            completed_at: self.completed_at.clone(),
        }
    }
}

/// Serializable view of the session handed to the UI.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examinee_name: Option<String>,
    #[serde(flatten)]
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_id: Option<ProblemId>,
    pub item_index: usize,
    pub item_count: usize,
    pub time_remaining: Option<u32>,
    pub stage_token: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AssessmentResult>,
    pub submission: SubmissionState,
}

/// Whether a token-guarded command took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputOutcome {
    Accepted,
    /// The stage had already ended or the token was stale; nothing changed.
    Ignored,
}

/// Timer signal for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    Tick(u32),
    Expired,
}

/// Event fed back into the state machine from its own collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Timer { token: u64, signal: TimerSignal },
    Submission { session_id: Uuid, state: SubmissionState },
}

/// Pushed to the UI whenever something visible changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    /// A new stage was entered (or the session was reset).
    Stage(SessionSnapshot),
    Tick { token: u64, remaining: u32 },
    /// The last input stage ended; the snapshot carries the result.
    Completed(SessionSnapshot),
    Submission { state: SubmissionState },
}

impl SessionNotification {
    /// JSON-RPC notification method name.
    pub fn method(&self) -> &'static str {
        match self {
            SessionNotification::Stage(_) => "session/stage",
            SessionNotification::Tick { .. } => "session/tick",
            SessionNotification::Completed(_) => "session/completed",
            SessionNotification::Submission { .. } => "session/submission",
        }
    }

    /// JSON-RPC notification params.
    pub fn params(&self) -> Value {
        match self {
            SessionNotification::Stage(snapshot) | SessionNotification::Completed(snapshot) => {
                serde_json::to_value(snapshot).unwrap_or(Value::Null)
            }
            SessionNotification::Tick { token, remaining } => {
                serde_json::json!({ "stageToken": token, "remaining": remaining })
            }
            SessionNotification::Submission { state } => {
                serde_json::to_value(state).unwrap_or(Value::Null)
            }
        }
    }
}
