//! Answer store persistence.
//!
//! The store is a namespaced key to JSON-value map. Keys follow the layout
//! the UI has always used (`problem1Answers`, `problem1Time`, `userName`,
//! `testStartTime`, ...), so a store written by one session can be read back
//! without any schema of its own. All entries of a namespace are removed
//! together on reset.

mod memory;
mod sqlite;

pub use memory::MemoryAnswerStore;
pub use sqlite::SqliteAnswerStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::StorageResult;
use crate::problems::{ProblemDefinition, ProblemId};

/// Key holding the examinee name.
pub const USER_NAME_KEY: &str = "userName";

/// Key holding the session start timestamp.
pub const TEST_START_KEY: &str = "testStartTime";

/// Key/value persistence for one examinee's answers.
///
/// Only the session state machine writes, and it reads everything back once
/// at completion to check the store against its own answers.
#[async_trait]
pub trait AnswerStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &Value) -> StorageResult<()>;

    /// Read the value under `key`.
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// All keys currently present, sorted.
    async fn keys(&self) -> StorageResult<Vec<String>>;

    /// Remove every entry.
    async fn clear(&self) -> StorageResult<()>;
}

/// Render a timestamp the way it is persisted (ISO-8601, millisecond precision, `Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Write the examinee name and start time for a fresh session.
pub async fn record_session_start(
    store: &dyn AnswerStore,
    examinee: &str,
    started_at: DateTime<Utc>,
) -> StorageResult<()> {
    store
        .put(USER_NAME_KEY, &Value::String(examinee.to_string()))
        .await?;
    store
        .put(TEST_START_KEY, &Value::String(format_timestamp(started_at)))
        .await?;
    debug!(examinee = %examinee, "Session start recorded");
    Ok(())
}

/// Write a problem's answer together with its completion timestamp.
pub async fn record_answer(
    store: &dyn AnswerStore,
    problem: &ProblemDefinition,
    answer: &Value,
    recorded_at: DateTime<Utc>,
) -> StorageResult<()> {
    store.put(&problem.storage_key, answer).await?;
    store
        .put(
            &problem.time_key(),
            &Value::String(format_timestamp(recorded_at)),
        )
        .await?;
    debug!(problem = problem.id, key = %problem.storage_key, "Answer recorded");
    Ok(())
}

/// Everything a finished session left in the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedAnswers {
    pub examinee: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Raw answers keyed by problem id; problems never completed are absent.
    pub answers: BTreeMap<ProblemId, Value>,
    pub completed_at: BTreeMap<ProblemId, DateTime<Utc>>,
}

impl PersistedAnswers {
    /// Read the persisted layout for every problem in `catalog`.
    pub async fn load(
        store: &dyn AnswerStore,
        catalog: &[ProblemDefinition],
    ) -> StorageResult<Self> {
        let mut loaded = Self {
            examinee: store
                .get(USER_NAME_KEY)
                .await?
                .and_then(|v| v.as_str().map(str::to_string)),
            started_at: store
                .get(TEST_START_KEY)
                .await?
                .as_ref()
                .and_then(parse_timestamp),
            ..Self::default()
        };

        for problem in catalog {
            if let Some(answer) = store.get(&problem.storage_key).await? {
                loaded.answers.insert(problem.id, answer);
            }
            if let Some(at) = store
                .get(&problem.time_key())
                .await?
                .as_ref()
                .and_then(parse_timestamp)
            {
                loaded.completed_at.insert(problem.id, at);
            }
        }

        Ok(loaded)
    }
}
