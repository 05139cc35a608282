//! # Assessment Engine
//!
//! Engine for a timed, eight-problem cognitive assessment. It walks one
//! examinee through the problem catalog under per-stage timers, scores the
//! answers against canonical keys, aggregates the scores into four ability
//! dimensions, and submits the finished record to an external record store.
//!
//! ## Features
//!
//! - **Stage timers**: one-second countdowns with cancellation and stage tokens
//! - **Scoring**: pure per-problem scoring functions with partial credit
//! - **Ability aggregation**: weighted four-dimension profile with strongest and weakest analysis
//! - **Answer store**: SQLite persistence so an interrupted run keeps its answers
//! - **Submission**: one record per session with bounded, observable retries
//! - **Relay**: the `POST /api/save-data` endpoint appending rows to a spreadsheet
//!
//! ## Architecture
//!
//! ```text
//! UI process ⇄ JSON-RPC (stdio) → SessionRuntime → SessionStateMachine
//!                                        │              │      │
//!                                   StageTimer   AnswerStore  ResultSubmitter
//!                                                 (SQLite)         │ HTTP
//!                                                                  ↓
//!                                           /api/save-data relay → spreadsheet
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use assessment_engine::problems::standard_catalog;
//! use assessment_engine::session::SessionRuntime;
//! use assessment_engine::storage::SqliteAnswerStore;
//! use assessment_engine::submission::{RecordStoreClient, ResultSubmitter, RetryPolicy};
//! use assessment_engine::{Config, Clock};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(SqliteAnswerStore::new(&config.database).await?);
//!     let client = RecordStoreClient::new(&config.record_store, config.request.clone())?;
//!     let submitter = ResultSubmitter::new(Arc::new(client), RetryPolicy::from_config(&config.request));
//!     let (runtime, handle, _notifications) =
//!         SessionRuntime::new(standard_catalog(), store, submitter, Clock::System);
//!     runtime.spawn();
//!     let snapshot = handle.start("山田太郎").await?;
//!     println!("{:?}", snapshot.phase);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Per-examinee ability aggregation and strongest/weakest analysis.
pub mod ability;
/// Configuration loaded from the environment.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Problem definitions, answer shapes and the standard catalog.
pub mod problems;
/// HTTP relay that appends submitted records to a spreadsheet.
pub mod relay;
/// Canonical keys and per-problem scoring.
pub mod scoring;
/// JSON-RPC stdio host for a UI process.
pub mod server;
/// Session state machine and runtime.
pub mod session;
/// Answer persistence.
pub mod storage;
/// Result assembly and submission with retry.
pub mod submission;
/// Clock abstraction for timestamps.
pub mod time;
/// Per-stage countdown timer.
pub mod timer;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, RpcServer, SharedState};
pub use session::{SessionHandle, SessionRuntime};
pub use time::Clock;
