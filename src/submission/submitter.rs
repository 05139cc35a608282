use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{AssessmentResult, RecordSink, SubmissionRecord, SubmissionState};
use crate::ability::AbilityAggregator;
use crate::config::RequestConfig;
use crate::error::SubmissionResult;
use crate::problems::ProblemDefinition;
use crate::scoring::CanonicalKeys;
use crate::storage::PersistedAnswers;
use crate::time::Clock;

/// Callback told about every submission state change.
pub type SubmissionObserver = Arc<dyn Fn(SubmissionState) + Send + Sync>;

/// Whether retries run after `submit` returns or before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryMode {
    /// Return after the first attempt; retry on a spawned task.
    #[default]
    Background,
    /// Run every attempt before returning.
    Blocking,
}

/// Bounded fixed-delay retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub delay: Duration,
    pub mode: RetryMode,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
            mode: RetryMode::Background,
        }
    }
}

impl RetryPolicy {
    /// Background policy using the configured retry count and delay.
    pub fn from_config(config: &RequestConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.retry_delay_ms),
            mode: RetryMode::Background,
        }
    }

    /// Same policy in a different mode.
    pub fn with_mode(mut self, mode: RetryMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Running background retry sequence.
#[derive(Debug)]
pub struct RetryHandle {
    state: watch::Receiver<SubmissionState>,
    task: JoinHandle<()>,
}

impl RetryHandle {
    /// Latest published state.
    pub fn state(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    /// Stop retrying. No further attempts or notifications happen.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the sequence to end and return its final state.
    pub async fn finished(self) -> SubmissionState {
        let _ = self.task.await;
        let state = self.state.borrow().clone();
        state
    }
}

/// Everything `submit` knows once the first attempt has returned.
#[derive(Debug)]
pub struct SubmissionOutcome {
    /// Always present, whatever happened to the submission.
    pub result: AssessmentResult,
    pub record: SubmissionRecord,
    pub state: SubmissionState,
    /// Set while background retries are pending.
    pub retry: Option<RetryHandle>,
}

/// Builds the final record and delivers it with bounded retry.
#[derive(Clone)]
pub struct ResultSubmitter {
    sink: Arc<dyn RecordSink>,
    keys: CanonicalKeys,
    aggregator: AbilityAggregator,
    policy: RetryPolicy,
    clock: Clock,
}

impl ResultSubmitter {
    /// Submitter with the standard keys and aggregator.
    pub fn new(sink: Arc<dyn RecordSink>, policy: RetryPolicy) -> Self {
        Self {
            sink,
            keys: CanonicalKeys::default(),
            aggregator: AbilityAggregator::new(),
            policy,
            clock: Clock::default(),
        }
    }

    /// Use a differently configured aggregator.
    pub fn with_aggregator(mut self, aggregator: AbilityAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Clock used for the completion timestamp.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Compute the result for `answers` and submit it.
    ///
    /// Never fails. Delivery failures are reported through the outcome state
    /// and `observer`.
    pub async fn submit(
        &self,
        answers: &PersistedAnswers,
        catalog: &[ProblemDefinition],
        observer: SubmissionObserver,
    ) -> SubmissionOutcome {
        let result = AssessmentResult::compute(&answers.answers, &self.keys, &self.aggregator);
        let record = SubmissionRecord::assemble(answers, catalog, &result, self.clock.now());

        observer(SubmissionState::Pending);
        if attempt(self.sink.as_ref(), &record, 0).await.is_ok() {
            observer(SubmissionState::Succeeded);
            return SubmissionOutcome {
                result,
                record,
                state: SubmissionState::Succeeded,
                retry: None,
            };
        }

        if self.policy.max_retries == 0 {
            observer(SubmissionState::FailedFinal);
            return SubmissionOutcome {
                result,
                record,
                state: SubmissionState::FailedFinal,
                retry: None,
            };
        }

        let first = SubmissionState::Retrying { attempt: 1 };
        let (state_tx, state_rx) = watch::channel(first.clone());
        observer(first.clone());

        let retries = RetryLoop {
            sink: Arc::clone(&self.sink),
            record: record.clone(),
            policy: self.policy,
            state_tx,
            observer,
        };

        match self.policy.mode {
            RetryMode::Blocking => {
                let state = retries.run().await;
                SubmissionOutcome {
                    result,
                    record,
                    state,
                    retry: None,
                }
            }
            RetryMode::Background => {
                let task = tokio::spawn(async move {
                    retries.run().await;
                });
                SubmissionOutcome {
                    result,
                    record,
                    state: first,
                    retry: Some(RetryHandle {
                        state: state_rx,
                        task,
                    }),
                }
            }
        }
    }
}

/// One delivery attempt with logging. `retry` is 0 for the first attempt.
async fn attempt(sink: &dyn RecordSink, record: &SubmissionRecord, retry: u32) -> SubmissionResult<()> {
    let start = Instant::now();
    match sink.save(record).await {
        Ok(()) => {
            info!(
                examinee = %record.name,
                retry,
                latency_ms = start.elapsed().as_millis(),
                "Result submitted"
            );
            Ok(())
        }
        Err(e) => {
            error!(
                examinee = %record.name,
                error = %e,
                retry,
                latency_ms = start.elapsed().as_millis(),
                "Result submission failed"
            );
            Err(e)
        }
    }
}

struct RetryLoop {
    sink: Arc<dyn RecordSink>,
    record: SubmissionRecord,
    policy: RetryPolicy,
    state_tx: watch::Sender<SubmissionState>,
    observer: SubmissionObserver,
}

impl RetryLoop {
    fn publish(&self, state: SubmissionState) {
        self.state_tx.send_replace(state.clone());
        (self.observer)(state);
    }

    /// Assumes `Retrying { attempt: 1 }` has already been published.
    async fn run(self) -> SubmissionState {
        let mut retry = 1;
        loop {
            warn!(
                examinee = %self.record.name,
                retry,
                max_retries = self.policy.max_retries,
                delay_ms = self.policy.delay.as_millis(),
                "Retrying result submission"
            );
            tokio::time::sleep(self.policy.delay).await;

            if attempt(self.sink.as_ref(), &self.record, retry).await.is_ok() {
                self.publish(SubmissionState::Succeeded);
                return SubmissionState::Succeeded;
            }

            if retry >= self.policy.max_retries {
                error!(
                    examinee = %self.record.name,
                    attempts = retry + 1,
                    "Giving up on result submission"
                );
                self.publish(SubmissionState::FailedFinal);
                return SubmissionState::FailedFinal;
            }

            retry += 1;
            self.publish(SubmissionState::Retrying { attempt: retry });
        }
    }
}
