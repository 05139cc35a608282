use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::{
    EngineEvent, InputOutcome, Phase, Session, SessionNotification, SessionSnapshot, TimerSignal,
};
use crate::error::{SessionError, SessionResult, ValidationError};
use crate::problems::{ProblemDefinition, StageKind, StageSpec};
use crate::storage::{self, AnswerStore, PersistedAnswers};
use crate::submission::{ResultSubmitter, RetryHandle, SubmissionObserver};
use crate::time::Clock;
use crate::timer::StageTimer;

/// Drives one session through the catalog.
///
/// All methods run to completion before the next is called; the runtime
/// guarantees this by owning the machine on a single task. Timer callbacks
/// and submission progress come back as [`EngineEvent`]s on `events` and must
/// be passed to [`handle_event`](Self::handle_event).
pub struct SessionStateMachine {
    catalog: Arc<Vec<ProblemDefinition>>,
    store: Arc<dyn AnswerStore>,
    submitter: ResultSubmitter,
    clock: Clock,
    timer: StageTimer,
    events: UnboundedSender<EngineEvent>,
    notifications: UnboundedSender<SessionNotification>,
    session: Option<Session>,
    next_token: u64,
    retry: Option<RetryHandle>,
}

impl SessionStateMachine {
    /// Create an idle machine.
    pub fn new(
        catalog: Vec<ProblemDefinition>,
        store: Arc<dyn AnswerStore>,
        submitter: ResultSubmitter,
        events: UnboundedSender<EngineEvent>,
        notifications: UnboundedSender<SessionNotification>,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            store,
            submitter,
            clock: Clock::default(),
            timer: StageTimer::new(),
            events,
            notifications,
            session: None,
            next_token: 0,
            retry: None,
        }
    }

    /// Clock used for start and completion timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The running session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Current state as seen by the UI.
    pub fn snapshot(&self) -> SessionSnapshot {
        let Some(session) = &self.session else {
            return SessionSnapshot::default();
        };
        let problem = self.catalog.get(session.problem_index);

        SessionSnapshot {
            session_id: Some(session.id),
            examinee_name: Some(session.examinee_name.clone()),
            phase: session.phase,
            problem_id: problem.map(|p| p.id),
            item_index: session.item_index,
            item_count: problem.map(|p| p.item_count).unwrap_or(0),
            time_remaining: session.time_remaining,
            stage_token: Some(session.stage_token),
            result: session.result.clone(),
            submission: session.submission.clone(),
        }
    }

    /// Begin a session for `name`, clearing anything a previous run left behind.
    pub async fn start(&mut self, name: &str) -> SessionResult<SessionSnapshot> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if let Some(existing) = &self.session {
            if existing.phase != Phase::Complete {
                return Err(SessionError::AlreadyStarted {
                    examinee: existing.examinee_name.clone(),
                });
            }
        }

        self.timer.cancel();
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }

        self.store.clear().await?;
        let now = self.clock.now();
        storage::record_session_start(self.store.as_ref(), name, now).await?;

        self.session = Some(Session::new(name.to_string(), now));
        info!(examinee = %name, problems = self.catalog.len(), "Session started");

        self.enter_problem().await;
        Ok(self.snapshot())
    }

    /// Examinee action on an explanation or example stage.
    pub fn advance(&mut self) -> SessionResult<SessionSnapshot> {
        let catalog = Arc::clone(&self.catalog);
        let session = self.session.as_ref().ok_or(SessionError::NotStarted)?;
        let phase = session.phase;
        let problem = catalog
            .get(session.problem_index)
            .ok_or_else(|| SessionError::ManualAdvanceNotAllowed { phase: phase.name() })?;

        match phase {
            Phase::Explanation if problem.has_example => {
                self.enter_phase(Phase::Example { revealed: false }, None)
            }
            Phase::Example { revealed: false } => {
                self.enter_phase(Phase::Example { revealed: true }, None)
            }
            Phase::Explanation | Phase::Example { revealed: true } => self.enter_stage(0),
            other => {
                return Err(SessionError::ManualAdvanceNotAllowed {
                    phase: other.name(),
                })
            }
        }

        Ok(self.snapshot())
    }

    /// Keep a partial answer for the current input stage. It becomes the
    /// answer if the stage expires before a submit.
    pub fn draft(&mut self, token: u64, answer: Value) -> SessionResult<InputOutcome> {
        let session = self.session.as_mut().ok_or(SessionError::NotStarted)?;
        if session.stage_token != token || !session.phase.is_input() {
            return Ok(InputOutcome::Ignored);
        }
        session.draft = Some(answer);
        Ok(InputOutcome::Accepted)
    }

    /// Examinee submit for the input stage identified by `token`.
    ///
    /// Late or repeated submits are ignored. An incomplete answer is rejected
    /// and leaves the stage running.
    pub async fn submit(&mut self, token: u64, answer: Value) -> SessionResult<InputOutcome> {
        let catalog = Arc::clone(&self.catalog);
        let session = self.session.as_ref().ok_or(SessionError::NotStarted)?;

        if session.stage_token != token || !session.phase.is_input() {
            debug!(
                token,
                current = session.stage_token,
                "Ignoring submit for a stage that has ended"
            );
            return Ok(InputOutcome::Ignored);
        }
        let Some(problem) = catalog.get(session.problem_index) else {
            return Ok(InputOutcome::Ignored);
        };

        if let Some(missing) = problem.item_shape().first_missing(&answer) {
            return Err(ValidationError::IncompleteAnswer {
                problem: problem.id,
                missing,
            }
            .into());
        }

        info!(problem = problem.id, item = session.item_index, "Answer submitted");
        self.complete_input(Some(answer)).await;
        Ok(InputOutcome::Accepted)
    }

    /// Apply a timer or submission event. Events for stages or sessions that
    /// are no longer current are dropped.
    pub async fn handle_event(&mut self, event: EngineEvent) {
        let Some(session) = self.session.as_mut() else {
            debug!(?event, "Ignoring event without a session");
            return;
        };

        match event {
            EngineEvent::Timer { token, .. } if token != session.stage_token => {
                debug!(token, current = session.stage_token, "Ignoring stale timer event");
            }
            EngineEvent::Timer {
                token,
                signal: TimerSignal::Tick(remaining),
            } => {
                session.time_remaining = Some(remaining);
                self.notify(SessionNotification::Tick { token, remaining });
            }
            EngineEvent::Timer {
                signal: TimerSignal::Expired,
                ..
            } => {
                let (phase, problem_index) = (session.phase, session.problem_index);
                match phase {
                    Phase::Main {
                        kind: StageKind::Input,
                        ..
                    } => {
                        info!(problem_index, "Input stage expired");
                        self.complete_input(None).await;
                    }
                    Phase::Main { stage_index, .. } => self.advance_stage(stage_index).await,
                    _ => {}
                }
            }
            EngineEvent::Submission { session_id, state } => {
                if session.id != session_id || !state.supersedes(&session.submission) {
                    return;
                }
                session.submission = state.clone();
                self.notify(SessionNotification::Submission { state });
            }
        }
    }

    /// Abandon the session: stop the timer and any retries, then clear the store.
    pub async fn reset(&mut self) -> SessionResult<SessionSnapshot> {
        self.timer.cancel();
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
        self.next_token += 1;

        if let Some(session) = self.session.take() {
            info!(examinee = %session.examinee_name, "Session reset");
        }
        self.store.clear().await?;

        let snapshot = self.snapshot();
        self.notify(SessionNotification::Stage(snapshot.clone()));
        Ok(snapshot)
    }

    /// Enter the current problem's first stage, or complete when past the end.
    async fn enter_problem(&mut self) {
        let catalog = Arc::clone(&self.catalog);
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(problem) = catalog.get(session.problem_index) else {
            self.complete().await;
            return;
        };

        session.item_index = 0;
        session.item_answers.clear();

        if problem.has_explanation {
            self.enter_phase(Phase::Explanation, None);
        } else if problem.has_example {
            self.enter_phase(Phase::Example { revealed: false }, None);
        } else {
            self.enter_stage(0);
        }
    }

    fn enter_stage(&mut self, stage_index: usize) {
        let catalog = Arc::clone(&self.catalog);
        let Some(problem) = self
            .session
            .as_ref()
            .and_then(|s| catalog.get(s.problem_index))
        else {
            return;
        };

        let stage = problem
            .stages
            .get(stage_index)
            .copied()
            .unwrap_or_else(StageSpec::open_input);
        self.enter_phase(
            Phase::Main {
                stage_index,
                kind: stage.kind,
            },
            stage.duration_seconds,
        );
    }

    /// Timer-driven move to the next stage of the current item.
    async fn advance_stage(&mut self, stage_index: usize) {
        let catalog = Arc::clone(&self.catalog);
        let stage_count = self
            .session
            .as_ref()
            .and_then(|s| catalog.get(s.problem_index))
            .map(|p| p.stages.len())
            .unwrap_or(0);

        if stage_index + 1 < stage_count {
            self.enter_stage(stage_index + 1);
        } else {
            self.complete_input(None).await;
        }
    }

    /// Single exit of every input stage, shared by submit and expiry.
    async fn complete_input(&mut self, submitted: Option<Value>) {
        self.timer.cancel();
        self.next_token += 1;
        let closing_token = self.next_token;
        let catalog = Arc::clone(&self.catalog);
        let now = self.clock.now();

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(problem) = catalog.get(session.problem_index) else {
            return;
        };

        // nothing may complete this stage a second time
        session.stage_token = closing_token;

        let raw = submitted
            .or_else(|| session.draft.take())
            .unwrap_or(Value::Null);
        session.item_answers.truncate(session.item_index);
        session.item_answers.push(problem.item_shape().coerce(&raw));
        let answer = problem.assemble_answer(&session.item_answers);

        if let Err(e) = storage::record_answer(self.store.as_ref(), problem, &answer, now).await {
            error!(problem = problem.id, error = %e, "Failed to record answer");
        }
        session.answers.insert(problem.id, answer);
        session.completed_at.insert(problem.id, now);

        let next_item = session.item_index + 1;
        if next_item < problem.item_count {
            session.item_index = next_item;
            self.enter_stage(0);
        } else {
            session.problem_index += 1;
            self.enter_problem().await;
        }
    }

    async fn complete(&mut self) {
        self.timer.cancel();
        self.next_token += 1;
        let token = self.next_token;

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.phase = Phase::Complete;
        session.time_remaining = None;
        session.stage_token = token;
        session.draft = None;
        info!(examinee = %session.examinee_name, "Assessment complete");

        let answered = session.answered();
        let session_id = session.id;
        let events = self.events.clone();
        let observer: SubmissionObserver = Arc::new(move |state| {
            let _ = events.send(EngineEvent::Submission { session_id, state });
        });

        self.check_store(&answered).await;
        let outcome = self
            .submitter
            .submit(&answered, &self.catalog, observer)
            .await;
        if let Some(session) = self.session.as_mut() {
            session.result = Some(outcome.result);
            session.submission = outcome.state;
        }
        self.retry = outcome.retry;

        self.notify(SessionNotification::Completed(self.snapshot()));
    }

    /// Compare the store with the session's own answers. The session copy is
    /// what gets scored; a store that cannot be read or disagrees is logged.
    async fn check_store(&self, answered: &PersistedAnswers) {
        match PersistedAnswers::load(self.store.as_ref(), &self.catalog).await {
            Ok(stored) if stored.answers == answered.answers => {}
            Ok(stored) => {
                let differing: Vec<_> = answered
                    .answers
                    .keys()
                    .filter(|id| stored.answers.get(*id) != answered.answers.get(*id))
                    .collect();
                warn!(?differing, "Answer store differs from the session's answers");
            }
            Err(e) => {
                error!(error = %e, "Could not read answers back from the store");
            }
        }
    }

    /// Switch to `phase`, replacing the stage token and timer.
    fn enter_phase(&mut self, phase: Phase, duration_seconds: Option<u32>) {
        self.timer.cancel();
        self.next_token += 1;
        let token = self.next_token;

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.phase = phase;
        session.stage_token = token;
        session.time_remaining = duration_seconds;
        session.draft = None;

        debug!(
            problem_index = session.problem_index,
            item = session.item_index,
            phase = %phase.name(),
            token,
            "Stage entered"
        );

        if let Some(seconds) = duration_seconds {
            let tick_events = self.events.clone();
            let expire_events = self.events.clone();
            self.timer.start(
                seconds,
                move |remaining| {
                    let _ = tick_events.send(EngineEvent::Timer {
                        token,
                        signal: TimerSignal::Tick(remaining),
                    });
                },
                move || {
                    let _ = expire_events.send(EngineEvent::Timer {
                        token,
                        signal: TimerSignal::Expired,
                    });
                },
            );
        }

        self.notify(SessionNotification::Stage(self.snapshot()));
    }

    fn notify(&self, notification: SessionNotification) {
        // the UI may have gone away; the session keeps running regardless
        let _ = self.notifications.send(notification);
    }
}
