use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{EngineEvent, InputOutcome, SessionNotification, SessionSnapshot, SessionStateMachine};
use crate::error::{SessionError, SessionResult};
use crate::problems::ProblemDefinition;
use crate::storage::AnswerStore;
use crate::submission::ResultSubmitter;
use crate::time::Clock;

/// Queue depth for examinee commands.
const COMMAND_BUFFER: usize = 32;

enum Command {
    Start {
        name: String,
        reply: oneshot::Sender<SessionResult<SessionSnapshot>>,
    },
    Advance {
        reply: oneshot::Sender<SessionResult<SessionSnapshot>>,
    },
    Draft {
        token: u64,
        answer: Value,
        reply: oneshot::Sender<SessionResult<InputOutcome>>,
    },
    Submit {
        token: u64,
        answer: Value,
        reply: oneshot::Sender<SessionResult<InputOutcome>>,
    },
    Reset {
        reply: oneshot::Sender<SessionResult<SessionSnapshot>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Owns the state machine on one task and feeds it commands and engine
/// events one at a time.
pub struct SessionRuntime {
    machine: SessionStateMachine,
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl SessionRuntime {
    /// Build a runtime, its handle and the notification stream for the UI.
    pub fn new(
        catalog: Vec<ProblemDefinition>,
        store: Arc<dyn AnswerStore>,
        submitter: ResultSubmitter,
        clock: Clock,
    ) -> (
        Self,
        SessionHandle,
        mpsc::UnboundedReceiver<SessionNotification>,
    ) {
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, events) = mpsc::unbounded_channel();
        let (notification_tx, notifications) = mpsc::unbounded_channel();

        let machine = SessionStateMachine::new(catalog, store, submitter, event_tx, notification_tx)
            .with_clock(clock);

        let runtime = Self {
            machine,
            commands,
            events,
        };
        (
            runtime,
            SessionHandle {
                commands: command_tx,
            },
            notifications,
        )
    }

    /// Run on a new tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process commands and events until every handle is dropped.
    pub async fn run(mut self) {
        info!("Session runtime started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.dispatch(command).await,
                    None => break,
                },
                Some(event) = self.events.recv() => self.machine.handle_event(event).await,
            }
        }
        info!("Session runtime stopped");
    }

    async fn dispatch(&mut self, command: Command) {
        // a dropped reply receiver just means the caller stopped waiting
        match command {
            Command::Start { name, reply } => {
                let _ = reply.send(self.machine.start(&name).await);
            }
            Command::Advance { reply } => {
                let _ = reply.send(self.machine.advance());
            }
            Command::Draft {
                token,
                answer,
                reply,
            } => {
                let _ = reply.send(self.machine.draft(token, answer));
            }
            Command::Submit {
                token,
                answer,
                reply,
            } => {
                let _ = reply.send(self.machine.submit(token, answer).await);
            }
            Command::Reset { reply } => {
                let _ = reply.send(self.machine.reset().await);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.machine.snapshot());
            }
        }
        debug!("Command processed");
    }
}

/// Cloneable front end to a running [`SessionRuntime`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> SessionResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::RuntimeClosed)?;
        response.await.map_err(|_| SessionError::RuntimeClosed)
    }

    /// Start a session for the examinee.
    pub async fn start(&self, name: impl Into<String>) -> SessionResult<SessionSnapshot> {
        let name = name.into();
        self.request(|reply| Command::Start { name, reply }).await?
    }

    /// Move past an explanation or example stage.
    pub async fn advance(&self) -> SessionResult<SessionSnapshot> {
        self.request(|reply| Command::Advance { reply }).await?
    }

    /// Store a partial answer for the input stage `token`.
    pub async fn draft(&self, token: u64, answer: Value) -> SessionResult<InputOutcome> {
        self.request(|reply| Command::Draft {
            token,
            answer,
            reply,
        })
        .await?
    }

    /// Submit the answer for the input stage `token`.
    pub async fn submit(&self, token: u64, answer: Value) -> SessionResult<InputOutcome> {
        self.request(|reply| Command::Submit {
            token,
            answer,
            reply,
        })
        .await?
    }

    /// Abandon the session and clear its answers.
    pub async fn reset(&self) -> SessionResult<SessionSnapshot> {
        self.request(|reply| Command::Reset { reply }).await?
    }

    /// Current state.
    pub async fn snapshot(&self) -> SessionResult<SessionSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}
