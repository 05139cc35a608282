use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Answer store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Stored value for {key} is not valid JSON: {message}")]
    Serialization { key: String, message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Record store (submission endpoint) errors
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Record rejected: {message}")]
    Rejected { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Local, non-fatal answer validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Examinee name must not be empty")]
    EmptyName,

    #[error("Answer for problem {problem} is incomplete: missing {missing}")]
    IncompleteAnswer { problem: u8, missing: String },
}

/// Session state machine errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No session has been started")]
    NotStarted,

    #[error("A session is already running for {examinee}")]
    AlreadyStarted { examinee: String },

    #[error("Stage {phase} cannot be advanced manually")]
    ManualAdvanceNotAllowed { phase: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Session runtime has shut down")]
    RuntimeClosed,
}

/// JSON-RPC protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unknown method: {method}")]
    UnknownMethod { method: String },

    #[error("Invalid parameters for {method}: {message}")]
    InvalidParameters { method: String, message: String },

    #[error("Execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// JSON-RPC 2.0 error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            ProtocolError::InvalidRequest { .. } => -32600,
            ProtocolError::UnknownMethod { .. } => -32601,
            ProtocolError::InvalidParameters { .. } => -32602,
            ProtocolError::ExecutionFailed { .. } => -32000,
            ProtocolError::Json(_) => -32700,
        }
    }
}

impl From<SessionError> for ProtocolError {
    fn from(err: SessionError) -> Self {
        ProtocolError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for submission operations
pub type SubmissionResult<T> = Result<T, SubmissionError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
