//! JSON-RPC 2.0 over line-delimited stdio.
//!
//! Requests from the UI process arrive one JSON object per line on stdin;
//! responses and session notifications are written the same way to stdout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{handle_session_method, SharedState};
use crate::error::ProtocolError;
use crate::session::SessionNotification;

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request identifier (None for notifications).
    pub id: Option<Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request identifier, null when the request could not be parsed.
    pub id: Value,
    /// The result on success (mutually exclusive with error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure (mutually exclusive with result).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
}

/// Server-initiated JSON-RPC notification.
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

impl From<&SessionNotification> for JsonRpcNotification {
    fn from(notification: &SessionNotification) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: notification.method().to_string(),
            params: notification.params(),
        }
    }
}

/// Server identification returned from `initialize`.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Result of the `initialize` handshake.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub server_info: ServerInfo,
    /// Methods the UI may call.
    pub methods: Vec<&'static str>,
    /// Notification methods the UI should expect.
    pub notifications: Vec<&'static str>,
}

const METHODS: [&str; 8] = [
    "initialize",
    "ping",
    "session/start",
    "session/advance",
    "session/draft",
    "session/submit",
    "session/reset",
    "session/state",
];

const NOTIFICATIONS: [&str; 4] = [
    "session/stage",
    "session/tick",
    "session/completed",
    "session/submission",
];

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    fn from_error(id: Option<Value>, err: &ProtocolError) -> Self {
        Self::error(id, err.code(), err.to_string())
    }
}

/// JSON-RPC host driving one session runtime.
pub struct RpcServer {
    state: SharedState,
}

impl RpcServer {
    /// Create a new server over shared state
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Run over process stdin/stdout until EOF.
    pub async fn run_stdio(
        &self,
        notifications: mpsc::UnboundedReceiver<SessionNotification>,
    ) -> std::io::Result<()> {
        self.run(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            notifications,
        )
        .await
    }

    /// Serve requests from `reader` and forward notifications, writing
    /// everything to `writer`, until `reader` reaches EOF.
    pub async fn run<R, W>(
        &self,
        reader: R,
        mut writer: W,
        mut notifications: mpsc::UnboundedReceiver<SessionNotification>,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Assessment engine host starting...");
        let mut lines = reader.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("EOF received, shutting down");
                        break;
                    };
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    debug!(request = %trimmed, "Received request");

                    if let Some(response) = self.handle_line(trimmed).await {
                        write_message(&mut writer, &response).await?;
                    }
                }
                Some(notification) = notifications.recv() => {
                    write_message(&mut writer, &JsonRpcNotification::from(&notification)).await?;
                }
            }
        }

        Ok(())
    }

    /// Handle one raw line. Returns None when no response is owed.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                error!(error = %e, "Failed to parse request");
                Some(JsonRpcResponse::error(
                    None,
                    -32700,
                    format!("Parse error: {}", e),
                ))
            }
        }
    }

    /// Handle a single JSON-RPC request.
    /// Requests without an id are notifications and get no response.
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();
        if request.jsonrpc != "2.0" {
            let err = ProtocolError::InvalidRequest {
                message: format!("Unsupported jsonrpc version {}", request.jsonrpc),
            };
            return (!is_notification).then(|| JsonRpcResponse::from_error(request.id, &err));
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "ping" => JsonRpcResponse::success(request.id, Value::Object(Default::default())),
            method if method.starts_with("session/") => {
                match handle_session_method(&self.state, method, request.params).await {
                    Ok(result) => JsonRpcResponse::success(request.id, result),
                    Err(e) => {
                        error!(method = %method, error = %e, "Session method failed");
                        JsonRpcResponse::from_error(request.id, &e)
                    }
                }
            }
            method => {
                if is_notification {
                    debug!(method = %method, "Unknown notification, ignoring");
                    return None;
                }
                error!(method = %method, "Unknown method");
                let err = ProtocolError::UnknownMethod {
                    method: method.to_string(),
                };
                JsonRpcResponse::from_error(request.id, &err)
            }
        };

        (!is_notification).then_some(response)
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling initialize request");

        let result = InitializeResult {
            server_info: ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            methods: METHODS.to_vec(),
            notifications: NOTIFICATIONS.to_vec(),
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize initialize result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }
}

async fn write_message<W, T>(writer: &mut W, message: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(message)?;
    debug!(message = %json, "Sending message");

    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
