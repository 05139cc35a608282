//! Stdio host that lets a UI process drive one assessment session.
//!
//! This module provides:
//! - JSON-RPC 2.0 framing over stdin/stdout
//! - Routing of `session/*` methods to the session runtime
//! - Forwarding of session notifications to the UI

mod handlers;
mod rpc;

pub use handlers::*;
pub use rpc::*;

use std::sync::Arc;

use crate::session::SessionHandle;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Front end of the running session runtime.
    pub session: SessionHandle,
}

impl AppState {
    /// Create new application state
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
