//! Gateway error taxonomy

use crate::link::LinkError;
use quadlink_shared::{CommandResult, ReasonCode};
use serde::Serialize;
use thiserror::Error;

/// Failures surfaced by the session coordinator and command dispatcher
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("not connected")]
    NotConnected,

    #[error("connect failed: {0}")]
    ConnectFailure(#[source] LinkError),

    #[error("no telemetry sample within {waited_ms} ms")]
    TelemetryTimeout { waited_ms: u64 },

    #[error("link error: {0}")]
    Link(#[from] LinkError),
}

impl SessionError {
    pub fn reason(&self) -> ReasonCode {
        match self {
            SessionError::NotConnected => ReasonCode::NotConnected,
            SessionError::ConnectFailure(_) => ReasonCode::ConnectFailed,
            SessionError::TelemetryTimeout { .. } => ReasonCode::TelemetryTimeout,
            SessionError::Link(_) => ReasonCode::LinkError,
        }
    }
}

/// Fold a dispatcher outcome into the tagged wire result
pub fn command_result<T: Serialize>(outcome: Result<T, SessionError>) -> CommandResult {
    match outcome {
        Ok(payload) => CommandResult::Success {
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        },
        Err(e) => CommandResult::Failure {
            reason: e.reason(),
            message: e.to_string(),
        },
    }
}
