//! The single failure type of the interactor surface.
//!
//! Every operation either completes or fails with [`InvocationError`].
//! The [`InvocationFailure`] reason only shapes the message and logs;
//! callers are not meant to branch on it.

use std::fmt;

/// Why a request could not be completed against the engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationFailure {
    /// The session could not be reached or the connection broke.
    Disconnected,
    /// The session has already exited.
    Exited,
    /// The engine rejected or failed to evaluate the request.
    Engine,
    /// A request or response could not be encoded or decoded.
    Protocol,
    /// The engine did not answer in time.
    Timeout,
}

impl fmt::Display for InvocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InvocationFailure::Disconnected => "disconnected",
            InvocationFailure::Exited => "session exited",
            InvocationFailure::Engine => "engine error",
            InvocationFailure::Protocol => "protocol error",
            InvocationFailure::Timeout => "timed out",
        };
        f.write_str(label)
    }
}

/// A request could not be completed against the engine session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: {message}")]
pub struct InvocationError {
    reason: InvocationFailure,
    message: String,
}

impl InvocationError {
    pub fn new(reason: InvocationFailure, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::new(InvocationFailure::Disconnected, message)
    }

    pub fn exited() -> Self {
        Self::new(
            InvocationFailure::Exited,
            "the engine session is no longer running",
        )
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::new(InvocationFailure::Engine, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(InvocationFailure::Protocol, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(InvocationFailure::Timeout, message)
    }

    pub fn reason(&self) -> InvocationFailure {
        self.reason
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for InvocationError {
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(err.to_string())
    }
}

impl From<std::io::Error> for InvocationError {
    fn from(err: std::io::Error) -> Self {
        Self::disconnected(err.to_string())
    }
}

/// Result alias used across the interactor surface.
pub type Result<T> = std::result::Result<T, InvocationError>;
