pub mod loopback;
pub mod mock;
pub mod process;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::Value;

/// A stored value shipped along with a request, bound read-only under `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub value: Value,
}

/// One request to the engine session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Eval {
        command: String,
        return_count: usize,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bindings: Vec<Binding>,
    },
    Feval {
        function: String,
        args: Vec<Value>,
        return_count: usize,
    },
    /// Ask for a function's declared output count. Negative means variadic.
    Nargout { function: String },
    SetVariable { name: String, value: Value },
    GetVariable { name: String },
    Exit,
}

impl Request {
    /// Short operation name for logs and history.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Eval { .. } => "eval",
            Request::Feval { .. } => "feval",
            Request::Nargout { .. } => "nargout",
            Request::SetVariable { .. } => "set",
            Request::GetVariable { .. } => "get",
            Request::Exit => "exit",
        }
    }
}

/// The engine's answer to one [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Values(Vec<Value>),
    Count(i32),
    Done,
    Error { message: String },
    /// The session is gone; nothing more will be served.
    Exited,
}

/// Carries requests to an engine session and brings back its answers.
/// `Err` means the exchange itself broke; engine-side failures come back
/// as [`Response::Error`].
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, request: Request) -> Result<Response>;

    /// Give up on the session after a request was abandoned mid-flight.
    /// A late reply must never be read as the answer to a later request.
    fn abort(&mut self) {}
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, request: Request) -> Result<Response> {
        (**self).send(request).await
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}
