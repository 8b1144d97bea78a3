pub mod logging;
pub mod returning;

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;
use crate::value::Value;

/// Handle to a value stored with [`Interactor::store_object`].
///
/// Use it whole, as if it were a variable name, inside a later command.
/// Its format is private and may change between versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredToken(String);

impl StoredToken {
    pub(crate) fn new(token: String) -> Self {
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StoredToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Talks to a running engine session. `E` is how results come back.
///
/// Meant to be wrapped: a decorator can implement `Interactor` on top of
/// another one, see [`logging::LoggingInteractor`] and
/// [`returning::ReturnDataInteractor`].
///
/// When fewer values come back than a `return_count` asks for, the call
/// still succeeds and the result holds whatever was produced, possibly
/// nothing.
#[async_trait]
pub trait Interactor<E>: Send + Sync {
    /// Exit the engine. Every later call fails.
    async fn exit(&self) -> Result<()>;

    /// Evaluate `command`, discarding any result.
    async fn eval(&self, command: &str) -> Result<()>;

    /// Evaluate `command` and return up to `return_count` values.
    async fn returning_eval(&self, command: &str, return_count: usize) -> Result<E>;

    /// Call `function_name` with `args`, discarding any result.
    async fn feval(&self, function_name: &str, args: &[Value]) -> Result<()>;

    /// Call `function_name` and return its outputs. The output count is
    /// looked up from the function; a variadic function yields one value.
    async fn returning_feval(&self, function_name: &str, args: &[Value]) -> Result<E>;

    /// Call `function_name` and return up to `return_count` outputs.
    async fn returning_feval_with_count(
        &self,
        function_name: &str,
        args: &[Value],
        return_count: usize,
    ) -> Result<E>;

    async fn set_variable(&self, name: &str, value: Value) -> Result<()>;

    async fn get_variable(&self, name: &str) -> Result<E>;

    /// Keep `obj` outside the workspace and return a read-only handle to it.
    /// With `store_permanently == false` the first retrieval consumes it.
    async fn store_object(&self, obj: Value, store_permanently: bool) -> Result<StoredToken>;
}
