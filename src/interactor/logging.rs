use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Instant;

use super::{Interactor, StoredToken};
use crate::error::Result;
use crate::value::Value;

/// Logs every call through `tracing`, then hands back the wrapped
/// interactor's result untouched.
pub struct LoggingInteractor<I> {
    inner: I,
    label: String,
}

impl<I> LoggingInteractor<I> {
    pub fn new(inner: I) -> Self {
        Self::with_label(inner, "engine")
    }

    /// `label` tags every event, to tell several sessions apart.
    pub fn with_label(inner: I, label: impl Into<String>) -> Self {
        Self {
            inner,
            label: label.into(),
        }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    pub fn into_inner(self) -> I {
        self.inner
    }

    fn log<R: Debug>(&self, op: &str, target: &str, started: Instant, result: &Result<R>) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(value) => tracing::info!(
                session = %self.label,
                op,
                target,
                elapsed_ms,
                result = ?value,
                "call completed"
            ),
            Err(err) => tracing::warn!(
                session = %self.label,
                op,
                target,
                elapsed_ms,
                error = %err,
                "call failed"
            ),
        }
    }
}

#[async_trait]
impl<E, I> Interactor<E> for LoggingInteractor<I>
where
    E: Debug + Send + 'static,
    I: Interactor<E>,
{
    async fn exit(&self) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.exit().await;
        self.log("exit", "", started, &result);
        result
    }

    async fn eval(&self, command: &str) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.eval(command).await;
        self.log("eval", command, started, &result);
        result
    }

    async fn returning_eval(&self, command: &str, return_count: usize) -> Result<E> {
        let started = Instant::now();
        let result = self.inner.returning_eval(command, return_count).await;
        self.log("returning_eval", command, started, &result);
        result
    }

    async fn feval(&self, function_name: &str, args: &[Value]) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.feval(function_name, args).await;
        self.log("feval", function_name, started, &result);
        result
    }

    async fn returning_feval(&self, function_name: &str, args: &[Value]) -> Result<E> {
        let started = Instant::now();
        let result = self.inner.returning_feval(function_name, args).await;
        self.log("returning_feval", function_name, started, &result);
        result
    }

    async fn returning_feval_with_count(
        &self,
        function_name: &str,
        args: &[Value],
        return_count: usize,
    ) -> Result<E> {
        let started = Instant::now();
        let result = self
            .inner
            .returning_feval_with_count(function_name, args, return_count)
            .await;
        self.log("returning_feval", function_name, started, &result);
        result
    }

    async fn set_variable(&self, name: &str, value: Value) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.set_variable(name, value).await;
        self.log("set_variable", name, started, &result);
        result
    }

    async fn get_variable(&self, name: &str) -> Result<E> {
        let started = Instant::now();
        let result = self.inner.get_variable(name).await;
        self.log("get_variable", name, started, &result);
        result
    }

    async fn store_object(&self, obj: Value, store_permanently: bool) -> Result<StoredToken> {
        let started = Instant::now();
        let result = self.inner.store_object(obj, store_permanently).await;
        let target = if store_permanently { "permanent" } else { "one-shot" };
        self.log("store_object", target, started, &result);
        result
    }
}
