//! The session proxy: implements [`Interactor`] over any [`Transport`].

pub mod store;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::consts::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{InvocationError, InvocationFailure, Result};
use crate::history::{History, HistoryEntry, Outcome};
use crate::interactor::{Interactor, StoredToken};
use crate::transport::{Request, Response, Transport};
use crate::value::Value;
use store::ObjectStore;

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub request_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Forwards interactor calls to an engine session, one at a time.
///
/// Owns the stored-object table: tokens named in an `eval` command are
/// shipped with the request as read-only bindings. Once the session has
/// exited every call fails without reaching the transport.
pub struct RemoteProxy<T: Transport> {
    transport: Mutex<T>,
    store: ObjectStore,
    exited: AtomicBool,
    /// Set while a request is on the wire. Still set on entry means an
    /// earlier call was dropped mid-flight and replies are out of step.
    in_flight: AtomicBool,
    requests: AtomicUsize,
    history: Option<Arc<dyn History>>,
    config: ProxyConfig,
}

impl<T: Transport> RemoteProxy<T> {
    pub fn new(transport: T, config: ProxyConfig) -> Self {
        Self {
            transport: Mutex::new(transport),
            store: ObjectStore::new(),
            exited: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            history: None,
            config,
        }
    }

    /// Record every call into `history`.
    pub fn with_history(mut self, history: Arc<dyn History>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Number of requests that reached the transport.
    pub fn requests_sent(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of stored objects still retrievable.
    pub fn stored_objects(&self) -> usize {
        self.store.len()
    }

    /// Hand the transport back, e.g. to inspect a test double.
    pub fn into_transport(self) -> T {
        self.transport.into_inner()
    }

    fn mark_exited(&self) {
        self.exited.store(true, Ordering::SeqCst);
        self.store.clear();
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        if self.is_exited() {
            return Err(InvocationError::exited());
        }
        let kind = request.kind();
        let exiting = matches!(request, Request::Exit);

        let mut transport = self.transport.lock().await;
        // Another caller may have exited the session while we waited.
        if self.is_exited() {
            return Err(InvocationError::exited());
        }

        if self.in_flight.load(Ordering::SeqCst) {
            transport.abort();
            return Err(InvocationError::disconnected(
                "session out of sync after an abandoned request",
            ));
        }

        tracing::debug!(kind, "sending request");
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.in_flight.store(true, Ordering::SeqCst);
        let timeout = self.config.request_timeout;
        let response = match tokio::time::timeout(timeout, transport.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                self.in_flight.store(false, Ordering::SeqCst);
                tracing::warn!(kind, error = %err, "transport failure");
                return Err(err);
            }
            // The reply may still arrive; in_flight stays set so nothing
            // is ever read through this transport again.
            Err(_) => {
                transport.abort();
                tracing::warn!(kind, ?timeout, "request timed out");
                return Err(InvocationError::timeout(format!(
                    "no reply to {kind} within {timeout:?}"
                )));
            }
        };
        self.in_flight.store(false, Ordering::SeqCst);
        drop(transport);

        match response {
            Response::Exited if exiting => {
                self.mark_exited();
                Ok(Response::Done)
            }
            Response::Exited => {
                self.mark_exited();
                Err(InvocationError::exited())
            }
            Response::Error { message } => Err(InvocationError::engine(message)),
            other => Ok(other),
        }
    }

    async fn record<R>(&self, kind: &str, text: &str, result: &Result<R>) {
        let Some(history) = &self.history else {
            return;
        };
        let outcome = match result {
            Ok(_) => Outcome::Ok,
            Err(err) => Outcome::Failed(err.to_string()),
        };
        if let Err(err) = history.record(HistoryEntry::new(kind, text, outcome)).await {
            tracing::warn!(error = %err, "failed to record history");
        }
    }

    async fn eval_request(&self, command: &str, return_count: usize) -> Result<Vec<Value>> {
        let bindings = self.store.take_bindings(command);
        let request = Request::Eval {
            command: command.to_string(),
            return_count,
            bindings: bindings.clone(),
        };
        match self.dispatch(request).await {
            Ok(response) => into_values(response, return_count),
            Err(err) => {
                // Not delivered, so not retrieved.
                let undelivered = matches!(
                    err.reason(),
                    InvocationFailure::Disconnected | InvocationFailure::Timeout
                );
                if undelivered && !self.is_exited() {
                    self.store.put_back(bindings);
                }
                Err(err)
            }
        }
    }

    async fn feval_request(
        &self,
        function_name: &str,
        args: &[Value],
        return_count: usize,
    ) -> Result<Vec<Value>> {
        let response = self
            .dispatch(Request::Feval {
                function: function_name.to_string(),
                args: args.to_vec(),
                return_count,
            })
            .await?;
        into_values(response, return_count)
    }

    /// The declared output count of `function_name`; variadic counts as one.
    async fn output_count(&self, function_name: &str) -> Result<usize> {
        let response = self
            .dispatch(Request::Nargout {
                function: function_name.to_string(),
            })
            .await?;
        match response {
            Response::Count(n) if n < 0 => Ok(1),
            Response::Count(n) => Ok(n as usize),
            other => Err(unexpected(other)),
        }
    }
}

/// Values from a response, cut down to `return_count`. Fewer values than
/// asked for is not an error.
fn into_values(response: Response, return_count: usize) -> Result<Vec<Value>> {
    match response {
        Response::Values(mut values) => {
            values.truncate(return_count);
            for value in &values {
                value
                    .validate()
                    .map_err(|e| InvocationError::protocol(format!("bad value in reply: {e}")))?;
            }
            Ok(values)
        }
        Response::Done => Ok(Vec::new()),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: Response) -> InvocationError {
    InvocationError::protocol(format!("unexpected response: {response:?}"))
}

#[async_trait]
impl<T: Transport> Interactor<Vec<Value>> for RemoteProxy<T> {
    async fn exit(&self) -> Result<()> {
        let result = self.dispatch(Request::Exit).await.map(|_| ());
        if result.is_ok() {
            self.mark_exited();
        }
        self.record("exit", "", &result).await;
        result
    }

    async fn eval(&self, command: &str) -> Result<()> {
        let result = self.eval_request(command, 0).await.map(|_| ());
        self.record("eval", command, &result).await;
        result
    }

    async fn returning_eval(&self, command: &str, return_count: usize) -> Result<Vec<Value>> {
        let result = self.eval_request(command, return_count).await;
        self.record("eval", command, &result).await;
        result
    }

    async fn feval(&self, function_name: &str, args: &[Value]) -> Result<()> {
        let result = self.feval_request(function_name, args, 0).await.map(|_| ());
        self.record("feval", function_name, &result).await;
        result
    }

    async fn returning_feval(&self, function_name: &str, args: &[Value]) -> Result<Vec<Value>> {
        let result = match self.output_count(function_name).await {
            Ok(count) => self.feval_request(function_name, args, count).await,
            Err(err) => Err(err),
        };
        self.record("feval", function_name, &result).await;
        result
    }

    async fn returning_feval_with_count(
        &self,
        function_name: &str,
        args: &[Value],
        return_count: usize,
    ) -> Result<Vec<Value>> {
        let result = self.feval_request(function_name, args, return_count).await;
        self.record("feval", function_name, &result).await;
        result
    }

    async fn set_variable(&self, name: &str, value: Value) -> Result<()> {
        let result = self
            .dispatch(Request::SetVariable {
                name: name.to_string(),
                value,
            })
            .await
            .map(|_| ());
        self.record("set", name, &result).await;
        result
    }

    async fn get_variable(&self, name: &str) -> Result<Vec<Value>> {
        let result = match self
            .dispatch(Request::GetVariable {
                name: name.to_string(),
            })
            .await
        {
            Ok(response) => into_values(response, 1),
            Err(err) => Err(err),
        };
        self.record("get", name, &result).await;
        result
    }

    async fn store_object(&self, obj: Value, store_permanently: bool) -> Result<StoredToken> {
        if self.is_exited() {
            return Err(InvocationError::exited());
        }
        let token = self.store.store(obj, store_permanently);
        tracing::debug!(permanent = store_permanently, "stored object");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn proxy(responses: Vec<Response>) -> RemoteProxy<MockTransport> {
        RemoteProxy::new(MockTransport::new(responses), ProxyConfig::default())
    }

    #[tokio::test]
    async fn extra_values_are_truncated() {
        let proxy = proxy(vec![Response::Values(vec![
            Value::Double(1.0),
            Value::Double(2.0),
        ])]);
        let values = proxy.returning_eval("f", 1).await.unwrap();
        assert_eq!(values, vec![Value::Double(1.0)]);
    }

    #[tokio::test]
    async fn missing_values_are_tolerated() {
        let proxy = proxy(vec![Response::Values(vec![])]);
        let values = proxy.returning_eval("f", 3).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn engine_errors_become_invocation_errors() {
        let proxy = proxy(vec![Response::Error {
            message: "boom".to_string(),
        }]);
        let err = proxy.eval("error('boom')").await.unwrap_err();
        assert_eq!(err.reason(), crate::error::InvocationFailure::Engine);
        assert_eq!(err.message(), "boom");
    }

    #[tokio::test]
    async fn variadic_functions_return_one_value() {
        let mock = MockTransport::new(vec![
            Response::Count(-1),
            Response::Values(vec![Value::Double(1.0)]),
        ]);
        let log = mock.requests();
        let proxy = RemoteProxy::new(mock, ProxyConfig::default());

        proxy.returning_feval("deal", &[Value::Double(1.0)]).await.unwrap();

        let requests = log.lock().unwrap();
        assert!(matches!(
            &requests[1],
            Request::Feval { return_count: 1, .. }
        ));
    }

    #[tokio::test]
    async fn wrong_response_kind_is_a_protocol_error() {
        let proxy = proxy(vec![Response::Count(2)]);
        let err = proxy.get_variable("x").await.unwrap_err();
        assert_eq!(err.reason(), crate::error::InvocationFailure::Protocol);
    }

    #[tokio::test]
    async fn engine_reporting_exit_closes_the_proxy() {
        let proxy = proxy(vec![Response::Exited]);
        assert!(proxy.eval("x = 1").await.is_err());
        assert!(proxy.is_exited());
        // No response is scripted; a second call must not reach the transport.
        let err = proxy.eval("x = 1").await.unwrap_err();
        assert_eq!(err.reason(), crate::error::InvocationFailure::Exited);
        assert_eq!(proxy.requests_sent(), 1);
    }

    #[tokio::test]
    async fn exit_accepts_a_vanishing_session() {
        let proxy = proxy(vec![Response::Exited]);
        proxy.exit().await.unwrap();
        assert!(proxy.is_exited());
    }

    #[tokio::test]
    async fn slow_transport_times_out() {
        struct Stalled;

        #[async_trait]
        impl Transport for Stalled {
            async fn send(&mut self, _request: Request) -> Result<Response> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Response::Done)
            }
        }

        let proxy = RemoteProxy::new(
            Stalled,
            ProxyConfig {
                request_timeout: Duration::from_millis(20),
            },
        );
        let err = proxy.eval("pause(3600)").await.unwrap_err();
        assert_eq!(err.reason(), crate::error::InvocationFailure::Timeout);

        // A late reply could still show up; the session is not reused.
        let err = proxy.eval("x = 1").await.unwrap_err();
        assert_eq!(err.reason(), crate::error::InvocationFailure::Disconnected);
        assert_eq!(proxy.requests_sent(), 1);
    }

    #[tokio::test]
    async fn eval_ships_stored_objects() {
        let mock = MockTransport::new(vec![Response::Done]);
        let log = mock.requests();
        let proxy = RemoteProxy::new(mock, ProxyConfig::default());

        let token = proxy.store_object(Value::Double(9.0), false).await.unwrap();
        proxy.eval(&format!("y = {token}")).await.unwrap();

        let requests = log.lock().unwrap();
        match &requests[0] {
            Request::Eval { bindings, .. } => {
                assert_eq!(bindings.len(), 1);
                assert_eq!(bindings[0].value, Value::Double(9.0));
            }
            other => panic!("expected Eval, got {other:?}"),
        }
        assert_eq!(proxy.stored_objects(), 0);
    }

    #[tokio::test]
    async fn abandoned_request_poisons_the_session() {
        struct StallsOnce {
            calls: usize,
            aborted: Arc<AtomicBool>,
        }

        #[async_trait]
        impl Transport for StallsOnce {
            async fn send(&mut self, _request: Request) -> Result<Response> {
                self.calls += 1;
                if self.calls == 1 {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok(Response::Values(vec![Value::Double(2.0)]))
            }

            fn abort(&mut self) {
                self.aborted.store(true, Ordering::SeqCst);
            }
        }

        let aborted = Arc::new(AtomicBool::new(false));
        let proxy = RemoteProxy::new(
            StallsOnce {
                calls: 0,
                aborted: aborted.clone(),
            },
            ProxyConfig::default(),
        );

        // Caller gives up, e.g. Ctrl+C in the REPL.
        let dropped =
            tokio::time::timeout(Duration::from_millis(20), proxy.returning_eval("slow", 1)).await;
        assert!(dropped.is_err());

        let err = proxy.returning_eval("fast", 1).await.unwrap_err();
        assert_eq!(err.reason(), crate::error::InvocationFailure::Disconnected);
        assert!(aborted.load(Ordering::SeqCst));
        assert_eq!(proxy.requests_sent(), 1);
    }

    #[tokio::test]
    async fn transport_error_leaves_the_session_usable() {
        let proxy = RemoteProxy::new(
            MockTransport::with_results(vec![
                Err(InvocationError::protocol("garbled line")),
                Ok(Response::Done),
            ]),
            ProxyConfig::default(),
        );
        proxy.eval("x = 1").await.unwrap_err();
        proxy.eval("x = 1").await.unwrap();
        assert_eq!(proxy.requests_sent(), 2);
    }

    #[tokio::test]
    async fn malformed_matrix_reply_is_a_protocol_error() {
        let proxy = proxy(vec![Response::Values(vec![Value::Matrix {
            rows: 2,
            cols: 2,
            data: vec![1.0],
        }])]);
        let err = proxy.returning_eval("m", 1).await.unwrap_err();
        assert_eq!(err.reason(), crate::error::InvocationFailure::Protocol);
    }

    #[tokio::test]
    async fn undelivered_one_shot_object_is_kept() {
        let proxy = RemoteProxy::new(
            MockTransport::with_results(vec![
                Err(InvocationError::disconnected("pipe closed")),
                Ok(Response::Values(vec![Value::Double(5.0)])),
            ]),
            ProxyConfig::default(),
        );
        let token = proxy.store_object(Value::Double(5.0), false).await.unwrap();

        let err = proxy.returning_eval(token.as_str(), 1).await.unwrap_err();
        assert_eq!(err.reason(), crate::error::InvocationFailure::Disconnected);
        assert_eq!(proxy.stored_objects(), 1);

        proxy.returning_eval(token.as_str(), 1).await.unwrap();
        assert_eq!(proxy.stored_objects(), 0);
    }

    #[tokio::test]
    async fn engine_failure_still_consumes_one_shot_object() {
        let proxy = proxy(vec![Response::Error {
            message: "Undefined function 'f'.".to_string(),
        }]);
        let token = proxy.store_object(Value::Double(5.0), false).await.unwrap();
        proxy.eval(&format!("f({token})")).await.unwrap_err();
        assert_eq!(proxy.stored_objects(), 0);
    }

    #[tokio::test]
    async fn calls_are_recorded() {
        let history = Arc::new(crate::history::sqlite::SqliteHistory::in_memory().unwrap());
        let proxy = proxy(vec![
            Response::Done,
            Response::Error {
                message: "nope".to_string(),
            },
        ])
        .with_history(history.clone());

        proxy.eval("a = 1").await.unwrap();
        proxy.feval("missing", &[]).await.unwrap_err();

        let entries = history.recent(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], HistoryEntry::new("eval", "a = 1", Outcome::Ok));
        assert_eq!(entries[1].kind, "feval");
        assert!(matches!(&entries[1].outcome, Outcome::Failed(msg) if msg.contains("nope")));
    }
}
