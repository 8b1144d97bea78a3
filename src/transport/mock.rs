use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{Request, Response, Transport};
use crate::error::{InvocationError, Result};

/// A scripted transport for tests. Answers with pre-defined responses in
/// order and keeps every request it saw.
pub struct MockTransport {
    responses: VecDeque<Result<Response>>,
    log: Arc<Mutex<Vec<Request>>>,
}

impl MockTransport {
    pub fn new(responses: Vec<Response>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Script transport-level failures as well as responses.
    pub fn with_results(results: Vec<Result<Response>>) -> Self {
        Self {
            responses: results.into(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared view of the requests received so far. Stays valid after the
    /// transport has been moved into a proxy.
    pub fn requests(&self) -> Arc<Mutex<Vec<Request>>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, request: Request) -> Result<Response> {
        let seen = {
            let mut log = self.log.lock().unwrap();
            log.push(request);
            log.len()
        };
        self.responses.pop_front().unwrap_or_else(|| {
            Err(InvocationError::disconnected(format!(
                "MockTransport: no more responses (called {seen} times)"
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_and_records() {
        let mut mock = MockTransport::new(vec![Response::Done, Response::Count(2)]);
        let log = mock.requests();

        assert_eq!(mock.send(Request::Exit).await.unwrap(), Response::Done);
        let second = mock
            .send(Request::Nargout {
                function: "size".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(second, Response::Count(2));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn running_dry_is_an_error() {
        let mut mock = MockTransport::new(vec![]);
        let err = mock.send(Request::Exit).await.unwrap_err();
        assert!(err.to_string().contains("no more responses"));
    }
}
