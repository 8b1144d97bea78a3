use async_trait::async_trait;

use super::{Interactor, StoredToken};
use crate::error::Result;
use crate::value::Value;

/// Values returned from the engine, with typed views of the first one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReturnData {
    values: Vec<Value>,
}

impl ReturnData {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn first(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.first().and_then(Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.first().and_then(Value::as_bool)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.first().and_then(Value::as_str)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for ReturnData {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Turns an interactor that returns raw values into one that returns
/// [`ReturnData`].
pub struct ReturnDataInteractor<I> {
    inner: I,
}

impl<I> ReturnDataInteractor<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }
}

#[async_trait]
impl<I: Interactor<Vec<Value>>> Interactor<ReturnData> for ReturnDataInteractor<I> {
    async fn exit(&self) -> Result<()> {
        self.inner.exit().await
    }

    async fn eval(&self, command: &str) -> Result<()> {
        self.inner.eval(command).await
    }

    async fn returning_eval(&self, command: &str, return_count: usize) -> Result<ReturnData> {
        self.inner
            .returning_eval(command, return_count)
            .await
            .map(ReturnData::from)
    }

    async fn feval(&self, function_name: &str, args: &[Value]) -> Result<()> {
        self.inner.feval(function_name, args).await
    }

    async fn returning_feval(&self, function_name: &str, args: &[Value]) -> Result<ReturnData> {
        self.inner
            .returning_feval(function_name, args)
            .await
            .map(ReturnData::from)
    }

    async fn returning_feval_with_count(
        &self,
        function_name: &str,
        args: &[Value],
        return_count: usize,
    ) -> Result<ReturnData> {
        self.inner
            .returning_feval_with_count(function_name, args, return_count)
            .await
            .map(ReturnData::from)
    }

    async fn set_variable(&self, name: &str, value: Value) -> Result<()> {
        self.inner.set_variable(name, value).await
    }

    async fn get_variable(&self, name: &str) -> Result<ReturnData> {
        self.inner.get_variable(name).await.map(ReturnData::from)
    }

    async fn store_object(&self, obj: Value, store_permanently: bool) -> Result<StoredToken> {
        self.inner.store_object(obj, store_permanently).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{ProxyConfig, RemoteProxy};
    use crate::transport::loopback::LoopbackEngine;

    fn typed() -> ReturnDataInteractor<RemoteProxy<LoopbackEngine>> {
        ReturnDataInteractor::new(RemoteProxy::new(
            LoopbackEngine::new(),
            ProxyConfig::default(),
        ))
    }

    #[test]
    fn typed_views_use_first_value() {
        let data = ReturnData::new(vec![Value::from("abc"), Value::Double(1.0)]);
        assert_eq!(data.as_str(), Some("abc"));
        assert_eq!(data.as_f64(), None);
        assert_eq!(data.get(1), Some(&Value::Double(1.0)));
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn empty_data_has_no_views() {
        let data = ReturnData::default();
        assert!(data.is_empty());
        assert_eq!(data.as_f64(), None);
        assert_eq!(data.first(), None);
    }

    #[tokio::test]
    async fn wraps_proxy_results() {
        let session = typed();
        let sum = session
            .returning_feval("plus", &[Value::from(2), Value::from(3)])
            .await
            .unwrap();
        assert_eq!(sum.as_f64(), Some(5.0));

        let class = session
            .returning_feval("class", &[Value::from("text")])
            .await
            .unwrap();
        assert_eq!(class.as_str(), Some("char"));
    }

    #[tokio::test]
    async fn composes_with_logging() {
        use crate::interactor::logging::LoggingInteractor;

        let session = LoggingInteractor::new(typed());
        session.eval("flag = true").await.unwrap();
        let flag = session.get_variable("flag").await.unwrap();
        assert_eq!(flag.as_bool(), Some(true));
    }
}
