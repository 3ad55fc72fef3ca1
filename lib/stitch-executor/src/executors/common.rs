use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

use crate::response::{ExecutionResult, IncrementalPayload, InitialResult};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One outgoing request to a subschema: a rendered single-operation document
/// plus the raw variables forwarded untouched.
#[derive(Debug, Clone)]
pub struct SubschemaExecutionRequest {
    pub query: String,
    pub operation_name: Option<String>,
    pub variables: Option<Map<String, Value>>,
}

/// What a subschema executor hands back: either a complete result, or an
/// initial payload plus a lazy sequence of deltas.
pub enum SubschemaResult {
    Complete(ExecutionResult),
    Incremental {
        initial: InitialResult,
        subsequent: BoxStream<'static, IncrementalPayload>,
    },
}

impl From<ExecutionResult> for SubschemaResult {
    fn from(result: ExecutionResult) -> Self {
        SubschemaResult::Complete(result)
    }
}

#[async_trait]
pub trait SubschemaExecutor: Send + Sync {
    async fn execute(
        &self,
        request: SubschemaExecutionRequest,
    ) -> Result<SubschemaResult, BoxError>;

    fn to_arc<'a>(self) -> Arc<dyn SubschemaExecutor + 'a>
    where
        Self: Sized + 'a,
    {
        Arc::new(self)
    }
}

/// A subscription executor yields either a single result or a lazy event
/// sequence.
pub enum SubscriptionSource {
    Single(ExecutionResult),
    Stream(BoxStream<'static, ExecutionResult>),
}

#[async_trait]
pub trait SubschemaSubscriber: Send + Sync {
    async fn subscribe(
        &self,
        request: SubschemaExecutionRequest,
    ) -> Result<SubscriptionSource, BoxError>;

    fn to_arc<'a>(self) -> Arc<dyn SubschemaSubscriber + 'a>
    where
        Self: Sized + 'a,
    {
        Arc::new(self)
    }
}

/// Wraps a plain closure as an executor; the embedding entry point for
/// in-process subschemas and the workhorse of the test suite.
pub struct FnSubschemaExecutor<F>(pub F);

#[async_trait]
impl<F> SubschemaExecutor for FnSubschemaExecutor<F>
where
    F: Fn(SubschemaExecutionRequest) -> SubschemaResult + Send + Sync,
{
    async fn execute(
        &self,
        request: SubschemaExecutionRequest,
    ) -> Result<SubschemaResult, BoxError> {
        Ok((self.0)(request))
    }
}
