use std::collections::HashMap;
use std::sync::Arc;

use stitch_planner::superschema::{SubschemaName, SuperSchema};
use tracing::{instrument, warn};

use crate::executors::common::{
    SubschemaExecutionRequest, SubschemaExecutor, SubschemaResult, SubschemaSubscriber,
};
use crate::introspection::IntrospectionSubschema;
use crate::response::{ExecutionResult, GraphQLError};

/// Name-keyed registry of subschema executors and subscribers; the executing
/// half of the subschema handles the super-schema plans against.
#[derive(Default)]
pub struct SubschemaExecutorMap {
    executors: HashMap<SubschemaName, Arc<dyn SubschemaExecutor>>,
    subscribers: HashMap<SubschemaName, Arc<dyn SubschemaSubscriber>>,
}

impl SubschemaExecutorMap {
    pub fn new() -> Self {
        SubschemaExecutorMap::default()
    }

    pub fn insert(&mut self, name: SubschemaName, executor: Arc<dyn SubschemaExecutor>) {
        self.executors.insert(name, executor);
    }

    pub fn insert_subscriber(
        &mut self,
        name: SubschemaName,
        subscriber: Arc<dyn SubschemaSubscriber>,
    ) {
        self.subscribers.insert(name, subscriber);
    }

    /// Registers the internal subschema answering `__schema` / `__type`
    /// against the merged schema itself.
    pub fn with_introspection(mut self, superschema: &SuperSchema) -> Self {
        self.insert(
            SubschemaName::introspection(),
            IntrospectionSubschema::new(superschema).to_arc(),
        );
        self
    }

    pub fn subscriber(&self, name: &SubschemaName) -> Option<&Arc<dyn SubschemaSubscriber>> {
        self.subscribers.get(name)
    }

    #[instrument(level = "trace", name = "subschema_execute", skip_all, fields(subschema = %name))]
    pub async fn execute(
        &self,
        name: &SubschemaName,
        request: SubschemaExecutionRequest,
    ) -> SubschemaResult {
        let Some(executor) = self.executors.get(name) else {
            warn!("no executor registered for subschema '{}'", name);
            return SubschemaResult::Complete(ExecutionResult::from_error_message(format!(
                "No executor registered for subschema '{}'.",
                name
            )));
        };
        match executor.execute(request).await {
            Ok(result) => result,
            // A failed executor future collapses into a single error with
            // null data, so the normal null-propagation path applies.
            Err(error) => SubschemaResult::Complete(ExecutionResult {
                data: None,
                errors: Some(vec![GraphQLError::new(error.to_string())]),
                extensions: None,
            }),
        }
    }
}
