use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use lazy_static::lazy_static;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stitch_planner::planner::Planner;
use stitch_planner::superschema::{SchemaDocument, SubschemaName, SuperSchema};
use stitch_planner::utils::parsing::{parse_operation, parse_schema};

use crate::composer::ComposedResponse;
use crate::execute::{execute, StitchRequest};
use crate::executors::common::{
    BoxError, SubschemaExecutionRequest, SubschemaExecutor, SubschemaResult,
};
use crate::executors::map::SubschemaExecutorMap;
use crate::response::ExecutionResult;

fn init_test_logger_internal() {
    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_bracketed_fields(true)
        .with_deferred_spans(false)
        .with_indent_lines(true)
        .with_targets(false);

    tracing_subscriber::registry()
        .with(tree_layer)
        .with(EnvFilter::from_default_env())
        .init();
}

lazy_static! {
    static ref TRACING_INIT: Once = Once::new();
}

pub fn init_logger() {
    TRACING_INIT.call_once(|| {
        init_test_logger_internal();
    });
}

pub fn planner_for(subschemas: &[(&str, &str)]) -> Planner {
    let subschemas: Vec<(SubschemaName, SchemaDocument)> = subschemas
        .iter()
        .map(|(name, sdl)| (SubschemaName::new(*name), parse_schema(sdl)))
        .collect();
    let superschema = Arc::new(SuperSchema::build(subschemas).expect("failed to build super-schema"));
    Planner::new(superschema)
}

/// A canned subschema executor that logs every received document.
pub struct RecordingExecutor {
    queries: Mutex<Vec<String>>,
    responder: Box<dyn Fn(&SubschemaExecutionRequest) -> SubschemaResult + Send + Sync>,
}

impl RecordingExecutor {
    pub fn new(
        responder: impl Fn(&SubschemaExecutionRequest) -> SubschemaResult + Send + Sync + 'static,
    ) -> Arc<RecordingExecutor> {
        Arc::new(RecordingExecutor {
            queries: Mutex::new(vec![]),
            responder: Box::new(responder),
        })
    }

    pub fn returning(data: Value) -> Arc<RecordingExecutor> {
        Self::new(move |_| data_result(data.clone()))
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().expect("queries lock").len()
    }
}

#[async_trait]
impl SubschemaExecutor for RecordingExecutor {
    async fn execute(
        &self,
        request: SubschemaExecutionRequest,
    ) -> Result<SubschemaResult, BoxError> {
        self.queries
            .lock()
            .expect("queries lock")
            .push(request.query.clone());
        Ok((self.responder)(&request))
    }
}

/// An executor whose future always rejects.
pub struct FailingExecutor(pub &'static str);

#[async_trait]
impl SubschemaExecutor for FailingExecutor {
    async fn execute(
        &self,
        _request: SubschemaExecutionRequest,
    ) -> Result<SubschemaResult, BoxError> {
        Err(self.0.into())
    }
}

pub fn data_result(data: Value) -> SubschemaResult {
    SubschemaResult::Complete(ExecutionResult::new(Some(data), None, None))
}

pub fn executor_map(
    superschema: &SuperSchema,
    executors: &[(&str, Arc<RecordingExecutor>)],
) -> SubschemaExecutorMap {
    let mut map = SubschemaExecutorMap::new().with_introspection(superschema);
    for (name, executor) in executors {
        map.insert(SubschemaName::new(*name), executor.clone());
    }
    map
}

pub fn run(
    planner: &Planner,
    executors: &SubschemaExecutorMap,
    operation: &str,
) -> ExecutionResult {
    run_request(planner, executors, operation, None, None)
}

pub fn run_request(
    planner: &Planner,
    executors: &SubschemaExecutorMap,
    operation: &str,
    operation_name: Option<&str>,
    variables: Option<Value>,
) -> ExecutionResult {
    match run_response(planner, executors, operation, operation_name, variables) {
        ComposedResponse::Complete(result) => result,
        _ => panic!("expected a complete response"),
    }
}

pub fn run_response(
    planner: &Planner,
    executors: &SubschemaExecutorMap,
    operation: &str,
    operation_name: Option<&str>,
    variables: Option<Value>,
) -> ComposedResponse {
    let variable_values = variables.map(|value| match value {
        Value::Object(map) => map,
        other => panic!("variables must be an object, got {}", other),
    });
    tokio_test::block_on(async {
        execute(
            planner,
            executors,
            StitchRequest {
                document: parse_operation(operation),
                operation_name: operation_name.map(String::from),
                variable_values,
            },
        )
        .await
        .expect("composition failed")
    })
}

pub fn first_error_message(result: &ExecutionResult) -> String {
    result
        .errors
        .as_ref()
        .and_then(|errors| errors.first())
        .map(|error| error.message.clone())
        .unwrap_or_default()
}
