use graphql_parser::query::Definition;
use serde_json::{Map, Value};
use tracing::instrument;

use stitch_planner::normalize::prepare_document;
use stitch_planner::planner::Planner;
use stitch_planner::superschema::variables::{coerce_variable_values, VariableCoercionOptions};
use stitch_planner::superschema::OperationKind;
use stitch_planner::utils::operation::{
    executable_operation, kind_of, variable_definitions_of, QueryDocument,
};

use crate::composer::{ComposeError, ComposedResponse, Composer};
use crate::executors::map::SubschemaExecutorMap;
use crate::response::{ExecutionResult, GraphQLError};

pub struct StitchRequest {
    pub document: QueryDocument,
    pub operation_name: Option<String>,
    pub variable_values: Option<Map<String, Value>>,
}

fn error_response(message: impl Into<String>) -> ComposedResponse {
    ComposedResponse::Complete(ExecutionResult::from_error_message(message))
}

/// Builds the execution context for one request, plans it, and drives a
/// single-use composer. Anything wrong with the request itself comes back as
/// an error response; an `Err` is reserved for internal invariant violations.
#[instrument(level = "debug", skip_all, name = "execute")]
pub async fn execute(
    planner: &Planner,
    executors: &SubschemaExecutorMap,
    request: StitchRequest,
) -> Result<ComposedResponse, ComposeError> {
    let StitchRequest {
        document,
        operation_name,
        variable_values,
    } = request;

    let operation = match executable_operation(&document, operation_name.as_deref()) {
        Ok(operation) => operation,
        Err(error) => return Ok(error_response(error.to_string())),
    };

    let empty_inputs = Map::new();
    let inputs = variable_values.as_ref().unwrap_or(&empty_inputs);
    let coerced = match coerce_variable_values(
        planner.superschema(),
        variable_definitions_of(operation),
        inputs,
        &VariableCoercionOptions::default(),
    ) {
        Ok(coerced) => coerced,
        Err(messages) => {
            return Ok(ComposedResponse::Complete(ExecutionResult {
                data: None,
                errors: Some(messages.into_iter().map(GraphQLError::new).collect()),
                extensions: None,
            }))
        }
    };

    let mut prepared = document.clone();
    if let Err(error) = prepare_document(&mut prepared, &coerced) {
        return Ok(error_response(error.to_string()));
    }

    let operation = match executable_operation(&prepared, operation_name.as_deref()) {
        Ok(operation) => operation,
        Err(error) => return Ok(error_response(error.to_string())),
    };

    let plan = match planner.plan_operation(operation) {
        Ok(plan) => plan,
        Err(error) => return Ok(error_response(error.to_string())),
    };

    let fragments = prepared
        .definitions
        .iter()
        .filter_map(|def| match def {
            Definition::Fragment(fragment) => Some(fragment.clone()),
            _ => None,
        })
        .collect();

    let composer = Composer::new(
        planner.superschema().clone(),
        executors,
        operation.clone(),
        fragments,
        variable_values,
    );

    if kind_of(operation) == OperationKind::Subscription {
        composer.subscribe(&plan).await
    } else {
        composer.compose(&plan).await
    }
}
