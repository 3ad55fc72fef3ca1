use std::collections::HashMap;
use std::sync::{Arc, Once};

use lazy_static::lazy_static;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::normalize::prepare_document;
use crate::plan::display::render_field_nodes;
use crate::plan::FieldPlan;
use crate::planner::Planner;
use crate::superschema::{SubschemaName, SuperSchema};
use crate::utils::operation::executable_operation;
use crate::utils::parsing::{parse_operation, parse_schema};

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

pub fn super_schema(subschemas: &[(&str, &str)]) -> Arc<SuperSchema> {
    let subschemas = subschemas
        .iter()
        .map(|(name, sdl)| (SubschemaName::new(*name), parse_schema(sdl)))
        .collect();
    Arc::new(SuperSchema::build(subschemas).expect("failed to build super-schema"))
}

pub fn planner_for(subschemas: &[(&str, &str)]) -> Planner {
    Planner::new(super_schema(subschemas))
}

pub fn plan(planner: &Planner, operation: &str) -> Arc<FieldPlan> {
    plan_with_variables(planner, operation, &HashMap::new())
}

pub fn plan_with_variables(
    planner: &Planner,
    operation: &str,
    variables: &HashMap<String, Value>,
) -> Arc<FieldPlan> {
    let mut document = parse_operation(operation);
    prepare_document(&mut document, variables).expect("failed to prepare document");
    let operation = executable_operation(&document, None).expect("no executable operation");
    planner
        .plan_operation(operation)
        .expect("failed to plan operation")
}

/// Normalizes a selection-set literal through the same AST formatting the
/// plans render with, so expectations are whitespace-stable.
pub fn rendered_selection(selection_set: &str) -> String {
    let document = parse_operation(selection_set);
    let fields = match document.definitions.into_iter().next() {
        Some(graphql_parser::query::Definition::Operation(
            graphql_parser::query::OperationDefinition::SelectionSet(selection_set),
        )) => selection_set
            .items
            .into_iter()
            .filter_map(|item| match item {
                graphql_parser::query::Selection::Field(field) => Some(field),
                _ => None,
            })
            .collect::<Vec<_>>(),
        other => panic!("expected a bare selection set, got {:?}", other),
    };
    render_field_nodes(&fields)
}
