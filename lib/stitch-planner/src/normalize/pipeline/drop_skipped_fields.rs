use std::collections::HashMap;

use graphql_parser::query::{
    Definition, Directive, FragmentDefinition, Mutation, OperationDefinition, Query, Selection,
    SelectionSet, Subscription, Value,
};
use serde_json::Value as JsonValue;

use crate::normalize::NormalizeError;
use crate::utils::operation::QueryDocument;

pub fn drop_skipped_fields(
    document: &mut QueryDocument,
    variables: &HashMap<String, JsonValue>,
) -> Result<(), NormalizeError> {
    for def in &mut document.definitions {
        match def {
            Definition::Operation(op) => match op {
                OperationDefinition::Query(Query { selection_set, .. }) => {
                    handle_selection_set(selection_set, variables)?;
                }
                OperationDefinition::Mutation(Mutation { selection_set, .. }) => {
                    handle_selection_set(selection_set, variables)?;
                }
                OperationDefinition::Subscription(Subscription { selection_set, .. }) => {
                    handle_selection_set(selection_set, variables)?;
                }
                OperationDefinition::SelectionSet(selection_set) => {
                    handle_selection_set(selection_set, variables)?;
                }
            },
            Definition::Fragment(FragmentDefinition { selection_set, .. }) => {
                handle_selection_set(selection_set, variables)?;
            }
        }
    }

    Ok(())
}

fn handle_selection_set(
    selection_set: &mut SelectionSet<'static, String>,
    variables: &HashMap<String, JsonValue>,
) -> Result<(), NormalizeError> {
    if selection_set.items.is_empty() {
        return Ok(());
    }

    let original_items = std::mem::take(&mut selection_set.items);
    let mut new_items = Vec::with_capacity(original_items.len());

    for mut candidate in original_items {
        let mut should_add = true;

        match candidate {
            Selection::Field(ref mut field) => {
                should_add = should_keep(&field.directives, variables);
                if should_add {
                    field.directives.retain(|d| !is_condition_directive(d));
                    handle_selection_set(&mut field.selection_set, variables)?;
                }
            }
            Selection::InlineFragment(ref mut inline_fragment) => {
                should_add = should_keep(&inline_fragment.directives, variables);
                if should_add {
                    inline_fragment
                        .directives
                        .retain(|d| !is_condition_directive(d));
                    handle_selection_set(&mut inline_fragment.selection_set, variables)?;
                }
            }
            Selection::FragmentSpread(ref mut spread) => {
                should_add = should_keep(&spread.directives, variables);
                if should_add {
                    spread.directives.retain(|d| !is_condition_directive(d));
                }
            }
        }

        if should_add {
            new_items.push(candidate);
        }
    }

    selection_set.items = new_items;

    Ok(())
}

fn is_condition_directive(directive: &Directive<'static, String>) -> bool {
    directive.name == "skip" || directive.name == "include"
}

fn should_keep(
    directives: &[Directive<'static, String>],
    variables: &HashMap<String, JsonValue>,
) -> bool {
    if extract_condition_directive("skip", directives, variables).is_some_and(|skip| skip) {
        return false;
    }

    if extract_condition_directive("include", directives, variables).is_some_and(|include| !include)
    {
        return false;
    }

    true
}

fn extract_condition_directive(
    directive_name: &str,
    directives: &[Directive<'static, String>],
    variables: &HashMap<String, JsonValue>,
) -> Option<bool> {
    directives.iter().find_map(|d| {
        if d.name != directive_name {
            return None;
        }
        d.arguments.iter().find_map(|(name, value)| {
            if name != "if" {
                return None;
            }
            match value {
                Value::Boolean(b) => Some(*b),
                Value::Variable(variable_name) => match variables.get(variable_name) {
                    Some(JsonValue::Bool(b)) => Some(*b),
                    _ => None,
                },
                _ => None,
            }
        })
    })
}
