use std::collections::HashMap;

use graphql_parser::query::{
    Definition, FragmentDefinition, InlineFragment, Mutation, OperationDefinition, Query,
    Selection, SelectionSet, Subscription, TypeCondition,
};

use crate::normalize::NormalizeError;
use crate::utils::operation::QueryDocument;

pub fn inline_fragment_spreads(document: &mut QueryDocument) -> Result<(), NormalizeError> {
    let mut fragment_map: HashMap<String, FragmentDefinition<'static, String>> = HashMap::new();
    for definition in &document.definitions {
        if let Definition::Fragment(fragment_def) = definition {
            fragment_map.insert(fragment_def.name.clone(), fragment_def.clone());
        }
    }

    for definition in &mut document.definitions {
        match definition {
            Definition::Operation(op_def) => match op_def {
                OperationDefinition::SelectionSet(selection_set) => {
                    handle_selection_set(selection_set, &fragment_map, None)?;
                }
                OperationDefinition::Query(Query { selection_set, .. }) => {
                    handle_selection_set(selection_set, &fragment_map, None)?;
                }
                OperationDefinition::Mutation(Mutation { selection_set, .. }) => {
                    handle_selection_set(selection_set, &fragment_map, None)?;
                }
                OperationDefinition::Subscription(Subscription { selection_set, .. }) => {
                    handle_selection_set(selection_set, &fragment_map, None)?;
                }
            },
            Definition::Fragment(fragment_def) => {
                handle_selection_set(
                    &mut fragment_def.selection_set,
                    &fragment_map,
                    Some(&fragment_def.type_condition.clone()),
                )?;
            }
        }
    }

    // Every spread is inlined, so the definitions carry no information the
    // outgoing documents still need.
    document
        .definitions
        .retain(|def| !matches!(def, Definition::Fragment(_)));

    Ok(())
}

fn handle_selection_set(
    selection_set: &mut SelectionSet<'static, String>,
    fragment_map: &HashMap<String, FragmentDefinition<'static, String>>,
    parent_type_condition: Option<&TypeCondition<'static, String>>,
) -> Result<(), NormalizeError> {
    let old_items = std::mem::take(&mut selection_set.items);
    let mut new_items = Vec::with_capacity(old_items.len());

    for selection in old_items {
        match selection {
            Selection::Field(mut field) => {
                handle_selection_set(&mut field.selection_set, fragment_map, None)?;
                new_items.push(Selection::Field(field));
            }
            Selection::FragmentSpread(spread) => {
                let fragment_def = fragment_map.get(&spread.fragment_name).ok_or_else(|| {
                    NormalizeError::UnknownFragment(spread.fragment_name.clone())
                })?;

                if parent_type_condition == Some(&fragment_def.type_condition) {
                    // The spread's condition is already established by the
                    // enclosing fragment; its selections inline directly.
                    let mut inner = fragment_def.selection_set.clone();
                    handle_selection_set(&mut inner, fragment_map, parent_type_condition)?;
                    new_items.extend(inner.items);
                } else {
                    let mut inline_fragment = InlineFragment {
                        position: spread.position,
                        type_condition: Some(fragment_def.type_condition.clone()),
                        directives: spread.directives.clone(),
                        selection_set: fragment_def.selection_set.clone(),
                    };

                    handle_selection_set(
                        &mut inline_fragment.selection_set,
                        fragment_map,
                        inline_fragment.type_condition.as_ref(),
                    )?;

                    new_items.push(Selection::InlineFragment(inline_fragment));
                }
            }
            Selection::InlineFragment(mut inline_fragment) => {
                handle_selection_set(
                    &mut inline_fragment.selection_set,
                    fragment_map,
                    inline_fragment.type_condition.clone().as_ref(),
                )?;
                new_items.push(Selection::InlineFragment(inline_fragment));
            }
        }
    }
    selection_set.items = new_items;

    Ok(())
}
