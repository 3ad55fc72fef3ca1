use graphql_parser::query::{
    Definition, Document, OperationDefinition, SelectionSet, VariableDefinition,
};

use crate::superschema::OperationKind;

pub type QueryDocument = Document<'static, String>;
pub type Operation = OperationDefinition<'static, String>;

#[derive(Debug, thiserror::Error)]
pub enum OperationResolveError {
    #[error("Must provide an operation.")]
    MissingOperation,
    #[error("Unknown operation named \"{0}\".")]
    UnknownOperation(String),
    #[error("Must provide operation name if query contains multiple operations.")]
    AmbiguousOperation,
}

/// Picks the operation to execute out of a document, with the usual rules for
/// anonymous documents and `operationName` disambiguation.
pub fn executable_operation<'d>(
    document: &'d QueryDocument,
    operation_name: Option<&str>,
) -> Result<&'d Operation, OperationResolveError> {
    let mut operations = document.definitions.iter().filter_map(|def| match def {
        Definition::Operation(op) => Some(op),
        Definition::Fragment(_) => None,
    });

    match operation_name {
        Some(name) => operations
            .find(|op| name_of(op).is_some_and(|n| n == name))
            .ok_or_else(|| OperationResolveError::UnknownOperation(name.to_string())),
        None => {
            let first = operations.next().ok_or(OperationResolveError::MissingOperation)?;
            if operations.next().is_some() {
                return Err(OperationResolveError::AmbiguousOperation);
            }
            Ok(first)
        }
    }
}

pub fn kind_of(operation: &Operation) -> OperationKind {
    match operation {
        OperationDefinition::SelectionSet(_) | OperationDefinition::Query(_) => {
            OperationKind::Query
        }
        OperationDefinition::Mutation(_) => OperationKind::Mutation,
        OperationDefinition::Subscription(_) => OperationKind::Subscription,
    }
}

pub fn name_of<'o>(operation: &'o Operation) -> Option<&'o str> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(query) => query.name.as_deref(),
        OperationDefinition::Mutation(mutation) => mutation.name.as_deref(),
        OperationDefinition::Subscription(subscription) => subscription.name.as_deref(),
    }
}

pub fn selection_set_of<'o>(operation: &'o Operation) -> &'o SelectionSet<'static, String> {
    match operation {
        OperationDefinition::SelectionSet(selection_set) => selection_set,
        OperationDefinition::Query(query) => &query.selection_set,
        OperationDefinition::Mutation(mutation) => &mutation.selection_set,
        OperationDefinition::Subscription(subscription) => &subscription.selection_set,
    }
}

pub fn variable_definitions_of<'o>(
    operation: &'o Operation,
) -> &'o [VariableDefinition<'static, String>] {
    match operation {
        OperationDefinition::SelectionSet(_) => &[],
        OperationDefinition::Query(query) => &query.variable_definitions,
        OperationDefinition::Mutation(mutation) => &mutation.variable_definitions,
        OperationDefinition::Subscription(subscription) => &subscription.variable_definitions,
    }
}
