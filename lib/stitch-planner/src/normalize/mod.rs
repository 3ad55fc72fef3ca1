use std::collections::HashMap;

use serde_json::Value;

use crate::utils::operation::QueryDocument;

pub mod pipeline;

use pipeline::drop_skipped_fields::drop_skipped_fields;
use pipeline::inline_fragment_spreads::inline_fragment_spreads;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Unknown fragment \"{0}\".")]
    UnknownFragment(String),
}

/// Rewrites the document in place so the planner never sees conditional
/// selections or fragment spreads: `@skip` / `@include` are applied against
/// the coerced variables, then every spread is replaced with an inline
/// fragment carrying its type condition.
pub fn prepare_document(
    document: &mut QueryDocument,
    variables: &HashMap<String, Value>,
) -> Result<(), NormalizeError> {
    drop_skipped_fields(document, variables)?;
    inline_fragment_spreads(document)?;
    Ok(())
}
