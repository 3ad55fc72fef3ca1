pub mod composer;
pub mod consolidator;
pub mod deep_merge;
pub mod execute;
pub mod executors;
pub mod introspection;
pub mod response;

pub use composer::{ComposeError, ComposedResponse, Composer};
pub use execute::{execute, StitchRequest};
pub use response::{ExecutionResult, GraphQLError, IncrementalPayload, InitialResult};

#[cfg(test)]
mod tests;
