use std::sync::Arc;

use futures::{future::BoxFuture, stream::BoxStream, stream::FuturesUnordered, FutureExt, StreamExt};
use graphql_parser::query::{
    Definition, Document, FragmentDefinition, Mutation, OperationDefinition, Query, Selection,
    Subscription,
};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{instrument, trace};

use stitch_planner::plan::{
    selection_set_of_items, FieldNode, FieldPlan, StitchPlan, SubschemaPlan,
    STITCHING_TYPENAME_FIELD,
};
use stitch_planner::superschema::{MergedType, SubschemaName, SuperSchema};
use stitch_planner::utils::operation::{name_of, Operation};

use crate::consolidator::Consolidator;
use crate::deep_merge::deep_merge;
use crate::executors::common::{
    SubschemaExecutionRequest, SubschemaResult, SubscriptionSource,
};
use crate::executors::map::SubschemaExecutorMap;
use crate::response::{ExecutionResult, GraphQLError, IncrementalPayload, InitialResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

pub type ResponsePath = Vec<PathSegment>;

/// Invariant violations in subschema responses. These are internal failures,
/// not user errors: a well-planned fetch always carries the typename marker
/// wherever a stitch consults it.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("object at path '{path}' is missing the '{STITCHING_TYPENAME_FIELD}' marker")]
    MissingTypenameMarker { path: String },
    #[error("runtime type '{type_name}' is not an object type of the super-schema")]
    UnknownRuntimeType { type_name: String },
}

pub enum ComposedResponse {
    Complete(ExecutionResult),
    Incremental {
        initial: InitialResult,
        subsequent: Consolidator,
    },
    Subscription(BoxStream<'static, ExecutionResult>),
}

struct Dispatched<'p> {
    subschema: SubschemaName,
    stitch_plans: &'p IndexMap<String, StitchPlan>,
    path: ResponsePath,
}

type DispatchQueue<'p> = FuturesUnordered<BoxFuture<'p, (Dispatched<'p>, SubschemaResult)>>;

/// Single-use driver of one field plan: dispatches every planned fetch,
/// merges arriving partial results into one growing tree, and expands stitch
/// plans into follow-up fetches as concrete types become known.
pub struct Composer<'exec> {
    superschema: Arc<SuperSchema>,
    executors: &'exec SubschemaExecutorMap,
    operation: Operation,
    fragments: Vec<FragmentDefinition<'static, String>>,
    variables: Option<Map<String, Value>>,
    data: Value,
    errors: Vec<GraphQLError>,
    nulled: bool,
}

impl<'exec> Composer<'exec> {
    pub fn new(
        superschema: Arc<SuperSchema>,
        executors: &'exec SubschemaExecutorMap,
        operation: Operation,
        fragments: Vec<FragmentDefinition<'static, String>>,
        variables: Option<Map<String, Value>>,
    ) -> Self {
        Composer {
            superschema,
            executors,
            operation,
            fragments,
            variables,
            data: Value::Object(Map::new()),
            errors: vec![],
            nulled: false,
        }
    }

    /// Dispatches every top-level subschema plan concurrently, then drains
    /// the join: each arriving result merges at its path and may enqueue
    /// follow-ups, until the stitch tree is exhausted.
    #[instrument(level = "debug", skip_all, name = "compose")]
    pub async fn compose(mut self, plan: &FieldPlan) -> Result<ComposedResponse, ComposeError> {
        let mut incremental_sources: Vec<BoxStream<'static, IncrementalPayload>> = vec![];
        {
            let mut jobs: DispatchQueue<'_> = FuturesUnordered::new();
            for subschema_plan in &plan.subschema_plans {
                self.dispatch(subschema_plan, vec![], &mut jobs);
            }
            while let Some((ticket, result)) = jobs.next().await {
                self.handle_result(ticket, result, &mut jobs, &mut incremental_sources)?;
            }
        }

        let data = if self.nulled {
            Value::Null
        } else {
            let mut data = std::mem::take(&mut self.data);
            strip_stitching_markers(&mut data);
            data
        };
        let errors = if self.errors.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.errors))
        };

        if incremental_sources.is_empty() {
            return Ok(ComposedResponse::Complete(ExecutionResult::new(
                Some(data),
                errors,
                None,
            )));
        }

        let mut consolidator =
            Consolidator::with_processor(Box::new(|mut payload: IncrementalPayload| {
                if let Some(entries) = &mut payload.incremental {
                    for entry in entries {
                        if let Some(data) = &mut entry.data {
                            strip_stitching_markers(data);
                        }
                        if let Some(items) = &mut entry.items {
                            for item in items {
                                strip_stitching_markers(item);
                            }
                        }
                    }
                }
                Some(payload)
            }));
        for source in incremental_sources {
            consolidator.add_source(source);
        }
        consolidator.close();

        Ok(ComposedResponse::Incremental {
            initial: InitialResult {
                data: Some(data),
                errors,
                has_next: true,
            },
            subsequent: consolidator,
        })
    }

    /// Routes a subscription to the single planned subschema's subscriber.
    pub async fn subscribe(self, plan: &FieldPlan) -> Result<ComposedResponse, ComposeError> {
        let Some(subschema_plan) = plan.subschema_plans.first() else {
            return Ok(ComposedResponse::Complete(
                ExecutionResult::from_error_message(
                    "Schema is not configured to execute subscription operation.",
                ),
            ));
        };
        let Some(subscriber) = self.executors.subscriber(&subschema_plan.subschema) else {
            return Ok(ComposedResponse::Complete(
                ExecutionResult::from_error_message(
                    "Subschema is not configured to execute subscription operation.",
                ),
            ));
        };

        let request = self.request_for(&subschema_plan.field_nodes);
        match subscriber.subscribe(request).await {
            Ok(SubscriptionSource::Single(result)) => Ok(ComposedResponse::Complete(result)),
            Ok(SubscriptionSource::Stream(events)) => Ok(ComposedResponse::Subscription(events)),
            Err(error) => Ok(ComposedResponse::Complete(ExecutionResult {
                data: None,
                errors: Some(vec![GraphQLError::new(error.to_string())]),
                extensions: None,
            })),
        }
    }

    fn request_for(&self, field_nodes: &[FieldNode]) -> SubschemaExecutionRequest {
        SubschemaExecutionRequest {
            query: self.build_document(field_nodes),
            operation_name: name_of(&self.operation).map(str::to_string),
            variables: self.variables.clone(),
        }
    }

    /// The outgoing single-operation document: the original operation header
    /// verbatim, the plan's field nodes as the selection set, and any
    /// fragment definitions of the original document appended.
    fn build_document(&self, field_nodes: &[FieldNode]) -> String {
        let selection_set =
            selection_set_of_items(field_nodes.iter().cloned().map(Selection::Field).collect());
        let operation = match &self.operation {
            OperationDefinition::SelectionSet(_) => OperationDefinition::SelectionSet(selection_set),
            OperationDefinition::Query(query) => OperationDefinition::Query(Query {
                position: query.position,
                name: query.name.clone(),
                variable_definitions: query.variable_definitions.clone(),
                directives: query.directives.clone(),
                selection_set,
            }),
            OperationDefinition::Mutation(mutation) => OperationDefinition::Mutation(Mutation {
                position: mutation.position,
                name: mutation.name.clone(),
                variable_definitions: mutation.variable_definitions.clone(),
                directives: mutation.directives.clone(),
                selection_set,
            }),
            OperationDefinition::Subscription(subscription) => {
                OperationDefinition::Subscription(Subscription {
                    position: subscription.position,
                    name: subscription.name.clone(),
                    variable_definitions: subscription.variable_definitions.clone(),
                    directives: subscription.directives.clone(),
                    selection_set,
                })
            }
        };

        let mut definitions = vec![Definition::Operation(operation)];
        definitions.extend(
            self.fragments
                .iter()
                .cloned()
                .map(Definition::Fragment),
        );
        Document { definitions }.to_string()
    }

    fn dispatch<'p>(
        &self,
        plan: &'p SubschemaPlan,
        path: ResponsePath,
        jobs: &mut DispatchQueue<'p>,
    ) where
        'exec: 'p,
    {
        trace!(
            "dispatching fetch to subschema '{}' at path '{}'",
            plan.subschema,
            render_path(&path)
        );
        let request = self.request_for(&plan.field_nodes);
        let executors = self.executors;
        let subschema = plan.subschema.clone();
        let ticket = Dispatched {
            subschema: subschema.clone(),
            stitch_plans: &plan.stitch_plans,
            path,
        };
        jobs.push(
            async move {
                let result = executors.execute(&subschema, request).await;
                (ticket, result)
            }
            .boxed(),
        );
    }

    fn handle_result<'p>(
        &mut self,
        ticket: Dispatched<'p>,
        result: SubschemaResult,
        jobs: &mut DispatchQueue<'p>,
        incremental_sources: &mut Vec<BoxStream<'static, IncrementalPayload>>,
    ) -> Result<(), ComposeError>
    where
        'exec: 'p,
    {
        let (data, errors) = match result {
            SubschemaResult::Complete(result) => (result.data, result.errors),
            SubschemaResult::Incremental {
                initial,
                subsequent,
            } => {
                incremental_sources.push(subsequent);
                (initial.data, initial.errors)
            }
        };

        if let Some(errors) = errors {
            self.errors.extend(errors);
        }

        // A slot nulled by an earlier failure swallows everything aimed at it.
        if ticket.path.is_empty() {
            if self.nulled {
                trace!("response already nulled, discarding result");
                return Ok(());
            }
        } else {
            match value_at_path(&self.data, &ticket.path) {
                Some(Value::Null) | None => {
                    trace!(
                        "slot at path '{}' is gone, discarding result from '{}'",
                        render_path(&ticket.path),
                        ticket.subschema
                    );
                    return Ok(());
                }
                Some(_) => {}
            }
        }

        let Some(data) = data else {
            self.null_out(&ticket.path);
            return Ok(());
        };
        if data.is_null() {
            self.null_out(&ticket.path);
            return Ok(());
        }

        if ticket.path.is_empty() {
            deep_merge(&mut self.data, data);
        } else if let Some(target) = value_at_path_mut(&mut self.data, &ticket.path) {
            deep_merge(target, data);
        }

        if !ticket.stitch_plans.is_empty() {
            self.walk_stitch_plans(ticket.stitch_plans, &ticket.path, jobs)?;
        }

        Ok(())
    }

    fn null_out(&mut self, path: &ResponsePath) {
        if path.is_empty() {
            self.nulled = true;
            return;
        }
        let Some((last, parent_path)) = path.split_last() else {
            return;
        };
        let Some(parent) = value_at_path_mut(&mut self.data, parent_path) else {
            return;
        };
        match (parent, last) {
            (Value::Object(map), PathSegment::Key(key)) => {
                map.insert(key.clone(), Value::Null);
            }
            (Value::Array(items), PathSegment::Index(index)) => {
                if let Some(slot) = items.get_mut(*index) {
                    *slot = Value::Null;
                }
            }
            _ => {}
        }
    }

    fn walk_stitch_plans<'p>(
        &self,
        stitch_plans: &'p IndexMap<String, StitchPlan>,
        path: &ResponsePath,
        jobs: &mut DispatchQueue<'p>,
    ) -> Result<(), ComposeError>
    where
        'exec: 'p,
    {
        for (response_key, stitch_plan) in stitch_plans {
            let mut value_path = path.clone();
            value_path.push(PathSegment::Key(response_key.clone()));
            self.expand_stitch(stitch_plan, value_path, jobs)?;
        }
        Ok(())
    }

    /// Descends to the stitched value (elementwise through arrays), resolves
    /// its runtime type from the typename marker, and enqueues the matching
    /// per-type plan's fetches at that path.
    fn expand_stitch<'p>(
        &self,
        stitch_plan: &'p StitchPlan,
        path: ResponsePath,
        jobs: &mut DispatchQueue<'p>,
    ) -> Result<(), ComposeError>
    where
        'exec: 'p,
    {
        let Some(value) = value_at_path(&self.data, &path) else {
            return Ok(());
        };
        match value {
            Value::Array(items) => {
                let len = items.len();
                for index in 0..len {
                    let mut item_path = path.clone();
                    item_path.push(PathSegment::Index(index));
                    self.expand_stitch(stitch_plan, item_path, jobs)?;
                }
                Ok(())
            }
            Value::Object(object) => {
                let type_name = match object.get(STITCHING_TYPENAME_FIELD) {
                    Some(Value::String(type_name)) => type_name.clone(),
                    _ => {
                        return Err(ComposeError::MissingTypenameMarker {
                            path: render_path(&path),
                        })
                    }
                };
                if !self
                    .superschema
                    .get_type(&type_name)
                    .is_some_and(MergedType::is_object)
                {
                    return Err(ComposeError::UnknownRuntimeType { type_name });
                }
                // An absent arm means the supplemental plan for this type was
                // empty; there is nothing to fetch.
                let Some(field_plan) = stitch_plan.get(&type_name) else {
                    return Ok(());
                };
                for subschema_plan in &field_plan.subschema_plans {
                    self.dispatch(subschema_plan, path.clone(), jobs);
                }
                if !field_plan.stitch_plans.is_empty() {
                    self.walk_stitch_plans(&field_plan.stitch_plans, &path, jobs)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn value_at_path<'v>(root: &'v Value, path: &[PathSegment]) -> Option<&'v Value> {
    let mut current = root;
    for segment in path {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(key)) => map.get(key)?,
            (Value::Array(items), PathSegment::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

fn value_at_path_mut<'v>(root: &'v mut Value, path: &[PathSegment]) -> Option<&'v mut Value> {
    let mut current = root;
    for segment in path {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(key)) => map.get_mut(key)?,
            (Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Removes every typename marker from the assembled tree; clients never see
/// the planner's plumbing.
pub fn strip_stitching_markers(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove(STITCHING_TYPENAME_FIELD);
            for entry in map.values_mut() {
                strip_stitching_markers(entry);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_stitching_markers(item);
            }
        }
        _ => {}
    }
}

fn render_path(path: &ResponsePath) -> String {
    path.iter()
        .map(|segment| match segment {
            PathSegment::Key(key) => key.clone(),
            PathSegment::Index(index) => index.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}
