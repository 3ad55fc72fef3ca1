use std::sync::Arc;

use graphql_parser::query::{Field, Selection, SelectionSet};
use graphql_parser::Pos;
use indexmap::IndexMap;

use crate::superschema::{SubschemaName, TYPENAME_FIELD};

pub mod display;
pub mod hash;

pub type FieldNode = Field<'static, String>;

/// Alias under which the planner requests `__typename` wherever the composer
/// will need the concrete type of an object at runtime.
pub const STITCHING_TYPENAME_FIELD: &str = "__stitching__typename";

/// How a set of field nodes at one parent type resolves: which subschemas to
/// fetch from, and which follow-ups those fetches imply once concrete types
/// are known.
#[derive(Debug, Clone, Default)]
pub struct FieldPlan {
    pub subschema_plans: Vec<SubschemaPlan>,
    /// Follow-ups keyed by response key, applying to data the originating
    /// subschema has already fetched.
    pub stitch_plans: IndexMap<String, StitchPlan>,
}

/// One fetch to one subschema as part of a [`FieldPlan`].
#[derive(Debug, Clone)]
pub struct SubschemaPlan {
    pub subschema: SubschemaName,
    /// The subschema whose result contained the parent object, when this plan
    /// is a follow-up rather than a root fetch.
    pub from_subschema: Option<SubschemaName>,
    pub field_nodes: Vec<FieldNode>,
    /// Follow-ups keyed by response key, applying to data returned by this
    /// fetch.
    pub stitch_plans: IndexMap<String, StitchPlan>,
}

impl SubschemaPlan {
    pub fn new(subschema: SubschemaName, from_subschema: Option<SubschemaName>) -> Self {
        SubschemaPlan {
            subschema,
            from_subschema,
            field_nodes: vec![],
            stitch_plans: IndexMap::new(),
        }
    }
}

/// Dispatch table from concrete object type to the supplemental plan that
/// resolves the selections the fetching subschema could not serve. Consulted
/// once the runtime type of a value is known.
#[derive(Debug, Clone, Default)]
pub struct StitchPlan {
    pub plans_by_type: IndexMap<String, Arc<FieldPlan>>,
}

impl StitchPlan {
    pub fn is_empty(&self) -> bool {
        self.plans_by_type.is_empty()
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<FieldPlan>> {
        self.plans_by_type.get(type_name)
    }

    pub fn insert(&mut self, type_name: String, plan: Arc<FieldPlan>) {
        self.plans_by_type.insert(type_name, plan);
    }
}

impl FieldPlan {
    pub fn is_empty(&self) -> bool {
        self.subschema_plans.is_empty() && self.stitch_plans.is_empty()
    }
}

/// The name under which a field appears in the response: its alias when one
/// is present, its name otherwise.
pub fn response_key(field: &FieldNode) -> &str {
    field.alias.as_deref().unwrap_or(&field.name)
}

pub fn empty_selection_set() -> SelectionSet<'static, String> {
    SelectionSet {
        span: (Pos::default(), Pos::default()),
        items: vec![],
    }
}

pub fn selection_set_of_items(items: Vec<Selection<'static, String>>) -> SelectionSet<'static, String> {
    SelectionSet {
        span: (Pos::default(), Pos::default()),
        items,
    }
}

/// The `__typename` field aliased as the stitching marker.
pub fn stitching_typename_field() -> FieldNode {
    Field {
        position: Pos::default(),
        alias: Some(STITCHING_TYPENAME_FIELD.to_string()),
        name: TYPENAME_FIELD.to_string(),
        arguments: vec![],
        directives: vec![],
        selection_set: empty_selection_set(),
    }
}
