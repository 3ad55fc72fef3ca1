use std::sync::Arc;

use dashmap::DashMap;
use graphql_parser::query::{Selection, TypeCondition};
use indexmap::IndexSet;
use tracing::instrument;

use crate::plan::hash::{field_plan_key, subfields_key};
use crate::plan::{
    response_key, selection_set_of_items, stitching_typename_field, FieldNode, FieldPlan,
    StitchPlan, SubschemaPlan,
};
use crate::superschema::{OperationKind, SubschemaName, SuperSchema};
use crate::utils::operation::{kind_of, selection_set_of, Operation};

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Schema is not configured to execute {0} operation.")]
    UnsupportedOperation(OperationKind),
    #[error("Fragment spread \"{0}\" must be inlined before planning.")]
    UnexpectedFragmentSpread(String),
}

/// Compiles operations against a super-schema into field plans. Plans are
/// memoised on the identity of their inputs, so a shared planner converges to
/// cache hits for repeated operations.
pub struct Planner {
    superschema: Arc<SuperSchema>,
    root_plan_cache: DashMap<u64, Arc<FieldPlan>>,
    supplemental_plan_cache: DashMap<u64, Arc<FieldPlan>>,
    subfields_cache: DashMap<u64, Arc<Vec<FieldNode>>>,
}

impl Planner {
    pub fn new(superschema: Arc<SuperSchema>) -> Self {
        Planner {
            superschema,
            root_plan_cache: DashMap::new(),
            supplemental_plan_cache: DashMap::new(),
            subfields_cache: DashMap::new(),
        }
    }

    pub fn superschema(&self) -> &Arc<SuperSchema> {
        &self.superschema
    }

    /// The operation must be prepared: conditional selections pruned and
    /// fragment spreads inlined. A remaining spread is an error.
    #[instrument(level = "trace", skip_all, name = "plan_operation")]
    pub fn plan_operation(&self, operation: &Operation) -> Result<Arc<FieldPlan>, PlannerError> {
        let kind = kind_of(operation);
        let root_type = self
            .superschema
            .root_type(kind)
            .ok_or(PlannerError::UnsupportedOperation(kind))?
            .to_string();
        let fields = self.collect_fields(&root_type, &selection_set_of(operation).items)?;
        self.create_field_plan(&root_type, &fields)
    }

    /// Flattens inline fragments whose type condition is satisfied by the
    /// parent type into an ordered field-node sequence.
    fn collect_fields(
        &self,
        parent_type: &str,
        selections: &[Selection<'static, String>],
    ) -> Result<Arc<Vec<FieldNode>>, PlannerError> {
        let key = subfields_key(parent_type, selections);
        if let Some(hit) = self.subfields_cache.get(&key) {
            return Ok(hit.clone());
        }
        let mut fields = vec![];
        self.collect_fields_into(parent_type, selections, &mut fields)?;
        let fields = Arc::new(fields);
        self.subfields_cache.insert(key, fields.clone());
        Ok(fields)
    }

    fn collect_fields_into(
        &self,
        parent_type: &str,
        selections: &[Selection<'static, String>],
        fields: &mut Vec<FieldNode>,
    ) -> Result<(), PlannerError> {
        for selection in selections {
            match selection {
                Selection::Field(field) => fields.push(field.clone()),
                Selection::InlineFragment(fragment) => {
                    let satisfied = match &fragment.type_condition {
                        None => true,
                        Some(TypeCondition::On(condition)) => self
                            .superschema
                            .type_condition_satisfied(parent_type, condition),
                    };
                    if satisfied {
                        self.collect_fields_into(
                            parent_type,
                            &fragment.selection_set.items,
                            fields,
                        )?;
                    }
                }
                Selection::FragmentSpread(spread) => {
                    return Err(PlannerError::UnexpectedFragmentSpread(
                        spread.fragment_name.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn create_field_plan(
        &self,
        parent_type: &str,
        fields: &[FieldNode],
    ) -> Result<Arc<FieldPlan>, PlannerError> {
        let key = field_plan_key(parent_type, None, fields);
        if let Some(hit) = self.root_plan_cache.get(&key) {
            return Ok(hit.clone());
        }
        let mut plan = FieldPlan::default();
        for field in fields {
            self.add_field_to_field_plan(&mut plan, None, parent_type, field)?;
        }
        let plan = Arc::new(plan);
        self.root_plan_cache.insert(key, plan.clone());
        Ok(plan)
    }

    /// A plan resolving selections the subschema that fetched the parent
    /// object could not serve; dispatched once the parent's runtime type is
    /// known.
    fn create_supplemental_field_plan(
        &self,
        parent_type: &str,
        fields: &[FieldNode],
        from_subschema: &SubschemaName,
    ) -> Result<Arc<FieldPlan>, PlannerError> {
        let key = field_plan_key(parent_type, Some(from_subschema), fields);
        if let Some(hit) = self.supplemental_plan_cache.get(&key) {
            return Ok(hit.clone());
        }
        let mut plan = FieldPlan::default();
        for field in fields {
            self.add_field_to_field_plan(&mut plan, Some(from_subschema), parent_type, field)?;
        }
        let plan = Arc::new(plan);
        self.supplemental_plan_cache.insert(key, plan.clone());
        Ok(plan)
    }

    fn add_field_to_field_plan(
        &self,
        plan: &mut FieldPlan,
        from_subschema: Option<&SubschemaName>,
        parent_type: &str,
        field: &FieldNode,
    ) -> Result<(), PlannerError> {
        let Some(candidates) = self.superschema.field_subschemas(parent_type, &field.name) else {
            // No subschema resolves the field; it cannot appear in the plan.
            return Ok(());
        };

        if field.selection_set.items.is_empty() {
            let Some(subschema) = choose_subschema(plan, from_subschema, candidates) else {
                return Ok(());
            };
            subschema_plan_entry(plan, &subschema, from_subschema)
                .field_nodes
                .push(field.clone());
            return Ok(());
        }

        let Some(named_type) = self.superschema.field_type_name(parent_type, &field.name) else {
            return Ok(());
        };
        let named_type = named_type.to_string();
        let Some(subschema) = choose_subschema(plan, from_subschema, candidates) else {
            return Ok(());
        };

        let (own_selections, other_selections) = self.split_selection_set(
            &subschema,
            from_subschema,
            &named_type,
            &field.selection_set.items,
        )?;
        let stitch_plan = self.create_stitch_plan(&named_type, &other_selections, &subschema)?;

        let key = response_key(field).to_string();
        let stitched_in_place = from_subschema == Some(&subschema);

        if !own_selections.is_empty() {
            let mut split_field = field.clone();
            split_field.selection_set = selection_set_of_items(own_selections);
            subschema_plan_entry(plan, &subschema, from_subschema)
                .field_nodes
                .push(split_field);
            if !stitch_plan.is_empty() {
                if stitched_in_place {
                    plan.stitch_plans.insert(key, stitch_plan);
                } else {
                    subschema_plan_entry(plan, &subschema, from_subschema)
                        .stitch_plans
                        .insert(key, stitch_plan);
                }
            }
        } else if !stitch_plan.is_empty() {
            if stitched_in_place {
                // The parent object is already in the originator's result;
                // the stitch applies to data as it arrives.
                plan.stitch_plans.insert(key, stitch_plan);
            } else {
                // Nothing of the subtree is resolvable by the chosen
                // subschema, but the runtime type of the parent value still
                // has to come from somewhere.
                let mut marker_field = field.clone();
                marker_field.selection_set = selection_set_of_items(vec![Selection::Field(
                    stitching_typename_field(),
                )]);
                let entry = subschema_plan_entry(plan, &subschema, from_subschema);
                entry.field_nodes.push(marker_field);
                entry.stitch_plans.insert(key, stitch_plan);
            }
        }

        Ok(())
    }

    /// Classifies a selection set against the chosen subschema: selections it
    /// can resolve stay in the own half, everything else moves to the other
    /// half for follow-up planning. Both halves preserve the nesting they
    /// were found in.
    fn split_selection_set(
        &self,
        subschema: &SubschemaName,
        from_subschema: Option<&SubschemaName>,
        parent_type: &str,
        selections: &[Selection<'static, String>],
    ) -> Result<
        (
            Vec<Selection<'static, String>>,
            Vec<Selection<'static, String>>,
        ),
        PlannerError,
    > {
        let mut own_selections = vec![];
        let mut other_selections = vec![];

        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    // A parent type with no resolver entries at all (the
                    // introspection meta-types) cannot be split; its fields
                    // stay with the chosen subschema.
                    let resolvable = match self.superschema.subschema_sets(parent_type) {
                        Some(field_sets) => field_sets
                            .get(&field.name)
                            .is_some_and(|set| set.contains(subschema)),
                        None => true,
                    };

                    if field.selection_set.items.is_empty() {
                        if resolvable {
                            own_selections.push(selection.clone());
                        } else {
                            other_selections.push(selection.clone());
                        }
                        continue;
                    }

                    if !resolvable {
                        other_selections.push(selection.clone());
                        continue;
                    }

                    let Some(named_type) =
                        self.superschema.field_type_name(parent_type, &field.name)
                    else {
                        own_selections.push(selection.clone());
                        continue;
                    };
                    let named_type = named_type.to_string();
                    let (sub_own, sub_other) = self.split_selection_set(
                        subschema,
                        from_subschema,
                        &named_type,
                        &field.selection_set.items,
                    )?;
                    if !sub_own.is_empty() {
                        let mut own_field = field.clone();
                        own_field.selection_set = selection_set_of_items(sub_own);
                        own_selections.push(Selection::Field(own_field));
                    }
                    if !sub_other.is_empty() {
                        let mut other_field = field.clone();
                        other_field.selection_set = selection_set_of_items(sub_other);
                        other_selections.push(Selection::Field(other_field));
                    }
                }
                Selection::InlineFragment(fragment) => {
                    let refined_type = match &fragment.type_condition {
                        Some(TypeCondition::On(condition)) => condition.as_str(),
                        None => parent_type,
                    };
                    let (sub_own, sub_other) = self.split_selection_set(
                        subschema,
                        from_subschema,
                        refined_type,
                        &fragment.selection_set.items,
                    )?;
                    if !sub_own.is_empty() {
                        let mut own_fragment = fragment.clone();
                        own_fragment.selection_set = selection_set_of_items(sub_own);
                        own_selections.push(Selection::InlineFragment(own_fragment));
                    }
                    if !sub_other.is_empty() {
                        let mut other_fragment = fragment.clone();
                        other_fragment.selection_set = selection_set_of_items(sub_other);
                        other_selections.push(Selection::InlineFragment(other_fragment));
                    }
                }
                Selection::FragmentSpread(spread) => {
                    return Err(PlannerError::UnexpectedFragmentSpread(
                        spread.fragment_name.clone(),
                    ));
                }
            }
        }

        // Splits at fresh-fetch positions mark the parent object so the
        // composer can resolve its concrete type at runtime.
        if from_subschema.is_none() && !other_selections.is_empty() {
            own_selections.insert(0, Selection::Field(stitching_typename_field()));
        }

        Ok((own_selections, other_selections))
    }

    /// Builds the per-concrete-type dispatch table out of the selections the
    /// fetching subschema cannot serve. Types whose supplemental plan comes
    /// out empty are omitted.
    fn create_stitch_plan(
        &self,
        named_type: &str,
        other_selections: &[Selection<'static, String>],
        fetched_by: &SubschemaName,
    ) -> Result<StitchPlan, PlannerError> {
        let mut stitch_plan = StitchPlan::default();
        if other_selections.is_empty() {
            return Ok(stitch_plan);
        }
        for type_name in self.superschema.possible_object_types(named_type) {
            let fields = self.collect_fields(type_name, other_selections)?;
            let plan = self.create_supplemental_field_plan(type_name, &fields, fetched_by)?;
            if !plan.is_empty() {
                stitch_plan.insert(type_name.to_string(), plan);
            }
        }
        Ok(stitch_plan)
    }
}

/// Prefer the subschema the parent came from, then one the plan already
/// fetches from, then the first candidate.
fn choose_subschema(
    plan: &FieldPlan,
    from_subschema: Option<&SubschemaName>,
    candidates: &IndexSet<SubschemaName>,
) -> Option<SubschemaName> {
    if let Some(from) = from_subschema {
        if candidates.contains(from) {
            return Some(from.clone());
        }
    }
    for entry in &plan.subschema_plans {
        if candidates.contains(&entry.subschema) {
            return Some(entry.subschema.clone());
        }
    }
    candidates.first().cloned()
}

fn subschema_plan_entry<'p>(
    plan: &'p mut FieldPlan,
    subschema: &SubschemaName,
    from_subschema: Option<&SubschemaName>,
) -> &'p mut SubschemaPlan {
    let index = plan
        .subschema_plans
        .iter()
        .position(|entry| &entry.subschema == subschema);
    match index {
        Some(index) => &mut plan.subschema_plans[index],
        None => {
            plan.subschema_plans.push(SubschemaPlan::new(
                subschema.clone(),
                from_subschema.cloned(),
            ));
            let last = plan.subschema_plans.len() - 1;
            &mut plan.subschema_plans[last]
        }
    }
}
