use std::fmt::{Display, Formatter, Result as FmtResult};

use graphql_parser::query::{Definition, Document, OperationDefinition, Selection};
use indexmap::IndexMap;

use crate::plan::{selection_set_of_items, FieldNode, FieldPlan, StitchPlan, SubschemaPlan};
use crate::utils::pretty_display::{get_indent, PrettyDisplay};

/// Renders field nodes as a bare selection-set document, reusing the AST
/// formatting the outgoing documents are built with.
pub fn render_field_nodes(fields: &[FieldNode]) -> String {
    let document: Document<'static, String> = Document {
        definitions: vec![Definition::Operation(OperationDefinition::SelectionSet(
            selection_set_of_items(fields.iter().cloned().map(Selection::Field).collect()),
        ))],
    };
    document.to_string().trim_end().to_string()
}

fn write_reindented(f: &mut Formatter<'_>, block: &str, depth: usize) -> FmtResult {
    let indent = get_indent(depth);
    for line in block.lines() {
        writeln!(f, "{indent}{line}")?;
    }
    Ok(())
}

fn write_stitch_plans(
    f: &mut Formatter<'_>,
    stitch_plans: &IndexMap<String, StitchPlan>,
    depth: usize,
) -> FmtResult {
    let indent = get_indent(depth);
    for (key, stitch_plan) in stitch_plans {
        writeln!(f, "{indent}Stitch(key: \"{key}\") {{")?;
        for (type_name, plan) in &stitch_plan.plans_by_type {
            writeln!(f, "{indent}  On(type: \"{type_name}\") {{")?;
            plan.pretty_fmt(f, depth + 2)?;
            writeln!(f, "{indent}  }},")?;
        }
        writeln!(f, "{indent}}},")?;
    }
    Ok(())
}

impl PrettyDisplay for FieldPlan {
    fn pretty_fmt(&self, f: &mut Formatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        writeln!(f, "{indent}FieldPlan {{")?;
        for subschema_plan in &self.subschema_plans {
            subschema_plan.pretty_fmt(f, depth + 1)?;
        }
        write_stitch_plans(f, &self.stitch_plans, depth + 1)?;
        writeln!(f, "{indent}}}")
    }
}

impl PrettyDisplay for SubschemaPlan {
    fn pretty_fmt(&self, f: &mut Formatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        match &self.from_subschema {
            Some(from) => writeln!(
                f,
                "{indent}Fetch(subschema: \"{}\", from: \"{}\") {{",
                self.subschema, from
            )?,
            None => writeln!(f, "{indent}Fetch(subschema: \"{}\") {{", self.subschema)?,
        }
        write_reindented(f, &render_field_nodes(&self.field_nodes), depth + 1)?;
        write_stitch_plans(f, &self.stitch_plans, depth + 1)?;
        writeln!(f, "{indent}}},")
    }
}

impl Display for FieldPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        self.pretty_fmt(f, 0)
    }
}
