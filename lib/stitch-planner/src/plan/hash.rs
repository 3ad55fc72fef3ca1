use std::hash::{Hash, Hasher};

use graphql_parser::query::{Directive, Selection, SelectionSet, Type, Value};
use rustc_hash::FxHasher;

use crate::plan::FieldNode;
use crate::superschema::SubschemaName;

/// Order-dependent hashing over query AST nodes, used as the memo-cache key
/// for field plans. Positions never participate.
pub trait AstHash {
    fn ast_hash<H: Hasher>(&self, hasher: &mut H);
}

pub fn field_plan_key(
    parent_type: &str,
    from_subschema: Option<&SubschemaName>,
    fields: &[FieldNode],
) -> u64 {
    let mut hasher = FxHasher::default();
    parent_type.hash(&mut hasher);
    match from_subschema {
        Some(name) => {
            true.hash(&mut hasher);
            name.0.hash(&mut hasher);
        }
        None => false.hash(&mut hasher),
    }
    for field in fields {
        field.ast_hash(&mut hasher);
    }
    hasher.finish()
}

pub fn subfields_key(parent_type: &str, selections: &[Selection<'static, String>]) -> u64 {
    let mut hasher = FxHasher::default();
    parent_type.hash(&mut hasher);
    for selection in selections {
        selection.ast_hash(&mut hasher);
    }
    hasher.finish()
}

impl AstHash for FieldNode {
    fn ast_hash<H: Hasher>(&self, hasher: &mut H) {
        self.name.hash(hasher);
        self.alias.hash(hasher);
        for (name, value) in &self.arguments {
            name.hash(hasher);
            value.ast_hash(hasher);
        }
        for directive in &self.directives {
            directive.ast_hash(hasher);
        }
        self.selection_set.ast_hash(hasher);
    }
}

impl AstHash for SelectionSet<'static, String> {
    fn ast_hash<H: Hasher>(&self, hasher: &mut H) {
        for item in &self.items {
            item.ast_hash(hasher);
        }
    }
}

impl AstHash for Selection<'static, String> {
    fn ast_hash<H: Hasher>(&self, hasher: &mut H) {
        match self {
            Selection::Field(field) => {
                "field".hash(hasher);
                field.ast_hash(hasher);
            }
            Selection::InlineFragment(fragment) => {
                "inline_fragment".hash(hasher);
                match &fragment.type_condition {
                    Some(graphql_parser::query::TypeCondition::On(name)) => name.hash(hasher),
                    None => "".hash(hasher),
                }
                for directive in &fragment.directives {
                    directive.ast_hash(hasher);
                }
                fragment.selection_set.ast_hash(hasher);
            }
            Selection::FragmentSpread(spread) => {
                "fragment_spread".hash(hasher);
                spread.fragment_name.hash(hasher);
            }
        }
    }
}

impl AstHash for Directive<'static, String> {
    fn ast_hash<H: Hasher>(&self, hasher: &mut H) {
        self.name.hash(hasher);
        for (name, value) in &self.arguments {
            name.hash(hasher);
            value.ast_hash(hasher);
        }
    }
}

impl AstHash for Type<'static, String> {
    fn ast_hash<H: Hasher>(&self, hasher: &mut H) {
        match self {
            Type::NamedType(name) => name.hash(hasher),
            Type::ListType(inner) => {
                "list".hash(hasher);
                inner.ast_hash(hasher);
            }
            Type::NonNullType(inner) => {
                "non_null".hash(hasher);
                inner.ast_hash(hasher);
            }
        }
    }
}

impl AstHash for Value<'static, String> {
    fn ast_hash<H: Hasher>(&self, hasher: &mut H) {
        match self {
            Value::Null => "null".hash(hasher),
            Value::Variable(name) => {
                "variable".hash(hasher);
                name.hash(hasher);
            }
            Value::Int(n) => n.as_i64().hash(hasher),
            Value::Float(f) => f.to_bits().hash(hasher),
            Value::String(s) => s.hash(hasher),
            Value::Boolean(b) => b.hash(hasher),
            Value::Enum(e) => e.hash(hasher),
            Value::List(items) => {
                for item in items {
                    item.ast_hash(hasher);
                }
            }
            Value::Object(map) => {
                for (key, value) in map {
                    key.hash(hasher);
                    value.ast_hash(hasher);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parsing::parse_operation;
    use graphql_parser::query::{Definition, OperationDefinition};

    fn fields_of(operation: &str) -> Vec<FieldNode> {
        let document = parse_operation(operation);
        let Some(Definition::Operation(OperationDefinition::Query(query))) =
            document.definitions.into_iter().next()
        else {
            panic!("expected a query operation");
        };
        query
            .selection_set
            .items
            .into_iter()
            .filter_map(|item| match item {
                Selection::Field(field) => Some(field),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn identical_selections_hash_identically() {
        let a = fields_of("query { user(id: 1) { name email } }");
        let b = fields_of("query { user(id: 1) { name email } }");
        assert_eq!(
            field_plan_key("Query", None, &a),
            field_plan_key("Query", None, &b),
        );
    }

    #[test]
    fn argument_changes_the_key() {
        let a = fields_of("query { user(id: 1) { name } }");
        let b = fields_of("query { user(id: 2) { name } }");
        assert_ne!(
            field_plan_key("Query", None, &a),
            field_plan_key("Query", None, &b),
        );
    }

    #[test]
    fn originating_subschema_changes_the_key() {
        let fields = fields_of("query { user { name } }");
        let from = SubschemaName::new("accounts");
        assert_ne!(
            field_plan_key("Query", None, &fields),
            field_plan_key("Query", Some(&from), &fields),
        );
    }
}
