use async_trait::async_trait;
use graphql_parser::query::{
    Definition, OperationDefinition, Selection, SelectionSet, Type, Value as AstValue,
};
use graphql_parser::schema::{DirectiveDefinition, InputValue};
use serde_json::{json, Map, Value};

use stitch_planner::superschema::{
    MergedType, OperationKind, SuperSchema, SCHEMA_FIELD, TYPENAME_FIELD, TYPE_FIELD,
};

use crate::executors::common::{
    BoxError, SubschemaExecutionRequest, SubschemaExecutor, SubschemaResult,
};
use crate::response::ExecutionResult;

/// The internal subschema backing `__schema` and `__type` on the merged query
/// root. The full introspection tree is precomputed from the merged types at
/// construction; incoming documents are answered by projecting their
/// selections over that tree.
pub struct IntrospectionSubschema {
    query_root: Option<String>,
    schema_json: Value,
}

impl IntrospectionSubschema {
    pub fn new(superschema: &SuperSchema) -> Self {
        IntrospectionSubschema {
            query_root: superschema
                .root_type(OperationKind::Query)
                .map(str::to_string),
            schema_json: build_schema_json(superschema),
        }
    }

    fn resolve_root_field(
        &self,
        field: &graphql_parser::query::Field<'static, String>,
        variables: Option<&Map<String, Value>>,
    ) -> Value {
        match field.name.as_str() {
            SCHEMA_FIELD => project(&field.selection_set, &self.schema_json),
            TYPE_FIELD => {
                let Some(name) = string_argument(field, "name", variables) else {
                    return Value::Null;
                };
                match self.find_type(&name) {
                    Some(type_json) => project(&field.selection_set, type_json),
                    None => Value::Null,
                }
            }
            TYPENAME_FIELD => self
                .query_root
                .as_deref()
                .map(|name| Value::String(name.to_string()))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    fn find_type(&self, name: &str) -> Option<&Value> {
        self.schema_json
            .get("types")?
            .as_array()?
            .iter()
            .find(|type_json| type_json.get("name").and_then(Value::as_str) == Some(name))
    }
}

#[async_trait]
impl SubschemaExecutor for IntrospectionSubschema {
    async fn execute(
        &self,
        request: SubschemaExecutionRequest,
    ) -> Result<SubschemaResult, BoxError> {
        let document = match graphql_parser::parse_query::<String>(&request.query) {
            Ok(document) => document.into_static(),
            Err(error) => {
                return Ok(SubschemaResult::Complete(
                    ExecutionResult::from_error_message(error.to_string()),
                ))
            }
        };

        let selection_set = document.definitions.iter().find_map(|def| match def {
            Definition::Operation(OperationDefinition::Query(query)) => Some(&query.selection_set),
            Definition::Operation(OperationDefinition::SelectionSet(selection_set)) => {
                Some(selection_set)
            }
            _ => None,
        });

        let mut data = Map::new();
        if let Some(selection_set) = selection_set {
            for selection in &selection_set.items {
                if let Selection::Field(field) = selection {
                    let key = field.alias.as_deref().unwrap_or(&field.name);
                    data.insert(
                        key.to_string(),
                        self.resolve_root_field(field, request.variables.as_ref()),
                    );
                }
            }
        }

        Ok(SubschemaResult::Complete(ExecutionResult::new(
            Some(Value::Object(data)),
            None,
            None,
        )))
    }
}

fn string_argument(
    field: &graphql_parser::query::Field<'static, String>,
    name: &str,
    variables: Option<&Map<String, Value>>,
) -> Option<String> {
    field.arguments.iter().find_map(|(arg_name, value)| {
        if arg_name != name {
            return None;
        }
        match value {
            AstValue::String(s) => Some(s.clone()),
            AstValue::Variable(variable_name) => variables
                .and_then(|map| map.get(variable_name.as_str()))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    })
}

/// Projects the requested selections over a precomputed JSON tree, honoring
/// aliases. Unknown fields resolve to `null`.
fn project(selection_set: &SelectionSet<'static, String>, value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| project(selection_set, item))
                .collect(),
        ),
        Value::Object(source) => {
            let mut out = Map::new();
            project_into(selection_set, source, &mut out);
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn project_into(
    selection_set: &SelectionSet<'static, String>,
    source: &Map<String, Value>,
    out: &mut Map<String, Value>,
) {
    for selection in &selection_set.items {
        match selection {
            Selection::Field(field) => {
                let key = field.alias.as_deref().unwrap_or(&field.name);
                let resolved = match source.get(field.name.as_str()) {
                    Some(sub_value) if !field.selection_set.items.is_empty() => {
                        project(&field.selection_set, sub_value)
                    }
                    Some(sub_value) => sub_value.clone(),
                    None => Value::Null,
                };
                out.insert(key.to_string(), resolved);
            }
            Selection::InlineFragment(fragment) => {
                project_into(&fragment.selection_set, source, out);
            }
            Selection::FragmentSpread(_) => {}
        }
    }
}

fn build_schema_json(superschema: &SuperSchema) -> Value {
    let mut types: Vec<Value> = superschema
        .types
        .values()
        .map(|merged| type_json(superschema, merged))
        .collect();

    for scalar in ["String", "Int", "Float", "Boolean", "ID"] {
        if superschema.get_type(scalar).is_none() {
            types.push(json!({
                "__typename": "__Type",
                "kind": "SCALAR",
                "name": scalar,
                "description": null,
                "fields": null,
                "interfaces": null,
                "possibleTypes": null,
                "enumValues": null,
                "inputFields": null,
                "ofType": null,
            }));
        }
    }

    let root_ref = |kind: OperationKind| {
        superschema
            .root_type(kind)
            .map(|name| json!({ "__typename": "__Type", "kind": "OBJECT", "name": name }))
            .unwrap_or(Value::Null)
    };

    json!({
        "__typename": "__Schema",
        "description": null,
        "queryType": root_ref(OperationKind::Query),
        "mutationType": root_ref(OperationKind::Mutation),
        "subscriptionType": root_ref(OperationKind::Subscription),
        "types": types,
        "directives": superschema
            .directives
            .values()
            .map(|directive| directive_json(superschema, directive))
            .collect::<Vec<Value>>(),
    })
}

fn type_json(superschema: &SuperSchema, merged: &MergedType) -> Value {
    let mut out = json!({
        "__typename": "__Type",
        "kind": kind_name(merged),
        "name": merged.name(),
        "description": description_of(merged),
        "fields": null,
        "interfaces": null,
        "possibleTypes": null,
        "enumValues": null,
        "inputFields": null,
        "ofType": null,
    });

    match merged {
        MergedType::Object(object) => {
            out["fields"] = fields_json(superschema, merged);
            out["interfaces"] = Value::Array(
                object
                    .interfaces
                    .iter()
                    .map(|name| named_ref(superschema, name))
                    .collect(),
            );
        }
        MergedType::Interface(interface) => {
            out["fields"] = fields_json(superschema, merged);
            out["interfaces"] = Value::Array(
                interface
                    .interfaces
                    .iter()
                    .map(|name| named_ref(superschema, name))
                    .collect(),
            );
            out["possibleTypes"] = possible_types_json(superschema, &interface.name);
        }
        MergedType::Union(union_type) => {
            out["possibleTypes"] = possible_types_json(superschema, &union_type.name);
        }
        MergedType::Enum(enum_type) => {
            out["enumValues"] = Value::Array(
                enum_type
                    .values
                    .values()
                    .map(|value| {
                        json!({
                            "__typename": "__EnumValue",
                            "name": value.name,
                            "description": value.description,
                            "isDeprecated": false,
                            "deprecationReason": null,
                        })
                    })
                    .collect(),
            );
        }
        MergedType::InputObject(input_object) => {
            out["inputFields"] = Value::Array(
                input_object
                    .fields
                    .values()
                    .map(|field| input_value_json(superschema, field))
                    .collect(),
            );
        }
        MergedType::Scalar(_) => {}
    }

    out
}

fn fields_json(superschema: &SuperSchema, merged: &MergedType) -> Value {
    let Some(fields) = merged.fields() else {
        return Value::Null;
    };
    Value::Array(
        fields
            .values()
            .map(|field| {
                json!({
                    "__typename": "__Field",
                    "name": field.name,
                    "description": field.description,
                    "args": field
                        .arguments
                        .iter()
                        .map(|argument| input_value_json(superschema, argument))
                        .collect::<Vec<Value>>(),
                    "type": type_ref_json(superschema, &field.field_type),
                    "isDeprecated": false,
                    "deprecationReason": null,
                })
            })
            .collect(),
    )
}

fn input_value_json(superschema: &SuperSchema, input: &InputValue<'static, String>) -> Value {
    json!({
        "__typename": "__InputValue",
        "name": input.name,
        "description": input.description,
        "type": type_ref_json(superschema, &input.value_type),
        "defaultValue": input
            .default_value
            .as_ref()
            .map(|value| Value::String(value.to_string()))
            .unwrap_or(Value::Null),
    })
}

fn directive_json(
    superschema: &SuperSchema,
    directive: &DirectiveDefinition<'static, String>,
) -> Value {
    json!({
        "__typename": "__Directive",
        "name": directive.name,
        "description": directive.description,
        "isRepeatable": directive.repeatable,
        "locations": directive
            .locations
            .iter()
            .map(|location| Value::String(location.as_str().to_string()))
            .collect::<Vec<Value>>(),
        "args": directive
            .arguments
            .iter()
            .map(|argument| input_value_json(superschema, argument))
            .collect::<Vec<Value>>(),
    })
}

fn possible_types_json(superschema: &SuperSchema, abstract_name: &str) -> Value {
    Value::Array(
        superschema
            .possible_object_types(abstract_name)
            .into_iter()
            .map(|name| json!({ "__typename": "__Type", "kind": "OBJECT", "name": name }))
            .collect(),
    )
}

fn named_ref(superschema: &SuperSchema, name: &str) -> Value {
    json!({
        "__typename": "__Type",
        "kind": kind_name_of(superschema, name),
        "name": name,
    })
}

fn type_ref_json(superschema: &SuperSchema, ty: &Type<'static, String>) -> Value {
    match ty {
        Type::NamedType(name) => json!({
            "__typename": "__Type",
            "kind": kind_name_of(superschema, name),
            "name": name,
            "ofType": null,
        }),
        Type::ListType(inner) => json!({
            "__typename": "__Type",
            "kind": "LIST",
            "name": null,
            "ofType": type_ref_json(superschema, inner),
        }),
        Type::NonNullType(inner) => json!({
            "__typename": "__Type",
            "kind": "NON_NULL",
            "name": null,
            "ofType": type_ref_json(superschema, inner),
        }),
    }
}

fn kind_name_of(superschema: &SuperSchema, name: &str) -> &'static str {
    superschema
        .get_type(name)
        .map(kind_name)
        .unwrap_or("SCALAR")
}

fn kind_name(merged: &MergedType) -> &'static str {
    match merged {
        MergedType::Scalar(_) => "SCALAR",
        MergedType::Object(_) => "OBJECT",
        MergedType::Interface(_) => "INTERFACE",
        MergedType::Union(_) => "UNION",
        MergedType::Enum(_) => "ENUM",
        MergedType::InputObject(_) => "INPUT_OBJECT",
    }
}

fn description_of(merged: &MergedType) -> Value {
    let description = match merged {
        MergedType::Scalar(t) => &t.description,
        MergedType::Object(t) => &t.description,
        MergedType::Interface(t) => &t.description,
        MergedType::Union(t) => &t.description,
        MergedType::Enum(t) => &t.description,
        MergedType::InputObject(t) => &t.description,
    };
    description
        .as_ref()
        .map(|d| Value::String(d.clone()))
        .unwrap_or(Value::Null)
}
