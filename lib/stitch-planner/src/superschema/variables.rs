use std::collections::HashMap;

use graphql_parser::query::{Type, Value as AstValue, VariableDefinition};
use serde_json::{Map, Number, Value};

use crate::superschema::{named_type_name, MergedType, SuperSchema};

/// Coercion stops collecting after this many errors unless overridden.
pub const DEFAULT_MAX_COERCION_ERRORS: usize = 50;

#[derive(Debug, Clone)]
pub struct VariableCoercionOptions {
    pub max_errors: usize,
}

impl Default for VariableCoercionOptions {
    fn default() -> Self {
        VariableCoercionOptions {
            max_errors: DEFAULT_MAX_COERCION_ERRORS,
        }
    }
}

/// Coerces raw variable inputs against the operation's variable definitions.
///
/// Missing names take their default when one is declared. Required variables
/// that are absent or explicitly `null` fail. A variable whose declared type
/// is unusable as an input type is reported without aborting the loop; the
/// loop aborts once `max_errors` is reached.
pub fn coerce_variable_values(
    superschema: &SuperSchema,
    definitions: &[VariableDefinition<'static, String>],
    inputs: &Map<String, Value>,
    options: &VariableCoercionOptions,
) -> Result<HashMap<String, Value>, Vec<String>> {
    let mut coerced: HashMap<String, Value> = HashMap::new();
    let mut errors: Vec<String> = vec![];

    for definition in definitions {
        if errors.len() >= options.max_errors {
            errors.push(
                "Too many errors processing variables, error limit reached. Execution aborted."
                    .to_string(),
            );
            break;
        }

        let variable_name = &definition.name;
        let variable_type = &definition.var_type;

        if !is_input_type(superschema, named_type_name(variable_type)) {
            errors.push(format!(
                "Variable \"${}\" expected value of type \"{}\" which cannot be used as an input type.",
                variable_name, variable_type
            ));
            continue;
        }

        match inputs.get(variable_name.as_str()) {
            Some(value) => {
                match coerce_input_value(superschema, value, variable_type) {
                    Ok(value) => {
                        coerced.insert(variable_name.clone(), value);
                    }
                    Err(reason) => {
                        errors.push(format!(
                            "Variable \"${}\" got invalid value: {}",
                            variable_name, reason
                        ));
                    }
                }
            }
            None => {
                if let Some(default_value) = &definition.default_value {
                    coerced.insert(variable_name.clone(), value_from_const_ast(default_value));
                } else if matches!(variable_type, Type::NonNullType(_)) {
                    errors.push(format!(
                        "Variable \"${}\" of required type \"{}\" was not provided.",
                        variable_name, variable_type
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}

fn is_input_type(superschema: &SuperSchema, type_name: &str) -> bool {
    SuperSchema::is_builtin_scalar(type_name)
        || superschema
            .get_type(type_name)
            .is_some_and(MergedType::is_input_type)
}

fn coerce_input_value(
    superschema: &SuperSchema,
    value: &Value,
    expected: &Type<'static, String>,
) -> Result<Value, String> {
    match expected {
        Type::NonNullType(inner) => {
            if value.is_null() {
                return Err(format!("expected non-null value of type \"{}\"", expected));
            }
            coerce_input_value(superschema, value, inner)
        }
        Type::ListType(inner) => match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => {
                let coerced: Result<Vec<Value>, String> = items
                    .iter()
                    .map(|item| coerce_input_value(superschema, item, inner))
                    .collect();
                Ok(Value::Array(coerced?))
            }
            // A single value coerces to a one-element list.
            other => Ok(Value::Array(vec![coerce_input_value(
                superschema,
                other,
                inner,
            )?])),
        },
        Type::NamedType(name) => {
            if value.is_null() {
                return Ok(Value::Null);
            }
            coerce_named_value(superschema, value, name)
        }
    }
}

fn coerce_named_value(
    superschema: &SuperSchema,
    value: &Value,
    type_name: &str,
) -> Result<Value, String> {
    match type_name {
        "String" => match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(format!("expected a String, found {}", other)),
        },
        "Int" => match value {
            Value::Number(n) if n.is_i64() => Ok(value.clone()),
            other => Err(format!("expected an Int, found {}", other)),
        },
        "Float" => match value {
            Value::Number(_) => Ok(value.clone()),
            other => Err(format!("expected a Float, found {}", other)),
        },
        "Boolean" => match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(format!("expected a Boolean, found {}", other)),
        },
        "ID" => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) if n.is_i64() => Ok(value.clone()),
            other => Err(format!("expected an ID, found {}", other)),
        },
        _ => match superschema.get_type(type_name) {
            Some(MergedType::Scalar(_)) => Ok(value.clone()),
            Some(MergedType::Enum(enum_type)) => match value {
                Value::String(s) if enum_type.values.contains_key(s.as_str()) => Ok(value.clone()),
                other => Err(format!(
                    "expected a value of enum \"{}\", found {}",
                    type_name, other
                )),
            },
            Some(MergedType::InputObject(input_object)) => {
                let Value::Object(map) = value else {
                    return Err(format!(
                        "expected an input object of type \"{}\", found {}",
                        type_name, value
                    ));
                };
                let mut coerced = Map::new();
                for (key, field_value) in map {
                    let Some(field) = input_object.fields.get(key.as_str()) else {
                        return Err(format!(
                            "field \"{}\" is not defined by input type \"{}\"",
                            key, type_name
                        ));
                    };
                    coerced.insert(
                        key.clone(),
                        coerce_input_value(superschema, field_value, &field.value_type)?,
                    );
                }
                for (field_name, field) in &input_object.fields {
                    if map.contains_key(field_name.as_str()) {
                        continue;
                    }
                    if let Some(default_value) = &field.default_value {
                        coerced.insert(field_name.clone(), value_from_const_ast(default_value));
                    } else if matches!(field.value_type, Type::NonNullType(_)) {
                        return Err(format!(
                            "field \"{}\" of required type \"{}\" was not provided",
                            field_name, field.value_type
                        ));
                    }
                }
                Ok(Value::Object(coerced))
            }
            _ => Err(format!("unknown input type \"{}\"", type_name)),
        },
    }
}

/// Converts a constant AST value (a default) into a runtime value. Variables
/// cannot appear inside defaults, so a stray one collapses to `null`.
pub fn value_from_const_ast(value: &AstValue<'static, String>) -> Value {
    match value {
        AstValue::Null | AstValue::Variable(_) => Value::Null,
        AstValue::Boolean(b) => Value::Bool(*b),
        AstValue::String(s) => Value::String(s.clone()),
        AstValue::Enum(e) => Value::String(e.clone()),
        AstValue::Int(n) => n
            .as_i64()
            .map(|n| Value::Number(Number::from(n)))
            .unwrap_or(Value::Null),
        AstValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AstValue::List(items) => Value::Array(items.iter().map(value_from_const_ast).collect()),
        AstValue::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), value_from_const_ast(value)))
                .collect(),
        ),
    }
}
