use std::collections::HashMap;
use std::fmt::Display;

use graphql_parser::query::Type;
use graphql_parser::schema::{
    self, Definition, DirectiveDefinition, EnumValue, Field, InputValue, TypeDefinition,
};
use graphql_parser::Pos;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

pub mod variables;

pub type SchemaDocument = schema::Document<'static, String>;
pub type FieldDefinition = Field<'static, String>;

pub const TYPENAME_FIELD: &str = "__typename";
pub const SCHEMA_FIELD: &str = "__schema";
pub const TYPE_FIELD: &str = "__type";

const INTROSPECTION_SUBSCHEMA: &str = "__introspection";
static BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubschemaName(pub String);

impl Display for SubschemaName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SubschemaName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Reserved name of the internal subschema answering `__schema` / `__type`.
    pub fn introspection() -> Self {
        Self(INTROSPECTION_SUBSCHEMA.to_string())
    }

    pub fn is_introspection(&self) -> bool {
        self.0 == INTROSPECTION_SUBSCHEMA
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergedScalarType {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MergedObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDefinition>,
    pub interfaces: IndexSet<String>,
}

#[derive(Debug, Clone)]
pub struct MergedInterfaceType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDefinition>,
    pub interfaces: IndexSet<String>,
}

#[derive(Debug, Clone)]
pub struct MergedUnionType {
    pub name: String,
    pub description: Option<String>,
    pub members: IndexSet<String>,
}

#[derive(Debug, Clone)]
pub struct MergedEnumType {
    pub name: String,
    pub description: Option<String>,
    pub values: IndexMap<String, EnumValue<'static, String>>,
}

#[derive(Debug, Clone)]
pub struct MergedInputObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, InputValue<'static, String>>,
}

#[derive(Debug, Clone)]
pub enum MergedType {
    Scalar(MergedScalarType),
    Object(MergedObjectType),
    Interface(MergedInterfaceType),
    Union(MergedUnionType),
    Enum(MergedEnumType),
    InputObject(MergedInputObjectType),
}

impl MergedType {
    pub fn name(&self) -> &str {
        match self {
            MergedType::Scalar(t) => &t.name,
            MergedType::Object(t) => &t.name,
            MergedType::Interface(t) => &t.name,
            MergedType::Union(t) => &t.name,
            MergedType::Enum(t) => &t.name,
            MergedType::InputObject(t) => &t.name,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, MergedType::Object(_))
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            MergedType::Object(_) | MergedType::Interface(_) | MergedType::Union(_)
        )
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, MergedType::Interface(_) | MergedType::Union(_))
    }

    pub fn is_input_type(&self) -> bool {
        matches!(
            self,
            MergedType::Scalar(_) | MergedType::Enum(_) | MergedType::InputObject(_)
        )
    }

    pub fn fields(&self) -> Option<&IndexMap<String, FieldDefinition>> {
        match self {
            MergedType::Object(t) => Some(&t.fields),
            MergedType::Interface(t) => Some(&t.fields),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SuperSchemaError {
    #[error("duplicate subschema name: '{0}'")]
    DuplicateSubschema(String),
    #[error("subschema '{subschema}' declares root type '{type_name}' which is not defined")]
    UnknownRootType {
        subschema: SubschemaName,
        type_name: String,
    },
    #[error("root type '{0}' must be an object type")]
    RootTypeNotObject(String),
}

/// Meta-field definitions synthesized once at build and served through
/// [`SuperSchema::field`] alongside the merged fields.
#[derive(Debug)]
struct MetaFields {
    typename: FieldDefinition,
    schema: FieldDefinition,
    type_by_name: FieldDefinition,
}

/// The merged union of all registered subschemas: one type map, one set of
/// root types, and, for every field of every composite type, the ordered set
/// of subschemas able to resolve it.
#[derive(Debug)]
pub struct SuperSchema {
    pub types: IndexMap<String, MergedType>,
    pub directives: IndexMap<String, DirectiveDefinition<'static, String>>,
    pub subschema_names: Vec<SubschemaName>,
    root_types: HashMap<OperationKind, String>,
    subschema_sets: HashMap<String, IndexMap<String, IndexSet<SubschemaName>>>,
    possible_types: HashMap<String, IndexSet<String>>,
    meta: MetaFields,
}

impl SuperSchema {
    #[instrument(level = "debug", skip(subschemas), name = "build_super_schema", fields(subschema_count = subschemas.len()))]
    pub fn build(
        subschemas: Vec<(SubschemaName, SchemaDocument)>,
    ) -> Result<SuperSchema, SuperSchemaError> {
        let mut types: IndexMap<String, MergedType> = IndexMap::new();
        let mut directives: IndexMap<String, DirectiveDefinition<'static, String>> =
            IndexMap::new();
        let mut root_types: HashMap<OperationKind, String> = HashMap::new();
        let mut subschema_sets: HashMap<String, IndexMap<String, IndexSet<SubschemaName>>> =
            HashMap::new();
        let mut subschema_names: Vec<SubschemaName> = Vec::with_capacity(subschemas.len());

        for (subschema_name, document) in &subschemas {
            if subschema_names.contains(subschema_name) {
                return Err(SuperSchemaError::DuplicateSubschema(
                    subschema_name.0.clone(),
                ));
            }
            subschema_names.push(subschema_name.clone());

            let roots = root_operation_types(subschema_name, document)?;

            // Root types merge across subschemas even when they are named
            // differently, so fields of a later subschema's root land under
            // the merged root's name.
            let mut renames: HashMap<&str, String> = HashMap::new();
            for (kind, type_name) in &roots {
                let merged_name = root_types
                    .entry(*kind)
                    .or_insert_with(|| type_name.clone())
                    .clone();
                if merged_name != *type_name {
                    renames.insert(type_name.as_str(), merged_name);
                }
            }

            for definition in &document.definitions {
                match definition {
                    Definition::TypeDefinition(type_def) => {
                        let declared = type_definition_name(type_def);
                        if declared.starts_with("__") {
                            continue;
                        }
                        let effective = renames
                            .get(declared)
                            .cloned()
                            .unwrap_or_else(|| declared.to_string());
                        merge_type_definition(&mut types, &effective, type_def, subschema_name);
                        record_field_resolvers(
                            &mut subschema_sets,
                            &effective,
                            type_def,
                            subschema_name,
                        );
                    }
                    Definition::DirectiveDefinition(directive) => {
                        merge_directive_definition(&mut directives, directive);
                    }
                    Definition::SchemaDefinition(_) | Definition::TypeExtension(_) => {}
                }
            }
        }

        if let Some(query_root) = root_types.get(&OperationKind::Query) {
            let root_fields = subschema_sets.entry(query_root.clone()).or_default();
            root_fields
                .entry(SCHEMA_FIELD.to_string())
                .or_default()
                .insert(SubschemaName::introspection());
            root_fields
                .entry(TYPE_FIELD.to_string())
                .or_default()
                .insert(SubschemaName::introspection());
        }

        let possible_types = build_possible_types(&types);

        Ok(SuperSchema {
            types,
            directives,
            subschema_names,
            root_types,
            subschema_sets,
            possible_types,
            meta: build_meta_fields(),
        })
    }

    pub fn root_type(&self, kind: OperationKind) -> Option<&str> {
        self.root_types.get(&kind).map(String::as_str)
    }

    pub fn get_type(&self, name: &str) -> Option<&MergedType> {
        self.types.get(name)
    }

    /// Concrete object types a value of the given type can turn out to be at
    /// runtime: the type itself when it is an object, the members/implementors
    /// closure when it is abstract.
    pub fn possible_object_types(&self, name: &str) -> Vec<&str> {
        match self.types.get(name) {
            Some(MergedType::Object(object)) => vec![object.name.as_str()],
            Some(MergedType::Interface(_)) | Some(MergedType::Union(_)) => self
                .possible_types
                .get(name)
                .map(|set| {
                    set.iter()
                        .filter(|candidate| {
                            self.types.get(candidate.as_str()).is_some_and(MergedType::is_object)
                        })
                        .map(String::as_str)
                        .collect()
                })
                .unwrap_or_default(),
            _ => vec![],
        }
    }

    pub fn is_sub_type(&self, abstract_name: &str, maybe_sub_type: &str) -> bool {
        self.possible_types
            .get(abstract_name)
            .is_some_and(|set| set.contains(maybe_sub_type))
    }

    /// Whether an inline fragment with the given type condition applies to a
    /// value of the given parent type.
    pub fn type_condition_satisfied(&self, parent_type: &str, condition: &str) -> bool {
        parent_type == condition || self.is_sub_type(condition, parent_type)
    }

    pub fn subschema_sets(
        &self,
        type_name: &str,
    ) -> Option<&IndexMap<String, IndexSet<SubschemaName>>> {
        self.subschema_sets.get(type_name)
    }

    pub fn field_subschemas(
        &self,
        type_name: &str,
        field_name: &str,
    ) -> Option<&IndexSet<SubschemaName>> {
        self.subschema_sets.get(type_name)?.get(field_name)
    }

    /// Field definition lookup, falling through to the meta-fields: `__schema`
    /// and `__type` on the query root, `__typename` on every composite type.
    pub fn field(&self, parent_type: &str, field_name: &str) -> Option<&FieldDefinition> {
        if field_name == TYPENAME_FIELD {
            return self
                .get_type(parent_type)
                .filter(|t| t.is_composite())
                .map(|_| &self.meta.typename);
        }
        if self.root_type(OperationKind::Query) == Some(parent_type) {
            match field_name {
                SCHEMA_FIELD => return Some(&self.meta.schema),
                TYPE_FIELD => return Some(&self.meta.type_by_name),
                _ => {}
            }
        }
        self.get_type(parent_type)?.fields()?.get(field_name)
    }

    /// The unwrapped name of a field's return type, or `None` when the parent
    /// type has no such field.
    pub fn field_type_name(&self, parent_type: &str, field_name: &str) -> Option<&str> {
        self.field(parent_type, field_name)
            .map(|field| named_type_name(&field.field_type))
    }

    pub fn is_builtin_scalar(name: &str) -> bool {
        BUILTIN_SCALARS.contains(&name)
    }
}

pub fn named_type_name<'t>(ty: &'t Type<'static, String>) -> &'t str {
    match ty {
        Type::NamedType(name) => name,
        Type::ListType(inner) => named_type_name(inner),
        Type::NonNullType(inner) => named_type_name(inner),
    }
}

fn type_definition_name<'d>(type_def: &'d TypeDefinition<'static, String>) -> &'d str {
    match type_def {
        TypeDefinition::Scalar(t) => &t.name,
        TypeDefinition::Object(t) => &t.name,
        TypeDefinition::Interface(t) => &t.name,
        TypeDefinition::Union(t) => &t.name,
        TypeDefinition::Enum(t) => &t.name,
        TypeDefinition::InputObject(t) => &t.name,
    }
}

fn root_operation_types(
    subschema_name: &SubschemaName,
    document: &SchemaDocument,
) -> Result<HashMap<OperationKind, String>, SuperSchemaError> {
    let mut roots = HashMap::new();

    let schema_def = document.definitions.iter().find_map(|def| match def {
        Definition::SchemaDefinition(schema_def) => Some(schema_def),
        _ => None,
    });

    match schema_def {
        Some(schema_def) => {
            if let Some(query) = &schema_def.query {
                roots.insert(OperationKind::Query, query.clone());
            }
            if let Some(mutation) = &schema_def.mutation {
                roots.insert(OperationKind::Mutation, mutation.clone());
            }
            if let Some(subscription) = &schema_def.subscription {
                roots.insert(OperationKind::Subscription, subscription.clone());
            }
        }
        None => {
            for (kind, default_name) in [
                (OperationKind::Query, "Query"),
                (OperationKind::Mutation, "Mutation"),
                (OperationKind::Subscription, "Subscription"),
            ] {
                if has_type_definition(document, default_name) {
                    roots.insert(kind, default_name.to_string());
                }
            }
        }
    }

    for type_name in roots.values() {
        let definition = document.definitions.iter().find_map(|def| match def {
            Definition::TypeDefinition(type_def) if type_definition_name(type_def) == type_name => {
                Some(type_def)
            }
            _ => None,
        });
        match definition {
            None => {
                return Err(SuperSchemaError::UnknownRootType {
                    subschema: subschema_name.clone(),
                    type_name: type_name.clone(),
                })
            }
            Some(TypeDefinition::Object(_)) => {}
            Some(_) => return Err(SuperSchemaError::RootTypeNotObject(type_name.clone())),
        }
    }

    Ok(roots)
}

fn has_type_definition(document: &SchemaDocument, name: &str) -> bool {
    document.definitions.iter().any(|def| {
        matches!(def, Definition::TypeDefinition(type_def) if type_definition_name(type_def) == name)
    })
}

fn merge_type_definition(
    types: &mut IndexMap<String, MergedType>,
    effective_name: &str,
    type_def: &TypeDefinition<'static, String>,
    subschema_name: &SubschemaName,
) {
    match type_def {
        TypeDefinition::Scalar(scalar) => {
            types
                .entry(effective_name.to_string())
                .or_insert_with(|| {
                    MergedType::Scalar(MergedScalarType {
                        name: effective_name.to_string(),
                        description: scalar.description.clone(),
                    })
                });
        }
        TypeDefinition::Object(object) => {
            let merged = types.entry(effective_name.to_string()).or_insert_with(|| {
                MergedType::Object(MergedObjectType {
                    name: effective_name.to_string(),
                    description: object.description.clone(),
                    fields: IndexMap::new(),
                    interfaces: IndexSet::new(),
                })
            });
            let MergedType::Object(merged) = merged else {
                warn!(
                    "type '{}' of subschema '{}' conflicts with an earlier non-object definition, first definition wins",
                    effective_name, subschema_name
                );
                return;
            };
            for field in &object.fields {
                merged
                    .fields
                    .entry(field.name.clone())
                    .or_insert_with(|| field.clone());
            }
            merged
                .interfaces
                .extend(object.implements_interfaces.iter().cloned());
        }
        TypeDefinition::Interface(interface) => {
            let merged = types.entry(effective_name.to_string()).or_insert_with(|| {
                MergedType::Interface(MergedInterfaceType {
                    name: effective_name.to_string(),
                    description: interface.description.clone(),
                    fields: IndexMap::new(),
                    interfaces: IndexSet::new(),
                })
            });
            let MergedType::Interface(merged) = merged else {
                warn!(
                    "type '{}' of subschema '{}' conflicts with an earlier non-interface definition, first definition wins",
                    effective_name, subschema_name
                );
                return;
            };
            for field in &interface.fields {
                merged
                    .fields
                    .entry(field.name.clone())
                    .or_insert_with(|| field.clone());
            }
            merged
                .interfaces
                .extend(interface.implements_interfaces.iter().cloned());
        }
        TypeDefinition::Union(union_type) => {
            let merged = types.entry(effective_name.to_string()).or_insert_with(|| {
                MergedType::Union(MergedUnionType {
                    name: effective_name.to_string(),
                    description: union_type.description.clone(),
                    members: IndexSet::new(),
                })
            });
            let MergedType::Union(merged) = merged else {
                warn!(
                    "type '{}' of subschema '{}' conflicts with an earlier non-union definition, first definition wins",
                    effective_name, subschema_name
                );
                return;
            };
            merged.members.extend(union_type.types.iter().cloned());
        }
        TypeDefinition::Enum(enum_type) => {
            let merged = types.entry(effective_name.to_string()).or_insert_with(|| {
                MergedType::Enum(MergedEnumType {
                    name: effective_name.to_string(),
                    description: enum_type.description.clone(),
                    values: IndexMap::new(),
                })
            });
            let MergedType::Enum(merged) = merged else {
                warn!(
                    "type '{}' of subschema '{}' conflicts with an earlier non-enum definition, first definition wins",
                    effective_name, subschema_name
                );
                return;
            };
            for value in &enum_type.values {
                merged
                    .values
                    .entry(value.name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        TypeDefinition::InputObject(input_object) => {
            let merged = types.entry(effective_name.to_string()).or_insert_with(|| {
                MergedType::InputObject(MergedInputObjectType {
                    name: effective_name.to_string(),
                    description: input_object.description.clone(),
                    fields: IndexMap::new(),
                })
            });
            let MergedType::InputObject(merged) = merged else {
                warn!(
                    "type '{}' of subschema '{}' conflicts with an earlier non-input definition, first definition wins",
                    effective_name, subschema_name
                );
                return;
            };
            for field in &input_object.fields {
                merged
                    .fields
                    .entry(field.name.clone())
                    .or_insert_with(|| field.clone());
            }
        }
    }
}

fn merge_directive_definition(
    directives: &mut IndexMap<String, DirectiveDefinition<'static, String>>,
    directive: &DirectiveDefinition<'static, String>,
) {
    let merged = directives
        .entry(directive.name.clone())
        .or_insert_with(|| DirectiveDefinition {
            position: Pos::default(),
            description: directive.description.clone(),
            name: directive.name.clone(),
            arguments: vec![],
            repeatable: false,
            locations: vec![],
        });
    for location in &directive.locations {
        if !merged.locations.contains(location) {
            merged.locations.push(location.clone());
        }
    }
    merged.repeatable = merged.repeatable || directive.repeatable;
    for argument in &directive.arguments {
        if !merged.arguments.iter().any(|a| a.name == argument.name) {
            merged.arguments.push(argument.clone());
        }
    }
}

fn record_field_resolvers(
    subschema_sets: &mut HashMap<String, IndexMap<String, IndexSet<SubschemaName>>>,
    effective_name: &str,
    type_def: &TypeDefinition<'static, String>,
    subschema_name: &SubschemaName,
) {
    let field_names: Vec<&String> = match type_def {
        TypeDefinition::Object(object) => object.fields.iter().map(|f| &f.name).collect(),
        TypeDefinition::Interface(interface) => {
            interface.fields.iter().map(|f| &f.name).collect()
        }
        TypeDefinition::Union(_) => vec![],
        _ => return,
    };

    let fields = subschema_sets.entry(effective_name.to_string()).or_default();
    for field_name in field_names {
        fields
            .entry(field_name.clone())
            .or_default()
            .insert(subschema_name.clone());
    }
    fields
        .entry(TYPENAME_FIELD.to_string())
        .or_default()
        .insert(subschema_name.clone());
}

fn build_possible_types(
    types: &IndexMap<String, MergedType>,
) -> HashMap<String, IndexSet<String>> {
    let mut possible: HashMap<String, IndexSet<String>> = HashMap::new();

    for merged in types.values() {
        match merged {
            MergedType::Object(object) => {
                for interface in &object.interfaces {
                    possible
                        .entry(interface.clone())
                        .or_default()
                        .insert(object.name.clone());
                }
            }
            MergedType::Interface(interface) => {
                for parent in &interface.interfaces {
                    possible
                        .entry(parent.clone())
                        .or_default()
                        .insert(interface.name.clone());
                }
            }
            MergedType::Union(union_type) => {
                possible
                    .entry(union_type.name.clone())
                    .or_default()
                    .extend(union_type.members.iter().cloned());
            }
            _ => {}
        }
    }

    // Close transitively: an object reachable through a nested interface or
    // union member is a possible type of the outer abstract type too.
    loop {
        let mut additions: Vec<(String, String)> = vec![];
        for (abstract_name, members) in &possible {
            for member in members {
                if let Some(nested) = possible.get(member) {
                    for nested_member in nested {
                        if !members.contains(nested_member) {
                            additions.push((abstract_name.clone(), nested_member.clone()));
                        }
                    }
                }
            }
        }
        if additions.is_empty() {
            break;
        }
        for (abstract_name, member) in additions {
            possible.entry(abstract_name).or_default().insert(member);
        }
    }

    possible
}

fn build_meta_fields() -> MetaFields {
    let non_null_named = |name: &str| {
        Type::NonNullType(Box::new(Type::NamedType(name.to_string())))
    };
    MetaFields {
        typename: Field {
            position: Pos::default(),
            description: None,
            name: TYPENAME_FIELD.to_string(),
            arguments: vec![],
            field_type: non_null_named("String"),
            directives: vec![],
        },
        schema: Field {
            position: Pos::default(),
            description: None,
            name: SCHEMA_FIELD.to_string(),
            arguments: vec![],
            field_type: non_null_named("__Schema"),
            directives: vec![],
        },
        type_by_name: Field {
            position: Pos::default(),
            description: None,
            name: TYPE_FIELD.to_string(),
            arguments: vec![InputValue {
                position: Pos::default(),
                description: None,
                name: "name".to_string(),
                value_type: non_null_named("String"),
                default_value: None,
                directives: vec![],
            }],
            field_type: Type::NamedType("__Type".to_string()),
            directives: vec![],
        },
    }
}
