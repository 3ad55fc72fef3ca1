use crate::superschema::{MergedType, OperationKind, SubschemaName, SuperSchema};
use crate::tests::testkit::{init_logger, super_schema};
use crate::utils::parsing::parse_schema;

#[test]
fn object_fields_union_across_subschemas_first_wins_on_conflicts() {
    init_logger();
    let superschema = super_schema(&[
        (
            "a",
            "type Query { user: User } type User { id: ID name: String }",
        ),
        ("b", "type User { id: String email: String }"),
    ]);

    let Some(MergedType::Object(user)) = superschema.get_type("User") else {
        panic!("User must merge as an object type");
    };
    assert_eq!(
        user.fields.keys().collect::<Vec<_>>(),
        vec!["id", "name", "email"]
    );
    // `id` keeps the first subschema's definition.
    assert_eq!(format!("{}", user.fields["id"].field_type), "ID");
}

#[test]
fn union_members_accumulate() {
    init_logger();
    let superschema = super_schema(&[
        (
            "a",
            "type Query { media: Media } union Media = Book type Book { title: String }",
        ),
        ("b", "union Media = Movie type Movie { runtime: Int }"),
    ]);

    let Some(MergedType::Union(media)) = superschema.get_type("Media") else {
        panic!("Media must merge as a union type");
    };
    assert_eq!(media.members.iter().collect::<Vec<_>>(), vec!["Book", "Movie"]);
    assert_eq!(superschema.possible_object_types("Media"), vec!["Book", "Movie"]);
}

#[test]
fn enum_values_accumulate_first_wins() {
    init_logger();
    let superschema = super_schema(&[
        ("a", "type Query { c: Color } enum Color { RED GREEN }"),
        ("b", "enum Color { GREEN BLUE }"),
    ]);

    let Some(MergedType::Enum(color)) = superschema.get_type("Color") else {
        panic!("Color must merge as an enum type");
    };
    assert_eq!(
        color.values.keys().collect::<Vec<_>>(),
        vec!["RED", "GREEN", "BLUE"]
    );
}

#[test]
fn differently_named_root_types_merge_under_the_first_name() {
    init_logger();
    let superschema = super_schema(&[
        (
            "a",
            "schema { query: QueryA } type QueryA { a: Int }",
        ),
        ("b", "type Query { b: Int }"),
    ]);

    assert_eq!(superschema.root_type(OperationKind::Query), Some("QueryA"));
    assert!(superschema.field("QueryA", "a").is_some());
    assert!(superschema.field("QueryA", "b").is_some());
    assert_eq!(
        superschema
            .field_subschemas("QueryA", "b")
            .map(|set| set.iter().cloned().collect::<Vec<_>>()),
        Some(vec![SubschemaName::new("b")])
    );
}

#[test]
fn every_composite_type_resolves_typename() {
    init_logger();
    let superschema = super_schema(&[(
        "a",
        r#"
        type Query { media: Media }
        union Media = Book
        type Book { title: String }
        interface Named { name: String }
        "#,
    )]);

    for type_name in ["Query", "Media", "Book", "Named"] {
        let set = superschema
            .field_subschemas(type_name, "__typename")
            .unwrap_or_else(|| panic!("__typename must be resolvable on {}", type_name));
        assert!(set.contains(&SubschemaName::new("a")));
    }
}

#[test]
fn introspection_fields_bind_to_the_internal_subschema() {
    init_logger();
    let superschema = super_schema(&[("a", "type Query { a: Int }")]);

    for field in ["__schema", "__type"] {
        let set = superschema
            .field_subschemas("Query", field)
            .unwrap_or_else(|| panic!("{} must be bound", field));
        assert_eq!(
            set.iter().cloned().collect::<Vec<_>>(),
            vec![SubschemaName::introspection()]
        );
    }
    assert!(superschema.field("Query", "__schema").is_some());
    assert!(superschema.field("Query", "__type").is_some());
}

#[test]
fn possible_types_close_over_nested_interfaces() {
    init_logger();
    let superschema = super_schema(&[(
        "a",
        r#"
        type Query { node: Node }
        interface Node { id: ID }
        interface Entity implements Node { id: ID }
        type User implements Entity & Node { id: ID }
        "#,
    )]);

    assert!(superschema.is_sub_type("Node", "User"));
    assert!(superschema.is_sub_type("Node", "Entity"));
    assert_eq!(superschema.possible_object_types("Node"), vec!["User"]);
}

#[test]
fn meta_fields_fall_through_only_where_defined() {
    init_logger();
    let superschema = super_schema(&[(
        "a",
        "type Query { user: User } type User { id: ID }",
    )]);

    assert!(superschema.field("User", "__typename").is_some());
    assert!(superschema.field("User", "__schema").is_none());
    assert!(superschema.field("Query", "__schema").is_some());
}

#[test]
fn duplicate_subschema_names_are_rejected() {
    init_logger();
    let result = SuperSchema::build(vec![
        (SubschemaName::new("a"), parse_schema("type Query { a: Int }")),
        (SubschemaName::new("a"), parse_schema("type Query { b: Int }")),
    ]);

    insta::assert_snapshot!(
        result.unwrap_err().to_string(),
        @"duplicate subschema name: 'a'"
    );
}

#[test]
fn directive_definitions_merge_locations_and_arguments() {
    init_logger();
    let superschema = super_schema(&[
        (
            "a",
            "type Query { a: Int } directive @tag(name: String) on FIELD_DEFINITION",
        ),
        (
            "b",
            "type Query { b: Int } directive @tag(value: String) repeatable on OBJECT",
        ),
    ]);

    let tag = superschema.directives.get("tag").expect("merged directive");
    assert!(tag.repeatable);
    assert_eq!(tag.locations.len(), 2);
    assert_eq!(
        tag.arguments.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
        vec!["name", "value"]
    );
}
