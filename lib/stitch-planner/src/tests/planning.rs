use crate::plan::display::render_field_nodes;
use crate::superschema::SubschemaName;
use crate::tests::testkit::{init_logger, plan, planner_for, rendered_selection};

#[test]
fn single_subschema_passthrough() {
    init_logger();
    let planner = planner_for(&[
        ("a", "type Query { a: Int }"),
        ("b", "type Query { b: Int }"),
    ]);

    let plan = plan(&planner, "query { a }");

    assert_eq!(plan.subschema_plans.len(), 1);
    let fetch = &plan.subschema_plans[0];
    assert_eq!(fetch.subschema, SubschemaName::new("a"));
    assert_eq!(fetch.from_subschema, None);
    assert!(fetch.stitch_plans.is_empty());
    assert_eq!(
        render_field_nodes(&fetch.field_nodes),
        rendered_selection("{ a }")
    );
}

#[test]
fn cross_subschema_split_marks_the_parent_object() {
    init_logger();
    let planner = planner_for(&[
        (
            "a",
            "type Query { user: User } type User { id: ID name: String }",
        ),
        ("b", "type User { id: ID email: String }"),
    ]);

    let plan = plan(&planner, "query { user { name email } }");

    assert_eq!(plan.subschema_plans.len(), 1);
    let fetch = &plan.subschema_plans[0];
    assert_eq!(fetch.subschema, SubschemaName::new("a"));
    assert_eq!(
        render_field_nodes(&fetch.field_nodes),
        rendered_selection("{ user { __stitching__typename: __typename name } }")
    );

    let stitch = fetch
        .stitch_plans
        .get("user")
        .expect("a stitch plan keyed on the response key");
    let supplemental = stitch.get("User").expect("an arm for the concrete type");
    assert_eq!(supplemental.subschema_plans.len(), 1);
    let follow_up = &supplemental.subschema_plans[0];
    assert_eq!(follow_up.subschema, SubschemaName::new("b"));
    assert_eq!(follow_up.from_subschema, Some(SubschemaName::new("a")));
    assert_eq!(
        render_field_nodes(&follow_up.field_nodes),
        rendered_selection("{ email }")
    );
}

#[test]
fn response_key_is_the_alias_when_present() {
    init_logger();
    let planner = planner_for(&[
        (
            "a",
            "type Query { user: User } type User { id: ID name: String }",
        ),
        ("b", "type User { id: ID email: String }"),
    ]);

    let plan = plan(&planner, "query { account: user { name email } }");

    let fetch = &plan.subschema_plans[0];
    assert!(fetch.stitch_plans.contains_key("account"));
    assert!(!fetch.stitch_plans.contains_key("user"));
}

#[test]
fn abstract_parent_emits_a_stitch_plan_per_concrete_type() {
    init_logger();
    let planner = planner_for(&[
        (
            "a",
            r#"
            type Query { node(id: ID): Node }
            interface Node { id: ID }
            type User implements Node { id: ID name: String }
            type Post implements Node { id: ID title: String }
            "#,
        ),
        ("b", "type User { id: ID email: String }"),
    ]);

    let plan = plan(
        &planner,
        "query { node(id: \"1\") { ... on User { name email } } }",
    );

    let fetch = &plan.subschema_plans[0];
    let stitch = fetch.stitch_plans.get("node").expect("stitch plan on node");
    // Post satisfies Node, but nothing of the fragment applies to it.
    assert_eq!(stitch.plans_by_type.len(), 1);
    let supplemental = stitch.get("User").expect("an arm for User");
    assert_eq!(
        supplemental.subschema_plans[0].subschema,
        SubschemaName::new("b")
    );
    assert_eq!(
        render_field_nodes(&supplemental.subschema_plans[0].field_nodes),
        rendered_selection("{ email }")
    );
}

#[test]
fn union_members_resolve_their_own_arms() {
    init_logger();
    let planner = planner_for(&[
        (
            "a",
            r#"
            type Query { media: Media }
            union Media = Book | Movie
            type Book { title: String }
            type Movie { runtime: Int }
            "#,
        ),
        ("b", "type Book { reviews: Int } type Movie { reviews: Int }"),
    ]);

    let plan = plan(
        &planner,
        "query { media { ... on Book { title reviews } ... on Movie { reviews } } }",
    );

    let fetch = &plan.subschema_plans[0];
    let stitch = fetch.stitch_plans.get("media").expect("stitch plan on media");
    assert_eq!(stitch.plans_by_type.len(), 2);
    for arm in ["Book", "Movie"] {
        let supplemental = stitch.get(arm).expect("an arm per union member");
        assert_eq!(
            supplemental.subschema_plans[0].subschema,
            SubschemaName::new("b")
        );
    }
}

#[test]
fn leaf_fields_prefer_a_subschema_already_in_the_plan() {
    init_logger();
    let planner = planner_for(&[
        ("a", "type Query { x: Int shared: Int }"),
        ("b", "type Query { y: Int shared: Int }"),
    ]);

    // `shared` is resolvable by both; the fetch to `b` already exists, so no
    // second fetch is planned.
    let plan = plan(&planner, "query { y shared }");

    assert_eq!(plan.subschema_plans.len(), 1);
    let fetch = &plan.subschema_plans[0];
    assert_eq!(fetch.subschema, SubschemaName::new("b"));
    assert_eq!(
        render_field_nodes(&fetch.field_nodes),
        rendered_selection("{ y shared }")
    );
}

#[test]
fn first_candidate_wins_without_other_preference() {
    init_logger();
    let planner = planner_for(&[
        ("a", "type Query { shared: Int }"),
        ("b", "type Query { shared: Int }"),
    ]);

    let plan = plan(&planner, "query { shared }");

    assert_eq!(plan.subschema_plans.len(), 1);
    assert_eq!(plan.subschema_plans[0].subschema, SubschemaName::new("a"));
}

#[test]
fn unresolvable_fields_are_ignored() {
    init_logger();
    let planner = planner_for(&[("a", "type Query { a: Int }")]);

    let plan = plan(&planner, "query { a missing }");

    assert_eq!(plan.subschema_plans.len(), 1);
    assert_eq!(
        render_field_nodes(&plan.subschema_plans[0].field_nodes),
        rendered_selection("{ a }")
    );
}

#[test]
fn identical_operations_share_the_memoised_plan() {
    init_logger();
    let planner = planner_for(&[
        (
            "a",
            "type Query { user: User } type User { id: ID name: String }",
        ),
        ("b", "type User { id: ID email: String }"),
    ]);

    let first = plan(&planner, "query { user { name email } }");
    let second = plan(&planner, "query { user { name email } }");

    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[test]
fn abstract_type_with_no_applicable_runtime_types_yields_no_stitches() {
    init_logger();
    let planner = planner_for(&[
        (
            "a",
            r#"
            type Query { node: Node }
            interface Node { id: ID }
            "#,
        ),
    ]);

    let plan = plan(&planner, "query { node { id missing } }");

    let fetch = &plan.subschema_plans[0];
    assert!(fetch.stitch_plans.is_empty());
    assert!(plan.stitch_plans.is_empty());
}

#[test]
fn subscription_root_plans_against_the_subscription_type() {
    init_logger();
    let planner = planner_for(&[(
        "a",
        "type Query { q: Int } type Subscription { ticks: Int }",
    )]);

    let plan = plan(&planner, "subscription { ticks }");

    assert_eq!(plan.subschema_plans.len(), 1);
    assert_eq!(
        render_field_nodes(&plan.subschema_plans[0].field_nodes),
        rendered_selection("{ ticks }")
    );
}

#[test]
fn missing_root_type_is_an_error() {
    init_logger();
    let planner = planner_for(&[("a", "type Query { a: Int }")]);

    let mut document = crate::utils::parsing::parse_operation("mutation { doIt }");
    crate::normalize::prepare_document(&mut document, &std::collections::HashMap::new())
        .expect("prepare");
    let operation =
        crate::utils::operation::executable_operation(&document, None).expect("operation");
    let error = planner.plan_operation(operation).unwrap_err();

    insta::assert_snapshot!(
        error.to_string(),
        @"Schema is not configured to execute mutation operation."
    );
}

#[test]
fn plan_display_names_every_fetch_and_stitch() {
    init_logger();
    let planner = planner_for(&[
        (
            "a",
            "type Query { user: User } type User { id: ID name: String }",
        ),
        ("b", "type User { id: ID email: String }"),
    ]);

    let plan = plan(&planner, "query { user { name email } }");
    let rendered = format!("{}", plan);

    assert!(rendered.contains("Fetch(subschema: \"a\")"));
    assert!(rendered.contains("Stitch(key: \"user\")"));
    assert!(rendered.contains("On(type: \"User\")"));
    assert!(rendered.contains("Fetch(subschema: \"b\", from: \"a\")"));
}
