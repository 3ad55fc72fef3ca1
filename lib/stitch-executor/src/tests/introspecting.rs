use serde_json::json;

use crate::tests::testkit::{executor_map, init_logger, planner_for, run, RecordingExecutor};

#[test]
fn schema_introspection_answers_from_the_merged_schema() {
    init_logger();
    let planner = planner_for(&[
        ("a", "type Query { a: Int }"),
        ("b", "type Query { b: Int }"),
    ]);
    let a = RecordingExecutor::returning(json!({ "a": 1 }));
    let b = RecordingExecutor::returning(json!({ "b": 2 }));
    let map = executor_map(planner.superschema(), &[("a", a.clone()), ("b", b.clone())]);

    let result = run(&planner, &map, "query { __schema { queryType { name } } }");

    assert_eq!(
        result.data,
        Some(json!({ "__schema": { "queryType": { "name": "Query" } } }))
    );
    assert_eq!(a.call_count(), 0);
    assert_eq!(b.call_count(), 0);
}

#[test]
fn type_lookup_projects_the_merged_fields() {
    init_logger();
    let planner = planner_for(&[
        (
            "a",
            "type Query { user: User } type User { id: ID name: String }",
        ),
        ("b", "type User { id: ID email: String }"),
    ]);
    let map = executor_map(planner.superschema(), &[]);

    let result = run(
        &planner,
        &map,
        "query { __type(name: \"User\") { name kind fields { name } } }",
    );

    assert_eq!(
        result.data,
        Some(json!({
            "__type": {
                "name": "User",
                "kind": "OBJECT",
                "fields": [
                    { "name": "id" },
                    { "name": "name" },
                    { "name": "email" },
                ],
            }
        }))
    );
}

#[test]
fn unknown_type_lookup_is_null() {
    init_logger();
    let planner = planner_for(&[("a", "type Query { a: Int }")]);
    let map = executor_map(planner.superschema(), &[]);

    let result = run(&planner, &map, "query { __type(name: \"Nope\") { name } }");

    assert_eq!(result.data, Some(json!({ "__type": null })));
}

#[test]
fn introspection_and_data_fields_compose_in_one_operation() {
    init_logger();
    let planner = planner_for(&[("a", "type Query { a: Int }")]);
    let a = RecordingExecutor::returning(json!({ "a": 7 }));
    let map = executor_map(planner.superschema(), &[("a", a.clone())]);

    let result = run(&planner, &map, "query { a __schema { queryType { name } } }");

    assert_eq!(
        result.data,
        Some(json!({
            "a": 7,
            "__schema": { "queryType": { "name": "Query" } },
        }))
    );
    assert_eq!(a.call_count(), 1);
}

#[test]
fn aliases_are_honored_in_introspection_projections() {
    init_logger();
    let planner = planner_for(&[("a", "type Query { a: Int }")]);
    let map = executor_map(planner.superschema(), &[]);

    let result = run(
        &planner,
        &map,
        "query { root: __schema { q: queryType { n: name } } }",
    );

    assert_eq!(
        result.data,
        Some(json!({ "root": { "q": { "n": "Query" } } }))
    );
}
