use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;

use crate::composer::ComposedResponse;
use crate::executors::common::{
    BoxError, SubschemaExecutionRequest, SubschemaSubscriber, SubscriptionSource,
};
use crate::response::ExecutionResult;
use crate::tests::testkit::{
    executor_map, first_error_message, init_logger, planner_for, run, run_response,
    RecordingExecutor,
};
use stitch_planner::superschema::SubschemaName;

struct TickSubscriber {
    events: Vec<ExecutionResult>,
}

#[async_trait]
impl SubschemaSubscriber for TickSubscriber {
    async fn subscribe(
        &self,
        _request: SubschemaExecutionRequest,
    ) -> Result<SubscriptionSource, BoxError> {
        Ok(SubscriptionSource::Stream(
            futures::stream::iter(self.events.clone()).boxed(),
        ))
    }
}

#[test]
fn subscriptions_route_to_the_planned_subschemas_subscriber() {
    init_logger();
    let planner = planner_for(&[(
        "a",
        "type Query { q: Int } type Subscription { ticks: Int }",
    )]);
    let a = RecordingExecutor::returning(json!({ "q": 1 }));
    let mut map = executor_map(planner.superschema(), &[("a", a)]);
    map.insert_subscriber(
        SubschemaName::new("a"),
        std::sync::Arc::new(TickSubscriber {
            events: vec![
                ExecutionResult::new(Some(json!({ "ticks": 1 })), None, None),
                ExecutionResult::new(Some(json!({ "ticks": 2 })), None, None),
            ],
        }),
    );

    let response = run_response(&planner, &map, "subscription { ticks }", None, None);

    let ComposedResponse::Subscription(events) = response else {
        panic!("expected a subscription response");
    };
    let events: Vec<ExecutionResult> = tokio_test::block_on(events.collect());
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].data, Some(json!({ "ticks": 1 })));
    assert_eq!(events[1].data, Some(json!({ "ticks": 2 })));
}

#[test]
fn a_candidate_without_a_subscriber_is_an_error() {
    init_logger();
    let planner = planner_for(&[(
        "a",
        "type Query { q: Int } type Subscription { ticks: Int }",
    )]);
    let a = RecordingExecutor::returning(json!({ "q": 1 }));
    let map = executor_map(planner.superschema(), &[("a", a)]);

    let result = run(&planner, &map, "subscription { ticks }");

    assert_eq!(
        first_error_message(&result),
        "Subschema is not configured to execute subscription operation."
    );
}

#[test]
fn a_schema_without_a_subscription_root_is_an_error() {
    init_logger();
    let planner = planner_for(&[("a", "type Query { q: Int }")]);
    let a = RecordingExecutor::returning(json!({ "q": 1 }));
    let map = executor_map(planner.superschema(), &[("a", a)]);

    let result = run(&planner, &map, "subscription { ticks }");

    assert_eq!(
        first_error_message(&result),
        "Schema is not configured to execute subscription operation."
    );
}
