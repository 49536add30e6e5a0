//! Regression tracking through the node service and in-memory store

mod helpers;

use chrono::Duration;
use helpers::{checkout_doc, now, schema, schema_at, service, test_doc, Job};
use kci_model::core::{CheckoutErrorCode, ErrorCode, FixedClock, ModelError, RegressionCheck, ResultValue, StateValue, TypedNode};
use kci_model::{InMemoryNodeStore, NodeService, ObjectId, ServiceError};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn regression_is_stored_and_linked_to_the_failing_node() {
    let service = service();
    let job = Job::default();

    let pass = service
        .submit_node(&test_doc(&job, "pass", "2024-04-29T10:00:00Z"))
        .await
        .unwrap();
    let fail = service
        .submit_node(&test_doc(&job, "fail", "2024-04-30T10:00:00Z"))
        .await
        .unwrap();
    let (fail_id, pass_id) = (fail.id().unwrap(), pass.id().unwrap());

    let regression = service.create_regression(fail_id, pass_id).await.unwrap();
    let regression_id = regression.id.expect("stored regression has an id");
    assert_eq!(regression.data.fail_node, Some(fail_id));
    assert_eq!(regression.data.pass_node, Some(pass_id));
    assert_eq!(regression.state, StateValue::Done);
    assert!(regression.is_active());

    let TypedNode::Test(linked) = service.get_node(fail_id).await.unwrap() else {
        panic!("expected the failing test node");
    };
    assert_eq!(linked.data.regression, Some(regression_id));

    let found = service
        .find_nodes(Some("regression"), vec![("data.fail_node", json!(fail_id.to_hex()))])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), Some(regression_id));
}

#[tokio::test]
async fn unrelated_jobs_are_not_compared() {
    let service = service();
    let pass = service
        .submit_node(&test_doc(&Job::default(), "pass", "2024-04-29T10:00:00Z"))
        .await
        .unwrap();
    let arm = Job {
        arch: "arm64".to_string(),
        ..Job::default()
    };
    let fail = service
        .submit_node(&test_doc(&arm, "fail", "2024-04-30T10:00:00Z"))
        .await
        .unwrap();

    let err = service
        .create_regression(fail.id().unwrap(), pass.id().unwrap())
        .await
        .unwrap_err();
    let ServiceError::Model(ModelError::RegressionConsistency(err)) = err else {
        panic!("expected a consistency error, got {:?}", err);
    };
    assert_eq!(
        err.check,
        RegressionCheck::FieldMismatch {
            field: "data.arch",
            fail_value: "\"arm64\"".to_string(),
            pass_value: "\"x86_64\"".to_string(),
        }
    );
}

#[test]
fn later_pass_resolves_the_regression() {
    let schema = schema();
    let job = Job::default();
    let fail = schema.parse_node(&test_doc(&job, "fail", "2024-04-30T10:00:00Z")).unwrap();
    let pass = schema.parse_node(&test_doc(&job, "pass", "2024-04-29T10:00:00Z")).unwrap();

    let mut regression = schema.create_regression(&fail, &pass).unwrap();
    let clock = FixedClock(now() + Duration::hours(2));
    regression.record_run(ObjectId::generate(), ResultValue::Fail, &clock);
    assert!(regression.is_active());
    regression.record_run(ObjectId::generate(), ResultValue::Pass, &clock);
    assert!(!regression.is_active());
    assert_eq!(regression.result, Some(ResultValue::Pass));
}

#[tokio::test]
async fn timed_out_nodes_are_forced_to_done() {
    let store = Arc::new(InMemoryNodeStore::new());
    let earlier = NodeService::new(store.clone(), schema_at(now() - Duration::hours(7)));

    let stale = earlier.submit_node(&checkout_doc()).await.unwrap();
    earlier
        .submit_node(&json!({
            "kind": "kbuild", "name": "kbuild", "path": ["checkout", "kbuild"],
            "timeout": "2024-05-02T00:00:00Z"
        }))
        .await
        .unwrap();
    earlier
        .submit_node(&json!({"kind": "test", "name": "t", "path": ["t"], "state": "done", "result": "pass"}))
        .await
        .unwrap();

    let later = NodeService::new(store, schema_at(now()));
    let stale_id = stale.id().unwrap();
    assert_eq!(later.expire_timed_out().await.unwrap(), vec![stale_id]);

    let TypedNode::Checkout(checkout) = later.get_node(stale_id).await.unwrap() else {
        panic!("expected a checkout");
    };
    assert_eq!(checkout.state, StateValue::Done);
    assert_eq!(checkout.result, Some(ResultValue::Incomplete));
    assert_eq!(checkout.data.error_code, Some(CheckoutErrorCode::NodeTimeout));
    assert_eq!(checkout.updated, now());

    assert!(later.expire_timed_out().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_follows_the_state_machine() {
    let service = service();
    let node = service.submit_node(&checkout_doc()).await.unwrap();

    let mut doc = node.to_document(true).unwrap();
    for state in ["available", "closing", "done"] {
        doc["state"] = json!(state);
        let updated = service.submit_update(&doc).await.unwrap();
        doc = updated.to_document(true).unwrap();
    }

    doc["state"] = json!("available");
    let err = service.submit_update(&doc).await.unwrap_err();
    assert!(matches!(err, ServiceError::TransitionRejected { .. }));

    doc["state"] = json!("done");
    assert!(service.submit_update(&doc).await.is_ok());
}

proptest! {
    #[test]
    fn matching_pair_always_yields_a_regression(
        arch in "[a-z0-9_]{2,10}",
        compiler in "(gcc|clang)-[0-9]{2}",
        platform in "[a-z0-9-]{3,16}",
        gap_minutes in 1i64..100_000,
    ) {
        let schema = schema();
        let job = Job { arch, compiler, platform };
        let fail_created = now() - Duration::days(90);
        let pass_created = fail_created - Duration::minutes(gap_minutes);

        let mut fail_doc = test_doc(&job, "fail", &fail_created.to_rfc3339());
        fail_doc["id"] = json!("65a1f2c3d4e5f6a7b8c9d0e2");
        let mut pass_doc = test_doc(&job, "pass", &pass_created.to_rfc3339());
        pass_doc["id"] = json!("65a1f2c3d4e5f6a7b8c9d0e1");

        let fail = schema.parse_node(&fail_doc).unwrap();
        let pass = schema.parse_node(&pass_doc).unwrap();

        let regression = schema.create_regression(&fail, &pass).unwrap();
        prop_assert_eq!(regression.data.fail_node, fail.id());
        prop_assert_eq!(regression.data.pass_node, pass.id());
        prop_assert_eq!(regression.data.arch.as_deref(), Some(job.arch.as_str()));

        // Swapping creation times breaks the temporal order
        let fail_first = schema.parse_node(&test_doc(&job, "fail", &pass_created.to_rfc3339())).unwrap();
        let pass_later = schema.parse_node(&test_doc(&job, "pass", &fail_created.to_rfc3339())).unwrap();
        let err = schema.create_regression(&fail_first, &pass_later).unwrap_err();
        let is_temporal = matches!(err.check, RegressionCheck::TemporalOrder { .. });
        prop_assert!(is_temporal);
    }
}

#[test]
fn timeout_marks_error_code() {
    let schema = schema();
    let mut node = schema.parse_node(&test_doc(&Job::default(), "fail", "2024-04-30T10:00:00Z")).unwrap();
    node.mark_timed_out(now());
    let TypedNode::Test(test) = node else {
        panic!("expected a test");
    };
    assert_eq!(test.data.error_code, Some(ErrorCode::NodeTimeout));
    assert_eq!(test.result, Some(ResultValue::Fail));
}
