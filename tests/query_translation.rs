//! Translation of flat filter parameters into typed store filters

mod helpers;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use helpers::schema;
use kci_model::core::timestamp::{format_timestamp, parse_timestamp};
use kci_model::query::{Condition, FilterValue};
use kci_model::ObjectId;
use proptest::prelude::*;
use serde_json::{json, Value};

const FIELDS: [&str; 6] = [
    "state",
    "name",
    "created",
    "parent",
    "data.arch",
    "data.kernel_revision.version.version",
];

const OPS: [&str; 5] = ["ne", "lt", "gt", "lte", "gte"];

fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800, 0u32..1_000_000).prop_map(|(secs, micros)| {
        Utc.timestamp_opt(secs, micros * 1000).single().unwrap_or_default()
    })
}

fn field_value(field: &'static str) -> BoxedStrategy<String> {
    match field {
        "created" => timestamp().prop_map(|ts| ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()).boxed(),
        "parent" => "[0-9a-f]{24}".boxed(),
        "data.kernel_revision.version.version" => (0i64..100).prop_map(|n| n.to_string()).boxed(),
        _ => "[a-z]{1,8}".boxed(),
    }
}

/// Per field: nothing, a plain value, or a set of operator filters
fn field_params(field: &'static str) -> BoxedStrategy<Vec<(String, String)>> {
    prop_oneof![
        Just(Vec::new()),
        field_value(field).prop_map(move |v| vec![(field.to_string(), v)]),
        prop::sample::subsequence(OPS.to_vec(), 1..=3).prop_flat_map(move |ops| {
            let n = ops.len();
            prop::collection::vec(field_value(field), n).prop_map(move |values| {
                ops.iter()
                    .zip(values)
                    .map(|(op, v)| (format!("{}__{}", field, op), v))
                    .collect::<Vec<_>>()
            })
        }),
    ]
    .boxed()
}

fn params() -> impl Strategy<Value = Vec<(String, Value)>> {
    FIELDS
        .iter()
        .map(|&field| field_params(field))
        .collect::<Vec<_>>()
        .prop_map(|groups| {
            groups
                .into_iter()
                .flatten()
                .map(|(k, v)| (k, Value::String(v)))
                .collect()
        })
}

#[test]
fn state_and_created_scenario() {
    let filter = schema()
        .translate(
            None,
            vec![
                ("state", json!("done")),
                ("created__gte", json!("2024-01-01T00:00:00")),
            ],
        )
        .unwrap();

    assert_eq!(
        serde_json::to_value(&filter).unwrap(),
        json!({"state": "done", "created": {"gte": "2024-01-01T00:00:00Z"}})
    );
    let Some(Condition::Ops(ops)) = filter.get("created") else {
        panic!("expected operator map for created");
    };
    assert_eq!(
        ops["gte"],
        FilterValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    );
}

#[test]
fn regression_node_references_are_identifiers() {
    let id = "65a1f2c3d4e5f6a7b8c9d0e1";
    let filter = schema()
        .translate(
            Some("regression"),
            vec![
                ("data.fail_node", json!(id)),
                ("data.pass_node.created__lt", json!("2024-04-01")),
                ("data.failed_kernel_revision.version.patchlevel", json!("9")),
            ],
        )
        .unwrap();

    assert_eq!(
        filter.get("data.fail_node"),
        Some(&Condition::Eq(FilterValue::ObjectId(id.parse::<ObjectId>().unwrap())))
    );
    assert!(matches!(
        filter.get("data.pass_node.created"),
        Some(Condition::Ops(ops)) if matches!(ops["lt"], FilterValue::Timestamp(_))
    ));
    assert_eq!(
        filter.get("data.failed_kernel_revision.version.patchlevel"),
        Some(&Condition::Eq(FilterValue::Integer(9)))
    );
}

proptest! {
    #[test]
    fn translation_is_idempotent(params in params()) {
        let schema = schema();
        let once = schema.translate(None, params).unwrap();
        let twice = schema.translate(None, once.to_params()).unwrap();
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn operators_on_one_field_share_a_mapping(
        ops in prop::sample::subsequence(OPS.to_vec(), 2..=5),
        value in "[a-z]{1,8}",
    ) {
        let params: Vec<_> = ops
            .iter()
            .map(|op| (format!("name__{}", op), Value::String(value.clone())))
            .collect();
        let filter = schema().translate(None, params).unwrap();

        prop_assert_eq!(filter.len(), 1);
        match filter.get("name") {
            Some(Condition::Ops(mapping)) => {
                prop_assert_eq!(mapping.len(), ops.len());
                for op in &ops {
                    prop_assert!(mapping.contains_key(*op));
                }
            }
            other => prop_assert!(false, "expected operator map, got {:?}", other),
        }
    }

    #[test]
    fn timestamps_round_trip_to_the_same_instant(
        ts in timestamp(),
        offset_hours in -12i32..=14,
    ) {
        let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap();
        let rendered = ts.with_timezone(&offset).to_rfc3339();
        prop_assert_eq!(parse_timestamp(&rendered), Some(ts));
        prop_assert_eq!(parse_timestamp(&format_timestamp(&ts)), Some(ts));

        let filter = schema().translate(None, vec![("updated", Value::String(rendered))]).unwrap();
        prop_assert_eq!(filter.get("updated"), Some(&Condition::Eq(FilterValue::Timestamp(ts))));
    }
}
