//! Property-based tests for the evaluate boundary
//!
//! Whatever the caller sends, the dispatcher answers with a well-formed
//! envelope: never a panic, and exactly one of `result` and `message`.

use proptest::prelude::*;
use serde_json::{json, Value};
use xform_core::{Dispatcher, EvaluateRequest, EvaluateResponse, Status, JOLT_ENGINE, JSONATA_ENGINE};

// Strategy functions for property testing

/// Strategy for request modes, including unknown ones
fn mode_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("jsonata".to_string())),
        Just(Some("jolt".to_string())),
        Just(Some("JOLT".to_string())),
        "[a-zA-Z]{0,8}".prop_map(Some),
    ]
}

/// Strategy for expression text built from JSONata and JSON punctuation
fn expression_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9 .\\[\\]{}()$:;,'\"*+<>=!?&~^%/-]{0,40}",
        any::<String>(),
    ]
}

/// Strategy for small JSON inputs
fn input_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-1000i64..1000).prop_map(Value::from),
        "[a-z]{0,6}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-c]", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn assert_well_formed(response: &EvaluateResponse) {
    match response.status() {
        Status::Success => {
            assert!(response.result().is_some());
            assert!(response.message().is_none());
            let engine = response.engine().unwrap();
            assert!(engine == JSONATA_ENGINE || engine == JOLT_ENGINE);
        }
        Status::Error => {
            assert!(response.result().is_none());
            assert!(response.engine().is_none());
            assert!(!response.message().unwrap().is_empty());
        }
    }
}

proptest! {
    /// Property: arbitrary expressions never panic and yield exactly one of result/message
    #[test]
    fn prop_evaluate_never_panics(
        expression in expression_strategy(),
        input in input_strategy(),
        mode in mode_strategy(),
    ) {
        let request = EvaluateRequest {
            expression: Some(expression),
            input: Some(input),
            mode,
        };
        let response = Dispatcher::new().evaluate(&request);
        assert_well_formed(&response);
    }

    /// Property: arbitrary request bodies never panic
    #[test]
    fn prop_evaluate_body_never_panics(body in prop::collection::vec(any::<u8>(), 0..64)) {
        let response = Dispatcher::new().evaluate_body(&body);
        assert_well_formed(&response);
    }

    /// Property: the engine always matches the mode on success
    #[test]
    fn prop_engine_follows_mode(mode in mode_strategy(), value in -1000i64..1000) {
        let request = EvaluateRequest {
            expression: Some("[]".to_string()),
            input: Some(json!({"v": value})),
            mode: mode.clone(),
        };
        let response = Dispatcher::new().evaluate(&request);
        prop_assert!(response.is_success());
        let expected = if mode.as_deref().is_some_and(|m| m.eq_ignore_ascii_case("jolt")) {
            JOLT_ENGINE
        } else {
            JSONATA_ENGINE
        };
        prop_assert_eq!(response.engine(), Some(expected));
    }

    /// Property: a field path returns the field's value
    #[test]
    fn prop_field_lookup(key in "[a-z]{1,8}", value in -1000i64..1000) {
        let request = EvaluateRequest::new(key.clone(), json!({ key.as_str(): value }));
        let response = Dispatcher::new().evaluate(&request);
        let keyword = matches!(key.as_str(), "and" | "or" | "in" | "true" | "false" | "null" | "function");
        if !keyword {
            prop_assert_eq!(response.result(), Some(&json!(value)));
        }
    }
}
