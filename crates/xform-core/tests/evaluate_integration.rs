//! End-to-end tests for the evaluate operation
//!
//! Requests go through the dispatcher exactly as the HTTP endpoint sends
//! them, so these cover envelope shape as well as engine behaviour.

mod test_support;

use serde_json::{json, Value};
use test_support::*;
use xform_core::{Dispatcher, EvaluateRequest, JOLT_ENGINE, JSONATA_ENGINE};

#[test]
fn test_jsonata_field_path() {
    let response = evaluate_json(json!({"expression": "a.b", "input": {"a": {"b": 5}}}));
    assert_eq!(assert_success(&response, JSONATA_ENGINE), &json!(5));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"status": "success", "result": 5, "engine": "JSONata4Java-2.6.0"})
    );
}

#[test]
fn test_explicit_jsonata_mode_in_capitals() {
    let response = evaluate_json(json!({
        "expression": "a.b",
        "input": {"a": {"b": 5}},
        "mode": "JSONATA"
    }));
    assert_eq!(assert_success(&response, JSONATA_ENGINE), &json!(5));
}

#[test]
fn test_jolt_shift_chain() {
    let response = evaluate_json(json!({
        "expression": "[{\"operation\":\"shift\",\"spec\":{\"a\":\"b\"}}]",
        "input": {"a": 5},
        "mode": "jolt"
    }));
    assert_eq!(assert_success(&response, JOLT_ENGINE), &json!({"b": 5}));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"status": "success", "result": {"b": 5}, "engine": "Jolt-0.1.8"})
    );
}

#[test]
fn test_invalid_jsonata_syntax() {
    let response = evaluate_json(json!({"expression": "a..", "input": {}}));
    assert_error(&response);
    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(body["status"], "error");
    assert!(body.get("result").is_none());
}

#[test]
fn test_invalid_jolt_spec_json() {
    let response = evaluate_json(json!({
        "expression": "{not valid json",
        "input": {},
        "mode": "jolt"
    }));
    assert_error(&response);
}

#[test]
fn test_missing_expression() {
    let response = evaluate_json(json!({"input": {"a": 1}}));
    let message = assert_error(&response);
    assert!(message.contains("expression"));
}

#[test]
fn test_missing_input() {
    let response = evaluate_json(json!({"expression": "a"}));
    let message = assert_error(&response);
    assert!(message.contains("input"));
}

#[test]
fn test_mode_matching_ignores_case() {
    let chain = json!([{"operation": "shift", "spec": {"a": "b"}}]).to_string();
    for mode in ["jolt", "Jolt", "JOLT", "jOlT"] {
        let response = Dispatcher::new()
            .evaluate(&EvaluateRequest::new(chain.clone(), json!({"a": 1})).with_mode(mode));
        assert_eq!(assert_success(&response, JOLT_ENGINE), &json!({"b": 1}), "mode {}", mode);
    }
}

#[test]
fn test_unknown_mode_falls_back_to_jsonata() {
    for mode in ["xslt", "", "jolt "] {
        let response = Dispatcher::new()
            .evaluate(&EvaluateRequest::new("a", json!({"a": 1})).with_mode(mode));
        assert_eq!(assert_success(&response, JSONATA_ENGINE), &json!(1), "mode {:?}", mode);
    }
}

#[test]
fn test_null_input_is_accepted_by_both_engines() {
    let jsonata = evaluate_json(json!({"expression": "a.b", "input": null}));
    assert_eq!(assert_success(&jsonata, JSONATA_ENGINE), &Value::Null);

    let literal = evaluate_json(json!({"expression": "'constant'", "input": null}));
    assert_eq!(assert_success(&literal, JSONATA_ENGINE), &json!("constant"));

    let jolt = Dispatcher::new().evaluate(&jolt_request(
        json!([{"operation": "shift", "spec": {"a": "b"}}]),
        Value::Null,
    ));
    assert_eq!(assert_success(&jolt, JOLT_ENGINE), &Value::Null);
}

#[test]
fn test_jsonata_order_queries() {
    let dispatcher = Dispatcher::new();

    let ids = dispatcher.evaluate(&jsonata_request("Account.Order.OrderID", order_document()));
    assert_eq!(assert_success(&ids, JSONATA_ENGINE), &json!(["order103", "order104"]));

    let first = dispatcher.evaluate(&jsonata_request("Account.Order[0].OrderID", order_document()));
    assert_eq!(assert_success(&first, JSONATA_ENGINE), &json!("order103"));

    let expensive = dispatcher.evaluate(&jsonata_request(
        "Account.Order.Product[Price > 100].`Product Name`",
        order_document(),
    ));
    assert_eq!(assert_success(&expensive, JSONATA_ENGINE), &json!("Cloak"));

    let count = dispatcher.evaluate(&jsonata_request("$count(Account.Order.Product)", order_document()));
    assert_eq!(assert_success(&count, JSONATA_ENGINE), &json!(4));
}

#[test]
fn test_jsonata_order_total() {
    let response = Dispatcher::new().evaluate(&jsonata_request(
        "$sum(Account.Order.Product.(Price * Quantity))",
        order_document(),
    ));
    let total = assert_success(&response, JSONATA_ENGINE).as_f64().unwrap();
    assert!((total - 336.36).abs() < 1e-9, "total was {}", total);
}

#[test]
fn test_jsonata_object_construction() {
    let response = Dispatcher::new().evaluate(&jsonata_request(
        "Account.Order.{ 'id': OrderID, 'items': $count(Product) }",
        order_document(),
    ));
    assert_eq!(
        assert_success(&response, JSONATA_ENGINE),
        &json!([{"id": "order103", "items": 2}, {"id": "order104", "items": 2}])
    );
}

#[test]
fn test_jsonata_string_functions() {
    let response = Dispatcher::new().evaluate(&jsonata_request(
        "$join(Account.Order.OrderID ~> $map(function($v) { $uppercase($v) }), ', ')",
        order_document(),
    ));
    assert_eq!(assert_success(&response, JSONATA_ENGINE), &json!("ORDER103, ORDER104"));
}

#[test]
fn test_jsonata_evaluation_error() {
    let response = Dispatcher::new().evaluate(&jsonata_request("Account.`Account Name` + 1", order_document()));
    let message = assert_error(&response);
    assert!(message.contains("T2001"));
}

#[test]
fn test_jolt_wildcards_and_references() {
    let chain = json!([{
        "operation": "shift",
        "spec": {
            "rating": {
                "primary": {"value": "Rating"},
                "*": {"value": "SecondaryRatings.&1.Value"}
            }
        }
    }]);
    let input = json!({"rating": {"primary": {"value": 3}, "quality": {"value": 4}}});
    let response = Dispatcher::new().evaluate(&jolt_request(chain, input));
    assert_eq!(
        assert_success(&response, JOLT_ENGINE),
        &json!({"Rating": 3, "SecondaryRatings": {"quality": {"Value": 4}}})
    );
}

#[test]
fn test_jolt_full_chain() {
    let chain = json!([
        {"operation": "shift", "spec": {"items": {"*": {"id": "ids[]", "name": "names[]"}}}},
        {"operation": "default", "spec": {"source": "catalog"}},
        {"operation": "remove", "spec": {"names": ""}},
        {"operation": "sort"}
    ]);
    let input = json!({"items": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]});
    let response = Dispatcher::new().evaluate(&jolt_request(chain, input));
    let result = assert_success(&response, JOLT_ENGINE);
    assert_eq!(result, &json!({"ids": [1, 2], "source": "catalog"}));
    let keys: Vec<&String> = result.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["ids", "source"]);
}

#[test]
fn test_jolt_unknown_operation() {
    let response = Dispatcher::new().evaluate(&jolt_request(
        json!([{"operation": "explode", "spec": {}}]),
        json!({}),
    ));
    let message = assert_error(&response);
    assert!(message.contains("explode"));
}

#[test]
fn test_jolt_lookup_names_output_key() {
    let response = Dispatcher::new().evaluate(&jolt_request(
        json!([{"operation": "shift", "spec": {"a": "@(1,b)"}}]),
        json!({"a": 1, "b": 7}),
    ));
    assert_eq!(assert_success(&response, JOLT_ENGINE), &json!({"7": 1}));
}

#[test]
fn test_jolt_match_count_index() {
    let response = Dispatcher::new().evaluate(&jolt_request(
        json!([{"operation": "shift", "spec": {"a": {"*": {"v": "r[#2].v"}}}}]),
        json!({"a": [{"v": 1}, {"v": 2}]}),
    ));
    assert_eq!(
        assert_success(&response, JOLT_ENGINE),
        &json!({"r": [{"v": 1}, {"v": 2}]})
    );
}

#[test]
fn test_jolt_lookup_on_the_left_hand_side() {
    let chain = json!([{
        "operation": "shift",
        "spec": {"items": {"*": {
            "@(2,currency)": "prices[&1].currency",
            "price": "prices[&1].amount"
        }}}
    }]);
    let input = json!({"currency": "EUR", "items": [{"price": 1}, {"price": 2}]});
    let response = Dispatcher::new().evaluate(&jolt_request(chain, input));
    assert_eq!(
        assert_success(&response, JOLT_ENGINE),
        &json!({"prices": [
            {"currency": "EUR", "amount": 1},
            {"currency": "EUR", "amount": 2}
        ]})
    );
}

#[test]
fn test_jolt_shift_then_modify() {
    let chain = json!([
        {"operation": "shift", "spec": {"user": {"first": "first", "last": "last"}}},
        {"operation": "modify-overwrite-beta", "spec": {
            "full": "=concat(@(1,first), ' ', @(1,last))",
            "first": "=toUpper"
        }},
        {"operation": "modify-default-beta", "spec": {"last": "unused", "role": "guest"}}
    ]);
    let input = json!({"user": {"first": "Ada", "last": "Lovelace"}});
    let response = Dispatcher::new().evaluate(&jolt_request(chain, input));
    assert_eq!(
        assert_success(&response, JOLT_ENGINE),
        &json!({"first": "ADA", "last": "Lovelace", "full": "Ada Lovelace", "role": "guest"})
    );
}

#[test]
fn test_jolt_uninterpretable_templates_are_errors() {
    for target in ["x[foo]", "out.*", "out.@(1,b"] {
        let response = Dispatcher::new().evaluate(&jolt_request(
            json!([{"operation": "shift", "spec": {"a": target}}]),
            json!({"a": 1, "b": 2}),
        ));
        let message = assert_error(&response);
        assert!(message.contains("Invalid Jolt spec"), "{} gave {}", target, message);
    }
}

#[test]
fn test_jsonata_bindings_and_transform() {
    let response = Dispatcher::new().evaluate(&jsonata_request(
        "Account.Order#$i.{'n': $i, 'id': OrderID}",
        order_document(),
    ));
    assert_eq!(
        assert_success(&response, JSONATA_ENGINE),
        &json!([{"n": 0, "id": "order103"}, {"n": 1, "id": "order104"}])
    );

    let response = Dispatcher::new().evaluate(&jsonata_request(
        "$ ~> |Account|{'Account Name': 'Serenity'}, 'Order'|",
        order_document(),
    ));
    assert_eq!(
        assert_success(&response, JSONATA_ENGINE),
        &json!({"Account": {"Account Name": "Serenity"}})
    );
}

#[test]
fn test_success_and_error_are_exclusive() {
    let bodies = [
        json!({"expression": "a", "input": {"a": 1}}),
        json!({"expression": "(", "input": {}}),
        json!({"expression": "[]", "input": {}, "mode": "jolt"}),
        json!({"expression": "[1]", "input": {}, "mode": "jolt"}),
        json!({"expression": 7, "input": {}}),
        json!([1, 2, 3]),
    ];
    for body in bodies {
        let response = evaluate_json(body.clone());
        assert_ne!(
            response.result().is_some(),
            response.message().is_some(),
            "body {}",
            body
        );
    }
}
