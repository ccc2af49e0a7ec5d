//! Shared test support utilities for integration tests

#![allow(dead_code)]

use serde_json::{json, Value};
use xform_core::{Dispatcher, EvaluateRequest, EvaluateResponse};

/// Create a JSONata request with no explicit mode
pub fn jsonata_request(expression: &str, input: Value) -> EvaluateRequest {
    EvaluateRequest::new(expression, input)
}

/// Create a Jolt request from a chain given as JSON
pub fn jolt_request(chain: Value, input: Value) -> EvaluateRequest {
    EvaluateRequest::new(chain.to_string(), input).with_mode("jolt")
}

/// Create the order document used across integration tests
pub fn order_document() -> Value {
    json!({
        "Account": {
            "Account Name": "Firefly",
            "Order": [
                {
                    "OrderID": "order103",
                    "Product": [
                        {"Product Name": "Bowler Hat", "SKU": "0406654608", "Price": 34.45, "Quantity": 2},
                        {"Product Name": "Trilby hat", "SKU": "0406634348", "Price": 21.67, "Quantity": 1}
                    ]
                },
                {
                    "OrderID": "order104",
                    "Product": [
                        {"Product Name": "Bowler Hat", "SKU": "040657863", "Price": 34.45, "Quantity": 4},
                        {"Product Name": "Cloak", "SKU": "0406654603", "Price": 107.99, "Quantity": 1}
                    ]
                }
            ]
        }
    })
}

/// Evaluate a raw JSON body the way the HTTP endpoint does
pub fn evaluate_json(body: Value) -> EvaluateResponse {
    Dispatcher::new().evaluate_body(body.to_string().as_bytes())
}

/// Assert a success envelope and return its result
pub fn assert_success<'a>(response: &'a EvaluateResponse, engine: &str) -> &'a Value {
    assert!(
        response.is_success(),
        "expected success, got error: {:?}",
        response.message()
    );
    assert_eq!(response.engine(), Some(engine));
    assert!(response.message().is_none());
    response.result().expect("success envelope carries a result")
}

/// Assert an error envelope and return its message
pub fn assert_error(response: &EvaluateResponse) -> &str {
    assert!(!response.is_success(), "expected error, got {:?}", response.result());
    assert!(response.result().is_none());
    assert!(response.engine().is_none());
    let message = response.message().expect("error envelope carries a message");
    assert!(!message.is_empty());
    message
}
