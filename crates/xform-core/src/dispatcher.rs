//! Request dispatch and response normalization
//!
//! The dispatcher picks an engine from the request mode, runs it, and
//! folds every outcome into an [`EvaluateResponse`]. It holds no mutable
//! state, so one instance can be shared across all requests.
//!
//! Engines recurse over expressions and documents. Each invocation runs on
//! its own thread with a stack of [`DEFAULT_STACK_SIZE`] bytes, large enough
//! for the JSONata depth limit, so the caller's stack size does not matter.

use crate::envelope::{EngineKind, EvaluateRequest, EvaluateResponse, Mode};
use crate::error::{Error, Result};
use crate::jolt::Chain;
use crate::jsonata::{Jsonata, DEFAULT_MAX_DEPTH};
use serde_json::Value;
use std::thread;
use tracing::{debug, info_span, warn, Span};
use uuid::Uuid;

/// Stack size of the thread an engine runs on
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024 * 1024;

/// A successful engine run
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub result: Value,
    pub engine: EngineKind,
}

/// Routes evaluate requests to the JSONata or Jolt engine
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    max_depth: usize,
    stack_size: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    /// Override the JSONata evaluation depth limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Override the stack size of the evaluation thread
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Engines this dispatcher can run
    pub fn engines(&self) -> &'static [EngineKind] {
        &EngineKind::ALL
    }

    /// Run the engine selected by the request on a dedicated thread
    pub fn invoke(&self, request: &EvaluateRequest) -> Result<Evaluation> {
        let span = Span::current();
        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name("xform-eval".to_string())
                .stack_size(self.stack_size)
                .spawn_scoped(scope, || span.in_scope(|| self.run(request)))
                .map_err(|err| {
                    Error::internal(format!("failed to start evaluation thread: {}", err))
                })?;
            worker
                .join()
                .map_err(|_| Error::internal("evaluation thread panicked"))?
        })
    }

    fn run(&self, request: &EvaluateRequest) -> Result<Evaluation> {
        let expression = request
            .expression
            .as_deref()
            .ok_or_else(|| Error::request("expression", "expression is required"))?;
        let input = request
            .input
            .as_ref()
            .ok_or_else(|| Error::request("input", "input is required"))?;

        match request.mode() {
            Mode::Jolt => {
                let chain: Chain = expression.parse()?;
                let result = chain.apply(input.clone())?;
                Ok(Evaluation {
                    result,
                    engine: EngineKind::Jolt,
                })
            }
            Mode::Jsonata => {
                let compiled = Jsonata::compile(expression)?.with_max_depth(self.max_depth);
                let result = compiled.evaluate(input)?;
                Ok(Evaluation {
                    result,
                    engine: EngineKind::Jsonata,
                })
            }
        }
    }

    /// Evaluate a request; never fails, errors become error envelopes
    pub fn evaluate(&self, request: &EvaluateRequest) -> EvaluateResponse {
        let request_id = Uuid::new_v4();
        let mode = request.mode();
        let span = info_span!("evaluate", %request_id, %mode);
        let _guard = span.enter();

        match self.invoke(request) {
            Ok(evaluation) => {
                debug!(engine = evaluation.engine.identifier(), "evaluation succeeded");
                EvaluateResponse::success(evaluation.result, evaluation.engine.identifier())
            }
            Err(err) => {
                warn!(error = %err, kind = err.kind(), "evaluation failed");
                EvaluateResponse::error(err.to_string())
            }
        }
    }

    /// Decode a raw request body and evaluate it
    pub fn evaluate_body(&self, body: &[u8]) -> EvaluateResponse {
        match serde_json::from_slice::<EvaluateRequest>(body) {
            Ok(request) => self.evaluate(&request),
            Err(err) => {
                let err = Error::from(err);
                warn!(error = %err, kind = err.kind(), "rejected malformed request body");
                EvaluateResponse::error(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jsonata_path() {
        let response = Dispatcher::new().evaluate(&EvaluateRequest::new("a.b", json!({"a": {"b": 5}})));
        assert!(response.is_success());
        assert_eq!(response.result(), Some(&json!(5)));
        assert_eq!(response.engine(), Some("JSONata4Java-2.6.0"));
        assert!(response.message().is_none());
    }

    #[test]
    fn test_jolt_path() {
        let request = EvaluateRequest::new(
            r#"[{"operation":"shift","spec":{"a":"b"}}]"#,
            json!({"a": 5}),
        )
        .with_mode("JOLT");
        let evaluation = Dispatcher::new().invoke(&request).unwrap();
        assert_eq!(evaluation.engine, EngineKind::Jolt);
        assert_eq!(evaluation.result, json!({"b": 5}));
    }

    #[test]
    fn test_missing_fields_are_request_errors() {
        let dispatcher = Dispatcher::new();
        let no_expression = EvaluateRequest {
            input: Some(json!({})),
            ..Default::default()
        };
        assert!(matches!(
            dispatcher.invoke(&no_expression),
            Err(Error::Request { field: Some(ref f), .. }) if f == "expression"
        ));

        let no_input = EvaluateRequest {
            expression: Some("a".into()),
            ..Default::default()
        };
        assert!(matches!(dispatcher.invoke(&no_input), Err(Error::Request { .. })));
    }

    #[test]
    fn test_empty_expression_is_rejected_by_the_engines() {
        let dispatcher = Dispatcher::new();
        let jsonata = dispatcher.invoke(&EvaluateRequest::new("", json!({})));
        assert!(matches!(jsonata, Err(Error::Jsonata(_))));
        let jolt = dispatcher.invoke(&EvaluateRequest::new("", json!({})).with_mode("jolt"));
        assert!(matches!(jolt, Err(Error::Jolt(_))));
    }

    #[test]
    fn test_malformed_body() {
        let response = Dispatcher::new().evaluate_body(b"{not json");
        assert!(!response.is_success());
        assert!(response.message().unwrap().starts_with("JSON error"));

        let wrong_type = Dispatcher::new().evaluate_body(br#"{"expression": 5, "input": {}}"#);
        assert!(!wrong_type.is_success());
    }

    #[test]
    fn test_depth_limit_is_configurable() {
        let response = Dispatcher::new()
            .with_max_depth(2)
            .evaluate(&EvaluateRequest::new("[[[1]]]", Value::Null));
        assert!(response.message().unwrap().contains("U1001"));
    }

    #[test]
    fn test_deep_recursion_on_a_small_caller_stack() {
        let expressions = vec![
            "($f := function($n){$n = 0 ? 0 : 1 + $f($n - 1)}; $f(1000))".to_string(),
            format!("{}1", "1+".repeat(20000)),
        ];
        let messages = thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || {
                let dispatcher = Dispatcher::new();
                expressions
                    .iter()
                    .map(|expression| {
                        let response = dispatcher.evaluate(&EvaluateRequest::new(expression.as_str(), json!({})));
                        response.message().map(str::to_string)
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap()
            .join()
            .unwrap();
        for message in messages {
            assert!(message.unwrap().contains("U1001"));
        }
    }

    #[test]
    fn test_recursion_within_the_limit_succeeds() {
        let response = Dispatcher::new().evaluate(&EvaluateRequest::new(
            "($f := function($n){$n = 0 ? 0 : 1 + $f($n - 1)}; $f(20))",
            json!({}),
        ));
        assert_eq!(response.result(), Some(&json!(20)));
    }

    #[test]
    fn test_engines_listing() {
        let identifiers: Vec<_> = Dispatcher::new()
            .engines()
            .iter()
            .map(EngineKind::identifier)
            .collect();
        assert_eq!(identifiers, vec!["JSONata4Java-2.6.0", "Jolt-0.1.8"]);
    }
}
