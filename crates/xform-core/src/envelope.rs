//! Request and response envelopes for the evaluate operation

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// JSONata engine identifier reported to callers
pub const JSONATA_ENGINE: &str = "JSONata4Java-2.6.0";

/// Jolt engine identifier reported to callers
pub const JOLT_ENGINE: &str = "Jolt-0.1.8";

/// Which engine evaluates a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Jsonata,
    Jolt,
}

impl Mode {
    /// Select the mode from the request's `mode` field; only a
    /// case-insensitive `"jolt"` picks Jolt
    pub fn from_request(mode: Option<&str>) -> Self {
        match mode {
            Some(mode) if mode.eq_ignore_ascii_case("jolt") => Mode::Jolt,
            _ => Mode::Jsonata,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Jsonata => "jsonata",
            Mode::Jolt => "jolt",
        }
    }

    /// The engine serving this mode
    pub fn engine(&self) -> EngineKind {
        match self {
            Mode::Jsonata => EngineKind::Jsonata,
            Mode::Jolt => EngineKind::Jolt,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transformation engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Jsonata,
    Jolt,
}

impl EngineKind {
    /// Every engine, in listing order
    pub const ALL: [EngineKind; 2] = [EngineKind::Jsonata, EngineKind::Jolt];

    /// Fixed engine and version string callers use to detect the engine
    pub fn identifier(&self) -> &'static str {
        match self {
            EngineKind::Jsonata => JSONATA_ENGINE,
            EngineKind::Jolt => JOLT_ENGINE,
        }
    }

    /// The request mode that selects this engine
    pub fn mode(&self) -> Mode {
        match self {
            EngineKind::Jsonata => Mode::Jsonata,
            EngineKind::Jolt => Mode::Jolt,
        }
    }
}

/// Deserialize a field that may be explicitly `null`, keeping `null`
/// distinct from absence
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Body of `POST /api/evaluate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluateRequest {
    /// JSONata expression, or a serialized Jolt chain in Jolt mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    /// Document to transform; `Some(Value::Null)` is a valid input
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,

    /// `"jsonata"` (default) or `"jolt"`, case-insensitive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl EvaluateRequest {
    pub fn new(expression: impl Into<String>, input: Value) -> Self {
        Self {
            expression: Some(expression.into()),
            input: Some(input),
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// The mode this request selects
    pub fn mode(&self) -> Mode {
        Mode::from_request(self.mode.as_deref())
    }
}

/// Outcome status of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Response envelope; exactly one of `result` and `message` is present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateResponse {
    status: Status,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    engine: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl EvaluateResponse {
    /// A successful evaluation; `result` may be JSON `null`
    pub fn success(result: Value, engine: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            result: Some(result),
            engine: Some(engine.into()),
            message: None,
        }
    }

    /// A failed evaluation
    pub fn error(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.is_empty() {
            message = "evaluation failed".to_string();
        }
        Self {
            status: Status::Error,
            result: None,
            engine: None,
            message: Some(message),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Take the result out of a successful response
    pub fn into_result(self) -> Option<Value> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mode_is_case_insensitive() {
        assert_eq!(Mode::from_request(Some("JOLT")), Mode::Jolt);
        assert_eq!(Mode::from_request(Some("Jolt")), Mode::Jolt);
        assert_eq!(Mode::from_request(Some("jsonata")), Mode::Jsonata);
        assert_eq!(Mode::from_request(Some("xslt")), Mode::Jsonata);
        assert_eq!(Mode::from_request(None), Mode::Jsonata);
    }

    #[test]
    fn test_engine_identifiers() {
        assert_eq!(EngineKind::Jsonata.identifier(), "JSONata4Java-2.6.0");
        assert_eq!(EngineKind::Jolt.identifier(), "Jolt-0.1.8");
        assert_eq!(Mode::Jolt.engine().mode(), Mode::Jolt);
    }

    #[test]
    fn test_request_distinguishes_null_from_missing_input() {
        let with_null: EvaluateRequest =
            serde_json::from_value(json!({"expression": "$", "input": null})).unwrap();
        assert_eq!(with_null.input, Some(Value::Null));

        let missing: EvaluateRequest = serde_json::from_value(json!({"expression": "$"})).unwrap();
        assert_eq!(missing.input, None);
    }

    #[test]
    fn test_success_serialization_omits_message() {
        let response = EvaluateResponse::success(json!(5), JSONATA_ENGINE);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"status": "success", "result": 5, "engine": "JSONata4Java-2.6.0"})
        );
    }

    #[test]
    fn test_null_result_is_serialized() {
        let response = EvaluateResponse::success(Value::Null, JOLT_ENGINE);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["result"], Value::Null);
        assert!(value.as_object().unwrap().contains_key("result"));

        let back: EvaluateResponse = serde_json::from_value(value).unwrap();
        assert_eq!(back.result(), Some(&Value::Null));
    }

    #[test]
    fn test_error_serialization_omits_result_and_engine() {
        let response = EvaluateResponse::error("boom");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"status": "error", "message": "boom"})
        );
        assert_eq!(EvaluateResponse::error("").message(), Some("evaluation failed"));
    }
}
