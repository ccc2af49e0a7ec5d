//! Command handlers for the CLI

use crate::cli::EvalArgs;
use crate::error::{Error, Result};
use crate::output::{EngineEntry, OutputWriter};
use is_terminal::IsTerminal;
use serde_json::Value;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, info};
use xform_core::{Dispatcher, EvaluateRequest};

/// Handle `xform eval`; returns whether evaluation succeeded
pub fn handle_eval(args: EvalArgs, output: &mut OutputWriter) -> Result<bool> {
    let expression = load_expression(&args)?;
    let interactive = args.input.is_none() && args.data.is_none() && io::stdin().is_terminal();
    let input = if interactive {
        Value::Null
    } else {
        load_input(&args, io::stdin().lock())?
    };

    let request = EvaluateRequest::new(expression, input).with_mode(args.mode);
    info!(mode = %request.mode(), "evaluating");

    let response = Dispatcher::new().evaluate(&request);
    output.response(&response)?;
    Ok(response.is_success())
}

/// Handle `xform engines`
pub fn handle_engines(output: &mut OutputWriter) -> Result<()> {
    let engines: Vec<EngineEntry> = Dispatcher::new()
        .engines()
        .iter()
        .map(EngineEntry::from)
        .collect();
    output.engines(&engines)
}

/// The expression text, inline or from `--expression-file`
fn load_expression(args: &EvalArgs) -> Result<String> {
    match (&args.expression, &args.expression_file) {
        (Some(expression), _) => Ok(expression.clone()),
        (None, Some(path)) => {
            ensure_exists(path)?;
            let text = std::fs::read_to_string(path)?;
            debug!(path = %path.display(), "loaded expression file");
            Ok(text.trim_end().to_string())
        }
        (None, None) => Err(Error::invalid_args(
            "an EXPRESSION or --expression-file is required",
        )),
    }
}

/// The input document from `--data`, `--input`, or the given reader
pub fn load_input(args: &EvalArgs, stdin: impl Read) -> Result<Value> {
    if let Some(data) = &args.data {
        return serde_json::from_str(data).map_err(|e| Error::invalid_input("--data", e));
    }

    match &args.input {
        Some(path) if path.as_os_str() != "-" => read_document(path),
        _ => read_stdin(stdin),
    }
}

/// Read a JSON document from stdin; empty input is `null`
fn read_stdin(mut stdin: impl Read) -> Result<Value> {
    let mut text = String::new();
    stdin.read_to_string(&mut text)?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| Error::invalid_input("stdin", e))
}

/// Read a document file, YAML by extension and JSON otherwise
fn read_document(path: &Path) -> Result<Value> {
    ensure_exists(path)?;
    let content = std::fs::read_to_string(path)?;
    let source = path.display().to_string();

    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|e| Error::invalid_input(source, e))
        }
        _ => serde_json::from_str(&content).map_err(|e| Error::invalid_input(source, e)),
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(Error::FileNotFound {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use std::path::PathBuf;

    fn args(expression: &str) -> EvalArgs {
        EvalArgs {
            expression: Some(expression.to_string()),
            expression_file: None,
            input: None,
            data: None,
            mode: "jsonata".to_string(),
        }
    }

    #[test]
    fn test_inline_data() {
        let args = EvalArgs {
            data: Some(r#"{"a": 1}"#.to_string()),
            ..args("a")
        };
        assert_eq!(load_input(&args, io::empty()).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_stdin_input() {
        let input = load_input(&args("a"), r#"{"a": [1, 2]}"#.as_bytes()).unwrap();
        assert_eq!(input, json!({"a": [1, 2]}));
        assert_eq!(load_input(&args("a"), "  \n".as_bytes()).unwrap(), Value::Null);
        assert!(matches!(
            load_input(&args("a"), "{oops".as_bytes()),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_yaml_input_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "a:\n  b: 5").unwrap();
        let args = EvalArgs {
            input: Some(file.path().to_path_buf()),
            ..args("a.b")
        };
        assert_eq!(load_input(&args, io::empty()).unwrap(), json!({"a": {"b": 5}}));
    }

    #[test]
    fn test_expression_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"[{{"operation": "shift", "spec": {{"a": "b"}}}}]"#).unwrap();
        let args = EvalArgs {
            expression: None,
            expression_file: Some(file.path().to_path_buf()),
            ..args("")
        };
        assert_eq!(
            load_expression(&args).unwrap(),
            r#"[{"operation": "shift", "spec": {"a": "b"}}]"#
        );
    }

    #[test]
    fn test_missing_files() {
        let args = EvalArgs {
            input: Some(PathBuf::from("/nonexistent/input.json")),
            ..args("a")
        };
        assert!(matches!(
            load_input(&args, io::empty()),
            Err(Error::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_eval_reports_envelope_status() {
        let mut output = OutputWriter::with_writer(
            crate::cli::OutputFormat::Json,
            false,
            true,
            Box::new(io::sink()),
        );
        let ok = EvalArgs {
            data: Some(r#"{"a": {"b": 5}}"#.to_string()),
            ..args("a.b")
        };
        assert!(handle_eval(ok, &mut output).unwrap());

        let broken = EvalArgs {
            data: Some("{}".to_string()),
            ..args("a..")
        };
        assert!(!handle_eval(broken, &mut output).unwrap());
    }
}
