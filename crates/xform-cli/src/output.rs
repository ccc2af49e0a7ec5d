//! Output formatting and writing utilities
//!
//! Envelopes are written to stdout in the selected format. JSON and YAML
//! formats print the envelope exactly as the HTTP service would return it;
//! the human format prints only the result, or the message on failure.

use crate::cli::OutputFormat;
use crate::error::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};
use tracing::trace;
use xform_core::{EngineKind, EvaluateResponse, Mode};

/// One engine as listed by `xform engines`
#[derive(Debug, Serialize)]
pub struct EngineEntry {
    pub mode: Mode,
    pub engine: &'static str,
}

impl From<&EngineKind> for EngineEntry {
    fn from(kind: &EngineKind) -> Self {
        Self {
            mode: kind.mode(),
            engine: kind.identifier(),
        }
    }
}

impl OutputFormat {
    /// Format a serializable value
    pub fn format<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            OutputFormat::Json => Ok(serde_json::to_string(value)?),
            OutputFormat::JsonPretty | OutputFormat::Human => Ok(serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?.trim_end().to_string()),
        }
    }

    /// Format an evaluation envelope
    pub fn format_response(&self, response: &EvaluateResponse, use_color: bool) -> Result<String> {
        match self {
            OutputFormat::Human => format_response_human(response, use_color),
            _ => self.format(response),
        }
    }

    /// Format the engine listing
    pub fn format_engines(&self, engines: &[EngineEntry], use_color: bool) -> Result<String> {
        match self {
            OutputFormat::Human => Ok(engines
                .iter()
                .map(|entry| {
                    let mode = format!("{:<8}", entry.mode.as_str());
                    if use_color {
                        format!("{} {}", mode.bold(), entry.engine)
                    } else {
                        format!("{} {}", mode, entry.engine)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")),
            _ => self.format(&serde_json::json!({ "engines": engines })),
        }
    }
}

fn format_response_human(response: &EvaluateResponse, use_color: bool) -> Result<String> {
    match (response.result(), response.message()) {
        (Some(result), _) => Ok(serde_json::to_string_pretty(result)?),
        (None, message) => {
            let message = message.unwrap_or("evaluation failed");
            Ok(if use_color {
                format!("{} {}", "error:".red().bold(), message)
            } else {
                format!("error: {}", message)
            })
        }
    }
}

/// Output writer that handles different output formats and colors
pub struct OutputWriter {
    format: OutputFormat,
    use_color: bool,
    quiet: bool,
    writer: Box<dyn Write>,
}

impl OutputWriter {
    /// Create a new output writer on stdout
    pub fn new(format: OutputFormat, use_color: bool, quiet: bool) -> Self {
        Self::with_writer(format, use_color, quiet, Box::new(io::stdout()))
    }

    /// Create an output writer with a custom writer
    pub fn with_writer(
        format: OutputFormat,
        use_color: bool,
        quiet: bool,
        writer: Box<dyn Write>,
    ) -> Self {
        Self {
            format,
            use_color,
            quiet,
            writer,
        }
    }

    /// Write a line of output
    pub fn writeln(&mut self, content: &str) -> Result<()> {
        writeln!(self.writer, "{}", content)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write an evaluation envelope
    pub fn response(&mut self, response: &EvaluateResponse) -> Result<()> {
        trace!(status = ?response.status(), "writing response");
        let text = self.format.format_response(response, self.use_color)?;
        self.writeln(&text)?;

        if self.format == OutputFormat::Human && !self.quiet {
            if let Some(engine) = response.engine() {
                let note = format!("engine: {}", engine);
                if self.use_color {
                    eprintln!("{}", note.dimmed());
                } else {
                    eprintln!("{}", note);
                }
            }
        }
        Ok(())
    }

    /// Write the engine listing
    pub fn engines(&mut self, engines: &[EngineEntry]) -> Result<()> {
        let text = self.format.format_engines(engines, self.use_color)?;
        self.writeln(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_formats_match_the_http_envelope() {
        let response = EvaluateResponse::success(json!({"b": 5}), "Jolt-0.1.8");
        assert_eq!(
            OutputFormat::Json.format_response(&response, false).unwrap(),
            r#"{"status":"success","result":{"b":5},"engine":"Jolt-0.1.8"}"#
        );
        let pretty = OutputFormat::JsonPretty.format_response(&response, false).unwrap();
        assert!(pretty.contains("\n"));
    }

    #[test]
    fn test_human_format() {
        let success = EvaluateResponse::success(json!(5), "JSONata4Java-2.6.0");
        assert_eq!(OutputFormat::Human.format_response(&success, false).unwrap(), "5");

        let failure = EvaluateResponse::error("S0207: Unexpected end of expression");
        assert_eq!(
            OutputFormat::Human.format_response(&failure, false).unwrap(),
            "error: S0207: Unexpected end of expression"
        );
    }

    #[test]
    fn test_yaml_format() {
        let failure = EvaluateResponse::error("boom");
        let yaml = OutputFormat::Yaml.format_response(&failure, false).unwrap();
        assert_eq!(yaml, "status: error\nmessage: boom");
    }

    #[test]
    fn test_engine_listing() {
        let engines: Vec<EngineEntry> = EngineKind::ALL.iter().map(EngineEntry::from).collect();
        let human = OutputFormat::Human.format_engines(&engines, false).unwrap();
        assert_eq!(human, "jsonata  JSONata4Java-2.6.0\njolt     Jolt-0.1.8");

        let json = OutputFormat::Json.format_engines(&engines, false).unwrap();
        assert_eq!(
            json,
            r#"{"engines":[{"mode":"jsonata","engine":"JSONata4Java-2.6.0"},{"mode":"jolt","engine":"Jolt-0.1.8"}]}"#
        );
    }
}
