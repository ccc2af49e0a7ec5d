//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;
use std::path::PathBuf;

/// xform CLI - evaluate JSONata expressions and Jolt chains
///
/// Produces the same response envelope as the HTTP service, without a
/// server in between.
#[derive(Parser, Debug)]
#[command(
    name = "xform",
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Enable verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format for results
    #[arg(short, long, value_enum, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate an expression or chain against an input document
    Eval(EvalArgs),

    /// List the available engines and their identifiers
    Engines,
}

/// Arguments for the eval command
#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["expression", "expression_file"])))]
#[command(group(ArgGroup::new("document").args(["input", "data"])))]
pub struct EvalArgs {
    /// JSONata expression, or a Jolt chain as JSON text
    #[arg(value_name = "EXPRESSION")]
    pub expression: Option<String>,

    /// Read the expression from a file
    #[arg(short = 'f', long, value_name = "FILE")]
    pub expression_file: Option<PathBuf>,

    /// Input document (JSON, or YAML by extension); `-` or absent reads stdin
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Input document given inline as JSON
    #[arg(short, long, value_name = "JSON")]
    pub data: Option<String>,

    /// Engine mode: `jsonata` (default) or `jolt`, case-insensitive
    #[arg(short, long, default_value = "jsonata")]
    pub mode: String,
}

/// Output format options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// JSON output
    Json,
    /// Pretty-printed JSON output
    JsonPretty,
    /// YAML output
    Yaml,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level (considering quiet flag)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::io::stdout().is_terminal()
    }
}
