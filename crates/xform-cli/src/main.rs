//! xform CLI - evaluate JSONata expressions and Jolt chains from the shell
//!
//! Prints the same response envelope the HTTP service returns. Exit code
//! 0 means success, 2 means the engine returned an error envelope, and
//! other codes report CLI failures such as unreadable input.

mod cli;
mod error;
mod handlers;
mod logging;
mod output;

use cli::{Cli, Commands};
use colored::control;
use error::{Result, EXIT_EVALUATION_FAILED};
use logging::LoggingConfig;
use output::OutputWriter;
use std::process;

fn main() {
    let cli = Cli::parse_args();

    control::set_override(cli.use_color());

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli) {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(EXIT_EVALUATION_FAILED),
        Err(e) => {
            eprintln!("{}", error::format_error(&e, control::SHOULD_COLORIZE.should_colorize()));

            if e.should_show_help() {
                eprintln!("\nFor more information, try '--help'");
            }

            process::exit(e.exit_code());
        }
    }
}

/// Main application logic; `Ok(false)` means an error envelope was printed
fn run(cli: Cli) -> Result<bool> {
    let mut output = OutputWriter::new(cli.output, cli.use_color(), cli.quiet);

    tracing::debug!(command = ?cli.command, "executing command");

    match cli.command {
        Commands::Eval(args) => handlers::handle_eval(args, &mut output),
        Commands::Engines => handlers::handle_engines(&mut output).map(|()| true),
    }
}

/// Initialize the logging system
fn init_logging(cli: &Cli) -> Result<()> {
    let mut logging_config = LoggingConfig::from_verbosity(cli.verbosity_level());
    logging_config.merge_with_env();

    if cli.quiet {
        logging_config.level = "error".to_string();
    }

    logging::init_logging(&logging_config)
}
