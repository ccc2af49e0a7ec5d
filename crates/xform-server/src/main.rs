//! xformd - HTTP service for JSONata and Jolt evaluation

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use xform_server::config::Config;
use xform_server::logging::{self, LogFormat};
use xform_server::Server;

/// xform daemon CLI
#[derive(Debug, Parser)]
#[command(name = "xformd")]
#[command(about = "xform - evaluate JSONata expressions and Jolt chains over HTTP", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (YAML or JSON)
    #[arg(short, long, env = "XFORM_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long, env = "XFORM_LISTEN_ADDR")]
    listen: Option<SocketAddr>,

    /// Comma-separated CORS origin allow-list, `*` for any
    #[arg(long, env = "XFORM_CORS_ALLOWED_ORIGINS")]
    cors_allowed_origins: Option<String>,

    /// Maximum JSONata evaluation depth
    #[arg(long, env = "XFORM_MAX_DEPTH")]
    max_depth: Option<usize>,

    /// Log level
    #[arg(long, env = "XFORM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, env = "XFORM_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Overlay flags and environment values onto the loaded configuration
    fn apply(&self, config: &mut Config) {
        if let Some(listen) = self.listen {
            config.server.listen_addr = listen;
        }
        if let Some(origins) = &self.cors_allowed_origins {
            config.cors.allowed_origins = origins.clone();
        }
        if let Some(max_depth) = self.max_depth {
            config.engine.max_depth = max_depth;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate()?;
    config.logging.merge_with_env();

    logging::init_logging(&config.logging)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting xformd");

    Server::new(config).run().await?;
    Ok(())
}
