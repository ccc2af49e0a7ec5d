//! Configuration for the xform server
//!
//! Values are layered, later layers winning:
//! - Built-in defaults
//! - An optional YAML or JSON file
//! - `XFORM_*` environment variables and command-line flags

use crate::error::{Result, ServerError};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use xform_core::jsonata::DEFAULT_MAX_DEPTH;

/// Main server configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener settings
    pub server: ServerConfig,

    /// Cross-origin settings
    pub cors: CorsConfig,

    /// Evaluation limits
    pub engine: EngineConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Comma-separated origin allow-list; `*` allows any origin
    pub allowed_origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: "*".to_string(),
        }
    }
}

/// Origins accepted for cross-origin requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl CorsConfig {
    /// Parse the allow-list; a `*` entry or an empty value allows any origin
    pub fn origins(&self) -> AllowedOrigins {
        let origins: Vec<String> = self
            .allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(origins)
        }
    }
}

/// Evaluation limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum JSONata evaluation depth
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    /// Load configuration from a YAML (`.yaml`/`.yml`) or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ServerError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        Ok(config)
    }

    /// Load from a file when given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_depth == 0 {
            return Err(ServerError::config("engine.max_depth must be at least 1"));
        }
        if self.server.max_body_size == 0 {
            return Err(ServerError::config("server.max_body_size must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.cors.allowed_origins, "*");
        assert_eq!(config.engine.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.cors.origins(), AllowedOrigins::Any);
    }

    #[test]
    fn test_origin_list_parsing() {
        let cors = CorsConfig {
            allowed_origins: " http://localhost:3000 ,https://app.example.com,".to_string(),
        };
        assert_eq!(
            cors.origins(),
            AllowedOrigins::List(vec![
                "http://localhost:3000".to_string(),
                "https://app.example.com".to_string()
            ])
        );

        let mixed = CorsConfig {
            allowed_origins: "http://localhost:3000,*".to_string(),
        };
        assert_eq!(mixed.origins(), AllowedOrigins::Any);

        let empty = CorsConfig {
            allowed_origins: "  ".to_string(),
        };
        assert_eq!(empty.origins(), AllowedOrigins::Any);
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "server:\n  listen_addr: 0.0.0.0:9000\ncors:\n  allowed_origins: http://a.test\nlogging:\n  format: json\n"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.server.max_body_size, 10 * 1024 * 1024);
        assert_eq!(config.cors.allowed_origins, "http://a.test");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.engine.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"engine": {{"max_depth": 64}}}}"#).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.engine.max_depth, 64);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"engine": {{"max_depth": 0}}}}"#).unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ServerError::Config(_))
        ));

        let missing = Config::load(Some(Path::new("/nonexistent/xform.yaml")));
        assert!(matches!(missing, Err(ServerError::ConfigFile { .. })));
    }
}
