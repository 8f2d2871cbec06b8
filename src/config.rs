//! Configuration module for the sptrace responder.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the scripted responder
#[derive(Parser, Debug)]
#[command(name = "sptrace")]
#[command(author = "sptrace authors")]
#[command(version = "0.1.0")]
#[command(about = "A scripted TCP responder", long_about = None)]
pub struct CliArgs {
    /// Port to listen on
    pub port: Option<u16>,

    /// Expectation script (one `null` or pattern per line)
    pub expect_file: Option<PathBuf>,

    /// Response script (one response per line, `\n` and `\"` escapes)
    pub response_file: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<u32>,

    /// Re-read both script files before every connection
    #[arg(long)]
    pub reload: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    pub port: Option<u16>,
    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            backlog: default_backlog(),
        }
    }
}

/// Script file locations
#[derive(Debug, Deserialize, Default)]
pub struct ScriptConfig {
    pub expect_file: Option<PathBuf>,
    pub response_file: Option<PathBuf>,
    /// Re-read the scripts before every connection
    #[serde(default)]
    pub reload: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_backlog() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backlog: u32,
    pub expect_file: PathBuf,
    pub response_file: PathBuf,
    pub reload: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from the process arguments and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::try_parse().map_err(ConfigError::Usage)?;
        Self::from_cli(cli)
    }

    /// Resolve parsed CLI arguments, reading the TOML file they name.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        Ok(Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli
                .port
                .or(toml_config.server.port)
                .ok_or(ConfigError::MissingArgument("port"))?,
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            expect_file: cli
                .expect_file
                .or(toml_config.script.expect_file)
                .ok_or(ConfigError::MissingArgument("expect_file"))?,
            response_file: cli
                .response_file
                .or(toml_config.script.response_file)
                .ok_or(ConfigError::MissingArgument("response_file"))?,
            reload: cli.reload || toml_config.script.reload,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }

    /// `host:port` string suitable for resolution.
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    Usage(clap::Error),
    #[error("missing required argument <{0}>")]
    MissingArgument(&'static str),
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}

impl ConfigError {
    /// Errors that should print usage and exit cleanly rather than fail.
    pub fn is_usage(&self) -> bool {
        matches!(self, ConfigError::Usage(_) | ConfigError::MissingArgument(_))
    }
}

/// Usage line printed for bad invocations.
pub fn usage() -> String {
    "usage: sptrace <port> <expect_file> <response_file>".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliArgs {
        let mut argv = vec!["sptrace"];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, None);
        assert_eq!(config.server.backlog, 10);
        assert!(!config.script.reload);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 9000
            backlog = 32

            [script]
            expect_file = "expect.txt"
            response_file = "response.txt"
            reload = true

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, Some(9000));
        assert_eq!(config.server.backlog, 32);
        assert_eq!(config.script.expect_file, Some(PathBuf::from("expect.txt")));
        assert_eq!(config.script.response_file, Some(PathBuf::from("response.txt")));
        assert!(config.script.reload);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_positional_args() {
        let config = Config::merge(cli(&["9000", "a.txt", "b.txt"]), TomlConfig::default()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.expect_file, PathBuf::from("a.txt"));
        assert_eq!(config.response_file, PathBuf::from("b.txt"));
        assert_eq!(config.listen_addr(), "0.0.0.0:9000");
        assert_eq!(config.backlog, 10);
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [script]
            expect_file = "expect.txt"
            response_file = "response.txt"

            [logging]
            level = "warn"
            "#,
        )
        .unwrap();

        let config = Config::merge(
            cli(&["7000", "--host", "::1", "--log-level", "trace"]),
            toml_config,
        )
        .unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.host, "::1");
        assert_eq!(config.expect_file, PathBuf::from("expect.txt"));
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.listen_addr(), "[::1]:7000");
    }

    #[test]
    fn test_explicit_info_level_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let config = Config::merge(
            cli(&["9000", "a.txt", "b.txt", "--log-level", "info"]),
            toml_config,
        )
        .unwrap();
        assert_eq!(config.log_level, "info");

        let config = Config::merge(cli(&["9000", "a.txt", "b.txt"]), TomlConfig::default()).unwrap();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_missing_arguments() {
        let err = Config::merge(cli(&[]), TomlConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingArgument("port")));
        assert!(err.is_usage());

        let err = Config::merge(cli(&["9000", "a.txt"]), TomlConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingArgument("response_file")));
    }

    #[test]
    fn test_bad_port_is_usage_error() {
        let err = CliArgs::try_parse_from(["sptrace", "notaport", "a", "b"])
            .map_err(ConfigError::Usage)
            .unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::from_cli(cli(&["--config", "/nonexistent/sptrace.toml"])).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(..)));
        assert!(!err.is_usage());
    }
}
