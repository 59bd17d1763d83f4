//! CLI argument definitions for the actionlog service.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default API port when neither flag, env nor config set one.
pub const DEFAULT_PORT: u16 = 3040;

/// actionlog - records content changes as a deduplicated action log and
/// notifies build webhooks.
#[derive(Parser, Debug)]
#[command(name = "actionlog", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<u16>,

    /// Data directory for the SQLite database and API token.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Prune records past the retention window and exit.
    Gc,
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > ACTIONLOG_CONFIG env var > ~/.actionlog/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ACTIONLOG_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > ACTIONLOG_PORT env var > config file value > 3040.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("ACTIONLOG_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        DEFAULT_PORT
    }

    /// Data directory override, if given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Log level override, if given.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".actionlog").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".actionlog").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let args = CliArgs::parse_from(["actionlog"]);
        assert_eq!(args.command(), Command::Serve);
        assert!(args.resolve_data_dir().is_none());
    }

    #[test]
    fn test_gc_subcommand_with_global_flags() {
        let args = CliArgs::parse_from(["actionlog", "gc", "--config", "/tmp/a.toml", "-d", "/tmp/data"]);
        assert_eq!(args.command(), Command::Gc);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/a.toml"));
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/tmp/data"));
    }

    #[test]
    fn test_port_flag_wins() {
        let args = CliArgs::parse_from(["actionlog", "serve", "--port", "9000"]);
        assert_eq!(args.resolve_port(3040), 9000);
    }
}
