//! Command-line configuration.
//!
//! ```text
//! class_selection [--bind <addr:port>] [--data-dir <path>]
//!                 [--log-file <path>] [--log-level <trace|debug|info|warn|error>]
//! ```
//! Unknown flags are ignored.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tracing::Level;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing value for {0}")]
    MissingValue(String),

    #[error("invalid value {value:?} for {flag}: {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub log_level: Level,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            log_file: None,
            log_level: Level::INFO,
        }
    }
}

impl ServerConfig {
    /// Parses `args` as returned by `std::env::args()`; the first entry is the program name.
    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--bind" => {
                    config.bind_addr = parse_value(args, i)?;
                    i += 2;
                }
                "--data-dir" => {
                    config.data_dir = PathBuf::from(value_of(args, i)?);
                    i += 2;
                }
                "--log-file" => {
                    config.log_file = Some(PathBuf::from(value_of(args, i)?));
                    i += 2;
                }
                "--log-level" => {
                    config.log_level = parse_value(args, i)?;
                    i += 2;
                }
                _ => {
                    i += 1;
                }
            }
        }

        Ok(config)
    }
}

fn value_of(args: &[String], i: usize) -> Result<&str, ConfigError> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::MissingValue(args[i].clone()))
}

fn parse_value<T>(args: &[String], i: usize) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = value_of(args, i)?;
    value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        flag: args[i].clone(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("class_selection")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_args(&args(&[])).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert!(config.log_file.is_none());
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn test_all_flags() {
        let config = ServerConfig::from_args(&args(&[
            "--bind",
            "0.0.0.0:9000",
            "--data-dir",
            "/tmp/selection",
            "--verbose",
            "--log-file",
            "system.log",
            "--log-level",
            "debug",
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/selection"));
        assert_eq!(config.log_file, Some(PathBuf::from("system.log")));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ServerConfig::from_args(&args(&["--bind", "not-an-addr"])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            ServerConfig::from_args(&args(&["--log-level", "loud"])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            ServerConfig::from_args(&args(&["--data-dir"])),
            Err(ConfigError::MissingValue(_))
        ));
    }
}
