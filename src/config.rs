//! Environment configuration for the server and the terminal client.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const MODEL_PATH_ENV: &str = "TRIALSAFE_MODEL_PATH";
pub const BIND_ADDR_ENV: &str = "TRIALSAFE_BIND_ADDR";
pub const PORT_ENV: &str = "PORT";
pub const API_URL_ENV: &str = "TRIALSAFE_API_URL";
pub const REQUEST_TIMEOUT_ENV: &str = "TRIALSAFE_REQUEST_TIMEOUT_SECS";
pub const LOG_MODE_ENV: &str = "TRIALSAFE_LOG_MODE";
pub const LOG_FILE_ENV: &str = "TRIALSAFE_LOG_FILE";

const DEFAULT_MODEL_PATH: &str = "models/trial_outcomes";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_FILE: &str = "trialsafe.log";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

fn invalid(name: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Where the client writes its logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// File when stdout is a terminal, stdout otherwise.
    Auto,
    File,
    Stdout,
}

impl LogMode {
    /// Resolve `Auto` against whether stdout is interactive.
    #[must_use]
    pub fn use_file(self, interactive: bool) -> bool {
        match self {
            Self::File => true,
            Self::Stdout => false,
            Self::Auto => interactive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub model_path: PathBuf,
    pub bind_addr: SocketAddr,
}

impl ServerConfig {
    /// # Errors
    /// Returns `ConfigError` on an unparsable address or port.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns `ConfigError` on an unparsable address or port.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let model_path = lookup(MODEL_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH), PathBuf::from);

        let host = lookup(BIND_ADDR_ENV).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let ip: IpAddr = host
            .trim()
            .parse()
            .map_err(|e| invalid(BIND_ADDR_ENV, &host, e))?;

        let port = match lookup(PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| invalid(PORT_ENV, &raw, e))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            model_path,
            bind_addr: SocketAddr::new(ip, port),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl ClientConfig {
    /// # Errors
    /// Returns `ConfigError` on an invalid URL, timeout or log mode.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns `ConfigError` on an invalid URL, timeout or log mode.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = api_url.trim().trim_end_matches('/').to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(invalid(API_URL_ENV, &api_url, "expected an http(s) URL"));
        }

        let request_timeout = match lookup(REQUEST_TIMEOUT_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => return Err(invalid(REQUEST_TIMEOUT_ENV, &raw, "must be positive")),
                Ok(secs) => Duration::from_secs(secs),
                Err(e) => return Err(invalid(REQUEST_TIMEOUT_ENV, &raw, e)),
            },
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let log_mode = match lookup(LOG_MODE_ENV).as_deref().map(str::trim) {
            None | Some("" | "auto") => LogMode::Auto,
            Some("file") => LogMode::File,
            Some("stdout") => LogMode::Stdout,
            Some(other) => return Err(invalid(LOG_MODE_ENV, other, "expected auto, file or stdout")),
        };

        let log_file = lookup(LOG_FILE_ENV)
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from);

        Ok(Self {
            api_url,
            request_timeout,
            log_mode,
            log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).expect("Defaults should parse");
        assert_eq!(config.model_path, PathBuf::from("models/trial_outcomes"));
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().expect("addr"));
    }

    #[test]
    fn test_server_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            (MODEL_PATH_ENV, "/srv/model"),
            (BIND_ADDR_ENV, "127.0.0.1"),
            (PORT_ENV, "9000"),
        ]))
        .expect("Should parse");
        assert_eq!(config.model_path, PathBuf::from("/srv/model"));
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().expect("addr"));
    }

    #[test]
    fn test_server_rejects_bad_port() {
        let err = ServerConfig::from_lookup(lookup(&[(PORT_ENV, "80a")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_client_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).expect("Defaults should parse");
        assert_eq!(config.api_url, "http://127.0.0.1:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.log_mode, LogMode::Auto);
        assert_eq!(config.log_file, PathBuf::from("trialsafe.log"));
    }

    #[test]
    fn test_client_overrides_and_errors() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_URL_ENV, "https://trials.example.org/"),
            (REQUEST_TIMEOUT_ENV, "10"),
            (LOG_MODE_ENV, "stdout"),
        ]))
        .expect("Should parse");
        assert_eq!(config.api_url, "https://trials.example.org");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.log_mode, LogMode::Stdout);

        assert!(ClientConfig::from_lookup(lookup(&[(API_URL_ENV, "localhost:8080")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[(REQUEST_TIMEOUT_ENV, "0")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[(LOG_MODE_ENV, "syslog")])).is_err());
    }

    #[test]
    fn test_log_mode_resolution() {
        assert!(LogMode::Auto.use_file(true));
        assert!(!LogMode::Auto.use_file(false));
        assert!(LogMode::File.use_file(false));
        assert!(!LogMode::Stdout.use_file(true));
    }
}
