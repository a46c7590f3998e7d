//! # Configuration Module
//!
//! Everything the server needs to know is gathered into one [`ServerConfig`]
//! value, built once at startup and shared read-only with every component.
//!
//! ## Sources
//!
//! Settings are resolved in this order, later sources winning:
//!
//! 1. Built-in defaults
//! 2. An optional YAML file (`--config contactd.yaml`)
//! 3. Command-line flags, each of which also reads a `CONTACTD_*` variable
//!
//! ## Example Configuration
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 8080
//! web_root: ./www
//! submissions_file: ./data/submissions.txt
//! admin:
//!   username: admin
//!   password: change-me
//! limits:
//!   max_header_bytes: 8192
//!   max_body_bytes: 65536
//!   read_timeout_ms: 5000
//!   write_timeout_ms: 5000
//! concurrency:
//!   mode: pool
//!   workers: 4
//!   queue_bound: 64
//!   backpressure: shed
//! ```
//!
//! Missing keys take their defaults; unknown keys are rejected so typos
//! surface at startup rather than as silently ignored settings.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port (0 picks a free port)
    pub port: u16,
    /// Static file base directory
    pub web_root: PathBuf,
    /// Append-only log of contact form submissions
    pub submissions_file: PathBuf,
    /// Static Basic-Auth credentials for `/admin`
    pub admin: AdminCredentials,
    /// Input bounds applied to every connection
    pub limits: Limits,
    /// How accepted connections are scheduled
    pub concurrency: ConcurrencyConfig,
}

/// The single admin username/password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

/// Bounds on untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Maximum size of request line plus headers
    pub max_header_bytes: usize,
    /// Maximum declared `Content-Length` accepted on `POST /contact`
    pub max_body_bytes: usize,
    /// Deadline for reading the whole request, head and body
    pub read_timeout_ms: u64,
    /// Socket write timeout
    pub write_timeout_ms: u64,
}

impl Limits {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_bytes: 8 * 1024,
            max_body_bytes: 64 * 1024,
            read_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
        }
    }
}

/// Connection scheduling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// Answer each connection on the accept thread, one at a time
    Sequential,
    /// Hand connections to a bounded pool of worker threads
    Pool,
}

/// What the accept loop does when the pool queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackpressureMode {
    /// Stop accepting until a worker frees a slot
    Block,
    /// Answer 503 immediately
    Shed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConcurrencyConfig {
    pub mode: ConcurrencyMode,
    /// Worker threads in `pool` mode
    pub workers: usize,
    /// Accepted connections waiting for a worker
    pub queue_bound: usize,
    pub backpressure: BackpressureMode,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            mode: ConcurrencyMode::Sequential,
            workers: 4,
            queue_bound: 64,
            backpressure: BackpressureMode::Block,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            web_root: PathBuf::from("./www"),
            submissions_file: PathBuf::from("submissions.txt"),
            admin: AdminCredentials::default(),
            limits: Limits::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a YAML document into a configuration.
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let config: ServerConfig =
            serde_yaml::from_str(source).context("failed to parse configuration YAML")?;
        Ok(config)
    }

    /// Load a configuration file. An empty file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::from_yaml_str(&source).with_context(|| format!("in {}", path.display()))
    }

    /// `host:port` string suitable for `ToSocketAddrs`.
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin.username.is_empty() {
            return Err(ConfigError::EmptyAdminUser);
        }
        if self.admin.username.contains(':') {
            return Err(ConfigError::ColonInAdminUser);
        }
        let positive = [
            ("limits.max_header_bytes", self.limits.max_header_bytes as u64),
            ("limits.max_body_bytes", self.limits.max_body_bytes as u64),
            ("limits.read_timeout_ms", self.limits.read_timeout_ms),
            ("limits.write_timeout_ms", self.limits.write_timeout_ms),
            ("concurrency.workers", self.concurrency.workers as u64),
            ("concurrency.queue_bound", self.concurrency.queue_bound as u64),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Zero { key });
            }
        }
        Ok(())
    }

    /// YAML rendering with the admin password masked.
    pub fn to_redacted_yaml(&self) -> Result<String> {
        let mut shown = self.clone();
        shown.admin.password = "<REDACTED>".to_string();
        serde_yaml::to_string(&shown).context("failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr(), "127.0.0.1:8080");
        assert_eq!(c.web_root, PathBuf::from("./www"));
        assert_eq!(c.submissions_file, PathBuf::from("submissions.txt"));
        assert_eq!(c.concurrency.mode, ConcurrencyMode::Sequential);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let c = ServerConfig::from_yaml_str(
            "port: 9090\nadmin:\n  password: s3cret\nconcurrency:\n  mode: pool\n",
        )
        .unwrap();
        assert_eq!(c.port, 9090);
        assert_eq!(c.host, "127.0.0.1");
        assert_eq!(c.admin.username, "admin");
        assert_eq!(c.admin.password, "s3cret");
        assert_eq!(c.concurrency.mode, ConcurrencyMode::Pool);
        assert_eq!(c.concurrency.workers, 4);
        assert_eq!(c.limits, Limits::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(ServerConfig::from_yaml_str("prot: 80\n").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut c = ServerConfig::default();
        c.concurrency.workers = 0;
        assert_eq!(
            c.validate(),
            Err(ConfigError::Zero {
                key: "concurrency.workers"
            })
        );
    }

    #[test]
    fn test_validate_rejects_colon_in_username() {
        let mut c = ServerConfig::default();
        c.admin.username = "a:b".to_string();
        assert_eq!(c.validate(), Err(ConfigError::ColonInAdminUser));
    }

    #[test]
    fn test_ipv6_bind_addr_is_bracketed() {
        let c = ServerConfig {
            host: "::1".to_string(),
            port: 81,
            ..ServerConfig::default()
        };
        assert_eq!(c.bind_addr(), "[::1]:81");
    }

    #[test]
    fn test_password_masked() {
        let c = ServerConfig::default();
        let yaml = c.to_redacted_yaml().unwrap();
        assert!(yaml.contains("<REDACTED>"));
        assert!(format!("{:?}", c.admin).contains("<REDACTED>"));
    }
}
