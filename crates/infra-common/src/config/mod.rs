//! Server configuration
//!
//! Values come from three layers, later ones winning:
//!
//! 1. built-in defaults
//! 2. a TOML file
//! 3. `SIGFLOW_*` environment variables
//!
//! ```toml
//! [engine]
//! address = "0.0.0.0:5060"
//! shutdown = "drain"
//!
//! [dialogs]
//! retention_secs = 30
//! label_headers = ["X-Trunk-Group"]
//!
//! [billing]
//! address = "http://billing.internal/cdr"
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Prefix of the environment variables that override file values
pub const ENV_PREFIX: &str = "SIGFLOW_";

/// What the engine does with in-flight pipelines on shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownMode {
    #[default]
    Immediate,
    Drain,
}

impl std::str::FromStr for ShutdownMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(ShutdownMode::Immediate),
            "drain" => Ok(ShutdownMode::Drain),
            other => Err(format!("expected \"immediate\" or \"drain\", got {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub address: String,
    /// Receive buffer per datagram, in bytes
    pub buffer_size: usize,
    pub inbound_capacity: usize,
    pub egress_capacity: usize,
    pub error_capacity: usize,
    pub shutdown: ShutdownMode,
    pub drain_timeout_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:5060".to_string(),
            buffer_size: 2048,
            inbound_capacity: 1024,
            egress_capacity: 1024,
            error_capacity: 1024,
            shutdown: ShutdownMode::Immediate,
            drain_timeout_ms: 5_000,
        }
    }
}

impl EngineSection {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogSection {
    /// Seconds a cancelled dialog is kept. Absent keeps it until deleted,
    /// 0 removes it on cancel.
    pub retention_secs: Option<u64>,
    pub sweep_interval_ms: u64,
    pub failure_threshold: u32,
    pub request_capacity: usize,
    /// Headers whose values are copied into dialog labels
    pub label_headers: Vec<String>,
}

impl Default for DialogSection {
    fn default() -> Self {
        Self {
            retention_secs: None,
            sweep_interval_ms: 1_000,
            failure_threshold: 16,
            request_capacity: 1024,
            label_headers: Vec::new(),
        }
    }
}

impl DialogSection {
    pub fn retention(&self) -> Option<Duration> {
        self.retention_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingSection {
    /// Where call-detail records are POSTed; records are only logged without it
    pub address: Option<String>,
    pub timeout_ms: u64,
}

impl Default for BillingSection {
    fn default() -> Self {
        Self {
            address: None,
            timeout_ms: 5_000,
        }
    }
}

impl BillingSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
    pub file_info: bool,
    pub spans: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            spans: false,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigflowConfig {
    pub engine: EngineSection,
    pub dialogs: DialogSection,
    pub billing: BillingSection,
    pub logging: LoggingSection,
}

impl SigflowConfig {
    /// Defaults, overlaid with `path` when given, then with the environment.
    /// The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `SIGFLOW_*` overrides from the given variables
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in vars {
            let name = name.as_ref();
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.into();

            match key {
                "ADDRESS" => self.engine.address = value,
                "BUFFER_SIZE" => self.engine.buffer_size = parse_env(name, &value)?,
                "SHUTDOWN" => self.engine.shutdown = parse_env(name, &value)?,
                "DRAIN_TIMEOUT_MS" => self.engine.drain_timeout_ms = parse_env(name, &value)?,
                "RETENTION_SECS" => self.dialogs.retention_secs = Some(parse_env(name, &value)?),
                "FAILURE_THRESHOLD" => self.dialogs.failure_threshold = parse_env(name, &value)?,
                "LABEL_HEADERS" => {
                    self.dialogs.label_headers = value
                        .split(',')
                        .map(str::trim)
                        .filter(|h| !h.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "BILLING_ADDRESS" => self.billing.address = Some(value),
                "BILLING_TIMEOUT_MS" => self.billing.timeout_ms = parse_env(name, &value)?,
                "LOG_LEVEL" => self.logging.level = value,
                "LOG_JSON" => self.logging.json = parse_env(name, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine
            .address
            .parse::<SocketAddr>()
            .map_err(|e| invalid(format!("engine.address {:?}: {}", self.engine.address, e)))?;

        let sizes = [
            ("engine.buffer_size", self.engine.buffer_size),
            ("engine.inbound_capacity", self.engine.inbound_capacity),
            ("engine.egress_capacity", self.engine.egress_capacity),
            ("engine.error_capacity", self.engine.error_capacity),
            ("dialogs.request_capacity", self.dialogs.request_capacity),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, size)| *size == 0) {
            return Err(invalid(format!("{} must be greater than zero", name)));
        }

        if self.dialogs.failure_threshold == 0 {
            return Err(invalid("dialogs.failure_threshold must be greater than zero"));
        }
        if self.dialogs.sweep_interval_ms == 0 {
            return Err(invalid("dialogs.sweep_interval_ms must be greater than zero"));
        }
        if self.billing.address.as_deref().is_some_and(|a| a.trim().is_empty()) {
            return Err(invalid("billing.address must not be empty"));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(invalid(format!("logging.level {:?}", self.logging.level)));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(reason.into())
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        name: name.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
