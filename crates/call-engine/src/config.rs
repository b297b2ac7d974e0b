//! Relay configuration
//!
//! Values are layered in this order, later sources winning:
//!
//! 1. built-in defaults ([`RelayConfig::default`])
//! 2. an optional TOML file
//! 3. environment variables prefixed `SKYRELAY__`, with `__` between
//!    section and key (`SKYRELAY__SIGNALLING__RING_TIMEOUT=30s`)
//!
//! Durations are written in humantime form (`"45s"`, `"2m"`).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use skyrelay_infra_common::{ErrorExt, Error as InfraError};
use skyrelay_session_core::GroupEndPolicy;
use skyrelay_users_core::UsersConfig;

use crate::error::Result;
use crate::router::OfflinePolicy;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SKYRELAY";

/// Top-level relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub signalling: SignallingConfig,
    pub users: UsersConfig,
    pub logging: LogSettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Directory served at `/` for the browser client. Nothing is served
    /// when unset.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 5000)),
            static_dir: None,
        }
    }
}

/// Routing and call-session behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignallingConfig {
    /// What to do with events for users nobody has seen yet
    pub offline_policy: OfflinePolicy,

    /// Cap on each poll queue; the oldest event is evicted on overflow.
    /// Unbounded when unset.
    pub max_queued_events: Option<usize>,

    /// How long a call may stay unanswered. `0s` disables the timeout.
    #[serde(with = "humantime_serde")]
    pub ring_timeout: Duration,

    /// Poll endpoints not seen for this long are treated as disconnected
    #[serde(with = "humantime_serde")]
    pub poll_idle_timeout: Duration,

    /// How often the maintenance sweep runs
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    pub group_end_policy: GroupEndPolicy,
}

impl Default for SignallingConfig {
    fn default() -> Self {
        Self {
            offline_policy: OfflinePolicy::default(),
            max_queued_events: None,
            ring_timeout: Duration::from_secs(60),
            poll_idle_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
            group_end_policy: GroupEndPolicy::default(),
        }
    }
}

impl SignallingConfig {
    /// Ring timeout, or `None` when disabled
    pub fn ring_timeout(&self) -> Option<Duration> {
        (!self.ring_timeout.is_zero()).then_some(self.ring_timeout)
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RelayConfig {
    /// Load defaults, then `path` (if given), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&RelayConfig::default())
            .map_err(|e| InfraError::config(e.to_string()))
            .with_context("config", "defaults")?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .and_then(|c| c.try_deserialize::<RelayConfig>())
            .map_err(|e| InfraError::config(e.to_string()))
            .with_context("config", "load")?;

        Ok(config)
    }

    /// Parse a TOML document on top of the defaults. The environment is not consulted.
    pub fn from_toml(document: &str) -> Result<Self> {
        let defaults = Config::try_from(&RelayConfig::default())
            .map_err(|e| InfraError::config(e.to_string()))?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize::<RelayConfig>())
            .map_err(|e| InfraError::config(e.to_string()))
            .with_context("config", "parse")?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.server.bind_address.port(), 5000);
        assert_eq!(config.signalling.offline_policy, OfflinePolicy::Buffer);
        assert_eq!(config.signalling.max_queued_events, None);
        assert_eq!(config.signalling.ring_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.users.search_limit, 20);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = RelayConfig::from_toml(
            r#"
            [server]
            bind_address = "127.0.0.1:8080"

            [signalling]
            offline_policy = "drop"
            max_queued_events = 32
            ring_timeout = "0s"
            group_end_policy = "last_participant_leaves"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.signalling.offline_policy, OfflinePolicy::Drop);
        assert_eq!(config.signalling.max_queued_events, Some(32));
        assert_eq!(config.signalling.ring_timeout(), None);
        assert_eq!(config.signalling.group_end_policy, GroupEndPolicy::LastParticipantLeaves);
        // untouched sections keep their defaults
        assert_eq!(config.signalling.poll_idle_timeout, Duration::from_secs(60));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_bad_value_is_a_config_error() {
        let err = RelayConfig::from_toml("[signalling]\noffline_policy = \"maybe\"").unwrap_err();
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[signalling]\nring_timeout = \"45s\"\npoll_idle_timeout = \"10s\"").unwrap();

        // SAFETY: serialised with every other test that touches the environment
        unsafe { std::env::set_var("SKYRELAY__SIGNALLING__RING_TIMEOUT", "46s") };
        let config = RelayConfig::load(Some(file.path()));
        unsafe { std::env::remove_var("SKYRELAY__SIGNALLING__RING_TIMEOUT") };

        let config = config.unwrap();
        assert_eq!(config.signalling.ring_timeout, Duration::from_secs(46));
        assert_eq!(config.signalling.poll_idle_timeout, Duration::from_secs(10));
    }

    #[test]
    #[serial]
    fn test_missing_file_is_an_error() {
        assert!(RelayConfig::load(Some(Path::new("/nonexistent/skyrelay.toml"))).is_err());
    }
}
