//! Configuration for the stalink CLI and other service consumers.
//!
//! A TOML file in the platform config directory, overridden by `STALINK_`
//! environment variables, translated into a `stalink_api::ServiceBuilder`.
//! Nested keys use a double underscore: `STALINK_MQTT__HOST`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stalink_api::{MqttConfig, QoS, SensorThingsService, ServiceBuilder, TlsMode, TransportConfig};

const ENV_PREFIX: &str = "STALINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no service endpoint configured")]
    MissingEndpoint,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Service root URL, e.g. `https://example.org/FROST-Server/v1.1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate (PEM).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttSection>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: default_timeout(),
            insecure: false,
            ca_cert: None,
            mqtt: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// `[mqtt]` table. Unset fields fall back to `MqttConfig` defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MqttSection {
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Keep-alive in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<u64>,

    /// 0, 1 or 2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qos: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl MqttSection {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            client_id: None,
            keep_alive: None,
            qos: None,
            username: None,
            password: None,
        }
    }

    /// Translate to the client's broker settings.
    pub fn to_mqtt_config(&self) -> Result<MqttConfig, ConfigError> {
        let mut config = MqttConfig::new(&self.host);
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(client_id) = &self.client_id {
            config.client_id.clone_from(client_id);
        }
        if let Some(secs) = self.keep_alive {
            config.keep_alive = Duration::from_secs(secs);
        }
        if let Some(level) = self.qos {
            config.qos = qos_from_level(level)?;
        }
        config.username.clone_from(&self.username);
        config.password.clone_from(&self.password);
        Ok(config)
    }
}

fn qos_from_level(level: u8) -> Result<QoS, ConfigError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(ConfigError::Validation {
            field: "mqtt.qos".into(),
            reason: format!("expected 0, 1 or 2, got {other}"),
        }),
    }
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    pub fn transport(&self) -> TransportConfig {
        let tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ca_path) = &self.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };
        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.timeout),
        }
    }

    /// A `ServiceBuilder` carrying the endpoint, transport and MQTT settings.
    pub fn service_builder(&self) -> Result<ServiceBuilder, ConfigError> {
        let endpoint = self.endpoint.as_deref().ok_or(ConfigError::MissingEndpoint)?;
        url::Url::parse(endpoint).map_err(|e| ConfigError::Validation {
            field: "endpoint".into(),
            reason: format!("invalid URL '{endpoint}': {e}"),
        })?;

        let mut builder = SensorThingsService::builder(endpoint).transport(self.transport());
        if let Some(mqtt) = &self.mqtt {
            builder = builder.mqtt(mqtt.to_mqtt_config()?);
        }
        Ok(builder)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "stalink", "stalink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("stalink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical config file plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` plus environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    fn jail_err(err: ConfigError) -> figment::Error {
        err.to_string().into()
    }

    #[test]
    fn defaults_without_file() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("missing.toml");
            let config = load_config_from(&path).map_err(jail_err)?;
            assert_eq!(config, Config::default());
            assert!(matches!(config.service_builder(), Err(ConfigError::MissingEndpoint)));
            Ok(())
        });
    }

    #[test]
    fn file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                    endpoint = "http://localhost:8080/FROST-Server/v1.1"
                    timeout = 10

                    [mqtt]
                    host = "localhost"
                    qos = 2
                "#,
            )?;
            jail.set_env("STALINK_TIMEOUT", "5");
            jail.set_env("STALINK_MQTT__PORT", "1884");

            let config = load_config_from(Path::new("config.toml")).map_err(jail_err)?;
            assert_eq!(
                config.endpoint.as_deref(),
                Some("http://localhost:8080/FROST-Server/v1.1")
            );
            assert_eq!(config.timeout, 5);

            let mqtt = config.mqtt.as_ref().unwrap().to_mqtt_config().map_err(jail_err)?;
            assert_eq!(mqtt.host, "localhost");
            assert_eq!(mqtt.port, 1884);
            assert_eq!(mqtt.qos, QoS::ExactlyOnce);
            Ok(())
        });
    }

    #[test]
    fn transport_prefers_insecure_over_ca() {
        let mut config = Config {
            ca_cert: Some("/etc/ssl/ca.pem".into()),
            ..Config::default()
        };
        assert!(matches!(config.transport().tls, TlsMode::CustomCa(_)));
        config.insecure = true;
        assert!(matches!(config.transport().tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(config.transport().timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut section = MqttSection::new("broker");
        section.qos = Some(3);
        assert!(matches!(
            section.to_mqtt_config(),
            Err(ConfigError::Validation { ref field, .. }) if field == "mqtt.qos"
        ));

        let config = Config {
            endpoint: Some("not a url".into()),
            ..Config::default()
        };
        assert!(matches!(
            config.service_builder(),
            Err(ConfigError::Validation { ref field, .. }) if field == "endpoint"
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            endpoint: Some("https://example.org/v1.0".into()),
            mqtt: Some(MqttSection::new("broker.example.org")),
            ..Config::default()
        };

        save_config_to(&config, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("endpoint = \"https://example.org/v1.0\""));
        assert!(text.contains("[mqtt]"));

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.endpoint, config.endpoint);

        // Building with a broker needs a tokio runtime.
        let err = loaded.service_builder().unwrap().build().unwrap_err();
        assert!(matches!(err, stalink_api::Error::MqttSetup(_)));
    }
}
