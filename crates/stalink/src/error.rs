//! CLI error types with miette diagnostics.
//!
//! Maps `stalink_api::Error` and `ConfigError` into user-facing errors with
//! actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use stalink_api::ErrorKind;
use stalink_config::ConfigError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(stalink::connection_failed),
        help(
            "Check that the service is running and reachable.\n\
             Try: stalink list Things --insecure"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: stalink_api::Error,
    },

    #[error("Request timed out")]
    #[diagnostic(
        code(stalink::timeout),
        help("Increase the timeout with --timeout or check service responsiveness.")
    )]
    Timeout(#[source] stalink_api::Error),

    #[error("TLS setup failed: {reason}")]
    #[diagnostic(
        code(stalink::tls_error),
        help("Use --insecure (-k) to accept self-signed certificates, or set ca_cert in the config file.")
    )]
    TlsError { reason: String },

    // ── Service responses ────────────────────────────────────────────
    #[error("Not authorized for {url}")]
    #[diagnostic(
        code(stalink::auth_failed),
        help("The service rejected the request (HTTP {status}).")
    )]
    AuthFailed { url: String, status: u16 },

    #[error("Nothing found at {url}")]
    #[diagnostic(
        code(stalink::not_found),
        help("Run: stalink list <collection> to see available entities")
    )]
    NotFound { url: String },

    #[error(transparent)]
    #[diagnostic(code(stalink::service))]
    Service(stalink_api::Error),

    // ── Usage ────────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(stalink::invalid_request),
        help("Check the resource path and query options against the entity model.")
    )]
    InvalidRequest(stalink_api::Error),

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(stalink::validation))]
    Validation { field: String, reason: String },

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(stalink::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No service endpoint configured")]
    #[diagnostic(
        code(stalink::no_config),
        help(
            "Pass --endpoint, set STALINK_ENDPOINT, or create a config file with:\n\
             stalink config init --endpoint <URL>\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("MQTT is not configured")]
    #[diagnostic(
        code(stalink::no_mqtt),
        help("Pass --mqtt-host, set STALINK_MQTT_HOST, or add an [mqtt] table to the config file.")
    )]
    NoMqtt,

    #[error(transparent)]
    #[diagnostic(code(stalink::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(stalink::json), help("Check the JSON input and try again."))]
    Json(#[from] serde_json::Error),

    #[error("failed to render config: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::Timeout(_) => exit_code::TIMEOUT,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::InvalidRequest(_)
            | Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::NoConfig { .. }
            | Self::NoMqtt => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Error mapping ────────────────────────────────────────────────────

impl From<stalink_api::Error> for CliError {
    fn from(err: stalink_api::Error) -> Self {
        use stalink_api::Error as E;

        if let E::Transport(e) = &err {
            if e.is_timeout() {
                return Self::Timeout(err);
            }
            if e.is_connect() {
                let url = e.url().map(ToString::to_string).unwrap_or_default();
                return Self::ConnectionFailed { url, source: err };
            }
        }

        match err {
            E::Tls(reason) => Self::TlsError { reason },
            E::NotAuthorized { url, status, .. } => Self::AuthFailed { url, status },
            E::NotFound { url, .. } => Self::NotFound { url },
            E::MqttNotConfigured => Self::NoMqtt,
            other if other.kind() == ErrorKind::Structural => Self::InvalidRequest(other),
            other => Self::Service(other),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingEndpoint => Self::NoConfig {
                path: stalink_config::config_path().display().to_string(),
            },
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use stalink_api::model::EntityType;

    use super::*;

    #[test]
    fn status_errors_map_to_exit_codes() {
        let err = CliError::from(stalink_api::Error::NotFound {
            url: "http://example.org/v1.1/Things(1)".into(),
            status_text: "Not Found".into(),
            body: String::new(),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);

        let err = CliError::from(stalink_api::Error::NotAuthorized {
            url: "http://example.org/v1.1/Things".into(),
            status: 403,
            status_text: "Forbidden".into(),
            body: String::new(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn structural_errors_are_usage_errors() {
        let err = CliError::from(stalink_api::Error::MissingId(EntityType::Thing));
        assert!(matches!(err, CliError::InvalidRequest(_)));
        assert_eq!(err.exit_code(), exit_code::USAGE);

        let err = CliError::from(stalink_api::Error::MqttNotConfigured);
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn missing_endpoint_points_at_config_file() {
        let err = CliError::from(ConfigError::MissingEndpoint);
        assert!(matches!(err, CliError::NoConfig { ref path } if path.ends_with("config.toml")));
    }
}
