use stalink_swe::CodecError;
use thiserror::Error;

use crate::model::EntityType;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ErrorKind {
    /// Local misuse detected before any network traffic.
    Structural,
    /// Transport, encoding or protocol failure.
    Service,
    /// The server answered with a non-2xx status.
    Status,
    /// A polymorphic SWE payload could not be resolved.
    Decode,
}

/// Top-level error type for the `stalink-api` crate.
#[derive(Debug, Error)]
pub enum Error {
    // ── Structural ──────────────────────────────────────────────────
    /// `child` is not reachable from `parent` with the required cardinality.
    #[error("{child} is not a {cardinality} relation of {parent}")]
    NotRelated {
        parent: EntityType,
        child: EntityType,
        cardinality: &'static str,
    },

    /// A `$select` or `$expand` names a property the type does not declare.
    #[error(
        "use of unknown property '{property}' in $select. Allowed properties for type {entity_type}: {}",
        .allowed.join(", ")
    )]
    UnknownProperty {
        entity_type: EntityType,
        property: String,
        allowed: Vec<&'static str>,
    },

    /// A path segment or relation name matches no known entity type.
    #[error("unknown entity type or relation '{0}'")]
    UnknownRelation(String),

    /// The operation needs an entity id, but none is set.
    #[error("{0} has no id")]
    MissingId(EntityType),

    /// The entity failed its create-time validation.
    #[error("invalid {entity_type}: {message}")]
    Validation {
        entity_type: EntityType,
        message: String,
    },

    /// Navigation on an entity that was never attached to a service.
    #[error("{0} is not attached to a service")]
    NotAttached(EntityType),

    // ── Service ─────────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The service endpoint cannot be used as a base URL.
    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    /// TLS setup or HTTP client construction failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Encoding an entity to JSON failed.
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A create succeeded but the response carried no usable `Location`.
    #[error("Server did not return a Location header for {url}")]
    MissingLocation { url: String },

    /// MQTT client request could not be queued.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// A subscription or publish was attempted without an MQTT transport.
    #[error("MQTT is not configured for this service")]
    MqttNotConfigured,

    /// The MQTT client could not be started.
    #[error("MQTT setup failed: {0}")]
    MqttSetup(String),

    // ── Status ──────────────────────────────────────────────────────
    /// 401 or 403.
    #[error("Not authorized (HTTP {status} {status_text}) for {url}")]
    NotAuthorized {
        url: String,
        status: u16,
        status_text: String,
        body: String,
    },

    /// 404.
    #[error("Not found ({status_text}) for {url}")]
    NotFound {
        url: String,
        status_text: String,
        body: String,
    },

    /// Any other non-2xx status.
    #[error("HTTP {status} {status_text} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        status_text: String,
        body: String,
    },

    // ── Decode ──────────────────────────────────────────────────────
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotRelated { .. }
            | Self::UnknownProperty { .. }
            | Self::UnknownRelation(_)
            | Self::MissingId(_)
            | Self::Validation { .. }
            | Self::NotAttached(_) => ErrorKind::Structural,
            Self::NotAuthorized { .. } | Self::NotFound { .. } | Self::Status { .. } => {
                ErrorKind::Status
            }
            Self::Codec(_) => ErrorKind::Decode,
            Self::Transport(_)
            | Self::InvalidUrl(_)
            | Self::InvalidEndpoint(_)
            | Self::Tls(_)
            | Self::Serialization(_)
            | Self::Deserialization { .. }
            | Self::MissingLocation { .. }
            | Self::Mqtt(_)
            | Self::MqttNotConfigured
            | Self::MqttSetup(_) => ErrorKind::Service,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Returns `true` for 401 and 403 responses.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::NotAuthorized { .. })
    }

    /// HTTP status of a status-code failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotAuthorized { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Request URL of a status-code failure.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::NotAuthorized { url, .. }
            | Self::NotFound { url, .. }
            | Self::Status { url, .. }
            | Self::MissingLocation { url } => Some(url),
            _ => None,
        }
    }

    /// Response body of a status-code failure.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::NotAuthorized { body, .. }
            | Self::NotFound { body, .. }
            | Self::Status { body, .. }
            | Self::Deserialization { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_property_enumerates_allowed_names() {
        let err = Error::UnknownProperty {
            entity_type: EntityType::Thing,
            property: "colour".into(),
            allowed: vec!["name", "description", "properties"],
        };
        assert_eq!(
            err.to_string(),
            "use of unknown property 'colour' in $select. \
             Allowed properties for type Thing: name, description, properties"
        );
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn status_helpers() {
        let err = Error::NotFound {
            url: "http://example.org/v1.1/Things(9)".into(),
            status_text: "Not Found".into(),
            body: String::new(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.url(), Some("http://example.org/v1.1/Things(9)"));
        assert_eq!(err.kind(), ErrorKind::Status);

        let err = Error::Status {
            url: "u".into(),
            status: 503,
            status_text: "Service Unavailable".into(),
            body: String::new(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_unauthorized());
    }
}
