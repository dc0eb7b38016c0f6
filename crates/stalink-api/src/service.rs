// ── SensorThings service handle ──
//
// Cheap-to-clone handle over the endpoint, HTTP client, entity graph, SWE
// codec and the optional MQTT subscription manager. Every DAO, query and
// attached entity holds a clone.

use std::fmt;
use std::sync::{Arc, Weak};

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use stalink_swe::SweCodec;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::dao::Dao;
use crate::error::Error;
use crate::model::{
    Actuator, Datastream, Entity, EntityGraph, FeatureOfInterest, HistoricalLocation, Location,
    MultiDatastream, Observation, ObservedProperty, Sensor, Task, TaskingCapability, Thing,
};
use crate::mqtt::{MqttConfig, RumqttTransport};
use crate::subscription::{MqttTransport, SubscriptionManager};
use crate::transport::TransportConfig;
use crate::util::{LOG_BODY_LIMIT, clean_for_logging};

// ── API version ──────────────────────────────────────────────────────

/// Protocol version, read from the endpoint path. Also the MQTT topic prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
pub enum ApiVersion {
    #[strum(serialize = "v1.0")]
    V1_0,
    #[default]
    #[strum(serialize = "v1.1")]
    V1_1,
}

impl ApiVersion {
    pub fn url_pattern(self) -> &'static str {
        match self {
            Self::V1_0 => "v1.0",
            Self::V1_1 => "v1.1",
        }
    }

    /// Last path segment naming a version wins; `v1.1` if none does.
    pub fn detect(endpoint: &Url) -> Self {
        endpoint
            .path_segments()
            .into_iter()
            .flatten()
            .rev()
            .find_map(|segment| segment.parse().ok())
            .unwrap_or_default()
    }
}

// ── Service ──────────────────────────────────────────────────────────

struct Inner {
    endpoint: Url,
    version: ApiVersion,
    http: reqwest::Client,
    graph: Arc<EntityGraph>,
    codec: Arc<SweCodec>,
    subscriptions: Option<Arc<SubscriptionManager>>,
    cancel: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Entry point: hands out DAOs and runs their requests.
#[derive(Clone)]
pub struct SensorThingsService {
    inner: Arc<Inner>,
}

/// Non-owning handle, held by subscription handlers.
#[derive(Clone)]
pub struct WeakService {
    inner: Weak<Inner>,
}

impl WeakService {
    pub fn upgrade(&self) -> Option<SensorThingsService> {
        self.inner.upgrade().map(|inner| SensorThingsService { inner })
    }
}

impl fmt::Debug for SensorThingsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorThingsService")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("version", &self.inner.version)
            .field("mqtt", &self.inner.subscriptions.is_some())
            .finish()
    }
}

impl SensorThingsService {
    /// HTTP-only service with default transport settings.
    pub fn new(endpoint: &str) -> Result<Self, Error> {
        Self::builder(endpoint).build()
    }

    pub fn builder(endpoint: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder::new(endpoint)
    }

    /// Base URL, always ending in `/`.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    pub fn version(&self) -> ApiVersion {
        self.inner.version
    }

    pub fn graph(&self) -> &EntityGraph {
        &self.inner.graph
    }

    pub fn codec(&self) -> &SweCodec {
        &self.inner.codec
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub fn downgrade(&self) -> WeakService {
        WeakService {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriptions(&self) -> Result<&Arc<SubscriptionManager>, Error> {
        self.inner
            .subscriptions
            .as_ref()
            .ok_or(Error::MqttNotConfigured)
    }

    /// Stop the MQTT event loop, if any.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    // ── DAOs ─────────────────────────────────────────────────────────

    pub fn dao<T: Entity>(&self) -> Dao<T> {
        Dao::new(self.clone())
    }

    pub fn things(&self) -> Dao<Thing> {
        self.dao()
    }

    pub fn locations(&self) -> Dao<Location> {
        self.dao()
    }

    pub fn historical_locations(&self) -> Dao<HistoricalLocation> {
        self.dao()
    }

    pub fn datastreams(&self) -> Dao<Datastream> {
        self.dao()
    }

    pub fn multi_datastreams(&self) -> Dao<MultiDatastream> {
        self.dao()
    }

    pub fn sensors(&self) -> Dao<Sensor> {
        self.dao()
    }

    pub fn observed_properties(&self) -> Dao<ObservedProperty> {
        self.dao()
    }

    pub fn observations(&self) -> Dao<Observation> {
        self.dao()
    }

    pub fn features_of_interest(&self) -> Dao<FeatureOfInterest> {
        self.dao()
    }

    pub fn actuators(&self) -> Dao<Actuator> {
        self.dao()
    }

    pub fn tasking_capabilities(&self) -> Dao<TaskingCapability> {
        self.dao()
    }

    pub fn tasks(&self) -> Dao<Task> {
        self.dao()
    }

    // ── Request execution ────────────────────────────────────────────

    /// Resolve a path relative to the endpoint.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.inner.endpoint.join(path)?)
    }

    /// Send a prepared request; non-2xx responses become status errors.
    pub async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Response, Error> {
        let request = request.build()?;
        debug!("{} {}", request.method(), request.url());
        let url = request.url().to_string();
        let response = self.inner.http.execute(request).await?;
        check_status(url, response).await
    }

    /// Decode a 2xx body as JSON, keeping the body on failure.
    pub(crate) async fn read_json<V: DeserializeOwned>(response: Response) -> Result<V, Error> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| deserialization_error(&e, body))
    }

    // ── Entity codec ─────────────────────────────────────────────────

    /// Decode an entity, resolve its SWE members and attach this service.
    pub fn decode_entity<T: Entity>(&self, value: &Value) -> Result<T, Error> {
        let mut entity = <T as serde::Deserialize>::deserialize(value)
            .map_err(|e| deserialization_error(&e, value.to_string()))?;
        if let Value::Object(members) = value {
            entity.resolve_polymorphic(self.codec(), members)?;
        }
        entity.attach(self);
        Ok(entity)
    }

    pub fn decode_entity_bytes<T: Entity>(&self, payload: &[u8]) -> Result<T, Error> {
        let value: Value = serde_json::from_slice(payload).map_err(|e| {
            deserialization_error(&e, String::from_utf8_lossy(payload).into_owned())
        })?;
        self.decode_entity(&value)
    }

    /// Encode an entity, including its SWE members.
    pub fn encode_entity<T: Entity>(&self, entity: &T) -> Result<Map<String, Value>, Error> {
        match serde_json::to_value(entity).map_err(Error::Serialization)? {
            Value::Object(mut members) => {
                entity.encode_polymorphic(self.codec(), &mut members)?;
                Ok(members)
            }
            other => Err(Error::Validation {
                entity_type: T::TYPE,
                message: format!("encoded to a non-object JSON value: {other}"),
            }),
        }
    }

    /// Publish a raw payload on `topic`.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Error> {
        self.subscriptions()?.transport().publish(topic, payload).await
    }
}

fn deserialization_error(e: &serde_json::Error, body: String) -> Error {
    let preview = clean_for_logging(&body, LOG_BODY_LIMIT);
    Error::Deserialization {
        message: format!("{e} (body preview: {preview:?})"),
        body,
    }
}

/// Map a non-2xx response to its error variant. `url` is the request URL,
/// not the one reached after redirects.
async fn check_status(url: String, response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let status_text = status.canonical_reason().unwrap_or_default().to_owned();
    let body = response.text().await.unwrap_or_default();
    warn!(
        %url,
        status = status.as_u16(),
        body = %clean_for_logging(&body, LOG_BODY_LIMIT),
        "request failed"
    );

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::NotAuthorized {
            url,
            status: status.as_u16(),
            status_text,
            body,
        },
        StatusCode::NOT_FOUND => Error::NotFound {
            url,
            status_text,
            body,
        },
        _ => Error::Status {
            url,
            status: status.as_u16(),
            status_text,
            body,
        },
    })
}

// ── Builder ──────────────────────────────────────────────────────────

/// Assembles a [`SensorThingsService`].
pub struct ServiceBuilder {
    endpoint: String,
    transport: TransportConfig,
    http: Option<reqwest::Client>,
    codec: Option<SweCodec>,
    mqtt: Option<MqttConfig>,
    mqtt_transport: Option<Arc<dyn MqttTransport>>,
}

impl ServiceBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport: TransportConfig::default(),
            http: None,
            codec: None,
            mqtt: None,
            mqtt_transport: None,
        }
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Use a preconfigured client; `transport` is then ignored.
    #[must_use]
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Use a codec with extension types registered.
    #[must_use]
    pub fn codec(mut self, codec: SweCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Connect to an MQTT broker. Requires a running tokio runtime at
    /// [`build`](Self::build) time.
    #[must_use]
    pub fn mqtt(mut self, config: MqttConfig) -> Self {
        self.mqtt = Some(config);
        self
    }

    /// Use a custom MQTT transport; takes precedence over [`mqtt`](Self::mqtt).
    #[must_use]
    pub fn mqtt_transport(mut self, transport: Arc<dyn MqttTransport>) -> Self {
        self.mqtt_transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<SensorThingsService, Error> {
        let mut endpoint = Url::parse(&self.endpoint)?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::InvalidEndpoint(self.endpoint));
        }
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        let version = ApiVersion::detect(&endpoint);

        let http = match self.http {
            Some(http) => http,
            None => self.transport.build_client()?,
        };
        let codec = match self.codec {
            Some(codec) => codec,
            None => SweCodec::new()?,
        };

        let cancel = CancellationToken::new();
        let subscriptions = match (self.mqtt_transport, self.mqtt) {
            (Some(transport), _) => Some(Arc::new(SubscriptionManager::new(transport))),
            (None, Some(config)) => {
                let (transport, event_loop) = RumqttTransport::connect(&config);
                let manager = Arc::new(SubscriptionManager::new(transport));
                event_loop.spawn(Arc::clone(&manager), cancel.clone())?;
                Some(manager)
            }
            (None, None) => None,
        };

        debug!(endpoint = %endpoint, %version, mqtt = subscriptions.is_some(), "service ready");

        Ok(SensorThingsService {
            inner: Arc::new(Inner {
                endpoint,
                version,
                http,
                graph: Arc::new(EntityGraph::sensorthings()),
                codec: Arc::new(codec),
                subscriptions,
                cancel,
            }),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn endpoint_gets_trailing_slash_and_version() {
        let service = SensorThingsService::new("http://example.org/FROST-Server/v1.0").unwrap();
        assert_eq!(service.endpoint().as_str(), "http://example.org/FROST-Server/v1.0/");
        assert_eq!(service.version(), ApiVersion::V1_0);
        assert_eq!(
            service.url("Things(1)/Datastreams").unwrap().as_str(),
            "http://example.org/FROST-Server/v1.0/Things(1)/Datastreams"
        );

        let service = SensorThingsService::new("http://example.org/sta/").unwrap();
        assert_eq!(service.version(), ApiVersion::V1_1);
    }

    #[test]
    fn rejects_non_base_endpoint() {
        assert!(matches!(
            SensorThingsService::new("mailto:someone@example.org"),
            Err(Error::InvalidEndpoint(_))
        ));
        assert!(matches!(
            SensorThingsService::new("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn decoded_entities_are_attached() {
        let service = SensorThingsService::new("http://example.org/v1.1").unwrap();
        let thing: Thing = service
            .decode_entity(&json!({
                "@iot.id": 1,
                "Datastreams": [{ "@iot.id": 2 }]
            }))
            .unwrap();
        assert!(thing.is_attached());
        assert!(thing.datastreams[0].is_attached());
    }

    #[test]
    fn undecodable_payload_keeps_body() {
        let service = SensorThingsService::new("http://example.org/v1.1").unwrap();
        let err = service
            .decode_entity_bytes::<Thing>(b"{\"name\": 5}")
            .unwrap_err();
        assert_eq!(err.body(), Some("{\"name\":5}"));
    }

    #[test]
    fn subscriptions_require_mqtt() {
        let service = SensorThingsService::new("http://example.org/v1.1").unwrap();
        assert!(matches!(service.subscriptions(), Err(Error::MqttNotConfigured)));
    }
}
