// stalink-api: Async Rust client for OGC SensorThings services (REST + MQTT)

pub mod dao;
pub mod data_array;
pub mod error;
pub mod model;
pub mod mqtt;
pub mod path;
pub mod query;
pub mod service;
pub mod subscription;
pub mod transport;
pub mod util;

pub use dao::{Dao, PatchOperation};
pub use data_array::{DataArrayComponent, DataArrayDocument, DataArrayValue};
pub use error::{Error, ErrorKind};
pub use model::{Entity, EntityGraph, EntityType, Id};
pub use mqtt::{MqttConfig, QoS, ReconnectConfig, RumqttTransport};
pub use path::{EntityRef, Expand, Expansion};
pub use query::{EntityList, Query};
pub use service::{ApiVersion, SensorThingsService, ServiceBuilder, WeakService};
pub use subscription::{MqttTransport, Subscription, SubscriptionManager};
pub use transport::{TlsMode, TransportConfig};

pub use stalink_swe as swe;
