// ── Generic data access object ──
//
// One `Dao<T>` per entity type, optionally scoped under a parent entity.
// Every operation checks structure against the entity graph, builds one
// URL, and runs exactly one request through the service. No caching, no
// retries.

use std::fmt;
use std::marker::PhantomData;

use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};
use url::Url;

use crate::data_array::DataArrayDocument;
use crate::error::Error;
use crate::model::{Entity, Id, Observation};
use crate::path::{EntityRef, Expansion};
use crate::query::Query;
use crate::service::SensorThingsService;
use crate::subscription::{Deliver, Subscription};

pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_JSON_PATCH: &str = "application/json-patch+json";

/// Batch insert action, relative to the endpoint.
const CREATE_OBSERVATIONS: &str = "CreateObservations";

// ── JSON Patch ───────────────────────────────────────────────────────

/// One RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Add {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Replace {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Id from a `Location` header (or batch result) such as
/// `http://host/v1.1/Things(42)`: the contents of the last closed
/// parenthesis pair. Parentheses inside a quoted id do not count, and an
/// empty pair yields no id.
fn id_from_location(location: &str) -> Option<Id> {
    let mut quoted = false;
    let mut open = None;
    let mut span = None;
    for (i, c) in location.char_indices() {
        match c {
            '\'' if open.is_some() => quoted = !quoted,
            '(' if !quoted => open = Some(i + 1),
            ')' if !quoted => {
                if let Some(start) = open.take() {
                    span = Some((start, i));
                }
            }
            _ => {}
        }
    }
    let (start, end) = span?;
    let text = &location[start..end];
    (!text.is_empty()).then(|| Id::from_url_form(text))
}

// ── Dao ──────────────────────────────────────────────────────────────

/// Data access object for entities of type `T`.
pub struct Dao<T: Entity> {
    service: SensorThingsService,
    parent: Option<EntityRef>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Dao<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            parent: self.parent.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> fmt::Debug for Dao<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dao")
            .field("entity_type", &T::TYPE)
            .field("parent", &self.parent)
            .finish()
    }
}

impl<T: Entity> Dao<T> {
    pub(crate) fn new(service: SensorThingsService) -> Self {
        Self {
            service,
            parent: None,
            _entity: PhantomData,
        }
    }

    /// Scope this DAO under `parent`, which must have an id.
    pub fn with_parent<P: Entity>(self, parent: &P) -> Result<Self, Error> {
        Ok(self.with_parent_ref(parent.entity_ref()?))
    }

    pub fn with_parent_ref(mut self, parent: EntityRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn parent(&self) -> Option<&EntityRef> {
        self.parent.as_ref()
    }

    pub fn service(&self) -> &SensorThingsService {
        &self.service
    }

    fn collection_path(&self) -> Result<String, Error> {
        self.service
            .graph()
            .collection_path(self.parent.as_ref(), T::TYPE)
    }

    fn entity_url(&self, id: &Id) -> Result<Url, Error> {
        self.service
            .url(&self.service.graph().entity_path(T::TYPE, id))
    }

    fn entity_id(entity: &T) -> Result<&Id, Error> {
        entity.id().ok_or(Error::MissingId(T::TYPE))
    }

    /// Encode `entity` and run the type's create-time validator on it.
    fn encode_for_create(&self, entity: &T) -> Result<Map<String, Value>, Error> {
        let encoded = self.service.encode_entity(entity)?;
        if let Some(validate) = self.service.graph().validator(T::TYPE) {
            validate(&encoded).map_err(|message| Error::Validation {
                entity_type: T::TYPE,
                message,
            })?;
        }
        Ok(encoded)
    }

    // ── CRUD ─────────────────────────────────────────────────────────

    /// POST `entity` to the (scoped) collection. On success the id from
    /// the `Location` header is set and the service attached.
    pub async fn create(&self, entity: &mut T) -> Result<(), Error> {
        let path = self.collection_path()?;
        let body = self.encode_for_create(entity)?;
        let url = self.service.url(&path)?;

        let request = self
            .service
            .http()
            .post(url.clone())
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(serde_json::to_vec(&body).map_err(Error::Serialization)?);
        let response = self.service.execute(request).await?;

        let id = response
            .headers()
            .get_all(LOCATION)
            .iter()
            .next_back()
            .and_then(|value| value.to_str().ok())
            .and_then(id_from_location)
            .ok_or_else(|| Error::MissingLocation {
                url: url.to_string(),
            })?;
        debug!(entity_type = %T::TYPE, %id, "created");
        entity.set_id(id);
        entity.attach(&self.service);
        Ok(())
    }

    pub async fn find(&self, id: impl Into<Id>) -> Result<T, Error> {
        let url = self.entity_url(&id.into())?;
        self.find_url(url).await
    }

    /// Find with `$expand`; every expanded relation must be declared.
    pub async fn find_with_expansion(
        &self,
        id: impl Into<Id>,
        expansion: &Expansion,
    ) -> Result<T, Error> {
        expansion.validate(self.service.graph(), T::TYPE)?;
        let mut url = self.entity_url(&id.into())?;
        if !expansion.is_empty() {
            url.query_pairs_mut()
                .append_pair("$expand", &expansion.to_string());
        }
        self.find_url(url).await
    }

    /// The singleton `T` related to `parent`, e.g. `Observations(7)/Datastream`.
    pub async fn find_related(&self, parent: &EntityRef) -> Result<T, Error> {
        let path = self.service.graph().singleton_path(parent, T::TYPE)?;
        let url = self.service.url(&path)?;
        self.find_url(url).await
    }

    /// GET an absolute entity URL.
    pub async fn find_url(&self, url: Url) -> Result<T, Error> {
        let request = self
            .service
            .http()
            .get(url)
            .header(ACCEPT, APPLICATION_JSON);
        let response = self.service.execute(request).await?;
        let value: Value = SensorThingsService::read_json(response).await?;
        self.service.decode_entity(&value)
    }

    /// Send the whole entity as a PATCH body.
    pub async fn update(&self, entity: &T) -> Result<(), Error> {
        let url = self.entity_url(Self::entity_id(entity)?)?;
        let body = self.service.encode_entity(entity)?;
        let request = self
            .service
            .http()
            .patch(url)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(serde_json::to_vec(&body).map_err(Error::Serialization)?);
        self.service.execute(request).await?;
        Ok(())
    }

    /// Apply a JSON Patch document to the entity on the server.
    pub async fn patch(&self, entity: &T, operations: &[PatchOperation]) -> Result<(), Error> {
        let url = self.entity_url(Self::entity_id(entity)?)?;
        debug!(patch = ?operations, "JSON patch");
        let request = self
            .service
            .http()
            .patch(url)
            .header(CONTENT_TYPE, APPLICATION_JSON_PATCH)
            .body(serde_json::to_vec(operations).map_err(Error::Serialization)?);
        self.service.execute(request).await?;
        Ok(())
    }

    /// Delete the entity on the server. The local value stays usable but is
    /// detached from the service.
    pub async fn delete(&self, entity: &mut T) -> Result<(), Error> {
        let url = self.entity_url(Self::entity_id(entity)?)?;
        let request = self.service.http().delete(url);
        self.service.execute(request).await?;
        entity.detach();
        Ok(())
    }

    /// A query over this DAO's (scoped) collection.
    pub fn query(&self) -> Query<T> {
        Query::new(self.service.clone(), self.parent.clone())
    }

    // ── MQTT ─────────────────────────────────────────────────────────

    /// `v1.1/Things(1)/Datastreams`.
    pub fn topic(&self) -> Result<String, Error> {
        Ok(format!(
            "{}/{}",
            self.service.version().url_pattern(),
            self.collection_path()?
        ))
    }

    /// Collection topic restricted to `properties`, which must all be
    /// declared on `T`.
    pub fn topic_select<S: AsRef<str>>(&self, properties: &[S]) -> Result<String, Error> {
        self.service.graph().validate_select(T::TYPE, properties)?;
        let topic = self.topic()?;
        if properties.is_empty() {
            return Ok(topic);
        }
        let names: Vec<&str> = properties.iter().map(AsRef::as_ref).collect();
        Ok(format!("{topic}?$select={}", names.join(",")))
    }

    /// `v1.1/Things(42)`.
    pub fn entity_topic(&self, entity: &T) -> Result<String, Error> {
        if let Some(parent) = &self.parent {
            self.service
                .graph()
                .require_relation(parent.entity_type, T::TYPE, crate::model::Cardinality::Many)?;
        }
        Ok(format!(
            "{}/{}",
            self.service.version().url_pattern(),
            self.service
                .graph()
                .entity_path(T::TYPE, Self::entity_id(entity)?)
        ))
    }

    /// Create by publishing on the collection topic. The validator applies;
    /// no id is assigned.
    pub async fn create_mqtt(&self, entity: &T) -> Result<(), Error> {
        let topic = self.topic()?;
        let body = self.encode_for_create(entity)?;
        let payload = serde_json::to_vec(&body).map_err(Error::Serialization)?;
        self.service.publish(&topic, payload).await
    }

    fn deliver<P, H>(&self, predicate: P, handler: H) -> Deliver
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        H: Fn(T) + Send + Sync + 'static,
    {
        let service = self.service.downgrade();
        Box::new(move |payload| {
            let Some(service) = service.upgrade() else {
                return Ok(());
            };
            let entity: T = service.decode_entity_bytes(payload)?;
            if predicate(&entity) {
                handler(entity);
            }
            Ok(())
        })
    }

    async fn subscribe_topic<P, H>(
        &self,
        topic: String,
        predicate: P,
        handler: H,
    ) -> Result<Subscription, Error>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        H: Fn(T) + Send + Sync + 'static,
    {
        let manager = self.service.subscriptions()?;
        manager
            .subscribe(topic, T::TYPE, self.deliver(predicate, handler))
            .await
    }

    /// Every entity published on the collection topic.
    pub async fn subscribe<H>(&self, handler: H) -> Result<Subscription, Error>
    where
        H: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_topic(self.topic()?, |_: &T| true, handler)
            .await
    }

    /// Only entities matching `predicate` reach `handler`.
    pub async fn subscribe_filtered<P, H>(
        &self,
        predicate: P,
        handler: H,
    ) -> Result<Subscription, Error>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        H: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_topic(self.topic()?, predicate, handler)
            .await
    }

    /// Subscribe to a `$select`-restricted topic.
    pub async fn subscribe_select<S, H>(
        &self,
        properties: &[S],
        handler: H,
    ) -> Result<Subscription, Error>
    where
        S: AsRef<str>,
        H: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_topic(self.topic_select(properties)?, |_: &T| true, handler)
            .await
    }

    pub async fn subscribe_filtered_select<S, P, H>(
        &self,
        properties: &[S],
        predicate: P,
        handler: H,
    ) -> Result<Subscription, Error>
    where
        S: AsRef<str>,
        P: Fn(&T) -> bool + Send + Sync + 'static,
        H: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_topic(self.topic_select(properties)?, predicate, handler)
            .await
    }

    /// Updates of one entity.
    pub async fn subscribe_entity<H>(&self, entity: &T, handler: H) -> Result<Subscription, Error>
    where
        H: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_topic(self.entity_topic(entity)?, |_: &T| true, handler)
            .await
    }

    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), Error> {
        self.service.subscriptions()?.unsubscribe(subscription).await
    }

    /// Drop every binding on this DAO's bare collection topic.
    pub async fn unsubscribe_all(&self) -> Result<(), Error> {
        let topic = self.topic()?;
        self.service
            .subscriptions()?
            .unsubscribe_topic(&topic)
            .await
    }
}

// ── Observation batch insert ─────────────────────────────────────────

impl Dao<Observation> {
    /// POST a dataArray document to `CreateObservations`.
    ///
    /// Results are matched to observations by position. Results starting
    /// with `error` are logged and leave their observation without an id;
    /// a length mismatch is logged and observations past the end of the
    /// response stay unassigned. Returns the raw results.
    pub async fn create_data_array(
        &self,
        document: &mut DataArrayDocument,
    ) -> Result<Vec<String>, Error> {
        let url = self.service.url(CREATE_OBSERVATIONS)?;
        let request = self
            .service
            .http()
            .post(url)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(serde_json::to_vec(&*document).map_err(Error::Serialization)?);
        let response = self.service.execute(request).await?;
        let results: Vec<String> = SensorThingsService::read_json(response).await?;

        let submitted = document.observation_count();
        if submitted != results.len() {
            error!(
                returned = results.len(),
                submitted,
                "Size of returned location list is not equal to number of sent Observations"
            );
        }

        for (observation, result) in document.observations_mut().zip(&results) {
            if result.starts_with("error") {
                warn!(%result, "Failed to insert Observation");
                continue;
            }
            match id_from_location(result) {
                Some(id) => {
                    observation.set_id(id);
                    observation.attach(&self.service);
                }
                None => warn!(%result, "Unparseable location in CreateObservations result"),
            }
        }
        Ok(results)
    }
}
