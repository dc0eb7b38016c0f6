// ── Entity trait and shared metadata ──
//
// Every resource struct flattens an `EntityMeta` (id, self link, attached
// service) and implements `Entity` through `impl_entity!`, which also wires
// up recursion into expanded relations for service attachment and SWE
// resolution.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use stalink_swe::{CodecError, DataRecord, SweCodec};

use super::{EntityType, Id};
use crate::dao::Dao;
use crate::error::Error;
use crate::path::EntityRef;
use crate::service::SensorThingsService;

/// Metadata shared by all entities.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EntityMeta {
    #[serde(rename = "@iot.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,

    /// Read from the wire, never written.
    #[serde(rename = "@iot.selfLink", default, skip_serializing)]
    pub self_link: Option<String>,

    #[serde(skip)]
    service: Option<SensorThingsService>,
}

impl EntityMeta {
    pub fn with_id(id: impl Into<Id>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn service(&self) -> Option<&SensorThingsService> {
        self.service.as_ref()
    }
}

// Attachment is runtime context, not part of an entity's value.
impl PartialEq for EntityMeta {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.self_link == other.self_link
    }
}

impl fmt::Debug for EntityMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMeta")
            .field("id", &self.id)
            .field("self_link", &self.self_link)
            .field("attached", &self.service.is_some())
            .finish()
    }
}

/// A SensorThings resource type.
pub trait Entity:
    Serialize + DeserializeOwned + Clone + Default + fmt::Debug + Send + Sync + 'static
{
    const TYPE: EntityType;

    /// Wire names of every navigation field on the struct.
    const RELATIONS: &'static [&'static str];

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// A bare entity carrying only an id, for linking in create bodies.
    fn reference(id: impl Into<Id>) -> Self {
        let mut entity = Self::default();
        entity.meta_mut().id = Some(id.into());
        entity
    }

    fn id(&self) -> Option<&Id> {
        self.meta().id.as_ref()
    }

    fn set_id(&mut self, id: Id) {
        self.meta_mut().id = Some(id);
    }

    fn entity_ref(&self) -> Result<EntityRef, Error> {
        self.id()
            .cloned()
            .map(|id| EntityRef::new(Self::TYPE, id))
            .ok_or(Error::MissingId(Self::TYPE))
    }

    fn service(&self) -> Option<&SensorThingsService> {
        self.meta().service()
    }

    fn is_attached(&self) -> bool {
        self.meta().service.is_some()
    }

    /// Attach `service` to this entity and every expanded relation.
    fn attach(&mut self, service: &SensorThingsService) {
        self.meta_mut().service = Some(service.clone());
        self.attach_nested(service);
    }

    fn detach(&mut self) {
        self.meta_mut().service = None;
    }

    fn attach_nested(&mut self, service: &SensorThingsService);

    /// Fill `#[serde(skip)]` SWE members from the raw JSON object.
    fn resolve_polymorphic(
        &mut self,
        codec: &SweCodec,
        raw: &Map<String, Value>,
    ) -> Result<(), CodecError>;

    /// Write SWE members into the serde-encoded JSON object.
    fn encode_polymorphic(
        &self,
        codec: &SweCodec,
        out: &mut Map<String, Value>,
    ) -> Result<(), CodecError>;

    /// DAO for `U` scoped under this entity, e.g. a Thing's Datastreams.
    fn related<U: Entity>(&self) -> Result<Dao<U>, Error> {
        let service = self.service().ok_or(Error::NotAttached(Self::TYPE))?;
        Ok(service.dao::<U>().with_parent_ref(self.entity_ref()?))
    }
}

// ── Lazy singleton navigation ────────────────────────────────────────

/// Return the memoized related entity, fetching `Owner(id)/Singular` on
/// first use.
pub(crate) async fn navigate<'a, U: Entity>(
    owner_type: EntityType,
    meta: &EntityMeta,
    slot: &'a mut Option<Box<U>>,
) -> Result<&'a U, Error> {
    let related = match slot.take() {
        Some(related) => related,
        None => {
            let service = meta.service().ok_or(Error::NotAttached(owner_type))?;
            let id = meta.id.clone().ok_or(Error::MissingId(owner_type))?;
            let parent = EntityRef::new(owner_type, id);
            Box::new(service.dao::<U>().find_related(&parent).await?)
        }
    };
    Ok(&**slot.insert(related))
}

// ── Recursion helpers used by `impl_entity!` ─────────────────────────

pub(crate) fn resolve_one<U: Entity>(
    slot: &mut Option<Box<U>>,
    raw: &Map<String, Value>,
    name: &str,
    codec: &SweCodec,
) -> Result<(), CodecError> {
    if let (Some(related), Some(Value::Object(members))) = (slot.as_deref_mut(), raw.get(name)) {
        related.resolve_polymorphic(codec, members)?;
    }
    Ok(())
}

pub(crate) fn resolve_many<U: Entity>(
    slot: &mut [U],
    raw: &Map<String, Value>,
    name: &str,
    codec: &SweCodec,
) -> Result<(), CodecError> {
    if let Some(Value::Array(items)) = raw.get(name) {
        for (related, item) in slot.iter_mut().zip(items) {
            if let Value::Object(members) = item {
                related.resolve_polymorphic(codec, members)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn encode_one<U: Entity>(
    slot: Option<&U>,
    out: &mut Map<String, Value>,
    name: &str,
    codec: &SweCodec,
) -> Result<(), CodecError> {
    if let (Some(related), Some(Value::Object(members))) = (slot, out.get_mut(name)) {
        related.encode_polymorphic(codec, members)?;
    }
    Ok(())
}

pub(crate) fn encode_many<U: Entity>(
    slot: &[U],
    out: &mut Map<String, Value>,
    name: &str,
    codec: &SweCodec,
) -> Result<(), CodecError> {
    if let Some(Value::Array(items)) = out.get_mut(name) {
        for (related, item) in slot.iter().zip(items) {
            if let Value::Object(members) = item {
                related.encode_polymorphic(codec, members)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn resolve_record(
    raw: &Map<String, Value>,
    name: &str,
    codec: &SweCodec,
) -> Result<Option<DataRecord>, CodecError> {
    match raw.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => codec.decode_component_of::<DataRecord>(value).map(Some),
    }
}

pub(crate) fn encode_record(
    record: Option<&DataRecord>,
    out: &mut Map<String, Value>,
    name: &str,
    codec: &SweCodec,
) -> Result<(), CodecError> {
    if let Some(record) = record {
        out.insert(name.to_owned(), codec.encode_component(record)?);
    }
    Ok(())
}

/// Keeps an explicit JSON `null` as `Some(Value::Null)`.
pub(crate) fn deserialize_some<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Implements [`Entity`] for a struct with a `meta` field.
///
/// `one` lists singleton relation fields, `many` collection fields, `swe`
/// fields holding a SWE `DataRecord`; each with its wire name.
macro_rules! impl_entity {
    (
        $ty:ident {
            $(one { $($one:ident: $one_name:literal),* $(,)? })?
            $(many { $($many:ident: $many_name:literal),* $(,)? })?
            $(swe { $($swe:ident: $swe_name:literal),* $(,)? })?
        }
    ) => {
        impl $crate::model::Entity for $ty {
            const TYPE: $crate::model::EntityType = $crate::model::EntityType::$ty;
            const RELATIONS: &'static [&'static str] =
                &[$($($one_name,)*)? $($($many_name,)*)?];

            fn meta(&self) -> &$crate::model::EntityMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut $crate::model::EntityMeta {
                &mut self.meta
            }

            #[allow(unused_variables)]
            fn attach_nested(&mut self, service: &$crate::service::SensorThingsService) {
                $($(
                    if let Some(related) = self.$one.as_deref_mut() {
                        $crate::model::Entity::attach(related, service);
                    }
                )*)?
                $($(
                    for related in &mut self.$many {
                        $crate::model::Entity::attach(related, service);
                    }
                )*)?
            }

            #[allow(unused_variables)]
            fn resolve_polymorphic(
                &mut self,
                codec: &stalink_swe::SweCodec,
                raw: &serde_json::Map<String, serde_json::Value>,
            ) -> Result<(), stalink_swe::CodecError> {
                $($(
                    self.$swe = $crate::model::entity::resolve_record(raw, $swe_name, codec)?;
                )*)?
                $($(
                    $crate::model::entity::resolve_one(&mut self.$one, raw, $one_name, codec)?;
                )*)?
                $($(
                    $crate::model::entity::resolve_many(&mut self.$many, raw, $many_name, codec)?;
                )*)?
                Ok(())
            }

            #[allow(unused_variables)]
            fn encode_polymorphic(
                &self,
                codec: &stalink_swe::SweCodec,
                out: &mut serde_json::Map<String, serde_json::Value>,
            ) -> Result<(), stalink_swe::CodecError> {
                $($(
                    $crate::model::entity::encode_record(self.$swe.as_ref(), out, $swe_name, codec)?;
                )*)?
                $($(
                    $crate::model::entity::encode_one(self.$one.as_deref(), out, $one_name, codec)?;
                )*)?
                $($(
                    $crate::model::entity::encode_many(&self.$many, out, $many_name, codec)?;
                )*)?
                Ok(())
            }
        }
    };
}

pub(crate) use impl_entity;
