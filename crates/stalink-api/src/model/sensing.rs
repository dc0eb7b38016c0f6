// ── Sensing entities ──
//
// Things, their locations, and the datastream/observation graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::{EntityMeta, deserialize_some, impl_entity, navigate};
use super::{Entity, EntityType, TaskingCapability, TimeObject, UnitOfMeasurement};
use crate::error::Error;

// ── Thing ────────────────────────────────────────────────────────────

/// An object of the physical or virtual world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thing {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    #[serde(rename = "Locations", default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(rename = "HistoricalLocations", default, skip_serializing_if = "Vec::is_empty")]
    pub historical_locations: Vec<HistoricalLocation>,
    #[serde(rename = "Datastreams", default, skip_serializing_if = "Vec::is_empty")]
    pub datastreams: Vec<Datastream>,
    #[serde(rename = "MultiDatastreams", default, skip_serializing_if = "Vec::is_empty")]
    pub multi_datastreams: Vec<MultiDatastream>,
    #[serde(rename = "TaskingCapabilities", default, skip_serializing_if = "Vec::is_empty")]
    pub tasking_capabilities: Vec<TaskingCapability>,
}

impl Thing {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
            ..Self::default()
        }
    }
}

impl_entity!(Thing {
    many {
        locations: "Locations",
        historical_locations: "HistoricalLocations",
        datastreams: "Datastreams",
        multi_datastreams: "MultiDatastreams",
        tasking_capabilities: "TaskingCapabilities",
    }
});

// ── Location ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_type: Option<String>,
    /// GeoJSON geometry or feature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    #[serde(rename = "Things", default, skip_serializing_if = "Vec::is_empty")]
    pub things: Vec<Thing>,
    #[serde(rename = "HistoricalLocations", default, skip_serializing_if = "Vec::is_empty")]
    pub historical_locations: Vec<HistoricalLocation>,
}

impl Location {
    /// A GeoJSON location.
    pub fn geojson(name: impl Into<String>, description: impl Into<String>, geometry: Value) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
            encoding_type: Some("application/geo+json".to_owned()),
            location: Some(geometry),
            ..Self::default()
        }
    }
}

impl_entity!(Location {
    many {
        things: "Things",
        historical_locations: "HistoricalLocations",
    }
});

// ── HistoricalLocation ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalLocation {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    #[serde(rename = "Thing", default, skip_serializing_if = "Option::is_none")]
    pub thing: Option<Box<Thing>>,
    #[serde(rename = "Locations", default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
}

impl HistoricalLocation {
    pub async fn thing(&mut self) -> Result<&Thing, Error> {
        navigate(EntityType::HistoricalLocation, &self.meta, &mut self.thing).await
    }
}

impl_entity!(HistoricalLocation {
    one { thing: "Thing" }
    many { locations: "Locations" }
});

// ── Datastream ───────────────────────────────────────────────────────

/// Groups observations of one observed property made by one sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastream {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<UnitOfMeasurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_area: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phenomenon_time: Option<TimeObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_time: Option<TimeObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    #[serde(rename = "Thing", default, skip_serializing_if = "Option::is_none")]
    pub thing: Option<Box<Thing>>,
    #[serde(rename = "Sensor", default, skip_serializing_if = "Option::is_none")]
    pub sensor: Option<Box<Sensor>>,
    #[serde(rename = "ObservedProperty", default, skip_serializing_if = "Option::is_none")]
    pub observed_property: Option<Box<ObservedProperty>>,
    #[serde(rename = "Observations", default, skip_serializing_if = "Vec::is_empty")]
    pub observations: Vec<Observation>,
}

impl Datastream {
    pub async fn thing(&mut self) -> Result<&Thing, Error> {
        navigate(EntityType::Datastream, &self.meta, &mut self.thing).await
    }

    pub async fn sensor(&mut self) -> Result<&Sensor, Error> {
        navigate(EntityType::Datastream, &self.meta, &mut self.sensor).await
    }

    pub async fn observed_property(&mut self) -> Result<&ObservedProperty, Error> {
        navigate(EntityType::Datastream, &self.meta, &mut self.observed_property).await
    }
}

impl_entity!(Datastream {
    one {
        thing: "Thing",
        sensor: "Sensor",
        observed_property: "ObservedProperty",
    }
    many { observations: "Observations" }
});

// ── MultiDatastream ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiDatastream {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unit_of_measurements: Vec<UnitOfMeasurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multi_observation_data_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_area: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phenomenon_time: Option<TimeObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_time: Option<TimeObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    #[serde(rename = "Thing", default, skip_serializing_if = "Option::is_none")]
    pub thing: Option<Box<Thing>>,
    #[serde(rename = "Sensor", default, skip_serializing_if = "Option::is_none")]
    pub sensor: Option<Box<Sensor>>,
    #[serde(rename = "ObservedProperties", default, skip_serializing_if = "Vec::is_empty")]
    pub observed_properties: Vec<ObservedProperty>,
    #[serde(rename = "Observations", default, skip_serializing_if = "Vec::is_empty")]
    pub observations: Vec<Observation>,
}

impl MultiDatastream {
    pub async fn thing(&mut self) -> Result<&Thing, Error> {
        navigate(EntityType::MultiDatastream, &self.meta, &mut self.thing).await
    }

    pub async fn sensor(&mut self) -> Result<&Sensor, Error> {
        navigate(EntityType::MultiDatastream, &self.meta, &mut self.sensor).await
    }
}

impl_entity!(MultiDatastream {
    one {
        thing: "Thing",
        sensor: "Sensor",
    }
    many {
        observed_properties: "ObservedProperties",
        observations: "Observations",
    }
});

// ── Sensor ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    #[serde(rename = "Datastreams", default, skip_serializing_if = "Vec::is_empty")]
    pub datastreams: Vec<Datastream>,
    #[serde(rename = "MultiDatastreams", default, skip_serializing_if = "Vec::is_empty")]
    pub multi_datastreams: Vec<MultiDatastream>,
}

impl_entity!(Sensor {
    many {
        datastreams: "Datastreams",
        multi_datastreams: "MultiDatastreams",
    }
});

// ── ObservedProperty ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedProperty {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    #[serde(rename = "Datastreams", default, skip_serializing_if = "Vec::is_empty")]
    pub datastreams: Vec<Datastream>,
    #[serde(rename = "MultiDatastreams", default, skip_serializing_if = "Vec::is_empty")]
    pub multi_datastreams: Vec<MultiDatastream>,
}

impl_entity!(ObservedProperty {
    many {
        datastreams: "Datastreams",
        multi_datastreams: "MultiDatastreams",
    }
});

// ── Observation ──────────────────────────────────────────────────────

/// A single measured value.
///
/// `result` distinguishes "unset" (`None`, omitted on the wire) from an
/// explicit JSON `null` (`Some(Value::Null)`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phenomenon_time: Option<TimeObject>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_quality: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_time: Option<TimeObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,

    #[serde(rename = "Datastream", default, skip_serializing_if = "Option::is_none")]
    pub datastream: Option<Box<Datastream>>,
    #[serde(rename = "MultiDatastream", default, skip_serializing_if = "Option::is_none")]
    pub multi_datastream: Option<Box<MultiDatastream>>,
    #[serde(rename = "FeatureOfInterest", default, skip_serializing_if = "Option::is_none")]
    pub feature_of_interest: Option<Box<FeatureOfInterest>>,
}

impl Observation {
    /// Observation of `result` now, linked to `datastream`.
    pub fn new(result: impl Into<Value>, datastream: &Datastream) -> Self {
        Self {
            phenomenon_time: Some(TimeObject::now()),
            result: Some(result.into()),
            datastream: datastream
                .meta
                .id
                .clone()
                .map(|id| Box::new(Datastream::reference(id))),
            ..Self::default()
        }
    }

    pub fn is_result_set(&self) -> bool {
        self.result.is_some()
    }

    pub async fn datastream(&mut self) -> Result<&Datastream, Error> {
        navigate(EntityType::Observation, &self.meta, &mut self.datastream).await
    }

    pub async fn multi_datastream(&mut self) -> Result<&MultiDatastream, Error> {
        navigate(EntityType::Observation, &self.meta, &mut self.multi_datastream).await
    }

    pub async fn feature_of_interest(&mut self) -> Result<&FeatureOfInterest, Error> {
        navigate(EntityType::Observation, &self.meta, &mut self.feature_of_interest).await
    }
}

impl_entity!(Observation {
    one {
        datastream: "Datastream",
        multi_datastream: "MultiDatastream",
        feature_of_interest: "FeatureOfInterest",
    }
});

// ── FeatureOfInterest ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureOfInterest {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    #[serde(rename = "Observations", default, skip_serializing_if = "Vec::is_empty")]
    pub observations: Vec<Observation>,
}

impl_entity!(FeatureOfInterest {
    many { observations: "Observations" }
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::{Entity, Id};

    #[test]
    fn decodes_ids_and_ignores_navigation_links() {
        let thing: Thing = serde_json::from_value(json!({
            "@iot.id": 1,
            "@iot.selfLink": "http://example.org/v1.1/Things(1)",
            "Datastreams@iot.navigationLink": "Things(1)/Datastreams",
            "name": "Lamp",
            "description": "Desk lamp"
        }))
        .unwrap();
        assert_eq!(thing.id(), Some(&Id::Long(1)));
        assert_eq!(thing.meta.self_link.as_deref(), Some("http://example.org/v1.1/Things(1)"));
        assert_eq!(thing.name.as_deref(), Some("Lamp"));
    }

    #[test]
    fn self_link_is_never_written() {
        let mut thing = Thing::new("Lamp", "Desk lamp");
        thing.meta.self_link = Some("http://example.org/v1.1/Things(1)".into());
        thing.set_id(Id::Long(1));
        assert_eq!(
            serde_json::to_value(&thing).unwrap(),
            json!({ "@iot.id": 1, "name": "Lamp", "description": "Desk lamp" })
        );
    }

    #[test]
    fn explicit_null_result_is_preserved() {
        let obs: Observation = serde_json::from_value(json!({ "result": null })).unwrap();
        assert_eq!(obs.result, Some(Value::Null));
        assert_eq!(serde_json::to_value(&obs).unwrap(), json!({ "result": null }));

        let obs: Observation = serde_json::from_value(json!({})).unwrap();
        assert!(!obs.is_result_set());
        assert_eq!(serde_json::to_value(&obs).unwrap(), json!({}));
    }

    #[test]
    fn observation_links_datastream_by_reference() {
        let datastream = Datastream::reference(5_i64);
        let mut obs = Observation::new(21.5, &datastream);
        obs.phenomenon_time = Some("2024-01-01T00:00:00Z".parse().unwrap());
        assert_eq!(
            serde_json::to_value(&obs).unwrap(),
            json!({
                "phenomenonTime": "2024-01-01T00:00:00Z",
                "result": 21.5,
                "Datastream": { "@iot.id": 5 }
            })
        );
    }

    #[tokio::test]
    async fn navigation_on_detached_entity_fails_locally() {
        let mut obs = Observation::default();
        obs.set_id(Id::Long(7));
        let err = obs.datastream().await.unwrap_err();
        assert!(matches!(err, Error::NotAttached(EntityType::Observation)));
    }

    #[tokio::test]
    async fn navigation_uses_expanded_value_without_service() {
        let mut obs: Observation = serde_json::from_value(json!({
            "@iot.id": 7,
            "result": 1,
            "Datastream": { "@iot.id": 3, "name": "Temperature" }
        }))
        .unwrap();
        let datastream = obs.datastream().await.unwrap();
        assert_eq!(datastream.name.as_deref(), Some("Temperature"));
    }
}
