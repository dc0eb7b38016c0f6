// ── Tasking entities ──
//
// Actuators, the capabilities they expose on a Thing, and the Tasks sent
// to them. A capability describes its accepted parameters as a SWE
// `DataRecord`, resolved through the service's codec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stalink_swe::DataRecord;

use super::entity::{EntityMeta, impl_entity, navigate};
use super::{Entity, EntityType, Thing};
use crate::error::Error;

// ── Actuator ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actuator {
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

    #[serde(rename = "TaskingCapabilities", default, skip_serializing_if = "Vec::is_empty")]
    pub tasking_capabilities: Vec<TaskingCapability>,
}

impl_entity!(Actuator {
    many { tasking_capabilities: "TaskingCapabilities" }
});

// ── TaskingCapability ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskingCapability {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    /// Resolved by the SWE codec, not by serde.
    #[serde(skip)]
    pub tasking_parameters: Option<DataRecord>,

    #[serde(rename = "Thing", default, skip_serializing_if = "Option::is_none")]
    pub thing: Option<Box<Thing>>,
    #[serde(rename = "Actuator", default, skip_serializing_if = "Option::is_none")]
    pub actuator: Option<Box<Actuator>>,
    #[serde(rename = "Tasks", default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
}

impl TaskingCapability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: DataRecord) -> Self {
        self.tasking_parameters = Some(parameters);
        self
    }

    pub async fn thing(&mut self) -> Result<&Thing, Error> {
        navigate(EntityType::TaskingCapability, &self.meta, &mut self.thing).await
    }

    pub async fn actuator(&mut self) -> Result<&Actuator, Error> {
        navigate(EntityType::TaskingCapability, &self.meta, &mut self.actuator).await
    }
}

impl_entity!(TaskingCapability {
    one {
        thing: "Thing",
        actuator: "Actuator",
    }
    many { tasks: "Tasks" }
    swe { tasking_parameters: "taskingParameters" }
});

// ── Task ─────────────────────────────────────────────────────────────

/// A request to an actuator. `tasking_parameters` holds plain values keyed
/// by the field names of the capability's parameter record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasking_parameters: Option<Map<String, Value>>,

    #[serde(rename = "TaskingCapability", default, skip_serializing_if = "Option::is_none")]
    pub tasking_capability: Option<Box<TaskingCapability>>,
}

impl Task {
    /// A task for `capability` carrying `parameters`.
    pub fn new(capability: &TaskingCapability, parameters: Map<String, Value>) -> Self {
        Self {
            tasking_parameters: Some(parameters),
            tasking_capability: capability
                .id()
                .cloned()
                .map(|id| Box::new(TaskingCapability::reference(id))),
            ..Self::default()
        }
    }

    pub async fn tasking_capability(&mut self) -> Result<&TaskingCapability, Error> {
        navigate(EntityType::Task, &self.meta, &mut self.tasking_capability).await
    }
}

impl_entity!(Task {
    one { tasking_capability: "TaskingCapability" }
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use stalink_swe::{AllowedTokens, Category, SweCodec, Text};

    use super::*;
    use crate::model::Id;

    fn codec() -> SweCodec {
        SweCodec::new().unwrap()
    }

    #[test]
    fn serde_alone_leaves_parameters_unresolved() {
        let capability: TaskingCapability = serde_json::from_value(json!({
            "@iot.id": 1,
            "name": "Switch",
            "taskingParameters": { "type": "DataRecord", "field": [] }
        }))
        .unwrap();
        assert!(capability.tasking_parameters.is_none());
    }

    #[test]
    fn resolves_parameters_in_nested_capabilities() {
        let raw = json!({
            "@iot.id": 9,
            "name": "Lamp actuator",
            "TaskingCapabilities": [{
                "@iot.id": 1,
                "taskingParameters": {
                    "type": "DataRecord",
                    "field": [{
                        "type": "Category",
                        "name": "status",
                        "constraint": { "type": "AllowedTokens", "value": ["on", "off"] }
                    }]
                }
            }]
        });
        let mut actuator: Actuator = serde_json::from_value(raw.clone()).unwrap();
        actuator
            .resolve_polymorphic(&codec(), raw.as_object().unwrap())
            .unwrap();

        let record = actuator.tasking_capabilities[0]
            .tasking_parameters
            .as_ref()
            .unwrap();
        let status = record
            .field_named("status")
            .unwrap()
            .downcast_ref::<Category>()
            .unwrap();
        let tokens = status
            .constraint
            .as_deref()
            .unwrap()
            .downcast_ref::<AllowedTokens>()
            .unwrap();
        assert!(tokens.allows("on"));
    }

    #[test]
    fn encodes_parameters_through_codec() {
        let capability = TaskingCapability::new("Switch", "On/off")
            .with_parameters(DataRecord::default().with_field("label", Text::default()));
        let mut out = serde_json::to_value(&capability)
            .unwrap()
            .as_object()
            .cloned()
            .unwrap();
        capability.encode_polymorphic(&codec(), &mut out).unwrap();
        assert_eq!(
            Value::Object(out),
            json!({
                "name": "Switch",
                "description": "On/off",
                "taskingParameters": {
                    "type": "DataRecord",
                    "field": [{ "type": "Text", "name": "label" }]
                }
            })
        );
    }

    #[test]
    fn task_links_capability_by_reference() {
        let capability = TaskingCapability::reference(Id::Long(4));
        let mut parameters = Map::new();
        parameters.insert("status".into(), json!("on"));
        let task = Task::new(&capability, parameters);
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            json!({
                "taskingParameters": { "status": "on" },
                "TaskingCapability": { "@iot.id": 4 }
            })
        );
    }
}
