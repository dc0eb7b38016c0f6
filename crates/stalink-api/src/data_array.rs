// ── dataArray batch format ──
//
// Observations grouped per (Multi)Datastream and sent as rows of values
// under a shared component list, for the `CreateObservations` action.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::Error;
use crate::model::{Datastream, Entity, Id, MultiDatastream, Observation};

/// Observation member carried in a dataArray row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
pub enum DataArrayComponent {
    #[strum(serialize = "id")]
    Id,
    #[strum(serialize = "phenomenonTime")]
    PhenomenonTime,
    #[strum(serialize = "result")]
    Result,
    #[strum(serialize = "resultTime")]
    ResultTime,
    #[strum(serialize = "resultQuality")]
    ResultQuality,
    #[strum(serialize = "validTime")]
    ValidTime,
    #[strum(serialize = "parameters")]
    Parameters,
    #[strum(serialize = "FeatureOfInterest/id")]
    FeatureOfInterestId,
}

impl DataArrayComponent {
    fn cell(self, observation: &Observation) -> Value {
        let encode = |value: Option<String>| value.map_or(Value::Null, Value::String);
        match self {
            Self::Id => observation.id().map_or(Value::Null, |id| json!(id)),
            Self::PhenomenonTime => encode(observation.phenomenon_time.map(|t| t.to_string())),
            Self::Result => observation.result.clone().unwrap_or(Value::Null),
            Self::ResultTime => encode(observation.result_time.map(|t| t.to_rfc3339())),
            Self::ResultQuality => observation.result_quality.clone().unwrap_or(Value::Null),
            Self::ValidTime => encode(observation.valid_time.map(|t| t.to_string())),
            Self::Parameters => observation
                .parameters
                .clone()
                .map_or(Value::Null, Value::Object),
            Self::FeatureOfInterestId => observation
                .feature_of_interest
                .as_deref()
                .and_then(Entity::id)
                .map_or(Value::Null, |id| json!(id)),
        }
    }
}

/// Observations of one (Multi)Datastream sharing a component list.
#[derive(Debug, Clone)]
pub struct DataArrayValue {
    datastream: Option<Id>,
    multi_datastream: Option<Id>,
    components: Vec<DataArrayComponent>,
    observations: Vec<Observation>,
}

impl DataArrayValue {
    pub fn for_datastream(
        datastream: &Datastream,
        components: Vec<DataArrayComponent>,
    ) -> Result<Self, Error> {
        Ok(Self {
            datastream: Some(datastream.entity_ref()?.id),
            multi_datastream: None,
            components,
            observations: Vec::new(),
        })
    }

    pub fn for_multi_datastream(
        multi_datastream: &MultiDatastream,
        components: Vec<DataArrayComponent>,
    ) -> Result<Self, Error> {
        Ok(Self {
            datastream: None,
            multi_datastream: Some(multi_datastream.entity_ref()?.id),
            components,
            observations: Vec::new(),
        })
    }

    pub fn add_observation(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    pub fn components(&self) -> &[DataArrayComponent] {
        &self.components
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    fn rows(&self) -> Vec<Vec<Value>> {
        self.observations
            .iter()
            .map(|observation| {
                self.components
                    .iter()
                    .map(|component| component.cell(observation))
                    .collect()
            })
            .collect()
    }
}

impl Serialize for DataArrayValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = &self.datastream {
            map.serialize_entry("Datastream", &json!({ "@iot.id": id }))?;
        }
        if let Some(id) = &self.multi_datastream {
            map.serialize_entry("MultiDatastream", &json!({ "@iot.id": id }))?;
        }
        let names: Vec<&'static str> = self.components.iter().copied().map(Into::into).collect();
        map.serialize_entry("components", &names)?;
        map.serialize_entry("dataArray@iot.count", &self.observations.len())?;
        map.serialize_entry("dataArray", &self.rows())?;
        map.end()
    }
}

/// A `CreateObservations` request body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DataArrayDocument {
    value: Vec<DataArrayValue>,
}

impl DataArrayDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: DataArrayValue) {
        self.value.push(value);
    }

    pub fn values(&self) -> &[DataArrayValue] {
        &self.value
    }

    pub fn observation_count(&self) -> usize {
        self.value.iter().map(|v| v.observations.len()).sum()
    }

    /// All observations, in submission order.
    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.value.iter().flat_map(|v| v.observations.iter())
    }

    pub(crate) fn observations_mut(&mut self) -> impl Iterator<Item = &mut Observation> {
        self.value.iter_mut().flat_map(|v| v.observations.iter_mut())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::FeatureOfInterest;

    #[test]
    fn serializes_rows_in_component_order() {
        let datastream = Datastream::reference(1_i64);
        let mut value = DataArrayValue::for_datastream(
            &datastream,
            vec![
                DataArrayComponent::PhenomenonTime,
                DataArrayComponent::Result,
                DataArrayComponent::FeatureOfInterestId,
            ],
        )
        .unwrap();
        for (minute, result) in [(0, 20), (1, 21)] {
            let mut obs = Observation::new(result, &datastream);
            obs.phenomenon_time = Some(format!("2024-01-01T00:0{minute}:00Z").parse().unwrap());
            obs.feature_of_interest = Some(Box::new(FeatureOfInterest::reference(7_i64)));
            value.add_observation(obs);
        }
        let mut document = DataArrayDocument::new();
        document.add(value);

        assert_eq!(document.observation_count(), 2);
        assert_eq!(
            serde_json::to_value(&document).unwrap(),
            json!([{
                "Datastream": { "@iot.id": 1 },
                "components": ["phenomenonTime", "result", "FeatureOfInterest/id"],
                "dataArray@iot.count": 2,
                "dataArray": [
                    ["2024-01-01T00:00:00Z", 20, 7],
                    ["2024-01-01T00:01:00Z", 21, 7]
                ]
            }])
        );
    }

    #[test]
    fn datastream_without_id_is_rejected() {
        let err = DataArrayValue::for_datastream(&Datastream::default(), vec![]).unwrap_err();
        assert!(matches!(err, Error::MissingId(_)));
    }
}
