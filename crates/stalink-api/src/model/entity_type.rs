use serde::{Deserialize, Serialize};

/// Closed set of resource kinds a SensorThings service exposes.
///
/// Displays as the singular name (`Thing`), which is also the name of a
/// singleton navigation property pointing at this type.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
pub enum EntityType {
    Thing,
    Location,
    HistoricalLocation,
    Datastream,
    MultiDatastream,
    Sensor,
    ObservedProperty,
    Observation,
    FeatureOfInterest,
    Actuator,
    TaskingCapability,
    Task,
}

impl EntityType {
    pub const ALL: [Self; 12] = [
        Self::Thing,
        Self::Location,
        Self::HistoricalLocation,
        Self::Datastream,
        Self::MultiDatastream,
        Self::Sensor,
        Self::ObservedProperty,
        Self::Observation,
        Self::FeatureOfInterest,
        Self::Actuator,
        Self::TaskingCapability,
        Self::Task,
    ];

    /// Singular path segment / singleton relation name.
    pub fn singular(self) -> &'static str {
        self.into()
    }

    /// Plural path segment / collection relation name.
    pub fn plural(self) -> &'static str {
        match self {
            Self::Thing => "Things",
            Self::Location => "Locations",
            Self::HistoricalLocation => "HistoricalLocations",
            Self::Datastream => "Datastreams",
            Self::MultiDatastream => "MultiDatastreams",
            Self::Sensor => "Sensors",
            Self::ObservedProperty => "ObservedProperties",
            Self::Observation => "Observations",
            Self::FeatureOfInterest => "FeaturesOfInterest",
            Self::Actuator => "Actuators",
            Self::TaskingCapability => "TaskingCapabilities",
            Self::Task => "Tasks",
        }
    }

    /// Match either the singular or the plural segment, case-sensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.singular() == name || t.plural() == name)
    }

    /// Position in [`ALL`](Self::ALL).
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Thing => 0,
            Self::Location => 1,
            Self::HistoricalLocation => 2,
            Self::Datastream => 3,
            Self::MultiDatastream => 4,
            Self::Sensor => 5,
            Self::ObservedProperty => 6,
            Self::Observation => 7,
            Self::FeatureOfInterest => 8,
            Self::Actuator => 9,
            Self::TaskingCapability => 10,
            Self::Task => 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_both_ways() {
        assert_eq!(EntityType::from_name("FeaturesOfInterest"), Some(EntityType::FeatureOfInterest));
        assert_eq!(EntityType::from_name("Thing"), Some(EntityType::Thing));
        assert_eq!(EntityType::from_name("things"), None);
        assert_eq!(EntityType::ObservedProperty.to_string(), "ObservedProperty");
    }

    #[test]
    fn index_matches_all_order() {
        for (position, entity_type) in EntityType::ALL.into_iter().enumerate() {
            assert_eq!(entity_type.index(), position);
        }
    }
}
