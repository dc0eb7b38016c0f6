// ── Entity-relationship graph ──
//
// Static catalog of every entity type: path segments, declared simple
// properties, navigation relations and create-time validators. Paths and
// MQTT topics are derived from here, and every structural check happens
// against it before a request is built.

use std::fmt;

use serde_json::{Map, Value};

use super::{EntityType, Id};
use crate::error::Error;
use crate::path::EntityRef;

/// Create-time check over the encoded JSON object of an entity.
pub type Validator = fn(&Map<String, Value>) -> Result<(), String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Singleton navigation, named by the target's singular name.
    One,
    /// Collection navigation, named by the target's plural name.
    Many,
}

impl Cardinality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::One => "singleton",
            Self::Many => "collection",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed navigation from one type to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub target: EntityType,
    pub cardinality: Cardinality,
}

impl Relation {
    /// Navigation property name, e.g. `Datastream` or `Observations`.
    pub fn name(&self) -> &'static str {
        match self.cardinality {
            Cardinality::One => self.target.singular(),
            Cardinality::Many => self.target.plural(),
        }
    }
}

/// Catalog entry for one entity type.
#[derive(Debug)]
pub struct TypeInfo {
    pub entity_type: EntityType,
    pub properties: &'static [&'static str],
    pub relations: Vec<Relation>,
    pub validator: Option<Validator>,
}

/// Immutable entity-relationship graph. Build once, share behind an `Arc`.
#[derive(Debug)]
pub struct EntityGraph {
    types: Vec<TypeInfo>,
}

fn one(target: EntityType) -> Relation {
    Relation {
        target,
        cardinality: Cardinality::One,
    }
}

fn many(target: EntityType) -> Relation {
    Relation {
        target,
        cardinality: Cardinality::Many,
    }
}

fn observation_has_result(encoded: &Map<String, Value>) -> Result<(), String> {
    if encoded.contains_key("result") {
        Ok(())
    } else {
        Err("result must be set on Observation".to_owned())
    }
}

impl EntityGraph {
    /// SensorThings v1.1 sensing and tasking catalog.
    pub fn sensorthings() -> Self {
        use EntityType as T;

        let types = T::ALL
            .into_iter()
            .map(|entity_type| {
                let (properties, relations): (&'static [&'static str], Vec<Relation>) =
                    match entity_type {
                        T::Thing => (
                            &["name", "description", "properties"],
                            vec![
                                many(T::Location),
                                many(T::HistoricalLocation),
                                many(T::Datastream),
                                many(T::MultiDatastream),
                                many(T::TaskingCapability),
                            ],
                        ),
                        T::Location => (
                            &["name", "description", "encodingType", "location", "properties"],
                            vec![many(T::Thing), many(T::HistoricalLocation)],
                        ),
                        T::HistoricalLocation => {
                            (&["time"], vec![one(T::Thing), many(T::Location)])
                        }
                        T::Datastream => (
                            &[
                                "name",
                                "description",
                                "unitOfMeasurement",
                                "observationType",
                                "observedArea",
                                "phenomenonTime",
                                "resultTime",
                                "properties",
                            ],
                            vec![
                                one(T::Thing),
                                one(T::Sensor),
                                one(T::ObservedProperty),
                                many(T::Observation),
                            ],
                        ),
                        T::MultiDatastream => (
                            &[
                                "name",
                                "description",
                                "unitOfMeasurements",
                                "observationType",
                                "multiObservationDataTypes",
                                "observedArea",
                                "phenomenonTime",
                                "resultTime",
                                "properties",
                            ],
                            vec![
                                one(T::Thing),
                                one(T::Sensor),
                                many(T::ObservedProperty),
                                many(T::Observation),
                            ],
                        ),
                        T::Sensor => (
                            &["name", "description", "encodingType", "metadata", "properties"],
                            vec![many(T::Datastream), many(T::MultiDatastream)],
                        ),
                        T::ObservedProperty => (
                            &["name", "definition", "description", "properties"],
                            vec![many(T::Datastream), many(T::MultiDatastream)],
                        ),
                        T::Observation => (
                            &[
                                "phenomenonTime",
                                "result",
                                "resultTime",
                                "resultQuality",
                                "validTime",
                                "parameters",
                            ],
                            vec![
                                one(T::Datastream),
                                one(T::MultiDatastream),
                                one(T::FeatureOfInterest),
                            ],
                        ),
                        T::FeatureOfInterest => (
                            &["name", "description", "encodingType", "feature", "properties"],
                            vec![many(T::Observation)],
                        ),
                        T::Actuator => (
                            &["name", "description", "encodingType", "metadata", "properties"],
                            vec![many(T::TaskingCapability)],
                        ),
                        T::TaskingCapability => (
                            &["name", "description", "properties", "taskingParameters"],
                            vec![one(T::Thing), one(T::Actuator), many(T::Task)],
                        ),
                        T::Task => (
                            &["creationTime", "taskingParameters"],
                            vec![one(T::TaskingCapability)],
                        ),
                    };
                let validator: Option<Validator> = match entity_type {
                    T::Observation => Some(observation_has_result),
                    _ => None,
                };
                TypeInfo {
                    entity_type,
                    properties,
                    relations,
                    validator,
                }
            })
            .collect();

        Self { types }
    }

    pub fn info(&self, entity_type: EntityType) -> &TypeInfo {
        &self.types[entity_type.index()]
    }

    // ── Catalog queries ──────────────────────────────────────────────

    pub fn plural_path(&self, entity_type: EntityType) -> &'static str {
        entity_type.plural()
    }

    pub fn singular_path(&self, entity_type: EntityType) -> &'static str {
        entity_type.singular()
    }

    pub fn declared_properties(&self, entity_type: EntityType) -> &'static [&'static str] {
        self.info(entity_type).properties
    }

    pub fn relations(&self, entity_type: EntityType) -> &[Relation] {
        &self.info(entity_type).relations
    }

    pub fn validator(&self, entity_type: EntityType) -> Option<Validator> {
        self.info(entity_type).validator
    }

    /// Relation from `from` to `to`, of either cardinality.
    pub fn relation(&self, from: EntityType, to: EntityType) -> Option<&Relation> {
        self.relations(from).iter().find(|r| r.target == to)
    }

    pub fn has_relation_to(&self, from: EntityType, to: EntityType) -> bool {
        self.relation(from, to).is_some()
    }

    /// Look up a navigation property of `from` by its wire name.
    pub fn relation_named(&self, from: EntityType, name: &str) -> Option<&Relation> {
        self.relations(from).iter().find(|r| r.name() == name)
    }

    pub fn entity_type_for_name(&self, name: &str) -> Option<EntityType> {
        EntityType::from_name(name)
    }

    // ── Structural checks ────────────────────────────────────────────

    /// Require `parent -> child` to exist with the given cardinality.
    pub fn require_relation(
        &self,
        parent: EntityType,
        child: EntityType,
        cardinality: Cardinality,
    ) -> Result<&Relation, Error> {
        self.relation(parent, child)
            .filter(|r| r.cardinality == cardinality)
            .ok_or(Error::NotRelated {
                parent,
                child,
                cardinality: cardinality.as_str(),
            })
    }

    /// Every name in `properties` must be declared on `entity_type`. `id`
    /// is always accepted.
    pub fn validate_select<S: AsRef<str>>(
        &self,
        entity_type: EntityType,
        properties: &[S],
    ) -> Result<(), Error> {
        let declared = self.declared_properties(entity_type);
        for property in properties {
            let property = property.as_ref();
            if property != "id" && !declared.contains(&property) {
                return Err(Error::UnknownProperty {
                    entity_type,
                    property: property.to_owned(),
                    allowed: declared.to_vec(),
                });
            }
        }
        Ok(())
    }

    // ── Paths ────────────────────────────────────────────────────────

    /// `Things(42)` / `Things('abc')`.
    pub fn entity_path(&self, entity_type: EntityType, id: &Id) -> String {
        format!("{}({})", entity_type.plural(), id.url_form())
    }

    /// `Things(1)/Datastreams` under a parent, `Datastreams` without one.
    pub fn collection_path(
        &self,
        parent: Option<&EntityRef>,
        entity_type: EntityType,
    ) -> Result<String, Error> {
        match parent {
            Some(parent) => {
                self.require_relation(parent.entity_type, entity_type, Cardinality::Many)?;
                Ok(format!(
                    "{}/{}",
                    self.entity_path(parent.entity_type, &parent.id),
                    entity_type.plural()
                ))
            }
            None => Ok(entity_type.plural().to_owned()),
        }
    }

    /// `Observations(7)/Datastream`.
    pub fn singleton_path(&self, parent: &EntityRef, entity_type: EntityType) -> Result<String, Error> {
        self.require_relation(parent.entity_type, entity_type, Cardinality::One)?;
        Ok(format!(
            "{}/{}",
            self.entity_path(parent.entity_type, &parent.id),
            entity_type.singular()
        ))
    }

    /// Parse a resource path like `Things(1)/Datastreams` or `Sensors(5)`
    /// back into its parts: optional parent, target type and optional id.
    pub fn parse_path(&self, path: &str) -> Result<ParsedPath, Error> {
        let mut parent: Option<EntityRef> = None;
        let mut last: Option<(EntityType, Option<Id>)> = None;

        for segment in split_segments(path.trim_matches('/')) {
            if let Some((entity_type, id)) = last.take() {
                let id = id.ok_or(Error::MissingId(entity_type))?;
                parent = Some(EntityRef::new(entity_type, id));
            }
            let (name, id) = match segment.split_once('(') {
                Some((name, rest)) => {
                    let inner = rest
                        .strip_suffix(')')
                        .ok_or_else(|| Error::UnknownRelation(segment.to_owned()))?;
                    (name, Some(Id::from_url_form(inner)))
                }
                None => (segment, None),
            };
            let entity_type = match &parent {
                Some(parent) => self
                    .relation_named(parent.entity_type, name)
                    .map(|r| r.target)
                    .ok_or_else(|| Error::UnknownRelation(name.to_owned()))?,
                None => EntityType::from_name(name)
                    .filter(|t| t.plural() == name)
                    .ok_or_else(|| Error::UnknownRelation(name.to_owned()))?,
            };
            last = Some((entity_type, id));
        }

        let (entity_type, id) = last.ok_or_else(|| Error::UnknownRelation(path.to_owned()))?;
        Ok(ParsedPath {
            parent,
            entity_type,
            id,
        })
    }
}

/// Split a resource path on `/`, leaving quoted ids such as `'a/b'` whole.
fn split_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in path.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '/' if !quoted => {
                segments.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&path[start..]);
    segments
}

/// Result of [`EntityGraph::parse_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub parent: Option<EntityRef>,
    pub entity_type: EntityType,
    pub id: Option<Id>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn relation_names_follow_cardinality() {
        let graph = EntityGraph::sensorthings();
        let names: Vec<_> = graph
            .relations(EntityType::Datastream)
            .iter()
            .map(Relation::name)
            .collect();
        assert_eq!(names, ["Thing", "Sensor", "ObservedProperty", "Observations"]);
    }

    #[test]
    fn inverse_relations_exist_for_every_relation() {
        let graph = EntityGraph::sensorthings();
        for entity_type in EntityType::ALL {
            for relation in graph.relations(entity_type) {
                assert!(
                    graph.has_relation_to(relation.target, entity_type),
                    "{} -> {} has no inverse",
                    entity_type,
                    relation.target
                );
            }
        }
    }

    #[test]
    fn paths() {
        let graph = EntityGraph::sensorthings();
        let thing = EntityRef::new(EntityType::Thing, Id::Long(1));
        assert_eq!(
            graph.collection_path(Some(&thing), EntityType::Datastream).unwrap(),
            "Things(1)/Datastreams"
        );
        assert_eq!(graph.collection_path(None, EntityType::Sensor).unwrap(), "Sensors");

        let obs = EntityRef::new(EntityType::Observation, Id::from("a'b"));
        assert_eq!(
            graph.singleton_path(&obs, EntityType::Datastream).unwrap(),
            "Observations('a''b')/Datastream"
        );
    }

    #[test]
    fn collection_path_requires_collection_relation() {
        let graph = EntityGraph::sensorthings();
        let obs = EntityRef::new(EntityType::Observation, Id::Long(7));
        let err = graph
            .collection_path(Some(&obs), EntityType::Datastream)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NotRelated {
                parent: EntityType::Observation,
                child: EntityType::Datastream,
                cardinality: "collection"
            }
        ));

        let sensor = EntityRef::new(EntityType::Sensor, Id::Long(1));
        assert!(graph.collection_path(Some(&sensor), EntityType::Thing).is_err());
    }

    #[test]
    fn validate_select_accepts_declared_and_id() {
        let graph = EntityGraph::sensorthings();
        graph
            .validate_select(EntityType::Thing, &["id", "name"])
            .unwrap();
        let err = graph
            .validate_select(EntityType::Thing, &["name", "colour"])
            .unwrap_err();
        assert!(err.to_string().ends_with("Thing: name, description, properties"));
    }

    #[test]
    fn observation_validator_requires_result_member() {
        let graph = EntityGraph::sensorthings();
        let validate = graph.validator(EntityType::Observation).unwrap();
        let mut encoded = Map::new();
        assert!(validate(&encoded).is_err());
        encoded.insert("result".into(), Value::Null);
        assert!(validate(&encoded).is_ok());
        assert!(graph.validator(EntityType::Thing).is_none());
    }

    #[test]
    fn parse_path_round_trips_collection_paths() {
        let graph = EntityGraph::sensorthings();
        let parsed = graph.parse_path("Things(1)/Datastreams").unwrap();
        assert_eq!(parsed.entity_type, EntityType::Datastream);
        assert_eq!(
            parsed.parent,
            Some(EntityRef::new(EntityType::Thing, Id::Long(1)))
        );
        assert_eq!(parsed.id, None);

        let parsed = graph.parse_path("Observations('x')/FeatureOfInterest").unwrap();
        assert_eq!(parsed.entity_type, EntityType::FeatureOfInterest);

        assert!(graph.parse_path("Gadgets").is_err());
        assert!(graph.parse_path("Things/Datastreams").is_err());
    }

    #[test]
    fn parse_path_keeps_slashes_inside_quoted_ids() {
        let graph = EntityGraph::sensorthings();
        let parsed = graph.parse_path("Sensors('a/b')").unwrap();
        assert_eq!(parsed.entity_type, EntityType::Sensor);
        assert_eq!(parsed.id, Some(Id::String("a/b".into())));

        let parsed = graph.parse_path("Things('x/''y')/Datastreams").unwrap();
        assert_eq!(
            parsed.parent,
            Some(EntityRef::new(EntityType::Thing, Id::String("x/'y".into())))
        );
        assert_eq!(parsed.entity_type, EntityType::Datastream);
    }
}
