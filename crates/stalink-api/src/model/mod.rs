// Entity model: identifiers, the relationship graph and resource structs.

pub(crate) mod entity;
mod entity_type;
mod graph;
mod id;
mod sensing;
mod tasking;
mod time;

pub use entity::{Entity, EntityMeta};
pub use entity_type::EntityType;
pub use graph::{Cardinality, EntityGraph, ParsedPath, Relation, TypeInfo, Validator};
pub use id::Id;
pub use sensing::{
    Datastream, FeatureOfInterest, HistoricalLocation, Location, MultiDatastream, Observation,
    ObservedProperty, Sensor, Thing,
};
pub use tasking::{Actuator, Task, TaskingCapability};
pub use time::{TimeObject, UnitOfMeasurement};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_relations_match<T: Entity>(graph: &EntityGraph) {
        let mut declared: Vec<_> = graph
            .relations(T::TYPE)
            .iter()
            .map(Relation::name)
            .collect();
        let mut fields = T::RELATIONS.to_vec();
        declared.sort_unstable();
        fields.sort_unstable();
        assert_eq!(declared, fields, "navigation fields of {}", T::TYPE);
    }

    #[test]
    fn struct_navigation_fields_match_graph() {
        let graph = EntityGraph::sensorthings();
        assert_relations_match::<Thing>(&graph);
        assert_relations_match::<Location>(&graph);
        assert_relations_match::<HistoricalLocation>(&graph);
        assert_relations_match::<Datastream>(&graph);
        assert_relations_match::<MultiDatastream>(&graph);
        assert_relations_match::<Sensor>(&graph);
        assert_relations_match::<ObservedProperty>(&graph);
        assert_relations_match::<Observation>(&graph);
        assert_relations_match::<FeatureOfInterest>(&graph);
        assert_relations_match::<Actuator>(&graph);
        assert_relations_match::<TaskingCapability>(&graph);
        assert_relations_match::<Task>(&graph);
    }
}
