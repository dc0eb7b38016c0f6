// Resource references and `$expand` descriptors.

use std::fmt;

use crate::error::Error;
use crate::model::{EntityGraph, EntityType, Id};

/// `(type, id)` pair addressing one entity, e.g. the parent of a scoped DAO.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub id: Id,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, id: impl Into<Id>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.entity_type.plural(), self.id.url_form())
    }
}

// ── Expansion ────────────────────────────────────────────────────────

/// One `$expand` item: a navigation property plus nested options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expand {
    relation: String,
    select: Vec<String>,
    filter: Option<String>,
    order_by: Vec<String>,
    top: Option<u32>,
    skip: Option<u32>,
    expand: Expansion,
}

impl Expand {
    /// Expand the navigation property `relation` (e.g. `Datastreams`).
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            ..Self::default()
        }
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    #[must_use]
    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(properties.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by.push(order.into());
        self
    }

    #[must_use]
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn expand(mut self, nested: Expand) -> Self {
        self.expand.items.push(nested);
        self
    }

    fn validate(&self, graph: &EntityGraph, from: EntityType) -> Result<(), Error> {
        let target = graph
            .relation_named(from, &self.relation)
            .map(|r| r.target)
            .ok_or_else(|| Error::UnknownRelation(format!("{from}/{}", self.relation)))?;
        graph.validate_select(target, self.select.as_slice())?;
        self.expand.validate(graph, target)
    }

    fn options(&self) -> Vec<String> {
        let mut options = Vec::new();
        if !self.select.is_empty() {
            options.push(format!("$select={}", self.select.join(",")));
        }
        if let Some(filter) = &self.filter {
            options.push(format!("$filter={filter}"));
        }
        if !self.order_by.is_empty() {
            options.push(format!("$orderby={}", self.order_by.join(",")));
        }
        if let Some(top) = self.top {
            options.push(format!("$top={top}"));
        }
        if let Some(skip) = self.skip {
            options.push(format!("$skip={skip}"));
        }
        if !self.expand.is_empty() {
            options.push(format!("$expand={}", self.expand));
        }
        options
    }
}

impl fmt::Display for Expand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options = self.options();
        if options.is_empty() {
            f.write_str(&self.relation)
        } else {
            write!(f, "{}({})", self.relation, options.join(";"))
        }
    }
}

/// The full `$expand` value: comma-joined [`Expand`] items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    items: Vec<Expand>,
}

impl Expansion {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, item: Expand) -> Self {
        self.items.push(item);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Expand] {
        &self.items
    }

    /// Every relation must be declared from `root`, every nested `$select`
    /// property on the relation's target.
    pub fn validate(&self, graph: &EntityGraph, root: EntityType) -> Result<(), Error> {
        self.items
            .iter()
            .try_for_each(|item| item.validate(graph, root))
    }
}

impl From<Expand> for Expansion {
    fn from(item: Expand) -> Self {
        Self { items: vec![item] }
    }
}

impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, item) in self.items.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_options() {
        let expansion = Expansion::new()
            .with(
                Expand::new("Datastreams")
                    .select(["name", "id"])
                    .expand(Expand::new("Sensor")),
            )
            .with(Expand::new("Locations"));
        assert_eq!(
            expansion.to_string(),
            "Datastreams($select=name,id;$expand=Sensor),Locations"
        );
    }

    #[test]
    fn renders_all_option_kinds_in_order() {
        let expand = Expand::new("Observations")
            .filter("result gt 5")
            .order_by("phenomenonTime desc")
            .top(10)
            .skip(20);
        assert_eq!(
            expand.to_string(),
            "Observations($filter=result gt 5;$orderby=phenomenonTime desc;$top=10;$skip=20)"
        );
    }

    #[test]
    fn validates_relations_and_nested_select() {
        let graph = EntityGraph::sensorthings();
        let ok = Expansion::from(
            Expand::new("Datastreams")
                .select(["name"])
                .expand(Expand::new("ObservedProperty").select(["definition"])),
        );
        ok.validate(&graph, EntityType::Thing).unwrap();

        let bad_relation = Expansion::from(Expand::new("Sensor"));
        assert!(matches!(
            bad_relation.validate(&graph, EntityType::Thing),
            Err(Error::UnknownRelation(_))
        ));

        let bad_select = Expansion::from(Expand::new("Datastreams").select(["colour"]));
        assert!(matches!(
            bad_select.validate(&graph, EntityType::Thing),
            Err(Error::UnknownProperty {
                entity_type: EntityType::Datastream,
                ..
            })
        ));
    }

    #[test]
    fn entity_ref_display() {
        assert_eq!(EntityRef::new(EntityType::Thing, 3_i64).to_string(), "Things(3)");
        assert_eq!(
            EntityRef::new(EntityType::Sensor, "x").to_string(),
            "Sensors('x')"
        );
    }
}
