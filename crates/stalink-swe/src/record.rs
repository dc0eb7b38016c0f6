// Aggregate components: records and choices of nested components.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::SweCodec;
use crate::component::{ComponentHeader, ComponentType, DataComponent};
use crate::error::CodecError;
use crate::registry::SweType;

const FIELD_MEMBER: &str = "field";
const ITEM_MEMBER: &str = "item";

fn encode_children(children: &[Box<dyn DataComponent>]) -> Result<Value, CodecError> {
    children
        .iter()
        .map(|child| child.to_json())
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn find_named<'a>(
    children: &'a [Box<dyn DataComponent>],
    name: &str,
) -> Option<&'a dyn DataComponent> {
    children
        .iter()
        .find(|child| child.header().name.as_deref() == Some(name))
        .map(|child| &**child)
}

/// Ordered set of named fields. Used as the root of tasking parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(skip)]
    pub field: Vec<Box<dyn DataComponent>>,
}

impl DataRecord {
    /// Append `component` under `name`.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, component: impl ComponentType) -> Self {
        self.field.push(Box::new(component.with_name(name)));
        self
    }

    pub fn field_named(&self, name: &str) -> Option<&dyn DataComponent> {
        find_named(&self.field, name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.field
            .iter()
            .filter_map(|child| child.header().name.as_deref())
    }
}

impl SweType for DataRecord {
    fn decode_nested(
        &mut self,
        codec: &SweCodec,
        raw: &Map<String, Value>,
    ) -> Result<(), CodecError> {
        self.field = codec.decode_member_components(raw, FIELD_MEMBER)?;
        Ok(())
    }

    fn encode_nested(&self, out: &mut Map<String, Value>) -> Result<(), CodecError> {
        out.insert(FIELD_MEMBER.to_owned(), encode_children(&self.field)?);
        Ok(())
    }
}

impl ComponentType for DataRecord {
    fn component_header(&self) -> &ComponentHeader {
        &self.header
    }

    fn component_header_mut(&mut self) -> &mut ComponentHeader {
        &mut self.header
    }
}

/// Exactly one of several named alternatives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataChoice {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(skip)]
    pub item: Vec<Box<dyn DataComponent>>,
}

impl DataChoice {
    #[must_use]
    pub fn with_item(mut self, name: impl Into<String>, component: impl ComponentType) -> Self {
        self.item.push(Box::new(component.with_name(name)));
        self
    }

    pub fn item_named(&self, name: &str) -> Option<&dyn DataComponent> {
        find_named(&self.item, name)
    }
}

impl SweType for DataChoice {
    fn decode_nested(
        &mut self,
        codec: &SweCodec,
        raw: &Map<String, Value>,
    ) -> Result<(), CodecError> {
        self.item = codec.decode_member_components(raw, ITEM_MEMBER)?;
        Ok(())
    }

    fn encode_nested(&self, out: &mut Map<String, Value>) -> Result<(), CodecError> {
        out.insert(ITEM_MEMBER.to_owned(), encode_children(&self.item)?);
        Ok(())
    }
}

impl ComponentType for DataChoice {
    fn component_header(&self) -> &ComponentHeader {
        &self.header
    }

    fn component_header_mut(&mut self) -> &mut ComponentHeader {
        &mut self.header
    }
}
