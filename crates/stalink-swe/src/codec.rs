use std::any::type_name;

use serde_json::{Map, Value};

use crate::component::{
    Boolean, Category, CategoryRange, ComponentType, Count, CountRange, DataComponent, Quantity,
    QuantityRange, Text, TimeInstant, TimeRange,
};
use crate::constraint::{AllowedTimes, AllowedTokens, AllowedValues, Constraint, ConstraintType};
use crate::error::CodecError;
use crate::record::{DataChoice, DataRecord};
use crate::registry::{Registration, TypeRegistry, decode_concrete, discriminator_of};

const COMPONENT_FAMILY: &str = "data component";
const CONSTRAINT_FAMILY: &str = "constraint";

fn decode_component_as<T: ComponentType>(
    codec: &SweCodec,
    raw: &Value,
) -> Result<Box<dyn DataComponent>, CodecError> {
    Ok(Box::new(decode_concrete::<T>(codec, raw)?))
}

fn decode_constraint_as<T: ConstraintType>(
    codec: &SweCodec,
    raw: &Value,
) -> Result<Box<dyn Constraint>, CodecError> {
    Ok(Box::new(decode_concrete::<T>(codec, raw)?))
}

/// Resolves SWE Common payloads to concrete Rust types.
///
/// Holds one registry per supertype family. Built once and shared behind an
/// `Arc`; nothing is mutated after [`SweCodecBuilder::build`].
#[derive(Debug)]
pub struct SweCodec {
    components: TypeRegistry<dyn DataComponent>,
    constraints: TypeRegistry<dyn Constraint>,
}

impl SweCodec {
    /// Codec with every built-in component and constraint type registered.
    pub fn new() -> Result<Self, CodecError> {
        Self::builder().build()
    }

    /// Builder pre-loaded with the built-in types.
    pub fn builder() -> SweCodecBuilder {
        SweCodecBuilder::empty()
            .component::<Boolean>()
            .component::<Count>()
            .component::<CountRange>()
            .component::<Quantity>()
            .component::<QuantityRange>()
            .component::<Text>()
            .component::<Category>()
            .component::<CategoryRange>()
            .component::<TimeInstant>()
            .component::<TimeRange>()
            .component::<DataRecord>()
            .component::<DataChoice>()
            .constraint::<AllowedTokens>()
            .constraint::<AllowedValues>()
            .constraint::<AllowedTimes>()
    }

    pub fn components(&self) -> &TypeRegistry<dyn DataComponent> {
        &self.components
    }

    pub fn constraints(&self) -> &TypeRegistry<dyn Constraint> {
        &self.constraints
    }

    // ── Decoding ─────────────────────────────────────────────────────

    pub fn decode_component(&self, raw: &Value) -> Result<Box<dyn DataComponent>, CodecError> {
        self.components.decode(self, raw)
    }

    pub fn decode_constraint(&self, raw: &Value) -> Result<Box<dyn Constraint>, CodecError> {
        self.constraints.decode(self, raw)
    }

    /// Decode a component and require a specific concrete type.
    pub fn decode_component_of<T: ComponentType>(&self, raw: &Value) -> Result<T, CodecError> {
        let decoded = self.decode_component(raw)?;
        decoded
            .as_any()
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| CodecError::InvalidMember {
                member: decoded.discriminator().to_owned(),
                expected: type_name::<T>(),
            })
    }

    /// Decode the optional `member` of `raw` as a constraint. Absent and
    /// `null` both yield `None`.
    pub fn decode_member_constraint(
        &self,
        raw: &Map<String, Value>,
        member: &str,
    ) -> Result<Option<Box<dyn Constraint>>, CodecError> {
        match raw.get(member) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.decode_constraint(value).map(Some),
        }
    }

    /// Decode the optional `member` of `raw` as a single component.
    pub fn decode_member_component(
        &self,
        raw: &Map<String, Value>,
        member: &str,
    ) -> Result<Option<Box<dyn DataComponent>>, CodecError> {
        match raw.get(member) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.decode_component(value).map(Some),
        }
    }

    /// Decode the array `member` of `raw` as a list of components.
    pub fn decode_member_components(
        &self,
        raw: &Map<String, Value>,
        member: &str,
    ) -> Result<Vec<Box<dyn DataComponent>>, CodecError> {
        match raw.get(member) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| self.decode_component(item))
                .collect(),
            Some(_) => Err(CodecError::InvalidMember {
                member: member.to_owned(),
                expected: "an array of data components",
            }),
        }
    }

    // ── Encoding ─────────────────────────────────────────────────────

    pub fn encode_component(&self, component: &dyn DataComponent) -> Result<Value, CodecError> {
        self.components.resolve(component.discriminator())?;
        component.to_json()
    }

    pub fn encode_constraint(&self, constraint: &dyn Constraint) -> Result<Value, CodecError> {
        self.constraints.resolve(constraint.discriminator())?;
        constraint.to_json()
    }
}

/// Collects registrations for a [`SweCodec`].
#[derive(Debug, Default)]
pub struct SweCodecBuilder {
    components: Vec<Registration<dyn DataComponent>>,
    constraints: Vec<Registration<dyn Constraint>>,
}

impl SweCodecBuilder {
    /// Builder without any registrations, not even the built-ins.
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn component<T: ComponentType>(mut self) -> Self {
        self.components.push(Registration::new(
            discriminator_of::<T>(),
            type_name::<T>(),
            decode_component_as::<T>,
        ));
        self
    }

    #[must_use]
    pub fn constraint<T: ConstraintType>(mut self) -> Self {
        self.constraints.push(Registration::new(
            discriminator_of::<T>(),
            type_name::<T>(),
            decode_constraint_as::<T>,
        ));
        self
    }

    /// Assemble the registries. Fails if two types share a discriminator
    /// within the same family.
    pub fn build(self) -> Result<SweCodec, CodecError> {
        Ok(SweCodec {
            components: TypeRegistry::from_registrations(COMPONENT_FAMILY, self.components)?,
            constraints: TypeRegistry::from_registrations(CONSTRAINT_FAMILY, self.constraints)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::component::ComponentHeader;
    use crate::registry::SweType;

    fn tasking_parameters() -> Value {
        json!({
            "type": "DataRecord",
            "field": [
                {
                    "name": "status",
                    "label": "On/Off status",
                    "description": "Specifies turning the light On or Off",
                    "type": "Category",
                    "constraint": {
                        "type": "AllowedTokens",
                        "value": ["on", "off"]
                    }
                },
                {
                    "name": "color",
                    "label": "Light Color",
                    "description": "Specifies the light color in RGB HEX format. Example: #FF11A0",
                    "type": "Text",
                    "constraint": {
                        "type": "AllowedTokens",
                        "pattern": "^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$"
                    }
                }
            ]
        })
    }

    #[test]
    fn decodes_nested_record_to_concrete_types() {
        let codec = SweCodec::new().unwrap();
        let decoded = codec.decode_component(&tasking_parameters()).unwrap();
        let record = decoded.downcast_ref::<DataRecord>().unwrap();

        assert_eq!(record.field.len(), 2);
        let status = record.field[0].downcast_ref::<Category>().unwrap();
        assert_eq!(status.header.name.as_deref(), Some("status"));
        let tokens = status
            .constraint
            .as_deref()
            .and_then(|c| c.downcast_ref::<AllowedTokens>())
            .unwrap();
        assert_eq!(tokens.value, vec!["on".to_owned(), "off".to_owned()]);

        let color = record.field[1].downcast_ref::<Text>().unwrap();
        let tokens = color
            .constraint
            .as_deref()
            .and_then(|c| c.downcast_ref::<AllowedTokens>())
            .unwrap();
        assert_eq!(
            tokens.pattern.as_deref(),
            Some("^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$")
        );
    }

    #[test]
    fn built_tree_encodes_to_wire_form() {
        let codec = SweCodec::new().unwrap();
        let record = DataRecord::default()
            .with_field(
                "status",
                Category::default()
                    .with_label("On/Off status")
                    .with_description("Specifies turning the light On or Off")
                    .with_constraint(AllowedTokens::values(["on", "off"])),
            )
            .with_field(
                "color",
                Text::default()
                    .with_label("Light Color")
                    .with_description("Specifies the light color in RGB HEX format. Example: #FF11A0")
                    .with_constraint(AllowedTokens::pattern("^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$")),
            );

        let encoded = codec.encode_component(&record).unwrap();
        assert_eq!(encoded, tasking_parameters());

        let decoded = codec.decode_component(&encoded).unwrap();
        assert!(decoded.eq_dyn(&record));
    }

    #[test]
    fn unknown_discriminator_is_a_hard_error() {
        let codec = SweCodec::new().unwrap();
        let err = codec
            .decode_component(&json!({ "type": "Vector", "coordinate": [] }))
            .unwrap_err();
        assert!(err.is_unknown_type());
        assert!(err.to_string().contains("DataRecord"));
    }

    #[test]
    fn unknown_discriminator_deep_in_tree_fails_whole_decode() {
        let codec = SweCodec::new().unwrap();
        let mut raw = tasking_parameters();
        raw["field"][1]["constraint"]["type"] = json!("AllowedColours");
        let err = codec.decode_component(&raw).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnknownType { family: "constraint", ref discriminator, .. }
                if discriminator == "AllowedColours"
        ));
    }

    #[test]
    fn families_resolve_independently() {
        let codec = SweCodec::new().unwrap();
        let tokens = json!({ "type": "AllowedTokens", "value": ["a"] });
        assert!(codec.decode_constraint(&tokens).is_ok());
        assert!(codec.decode_component(&tokens).unwrap_err().is_unknown_type());
    }

    #[test]
    fn missing_discriminator_and_non_objects_are_rejected() {
        let codec = SweCodec::new().unwrap();
        assert!(matches!(
            codec.decode_component(&json!({ "name": "x" })),
            Err(CodecError::MissingDiscriminator { key: "type", .. })
        ));
        assert!(matches!(
            codec.decode_constraint(&json!(["AllowedTokens"])),
            Err(CodecError::NotAnObject { .. })
        ));
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Toggle {
        #[serde(flatten)]
        header: ComponentHeader,
    }

    impl SweType for Toggle {
        const SWE_NAME: Option<&'static str> = Some("Boolean");
    }

    impl ComponentType for Toggle {
        fn component_header(&self) -> &ComponentHeader {
            &self.header
        }

        fn component_header_mut(&mut self) -> &mut ComponentHeader {
            &mut self.header
        }
    }

    #[test]
    fn duplicate_discriminator_fails_construction() {
        let err = SweCodec::builder().component::<Toggle>().build().unwrap_err();
        match err {
            CodecError::DuplicateDiscriminator { discriminator, .. } => {
                assert_eq!(discriminator, "Boolean");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extension_types_register_through_builder() {
        let codec = SweCodecBuilder::empty()
            .component::<Toggle>()
            .build()
            .unwrap();
        let decoded: Toggle = codec
            .decode_component_of(&json!({ "type": "Boolean", "label": "Power" }))
            .unwrap();
        assert_eq!(decoded.header.label.as_deref(), Some("Power"));
        assert_eq!(codec.components().discriminators(), vec!["Boolean"]);
    }
}
