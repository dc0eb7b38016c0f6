// SWE Common simple data components
//
// Every component shares a flattened `ComponentHeader` and may carry a
// single polymorphic `constraint` member, decoded through the codec's
// constraint registry.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::SweCodec;
use crate::constraint::{Constraint, ConstraintType};
use crate::error::CodecError;
use crate::registry::{SweType, discriminator_of, encode_concrete};

const CONSTRAINT_MEMBER: &str = "constraint";

// ── Supertype ────────────────────────────────────────────────────────

/// Object-safe supertype of every SWE data component.
pub trait DataComponent: fmt::Debug + Send + Sync {
    fn discriminator(&self) -> &'static str;

    /// Encode including the `"type"` member and nested polymorphic members.
    fn to_json(&self) -> Result<Value, CodecError>;

    fn header(&self) -> &ComponentHeader;

    fn header_mut(&mut self) -> &mut ComponentHeader;

    fn as_any(&self) -> &dyn Any;

    fn clone_boxed(&self) -> Box<dyn DataComponent>;

    fn eq_dyn(&self, other: &dyn DataComponent) -> bool;
}

impl<'a> dyn DataComponent + 'a {
    pub fn downcast_ref<T: DataComponent + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: DataComponent + 'static>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl Clone for Box<dyn DataComponent> {
    fn clone(&self) -> Self {
        (**self).clone_boxed()
    }
}

impl PartialEq for dyn DataComponent {
    fn eq(&self, other: &Self) -> bool {
        self.eq_dyn(other)
    }
}

/// Implemented by concrete component types; provides [`DataComponent`].
pub trait ComponentType: SweType {
    fn component_header(&self) -> &ComponentHeader;

    fn component_header_mut(&mut self) -> &mut ComponentHeader;

    #[must_use]
    fn with_name(mut self, name: impl Into<String>) -> Self {
        self.component_header_mut().name = Some(name.into());
        self
    }

    #[must_use]
    fn with_label(mut self, label: impl Into<String>) -> Self {
        self.component_header_mut().label = Some(label.into());
        self
    }

    #[must_use]
    fn with_description(mut self, description: impl Into<String>) -> Self {
        self.component_header_mut().description = Some(description.into());
        self
    }

    #[must_use]
    fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.component_header_mut().definition = Some(definition.into());
        self
    }
}

impl<T: ComponentType> DataComponent for T {
    fn discriminator(&self) -> &'static str {
        discriminator_of::<T>()
    }

    fn to_json(&self) -> Result<Value, CodecError> {
        encode_concrete(self)
    }

    fn header(&self) -> &ComponentHeader {
        self.component_header()
    }

    fn header_mut(&mut self) -> &mut ComponentHeader {
        self.component_header_mut()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn DataComponent> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn DataComponent) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

// ── Shared members ───────────────────────────────────────────────────

/// Members common to all components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updatable: Option<bool>,
}

/// Unit of measure, either a UCUM code or a link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl UnitReference {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            href: None,
        }
    }

    pub fn href(href: impl Into<String>) -> Self {
        Self {
            code: None,
            href: Some(href.into()),
        }
    }
}

// ── Components ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Boolean {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<bool>,
}

impl SweType for Boolean {}

impl ComponentType for Boolean {
    fn component_header(&self) -> &ComponentHeader {
        &self.header
    }

    fn component_header_mut(&mut self) -> &mut ComponentHeader {
        &mut self.header
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Count {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(skip)]
    pub constraint: Option<Box<dyn Constraint>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountRange {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<[i64; 2]>,
    #[serde(skip)]
    pub constraint: Option<Box<dyn Constraint>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(default)]
    pub uom: UnitReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip)]
    pub constraint: Option<Box<dyn Constraint>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantityRange {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(default)]
    pub uom: UnitReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<[f64; 2]>,
    #[serde(skip)]
    pub constraint: Option<Box<dyn Constraint>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Text {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip)]
    pub constraint: Option<Box<dyn Constraint>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_space: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip)]
    pub constraint: Option<Box<dyn Constraint>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRange {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_space: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<[String; 2]>,
    #[serde(skip)]
    pub constraint: Option<Box<dyn Constraint>>,
}

/// Registered as `Time`; named `TimeInstant` to stay clear of `std::time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInstant {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(default)]
    pub uom: UnitReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_frame: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip)]
    pub constraint: Option<Box<dyn Constraint>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    #[serde(flatten)]
    pub header: ComponentHeader,
    #[serde(default)]
    pub uom: UnitReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_frame: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<[String; 2]>,
    #[serde(skip)]
    pub constraint: Option<Box<dyn Constraint>>,
}

/// Components carrying an optional `constraint` member.
macro_rules! constrained_component {
    ($($ty:ident => $name:expr),+ $(,)?) => {$(
        impl SweType for $ty {
            const SWE_NAME: Option<&'static str> = $name;

            fn decode_nested(
                &mut self,
                codec: &SweCodec,
                raw: &Map<String, Value>,
            ) -> Result<(), CodecError> {
                self.constraint = codec.decode_member_constraint(raw, CONSTRAINT_MEMBER)?;
                Ok(())
            }

            fn encode_nested(&self, out: &mut Map<String, Value>) -> Result<(), CodecError> {
                if let Some(constraint) = &self.constraint {
                    out.insert(CONSTRAINT_MEMBER.to_owned(), constraint.to_json()?);
                }
                Ok(())
            }
        }

        impl ComponentType for $ty {
            fn component_header(&self) -> &ComponentHeader {
                &self.header
            }

            fn component_header_mut(&mut self) -> &mut ComponentHeader {
                &mut self.header
            }
        }

        impl $ty {
            #[must_use]
            pub fn with_constraint(mut self, constraint: impl ConstraintType) -> Self {
                self.constraint = Some(Box::new(constraint));
                self
            }
        }
    )+};
}

constrained_component! {
    Count => None,
    CountRange => None,
    Quantity => None,
    QuantityRange => None,
    Text => None,
    Category => None,
    CategoryRange => None,
    TimeInstant => Some("Time"),
    TimeRange => None,
}

impl Quantity {
    #[must_use]
    pub fn with_uom(mut self, uom: UnitReference) -> Self {
        self.uom = uom;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::constraint::AllowedValues;

    #[test]
    fn quantity_encodes_uom_and_constraint() {
        let quantity = Quantity::default()
            .with_label("Brightness")
            .with_uom(UnitReference::code("%"))
            .with_constraint(AllowedValues::interval(0.0, 100.0));

        let encoded = quantity.to_json().unwrap();
        assert_eq!(
            encoded,
            json!({
                "type": "Quantity",
                "label": "Brightness",
                "uom": { "code": "%" },
                "constraint": { "type": "AllowedValues", "interval": [[0.0, 100.0]] }
            })
        );
    }

    #[test]
    fn time_instant_uses_explicit_discriminator() {
        let time = TimeInstant {
            value: Some("2024-05-01T10:00:00Z".into()),
            ..TimeInstant::default()
        };
        assert_eq!(time.discriminator(), "Time");
        assert_eq!(time.to_json().unwrap()["type"], json!("Time"));
    }

    #[test]
    fn dyn_equality_requires_same_concrete_type() {
        let text: Box<dyn DataComponent> = Box::new(Text::default().with_label("a"));
        let category: Box<dyn DataComponent> = Box::new(Category::default().with_label("a"));
        assert!(text != category);
        assert!(text == text.clone());
        assert!(text.is::<Text>());
        assert_eq!(text.header().label.as_deref(), Some("a"));
    }
}
