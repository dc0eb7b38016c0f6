use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;
use crate::registry::{SweType, discriminator_of, encode_concrete};

/// Object-safe supertype of every SWE constraint.
pub trait Constraint: fmt::Debug + Send + Sync {
    fn discriminator(&self) -> &'static str;

    fn to_json(&self) -> Result<Value, CodecError>;

    fn as_any(&self) -> &dyn Any;

    fn clone_boxed(&self) -> Box<dyn Constraint>;

    fn eq_dyn(&self, other: &dyn Constraint) -> bool;
}

impl<'a> dyn Constraint + 'a {
    pub fn downcast_ref<T: Constraint + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl Clone for Box<dyn Constraint> {
    fn clone(&self) -> Self {
        (**self).clone_boxed()
    }
}

impl PartialEq for dyn Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.eq_dyn(other)
    }
}

/// Marker for concrete constraint types; provides [`Constraint`].
pub trait ConstraintType: SweType {}

impl<T: ConstraintType> Constraint for T {
    fn discriminator(&self) -> &'static str {
        discriminator_of::<T>()
    }

    fn to_json(&self) -> Result<Value, CodecError> {
        encode_concrete(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn Constraint> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn Constraint) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// Enumerated tokens and/or a regular expression a text value must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedTokens {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl AllowedTokens {
    pub fn values<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            value: tokens.into_iter().map(Into::into).collect(),
            pattern: None,
        }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            value: Vec::new(),
            pattern: Some(pattern.into()),
        }
    }

    /// Exact-match check against the token list. Patterns are not evaluated
    /// client-side.
    pub fn allows(&self, token: &str) -> bool {
        self.value.is_empty() || self.value.iter().any(|v| v == token)
    }
}

impl SweType for AllowedTokens {}
impl ConstraintType for AllowedTokens {}

/// Enumerated numbers and/or closed intervals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedValues {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interval: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significant_figures: Option<u32>,
}

impl AllowedValues {
    pub fn interval(min: f64, max: f64) -> Self {
        Self {
            interval: vec![[min, max]],
            ..Self::default()
        }
    }

    pub fn allows(&self, value: f64) -> bool {
        if self.value.is_empty() && self.interval.is_empty() {
            return true;
        }
        self.value.iter().any(|v| (v - value).abs() < f64::EPSILON)
            || self
                .interval
                .iter()
                .any(|[min, max]| (*min..=*max).contains(&value))
    }
}

impl SweType for AllowedValues {}
impl ConstraintType for AllowedValues {}

/// Enumerated ISO 8601 instants and/or intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedTimes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interval: Vec<[String; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significant_figures: Option<u32>,
}

impl SweType for AllowedTimes {}
impl ConstraintType for AllowedTimes {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn allowed_values_checks_points_and_intervals() {
        let constraint = AllowedValues {
            value: vec![-1.0],
            interval: vec![[0.0, 10.0]],
            significant_figures: None,
        };
        assert!(constraint.allows(-1.0));
        assert!(constraint.allows(10.0));
        assert!(!constraint.allows(10.5));
    }

    #[test]
    fn allowed_tokens_omits_empty_members() {
        let encoded = AllowedTokens::pattern("^[a-z]+$").to_json().unwrap();
        assert_eq!(
            encoded,
            json!({ "type": "AllowedTokens", "pattern": "^[a-z]+$" })
        );
        assert!(AllowedTokens::values(["on", "off"]).allows("on"));
        assert!(!AllowedTokens::values(["on", "off"]).allows("dim"));
    }
}
