// ── Entity identifiers ──
//
// Services hand out either numeric or string ids. The wire form keeps the
// JSON type (number vs string); URLs quote string ids OData-style.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a single entity, serialized under `@iot.id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Long(i64),
    String(String),
}

impl Id {
    /// Parse display text. Anything that fits an `i64` becomes [`Id::Long`],
    /// everything else [`Id::String`]. Never fails.
    pub fn parse(text: &str) -> Self {
        text.parse::<i64>()
            .map_or_else(|_| Self::String(text.to_owned()), Self::Long)
    }

    /// Plain text form, as it appears in logs and CLI output.
    pub fn format(&self) -> String {
        self.to_string()
    }

    /// Form used inside `Entities(<id>)` path segments.
    pub fn url_form(&self) -> String {
        match self {
            Self::Long(value) => value.to_string(),
            Self::String(value) => format!("'{}'", value.replace('\'', "''")),
        }
    }

    /// Inverse of [`url_form`](Self::url_form): quoted text becomes a string
    /// id with doubled quotes collapsed, anything else goes through
    /// [`parse`](Self::parse).
    pub fn from_url_form(text: &str) -> Self {
        match text
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
        {
            Some(inner) => Self::String(inner.replace("''", "'")),
            None => Self::parse(text),
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(value) => Some(*value),
            Self::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            Self::Long(_) => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value}"),
        }
    }
}

impl FromStr for Id {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_prefers_long() {
        assert_eq!(Id::parse("1"), Id::Long(1));
        assert_eq!(Id::parse("-17"), Id::Long(-17));
        assert_eq!(Id::parse("abc"), Id::String("abc".into()));
        assert_eq!(Id::parse("99999999999999999999"), Id::String("99999999999999999999".into()));
    }

    #[test]
    fn format_then_parse_collapses_numeric_strings() {
        let original = Id::String("1".into());
        assert_eq!(Id::parse(&original.format()), Id::Long(1));

        let original = Id::String("sensor-a".into());
        assert_eq!(Id::parse(&original.format()), original);

        let original = Id::Long(42);
        assert_eq!(Id::parse(&original.format()), original);
    }

    #[test]
    fn from_constructs_without_parsing() {
        assert_eq!(Id::from("7"), Id::String("7".into()));
        assert_eq!(Id::from(7), Id::Long(7));
    }

    #[test]
    fn url_form_quotes_strings() {
        assert_eq!(Id::Long(42).url_form(), "42");
        assert_eq!(Id::from("abc").url_form(), "'abc'");
        assert_eq!(Id::from("o'neil").url_form(), "'o''neil'");
        assert_eq!(Id::from_url_form("'o''neil'"), Id::from("o'neil"));
        assert_eq!(Id::from_url_form("42"), Id::Long(42));
    }

    #[test]
    fn wire_form_keeps_json_type() {
        assert_eq!(serde_json::to_string(&Id::Long(5)).unwrap(), "5");
        assert_eq!(serde_json::to_string(&Id::from("5")).unwrap(), "\"5\"");
        assert_eq!(serde_json::from_str::<Id>("5").unwrap(), Id::Long(5));
        assert_eq!(serde_json::from_str::<Id>("\"5\"").unwrap(), Id::from("5"));
    }
}
