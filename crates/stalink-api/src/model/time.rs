// ── Time values and units ──

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// ISO 8601 instant or `start/end` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeObject {
    Instant(DateTime<Utc>),
    Interval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl TimeObject {
    pub fn now() -> Self {
        Self::Instant(Utc::now())
    }

    pub fn is_interval(&self) -> bool {
        matches!(self, Self::Interval { .. })
    }

    /// The instant itself, or the start of the interval.
    pub fn start(&self) -> DateTime<Utc> {
        match self {
            Self::Instant(at) => *at,
            Self::Interval { start, .. } => *start,
        }
    }
}

impl From<DateTime<Utc>> for TimeObject {
    fn from(at: DateTime<Utc>) -> Self {
        Self::Instant(at)
    }
}

fn parse_instant(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text.trim()).map(|at| at.with_timezone(&Utc))
}

fn format_instant(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl FromStr for TimeObject {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((start, end)) => Ok(Self::Interval {
                start: parse_instant(start)?,
                end: parse_instant(end)?,
            }),
            None => parse_instant(s).map(Self::Instant),
        }
    }
}

impl fmt::Display for TimeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant(at) => f.write_str(&format_instant(at)),
            Self::Interval { start, end } => {
                write!(f, "{}/{}", format_instant(start), format_instant(end))
            }
        }
    }
}

impl Serialize for TimeObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeObject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Unit of measurement of a Datastream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOfMeasurement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

impl UnitOfMeasurement {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            symbol: Some(symbol.into()),
            definition: Some(definition.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn instant_and_interval_round_trip() {
        let instant: TimeObject = "2016-01-01T01:01:01.000Z".parse().unwrap();
        assert_eq!(
            instant,
            TimeObject::Instant(Utc.with_ymd_and_hms(2016, 1, 1, 1, 1, 1).unwrap())
        );
        assert_eq!(serde_json::to_value(instant).unwrap(), json!("2016-01-01T01:01:01Z"));

        let interval: TimeObject = serde_json::from_value(json!(
            "2016-01-01T01:01:01Z/2016-01-01T02:01:01+01:00"
        ))
        .unwrap();
        assert!(interval.is_interval());
        assert_eq!(
            interval.to_string(),
            "2016-01-01T01:01:01Z/2016-01-01T01:01:01Z"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!("yesterday".parse::<TimeObject>().is_err());
        assert!(serde_json::from_value::<TimeObject>(json!("2016-01-01/later")).is_err());
    }
}
