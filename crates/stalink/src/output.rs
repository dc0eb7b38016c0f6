//! Output formatting: table, JSON, plain.
//!
//! Entities are rendered from their encoded JSON form, so SWE members such
//! as `taskingParameters` appear exactly as they go over the wire.

use std::io::{self, Write};

use serde_json::{Map, Value};
use tabled::{Table, Tabled, settings::Style};

use stalink_api::util::clean_for_logging;

use crate::cli::OutputFormat;

const CELL_WIDTH: usize = 60;

/// Properties tried in order for the summary column.
const SUMMARY_KEYS: &[&str] = &["description", "result", "definition", "encodingType"];

// ── Table rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

impl From<&Map<String, Value>> for EntityRow {
    fn from(entity: &Map<String, Value>) -> Self {
        Self {
            id: entity.get("@iot.id").map(cell).unwrap_or_default(),
            name: entity.get("name").map(cell).unwrap_or_default(),
            summary: SUMMARY_KEYS
                .iter()
                .find_map(|key| entity.get(*key))
                .map(cell)
                .unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn cell(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    clean_for_logging(&text, CELL_WIDTH)
}

// ── Render dispatchers ───────────────────────────────────────────────

pub fn render_list(
    format: &OutputFormat,
    entities: &[Map<String, Value>],
) -> Result<String, serde_json::Error> {
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<EntityRow> = entities.iter().map(EntityRow::from).collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(entities)?,
        OutputFormat::JsonCompact => serde_json::to_string(entities)?,
        OutputFormat::Plain => entities
            .iter()
            .filter_map(|e| e.get("@iot.id").map(cell))
            .collect::<Vec<_>>()
            .join("\n"),
    })
}

pub fn render_single(
    format: &OutputFormat,
    entity: &Map<String, Value>,
) -> Result<String, serde_json::Error> {
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<PropertyRow> = entity
                .iter()
                .map(|(property, value)| PropertyRow {
                    property: property.clone(),
                    value: cell(value),
                })
                .collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(entity)?,
        OutputFormat::JsonCompact => serde_json::to_string(entity)?,
        OutputFormat::Plain => entity.get("@iot.id").map(cell).unwrap_or_default(),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entity(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn plain_lists_ids() {
        let entities = [
            entity(json!({ "@iot.id": 1, "name": "a" })),
            entity(json!({ "@iot.id": "x", "name": "b" })),
        ];
        assert_eq!(render_list(&OutputFormat::Plain, &entities).unwrap(), "1\nx");
    }

    #[test]
    fn table_summarises_first_known_property() {
        let row = EntityRow::from(&entity(json!({
            "@iot.id": 7,
            "result": 21.5,
            "phenomenonTime": "2024-01-01T00:00:00Z"
        })));
        assert_eq!(row.id, "7");
        assert_eq!(row.name, "");
        assert_eq!(row.summary, "21.5");
    }

    #[test]
    fn long_cells_are_truncated() {
        let text = "x".repeat(200);
        let rendered = cell(&Value::String(text));
        assert_eq!(rendered.chars().count(), CELL_WIDTH);
        assert!(rendered.ends_with("..."));
    }
}
