//! Shared helpers for command handlers.

use std::path::Path;

use stalink_api::model::{Entity, Id, ParsedPath};
use stalink_api::{Dao, Expand, Expansion, SensorThingsService};

use crate::error::CliError;

/// Resolve a resource path such as `Things(1)/Datastreams`.
pub fn parse_target(service: &SensorThingsService, path: &str) -> Result<ParsedPath, CliError> {
    Ok(service.graph().parse_path(path)?)
}

/// DAO for the target type, scoped under the path's parent if any.
pub fn scoped_dao<T: Entity>(service: &SensorThingsService, target: &ParsedPath) -> Dao<T> {
    let dao = service.dao::<T>();
    match &target.parent {
        Some(parent) => dao.with_parent_ref(parent.clone()),
        None => dao,
    }
}

pub fn not_single_entity(target: &ParsedPath) -> CliError {
    CliError::Validation {
        field: "path".into(),
        reason: format!(
            "expected a single entity such as {}(1)",
            target.entity_type.plural()
        ),
    }
}

pub fn require_id(target: &ParsedPath) -> Result<Id, CliError> {
    target.id.clone().ok_or_else(|| not_single_entity(target))
}

pub fn require_collection(target: &ParsedPath) -> Result<(), CliError> {
    if target.id.is_some() {
        return Err(CliError::Validation {
            field: "path".into(),
            reason: format!(
                "expected a collection such as {}, not a single entity",
                target.entity_type.plural()
            ),
        });
    }
    Ok(())
}

/// One `$expand` item per navigation property name.
pub fn expansion(relations: &[String]) -> Expansion {
    relations
        .iter()
        .fold(Expansion::new(), |expansion, relation| {
            expansion.with(Expand::new(relation.as_str()))
        })
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Read and parse a JSON file for `--from-file`.
pub fn read_json_file(path: &Path) -> Result<serde_json::Value, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "from-file".into(),
        reason: format!("invalid JSON: {e}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stalink_api::model::EntityType;

    use super::*;

    fn service() -> SensorThingsService {
        SensorThingsService::new("http://example.org/v1.1").unwrap()
    }

    #[test]
    fn collection_and_entity_paths() {
        let target = parse_target(&service(), "Things(1)/Datastreams").unwrap();
        assert_eq!(target.entity_type, EntityType::Datastream);
        assert!(require_collection(&target).is_ok());
        assert!(require_id(&target).is_err());

        let target = parse_target(&service(), "Sensors('dht')").unwrap();
        assert_eq!(require_id(&target).unwrap(), Id::String("dht".into()));
        assert!(require_collection(&target).is_err());
    }

    #[test]
    fn unknown_path_is_an_invalid_request() {
        let err = parse_target(&service(), "Gadgets").unwrap_err();
        assert!(matches!(err, CliError::InvalidRequest(_)));
    }

    #[test]
    fn expansion_joins_relations() {
        let names = vec!["Datastreams".to_owned(), "Locations".to_owned()];
        assert_eq!(expansion(&names).to_string(), "Datastreams,Locations");
    }

    #[test]
    fn confirm_with_yes_flag() {
        assert!(confirm("Delete?", true).unwrap());
    }
}
