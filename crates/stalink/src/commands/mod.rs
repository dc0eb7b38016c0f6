//! Command dispatch.
//!
//! Every entity command resolves its path argument against the entity graph
//! and then runs a handler generic over the concrete entity type.

pub mod config_cmd;
mod entities;
mod util;
mod watch;

use stalink_api::SensorThingsService;
use stalink_api::model::{
    Actuator, Datastream, EntityType, FeatureOfInterest, HistoricalLocation, Location,
    MultiDatastream, Observation, ObservedProperty, Sensor, Task, TaskingCapability, Thing,
};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Await `handler::<T>(args..)` with `T` the struct for `$entity_type`.
macro_rules! with_entity_type {
    ($entity_type:expr, $($handler:ident)::+, ($($arg:expr),* $(,)?)) => {
        match $entity_type {
            EntityType::Thing => $($handler)::+::<Thing>($($arg),*).await,
            EntityType::Location => $($handler)::+::<Location>($($arg),*).await,
            EntityType::HistoricalLocation => $($handler)::+::<HistoricalLocation>($($arg),*).await,
            EntityType::Datastream => $($handler)::+::<Datastream>($($arg),*).await,
            EntityType::MultiDatastream => $($handler)::+::<MultiDatastream>($($arg),*).await,
            EntityType::Sensor => $($handler)::+::<Sensor>($($arg),*).await,
            EntityType::ObservedProperty => $($handler)::+::<ObservedProperty>($($arg),*).await,
            EntityType::Observation => $($handler)::+::<Observation>($($arg),*).await,
            EntityType::FeatureOfInterest => $($handler)::+::<FeatureOfInterest>($($arg),*).await,
            EntityType::Actuator => $($handler)::+::<Actuator>($($arg),*).await,
            EntityType::TaskingCapability => $($handler)::+::<TaskingCapability>($($arg),*).await,
            EntityType::Task => $($handler)::+::<Task>($($arg),*).await,
        }
    };
}

pub async fn dispatch(
    cmd: Command,
    service: &SensorThingsService,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Get(args) => {
            let target = util::parse_target(service, &args.path)?;
            let expansion = util::expansion(&args.expand);
            with_entity_type!(
                target.entity_type,
                entities::get,
                (service, &target, &expansion, global)
            )
        }
        Command::List(args) => {
            let target = util::parse_target(service, &args.path)?;
            with_entity_type!(target.entity_type, entities::list, (service, &target, &args, global))
        }
        Command::Create(args) => {
            let target = util::parse_target(service, &args.path)?;
            let body = match (&args.data, &args.from_file) {
                (Some(data), _) => serde_json::from_str(data)?,
                (None, Some(path)) => util::read_json_file(path)?,
                (None, None) => {
                    return Err(CliError::Validation {
                        field: "data".into(),
                        reason: "pass --data or --from-file".into(),
                    });
                }
            };
            with_entity_type!(
                target.entity_type,
                entities::create,
                (service, &target, body, args.mqtt, global)
            )
        }
        Command::Delete(args) => {
            let target = util::parse_target(service, &args.path)?;
            with_entity_type!(target.entity_type, entities::delete, (service, &target, global))
        }
        Command::Watch(args) => {
            let target = util::parse_target(service, &args.path)?;
            with_entity_type!(
                target.entity_type,
                watch::watch,
                (service, &target, &args.select, global)
            )
        }
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
