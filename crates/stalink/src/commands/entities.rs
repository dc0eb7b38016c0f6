//! get / list / create / delete handlers.

use serde_json::{Map, Value};
use tracing::debug;

use stalink_api::model::{Entity, ParsedPath};
use stalink_api::{Expansion, SensorThingsService};

use crate::cli::{GlobalOpts, ListArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn get<T: Entity>(
    service: &SensorThingsService,
    target: &ParsedPath,
    expansion: &Expansion,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let dao = util::scoped_dao::<T>(service, target);
    let entity = match (&target.id, &target.parent) {
        (Some(id), _) if expansion.is_empty() => dao.find(id.clone()).await?,
        (Some(id), _) => dao.find_with_expansion(id.clone(), expansion).await?,
        // Singleton navigation, e.g. Observations(7)/Datastream.
        (None, Some(parent)) if expansion.is_empty() => dao.find_related(parent).await?,
        (None, Some(_)) => {
            return Err(CliError::Validation {
                field: "expand".into(),
                reason: "expansion needs an entity id in the path".into(),
            });
        }
        (None, None) => return Err(util::not_single_entity(target)),
    };

    let encoded = service.encode_entity(&entity)?;
    let out = output::render_single(&global.output, &encoded)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn list<T: Entity>(
    service: &SensorThingsService,
    target: &ParsedPath,
    args: &ListArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::require_collection(target)?;

    let mut query = util::scoped_dao::<T>(service, target)
        .query()
        .select(args.select.iter().cloned())
        .expansion(util::expansion(&args.expand));
    if let Some(filter) = &args.filter {
        query = query.filter(filter.clone());
    }
    for order in &args.order_by {
        query = query.order_by(order.clone());
    }
    if let Some(top) = args.top {
        query = query.top(top);
    }
    if let Some(skip) = args.skip {
        query = query.skip(skip);
    }
    if args.count {
        query = query.count();
    }
    debug!(?query, "listing");

    let entities = if args.all {
        query.list_all().await?
    } else {
        let page = query.list().await?;
        if !global.quiet {
            if let Some(count) = page.count() {
                eprintln!("{count} total");
            }
            if page.has_next() {
                eprintln!("more results available; use --all to fetch every page");
            }
        }
        page.into_entities()
    };

    let encoded = entities
        .iter()
        .map(|entity| service.encode_entity(entity))
        .collect::<Result<Vec<Map<String, Value>>, _>>()?;
    let out = output::render_list(&global.output, &encoded)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn create<T: Entity>(
    service: &SensorThingsService,
    target: &ParsedPath,
    body: Value,
    over_mqtt: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::require_collection(target)?;
    let dao = util::scoped_dao::<T>(service, target);
    let mut entity: T = service.decode_entity(&body)?;

    if over_mqtt {
        dao.create_mqtt(&entity).await?;
        if !global.quiet {
            eprintln!("Published to {}", dao.topic()?);
        }
        return Ok(());
    }

    dao.create(&mut entity).await?;
    let created = entity.entity_ref()?;
    if !global.quiet {
        eprintln!("Created {created}");
    }
    let encoded = service.encode_entity(&entity)?;
    let out = output::render_single(&global.output, &encoded)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn delete<T: Entity>(
    service: &SensorThingsService,
    target: &ParsedPath,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = util::require_id(target)?;
    let mut entity = T::reference(id);
    let label = entity.entity_ref()?;

    if !util::confirm(&format!("Delete {label}?"), global.yes)? {
        return Ok(());
    }
    service.dao::<T>().delete(&mut entity).await?;
    if !global.quiet {
        eprintln!("Deleted {label}");
    }
    Ok(())
}
