//! `watch`: stream entities published on an MQTT topic until Ctrl-C.

use tracing::{info, warn};

use stalink_api::model::{Entity, ParsedPath};
use stalink_api::SensorThingsService;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn watch<T: Entity>(
    service: &SensorThingsService,
    target: &ParsedPath,
    select: &[String],
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let dao = util::scoped_dao::<T>(service, target);

    // One line per message; a table per message would be unreadable.
    let format = match global.output {
        OutputFormat::Table => OutputFormat::JsonCompact,
        ref other => other.clone(),
    };
    let printer = service.downgrade();
    let handler = move |entity: T| {
        let Some(service) = printer.upgrade() else {
            return;
        };
        let rendered = service
            .encode_entity(&entity)
            .map_err(|e| e.to_string())
            .and_then(|encoded| {
                output::render_single(&format, &encoded).map_err(|e| e.to_string())
            });
        match rendered {
            Ok(line) => output::print_output(&line, false),
            Err(error) => warn!(%error, "could not render message"),
        }
    };

    let subscription = match &target.id {
        Some(_) if !select.is_empty() => {
            return Err(CliError::Validation {
                field: "select".into(),
                reason: "--select applies to collection topics only".into(),
            });
        }
        Some(id) => dao.subscribe_entity(&T::reference(id.clone()), handler).await?,
        None if select.is_empty() => dao.subscribe(handler).await?,
        None => dao.subscribe_select(select, handler).await?,
    };

    info!(topic = subscription.topic(), "watching");
    if !global.quiet {
        eprintln!("Watching {} (Ctrl-C to stop)", subscription.topic());
    }

    tokio::signal::ctrl_c().await?;

    dao.unsubscribe(&subscription).await?;
    service.shutdown();
    Ok(())
}
