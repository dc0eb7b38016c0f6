mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stalink_api::SensorThingsService;
use stalink_config::MqttSection;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a service
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "stalink", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let with_mqtt = matches!(cmd, Command::Watch(_))
                || matches!(&cmd, Command::Create(args) if args.mqtt);
            let service = build_service(&cli.global, with_mqtt)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &service, &cli.global).await;
            service.shutdown();
            result
        }
    }
}

/// Build the service from the config file plus CLI overrides. The MQTT
/// connection is only set up for commands that use it.
fn build_service(global: &GlobalOpts, with_mqtt: bool) -> Result<SensorThingsService, CliError> {
    let mut cfg = match &global.config {
        Some(path) => stalink_config::load_config_from(path)?,
        None => stalink_config::load_config()?,
    };

    if let Some(endpoint) = &global.endpoint {
        cfg.endpoint = Some(endpoint.clone());
    }
    if global.insecure {
        cfg.insecure = true;
    }
    if let Some(timeout) = global.timeout {
        cfg.timeout = timeout;
    }
    if let Some(host) = &global.mqtt_host {
        cfg.mqtt
            .get_or_insert_with(|| MqttSection::new(host.as_str()))
            .host
            .clone_from(host);
    }

    if with_mqtt {
        if cfg.mqtt.is_none() {
            return Err(CliError::NoMqtt);
        }
    } else {
        cfg.mqtt = None;
    }

    Ok(cfg.service_builder()?.build()?)
}
