//! `config` subcommands. These never touch the service.

use stalink_config::{Config, MqttSection};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global.config.clone().unwrap_or_else(stalink_config::config_path);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let mut cfg = stalink_config::load_config_from(&path)?;
            if let Some(password) = cfg.mqtt.as_mut().and_then(|m| m.password.as_mut()) {
                *password = "********".into();
            }
            output::print_output(toml::to_string_pretty(&cfg)?.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            endpoint,
            mqtt_host,
            mqtt_port,
        } => {
            let cfg = Config {
                endpoint: Some(endpoint),
                mqtt: mqtt_host.map(|host| MqttSection {
                    port: mqtt_port,
                    ..MqttSection::new(host)
                }),
                ..Config::default()
            };
            // Validates the endpoint URL.
            cfg.service_builder()?;

            stalink_config::save_config_to(&cfg, &path)?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }
    }
}
