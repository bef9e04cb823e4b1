//! Config subcommand handlers.

use whyfi_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let mut loaded = config::load(global)?;
            if loaded.config.diagnosis.api_key.is_some() {
                loaded.config.diagnosis.api_key = Some(MASK.into());
            }
            let path = loaded.path.display().to_string();
            let out = output::render_single(
                &global.output,
                &loaded.config,
                |c| {
                    toml::to_string_pretty(c)
                        .unwrap_or_else(|e| format!("<serialization failed: {e}>"))
                },
                |_| path.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let path = config::resolve_path(global);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = config::resolve_path(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            whyfi_config::save_config_to(&Config::default(), &path)?;
            if !global.quiet {
                eprintln!("Configuration written to {}", path.display());
            }
            Ok(())
        }
    }
}
