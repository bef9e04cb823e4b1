//! API key subcommand handlers.

use secrecy::SecretString;

use crate::cli::{GlobalOpts, KeyArgs, KeyCommand};
use crate::config;
use crate::error::CliError;

pub fn handle(args: KeyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = config::load(global)?;
    let chain = loaded.credentials();

    match args.command {
        KeyCommand::Set { key, plaintext } => {
            let key = match key {
                Some(k) => k,
                None => rpassword::prompt_password("API key: ").map_err(|e| CliError::Validation {
                    field: "interactive".into(),
                    reason: format!("prompt failed: {e}"),
                })?,
            };
            if key.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "api_key".into(),
                    reason: "API key cannot be empty".into(),
                });
            }

            let stored_in = chain.store(&SecretString::from(key.trim().to_owned()), plaintext)?;
            if !global.quiet {
                eprintln!("API key saved ({stored_in})");
            }
            Ok(())
        }

        KeyCommand::Clear => {
            chain.clear()?;
            if !global.quiet {
                eprintln!("API key removed");
            }
            if std::env::var_os(&loaded.config.diagnosis.api_key_env).is_some() {
                tracing::warn!(
                    var = %loaded.config.diagnosis.api_key_env,
                    "environment variable still provides a key"
                );
            }
            Ok(())
        }

        KeyCommand::Status => {
            let line = match chain.resolve() {
                Some((_, source)) => format!("configured ({source})"),
                None => "not configured".into(),
            };
            crate::output::print_output(&line, global.quiet);
            Ok(())
        }
    }
}
