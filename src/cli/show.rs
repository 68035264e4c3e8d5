use crate::config::Config;
use crate::error::{AppError, Result};
use clap::Subcommand;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum ShowResource {
    /// Show the configuration file path
    Paths,
    /// Print the effective configuration with credentials redacted
    Config,
}

impl ShowResource {
    pub async fn execute(&self) -> Result<()> {
        match self {
            ShowResource::Paths => show_paths(),
            ShowResource::Config => show_config(),
        }
    }
}

fn show_paths() -> Result<()> {
    let config_path = Config::config_file()?;

    info!(path = ?config_path, "Config path");

    Ok(())
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    let rendered = toml::to_string_pretty(&config.redacted())
        .map_err(|e| AppError::Config(format!("Failed to render config: {}", e)))?;

    print!("{}", rendered);

    Ok(())
}
