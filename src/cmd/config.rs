//! Configuration loading and the `ticket-dispatch config` command.

use std::path::Path;

use anyhow::{Context, Result};

use ticket_dispatch::config::{CONFIG_FILE, DISPATCH_DIR, DispatchConfig};

use super::super::{Cli, ConfigCommands};

/// Resolve the effective config: file, then `DISPATCH_*` env vars, then CLI
/// flags. A relative `db_path` is anchored at the project dir.
pub fn load_config(project_dir: &Path, cli: &Cli) -> Result<DispatchConfig> {
    let mut config = match &cli.config {
        Some(path) => DispatchConfig::load(path)?,
        None => DispatchConfig::load_or_default(&project_dir.join(DISPATCH_DIR))?,
    };
    config.apply_env_overrides()?;

    if let Some(path) = &cli.db_path {
        config.store.db_path = path.clone();
    }
    if config.store.db_path.is_relative() {
        config.store.db_path = project_dir.join(&config.store.db_path);
    }
    Ok(config)
}

pub fn cmd_config(
    project_dir: &Path,
    config: &DispatchConfig,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let dispatch_dir = project_dir.join(DISPATCH_DIR);
    let config_path = dispatch_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No dispatch.toml found, using defaults");
            }
            println!();
            println!("Effective values (with env/CLI overrides):");
            let rendered =
                toml::to_string_pretty(config).context("Failed to render configuration")?;
            print!("{}", rendered);
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("dispatch.toml already exists at {}", config_path.display());
                return Ok(());
            }
            std::fs::create_dir_all(&dispatch_dir)
                .with_context(|| format!("Failed to create {}", dispatch_dir.display()))?;
            DispatchConfig::default().save(&config_path)?;
            println!("Created {}", config_path.display());
        }
    }
    Ok(())
}
