//! `ticket-dispatch init`.

use std::path::Path;

use anyhow::{Context, Result};

use ticket_dispatch::config::{CONFIG_FILE, DISPATCH_DIR, DispatchConfig};

use super::open_db;

pub fn cmd_init(project_dir: &Path, config: &DispatchConfig, force: bool) -> Result<()> {
    let dispatch_dir = project_dir.join(DISPATCH_DIR);
    std::fs::create_dir_all(&dispatch_dir)
        .with_context(|| format!("Failed to create {}", dispatch_dir.display()))?;

    let config_path = dispatch_dir.join(CONFIG_FILE);
    if force || !config_path.exists() {
        DispatchConfig::default().save(&config_path)?;
    }

    open_db(config)?;
    println!(
        "Initialized ticket store at {}",
        config.store.db_path.display()
    );
    Ok(())
}
