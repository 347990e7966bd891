//! CLI command implementations.
//!
//! | Module    | Commands handled          |
//! |-----------|---------------------------|
//! | `init`    | `Init`                    |
//! | `agents`  | `Agents`                  |
//! | `ticket`  | `Ticket`                  |
//! | `run`     | `Run`                     |
//! | `config`  | `Config`, config loading  |

pub mod agents;
pub mod config;
pub mod init;
pub mod run;
pub mod ticket;

use anyhow::{Context, Result};

use ticket_dispatch::config::DispatchConfig;
use ticket_dispatch::store::TicketDb;

pub use agents::cmd_agents;
pub use config::{cmd_config, load_config};
pub use init::cmd_init;
pub use run::cmd_run;
pub use ticket::cmd_ticket;

/// Open (creating if needed) the database named by the config.
pub fn open_db(config: &DispatchConfig) -> Result<TicketDb> {
    let path = &config.store.db_path;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    TicketDb::new(path)
}
