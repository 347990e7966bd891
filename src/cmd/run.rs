//! `ticket-dispatch run`: the dispatch service loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use ticket_dispatch::config::DispatchConfig;
use ticket_dispatch::dispatch::{AgentEnv, AgentRegistry, DispatchService, EventBus};
use ticket_dispatch::store::{DbHandle, TicketStore};

use super::open_db;

pub async fn cmd_run(
    config: &DispatchConfig,
    agent_tags: &[String],
    once: bool,
    print_events: bool,
) -> Result<()> {
    let store: Arc<dyn TicketStore> = Arc::new(DbHandle::new(open_db(config)?));
    let bus = Arc::new(EventBus::new(1024));

    let printer = print_events.then(|| {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            use tokio::sync::broadcast::error::RecvError;
            loop {
                match rx.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => tracing::warn!(error = %e, "failed to serialize event"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event printer fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    let tags: Vec<String> = if agent_tags.is_empty() {
        config
            .dispatch
            .agents
            .iter()
            .map(|a| a.as_str().to_string())
            .collect()
    } else {
        agent_tags.to_vec()
    };

    let env = AgentEnv::new(store, bus.clone()).with_settings(config.settings());
    let registry = AgentRegistry::builtin();
    let agents = tags
        .iter()
        .map(|tag| registry.new_agent(tag, env.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    drop(env);
    drop(bus);

    let service = DispatchService::new(agents, config.poll_interval());
    let cancel = CancellationToken::new();

    if once {
        let reports = service.run_pass(&cancel).await;
        for report in &reports {
            println!(
                "{}: {} succeeded, {} failed, {} skipped",
                report.agent_type,
                report.succeeded(),
                report.failed(),
                report.skipped.len()
            );
        }
    } else {
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                shutdown.cancel();
            }
        });
        service.run_until_cancelled(&cancel).await;
    }

    // Every sender lives in the agents; dropping them closes the channel.
    drop(service);
    if let Some(printer) = printer {
        printer.await.context("Event printer task failed")?;
    }
    Ok(())
}
