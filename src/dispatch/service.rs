use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::agent::Agent;
use super::runner::{BatchReport, DispatchBatch, process_tickets};

/// Periodic driver for a set of agents.
///
/// Each pass launches every agent's batch, then waits for all of them
/// before sleeping, so two passes never overlap on the same tickets.
pub struct DispatchService {
    agents: Vec<Arc<dyn Agent>>,
    poll_interval: Duration,
}

impl DispatchService {
    pub fn new(agents: Vec<Arc<dyn Agent>>, poll_interval: Duration) -> Self {
        Self {
            agents,
            poll_interval,
        }
    }

    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    /// One pass over every agent. A fetch failure for one agent is logged
    /// and retried on the next pass; the other agents still run.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Vec<BatchReport> {
        let mut batches: Vec<DispatchBatch> = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            match process_tickets(agent, cancel).await {
                Ok(batch) => batches.push(batch),
                Err(e) => warn!(
                    agent = %agent.agent_type(),
                    error = %e,
                    "failed to fetch tickets, will retry next pass"
                ),
            }
        }
        join_all(batches.into_iter().map(DispatchBatch::join)).await
    }

    /// Run passes until `cancel` fires. Returns the number of passes run.
    pub async fn run_until_cancelled(&self, cancel: &CancellationToken) -> usize {
        let mut passes = 0;
        info!(
            agents = self.agents.len(),
            poll_interval_secs = self.poll_interval.as_secs(),
            "dispatch service started"
        );
        while !cancel.is_cancelled() {
            let reports = self.run_pass(cancel).await;
            passes += 1;
            let succeeded: usize = reports.iter().map(BatchReport::succeeded).sum();
            let failed: usize = reports.iter().map(BatchReport::failed).sum();
            info!(pass = passes, succeeded, failed, "dispatch pass finished");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        info!(passes, "dispatch service stopped");
        passes
    }
}
