use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{HandlingError, StoreError};

/// Cancellation scope for one processing task.
///
/// Combines a child of the dispatcher's cancellation token with a deadline
/// fixed when the task starts. Every suspension point inside an agent goes
/// through [`TicketContext::run`] (or its `store`/`sleep` shorthands) so the
/// task stops at the next await once either fires.
#[derive(Debug, Clone)]
pub struct TicketContext {
    ticket_id: i64,
    cancel: CancellationToken,
    deadline: Instant,
    budget: Duration,
}

impl TicketContext {
    pub fn new(ticket_id: i64, parent: &CancellationToken, budget: Duration) -> Self {
        Self {
            ticket_id,
            cancel: parent.child_token(),
            deadline: Instant::now() + budget,
            budget,
        }
    }

    pub fn ticket_id(&self) -> i64 {
        self.ticket_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Cancel this task only. The parent token is unaffected.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Non-blocking check, for agents doing CPU work between awaits.
    pub fn check(&self) -> Result<(), HandlingError> {
        if self.cancel.is_cancelled() {
            Err(HandlingError::Cancelled)
        } else if Instant::now() >= self.deadline {
            Err(HandlingError::TimedOut { after: self.budget })
        } else {
            Ok(())
        }
    }

    /// Drive `fut` until it completes, the scope is cancelled, or the
    /// deadline passes, whichever comes first. An abandoned future is dropped
    /// at its current await point.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, HandlingError>
    where
        F: Future<Output = Result<T, HandlingError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HandlingError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => {
                Err(HandlingError::TimedOut { after: self.budget })
            }
            result = fut => result,
        }
    }

    /// [`run`](Self::run) for a ticket store call.
    pub async fn store<F, T>(&self, fut: F) -> Result<T, HandlingError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        self.run(async { fut.await.map_err(HandlingError::from) })
            .await
    }

    /// Sleep that is abandoned as soon as the scope ends.
    pub async fn sleep(&self, duration: Duration) -> Result<(), HandlingError> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
