use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use crate::registry::client::RegistryApi;

/// Result of the most recent heartbeat. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatOutcome {
    NotYetSent,
    Renewed,
    Failed,
}

/// Handle to a running heartbeat task
pub struct HeartbeatHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    outcome_rx: watch::Receiver<BeatOutcome>,
}

/// Start renewing `app/instance_id` every `interval`.
///
/// The first renewal fires one full interval after this call. Firing `n`
/// is scheduled at `start + n * interval` regardless of how long earlier
/// calls took; ticks missed behind a slow call are skipped, not replayed.
/// Cancelling `parent` also stops the task.
pub fn start(
    api: Arc<dyn RegistryApi>,
    app: String,
    instance_id: String,
    interval: Duration,
    parent: &CancellationToken,
) -> HeartbeatHandle {
    let cancel = parent.child_token();
    let (outcome_tx, outcome_rx) = watch::channel(BeatOutcome::NotYetSent);

    // Spawned task keeps the caller's span as parent
    let span = tracing::info_span!("heartbeat", app = %app, instance_id = %instance_id);
    let task_cancel = cancel.clone();
    let task = tokio::spawn(
        async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!("Heartbeat started for {}/{} every {:?}", app, instance_id, interval);

            loop {
                tokio::select! {
                    // Cancellation wins over a tick that is ready at the same instant
                    biased;

                    _ = task_cancel.cancelled() => {
                        break;
                    }

                    _ = ticker.tick() => {
                        // Not raced against cancellation: an in-flight renewal completes
                        let outcome = match api.heartbeat(&app, &instance_id).await {
                            Ok(()) => BeatOutcome::Renewed,
                            Err(e) if e.is_transient() => {
                                tracing::warn!("Heartbeat for {}/{} failed: {}", app, instance_id, e);
                                BeatOutcome::Failed
                            }
                            Err(e) => {
                                tracing::error!("Heartbeat for {}/{} rejected: {}", app, instance_id, e);
                                BeatOutcome::Failed
                            }
                        };
                        outcome_tx.send_replace(outcome);
                    }
                }
            }

            tracing::info!("Heartbeat stopped for {}/{}", app, instance_id);
        }
        .instrument(span),
    );

    HeartbeatHandle {
        cancel,
        task,
        outcome_rx,
    }
}

impl HeartbeatHandle {
    /// Stop future renewals. Safe to call more than once.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn last_outcome(&self) -> BeatOutcome {
        *self.outcome_rx.borrow()
    }

    /// Wait for the task to exit, letting an in-flight renewal finish
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            tracing::error!("Heartbeat task failed: {}", e);
        }
    }
}
