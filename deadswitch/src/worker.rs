//! Worker (4.G): a single cooperative scheduler thread driven by a ticker,
//! sweeping due reminders and expired switches in `id` order.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::Status;
use crate::notify::Dispatcher;
use crate::store::Store;

pub struct WorkerConfig {
    pub interval: Duration,
    pub batch_size: i64,
}

pub struct Worker {
    store: Arc<Store>,
    dispatcher: Arc<Dispatcher>,
    config: WorkerConfig,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(store: Arc<Store>, dispatcher: Arc<Dispatcher>, config: WorkerConfig, cancel: CancellationToken) -> Self {
        Self {
            store,
            dispatcher,
            config,
            cancel,
        }
    }

    /// Runs the tick loop until cancelled. An in-flight sweep always runs
    /// to completion before the loop checks for cancellation again.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!("sweep failed: {e}");
                    }
                }
                _ = self.cancel.cancelled() => {
                    info!("worker received shutdown signal, exiting after current sweep");
                    break;
                }
            }
        }
    }

    /// Runs one sweep (reminders phase then expiry phase) outside the
    /// ticker, for callers that want to drive the worker deterministically
    /// — integration tests chief among them.
    pub async fn sweep(&self) -> crate::error::Result<()> {
        self.reminders_phase().await;
        self.expiry_phase().await;
        Ok(())
    }

    async fn reminders_phase(&self) {
        let candidates = match self.store.get_eligible_reminders(self.config.batch_size).await {
            Ok(c) => c,
            Err(e) => {
                error!("failed to fetch reminder candidates: {e}");
                return;
            }
        };

        let now = chrono::Utc::now().timestamp();
        for sw in candidates {
            let Some(threshold_literal) = sw.reminder_threshold.as_deref() else {
                continue;
            };
            let Ok(threshold) = crate::domain::duration::parse_duration(threshold_literal) else {
                continue;
            };
            let due_in = sw.trigger_at - now;
            if due_in <= 0 || due_in as u64 > threshold.as_secs() {
                continue;
            }

            let remaining = Duration::from_secs(due_in.max(0) as u64);
            let body = format!("Your switch will trigger in {}s unless you check in.", remaining.as_secs());

            match self.dispatcher.dispatch_reminder(&sw, &body).await {
                Ok(()) => {
                    let mut updated = sw.clone();
                    updated.reminder_sent = true;
                    if let Err(e) = self.store.update(sw.id, updated).await {
                        error!("failed to mark reminder_sent for switch {}: {e}", sw.id);
                    } else {
                        debug!("reminder sent for switch {}", sw.id);
                    }
                }
                Err(e) => {
                    warn!("reminder send failed for switch {}, will retry next tick: {e}", sw.id);
                }
            }
        }
    }

    async fn expiry_phase(&self) {
        let expired = match self.store.get_expired(self.config.batch_size).await {
            Ok(e) => e,
            Err(e) => {
                error!("failed to fetch expired switches: {e}");
                return;
            }
        };

        for sw in expired {
            match self.dispatcher.dispatch(&sw, &sw.message).await {
                Ok(()) if sw.delete_after_triggered => {
                    if let Err(e) = self.store.delete(&sw.user_id, sw.id).await {
                        error!("failed to delete triggered switch {}: {e}", sw.id);
                    } else {
                        info!("switch {} triggered and deleted (delete_after_triggered)", sw.id);
                    }
                }
                Ok(()) => {
                    let mut updated = sw.clone();
                    updated.status = Status::Triggered;
                    if let Err(e) = self.store.update(sw.id, updated).await {
                        error!("failed to mark switch {} triggered: {e}", sw.id);
                    } else {
                        info!("switch {} triggered", sw.id);
                    }
                }
                Err(e) => {
                    let mut updated = sw.clone();
                    updated.status = Status::Failed;
                    updated.failure_reason = Some(capitalize(&e.to_string()));
                    if let Err(store_err) = self.store.update(sw.id, updated).await {
                        error!("failed to mark switch {} failed: {store_err}", sw.id);
                    } else {
                        warn!("switch {} failed to deliver: {e}", sw.id);
                    }
                }
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
