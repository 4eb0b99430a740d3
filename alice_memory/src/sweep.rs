//! Background expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use alice_core::SessionStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// A running sweep task. Cancelled when dropped.
pub struct Sweeper {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Run `store.sweep_expired()` every `period` until cancelled.
///
/// A failed sweep is logged and the next tick proceeds as usual.
#[must_use]
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, period: Duration) -> Sweeper {
    let token = CancellationToken::new();
    let cancelled = token.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancelled.cancelled() => break,
                _ = ticker.tick() => {
                    match store.sweep_expired().await {
                        Ok(report) if !report.is_empty() => debug!(
                            histories_expired = report.histories_expired,
                            sessions_removed = report.sessions_removed,
                            "Sweep finished"
                        ),
                        Ok(_) => {}
                        Err(e) => error!("Session sweep failed: {e}"),
                    }
                }
            }
        }
        debug!("Session sweeper stopped");
    });

    debug!("Session sweeper started: every {}s", period.as_secs());
    Sweeper {
        token,
        handle: Some(handle),
    }
}

impl Sweeper {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait for an in-flight sweep to finish.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Session sweeper ended abnormally: {e}");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
