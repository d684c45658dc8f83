use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Cancellable periodic task standing in for dashboard polling. The callback should only run
/// read-only queries; nothing in the engine depends on it firing.
pub struct PeriodicRefresh {
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PeriodicRefresh {
    /// Spawn on the current runtime. The first tick fires after one full `interval`.
    pub fn spawn<F>(name: &'static str, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (cancel, mut cancelled) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    _ = ticker.tick() => {
                        debug!(task = name, "periodic refresh");
                        tick();
                    }
                }
            }
            debug!(task = name, "periodic refresh stopped");
        });

        Self {
            cancel: Some(cancel),
            task,
        }
    }

    /// Stop ticking and wait for the task to wind down.
    pub async fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PeriodicRefresh {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}
