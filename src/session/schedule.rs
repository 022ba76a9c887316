use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// A spawned one-shot or periodic job that can be cancelled.
///
/// Cancelling (or dropping the handle) stops any run that has not started
/// yet. A run already in progress is allowed to finish.
#[derive(Debug)]
pub struct ScheduledTask {
    cancel: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Run `job` once, `delay` from now.
    pub fn after<F, Fut>(delay: Duration, job: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel, mut cancelled) = watch::channel(false);
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.changed() => {}
                _ = tokio::time::sleep(delay) => job().await,
            }
        });
        ScheduledTask {
            cancel,
            handle: Some(handle),
        }
    }

    /// Run `job` every `period`, the first time one period from now.
    /// Runs never overlap; a slow run delays the next tick. A period too
    /// long to schedule never fires.
    pub fn every<F, Fut>(period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel, mut cancelled) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let Some(start) = Instant::now().checked_add(period) else {
                tracing::warn!(?period, "period out of range, task will not run");
                let _ = cancelled.changed().await;
                return;
            };
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.changed() => break,
                    _ = ticker.tick() => {}
                }
                job().await;
            }
        });
        ScheduledTask {
            cancel,
            handle: Some(handle),
        }
    }

    /// Stop future runs.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Stop future runs and wait for a run in progress to finish.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "scheduled task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
