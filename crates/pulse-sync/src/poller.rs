// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic poll task shared by the synchronizers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// When the first poll of a freshly started task fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FirstPoll {
    Immediate,
    AfterPeriod,
}

/// A running poll loop. Cancelled on [`PollTask::stop`] or drop.
///
/// Cancellation also abandons a fetch that is in flight, so no poll result is
/// applied once `stop` has returned.
pub(crate) struct PollTask {
    scope: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Spawns a loop that runs `poll` every `period`, and early whenever
    /// `wake` is notified. An early poll restarts the period.
    pub(crate) fn spawn<F, Fut>(
        scope: &'static str,
        period: Duration,
        first: FirstPoll,
        wake: Arc<Notify>,
        poll: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let start = match first {
                FirstPoll::Immediate => Instant::now(),
                FirstPoll::AfterPeriod => Instant::now() + period,
            };
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(scope, period_secs = period.as_secs_f64(), "poll task started");

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                    _ = wake.notified() => {
                        debug!(scope, "poll woken early");
                        ticker.reset();
                    }
                }

                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = poll() => {}
                }
            }

            debug!(scope, "poll task stopped");
        });

        Self {
            scope,
            cancel,
            handle,
        }
    }

    pub(crate) fn stop(self) {
        debug!(scope = self.scope, "stopping poll task");
        self.cancel.cancel();
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(first: FirstPoll, wake: Arc<Notify>) -> (PollTask, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let task = PollTask::spawn("test", Duration::from_secs(5), first, wake, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, count)
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_first_poll_then_every_period() {
        let (task, count) = counting_task(FirstPoll::Immediate, Arc::new(Notify::new()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
        task.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_first_poll_waits_one_period() {
        let (task, count) = counting_task(FirstPoll::AfterPeriod, Arc::new(Notify::new()));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        task.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn wake_triggers_an_early_poll() {
        let wake = Arc::new(Notify::new());
        let (task, count) = counting_task(FirstPoll::AfterPeriod, Arc::clone(&wake));

        tokio::time::sleep(Duration::from_secs(1)).await;
        wake.notify_one();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        task.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_polls() {
        let (task, count) = counting_task(FirstPoll::Immediate, Arc::new(Notify::new()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        task.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_task_cancels_it() {
        let (task, count) = counting_task(FirstPoll::Immediate, Arc::new(Notify::new()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(task);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
