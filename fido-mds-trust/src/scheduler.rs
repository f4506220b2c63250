//! Running a task once a day.
//!
//! [`SelfUpdatingMds`](crate::SelfUpdatingMds) only depends on the [`Scheduler`] trait, so a
//! host can drive refreshes from whatever timer it already has. [`DailyScheduler`] is the
//! tokio implementation used by default, and [`ManualScheduler`] fires only when asked.

use crate::error::{MdsError, MdsResult};
use chrono::{DateTime, NaiveTime, Utc};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// The work a scheduler runs on each tick. A task reports its own failures, a scheduler
/// never sees them.
pub type ScheduledTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Something that can run a task once per day until cancelled.
pub trait Scheduler: Send + Sync {
    /// Run `task` once per day. Scheduling a new task replaces any previous one.
    fn schedule_daily(&self, task: ScheduledTask) -> MdsResult<()>;

    /// Stop running the scheduled task. A tick that is already running is allowed to
    /// finish or is abandoned, at the implementation's discretion.
    fn cancel(&self);
}

/// Time until the next occurrence of `at` (UTC) strictly after `now`.
pub(crate) fn until_next(at: NaiveTime, now: DateTime<Utc>) -> Duration {
    let mut next = now.date_naive().and_time(at).and_utc();
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or_default()
}

/// Runs the task on the tokio runtime, every day at a fixed UTC time of day.
#[derive(Debug)]
pub struct DailyScheduler {
    at: NaiveTime,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DailyScheduler {
    /// A scheduler that fires daily at `at`, UTC.
    pub fn new(at: NaiveTime) -> Self {
        DailyScheduler {
            at,
            handle: Mutex::new(None),
        }
    }

    /// The UTC time of day this scheduler fires at.
    pub fn at(&self) -> NaiveTime {
        self.at
    }
}

impl Scheduler for DailyScheduler {
    fn schedule_daily(&self, task: ScheduledTask) -> MdsResult<()> {
        let rt = tokio::runtime::Handle::try_current()
            .map_err(|e| MdsError::Scheduler(e.to_string()))?;

        let at = self.at;
        let join = rt.spawn(async move {
            loop {
                let delay = until_next(at, Utc::now());
                debug!(?delay, "next scheduled tick");
                tokio::time::sleep(delay).await;
                task().await;
            }
        });

        let previous = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(join);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    fn cancel(&self) {
        if let Some(join) = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            debug!("cancelling daily scheduled task");
            join.abort();
        }
    }
}

impl Drop for DailyScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A scheduler that only runs its task when [`ManualScheduler::fire`] is called. Useful
/// where the host owns the timer, and in tests.
#[derive(Default)]
pub struct ManualScheduler {
    task: Mutex<Option<ScheduledTask>>,
}

impl ManualScheduler {
    /// A scheduler with no task.
    pub fn new() -> Self {
        Self::default()
    }

    /// Is a task currently scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run the scheduled task once, returning false if none is scheduled.
    pub async fn fire(&self) -> bool {
        // Clone out so the lock is released before awaiting.
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match task {
            Some(task) => {
                task().await;
                true
            }
            None => false,
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_daily(&self, task: ScheduledTask) -> MdsResult<()> {
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(())
    }

    fn cancel(&self) {
        self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(counter: &Arc<AtomicUsize>) -> ScheduledTask {
        let counter = counter.clone();
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[test]
    fn next_tick_is_later_today_or_tomorrow() {
        let midnight = NaiveTime::MIN;
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap();
        assert_eq!(until_next(midnight, now), Duration::from_secs(3600));

        let at = NaiveTime::from_hms_opt(6, 30, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        assert_eq!(until_next(at, now), Duration::from_secs(1800));

        // Exactly on the hour fires tomorrow, not immediately.
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap();
        assert_eq!(until_next(at, now), Duration::from_secs(86400));
    }

    #[tokio::test]
    async fn manual_scheduler_fires_until_cancelled() {
        let counter = Arc::new(AtomicUsize::new(0));
        let sched = ManualScheduler::new();
        assert!(!sched.fire().await);

        sched.schedule_daily(counting_task(&counter)).unwrap();
        assert!(sched.is_scheduled());
        assert!(sched.fire().await);
        assert!(sched.fire().await);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        sched.cancel();
        assert!(!sched.fire().await);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn daily_scheduler_ticks_once_per_day() {
        let counter = Arc::new(AtomicUsize::new(0));
        let sched = DailyScheduler::new(NaiveTime::MIN);
        sched.schedule_daily(counting_task(&counter)).unwrap();

        // Nothing runs before the first tick is due.
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // Two full days of virtual time cover at least two ticks.
        tokio::time::sleep(Duration::from_secs(2 * 86400 + 60)).await;
        assert!(counter.load(Ordering::SeqCst) >= 2);

        sched.cancel();
        let seen = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3 * 86400)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn daily_scheduler_needs_a_runtime() {
        let counter = Arc::new(AtomicUsize::new(0));
        let sched = DailyScheduler::new(NaiveTime::MIN);
        assert!(matches!(
            sched.schedule_daily(counting_task(&counter)),
            Err(MdsError::Scheduler(_))
        ));
    }
}
