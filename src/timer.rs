//! Periodic jobs keyed by task id.
//!
//! Each armed id owns one Tokio task that ticks every `interval` until it is
//! disarmed. Dropping the registry aborts every job.

use std::collections::HashMap;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::{Error, Result};

/// Default tick interval for running tasks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

pub struct TimerRegistry {
    runtime: Handle,
    jobs: HashMap<u32, JoinHandle<()>>,
}

impl TimerRegistry {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            jobs: HashMap::new(),
        }
    }

    /// Registry bound to the runtime of the calling context.
    pub fn current() -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self::new(runtime))
    }

    /// Spawn a job calling `tick` every `interval`, first after one interval.
    ///
    /// Returns `false` and leaves the existing job alone if `id` is armed.
    pub fn arm<F>(&mut self, id: u32, interval: Duration, mut tick: F) -> bool
    where
        F: FnMut() + Send + 'static,
    {
        if self.is_armed(id) {
            return false;
        }
        let period = interval.max(Duration::from_millis(1));
        let handle = self.runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tick();
            }
        });
        debug!(id, interval_ms = period.as_millis() as u64, "timer armed");
        self.jobs.insert(id, handle);
        true
    }

    /// Abort the job for `id`. `false` if none was armed.
    pub fn disarm(&mut self, id: u32) -> bool {
        match self.jobs.remove(&id) {
            Some(handle) => {
                handle.abort();
                debug!(id, "timer disarmed");
                true
            }
            None => false,
        }
    }

    pub fn disarm_all(&mut self) {
        for (_, handle) in self.jobs.drain() {
            handle.abort();
        }
    }

    pub fn is_armed(&self, id: u32) -> bool {
        self.jobs.contains_key(&id)
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.disarm_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::clone(&count);
        (count, move || {
            ticks.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn current_requires_runtime() {
        assert!(matches!(TimerRegistry::current(), Err(Error::NoRuntime)));
    }

    #[tokio::test]
    async fn armed_job_ticks_until_disarmed() {
        let mut timers = TimerRegistry::current().expect("runtime");
        let (count, tick) = counter();
        assert!(timers.arm(1, Duration::from_millis(5), tick));
        assert!(timers.is_armed(1));

        time::sleep(Duration::from_millis(60)).await;
        assert!(count.load(Ordering::SeqCst) > 0);

        assert!(timers.disarm(1));
        assert!(!timers.is_armed(1));
        time::sleep(Duration::from_millis(10)).await;
        let after = count.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), after);
    }

    #[tokio::test]
    async fn arm_is_idempotent_per_id() {
        let mut timers = TimerRegistry::current().expect("runtime");
        let (_, first) = counter();
        let (second_count, second) = counter();
        assert!(timers.arm(4, Duration::from_millis(5), first));
        assert!(!timers.arm(4, Duration::from_millis(5), second));
        assert!(timers.is_armed(4));

        time::sleep(Duration::from_millis(30)).await;
        assert_eq!(second_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn drop_aborts_all_jobs() {
        let (count, tick) = counter();
        {
            let mut timers = TimerRegistry::current().expect("runtime");
            assert!(timers.arm(2, Duration::from_millis(5), tick));
            assert!(timers.is_armed(2));
        }
        time::sleep(Duration::from_millis(10)).await;
        let after = count.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), after);
    }

    #[test]
    fn disarm_unknown_id_is_noop() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        let mut timers = TimerRegistry::new(runtime.handle().clone());
        assert!(!timers.disarm(9));
        assert!(!timers.is_armed(9));
    }
}
