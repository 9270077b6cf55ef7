//! Task list with ordering and running-task timers.
//!
//! [`TaskCollection`] wraps the generic [`Collection`] and adds:
//! - ascending order by task date, kept after every mutation
//! - one periodic timer per RUNNING task refreshing its elapsed time
//! - persistence after every mutating operation
//!
//! Timers run on the Tokio runtime that was current at construction, so a
//! collection must be created from inside a runtime.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::collection::{Collection, Shared};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::KeyValueStore;
use crate::task::{Task, TaskDraft, TaskStatus};
use crate::timer::{self, TimerRegistry};

pub struct TaskCollection {
    inner: Collection<Task>,
    timers: TimerRegistry,
    interval: Duration,
}

impl TaskCollection {
    /// Store key used when none is configured.
    pub const STORAGE_KEY: &'static str = "tasks";

    /// Empty collection under [`Self::STORAGE_KEY`] with the default interval.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::with_options(store, Self::STORAGE_KEY, timer::DEFAULT_INTERVAL)
    }

    pub fn with_options(
        store: Arc<dyn KeyValueStore>,
        key: &str,
        interval: Duration,
    ) -> Result<Self> {
        Ok(Self {
            inner: Collection::new(store, key)?,
            timers: TimerRegistry::current()?,
            interval,
        })
    }

    /// Build from configuration and load the stored list.
    pub fn open(store: Arc<dyn KeyValueStore>, config: &Config) -> Result<Self> {
        let mut tasks = Self::with_options(store, &config.storage.key, config.timer.interval())?;
        tasks.load()?;
        Ok(tasks)
    }

    pub fn key(&self) -> &str {
        self.inner.key()
    }

    pub fn list(&self) -> &[Shared<Task>] {
        self.inner.list()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn max_id(&self) -> u32 {
        self.inner.max_id()
    }

    /// Stored entries that are not readable tasks; kept on every save.
    pub fn unreadable_count(&self) -> usize {
        self.inner.unreadable_count()
    }

    pub fn find(&self, id: u32) -> Option<Shared<Task>> {
        self.inner.find(id)
    }

    /// Like [`find`](Self::find) but an unknown id is an error.
    pub fn get(&self, id: u32) -> Result<Shared<Task>> {
        self.find(id).ok_or(Error::TaskNotFound(id))
    }

    /// Copies of every task in collection order.
    pub fn snapshot(&self) -> Vec<Task> {
        self.list().iter().map(Shared::snapshot).collect()
    }

    pub fn is_timer_armed(&self, id: u32) -> bool {
        self.timers.is_armed(id)
    }

    /// Replace the list with the stored one and re-arm RUNNING tasks.
    pub fn load(&mut self) -> Result<usize> {
        self.timers.disarm_all();
        let count = self.inner.load()?;
        self.sort();
        let armed = self.arm_running();
        info!(key = %self.key(), count, armed, "tasks loaded");
        Ok(count)
    }

    /// Insert `task` (assigning an id when it has none) and persist.
    pub fn add_item(&mut self, task: Shared<Task>) -> Result<()> {
        self.inner.add_item(task)?;
        self.sort();
        self.save()
    }

    /// Create a task from a validated draft.
    ///
    /// A new task starts as NONE, or RUNNING when the draft asks for it.
    pub fn create(&mut self, draft: &TaskDraft) -> Result<Shared<Task>> {
        draft.validate()?;
        if !TaskStatus::None.can_transition_to(draft.status) {
            return Err(Error::InvalidArgument(format!(
                "a new task cannot be {}",
                draft.status
            )));
        }
        let mut task = Task::empty();
        draft.apply_to(&mut task);
        let handle = Shared::new(task);
        self.inner.add_item(handle.clone())?;
        self.sort();
        if draft.status == TaskStatus::Running {
            self.start_task(&handle);
        }
        self.save()?;
        debug!(id = handle.read(|t| t.id), "task created");
        Ok(handle)
    }

    /// Apply a draft to a listed task and persist.
    ///
    /// A status change goes through [`start_task`](Self::start_task) or
    /// [`stop_task`](Self::stop_task); moves the lifecycle does not allow
    /// fail with [`Error::InvalidTransition`] and leave the task untouched.
    pub fn update(&mut self, task: &Shared<Task>, draft: &TaskDraft) -> Result<()> {
        let (id, current) = task.read(|t| (t.id, t.status));
        if !self.inner.contains(task) {
            return Err(Error::TaskNotFound(id));
        }
        draft.validate()?;
        let target = draft.status;
        if !current.can_transition_to(target) {
            return Err(Error::InvalidTransition {
                id,
                action: target.transition_action(),
                status: current,
            });
        }

        task.update(|t| draft.apply_to(t));
        if target != current {
            if target == TaskStatus::Running {
                self.start_task(task);
            } else if !self.stop_task(task, target) {
                // RUNNING without a timer, e.g. built outside a load.
                task.update(|t| {
                    t.accumulate_elapsed();
                    t.stop(target)
                });
            }
        }
        self.save()
    }

    /// Interrupt `task` if it is running, then remove it and persist.
    pub fn remove_item(&mut self, task: &Shared<Task>) -> Result<bool> {
        if !self.inner.contains(task) {
            return Ok(false);
        }
        self.stop_task(task, TaskStatus::Interrupted);
        self.inner.remove_item(task)?;
        self.save()?;
        Ok(true)
    }

    /// Sort, arm any RUNNING task without a timer, and write the list.
    ///
    /// Arming happens before the write so a first `start_time` is persisted.
    pub fn save(&mut self) -> Result<()> {
        self.sort();
        self.arm_running();
        self.inner.save()
    }

    /// Stable ascending order by date; unparsable dates go last.
    pub fn sort(&mut self) {
        self.inner
            .sort_by_key(|task| match task.date_number() {
                Some(number) => (false, number),
                None => (true, 0),
            });
    }

    /// Start `task` and arm its timer. `false` if it is not listed or
    /// already has a timer.
    pub fn start_task(&mut self, task: &Shared<Task>) -> bool {
        if !self.inner.contains(task) {
            return false;
        }
        let id = task.read(|t| t.id);
        if self.timers.is_armed(id) {
            return false;
        }
        task.update(Task::start);
        let ticking = task.clone();
        self.timers.arm(id, self.interval, move || {
            ticking.update(Task::accumulate_elapsed);
        })
    }

    /// Disarm `task`'s timer and move it to `target`.
    ///
    /// Only acts on a listed task with an armed timer and a valid stop
    /// target (`Ended` or `Interrupted`).
    pub fn stop_task(&mut self, task: &Shared<Task>, target: TaskStatus) -> bool {
        if !target.is_stop_target() || !self.inner.contains(task) {
            return false;
        }
        let id = task.read(|t| t.id);
        if !self.timers.disarm(id) {
            return false;
        }
        task.update(|t| {
            t.accumulate_elapsed();
            t.stop(target)
        })
    }

    /// Recompute elapsed time of every RUNNING task now.
    pub fn refresh_elapsed(&self) {
        for task in self.list() {
            task.update(|t| {
                if t.status == TaskStatus::Running {
                    t.accumulate_elapsed();
                }
            });
        }
    }

    fn arm_running(&mut self) -> usize {
        let running: Vec<Shared<Task>> = self
            .list()
            .iter()
            .filter(|task| task.read(|t| t.status == TaskStatus::Running))
            .cloned()
            .collect();
        running
            .iter()
            .filter(|task| self.start_task(task))
            .count()
    }
}
