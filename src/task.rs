//! Task entity and its status state machine.
//!
//! ```text
//! NONE ──start──▶ RUNNING ──stop(ENDED)──────▶ ENDED
//!                  ▲   │
//!                  │   └──stop(INTERRUPTED)──▶ INTERRUPTED
//!                  └─────────start────────────────┘
//! ```
//!
//! The persisted field names (`use_time`, `task_date`, `memo_text`,
//! `count_second`, `task_status`) are the on-disk format and must not change.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::Record;
use crate::error::{Error, Result};
use crate::timefmt;

/// Planned duration value that means "not set".
pub const DEFAULT_PLANNED_DURATION: &str = "00:00";

fn default_planned_duration() -> String {
    DEFAULT_PLANNED_DURATION.to_string()
}

/// Lifecycle state of a task, persisted as its integer code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TaskStatus {
    #[default]
    None,
    Running,
    Ended,
    Interrupted,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::None,
        TaskStatus::Running,
        TaskStatus::Ended,
        TaskStatus::Interrupted,
    ];

    pub fn code(self) -> u8 {
        match self {
            TaskStatus::None => 0,
            TaskStatus::Running => 1,
            TaskStatus::Ended => 2,
            TaskStatus::Interrupted => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::None => "none",
            TaskStatus::Running => "running",
            TaskStatus::Ended => "ended",
            TaskStatus::Interrupted => "interrupted",
        }
    }

    /// Targets accepted by [`Task::stop`].
    pub fn is_stop_target(self) -> bool {
        matches!(self, TaskStatus::Ended | TaskStatus::Interrupted)
    }

    /// Whether an edit may move a task from `self` to `next`.
    ///
    /// Only the edges of the lifecycle are allowed; keeping the status is
    /// always fine. `ENDED` is terminal.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        self == next
            || matches!(
                (self, next),
                (TaskStatus::None | TaskStatus::Interrupted, TaskStatus::Running)
                    | (TaskStatus::Running, TaskStatus::Ended | TaskStatus::Interrupted)
            )
    }

    /// Verb for moving into this status, used in refusal messages.
    pub fn transition_action(self) -> &'static str {
        match self {
            TaskStatus::None => "reset",
            TaskStatus::Running => "start",
            TaskStatus::Ended => "end",
            TaskStatus::Interrupted => "stop",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<TaskStatus> for u8 {
    fn from(status: TaskStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for TaskStatus {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.code() == code)
            .ok_or_else(|| format!("unknown task status code {code}"))
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return TaskStatus::try_from(code).map_err(Error::InvalidArgument);
        }
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "invalid status '{trimmed}' (expected none|running|ended|interrupted)"
                ))
            })
    }
}

/// A single task as stored in the task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// `0` until the collection assigns one.
    pub id: u32,
    pub title: String,
    /// `hh:mm`, [`DEFAULT_PLANNED_DURATION`] when unset
    #[serde(rename = "use_time", default = "default_planned_duration")]
    pub planned_duration: String,
    /// `YYYY-MM-DD`
    #[serde(rename = "task_date")]
    pub date: String,
    #[serde(rename = "memo_text", default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// `hh:mm:ss.sss` since `start_time`, refreshed while running
    #[serde(rename = "count_second", default)]
    pub elapsed: Option<String>,
    #[serde(rename = "task_status", default)]
    pub status: TaskStatus,
}

impl Task {
    /// A blank task carrying the create sentinel id.
    pub fn empty() -> Self {
        Self {
            id: 0,
            title: String::new(),
            planned_duration: default_planned_duration(),
            date: String::new(),
            memo: None,
            start_time: None,
            end_time: None,
            elapsed: None,
            status: TaskStatus::None,
        }
    }

    pub fn can_start(&self) -> bool {
        matches!(self.status, TaskStatus::None | TaskStatus::Interrupted)
    }

    pub fn can_stop(&self) -> bool {
        self.status == TaskStatus::Running
    }

    pub fn can_end(&self) -> bool {
        self.status == TaskStatus::Running
    }

    /// Mark the task running. `start_time` is only recorded on the first
    /// start so resuming keeps the original value.
    pub fn start(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(timefmt::now());
        }
        self.status = TaskStatus::Running;
    }

    /// Move to `target` if it is `Ended` or `Interrupted`; anything else is
    /// ignored and `false` is returned.
    pub fn stop(&mut self, target: TaskStatus) -> bool {
        if !target.is_stop_target() {
            return false;
        }
        self.status = target;
        if target == TaskStatus::Ended {
            self.end_time = Some(timefmt::now());
        }
        true
    }

    /// Recompute `elapsed` from `start_time`.
    pub fn accumulate_elapsed(&mut self) {
        self.accumulate_elapsed_at(timefmt::now());
    }

    pub(crate) fn accumulate_elapsed_at(&mut self, now: DateTime<Utc>) {
        self.elapsed = self.start_time.and_then(|start| {
            let millis = (now - start).num_milliseconds();
            if millis <= 0 {
                None
            } else {
                Some(timefmt::to_time_string(millis as f64 / 1_000.0))
            }
        });
    }

    /// Planned duration for display, `None` when left at the default.
    pub fn display_planned_duration(&self) -> Option<&str> {
        if self.planned_duration == DEFAULT_PLANNED_DURATION {
            None
        } else {
            Some(self.planned_duration.as_str())
        }
    }

    /// Sort key derived from `date`.
    pub fn date_number(&self) -> Option<u32> {
        timefmt::to_date_number(&self.date)
    }

    /// Elapsed time in seconds, if any has been recorded.
    pub fn elapsed_seconds(&self) -> Option<f64> {
        self.elapsed.as_deref().and_then(timefmt::parse_time_string)
    }
}

impl Record for Task {
    fn id(&self) -> u32 {
        self.id
    }

    fn set_id(&mut self, id: u32) {
        self.id = id;
    }
}

/// Editable fields of a task, filled in before create or update.
///
/// `status` is the requested status. The collection moves the task there
/// through its lifecycle; [`TaskDraft::apply_to`] leaves it alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub planned_duration: String,
    pub date: String,
    pub memo: Option<String>,
    pub status: TaskStatus,
}

impl TaskDraft {
    /// Draft for a new task dated today.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            planned_duration: default_planned_duration(),
            date: timefmt::to_date_string(None),
            memo: None,
            status: TaskStatus::None,
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            planned_duration: task.planned_duration.clone(),
            date: task.date.clone(),
            memo: task.memo.clone(),
            status: task.status,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
        if !timefmt::is_valid_duration(&self.planned_duration) {
            return Err(Error::InvalidArgument(format!(
                "invalid planned duration '{}' (expected hh:mm)",
                self.planned_duration
            )));
        }
        if !timefmt::is_valid_date(&self.date) {
            return Err(Error::InvalidArgument(format!(
                "invalid date '{}' (expected YYYY-MM-DD)",
                self.date
            )));
        }
        Ok(())
    }

    pub fn apply_to(&self, task: &mut Task) {
        task.title = self.title.trim().to_string();
        task.planned_duration = self.planned_duration.clone();
        task.date = self.date.clone();
        task.memo = self
            .memo
            .as_deref()
            .map(str::trim)
            .filter(|memo| !memo.is_empty())
            .map(str::to_string);
    }
}
