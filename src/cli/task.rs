//! tasktimer task command implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::collection::Shared;
use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::FileStore;
use crate::task::{Task, TaskDraft, TaskStatus};
use crate::task_collection::TaskCollection;

const MIN_REFRESH_MS: u64 = 10;

pub struct GlobalOptions {
    pub data_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

impl GlobalOptions {
    pub(crate) fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

pub struct AddOptions {
    pub title: String,
    pub duration: Option<String>,
    pub date: Option<String>,
    pub memo: Option<String>,
    pub global: GlobalOptions,
}

pub struct EditOptions {
    pub id: u32,
    pub title: Option<String>,
    pub duration: Option<String>,
    pub date: Option<String>,
    pub memo: Option<String>,
    pub status: Option<TaskStatus>,
    pub global: GlobalOptions,
}

pub struct WatchOptions {
    pub refresh_ms: Option<u64>,
    pub max_ticks: Option<u64>,
    pub global: GlobalOptions,
}

/// Task as shown to users.
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: u32,
    pub title: String,
    pub date: String,
    pub planned_duration: Option<String>,
    pub memo: Option<String>,
    pub status: TaskStatus,
    pub status_label: &'static str,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub elapsed: Option<String>,
}

impl From<&Task> for TaskView {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            date: task.date.clone(),
            planned_duration: task.display_planned_duration().map(str::to_string),
            memo: task.memo.clone(),
            status: task.status,
            status_label: task.status.label(),
            start_time: task.start_time,
            end_time: task.end_time,
            elapsed: task.elapsed.clone(),
        }
    }
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<TaskView>,
}

#[derive(Serialize)]
struct RemovedOutput {
    id: u32,
    removed: bool,
}

pub(crate) struct TaskContext {
    pub config: Config,
    pub store: Arc<FileStore>,
    pub data_dir: PathBuf,
}

/// Resolve the data directory and configuration for a command.
pub(crate) fn resolve_context(global: &GlobalOptions) -> Result<TaskContext> {
    let data_dir = match global.data_dir.clone() {
        Some(dir) => dir,
        None => config::default_data_dir().ok_or_else(|| {
            Error::InvalidArgument(
                "no data directory available; pass --data-dir or set TASKTIMER_DIR".to_string(),
            )
        })?,
    };
    let config = match global.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::load_from_dir(&data_dir)?,
    };
    let store = Arc::new(FileStore::new(data_dir.clone()));
    Ok(TaskContext {
        config,
        store,
        data_dir,
    })
}

fn open_tasks(global: &GlobalOptions) -> Result<TaskCollection> {
    let ctx = resolve_context(global)?;
    let tasks = TaskCollection::open(ctx.store, &ctx.config)?;
    tasks.refresh_elapsed();
    Ok(tasks)
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let mut tasks = open_tasks(&options.global)?;

    let mut draft = TaskDraft::new(options.title);
    if let Some(duration) = options.duration {
        draft.planned_duration = duration;
    }
    if let Some(date) = options.date {
        draft.date = date;
    }
    draft.memo = options.memo;

    let handle = tasks.create(&draft)?;
    let task = handle.snapshot();
    info!(id = task.id, "task added");

    let mut human = HumanOutput::new(format!("Added task {}", task.id));
    push_task_summary(&mut human, &task);
    human.push_next_step(format!("tasktimer start {}", task.id));

    emit_success(
        options.global.output(),
        "add",
        &TaskView::from(&task),
        Some(&human),
    )
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let mut tasks = open_tasks(&options.global)?;
    let handle = tasks.get(options.id)?;

    let mut draft = TaskDraft::from_task(&handle.snapshot());
    if let Some(title) = options.title {
        draft.title = title;
    }
    if let Some(duration) = options.duration {
        draft.planned_duration = duration;
    }
    if let Some(date) = options.date {
        draft.date = date;
    }
    if let Some(memo) = options.memo {
        draft.memo = Some(memo);
    }
    if let Some(status) = options.status {
        draft.status = status;
    }

    tasks.update(&handle, &draft)?;
    let task = handle.snapshot();

    let mut human = HumanOutput::new(format!("Updated task {}", task.id));
    push_task_summary(&mut human, &task);

    emit_success(
        options.global.output(),
        "edit",
        &TaskView::from(&task),
        Some(&human),
    )
}

pub fn run_list(global: GlobalOptions) -> Result<()> {
    let tasks = open_tasks(&global)?;
    let views: Vec<TaskView> = tasks.snapshot().iter().map(TaskView::from).collect();

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", views.len().to_string());
    for view in &views {
        human.push_detail(format_task_line(view));
    }
    if views.is_empty() {
        human.push_next_step("tasktimer add <title>");
    }
    match tasks.unreadable_count() {
        0 => {}
        1 => human.push_warning("1 stored entry is not a readable task and was left as is"),
        n => human.push_warning(format!(
            "{n} stored entries are not readable tasks and were left as is"
        )),
    }

    let output = TaskListOutput {
        total: views.len(),
        tasks: views,
    };
    emit_success(global.output(), "list", &output, Some(&human))
}

pub fn run_show(id: u32, global: GlobalOptions) -> Result<()> {
    let tasks = open_tasks(&global)?;
    let task = tasks.get(id)?.snapshot();

    let mut human = HumanOutput::new(format!("Task {}", task.id));
    push_task_summary(&mut human, &task);
    if let Some(start) = task.start_time {
        human.push_summary("Started", start.to_rfc3339());
    }
    if let Some(end) = task.end_time {
        human.push_summary("Ended", end.to_rfc3339());
    }
    if let Some(memo) = task.memo.as_deref() {
        human.push_detail(memo.to_string());
    }

    emit_success(global.output(), "show", &TaskView::from(&task), Some(&human))
}

pub fn run_start(id: u32, global: GlobalOptions) -> Result<()> {
    let mut tasks = open_tasks(&global)?;
    let handle = tasks.get(id)?;
    let status = handle.read(|t| t.status);
    if !handle.read(Task::can_start) {
        return Err(Error::InvalidTransition {
            id,
            action: "start",
            status,
        });
    }

    tasks.start_task(&handle);
    tasks.save()?;
    let task = handle.snapshot();
    info!(id, "task started");

    let header = if status == TaskStatus::Interrupted {
        "Resumed task"
    } else {
        "Started task"
    };
    let mut human = HumanOutput::new(format!("{header} {id}"));
    push_task_summary(&mut human, &task);
    human.push_next_step(format!("tasktimer stop {id}"));
    human.push_next_step(format!("tasktimer end {id}"));

    emit_success(global.output(), "start", &TaskView::from(&task), Some(&human))
}

/// Shared by `stop` (interrupt) and `end` (complete).
pub fn run_stop(id: u32, target: TaskStatus, global: GlobalOptions) -> Result<()> {
    let (command, action) = match target {
        TaskStatus::Ended => ("end", "end"),
        _ => ("stop", "stop"),
    };
    let mut tasks = open_tasks(&global)?;
    let handle = tasks.get(id)?;
    let allowed = handle.read(|t| match target {
        TaskStatus::Ended => t.can_end(),
        _ => t.can_stop(),
    });
    if !allowed {
        return Err(Error::InvalidTransition {
            id,
            action,
            status: handle.read(|t| t.status),
        });
    }

    if !tasks.stop_task(&handle, target) {
        return Err(Error::OperationFailed(format!(
            "task {id} is running but has no active timer"
        )));
    }
    tasks.save()?;
    let task = handle.snapshot();
    info!(id, status = %task.status, "task stopped");

    let header = match target {
        TaskStatus::Ended => "Ended task",
        _ => "Interrupted task",
    };
    let mut human = HumanOutput::new(format!("{header} {id}"));
    push_task_summary(&mut human, &task);
    if target == TaskStatus::Interrupted {
        human.push_next_step(format!("tasktimer start {id}"));
    }

    emit_success(global.output(), command, &TaskView::from(&task), Some(&human))
}

pub fn run_rm(id: u32, global: GlobalOptions) -> Result<()> {
    let mut tasks = open_tasks(&global)?;
    let handle = tasks.get(id)?;
    let removed = tasks.remove_item(&handle)?;
    info!(id, "task removed");

    let mut human = HumanOutput::new(format!("Removed task {id}"));
    human.push_summary("Title", handle.read(|t| t.title.clone()));

    emit_success(
        global.output(),
        "rm",
        &RemovedOutput { id, removed },
        Some(&human),
    )
}

pub async fn run_watch(options: WatchOptions) -> Result<()> {
    let ctx = resolve_context(&options.global)?;
    let refresh_ms = options.refresh_ms.unwrap_or(ctx.config.watch.refresh_ms);
    if refresh_ms < MIN_REFRESH_MS {
        return Err(Error::InvalidArgument(format!(
            "--refresh-ms must be >= {MIN_REFRESH_MS}"
        )));
    }
    let mut tasks = TaskCollection::open(ctx.store, &ctx.config)?;
    let live = !options.global.json && !options.global.quiet;

    let mut ticker = tokio::time::interval(Duration::from_millis(refresh_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if live {
                    print_running(&tasks);
                }
                ticks += 1;
                if options.max_ticks.is_some_and(|max| ticks >= max) {
                    break;
                }
            }
            signal = &mut ctrl_c => {
                signal?;
                break;
            }
        }
    }

    tasks.refresh_elapsed();
    tasks.save()?;
    let running: Vec<TaskView> = tasks
        .snapshot()
        .iter()
        .filter(|task| task.status == TaskStatus::Running)
        .map(TaskView::from)
        .collect();

    let mut human = HumanOutput::new("Watch stopped");
    human.push_summary("Refreshes", ticks.to_string());
    human.push_summary("Running", running.len().to_string());
    human.push_summary("Data dir", ctx.data_dir.display().to_string());

    let output = TaskListOutput {
        total: running.len(),
        tasks: running,
    };
    emit_success(options.global.output(), "watch", &output, Some(&human))
}

fn print_running(tasks: &TaskCollection) {
    let running: Vec<Shared<Task>> = tasks
        .list()
        .iter()
        .filter(|task| task.read(|t| t.status == TaskStatus::Running))
        .cloned()
        .collect();
    if running.is_empty() {
        println!("no running tasks");
        return;
    }
    for task in running {
        let line = task.read(|t| {
            format!(
                "{:>4}  {}  {}",
                t.id,
                t.elapsed.as_deref().unwrap_or("00:00:00.000"),
                t.title
            )
        });
        println!("{line}");
    }
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("Title", task.title.clone());
    human.push_summary("Date", task.date.clone());
    human.push_summary("Status", task.status.label());
    if let Some(planned) = task.display_planned_duration() {
        human.push_summary("Planned", planned);
    }
    if let Some(elapsed) = task.elapsed.as_deref() {
        human.push_summary("Elapsed", elapsed);
    }
}

fn format_task_line(view: &TaskView) -> String {
    let mut line = format!(
        "[{}] {} {} {}",
        view.status_label, view.id, view.date, view.title
    );
    if let Some(planned) = view.planned_duration.as_deref() {
        line.push_str(&format!(" (planned {planned})"));
    }
    if let Some(elapsed) = view.elapsed.as_deref() {
        line.push_str(&format!(" (elapsed {elapsed})"));
    }
    line
}
