//! tasktimer - Task Tracking Library
//!
//! This library provides the core functionality for the tasktimer CLI:
//! tasks with a planned duration and date, a start/stop/end lifecycle, and
//! elapsed-time tracking persisted to local storage.
//!
//! # Core Concepts
//!
//! - **Tasks**: Title, date, planned duration, memo and a status state machine
//! - **Collections**: Ordered task lists mirrored to a key-value store
//! - **Timers**: One periodic job per running task refreshing its elapsed time
//! - **Stores**: In-memory or file-backed `get`/`set` by key
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `collection`: Generic persisted collection and shared item handles
//! - `config`: Configuration loading from `config.toml`
//! - `error`: Error types and result aliases
//! - `lock`: File locking and atomic writes for the file store
//! - `output`: Human and JSON command output
//! - `store`: Key-value store trait and backends
//! - `task`: Task entity, status and edit draft
//! - `task_collection`: Sorted task list with running-task timers
//! - `timefmt`: Date and elapsed-time formatting
//! - `timer`: Periodic jobs keyed by task id

pub mod cli;
pub mod collection;
pub mod config;
pub mod error;
pub mod lock;
pub mod output;
pub mod store;
pub mod task;
pub mod task_collection;
pub mod timefmt;
pub mod timer;

pub use error::{Error, Result};
