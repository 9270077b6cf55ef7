//! Command-line interface for tasktimer
//!
//! This module defines the CLI structure using clap derive macros.
//! Command implementations live in the submodules.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::task::TaskStatus;

mod init;
mod task;

/// tasktimer - track tasks and the time spent on them
///
/// Tasks carry a title, planned duration, date and memo, and move through
/// none -> running -> ended, with running <-> interrupted in between.
#[derive(Parser, Debug)]
#[command(name = "tasktimer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding the task list and config.toml
    #[arg(long, global = true, env = "TASKTIMER_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Path to a config file (defaults to <data-dir>/config.toml)
    #[arg(long, global = true, env = "TASKTIMER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory, default config and an empty task list
    Init,

    /// Add a task
    Add {
        /// Task title
        title: String,

        /// Planned duration (hh:mm)
        #[arg(long)]
        duration: Option<String>,

        /// Task date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Free-form notes
        #[arg(long)]
        memo: Option<String>,
    },

    /// Edit a task's fields
    Edit {
        /// Task id
        id: u32,

        #[arg(long)]
        title: Option<String>,

        /// Planned duration (hh:mm)
        #[arg(long)]
        duration: Option<String>,

        /// Task date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Free-form notes (empty string clears)
        #[arg(long)]
        memo: Option<String>,

        /// none, running, ended or interrupted
        #[arg(long)]
        status: Option<TaskStatus>,
    },

    /// List tasks by date
    #[command(alias = "ls")]
    List,

    /// Show one task
    Show {
        /// Task id
        id: u32,
    },

    /// Start or resume a task
    Start {
        /// Task id
        id: u32,
    },

    /// Interrupt a running task
    Stop {
        /// Task id
        id: u32,
    },

    /// Complete a running task
    End {
        /// Task id
        id: u32,
    },

    /// Remove a task
    Rm {
        /// Task id
        id: u32,
    },

    /// Follow running tasks until interrupted (Ctrl-C)
    Watch {
        /// Milliseconds between refreshes (defaults to watch.refresh_ms)
        #[arg(long)]
        refresh_ms: Option<u64>,

        /// Stop after this many refreshes
        #[arg(long)]
        max_ticks: Option<u64>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let global = task::GlobalOptions {
            data_dir: self.data_dir,
            config: self.config,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init => init::run(global),
            Commands::Add {
                title,
                duration,
                date,
                memo,
            } => task::run_add(task::AddOptions {
                title,
                duration,
                date,
                memo,
                global,
            }),
            Commands::Edit {
                id,
                title,
                duration,
                date,
                memo,
                status,
            } => task::run_edit(task::EditOptions {
                id,
                title,
                duration,
                date,
                memo,
                status,
                global,
            }),
            Commands::List => task::run_list(global),
            Commands::Show { id } => task::run_show(id, global),
            Commands::Start { id } => task::run_start(id, global),
            Commands::Stop { id } => task::run_stop(id, TaskStatus::Interrupted, global),
            Commands::End { id } => task::run_stop(id, TaskStatus::Ended, global),
            Commands::Rm { id } => task::run_rm(id, global),
            Commands::Watch {
                refresh_ms,
                max_ticks,
            } => {
                task::run_watch(task::WatchOptions {
                    refresh_ms,
                    max_ticks,
                    global,
                })
                .await
            }
        }
    }
}
