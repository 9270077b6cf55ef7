//! tasktimer init command implementation
//!
//! Creates the data directory, a default `config.toml` and an empty task list.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::task::{resolve_context, GlobalOptions};
use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::store::KeyValueStore;

#[derive(Serialize)]
struct InitReport {
    data_dir: PathBuf,
    created: InitCreated,
}

#[derive(Serialize)]
struct InitCreated {
    data_dir: bool,
    config: bool,
    tasks: bool,
}

pub fn run(global: GlobalOptions) -> Result<()> {
    let ctx = resolve_context(&global)?;

    let created_dir = !ctx.data_dir.exists();
    ctx.store.init()?;
    // An explicit --config path is left alone.
    let created_config = global.config.is_none() && ensure_config(&ctx.data_dir)?;

    let key = ctx.config.storage.key.as_str();
    let created_tasks = !ctx.store.contains(key);
    if created_tasks {
        ctx.store.set(key, "[]")?;
    }

    let report = InitReport {
        data_dir: ctx.data_dir.clone(),
        created: InitCreated {
            data_dir: created_dir,
            config: created_config,
            tasks: created_tasks,
        },
    };

    let mut created_items = Vec::new();
    if created_dir {
        created_items.push(format!("{}/", ctx.data_dir.display()));
    }
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_tasks {
        created_items.push(format!("{key}.json"));
    }

    let header = if created_items.is_empty() {
        "tasktimer init: nothing to do"
    } else {
        "tasktimer init: initialized data directory"
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("data dir", ctx.data_dir.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("tasktimer add <title>");

    emit_success(global.output(), "init", &report, Some(&human))
}

fn ensure_config(data_dir: &Path) -> Result<bool> {
    let config_path = data_dir.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    Config::default().save(&config_path)?;
    Ok(true)
}
