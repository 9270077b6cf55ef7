#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Temporary data directory driven through the `tasktimer` binary.
pub struct TestData {
    dir: TempDir,
}

impl TestData {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.dir.path().join("tasks.json")
    }

    pub fn write_tasks(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.tasks_path();
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join("config.toml");
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read_tasks(&self) -> Value {
        let raw = fs::read_to_string(self.tasks_path()).expect("read tasks.json");
        serde_json::from_str(&raw).expect("tasks.json is json")
    }

    /// Command with `--data-dir` pointing at this directory.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("tasktimer").expect("tasktimer binary");
        cmd.env_remove("TASKTIMER_DIR")
            .env_remove("TASKTIMER_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--data-dir")
            .arg(self.dir.path());
        cmd
    }

    /// Run with `--json` and return the parsed success envelope.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json output")
    }

    /// Add a task and return its id.
    pub fn add(&self, title: &str, date: &str) -> u64 {
        let value = self.json(&["add", title, "--date", date]);
        value["data"]["id"].as_u64().expect("task id")
    }
}
