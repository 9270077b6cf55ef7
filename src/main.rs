//! tasktimer - Task Tracking CLI
//!
//! Add tasks, start and stop them, and keep track of the time spent.

use clap::Parser;
use tasktimer::cli::Cli;
use tasktimer::output::{emit_error, infer_command_name_from_args};
use tasktimer::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    // Tracing is opt-in via RUST_LOG.
    // Keep startup robust in CI/robot envs: ignore invalid/huge filters.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let command = infer_command_name_from_args();
    let cli = Cli::parse();
    let json = cli.json;

    // Task timers tick only while `run` is awaiting.
    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::from)
        .and_then(|runtime| runtime.block_on(cli.run()));

    if let Err(err) = result {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
