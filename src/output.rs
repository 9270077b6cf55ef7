//! Result reporting for CLI commands.
//!
//! With `--json` every command prints one envelope on stdout:
//!
//! ```text
//! {"schema_version":"tasktimer.v1","command":"start","status":"success","data":{..}}
//! {"schema_version":"tasktimer.v1","command":"start","status":"error","error":{..}}
//! ```
//!
//! Otherwise commands print a short human report and errors go to stderr.

use serde::Serialize;

use crate::error::{exit_codes, Error, Result};

pub const SCHEMA_VERSION: &str = "tasktimer.v1";

/// Global flags that consume the following argument.
const VALUE_FLAGS: [&str; 2] = ["--data-dir", "--config"];

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Human report: a header line, `label: value` fields, free-form lines,
/// warnings, and follow-up commands.
#[derive(Debug, Clone, Default)]
pub struct HumanOutput {
    header: String,
    fields: Vec<(String, String)>,
    lines: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }

    pub fn push_summary(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.fields.push((label.into(), value.into()));
    }

    pub fn push_detail(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn push_next_step(&mut self, command: impl Into<String>) {
        self.next_steps.push(command.into());
    }
}

#[derive(Serialize)]
struct Envelope<'a, B: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    #[serde(flatten)]
    body: B,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    next_steps: &'a [String],
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Body<'a, T: Serialize> {
    Success {
        data: &'a T,
        #[serde(skip_serializing_if = "<[String]>::is_empty")]
        warnings: &'a [String],
    },
    Error {
        error: ErrorBody,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

fn print_envelope<T: Serialize>(
    command: &str,
    body: Body<'_, T>,
    next_steps: &[String],
) -> Result<()> {
    let envelope = Envelope {
        schema_version: SCHEMA_VERSION,
        command,
        body,
        next_steps,
    };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let (warnings, next_steps) = human
            .map(|h| (h.warnings.as_slice(), h.next_steps.as_slice()))
            .unwrap_or_default();
        return print_envelope(command, Body::Success { data, warnings }, next_steps);
    }
    if let (false, Some(human)) = (options.quiet, human) {
        println!("{}", format_human(human));
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let hint = error_hint(err);
    if json {
        let error = ErrorBody {
            message: err.to_string(),
            code: err.exit_code(),
            kind: error_kind(err),
            details: err.details(),
        };
        let next_steps: Vec<String> = hint.into_iter().collect();
        return print_envelope::<()>(command, Body::Error { error }, &next_steps);
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let width = output
        .fields
        .iter()
        .map(|(label, _)| label.len())
        .max()
        .unwrap_or(0);

    let mut lines = vec![output.header.clone()];
    lines.extend(output.fields.iter().map(|(label, value)| {
        let label = format!("{label}:");
        format!("  {label:<pad$}  {value}", pad = width + 1)
    }));
    lines.extend(output.lines.iter().map(|line| format!("  {line}")));
    lines.extend(output.warnings.iter().map(|w| format!("warning: {w}")));
    lines.extend(output.next_steps.iter().map(|step| format!("next: {step}")));
    lines.join("\n")
}

/// Best-effort command name for error output when clap never got to run.
pub fn infer_command_name_from_args() -> String {
    command_name_from(std::env::args().skip(1))
}

fn command_name_from(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
        } else if !arg.starts_with('-') {
            return arg;
        }
    }
    "tasktimer".to_string()
}

fn error_kind(err: &Error) -> &'static str {
    if err.exit_code() == exit_codes::USER_ERROR {
        "user_error"
    } else {
        "operation_failed"
    }
}

fn error_hint(err: &Error) -> Option<String> {
    match err {
        Error::TaskNotFound(_) => Some("tasktimer list".to_string()),
        Error::InvalidTransition { id, .. } => Some(format!("tasktimer show {id}")),
        Error::InvalidConfig(_) | Error::TomlParse(_) => {
            Some("fix config.toml then retry".to_string())
        }
        Error::LockFailed(_) => Some("another tasktimer may be writing; retry".to_string()),
        _ => None,
    }
}
