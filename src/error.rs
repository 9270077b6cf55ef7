//! Error types for tasktimer
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, refused transition, bad config)
//! - 4: Operation failed (I/O, JSON, TOML, lock, runtime)

use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskStatus;

/// Exit codes for the tasktimer CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tasktimer operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task not found: {0}")]
    TaskNotFound(u32),

    #[error("Cannot {action} task {id}: status is {status}")]
    InvalidTransition {
        id: u32,
        action: &'static str,
        status: TaskStatus,
    },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("No async runtime available to drive task timers")]
    NoRuntime,

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::TaskNotFound(_)
            | Error::InvalidTransition { .. } => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::NoRuntime
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::TaskNotFound(id) => Some(serde_json::json!({ "id": id })),
            Error::InvalidTransition { id, action, status } => Some(serde_json::json!({
                "id": id,
                "action": action,
                "status": status.label(),
            })),
            Error::LockFailed(path) => Some(serde_json::json!({
                "path": path.to_string_lossy(),
            })),
            _ => None,
        }
    }
}

/// Result type alias for tasktimer operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_map_to_exit_code_two() {
        assert_eq!(
            Error::InvalidArgument("x".to_string()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(Error::TaskNotFound(3).exit_code(), exit_codes::USER_ERROR);
        let transition = Error::InvalidTransition {
            id: 1,
            action: "start",
            status: TaskStatus::Ended,
        };
        assert_eq!(transition.exit_code(), exit_codes::USER_ERROR);
        assert_eq!(transition.to_string(), "Cannot start task 1: status is ended");
    }

    #[test]
    fn io_errors_map_to_operation_failed() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);
        assert_eq!(Error::NoRuntime.exit_code(), exit_codes::OPERATION_FAILED);
    }

    #[test]
    fn details_carry_task_id() {
        let details = Error::TaskNotFound(7).details().expect("details");
        assert_eq!(details["id"], 7);
        assert!(Error::InvalidArgument("x".to_string()).details().is_none());
    }
}
