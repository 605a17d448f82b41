//! What a command reports back to the CLI.
//!
//! Handlers never print. They return an [`ExecutionOutcome`] whose `details`
//! carry machine-readable fields (`reason`, `code`, `hint`, record data), and
//! the CLI renders that as a status line or, with `--json`, as
//! [`ExecutionOutcome::to_json`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: CommandStatus,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>, details: Value) -> Self {
        Self::with_status(CommandStatus::Ok, message, details)
    }

    pub fn failure(message: impl Into<String>, details: Value) -> Self {
        Self::with_status(CommandStatus::Failure, message, details)
    }

    pub fn user_error(message: impl Into<String>, details: Value) -> Self {
        Self::with_status(CommandStatus::UserError, message, details)
    }

    fn with_status(status: CommandStatus, message: impl Into<String>, details: Value) -> Self {
        Self {
            status,
            message: message.into(),
            details,
        }
    }

    /// Process exit code: 0 ok, 1 for problems the caller can fix, 2 for
    /// environment or internal failures.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.status {
            CommandStatus::Ok => 0,
            CommandStatus::UserError => 1,
            CommandStatus::Failure => 2,
        }
    }

    /// The `--json` envelope. `details` is always an object.
    #[must_use]
    pub fn to_json(&self, command: CommandGroup) -> Value {
        let details = match &self.details {
            Value::Object(_) => self.details.clone(),
            Value::Null => json!({}),
            other => json!({ "value": other }),
        };
        json!({
            "command": command.as_str(),
            "status": self.status.as_str(),
            "exit_code": self.exit_code(),
            "message": status_line(command, &self.message),
            "details": details,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    UserError,
    Failure,
}

impl CommandStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::UserError => "user-error",
            Self::Failure => "error",
        }
    }
}

/// The `refdata` subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandGroup {
    Init,
    Add,
    Remove,
    Sync,
    Verify,
    List,
}

impl CommandGroup {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Sync => "sync",
            Self::Verify => "verify",
            Self::List => "list",
        }
    }
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `refdata <command>: <message>`. Messages that already open with the
/// command are left as they are.
#[must_use]
pub fn status_line(command: CommandGroup, message: &str) -> String {
    let banner = format!("refdata {command}");
    if message.is_empty() {
        return banner;
    }
    match message.strip_prefix(banner.as_str()) {
        Some(rest) if rest.is_empty() || rest.starts_with(':') => message.to_string(),
        _ => format!("{banner}: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_envelope_wraps_non_object_details() {
        let outcome = ExecutionOutcome::user_error("1 file differs", json!(["x"]));
        let response = outcome.to_json(CommandGroup::Verify);
        assert_eq!(response["command"], "verify");
        assert_eq!(response["status"], "user-error");
        assert_eq!(response["exit_code"], 1);
        assert_eq!(response["message"], "refdata verify: 1 file differs");
        assert_eq!(response["details"]["value"][0], "x");

        let empty = ExecutionOutcome::success("", Value::Null).to_json(CommandGroup::Init);
        assert_eq!(empty["details"], json!({}));
        assert_eq!(empty["message"], "refdata init");
    }

    #[test]
    fn status_line_adds_banner_once() {
        assert_eq!(
            status_line(CommandGroup::Sync, "refdata sync: done"),
            "refdata sync: done"
        );
        assert_eq!(
            status_line(CommandGroup::Sync, "refdata syncing stopped"),
            "refdata sync: refdata syncing stopped"
        );
    }

    #[test]
    fn failures_exit_with_two() {
        let outcome = ExecutionOutcome::failure("store unreachable", json!({}));
        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(outcome.status.as_str(), "error");
    }
}
