//! Line-oriented vocabulary spoken with the debugger client.
//!
//! Inbound: one command per line. Outbound: lifecycle notifications plus the
//! `stack`/`properties` messages marshaled by `joist-debug`.

use joist_debug::{ResumeMode, SuspendReason};
use thiserror::Error;

pub const BUILD_STARTED: &str = "build_started";
pub const SUSPENDED: &str = "suspended";
pub const RESUMED: &str = "resumed";
pub const TERMINATED: &str = "terminated";
pub const ERROR: &str = "error";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("command `{command}` expects {expected} argument(s)")]
    MissingArguments { command: String, expected: usize },
    #[error("invalid line number `{0}`")]
    InvalidLineNumber(String),
    #[error("invalid flag `{0}`, expected `on` or `off`")]
    InvalidFlag(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Resume,
    Suspend,
    StepOver,
    StepInto,
    Stack,
    Properties,
    AddBreakpoint { file: String, line: u32 },
    RemoveBreakpoint { file: String, line: u32 },
    TargetBreakpoints { enabled: bool },
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut parts = line.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();

        match head {
            "resume" => Ok(Command::Resume),
            "suspend" => Ok(Command::Suspend),
            "step_over" => Ok(Command::StepOver),
            "step_into" => Ok(Command::StepInto),
            "stack" => Ok(Command::Stack),
            "properties" => Ok(Command::Properties),
            "add_breakpoint" => {
                let (file, line) = parse_breakpoint(head, &rest)?;
                Ok(Command::AddBreakpoint { file, line })
            }
            "remove_breakpoint" => {
                let (file, line) = parse_breakpoint(head, &rest)?;
                Ok(Command::RemoveBreakpoint { file, line })
            }
            "target_breakpoints" => match rest.as_slice() {
                ["on"] => Ok(Command::TargetBreakpoints { enabled: true }),
                ["off"] => Ok(Command::TargetBreakpoints { enabled: false }),
                [flag] => Err(ProtocolError::InvalidFlag((*flag).to_string())),
                _ => Err(ProtocolError::MissingArguments {
                    command: head.to_string(),
                    expected: 1,
                }),
            },
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Breakpoint arguments are `<file> <line>`; the file may contain spaces, so
/// the line number is the final token.
fn parse_breakpoint(command: &str, rest: &[&str]) -> Result<(String, u32), ProtocolError> {
    let Some((line, file_parts)) = rest.split_last() else {
        return Err(ProtocolError::MissingArguments {
            command: command.to_string(),
            expected: 2,
        });
    };
    if file_parts.is_empty() {
        return Err(ProtocolError::MissingArguments {
            command: command.to_string(),
            expected: 2,
        });
    }
    let line = line
        .parse::<u32>()
        .map_err(|_| ProtocolError::InvalidLineNumber((*line).to_string()))?;
    Ok((file_parts.join(" "), line))
}

pub fn suspended_message(reason: &SuspendReason) -> String {
    match reason {
        SuspendReason::ClientRequest => format!("{SUSPENDED} client"),
        SuspendReason::Step => format!("{SUSPENDED} step"),
        SuspendReason::Breakpoint(location) => {
            format!("{SUSPENDED} breakpoint {} {}", location.file_name(), location.line)
        }
    }
}

pub fn resumed_message(mode: ResumeMode) -> String {
    match mode {
        ResumeMode::ClientRequest => RESUMED.to_string(),
        ResumeMode::Step => format!("{RESUMED} step"),
    }
}
