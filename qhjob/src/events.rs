use crate::types::OutputBlob;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// `wait_status` reported when the worker gives up on a check: exit code 3
/// (UNKNOWN) in the high byte.
pub const UNKNOWN_STATUS: i32 = 3 << 8;

/// `wait_status` reported when the command could not be launched at all.
/// Same value a shell reports for "command not found".
pub const SPAWN_FAILURE_STATUS: i32 = 127 << 8;

/// How a job's process ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    Exited { code: i32 },
    Killed { signal: i32, core_dumped: bool },
    TimedOut,
    SpawnFailed { reason: String },
    /// The worker lost track of the child (wait itself failed).
    Lost { reason: String },
}

impl Termination {
    /// POSIX-encoded status as seen by `waitpid(2)`.
    pub fn wait_status(&self) -> i32 {
        match self {
            Termination::Exited { code } => (code & 0xff) << 8,
            Termination::Killed {
                signal,
                core_dumped,
            } => (signal & 0x7f) | if *core_dumped { 0x80 } else { 0 },
            Termination::TimedOut | Termination::Lost { .. } => UNKNOWN_STATUS,
            Termination::SpawnFailed { .. } => SPAWN_FAILURE_STATUS,
        }
    }

    /// True when the process ended on its own, whatever its exit code.
    pub fn exited_ok(&self) -> bool {
        matches!(
            self,
            Termination::Exited { .. } | Termination::Killed { .. }
        )
    }
}

impl From<ExitStatus> for Termination {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            Termination::Exited { code }
        } else if let Some(signal) = status.signal() {
            Termination::Killed {
                signal,
                core_dumped: status.core_dumped(),
            }
        } else {
            Termination::Lost {
                reason: format!("unrecognised wait status {}", status.into_raw()),
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum Output {
    Stdout(OutputBlob),
    Stderr(OutputBlob),
}
