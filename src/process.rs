//! Process liveness and launching.
//!
//! The controller only ever talks to the OS through [`ProcessHost`], so the
//! activation logic can be exercised without spawning anything.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// OS process identifier. This is the only piece of process state that
/// survives between activations.
pub type Pid = u32;

/// Number of standard I/O slots a launch must be given (stdin, stdout, stderr).
pub const STDIO_SLOTS: usize = 3;

/// Owned OS handle for one standard I/O slot of the child.
#[cfg(unix)]
pub type StdioHandle = std::os::fd::OwnedFd;
#[cfg(windows)]
pub type StdioHandle = std::os::windows::io::OwnedHandle;

/// What to run and where. Built once from the configuration and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    command_line: String,
    working_directory: PathBuf,
}

impl LaunchSpec {
    pub fn new(command_line: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        LaunchSpec {
            command_line: command_line.into(),
            working_directory: working_directory.into(),
        }
    }

    /// The full command line as a single string, not split into arguments.
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Expected exactly 3 standard I/O handle slots, got {got}")]
    InvalidHandleCount { got: usize },

    #[error("No command line configured")]
    MissingCommandLine,

    #[error("Cannot split command line '{command_line}': {reason}")]
    UnparsableCommandLine { command_line: String, reason: String },

    #[error("Failed to duplicate standard I/O handle {slot}")]
    DuplicateHandle {
        slot: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start '{command_line}'")]
    Spawn {
        command_line: String,
        #[source]
        source: std::io::Error,
    },
}

impl LaunchError {
    pub fn error_code(&self) -> &'static str {
        match self {
            LaunchError::InvalidHandleCount { .. } => "launch.invalid_handle_count",
            LaunchError::MissingCommandLine => "launch.missing_command_line",
            LaunchError::UnparsableCommandLine { .. } => "launch.unparsable_command_line",
            LaunchError::DuplicateHandle { .. } => "launch.duplicate_handle_failed",
            LaunchError::Spawn { .. } => "launch.spawn_failed",
        }
    }

    /// Configuration problems the user has to fix, as opposed to OS failures.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            LaunchError::InvalidHandleCount { .. }
                | LaunchError::MissingCommandLine
                | LaunchError::UnparsableCommandLine { .. }
        )
    }
}

/// Structural preconditions shared by every launcher, checked before any OS call.
pub fn check_launch_request<H>(spec: &LaunchSpec, stdio: &[Option<H>]) -> Result<(), LaunchError> {
    if stdio.len() != STDIO_SLOTS {
        return Err(LaunchError::InvalidHandleCount { got: stdio.len() });
    }
    if spec.command_line().trim().is_empty() {
        return Err(LaunchError::MissingCommandLine);
    }
    Ok(())
}

/// Three empty slots: the child gets whatever the new console gives it.
pub fn empty_stdio() -> Vec<Option<StdioHandle>> {
    (0..STDIO_SLOTS).map(|_| None).collect()
}

/// Process operations used by the controller.
pub trait ProcessHost {
    /// True when `pid` has exited or cannot be opened. Never blocks.
    fn is_gone(&mut self, pid: Pid) -> bool;

    /// Start `spec` in a new console session and return its pid.
    fn launch(
        &mut self,
        spec: &LaunchSpec,
        stdio: Vec<Option<StdioHandle>>,
    ) -> Result<Pid, LaunchError>;
}
