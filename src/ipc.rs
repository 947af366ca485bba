use crate::controller::{ActivationReport, ControllerState};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Commands sent from CLI client to daemon
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IpcCommand {
    /// Same as pressing the hotkey
    Toggle,
    /// Query daemon status
    Status,
    /// Shutdown the daemon gracefully
    Shutdown,
}

/// Response from daemon to CLI client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully
    Ok,
    /// Hotkey activation result
    Toggled(ActivationReport),
    /// Status response
    Status(ControllerState),
    /// Error occurred
    Error(String),
}

/// Get the path to the Unix socket
pub fn get_socket_path() -> Result<PathBuf> {
    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine runtime directory")?;

    Ok(runtime_dir.join("hotkey-toggle.sock"))
}

/// Error returned when parsing an invalid IpcCommand string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid IPC command")]
pub struct ParseIpcCommandError;

impl FromStr for IpcCommand {
    type Err = ParseIpcCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "toggle" => Ok(IpcCommand::Toggle),
            "status" => Ok(IpcCommand::Status),
            "shutdown" => Ok(IpcCommand::Shutdown),
            _ => Err(ParseIpcCommandError),
        }
    }
}

impl fmt::Display for IpcCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IpcCommand::Toggle => "toggle",
            IpcCommand::Status => "status",
            IpcCommand::Shutdown => "shutdown",
        };
        write!(f, "{}", s)
    }
}
