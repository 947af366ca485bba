//! Window system and hotkey binding on Sway.
//!
//! Sway has no minimized state and no hidden windows outside the scratchpad,
//! so hiding moves a window to the scratchpad and showing brings it back.

use crate::hotkey::Hotkey;
use crate::process::Pid;
use crate::window_locator::{WindowEntry, WindowSystem};
use anyhow::{Context, Result};
use std::path::Path;
use swayipc::{Connection, Node, NodeType};
use tracing::{debug, info, warn};

/// A view in the Sway tree: a container with a client process behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwayWindow {
    pub id: i64,
    pub pid: Option<Pid>,
    pub visible: bool,
}

impl SwayWindow {
    fn from_node(node: &Node) -> Option<Self> {
        // Views have a pid, plain containers don't
        let is_container = matches!(node.node_type, NodeType::Con | NodeType::FloatingCon);
        let pid = node.pid?;
        if !is_container {
            return None;
        }

        Some(SwayWindow {
            id: node.id,
            pid: Pid::try_from(pid).ok(),
            visible: node.visible.unwrap_or(false),
        })
    }
}

/// Sway IPC operations used by this backend.
///
/// This abstraction allows for mock implementations in tests.
pub trait SwayClient {
    /// Every view in the tree, scratchpad included
    fn windows(&mut self) -> Result<Vec<SwayWindow>>;

    /// Run a command, failing if Sway rejects any part of it
    fn run_command(&mut self, command: &str) -> Result<()>;
}

/// Real implementation using swayipc
pub struct RealSwayClient {
    connection: Connection,
}

impl RealSwayClient {
    /// Create a new connection to Sway
    pub fn new() -> Result<Self> {
        let connection = Connection::new().context("Failed to connect to Sway IPC")?;
        Ok(RealSwayClient { connection })
    }
}

impl SwayClient for RealSwayClient {
    fn windows(&mut self) -> Result<Vec<SwayWindow>> {
        let tree = self.connection.get_tree()?;
        let mut windows = Vec::new();
        collect_windows(&tree, &mut windows);
        Ok(windows)
    }

    fn run_command(&mut self, command: &str) -> Result<()> {
        debug!("Sway command: {}", command);
        for outcome in self.connection.run_command(command)? {
            outcome.with_context(|| format!("Sway rejected '{}'", command))?;
        }
        Ok(())
    }
}

fn collect_windows(node: &Node, windows: &mut Vec<SwayWindow>) {
    if let Some(window) = SwayWindow::from_node(node) {
        windows.push(window);
    }
    for child in node.nodes.iter().chain(&node.floating_nodes) {
        collect_windows(child, windows);
    }
}

pub struct SwayWindows<C: SwayClient = RealSwayClient> {
    client: C,
}

impl SwayWindows<RealSwayClient> {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(RealSwayClient::new()?))
    }
}

impl<C: SwayClient> SwayWindows<C> {
    /// Create with a custom SwayClient (for testing)
    pub fn with_client(client: C) -> Self {
        SwayWindows { client }
    }

    fn run(&mut self, command: String) {
        if let Err(e) = self.client.run_command(&command) {
            warn!("{:#}", e);
        }
    }
}

impl<C: SwayClient> WindowSystem for SwayWindows<C> {
    type Window = i64;

    fn top_level_windows(&mut self) -> Result<Vec<WindowEntry<i64>>> {
        Ok(self
            .client
            .windows()?
            .into_iter()
            .map(|w| WindowEntry {
                window: w.id,
                owner: w.pid,
            })
            .collect())
    }

    fn is_visible(&mut self, window: i64) -> bool {
        match self.client.windows() {
            Ok(windows) => windows.iter().any(|w| w.id == window && w.visible),
            Err(e) => {
                warn!("Failed to query visibility of container {}: {:#}", window, e);
                false
            }
        }
    }

    fn set_visible(&mut self, window: i64, visible: bool) {
        let command = if visible {
            format!("[con_id={}] scratchpad show", window)
        } else {
            format!("[con_id={}] move scratchpad", window)
        };
        self.run(command);
    }

    fn minimize(&mut self, window: i64) {
        debug!("Sway has no minimized state; container {} goes straight to the scratchpad", window);
    }

    fn restore(&mut self, window: i64) {
        self.run(format!("[con_id={}] focus", window));
    }
}

/// `bindsym` registration of the hotkey, removed again on drop.
///
/// Sway runs `<exe> toggle` on each press, which reaches the daemon over IPC.
pub struct SwayHotkey<C: SwayClient = RealSwayClient> {
    client: C,
    binding: String,
}

impl SwayHotkey<RealSwayClient> {
    pub fn register(hotkey: &Hotkey) -> Result<Self> {
        let exe = std::env::current_exe().context("Could not determine own executable path")?;
        Self::register_with(RealSwayClient::new()?, hotkey, &exe)
    }
}

impl<C: SwayClient> SwayHotkey<C> {
    pub fn register_with(mut client: C, hotkey: &Hotkey, exe: &Path) -> Result<Self> {
        let binding = hotkey.sway_binding();
        client
            .run_command(&bind_command(&binding, exe))
            .with_context(|| format!("Failed to register hotkey {}", hotkey))?;

        info!("Registered hotkey {} ({})", hotkey, binding);
        Ok(SwayHotkey { client, binding })
    }
}

impl<C: SwayClient> Drop for SwayHotkey<C> {
    fn drop(&mut self) {
        let command = format!("unbindsym {}", self.binding);
        if let Err(e) = self.client.run_command(&command) {
            warn!("Failed to unregister hotkey {}: {:#}", self.binding, e);
        } else {
            info!("Unregistered hotkey {}", self.binding);
        }
    }
}

/// Sway strips one level of quotes from `bindsym` arguments, so the whole
/// `exec` line is double-quoted around a shell-quoted executable path.
fn bind_command(binding: &str, exe: &Path) -> String {
    let exe = shell_words::quote(&exe.to_string_lossy()).into_owned();
    let exec = format!("{} toggle", exe).replace('\\', "\\\\").replace('"', "\\\"");
    format!("bindsym --no-repeat {} exec \"{}\"", binding, exec)
}
