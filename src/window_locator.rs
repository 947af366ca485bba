//! Finding the top-level windows that belong to a process.

use crate::process::Pid;
use anyhow::Result;
use std::fmt::Debug;
use tracing::{debug, warn};

/// A top-level window as reported by the window system, with its owning process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEntry<W> {
    pub window: W,
    pub owner: Option<Pid>,
}

/// Window system primitives consumed by the locator and the toggler.
///
/// Implementations must not block: every call returns immediately.
pub trait WindowSystem {
    type Window: Copy + Debug + PartialEq;

    /// Every top-level window currently known, in the system's enumeration order.
    fn top_level_windows(&mut self) -> Result<Vec<WindowEntry<Self::Window>>>;

    fn is_visible(&mut self, window: Self::Window) -> bool;

    fn set_visible(&mut self, window: Self::Window, visible: bool);

    fn minimize(&mut self, window: Self::Window);

    fn restore(&mut self, window: Self::Window);
}

/// Windows owned by `pid`, freshly enumerated on every call.
///
/// An enumeration failure is logged and reported as "no windows".
pub fn windows_owned_by<S: WindowSystem>(system: &mut S, pid: Pid) -> Vec<S::Window> {
    let entries = match system.top_level_windows() {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to enumerate top-level windows: {:#}", e);
            return Vec::new();
        }
    };

    let total = entries.len();
    let owned = filter_owned_by(entries, pid);
    debug!("{} of {} top-level windows belong to pid {}", owned.len(), total, pid);
    owned
}

#[must_use]
fn filter_owned_by<W>(entries: Vec<WindowEntry<W>>, pid: Pid) -> Vec<W> {
    entries
        .into_iter()
        .filter(|entry| entry.owner == Some(pid))
        .map(|entry| entry.window)
        .collect()
}
