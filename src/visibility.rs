use crate::window_locator::WindowSystem;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a toggle did to the window set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleAction {
    /// The process has no top-level windows (yet)
    NoWindows,
    /// Windows were minimized and hidden
    Hidden(usize),
    /// Windows were shown and restored
    Shown(usize),
}

/// Flip the aggregate visibility of `windows`.
///
/// Only the first window is sampled. When windows disagree, the action is
/// decided by enumeration order.
pub fn toggle<S: WindowSystem>(system: &mut S, windows: &[S::Window]) -> ToggleAction {
    let Some(&first) = windows.first() else {
        debug!("No windows to toggle");
        return ToggleAction::NoWindows;
    };

    if system.is_visible(first) {
        for &window in windows {
            system.minimize(window);
            system.set_visible(window, false);
        }
        debug!("Hid {} window(s)", windows.len());
        ToggleAction::Hidden(windows.len())
    } else {
        for &window in windows {
            system.set_visible(window, true);
            system.restore(window);
        }
        debug!("Showed {} window(s)", windows.len());
        ToggleAction::Shown(windows.len())
    }
}
