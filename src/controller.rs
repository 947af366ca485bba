//! The toggle controller: launch the program once, then show/hide its windows.

use crate::process::{LaunchError, LaunchSpec, Pid, ProcessHost, empty_stdio};
use crate::visibility::{ToggleAction, toggle};
use crate::window_locator::{WindowSystem, windows_owned_by};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Externally observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// Nothing tracked, or the last launch failed
    Idle,
    /// A process was launched and was alive at the last activation
    Tracked { pid: Pid },
}

/// Outcome of one successful activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReport {
    pub pid: Pid,
    pub launched: bool,
    pub action: ToggleAction,
}

pub struct ToggleController<P: ProcessHost, W: WindowSystem> {
    spec: LaunchSpec,
    processes: P,
    windows: W,
    tracked: Option<Pid>,
}

impl<P: ProcessHost, W: WindowSystem> ToggleController<P, W> {
    pub fn new(spec: LaunchSpec, processes: P, windows: W) -> Self {
        ToggleController {
            spec,
            processes,
            windows,
            tracked: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        match self.tracked {
            Some(pid) => ControllerState::Tracked { pid },
            None => ControllerState::Idle,
        }
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    /// Handle one hotkey press.
    ///
    /// Launches the program when nothing alive is tracked, then toggles the
    /// windows of the tracked process. A launch failure leaves the controller
    /// idle; the next activation tries again.
    pub fn activate(&mut self) -> Result<ActivationReport, LaunchError> {
        let (pid, launched) = match self.alive_tracked() {
            Some(pid) => (pid, false),
            None => (self.launch()?, true),
        };

        // Right after a launch the window usually does not exist yet
        let windows = windows_owned_by(&mut self.windows, pid);
        let action = toggle(&mut self.windows, &windows);

        debug!("Activation done: pid={} launched={} action={:?}", pid, launched, action);
        Ok(ActivationReport {
            pid,
            launched,
            action,
        })
    }

    fn alive_tracked(&mut self) -> Option<Pid> {
        let pid = self.tracked?;
        if self.processes.is_gone(pid) {
            info!("Tracked process {} is gone", pid);
            None
        } else {
            Some(pid)
        }
    }

    fn launch(&mut self) -> Result<Pid, LaunchError> {
        info!(
            "Launching '{}' in {}",
            self.spec.command_line(),
            self.spec.working_directory().display()
        );

        match self.processes.launch(&self.spec, empty_stdio()) {
            Ok(pid) => {
                info!("Launched process {}", pid);
                self.tracked = Some(pid);
                Ok(pid)
            }
            Err(e) => {
                if e.is_user_error() {
                    warn!("Launch refused [{}]: {}", e.error_code(), e);
                } else {
                    let cause = std::error::Error::source(&e)
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    error!("Launch failed [{}]: {}: {}", e.error_code(), e, cause);
                }
                self.tracked = None;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{StdioHandle, check_launch_request};
    use crate::window_locator::tests::FakeWindows;
    use std::collections::{HashSet, VecDeque};

    /// Fake process table: pids handed out in order, liveness under test control.
    #[derive(Default)]
    struct FakeProcesses {
        next_pids: VecDeque<Pid>,
        gone: HashSet<Pid>,
        launches: usize,
        liveness_checks: Vec<Pid>,
        fail_spawn: bool,
    }

    impl FakeProcesses {
        fn handing_out(pids: &[Pid]) -> Self {
            FakeProcesses {
                next_pids: pids.iter().copied().collect(),
                ..FakeProcesses::default()
            }
        }
    }

    impl ProcessHost for FakeProcesses {
        fn is_gone(&mut self, pid: Pid) -> bool {
            self.liveness_checks.push(pid);
            self.gone.contains(&pid)
        }

        fn launch(
            &mut self,
            spec: &LaunchSpec,
            stdio: Vec<Option<StdioHandle>>,
        ) -> Result<Pid, LaunchError> {
            check_launch_request(spec, &stdio)?;
            self.launches += 1;
            if self.fail_spawn {
                return Err(LaunchError::Spawn {
                    command_line: spec.command_line().to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            Ok(self.next_pids.pop_front().expect("test ran out of pids"))
        }
    }

    fn controller(
        processes: FakeProcesses,
        windows: FakeWindows,
    ) -> ToggleController<FakeProcesses, FakeWindows> {
        ToggleController::new(LaunchSpec::new("cmd.exe", "/home/user"), processes, windows)
    }

    #[test]
    fn test_first_activation_launches_without_windows() {
        let mut ctl = controller(FakeProcesses::handing_out(&[4242]), FakeWindows::default());
        assert_eq!(ctl.state(), ControllerState::Idle);

        let report = ctl.activate().unwrap();

        assert_eq!(
            report,
            ActivationReport {
                pid: 4242,
                launched: true,
                action: ToggleAction::NoWindows,
            }
        );
        assert_eq!(ctl.state(), ControllerState::Tracked { pid: 4242 });
        assert!(ctl.processes.liveness_checks.is_empty());
    }

    #[test]
    fn test_relaunches_when_tracked_process_is_gone() {
        let mut ctl = controller(
            FakeProcesses::handing_out(&[4242, 5150]),
            FakeWindows::default(),
        );
        ctl.activate().unwrap();

        ctl.processes.gone.insert(4242);
        let report = ctl.activate().unwrap();

        assert!(report.launched);
        assert_eq!(report.pid, 5150);
        assert_eq!(ctl.processes.launches, 2);
        assert_eq!(ctl.processes.liveness_checks, vec![4242]);
        assert_eq!(ctl.state(), ControllerState::Tracked { pid: 5150 });
    }

    #[test]
    fn test_alive_process_with_visible_window_is_hidden() {
        let windows = FakeWindows::default()
            .with_window(1, 4242, true)
            .with_window(2, 999, true);
        let mut ctl = controller(FakeProcesses::handing_out(&[4242]), windows);
        ctl.tracked = Some(4242);

        let report = ctl.activate().unwrap();

        assert!(!report.launched);
        assert_eq!(report.action, ToggleAction::Hidden(1));
        assert_eq!(ctl.windows.calls, vec!["minimize:1", "hide:1"]);
        assert_eq!(ctl.processes.launches, 0);
        assert_eq!(ctl.processes.liveness_checks, vec![4242]);
    }

    #[test]
    fn test_alive_process_with_hidden_window_is_shown() {
        let windows = FakeWindows::default().with_window(7, 4242, false);
        let mut ctl = controller(FakeProcesses::handing_out(&[4242]), windows);
        ctl.tracked = Some(4242);

        let report = ctl.activate().unwrap();

        assert!(!report.launched);
        assert_eq!(report.action, ToggleAction::Shown(1));
        assert_eq!(ctl.windows.calls, vec!["show:7", "restore:7"]);
        assert_eq!(ctl.processes.launches, 0);
    }

    #[test]
    fn test_empty_command_line_fails_and_stays_idle() {
        let mut ctl = ToggleController::new(
            LaunchSpec::new("", "/home/user"),
            FakeProcesses::handing_out(&[4242]),
            FakeWindows::default(),
        );

        let err = ctl.activate().unwrap_err();

        assert!(matches!(err, LaunchError::MissingCommandLine));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(ctl.processes.launches, 0);
    }

    #[test]
    fn test_launch_failure_clears_tracked_and_does_not_toggle() {
        let windows = FakeWindows::default().with_window(1, 4242, true);
        let mut ctl = controller(FakeProcesses::handing_out(&[4242]), windows);
        ctl.activate().unwrap();
        ctl.windows.calls.clear();

        ctl.processes.gone.insert(4242);
        ctl.processes.fail_spawn = true;
        assert!(ctl.activate().is_err());

        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(ctl.windows.calls.is_empty());

        // The next press tries again without consulting the old pid
        ctl.processes.fail_spawn = false;
        ctl.processes.next_pids.push_back(6000);
        let report = ctl.activate().unwrap();
        assert_eq!(report.pid, 6000);
        assert_eq!(ctl.processes.liveness_checks, vec![4242]);
    }

    #[test]
    fn test_repeated_activations_never_relaunch_alive_process() {
        let windows = FakeWindows::default().with_window(1, 4242, false);
        let mut ctl = controller(FakeProcesses::handing_out(&[4242]), windows);

        let mut actions = Vec::new();
        for _ in 0..6 {
            actions.push(ctl.activate().unwrap().action);
        }

        assert_eq!(ctl.processes.launches, 1);
        assert_eq!(
            actions,
            vec![
                ToggleAction::Shown(1),
                ToggleAction::Hidden(1),
                ToggleAction::Shown(1),
                ToggleAction::Hidden(1),
                ToggleAction::Shown(1),
                ToggleAction::Hidden(1),
            ]
        );
    }

    #[test]
    fn test_activation_report_serialization() {
        let report = ActivationReport {
            pid: 4242,
            launched: true,
            action: ToggleAction::Hidden(2),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("4242"));
        assert!(json.contains("hidden"));

        let state = serde_json::to_string(&ControllerState::Idle).unwrap();
        assert_eq!(state, "\"idle\"");
    }
}
