//! Process liveness and launching on Unix.

use crate::process::{LaunchError, LaunchSpec, Pid, ProcessHost, StdioHandle, check_launch_request};
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use tracing::debug;

/// The configured command line is split with shell quoting rules and the
/// program is executed directly, so a missing executable fails the launch.
#[derive(Debug, Default)]
pub struct UnixProcesses;

impl UnixProcesses {
    pub fn new() -> Self {
        UnixProcesses
    }
}

impl ProcessHost for UnixProcesses {
    fn is_gone(&mut self, pid: Pid) -> bool {
        let raw = match libc::pid_t::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => return true,
        };

        let mut status: libc::c_int = 0;
        // SAFETY: WNOHANG never blocks; `status` outlives the call.
        let reaped = unsafe { libc::waitpid(raw, &mut status, libc::WNOHANG) };
        if reaped == raw {
            debug!("Process {} exited with wait status {}", pid, status);
            return true;
        }
        if reaped == 0 {
            return false;
        }

        // Not our child (or already reaped): probe with the null signal
        // SAFETY: signal 0 performs permission and existence checks only.
        if unsafe { libc::kill(raw, 0) } == 0 {
            return false;
        }
        io::Error::last_os_error().raw_os_error() != Some(libc::EPERM)
    }

    fn launch(
        &mut self,
        spec: &LaunchSpec,
        stdio: Vec<Option<StdioHandle>>,
    ) -> Result<Pid, LaunchError> {
        check_launch_request(spec, &stdio)?;
        let (program, args) = split_command_line(spec)?;

        // Duplicates are owned by `command` and closed when it drops, whether or not spawn succeeds
        let mut duplicates = duplicate_slots(&stdio)?.into_iter();
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(spec.working_directory())
            .stdin(into_stdio(duplicates.next().flatten()))
            .stdout(into_stdio(duplicates.next().flatten()))
            .stderr(into_stdio(duplicates.next().flatten()));

        // SAFETY: setsid is async-signal-safe.
        unsafe {
            command.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            command_line: spec.command_line().to_string(),
            source,
        })?;

        // The child handle is not kept; liveness is probed by pid
        Ok(child.id())
    }
}

fn split_command_line(spec: &LaunchSpec) -> Result<(String, Vec<String>), LaunchError> {
    let mut parts = shell_words::split(spec.command_line()).map_err(|e| {
        LaunchError::UnparsableCommandLine {
            command_line: spec.command_line().to_string(),
            reason: e.to_string(),
        }
    })?;
    if parts.is_empty() {
        return Err(LaunchError::MissingCommandLine);
    }

    let program = parts.remove(0);
    Ok((program, parts))
}

fn duplicate_slots(stdio: &[Option<StdioHandle>]) -> Result<Vec<Option<StdioHandle>>, LaunchError> {
    stdio
        .iter()
        .enumerate()
        .map(|(slot, handle)| {
            handle
                .as_ref()
                .map(|fd| fd.try_clone())
                .transpose()
                .map_err(|source| LaunchError::DuplicateHandle { slot, source })
        })
        .collect()
}

/// Empty slots get /dev/null: the program never shares the daemon's terminal.
fn into_stdio(handle: Option<StdioHandle>) -> Stdio {
    handle.map(Stdio::from).unwrap_or_else(Stdio::null)
}
