use crate::controller::ControllerState;
use crate::ipc::{IpcCommand, IpcResponse, get_socket_path};
use crate::visibility::ToggleAction;
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

// Generous: a toggle may include a slow program start
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Send a command to the daemon and get the response
pub fn send_command(command: IpcCommand) -> Result<IpcResponse> {
    let socket_path = get_socket_path()?;

    let mut stream = UnixStream::connect(&socket_path).with_context(|| {
        format!(
            "Failed to connect to daemon at {}. Is the daemon running?",
            socket_path.display()
        )
    })?;

    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

    // Send command as simple string
    writeln!(stream, "{}", command)?;
    stream.flush()?;

    // Read response
    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: IpcResponse =
        serde_json::from_str(&response_line).context("Failed to parse daemon response")?;

    Ok(response)
}

/// Send command and print result, exit with appropriate code
pub fn send_command_and_exit(command: IpcCommand) -> ! {
    match send_command(command) {
        Ok(IpcResponse::Ok) => {
            std::process::exit(0);
        }
        Ok(IpcResponse::Toggled(report)) => {
            if report.launched {
                println!("Launched process {}", report.pid);
            }
            match report.action {
                ToggleAction::NoWindows => println!("No windows to toggle yet"),
                ToggleAction::Hidden(n) => println!("Hid {} window(s) of process {}", n, report.pid),
                ToggleAction::Shown(n) => println!("Showed {} window(s) of process {}", n, report.pid),
            }
            std::process::exit(0);
        }
        Ok(IpcResponse::Status(state)) => {
            println!("Daemon Status:");
            match state {
                ControllerState::Idle => println!("  State: idle"),
                ControllerState::Tracked { pid } => println!("  State: tracking process {}", pid),
            }
            std::process::exit(0);
        }
        Ok(IpcResponse::Error(e)) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
