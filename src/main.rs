mod config;
mod controller;
mod daemon;
mod hotkey;
#[cfg(unix)]
mod ipc;
mod platform;
mod process;
#[cfg(unix)]
mod socket_client;
#[cfg(unix)]
mod socket_server;
mod visibility;
mod window_locator;

use anyhow::{Context, Result};
use config::{Command, Config};
use controller::ToggleController;
use daemon::{ControlEvent, Daemon};
use hotkey::Hotkey;
use process::LaunchSpec;
use tokio::sync::mpsc;
use tracing::info;

fn main() -> Result<()> {
    // Parse CLI arguments
    let config = Config::parse();

    // Initialize logging
    let log_level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match config.command() {
        Command::Daemon => run(&config),
        #[cfg(unix)]
        Command::Toggle => socket_client::send_command_and_exit(ipc::IpcCommand::Toggle),
        #[cfg(unix)]
        Command::Status => socket_client::send_command_and_exit(ipc::IpcCommand::Status),
        #[cfg(unix)]
        Command::Shutdown => socket_client::send_command_and_exit(ipc::IpcCommand::Shutdown),
        #[cfg(not(unix))]
        other => anyhow::bail!("'{:?}' needs the IPC socket, which is only available on Unix", other),
    }
}

/// Validate the configuration, register the hotkey and run until shutdown.
fn run(config: &Config) -> Result<()> {
    let startup = config
        .hotkey()
        .and_then(|hotkey| Ok((hotkey, config.launch_spec()?)));
    let (hotkey, spec) = match startup {
        Ok(startup) => startup,
        Err(e) => {
            platform::report_fatal(&format!("{:#}", e));
            return Err(e);
        }
    };

    info!("Starting hotkey-toggle daemon: {} runs '{}'", hotkey, spec.command_line());

    // One thread drives the controller; slow launches delay later events by design
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    let code = runtime.block_on(serve(hotkey, spec))?;
    info!("Daemon exited with code {}", code);
    std::process::exit(code);
}

#[cfg(unix)]
async fn serve(hotkey: Hotkey, spec: LaunchSpec) -> Result<i32> {
    use platform::sway::{SwayHotkey, SwayWindows};
    use platform::unix::UnixProcesses;

    let windows = SwayWindows::new().inspect_err(|e| platform::report_fatal(&format!("{:#}", e)))?;
    let controller = ToggleController::new(spec, UnixProcesses::new(), windows);

    let (tx, rx) = mpsc::unbounded_channel::<ControlEvent>();
    let _socket_guard = socket_server::start_server(tx.clone()).await?;
    let _binding = SwayHotkey::register(&hotkey)
        .inspect_err(|e| platform::report_fatal(&format!("{:#}", e)))?;
    daemon::spawn_signal_listener(tx);

    Ok(Daemon::new(controller).run(rx).await)
}

#[cfg(windows)]
async fn serve(hotkey: Hotkey, spec: LaunchSpec) -> Result<i32> {
    use platform::win32::{HotkeyPump, Win32Processes, Win32Windows};

    let controller = ToggleController::new(spec, Win32Processes::new(), Win32Windows::new());

    let (tx, rx) = mpsc::unbounded_channel::<ControlEvent>();
    let _pump = HotkeyPump::start(hotkey, tx.clone())
        .inspect_err(|e| platform::report_fatal(&format!("{:#}", e)))?;
    daemon::spawn_signal_listener(tx);

    Ok(Daemon::new(controller).run(rx).await)
}
