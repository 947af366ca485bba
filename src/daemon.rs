use crate::controller::{ActivationReport, ControllerState, ToggleController};
use crate::process::ProcessHost;
use crate::window_locator::WindowSystem;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Events delivered to the controller task, strictly one at a time.
#[derive(Debug)]
pub enum ControlEvent {
    /// The hotkey was pressed. `reply` receives the outcome when the source wants it.
    Activate {
        reply: Option<oneshot::Sender<Result<ActivationReport, String>>>,
    },
    /// Report the controller state
    Status { reply: oneshot::Sender<ControllerState> },
    /// Leave the event loop and exit with `code`
    Shutdown { code: i32 },
}

/// Owns the controller exclusively; every other subsystem talks to it via the queue.
pub struct Daemon<P: ProcessHost, W: WindowSystem> {
    controller: ToggleController<P, W>,
}

impl<P: ProcessHost, W: WindowSystem> Daemon<P, W> {
    pub fn new(controller: ToggleController<P, W>) -> Self {
        Daemon { controller }
    }

    /// Main event loop. Returns the process exit code.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ControlEvent>) -> i32 {
        info!(
            "Starting daemon event loop for '{}'",
            self.controller.spec().command_line()
        );

        while let Some(event) = events.recv().await {
            if let Some(code) = self.handle_event(event) {
                info!("Shutdown requested (exit code {})", code);
                return code;
            }
        }

        info!("All event sources closed, shutting down");
        0
    }

    fn handle_event(&mut self, event: ControlEvent) -> Option<i32> {
        debug!("Control event: {:?}, State: {:?}", event, self.controller.state());

        match event {
            ControlEvent::Activate { reply } => {
                // Launching runs inline; later events wait until it returns
                let outcome = self.controller.activate().map_err(|e| {
                    error!("Hotkey activation failed: {}", e);
                    format!("{:#}", anyhow::Error::new(e))
                });

                if let Some(reply) = reply {
                    if reply.send(outcome).is_err() {
                        warn!("Activation requester went away before the reply");
                    }
                }
                None
            }
            ControlEvent::Status { reply } => {
                if reply.send(self.controller.state()).is_err() {
                    warn!("Status requester went away before the reply");
                }
                None
            }
            ControlEvent::Shutdown { code } => Some(code),
        }
    }
}

/// Translate Ctrl+C (and SIGTERM on Unix) into a shutdown event.
pub fn spawn_signal_listener(tx: mpsc::UnboundedSender<ControlEvent>) {
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            error!("Failed to listen for termination signals: {}", e);
            return;
        }
        info!("Termination signal received");
        let _ = tx.send(ControlEvent::Shutdown { code: 0 });
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
