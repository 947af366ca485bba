use crate::daemon::ControlEvent;
use crate::ipc::{IpcCommand, IpcResponse, get_socket_path};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Guard that removes the socket file when dropped
pub struct SocketGuard {
    path: PathBuf,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if self.path.exists() {
                error!("Failed to remove socket file: {}", e);
            }
        } else {
            info!("Removed socket file at {}", self.path.display());
        }
    }
}

/// Start the IPC socket server at the default location
pub async fn start_server(tx: mpsc::UnboundedSender<ControlEvent>) -> Result<SocketGuard> {
    let socket_path = get_socket_path()?;
    start_server_at(&socket_path, tx).await
}

/// Accept clients on `socket_path` and forward their commands to the daemon.
/// Returns a guard that cleans up the socket.
pub async fn start_server_at(
    socket_path: &Path,
    tx: mpsc::UnboundedSender<ControlEvent>,
) -> Result<SocketGuard> {
    // Remove stale socket if it exists
    if socket_path.exists() {
        info!("Removing stale socket at {}", socket_path.display());
        fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind socket at {}", socket_path.display()))?;

    info!("IPC socket listening at {}", socket_path.display());

    let guard = SocketGuard {
        path: socket_path.to_path_buf(),
    };

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let tx_clone = tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, tx_clone).await {
                            debug!("Client connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    });

    Ok(guard)
}

/// Handle a single client connection
async fn handle_client(stream: UnixStream, tx: mpsc::UnboundedSender<ControlEvent>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    // Read one command per connection
    reader.read_line(&mut line).await?;

    let response = match line.parse::<IpcCommand>() {
        Ok(cmd) => {
            debug!("Received IPC command: {:?}", cmd);
            dispatch(cmd, &tx).await
        }
        Err(_) => {
            warn!("Unknown IPC command: {}", line.trim());
            IpcResponse::Error(format!("Unknown command: {}", line.trim()))
        }
    };

    // Send response
    let response_json = serde_json::to_string(&response)?;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}

async fn dispatch(cmd: IpcCommand, tx: &mpsc::UnboundedSender<ControlEvent>) -> IpcResponse {
    const SHUTTING_DOWN: &str = "Daemon is shutting down";

    match cmd {
        IpcCommand::Toggle => {
            let (reply_tx, reply_rx) = oneshot::channel();
            if tx.send(ControlEvent::Activate { reply: Some(reply_tx) }).is_err() {
                return IpcResponse::Error(SHUTTING_DOWN.to_string());
            }
            match reply_rx.await {
                Ok(Ok(report)) => IpcResponse::Toggled(report),
                Ok(Err(e)) => IpcResponse::Error(e),
                Err(_) => IpcResponse::Error(SHUTTING_DOWN.to_string()),
            }
        }
        IpcCommand::Status => {
            let (reply_tx, reply_rx) = oneshot::channel();
            if tx.send(ControlEvent::Status { reply: reply_tx }).is_err() {
                return IpcResponse::Error(SHUTTING_DOWN.to_string());
            }
            match reply_rx.await {
                Ok(state) => IpcResponse::Status(state),
                Err(_) => IpcResponse::Error(SHUTTING_DOWN.to_string()),
            }
        }
        IpcCommand::Shutdown => {
            if tx.send(ControlEvent::Shutdown { code: 0 }).is_err() {
                IpcResponse::Error(SHUTTING_DOWN.to_string())
            } else {
                IpcResponse::Ok
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ActivationReport, ControllerState};
    use crate::visibility::ToggleAction;

    async fn roundtrip(path: &Path, command: &str) -> IpcResponse {
        let stream = UnixStream::connect(path).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(command.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();

        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    fn socket_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hotkey-toggle-test-{}-{}.sock", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_toggle_is_forwarded_and_answered() {
        let path = socket_path("toggle");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _guard = start_server_at(&path, tx).await.unwrap();

        let daemon = tokio::spawn(async move {
            match rx.recv().await {
                Some(ControlEvent::Activate { reply: Some(reply) }) => {
                    let _ = reply.send(Ok(ActivationReport {
                        pid: 4242,
                        launched: true,
                        action: ToggleAction::NoWindows,
                    }));
                }
                other => panic!("unexpected event: {:?}", other),
            }
        });

        let response = roundtrip(&path, "toggle").await;
        daemon.await.unwrap();

        assert_eq!(
            response,
            IpcResponse::Toggled(ActivationReport {
                pid: 4242,
                launched: true,
                action: ToggleAction::NoWindows,
            })
        );
    }

    #[tokio::test]
    async fn test_status_and_shutdown() {
        let path = socket_path("status");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _guard = start_server_at(&path, tx).await.unwrap();

        let daemon = tokio::spawn(async move {
            match rx.recv().await {
                Some(ControlEvent::Status { reply }) => {
                    let _ = reply.send(ControllerState::Tracked { pid: 9 });
                }
                other => panic!("unexpected event: {:?}", other),
            }
            rx.recv().await
        });

        let status = roundtrip(&path, "status").await;
        assert_eq!(status, IpcResponse::Status(ControllerState::Tracked { pid: 9 }));

        let shutdown = roundtrip(&path, "shutdown").await;
        assert_eq!(shutdown, IpcResponse::Ok);
        assert!(matches!(
            daemon.await.unwrap(),
            Some(ControlEvent::Shutdown { code: 0 })
        ));
    }

    #[tokio::test]
    async fn test_unknown_command_is_rejected() {
        let path = socket_path("unknown");
        let (tx, _rx) = mpsc::unbounded_channel();
        let _guard = start_server_at(&path, tx).await.unwrap();

        let response = roundtrip(&path, "explode").await;
        assert_eq!(response, IpcResponse::Error("Unknown command: explode".to_string()));
    }

    #[tokio::test]
    async fn test_guard_removes_socket() {
        let path = socket_path("guard");
        let (tx, _rx) = mpsc::unbounded_channel();
        let guard = start_server_at(&path, tx).await.unwrap();
        assert!(path.exists());

        drop(guard);
        assert!(!path.exists());
    }
}
