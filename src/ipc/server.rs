//! Session control surface over local IPC.
//!
//! Listens on a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! using the `interprocess` crate. Accepts line-delimited JSON commands
//! from `prts-session-ctl` and forwards them to the supervisor loop.
//!
//! ## Protocol
//!
//! Request (one JSON object per line):
//! ```json
//! {"command": "logout", "auth_token": "..."}
//! {"command": "status", "auth_token": "..."}
//! {"command": "ready", "auth_token": "..."}
//! ```
//!
//! Response (one JSON object per line):
//! ```json
//! {"ok": true, "data": { ... } }
//! {"ok": false, "error": "unknown command: foo"}
//! ```
//!
//! `logout` is acknowledged once every managed process is resolved. A
//! request whose `auth_token` does not match gets `"unauthorized"`.

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, info_span, warn, Instrument};

use crate::orchestrator::supervisor::SessionHandle;
use crate::{AppError, Result};

/// Inbound IPC request from `prts-session-ctl`.
#[derive(Debug, Deserialize)]
struct IpcRequest {
    /// Command verb.
    command: String,
    /// Shared-secret authentication token.
    auth_token: Option<String>,
}

/// Outbound IPC response to `prts-session-ctl`.
#[derive(Debug, Serialize)]
struct IpcResponse {
    /// Whether the command succeeded.
    ok: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IpcResponse {
    fn success(data: Option<serde_json::Value>) -> Self {
        Self {
            ok: true,
            data,
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Spawn the IPC server task.
///
/// When `auth_token` is set, every request must carry the same token.
/// Connection tasks are registered with `tracker` so the caller can wait
/// for in-flight responses (notably the logout acknowledgement) before
/// exiting.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the listener cannot be created.
pub fn spawn_ipc_server(
    name: &str,
    auth_token: Option<String>,
    session: SessionHandle,
    ct: CancellationToken,
    tracker: TaskTracker,
) -> Result<tokio::task::JoinHandle<()>> {
    let name = name.to_owned();

    let listener_name = name
        .clone()
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| AppError::Ipc(format!("invalid ipc socket name '{name}': {err}")))?;

    let listener = ListenerOptions::new()
        .name(listener_name)
        .create_tokio()
        .map_err(|err| AppError::Ipc(format!("failed to create ipc listener: {err}")))?;

    info!(ipc_name = %name, "IPC server listening");

    let handle = tokio::spawn(async move {
        let span = info_span!("ipc_server", name = %name);
        async move {
            loop {
                tokio::select! {
                    () = ct.cancelled() => {
                        info!("IPC server shutting down");
                        break;
                    }
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok(stream) => {
                                tracker.spawn(handle_connection(
                                    stream,
                                    session.clone(),
                                    auth_token.clone(),
                                ));
                            }
                            Err(err) => {
                                warn!(%err, "IPC accept failed");
                            }
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await;
    });

    Ok(handle)
}

/// Handle a single IPC client connection.
async fn handle_connection(
    stream: interprocess::local_socket::tokio::Stream,
    session: SessionHandle,
    auth_token: Option<String>,
) {
    let span = info_span!("ipc_conn");
    async move {
        let (reader, mut writer) = stream.split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            match buf_reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let response = match serde_json::from_str::<IpcRequest>(trimmed) {
                        Ok(request) => {
                            dispatch_command(&request, &session, auth_token.as_deref()).await
                        }
                        Err(err) => IpcResponse::error(format!("invalid json: {err}")),
                    };

                    let mut response_line = serde_json::to_string(&response).unwrap_or_else(|_| {
                        r#"{"ok":false,"error":"serialization failed"}"#.to_owned()
                    });
                    response_line.push('\n');

                    if let Err(err) = writer.write_all(response_line.as_bytes()).await {
                        warn!(%err, "failed to write ipc response");
                        break;
                    }
                }
                Err(err) => {
                    warn!(%err, "ipc read error");
                    break;
                }
            }
        }

        info!("IPC connection closed");
    }
    .instrument(span)
    .await;
}

/// Route an IPC command to the supervisor.
async fn dispatch_command(
    request: &IpcRequest,
    session: &SessionHandle,
    expected_token: Option<&str>,
) -> IpcResponse {
    let span = info_span!("ipc_command", command = %request.command);
    async move {
        if let Some(expected) = expected_token {
            match request.auth_token.as_deref() {
                Some(provided) if provided == expected => {}
                _ => {
                    warn!(command = %request.command, "IPC request rejected: invalid auth token");
                    return IpcResponse::error("unauthorized");
                }
            }
        }

        match request.command.as_str() {
            "logout" => handle_logout(session).await,
            "status" => handle_status(session).await,
            "ready" => {
                session.signal_ready();
                info!("compositor readiness reported via IPC");
                IpcResponse::success(None)
            }
            other => IpcResponse::error(format!("unknown command: {other}")),
        }
    }
    .instrument(span)
    .await
}

async fn handle_logout(session: &SessionHandle) -> IpcResponse {
    match session.logout().await {
        Ok(report) => {
            info!(resolved = report.len(), "logout completed via IPC");
            IpcResponse::success(None)
        }
        // A second logout finds the supervisor gone; the session is
        // already down, which is what the caller asked for.
        Err(AppError::NotFound(_)) => IpcResponse::success(None),
        Err(err) => IpcResponse::error(format!("logout failed: {err}")),
    }
}

async fn handle_status(session: &SessionHandle) -> IpcResponse {
    match session.status().await {
        Ok(status) => match serde_json::to_value(&status) {
            Ok(data) => IpcResponse::success(Some(data)),
            Err(err) => IpcResponse::error(format!("failed to encode status: {err}")),
        },
        Err(err) => IpcResponse::error(format!("status unavailable: {err}")),
    }
}
