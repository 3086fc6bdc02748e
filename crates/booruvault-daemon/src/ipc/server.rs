//! Unix socket IPC server.

use anyhow::Result;
use booruvault_common::{decode_request, encode_response, ErrorCode, Request, Response};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// A request waiting for the main loop to answer it.
pub struct IpcEvent {
    pub request: Request,
    pub response_tx: oneshot::Sender<Response>,
}

/// Accept clients on `socket_path` until the process exits.
pub async fn serve(socket_path: PathBuf, event_tx: mpsc::Sender<IpcEvent>) -> Result<()> {
    // A stale socket from a previous run blocks the bind
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    info!("IPC server listening on {:?}", socket_path);

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let tx = event_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, tx).await {
                        debug!("Client connection ended: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Serve one connection, one JSON request per line.
async fn handle_client(stream: UnixStream, event_tx: mpsc::Sender<IpcEvent>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match decode_request(line.trim().as_bytes()) {
            Ok(request) => {
                debug!("Received request: {:?}", request);
                match dispatch(&event_tx, request).await {
                    Some(response) => response,
                    // Main loop shut down
                    None => break,
                }
            }
            Err(e) => Response::error(ErrorCode::InvalidRequest, format!("Invalid request: {}", e)),
        };

        writer.write_all(&encode_response(&response)?).await?;
        writer.flush().await?;
    }

    Ok(())
}

async fn dispatch(event_tx: &mpsc::Sender<IpcEvent>, request: Request) -> Option<Response> {
    let (response_tx, response_rx) = oneshot::channel();
    let event = IpcEvent {
        request,
        response_tx,
    };

    if event_tx.send(event).await.is_err() {
        return None;
    }

    Some(response_rx.await.unwrap_or_else(|_| {
        Response::error(ErrorCode::InternalError, "Internal error: response channel closed")
    }))
}
