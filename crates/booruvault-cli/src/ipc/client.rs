//! Unix socket IPC client using synchronous I/O.

use anyhow::{anyhow, Result};
use booruvault_common::{decode_response, encode_request, Request, Response};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use tracing::debug;

/// IPC client for communicating with the daemon.
pub struct IpcClient {
    stream: UnixStream,
}

impl IpcClient {
    /// Connect to the daemon.
    pub fn connect() -> Result<Self> {
        Self::connect_to(&booruvault_common::socket_path())
    }

    pub fn connect_to(path: &Path) -> Result<Self> {
        debug!("Connecting to daemon at {:?}", path);

        let stream = UnixStream::connect(path).map_err(|e| {
            anyhow!(
                "Failed to connect to daemon at {:?}: {}. Is booruvault-daemon running?",
                path,
                e
            )
        })?;

        Ok(Self { stream })
    }

    /// Send a request and receive a response.
    fn request(&mut self, request: &Request) -> Result<Response> {
        let encoded = encode_request(request)?;
        self.stream.write_all(&encoded)?;
        self.stream.flush()?;

        let mut reader = BufReader::new(&mut self.stream);
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(anyhow!("Daemon closed the connection"));
        }

        let response = decode_response(line.trim().as_bytes())?;
        Ok(response)
    }

    /// Send a request, turning an error response into an error.
    pub fn call(&mut self, request: &Request) -> Result<Response> {
        match self.request(request)? {
            Response::Error { code, message } => {
                Err(anyhow!("Daemon error ({:?}): {}", code, message))
            }
            response => Ok(response),
        }
    }

    /// Ping the daemon.
    pub fn ping(&mut self) -> Result<()> {
        match self.call(&Request::Ping)? {
            Response::Pong => Ok(()),
            other => Err(anyhow!("Unexpected response: {:?}", other)),
        }
    }
}
