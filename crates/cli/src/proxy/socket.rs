// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Unix socket backend for the storage proxy.
//!
//! Each request uses its own connection, so a response can only ever belong
//! to the request written on that connection.

use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use trawl_ipc::{framing_async, ProxyRequest, ProxyResponse};

use super::{lifecycle, ProxyError, WorkerBackend};

/// Talks to a `trawld` process through `<state_dir>/worker.sock`.
#[derive(Debug, Clone)]
pub struct SocketWorker {
    state_dir: PathBuf,
    binary: Option<PathBuf>,
    request_timeout: Duration,
}

impl SocketWorker {
    pub fn new(state_dir: PathBuf, binary: Option<PathBuf>, request_timeout: Duration) -> Self {
        SocketWorker {
            state_dir,
            binary,
            request_timeout,
        }
    }

    async fn exchange(&self, request: &ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        // A request that cannot be framed never reaches the worker, which stays usable.
        let frame = trawl_ipc::encode_frame(request).map_err(|e| {
            ProxyError::OperationFailed(format!("cannot send {}: {}", request.action, e))
        })?;

        let socket = lifecycle::socket_path(&self.state_dir);
        let mut stream = UnixStream::connect(&socket)
            .await
            .map_err(|e| ProxyError::NoResponse(format!("connect {}: {}", socket.display(), e)))?;
        stream
            .write_all(&frame)
            .await
            .map_err(|e| ProxyError::NoResponse(format!("send failed: {}", e)))?;
        framing_async::read_message(&mut stream)
            .await
            .map_err(|e| ProxyError::NoResponse(format!("receive failed: {}", e)))
    }
}

impl WorkerBackend for SocketWorker {
    fn create(&self) -> BoxFuture<'_, Result<(), ProxyError>> {
        let state_dir = self.state_dir.clone();
        let binary = self.binary.clone();
        Box::pin(async move {
            let info = tokio::task::spawn_blocking(move || {
                lifecycle::spawn_worker(&state_dir, binary.as_deref())
            })
            .await
            .map_err(|e| ProxyError::WorkerCreationFailed(e.to_string()))?
            .map_err(|e| ProxyError::WorkerCreationFailed(e.to_string()))?;
            tracing::debug!(pid = info.pid, "worker process up");
            Ok(())
        })
    }

    fn round_trip(
        &self,
        request: ProxyRequest,
    ) -> BoxFuture<'_, Result<ProxyResponse, ProxyError>> {
        Box::pin(async move {
            match tokio::time::timeout(self.request_timeout, self.exchange(&request)).await {
                Ok(result) => result,
                Err(_) => Err(ProxyError::NoResponse(format!(
                    "{} timed out after {:?}",
                    request.action, self.request_timeout
                ))),
            }
        })
    }
}
