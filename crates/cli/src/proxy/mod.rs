// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Storage proxy: the coordinator's only path to the storage engine.
//!
//! The engine runs inside the `trawld` worker process. [`StorageProxy`]
//! starts that worker lazily, verifies it with a bounded PING handshake, and
//! then forwards each storage operation as one request/response round trip.
//!
//! Worker lifecycle: `NotCreated -> Creating -> ReadyCheck -> Ready`.
//! Exactly one caller drives a creation; everyone else who finds it in
//! progress polls until it settles and shares its outcome. Losing the worker
//! drops the state back to `NotCreated`, so the next call starts it again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use trawl_ipc::{Action, ProxyRequest, ProxyResponse, PING_SENTINEL, STORAGE_TARGET};

pub mod lifecycle;
mod socket;

pub use socket::SocketWorker;

/// How often a caller re-checks a creation driven by someone else.
const CREATION_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Errors surfaced by the storage proxy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// The worker process could not be started.
    #[error("worker creation failed: {0}")]
    WorkerCreationFailed(String),

    /// The worker started but never answered the liveness probe.
    #[error("worker not ready after {attempts} handshake attempts")]
    WorkerNotReady { attempts: u32 },

    /// The request was sent but no matching response came back.
    #[error("no response from worker: {0}")]
    NoResponse(String),

    /// The worker ran the action and it failed.
    #[error("{0}")]
    OperationFailed(String),
}

/// A way to start the worker and exchange messages with it.
pub trait WorkerBackend: Send + Sync {
    /// Start the worker. Never called concurrently by [`StorageProxy`].
    fn create(&self) -> BoxFuture<'_, Result<(), ProxyError>>;

    /// Send one request and wait for its response.
    ///
    /// Transport failures must be reported as [`ProxyError::NoResponse`].
    fn round_trip(&self, request: ProxyRequest) -> BoxFuture<'_, Result<ProxyResponse, ProxyError>>;
}

/// Worker lifecycle phase as seen by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    NotCreated,
    Creating,
    ReadyCheck,
    Ready,
}

struct Lifecycle {
    phase: WorkerPhase,
    /// Number of creation sequences started so far.
    attempt: u64,
    /// Outcome of the most recent failed creation, tagged with its attempt.
    last_failure: Option<(u64, ProxyError)>,
}

enum Step {
    Create(u64),
    Wait,
}

/// Bounded liveness handshake run after each creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for Handshake {
    fn default() -> Self {
        Handshake {
            attempts: 50,
            interval: Duration::from_millis(100),
        }
    }
}

/// Request/response bridge to the storage worker.
pub struct StorageProxy {
    backend: Arc<dyn WorkerBackend>,
    handshake: Handshake,
    state: Mutex<Lifecycle>,
    next_request_id: AtomicU64,
}

impl StorageProxy {
    pub fn new(backend: Arc<dyn WorkerBackend>, handshake: Handshake) -> Self {
        StorageProxy {
            backend,
            handshake: Handshake {
                attempts: handshake.attempts.max(1),
                interval: handshake.interval,
            },
            state: Mutex::new(Lifecycle {
                phase: WorkerPhase::NotCreated,
                attempt: 0,
                last_failure: None,
            }),
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        self.lock().phase
    }

    /// Perform one storage action. Starts the worker first if needed.
    pub async fn call(&self, action: Action, payload: Value) -> Result<Value, ProxyError> {
        self.ensure_ready().await?;

        let request_id = self.next_id();
        let request = ProxyRequest {
            target: STORAGE_TARGET.to_string(),
            action: action.as_str().to_string(),
            payload,
            request_id,
        };

        let response = match self.backend.round_trip(request).await {
            Ok(response) => response,
            Err(e) => {
                if matches!(e, ProxyError::NoResponse(_)) {
                    self.mark_lost(&e);
                }
                return Err(e);
            }
        };

        if response.request_id != request_id {
            let e = ProxyError::NoResponse(format!(
                "response {} does not match request {}",
                response.request_id, request_id
            ));
            self.mark_lost(&e);
            return Err(e);
        }

        if response.success {
            Ok(response.data.unwrap_or(Value::Null))
        } else {
            Err(ProxyError::OperationFailed(
                response
                    .error
                    .unwrap_or_else(|| format!("{} failed", action)),
            ))
        }
    }

    /// Bring the worker to `Ready`. A no-op when it already is.
    pub async fn ensure_ready(&self) -> Result<(), ProxyError> {
        let mut waiting_on: Option<u64> = None;

        loop {
            let step = {
                let mut state = self.lock();
                match state.phase {
                    WorkerPhase::Ready => return Ok(()),
                    WorkerPhase::Creating | WorkerPhase::ReadyCheck => {
                        waiting_on.get_or_insert(state.attempt);
                        Step::Wait
                    }
                    WorkerPhase::NotCreated => {
                        // A creation we were waiting on has failed; share its error.
                        if let (Some(waited), Some((attempt, err))) =
                            (waiting_on, state.last_failure.as_ref())
                        {
                            if *attempt >= waited {
                                return Err(err.clone());
                            }
                        }
                        state.phase = WorkerPhase::Creating;
                        state.attempt += 1;
                        Step::Create(state.attempt)
                    }
                }
            };

            match step {
                Step::Wait => tokio::time::sleep(CREATION_POLL_INTERVAL).await,
                Step::Create(attempt) => return self.create(attempt).await,
            }
        }
    }

    async fn create(&self, attempt: u64) -> Result<(), ProxyError> {
        let mut guard = CreationGuard {
            proxy: self,
            attempt,
            armed: true,
        };

        tracing::info!(attempt, "starting storage worker");
        let result = self.create_and_probe().await;
        guard.armed = false;

        let mut state = self.lock();
        match &result {
            Ok(()) => {
                tracing::info!(attempt, "storage worker ready");
                state.phase = WorkerPhase::Ready;
                state.last_failure = None;
            }
            Err(e) => {
                tracing::warn!(attempt, "storage worker failed to start: {}", e);
                state.phase = WorkerPhase::NotCreated;
                state.last_failure = Some((attempt, e.clone()));
            }
        }
        result
    }

    async fn create_and_probe(&self) -> Result<(), ProxyError> {
        self.backend.create().await?;
        self.lock().phase = WorkerPhase::ReadyCheck;
        self.handshake().await
    }

    async fn handshake(&self) -> Result<(), ProxyError> {
        let Handshake { attempts, interval } = self.handshake;

        for n in 1..=attempts {
            let probe = ProxyRequest::bare(Action::Ping, self.next_id());
            match self.backend.round_trip(probe).await {
                Ok(response) if is_pong(&response) => return Ok(()),
                Ok(response) => {
                    tracing::debug!(attempt = n, "unexpected handshake reply: {:?}", response);
                }
                Err(e) => {
                    tracing::debug!(attempt = n, "handshake probe failed: {}", e);
                }
            }
            if n < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(ProxyError::WorkerNotReady { attempts })
    }

    fn mark_lost(&self, cause: &ProxyError) {
        let mut state = self.lock();
        if state.phase == WorkerPhase::Ready {
            tracing::warn!("lost storage worker: {}", cause);
            state.phase = WorkerPhase::NotCreated;
        }
    }

    fn next_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn is_pong(response: &ProxyResponse) -> bool {
    response.success && response.data.as_ref().and_then(Value::as_str) == Some(PING_SENTINEL)
}

/// Returns the lifecycle to `NotCreated` if a creation future is dropped midway.
struct CreationGuard<'a> {
    proxy: &'a StorageProxy,
    attempt: u64,
    armed: bool,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.proxy.lock();
        state.phase = WorkerPhase::NotCreated;
        state.last_failure = Some((
            self.attempt,
            ProxyError::WorkerCreationFailed("worker creation was abandoned".to_string()),
        ));
    }
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod proxy_tests;
