// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use futures_util::future::join_all;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32};
use std::sync::Mutex as StdMutex;

/// In-memory worker with switchable failure modes.
#[derive(Default)]
struct FakeWorker {
    creations: AtomicU32,
    pings: AtomicU32,
    create_delay_ms: AtomicU64,
    create_error: StdMutex<Option<String>>,
    /// Pings to answer wrongly before the first pong; `u32::MAX` never answers.
    bad_pings: AtomicU32,
    dead: AtomicBool,
    fail_ops: AtomicBool,
    wrong_id: AtomicBool,
    requests: StdMutex<Vec<ProxyRequest>>,
}

impl WorkerBackend for FakeWorker {
    fn create(&self) -> BoxFuture<'_, Result<(), ProxyError>> {
        Box::pin(async move {
            self.creations.fetch_add(1, Ordering::SeqCst);
            let delay = self.create_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if let Some(message) = self.create_error.lock().unwrap().clone() {
                return Err(ProxyError::WorkerCreationFailed(message));
            }
            self.dead.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn round_trip(
        &self,
        request: ProxyRequest,
    ) -> BoxFuture<'_, Result<ProxyResponse, ProxyError>> {
        Box::pin(async move {
            if self.dead.load(Ordering::SeqCst) {
                return Err(ProxyError::NoResponse("connection refused".to_string()));
            }
            let id = request.request_id;
            if request.action == "PING" {
                let seen = self.pings.fetch_add(1, Ordering::SeqCst);
                if seen < self.bad_pings.load(Ordering::SeqCst) {
                    return Err(ProxyError::NoResponse("not listening yet".to_string()));
                }
                return Ok(ProxyResponse::ok(id, json!(PING_SENTINEL)));
            }

            self.requests.lock().unwrap().push(request.clone());
            let id = if self.wrong_id.load(Ordering::SeqCst) {
                id + 1000
            } else {
                id
            };
            if self.fail_ops.load(Ordering::SeqCst) {
                return Ok(ProxyResponse::err(id, "database is locked"));
            }
            Ok(ProxyResponse::ok(id, json!({ "echo": request.payload })))
        })
    }
}

fn proxy_with(worker: &Arc<FakeWorker>, attempts: u32) -> StorageProxy {
    let backend: Arc<dyn WorkerBackend> = Arc::clone(worker) as Arc<dyn WorkerBackend>;
    StorageProxy::new(
        backend,
        Handshake {
            attempts,
            interval: Duration::from_millis(1),
        },
    )
}

fn proxy(worker: &Arc<FakeWorker>) -> StorageProxy {
    proxy_with(worker, 5)
}

#[tokio::test]
async fn first_call_creates_worker() {
    let worker = Arc::new(FakeWorker::default());
    let proxy = proxy(&worker);
    assert_eq!(proxy.phase(), WorkerPhase::NotCreated);

    let data = proxy.call(Action::GetCount, json!({"targetId": "P"})).await.unwrap();
    assert_eq!(data, json!({ "echo": { "targetId": "P" } }));
    assert_eq!(proxy.phase(), WorkerPhase::Ready);
    assert_eq!(worker.creations.load(Ordering::SeqCst), 1);

    proxy.call(Action::Persist, Value::Null).await.unwrap();
    assert_eq!(worker.creations.load(Ordering::SeqCst), 1);
    assert_eq!(worker.pings.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn request_envelope_shape() {
    let worker = Arc::new(FakeWorker::default());
    let proxy = proxy(&worker);
    proxy.call(Action::GetCount, json!({"targetId": "P"})).await.unwrap();
    proxy.call(Action::Persist, Value::Null).await.unwrap();

    let requests = worker.requests.lock().unwrap().clone();
    assert_eq!(requests[0].target, STORAGE_TARGET);
    assert_eq!(requests[0].action, "GET_COUNT");
    assert_eq!(requests[1].action, "PERSIST");
    assert!(requests[1].request_id > requests[0].request_id);
}

#[tokio::test]
async fn concurrent_callers_share_one_creation() {
    let worker = Arc::new(FakeWorker::default());
    worker.create_delay_ms.store(50, Ordering::SeqCst);
    let proxy = proxy(&worker);

    let calls = (0..10).map(|_| proxy.call(Action::Persist, Value::Null));
    let results = join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(worker.creations.load(Ordering::SeqCst), 1);
    assert_eq!(proxy.phase(), WorkerPhase::Ready);
    assert_eq!(worker.requests.lock().unwrap().len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tasks_share_one_creation() {
    let worker = Arc::new(FakeWorker::default());
    worker.create_delay_ms.store(50, Ordering::SeqCst);
    let proxy = Arc::new(proxy(&worker));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let proxy = Arc::clone(&proxy);
            tokio::spawn(async move { proxy.call(Action::Persist, Value::Null).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(worker.creations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn handshake_retries_until_pong() {
    let worker = Arc::new(FakeWorker::default());
    worker.bad_pings.store(2, Ordering::SeqCst);
    let proxy = proxy(&worker);

    proxy.ensure_ready().await.unwrap();
    assert_eq!(worker.pings.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn handshake_budget_exhausted() {
    let worker = Arc::new(FakeWorker::default());
    worker.bad_pings.store(u32::MAX, Ordering::SeqCst);
    let proxy = proxy_with(&worker, 3);

    let err = proxy.call(Action::Init, Value::Null).await.unwrap_err();
    assert_eq!(err, ProxyError::WorkerNotReady { attempts: 3 });
    assert_eq!(worker.pings.load(Ordering::SeqCst), 3);
    assert_eq!(proxy.phase(), WorkerPhase::NotCreated);
    assert!(worker.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn creation_failure_reaches_every_waiter() {
    let worker = Arc::new(FakeWorker::default());
    worker.create_delay_ms.store(30, Ordering::SeqCst);
    *worker.create_error.lock().unwrap() = Some("binary not found".to_string());
    let proxy = proxy(&worker);

    let results = join_all((0..5).map(|_| proxy.call(Action::Init, Value::Null))).await;
    for result in results {
        assert_eq!(
            result.unwrap_err(),
            ProxyError::WorkerCreationFailed("binary not found".to_string())
        );
    }
    assert_eq!(worker.creations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_creation_is_retried_by_next_call() {
    let worker = Arc::new(FakeWorker::default());
    *worker.create_error.lock().unwrap() = Some("boom".to_string());
    let proxy = proxy(&worker);
    assert!(proxy.call(Action::Init, Value::Null).await.is_err());

    *worker.create_error.lock().unwrap() = None;
    proxy.call(Action::Init, Value::Null).await.unwrap();
    assert_eq!(worker.creations.load(Ordering::SeqCst), 2);
    assert_eq!(proxy.phase(), WorkerPhase::Ready);
}

#[tokio::test]
async fn lost_worker_is_recreated_on_next_call() {
    let worker = Arc::new(FakeWorker::default());
    let proxy = proxy(&worker);
    proxy.call(Action::Init, Value::Null).await.unwrap();

    worker.dead.store(true, Ordering::SeqCst);
    let err = proxy.call(Action::Persist, Value::Null).await.unwrap_err();
    assert!(matches!(err, ProxyError::NoResponse(_)));
    assert_eq!(proxy.phase(), WorkerPhase::NotCreated);

    proxy.call(Action::Persist, Value::Null).await.unwrap();
    assert_eq!(worker.creations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn operation_failure_keeps_worker() {
    let worker = Arc::new(FakeWorker::default());
    worker.fail_ops.store(true, Ordering::SeqCst);
    let proxy = proxy(&worker);

    let err = proxy.call(Action::Persist, Value::Null).await.unwrap_err();
    assert_eq!(err, ProxyError::OperationFailed("database is locked".to_string()));
    assert_eq!(proxy.phase(), WorkerPhase::Ready);
}

#[tokio::test]
async fn mismatched_response_is_no_response() {
    let worker = Arc::new(FakeWorker::default());
    worker.wrong_id.store(true, Ordering::SeqCst);
    let proxy = proxy(&worker);

    let err = proxy.call(Action::Persist, Value::Null).await.unwrap_err();
    assert!(matches!(err, ProxyError::NoResponse(ref m) if m.contains("does not match")));
    assert_eq!(proxy.phase(), WorkerPhase::NotCreated);
}

#[tokio::test]
async fn abandoned_creation_resets_lifecycle() {
    let worker = Arc::new(FakeWorker::default());
    worker.create_delay_ms.store(500, Ordering::SeqCst);
    let proxy = proxy(&worker);

    let timed_out =
        tokio::time::timeout(Duration::from_millis(20), proxy.ensure_ready()).await;
    assert!(timed_out.is_err());
    assert_eq!(proxy.phase(), WorkerPhase::NotCreated);

    worker.create_delay_ms.store(0, Ordering::SeqCst);
    proxy.ensure_ready().await.unwrap();
    assert_eq!(worker.creations.load(Ordering::SeqCst), 2);
}
