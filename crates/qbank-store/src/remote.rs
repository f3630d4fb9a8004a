//! Remote side of a mirrored store.
//!
//! A [`RemoteSink`] receives the `PUT`/`DELETE` calls a mirrored
//! [`KeyedObjectStore`](crate::KeyedObjectStore) issues after updating its
//! in-memory mirror. Writes are best-effort: the store logs sink failures and
//! never rolls the mirror back.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{RemoteError, RemoteResult};

/// Transport for remote storage resources.
///
/// Paths are absolute resource paths such as `/storage/step2/mastery/0,2`.
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Replace the resource at `path` with the JSON text `body`.
    async fn put(&self, path: &str, body: String) -> RemoteResult<()>;

    /// Delete the resource at `path`.
    async fn delete(&self, path: &str) -> RemoteResult<()>;

    /// Read the JSON document at `path`.
    async fn fetch(&self, path: &str) -> RemoteResult<Value>;
}

/// HTTP implementation of [`RemoteSink`] on top of `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSink {
    /// Sink sending requests to `base_url` (scheme, host and port).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn check_status(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("error").to_string()
    } else {
        body.trim().to_string()
    };
    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RemoteSink for HttpSink {
    async fn put(&self, path: &str, body: String) -> RemoteResult<()> {
        let response = self
            .client
            .put(self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        let response = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn fetch(&self, path: &str) -> RemoteResult<Value> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        check_status(response)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }
}

/// HTTP verb of a recorded remote call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteMethod {
    Put,
    Delete,
}

/// A call received by a [`RecordingSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteRequest {
    pub method: RemoteMethod,
    pub path: String,
    pub body: Option<String>,
}

/// In-process sink that records every call.
///
/// A gated sink holds each call until [`RecordingSink::release`] hands out a
/// permit, which makes the window between a mirror update and the network
/// round trip observable.
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<RemoteRequest>>,
    completed: Mutex<Vec<RemoteRequest>>,
    gate: Option<Semaphore>,
    failure: Mutex<Option<RemoteError>>,
    snapshot: Mutex<Value>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose calls block until released.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Let `n` held calls proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Make every later call fail with `status`.
    pub fn fail_with_status(&self, status: u16, message: &str) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(RemoteError::Status {
                status,
                message: message.to_string(),
            });
        }
    }

    /// Document returned by `fetch`.
    pub fn set_snapshot(&self, snapshot: Value) {
        if let Ok(mut slot) = self.snapshot.lock() {
            *slot = snapshot;
        }
    }

    /// Calls that reached the sink, in arrival order.
    pub fn received(&self) -> Vec<RemoteRequest> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Calls that finished successfully, in completion order.
    pub fn completed(&self) -> Vec<RemoteRequest> {
        self.completed.lock().map(|r| r.clone()).unwrap_or_default()
    }

    async fn handle(&self, request: RemoteRequest) -> RemoteResult<()> {
        if let Ok(mut received) = self.received.lock() {
            received.push(request.clone());
        }
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| RemoteError::Transport(e.to_string()))?
                .forget();
        }
        let failure = self.failure.lock().ok().and_then(|f| match &*f {
            Some(RemoteError::Status { status, message }) => Some(RemoteError::Status {
                status: *status,
                message: message.clone(),
            }),
            _ => None,
        });
        if let Some(err) = failure {
            return Err(err);
        }
        if let Ok(mut completed) = self.completed.lock() {
            completed.push(request);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSink for RecordingSink {
    async fn put(&self, path: &str, body: String) -> RemoteResult<()> {
        self.handle(RemoteRequest {
            method: RemoteMethod::Put,
            path: path.to_string(),
            body: Some(body),
        })
        .await
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        self.handle(RemoteRequest {
            method: RemoteMethod::Delete,
            path: path.to_string(),
            body: None,
        })
        .await
    }

    async fn fetch(&self, _path: &str) -> RemoteResult<Value> {
        Ok(self.snapshot.lock().map(|s| s.clone()).unwrap_or(Value::Null))
    }
}

/// Handle to a remote write issued by a store operation.
///
/// Dropping it leaves the write running in the background. Awaiting
/// [`PendingWrite::wait`] returns once the round trip is over, for callers
/// that must not proceed before the server has the change.
#[derive(Debug)]
pub struct PendingWrite {
    handle: Option<JoinHandle<()>>,
}

impl PendingWrite {
    /// A write that needs no network round trip.
    pub fn completed() -> Self {
        Self { handle: None }
    }

    pub(crate) fn spawned(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// `true` for local-only writes.
    pub fn is_local(&self) -> bool {
        self.handle.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait until the remote call has finished (successfully or not).
    pub async fn wait(self) {
        if let Some(handle) = self.handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "remote write task did not complete");
            }
        }
    }
}
