// src/client/mod.rs

//! RPC client implementation.
//!
//! This module contains the core [`RpcClient`] type which publishes RPC
//! requests over a transport and correlates incoming responses with
//! pending requests.
//!
//! # Architecture
//!
//! The client subscribes to the `response/+` wildcard on the configured
//! transport and runs a background dispatch loop to match incoming
//! responses with pending requests by the id carried in the topic suffix.
//!
//! Each request takes the next id from a strictly increasing counter and
//! registers a oneshot channel in the pending map. When a response
//! arrives, the dispatcher looks up the channel and sends the payload back
//! to the waiting request.
//!
//! # Concurrency
//!
//! Multiple requests can be in-flight simultaneously; each suspends on its
//! own channel, and resolving one never affects the others. The pending
//! map is protected by a mutex but lock contention is minimal since
//! operations are just HashMap insert/remove.

mod dispatch;
mod pending;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;

use crate::domain::{Message, Topic, TopicFilter, TransportPtr};
use crate::error::{Error, Result};
use crate::protocol::topics;
use crate::protocol::{RequestId, RequestIdAllocator, Response, RpcRequest};
use crate::RpcConfig;

use dispatch::Dispatcher;
use pending::PendingRequests;

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// Mutex poisoning indicates that another task panicked while holding the
/// lock. The protected state here is a best-effort pending-response map
/// (request id → oneshot sender).
///
/// Ignoring poisoning is acceptable because:
/// - There are no invariants spanning multiple fields.
/// - The worst outcome is a dropped or unmatched response.
/// - Connection-level failures are handled by the transport layer.
///
/// This avoids propagating non-`Send` poison errors across async boundaries.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Running RPC client instance.
///
/// Cheap to clone (internally `Arc`-backed).
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    transport: TransportPtr,
    topic_prefix: Option<String>,
    ids: RequestIdAllocator,
    pending: Arc<Mutex<PendingRequests>>,

    /// Best-effort dispatch loop handle.
    ///
    /// We keep it so the task isn't immediately dropped, and so it can be
    /// extended later (shutdown, join-on-close, etc.).
    _rx_task: JoinHandle<()>,
}

impl RpcClient {
    // ---
    /// Create a client with an explicitly provided transport.
    ///
    /// This is the constructor you want for tests and for advanced users.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the transport fails to establish the
    /// response subscription for this client.
    pub async fn with_transport(transport: TransportPtr, config: &RpcConfig) -> Result<Self> {
        // ---
        let topic_prefix = config.topic_prefix.clone();

        // Subscribe to responses before the first request can be
        // published, so a fast responder cannot beat the subscription.
        let filter = TopicFilter::from(topics::response_filter(topic_prefix.as_deref()));
        let handle = transport.subscribe(filter).await?;

        let pending = Arc::new(Mutex::new(PendingRequests::new()));

        let dispatcher = Dispatcher::new(topic_prefix.clone(), Arc::downgrade(&pending));
        let rx_task = tokio::spawn(dispatcher.run(handle));

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                topic_prefix,
                ids: RequestIdAllocator::new(),
                pending,
                _rx_task: rx_task,
            }),
        })
    }

    /// Convenience constructor that selects the crate-default transport.
    ///
    /// This calls `crate::create_transport()` (feature-driven) and then
    /// constructs the client using `with_transport()`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if:
    /// - Transport creation fails (invalid URI, connection failure, etc.)
    /// - The response subscription cannot be established
    pub async fn new(config: &RpcConfig) -> Result<Self> {
        // ---
        let transport = crate::create_transport(config).await?;
        Self::with_transport(transport, config).await
    }

    /// Issue an RPC call and wait for its response.
    ///
    /// Publishes `{method, params}` to `request/<id>` and suspends until
    /// the matching message arrives on `response/<id>` or `timeout`
    /// elapses. The response payload is returned undecoded; use
    /// [`Response::decode`] when a structured body is expected.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `Error::EmptyMethod` / `Error::ZeroTimeout` - invalid arguments
    /// - `Error::Encode` - request serialization fails
    /// - `Error::Transport` - the publish fails (no pending entry is left
    ///   behind)
    /// - `Error::Timeout` - no response within `timeout`; a later response
    ///   for this id is discarded
    /// - `Error::Cancelled` - the request was cancelled via [`cancel`](Self::cancel)
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use std::time::Duration;
    /// # use serde_json::{json, Value};
    /// # use topic_rpc::{RpcClient, RpcConfig};
    /// # async fn example() -> topic_rpc::Result<()> {
    /// let config = RpcConfig::memory("client");
    /// let client = RpcClient::new(&config).await?;
    ///
    /// let response = client
    ///     .call("getTime", json!({}), Duration::from_secs(5))
    ///     .await?;
    /// let body: Value = response.decode()?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<P>(&self, method: &str, params: P, timeout: Duration) -> Result<Response>
    where
        P: Serialize,
    {
        // ---
        if timeout.is_zero() {
            return Err(Error::ZeroTimeout);
        }

        let in_flight = self.submit(method, params).await?;
        in_flight.wait(timeout).await
    }

    /// Publish a request and return a handle for awaiting its response.
    ///
    /// This is the lower-level half of [`call`](Self::call): it allocates
    /// the id, registers the pending entry, and publishes, but leaves the
    /// waiting to the caller. Use it when the request id must be known
    /// before awaiting (e.g. to allow cancellation from another task).
    ///
    /// Dropping the returned [`InFlight`] abandons the request; a late
    /// response is then discarded by the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyMethod`, `Error::Encode`, or
    /// `Error::Transport`. On a publish failure no pending entry is left
    /// behind.
    pub async fn submit<P>(&self, method: &str, params: P) -> Result<InFlight>
    where
        P: Serialize,
    {
        // ---
        if method.is_empty() {
            return Err(Error::EmptyMethod);
        }

        let body = RpcRequest {
            method: method.to_owned(),
            params,
        };
        let payload = serde_json::to_vec(&body).map_err(Error::Encode)?;

        let id = self.inner.ids.next_id();

        // Register before publishing: with the entry in place first, a
        // response cannot arrive ahead of its pending slot.
        let rx = {
            let mut pending = lock_ignore_poison(&self.inner.pending);
            pending.register(id)
        };

        let topic = Topic::from(topics::request_topic(self.inner.topic_prefix.as_deref(), id));
        let msg = Message::new(topic, Bytes::from(payload));

        if let Err(err) = self.inner.transport.publish(msg).await {
            // The request never left; the entry must not outlive this call.
            let mut pending = lock_ignore_poison(&self.inner.pending);
            pending.remove(id);
            return Err(err);
        }

        Ok(InFlight {
            id,
            rx,
            pending: Arc::clone(&self.inner.pending),
        })
    }

    /// Cancel a pending request before its timeout.
    ///
    /// Removes the pending entry and closes the completion slot; the
    /// waiter observes `Error::Cancelled`, and a subsequent response for
    /// this id is discarded by the dispatcher. Returns `false` when the id
    /// is no longer pending (already resolved, timed out, or cancelled);
    /// the cancellation is then a no-op.
    pub fn cancel(&self, id: RequestId) -> bool {
        // ---
        let mut pending = lock_ignore_poison(&self.inner.pending);
        pending.remove(id)
    }

    /// Number of requests currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        // ---
        lock_ignore_poison(&self.inner.pending).len()
    }
}

/// A submitted request awaiting its response.
///
/// Returned by [`RpcClient::submit`]. Exactly one of {response, timeout,
/// cancellation} resolves the request; the pending map guarantees the
/// losers observe a no-op.
pub struct InFlight {
    // ---
    id: RequestId,
    rx: oneshot::Receiver<Bytes>,
    pending: Arc<Mutex<PendingRequests>>,
}

impl InFlight {
    // ---
    /// The id assigned to this request.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the response.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` when no response arrives within `timeout`
    /// (the stale entry is removed, so a late response is discarded), or
    /// `Error::Cancelled` when the request was cancelled.
    pub async fn wait(mut self, timeout: Duration) -> Result<Response> {
        // ---
        if timeout.is_zero() {
            return Err(Error::ZeroTimeout);
        }

        match time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(payload)) => Ok(Response {
                id: self.id,
                payload,
            }),
            // Completion slot closed without a value: cancelled.
            Ok(Err(_)) => Err(Error::Cancelled),
            // Cleanup happens in Drop as `self` goes out of scope here.
            Err(_) => Err(Error::Timeout),
        }
    }
}

impl Drop for InFlight {
    /// Abandoning a request removes its pending entry, so a late response
    /// is dropped rather than delivered to nobody.
    fn drop(&mut self) {
        // ---
        let mut pending = lock_ignore_poison(&self.pending);
        pending.remove(self.id);
    }
}
