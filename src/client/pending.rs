use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::protocol::RequestId;

/// A registered request waiting for its response.
///
/// The oneshot sender is a single-assignment completion slot: a pending
/// request can be resolved at most once.
struct PendingEntry {
    // ---
    tx: oneshot::Sender<Bytes>,
    created_at: Instant,
}

/// Tracks pending requests waiting for responses.
///
/// Maps request ids to completion slots. When a response arrives, the slot
/// delivers the payload to the waiting future. The map is mutated by both
/// the correlator (insert, timeout/cancel removal) and the dispatcher
/// (resolve-removal); callers serialize access through a mutex, so exactly
/// one of {resolution, timeout, cancellation} wins for a given id and the
/// losers observe a no-op.
pub(super) struct PendingRequests {
    // ---
    requests: HashMap<RequestId, PendingEntry>,
}

impl PendingRequests {
    // ---

    /// Create a new empty pending requests tracker.
    pub fn new() -> Self {
        // ---
        Self {
            requests: HashMap::new(),
        }
    }

    /// Register a new pending request.
    ///
    /// Returns a receiver that resolves when the response arrives. Ids are
    /// allocated from a strictly increasing counter, so at most one entry
    /// per id can ever exist.
    pub fn register(&mut self, id: RequestId) -> oneshot::Receiver<Bytes> {
        // ---
        let (tx, rx) = oneshot::channel();
        self.requests.insert(
            id,
            PendingEntry {
                tx,
                created_at: Instant::now(),
            },
        );
        rx
    }

    /// Complete a pending request with the response payload.
    ///
    /// Returns the time the request spent pending if the id was found,
    /// `None` when the id is unknown (already resolved, timed out,
    /// cancelled, or never issued).
    pub fn complete(&mut self, id: RequestId, payload: Bytes) -> Option<Duration> {
        // ---
        let entry = self.requests.remove(&id)?;
        let elapsed = entry.created_at.elapsed();

        // Ignore send failures; the receiver is dropped when a request is
        // abandoned between resolution and removal.
        let _ = entry.tx.send(payload);

        Some(elapsed)
    }

    /// Remove a pending request without delivering a response.
    ///
    /// Used for timeout and cancellation cleanup. Dropping the sender
    /// closes the waiter's channel.
    pub fn remove(&mut self, id: RequestId) -> bool {
        // ---
        self.requests.remove(&id).is_some()
    }

    /// Get the number of pending requests.
    pub fn len(&self) -> usize {
        // ---
        self.requests.len()
    }
}
