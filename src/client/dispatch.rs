//! Response dispatcher.
//!
//! A background task that drains the `response/+` subscription inbox,
//! extracts the request id from each topic suffix, and resolves the
//! matching pending request.
//!
//! Messages that do not belong to the exchange are treated as noise:
//! unparseable topics and unknown ids are logged at debug level and
//! dropped. Duplicate delivery and post-timeout arrival are expected under
//! at-least-once semantics, so neither is an error.

use std::sync::{Mutex, Weak};

use crate::domain::{Message, SubscriptionHandle};
use crate::macros::log_debug;
use crate::protocol::topics;

use super::lock_ignore_poison;
use super::pending::PendingRequests;

pub(super) struct Dispatcher {
    // ---
    topic_prefix: Option<String>,

    /// Weak handle to the owning client's pending map.
    ///
    /// The dispatch loop exits when the client is dropped; holding a weak
    /// reference keeps the task from pinning the map alive on its own.
    pending: Weak<Mutex<PendingRequests>>,
}

impl Dispatcher {
    // ---
    pub(super) fn new(topic_prefix: Option<String>, pending: Weak<Mutex<PendingRequests>>) -> Self {
        Self {
            topic_prefix,
            pending,
        }
    }

    /// Consume the subscription inbox until it closes or the owning client
    /// is dropped.
    pub(super) async fn run(self, mut handle: SubscriptionHandle) {
        // ---
        while let Some(msg) = handle.inbox.recv().await {
            let Some(pending) = self.pending.upgrade() else {
                // Client was dropped, exit loop
                break;
            };
            dispatch(&pending, self.topic_prefix.as_deref(), msg);
        }

        log_debug!("response dispatcher stopped (transport closed or client dropped)");
    }
}

/// Resolve one incoming message against the pending map.
fn dispatch(pending: &Mutex<PendingRequests>, prefix: Option<&str>, msg: Message) {
    // ---
    let Some(id) = topics::parse_response_id(prefix, msg.topic.as_str()) else {
        log_debug!("ignoring message on non-response topic {}", msg.topic);
        return;
    };

    let mut pending = lock_ignore_poison(pending);

    match pending.complete(id, msg.payload) {
        Some(_elapsed) => {
            log_debug!("request {id} resolved after {_elapsed:?}");
        }
        None => {
            // Already resolved, timed out, cancelled, or never issued.
            log_debug!("dropping response for unknown or completed request {id}");
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::Topic;
    use bytes::Bytes;

    fn message(topic: &str, payload: &'static [u8]) -> Message {
        Message::new(Topic::from(topic), Bytes::from_static(payload))
    }

    #[test]
    fn test_dispatch_resolves_pending_entry() {
        // ---
        let pending = Mutex::new(PendingRequests::new());
        let rx = pending.lock().unwrap().register(1.into());

        dispatch(&pending, None, message("response/1", b"body"));

        assert_eq!(rx.blocking_recv().unwrap(), Bytes::from_static(b"body"));
        assert_eq!(pending.lock().unwrap().len(), 0);
    }

    #[test]
    fn test_dispatch_drops_unknown_id() {
        // ---
        let pending = Mutex::new(PendingRequests::new());
        let _rx = pending.lock().unwrap().register(1.into());

        dispatch(&pending, None, message("response/99", b"body"));

        // Unrelated id left untouched
        assert_eq!(pending.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dispatch_drops_unparseable_topic() {
        // ---
        let pending = Mutex::new(PendingRequests::new());
        let _rx = pending.lock().unwrap().register(1.into());

        dispatch(&pending, None, message("response/not-a-number", b"body"));
        dispatch(&pending, None, message("some/other/topic", b"body"));

        assert_eq!(pending.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dispatch_after_removal_is_a_no_op() {
        // ---
        let pending = Mutex::new(PendingRequests::new());
        let _rx = pending.lock().unwrap().register(1.into());
        pending.lock().unwrap().remove(1.into());

        // Simulates a post-timeout arrival
        dispatch(&pending, None, message("response/1", b"late"));

        assert_eq!(pending.lock().unwrap().len(), 0);
    }

    #[test]
    fn test_dispatch_honors_topic_prefix() {
        // ---
        let pending = Mutex::new(PendingRequests::new());
        let rx = pending.lock().unwrap().register(1.into());

        // Bare topic does not match a prefixed scheme
        dispatch(
            &pending,
            Some("v1/devices/me/rpc"),
            message("response/1", b"wrong"),
        );
        assert_eq!(pending.lock().unwrap().len(), 1);

        dispatch(
            &pending,
            Some("v1/devices/me/rpc"),
            message("v1/devices/me/rpc/response/1", b"right"),
        );
        assert_eq!(rx.blocking_recv().unwrap(), Bytes::from_static(b"right"));
    }
}
