// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the domain-level transport interface used by the
//! client and responder layers to exchange messages. It intentionally
//! avoids any reference to concrete protocols, brokers, or client
//! libraries.
//!
//! The transport layer is responsible only for delivering opaque messages
//! to subscribed consumers. Higher-level semantics such as RPC correlation
//! or timeouts are handled elsewhere.
//!
//! Concrete implementations of this interface live under `src/transport/`.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::Result;

/// A topic a message is published to.
///
/// Topics are hierarchical strings with `/`-separated levels. They are
/// immutable, cheap to clone, and safe to share across threads. The domain
/// layer treats them as opaque routing keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Topic(pub Arc<str>);

impl Topic {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T> From<T> for Topic
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Topic(value.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A subscription filter.
///
/// A `TopicFilter` selects the set of topics a subscriber receives.
/// Matching follows the usual pub/sub wildcard rules: `+` matches exactly
/// one topic level, `#` matches any number of remaining levels and is only
/// meaningful as the final segment.
///
/// The in-memory transport applies [`TopicFilter::matches`] directly and
/// provides the reference semantics; broker-backed transports delegate
/// matching to the broker, which is expected to agree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TopicFilter(pub Arc<str>);

impl TopicFilter {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this filter matches the given topic.
    pub fn matches(&self, topic: &str) -> bool {
        // ---
        let mut pattern = self.0.split('/');
        let mut levels = topic.split('/');

        loop {
            match (pattern.next(), levels.next()) {
                // `#` swallows the rest of the topic, including nothing:
                // `a/#` matches both `a/b/c` and `a`.
                (Some("#"), _) => return true,
                (Some("+"), Some(_)) => continue,
                (Some(seg), Some(level)) if seg == level => continue,
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl<T> From<T> for TopicFilter
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        TopicFilter(value.into())
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The unit of transport between publishers and subscribers.
///
/// A `Message` carries an opaque payload and the topic it was published
/// to. The transport layer does not interpret the payload; correlation
/// metadata rides in the topic, not in-band.
#[derive(Clone, Debug)]
pub struct Message {
    /// Topic used for routing and delivery.
    pub topic: Topic,

    /// Opaque payload bytes.
    ///
    /// The interpretation of this payload is defined by higher-level
    /// protocol logic (e.g., the JSON request body).
    pub payload: Bytes,
}

impl Message {
    pub fn new(topic: Topic, payload: Bytes) -> Self {
        Self { topic, payload }
    }
}

/// Handle returned from a successful subscription.
///
/// The subscription remains active until either:
/// - The handle is dropped (receiver channel closes)
/// - The transport is closed
///
/// Dropping the handle automatically unsubscribes locally.
pub struct SubscriptionHandle {
    // ---
    /// Receiver channel for delivered messages matching this subscription.
    pub inbox: mpsc::Receiver<Message>,
}

/// Transport abstraction.
///
/// A `Transport` provides best-effort delivery of messages between
/// publishers and subscribers. It defines the minimal contract required by
/// higher-level layers without committing to any specific protocol or
/// broker. The next layer up provides correlation and timeouts.
///
/// Implementations must ensure that:
/// - Once `subscribe()` returns successfully, messages published *after*
///   that point and matching the filter are deliverable.
/// - `publish()` is non-blocking with respect to subscribers.
/// - Per-topic delivery order is preserved as received from the underlying
///   system.
///
/// Delivery may be at-least-once; consumers must tolerate duplicates.
/// The in-memory transport serves as the reference implementation of these
/// semantics.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Publish a message to its topic.
    async fn publish(&self, msg: Message) -> Result<()>;

    /// Register a subscription and return a handle for receiving messages.
    async fn subscribe(&self, filter: TopicFilter) -> Result<SubscriptionHandle>;

    /// Close the transport and release any associated resources.
    async fn close(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// This is an `Arc<dyn Transport>`, which means:
/// - `.clone()` is cheap (only increments a reference count)
/// - Multiple clones share the same underlying connection
/// - Used to erase concrete transport types behind a stable domain interface.
pub type TransportPtr = Arc<dyn Transport>;

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_exact_match() {
        // ---
        let filter = TopicFilter::from("response/1");
        assert!(filter.matches("response/1"));
        assert!(!filter.matches("response/2"));
        assert!(!filter.matches("response"));
        assert!(!filter.matches("response/1/extra"));
    }

    #[test]
    fn test_single_level_wildcard() {
        // ---
        let filter = TopicFilter::from("response/+");
        assert!(filter.matches("response/1"));
        assert!(filter.matches("response/999"));
        assert!(filter.matches("response/abc"));
        assert!(!filter.matches("response"));
        assert!(!filter.matches("response/1/extra"));
        assert!(!filter.matches("request/1"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        // ---
        let filter = TopicFilter::from("response/#");
        assert!(filter.matches("response/1"));
        assert!(filter.matches("response/1/extra"));
        assert!(filter.matches("response"));
        assert!(!filter.matches("request/1"));
    }

    #[test]
    fn test_wildcard_in_the_middle() {
        // ---
        let filter = TopicFilter::from("v1/+/rpc/response/+");
        assert!(filter.matches("v1/devices/rpc/response/3"));
        assert!(!filter.matches("v1/devices/rpc/request/3"));
        assert!(!filter.matches("v1/devices/extra/rpc/response/3"));
    }
}
