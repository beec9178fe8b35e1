// src/transport/memory/transport.rs

//! In-memory transport implementation.
//!
//! This file contains the concrete implementation of the domain-level
//! `Transport` trait using in-process data structures only.
//!
//! The memory transport is the **reference implementation** of transport
//! semantics, including wildcard matching: a published message is
//! delivered to every subscription whose filter matches its topic per
//! [`TopicFilter::matches`]. Other transports are expected to approximate
//! this behavior as closely as their underlying systems allow and to
//! document any unavoidable deviations.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::{
    // ---
    Message,
    Result,
    RpcConfig,
    SubscriptionHandle,
    TopicFilter,
    Transport,
    TransportPtr,
};

/// In-memory transport.
///
/// This transport simulates a message broker entirely within the process.
/// It is intended for testing and for validating higher-level behavior
/// without introducing network, broker, or timing-related variability.
///
/// ## Semantics
///
/// - Subscriptions are registered immediately.
/// - Once `subscribe()` returns, subsequent matching publishes are deliverable.
/// - Message delivery is deterministic within a single process.
/// - Dropping a `SubscriptionHandle` implicitly unregisters the subscription.
///
/// ## Non-Goals
///
/// - Persistence or durability
/// - Network behavior or failure simulation
/// - Exact emulation of any specific broker beyond the matching rules
struct MemoryTransport {
    // ---
    subscriptions: RwLock<HashMap<TopicFilter, Vec<mpsc::Sender<Message>>>>,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---

    /// Publish a message to all matching subscriptions.
    ///
    /// A subscription matches when its filter matches the message topic,
    /// wildcards included. This defines the reference matching semantics
    /// for the transport layer.
    async fn publish(&self, msg: Message) -> Result<()> {
        // ---
        let subs = self.subscriptions.read().await;

        for (filter, senders) in subs.iter() {
            if filter.matches(msg.topic.as_str()) {
                for sender in senders {
                    // Ignore send failures; a closed channel indicates
                    // a dropped SubscriptionHandle.
                    let _ = sender.send(msg.clone()).await;
                }
            }
        }

        Ok(())
    }

    /// Register a subscription.
    ///
    /// Once this function returns successfully, any subsequent calls to
    /// `publish()` with matching topics are deliverable to the returned
    /// inbox.
    async fn subscribe(&self, filter: TopicFilter) -> Result<SubscriptionHandle> {
        // ---
        let (tx, rx) = mpsc::channel(16);

        let mut subs = self.subscriptions.write().await;
        subs.entry(filter).or_insert_with(Vec::new).push(tx);

        Ok(SubscriptionHandle { inbox: rx })
    }

    /// Close the transport.
    ///
    /// For the in-memory transport, this clears all subscriptions.
    async fn close(&self) -> Result<()> {
        // ---
        let mut subs = self.subscriptions.write().await;
        subs.clear();
        Ok(())
    }
}

/// Create a new in-memory transport.
///
/// This transport is always available and requires no external resources;
/// the config's broker settings are ignored.
pub async fn create_transport(_config: &RpcConfig) -> Result<TransportPtr> {
    // ---
    let transport = MemoryTransport {
        // ---
        subscriptions: RwLock::new(HashMap::new()),
    };

    Ok(Arc::new(transport))
}
