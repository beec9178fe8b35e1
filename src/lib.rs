//! RPC semantics over topic-based pub/sub with request/response correlation
//!
//! This library implements a single request/response RPC exchange pattern
//! layered on a publish/subscribe transport. A request `{method, params}`
//! is published to `request/<id>`; the matching response arrives on
//! `response/<id>` through one `response/+` wildcard subscription. It
//! handles id allocation, request/response matching, timeout handling,
//! cancellation, and concurrent request processing.
//!

// Import all sub modules once...
mod client;
mod domain;
mod responder;
mod transport;

mod rpc_config;

mod error;
mod protocol;

mod macros;

// Re-export main types
pub use client::{InFlight, RpcClient};
pub use responder::RpcResponder;

pub use rpc_config::RpcConfig;

pub use error::{Error, Result};
pub use protocol::{RequestId, RequestIdAllocator, Response, RpcRequest};

pub use transport::create_memory_transport;

#[cfg(feature = "transport_rumqttc")]
pub use transport::create_rumqttc_transport;

// --- public re-exports
pub use domain::{
    //
    Message,
    SubscriptionHandle,
    Topic,
    TopicFilter,
    Transport,
    TransportPtr,
};

/// Create the crate-default transport for the given configuration.
///
/// With the `transport_rumqttc` feature enabled this connects to the
/// configured MQTT broker; otherwise it falls back to the in-memory
/// transport.
pub async fn create_transport(config: &RpcConfig) -> Result<TransportPtr> {
    // ---
    #[cfg(feature = "transport_rumqttc")]
    {
        return create_rumqttc_transport(config).await;
    }

    // Fallback / default
    #[cfg(not(feature = "transport_rumqttc"))]
    {
        create_memory_transport(config).await
    }
}
