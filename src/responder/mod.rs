// src/responder/mod.rs

//! RPC responder: the remote side of the exchange.
//!
//! A responder subscribes to the `request/+` wildcard, decodes each
//! incoming `{method, params}` body, routes it to the handler registered
//! for the method, and publishes the handler's serialized result to
//! `response/<id>`, the id being the one parsed from the request topic.
//!
//! Requests with unparseable topics or bodies, and requests for unknown
//! methods, are logged and dropped; the caller observes a timeout. Each
//! handler invocation runs in its own spawned task, so a slow method never
//! blocks the receive loop or other requests.

mod handler;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

use tokio::task::JoinHandle;

use crate::domain::{Message, Topic, TopicFilter, TransportPtr};
use crate::error::Result;
use crate::macros::{log_debug, log_warn};
use crate::protocol::topics;
use crate::protocol::RpcRequest;
use crate::RpcConfig;

use handler::{wrap_handler, BoxedHandler};

/// Running RPC responder instance.
///
/// Cheap to clone (internally `Arc`-backed).
///
/// # Example
///
/// ```no_run
/// # use serde_json::{json, Value};
/// # use topic_rpc::{create_transport, RpcConfig, RpcResponder};
/// # async fn example() -> topic_rpc::Result<()> {
/// let config = RpcConfig::memory("time-service");
/// let transport = create_transport(&config).await?;
///
/// let responder = RpcResponder::with_transport(transport, &config);
/// responder.register("getTime", |_params: Value| async move {
///     Ok(json!({"result": "12:00:00"}))
/// });
///
/// let handle = responder.run().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcResponder {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    transport: TransportPtr,
    topic_prefix: Option<String>,
    handlers: RwLock<HashMap<String, BoxedHandler>>,
}

impl RpcResponder {
    // ---
    /// Create a responder over an explicitly provided transport.
    ///
    /// No subscription is established until [`run`](Self::run) is called,
    /// so handlers registered before `run()` are guaranteed to see every
    /// delivered request.
    pub fn with_transport(transport: TransportPtr, config: &RpcConfig) -> Self {
        // ---
        Self {
            inner: Arc::new(Inner {
                transport,
                topic_prefix: config.topic_prefix.clone(),
                handlers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register an async handler for a method name.
    ///
    /// The handler is called with the request's deserialized `params`; its
    /// result is serialized and published as the response payload.
    /// Registering the same method twice replaces the previous handler.
    pub fn register<F, Fut, P, R>(&self, method: &str, handler: F)
    where
        F: Fn(P) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
    {
        // ---
        let wrapped = wrap_handler(handler);

        let mut handlers = match self.inner.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.insert(method.to_owned(), wrapped);
    }

    /// Subscribe to the request wildcard and start serving.
    ///
    /// Returns the receive-loop task handle; the loop ends with `Ok(())`
    /// when the transport closes. Once `run()` returns, the subscription
    /// is active and subsequent requests are deliverable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the request subscription cannot be
    /// established.
    pub async fn run(&self) -> Result<JoinHandle<Result<()>>> {
        // ---
        let prefix = self.inner.topic_prefix.as_deref();
        let filter = TopicFilter::from(topics::request_filter(prefix));
        let mut handle = self.inner.transport.subscribe(filter).await?;

        let this = self.clone();

        Ok(tokio::spawn(async move {
            // ---
            while let Some(msg) = handle.inbox.recv().await {
                this.handle_request(msg);
            }

            log_debug!("responder stopped (transport closed)");
            Ok(())
        }))
    }

    /// Route one incoming request to its handler.
    fn handle_request(&self, msg: Message) {
        // ---
        let prefix = self.inner.topic_prefix.as_deref();

        let Some(id) = topics::parse_request_id(prefix, msg.topic.as_str()) else {
            log_debug!("ignoring message on non-request topic {}", msg.topic);
            return;
        };

        let request: RpcRequest<Value> = match serde_json::from_slice(&msg.payload) {
            Ok(request) => request,
            Err(_err) => {
                log_debug!("dropping request {id} with undecodable body: {_err}");
                return;
            }
        };

        let handler = {
            let handlers = match self.inner.handlers.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            handlers.get(&request.method).cloned()
        };

        let Some(handler) = handler else {
            log_warn!("no handler registered for method {:?}", request.method);
            return;
        };

        let transport = self.inner.transport.clone();
        let response_topic = Topic::from(topics::response_topic(prefix, id));

        // Each request runs in its own task; a slow handler never blocks
        // the receive loop.
        tokio::spawn(async move {
            // ---
            match handler(request.params).await {
                Ok(payload) => {
                    let msg = Message::new(response_topic, payload);
                    if let Err(_err) = transport.publish(msg).await {
                        log_warn!("failed to publish response for request {id}: {_err}");
                    }
                }
                Err(_err) => {
                    log_warn!("handler for request {id} failed: {_err}");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::client::RpcClient;
    use crate::transport::create_memory_transport;
    use serde_json::json;
    use std::time::Duration;

    async fn fixture() -> (RpcClient, RpcResponder, TransportPtr) {
        // ---
        let config = RpcConfig::memory("responder-tests");
        let transport = create_memory_transport(&config).await.unwrap();

        let responder = RpcResponder::with_transport(transport.clone(), &config);
        let client = RpcClient::with_transport(transport.clone(), &config)
            .await
            .unwrap();

        (client, responder, transport)
    }

    #[tokio::test]
    async fn test_unknown_method_is_dropped() {
        // ---
        let (client, responder, _transport) = fixture().await;
        let _handle = responder.run().await.unwrap();

        let result = client
            .call("nosuch", json!({}), Duration::from_millis(100))
            .await;

        assert!(matches!(result, Err(crate::Error::Timeout)));
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_registered_method_answers() {
        // ---
        let (client, responder, _transport) = fixture().await;

        responder.register("echo", |params: Value| async move { Ok(params) });
        let _handle = responder.run().await.unwrap();

        let response = client
            .call("echo", json!({"x": 1}), Duration::from_secs(5))
            .await
            .unwrap();

        let body: Value = response.decode().unwrap();
        assert_eq!(body, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_dropped() {
        // ---
        let (client, responder, transport) = fixture().await;

        responder.register("echo", |params: Value| async move { Ok(params) });
        let _handle = responder.run().await.unwrap();

        // Raw junk straight onto the request topic; the responder must
        // survive it and keep serving.
        let junk = Message::new(Topic::from("request/999"), bytes::Bytes::from_static(b"{"));
        transport.publish(junk).await.unwrap();

        let response = client
            .call("echo", json!(42), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.decode::<Value>().unwrap(), json!(42));
    }
}
