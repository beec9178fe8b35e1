//! MQTT transport implementation using `rumqttc`.
//!
//! This module provides an implementation of the `Transport` trait backed by
//! an MQTT broker connection. It follows an **actor-based concurrency model**
//! to safely integrate with the underlying MQTT client.
//!
//! ## Concurrency model
//!
//! - A single background **actor task** owns the MQTT `EventLoop`.
//! - The actor is responsible for:
//!   - publishing outbound messages via `AsyncClient`,
//!   - registering broker subscriptions,
//!   - polling the `EventLoop` for incoming publishes,
//!   - clean shutdown of the connection.
//! - All interaction with the MQTT client is serialized through this actor;
//!   no other task ever touches the event loop directly.
//!
//! This design preserves the public `Transport` contract (`Send + Sync`)
//! while respecting the MQTT client's event loop semantics.
//!
//! ## Connection behavior
//!
//! Connection to the broker is **lazy** - it happens when the EventLoop
//! first polls after transport creation. ConnAck success/failure is logged
//! at info/error level respectively. Credentials from the config are
//! applied as MQTT username/password.
//!
//! ## Message delivery semantics
//!
//! Incoming publishes are fanned out to every local subscriber whose
//! filter matches the publish topic, mirroring the memory transport's
//! matching rules. Payloads are passed through untouched; the topic alone
//! carries the correlation id.
//!
//! Publishes and subscriptions use QoS 1 (at-least-once) - duplicates are
//! possible and the correlation layer is expected to tolerate them.
//!
//! ## Subscription confirmation
//!
//! Subscriptions wait for SUBACK confirmation from the broker before
//! returning success. Since rumqttc's `SubAck` packets contain only packet
//! IDs (not topic names), we serialize subscription requests to maintain
//! correlation.
//!
//! ## Scope and limitations
//!
//! - One transport instance corresponds to a single broker connection.
//! - The transport assumes a small number of active filters and
//!   subscribers (typical RPC-style usage).
//! - Subscriptions are serialized (one at a time) for SUBACK correlation.
//!
//! This module intentionally avoids exposing MQTT-specific concepts (QoS,
//! retain flags, session state) outside the transport boundary.

use rumqttc::{
    //
    AsyncClient,
    ConnectReturnCode,
    Event,
    EventLoop,
    MqttOptions,
    Packet,
    Publish,
    QoS,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

use crate::macros::{log_debug, log_error, log_info};
use crate::{
    //
    Error,
    Message,
    Result,
    RpcConfig,
    SubscriptionHandle,
    Topic,
    TopicFilter,
    Transport,
    TransportPtr,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

type SubscriberMap = Arc<RwLock<HashMap<TopicFilter, Vec<mpsc::Sender<Message>>>>>;
type TaskList = Arc<RwLock<Vec<JoinHandle<()>>>>;

/// Tracks a single pending subscription awaiting SUBACK confirmation.
///
/// Since rumqttc's SubAck packets contain only packet IDs (not topic names),
/// we serialize subscription requests to maintain correlation. This is
/// acceptable for RPC use cases where subscriptions are rare and typically
/// occur at startup.
type PendingSubscribe = Arc<RwLock<Option<(String, oneshot::Sender<Result<()>>)>>>;

//
// Actor commands
//

enum Cmd {
    //
    Publish {
        msg: Message,
        resp: oneshot::Sender<Result<()>>,
    },
    Subscribe {
        filter: String,
        resp: oneshot::Sender<Result<()>>,
    },
    Close {
        resp: oneshot::Sender<Result<()>>,
    },
}

enum ActorStep {
    //
    Continue,
    Stop,
}

impl Cmd {
    // ---

    /// Dispatches an actor command to the correct handler on the actor
    async fn handle(self, actor: &mut MqttActor) -> ActorStep {
        // ---

        match self {
            Cmd::Publish { msg, resp } => {
                let result = actor.handle_publish(msg).await;
                let _ = resp.send(result);
                ActorStep::Continue
            }
            Cmd::Subscribe { filter, resp } => {
                actor.handle_subscribe(filter, resp).await;
                ActorStep::Continue
            }
            Cmd::Close { resp } => {
                actor.handle_close().await;
                let _ = resp.send(Ok(()));
                ActorStep::Stop
            }
        }
    }
}

/// MQTT-based implementation of the `Transport` trait.
///
/// Represents a single broker connection and provides best-effort,
/// at-least-once message delivery consistent with memory transport
/// matching semantics.
///
/// Connection to the broker happens lazily when the EventLoop begins
/// polling.
pub struct RumqttcTransport {
    // ---
    client_id: String,
    cmd_tx: mpsc::Sender<Cmd>,
    subscribers: SubscriberMap,
    tasks: TaskList,
}

impl RumqttcTransport {
    // ---

    /// Creates a new rumqttc transport with the given client and event loop.
    ///
    /// This function is infallible - the actual broker connection happens
    /// lazily when the EventLoop starts polling in the background actor.
    pub fn create(
        client_id: impl Into<String>,
        client: AsyncClient,
        event_loop: EventLoop,
    ) -> TransportPtr {
        // ---

        let client_id = client_id.into();

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let subscribers = Arc::new(RwLock::new(HashMap::new()));
        let tasks = Arc::new(RwLock::new(Vec::new()));
        let pending_subscribe = Arc::new(RwLock::new(None));

        let actor = MqttActor {
            client_id: client_id.clone(),
            client,
            event_loop,
            cmd_rx,
            subscribers: Arc::clone(&subscribers),
            pending_subscribe,
            reconnect: false,
        };

        let handle = tokio::task::spawn(actor.run());
        let tasks_clone = Arc::clone(&tasks);

        tokio::spawn(async move {
            tasks_clone.write().await.push(handle);
        });

        Arc::new(Self {
            client_id,
            cmd_tx,
            subscribers,
            tasks,
        })
    }
}

struct MqttActor {
    // ---
    client_id: String, // for logging only
    client: AsyncClient,
    event_loop: EventLoop,
    cmd_rx: mpsc::Receiver<Cmd>,
    subscribers: SubscriberMap,
    pending_subscribe: PendingSubscribe,
    reconnect: bool,
}

impl MqttActor {
    // ---

    async fn run(mut self) {
        // ---

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if matches!(cmd.handle(&mut self).await, ActorStep::Stop) {
                                break;
                            }
                        }
                        None => break,
                    }
                }

                event = self.event_loop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            let client_id = self.client_id.clone();
                            let subscribers = Arc::clone(&self.subscribers);
                            Self::handle_incoming(client_id, subscribers, publish).await;
                        }
                        Ok(Event::Incoming(Packet::SubAck(suback))) => {
                            let pending_subscribe = Arc::clone(&self.pending_subscribe);
                            let client_id = self.client_id.as_str();
                            Self::handle_suback(pending_subscribe, client_id, suback).await;
                        }
                        Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                            self.handle_connack(connack); // not async

                            if self.reconnect {
                                let filters: Vec<TopicFilter> = {
                                    let map = self.subscribers.read().await;
                                    map.keys().cloned().collect()
                                };

                                for filter in filters {
                                    if let Err(err) = self.client.subscribe(filter.as_str(), QoS::AtLeastOnce).await {
                                        log_error!("{}: resubscribe failed for {filter}: {err}", self.client_id);
                                    } else {
                                        log_info!("{}: resubscribed to {filter}", self.client_id);
                                    }
                                }
                            }
                        }
                        Ok(_event) => {
                            // Other events (PingResp, PubAck, etc.) - ignore
                            log_debug!("{}: received mqtt event (ignored): {:?}",
                                       self.client_id, _event);
                        }
                        Err(err) => {
                            if is_disconnect(&err) {
                                self.reconnect = true;
                                log_error!("{}: broker disconnected: {err}", self.client_id);
                            } else {
                                log_error!("{}: mqtt error: {err}", self.client_id);
                            }
                            tokio::time::sleep(RECONNECT_DELAY).await;
                            continue;
                        }
                    }
                }
            }
        }
    }

    /// Publishes a message to the broker.
    ///
    /// The payload goes out untouched with QoS 1 (at least once).
    async fn handle_publish(&mut self, msg: Message) -> Result<()> {
        // ---

        let topic = msg.topic.as_str();

        self.client
            .publish(topic, QoS::AtLeastOnce, false, msg.payload.clone())
            .await
            .map_err(|err| {
                log_error!(
                    "{}: publish failed for topic {topic}: {err}",
                    self.client_id
                );
                Error::Transport(format!("publish failed for topic {topic}: {err}"))
            })
    }

    /// Registers a broker subscription and queues it for SUBACK confirmation.
    ///
    /// The subscription is sent to the broker, and the response channel is
    /// stored in pending_subscribe. When the SUBACK arrives, handle_suback()
    /// will complete the response channel.
    ///
    /// Subscriptions are serialized (one at a time) to maintain correlation
    /// with SUBACK packets, which contain only packet IDs (not topic names).
    async fn handle_subscribe(&mut self, filter: String, resp: oneshot::Sender<Result<()>>) {
        // ---

        // Store the pending subscribe for SUBACK correlation
        {
            let mut pending = self.pending_subscribe.write().await;
            if pending.is_some() {
                log_error!(
                    "{}: attempted concurrent subscribe while one is pending",
                    self.client_id
                );
                let _ = resp.send(Err(Error::Transport(
                    "concurrent subscribe while one is pending".into(),
                )));
                return;
            }
            *pending = Some((filter.clone(), resp));
        }

        // Send subscribe request to broker
        if let Err(err) = self.client.subscribe(&filter, QoS::AtLeastOnce).await {
            // Remove from pending on immediate error
            let mut pending = self.pending_subscribe.write().await;
            if let Some((_filter, responder)) = pending.take() {
                log_error!(
                    "{}: failed to send subscribe for filter {filter}: {err}",
                    self.client_id
                );
                let _ = responder.send(Err(Error::Transport(format!(
                    "subscribe failed for filter {filter}: {err}"
                ))));
            }
        }

        // SUBACK will be handled by handle_suback() when it arrives
    }

    /// Processes SUBACK confirmation from the broker.
    ///
    /// Completes the pending subscription by checking the return codes and
    /// logging the result at info level (since subscriptions are rare events).
    async fn handle_suback(
        pending_subscribe: PendingSubscribe,
        _client_id: &str,
        suback: rumqttc::SubAck,
    ) {
        // ---

        let mut pending = pending_subscribe.write().await;
        let Some((filter, responder)) = pending.take() else {
            // This is a reconnect re-subscribe SUBACK - ignore
            log_debug!("{_client_id}: SUBACK received for reconnect re-subscribe");
            return;
        };

        // Check if subscription was successful
        // Success codes are Success(_) variants, failure is Failure
        let success = suback
            .return_codes
            .iter()
            .all(|code| !matches!(code, rumqttc::SubscribeReasonCode::Failure));

        if success {
            log_info!("{_client_id}: successfully subscribed to filter {filter}");
            let _ = responder.send(Ok(()));
        } else {
            log_error!(
                "{_client_id}: subscription failed for filter {filter}: {:?}",
                suback.return_codes
            );
            let _ = responder.send(Err(Error::Transport(format!(
                "broker rejected subscription to {filter}"
            ))));
        }
    }

    /// Processes connection acknowledgment from the broker.
    ///
    /// Logs connection success at info level or failure at error level.
    fn handle_connack(&self, connack: rumqttc::ConnAck) {
        // ---

        if connack.code == ConnectReturnCode::Success {
            log_info!("{}: connected to broker", self.client_id);
        } else {
            log_error!("{}: connection failed: {:?}", self.client_id, connack.code);
        }
    }

    /// Disconnects from the MQTT broker.
    async fn handle_close(&mut self) {
        // ---

        log_debug!("{}: disconnecting mqtt client", self.client_id);

        if let Err(_err) = self.client.disconnect().await {
            log_debug!("{}: mqtt disconnect failed: {_err}", self.client_id);
        }
    }

    /// Fans an incoming publish out to matching local subscribers.
    ///
    /// The publish topic is matched against every registered filter;
    /// dead or slow subscribers are evicted during delivery.
    async fn handle_incoming(_client_id: String, subscribers: SubscriberMap, publish: Publish) {
        // ---

        let msg = Message::new(Topic::from(publish.topic.as_str()), publish.payload);

        let matching: Vec<(TopicFilter, Vec<mpsc::Sender<Message>>)> = {
            let map = subscribers.read().await;
            map.iter()
                .filter(|(filter, _)| filter.matches(msg.topic.as_str()))
                .map(|(filter, senders)| (filter.clone(), senders.clone()))
                .collect()
        };

        if matching.is_empty() {
            // No subscribers for this topic
            return;
        }

        for (filter, senders) in matching {
            // Snapshot the original subscriber count before consuming `senders`.
            let original_len = senders.len();

            // Collect only the surviving (live) subscribers.
            let mut survivors = Vec::with_capacity(original_len);

            for tx in senders {
                match tx.try_send(msg.clone()) {
                    Ok(()) => {
                        // Subscriber is alive and accepted the message.
                        survivors.push(tx);
                    }
                    Err(_) => {
                        // Channel is full or receiver was dropped; evict.
                    }
                }
            }

            // Only update the map if something changed.
            if survivors.len() != original_len {
                let mut map = subscribers.write().await;
                map.insert(filter, survivors);
            }
        }
    }
} // MqttActor

fn is_disconnect(err: &rumqttc::ConnectionError) -> bool {
    // ---
    matches!(
        err,
        rumqttc::ConnectionError::Io(_) | rumqttc::ConnectionError::MqttState(_)
    )
}

#[async_trait::async_trait]
impl Transport for RumqttcTransport {
    // ---

    async fn publish(&self, msg: Message) -> Result<()> {
        // ---

        let (tx, rx) = oneshot::channel();

        self.cmd_tx
            .send(Cmd::Publish { msg, resp: tx })
            .await
            .map_err(|_| Error::Transport("mqtt actor stopped".into()))?;

        rx.await
            .map_err(|_| Error::Transport("mqtt actor stopped".into()))?
    }

    async fn subscribe(&self, filter: TopicFilter) -> Result<SubscriptionHandle> {
        // ---

        let (tx, rx) = mpsc::channel(16);
        {
            let mut map = self.subscribers.write().await;
            map.entry(filter.clone()).or_default().push(tx);
        }

        let (resp_tx, resp_rx) = oneshot::channel();

        self.cmd_tx
            .send(Cmd::Subscribe {
                filter: filter.as_str().to_string(),
                resp: resp_tx,
            })
            .await
            .map_err(|_| Error::Transport("mqtt actor stopped".into()))?;

        resp_rx
            .await
            .map_err(|_| Error::Transport("mqtt actor stopped".into()))??;

        log_debug!("{}: subscription active for {filter}", self.client_id);

        Ok(SubscriptionHandle { inbox: rx })
    }

    async fn close(&self) -> Result<()> {
        // ---

        let (tx, rx) = oneshot::channel();

        let _ = self.cmd_tx.send(Cmd::Close { resp: tx }).await;
        let _ = rx.await;

        let mut tasks = self.tasks.write().await;
        while let Some(handle) = tasks.pop() {
            let _ = handle.await;
        }

        Ok(())
    }
}

/// Creates a rumqttc-based MQTT transport from the given configuration.
///
/// # Errors
///
/// Returns an error if the broker URI is missing or cannot be parsed.
///
/// # Connection Behavior
///
/// The actual connection to the broker happens lazily when the EventLoop
/// starts polling in the background actor task.
pub async fn create_transport(config: &RpcConfig) -> Result<TransportPtr> {
    // ---

    let (client, event_loop) = create_mqtt_client(config)?;
    Ok(RumqttcTransport::create(
        config.client_id.clone(),
        client,
        event_loop,
    ))
}

/// Creates an MQTT client and event loop from the given configuration.
///
/// This function is fallible only due to URI parsing. The
/// `AsyncClient::new()` call itself is infallible - connection happens
/// lazily on first poll.
fn create_mqtt_client(config: &RpcConfig) -> Result<(AsyncClient, EventLoop)> {
    // ---

    let broker_uri = config
        .broker_uri
        .as_deref()
        .ok_or_else(|| Error::Transport("broker uri required for mqtt transport".into()))?;

    // Parse broker address (e.g., "mqtt://localhost:1883")
    let url = broker_uri
        .strip_prefix("mqtt://")
        .or_else(|| broker_uri.strip_prefix("tcp://"))
        .unwrap_or(broker_uri);

    let (host, port) = match url.split_once(':') {
        Some((h, p)) => (
            h,
            p.parse().map_err(|err| {
                log_error!("rumqttc: invalid port in broker URI {broker_uri}: {err}");
                Error::Transport(format!("invalid port in broker URI {broker_uri}: {err}"))
            })?,
        ),
        None => (url, 1883),
    };

    let mut mqtt_options = MqttOptions::new(config.client_id.as_str(), host, port);

    if let Some(keep_alive_secs) = config.keep_alive_secs {
        mqtt_options.set_keep_alive(Duration::from_secs(keep_alive_secs as u64));
    }

    // Credentials are handed through opaquely; brokers that authenticate
    // devices by access token take it as the username with no password.
    if let Some(username) = &config.username {
        let password = config.password.clone().unwrap_or_default();
        mqtt_options.set_credentials(username.as_str(), password);
    }

    let (client, event_loop) = AsyncClient::new(mqtt_options, 10);

    Ok((client, event_loop))
}
