//! Public, transport-agnostic RPC configuration.
//!
//! This type intentionally contains no transport-specific concepts
//! (e.g. MQTT client options). Transport layers are responsible for
//! interpreting this config into concrete connection settings.

/// Transport configuration and connection parameters.
///
/// Credentials are carried opaquely and handed to the transport as-is;
/// this crate neither parses nor validates them.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    // ---
    /// Transport connection URI.
    ///
    /// For broker-based transports this specifies the broker address
    /// (e.g., "mqtt://localhost:1883"). For the in-memory transport this
    /// is `None`.
    pub broker_uri: Option<String>,

    /// Unique identifier for this transport instance, used as the broker
    /// client id and for logging.
    pub client_id: String,

    /// Broker connection keep-alive interval in seconds.
    pub keep_alive_secs: Option<u16>,

    /// Optional topic namespace prepended to the request/response scheme.
    ///
    /// With a prefix of `v1/devices/me/rpc`, requests go to
    /// `v1/devices/me/rpc/request/<id>`. `None` uses the bare
    /// `request/<id>` / `response/+` scheme.
    pub topic_prefix: Option<String>,

    /// Username supplied by the embedding application (e.g. an access
    /// token), passed through to the transport.
    pub username: Option<String>,

    /// Password supplied by the embedding application, passed through to
    /// the transport.
    pub password: Option<String>,
}

impl RpcConfig {
    /// Create a new `RpcConfig` with the given broker URI.
    ///
    /// Keep-alive will use the transport default.
    pub fn with_broker(broker_uri: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            broker_uri: Some(broker_uri.into()),
            client_id: client_id.into(),
            keep_alive_secs: None,
            topic_prefix: None,
            username: None,
            password: None,
        }
    }

    /// Create a memory transport config (no broker).
    pub fn memory(client_id: impl Into<String>) -> Self {
        Self {
            broker_uri: None,
            client_id: client_id.into(),
            keep_alive_secs: None,
            topic_prefix: None,
            username: None,
            password: None,
        }
    }

    /// Set an explicit keep-alive interval.
    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = Some(secs);
        self
    }

    /// Namespace the request/response topics under a prefix.
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = Some(prefix.into());
        self
    }

    /// Set the credentials handed to the transport.
    ///
    /// Some brokers authenticate devices with an access token carried as
    /// the username and no password.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }
}
