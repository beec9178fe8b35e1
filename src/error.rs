use thiserror::Error;

/// Errors that can occur during RPC operations.
///
/// Failures are local to the call that produced them; no call's failure
/// affects another outstanding call.
#[derive(Error, Debug)]
pub enum Error {
    /// Request timed out waiting for a response.
    ///
    /// The pending entry has been removed; a late-arriving response for
    /// the same id is discarded by the dispatcher.
    #[error("request timed out")]
    Timeout,

    /// Request was cancelled before a response arrived.
    #[error("request cancelled")]
    Cancelled,

    /// RPC method name was empty.
    #[error("method name must not be empty")]
    EmptyMethod,

    /// Caller supplied a zero timeout.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// Publish, subscribe, or connection failure at the transport layer.
    ///
    /// Surfaced immediately to the caller; never retried by this crate.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request body could not be serialized.
    #[error("request encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Response payload could not be decoded into the expected form.
    ///
    /// Reported only to the caller of the specific request; the dispatcher
    /// and other pending requests are unaffected.
    #[error("response decoding failed: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Result type alias for RPC operations.
pub type Result<T> = std::result::Result<T, Error>;
