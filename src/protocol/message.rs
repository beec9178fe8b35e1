use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::RequestId;

/// Request body published to `request/<id>`.
///
/// The id is carried only in the topic suffix; the body holds the method
/// name and its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest<P> {
    pub method: String,
    pub params: P,
}

/// A response delivered to a caller.
///
/// The payload is passed through undecoded; its shape is defined by the
/// caller's contract with the remote method. Use [`Response::decode`] when
/// a structured body is expected.
#[derive(Debug, Clone)]
pub struct Response {
    /// Request id this response resolved, parsed from the topic suffix.
    pub id: RequestId,
    /// Raw response payload.
    pub payload: Bytes,
}

impl Response {
    /// Decode the payload as JSON into the expected type.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the payload is not valid JSON for `T`.
    /// The failure is local to this response; other pending requests are
    /// unaffected.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload).map_err(Error::Decode)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_request_body_shape() {
        // ---
        let req = RpcRequest {
            method: "getTime".to_string(),
            params: json!({}),
        };

        let encoded = serde_json::to_value(&req).unwrap();
        assert_eq!(encoded, json!({"method": "getTime", "params": {}}));
    }

    #[test]
    fn test_response_decode() {
        // ---
        let resp = Response {
            id: RequestId::from(1),
            payload: Bytes::from_static(br#"{"result": "12:00:00"}"#),
        };

        let body: Value = resp.decode().unwrap();
        assert_eq!(body["result"], "12:00:00");
    }

    #[test]
    fn test_response_decode_error() {
        // ---
        let resp = Response {
            id: RequestId::from(1),
            payload: Bytes::from_static(b"not json"),
        };

        assert!(matches!(resp.decode::<Value>(), Err(Error::Decode(_))));
    }
}
