//! Topic scheme for the request/response exchange.
//!
//! Requests are published to `request/<id>`; responses arrive on
//! `response/<id>` and are consumed through a single `response/+` wildcard
//! subscription. An optional prefix (e.g. `v1/devices/me/rpc`) namespaces
//! both sides; with no prefix the bare scheme above is used.

use super::RequestId;

const REQUEST_ROOT: &str = "request";
const RESPONSE_ROOT: &str = "response";

/// Publish topic for a request id.
pub(crate) fn request_topic(prefix: Option<&str>, id: RequestId) -> String {
    match prefix {
        Some(p) => format!("{p}/{REQUEST_ROOT}/{id}"),
        None => format!("{REQUEST_ROOT}/{id}"),
    }
}

/// Publish topic for a response to the given request id.
pub(crate) fn response_topic(prefix: Option<&str>, id: RequestId) -> String {
    match prefix {
        Some(p) => format!("{p}/{RESPONSE_ROOT}/{id}"),
        None => format!("{RESPONSE_ROOT}/{id}"),
    }
}

/// Wildcard filter a client subscribes to for responses.
pub(crate) fn response_filter(prefix: Option<&str>) -> String {
    match prefix {
        Some(p) => format!("{p}/{RESPONSE_ROOT}/+"),
        None => format!("{RESPONSE_ROOT}/+"),
    }
}

/// Wildcard filter a responder subscribes to for requests.
pub(crate) fn request_filter(prefix: Option<&str>) -> String {
    match prefix {
        Some(p) => format!("{p}/{REQUEST_ROOT}/+"),
        None => format!("{REQUEST_ROOT}/+"),
    }
}

/// Extract the request id from a response topic.
///
/// Returns `None` when the topic does not follow the response scheme or the
/// trailing segment is not a decimal id. Such topics are noise, not errors;
/// other subscribers or retained messages can produce them.
pub(crate) fn parse_response_id(prefix: Option<&str>, topic: &str) -> Option<RequestId> {
    parse_id(prefix, RESPONSE_ROOT, topic)
}

/// Extract the request id from a request topic.
pub(crate) fn parse_request_id(prefix: Option<&str>, topic: &str) -> Option<RequestId> {
    parse_id(prefix, REQUEST_ROOT, topic)
}

fn parse_id(prefix: Option<&str>, root: &str, topic: &str) -> Option<RequestId> {
    // ---
    let rest = match prefix {
        Some(p) => topic.strip_prefix(p)?.strip_prefix('/')?,
        None => topic,
    };

    let segment = rest.strip_prefix(root)?.strip_prefix('/')?;

    // Deeper topics (`response/1/extra`) are not part of the scheme.
    if segment.contains('/') {
        return None;
    }

    RequestId::parse(segment)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_request_topic_roundtrip() {
        // ---
        let id = RequestId::from(7);
        let topic = request_topic(None, id);
        assert_eq!(topic, "request/7");
        assert_eq!(parse_request_id(None, &topic), Some(id));
    }

    #[test]
    fn test_response_topic_roundtrip() {
        // ---
        let id = RequestId::from(12);
        let topic = response_topic(None, id);
        assert_eq!(topic, "response/12");
        assert_eq!(parse_response_id(None, &topic), Some(id));
    }

    #[test]
    fn test_prefixed_scheme() {
        // ---
        let prefix = Some("v1/devices/me/rpc");
        let id = RequestId::from(1);

        assert_eq!(request_topic(prefix, id), "v1/devices/me/rpc/request/1");
        assert_eq!(response_filter(prefix), "v1/devices/me/rpc/response/+");
        assert_eq!(
            parse_response_id(prefix, "v1/devices/me/rpc/response/1"),
            Some(id)
        );

        // Unprefixed topics do not match a prefixed scheme.
        assert_eq!(parse_response_id(prefix, "response/1"), None);
    }

    #[test]
    fn test_parse_rejects_noise() {
        // ---
        assert_eq!(parse_response_id(None, "response/abc"), None);
        assert_eq!(parse_response_id(None, "response/"), None);
        assert_eq!(parse_response_id(None, "response"), None);
        assert_eq!(parse_response_id(None, "response/1/extra"), None);
        assert_eq!(parse_response_id(None, "request/1"), None);
        assert_eq!(parse_response_id(None, "other/topic"), None);
    }

    #[test]
    fn test_filters() {
        // ---
        assert_eq!(response_filter(None), "response/+");
        assert_eq!(request_filter(None), "request/+");
    }
}
