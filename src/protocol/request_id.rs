use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique request identifier used to match RPC requests and responses.
///
/// Ids appear in decimal form as the trailing topic segment and are opaque
/// to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    /// Parse a topic segment as a request id.
    ///
    /// Accepts only non-empty all-digit segments; `u64::from_str` would
    /// also accept a leading `+`, which is a wildcard in topic syntax.
    pub fn parse(segment: &str) -> Option<Self> {
        if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        segment.parse().ok().map(Self)
    }

    /// The numeric value of this id.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RequestId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates strictly increasing request ids, starting at 1.
///
/// Ids are never reused within the allocator's lifetime and are never
/// derived from wall-clock or random sources, so rapid issuance cannot
/// collide. Each client owns its own allocator; there is no ambient
/// counter shared across instances.
#[derive(Debug)]
pub struct RequestIdAllocator {
    next: AtomicU64,
}

impl RequestIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        // ---
        let ids = RequestIdAllocator::new();
        assert_eq!(ids.next_id(), RequestId::from(1));
        assert_eq!(ids.next_id(), RequestId::from(2));
        assert_eq!(ids.next_id(), RequestId::from(3));
    }

    #[test]
    fn test_allocators_are_independent() {
        // ---
        let a = RequestIdAllocator::new();
        let b = RequestIdAllocator::new();
        let _ = a.next_id();
        let _ = a.next_id();
        assert_eq!(b.next_id(), RequestId::from(1));
    }

    #[test]
    fn test_display_is_decimal() {
        // ---
        assert_eq!(RequestId::from(42).to_string(), "42");
    }

    #[test]
    fn test_parse_accepts_digits_only() {
        // ---
        assert_eq!(RequestId::parse("42"), Some(RequestId::from(42)));
        assert_eq!(RequestId::parse(""), None);
        assert_eq!(RequestId::parse("abc"), None);
        assert_eq!(RequestId::parse("12x"), None);
        assert_eq!(RequestId::parse("+5"), None);
        assert_eq!(RequestId::parse("-5"), None);
        // Overflows u64
        assert_eq!(RequestId::parse("99999999999999999999999"), None);
    }
}
