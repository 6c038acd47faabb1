//! # Domain Invariants
//!
//! Checks that must hold for every invocation:
//!
//! - Nested instantiate/execute/reply frames stay within the call depth limit.
//! - Query-from-query recursion stays within the query depth limit.
//! - Host gas consumption never decreases along a call chain.
//! - A reply payload is built from a message carrying a full 64-byte prefix.

use crate::domain::messages::{Event, SubMsgResult};

/// Execution safety limits.
pub mod limits {
    /// Length of the encryption prefix copied from the originating message
    /// into every reply payload.
    pub const REPLY_PREFIX_LEN: usize = 64;

    /// Maximum size of uploaded code after decompression.
    pub const MAX_CODE_SIZE: usize = 1_600 * 1024;

    /// Maximum label length.
    pub const MAX_LABEL_LEN: usize = 128;

    /// Minimum custom event type length (after trimming).
    pub const MIN_CUSTOM_EVENT_TYPE_LEN: usize = 2;
}

/// Returns true if entering a frame at `depth` is allowed.
#[must_use]
pub fn check_call_depth_invariant(depth: usize, max_depth: usize) -> bool {
    depth <= max_depth
}

/// Returns true if a query at `depth` may run.
#[must_use]
pub fn check_query_depth_invariant(depth: u32, max_depth: u32) -> bool {
    depth <= max_depth
}

/// Returns true if `after` does not precede `before`.
#[must_use]
pub fn check_gas_monotonic_invariant(before: u64, after: u64) -> bool {
    after >= before
}

/// Returns true if `msg` carries the prefix a reply needs.
#[must_use]
pub fn check_reply_prefix_invariant(msg: &[u8]) -> bool {
    msg.len() >= limits::REPLY_PREFIX_LEN
}

/// Returns true if a label may be registered.
#[must_use]
pub fn check_label_invariant(label: &str) -> bool {
    !label.trim().is_empty() && label.len() <= limits::MAX_LABEL_LEN
}

/// Returns true if a failed submessage left no events behind.
#[must_use]
pub fn check_failed_submsg_events_invariant(result: &SubMsgResult, kept: &[Event]) -> bool {
    result.is_ok() || kept.is_empty()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_limits_are_inclusive() {
        assert!(check_call_depth_invariant(64, 64));
        assert!(!check_call_depth_invariant(65, 64));
        assert!(check_query_depth_invariant(10, 10));
        assert!(!check_query_depth_invariant(11, 10));
    }

    #[test]
    fn test_reply_prefix() {
        assert!(check_reply_prefix_invariant(&[0u8; 64]));
        assert!(!check_reply_prefix_invariant(&[0u8; 63]));
    }

    #[test]
    fn test_label() {
        assert!(check_label_invariant("my-contract"));
        assert!(!check_label_invariant("   "));
        assert!(!check_label_invariant(&"x".repeat(200)));
    }

    #[test]
    fn test_failed_submsg_keeps_no_events() {
        let err = SubMsgResult::Err("x".into());
        assert!(check_failed_submsg_events_invariant(&err, &[]));
        assert!(!check_failed_submsg_events_invariant(
            &err,
            &[Event::new("transfer")]
        ));
    }
}
