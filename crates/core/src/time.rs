//! Nanosecond-precision virtual time
//!
//! Every state in the universe is indexed by a point in virtual time.
//! Virtual time is a pure simulation coordinate: it is totally ordered,
//! dense enough for event scheduling, and has no relationship to the wall
//! clock. There is deliberately no `now()` constructor.
//!
//! ## Sentinels
//!
//! The timeline is bounded by two sentinels:
//! - [`VirtualTime::START`]: before every event; histories may not carry a
//!   transition here (the value at START is a history's *first value*).
//! - [`VirtualTime::END`]: after every event; a transition here is legal
//!   (it is simply the final step).
//!
//! ## Usage
//!
//! Never expose raw arithmetic. Use explicit constructors:
//!
//! ```
//! use worldline_core::VirtualTime;
//!
//! let t = VirtualTime::from_nanos(1_000);
//! let u = VirtualTime::from_micros(1);
//! assert_eq!(t, u);
//! ```

use serde::{Deserialize, Serialize};

/// A point in virtual time, in nanosecond ticks.
///
/// This is the canonical time representation in the engine.
///
/// ## Invariants
///
/// - Virtual times are always non-negative (u64 ticks)
/// - Virtual times are comparable and orderable
/// - `START` precedes and `END` follows every other time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The beginning of the timeline, before every event.
    pub const START: VirtualTime = VirtualTime(0);

    /// The end of the timeline, after every event.
    pub const END: VirtualTime = VirtualTime(u64::MAX);

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a virtual time from nanosecond ticks.
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        VirtualTime(nanos)
    }

    /// Create a virtual time from microseconds.
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        VirtualTime(micros.saturating_mul(1_000))
    }

    /// Create a virtual time from milliseconds.
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        VirtualTime(millis.saturating_mul(1_000_000))
    }

    /// Create a virtual time from seconds.
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        VirtualTime(secs.saturating_mul(1_000_000_000))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the raw nanosecond tick count.
    #[inline]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Check whether this is the START sentinel.
    #[inline]
    pub const fn is_start(&self) -> bool {
        self.0 == 0
    }

    /// Check whether this is the END sentinel.
    #[inline]
    pub const fn is_end(&self) -> bool {
        self.0 == u64::MAX
    }

    // =========================================================================
    // Ordering helpers
    // =========================================================================

    /// Check if this time is strictly before another.
    #[inline]
    pub fn is_before(&self, other: VirtualTime) -> bool {
        self.0 < other.0
    }

    /// Check if this time is strictly after another.
    #[inline]
    pub fn is_after(&self, other: VirtualTime) -> bool {
        self.0 > other.0
    }

    /// Advance by a number of ticks, saturating at `END`.
    pub fn advanced_by(&self, ticks: u64) -> Self {
        VirtualTime(self.0.saturating_add(ticks))
    }
}

impl Default for VirtualTime {
    fn default() -> Self {
        VirtualTime::START
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_start() {
            write!(f, "START")
        } else if self.is_end() {
            write!(f, "END")
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}

impl From<u64> for VirtualTime {
    /// Create from raw nanosecond ticks
    fn from(nanos: u64) -> Self {
        VirtualTime::from_nanos(nanos)
    }
}

impl From<VirtualTime> for u64 {
    /// Extract raw nanosecond ticks
    fn from(t: VirtualTime) -> Self {
        t.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert!(VirtualTime::START.is_start());
        assert!(VirtualTime::END.is_end());
        assert!(VirtualTime::START < VirtualTime::END);
        assert!(VirtualTime::START < VirtualTime::from_nanos(1));
        assert!(VirtualTime::from_nanos(u64::MAX - 1) < VirtualTime::END);
    }

    #[test]
    fn test_constructors_agree() {
        assert_eq!(VirtualTime::from_micros(1), VirtualTime::from_nanos(1_000));
        assert_eq!(VirtualTime::from_millis(1), VirtualTime::from_nanos(1_000_000));
        assert_eq!(VirtualTime::from_secs(1), VirtualTime::from_nanos(1_000_000_000));
    }

    #[test]
    fn test_ordering() {
        let t1 = VirtualTime::from_nanos(100);
        let t2 = VirtualTime::from_nanos(200);
        let t3 = VirtualTime::from_nanos(100);

        assert!(t1 < t2);
        assert!(t2 > t1);
        assert_eq!(t1, t3);
        assert!(t1.is_before(t2));
        assert!(t2.is_after(t1));
    }

    #[test]
    fn test_advanced_by_saturates() {
        let t = VirtualTime::from_nanos(10);
        assert_eq!(t.advanced_by(5), VirtualTime::from_nanos(15));
        assert_eq!(VirtualTime::END.advanced_by(1), VirtualTime::END);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", VirtualTime::START), "START");
        assert_eq!(format!("{}", VirtualTime::END), "END");
        assert_eq!(format!("{}", VirtualTime::from_nanos(42)), "42ns");
    }

    #[test]
    fn test_default_is_start() {
        assert_eq!(VirtualTime::default(), VirtualTime::START);
    }

    #[test]
    fn test_roundtrip_u64() {
        let t: VirtualTime = 12345u64.into();
        assert_eq!(t.as_nanos(), 12345);
        let raw: u64 = t.into();
        assert_eq!(raw, 12345);
    }

    #[test]
    fn test_serialization() {
        let t = VirtualTime::from_nanos(1_234_567);
        let json = serde_json::to_string(&t).unwrap();
        let restored: VirtualTime = serde_json::from_str(&json).unwrap();
        assert_eq!(t, restored);
    }
}
