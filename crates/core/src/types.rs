//! Identifier types for the universe
//!
//! This module defines the foundational identifiers:
//! - ObjectId: unique identifier for a simulated object
//! - TransactionId: unique identifier for a transaction
//! - StateId: an (object, time) pair naming one cell of the universe

use crate::time::VirtualTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a simulated object.
///
/// An ObjectId is a wrapper around a UUID v4. Object identity is chosen by
/// whoever first writes a state for the object; the engine never interprets
/// the bytes. The `Ord` impl gives objects a stable, arbitrary total order
/// which the universe uses wherever it must touch several objects in a
/// deterministic sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Create a new random ObjectId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an ObjectId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse an ObjectId from a string representation
    ///
    /// Accepts standard UUID format (with or without hyphens).
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this ObjectId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a transaction.
///
/// Allocated from the universe's monotone counter; never reused within one
/// universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Wrap a raw transaction number.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw transaction number.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// One cell of the universe: the state of `object` at `when`.
///
/// StateIds are totally ordered by time first and object second, so that
/// states are sorted along the timeline and ties at a single instant break
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateId {
    /// The object this cell belongs to
    pub object: ObjectId,
    /// The instant this cell names
    pub when: VirtualTime,
}

impl StateId {
    /// Create a StateId for `object` at `when`.
    pub fn new(object: ObjectId, when: VirtualTime) -> Self {
        Self { object, when }
    }
}

impl Ord for StateId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.when
            .cmp(&other.when)
            .then_with(|| self.object.cmp(&other.object))
    }
}

impl PartialOrd for StateId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.object, self.when)
    }
}
