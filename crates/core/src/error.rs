//! Error types for the worldline engine
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Error model
//!
//! Operations on an open transaction report contract violations directly
//! (`Prehistory`, `InvalidState`). Everything that can only be judged at
//! commit time (ordering, duplicates, resurrection, invalidated reads)
//! surfaces through the transaction's terminal outcome: the listener's
//! `on_abort` receives an [`AbortReason`], and callers that need an error
//! value wrap it as [`Error::Aborted`].
//!
//! ### Retry classification
//!
//! Some aborts are contention artifacts (another transaction got there
//! first) and are worth retrying; others are semantic and final. Use
//! [`Error::is_contention`] / [`AbortReason::is_contention`] to decide.

use crate::time::VirtualTime;
use crate::types::{ObjectId, TransactionId};
use thiserror::Error;

/// Result type alias for worldline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the worldline engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Read before the universe's history start
    #[error("read at {when} precedes history start {history_start}")]
    Prehistory {
        /// The requested read time
        when: VirtualTime,
        /// The history-start watermark at the time of the read
        history_start: VirtualTime,
    },

    /// Operation not permitted in the current transaction openness
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Staged write time not strictly after the committed history
    #[error("write for {object} at {when} is not after its committed history (latest {latest})")]
    OutOfOrderWrite {
        /// The object being written
        object: ObjectId,
        /// The offending write time
        when: VirtualTime,
        /// The committed watermark it collided with
        latest: VirtualTime,
    },

    /// A concurrent transaction already committed an equal value at this cell
    #[error("duplicate write for {object} at {when}")]
    DuplicateWrite {
        /// The object being written
        object: ObjectId,
        /// The contested write time
        when: VirtualTime,
    },

    /// Write of a present value at or after a committed absence
    #[error("resurrection of {object} at {when}: destruction is forever")]
    Resurrection {
        /// The destroyed object
        object: ObjectId,
        /// The offending write time
        when: VirtualTime,
    },

    /// Transition cannot be appended to a value history
    ///
    /// Appends must be strictly after every existing transition, must not
    /// land on START, and must change the value.
    #[error("transition at {when} cannot be appended")]
    IllegalAppend {
        /// The rejected transition time
        when: VirtualTime,
    },

    /// The transaction reached ABORTED; the payload says why
    #[error("transaction aborted: {0}")]
    Aborted(AbortReason),
}

impl Error {
    /// Check whether this error is a contention artifact worth retrying.
    ///
    /// Drivers retry these; semantic failures (resurrection, prehistory,
    /// misuse) are final.
    pub fn is_contention(&self) -> bool {
        match self {
            Error::OutOfOrderWrite { .. } | Error::DuplicateWrite { .. } => true,
            Error::Aborted(reason) => reason.is_contention(),
            _ => false,
        }
    }
}

/// Why a transaction aborted.
///
/// Delivered to the transaction's listener via `on_abort`. Exactly one
/// reason is recorded per aborted transaction; the first cause wins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbortReason {
    /// A staged write was not strictly after the object's committed history
    #[error("write for {object} at {when} was not after its committed history")]
    OutOfOrderWrite {
        /// The object being written
        object: ObjectId,
        /// The offending write time
        when: VirtualTime,
    },

    /// A concurrent transaction committed an equal value at the same cell first
    #[error("duplicate write for {object} at {when}")]
    DuplicateWrite {
        /// The object being written
        object: ObjectId,
        /// The contested write time
        when: VirtualTime,
    },

    /// A staged write would revive a destroyed object
    #[error("resurrection of {object} at {when}")]
    Resurrection {
        /// The destroyed object
        object: ObjectId,
        /// The offending write time
        when: VirtualTime,
    },

    /// A past-the-end observation was contradicted by a committed write
    #[error("past-the-end read of {object} at {when} was contradicted")]
    ReadInvalidated {
        /// The object that was read
        object: ObjectId,
        /// The read time whose observation no longer holds
        when: VirtualTime,
    },

    /// A transaction this one depended on aborted
    #[error("cascaded from {cause}")]
    Cascaded {
        /// The transaction whose abort propagated here
        cause: TransactionId,
    },

    /// The transaction read before the universe's history start
    #[error("read before history start")]
    Prehistory,

    /// The owner called `begin_abort` or `close`
    #[error("abort requested")]
    Requested,
}

impl AbortReason {
    /// Check whether this abort is a contention artifact worth retrying.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            AbortReason::OutOfOrderWrite { .. }
                | AbortReason::DuplicateWrite { .. }
                | AbortReason::ReadInvalidated { .. }
                | AbortReason::Cascaded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_prehistory() {
        let err = Error::Prehistory {
            when: VirtualTime::from_nanos(1),
            history_start: VirtualTime::from_nanos(10),
        };
        let msg = err.to_string();
        assert!(msg.contains("precedes history start"));
    }

    #[test]
    fn test_error_display_resurrection() {
        let err = Error::Resurrection {
            object: ObjectId::new(),
            when: VirtualTime::from_nanos(30),
        };
        assert!(err.to_string().contains("destruction is forever"));
    }

    #[test]
    fn test_contention_classification() {
        let object = ObjectId::new();
        let when = VirtualTime::from_nanos(5);

        assert!(Error::DuplicateWrite { object, when }.is_contention());
        assert!(Error::OutOfOrderWrite {
            object,
            when,
            latest: VirtualTime::from_nanos(9),
        }
        .is_contention());
        assert!(Error::Aborted(AbortReason::Cascaded {
            cause: TransactionId::from_raw(3)
        })
        .is_contention());
        assert!(Error::Aborted(AbortReason::ReadInvalidated { object, when }).is_contention());

        assert!(!Error::Aborted(AbortReason::Resurrection { object, when }).is_contention());
        assert!(!Error::Aborted(AbortReason::Requested).is_contention());
        assert!(!Error::InvalidState("nope".into()).is_contention());
        assert!(!Error::Prehistory {
            when,
            history_start: VirtualTime::from_nanos(10),
        }
        .is_contention());
    }

    #[test]
    fn test_abort_reason_display_cascaded() {
        let reason = AbortReason::Cascaded {
            cause: TransactionId::from_raw(11),
        };
        assert!(reason.to_string().contains("txn-11"));
    }
}
