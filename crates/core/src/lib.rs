//! Core types and traits for worldline
//!
//! This crate defines the foundational vocabulary used throughout the
//! engine:
//! - VirtualTime: the simulation timeline, with START and END sentinels
//! - ObjectId / TransactionId / StateId: identifiers
//! - ValueHistory / SetHistory: time-indexed step functions
//! - ObjectState / StateWriter / TransactionListener: the trait seams to
//!   domain code
//! - Error / AbortReason: the error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod history;
pub mod set_history;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{AbortReason, Error, Result};
pub use history::ValueHistory;
pub use set_history::SetHistory;
pub use time::VirtualTime;
pub use traits::{
    NoopListener, ObjectState, StateRef, StateValue, StateWriter, TransactionListener,
};
pub use types::{ObjectId, StateId, TransactionId};
