//! Core trait seams between the universe and its collaborators
//!
//! The engine never interprets object states; it only stores them, compares
//! them for equality, and asks them to compute their successors. That
//! capability set is the [`ObjectState`] trait. The transaction surface a
//! state may use while computing its successor is the [`StateWriter`] trait,
//! implemented by the concurrency layer's transaction type; keeping the
//! seam here lets domain crates depend on `worldline-core` alone.

use crate::error::{AbortReason, Result};
use crate::time::VirtualTime;
use crate::types::ObjectId;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The transaction operations available to [`ObjectState::compute_next`].
///
/// Reads observe committed, provisional, or absent values; `begin_write`
/// fixes the single time at which all of this transaction's writes land;
/// `put` stages one write per object at that time.
pub trait StateWriter {
    /// Observe the state of `object` at `when`.
    fn read(&mut self, object: ObjectId, when: VirtualTime) -> Result<StateValue>;

    /// Declare the write time and move the transaction into its writing
    /// phase. Must be called exactly once, before any `put`.
    fn begin_write(&mut self, when: VirtualTime) -> Result<()>;

    /// Stage a write of `object` at the declared write time.
    fn put(&mut self, object: ObjectId, value: StateValue) -> Result<()>;
}

/// A domain-defined object state.
///
/// Implementations are opaque values: the engine needs equality (to
/// suppress transitions that change nothing) and `compute_next` (to advance
/// the simulation). Anything else is the domain's business.
///
/// # The `compute_next` contract
///
/// Called with the transaction that must carry all resulting reads and
/// writes, the id of the object this state belongs to, and the virtual
/// time `when` at which this state holds. The implementation must:
/// - call `begin_write(w)` exactly once, with `w > when`;
/// - `put` a successor state for `object` (and may `put` first states for
///   objects it spawns, under ids it chooses);
/// - perform reads only at times `<= when`, and for objects other than
///   `object`, strictly `< when`.
pub trait ObjectState: fmt::Debug + Send + Sync {
    /// Value equality with another state.
    ///
    /// Used to suppress no-op transitions; implementations usually downcast
    /// via [`ObjectState::as_any`] and compare fields.
    fn state_eq(&self, other: &dyn ObjectState) -> bool;

    /// Compute and stage this object's next state inside `txn`.
    fn compute_next(
        &self,
        txn: &mut dyn StateWriter,
        object: ObjectId,
        when: VirtualTime,
    ) -> Result<()>;

    /// Self as `Any`, for downcasting in `state_eq` implementations.
    fn as_any(&self) -> &dyn Any;
}

/// A shared handle to a domain state.
pub type StateRef = Arc<dyn ObjectState>;

/// The value of one cell of the universe: a domain state, or the absence of
/// one.
///
/// `Absent` is a legitimate value distinct from every present state. An
/// object that has never been written is absent, and an object that has
/// been destroyed is absent from its destruction time onward.
#[derive(Debug, Clone, Default)]
pub enum StateValue {
    /// The object does not exist at this time
    #[default]
    Absent,
    /// The object exists and carries this state
    Present(StateRef),
}

impl StateValue {
    /// Wrap a domain state.
    pub fn present<S: ObjectState + 'static>(state: S) -> Self {
        StateValue::Present(Arc::new(state))
    }

    /// True for `Absent`.
    pub fn is_absent(&self) -> bool {
        matches!(self, StateValue::Absent)
    }

    /// True for `Present`.
    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    /// The carried state, if present.
    pub fn as_state(&self) -> Option<&StateRef> {
        match self {
            StateValue::Absent => None,
            StateValue::Present(state) => Some(state),
        }
    }
}

impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StateValue::Absent, StateValue::Absent) => true,
            (StateValue::Present(a), StateValue::Present(b)) => a.state_eq(b.as_ref()),
            _ => false,
        }
    }
}

impl<S: ObjectState + 'static> From<S> for StateValue {
    fn from(state: S) -> Self {
        StateValue::present(state)
    }
}

/// Observer of one transaction's fate.
///
/// Exactly one of `on_commit` / `on_abort` fires, at most once, strictly
/// after the engine has released its internal locks. `on_create` fires
/// before `on_commit`, once per object whose first-ever state this
/// transaction committed.
pub trait TransactionListener: Send + Sync {
    /// A previously unknown object received its first committed state.
    fn on_create(&self, _object: ObjectId) {}

    /// The transaction committed; its writes are part of history.
    fn on_commit(&self) {}

    /// The transaction aborted; its writes were rolled back.
    fn on_abort(&self, _reason: &AbortReason) {}
}

/// A listener that ignores every callback.
pub struct NoopListener;

impl TransactionListener for NoopListener {}
