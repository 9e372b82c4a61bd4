//! The transaction handle
//!
//! A [`Transaction`] is one unit of work against a [`Universe`]: it reads
//! states (committed, provisional, or absent), stages writes at a single
//! write time, and then either commits or aborts atomically. The handle is
//! owned by its driving thread; the universe keeps the authoritative
//! coordination record and may resolve the transaction's fate from another
//! thread once commit has begun.
//!
//! # Lifecycle
//!
//! ```text
//! READING --begin_write--> WRITING --begin_commit--> COMMITTING
//!    |                        |                          |
//!    +------- begin_abort / close / conflict ------------+--> ABORTED
//!                                                        |
//!                                    (dependencies resolve)--> COMMITTED
//! ```
//!
//! `begin_commit` returns promptly even when dependencies are unresolved;
//! the transaction stays COMMITTING and the listener reports the eventual
//! outcome. Dropping a handle that never began commit aborts it.

use crate::graph::fire_notifications;
use crate::universe::Universe;
use std::collections::HashMap;
use std::sync::Arc;
use worldline_core::{
    AbortReason, ObjectId, Result, StateId, StateValue, StateWriter, VirtualTime,
};

/// Where a transaction stands in its lifecycle.
///
/// Terminal states (no transitions out):
/// - `Committed`
/// - `Aborted`
#[derive(Debug, Clone, PartialEq)]
pub enum Openness {
    /// Reading states; no write time declared yet
    Reading,
    /// Write time declared; staging writes
    Writing,
    /// Commit begun; waiting for dependencies to resolve
    Committing,
    /// Abort in progress
    Aborting,
    /// All staged writes are part of committed history
    Committed,
    /// The transaction was rolled back
    Aborted {
        /// Why the transaction aborted
        reason: AbortReason,
    },
}

impl Openness {
    /// True for `Committed` and `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Openness::Committed | Openness::Aborted { .. })
    }

    /// True while the transaction still accepts reads and writes.
    pub fn is_open(&self) -> bool {
        matches!(self, Openness::Reading | Openness::Writing)
    }
}

/// One unit of work against a universe.
///
/// Not `Clone`: a transaction is driven by one thread at a time. The
/// universe may still abort it from elsewhere (cascades, invalidation);
/// the handle observes that through [`Transaction::openness`].
pub struct Transaction {
    universe: Arc<Universe>,
    id: worldline_core::TransactionId,
    /// Read-your-own-view cache: repeated reads of the same (object, time)
    /// return the first observation even if the world has moved since.
    observed: HashMap<StateId, StateValue>,
    commit_begun: bool,
}

impl Transaction {
    pub(crate) fn new(universe: Arc<Universe>, id: worldline_core::TransactionId) -> Self {
        Transaction {
            universe,
            id,
            observed: HashMap::new(),
            commit_begun: false,
        }
    }

    /// This transaction's id.
    pub fn id(&self) -> worldline_core::TransactionId {
        self.id
    }

    /// The universe this transaction runs against.
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Where the transaction currently stands.
    pub fn openness(&self) -> Openness {
        self.universe.transaction_openness(self.id)
    }

    /// Observe the state of `object` at `when`.
    ///
    /// Resolution order: a prior read of the same (object, time) in this
    /// transaction; then committed history when it covers `when`; then the
    /// latest provisional value staged by any transaction (possibly this
    /// one); then "absent". A read beyond the object's committed watermark
    /// is recorded as past-the-end and stays subject to invalidation until
    /// the watermark reaches it.
    ///
    /// # Errors
    ///
    /// `Prehistory` when `when` precedes the universe's history start (the
    /// transaction aborts); `InvalidState` when the transaction is not
    /// open.
    pub fn read(&mut self, object: ObjectId, when: VirtualTime) -> Result<StateValue> {
        let key = StateId::new(object, when);
        if let Some(value) = self.observed.get(&key) {
            return Ok(value.clone());
        }
        let (result, notes) = self.universe.transaction_read(self.id, object, when);
        fire_notifications(notes);
        let value = result?;
        self.observed.insert(key, value.clone());
        Ok(value)
    }

    /// Declare the single time at which all of this transaction's writes
    /// land, moving READING to WRITING.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the transaction is READING, or if `when` is
    /// START.
    pub fn begin_write(&mut self, when: VirtualTime) -> Result<()> {
        self.universe.transaction_begin_write(self.id, when)
    }

    /// Stage a write of `object` at the declared write time. The staged
    /// value is immediately visible to other transactions' reads as a
    /// provisional value.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the transaction is WRITING.
    pub fn put(&mut self, object: ObjectId, value: StateValue) -> Result<()> {
        self.universe.transaction_put(self.id, object, value)
    }

    /// Begin committing, moving to COMMITTING.
    ///
    /// Returns promptly. If every dependency is already resolved the
    /// transaction reaches COMMITTED (or ABORTED) before this returns;
    /// otherwise it stays COMMITTING until the dependency graph resolves
    /// it. The listener reports the outcome either way.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the transaction is READING or WRITING.
    /// Validation failures are not errors here: they surface as the
    /// listener's `on_abort`.
    pub fn begin_commit(&mut self) -> Result<()> {
        self.commit_begun = true;
        let (result, notes) = self.universe.transaction_begin_commit(self.id);
        fire_notifications(notes);
        result
    }

    /// Force the transaction toward ABORTED, rolling back all staged
    /// writes and cascading to transactions that read them. No-op if the
    /// transaction is already terminal.
    pub fn begin_abort(&mut self) {
        let notes = self
            .universe
            .transaction_abort(self.id, AbortReason::Requested);
        fire_notifications(notes);
    }

    /// Close the transaction: behaves as `begin_abort` unless already
    /// terminal. Always safe to call, even on a COMMITTING transaction;
    /// closing one withdraws it.
    pub fn close(&mut self) {
        self.commit_begun = true;
        self.begin_abort();
    }
}

impl StateWriter for Transaction {
    fn read(&mut self, object: ObjectId, when: VirtualTime) -> Result<StateValue> {
        Transaction::read(self, object, when)
    }

    fn begin_write(&mut self, when: VirtualTime) -> Result<()> {
        Transaction::begin_write(self, when)
    }

    fn put(&mut self, object: ObjectId, value: StateValue) -> Result<()> {
        Transaction::put(self, object, value)
    }
}

impl Drop for Transaction {
    /// A handle dropped before `begin_commit` aborts its transaction; a
    /// handle dropped while COMMITTING leaves the pending commit to the
    /// coordinator graph.
    fn drop(&mut self) {
        if !self.commit_begun {
            let notes = self
                .universe
                .transaction_abort(self.id, AbortReason::Requested);
            fire_notifications(notes);
        }
    }
}
