//! Per-object registry entries
//!
//! Each simulated object owns one [`ObjectEntry`] inside the universe's
//! object map. The entry carries the object's committed value history, the
//! watermark up to which that history is known committed, the provisional
//! writes staged by open transactions, and the ids of transactions that
//! have read some state of the object.
//!
//! Provisional writes live here, not in the staging transaction, so that
//! they are visible to other transactions' reads the moment they are
//! staged, and so that whichever thread drives an abort can roll them back.
//!
//! Lock tier: the entry mutex is the innermost lock. It is only ever
//! acquired after (or without) the universe's coordinator-graph lock,
//! never before it.

use parking_lot::Mutex;
use worldline_core::{StateValue, TransactionId, ValueHistory, VirtualTime};
use std::collections::{BTreeMap, HashSet};

/// One provisional (staged, uncommitted) write.
#[derive(Debug, Clone)]
pub(crate) struct ProvisionalWrite {
    /// The transaction that staged the write
    pub txn: TransactionId,
    /// The staged value
    pub value: StateValue,
}

/// The mutable state of one object entry.
pub(crate) struct EntryState {
    /// Committed history; absent at START by convention
    pub history: ValueHistory<StateValue>,
    /// Largest time up to which `history` is known committed.
    ///
    /// START when nothing has committed, END once the object is destroyed.
    pub latest_commit: VirtualTime,
    /// Staged writes by open transactions, keyed by write time.
    ///
    /// Several transactions may stage writes at the same time; they stay
    /// side by side until commit tie-breaking settles who wins.
    pub staged: BTreeMap<VirtualTime, Vec<ProvisionalWrite>>,
    /// Open transactions that have read some state of this object
    pub readers: HashSet<TransactionId>,
}

impl EntryState {
    fn new() -> Self {
        EntryState {
            history: ValueHistory::new(StateValue::Absent),
            latest_commit: VirtualTime::START,
            staged: BTreeMap::new(),
            readers: HashSet::new(),
        }
    }

    /// The most recently staged write at or before `when`, if any.
    ///
    /// When several writes share the latest time, the most recently staged
    /// one wins the read.
    pub fn provisional_at_or_before(&self, when: VirtualTime) -> Option<&ProvisionalWrite> {
        self.staged
            .range(..=when)
            .next_back()
            .and_then(|(_, writes)| writes.last())
    }

    /// Stage a write, replacing any earlier write by the same transaction
    /// at the same time.
    pub fn stage(&mut self, txn: TransactionId, when: VirtualTime, value: StateValue) {
        let writes = self.staged.entry(when).or_default();
        if let Some(existing) = writes.iter_mut().find(|w| w.txn == txn) {
            existing.value = value;
        } else {
            writes.push(ProvisionalWrite { txn, value });
        }
    }

    /// Remove every staged write by `txn`.
    pub fn unstage(&mut self, txn: TransactionId) {
        self.staged.retain(|_, writes| {
            writes.retain(|w| w.txn != txn);
            !writes.is_empty()
        });
    }

    /// Ids of transactions with staged writes on this object, in staging
    /// order within each time slot.
    pub fn staged_writers(&self) -> Vec<TransactionId> {
        self.staged
            .values()
            .flat_map(|writes| writes.iter().map(|w| w.txn))
            .collect()
    }
}

/// A per-object registry entry: committed history, watermark, provisional
/// writes, and reader registration, behind the entry lock.
pub(crate) struct ObjectEntry {
    pub state: Mutex<EntryState>,
}

impl Default for ObjectEntry {
    fn default() -> Self {
        ObjectEntry {
            state: Mutex::new(EntryState::new()),
        }
    }
}
