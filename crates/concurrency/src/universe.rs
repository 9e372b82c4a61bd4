//! The universe: top-level store of object histories and transactions
//!
//! A [`Universe`] owns one registry entry per object (committed history,
//! watermark, provisional writes) plus the coordinator graph of live
//! transactions. Any number of threads may share a universe and drive
//! transactions concurrently.
//!
//! # Lock discipline
//!
//! Two tiers: the coordinator-graph mutex, then per-object entry mutexes,
//! acquired one at a time and only ever under (or without) the graph lock.
//! Listener callbacks fire strictly after every lock is released.

use crate::entry::ObjectEntry;
use crate::graph::{Graph, TxnRecord};
use crate::transaction::Transaction;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use worldline_core::{
    AbortReason, Error, ObjectId, Result, StateValue, TransactionId, TransactionListener,
    ValueHistory, VirtualTime,
};

/// Top-level store: history-start watermark, per-object registries, and
/// the live-transaction bookkeeping.
pub struct Universe {
    /// Per-object registry entries.
    pub(crate) objects: DashMap<ObjectId, Arc<ObjectEntry>>,
    /// The coordinator graph (outer lock tier).
    pub(crate) graph: Mutex<Graph>,
    /// No reads strictly before this time are allowed. Monotone; stored as
    /// raw ticks so advancement is a single `fetch_max`.
    history_start: AtomicU64,
    /// Next transaction number.
    next_txn_id: AtomicU64,
    // Metric counters use Relaxed ordering: they are observational only,
    // synchronize nothing, and approximate counts are acceptable.
    pub(crate) txns_started: AtomicU64,
    pub(crate) txns_committed: AtomicU64,
    pub(crate) txns_aborted: AtomicU64,
}

impl Universe {
    /// Create a universe whose history starts at `history_start`.
    pub fn new(history_start: VirtualTime) -> Self {
        Universe {
            objects: DashMap::new(),
            graph: Mutex::new(Graph::new()),
            history_start: AtomicU64::new(history_start.as_nanos()),
            next_txn_id: AtomicU64::new(0),
            txns_started: AtomicU64::new(0),
            txns_committed: AtomicU64::new(0),
            txns_aborted: AtomicU64::new(0),
        }
    }

    /// Get or create the registry entry for `object`.
    pub(crate) fn entry(&self, object: ObjectId) -> Arc<ObjectEntry> {
        self.objects.entry(object).or_default().clone()
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Open a new READING transaction whose fate is reported to `listener`.
    pub fn begin_transaction(
        self: &Arc<Self>,
        listener: Box<dyn TransactionListener>,
    ) -> Transaction {
        let id = TransactionId::from_raw(
            self.next_txn_id
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(1))
                .expect("transaction ID overflow: u64::MAX reached")
                + 1,
        );
        {
            let mut graph = self.graph.lock();
            let coordinator = graph.new_coordinator_for(id);
            graph.txns.insert(id, TxnRecord::new(coordinator, listener));
        }
        self.txns_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "worldline::txn", txn = %id, "transaction started");
        Transaction::new(Arc::clone(self), id)
    }

    /// Seed history: write `value` for `object` at `when` in a single-write
    /// transaction and commit it synchronously.
    ///
    /// # Errors
    ///
    /// `OutOfOrderWrite` when `when` is not strictly after every existing
    /// transition for the object; other abort causes surface as
    /// `Error::Aborted`.
    pub fn put_and_commit(
        self: &Arc<Self>,
        object: ObjectId,
        when: VirtualTime,
        value: StateValue,
    ) -> Result<()> {
        let fate = Arc::new(Fate::default());
        let mut txn = self.begin_transaction(Box::new(FateListener(Arc::clone(&fate))));
        txn.begin_write(when)?;
        txn.put(object, value)?;
        txn.begin_commit()?;
        if fate.committed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let taken = fate.reason.lock().take();
        match taken {
            Some(AbortReason::OutOfOrderWrite { object, when }) => Err(Error::OutOfOrderWrite {
                object,
                when,
                latest: self.latest_commit(object),
            }),
            Some(reason) => Err(Error::Aborted(reason)),
            // A single blind write has no dependencies; its commit resolves
            // before begin_commit returns.
            None => Err(Error::InvalidState(
                "seed commit did not resolve synchronously".to_string(),
            )),
        }
    }

    // =========================================================================
    // Committed-state queries
    // =========================================================================

    /// The committed value of `object` at `when`, or "absent". A
    /// convenience read outside any transaction; creates nothing.
    ///
    /// # Errors
    ///
    /// `Prehistory` when `when` precedes the history start.
    pub fn object_state(&self, object: ObjectId, when: VirtualTime) -> Result<StateValue> {
        let history_start = self.history_start();
        if when < history_start {
            return Err(Error::Prehistory {
                when,
                history_start,
            });
        }
        Ok(match self.objects.get(&object) {
            Some(entry) => entry.state.lock().history.get(when).clone(),
            None => StateValue::Absent,
        })
    }

    /// The largest time up to which `object`'s history is known committed:
    /// START when nothing has committed, END once the object is destroyed.
    pub fn latest_commit(&self, object: ObjectId) -> VirtualTime {
        match self.objects.get(&object) {
            Some(entry) => entry.state.lock().latest_commit,
            None => VirtualTime::START,
        }
    }

    /// The committed transition times of `object`, ascending.
    pub fn transition_times(&self, object: ObjectId) -> Vec<VirtualTime> {
        match self.objects.get(&object) {
            Some(entry) => entry.state.lock().history.transition_times(),
            None => Vec::new(),
        }
    }

    /// A snapshot of `object`'s committed history, if the object is known.
    pub fn committed_history(&self, object: ObjectId) -> Option<ValueHistory<StateValue>> {
        self.objects
            .get(&object)
            .map(|entry| entry.state.lock().history.clone())
    }

    /// Ids of every object the universe has an entry for.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.iter().map(|entry| *entry.key()).collect()
    }

    // =========================================================================
    // History start
    // =========================================================================

    /// The time before which no read is allowed.
    pub fn history_start(&self) -> VirtualTime {
        VirtualTime::from_nanos(self.history_start.load(Ordering::SeqCst))
    }

    /// Advance the history start to `when`, discarding committed
    /// transitions that fall entirely before it. Monotone: an earlier (or
    /// equal) value is ignored. The advance is clamped so that no open
    /// transaction's earliest read falls into prehistory.
    pub fn set_history_start(&self, when: VirtualTime) {
        let graph = self.graph.lock();
        let mut effective = when;
        for rec in graph.txns.values() {
            if rec.is_live() {
                if let Some(earliest) = rec.min_read {
                    effective = effective.min(earliest);
                }
            }
        }
        let previous = self
            .history_start
            .fetch_max(effective.as_nanos(), Ordering::SeqCst);
        if effective.as_nanos() <= previous {
            return;
        }
        tracing::debug!(
            target: "worldline::universe",
            history_start = %effective,
            "history start advanced"
        );
        for entry in self.objects.iter() {
            entry
                .value()
                .state
                .lock()
                .history
                .retire_transitions_before(effective);
        }
    }

    // =========================================================================
    // Metrics
    // =========================================================================

    /// Number of live (non-terminal) transactions.
    pub fn open_transaction_count(&self) -> usize {
        self.graph
            .lock()
            .txns
            .values()
            .filter(|rec| rec.is_live())
            .count()
    }

    /// Number of live coordinators (one per independent transaction group).
    pub fn live_coordinator_count(&self) -> usize {
        self.graph.lock().coordinators.len()
    }

    /// Total transactions ever started.
    pub fn transactions_started(&self) -> u64 {
        self.txns_started.load(Ordering::Relaxed)
    }

    /// Total transactions committed.
    pub fn transactions_committed(&self) -> u64 {
        self.txns_committed.load(Ordering::Relaxed)
    }

    /// Total transactions aborted.
    pub fn transactions_aborted(&self) -> u64 {
        self.txns_aborted.load(Ordering::Relaxed)
    }
}

impl Default for Universe {
    fn default() -> Self {
        Universe::new(VirtualTime::START)
    }
}

/// Synchronous outcome capture for `put_and_commit`.
#[derive(Default)]
struct Fate {
    committed: AtomicBool,
    reason: Mutex<Option<AbortReason>>,
}

struct FateListener(Arc<Fate>);

impl TransactionListener for FateListener {
    fn on_commit(&self) {
        self.0.committed.store(true, Ordering::SeqCst);
    }

    fn on_abort(&self, reason: &AbortReason) {
        *self.0.reason.lock() = Some(reason.clone());
    }
}
