//! The simulation driver
//!
//! [`SimulationEngine`] turns a request "the state of object O at time T"
//! into the transactions that advance the universe until the request is
//! covered by committed history: each step opens a transaction, reads the
//! object's latest committed state, asks it to compute its successor, and
//! commits. Follow-up steps (for the same object while it is short of the
//! horizon, and for any objects a step spawned) are submitted to the
//! engine's executor from the transaction listener.
//!
//! Contention aborts (another transaction advanced the same object first)
//! are retried; semantic failures resolve the computation with the error.

use crate::executor::{Executor, Task};
use crate::future::{ComputationInner, StateComputation};
use parking_lot::Mutex;
use std::sync::Arc;
use worldline_concurrency::Universe;
use worldline_core::{
    AbortReason, Error, ObjectId, StateValue, TransactionListener, VirtualTime,
};

/// Driver that computes committed object states on demand.
pub struct SimulationEngine {
    universe: Arc<Universe>,
    executor: Arc<dyn Executor>,
}

impl SimulationEngine {
    /// Create an engine over `universe`, scheduling its work on `executor`.
    pub fn new(universe: Arc<Universe>, executor: Arc<dyn Executor>) -> Self {
        SimulationEngine { universe, executor }
    }

    /// The universe this engine drives.
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Compute the committed state of `object` at `when`.
    ///
    /// Resolves once committed history covers the request: immediately if
    /// it already does, otherwise after the engine has advanced the object
    /// (and anything it spawns) step by step up to the horizon. An object
    /// with no committed state and nothing to advance resolves "absent".
    pub fn compute_object_state(&self, object: ObjectId, when: VirtualTime) -> StateComputation {
        let inner = ComputationInner::new();
        let history_start = self.universe.history_start();
        if when < history_start {
            inner.complete(Err(Error::Prehistory {
                when,
                history_start,
            }));
            return StateComputation::new(inner);
        }
        tracing::debug!(target: "worldline::engine", %object, %when, "state requested");
        self.executor.execute(step_task(
            Arc::clone(&self.universe),
            Arc::clone(&self.executor),
            object,
            when,
            Arc::clone(&inner),
        ));
        StateComputation::new(inner)
    }
}

/// Package one advancing step as an executor task.
fn step_task(
    universe: Arc<Universe>,
    executor: Arc<dyn Executor>,
    object: ObjectId,
    when: VirtualTime,
    inner: Arc<ComputationInner>,
) -> Task {
    Box::new(move || run_step(universe, executor, object, when, inner))
}

/// Advance `object` by one transaction, or resolve the computation if the
/// committed history already covers `when`.
fn run_step(
    universe: Arc<Universe>,
    executor: Arc<dyn Executor>,
    object: ObjectId,
    when: VirtualTime,
    inner: Arc<ComputationInner>,
) {
    if inner.is_cancelled() || inner.is_done() {
        return;
    }
    if universe.latest_commit(object) >= when {
        inner.complete(universe.object_state(object, when));
        return;
    }
    let t0 = universe.latest_commit(object);
    let current = universe
        .object_state(object, t0)
        .unwrap_or(StateValue::Absent);
    let state = match current {
        StateValue::Present(state) => state,
        StateValue::Absent => {
            // No committed state and nothing to advance: the object never
            // existed on the requested timeline.
            inner.complete(Ok(StateValue::Absent));
            return;
        }
    };

    let listener = StepListener {
        universe: Arc::clone(&universe),
        executor: Arc::clone(&executor),
        object,
        when,
        inner: Arc::clone(&inner),
        created: Mutex::new(Vec::new()),
    };
    let mut txn = universe.begin_transaction(Box::new(listener));
    if let Err(error) = state.compute_next(&mut txn, object, t0) {
        txn.begin_abort();
        inner.complete(Err(error));
        return;
    }
    if let Err(error) = txn.begin_commit() {
        inner.complete(Err(error));
    }
    // The handle drops here; a commit pending on other transactions stays
    // with the coordinator graph and reports through the listener.
}

/// Listener on one advancing step: schedules the follow-up work its
/// transaction's outcome calls for.
struct StepListener {
    universe: Arc<Universe>,
    executor: Arc<dyn Executor>,
    object: ObjectId,
    when: VirtualTime,
    inner: Arc<ComputationInner>,
    created: Mutex<Vec<ObjectId>>,
}

impl TransactionListener for StepListener {
    fn on_create(&self, object: ObjectId) {
        self.created.lock().push(object);
    }

    fn on_commit(&self) {
        if self.inner.is_cancelled() {
            return;
        }
        // Spawned objects advance toward the same horizon on detached
        // completion cells; only the requested object resolves this one.
        let spawned: Vec<ObjectId> = self.created.lock().drain(..).collect();
        for object in spawned {
            if object == self.object {
                continue;
            }
            self.executor.execute(step_task(
                Arc::clone(&self.universe),
                Arc::clone(&self.executor),
                object,
                self.when,
                self.inner.child(),
            ));
        }
        self.executor.execute(step_task(
            Arc::clone(&self.universe),
            Arc::clone(&self.executor),
            self.object,
            self.when,
            Arc::clone(&self.inner),
        ));
    }

    fn on_abort(&self, reason: &AbortReason) {
        if self.inner.is_cancelled() {
            return;
        }
        if reason.is_contention() {
            tracing::debug!(
                target: "worldline::engine",
                object = %self.object,
                %reason,
                "step lost a race; retrying"
            );
            self.executor.execute(step_task(
                Arc::clone(&self.universe),
                Arc::clone(&self.executor),
                self.object,
                self.when,
                Arc::clone(&self.inner),
            ));
        } else {
            self.inner.complete(Err(Error::Aborted(reason.clone())));
        }
    }
}
