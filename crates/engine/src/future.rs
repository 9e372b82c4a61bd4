//! Completion handles for engine computations
//!
//! A [`StateComputation`] is the handle returned by
//! `SimulationEngine::compute_object_state`: a one-shot cell that resolves
//! with the committed state (or an error) once the universe covers the
//! requested (object, time) pair.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use worldline_core::{Error, Result, StateValue};

/// Shared completion state. Child computations (follow-ups for spawned
/// objects) get their own cell but share the cancellation flag, so
/// cancelling the requested computation stops the whole scheduling tree.
pub(crate) struct ComputationInner {
    state: Mutex<Option<Result<StateValue>>>,
    done: Condvar,
    cancelled: Arc<AtomicBool>,
}

impl ComputationInner {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(ComputationInner {
            state: Mutex::new(None),
            done: Condvar::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// A detached cell sharing this one's cancellation flag.
    pub(crate) fn child(&self) -> Arc<Self> {
        Arc::new(ComputationInner {
            state: Mutex::new(None),
            done: Condvar::new(),
            cancelled: Arc::clone(&self.cancelled),
        })
    }

    /// Resolve the cell. First completion wins; later ones are ignored.
    pub(crate) fn complete(&self, result: Result<StateValue>) {
        let mut state = self.state.lock();
        if state.is_none() {
            *state = Some(result);
            self.done.notify_all();
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.state.lock().is_some()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.complete(Err(Error::InvalidState(
            "computation cancelled".to_string(),
        )));
    }
}

/// Handle to an asynchronous state computation.
pub struct StateComputation {
    inner: Arc<ComputationInner>,
}

impl StateComputation {
    pub(crate) fn new(inner: Arc<ComputationInner>) -> Self {
        StateComputation { inner }
    }

    /// Block until the computation resolves, returning the committed state
    /// or the error that ended it.
    pub fn wait(&self) -> Result<StateValue> {
        let mut state = self.inner.state.lock();
        while state.is_none() {
            self.inner.done.wait(&mut state);
        }
        state.clone().expect("state is resolved")
    }

    /// The result, if already resolved.
    pub fn try_get(&self) -> Option<Result<StateValue>> {
        self.inner.state.lock().clone()
    }

    /// True once the computation has resolved.
    pub fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    /// Stop scheduling follow-up work for this computation and resolve the
    /// handle with an error if it is still pending. Transactions already
    /// submitted to the universe run to their own fate.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// True once `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}
