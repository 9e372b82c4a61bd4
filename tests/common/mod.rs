//! Shared helpers for the end-to-end suites.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use worldline::{
    AbortReason, ObjectId, ObjectState, Result, StateValue, StateWriter, TransactionListener,
    VirtualTime,
};

pub fn t(n: u64) -> VirtualTime {
    VirtualTime::from_nanos(n)
}

/// Route engine tracing into the test harness; repeated calls are fine.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// An opaque keyed state; `s(k)` builds the state with key `k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestState(pub u64);

impl ObjectState for TestState {
    fn state_eq(&self, other: &dyn ObjectState) -> bool {
        other
            .as_any()
            .downcast_ref::<TestState>()
            .is_some_and(|o| o == self)
    }

    fn compute_next(
        &self,
        _txn: &mut dyn StateWriter,
        _object: ObjectId,
        _when: VirtualTime,
    ) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn s(k: u64) -> StateValue {
    StateValue::present(TestState(k))
}

/// Records a transaction's fate for assertions.
#[derive(Default)]
pub struct Probe {
    committed: AtomicBool,
    reason: Mutex<Option<AbortReason>>,
    created: Mutex<Vec<ObjectId>>,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Probe::default())
    }

    pub fn listener(self: &Arc<Self>) -> Box<dyn TransactionListener> {
        Box::new(ProbeListener(Arc::clone(self)))
    }

    pub fn is_committed(&self) -> bool {
        self.committed.load(Ordering::SeqCst)
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.reason.lock().unwrap().clone()
    }

    pub fn is_pending(&self) -> bool {
        !self.is_committed() && self.abort_reason().is_none()
    }

    pub fn created(&self) -> Vec<ObjectId> {
        self.created.lock().unwrap().clone()
    }
}

struct ProbeListener(Arc<Probe>);

impl TransactionListener for ProbeListener {
    fn on_create(&self, object: ObjectId) {
        self.0.created.lock().unwrap().push(object);
    }

    fn on_commit(&self) {
        self.0.committed.store(true, Ordering::SeqCst);
    }

    fn on_abort(&self, reason: &AbortReason) {
        *self.0.reason.lock().unwrap() = Some(reason.clone());
    }
}
