//! Full-stack runs: the simulation engine driving a universe on both the
//! direct and the pooled executor.

mod common;

use common::t;
use std::sync::Arc;
use worldline::{
    DirectExecutor, Error, ObjectId, ObjectState, PoolExecutor, Result, SimulationEngine,
    StateValue, StateWriter, Universe, VirtualTime,
};

/// A state that counts up by one every `step` ticks.
#[derive(Debug, PartialEq)]
struct Counter {
    count: u64,
    step: u64,
}

impl Counter {
    fn value(count: u64, step: u64) -> StateValue {
        StateValue::present(Counter { count, step })
    }
}

impl ObjectState for Counter {
    fn state_eq(&self, other: &dyn ObjectState) -> bool {
        other
            .as_any()
            .downcast_ref::<Counter>()
            .is_some_and(|o| o == self)
    }

    fn compute_next(
        &self,
        txn: &mut dyn StateWriter,
        object: ObjectId,
        when: VirtualTime,
    ) -> Result<()> {
        txn.begin_write(when.advanced_by(self.step))?;
        txn.put(object, Counter::value(self.count + 1, self.step))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A state that forks a fresh counter every step.
#[derive(Debug, PartialEq)]
struct Forker {
    generation: u64,
}

impl ObjectState for Forker {
    fn state_eq(&self, other: &dyn ObjectState) -> bool {
        other
            .as_any()
            .downcast_ref::<Forker>()
            .is_some_and(|o| o == self)
    }

    fn compute_next(
        &self,
        txn: &mut dyn StateWriter,
        object: ObjectId,
        when: VirtualTime,
    ) -> Result<()> {
        txn.begin_write(when.advanced_by(20))?;
        txn.put(ObjectId::new(), Counter::value(0, 20))?;
        txn.put(
            object,
            StateValue::present(Forker {
                generation: self.generation + 1,
            }),
        )
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[test]
fn direct_executor_advances_to_requested_state() {
    let universe = Arc::new(Universe::new(t(1)));
    let object = ObjectId::new();
    universe
        .put_and_commit(object, t(10), Counter::value(0, 10))
        .unwrap();

    let engine = SimulationEngine::new(Arc::clone(&universe), Arc::new(DirectExecutor));
    let state = engine.compute_object_state(object, t(75)).wait().unwrap();
    assert_eq!(state, Counter::value(6, 10));
}

#[test]
fn pool_executor_advances_to_requested_state() {
    common::init_tracing();
    let universe = Arc::new(Universe::new(t(1)));
    let object = ObjectId::new();
    universe
        .put_and_commit(object, t(10), Counter::value(0, 10))
        .unwrap();

    let engine = SimulationEngine::new(Arc::clone(&universe), Arc::new(PoolExecutor::new(4)));
    let state = engine.compute_object_state(object, t(120)).wait().unwrap();
    assert_eq!(state, Counter::value(11, 10));
    assert!(universe.latest_commit(object) >= t(120));
}

#[test]
fn concurrent_requests_for_one_object_agree() {
    common::init_tracing();
    let universe = Arc::new(Universe::new(t(1)));
    let object = ObjectId::new();
    universe
        .put_and_commit(object, t(10), Counter::value(0, 10))
        .unwrap();

    let engine = Arc::new(SimulationEngine::new(
        Arc::clone(&universe),
        Arc::new(PoolExecutor::new(4)),
    ));

    // Several threads race to compute the same horizon. Identical staged
    // steps lose as duplicates and retry; every request must agree.
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.compute_object_state(object, t(95)).wait())
        })
        .collect();

    for handle in handles {
        let state = handle.join().unwrap().unwrap();
        assert_eq!(state, Counter::value(8, 10));
    }
    // At-most-one commit per cell: the step transitions are unique.
    let times = universe.transition_times(object);
    let mut deduped = times.clone();
    deduped.dedup();
    assert_eq!(times, deduped);
}

#[test]
fn spawned_objects_are_advanced_too() {
    let universe = Arc::new(Universe::new(t(1)));
    let forker = ObjectId::new();
    universe
        .put_and_commit(forker, t(10), StateValue::present(Forker { generation: 0 }))
        .unwrap();

    let engine = SimulationEngine::new(Arc::clone(&universe), Arc::new(DirectExecutor));
    engine.compute_object_state(forker, t(70)).wait().unwrap();

    // Forks happened at 30, 50, 70; each forked counter was driven toward
    // the same horizon.
    let spawned: Vec<ObjectId> = universe
        .object_ids()
        .into_iter()
        .filter(|id| *id != forker)
        .collect();
    assert!(!spawned.is_empty());
    for object in spawned {
        assert!(universe.latest_commit(object) >= t(70));
    }
}

/// A state that steps only after observing its partner object just before
/// its own instant.
#[derive(Debug, PartialEq)]
struct Coupled {
    partner: ObjectId,
    count: u64,
}

impl ObjectState for Coupled {
    fn state_eq(&self, other: &dyn ObjectState) -> bool {
        other
            .as_any()
            .downcast_ref::<Coupled>()
            .is_some_and(|o| o == self)
    }

    fn compute_next(
        &self,
        txn: &mut dyn StateWriter,
        object: ObjectId,
        when: VirtualTime,
    ) -> Result<()> {
        // Partner reads must be strictly before this state's own instant.
        txn.read(self.partner, VirtualTime::from_nanos(when.as_nanos() - 1))?;
        txn.begin_write(when.advanced_by(10))?;
        txn.put(
            object,
            StateValue::present(Coupled {
                partner: self.partner,
                count: self.count + 1,
            }),
        )
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[test]
fn coupled_objects_advance_in_lockstep() {
    let universe = Arc::new(Universe::new(t(1)));
    let a = ObjectId::new();
    let b = ObjectId::new();
    universe
        .put_and_commit(a, t(10), StateValue::present(Coupled { partner: b, count: 0 }))
        .unwrap();
    universe
        .put_and_commit(b, t(10), StateValue::present(Coupled { partner: a, count: 0 }))
        .unwrap();

    let engine = SimulationEngine::new(Arc::clone(&universe), Arc::new(DirectExecutor));

    // a's chain stalls on past-the-end reads of b; driving b unblocks it,
    // and each b commit pumps a's pending step in turn.
    let handle_a = engine.compute_object_state(a, t(50));
    let handle_b = engine.compute_object_state(b, t(50));

    let state_b = handle_b.wait().unwrap();
    let state_a = handle_a.wait().unwrap();
    assert_eq!(state_a, StateValue::present(Coupled { partner: b, count: 4 }));
    assert_eq!(state_b, StateValue::present(Coupled { partner: a, count: 4 }));
    assert!(universe.latest_commit(a) >= t(50));
    assert!(universe.latest_commit(b) >= t(50));
}

#[test]
fn prehistory_request_fails() {
    let universe = Arc::new(Universe::new(t(50)));
    let engine = SimulationEngine::new(universe, Arc::new(DirectExecutor));
    let result = engine.compute_object_state(ObjectId::new(), t(10)).wait();
    assert!(matches!(result, Err(Error::Prehistory { .. })));
}

#[test]
fn request_on_destroyed_object_resolves_absent() {
    let universe = Arc::new(Universe::new(t(1)));
    let object = ObjectId::new();
    universe
        .put_and_commit(object, t(10), Counter::value(0, 10))
        .unwrap();
    universe
        .put_and_commit(object, t(20), StateValue::Absent)
        .unwrap();

    let engine = SimulationEngine::new(Arc::clone(&universe), Arc::new(DirectExecutor));
    let state = engine.compute_object_state(object, t(500)).wait().unwrap();
    assert!(state.is_absent());
}
