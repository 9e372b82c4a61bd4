//! Multi-threaded universe tests: parallel seeding, contended appends,
//! and reader/writer races.

use rand::Rng;
use std::any::Any;
use std::sync::Arc;
use worldline_concurrency::Universe;
use worldline_core::{
    Error, NoopListener, ObjectId, ObjectState, Result, StateValue, StateWriter, VirtualTime,
};

#[derive(Debug, PartialEq)]
struct Payload(u64);

impl ObjectState for Payload {
    fn state_eq(&self, other: &dyn ObjectState) -> bool {
        other
            .as_any()
            .downcast_ref::<Payload>()
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

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn t(n: u64) -> VirtualTime {
    VirtualTime::from_nanos(n)
}

fn payload(k: u64) -> StateValue {
    StateValue::present(Payload(k))
}

#[test]
fn parallel_seeding_of_distinct_objects() {
    let universe = Arc::new(Universe::new(t(1)));
    let num_threads = 8;

    let handles: Vec<_> = (0..num_threads)
        .map(|index| {
            let universe = Arc::clone(&universe);
            std::thread::spawn(move || {
                let object = ObjectId::new();
                for step in 1..=20u64 {
                    universe
                        .put_and_commit(object, t(step * 10), payload(index * 1000 + step))
                        .unwrap();
                }
                object
            })
        })
        .collect();

    let objects: Vec<ObjectId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for object in objects {
        assert_eq!(universe.latest_commit(object), t(200));
        assert_eq!(universe.transition_times(object).len(), 20);
    }
    assert_eq!(universe.open_transaction_count(), 0);
}

#[test]
fn contended_appends_serialize_on_one_object() {
    let universe = Arc::new(Universe::new(t(1)));
    let object = ObjectId::new();
    universe.put_and_commit(object, t(1), payload(0)).unwrap();
    let num_threads: u64 = 4;
    let appends_per_thread: u64 = 25;

    let handles: Vec<_> = (0..num_threads)
        .map(|index| {
            let universe = Arc::clone(&universe);
            std::thread::spawn(move || {
                let mut rng = rand::thread_rng();
                let mut appended = 0;
                while appended < appends_per_thread {
                    // Jitter the claimed slot so threads collide on some
                    // attempts and interleave on others.
                    let next = universe
                        .latest_commit(object)
                        .advanced_by(rng.gen_range(1..=3));
                    let value = payload(1 + index * appends_per_thread + appended);
                    match universe.put_and_commit(object, next, value) {
                        Ok(()) => appended += 1,
                        // Another thread claimed the slot first; try again.
                        Err(error) => assert!(error.is_contention(), "unexpected: {error}"),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Every value was unique, so every successful append installed exactly
    // one transition; times are strictly increasing by construction.
    let times = universe.transition_times(object);
    assert_eq!(times.len() as u64, 1 + num_threads * appends_per_thread);
    assert!(times.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(universe.latest_commit(object), *times.last().unwrap());
}

#[test]
fn readers_race_writers_without_tearing() {
    let universe = Arc::new(Universe::new(t(1)));
    let object = ObjectId::new();
    universe.put_and_commit(object, t(1), payload(0)).unwrap();

    let writer = {
        let universe = Arc::clone(&universe);
        std::thread::spawn(move || {
            for step in 1..=50u64 {
                universe
                    .put_and_commit(object, t(1 + step), payload(step))
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let universe = Arc::clone(&universe);
            std::thread::spawn(move || {
                let mut last_watermark = VirtualTime::START;
                for _ in 0..200 {
                    let watermark = universe.latest_commit(object);
                    // Commit monotonicity, observed live.
                    assert!(watermark >= last_watermark);
                    last_watermark = watermark;
                    let value = universe.object_state(object, watermark).unwrap();
                    assert!(value.is_present());
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(universe.latest_commit(object), t(51));
}

#[test]
fn transactions_from_many_threads_leave_no_residue() {
    let universe = Arc::new(Universe::new(t(1)));
    let object = ObjectId::new();
    universe.put_and_commit(object, t(5), payload(1)).unwrap();

    let handles: Vec<_> = (0..6)
        .map(|index| {
            let universe = Arc::clone(&universe);
            std::thread::spawn(move || {
                for round in 0..20u64 {
                    let mut txn = universe.begin_transaction(Box::new(NoopListener));
                    match txn.read(object, t(5)) {
                        Ok(value) => assert!(value.is_present()),
                        Err(error) => {
                            assert!(matches!(error, Error::InvalidState(_)));
                            continue;
                        }
                    }
                    if (index + round) % 2 == 0 {
                        txn.begin_abort();
                    }
                    // Otherwise dropped: a handle that never began commit
                    // aborts on drop.
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(universe.open_transaction_count(), 0);
    assert_eq!(universe.live_coordinator_count(), 0);
    // Committed state untouched by the churn.
    assert_eq!(universe.transition_times(object), vec![t(5)]);
}
