//! # Worldline
//!
//! A discrete-event simulation engine with optimistic transactional state.
//!
//! Many simulated objects evolve independently in a shared virtual
//! timeline. Each object's history is a time-indexed step function, and
//! every change goes through a transaction that may optimistically read
//! uncommitted or not-yet-existing future state. Conflicts cascade into
//! aborts with full rollback; transactions that become mutually dependent
//! merge into coordinator groups that commit or abort together.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use worldline::{
//!     DirectExecutor, ObjectId, SimulationEngine, StateValue, Universe, VirtualTime,
//! };
//!
//! # #[derive(Debug, PartialEq)] struct Probe;
//! # impl worldline::ObjectState for Probe {
//! #     fn state_eq(&self, other: &dyn worldline::ObjectState) -> bool {
//! #         other.as_any().downcast_ref::<Probe>().is_some()
//! #     }
//! #     fn compute_next(&self, txn: &mut dyn worldline::StateWriter, object: ObjectId, when: VirtualTime) -> worldline::Result<()> {
//! #         txn.begin_write(when.advanced_by(10))?;
//! #         txn.put(object, StateValue::present(Probe))
//! #     }
//! #     fn as_any(&self) -> &dyn std::any::Any { self }
//! # }
//! fn main() -> worldline::Result<()> {
//!     let universe = Arc::new(Universe::new(VirtualTime::from_nanos(1)));
//!     let probe = ObjectId::new();
//!
//!     // Seed committed history.
//!     universe.put_and_commit(probe, VirtualTime::from_nanos(10), StateValue::present(Probe))?;
//!
//!     // Ask the engine for a future state; it advances the universe.
//!     let engine = SimulationEngine::new(Arc::clone(&universe), Arc::new(DirectExecutor));
//!     let state = engine
//!         .compute_object_state(probe, VirtualTime::from_nanos(95))
//!         .wait()?;
//!     assert!(state.is_present());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Crate | Responsibility |
//! |-------|----------------|
//! | `worldline-core` | virtual time, identifiers, value histories, trait seams, errors |
//! | `worldline-concurrency` | the universe, transactions, coordinator groups |
//! | `worldline-engine` | the simulation driver and its executors |
//!
//! The [`Universe`] is the shared store; any number of threads may drive
//! transactions against it concurrently. The [`SimulationEngine`] is a
//! driver on top: it owns no state of its own and schedules all work on
//! the executor it was built with.

pub use worldline_concurrency::{Openness, Transaction, Universe};
pub use worldline_core::{
    AbortReason, Error, NoopListener, ObjectId, ObjectState, Result, SetHistory, StateId,
    StateRef, StateValue, StateWriter, TransactionId, TransactionListener, ValueHistory,
    VirtualTime,
};
pub use worldline_engine::{
    DirectExecutor, Executor, PoolExecutor, SimulationEngine, StateComputation, Task,
};
