//! Simulation driver for worldline
//!
//! This crate turns state requests into universe transactions:
//! - SimulationEngine: computes "the state of object O at time T" by
//!   advancing the universe step by step until committed history covers
//!   the request
//! - Executor / DirectExecutor / PoolExecutor: where the engine's work
//!   units run
//! - StateComputation: the completion handle a request returns

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod executor;
pub mod future;
pub mod simulation;

pub use executor::{DirectExecutor, Executor, PoolExecutor, Task};
pub use future::StateComputation;
pub use simulation::SimulationEngine;
