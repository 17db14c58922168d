//! mitosim-core: a stochastic simulation of chromosome segregation on a
//! one-dimensional mitotic spindle.
//!
//! A run is built once by `SimEngine::new` and stepped to completion.
//! Every step reads the previous `SimulationState` and produces the next
//! one; the `TrajectoryRecord` keeps them all.

pub mod attachment;
pub mod calibration;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod forces;
pub mod integrator;
pub mod pool;
pub mod progress;
pub mod rng;
pub mod snapshot;
pub mod store;
pub mod topology;
pub mod trajectory;
pub mod types;
