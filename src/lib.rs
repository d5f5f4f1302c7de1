//! Cycle-accurate simulator of a four-core shared-memory multiprocessor
//! with private L1 caches kept coherent by a MESI write-back/write-allocate
//! protocol over a single, serially-arbitrated snooping bus.
//!
//! Per-core memory-reference traces drive the system; the simulator
//! reproduces the cycle-by-cycle behaviour of the caches and the bus and
//! reports per-core and aggregate counters. The whole machine is
//! single-threaded and deterministic: identical traces and parameters
//! produce bit-identical output.

pub mod bus;
pub mod cache;
pub mod commons;
pub mod error;
pub mod report;
pub mod simulator;
pub mod stats;
pub mod trace;

pub use commons::{BusOp, BusRequest, Geometry, MemRef, MesiState, NUM_CORES};
pub use error::SimError;
pub use report::Report;
pub use simulator::Simulator;
