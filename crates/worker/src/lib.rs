//! Worker threads that drive one simulation core each, and the barrier group
//! that lets the owning thread join them.
//!
//! # Invariants
//! - A tile never runs concurrently with itself: each worker has a
//!   single-slot go signal and one thread.
//! - `running` is incremented when a pass is requested and decremented when
//!   it finishes or is cancelled; a join that starts after a request cannot
//!   return before that pass is done.
//! - `living` reaches zero only after every worker thread has left its run
//!   loop.
//! - Readers only ever see complete frames.

mod barrier;
mod clock;
mod worker;

pub use barrier::BarrierGroup;
pub use clock::{Clock, ManualClock, Stopwatch};
pub use worker::{FrameSlot, PassTiming, SimulationWorker, WorkerError, WorkerState};

pub fn crate_info() -> &'static str {
    "tilesim-worker v0.1.0"
}
