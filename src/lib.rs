//! Event-driven elastic-collision simulator for hard discs in two adjoining
//! chambers connected by an opening ("channel") in their shared wall.
//!
//! Instead of stepping time in fixed increments, the engine computes the
//! exact time of the next physical event — a disc-disc collision, a wall
//! bounce, a pass through the opening, or a clip against an opening corner —
//! jumps straight to it, resolves it, and re-predicts for the particles it
//! touched. Predictions made obsolete by an earlier collision are recognized
//! lazily: every scheduled event carries a snapshot of its participants'
//! collision counts and is discarded at pop time if any of them has moved on.
//!
//! ```
//! use chambersim::{Geometry, MemorySink, Simulation};
//!
//! # fn main() -> chambersim::error::Result<()> {
//! let geometry = Geometry::new(0.09, 0.09, 0.09, 0.05)?;
//! let mut sim = Simulation::with_random_particles(geometry, 50, 0.0015, 1.0, 0.01, Some(7))?;
//! let mut sink = MemorySink::new();
//! sim.run(10.0, 0.1, &mut sink)?;
//! assert!(!sink.snapshots.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;
pub mod output;

pub use crate::core::{Event, EventKind, EventSchedule, Geometry, Particle, Simulation};
pub use crate::output::{MemorySink, ParticleState, RunParams, Snapshot, SnapshotSink, TextSnapshotWriter};
