//! Simulation kernel: the per-cell computations that fill one tile's grid.
//!
//! Two cores are provided. [`TerrainSim`] evaluates a ridged multifractal
//! height function over the tile and derives normals from it. [`WaveSim`]
//! integrates a damped height/velocity wave field and derives gradients.
//!
//! # Invariants
//! - A core is mutated by exactly one thread at a time; callers share it
//!   behind a lock and only hand out immutable [`TileFrame`] snapshots.
//! - The terrain height function is pure: identical params and translation
//!   produce an identical heightfield.
//! - Parameter dirtiness is cleared at the start of a fill, never the end.

pub mod fractal;
pub mod simulation;
pub mod terrain;
pub mod wave;

pub use fractal::RidgedNoise;
pub use simulation::{DirtySource, ParamCell, SimulationCore, SurfaceAttributes, TileFrame};
pub use terrain::{TerrainParams, TerrainSim};
pub use wave::{WaveParams, WaveSim};

pub fn crate_info() -> &'static str {
    "tilesim-kernel v0.1.0"
}
