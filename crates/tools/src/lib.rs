//! Developer tooling: read-only inspection of running tile sets.
//!
//! # Invariants
//! - Inspection only reads published frames and counters; it never locks a
//!   core or dispatches a pass.

mod inspector;

pub use inspector::{HeightStats, SetSummary, TileInfo, TileInspector};

pub fn crate_info() -> &'static str {
    "tilesim-tools v0.1.0"
}
