//! Shared building blocks: the 2D scalar grid and the ids and vertex records
//! that cross crate boundaries.
//!
//! # Invariants
//! - Grid dimensions never change after construction except through an
//!   explicit `init`, which replaces the backing store wholesale.
//! - Clamped and bordered reads never touch memory outside the backing store.

mod grid;
mod types;

pub use grid::Grid;
pub use types::{NormalHeight, PlanePosition, TileId};

pub fn crate_info() -> &'static str {
    "tilesim-common v0.1.0"
}
