//! Tile sets: many simulation tiles laid out side by side, each on its own
//! worker thread, driven frame by frame from one owning thread.
//!
//! # Invariants
//! - Within a frame, dispatch precedes the join, and the join precedes every
//!   feed copy.
//! - Under [`JoinPolicy::Always`] every feed copies the pass dispatched in
//!   the same frame.
//! - Tiles never share cells: a disturbance is applied independently to each
//!   tile whose footprint contains the point.
//! - Configurations are validated before any thread starts; a rejected
//!   rebuild leaves the running set untouched.
//!
//! # Workaround
//! Rendering goes through the injected buffer backend and renderer, so a
//! session runs headless with host buffers and a text renderer.

mod budget;
mod config;
mod layout;
mod orchestrator;
mod rain;
mod terrain;
mod wave;

pub use budget::FrameTimer;
pub use config::{ConfigError, JoinPolicy, RainSettings, TerrainTileConfig, WaveTileConfig};
pub use layout::{
    Footprint, MAX_GRID_SIZE, WAVE_TILE_EXTENT, terrain_translations, wave_render_position,
    wave_scale,
};
pub use orchestrator::{DispatchPolicy, FrameReport, Tile, TileSet, TileSpec, TilesError};
pub use rain::{Disturbance, Rain, SplitMix64};
pub use terrain::TerrainTiles;
pub use wave::WaveTiles;

pub fn crate_info() -> &'static str {
    "tilesim-tiles v0.1.0"
}
