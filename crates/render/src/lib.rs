//! Rendering hand-off: rotating feeds that copy published tile frames into
//! backend buffers, and a renderer-agnostic draw interface.
//!
//! # Invariants
//! - A feed's write cursor is advanced only by `update_buffer_data` and its
//!   read cursor only by `render`, each modulo the slot count.
//! - Feeds touch buffers only through the injected [`BufferBackend`].
//! - Renderers read buffers; they never mutate simulation state.
//!
//! # Workaround
//! [`HostBuffers`] keeps buffers in memory and [`DebugTextRenderer`] prints a
//! line per draw call in place of a GPU backend. Both sit behind traits, so a
//! graphics implementation can replace them without changing consumers.

mod backend;
mod feed;
mod mesh;
mod renderer;

pub use backend::{BufferBackend, BufferId, HostBuffers, RenderError, read_f32s, write_buffer};
pub use feed::{DrawCall, FeedConfig, FeedLayout, RenderFeed, SlotBuffers};
pub use mesh::PlaneMesh;
pub use renderer::{DebugTextRenderer, TileRenderer};

pub fn crate_info() -> &'static str {
    "tilesim-render v0.1.0"
}
