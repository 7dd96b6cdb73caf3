use crate::backend::{BufferBackend, BufferId, RenderError, write_buffer};
use crate::mesh::PlaneMesh;
use tilesim_common::{NormalHeight, TileId};
use tilesim_kernel::{SurfaceAttributes, TileFrame};

/// How per-vertex attributes are laid out in a feed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedLayout {
    /// One buffer of [`NormalHeight`] records (terrain).
    Interleaved,
    /// A height buffer and a separate two-component gradient buffer (waves).
    Split,
}

impl FeedLayout {
    fn name(self) -> &'static str {
        match self {
            Self::Interleaved => "interleaved",
            Self::Split => "split",
        }
    }
}

/// Buffers backing one slot of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotBuffers {
    Interleaved { normal_height: BufferId },
    Split { heights: BufferId, gradients: BufferId },
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    buffers: SlotBuffers,
    pass: u64,
}

/// Everything a renderer needs to draw one tile from one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub tile: TileId,
    pub slot: usize,
    pub positions: BufferId,
    pub indices: BufferId,
    pub index_count: usize,
    pub attributes: SlotBuffers,
    /// Pass number of the frame last copied into this slot.
    pub pass: u64,
}

/// Slot count and initial read cursor of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    pub slots: usize,
    pub read_start: usize,
}

impl FeedConfig {
    /// Double-buffered, reading the slot written in the same frame.
    pub const TERRAIN: Self = Self {
        slots: 2,
        read_start: 0,
    };
    /// Four slots with the reader one slot ahead of the writer, so a draw
    /// never reads the slot being filled this frame.
    pub const WAVE: Self = Self {
        slots: 4,
        read_start: 1,
    };
}

/// Rotating hand-off from published frames to draw calls.
///
/// The producer side (`update_buffer_data`) owns `write_index`, the consumer
/// side (`render`) owns `read_index`; each advances modulo the slot count
/// and neither looks at the other. Keeping the writer from overtaking the
/// slot being drawn is up to the caller's per-frame cadence.
#[derive(Debug)]
pub struct RenderFeed {
    tile: TileId,
    layout: FeedLayout,
    width: usize,
    height: usize,
    positions: BufferId,
    indices: BufferId,
    index_count: usize,
    slots: Vec<Slot>,
    write_index: usize,
    read_index: usize,
    updates: u64,
    scratch: Vec<NormalHeight>,
}

impl RenderFeed {
    /// Upload `mesh` and allocate `config.slots` attribute slots, each seeded
    /// with `initial`.
    pub fn new(
        backend: &mut dyn BufferBackend,
        tile: TileId,
        layout: FeedLayout,
        mesh: &PlaneMesh,
        initial: &TileFrame,
        config: FeedConfig,
    ) -> Result<Self, RenderError> {
        assert!(config.slots > 0, "a feed needs at least one slot");
        assert!(config.read_start < config.slots, "read cursor outside the slots");
        let (width, height) = (mesh.width(), mesh.height());

        let positions = backend.create(mesh.position_bytes().len());
        write_buffer(backend, positions, 0, mesh.position_bytes())?;
        let indices = backend.create(mesh.index_bytes().len());
        write_buffer(backend, indices, 0, mesh.index_bytes())?;

        let cells = width * height;
        let slots = (0..config.slots)
            .map(|_| {
                let buffers = match layout {
                    FeedLayout::Interleaved => SlotBuffers::Interleaved {
                        normal_height: backend.create(cells * std::mem::size_of::<NormalHeight>()),
                    },
                    FeedLayout::Split => SlotBuffers::Split {
                        heights: backend.create(cells * 4),
                        gradients: backend.create(cells * 2 * 4),
                    },
                };
                Slot { buffers, pass: 0 }
            })
            .collect();

        let mut feed = Self {
            tile,
            layout,
            width,
            height,
            positions,
            indices,
            index_count: mesh.index_count(),
            slots,
            write_index: 0,
            read_index: config.read_start,
            updates: 0,
            scratch: Vec::with_capacity(cells),
        };
        for slot in 0..config.slots {
            if let Err(err) = feed.fill_slot(backend, slot, initial) {
                feed.release(backend)?;
                return Err(err);
            }
        }
        tracing::debug!(
            tile = %tile,
            layout = layout.name(),
            slots = config.slots,
            "render feed created"
        );
        Ok(feed)
    }

    pub fn tile(&self) -> TileId {
        self.tile
    }

    pub fn layout(&self) -> FeedLayout {
        self.layout
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    /// Number of successful `update_buffer_data` calls.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn index_count(&self) -> usize {
        self.index_count
    }

    pub fn slot_buffers(&self, slot: usize) -> SlotBuffers {
        self.slots[slot].buffers
    }

    /// Destroy every buffer this feed created.
    pub fn release(self, backend: &mut dyn BufferBackend) -> Result<(), RenderError> {
        backend.destroy(self.positions)?;
        backend.destroy(self.indices)?;
        for slot in &self.slots {
            match slot.buffers {
                SlotBuffers::Interleaved { normal_height } => backend.destroy(normal_height)?,
                SlotBuffers::Split { heights, gradients } => {
                    backend.destroy(heights)?;
                    backend.destroy(gradients)?;
                }
            }
        }
        Ok(())
    }

    /// Copy `frame` into the slot at `write_index`, then advance the write
    /// cursor. On error the cursor stays put.
    pub fn update_buffer_data(
        &mut self,
        backend: &mut dyn BufferBackend,
        frame: &TileFrame,
    ) -> Result<(), RenderError> {
        self.fill_slot(backend, self.write_index, frame)?;
        self.write_index = (self.write_index + 1) % self.slots.len();
        self.updates += 1;
        Ok(())
    }

    /// Draw call for the slot at `read_index`, then advance the read cursor.
    pub fn render(&mut self) -> DrawCall {
        let slot = self.read_index;
        let call = DrawCall {
            tile: self.tile,
            slot,
            positions: self.positions,
            indices: self.indices,
            index_count: self.index_count,
            attributes: self.slots[slot].buffers,
            pass: self.slots[slot].pass,
        };
        self.read_index = (self.read_index + 1) % self.slots.len();
        call
    }

    fn fill_slot(
        &mut self,
        backend: &mut dyn BufferBackend,
        slot: usize,
        frame: &TileFrame,
    ) -> Result<(), RenderError> {
        if (frame.width, frame.height) != (self.width, self.height) {
            return Err(RenderError::SizeMismatch {
                expected: (self.width, self.height),
                actual: (frame.width, frame.height),
            });
        }
        let cells = self.width * self.height;
        assert_eq!(frame.heights.len(), cells, "frame height count");

        match (self.slots[slot].buffers, &frame.attributes) {
            (SlotBuffers::Interleaved { normal_height }, SurfaceAttributes::Normals(normals)) => {
                assert_eq!(normals.len(), cells * 3, "frame normal count");
                self.scratch.clear();
                self.scratch.extend(
                    normals
                        .chunks_exact(3)
                        .zip(&frame.heights)
                        .map(|(n, &h)| NormalHeight {
                            normal: [n[0], n[1], n[2]],
                            height: h,
                        }),
                );
                assert_eq!(self.scratch.len(), cells, "interleave did not cover the tile");
                write_buffer(backend, normal_height, 0, bytemuck::cast_slice(&self.scratch))?;
            }
            (SlotBuffers::Split { heights, gradients }, SurfaceAttributes::Gradients(g)) => {
                assert_eq!(g.len(), cells * 2, "frame gradient count");
                write_buffer(backend, heights, 0, frame.height_bytes())?;
                write_buffer(backend, gradients, 0, frame.attribute_bytes())?;
            }
            _ => return Err(RenderError::LayoutMismatch(self.layout.name())),
        }
        self.slots[slot].pass = frame.pass;
        Ok(())
    }
}
