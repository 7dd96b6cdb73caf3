use crate::backend::{BufferBackend, RenderError, read_f32s};
use crate::feed::{DrawCall, SlotBuffers};

/// Consumer of draw calls. Implementations read the referenced buffers but
/// never write them; buffer contents belong to the feeds.
pub trait TileRenderer {
    /// The output type produced for one draw call.
    type Output;

    fn draw(&mut self, call: &DrawCall, backend: &dyn BufferBackend) -> Result<Self::Output, RenderError>;
}

/// Text renderer standing in for a GPU pipeline.
///
/// Summarizes each draw call as one line: the slot it reads, the pass it
/// holds, the triangle count and the height range found in the buffer.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    draws: u64,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draws(&self) -> u64 {
        self.draws
    }
}

fn height_range(heights: impl Iterator<Item = f32>) -> (f32, f32) {
    heights.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), h| {
        (lo.min(h), hi.max(h))
    })
}

impl TileRenderer for DebugTextRenderer {
    type Output = String;

    fn draw(&mut self, call: &DrawCall, backend: &dyn BufferBackend) -> Result<String, RenderError> {
        let (lo, hi) = match call.attributes {
            SlotBuffers::Interleaved { normal_height } => {
                // Height is the fourth float of each record.
                let floats = read_f32s(backend.read_back(normal_height)?);
                height_range(floats.into_iter().skip(3).step_by(4))
            }
            SlotBuffers::Split { heights, .. } => {
                height_range(read_f32s(backend.read_back(heights)?).into_iter())
            }
        };
        self.draws += 1;
        Ok(format!(
            "{} slot={} pass={} triangles={} height=[{:.3}, {:.3}]",
            call.tile,
            call.slot,
            call.pass,
            call.index_count / 3,
            lo,
            hi
        ))
    }
}
