use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// A per-tile computation driven by a worker thread.
///
/// `simulate` runs one full pass and may take a long time; it is never
/// called concurrently with itself. `frame` snapshots the current output.
pub trait SimulationCore: Send + 'static {
    /// Run one simulation pass in place.
    fn simulate(&mut self);

    /// Copy the current output into an immutable frame tagged with `pass`.
    fn frame(&self, pass: u64) -> TileFrame;

    fn width(&self) -> usize;

    fn height(&self) -> usize;
}

/// Per-vertex surface attributes accompanying a heightfield.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceAttributes {
    /// Three floats per cell: unit normal (x, y, z).
    Normals(Vec<f32>),
    /// Two floats per cell: (dh/dx, dh/dz).
    Gradients(Vec<f32>),
}

impl SurfaceAttributes {
    pub fn components(&self) -> usize {
        match self {
            Self::Normals(_) => 3,
            Self::Gradients(_) => 2,
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        match self {
            Self::Normals(v) | Self::Gradients(v) => v,
        }
    }
}

/// Immutable snapshot of one tile's simulation output.
///
/// Frames are published whole after a pass completes, so a reader never
/// observes a partially written heightfield.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFrame {
    pub width: usize,
    pub height: usize,
    pub heights: Vec<f32>,
    pub attributes: SurfaceAttributes,
    /// Number of completed passes when the frame was taken (0 = initial state).
    pub pass: u64,
}

impl TileFrame {
    /// Frame with zeroed heights and attributes, as published before the first pass.
    pub fn zeroed(width: usize, height: usize, attributes: SurfaceAttributes) -> Self {
        Self {
            width,
            height,
            heights: vec![0.0; width * height],
            attributes,
            pass: 0,
        }
    }

    pub fn with_pass(mut self, pass: u64) -> Self {
        self.pass = pass;
        self
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    pub fn height_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.heights)
    }

    pub fn attribute_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.attributes.as_slice())
    }
}

/// Anything that can say whether a tile needs another pass, without taking
/// the core's lock.
pub trait DirtySource: Send + Sync {
    fn is_dirty(&self) -> bool;
}

/// Parameter block shared between a UI writer and a simulation core.
///
/// Writes are asynchronous with respect to the core; the only change
/// notification is the dirty flag. There is no versioning: a fill that
/// started before a write simply runs again.
#[derive(Debug, Default)]
pub struct ParamCell<P> {
    params: Mutex<P>,
    dirty: AtomicBool,
}

impl<P: Clone + PartialEq> ParamCell<P> {
    /// Create a clean cell. Use [`ParamCell::init`] to request the first fill.
    pub fn new(params: P) -> Self {
        Self {
            params: Mutex::new(params),
            dirty: AtomicBool::new(false),
        }
    }

    /// Replace the params unconditionally and mark dirty.
    pub fn init(&self, params: P) {
        let mut guard = self.params.lock();
        *guard = params;
        self.dirty.store(true, Ordering::Release);
    }

    /// Replace the params and mark dirty only if they differ from the
    /// current values. Returns whether anything changed.
    pub fn set(&self, params: &P) -> bool {
        let mut guard = self.params.lock();
        if *guard == *params {
            return false;
        }
        *guard = params.clone();
        self.dirty.store(true, Ordering::Release);
        true
    }

    pub fn get(&self) -> P {
        self.params.lock().clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

impl<P: Clone + PartialEq + Send> DirtySource for ParamCell<P> {
    fn is_dirty(&self) -> bool {
        ParamCell::is_dirty(self)
    }
}
