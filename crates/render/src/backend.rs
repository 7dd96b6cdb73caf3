use std::fmt;

/// Opaque handle to a buffer owned by a [`BufferBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("unknown buffer {0}")]
    UnknownBuffer(BufferId),
    #[error("map of {buffer} at offset {offset} len {len} exceeds its {size} bytes")]
    OutOfBounds {
        buffer: BufferId,
        offset: usize,
        len: usize,
        size: usize,
    },
    #[error("buffer {0} is already mapped")]
    AlreadyMapped(BufferId),
    #[error("buffer {0} is not mapped")]
    NotMapped(BufferId),
    #[error("frame is {actual:?} but the feed expects {expected:?}")]
    SizeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("frame attributes do not match the feed layout {0}")]
    LayoutMismatch(&'static str),
}

/// Buffer creation and mapping primitives supplied by the graphics layer.
///
/// Resolved once and handed to every feed; feeds never talk to a graphics
/// API directly.
pub trait BufferBackend {
    /// Allocate a zero-filled buffer of `size` bytes.
    fn create(&mut self, size: usize) -> BufferId;

    /// Map `len` bytes starting at `offset` for writing.
    fn map(&mut self, buffer: BufferId, offset: usize, len: usize) -> Result<&mut [u8], RenderError>;

    fn unmap(&mut self, buffer: BufferId) -> Result<(), RenderError>;

    /// Release a buffer. Its id is never handed out again.
    fn destroy(&mut self, buffer: BufferId) -> Result<(), RenderError>;

    fn size(&self, buffer: BufferId) -> Option<usize>;

    /// Current contents of an unmapped buffer.
    fn read_back(&self, buffer: BufferId) -> Result<&[u8], RenderError>;
}

/// Map, copy `bytes` to `offset`, unmap.
pub fn write_buffer(
    backend: &mut dyn BufferBackend,
    buffer: BufferId,
    offset: usize,
    bytes: &[u8],
) -> Result<(), RenderError> {
    let dst = backend.map(buffer, offset, bytes.len())?;
    assert_eq!(dst.len(), bytes.len(), "mapped range has the wrong length");
    dst.copy_from_slice(bytes);
    backend.unmap(buffer)
}

/// Decode native-endian `f32`s from a byte buffer of any alignment.
pub fn read_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[derive(Debug, Default)]
struct HostBuffer {
    data: Vec<u8>,
    mapped: bool,
    destroyed: bool,
}

/// In-memory backend: buffers are plain byte vectors.
#[derive(Debug, Default)]
pub struct HostBuffers {
    buffers: Vec<HostBuffer>,
    maps: u64,
    bytes_mapped: u64,
}

impl HostBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers created and not yet destroyed.
    pub fn buffer_count(&self) -> usize {
        self.buffers.iter().filter(|b| !b.destroyed).count()
    }

    /// Bytes held by live buffers.
    pub fn live_bytes(&self) -> usize {
        self.buffers.iter().map(|b| b.data.len()).sum()
    }

    /// Total number of successful `map` calls.
    pub fn map_count(&self) -> u64 {
        self.maps
    }

    pub fn bytes_mapped(&self) -> u64 {
        self.bytes_mapped
    }

    fn slot(&mut self, buffer: BufferId) -> Result<&mut HostBuffer, RenderError> {
        self.buffers
            .get_mut(buffer.0 as usize)
            .filter(|b| !b.destroyed)
            .ok_or(RenderError::UnknownBuffer(buffer))
    }
}

impl BufferBackend for HostBuffers {
    fn create(&mut self, size: usize) -> BufferId {
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(HostBuffer {
            data: vec![0; size],
            mapped: false,
            destroyed: false,
        });
        id
    }

    fn map(&mut self, buffer: BufferId, offset: usize, len: usize) -> Result<&mut [u8], RenderError> {
        let slot = self.slot(buffer)?;
        if slot.mapped {
            return Err(RenderError::AlreadyMapped(buffer));
        }
        let size = slot.data.len();
        if offset.checked_add(len).is_none_or(|end| end > size) {
            return Err(RenderError::OutOfBounds {
                buffer,
                offset,
                len,
                size,
            });
        }
        slot.mapped = true;
        self.maps += 1;
        self.bytes_mapped += len as u64;
        let slot = &mut self.buffers[buffer.0 as usize];
        Ok(&mut slot.data[offset..offset + len])
    }

    fn unmap(&mut self, buffer: BufferId) -> Result<(), RenderError> {
        let slot = self.slot(buffer)?;
        if !slot.mapped {
            return Err(RenderError::NotMapped(buffer));
        }
        slot.mapped = false;
        Ok(())
    }

    fn destroy(&mut self, buffer: BufferId) -> Result<(), RenderError> {
        let slot = self.slot(buffer)?;
        if slot.mapped {
            return Err(RenderError::AlreadyMapped(buffer));
        }
        slot.destroyed = true;
        slot.data = Vec::new();
        Ok(())
    }

    fn size(&self, buffer: BufferId) -> Option<usize> {
        self.buffers
            .get(buffer.0 as usize)
            .filter(|b| !b.destroyed)
            .map(|b| b.data.len())
    }

    fn read_back(&self, buffer: BufferId) -> Result<&[u8], RenderError> {
        let slot = self
            .buffers
            .get(buffer.0 as usize)
            .filter(|b| !b.destroyed)
            .ok_or(RenderError::UnknownBuffer(buffer))?;
        if slot.mapped {
            return Err(RenderError::AlreadyMapped(buffer));
        }
        Ok(&slot.data)
    }
}
