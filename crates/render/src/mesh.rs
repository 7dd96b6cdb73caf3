use glam::Vec2;
use tilesim_common::PlanePosition;

/// Static XZ positions and triangle-list indices for one tile.
///
/// Uploaded once per feed; only the per-vertex height attributes rotate.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneMesh {
    width: usize,
    height: usize,
    positions: Vec<PlanePosition>,
    indices: Vec<u32>,
}

impl PlaneMesh {
    /// World-space edge length of a terrain tile, independent of its
    /// vertex count.
    pub const TERRAIN_TILE_EXTENT: f32 = 127.0 * 0.5;

    /// Full grid of quads with the tile translation baked into the
    /// positions. Rows run along X, columns along Z.
    pub fn terrain(width: usize, height: usize, render_pos: Vec2) -> Self {
        assert!(width >= 2 && height >= 2, "mesh needs at least 2x2 vertices");
        let w_scale = Self::TERRAIN_TILE_EXTENT / (width - 1) as f32;
        let h_scale = Self::TERRAIN_TILE_EXTENT / (height - 1) as f32;
        let x_trans = -render_pos.x * (width - 1) as f32;
        let y_trans = -render_pos.y * (width - 1) as f32;

        let mut positions = Vec::with_capacity(width * height);
        for i in 0..height {
            for j in 0..width {
                positions.push(PlanePosition {
                    x: h_scale * (i as f32 + y_trans),
                    z: w_scale * (j as f32 + x_trans),
                });
            }
        }

        let mut indices = Vec::with_capacity((width - 1) * (height - 1) * 6);
        for i in 0..height - 1 {
            for j in 0..width - 1 {
                let a = (i * width + j) as u32;
                let b = a + 1;
                let c = a + width as u32;
                let d = c + 1;
                indices.extend_from_slice(&[a, b, c, c, b, d]);
            }
        }

        Self {
            width,
            height,
            positions,
            indices,
        }
    }

    /// Grid positions in cell units, with the one-cell margin left out of
    /// the index list. Quads are emitted in a serpentine order: even rows
    /// forward, odd rows mirrored.
    pub fn wave(width: usize, height: usize) -> Self {
        assert!(width >= 4 && height >= 4, "wave mesh needs at least 4x4 vertices");
        let mut positions = Vec::with_capacity(width * height);
        for i in 0..height {
            for j in 0..width {
                positions.push(PlanePosition {
                    x: i as f32,
                    z: j as f32,
                });
            }
        }

        let quads_r = height - 3;
        let quads_c = width - 3;
        let mut indices = Vec::with_capacity(quads_r * quads_c * 6);
        let at = |k: usize, l: usize| (k * width + l) as u32;
        for r in 0..quads_r {
            for c in 0..quads_c {
                let (k, l) = if r % 2 == 0 {
                    (r + 1, c + 1)
                } else {
                    (1 + (height - 4) - r, 1 + (width - 4) - c)
                };
                indices.extend_from_slice(&[
                    at(k, l),
                    at(k, l + 1),
                    at(k + 1, l),
                    at(k + 1, l),
                    at(k, l + 1),
                    at(k + 1, l + 1),
                ]);
            }
        }

        Self {
            width,
            height,
            positions,
            indices,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn positions(&self) -> &[PlanePosition] {
        &self.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
