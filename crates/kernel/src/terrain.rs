use crate::fractal::RidgedNoise;
use crate::simulation::{ParamCell, SimulationCore, SurfaceAttributes, TileFrame};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tilesim_common::Grid;

/// User-tweakable terrain shape parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Number of fBm octaves feeding the ridge function.
    pub octaves: u32,
    pub height_scale: f32,
    pub height_offset: f32,
    /// Ridge fold offset; also scales the result by `1 + ridge_offset`.
    pub ridge_offset: f32,
    /// Extra translation of the noise domain, shared by all tiles.
    pub uv_offset: f32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            octaves: 8,
            height_scale: 1.0,
            height_offset: 0.0,
            ridge_offset: 1.0,
            uv_offset: 0.0,
        }
    }
}

/// Noise-driven terrain heightfield for one tile.
///
/// `simulate` refills the whole grid while the shared params are dirty, then
/// derives normals. The dirty flag is cleared at the start of each fill, so
/// a param write that lands mid-fill triggers one more full fill and the call
/// always ends on a pass that saw the latest params.
#[derive(Debug)]
pub struct TerrainSim {
    width: usize,
    height: usize,
    recip_w: f32,
    recip_h: f32,
    heights: Grid<f32>,
    normals: Vec<f32>,
    translation: Vec2,
    params: Arc<ParamCell<TerrainParams>>,
    active: TerrainParams,
    noise: RidgedNoise,
    fills: u64,
    /// Params written to the cell right after the next fill.
    #[cfg(test)]
    write_after_fill: Option<TerrainParams>,
}

impl TerrainSim {
    /// Create a flat tile. `translation` places it relative to the other tiles
    /// in noise space, in units of whole tiles.
    pub fn new(width: usize, height: usize, translation: Vec2) -> Self {
        Self::with_noise(width, height, translation, RidgedNoise::default())
    }

    pub fn with_noise(width: usize, height: usize, translation: Vec2, noise: RidgedNoise) -> Self {
        assert!(
            width >= 2 && height >= 2,
            "terrain tile must be at least 2x2, got {width}x{height}"
        );
        let params = TerrainParams::default();
        Self {
            width,
            height,
            recip_w: 1.0 / (width - 1) as f32,
            recip_h: 1.0 / (height - 1) as f32,
            heights: Grid::new(width, height),
            normals: vec![0.0; width * height * 3],
            translation,
            params: Arc::new(ParamCell::new(params)),
            active: params,
            noise,
            fills: 0,
            #[cfg(test)]
            write_after_fill: None,
        }
    }

    /// Flatten all heights to 0.
    pub fn reset(&mut self) {
        self.heights.fill(0.0);
    }

    /// Shared handle through which a UI thread can write params.
    pub fn params_handle(&self) -> Arc<ParamCell<TerrainParams>> {
        Arc::clone(&self.params)
    }

    /// Copy `params` and always request a refill.
    pub fn init_params(&self, params: TerrainParams) {
        self.params.init(params);
    }

    /// Copy `params` and request a refill only if any field differs.
    pub fn set_params(&self, params: &TerrainParams) -> bool {
        self.params.set(params)
    }

    pub fn dirty_params(&self) -> bool {
        self.params.is_dirty()
    }

    pub fn translation(&self) -> Vec2 {
        self.translation
    }

    /// Number of complete grid fills performed so far.
    pub fn fill_count(&self) -> u64 {
        self.fills
    }

    pub fn height_field(&self) -> &[f32] {
        self.heights.as_slice()
    }

    pub fn grid(&self) -> &Grid<f32> {
        &self.heights
    }

    /// Three floats per cell, row-major.
    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn total_height_field_elements(&self) -> usize {
        self.width * self.height
    }

    pub fn total_normal_elements(&self) -> usize {
        self.width * self.height * 3
    }

    /// Height function at an integer grid coordinate, which may lie outside
    /// the tile. Depends only on the coordinate, the translation and the
    /// active params.
    pub fn compute_terrain(&self, x: i32, y: i32) -> f32 {
        let p = &self.active;
        let uv = Vec2::new(x as f32 * self.recip_w, y as f32 * self.recip_h)
            - (self.translation + Vec2::splat(p.uv_offset));
        let h = (1.0 + p.ridge_offset) * self.noise.hybrid_terrain(uv, p.octaves, p.ridge_offset);
        p.height_scale * h + p.height_offset
    }

    fn fill(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let h = self.compute_terrain(x as i32, y as i32);
                self.heights.set(x, y, h);
            }
        }
        self.fills += 1;
    }

    /// Stored height inside the tile, evaluated height outside it, so edge
    /// normals are exact rather than clamped.
    fn unbounded(&self, x: i32, y: i32) -> f32 {
        let inside = x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height;
        if inside {
            self.heights.get(x as usize, y as usize)
        } else {
            self.compute_terrain(x, y)
        }
    }

    fn calc_normals(&mut self) {
        let total = self.total_normal_elements();
        let mut cursor = 0;
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let dx = self.unbounded(x + 1, y) - self.unbounded(x - 1, y);
                let dz = self.unbounded(x, y + 1) - self.unbounded(x, y - 1);
                let n = Vec3::new(2.0 * dx, 1.0, 2.0 * dz).normalize();
                assert!(cursor + 3 <= total, "normal buffer overrun at ({x}, {y})");
                self.normals[cursor..cursor + 3].copy_from_slice(&n.to_array());
                cursor += 3;
            }
        }
        assert_eq!(cursor, total, "normal buffer not completely filled");
    }
}

impl SimulationCore for TerrainSim {
    fn simulate(&mut self) {
        let mut passes = 0;
        while self.params.take_dirty() {
            self.active = self.params.get();
            self.fill();
            passes += 1;
            #[cfg(test)]
            if let Some(late) = self.write_after_fill.take() {
                self.params.set(&late);
            }
        }
        self.calc_normals();
        tracing::trace!(
            translation = ?self.translation,
            passes,
            "terrain tile simulated"
        );
    }

    fn frame(&self, pass: u64) -> TileFrame {
        TileFrame {
            width: self.width,
            height: self.height,
            heights: self.heights.as_slice().to_vec(),
            attributes: SurfaceAttributes::Normals(self.normals.clone()),
            pass,
        }
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(w: usize, h: usize, t: Vec2, params: TerrainParams) -> TerrainSim {
        let mut sim = TerrainSim::new(w, h, t);
        sim.init_params(params);
        sim.simulate();
        sim
    }

    #[test]
    fn new_tile_is_flat_and_clean() {
        let sim = TerrainSim::new(8, 8, Vec2::ZERO);
        assert!(!sim.dirty_params());
        assert!(sim.height_field().iter().all(|&h| h == 0.0));
        assert_eq!(sim.normals().len(), 8 * 8 * 3);
    }

    #[test]
    fn simulate_without_dirty_does_not_fill() {
        let mut sim = TerrainSim::new(8, 8, Vec2::ZERO);
        sim.simulate();
        assert_eq!(sim.fill_count(), 0);
        assert!(sim.height_field().iter().all(|&h| h == 0.0));
    }

    #[test]
    fn init_params_fills_once_and_clears_dirty() {
        let sim = filled(16, 16, Vec2::new(0.5, -0.5), TerrainParams::default());
        assert_eq!(sim.fill_count(), 1);
        assert!(!sim.dirty_params());
        assert!(sim.height_field().iter().any(|&h| h != 0.0));
    }

    #[test]
    fn repeated_fills_are_identical() {
        let params = TerrainParams {
            octaves: 6,
            ridge_offset: 0.7,
            ..TerrainParams::default()
        };
        let mut sim = filled(24, 24, Vec2::new(1.0, 0.0), params);
        let first = sim.height_field().to_vec();
        let first_normals = sim.normals().to_vec();
        for _ in 0..3 {
            sim.init_params(params);
            sim.simulate();
            assert_eq!(sim.height_field(), first.as_slice());
            assert_eq!(sim.normals(), first_normals.as_slice());
        }

        let other = filled(24, 24, Vec2::new(1.0, 0.0), params);
        assert_eq!(other.height_field(), first.as_slice());
    }

    #[test]
    fn set_params_only_dirties_on_change() {
        let sim = TerrainSim::new(4, 4, Vec2::ZERO);
        assert!(!sim.set_params(&TerrainParams::default()));
        assert!(!sim.dirty_params());
        let changed = TerrainParams {
            height_scale: 2.0,
            ..TerrainParams::default()
        };
        assert!(sim.set_params(&changed));
        assert!(sim.dirty_params());
    }

    #[test]
    fn height_scale_and_offset_apply_linearly() {
        let base = filled(8, 8, Vec2::ZERO, TerrainParams::default());
        let scaled = filled(
            8,
            8,
            Vec2::ZERO,
            TerrainParams {
                height_scale: 2.0,
                height_offset: 0.5,
                ..TerrainParams::default()
            },
        );
        for (a, b) in base.height_field().iter().zip(scaled.height_field()) {
            assert!((2.0 * a + 0.5 - b).abs() < 1e-4);
        }
    }

    #[test]
    fn edge_normals_use_evaluated_neighbors() {
        let sim = filled(8, 8, Vec2::new(0.25, 0.75), TerrainParams::default());
        // Left edge cell: x - 1 lies outside the tile and must be evaluated.
        let y = 3;
        let dx = sim.compute_terrain(1, y) - sim.compute_terrain(-1, y);
        let dz = sim.compute_terrain(0, y + 1) - sim.compute_terrain(0, y - 1);
        let expected = Vec3::new(2.0 * dx, 1.0, 2.0 * dz).normalize();
        let i = (y as usize * 8) * 3;
        let got = Vec3::from_slice(&sim.normals()[i..i + 3]);
        assert!((got - expected).length() < 1e-5);
    }

    #[test]
    fn normals_are_unit_length() {
        let sim = filled(12, 9, Vec2::new(-1.0, 2.0), TerrainParams::default());
        for n in sim.normals().chunks_exact(3) {
            let len = Vec3::from_slice(n).length();
            assert!((len - 1.0).abs() < 1e-4);
            assert!(n[1] > 0.0);
        }
    }

    #[test]
    fn adjacent_tiles_share_their_seam() {
        // Tile translations are in whole-tile units of the unit uv square, so
        // the last column of one tile equals the first column of its neighbour.
        let left = filled(9, 9, Vec2::new(0.0, 0.0), TerrainParams::default());
        let right = filled(9, 9, Vec2::new(-1.0, 0.0), TerrainParams::default());
        for y in 0..9 {
            let a = left.grid().get(8, y);
            let b = right.grid().get(0, y);
            assert!((a - b).abs() < 1e-5, "seam mismatch at row {y}: {a} vs {b}");
        }
    }

    #[test]
    fn write_during_fill_triggers_another_fill() {
        let late = TerrainParams {
            height_scale: 3.0,
            ridge_offset: 0.5,
            ..TerrainParams::default()
        };
        let mut sim = TerrainSim::new(8, 8, Vec2::new(1.0, 0.0));
        sim.init_params(TerrainParams::default());
        sim.write_after_fill = Some(late);
        sim.simulate();

        assert_eq!(sim.fill_count(), 2);
        assert!(!sim.dirty_params());
        let fresh = filled(8, 8, Vec2::new(1.0, 0.0), late);
        assert_eq!(sim.height_field(), fresh.height_field());
        assert_eq!(sim.normals(), fresh.normals());
    }

    #[test]
    fn reset_flattens() {
        let mut sim = filled(8, 8, Vec2::ZERO, TerrainParams::default());
        sim.reset();
        assert!(sim.height_field().iter().all(|&h| h == 0.0));
    }

    #[test]
    fn frame_carries_normals() {
        let sim = filled(5, 4, Vec2::ZERO, TerrainParams::default());
        let frame = sim.frame(7);
        assert_eq!(frame.pass, 7);
        assert_eq!(frame.heights.len(), 20);
        assert_eq!(frame.attributes.components(), 3);
        assert_eq!(frame.attributes.as_slice().len(), 60);
    }
}
