use glam::{Vec2, Vec3};
use tilesim_render::PlaneMesh;

/// Largest wave tile edge, in interior cells. Disturbance sizes are given
/// at this resolution and scaled down for smaller grids.
pub const MAX_GRID_SIZE: usize = 256;

/// World-space edge length of a wave tile.
pub const WAVE_TILE_EXTENT: f32 = 2.0;

/// Axis-aligned XZ rectangle a tile covers in world space.
///
/// `origin.x` is the minimum world X and `origin.y` the minimum world Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub origin: Vec2,
    pub extent: f32,
}

impl Footprint {
    pub fn new(origin: Vec2, extent: f32) -> Self {
        Self { origin, extent }
    }

    /// Footprint of a wave tile placed with [`wave_render_position`].
    pub fn wave(render_pos: Vec2) -> Self {
        Self::new(render_pos, WAVE_TILE_EXTENT)
    }

    /// Footprint of a terrain tile whose mesh was built with translation `t`.
    pub fn terrain(t: Vec2) -> Self {
        let e = PlaneMesh::TERRAIN_TILE_EXTENT;
        Self::new(Vec2::new(-t.y * e, -t.x * e), e)
    }

    /// Map a world point onto the grid of a `width` x `height` tile.
    ///
    /// Points on or before the origin edges, or beyond the far edges, miss.
    /// World Z selects the grid column (x) and world X the grid row (y).
    pub fn map_point_xz_to_grid_pos(&self, point: Vec3, width: usize, height: usize) -> Option<Vec2> {
        if point.x <= self.origin.x || point.z <= self.origin.y {
            return None;
        }
        let ox = (point.x - self.origin.x) / self.extent;
        let oy = (point.z - self.origin.y) / self.extent;
        if ox <= 1.0 && oy <= 1.0 {
            Some(Vec2::new(oy * width as f32, ox * height as f32))
        } else {
            None
        }
    }
}

/// Translations of `count` terrain tiles on a square grid, row by row.
/// Returns `None` unless `count` is a non-zero perfect square.
pub fn terrain_translations(count: usize) -> Option<Vec<Vec2>> {
    let k = count.isqrt();
    if count == 0 || k * k != count {
        return None;
    }
    let half = (k / 2) as i32;
    let mut out = Vec::with_capacity(count);
    for y in 0..k as i32 {
        for x in 0..k as i32 {
            out.push(Vec2::new((x - half + 1) as f32, (y - half + 1) as f32));
        }
    }
    Some(out)
}

/// World XZ origin of wave tile `id`: tiles come in pairs stacked along Z,
/// pairs march along X.
pub fn wave_render_position(id: u32) -> Vec2 {
    let x = -2.1 + (id / 2) as f32 * 2.2;
    if id % 2 != 0 {
        Vec2::new(x, -2.1)
    } else {
        Vec2::new(x, 0.1)
    }
}

/// Ratio between a wave grid and the full-resolution grid.
pub fn wave_scale(size: usize) -> f32 {
    size as f32 / MAX_GRID_SIZE as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_layouts() {
        assert_eq!(terrain_translations(1), Some(vec![Vec2::new(1.0, 1.0)]));
        let four = terrain_translations(4).expect("square");
        assert_eq!(
            four,
            vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
            ]
        );
        assert_eq!(terrain_translations(9).map(|v| v.len()), Some(9));
        assert_eq!(terrain_translations(3), None);
        assert_eq!(terrain_translations(0), None);
    }

    #[test]
    fn wave_tiles_pair_up() {
        assert_eq!(wave_render_position(0), Vec2::new(-2.1, 0.1));
        assert_eq!(wave_render_position(1), Vec2::new(-2.1, -2.1));
        let p2 = wave_render_position(2);
        assert!((p2.x - 0.1).abs() < 1e-6);
        assert_eq!(p2.y, 0.1);
    }

    #[test]
    fn point_inside_maps_to_grid() {
        let fp = Footprint::wave(Vec2::new(0.0, 0.0));
        let pos = fp
            .map_point_xz_to_grid_pos(Vec3::new(0.5, 0.0, 1.0), 66, 66)
            .expect("inside");
        // Z covers half the tile, X a quarter.
        assert!((pos.x - 33.0).abs() < 1e-4);
        assert!((pos.y - 16.5).abs() < 1e-4);
    }

    #[test]
    fn point_outside_misses() {
        let fp = Footprint::wave(Vec2::new(0.0, 0.0));
        assert_eq!(fp.map_point_xz_to_grid_pos(Vec3::new(0.0, 0.0, 1.0), 8, 8), None);
        assert_eq!(fp.map_point_xz_to_grid_pos(Vec3::new(1.0, 0.0, -0.1), 8, 8), None);
        assert_eq!(fp.map_point_xz_to_grid_pos(Vec3::new(2.5, 0.0, 1.0), 8, 8), None);
        assert!(fp.map_point_xz_to_grid_pos(Vec3::new(2.0, 0.0, 2.0), 8, 8).is_some());
    }

    #[test]
    fn wave_pairs_do_not_overlap() {
        let a = Footprint::wave(wave_render_position(0));
        let b = Footprint::wave(wave_render_position(1));
        let p = Vec3::new(-1.0, 0.0, 1.0);
        assert!(a.map_point_xz_to_grid_pos(p, 8, 8).is_some());
        assert!(b.map_point_xz_to_grid_pos(p, 8, 8).is_none());
    }

    #[test]
    fn terrain_footprint_follows_mesh() {
        let t = Vec2::new(-1.0, 0.0);
        let fp = Footprint::terrain(t);
        let mesh = PlaneMesh::terrain(9, 9, t);
        let corner = mesh.positions()[0];
        assert!((corner.x - fp.origin.x).abs() < 1e-4);
        assert!((corner.z - fp.origin.y).abs() < 1e-4);
    }

    #[test]
    fn scale_is_relative_to_max() {
        assert_eq!(wave_scale(256), 1.0);
        assert_eq!(wave_scale(64), 0.25);
    }
}
