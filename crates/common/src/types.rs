use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Identifier of a tile within one tile set, assigned in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub u32);

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tile#{}", self.0)
    }
}

/// Interleaved per-vertex terrain attribute: surface normal plus height.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct NormalHeight {
    pub normal: [f32; 3],
    pub height: f32,
}

impl NormalHeight {
    pub fn new(normal: Vec3, height: f32) -> Self {
        Self {
            normal: normal.to_array(),
            height,
        }
    }
}

/// Static XZ position of a grid vertex on the ground plane.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PlanePosition {
    pub x: f32,
    pub z: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_id_display() {
        assert_eq!(TileId(3).to_string(), "tile#3");
    }

    #[test]
    fn normal_height_is_four_floats() {
        assert_eq!(std::mem::size_of::<NormalHeight>(), 16);
        let nh = NormalHeight::new(Vec3::Y, 2.5);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&nh));
        assert_eq!(floats, &[0.0, 1.0, 0.0, 2.5]);
    }

    #[test]
    fn plane_position_is_two_floats() {
        assert_eq!(std::mem::size_of::<PlanePosition>(), 8);
    }
}
