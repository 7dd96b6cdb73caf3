use serde::{Deserialize, Serialize};
use tilesim_kernel::{TerrainParams, WaveParams};

use crate::layout::MAX_GRID_SIZE;

/// Rejected tile-set configuration. Checked before any thread starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("tile count must be at least 1")]
    NoTiles,
    #[error("terrain tile count {0} is not a perfect square")]
    NotSquare(usize),
    #[error("grid size {size} outside {min}..={max}")]
    GridSize { size: usize, min: usize, max: usize },
    #[error("damping {0} must lie in (0, 1]")]
    Damping(f32),
    #[error("timestep {0} must be positive and finite")]
    Timestep(f32),
    #[error("octave count {0} outside 0..=16")]
    Octaves(u32),
    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f32 },
}

/// Whether a frame waits for dispatched passes before copying output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Wait every frame; feeds always copy the pass dispatched this frame.
    #[default]
    Always,
    /// Never wait; feeds copy the latest published frame, which may be a
    /// pass behind while tiles are busy.
    Skip,
}

/// Random disturbances dropped on the wave tiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainSettings {
    pub enabled: bool,
    /// Frames between drops; 0 disables rain.
    pub frequency: u32,
    /// Upper bound of the drop strength magnitude.
    pub strength: f32,
    /// Drop radius in full-resolution cells.
    pub size: f32,
    pub seed: u64,
}

impl Default for RainSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: 5,
            strength: 1.0,
            size: 8.0,
            seed: 0x5eed,
        }
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainTileConfig {
    /// Number of tiles; must be a perfect square.
    pub tiles: usize,
    /// Vertices along each tile edge.
    pub size: usize,
    pub params: TerrainParams,
    pub noise_seed: u32,
    pub join: JoinPolicy,
}

impl Default for TerrainTileConfig {
    fn default() -> Self {
        Self {
            tiles: 4,
            size: 65,
            params: TerrainParams::default(),
            noise_seed: 0,
            join: JoinPolicy::Skip,
        }
    }
}

impl TerrainTileConfig {
    pub const MIN_SIZE: usize = 2;
    pub const MAX_SIZE: usize = 1024;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiles == 0 {
            return Err(ConfigError::NoTiles);
        }
        let k = self.tiles.isqrt();
        if k * k != self.tiles {
            return Err(ConfigError::NotSquare(self.tiles));
        }
        if !(Self::MIN_SIZE..=Self::MAX_SIZE).contains(&self.size) {
            return Err(ConfigError::GridSize {
                size: self.size,
                min: Self::MIN_SIZE,
                max: Self::MAX_SIZE,
            });
        }
        if self.params.octaves > 16 {
            return Err(ConfigError::Octaves(self.params.octaves));
        }
        finite("height_scale", self.params.height_scale)?;
        finite("height_offset", self.params.height_offset)?;
        finite("ridge_offset", self.params.ridge_offset)?;
        finite("uv_offset", self.params.uv_offset)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveTileConfig {
    pub tiles: usize,
    /// Interior cells along each tile edge; the simulated grid adds a
    /// one-cell margin on every side.
    pub size: usize,
    pub params: WaveParams,
    pub rain: RainSettings,
    pub animate: bool,
    pub join: JoinPolicy,
}

impl Default for WaveTileConfig {
    fn default() -> Self {
        Self {
            tiles: 4,
            size: 128,
            params: WaveParams::default(),
            rain: RainSettings::default(),
            animate: true,
            join: JoinPolicy::Always,
        }
    }
}

impl WaveTileConfig {
    pub const MIN_SIZE: usize = 4;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiles == 0 {
            return Err(ConfigError::NoTiles);
        }
        if !(Self::MIN_SIZE..=MAX_GRID_SIZE).contains(&self.size) {
            return Err(ConfigError::GridSize {
                size: self.size,
                min: Self::MIN_SIZE,
                max: MAX_GRID_SIZE,
            });
        }
        let d = self.params.damping;
        if !(d > 0.0 && d <= 1.0) {
            return Err(ConfigError::Damping(d));
        }
        let dt = self.params.timestep;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ConfigError::Timestep(dt));
        }
        finite("rain.strength", self.rain.strength)?;
        finite("rain.size", self.rain.size)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(TerrainTileConfig::default().validate(), Ok(()));
        assert_eq!(WaveTileConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rain_defaults() {
        let rain = RainSettings::default();
        assert_eq!(rain.frequency, 5);
        assert_eq!(rain.strength, 1.0);
        assert_eq!(rain.size, 8.0);
    }

    #[test]
    fn terrain_tiles_must_be_square() {
        let cfg = TerrainTileConfig {
            tiles: 6,
            ..TerrainTileConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NotSquare(6)));
        let cfg = TerrainTileConfig {
            tiles: 9,
            ..TerrainTileConfig::default()
        };
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn zero_tiles_rejected() {
        let cfg = WaveTileConfig {
            tiles: 0,
            ..WaveTileConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NoTiles));
    }

    #[test]
    fn wave_grid_capped() {
        let cfg = WaveTileConfig {
            size: MAX_GRID_SIZE + 1,
            ..WaveTileConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::GridSize { .. })));
    }

    #[test]
    fn damping_range() {
        for bad in [0.0, -0.5, 1.01, f32::NAN] {
            let cfg = WaveTileConfig {
                params: WaveParams {
                    damping: bad,
                    ..WaveParams::default()
                },
                ..WaveTileConfig::default()
            };
            assert!(matches!(cfg.validate(), Err(ConfigError::Damping(_))), "{bad}");
        }
    }

    #[test]
    fn non_finite_terrain_param_rejected() {
        let cfg = TerrainTileConfig {
            params: TerrainParams {
                height_scale: f32::INFINITY,
                ..TerrainParams::default()
            },
            ..TerrainTileConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NotFinite { field: "height_scale", .. })
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: WaveTileConfig =
            serde_json::from_str(r#"{ "tiles": 2, "rain": { "frequency": 0 }, "join": "skip" }"#)
                .expect("parse");
        assert_eq!(cfg.tiles, 2);
        assert_eq!(cfg.size, 128);
        assert_eq!(cfg.rain.frequency, 0);
        assert_eq!(cfg.rain.size, 8.0);
        assert_eq!(cfg.join, JoinPolicy::Skip);
        assert_eq!(cfg.params.damping, 0.99);
    }
}
