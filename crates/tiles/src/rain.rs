use glam::Vec3;

use crate::config::RainSettings;

/// Splitmix64 step: advances `state` and returns the next output.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Small deterministic generator for rain placement.
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        splitmix64(&mut self.state)
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform in `[min, max)`.
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }
}

/// A disturbance in world space, before it is mapped onto any tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disturbance {
    /// World XZ position (y ignored).
    pub point: Vec3,
    /// Radius in full-resolution cells.
    pub size: f32,
    pub strength: f32,
}

/// Drops one random disturbance every `frequency` frames.
#[derive(Debug, Clone)]
pub struct Rain {
    settings: RainSettings,
    rng: SplitMix64,
    frame: u32,
}

impl Rain {
    /// Drops land uniformly in this square of world XZ.
    pub const AREA: f32 = 2.0;

    pub fn new(settings: RainSettings) -> Self {
        Self {
            rng: SplitMix64::new(settings.seed),
            settings,
            frame: 0,
        }
    }

    pub fn settings(&self) -> &RainSettings {
        &self.settings
    }

    /// Replace the settings without reseeding.
    pub fn set_settings(&mut self, settings: RainSettings) {
        self.settings = settings;
    }

    /// Advance one frame; every `frequency`-th call yields a drop.
    pub fn tick(&mut self) -> Option<Disturbance> {
        if !self.settings.enabled || self.settings.frequency == 0 {
            return None;
        }
        self.frame += 1;
        if self.frame < self.settings.frequency {
            return None;
        }
        self.frame = 0;
        let x = self.rng.range(-Self::AREA, Self::AREA);
        let z = self.rng.range(-Self::AREA, Self::AREA);
        let s = self.settings.strength;
        Some(Disturbance {
            point: Vec3::new(x, 0.0, z),
            size: self.settings.size,
            strength: self.rng.range(-s, s),
        })
    }
}
