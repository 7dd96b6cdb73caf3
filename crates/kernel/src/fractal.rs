use glam::Vec2;
use noise::{NoiseFn, Perlin};

/// Fractal noise source for terrain heights: fBm over improved Perlin noise,
/// folded into ridges (Musgrave's ridged multifractal).
#[derive(Clone)]
pub struct RidgedNoise {
    perlin: Perlin,
}

impl std::fmt::Debug for RidgedNoise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RidgedNoise").finish_non_exhaustive()
    }
}

impl Default for RidgedNoise {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SEED)
    }
}

impl RidgedNoise {
    pub const DEFAULT_SEED: u32 = 0;
    pub const LACUNARITY: f32 = 2.0;
    pub const GAIN: f32 = 0.5;

    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
        }
    }

    /// Single-octave noise in roughly [-1, 1].
    pub fn sample(&self, p: Vec2) -> f32 {
        self.perlin.get([p.x as f64, p.y as f64, 0.0]) as f32
    }

    /// Fractional Brownian motion: `octaves` layers, each at `lacunarity`
    /// times the frequency and `gain` times the amplitude of the last.
    pub fn fbm(&self, p: Vec2, octaves: u32, lacunarity: f32, gain: f32) -> f32 {
        let mut sum = 0.0;
        let mut freq = 1.0;
        let mut amp = 0.5;
        for _ in 0..octaves {
            sum += amp * self.sample(p * freq);
            freq *= lacunarity;
            amp *= gain;
        }
        sum
    }

    /// Ridged multifractal height at `p`.
    pub fn ridged(&self, p: Vec2, octaves: u32, lacunarity: f32, gain: f32, offset: f32) -> f32 {
        let f = 10.0 * self.fbm(p, octaves, lacunarity, gain);
        ridge(f, offset)
    }

    /// Terrain blend used by the height function. Currently pure ridged noise
    /// with the standard lacunarity and gain.
    pub fn hybrid_terrain(&self, p: Vec2, octaves: u32, ridge_offset: f32) -> f32 {
        self.ridged(p, octaves, Self::LACUNARITY, Self::GAIN, ridge_offset)
    }
}

/// Fold a signed noise value into a ridge: `(offset - |h|)^2`.
pub fn ridge(h: f32, offset: f32) -> f32 {
    let r = offset - h.abs();
    r * r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ridge_peaks_at_zero_crossing() {
        assert_eq!(ridge(0.0, 1.0), 1.0);
        assert_eq!(ridge(1.0, 1.0), 0.0);
        assert_eq!(ridge(-1.0, 1.0), 0.0);
        assert_eq!(ridge(0.5, 1.0), 0.25);
    }

    #[test]
    fn zero_octaves_is_flat() {
        let n = RidgedNoise::default();
        assert_eq!(n.fbm(Vec2::new(0.3, 0.7), 0, 2.0, 0.5), 0.0);
        assert_eq!(n.ridged(Vec2::new(0.3, 0.7), 0, 2.0, 0.5, 1.0), 1.0);
    }

    #[test]
    fn same_seed_same_values() {
        let a = RidgedNoise::new(7);
        let b = RidgedNoise::new(7);
        for i in 0..32 {
            let p = Vec2::new(i as f32 * 0.137, i as f32 * -0.291);
            assert_eq!(a.hybrid_terrain(p, 8, 1.0), b.hybrid_terrain(p, 8, 1.0));
        }
    }

    #[test]
    fn fbm_is_bounded() {
        let n = RidgedNoise::default();
        for i in 0..200 {
            let p = Vec2::new(i as f32 * 0.0731, i as f32 * 0.0417);
            let v = n.fbm(p, 8, 2.0, 0.5);
            assert!(v.is_finite());
            assert!(v.abs() <= 1.5, "fbm out of range: {v}");
        }
    }

    #[test]
    fn ridged_is_non_negative() {
        let n = RidgedNoise::default();
        for i in 0..100 {
            let p = Vec2::new(i as f32 * 0.05, 1.0 - i as f32 * 0.03);
            assert!(n.hybrid_terrain(p, 6, 0.8) >= 0.0);
        }
    }
}
