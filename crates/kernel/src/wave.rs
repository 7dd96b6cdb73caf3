use crate::simulation::{SimulationCore, SurfaceAttributes, TileFrame};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tilesim_common::Grid;

/// Wave integration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    /// Per-pass velocity multiplier, expected in (0, 1).
    pub damping: f32,
    /// Integration step used by each worker pass.
    pub timestep: f32,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            damping: 0.99,
            timestep: 1.0,
        }
    }
}

/// Heightfield fluid surface integrated with an explicit velocity scheme.
///
/// The outermost ring of cells is a fixed margin: it is never integrated,
/// never disturbed and its gradients are never written.
///
/// Two height buffers are allocated but only `heights[current]` is read or
/// written; `current` is fixed at construction. Callers must not rely on the
/// second buffer.
#[derive(Debug, Clone)]
pub struct WaveSim {
    width: usize,
    height: usize,
    heights: [Grid<f32>; 2],
    velocity: Grid<f32>,
    gradients: Vec<f32>,
    damping: f32,
    timestep: f32,
    current: usize,
    steps: u64,
}

impl WaveSim {
    /// Create a still surface of `width` x `height` cells, margin included.
    pub fn new(width: usize, height: usize, damping: f32) -> Self {
        assert!(
            width >= 3 && height >= 3,
            "wave grid must be at least 3x3, got {width}x{height}"
        );
        Self {
            width,
            height,
            heights: [Grid::new(width, height), Grid::new(width, height)],
            velocity: Grid::new(width, height),
            gradients: vec![0.0; width * height * 2],
            damping,
            timestep: WaveParams::default().timestep,
            current: 0,
            steps: 0,
        }
    }

    pub fn with_params(width: usize, height: usize, params: WaveParams) -> Self {
        let mut sim = Self::new(width, height, params.damping);
        sim.timestep = params.timestep;
        sim
    }

    /// Zero heights and velocities.
    pub fn reset(&mut self) {
        self.heights[0].fill(0.0);
        self.heights[1].fill(0.0);
        self.velocity.fill(0.0);
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping;
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    pub fn set_timestep(&mut self, dt: f32) {
        self.timestep = dt;
    }

    pub fn timestep(&self) -> f32 {
        self.timestep
    }

    pub fn apply_params(&mut self, params: &WaveParams) {
        self.damping = params.damping;
        self.timestep = params.timestep;
    }

    /// Index of the height buffer in use.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The height buffer that is not in use.
    pub fn back_buffer(&self) -> &Grid<f32> {
        &self.heights[1 - self.current]
    }

    pub fn heights(&self) -> &Grid<f32> {
        &self.heights[self.current]
    }

    pub fn height_field(&self) -> &[f32] {
        self.heights[self.current].as_slice()
    }

    /// Two floats per cell, row-major: (dh/dx, dh/dz).
    pub fn gradients(&self) -> &[f32] {
        &self.gradients
    }

    pub fn velocity(&self) -> &[f32] {
        self.velocity.as_slice()
    }

    pub fn height_at(&self, x: usize, y: usize) -> f32 {
        self.heights[self.current].get(x, y)
    }

    pub fn velocity_at(&self, x: usize, y: usize) -> f32 {
        self.velocity.get(x, y)
    }

    /// Unnormalized surface normal from the stored gradient.
    pub fn normal_at(&self, x: usize, y: usize) -> Vec3 {
        let i = (y * self.width + x) * 2;
        Vec3::new(self.gradients[i], 2.0, self.gradients[i + 1])
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Sum of squared velocities over the interior.
    pub fn interior_kinetic_energy(&self) -> f32 {
        let mut sum = 0.0;
        for y in 1..self.height - 1 {
            for x in 1..self.width - 1 {
                let v = self.velocity.get(x, y);
                sum += v * v;
            }
        }
        sum
    }

    /// Add a Gaussian bump centred at grid position `(x, y)`.
    ///
    /// Every interior cell closer than `radius` receives
    /// `strength * exp(-(3d / radius)^2)`. The margin is never touched.
    pub fn add_disturbance(&mut self, x: f32, y: f32, radius: f32, strength: f32) {
        if radius <= 0.0 {
            return;
        }
        let ix = x.floor() as i64;
        let iy = y.floor() as i64;
        let ir = radius.ceil() as i64;
        let sx = (ix - ir).max(1);
        let sy = (iy - ir).max(1);
        let ex = (ix + ir).min(self.width as i64 - 2);
        let ey = (iy + ir).min(self.height as i64 - 2);
        let field = &mut self.heights[self.current];
        for j in sy..=ey {
            for i in sx..=ex {
                let dx = x - i as f32;
                let dy = y - j as f32;
                let d = (dx * dx + dy * dy).sqrt();
                if d < radius {
                    let t = d / radius * 3.0;
                    *field.get_mut(i as usize, j as usize) += (-t * t).exp() * strength;
                }
            }
        }
    }

    /// Advance the interior by `dt`: accelerate towards the 4-neighbour
    /// average, damp, then integrate heights with the new velocity.
    pub fn step(&mut self, dt: f32) {
        let (w, h) = (self.width, self.height);
        let u = &self.heights[self.current];
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let avg =
                    (u.get(x - 1, y) + u.get(x + 1, y) + u.get(x, y - 1) + u.get(x, y + 1)) * 0.25;
                *self.velocity.get_mut(x, y) += dt * (avg - u.get(x, y));
            }
        }

        let u = &mut self.heights[self.current];
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let v = self.velocity.get_mut(x, y);
                *v *= self.damping;
                *u.get_mut(x, y) += dt * *v;
            }
        }
        self.steps += 1;
    }

    /// Central-difference gradients over the interior. The margin keeps
    /// whatever it held before (zero unless written externally).
    pub fn calc_gradients(&mut self) {
        let (w, h) = (self.width, self.height);
        let u = &self.heights[self.current];
        let total = self.gradients.len();
        for y in 1..h - 1 {
            let row_start = (y * w + 1) * 2;
            let row_end = row_start + (w - 2) * 2;
            assert!(row_end <= total, "gradient buffer overrun at row {y}");
            let row = &mut self.gradients[row_start..row_end];
            for (k, g) in row.chunks_exact_mut(2).enumerate() {
                let x = k + 1;
                g[0] = u.get(x + 1, y) - u.get(x - 1, y);
                g[1] = u.get(x, y + 1) - u.get(x, y - 1);
            }
        }
    }
}

impl SimulationCore for WaveSim {
    fn simulate(&mut self) {
        self.step(self.timestep);
        self.calc_gradients();
        tracing::trace!(step = self.steps, damping = self.damping, "wave tile simulated");
    }

    fn frame(&self, pass: u64) -> TileFrame {
        TileFrame {
            width: self.width,
            height: self.height,
            heights: self.height_field().to_vec(),
            attributes: SurfaceAttributes::Gradients(self.gradients.clone()),
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
