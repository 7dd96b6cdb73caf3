use std::sync::Arc;

use glam::Vec3;
use tilesim_kernel::{WaveParams, WaveSim};
use tilesim_render::{BufferBackend, FeedConfig, FeedLayout, PlaneMesh, TileRenderer};
use tilesim_worker::BarrierGroup;

use crate::config::{RainSettings, WaveTileConfig};
use crate::layout::{Footprint, wave_render_position, wave_scale};
use crate::orchestrator::{DispatchPolicy, FrameReport, TileSet, TileSpec, TilesError};
use crate::rain::{Disturbance, Rain};

/// A row of wave tiles advanced once per frame while animating.
///
/// Each frame first lets the rain drop its disturbance, then applies the
/// pending pointer disturbance, pushes the current damping to every tile and
/// dispatches them all. While paused, disturbances are discarded and the
/// feeds keep showing the last published frames.
pub struct WaveTiles {
    config: WaveTileConfig,
    group: Arc<BarrierGroup>,
    backend: Box<dyn BufferBackend>,
    rain: Rain,
    pending: Option<Disturbance>,
    set: TileSet<WaveSim>,
}

impl std::fmt::Debug for WaveTiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveTiles")
            .field("config", &self.config)
            .field("pending", &self.pending)
            .field("set", &self.set)
            .finish_non_exhaustive()
    }
}

fn build_set(
    config: &WaveTileConfig,
    group: &Arc<BarrierGroup>,
    backend: &mut dyn BufferBackend,
) -> Result<TileSet<WaveSim>, TilesError> {
    config.validate()?;
    // One cell of margin on every side.
    let cells = config.size + 2;
    let specs = (0..config.tiles as u32)
        .map(|i| TileSpec {
            core: WaveSim::with_params(cells, cells, config.params),
            footprint: Footprint::wave(wave_render_position(i)),
            mesh: PlaneMesh::wave(cells, cells),
            layout: FeedLayout::Split,
            feed: FeedConfig::WAVE,
            dirty: None,
        })
        .collect();
    TileSet::build("waves", Arc::clone(group), specs, backend, config.join)
}

impl WaveTiles {
    pub fn new(
        config: WaveTileConfig,
        group: Arc<BarrierGroup>,
        mut backend: Box<dyn BufferBackend>,
    ) -> Result<Self, TilesError> {
        let set = build_set(&config, &group, backend.as_mut())?;
        Ok(Self {
            rain: Rain::new(config.rain),
            config,
            group,
            backend,
            pending: None,
            set,
        })
    }

    pub fn config(&self) -> &WaveTileConfig {
        &self.config
    }

    pub fn tile_set(&self) -> &TileSet<WaveSim> {
        &self.set
    }

    pub fn backend(&self) -> &dyn BufferBackend {
        self.backend.as_ref()
    }

    /// Grid cells per full-resolution cell for the current tile size.
    pub fn scale(&self) -> f32 {
        wave_scale(self.config.size)
    }

    pub fn is_animating(&self) -> bool {
        self.config.animate
    }

    pub fn set_animate(&mut self, animate: bool) {
        self.config.animate = animate;
    }

    /// New damping, pushed to the tiles on the next animated frame.
    pub fn set_damping(&mut self, damping: f32) {
        self.config.params.damping = damping;
    }

    pub fn set_params(&mut self, params: WaveParams) {
        self.config.params = params;
    }

    pub fn set_rain(&mut self, rain: RainSettings) {
        self.config.rain = rain;
        self.rain.set_settings(rain);
    }

    /// Queue a pointer disturbance at `point` for the next frame, using the
    /// configured drop size and strength. A later call replaces an earlier
    /// one that has not been applied yet.
    pub fn disturb_at(&mut self, point: Vec3) {
        self.pending = Some(Disturbance {
            point,
            size: self.config.rain.size,
            strength: self.config.rain.strength,
        });
    }

    /// Apply `d` to every tile whose footprint contains its point, scaled to
    /// the tile resolution. Returns the number of tiles touched.
    ///
    /// Blocks on any tile whose pass is still running.
    pub fn apply_disturbance(&self, d: Disturbance) -> usize {
        if d.strength == 0.0 {
            return 0;
        }
        let scale = self.scale();
        let hits = self.set.tiles_at(d.point);
        for (id, pos) in &hits {
            if let Some(tile) = self.set.tile(*id) {
                tile.with_core(|sim| {
                    sim.add_disturbance(pos.x, pos.y, d.size * scale, d.strength * scale)
                });
            }
        }
        tracing::trace!(point = ?d.point, tiles = hits.len(), "disturbance applied");
        hits.len()
    }

    pub fn frame<R: TileRenderer>(&mut self, renderer: &mut R) -> Result<FrameReport<R::Output>, TilesError> {
        let rain = self.rain.tick();
        let pointer = self.pending.take();

        let dispatch = if self.config.animate {
            for d in rain.into_iter().chain(pointer) {
                self.apply_disturbance(d);
            }
            let params = self.config.params;
            self.set.for_each_core(|_, sim| sim.apply_params(&params));
            DispatchPolicy::EveryFrame
        } else {
            DispatchPolicy::Paused
        };
        self.set.frame(self.backend.as_mut(), dispatch, renderer)
    }

    /// Flatten every tile and publish the flat state.
    pub fn reset(&mut self) {
        self.set.wait();
        self.set.for_each_core(|_, sim| sim.reset());
        self.set.republish();
        self.pending = None;
        tracing::debug!("wave tiles reset");
    }

    /// Tear the tiles down and bring up `tiles` tiles of `size` interior
    /// cells. The old set keeps running if the new layout is invalid; if the
    /// new tiles fail to come up, the session is left shut down.
    pub fn rebuild(&mut self, tiles: usize, size: usize) -> Result<(), TilesError> {
        let config = WaveTileConfig {
            tiles,
            size,
            ..self.config.clone()
        };
        config.validate()?;
        let _span = tracing::info_span!("wave_rebuild", tiles, size).entered();

        self.set.shutdown();
        let set = build_set(&config, &self.group, self.backend.as_mut())?;
        let old = std::mem::replace(&mut self.set, set);
        old.release(self.backend.as_mut())?;
        self.config = config;
        self.pending = None;
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.set.shutdown();
    }
}
