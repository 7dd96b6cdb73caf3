use std::sync::Arc;

use tilesim_kernel::{DirtySource, ParamCell, RidgedNoise, TerrainParams, TerrainSim};
use tilesim_render::{BufferBackend, FeedConfig, FeedLayout, PlaneMesh, TileRenderer};
use tilesim_worker::BarrierGroup;

use crate::config::{ConfigError, TerrainTileConfig};
use crate::layout::{Footprint, terrain_translations};
use crate::orchestrator::{DispatchPolicy, FrameReport, TileSet, TileSpec, TilesError};

/// A square grid of terrain tiles whose fills are triggered by parameter
/// changes.
///
/// Every tile holds its own parameter cell; [`TerrainTiles::set_params`]
/// writes the same values to all of them. A frame dispatches only the tiles
/// whose cell is dirty.
pub struct TerrainTiles {
    config: TerrainTileConfig,
    group: Arc<BarrierGroup>,
    backend: Box<dyn BufferBackend>,
    params: Vec<Arc<ParamCell<TerrainParams>>>,
    set: TileSet<TerrainSim>,
}

impl std::fmt::Debug for TerrainTiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerrainTiles")
            .field("config", &self.config)
            .field("set", &self.set)
            .finish_non_exhaustive()
    }
}

fn build_set(
    config: &TerrainTileConfig,
    group: &Arc<BarrierGroup>,
    backend: &mut dyn BufferBackend,
) -> Result<(TileSet<TerrainSim>, Vec<Arc<ParamCell<TerrainParams>>>), TilesError> {
    config.validate()?;
    let translations =
        terrain_translations(config.tiles).ok_or(ConfigError::NotSquare(config.tiles))?;

    let mut params = Vec::with_capacity(translations.len());
    let specs = translations
        .into_iter()
        .map(|t| {
            let sim = TerrainSim::with_noise(
                config.size,
                config.size,
                t,
                RidgedNoise::new(config.noise_seed),
            );
            sim.init_params(config.params);
            let cell = sim.params_handle();
            params.push(Arc::clone(&cell));
            TileSpec {
                core: sim,
                footprint: Footprint::terrain(t),
                mesh: PlaneMesh::terrain(config.size, config.size, t),
                layout: FeedLayout::Interleaved,
                feed: FeedConfig::TERRAIN,
                dirty: Some(cell as Arc<dyn DirtySource>),
            }
        })
        .collect();

    let set = TileSet::build("terrain", Arc::clone(group), specs, backend, config.join)?;
    Ok((set, params))
}

impl TerrainTiles {
    pub fn new(
        config: TerrainTileConfig,
        group: Arc<BarrierGroup>,
        mut backend: Box<dyn BufferBackend>,
    ) -> Result<Self, TilesError> {
        let (set, params) = build_set(&config, &group, backend.as_mut())?;
        Ok(Self {
            config,
            group,
            backend,
            params,
            set,
        })
    }

    pub fn config(&self) -> &TerrainTileConfig {
        &self.config
    }

    pub fn tile_set(&self) -> &TileSet<TerrainSim> {
        &self.set
    }

    pub fn backend(&self) -> &dyn BufferBackend {
        self.backend.as_ref()
    }

    pub fn params(&self) -> TerrainParams {
        self.config.params
    }

    /// Write `params` to every tile. Returns how many tiles were dirtied;
    /// identical params dirty nothing.
    pub fn set_params(&mut self, params: TerrainParams) -> usize {
        self.config.params = params;
        let changed = self.params.iter().filter(|cell| cell.set(&params)).count();
        tracing::debug!(changed, "terrain params written");
        changed
    }

    /// Tiles with a fill still pending.
    pub fn dirty_count(&self) -> usize {
        self.params.iter().filter(|cell| cell.is_dirty()).count()
    }

    pub fn frame<R: TileRenderer>(&mut self, renderer: &mut R) -> Result<FrameReport<R::Output>, TilesError> {
        self.set
            .frame(self.backend.as_mut(), DispatchPolicy::WhenDirty, renderer)
    }

    /// Block until all dispatched fills have finished.
    pub fn wait(&self) {
        self.set.wait();
    }

    /// Tear the tiles down and bring up `tiles` tiles of `size` vertices,
    /// keeping the current params. The old set keeps running if the new
    /// layout is invalid; if the new tiles fail to come up, the session is
    /// left shut down.
    pub fn rebuild(&mut self, tiles: usize, size: usize) -> Result<(), TilesError> {
        let config = TerrainTileConfig {
            tiles,
            size,
            ..self.config.clone()
        };
        config.validate()?;
        let _span = tracing::info_span!("terrain_rebuild", tiles, size).entered();

        self.set.shutdown();
        let (set, params) = build_set(&config, &self.group, self.backend.as_mut())?;
        let old = std::mem::replace(&mut self.set, set);
        old.release(self.backend.as_mut())?;
        self.params = params;
        self.config = config;
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.set.shutdown();
    }
}
