use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use tilesim_common::TileId;
use tilesim_kernel::{DirtySource, SimulationCore, TileFrame};
use tilesim_render::{
    BufferBackend, FeedConfig, FeedLayout, PlaneMesh, RenderError, RenderFeed, TileRenderer,
};
use tilesim_worker::{BarrierGroup, SimulationWorker, WorkerError};

use crate::budget::FrameTimer;
use crate::config::{ConfigError, JoinPolicy};
use crate::layout::Footprint;

#[derive(Debug, thiserror::Error)]
pub enum TilesError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("render feed: {0}")]
    Render(#[from] RenderError),
}

/// Which tiles get a pass this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPolicy {
    EveryFrame,
    /// Only tiles whose dirty source reports pending changes.
    WhenDirty,
    /// Dispatch nothing; feeds keep copying the latest published frames.
    Paused,
}

/// Everything needed to bring one tile up.
pub struct TileSpec<C> {
    pub core: C,
    pub footprint: Footprint,
    pub mesh: PlaneMesh,
    pub layout: FeedLayout,
    pub feed: FeedConfig,
    pub dirty: Option<Arc<dyn DirtySource>>,
}

/// One running tile: its worker, its render feed and where it sits.
pub struct Tile<C: SimulationCore> {
    id: TileId,
    worker: SimulationWorker<C>,
    feed: RenderFeed,
    footprint: Footprint,
    width: usize,
    height: usize,
    dirty: Option<Arc<dyn DirtySource>>,
    requested: u64,
}

impl<C: SimulationCore> Tile<C> {
    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn worker(&self) -> &SimulationWorker<C> {
        &self.worker
    }

    pub fn feed(&self) -> &RenderFeed {
        &self.feed
    }

    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Passes successfully requested so far, including the priming pass.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn latest_frame(&self) -> Arc<TileFrame> {
        self.worker.latest_frame()
    }

    fn is_dirty(&self) -> bool {
        self.dirty.as_ref().is_some_and(|d| d.is_dirty())
    }

    /// Run `f` against the core. Blocks while a pass holds it.
    pub fn with_core<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        let mut core = self.worker.core().lock();
        f(&mut *core)
    }
}

/// What a single frame did.
#[derive(Debug)]
pub struct FrameReport<O> {
    pub frame: u64,
    pub dispatched: usize,
    /// Passes still running when the feeds copied their frames.
    pub in_flight: usize,
    /// Tiles whose copied frame predates their latest requested pass.
    pub stale: usize,
    pub draws: Vec<O>,
    pub elapsed: Duration,
}

/// A set of tiles sharing one barrier group and driven frame by frame from
/// the owning thread.
pub struct TileSet<C: SimulationCore> {
    name: &'static str,
    group: Arc<BarrierGroup>,
    tiles: Vec<Tile<C>>,
    join: JoinPolicy,
    frames: u64,
    timer: FrameTimer,
    shut_down: bool,
}

impl<C: SimulationCore> std::fmt::Debug for TileSet<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileSet")
            .field("name", &self.name)
            .field("tiles", &self.tiles.len())
            .field("join", &self.join)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl<C: SimulationCore> TileSet<C> {
    /// Frame times kept for the rolling average.
    pub const TIMER_WINDOW: usize = 120;

    /// Start a worker per [`TileSpec`], run one priming pass on every tile
    /// and wait for it, then create each feed from the primed frame.
    ///
    /// If a worker fails to spawn, the ones already started are stopped and
    /// joined before the error is returned.
    pub fn build(
        name: &'static str,
        group: Arc<BarrierGroup>,
        specs: Vec<TileSpec<C>>,
        backend: &mut dyn BufferBackend,
        join: JoinPolicy,
    ) -> Result<Self, TilesError> {
        let _span = tracing::info_span!("tile_set_build", set = name, tiles = specs.len()).entered();

        let mut started = Vec::with_capacity(specs.len());
        for TileSpec {
            core,
            footprint,
            mesh,
            layout,
            feed,
            dirty,
        } in specs
        {
            let mut worker = SimulationWorker::new(core, Arc::clone(&group));
            worker.start()?;
            started.push((worker, footprint, mesh, layout, feed, dirty));
        }

        let primed: Vec<bool> = started.iter().map(|(w, ..)| w.run_simulation()).collect();
        group.wait_for_all_threads();

        let mut tiles: Vec<Tile<C>> = Vec::with_capacity(started.len());
        for ((worker, footprint, mesh, layout, config, dirty), primed) in started.into_iter().zip(primed) {
            let id = TileId(worker.id());
            let frame = worker.latest_frame();
            let feed = match RenderFeed::new(backend, id, layout, &mesh, &frame, config) {
                Ok(feed) => feed,
                Err(err) => {
                    for built in tiles {
                        if let Err(e) = built.feed.release(backend) {
                            tracing::warn!(tile = %built.id, error = %e, "feed release failed");
                        }
                    }
                    return Err(err.into());
                }
            };
            tracing::debug!(tile = %id, width = frame.width, height = frame.height, "tile ready");
            tiles.push(Tile {
                id,
                width: frame.width,
                height: frame.height,
                worker,
                feed,
                footprint,
                dirty,
                requested: u64::from(primed),
            });
        }

        tracing::info!(set = name, tiles = tiles.len(), "tile set started");
        Ok(Self {
            name,
            group,
            tiles,
            join,
            frames: 0,
            timer: FrameTimer::new(Self::TIMER_WINDOW),
            shut_down: false,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> &Arc<BarrierGroup> {
        &self.group
    }

    pub fn tiles(&self) -> &[Tile<C>] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile<C>> {
        self.tiles.iter().find(|t| t.id == id)
    }

    pub fn join_policy(&self) -> JoinPolicy {
        self.join
    }

    pub fn set_join_policy(&mut self, join: JoinPolicy) {
        self.join = join;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Tiles whose footprint contains `point`, with the point mapped onto
    /// each tile's grid.
    pub fn tiles_at(&self, point: Vec3) -> Vec<(TileId, Vec2)> {
        self.tiles
            .iter()
            .filter_map(|t| {
                t.footprint
                    .map_point_xz_to_grid_pos(point, t.width, t.height)
                    .map(|pos| (t.id, pos))
            })
            .collect()
    }

    /// Run `f` against every core in tile order.
    pub fn for_each_core(&self, mut f: impl FnMut(TileId, &mut C)) {
        for tile in &self.tiles {
            let mut core = tile.worker.core().lock();
            f(tile.id, &mut *core);
        }
    }

    /// Block until every dispatched pass has finished.
    pub fn wait(&self) {
        self.group.wait_for_all_threads();
    }

    /// Publish each core's current state, for use after editing cores while
    /// no passes run.
    pub fn republish(&self) {
        for tile in &self.tiles {
            tile.worker.republish();
        }
    }

    /// One frame: dispatch per `dispatch`, join per the set's policy, then
    /// copy each tile's latest frame into its feed and hand the draw call to
    /// `renderer`.
    pub fn frame<R: TileRenderer>(
        &mut self,
        backend: &mut dyn BufferBackend,
        dispatch: DispatchPolicy,
        renderer: &mut R,
    ) -> Result<FrameReport<R::Output>, TilesError> {
        self.frames += 1;
        let _span = tracing::info_span!("tile_frame", set = self.name, frame = self.frames).entered();
        let start = Instant::now();

        let mut dispatched = 0;
        for tile in &mut self.tiles {
            let wanted = match dispatch {
                DispatchPolicy::EveryFrame => true,
                DispatchPolicy::WhenDirty => tile.is_dirty(),
                DispatchPolicy::Paused => false,
            };
            if wanted && tile.worker.run_simulation() {
                tile.requested += 1;
                dispatched += 1;
            }
        }

        if self.join == JoinPolicy::Always {
            self.group.wait_for_all_threads();
        }
        let in_flight = self.group.running_count();

        let mut stale = 0;
        let mut draws = Vec::with_capacity(self.tiles.len());
        for tile in &mut self.tiles {
            let frame = tile.worker.latest_frame();
            if frame.pass < tile.requested {
                stale += 1;
            }
            tile.feed.update_buffer_data(backend, &frame)?;
            let call = tile.feed.render();
            draws.push(renderer.draw(&call, backend)?);
        }
        if stale > 0 {
            tracing::debug!(stale, in_flight, "drawing frames from earlier passes");
        }

        let elapsed = start.elapsed();
        self.timer.record(elapsed);
        tracing::trace!(dispatched, elapsed_us = elapsed.as_micros() as u64, "frame done");
        Ok(FrameReport {
            frame: self.frames,
            dispatched,
            in_flight,
            stale,
            draws,
            elapsed,
        })
    }

    fn stop_all(&mut self) {
        for tile in &mut self.tiles {
            tile.worker.stop();
        }
        self.group.wait_for_all_threads();
        self.group.wait_for_all_threads_to_exit();
    }

    /// Stop every worker, let in-flight passes finish, wait for every thread
    /// to exit and join it, then reset the group's id counter.
    ///
    /// A panic raised inside a core is resumed here.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        let _span = tracing::info_span!("tile_set_shutdown", set = self.name).entered();
        self.stop_all();
        self.shut_down = true;
        for tile in &mut self.tiles {
            tile.worker.join();
        }
        self.group.reset_counter();
        tracing::info!(set = self.name, frames = self.frames, "tile set stopped");
    }

    /// Shut down and destroy every feed's buffers.
    pub fn release(mut self, backend: &mut dyn BufferBackend) -> Result<(), TilesError> {
        self.shutdown();
        for tile in std::mem::take(&mut self.tiles) {
            tile.feed.release(backend)?;
        }
        Ok(())
    }
}

impl<C: SimulationCore> Drop for TileSet<C> {
    fn drop(&mut self) {
        if !self.shut_down {
            // Workers join themselves on drop and log any panic.
            self.stop_all();
            self.shut_down = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::wave_render_position;
    use tilesim_kernel::{ParamCell, SurfaceAttributes, WaveSim};
    use tilesim_render::{DebugTextRenderer, HostBuffers};

    fn wave_specs(count: u32, size: usize) -> Vec<TileSpec<WaveSim>> {
        (0..count)
            .map(|id| TileSpec {
                core: WaveSim::new(size, size, 0.99),
                footprint: Footprint::wave(wave_render_position(id)),
                mesh: PlaneMesh::wave(size, size),
                layout: FeedLayout::Split,
                feed: FeedConfig::WAVE,
                dirty: None,
            })
            .collect()
    }

    /// Core that counts passes and reports dirtiness through a shared cell.
    struct FlagCore {
        cell: Arc<ParamCell<u32>>,
        passes: u32,
    }

    impl SimulationCore for FlagCore {
        fn simulate(&mut self) {
            self.cell.take_dirty();
            self.passes += 1;
        }

        fn frame(&self, pass: u64) -> TileFrame {
            let mut frame = TileFrame::zeroed(2, 2, SurfaceAttributes::Normals(vec![0.0; 12]));
            frame.heights.fill(self.passes as f32);
            frame.with_pass(pass)
        }

        fn width(&self) -> usize {
            2
        }

        fn height(&self) -> usize {
            2
        }
    }

    fn flag_specs(count: usize) -> (Vec<TileSpec<FlagCore>>, Vec<Arc<ParamCell<u32>>>) {
        let cells: Vec<_> = (0..count).map(|_| Arc::new(ParamCell::new(0))).collect();
        let specs = cells
            .iter()
            .map(|cell| TileSpec {
                core: FlagCore {
                    cell: Arc::clone(cell),
                    passes: 0,
                },
                footprint: Footprint::new(Vec2::ZERO, 1.0),
                mesh: PlaneMesh::terrain(2, 2, Vec2::ZERO),
                layout: FeedLayout::Interleaved,
                feed: FeedConfig::TERRAIN,
                dirty: Some(Arc::clone(cell) as Arc<dyn DirtySource>),
            })
            .collect();
        (specs, cells)
    }

    #[test]
    fn disturbance_stays_on_its_tile() {
        let group = Arc::new(BarrierGroup::default());
        let mut host = HostBuffers::new();
        let set = TileSet::build("waves", Arc::clone(&group), wave_specs(4, 64), &mut host, JoinPolicy::Always)
            .expect("build");
        assert_eq!(group.living_count(), 4);

        set.tiles()[0].with_core(|sim| sim.add_disturbance(32.0, 32.0, 5.0, 1.0));
        for tile in set.tiles() {
            assert!(tile.worker().run_simulation());
        }
        set.wait();

        let first = set.tiles()[0].latest_frame();
        let (peak_at, peak) = first
            .heights
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, h)| if h > best.1 { (i, h) } else { best });
        assert!(peak > 0.0);
        let (px, py) = (peak_at % 64, peak_at / 64);
        assert!(px.abs_diff(32) <= 1 && py.abs_diff(32) <= 1, "peak at ({px}, {py})");
        for tile in &set.tiles()[1..] {
            assert!(tile.latest_frame().heights.iter().all(|&h| h == 0.0));
        }

        let mut set = set;
        set.shutdown();
        assert_eq!(group.living_count(), 0);
        assert_eq!(group.running_count(), 0);
    }

    #[test]
    fn build_primes_every_tile() {
        let group = Arc::new(BarrierGroup::default());
        let mut host = HostBuffers::new();
        let set = TileSet::build("waves", group, wave_specs(2, 8), &mut host, JoinPolicy::Always)
            .expect("build");
        for tile in set.tiles() {
            assert_eq!(tile.worker().passes(), 1);
            assert_eq!(tile.requested(), 1);
            assert_eq!(tile.feed().updates(), 0);
        }
        let ids: Vec<_> = set.tiles().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![TileId(0), TileId(1)]);
    }

    #[test]
    fn joined_frames_are_never_stale() {
        let group = Arc::new(BarrierGroup::default());
        let mut host = HostBuffers::new();
        let mut renderer = DebugTextRenderer::new();
        let mut set = TileSet::build("waves", group, wave_specs(3, 8), &mut host, JoinPolicy::Always)
            .expect("build");
        for n in 1..=5 {
            let report = set
                .frame(&mut host, DispatchPolicy::EveryFrame, &mut renderer)
                .expect("frame");
            assert_eq!(report.frame, n);
            assert_eq!(report.dispatched, 3);
            assert_eq!(report.in_flight, 0);
            assert_eq!(report.stale, 0);
            assert_eq!(report.draws.len(), 3);
        }
        for tile in set.tiles() {
            assert_eq!(tile.worker().passes(), 6);
            assert_eq!(tile.feed().updates(), 5);
        }
        assert_eq!(renderer.draws(), 15);
        assert_eq!(set.timer().total_frames(), 5);
    }

    #[test]
    fn paused_frames_dispatch_nothing() {
        let group = Arc::new(BarrierGroup::default());
        let mut host = HostBuffers::new();
        let mut renderer = DebugTextRenderer::new();
        let mut set = TileSet::build("waves", group, wave_specs(2, 8), &mut host, JoinPolicy::Always)
            .expect("build");
        let report = set
            .frame(&mut host, DispatchPolicy::Paused, &mut renderer)
            .expect("frame");
        assert_eq!(report.dispatched, 0);
        assert_eq!(report.draws.len(), 2);
        for tile in set.tiles() {
            assert_eq!(tile.worker().passes(), 1);
            assert_eq!(tile.feed().updates(), 1);
        }
    }

    #[test]
    fn dirty_tiles_are_the_only_ones_dispatched() {
        let group = Arc::new(BarrierGroup::default());
        let mut host = HostBuffers::new();
        let mut renderer = DebugTextRenderer::new();
        let (specs, cells) = flag_specs(3);
        let mut set = TileSet::build("flags", group, specs, &mut host, JoinPolicy::Always)
            .expect("build");

        let report = set
            .frame(&mut host, DispatchPolicy::WhenDirty, &mut renderer)
            .expect("frame");
        assert_eq!(report.dispatched, 0);

        cells[1].set(&7);
        let report = set
            .frame(&mut host, DispatchPolicy::WhenDirty, &mut renderer)
            .expect("frame");
        assert_eq!(report.dispatched, 1);
        let passes: Vec<_> = set.tiles().iter().map(|t| t.worker().passes()).collect();
        assert_eq!(passes, vec![1, 2, 1]);
        assert!(!cells[1].is_dirty());
    }

    #[test]
    fn tiles_at_maps_onto_owning_tile() {
        let group = Arc::new(BarrierGroup::default());
        let mut host = HostBuffers::new();
        let set = TileSet::build("waves", group, wave_specs(4, 16), &mut host, JoinPolicy::Always)
            .expect("build");
        // Inside tile 1 only: x in (-2.1, -0.1], z in (-2.1, -0.1].
        let hits = set.tiles_at(Vec3::new(-1.1, 0.0, -1.1));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, TileId(1));
        assert!((hits[0].1.x - 8.0).abs() < 1e-3);
        assert!(set.tiles_at(Vec3::new(10.0, 0.0, 10.0)).is_empty());
    }

    #[test]
    fn release_frees_buffers_and_threads() {
        let group = Arc::new(BarrierGroup::default());
        let mut host = HostBuffers::new();
        let set = TileSet::build("waves", Arc::clone(&group), wave_specs(2, 8), &mut host, JoinPolicy::Always)
            .expect("build");
        assert!(host.buffer_count() > 0);
        set.release(&mut host).expect("release");
        assert_eq!(host.buffer_count(), 0);
        assert_eq!(group.living_count(), 0);
    }

    #[test]
    fn failed_build_frees_earlier_feeds() {
        let group = Arc::new(BarrierGroup::default());
        let mut host = HostBuffers::new();
        let mut specs = wave_specs(3, 8);
        specs[2].mesh = PlaneMesh::wave(9, 9);
        let err = TileSet::build("waves", Arc::clone(&group), specs, &mut host, JoinPolicy::Always)
            .unwrap_err();
        assert!(matches!(err, TilesError::Render(RenderError::SizeMismatch { .. })));
        assert_eq!(host.buffer_count(), 0);
        assert_eq!(group.living_count(), 0);
    }

    #[test]
    fn ids_restart_after_shutdown() {
        let group = Arc::new(BarrierGroup::default());
        let mut host = HostBuffers::new();
        let mut set = TileSet::build("waves", Arc::clone(&group), wave_specs(2, 8), &mut host, JoinPolicy::Always)
            .expect("build");
        set.shutdown();
        assert!(set.is_shut_down());
        let again = TileSet::build("waves", group, wave_specs(1, 8), &mut host, JoinPolicy::Always)
            .expect("rebuild");
        assert_eq!(again.tiles()[0].id(), TileId(0));
    }

    #[test]
    fn dropping_a_set_stops_its_threads() {
        let group = Arc::new(BarrierGroup::default());
        let mut host = HostBuffers::new();
        {
            let _set = TileSet::build("waves", Arc::clone(&group), wave_specs(2, 8), &mut host, JoinPolicy::Skip)
                .expect("build");
            assert_eq!(group.living_count(), 2);
        }
        assert_eq!(group.living_count(), 0);
    }
}
