use std::time::Duration;

use tilesim_common::TileId;
use tilesim_kernel::{SimulationCore, TileFrame};
use tilesim_tiles::TileSet;
use tilesim_worker::WorkerState;

/// Tile inspector for developer tooling.
///
/// Reads published frames, worker counters and barrier counts; safe to call
/// between frames while passes are still running.
pub struct TileInspector;

impl TileInspector {
    pub fn summary<C: SimulationCore>(set: &TileSet<C>) -> SetSummary {
        let group = set.group();
        SetSummary {
            name: set.name(),
            tiles: set.len(),
            frames: set.frames(),
            living: group.living_count(),
            running: group.running_count(),
            avg_frame: set.timer().average(),
        }
    }

    pub fn inspect_tile<C: SimulationCore>(set: &TileSet<C>, id: TileId) -> Option<TileInfo> {
        set.tile(id).map(|tile| {
            let frame = tile.latest_frame();
            let worker = tile.worker();
            TileInfo {
                id,
                width: frame.width,
                height: frame.height,
                pass: frame.pass,
                requested: tile.requested(),
                state: worker.state(),
                exec_time: worker.exec_time(),
                heights: HeightStats::of(&frame),
            }
        })
    }

    pub fn list_tiles<C: SimulationCore>(set: &TileSet<C>) -> Vec<TileId> {
        set.tiles().iter().map(|t| t.id()).collect()
    }
}

/// Barrier counts and frame timing of a whole set.
#[derive(Debug, Clone)]
pub struct SetSummary {
    pub name: &'static str,
    pub tiles: usize,
    pub frames: u64,
    pub living: usize,
    pub running: usize,
    pub avg_frame: Duration,
}

impl std::fmt::Display for SetSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Set {}: tiles={} frames={} living={} running={} avg_frame={:?}",
            self.name, self.tiles, self.frames, self.living, self.running, self.avg_frame
        )
    }
}

/// Height range and mean of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl HeightStats {
    pub fn of(frame: &TileFrame) -> Self {
        if frame.heights.is_empty() {
            return Self {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        let (min, max, sum) = frame.heights.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0_f64),
            |(lo, hi, sum), &h| (lo.min(h), hi.max(h), sum + f64::from(h)),
        );
        Self {
            min,
            max,
            mean: (sum / frame.heights.len() as f64) as f32,
        }
    }
}

/// Detailed info about a single tile.
#[derive(Debug, Clone)]
pub struct TileInfo {
    pub id: TileId,
    pub width: usize,
    pub height: usize,
    pub pass: u64,
    pub requested: u64,
    pub state: WorkerState,
    pub exec_time: Duration,
    pub heights: HeightStats,
}

impl std::fmt::Display for TileInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}x{} pass={}/{} state={:?} exec={:?} height=[{:.3}, {:.3}] mean={:.3}",
            self.id,
            self.width,
            self.height,
            self.pass,
            self.requested,
            self.state,
            self.exec_time,
            self.heights.min,
            self.heights.max,
            self.heights.mean,
        )
    }
}
