use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use tilesim_kernel::{TerrainParams, WaveSim};
use tilesim_render::{DebugTextRenderer, HostBuffers};
use tilesim_tiles::{
    JoinPolicy, RainSettings, TerrainTileConfig, TerrainTiles, WaveTileConfig, WaveTiles,
};
use tilesim_worker::BarrierGroup;

fn bench_wave_step(size: usize, iterations: usize) {
    let mut sim = WaveSim::new(size + 2, size + 2, 0.99);
    sim.add_disturbance(size as f32 / 2.0, size as f32 / 2.0, 8.0, 1.0);

    let start = Instant::now();
    for _ in 0..iterations {
        sim.step(black_box(1.0));
        sim.calc_gradients();
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  single tile ({size}x{size}, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_wave_frames(tiles: usize, size: usize, join: JoinPolicy, frames: usize) {
    let config = WaveTileConfig {
        tiles,
        size,
        join,
        rain: RainSettings {
            frequency: 1,
            ..RainSettings::default()
        },
        ..WaveTileConfig::default()
    };
    let group = Arc::new(BarrierGroup::default());
    let Ok(mut waves) = WaveTiles::new(config, group, Box::new(HostBuffers::new())) else {
        println!("  wave session failed to start");
        return;
    };
    let mut renderer = DebugTextRenderer::new();

    let start = Instant::now();
    for i in 0..frames {
        if i % 7 == 0 {
            waves.disturb_at(Vec3::new(-1.1, 0.0, 1.1));
        }
        let _ = black_box(waves.frame(&mut renderer));
    }
    let elapsed = start.elapsed();
    let per_frame = elapsed / frames as u32;
    println!(
        "  {tiles} tiles ({size}x{size}, {join:?}, {frames} frames): {per_frame:?}/frame, total {elapsed:?}"
    );
    waves.shutdown();
}

fn bench_terrain_refill(tiles: usize, size: usize, rounds: usize) {
    let config = TerrainTileConfig {
        tiles,
        size,
        join: JoinPolicy::Always,
        ..TerrainTileConfig::default()
    };
    let group = Arc::new(BarrierGroup::default());
    let Ok(mut terrain) = TerrainTiles::new(config, group, Box::new(HostBuffers::new())) else {
        println!("  terrain session failed to start");
        return;
    };
    let mut renderer = DebugTextRenderer::new();

    let start = Instant::now();
    for i in 0..rounds {
        terrain.set_params(TerrainParams {
            uv_offset: i as f32 * 0.01,
            ..TerrainParams::default()
        });
        let _ = black_box(terrain.frame(&mut renderer));
    }
    let elapsed = start.elapsed();
    let per_round = elapsed / rounds as u32;
    println!(
        "  {tiles} tiles ({size}x{size}, {rounds} refills): {per_round:?}/refill, total {elapsed:?}"
    );
    terrain.shutdown();
}

fn main() {
    println!("=== Tile Benchmarks ===\n");

    println!("Wave step + gradients:");
    bench_wave_step(64, 1000);
    bench_wave_step(128, 200);
    bench_wave_step(256, 50);

    println!("\nWave frames (dispatch, join, copy, draw):");
    bench_wave_frames(4, 128, JoinPolicy::Always, 200);
    bench_wave_frames(4, 128, JoinPolicy::Skip, 200);
    bench_wave_frames(8, 256, JoinPolicy::Always, 50);

    println!("\nTerrain refills:");
    bench_terrain_refill(4, 65, 20);
    bench_terrain_refill(9, 129, 5);

    println!("\n=== Done ===");
}
