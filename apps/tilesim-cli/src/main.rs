use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tilesim_common::TileId;
use tilesim_kernel::TerrainParams;
use tilesim_render::{DebugTextRenderer, HostBuffers};
use tilesim_tiles::{JoinPolicy, TerrainTileConfig, TerrainTiles, WaveTileConfig, WaveTiles};
use tilesim_tools::TileInspector;
use tilesim_worker::BarrierGroup;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tilesim-cli", about = "Run tiled grid simulations headless")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON file with `terrain` and/or `waves` sections; flags override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum JoinArg {
    Always,
    Skip,
}

impl From<JoinArg> for JoinPolicy {
    fn from(arg: JoinArg) -> Self {
        match arg {
            JoinArg::Always => JoinPolicy::Always,
            JoinArg::Skip => JoinPolicy::Skip,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Fill a square grid of terrain tiles, optionally changing params each frame
    Terrain {
        /// Number of tiles; must be a perfect square
        #[arg(short, long)]
        tiles: Option<usize>,
        /// Vertices along each tile edge
        #[arg(short, long)]
        size: Option<usize>,
        #[arg(short, long, default_value = "10")]
        frames: u64,
        /// Shift the noise domain every frame so each frame refills
        #[arg(long)]
        churn: bool,
        #[arg(long, value_enum)]
        join: Option<JoinArg>,
    },
    /// Animate a row of wave tiles under rain
    Waves {
        #[arg(short, long)]
        tiles: Option<usize>,
        /// Interior cells along each tile edge
        #[arg(short, long)]
        size: Option<usize>,
        #[arg(short, long, default_value = "100")]
        frames: u64,
        #[arg(long)]
        no_rain: bool,
        /// Poke the surface at world X,Z on the first frame
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        poke: Option<(f32, f32)>,
        #[arg(long, value_enum)]
        join: Option<JoinArg>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    terrain: TerrainTileConfig,
    waves: WaveTileConfig,
}

fn parse_point(s: &str) -> Result<(f32, f32), String> {
    let (x, z) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Z, got {s:?}"))?;
    let x = x.trim().parse().map_err(|e| format!("bad X: {e}"))?;
    let z = z.trim().parse().map_err(|e| format!("bad Z: {e}"))?;
    Ok((x, z))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(config)
}

fn print_tiles<C: tilesim_kernel::SimulationCore>(set: &tilesim_tiles::TileSet<C>) {
    println!("{}", TileInspector::summary(set));
    for id in TileInspector::list_tiles(set) {
        if let Some(info) = TileInspector::inspect_tile(set, id) {
            println!("  {info}");
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let file = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("tilesim-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", tilesim_common::crate_info());
            println!("kernel: {}", tilesim_kernel::crate_info());
            println!("worker: {}", tilesim_worker::crate_info());
            println!("render: {}", tilesim_render::crate_info());
            println!("tiles: {}", tilesim_tiles::crate_info());
            println!("tools: {}", tilesim_tools::crate_info());
            println!("first tile: {}", TileId(0));
        }
        Commands::Terrain {
            tiles,
            size,
            frames,
            churn,
            join,
        } => {
            let mut config = file.terrain;
            config.tiles = tiles.unwrap_or(config.tiles);
            config.size = size.unwrap_or(config.size);
            if let Some(join) = join {
                config.join = join.into();
            }
            println!(
                "Terrain: tiles={} size={} frames={frames} join={:?}",
                config.tiles, config.size, config.join
            );

            let group = Arc::new(BarrierGroup::default());
            let mut terrain = TerrainTiles::new(config, group, Box::new(HostBuffers::new()))?;
            let mut renderer = DebugTextRenderer::new();
            let base = terrain.params();
            for frame in 0..frames {
                if churn {
                    terrain.set_params(TerrainParams {
                        uv_offset: base.uv_offset + frame as f32 * 0.05,
                        ..base
                    });
                }
                let report = terrain.frame(&mut renderer)?;
                tracing::debug!(
                    frame = report.frame,
                    dispatched = report.dispatched,
                    stale = report.stale,
                    "terrain frame"
                );
                if frame + 1 == frames {
                    for line in &report.draws {
                        println!("  {line}");
                    }
                }
            }
            terrain.wait();
            print_tiles(terrain.tile_set());
            println!("Frames: {}", terrain.tile_set().timer());
            terrain.shutdown();
        }
        Commands::Waves {
            tiles,
            size,
            frames,
            no_rain,
            poke,
            join,
        } => {
            let mut config = file.waves;
            config.tiles = tiles.unwrap_or(config.tiles);
            config.size = size.unwrap_or(config.size);
            if no_rain {
                config.rain.enabled = false;
            }
            if let Some(join) = join {
                config.join = join.into();
            }
            println!(
                "Waves: tiles={} size={} frames={frames} rain={} join={:?}",
                config.tiles, config.size, config.rain.enabled, config.join
            );

            let group = Arc::new(BarrierGroup::default());
            let mut waves = WaveTiles::new(config, group, Box::new(HostBuffers::new()))?;
            if let Some((x, z)) = poke {
                waves.disturb_at(glam::Vec3::new(x, 0.0, z));
            }
            let mut renderer = DebugTextRenderer::new();
            let mut stale_frames = 0;
            for frame in 0..frames {
                let report = waves.frame(&mut renderer)?;
                if report.stale > 0 {
                    stale_frames += 1;
                }
                if frame + 1 == frames {
                    for line in &report.draws {
                        println!("  {line}");
                    }
                }
            }
            waves.tile_set().wait();
            print_tiles(waves.tile_set());
            println!("Frames: {} stale={stale_frames}", waves.tile_set().timer());
            waves.shutdown();
        }
    }

    Ok(())
}
