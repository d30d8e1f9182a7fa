// Headless run loop: real-time clock -> ticks, field step once per frame,
// four music sub-steps per frame, events drained by a transport thread.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use chaosgrid::config::SceneConfig;
use chaosgrid::core::timebase::Tick;
use chaosgrid::engine::Engine;

const MUSIC_SUBSTEPS: u32 = 4;
const SUBSTEP_SLEEP: Duration = Duration::from_micros(4_167); // ~240 Hz

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Scene description (TOML); created with the default scene if absent
    #[arg(long, default_value = "chaosgrid.toml")]
    scene: String,

    /// Override the scene's RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(long)]
    duration: Option<f32>,
}

/// Field time step, stretched near beat boundaries so node motion pulses
/// with the groove.
fn beat_warp_dt(tick: Tick, ticks_per_beat: u32) -> f32 {
    let phase = (tick % ticks_per_beat as Tick) as f32;
    let to_edge = phase.min(ticks_per_beat as f32 - phase) + 1.0;
    1.0 + (40.0 / to_edge).min(10.0)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = SceneConfig::load_or_default(&args.scene);
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let transport = std::thread::spawn(move || {
        // Stand-in for a wire transport: log everything that would go out.
        for msg in rx.iter() {
            debug!(?msg, "midi out");
        }
    });

    let mut engine = Engine::from_config(&cfg, Box::new(tx))?;
    info!(
        voices = engine.voices.len(),
        bodies = engine.field.len(),
        "scene ready"
    );

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_for_ctrlc = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_for_ctrlc.store(true, Ordering::SeqCst);
    })?;

    let start = Instant::now();
    while !stop_flag.load(Ordering::SeqCst) {
        let elapsed = start.elapsed().as_secs_f32();
        if let Some(duration) = args.duration {
            if elapsed >= duration {
                break;
            }
        }

        let tick = engine.timebase.tick_at(elapsed);
        let dt = beat_warp_dt(tick, engine.timebase.ticks_per_beat);
        engine.advance_field(dt);
        engine.emit_motion_cc();

        for _ in 0..MUSIC_SUBSTEPS {
            let tick = engine.timebase.tick_at(start.elapsed().as_secs_f32());
            engine.advance_music(tick);
            std::thread::sleep(SUBSTEP_SLEEP);
        }
    }

    info!("stopping: releasing all gated notes");
    engine.shutdown();
    drop(engine);
    let _ = transport.join();
    Ok(())
}
