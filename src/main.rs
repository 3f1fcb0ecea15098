//! Billiards Sim entry point
//!
//! Racks a table, strikes the cue ball and prints what happened. With
//! `--batch` it fans a spread of aim angles out over a worker pool.

#[cfg(not(target_arch = "wasm32"))]
use clap::Parser;

#[cfg(not(target_arch = "wasm32"))]
use billiards_sim::{
    Params, ShotPool,
    sim::{CollisionKind, Shot, SimResult, SimulationState, strike},
};

/// Simulate a billiards shot from a standard rack
#[cfg(not(target_arch = "wasm32"))]
#[derive(Parser, Debug)]
#[command(name = "billiards-sim")]
#[command(about = "Deterministic event-driven billiards physics", long_about = None)]
struct Args {
    /// Aim angle in radians (0 points at the rack)
    #[arg(short, long, default_value = "0.0", allow_negative_numbers = true)]
    angle: f64,

    /// Strike strength in engine units
    #[arg(short, long, default_value = "10.0")]
    force: f64,

    /// Side spin, -1 to 1
    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    side: f64,

    /// Top spin, -1 (draw) to 1 (follow)
    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    top: f64,

    /// Cue elevation in radians
    #[arg(long, default_value = "0.0")]
    lift: f64,

    /// Rack seed (ball orientations only)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Physics parameters as JSON; missing fields keep their defaults
    #[arg(short, long)]
    params: Option<String>,

    /// Evaluate this many angles spread around --angle
    #[arg(short, long)]
    batch: Option<usize>,

    /// Worker threads for --batch
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

/// Half-width of the --batch aim fan (radians)
#[cfg(not(target_arch = "wasm32"))]
const BATCH_SPREAD: f64 = 0.05;

#[cfg(not(target_arch = "wasm32"))]
fn summary(shot: &Shot, result: &SimResult) -> String {
    format!(
        "angle={:+.4} force={:.2}: {:.2}s in {} ticks ({} substeps), \
         {} ball / {} cushion hits, first struck {:?}, potted {:?}, ejected {:?}{}{}",
        shot.angle,
        shot.force,
        result.elapsed,
        result.steps,
        result.substeps,
        result.count(CollisionKind::BallBall),
        result.count(CollisionKind::BallCushion),
        result.first_struck,
        result.balls_potted,
        result.balls_ejected,
        if result.scratch { ", SCRATCH" } else { "" },
        if result.capped { ", capped" } else { "" },
    )
}

#[cfg(not(target_arch = "wasm32"))]
fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            log::error!("Failed to serialize result: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    let args = Args::parse();

    let params = match &args.params {
        Some(path) => Params::load(path),
        None => Params::default(),
    };
    let shot = Shot::new(args.angle, args.force)
        .with_spin(args.side, args.top)
        .with_lift(args.lift);
    let state = SimulationState::standard_rack(&params, args.seed);
    log::info!("Billiards Sim starting (seed {})", args.seed);

    match args.batch {
        Some(count) if count > 0 => {
            let shots: Vec<Shot> = (0..count)
                .map(|i| {
                    let offset = if count == 1 {
                        0.0
                    } else {
                        BATCH_SPREAD * (2.0 * i as f64 / (count - 1) as f64 - 1.0)
                    };
                    Shot {
                        angle: shot.angle + offset,
                        ..shot
                    }
                })
                .collect();
            let mut pool = ShotPool::new(args.workers);
            let outputs = pool.evaluate_batch(&state, &shots, &params);
            if args.json {
                let results: Vec<&SimResult> = outputs.iter().map(|o| &o.result).collect();
                print_json(&results);
            } else {
                for output in &outputs {
                    println!("{}", summary(&output.shot, &output.result));
                }
            }
        }
        _ => {
            let mut state = state;
            let result = strike(&mut state, &shot, &params);
            if args.json {
                print_json(&result);
            } else {
                println!("{}", summary(&shot, &result));
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Library-only on wasm; embedders drive `sim` directly
}
