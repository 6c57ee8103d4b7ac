mod app;
mod config;
mod error;
mod executor;
mod generation;
mod gpu;
mod headless;
mod race;

use clap::Parser;
use winit::event_loop::{ControlFlow, EventLoop};

use crate::app::App;
use crate::config::{
    clamp_grid_size, clamp_quantum, clamp_seed, DEFAULT_GRID_SIZE, DEFAULT_MAX_TICKS,
    DEFAULT_QUANTUM, DEFAULT_SEED,
};
use crate::race::{RaceConfig, RaceScheduler, VisitationPolicy};

/// Race an ordered state-machine generator against a coordinate hash
#[derive(Parser, Debug)]
#[command(name = "hash-race", version)]
struct Args {
    /// Grid side length (clamped to 10..=50, or 16..=128 when accelerated)
    #[arg(long, default_value_t = DEFAULT_GRID_SIZE)]
    grid: u32,

    /// World seed (clamped to 1..=9999)
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u32,

    /// Cells each track may produce per tick
    #[arg(long, default_value_t = DEFAULT_QUANTUM)]
    quantum: usize,

    /// Order in which the parallel track visits cells
    #[arg(long, value_enum, default_value_t = VisitationPolicy::Sequential)]
    policy: VisitationPolicy,

    /// Hash the whole grid in one GPU dispatch (falls back to CPU emulation)
    #[arg(long)]
    accelerated: bool,

    /// Run one race without a window and log the result
    #[arg(long)]
    headless: bool,

    /// Tick budget for a headless race
    #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
    max_ticks: u64,
}

impl Args {
    fn race_config(&self) -> RaceConfig {
        let size = clamp_grid_size(self.grid, self.accelerated);
        RaceConfig {
            grid_width: size,
            grid_height: size,
            seed: clamp_seed(self.seed),
            quantum: clamp_quantum(self.quantum),
            policy: self.policy,
            accelerated: self.accelerated,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.race_config();

    if args.headless {
        let mut scheduler = RaceScheduler::new(executor::acquire(config.accelerated));
        headless::run(&mut scheduler, config, args.max_ticks)?;
        return Ok(());
    }

    // The window can toggle acceleration at any time, so always try for the GPU
    let scheduler = RaceScheduler::new(executor::acquire(true));

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(scheduler, config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
