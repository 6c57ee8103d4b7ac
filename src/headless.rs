use std::time::Instant;

use crate::config::TICK_INTERVAL;
use crate::error::RaceError;
use crate::race::{RaceConfig, RaceScheduler, RaceState, RaceSummary, Track};

/// How a headless race ended
#[derive(Debug)]
pub struct HeadlessOutcome {
    pub ticks: u64,
    /// `None` when the tick budget ran out first
    pub summary: Option<RaceSummary>,
    pub discarded_dispatches: u64,
}

/// Run one race to completion at a fixed frame cadence, without a window
pub fn run(
    scheduler: &mut RaceScheduler,
    config: RaceConfig,
    max_ticks: u64,
) -> Result<HeadlessOutcome, RaceError> {
    scheduler.start(config)?;

    let mut ticks = 0;
    while ticks < max_ticks {
        let frame = Instant::now();
        let report = scheduler.step();
        report.trace_cells();
        ticks += 1;

        if report.state == RaceState::Complete {
            break;
        }
        std::thread::sleep(TICK_INTERVAL.saturating_sub(frame.elapsed()));
    }

    let outcome = HeadlessOutcome {
        ticks,
        summary: scheduler.summary(),
        discarded_dispatches: scheduler.discarded_dispatches(),
    };

    match &outcome.summary {
        Some(summary) => log::info!(
            "{}x{} race finished in {} ticks: sequential {:.3} ms, parallel {:.3} ms ({:.1}x), {} stale dispatches",
            summary.config.grid_width,
            summary.config.grid_height,
            outcome.ticks,
            summary.sequential.as_secs_f64() * 1000.0,
            summary.parallel.as_secs_f64() * 1000.0,
            summary.speedup(),
            outcome.discarded_dispatches
        ),
        None => log::warn!(
            "Stopped after {} ticks: sequential {}/{}, parallel {}/{}",
            outcome.ticks,
            scheduler.produced(Track::Sequential),
            config.total_cells(),
            scheduler.produced(Track::Parallel),
            config.total_cells()
        ),
    }

    Ok(outcome)
}
