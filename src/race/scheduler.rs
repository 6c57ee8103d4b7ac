use std::time::{Duration, Instant};

use crate::config::{MAX_CELLS, MAX_GRID_AXIS};
use crate::error::{ConfigError, RaceError};
use crate::executor::{emulate, CpuExecutor, DispatchTicket, HashParams, ParallelExecutor};
use crate::generation::hash::normalized_float;
use crate::generation::{value_at, Cell, SequentialGenerator};
use crate::race::policy::{VisitOrder, VisitationPolicy};
use crate::race::track::{Track, TrackProgress};

/// Settings for one race. Snapshotted at `start`; later edits only apply to
/// the next run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaceConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    pub seed: u32,
    /// Cells each track may produce per tick
    pub quantum: usize,
    pub policy: VisitationPolicy,
    /// Hash the parallel track with one whole-grid dispatch instead of per-cell calls
    pub accelerated: bool,
}

impl RaceConfig {
    pub fn square(size: u32, seed: u32, quantum: usize) -> Self {
        Self {
            grid_width: size,
            grid_height: size,
            seed,
            quantum,
            policy: VisitationPolicy::Sequential,
            accelerated: false,
        }
    }

    pub fn total_cells(&self) -> usize {
        self.grid_width as usize * self.grid_height as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::EmptyGrid {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        let side = self.grid_width.max(self.grid_height);
        if side > MAX_GRID_AXIS {
            return Err(ConfigError::AxisTooLong {
                side,
                max: MAX_GRID_AXIS,
            });
        }
        let cells = self.total_cells();
        if cells > MAX_CELLS {
            return Err(ConfigError::GridTooLarge {
                cells,
                max: MAX_CELLS,
            });
        }
        if self.quantum == 0 {
            return Err(ConfigError::ZeroQuantum);
        }
        if self.seed == 0 {
            return Err(ConfigError::ZeroSeed);
        }
        Ok(())
    }
}

/// Lifecycle of the scheduler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaceState {
    Idle,
    Running,
    Complete,
}

/// Where the accelerated parallel track stands with its single dispatch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dispatch {
    NotIssued,
    Pending(DispatchTicket),
    Landed,
}

/// Everything belonging to one race, discarded wholesale on reset
struct RaceRun {
    id: u64,
    config: RaceConfig,
    order: VisitOrder,
    sequential: TrackProgress,
    parallel: TrackProgress,
    dispatch: Dispatch,
}

impl RaceRun {
    fn is_complete(&self) -> bool {
        self.sequential.is_complete() && self.parallel.is_complete()
    }
}

/// Cells and progress for one track from a single tick
#[derive(Clone, Debug, Default)]
pub struct TrackTick {
    /// Newly produced cells, in production order
    pub cells: Vec<Cell>,
    pub produced: u32,
    pub total: u32,
    /// Start-to-finish time, `None` until the track completes
    pub elapsed: Option<Duration>,
}

impl TrackTick {
    pub fn elapsed_millis(&self) -> Option<f64> {
        self.elapsed.map(|d| d.as_secs_f64() * 1000.0)
    }
}

/// Output of one `step()`
#[derive(Clone, Debug)]
pub struct StepReport {
    pub state: RaceState,
    pub sequential: TrackTick,
    pub parallel: TrackTick,
}

impl StepReport {
    fn empty(state: RaceState) -> Self {
        Self {
            state,
            sequential: TrackTick::default(),
            parallel: TrackTick::default(),
        }
    }

    pub fn track(&self, track: Track) -> &TrackTick {
        match track {
            Track::Sequential => &self.sequential,
            Track::Parallel => &self.parallel,
        }
    }

    /// Trace every new cell, as handed to the renderer
    pub fn trace_cells(&self) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        for track in [Track::Sequential, Track::Parallel] {
            let tick = self.track(track);
            log::trace!("{} track at {}/{}", track, tick.produced, tick.total);
            for cell in &tick.cells {
                log::trace!(
                    "{} #{} ({}, {}) = {:#010x} ({:.4}) hsl({}, {}%, {}%)",
                    track,
                    cell.index,
                    cell.x,
                    cell.y,
                    cell.value,
                    normalized_float(cell.value),
                    cell.color.hue,
                    cell.color.saturation,
                    cell.color.lightness
                );
            }
        }
    }
}

/// Final timings of a finished race
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaceSummary {
    pub config: RaceConfig,
    pub sequential: Duration,
    pub parallel: Duration,
}

impl RaceSummary {
    /// How many times faster the parallel track finished
    pub fn speedup(&self) -> f64 {
        let parallel = self.parallel.as_secs_f64();
        if parallel > 0.0 {
            self.sequential.as_secs_f64() / parallel
        } else {
            f64::INFINITY
        }
    }
}

/// Drives the sequential and parallel generators across discrete ticks.
///
/// Single-threaded: all state changes happen in `start`, `step` and `reset`.
/// The only asynchronous edge is the executor dispatch, whose results are
/// matched to the run that issued them and dropped if that run is gone.
pub struct RaceScheduler {
    executor: Box<dyn ParallelExecutor>,
    /// Re-seeded by every `start`
    generator: SequentialGenerator,
    run: Option<RaceRun>,
    next_run_id: u64,
    discarded: u64,
}

impl Default for RaceScheduler {
    fn default() -> Self {
        Self::new(Box::new(CpuExecutor::new()))
    }
}

impl RaceScheduler {
    pub fn new(executor: Box<dyn ParallelExecutor>) -> Self {
        Self {
            executor,
            generator: SequentialGenerator::new(0),
            run: None,
            next_run_id: 1,
            discarded: 0,
        }
    }

    pub fn executor_name(&self) -> &str {
        self.executor.name()
    }

    pub fn state(&self) -> RaceState {
        match &self.run {
            None => RaceState::Idle,
            Some(run) if run.is_complete() => RaceState::Complete,
            Some(_) => RaceState::Running,
        }
    }

    /// Configuration of the current run, if any
    pub fn config(&self) -> Option<&RaceConfig> {
        self.run.as_ref().map(|run| &run.config)
    }

    pub fn progress(&self, track: Track) -> Option<&TrackProgress> {
        self.run.as_ref().map(|run| match track {
            Track::Sequential => &run.sequential,
            Track::Parallel => &run.parallel,
        })
    }

    /// Cells produced so far on a track; zero when idle
    pub fn produced(&self, track: Track) -> u32 {
        self.progress(track).map_or(0, TrackProgress::produced)
    }

    /// Dispatch results that arrived for a run that no longer exists
    pub fn discarded_dispatches(&self) -> u64 {
        self.discarded
    }

    pub fn summary(&self) -> Option<RaceSummary> {
        let run = self.run.as_ref()?;
        Some(RaceSummary {
            config: run.config,
            sequential: run.sequential.elapsed()?,
            parallel: run.parallel.elapsed()?,
        })
    }

    /// Begin a new race, superseding any current one.
    ///
    /// An invalid config is rejected without touching the current state.
    pub fn start(&mut self, config: RaceConfig) -> Result<(), RaceError> {
        config.validate()?;

        let id = self.next_run_id;
        self.next_run_id += 1;

        self.generator.initialize(u64::from(config.seed));

        let total = config.total_cells() as u32;
        let now = Instant::now();
        self.run = Some(RaceRun {
            id,
            config,
            order: VisitOrder::build(
                config.policy,
                config.grid_width,
                config.grid_height,
                config.seed,
            ),
            sequential: TrackProgress::new(total, now),
            parallel: TrackProgress::new(total, now),
            dispatch: Dispatch::NotIssued,
        });

        log::info!(
            "Race {} started: {}x{} grid, seed {}, quantum {}, policy {}, {}",
            id,
            config.grid_width,
            config.grid_height,
            config.seed,
            config.quantum,
            config.policy,
            if config.accelerated {
                self.executor.name()
            } else {
                "scalar hash"
            }
        );
        Ok(())
    }

    /// Drop the current run and return to idle.
    ///
    /// An outstanding dispatch keeps running; its result is discarded on arrival.
    pub fn reset(&mut self) {
        if let Some(run) = self.run.take() {
            log::info!("Race {} reset", run.id);
        }
    }

    /// Advance both tracks by one tick.
    ///
    /// Each track moves independently by at most one quantum; neither reads
    /// the other's progress. A track finishing this tick is stamped at the
    /// tick start plus the time spent on its own work only, so the order
    /// the tracks run in within a tick never decides the race.
    pub fn step(&mut self) -> StepReport {
        let tick_start = Instant::now();

        // Submitting and collecting dispatches is parallel-track work
        let parallel_work = Instant::now();
        if let Some(run) = self.run.as_mut() {
            if run.config.accelerated && run.dispatch == Dispatch::NotIssued {
                let ticket = DispatchTicket(run.id);
                self.executor.submit(ticket, hash_params(&run.config));
                run.dispatch = Dispatch::Pending(ticket);
            }
        }

        // Drained even when idle so stale results are dropped promptly
        let landed = self.collect_dispatches();
        let parallel_start = tick_start + parallel_work.elapsed();

        let state = self.state();
        let Some(run) = self.run.as_mut() else {
            return StepReport::empty(state);
        };
        if state == RaceState::Complete {
            return StepReport::empty(state);
        }

        let sequential = step_sequential(run, &mut self.generator, tick_start);
        let parallel = match (run.config.accelerated, landed) {
            (false, _) => step_scalar(run, parallel_start),
            (true, Some(values)) => integrate(run, values, parallel_start),
            (true, None) => tick_for(&run.parallel, Vec::new()),
        };

        for (track, tick) in [(Track::Sequential, &sequential), (Track::Parallel, &parallel)] {
            if tick.cells.is_empty() {
                continue;
            }
            if let Some(ms) = tick.elapsed_millis() {
                log::info!("Race {}: {} track finished in {:.3} ms", run.id, track, ms);
            }
            if track == Track::Sequential && run.sequential.is_complete() {
                log::debug!("Sequential registers at finish: {:?}", self.generator.state());
            }
        }

        StepReport {
            state: self.state(),
            sequential,
            parallel,
        }
    }

    /// Drain finished dispatches, keeping only the one owned by the current run
    fn collect_dispatches(&mut self) -> Option<Vec<u32>> {
        let mut landed = None;
        while let Some(result) = self.executor.poll() {
            let current = self.run.as_ref().and_then(|run| match run.dispatch {
                Dispatch::Pending(ticket) if ticket == result.ticket => Some(run),
                _ => None,
            });

            let Some(run) = current else {
                self.discarded += 1;
                log::debug!("Discarded stale dispatch from run {}", result.ticket.0);
                continue;
            };

            landed = Some(match result.values {
                Ok(values) => values,
                Err(e) => {
                    log::warn!("Dispatch for run {} failed ({}), emulating on CPU", run.id, e);
                    emulate(&hash_params(&run.config))
                }
            });
        }
        landed
    }
}

fn hash_params(config: &RaceConfig) -> HashParams {
    HashParams::new(config.grid_width, config.grid_height, config.seed)
}

fn tick_for(progress: &TrackProgress, cells: Vec<Cell>) -> TrackTick {
    TrackTick {
        cells,
        produced: progress.produced(),
        total: progress.total(),
        elapsed: progress.elapsed(),
    }
}

/// Offset `from` by the time elapsed since `work` began
fn stamp(from: Instant, work: Instant) -> Instant {
    from + work.elapsed()
}

/// Up to one quantum of values from the ordered generator, row-major
fn step_sequential(
    run: &mut RaceRun,
    generator: &mut SequentialGenerator,
    from: Instant,
) -> TrackTick {
    let work = Instant::now();
    let count = run.sequential.remaining().min(quantum_cells(&run.config));
    let width = run.config.grid_width;

    let mut cells = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let index = generator.cursor() as u32;
        let value = generator.produce_next();
        cells.push(Cell::at_index(index, width, u32::from(value)));
    }

    run.sequential.advance(count, stamp(from, work));
    tick_for(&run.sequential, cells)
}

/// Up to one quantum of hash values, visited in policy order
fn step_scalar(run: &mut RaceRun, from: Instant) -> TrackTick {
    let work = Instant::now();
    let count = run.parallel.remaining().min(quantum_cells(&run.config));
    let RaceConfig {
        grid_width, seed, ..
    } = run.config;
    let start = run.parallel.produced();

    let mut cells = Vec::with_capacity(count as usize);
    for progress in start..start + count {
        let index = run.order.index_at(progress);
        let value = value_at(index % grid_width, index / grid_width, seed);
        cells.push(Cell::at_index(index, grid_width, value));
    }

    run.parallel.advance(count, stamp(from, work));
    tick_for(&run.parallel, cells)
}

/// Consume a whole-grid buffer as one instantaneous quantum
fn integrate(run: &mut RaceRun, values: Vec<u32>, from: Instant) -> TrackTick {
    let work = Instant::now();
    run.dispatch = Dispatch::Landed;
    let width = run.config.grid_width;
    let params = hash_params(&run.config);

    let values = if values.len() == params.cell_count() {
        values
    } else {
        log::error!(
            "Dispatch for run {} returned {} values, expected {}; emulating on CPU",
            run.id,
            values.len(),
            params.cell_count()
        );
        emulate(&params)
    };

    let start = run.parallel.produced() as usize;
    let cells: Vec<Cell> = values[start..]
        .iter()
        .enumerate()
        .map(|(offset, &value)| Cell::at_index((start + offset) as u32, width, value))
        .collect();

    run.parallel.advance(cells.len() as u32, stamp(from, work));
    tick_for(&run.parallel, cells)
}

fn quantum_cells(config: &RaceConfig) -> u32 {
    config.quantum.min(u32::MAX as usize) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WORKGROUP_SIZE;
    use crate::error::GpuError;
    use crate::executor::DispatchResult;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct GateState {
        submitted: Vec<(DispatchTicket, HashParams)>,
        ready: VecDeque<DispatchResult>,
        fail: bool,
    }

    /// Handle that decides when held dispatches finish
    #[derive(Clone, Default)]
    struct Gate(Rc<RefCell<GateState>>);

    impl Gate {
        fn release(&self) {
            let mut state = self.0.borrow_mut();
            let GateState {
                submitted,
                ready,
                fail,
            } = &mut *state;
            for (ticket, params) in submitted.drain(..) {
                let values = if *fail {
                    Err(GpuError::Disconnected)
                } else {
                    Ok(emulate(&params))
                };
                ready.push_back(DispatchResult { ticket, values });
            }
        }

        fn submitted(&self) -> usize {
            self.0.borrow().submitted.len()
        }
    }

    /// Executor whose dispatches only finish when the test releases them
    struct HeldExecutor(Gate);

    impl ParallelExecutor for HeldExecutor {
        fn name(&self) -> &str {
            "held"
        }

        fn submit(&mut self, ticket: DispatchTicket, params: HashParams) {
            self.0 .0.borrow_mut().submitted.push((ticket, params));
        }

        fn poll(&mut self) -> Option<DispatchResult> {
            self.0 .0.borrow_mut().ready.pop_front()
        }
    }

    /// Executor that spends a fixed time in every submit, then finishes at once
    struct SlowExecutor {
        delay: Duration,
        ready: VecDeque<DispatchResult>,
    }

    impl ParallelExecutor for SlowExecutor {
        fn name(&self) -> &str {
            "slow"
        }

        fn submit(&mut self, ticket: DispatchTicket, params: HashParams) {
            std::thread::sleep(self.delay);
            self.ready.push_back(DispatchResult {
                ticket,
                values: Ok(emulate(&params)),
            });
        }

        fn poll(&mut self) -> Option<DispatchResult> {
            self.ready.pop_front()
        }
    }

    fn held_scheduler() -> (RaceScheduler, Gate) {
        let gate = Gate::default();
        let scheduler = RaceScheduler::new(Box::new(HeldExecutor(gate.clone())));
        (scheduler, gate)
    }

    fn accelerated(size: u32, seed: u32) -> RaceConfig {
        RaceConfig {
            accelerated: true,
            ..RaceConfig::square(size, seed, 1)
        }
    }

    #[test]
    fn test_one_quantum_finishes_small_grid() {
        let mut scheduler = RaceScheduler::default();
        scheduler.start(RaceConfig::square(4, 42, 16)).unwrap();
        assert_eq!(scheduler.state(), RaceState::Running);

        let report = scheduler.step();
        assert_eq!(report.state, RaceState::Complete);
        assert_eq!(scheduler.state(), RaceState::Complete);
        assert_eq!(scheduler.produced(Track::Sequential), 16);
        assert_eq!(scheduler.produced(Track::Parallel), 16);
        assert_eq!(report.sequential.cells.len(), 16);
        assert_eq!(report.parallel.cells.len(), 16);
        assert!(report.sequential.elapsed.is_some());
        assert!(report.parallel.elapsed.is_some());
    }

    #[test]
    fn test_progress_moves_by_exact_quanta() {
        let mut scheduler = RaceScheduler::default();
        scheduler.start(RaceConfig::square(2, 1, 1)).unwrap();

        for expected in 1..=3 {
            let report = scheduler.step();
            assert_eq!(scheduler.produced(Track::Sequential), expected);
            assert_eq!(scheduler.produced(Track::Parallel), expected);
            assert_eq!(report.sequential.cells.len(), 1);
            assert_eq!(report.sequential.elapsed, None);
            assert_eq!(report.state, RaceState::Running);
        }

        let report = scheduler.step();
        assert_eq!(scheduler.produced(Track::Sequential), 4);
        assert_eq!(report.state, RaceState::Complete);

        // No overshoot once complete
        let report = scheduler.step();
        assert!(report.sequential.cells.is_empty());
        assert_eq!(scheduler.produced(Track::Sequential), 4);
    }

    #[test]
    fn test_last_quantum_is_truncated() {
        let mut scheduler = RaceScheduler::default();
        scheduler.start(RaceConfig::square(3, 5, 4)).unwrap();
        let sizes: Vec<usize> = (0..3).map(|_| scheduler.step().sequential.cells.len()).collect();
        assert_eq!(sizes, vec![4, 4, 1]);
        assert_eq!(scheduler.state(), RaceState::Complete);
    }

    #[test]
    fn test_reset_before_first_step() {
        let mut scheduler = RaceScheduler::default();
        scheduler.start(RaceConfig::square(8, 42, 4)).unwrap();
        scheduler.reset();

        assert_eq!(scheduler.state(), RaceState::Idle);
        assert_eq!(scheduler.produced(Track::Sequential), 0);
        assert_eq!(scheduler.produced(Track::Parallel), 0);
        assert!(scheduler.config().is_none());

        let report = scheduler.step();
        assert_eq!(report.state, RaceState::Idle);
        assert!(report.sequential.cells.is_empty());
        assert!(report.parallel.cells.is_empty());
    }

    #[test]
    fn test_invalid_config_changes_nothing() {
        let mut scheduler = RaceScheduler::default();
        assert_eq!(
            scheduler.start(RaceConfig::square(0, 42, 4)),
            Err(RaceError::Configuration(ConfigError::EmptyGrid {
                width: 0,
                height: 0
            }))
        );
        assert_eq!(scheduler.state(), RaceState::Idle);

        let config = RaceConfig::square(8, 42, 4);
        scheduler.start(config).unwrap();
        scheduler.step();

        let bad = [
            RaceConfig::square(8, 42, 0),
            RaceConfig::square(8, 0, 4),
            RaceConfig::square(1 << 13, 42, 4),
        ];
        for bad_config in bad {
            assert!(scheduler.start(bad_config).is_err());
            assert_eq!(scheduler.state(), RaceState::Running);
            assert_eq!(scheduler.config(), Some(&config));
            assert_eq!(scheduler.produced(Track::Sequential), 4);
        }
    }

    #[test]
    fn test_cell_limit_boundary() {
        let at_limit = RaceConfig::square(4096, 42, 1);
        assert_eq!(at_limit.total_cells(), MAX_CELLS);
        assert_eq!(at_limit.validate(), Ok(()));

        // 2^24 + 1 = 24929 * 673
        let over = RaceConfig {
            grid_width: 24_929,
            grid_height: 673,
            ..at_limit
        };
        assert_eq!(
            over.validate(),
            Err(ConfigError::GridTooLarge {
                cells: MAX_CELLS + 1,
                max: MAX_CELLS
            })
        );

        let mut scheduler = RaceScheduler::default();
        assert!(scheduler.start(over).is_err());
        assert_eq!(scheduler.state(), RaceState::Idle);
        scheduler.start(at_limit).unwrap();
        assert_eq!(scheduler.state(), RaceState::Running);
    }

    #[test]
    fn test_axis_beyond_dispatch_limit_is_rejected() {
        // Within the cell limit but too many workgroups along x
        let long = RaceConfig {
            grid_width: 1 << 21,
            grid_height: 8,
            accelerated: true,
            ..RaceConfig::square(1, 42, 1)
        };
        assert_eq!(long.total_cells(), MAX_CELLS);
        assert_eq!(
            long.validate(),
            Err(ConfigError::AxisTooLong {
                side: 1 << 21,
                max: MAX_GRID_AXIS
            })
        );

        let tall = RaceConfig {
            grid_width: 8,
            grid_height: 1 << 21,
            ..long
        };
        let mut scheduler = RaceScheduler::default();
        assert!(scheduler.start(tall).is_err());
        assert_eq!(scheduler.state(), RaceState::Idle);

        let widest = RaceConfig {
            grid_width: MAX_GRID_AXIS,
            grid_height: WORKGROUP_SIZE,
            ..long
        };
        assert_eq!(widest.validate(), Ok(()));
    }

    #[test]
    fn test_restart_reseeds_sequential_generator() {
        let values = |cells: Vec<Cell>| cells.iter().map(|c| c.value).collect::<Vec<u32>>();

        let mut scheduler = RaceScheduler::default();
        scheduler.start(RaceConfig::square(4, 5, 3)).unwrap();
        let first = values(scheduler.step().sequential.cells);
        scheduler.step();

        scheduler.start(RaceConfig::square(4, 5, 3)).unwrap();
        let report = scheduler.step();
        assert_eq!(report.sequential.cells[0].index, 0);
        assert_eq!(values(report.sequential.cells), first);

        scheduler.reset();
        scheduler.start(RaceConfig::square(4, 6, 1)).unwrap();
        let report = scheduler.step();
        let mut reference = SequentialGenerator::new(6);
        assert_eq!(report.sequential.cells[0].value, u32::from(reference.produce_next()));
    }

    #[test]
    fn test_dispatch_cost_is_not_charged_to_sequential_track() {
        let delay = Duration::from_millis(40);
        let mut scheduler = RaceScheduler::new(Box::new(SlowExecutor {
            delay,
            ready: VecDeque::new(),
        }));
        scheduler
            .start(RaceConfig {
                accelerated: true,
                ..RaceConfig::square(2, 42, 4)
            })
            .unwrap();

        let report = scheduler.step();
        assert_eq!(report.state, RaceState::Complete);

        let summary = scheduler.summary().expect("both tracks finished");
        assert!(summary.parallel >= delay, "parallel {:?}", summary.parallel);
        assert!(summary.sequential < delay, "sequential {:?}", summary.sequential);
    }

    #[test]
    fn test_track_times_exclude_each_others_work() {
        let mut scheduler = RaceScheduler::default();
        let before = Instant::now();
        scheduler.start(RaceConfig::square(256, 42, 1 << 16)).unwrap();
        scheduler.step();
        let wall = before.elapsed();

        // Both finish in one tick; charged separately they fit inside it
        let summary = scheduler.summary().expect("one tick finishes both tracks");
        assert!(
            summary.sequential + summary.parallel <= wall + wall / 4,
            "sequential {:?} + parallel {:?} against a {:?} tick",
            summary.sequential,
            summary.parallel,
            wall
        );
    }

    #[test]
    fn test_sequential_track_replays_generator_row_major() {
        let mut scheduler = RaceScheduler::default();
        scheduler.start(RaceConfig::square(5, 77, 7)).unwrap();

        let mut cells = Vec::new();
        while scheduler.state() == RaceState::Running {
            cells.extend(scheduler.step().sequential.cells);
        }

        let mut reference = SequentialGenerator::new(77);
        assert_eq!(cells.len(), 25);
        for (i, cell) in cells.iter().enumerate() {
            assert_eq!(cell.index, i as u32);
            assert_eq!((cell.x, cell.y), (i as u32 % 5, i as u32 / 5));
            assert_eq!(cell.value, u32::from(reference.produce_next()));
        }
    }

    #[test]
    fn test_parallel_track_follows_policy() {
        for policy in VisitationPolicy::ALL {
            let mut scheduler = RaceScheduler::default();
            let config = RaceConfig {
                policy,
                ..RaceConfig::square(6, 42, 5)
            };
            scheduler.start(config).unwrap();

            let mut cells = Vec::new();
            while scheduler.state() == RaceState::Running {
                cells.extend(scheduler.step().parallel.cells);
            }

            let order = VisitOrder::build(policy, 6, 6, 42);
            assert_eq!(cells.len(), 36);
            for (p, cell) in cells.iter().enumerate() {
                assert_eq!(cell.index, order.index_at(p as u32));
                assert_eq!(cell.value, value_at(cell.x, cell.y, 42));
            }
        }
    }

    #[test]
    fn test_same_seed_same_race() {
        let collect = || {
            let mut scheduler = RaceScheduler::default();
            scheduler.start(RaceConfig::square(7, 1234, 3)).unwrap();
            let mut values = Vec::new();
            while scheduler.state() == RaceState::Running {
                let report = scheduler.step();
                values.extend(report.sequential.cells.iter().map(|c| c.value));
                values.extend(report.parallel.cells.iter().map(|c| c.value));
            }
            values
        };
        assert_eq!(collect(), collect());
    }

    #[test]
    fn test_dispatch_lands_as_one_quantum() {
        let mut scheduler = RaceScheduler::default();
        scheduler.start(accelerated(16, 42)).unwrap();

        let report = scheduler.step();
        assert_eq!(report.parallel.cells.len(), 256);
        assert_eq!(report.parallel.produced, 256);
        assert!(report.parallel.elapsed.is_some());
        assert_eq!(report.sequential.produced, 1);
        assert_eq!(report.state, RaceState::Running);

        let expected = emulate(&HashParams::new(16, 16, 42));
        for cell in &report.parallel.cells {
            assert_eq!(cell.value, expected[cell.index as usize]);
            assert_eq!(cell.value, value_at(cell.x, cell.y, 42));
        }

        // The finished track stays quiet while the other keeps going
        let report = scheduler.step();
        assert!(report.parallel.cells.is_empty());
        assert_eq!(report.sequential.cells.len(), 1);
    }

    #[test]
    fn test_pending_dispatch_does_not_block_sequential_track() {
        let (mut scheduler, gate) = held_scheduler();
        scheduler.start(accelerated(4, 9)).unwrap();

        for tick in 1..=3 {
            let report = scheduler.step();
            assert_eq!(report.sequential.produced, tick);
            assert_eq!(report.parallel.produced, 0);
        }
        // Exactly one dispatch per run
        assert_eq!(gate.submitted(), 1);

        gate.release();
        let report = scheduler.step();
        assert_eq!(report.parallel.produced, 16);
        assert_eq!(scheduler.discarded_dispatches(), 0);
    }

    #[test]
    fn test_stale_dispatch_is_discarded_after_reset() {
        let (mut scheduler, gate) = held_scheduler();
        scheduler.start(accelerated(4, 1)).unwrap();
        scheduler.step();
        scheduler.reset();

        let next = accelerated(4, 2);
        scheduler.start(next).unwrap();
        scheduler.step();
        assert_eq!(gate.submitted(), 2);

        gate.release();
        let report = scheduler.step();

        assert_eq!(scheduler.discarded_dispatches(), 1);
        assert_eq!(report.parallel.produced, 16);
        let expected = emulate(&HashParams::new(4, 4, 2));
        let values: Vec<u32> = report.parallel.cells.iter().map(|c| c.value).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_stale_dispatch_while_idle_leaves_progress_alone() {
        let (mut scheduler, gate) = held_scheduler();
        scheduler.start(accelerated(4, 1)).unwrap();
        scheduler.step();
        scheduler.reset();

        gate.release();
        let report = scheduler.step();
        assert_eq!(report.state, RaceState::Idle);
        assert_eq!(scheduler.discarded_dispatches(), 1);
        assert_eq!(scheduler.produced(Track::Parallel), 0);
        assert!(report.parallel.cells.is_empty());
    }

    #[test]
    fn test_restart_while_pending_supersedes_run() {
        let (mut scheduler, gate) = held_scheduler();
        scheduler.start(accelerated(4, 1)).unwrap();
        scheduler.step();

        // No reset: starting again must still orphan the first dispatch
        scheduler.start(accelerated(4, 3)).unwrap();
        gate.release();
        let report = scheduler.step();
        assert_eq!(scheduler.discarded_dispatches(), 1);
        assert_eq!(report.parallel.produced, 0);

        gate.release();
        let report = scheduler.step();
        assert_eq!(report.parallel.produced, 16);
        assert_eq!(report.parallel.cells[0].value, value_at(0, 0, 3));
    }

    #[test]
    fn test_failed_dispatch_falls_back_to_scalar() {
        let (mut scheduler, gate) = held_scheduler();
        gate.0.borrow_mut().fail = true;
        scheduler.start(accelerated(4, 42)).unwrap();
        scheduler.step();

        gate.release();
        let report = scheduler.step();
        assert_eq!(report.parallel.produced, 16);
        let values: Vec<u32> = report.parallel.cells.iter().map(|c| c.value).collect();
        assert_eq!(values, emulate(&HashParams::new(4, 4, 42)));
    }

    #[test]
    fn test_summary_only_when_complete() {
        let mut scheduler = RaceScheduler::default();
        assert!(scheduler.summary().is_none());

        let config = RaceConfig::square(3, 42, 2);
        scheduler.start(config).unwrap();
        scheduler.step();
        assert!(scheduler.summary().is_none());

        while scheduler.state() == RaceState::Running {
            scheduler.step();
        }
        let summary = scheduler.summary().expect("race finished");
        assert_eq!(summary.config, config);
        assert!(summary.speedup() >= 0.0);
    }

    #[test]
    fn test_speedup_ratio() {
        let summary = RaceSummary {
            config: RaceConfig::square(4, 1, 1),
            sequential: Duration::from_millis(30),
            parallel: Duration::from_millis(10),
        };
        assert!((summary.speedup() - 3.0).abs() < 1e-9);

        let instant = RaceSummary {
            parallel: Duration::ZERO,
            ..summary
        };
        assert!(instant.speedup().is_infinite());
    }
}
