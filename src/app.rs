use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::config::{clamp_grid_size, clamp_quantum, SEED_MAX, SEED_MIN};
use crate::race::{RaceConfig, RaceScheduler, RaceState, StepReport, Track};

/// Window driver: one scheduler tick per redraw.
///
/// Drawing the cells is left to the renderer; the title bar carries the race.
pub struct App {
    window: Option<Arc<Window>>,
    scheduler: RaceScheduler,
    /// Edited by the keyboard, applied on the next start
    pending: RaceConfig,
    tick_counter: TickCounter,
    tick_rate: f64,
}

impl App {
    pub fn new(scheduler: RaceScheduler, config: RaceConfig) -> Self {
        Self {
            window: None,
            scheduler,
            pending: config,
            tick_counter: TickCounter::new(),
            tick_rate: 0.0,
        }
    }

    fn start_race(&mut self) {
        if let Err(e) = self.scheduler.start(self.pending) {
            log::error!("Cannot start race: {}", e);
        }
        self.update_title();
    }

    fn tick(&mut self) {
        let report = self.scheduler.step();
        report.trace_cells();

        let finished = track_finished(&report, Track::Sequential)
            || track_finished(&report, Track::Parallel);
        if let Some(rate) = self.tick_counter.tick() {
            self.tick_rate = rate;
            self.update_title();
        } else if finished {
            self.update_title();
        }
    }

    fn update_title(&self) {
        let Some(window) = &self.window else {
            return;
        };

        let now = Instant::now();
        let track_label = |track: Track| match self.scheduler.progress(track) {
            Some(progress) => format!(
                "{} {}/{} {:.1} ms{}",
                track,
                progress.produced(),
                progress.total(),
                progress.running_time(now).as_secs_f64() * 1000.0,
                if progress.is_complete() { " done" } else { "" }
            ),
            None => format!("{} -", track),
        };

        let state = match self.scheduler.state() {
            RaceState::Idle => "idle",
            RaceState::Running => "running",
            RaceState::Complete => "complete",
        };

        let setup = match self.scheduler.config() {
            Some(config) => format!(" seed {} {}", config.seed, config.policy),
            None => String::new(),
        };

        window.set_title(&format!(
            "Hash Race [{}{}] {} | {} - {:.0} ticks/s",
            state,
            setup,
            track_label(Track::Sequential),
            track_label(Track::Parallel),
            self.tick_rate
        ));
    }

    fn handle_key(&mut self, key_code: KeyCode) {
        match key_code {
            // Start (or restart) with the pending configuration
            KeyCode::Space => {
                self.start_race();
                return;
            }

            KeyCode::KeyR => {
                self.scheduler.reset();
                self.update_title();
                return;
            }

            KeyCode::KeyN => {
                self.pending.seed = rand::thread_rng().gen_range(SEED_MIN..=SEED_MAX);
            }

            KeyCode::KeyP => {
                self.pending.policy = self.pending.policy.next();
            }

            KeyCode::KeyG => {
                self.pending.accelerated = !self.pending.accelerated;
                let size = clamp_grid_size(self.pending.grid_width, self.pending.accelerated);
                self.pending.grid_width = size;
                self.pending.grid_height = size;
            }

            KeyCode::ArrowUp | KeyCode::ArrowDown => {
                let size = if key_code == KeyCode::ArrowUp {
                    self.pending.grid_width.saturating_add(1)
                } else {
                    self.pending.grid_width.saturating_sub(1)
                };
                let size = clamp_grid_size(size, self.pending.accelerated);
                self.pending.grid_width = size;
                self.pending.grid_height = size;
            }

            KeyCode::BracketLeft => {
                self.pending.quantum = clamp_quantum(self.pending.quantum / 2);
            }
            KeyCode::BracketRight => {
                self.pending.quantum = clamp_quantum(self.pending.quantum.saturating_mul(2));
            }

            _ => return,
        }

        log::info!(
            "Next race: {}x{} grid, seed {}, quantum {}, policy {}, accelerated {} (Space to start)",
            self.pending.grid_width,
            self.pending.grid_height,
            self.pending.seed,
            self.pending.quantum,
            self.pending.policy,
            self.pending.accelerated
        );
    }
}

fn track_finished(report: &StepReport, track: Track) -> bool {
    let tick = report.track(track);
    !tick.cells.is_empty() && tick.elapsed.is_some()
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        log::info!("Initializing Hash Race...");
        log::info!("Parallel backend: {}", self.scheduler.executor_name());

        let window_attrs = Window::default_attributes()
            .with_title("Hash Race - Initializing...")
            .with_inner_size(winit::dpi::LogicalSize::new(960, 540));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        log::info!("Controls:");
        log::info!("  Space: Start / restart race");
        log::info!("  R: Reset");
        log::info!("  N: New random seed");
        log::info!("  P: Cycle visitation policy");
        log::info!("  G: Toggle accelerated parallel track");
        log::info!("  Up/Down: Grid size");
        log::info!("  [/]: Halve/double quantum");
        log::info!("  Escape: Quit");

        window.request_redraw();
        self.window = Some(window);
        self.start_race();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() {
                    if let PhysicalKey::Code(key_code) = event.physical_key {
                        if key_code == KeyCode::Escape {
                            log::info!("Escape pressed, exiting...");
                            event_loop.exit();
                        } else {
                            self.handle_key(key_code);
                        }
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                self.tick();
                // Request another frame immediately
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Counts scheduler ticks, reporting the rate once per second
struct TickCounter {
    last_update: Instant,
    tick_count: u32,
}

impl TickCounter {
    fn new() -> Self {
        Self {
            last_update: Instant::now(),
            tick_count: 0,
        }
    }

    /// Returns Some(ticks per second) every second
    fn tick(&mut self) -> Option<f64> {
        self.tick_count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed.as_secs_f64() >= 1.0 {
            let rate = self.tick_count as f64 / elapsed.as_secs_f64();
            self.tick_count = 0;
            self.last_update = Instant::now();
            Some(rate)
        } else {
            None
        }
    }
}
