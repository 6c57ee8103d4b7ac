use std::fmt;
use std::time::{Duration, Instant};

/// The two competitors in a race
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Track {
    /// Ordered state machine
    Sequential,
    /// Coordinate hash (scalar or dispatched)
    Parallel,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Sequential => f.write_str("sequential"),
            Track::Parallel => f.write_str("parallel"),
        }
    }
}

/// Progress of one track within a run
#[derive(Clone, Copy, Debug)]
pub struct TrackProgress {
    produced: u32,
    total: u32,
    started: Instant,
    completed: Option<Instant>,
}

impl TrackProgress {
    pub fn new(total: u32, started: Instant) -> Self {
        Self {
            produced: 0,
            total,
            started,
            completed: None,
        }
    }

    pub fn produced(&self) -> u32 {
        self.produced
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn remaining(&self) -> u32 {
        self.total - self.produced
    }

    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }

    /// Wall-clock time from start to completion, `None` until complete
    pub fn elapsed(&self) -> Option<Duration> {
        self.completed.map(|done| done.duration_since(self.started))
    }

    /// Time spent so far, for live display while the track is still running
    pub fn running_time(&self, now: Instant) -> Duration {
        self.completed.unwrap_or(now).saturating_duration_since(self.started)
    }

    /// Record `count` newly produced cells, stamping completion on the last one
    pub(crate) fn advance(&mut self, count: u32, now: Instant) {
        debug_assert!(count <= self.remaining());
        self.produced += count;
        if self.produced == self.total && self.completed.is_none() {
            self.completed = Some(now);
        }
    }
}
