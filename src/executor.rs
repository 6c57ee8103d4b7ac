//! Whole-grid hash backends for the parallel track.
//!
//! A backend receives one parameter block per run and hands back a row-major
//! buffer of `width * height` hash values. Every backend must agree with
//! [`value_at`] bit for bit; only the latency differs.

use std::collections::VecDeque;

use crate::error::GpuError;
use crate::generation::value_at;
use crate::gpu::GpuExecutor;

/// Parameter block shared with the compute shader (16 bytes, uniform-aligned)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HashParams {
    pub width: u32,
    pub height: u32,
    pub seed: u32,
    pub _padding: u32,
}

impl HashParams {
    pub fn new(width: u32, height: u32, seed: u32) -> Self {
        Self {
            width,
            height,
            seed,
            _padding: 0,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Identifies the run a dispatch was issued for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DispatchTicket(pub u64);

/// A finished dispatch. `values` is row-major, `index = y * width + x`.
#[derive(Debug)]
pub struct DispatchResult {
    pub ticket: DispatchTicket,
    pub values: Result<Vec<u32>, GpuError>,
}

/// Backend able to hash an entire grid in one dispatch.
///
/// `submit` must not block on completion; results are collected later through
/// `poll`, which also never blocks. Results may arrive after the run that
/// issued them has been discarded; the caller checks the ticket.
pub trait ParallelExecutor {
    fn name(&self) -> &str;

    fn submit(&mut self, ticket: DispatchTicket, params: HashParams);

    /// Next finished dispatch, if any
    fn poll(&mut self) -> Option<DispatchResult>;
}

/// Scalar reference: the full buffer computed with [`value_at`]
pub fn emulate(params: &HashParams) -> Vec<u32> {
    let mut values = Vec::with_capacity(params.cell_count());
    for y in 0..params.height {
        for x in 0..params.width {
            values.push(value_at(x, y, params.seed));
        }
    }
    values
}

/// Executor that emulates a dispatch on the calling thread.
///
/// Results become visible on the next `poll`.
#[derive(Debug, Default)]
pub struct CpuExecutor {
    ready: VecDeque<DispatchResult>,
}

impl CpuExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParallelExecutor for CpuExecutor {
    fn name(&self) -> &str {
        "cpu-emulation"
    }

    fn submit(&mut self, ticket: DispatchTicket, params: HashParams) {
        self.ready.push_back(DispatchResult {
            ticket,
            values: Ok(emulate(&params)),
        });
    }

    fn poll(&mut self) -> Option<DispatchResult> {
        self.ready.pop_front()
    }
}

/// Pick a backend: the GPU when asked for and available, scalar emulation otherwise.
///
/// Backend absence is never an error for the caller.
pub fn acquire(prefer_gpu: bool) -> Box<dyn ParallelExecutor> {
    if prefer_gpu {
        match GpuExecutor::new() {
            Ok(gpu) => {
                log::info!("Parallel track backend: {}", gpu.name());
                return Box::new(gpu);
            }
            Err(e) => {
                log::warn!("GPU backend unavailable ({}), using scalar emulation", e);
            }
        }
    }
    log::info!("Parallel track backend: cpu-emulation");
    Box::new(CpuExecutor::new())
}
