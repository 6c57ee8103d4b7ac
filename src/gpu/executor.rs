use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::error::GpuError;
use crate::executor::{DispatchResult, DispatchTicket, HashParams, ParallelExecutor};
use crate::gpu::buffers::HashBuffers;
use crate::gpu::compute::HashPipeline;
use crate::gpu::context::GpuContext;

/// A submitted dispatch waiting for its staging buffer to map
struct InFlight {
    ticket: DispatchTicket,
    expected: usize,
    buffers: HashBuffers,
    mapped: Receiver<Result<(), wgpu::BufferAsyncError>>,
}

/// Hash backend running on the GPU.
///
/// Dispatches are submitted without waiting; `poll` drives the device
/// non-blockingly and returns dispatches in submission order.
pub struct GpuExecutor {
    gpu: GpuContext,
    pipeline: HashPipeline,
    name: String,
    in_flight: VecDeque<InFlight>,
}

impl GpuExecutor {
    pub fn new() -> Result<Self, GpuError> {
        let gpu = pollster::block_on(GpuContext::new())?;
        let pipeline = HashPipeline::new(&gpu.device);
        let name = format!("wgpu ({})", gpu.adapter_name);

        Ok(Self {
            gpu,
            pipeline,
            name,
            in_flight: VecDeque::new(),
        })
    }

    /// Number of dispatches submitted but not yet returned by `poll`
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }
}

impl ParallelExecutor for GpuExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn submit(&mut self, ticket: DispatchTicket, params: HashParams) {
        let device = &self.gpu.device;
        let buffers = HashBuffers::new(device, &self.gpu.queue, &params);
        let bind_group = self.pipeline.create_bind_group(device, &buffers);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("hash-dispatch-encoder"),
        });
        self.pipeline
            .dispatch(&mut encoder, &bind_group, params.width, params.height);
        buffers.copy_to_staging(&mut encoder);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = mpsc::channel();
        buffers
            .staging_buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                // Receiver may be gone if the executor was dropped
                let _ = tx.send(result);
            });

        self.in_flight.push_back(InFlight {
            ticket,
            expected: params.cell_count(),
            buffers,
            mapped: rx,
        });

        log::debug!(
            "Submitted hash dispatch for run {} ({}x{}, seed {}), {} in flight",
            ticket.0,
            params.width,
            params.height,
            params.seed,
            self.pending()
        );
    }

    fn poll(&mut self) -> Option<DispatchResult> {
        if self.in_flight.is_empty() {
            return None;
        }

        // Non-blocking: only fires callbacks for work already finished
        let _ = self.gpu.device.poll(wgpu::Maintain::Poll);

        let values = match self.in_flight.front()?.mapped.try_recv() {
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(GpuError::Disconnected),
            Ok(Err(e)) => Err(GpuError::BufferMap(e)),
            Ok(Ok(())) => Ok(()),
        };

        let done = self.in_flight.pop_front()?;
        let values = values.and_then(|()| {
            let values = done.buffers.read_mapped();
            if values.len() == done.expected {
                Ok(values)
            } else {
                Err(GpuError::Readback {
                    expected: done.expected,
                    actual: values.len(),
                })
            }
        });

        Some(DispatchResult {
            ticket: done.ticket,
            values,
        })
    }
}
