/// Invalid race configuration, rejected before any scheduler state changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("grid must have at least one cell (got {width}x{height})")]
    EmptyGrid { width: u32, height: u32 },

    #[error("grid of {cells} cells exceeds the limit of {max}")]
    GridTooLarge { cells: usize, max: usize },

    #[error("grid side of {side} cells exceeds the dispatch limit of {max}")]
    AxisTooLong { side: u32, max: u32 },

    #[error("quantum must be at least one cell per tick")]
    ZeroQuantum,

    #[error("seed must be non-zero")]
    ZeroSeed,
}

/// Errors surfaced by the race scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RaceError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
}

/// Error type for GPU operations.
///
/// Never reaches the caller of the scheduler: acquisition failures fall back
/// to scalar emulation and failed dispatches are recomputed on the CPU.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Readback returned {actual} values, expected {expected}")]
    Readback { expected: usize, actual: usize },

    #[error("Readback channel closed before the buffer was mapped")]
    Disconnected,
}
