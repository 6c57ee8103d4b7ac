mod buffers;
mod compute;
mod context;
mod executor;

pub use executor::GpuExecutor;
