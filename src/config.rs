use std::time::Duration;

// ============================================
// Sequential Generator
// ============================================

/// Register value substituted when the seed's second 16-bit field is zero
pub const FALLBACK_S1: u16 = 12345;

/// Register value substituted when the seed's third 16-bit field is zero
pub const FALLBACK_S2: u16 = 54321;

/// Twist transitions performed per emitted cell value
pub const TWISTS_PER_VALUE: u32 = 4;

// ============================================
// Hash Generator
// ============================================

/// Prime multiplier applied to the x coordinate
pub const HASH_PRIME_X: u32 = 374_761_393;

/// Prime multiplier applied to the y coordinate
pub const HASH_PRIME_Y: u32 = 668_265_263;

/// Multiplier applied to the world seed (2^31 - 1)
pub const HASH_PRIME_SEED: u32 = 2_147_483_647;

/// Avalanche multipliers (murmur3 finalizer)
pub const HASH_MIX_1: u32 = 0x85eb_ca6b;
pub const HASH_MIX_2: u32 = 0xc2b2_ae35;

/// Row fed to the hash when building the shuffled visitation order.
/// Grid rows are never negative, so u32::MAX keeps the shuffle stream
/// disjoint from any cell value actually drawn.
pub const SHUFFLE_ROW: u32 = u32::MAX;

// ============================================
// Accelerator
// ============================================

/// Compute shader workgroup size (per axis)
pub const WORKGROUP_SIZE: u32 = 16;

/// Upper bound on cells per run (2^24 = 64 MiB output buffer)
pub const MAX_CELLS: usize = 1 << 24;

/// wgpu's default `max_compute_workgroups_per_dimension`
pub const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65_535;

/// Longest grid side a single dispatch can cover
pub const MAX_GRID_AXIS: u32 = MAX_WORKGROUPS_PER_DIMENSION * WORKGROUP_SIZE;

// ============================================
// Controller Ranges
// ============================================

/// Grid side length range for the scalar race
pub const GRID_SIZE_MIN: u32 = 10;
pub const GRID_SIZE_MAX: u32 = 50;

/// Grid side length range when the parallel track is accelerated
pub const ACCEL_GRID_SIZE_MIN: u32 = 16;
pub const ACCEL_GRID_SIZE_MAX: u32 = 128;

/// Seed range exposed to the user
pub const SEED_MIN: u32 = 1;
pub const SEED_MAX: u32 = 9999;

/// Defaults used when nothing is supplied on the command line
pub const DEFAULT_GRID_SIZE: u32 = 32;
pub const DEFAULT_SEED: u32 = 42;
pub const DEFAULT_QUANTUM: usize = 8;

/// Cadence of the headless driver (one tick per ~60 Hz frame)
pub const TICK_INTERVAL: Duration = Duration::from_micros(16_667);

/// Default tick budget for a headless race
pub const DEFAULT_MAX_TICKS: u64 = 1_000_000;

/// Clamp a grid side length into the controller range for the chosen track mode
pub fn clamp_grid_size(size: u32, accelerated: bool) -> u32 {
    if accelerated {
        size.clamp(ACCEL_GRID_SIZE_MIN, ACCEL_GRID_SIZE_MAX)
    } else {
        size.clamp(GRID_SIZE_MIN, GRID_SIZE_MAX)
    }
}

/// Clamp a seed into the range exposed to the user
pub fn clamp_seed(seed: u32) -> u32 {
    seed.clamp(SEED_MIN, SEED_MAX)
}

/// A quantum is at least one cell per tick
pub fn clamp_quantum(quantum: usize) -> usize {
    quantum.max(1)
}
