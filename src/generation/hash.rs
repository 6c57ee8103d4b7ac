//! Position-is-seed generator.
//!
//! Pure function of `(x, y, seed)` with no state. The WGSL port in
//! `shaders/hash.wgsl` must produce identical results.

use crate::config::{HASH_MIX_1, HASH_MIX_2, HASH_PRIME_SEED, HASH_PRIME_X, HASH_PRIME_Y};

/// Hash a cell position and world seed into a well-mixed u32.
///
/// All arithmetic wraps at 32 bits.
#[inline]
pub fn value_at(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = x
        .wrapping_mul(HASH_PRIME_X)
        .wrapping_add(y.wrapping_mul(HASH_PRIME_Y))
        .wrapping_add(seed.wrapping_mul(HASH_PRIME_SEED));
    h = (h ^ (h >> 15)).wrapping_mul(HASH_MIX_1);
    h = (h ^ (h >> 13)).wrapping_mul(HASH_MIX_2);
    h ^ (h >> 16)
}

/// Map a hash to [0, 1)
#[inline]
pub fn normalized_float(hash: u32) -> f64 {
    hash as f64 / 4_294_967_296.0
}

/// Display color in HSL space. Presentational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hsl {
    /// Degrees [0, 360)
    pub hue: u16,
    /// Percent [60, 100)
    pub saturation: u8,
    /// Percent [45, 65)
    pub lightness: u8,
}

pub fn color_from_hash(hash: u32) -> Hsl {
    Hsl {
        hue: (hash % 360) as u16,
        saturation: (60 + hash % 40) as u8,
        lightness: (45 + (hash >> 8) % 20) as u8,
    }
}
