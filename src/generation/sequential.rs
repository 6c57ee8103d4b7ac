use crate::config::{FALLBACK_S1, FALLBACK_S2, TWISTS_PER_VALUE};

/// Register file of the sequential generator.
///
/// Fully determined by `(seed, cursor)`: replaying `cursor` calls to
/// [`SequentialGenerator::produce_next`] from the seed reproduces it exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorState {
    pub s0: u16,
    pub s1: u16,
    pub s2: u16,
    /// Index of the next cell to be produced
    pub cursor: u64,
}

impl GeneratorState {
    /// Split a seed into three 16-bit register fields.
    ///
    /// Zero-valued second and third fields are replaced by fallback constants
    /// so the upper registers never start at zero.
    pub fn from_seed(seed: u64) -> Self {
        let field = |shift: u32| (seed >> shift) as u16;
        let nonzero = |value: u16, fallback: u16| if value == 0 { fallback } else { value };

        Self {
            s0: field(0),
            s1: nonzero(field(16), FALLBACK_S1),
            s2: nonzero(field(32), FALLBACK_S2),
            cursor: 0,
        }
    }

    /// One twist: `temp = s0 + s1 + s2 (mod 2^16)`, then rotate the registers.
    #[inline]
    fn twist(&mut self) -> u16 {
        let temp = self.s0.wrapping_add(self.s1).wrapping_add(self.s2);
        self.s0 = self.s1;
        self.s1 = self.s2;
        self.s2 = temp;
        temp
    }
}

/// Strictly ordered state-machine generator.
///
/// The Nth value exists only after the N values before it have been produced;
/// there is no random access.
#[derive(Clone, Debug)]
pub struct SequentialGenerator {
    state: GeneratorState,
}

impl SequentialGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            state: GeneratorState::from_seed(seed),
        }
    }

    /// Re-seed the registers and rewind the cursor to zero
    pub fn initialize(&mut self, seed: u64) {
        self.state = GeneratorState::from_seed(seed);
    }

    /// Produce the value at the current cursor and advance by one.
    ///
    /// Packs the low nibble of four consecutive twists into 16 bits,
    /// first twist in the most significant nibble.
    pub fn produce_next(&mut self) -> u16 {
        let mut value: u16 = 0;
        for _ in 0..TWISTS_PER_VALUE {
            let twisted = self.state.twist();
            value = (value << 4) | (twisted & 0xF);
        }
        self.state.cursor += 1;
        value
    }

    /// Walk forward until the cursor reaches `target`.
    ///
    /// Costs exactly `target - cursor` calls to [`produce_next`](Self::produce_next).
    /// A target behind the cursor is a no-op; the cursor never moves backwards.
    #[allow(dead_code)]
    pub fn seek_to(&mut self, target: u64) {
        while self.state.cursor < target {
            self.produce_next();
        }
    }

    pub fn cursor(&self) -> u64 {
        self.state.cursor
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }
}
