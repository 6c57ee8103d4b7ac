mod cell;
pub mod hash;
mod sequential;

pub use cell::Cell;
pub use hash::value_at;
pub use sequential::SequentialGenerator;
