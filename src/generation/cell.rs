use crate::generation::hash::{color_from_hash, Hsl};

/// One generated grid cell. Produced once per track per run, never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
    /// Row-major index: `y * width + x`
    pub index: u32,
    pub value: u32,
    pub color: Hsl,
}

impl Cell {
    /// Build a cell from its row-major index in a grid of the given width
    pub fn at_index(index: u32, width: u32, value: u32) -> Self {
        Self {
            x: index % width,
            y: index / width,
            index,
            value,
            color: color_from_hash(value),
        }
    }
}
