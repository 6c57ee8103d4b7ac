use std::fmt;

use crate::config::SHUFFLE_ROW;
use crate::generation::value_at;

/// Order in which the parallel track visits grid cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum VisitationPolicy {
    /// Row-major, matching the only order the sequential track can use
    #[default]
    Sequential,
    /// The four corners first, then everything else row-major
    CornersFirst,
    /// Seeded shuffle of every cell
    Random,
}

impl VisitationPolicy {
    pub const ALL: [VisitationPolicy; 3] = [
        VisitationPolicy::Sequential,
        VisitationPolicy::CornersFirst,
        VisitationPolicy::Random,
    ];

    /// Next policy in cycling order
    pub fn next(self) -> Self {
        let position = Self::ALL.iter().position(|&p| p == self).unwrap_or(0);
        Self::ALL[(position + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for VisitationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VisitationPolicy::Sequential => "sequential",
            VisitationPolicy::CornersFirst => "corners-first",
            VisitationPolicy::Random => "random",
        };
        f.write_str(name)
    }
}

/// A policy resolved against one run's grid and seed.
///
/// Built once at run start; `index_at` is then a pure lookup per cell.
/// Every variant maps `0..len()` onto a permutation of `0..len()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VisitOrder {
    Sequential {
        total: u32,
    },
    CornersFirst {
        total: u32,
        /// Distinct corners in visiting order: TL, TR, BL, BR
        corners: Vec<u32>,
        /// Same corners, ascending, for skipping during the row-major tail
        sorted: Vec<u32>,
    },
    Shuffled(Vec<u32>),
}

impl VisitOrder {
    pub fn build(policy: VisitationPolicy, width: u32, height: u32, seed: u32) -> Self {
        let total = width * height;
        match policy {
            VisitationPolicy::Sequential => VisitOrder::Sequential { total },
            VisitationPolicy::CornersFirst => {
                let mut corners = Vec::with_capacity(4);
                for corner in [0, width - 1, (height - 1) * width, total - 1] {
                    // 1-wide or 1-tall grids share corners
                    if !corners.contains(&corner) {
                        corners.push(corner);
                    }
                }
                let mut sorted = corners.clone();
                sorted.sort_unstable();
                VisitOrder::CornersFirst {
                    total,
                    corners,
                    sorted,
                }
            }
            VisitationPolicy::Random => VisitOrder::Shuffled(shuffled_indices(total, seed)),
        }
    }

    pub fn len(&self) -> u32 {
        match self {
            VisitOrder::Sequential { total } | VisitOrder::CornersFirst { total, .. } => *total,
            VisitOrder::Shuffled(order) => order.len() as u32,
        }
    }

    /// Cell index visited at the given progress count (`progress < len()`)
    pub fn index_at(&self, progress: u32) -> u32 {
        debug_assert!(progress < self.len());
        match self {
            VisitOrder::Sequential { .. } => progress,
            VisitOrder::CornersFirst {
                corners, sorted, ..
            } => {
                let corner_count = corners.len() as u32;
                if progress < corner_count {
                    return corners[progress as usize];
                }
                // k-th non-corner cell: step over every corner at or below it
                let mut index = progress - corner_count;
                for &corner in sorted {
                    if corner <= index {
                        index += 1;
                    } else {
                        break;
                    }
                }
                index
            }
            VisitOrder::Shuffled(order) => order[progress as usize],
        }
    }
}

/// Fisher-Yates over `0..total`, drawing swap targets from the hash generator
fn shuffled_indices(total: u32, seed: u32) -> Vec<u32> {
    let mut order: Vec<u32> = (0..total).collect();
    for i in (1..total).rev() {
        let j = value_at(i, SHUFFLE_ROW, seed) % (i + 1);
        order.swap(i as usize, j as usize);
    }
    order
}
