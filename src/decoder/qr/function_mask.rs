//! Which modules of a symbol carry structure rather than codeword bits.

use super::tables::{alignment_pattern_positions, dimension};
use crate::models::BitMatrix;

/// Function-module map for one version (set = function module)
#[derive(Debug, Clone)]
pub struct FunctionMask {
    mask: BitMatrix,
}

impl FunctionMask {
    /// Map for `version` (1..=40)
    pub fn new(version: u8) -> Self {
        let size = dimension(version);
        let mut mask = BitMatrix::new(size, size);

        // finders with their separators, plus the format areas beside them
        mark(&mut mask, 0, 0, 9, 9);
        mark(&mut mask, size - 8, 0, 8, 9);
        mark(&mut mask, 0, size - 8, 9, 8);

        for i in 0..size {
            mask.set(6, i, true);
            mask.set(i, 6, true);
        }

        let centers = alignment_pattern_positions(version);
        let last = centers.len().saturating_sub(1);
        for (i, &cx) in centers.iter().enumerate() {
            for (j, &cy) in centers.iter().enumerate() {
                let on_finder = (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0);
                if !on_finder {
                    mark(&mut mask, cx - 2, cy - 2, 5, 5);
                }
            }
        }

        if version >= 7 {
            mark(&mut mask, size - 11, 0, 3, 6);
            mark(&mut mask, 0, size - 11, 6, 3);
        }
        Self { mask }
    }

    /// Side length in modules
    pub fn size(&self) -> usize {
        self.mask.width()
    }

    /// Whether `(x, y)` is a function module
    pub fn is_function(&self, x: usize, y: usize) -> bool {
        self.mask.get(x, y)
    }

    /// Number of data modules, remainder bits included
    pub fn data_modules(&self) -> usize {
        self.size() * self.size() - self.mask.count_ones()
    }
}

fn mark(mask: &mut BitMatrix, x: usize, y: usize, w: usize, h: usize) {
    for yy in y..y + h {
        for xx in x..x + w {
            mask.set(xx, yy, true);
        }
    }
}
