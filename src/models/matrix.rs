/// Compact bit matrix for binarized windows, sampled module grids and cell masks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    width: usize,
    height: usize,
    words: Vec<u64>,
}

impl BitMatrix {
    /// Create a new all-clear bit matrix with given dimensions
    pub fn new(width: usize, height: usize) -> Self {
        let words_needed = (width * height).div_ceil(64);
        Self {
            width,
            height,
            words: vec![0; words_needed],
        }
    }

    /// Build a matrix by evaluating `f(x, y)` for every cell
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut matrix = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    matrix.set(x, y, true);
                }
            }
        }
        matrix
    }

    /// Get matrix width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Get matrix height
    pub fn height(&self) -> usize {
        self.height
    }

    /// Get bit at (x, y); out-of-bounds reads are clear
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let index = y * self.width + x;
        (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Set bit at (x, y); out-of-bounds writes are ignored
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = y * self.width + x;
        let mask = 1u64 << (index % 64);
        if value {
            self.words[index / 64] |= mask;
        } else {
            self.words[index / 64] &= !mask;
        }
    }

    /// Toggle bit at (x, y)
    pub fn toggle(&mut self, x: usize, y: usize) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = y * self.width + x;
        self.words[index / 64] ^= 1u64 << (index % 64);
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True when every in-bounds cell of the 3x3 neighborhood around (x, y) is set
    pub fn neighborhood_all_set(&self, x: usize, y: usize) -> bool {
        let x0 = x.saturating_sub(1);
        let y0 = y.saturating_sub(1);
        let x1 = (x + 1).min(self.width.saturating_sub(1));
        let y1 = (y + 1).min(self.height.saturating_sub(1));
        (y0..=y1).all(|yy| (x0..=x1).all(|xx| self.get(xx, yy)))
    }

    /// Morphological dilation with a square structuring element of the given radius
    pub fn dilate(&self, radius: usize) -> Self {
        Self::from_fn(self.width, self.height, |x, y| {
            let x0 = x.saturating_sub(radius);
            let y0 = y.saturating_sub(radius);
            let x1 = (x + radius).min(self.width - 1);
            let y1 = (y + radius).min(self.height - 1);
            (y0..=y1).any(|yy| (x0..=x1).any(|xx| self.get(xx, yy)))
        })
    }

    /// Morphological erosion; cells outside the matrix count as set so borders survive
    pub fn erode(&self, radius: usize) -> Self {
        Self::from_fn(self.width, self.height, |x, y| {
            let x0 = x.saturating_sub(radius);
            let y0 = y.saturating_sub(radius);
            let x1 = (x + radius).min(self.width - 1);
            let y1 = (y + radius).min(self.height - 1);
            (y0..=y1).all(|yy| (x0..=x1).all(|xx| self.get(xx, yy)))
        })
    }

    /// Clear all bits to 0
    pub fn clear(&mut self) {
        self.words.fill(0);
    }
}

impl Default for BitMatrix {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_matrix() {
        let mut matrix = BitMatrix::new(8, 8);
        assert_eq!(matrix.width(), 8);
        assert_eq!(matrix.height(), 8);

        matrix.set(3, 4, true);
        assert!(matrix.get(3, 4));
        assert!(!matrix.get(3, 3));

        matrix.toggle(3, 4);
        assert!(!matrix.get(3, 4));

        matrix.set(7, 7, true);
        assert_eq!(matrix.count_ones(), 1);
        matrix.clear();
        assert_eq!(matrix.count_ones(), 0);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut matrix = BitMatrix::new(8, 8);
        matrix.set(10, 10, true); // Should not panic
        assert!(!matrix.get(10, 10));
    }

    #[test]
    fn test_word_boundary() {
        let mut matrix = BitMatrix::new(13, 11);
        for i in 60..70 {
            matrix.set(i % 13, i / 13, true);
        }
        assert_eq!(matrix.count_ones(), 10);
        assert!(matrix.get(63 % 13, 63 / 13));
        assert!(matrix.get(64 % 13, 64 / 13));
    }

    #[test]
    fn test_closing_fills_gap() {
        let mut matrix = BitMatrix::new(7, 3);
        for x in [0, 1, 2, 4, 5, 6] {
            matrix.set(x, 1, true);
        }
        let closed = matrix.dilate(1).erode(1);
        assert!(closed.get(3, 1));
    }

    #[test]
    fn test_neighborhood_all_set() {
        let matrix = BitMatrix::from_fn(5, 5, |x, y| x < 3 && y < 3);
        assert!(matrix.neighborhood_all_set(1, 1));
        assert!(matrix.neighborhood_all_set(0, 0));
        assert!(!matrix.neighborhood_all_set(2, 2));
    }
}
