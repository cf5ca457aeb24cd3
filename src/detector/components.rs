/// Connected components over the active-cell mask
use crate::models::BitMatrix;

/// Union-Find with path halving
pub struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    /// `n` singleton sets
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
        }
    }

    /// Representative of the set containing `x`
    pub fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grandparent = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grandparent;
            x = grandparent;
        }
        x
    }

    /// Merge the sets containing `x` and `y`; the smaller root wins
    pub fn union(&mut self, x: u32, y: u32) {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x != root_y {
            let (lo, hi) = if root_x < root_y { (root_x, root_y) } else { (root_y, root_x) };
            self.parent[hi as usize] = lo;
        }
    }
}

/// Label 8-connected set cells; each component lists its (x, y) cells.
///
/// Components come out in raster order of their first cell.
pub fn label_components(mask: &BitMatrix) -> Vec<Vec<(usize, usize)>> {
    let width = mask.width();
    let height = mask.height();
    let mut uf = UnionFind::new(width * height);

    for y in 0..height {
        for x in 0..width {
            if !mask.get(x, y) {
                continue;
            }
            let idx = (y * width + x) as u32;
            if x > 0 && mask.get(x - 1, y) {
                uf.union(idx, idx - 1);
            }
            if y > 0 {
                let up = ((y - 1) * width + x) as u32;
                if mask.get(x, y - 1) {
                    uf.union(idx, up);
                }
                if x > 0 && mask.get(x - 1, y - 1) {
                    uf.union(idx, up - 1);
                }
                if x + 1 < width && mask.get(x + 1, y - 1) {
                    uf.union(idx, up + 1);
                }
            }
        }
    }

    let mut slot_of_root: Vec<Option<usize>> = vec![None; width * height];
    let mut components: Vec<Vec<(usize, usize)>> = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if !mask.get(x, y) {
                continue;
            }
            let root = uf.find((y * width + x) as u32) as usize;
            let slot = *slot_of_root[root].get_or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push((x, y));
        }
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_find() {
        let mut uf = UnionFind::new(5);
        uf.union(3, 4);
        uf.union(4, 1);
        assert_eq!(uf.find(3), uf.find(1));
        assert_ne!(uf.find(0), uf.find(1));
    }

    #[test]
    fn test_label_components() {
        let mut matrix = BitMatrix::new(10, 10);
        // 2x2 square
        for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3)] {
            matrix.set(x, y, true);
        }
        // diagonal chain, 8-connected
        for i in 0..3 {
            matrix.set(6 + i, 6 + i, true);
        }
        let components = label_components(&matrix);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].len(), 4);
        assert_eq!(components[1], vec![(6, 6), (7, 7), (8, 8)]);
    }

    #[test]
    fn test_u_shape_joins_late() {
        let matrix = BitMatrix::from_fn(5, 3, |x, y| x == 0 || x == 4 || y == 2);
        assert_eq!(label_components(&matrix).len(), 1);
    }
}
