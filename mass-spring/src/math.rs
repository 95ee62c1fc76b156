// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Small linear-algebra helpers built on `glam`
//!
//! - [`outer`]: 2×2 outer product `a bᵀ`
//! - [`BlockMatrix`]: sparse matrix of 2×2 blocks addressed by particle index,
//!   used for the global spring stiffness (`K`) and damping (`B`) Jacobians
//! - [`ConstraintSet`]: per-particle constraint filters `S` and the velocity
//!   seed vector `z` produced by the boundary pass

use glam::{DMat2, DVec2};
use std::collections::BTreeMap;

/// Outer product `a bᵀ`
#[inline]
pub fn outer(a: DVec2, b: DVec2) -> DMat2 {
    DMat2::from_cols(a * b.x, a * b.y)
}

/// Sparse block matrix over `n` particles
///
/// Each stored entry is the 2×2 block coupling particle `row` to particle
/// `col`. Contributions are accumulated: adding to an existing block sums the
/// two, it never overwrites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockMatrix {
    dimension: usize,
    blocks: BTreeMap<(usize, usize), DMat2>,
}

impl BlockMatrix {
    /// Create an empty matrix over `dimension` particles
    pub fn new(dimension: usize) -> Self {
        BlockMatrix {
            dimension,
            blocks: BTreeMap::new(),
        }
    }

    /// Number of particles (block rows) this matrix spans
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored (structurally non-zero) blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Accumulate `block` into entry `(row, col)`
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is not below the matrix dimension.
    pub fn add_block(&mut self, row: usize, col: usize, block: DMat2) {
        assert!(
            row < self.dimension && col < self.dimension,
            "Block ({}, {}) outside matrix of dimension {}",
            row,
            col,
            self.dimension
        );
        let entry = self.blocks.entry((row, col)).or_insert(DMat2::ZERO);
        *entry += block;
    }

    /// Get entry `(row, col)`, zero when nothing was stored there
    pub fn block(&self, row: usize, col: usize) -> DMat2 {
        self.blocks.get(&(row, col)).copied().unwrap_or(DMat2::ZERO)
    }

    /// Iterate over stored blocks in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, DMat2)> + '_ {
        self.blocks.iter().map(|(&(r, c), &m)| (r, c, m))
    }

    /// Remove every block, keeping the dimension
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Multiply by a block vector (one `DVec2` per particle)
    ///
    /// # Panics
    ///
    /// Panics if `x` does not have one entry per particle.
    pub fn mul_vec(&self, x: &[DVec2]) -> Vec<DVec2> {
        assert_eq!(
            x.len(),
            self.dimension,
            "Vector length must match matrix dimension"
        );
        let mut out = vec![DVec2::ZERO; self.dimension];
        for (&(row, col), block) in &self.blocks {
            out[row] += *block * x[col];
        }
        out
    }
}

/// Constraint filters and velocity seed for one boundary pass
///
/// `filters[i]` starts as the identity and accumulates the constraint
/// matrices of every boundary touching particle `i`, so a single wall turns it
/// into the projection `I - n nᵀ`. `seed` holds two rows per particle
/// (`2i`, `2i + 1`) with the velocity change requested by collision and
/// contact handling.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSet {
    filters: Vec<DMat2>,
    seed: Vec<f64>,
}

impl ConstraintSet {
    /// Unconstrained set for `n` particles
    pub fn new(n: usize) -> Self {
        ConstraintSet {
            filters: vec![DMat2::IDENTITY; n],
            seed: vec![0.0; 2 * n],
        }
    }

    /// Number of particles covered
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether the set covers no particles
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filter matrix of particle `i`
    pub fn filter(&self, i: usize) -> DMat2 {
        self.filters[i]
    }

    /// Requested velocity change of particle `i`
    pub fn seed(&self, i: usize) -> DVec2 {
        DVec2::new(self.seed[2 * i], self.seed[2 * i + 1])
    }

    /// All filter matrices
    pub fn filters(&self) -> &[DMat2] {
        &self.filters
    }

    /// The flat seed vector
    pub fn seed_vector(&self) -> &[f64] {
        &self.seed
    }

    /// Whether particle `i` is constrained at all
    pub fn is_constrained(&self, i: usize) -> bool {
        self.filters[i] != DMat2::IDENTITY
    }

    /// Filter a vector through particle `i`'s constraint
    pub fn project(&self, i: usize, v: DVec2) -> DVec2 {
        self.filters[i] * v
    }

    /// Mutable access to filters and seed, in that order
    pub fn parts_mut(&mut self) -> (&mut [DMat2], &mut [f64]) {
        (&mut self.filters, &mut self.seed)
    }

    /// Per-particle seed deltas; the seed is left zeroed, filters untouched
    pub fn take_seed(&mut self) -> Vec<DVec2> {
        let deltas = (0..self.len()).map(|i| self.seed(i)).collect();
        self.seed.fill(0.0);
        deltas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_product() {
        let m = outer(DVec2::new(1.0, 2.0), DVec2::new(3.0, 4.0));
        // column-major: [[1*3, 2*3], [1*4, 2*4]]
        assert_eq!(m.x_axis, DVec2::new(3.0, 6.0));
        assert_eq!(m.y_axis, DVec2::new(4.0, 8.0));
        assert_eq!(m * DVec2::new(1.0, 0.0), DVec2::new(3.0, 6.0));
    }

    #[test]
    fn test_take_seed_zeroes_seed_and_keeps_filters() {
        let mut set = ConstraintSet::new(2);
        {
            let (filters, seed) = set.parts_mut();
            filters[1] = DMat2::from_diagonal(DVec2::new(1.0, 0.0));
            seed[2] = -2.0;
            seed[3] = 7.5;
        }

        let deltas = set.take_seed();
        assert_eq!(deltas, vec![DVec2::ZERO, DVec2::new(-2.0, 7.5)]);
        assert_eq!(set.seed(1), DVec2::ZERO);
        assert!(set.is_constrained(1));
        assert!(!set.is_constrained(0));
    }

    #[test]
    fn test_block_matrix_accumulates() {
        let mut k = BlockMatrix::new(2);
        k.add_block(0, 1, DMat2::IDENTITY);
        k.add_block(0, 1, DMat2::IDENTITY);
        assert_eq!(k.block(0, 1), DMat2::IDENTITY * 2.0);
        assert_eq!(k.block(1, 0), DMat2::ZERO);
        assert_eq!(k.block_count(), 1);
    }

    #[test]
    fn test_block_matrix_mul_vec() {
        let mut k = BlockMatrix::new(2);
        k.add_block(0, 0, DMat2::IDENTITY * 2.0);
        k.add_block(1, 0, DMat2::IDENTITY);
        let out = k.mul_vec(&[DVec2::new(1.0, -1.0), DVec2::new(5.0, 5.0)]);
        assert_eq!(out[0], DVec2::new(2.0, -2.0));
        assert_eq!(out[1], DVec2::new(1.0, -1.0));
    }

    #[test]
    #[should_panic(expected = "outside matrix")]
    fn test_block_matrix_out_of_range() {
        let mut k = BlockMatrix::new(1);
        k.add_block(0, 1, DMat2::IDENTITY);
    }

    #[test]
    fn test_constraint_set_starts_unconstrained() {
        let set = ConstraintSet::new(3);
        assert_eq!(set.len(), 3);
        assert_eq!(set.seed_vector().len(), 6);
        for i in 0..3 {
            assert!(!set.is_constrained(i));
            assert_eq!(set.seed(i), DVec2::ZERO);
        }
    }

    #[test]
    fn test_projection_filter() {
        let mut set = ConstraintSet::new(1);
        let n = DVec2::new(0.0, 1.0);
        {
            let (filters, _) = set.parts_mut();
            filters[0] -= outer(n, n);
        }
        let v = set.project(0, DVec2::new(3.0, -4.0));
        assert_eq!(v, DVec2::new(3.0, 0.0));
        assert!(set.is_constrained(0));
    }
}
