//! Symmetric N x N score matrices.

use serde::{Deserialize, Serialize};

/// Square matrix where every off-diagonal write lands in both `[i][j]` and `[j][i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetricMatrix<T> {
    size: usize,
    cells: Vec<T>,
}

/// Pairwise similarity; diagonal 1.0, unset cells 0.0.
pub type SimilarityMatrix = SymmetricMatrix<f64>;

/// Pairwise edit distance; diagonal 0, unset cells 0.
pub type DistanceMatrix = SymmetricMatrix<usize>;

impl<T: Copy> SymmetricMatrix<T> {
    /// Create a matrix filled with `sentinel` and `diagonal` on the diagonal.
    pub fn new(size: usize, diagonal: T, sentinel: T) -> Self {
        let mut cells = vec![sentinel; size * size];
        for i in 0..size {
            cells[i * size + i] = diagonal;
        }
        Self { size, cells }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, i: usize, j: usize) -> T {
        self.cells[i * self.size + j]
    }

    /// Write one off-diagonal pair. Both cells change together.
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        self.cells[i * self.size + j] = value;
        self.cells[j * self.size + i] = value;
    }

    /// Row `i` as a slice.
    pub fn row(&self, i: usize) -> &[T] {
        &self.cells[i * self.size..(i + 1) * self.size]
    }

    /// Nested-vector copy, convenient for JSON output.
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        (0..self.size).map(|i| self.row(i).to_vec()).collect()
    }
}

impl SimilarityMatrix {
    pub fn similarity(size: usize) -> Self {
        Self::new(size, 1.0, 0.0)
    }
}

impl DistanceMatrix {
    pub fn distance(size: usize) -> Self {
        Self::new(size, 0, 0)
    }
}
