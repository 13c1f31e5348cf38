//! Pairwise travel matrix.
//!
//! Every entry carries duration and distance from the same provider response.
//! A missing entry (`None`) marks a pair the provider could not resolve.

use serde::{Deserialize, Serialize};

/// Travel cost of one directed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub duration_secs: u32,
    pub distance_meters: u32,
}

impl MatrixEntry {
    pub const ZERO: MatrixEntry = MatrixEntry {
        duration_secs: 0,
        distance_meters: 0,
    };

    pub const fn new(duration_secs: u32, distance_meters: u32) -> Self {
        Self {
            duration_secs,
            distance_meters,
        }
    }
}

/// Square matrix indexed by stop order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    size: usize,
    entries: Vec<Option<MatrixEntry>>,
}

impl Matrix {
    /// Empty matrix with a zero diagonal and every other pair missing.
    pub fn new(size: usize) -> Self {
        let mut entries = vec![None; size * size];
        for i in 0..size {
            entries[i * size + i] = Some(MatrixEntry::ZERO);
        }
        Self { size, entries }
    }

    /// Build from parallel duration/distance rows. Rows must be square and the
    /// same shape; `None` cells stay missing.
    pub fn from_rows(
        durations: &[Vec<Option<u32>>],
        distances: &[Vec<Option<u32>>],
    ) -> Option<Self> {
        let size = durations.len();
        if distances.len() != size {
            return None;
        }
        let mut matrix = Self::new(size);
        for i in 0..size {
            if durations[i].len() != size || distances[i].len() != size {
                return None;
            }
            for j in 0..size {
                if i == j {
                    continue;
                }
                if let (Some(duration), Some(distance)) = (durations[i][j], distances[i][j]) {
                    matrix.set(i, j, MatrixEntry::new(duration, distance));
                }
            }
        }
        Some(matrix)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, from: usize, to: usize) -> Option<MatrixEntry> {
        if from >= self.size || to >= self.size {
            return None;
        }
        self.entries[from * self.size + to]
    }

    pub fn set(&mut self, from: usize, to: usize, entry: MatrixEntry) {
        if from < self.size && to < self.size {
            self.entries[from * self.size + to] = Some(entry);
        }
    }

    /// Set both directions to the same entry.
    pub fn set_symmetric(&mut self, a: usize, b: usize, entry: MatrixEntry) {
        self.set(a, b, entry);
        self.set(b, a, entry);
    }

    pub fn clear(&mut self, from: usize, to: usize) {
        if from < self.size && to < self.size && from != to {
            self.entries[from * self.size + to] = None;
        }
    }

    /// Off-diagonal pairs without an entry, row-major.
    pub fn missing_pairs(&self) -> Vec<(usize, usize)> {
        let mut missing = Vec::new();
        for i in 0..self.size {
            for j in 0..self.size {
                if i != j && self.entries[i * self.size + j].is_none() {
                    missing.push((i, j));
                }
            }
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(Option::is_some)
    }
}
