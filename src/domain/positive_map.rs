// ============================================================
// Layer 3 — Positive Map
// ============================================================
// A dense (rows, cols) f32 matrix aligning entities (rows) to
// tokenizer slots (cols). Stored row-major in one Vec so the
// batch assembler can copy whole rows with slice operations.
//
// Each row is either all zero (nothing aligned) or sums to ~1
// (a soft distribution over the aligned slots).

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::error::{GroundingError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositiveMap {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl PositiveMap {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.0; rows * cols] }
    }

    pub fn from_rows(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(GroundingError::invariant(format!(
                "positive map of shape ({rows}, {cols}) needs {} values, got {}",
                rows * cols,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub(crate) fn row_mut(&mut self, r: usize) -> &mut [f32] {
        let cols = self.cols;
        &mut self.data[r * cols..(r + 1) * cols]
    }

    pub fn row_sum(&self, r: usize) -> f32 {
        self.row(r).iter().sum()
    }

    /// Non-zero token columns of every row, keyed by `row + plus`.
    ///
    /// `plus = 1` matches heads that reserve label 0 for background.
    pub fn label_to_token(&self, plus: usize) -> BTreeMap<usize, Vec<usize>> {
        (0..self.rows)
            .map(|r| {
                let tokens = self
                    .row(r)
                    .iter()
                    .enumerate()
                    .filter(|(_, &v)| v != 0.0)
                    .map(|(c, _)| c)
                    .collect();
                (r + plus, tokens)
            })
            .collect()
    }
}
