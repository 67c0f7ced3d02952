use serde::{Deserialize, Serialize};

use super::vectorizer::FeatureVector;

/// Row-sparse binary matrix in compressed sparse row form.
///
/// `indptr[r]..indptr[r + 1]` slices `indices` into row `r`'s sorted
/// column ids. Values are implicit (all ones).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrMatrix {
    dimension: u32,
    indptr: Vec<usize>,
    indices: Vec<u32>,
}

impl CsrMatrix {
    pub fn new(dimension: u32) -> Self {
        Self {
            dimension,
            indptr: vec![0],
            indices: Vec::new(),
        }
    }

    pub const fn dimension(&self) -> u32 {
        self.dimension
    }

    pub fn rows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    fn row(&self, r: usize) -> &[u32] {
        &self.indices[self.indptr[r]..self.indptr[r + 1]]
    }

    /// Append one row. Zero vectors are rejected by the caller, so every
    /// stored row comes from a non-empty token string.
    pub fn push_row(&mut self, vector: &FeatureVector) {
        self.indices.extend_from_slice(vector.cols());
        self.indptr.push(self.indices.len());
    }

    /// Cosine distance from `query` to its nearest row.
    ///
    /// Both sides are binary, so the similarity reduces to
    /// `|A ∩ B| / sqrt(|A| · |B|)`. Ties go to the lowest row index
    /// (strict minimisation keeps the first best row). The result is
    /// clamped into `[0, 1]`.
    pub fn nearest_distance(&self, query: &FeatureVector) -> f32 {
        let query_cols = query.cols();
        #[allow(clippy::cast_precision_loss)]
        let query_norm = (query_cols.len() as f32).sqrt();
        let mut best = 1.0_f32;
        for r in 0..self.rows() {
            let row = self.row(r);
            let shared = intersection_count(row, query_cols);
            if shared == 0 {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let similarity = shared as f32 / (query_norm * (row.len() as f32).sqrt());
            let distance = 1.0 - similarity;
            if distance < best {
                best = distance;
            }
        }
        best.clamp(0.0, 1.0)
    }
}

/// Count shared values between two sorted, duplicate-free slices.
fn intersection_count(a: &[u32], b: &[u32]) -> usize {
    let mut count = 0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}
