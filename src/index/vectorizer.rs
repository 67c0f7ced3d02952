use xxhash_rust::xxh3::xxh3_64;

/// A sparse binary feature vector: the sorted set of active columns.
///
/// Multiple occurrences of a token set the same column once; features
/// are presence bits, not counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureVector {
    cols: Vec<u32>,
}

impl FeatureVector {
    pub fn cols(&self) -> &[u32] {
        &self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// Number of active columns.
    pub fn nnz(&self) -> usize {
        self.cols.len()
    }
}

/// Column id for one token. XXH3-64 is stable across platforms and
/// versions; together with `dimension` it defines the on-disk model
/// format, so the model loader and trainer always agree.
#[allow(clippy::cast_possible_truncation)] // reduced mod dimension first
fn hash_token(dimension: u32, token: &str) -> u32 {
    (xxh3_64(token.as_bytes()) % u64::from(dimension)) as u32
}

/// Hash every whitespace-separated token of `line` into the feature
/// space. Output columns are sorted and deduplicated.
pub fn vectorize(dimension: u32, line: &str) -> FeatureVector {
    let mut cols: Vec<u32> = line
        .split_whitespace()
        .map(|token| hash_token(dimension, token))
        .collect();
    cols.sort_unstable();
    cols.dedup();
    FeatureVector { cols }
}
