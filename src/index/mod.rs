pub mod matrix;
pub mod vectorizer;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use self::matrix::CsrMatrix;
use self::vectorizer::{FeatureVector, vectorize};

/// The search algorithm behind an index.
///
/// One canonical implementation carries all real traffic; the enum is
/// the seam where an alternative nearest-neighbour scheme would plug in
/// without touching the model format framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SearchBackend {
    /// Hashed binary bag-of-words rows searched by brute-force sparse
    /// cosine distance.
    Hashing(CsrMatrix),
    /// Scores every query at distance zero. Baseline for benchmarks and
    /// pipeline tests.
    Noop,
}

impl SearchBackend {
    fn rows(&self) -> usize {
        match self {
            Self::Hashing(matrix) => matrix.rows(),
            Self::Noop => 0,
        }
    }
}

/// The training matrix and nearest-neighbour search for one model name.
///
/// Immutable once trained; queries never mutate, so a trained index can
/// be shared freely across readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    name: String,
    uuid: Uuid,
    sources: Vec<String>,
    dimension: u32,
    backend: SearchBackend,
    line_count: usize,
    byte_count: u64,
    train_time: Duration,
}

impl Index {
    pub fn new(name: impl Into<String>, dimension: u32) -> Self {
        Self {
            name: name.into(),
            uuid: Uuid::new_v4(),
            sources: Vec::new(),
            dimension,
            backend: SearchBackend::Hashing(CsrMatrix::new(dimension)),
            line_count: 0,
            byte_count: 0,
            train_time: Duration::ZERO,
        }
    }

    /// An index that never flags anything.
    pub fn noop(name: impl Into<String>, dimension: u32) -> Self {
        Self {
            backend: SearchBackend::Noop,
            ..Self::new(name, dimension)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Provenance: where the training lines came from.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn add_source(&mut self, url: String) {
        if !self.sources.contains(&url) {
            self.sources.push(url);
        }
    }

    /// Record raw input volume (lines and bytes seen, before dedup).
    pub fn add_volume(&mut self, lines: usize, bytes: u64) {
        self.line_count += lines;
        self.byte_count += bytes;
    }

    pub const fn line_count(&self) -> usize {
        self.line_count
    }

    pub const fn byte_count(&self) -> u64 {
        self.byte_count
    }

    pub const fn train_time(&self) -> Duration {
        self.train_time
    }

    pub fn samples(&self) -> usize {
        self.backend.rows()
    }

    pub fn is_fitted(&self) -> bool {
        match &self.backend {
            SearchBackend::Hashing(matrix) => !matrix.is_empty(),
            SearchBackend::Noop => true,
        }
    }

    /// Short human-readable shape summary.
    pub fn info(&self) -> String {
        match &self.backend {
            SearchBackend::Hashing(matrix) => {
                format!("{} samples, {} features", matrix.rows(), matrix.dimension())
            }
            SearchBackend::Noop => "noop".to_string(),
        }
    }

    /// Vectorise `lines` into the training matrix.
    ///
    /// Lines are deduplicated (first occurrence wins) and empty token
    /// strings are skipped, so every stored row is a distinct non-zero
    /// vector.
    pub fn train<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let start = Instant::now();
        let SearchBackend::Hashing(matrix) = &mut self.backend else {
            return;
        };
        let mut seen: HashSet<String> = HashSet::new();
        for line in lines {
            let line = line.as_ref();
            if line.is_empty() || seen.contains(line) {
                continue;
            }
            seen.insert(line.to_string());
            matrix.push_row(&vectorize(self.dimension, line));
        }
        self.train_time += start.elapsed();
        tracing::debug!(model = %self.name, info = %self.info(), "trained");
    }

    /// Vectorise one query line with this index's dimension.
    pub fn vectorize_query(&self, line: &str) -> FeatureVector {
        vectorize(self.dimension, line)
    }

    /// Cosine distance to the nearest training row, one result per
    /// query. Queries run in fixed-size chunks to bound the working set.
    /// An empty query vector cannot be an anomaly relative to anything
    /// and scores `0.0`.
    ///
    /// # Errors
    ///
    /// `NotFittedModel` when the index holds no rows.
    pub fn query(&self, queries: &[FeatureVector], chunk_size: usize) -> Result<Vec<f32>> {
        let matrix = match &self.backend {
            SearchBackend::Hashing(matrix) => {
                if matrix.is_empty() {
                    return Err(Error::NotFittedModel(self.name.clone()));
                }
                matrix
            }
            SearchBackend::Noop => return Ok(vec![0.0; queries.len()]),
        };
        let mut distances = Vec::with_capacity(queries.len());
        for chunk in queries.chunks(chunk_size.max(1)) {
            for query in chunk {
                if query.is_empty() {
                    distances.push(0.0);
                } else {
                    distances.push(matrix.nearest_distance(query));
                }
            }
        }
        Ok(distances)
    }
}
