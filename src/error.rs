use std::path::PathBuf;

use thiserror::Error;

/// All the ways a run can fail.
///
/// Per-file problems (`UnreadableFile`, `NotFittedModel`) are filtered
/// inside the train/test loops and never abort a run; everything else is
/// fatal to the whole invocation.
#[derive(Debug, Error)]
pub enum Error {
    /// The model file does not carry the expected magic or version.
    #[error("invalid model file {}: {reason}", path.display())]
    InvalidModelFile { path: PathBuf, reason: String },

    /// The baselines yielded zero usable lines.
    #[error("baselines contain no training data")]
    NoTrainingData,

    /// The targets yielded zero usable lines.
    #[error("targets contain no test data")]
    NoTestData,

    /// A file could not be read or decompressed. Isolated per file.
    #[error("{}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A query hit a model whose index holds no training rows.
    /// Isolated per file: the file is reported as skipped.
    #[error("model {0} is not fitted")]
    NotFittedModel(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the per-file error kinds the train/test loops swallow.
    pub const fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::UnreadableFile { .. } | Self::NotFittedModel(_)
        )
    }
}
