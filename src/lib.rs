//! Extract the anomalous lines from CI job logs by comparing them
//! against known-good baseline runs.
//!
//! The pipeline: baseline trees are walked ([`files`]), every file is
//! routed to a model name ([`router`]), lines are normalised into stable
//! bags of words ([`tokenizer`]) and hashed into sparse binary vectors
//! ([`index`]). Testing streams each target file through the same path
//! and keeps the lines whose nearest baseline neighbour sits beyond a
//! cosine-distance threshold, with surrounding context ([`model`],
//! [`report`]).

pub mod config;
pub mod error;
pub mod files;
pub mod index;
pub mod model;
pub mod report;
pub mod router;
pub mod tokenizer;

pub use config::SiftConfig;
pub use error::{Error, Result};
pub use files::Source;
pub use model::{Classifier, Hooks};
pub use report::Report;
