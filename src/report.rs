use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::index::Index;
use crate::model::assembler::ScoredLine;

/// Per-file detection outcome as it appears in the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub file_url: String,
    pub model: String,
    /// Seconds spent reading and querying this file.
    pub test_time: f64,
    /// `(line number, distance)` per reported line, in file order.
    pub scores: Vec<(usize, f32)>,
    /// Raw text parallel to `scores`.
    pub lines: Vec<String>,
    pub mean_distance: f32,
}

/// Provenance and shape of one trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub source_files: Vec<String>,
    pub train_time: f64,
    pub info: String,
    pub uuid: String,
}

/// The aggregate result of testing a target tree against a trained
/// classifier. Maps are ordered so two identical runs serialise to
/// identical bytes, time fields aside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub targets: Vec<String>,
    pub baselines: Vec<String>,
    /// Only present when it differs from `test_command`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_command: Option<String>,
    pub test_command: String,
    pub training_lines_count: usize,
    pub testing_lines_count: usize,
    pub outlier_lines_count: usize,
    /// `100 · (1 − outliers / tested)`: the headline figure of merit.
    pub reduction: f64,
    pub total_time: f64,
    pub files: BTreeMap<String, FileReport>,
    pub models: BTreeMap<String, ModelReport>,
    pub unknown_files: Vec<(String, String)>,
    pub anomalies_count: usize,
}

impl Report {
    /// # Errors
    ///
    /// Serialization itself cannot fail for this shape; errors surface
    /// only on the writer.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Expand an ansible-style one-liner: literal `\n` separates segments,
/// literal `\t` unescapes to a tab. Ordinary lines come back unchanged
/// as a single segment.
pub fn expand_segments(line: &str) -> Vec<String> {
    line.split("\\n")
        .map(|segment| segment.replace("\\t", "\t"))
        .collect()
}

/// Incrementally assembles a [`Report`] from per-file outcomes.
pub struct ReportBuilder {
    report: Report,
}

impl ReportBuilder {
    pub fn new(
        targets: Vec<String>,
        baselines: Vec<String>,
        train_command: &str,
        test_command: &str,
    ) -> Self {
        let train_command =
            (train_command != test_command).then(|| train_command.to_string());
        Self {
            report: Report {
                targets,
                baselines,
                train_command,
                test_command: test_command.to_string(),
                training_lines_count: 0,
                testing_lines_count: 0,
                outlier_lines_count: 0,
                reduction: 0.0,
                total_time: 0.0,
                files: BTreeMap::new(),
                models: BTreeMap::new(),
                unknown_files: Vec::new(),
                anomalies_count: 0,
            },
        }
    }

    fn file_url(rel_path: &str, url: &str) -> String {
        if url.starts_with("http") {
            url.to_string()
        } else if rel_path.starts_with("job-output.txt") {
            // The rendered report historically links the compressed name.
            "job-output.txt.gz".to_string()
        } else {
            rel_path.to_string()
        }
    }

    fn model_entry(&mut self, index: &Index) {
        self.report
            .models
            .entry(index.name().to_string())
            .or_insert_with(|| ModelReport {
                source_files: index.sources().to_vec(),
                train_time: index.train_time().as_secs_f64(),
                info: index.info(),
                uuid: index.uuid().to_string(),
            });
    }

    /// Record a scored file: emitted lines are expanded and written with
    /// their `(position, distance)` metadata.
    #[allow(clippy::too_many_arguments)]
    pub fn add_scored(
        &mut self,
        rel_path: &str,
        url: &str,
        index: &Index,
        emitted: &[ScoredLine],
        raw_lines: &[String],
        outlier_lines: usize,
        test_time: f64,
    ) {
        self.model_entry(index);

        let mut scores = Vec::new();
        let mut lines = Vec::new();
        for &(pos, distance) in emitted {
            for segment in expand_segments(&raw_lines[pos]) {
                scores.push((pos, distance));
                lines.push(segment);
            }
        }
        let mean_distance = if scores.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let count = scores.len() as f32;
            scores.iter().map(|&(_, d)| d).sum::<f32>() / count
        };

        self.report.anomalies_count += scores.len();
        self.report.outlier_lines_count += outlier_lines;
        self.report.files.insert(
            rel_path.to_string(),
            FileReport {
                file_url: Self::file_url(rel_path, url),
                model: index.name().to_string(),
                test_time,
                scores,
                lines,
                mean_distance,
            },
        );
    }

    /// Record a file routed to a model that could not serve queries.
    /// It appears in the report with no anomalies.
    pub fn add_skipped(&mut self, rel_path: &str, url: &str, model: &str, test_time: f64) {
        self.report.files.insert(
            rel_path.to_string(),
            FileReport {
                file_url: Self::file_url(rel_path, url),
                model: model.to_string(),
                test_time,
                scores: Vec::new(),
                lines: Vec::new(),
                mean_distance: 0.0,
            },
        );
    }

    /// Record a file no trained model covers.
    pub fn add_unknown(&mut self, rel_path: &str, url: &str) {
        // Deployment-failure digests duplicate content reported
        // elsewhere and are not worth flagging.
        if rel_path.contains("failed_deployment_list.log.txt") {
            return;
        }
        self.report
            .unknown_files
            .push((rel_path.to_string(), Self::file_url(rel_path, url)));
    }

    pub fn finish(
        mut self,
        training_lines_count: usize,
        testing_lines_count: usize,
        total_time: f64,
    ) -> Report {
        self.report.training_lines_count = training_lines_count;
        self.report.testing_lines_count = testing_lines_count;
        self.report.total_time = total_time;
        #[allow(clippy::cast_precision_loss)]
        if testing_lines_count > 0 {
            self.report.reduction = 100.0
                - (self.report.outlier_lines_count as f64 / testing_lines_count as f64) * 100.0;
        }
        self.report
    }
}
