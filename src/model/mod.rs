pub mod assembler;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::SiftConfig;
use crate::error::{Error, Result};
use crate::files::reader::LogLines;
use crate::files::{self, LogFile, ScanOptions, Source};
use crate::index::Index;
use crate::report::{Report, ReportBuilder};
use crate::{router, tokenizer};

pub const MODEL_MAGIC: [u8; 4] = *b"LGRD";
pub const MODEL_VERSION: u32 = 1;

/// Lines past these markers in the top-level job log describe a previous
/// run of this very tool; training or testing on them would be circular.
const SELF_REPORT_MARKERS: [&str; 2] = ["TASK [log-classify ", "TASK [Generate ara report]"];

pub type TokenizerFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type RouterFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type KeepFileFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// The functional plug points: line tokenizer, path-to-model router and
/// keep-file predicate. Never persisted; a loaded model gets fresh ones.
#[derive(Clone)]
pub struct Hooks {
    pub tokenizer: TokenizerFn,
    pub router: RouterFn,
    pub keep_file: KeepFileFn,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            tokenizer: Arc::new(|line: &str| tokenizer::process(line)),
            router: Arc::new(|path: &str| router::model_name(path)),
            keep_file: Arc::new(|_: &str| true),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hooks { .. }")
    }
}

/// Scored lines for one target file.
#[derive(Debug, Clone)]
pub struct FileScore {
    pub rel_path: String,
    pub url: String,
    pub model: String,
    /// Raw line text, in file order.
    pub lines: Vec<String>,
    /// Nearest-neighbour distance per raw line.
    pub distances: Vec<f32>,
    pub test_time: f64,
}

/// What testing one target file produced.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Scored(FileScore),
    /// No trained model covers this file.
    Unknown { rel_path: String, url: String },
    /// The file routed to a model that cannot serve queries.
    Skipped {
        rel_path: String,
        url: String,
        model: String,
        lines_count: usize,
        test_time: f64,
    },
}

impl FileOutcome {
    fn lines_count(&self) -> usize {
        match self {
            Self::Scored(score) => score.lines.len(),
            Self::Unknown { .. } => 0,
            Self::Skipped { lines_count, .. } => *lines_count,
        }
    }
}

/// Trains per-model indexes from baselines and scores targets against
/// them.
///
/// Lifecycle: created empty, trained once, then queried any number of
/// times (queries never mutate). `save`/`load` round-trip everything
/// except the hooks, which are re-bound at load time.
#[derive(Debug, Serialize, Deserialize)]
pub struct Classifier {
    config: SiftConfig,
    indexes: BTreeMap<String, Index>,
    baselines: Vec<String>,
    train_command: String,
    training_lines_count: usize,
    training_bytes: u64,
    #[serde(skip, default)]
    hooks: Hooks,
    #[serde(skip, default)]
    scan_options: ScanOptions,
}

impl Classifier {
    pub fn new(config: SiftConfig) -> Self {
        Self::with_hooks(config, Hooks::default())
    }

    pub fn with_hooks(config: SiftConfig, hooks: Hooks) -> Self {
        Self {
            config,
            indexes: BTreeMap::new(),
            baselines: Vec::new(),
            train_command: String::new(),
            training_lines_count: 0,
            training_bytes: 0,
            hooks,
            scan_options: ScanOptions::default(),
        }
    }

    pub const fn config(&self) -> &SiftConfig {
        &self.config
    }

    pub const fn config_mut(&mut self) -> &mut SiftConfig {
        &mut self.config
    }

    pub fn set_hooks(&mut self, hooks: Hooks) {
        self.hooks = hooks;
    }

    pub fn set_scan_options(&mut self, options: ScanOptions) {
        self.scan_options = options;
    }

    pub fn models(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    pub const fn training_lines(&self) -> usize {
        self.training_lines_count
    }

    pub fn train_command(&self) -> &str {
        &self.train_command
    }

    fn is_self_report(model: &str, line: &str) -> bool {
        model == "job-output.txt" && SELF_REPORT_MARKERS.iter().any(|m| line.contains(m))
    }

    /// The job log carries ansible task results whose `stdout_lines`
    /// arrays duplicate the adjacent `stdout` value; strip them before
    /// anything else sees the line.
    fn normalise(model: &str, line: String) -> String {
        if model == "job-output.txt" && line.contains("_lines\": ") {
            tokenizer::strip_stdout_line_lists(&line)
        } else {
            line
        }
    }

    /// Read `file` and tokenise every line, stopping at a self-report
    /// marker. Returns the token strings in file order plus the raw line
    /// count.
    fn read_tokenised(&self, model: &str, file: &LogFile) -> Result<(Vec<String>, usize)> {
        let Some(reader) = LogLines::open(&file.path)? else {
            return Ok((Vec::new(), 0));
        };
        let mut tokens = Vec::new();
        let mut count = 0;
        for line in reader {
            let line = line.map_err(|e| Error::UnreadableFile {
                path: file.path.clone(),
                source: e,
            })?;
            if Self::is_self_report(model, &line) {
                break;
            }
            let line = Self::normalise(model, line);
            tokens.push((self.hooks.tokenizer)(&line));
            count += 1;
        }
        Ok((tokens, count))
    }

    /// Build one index per model name from the baseline trees.
    ///
    /// Returns the number of training lines read. Unreadable files are
    /// logged and skipped; a model whose files yield no usable tokens is
    /// kept unfitted so that targets routed to it are reported as
    /// skipped rather than unknown.
    ///
    /// # Errors
    ///
    /// `NoTrainingData` when every baseline file together yields zero
    /// lines.
    pub fn train(&mut self, baselines: &[Source], command: &str) -> Result<usize> {
        let start = Instant::now();
        self.train_command = command.to_string();
        self.baselines = baselines.iter().map(ToString::to_string).collect();

        let selected = files::scan(baselines, &self.scan_options, self.hooks.keep_file.as_ref());
        let mut buckets: BTreeMap<String, Vec<LogFile>> = BTreeMap::new();
        for file in selected {
            buckets
                .entry((self.hooks.router)(&file.rel_path))
                .or_default()
                .push(file);
        }

        for (model_name, bucket) in buckets {
            let mut index = Index::new(&model_name, self.config.hash_dimension);
            let mut seen: HashSet<String> = HashSet::new();
            let mut distinct: Vec<String> = Vec::new();
            for file in bucket {
                match self.read_tokenised(&model_name, &file) {
                    Ok((tokens, count)) => {
                        for token_line in tokens {
                            if !token_line.is_empty() && !seen.contains(&token_line) {
                                seen.insert(token_line.clone());
                                distinct.push(token_line);
                            }
                        }
                        let bytes = std::fs::metadata(&file.path).map(|m| m.len()).unwrap_or(0);
                        index.add_volume(count, bytes);
                        index.add_source(file.url);
                    }
                    Err(e) if e.is_per_file() => {
                        tracing::warn!(error = %e, "skipping unreadable baseline file");
                    }
                    Err(e) => return Err(e),
                }
            }
            if distinct.is_empty() {
                tracing::info!(model = %model_name, "no training data found");
            } else {
                index.train(distinct);
                self.training_lines_count += index.line_count();
                self.training_bytes += index.byte_count();
            }
            self.indexes.insert(model_name, index);
        }

        let elapsed = start.elapsed().as_secs_f64();
        tracing::info!(
            models = self.indexes.len(),
            speed = %format_speed(self.training_lines_count, self.training_bytes, elapsed),
            "training done"
        );
        if self.training_lines_count == 0 {
            return Err(Error::NoTrainingData);
        }
        Ok(self.training_lines_count)
    }

    /// The index a target file should be compared against. With a single
    /// trained model every file routes to it unconditionally, so two
    /// arbitrary files can be diffed regardless of their names.
    fn route(&self, rel_path: &str) -> Option<&Index> {
        if self.indexes.len() == 1 {
            return self.indexes.values().next();
        }
        self.indexes.get(&(self.hooks.router)(rel_path))
    }

    /// Score one file, or `None` when its payload is empty (a bare
    /// compression header) and there is nothing to report.
    fn test_file(&self, file: &LogFile) -> Result<Option<FileOutcome>> {
        let start = Instant::now();
        let Some(index) = self.route(&file.rel_path) else {
            tracing::debug!(file = %file.rel_path, "no model for file");
            return Ok(Some(FileOutcome::Unknown {
                rel_path: file.rel_path.clone(),
                url: file.url.clone(),
            }));
        };
        tracing::debug!(model = %index.name(), file = %file.rel_path, "testing");

        let Some(reader) = LogLines::open(&file.path)? else {
            return Ok(None);
        };

        // Tokenised duplicates share one query; each line remembers
        // which query slot its distance comes from.
        let mut raw_lines: Vec<String> = Vec::new();
        let mut line_query: Vec<Option<usize>> = Vec::new();
        let mut queries = Vec::new();
        let mut first_seen: HashMap<String, usize> = HashMap::new();
        for line in reader {
            let line = line.map_err(|e| Error::UnreadableFile {
                path: file.path.clone(),
                source: e,
            })?;
            if Self::is_self_report(index.name(), &line) {
                break;
            }
            let line = Self::normalise(index.name(), line);
            let token_line = (self.hooks.tokenizer)(&line);
            if token_line.is_empty() {
                line_query.push(None);
            } else if let Some(&slot) = first_seen.get(&token_line) {
                line_query.push(Some(slot));
            } else {
                let slot = queries.len();
                queries.push(index.vectorize_query(&token_line));
                first_seen.insert(token_line, slot);
                line_query.push(Some(slot));
            }
            raw_lines.push(line);
        }

        let unique_distances = match index.query(&queries, self.config.chunk_size) {
            Ok(distances) => distances,
            Err(Error::NotFittedModel(model)) => {
                tracing::warn!(model = %model, file = %file.rel_path, "unfitted model, skipping");
                return Ok(Some(FileOutcome::Skipped {
                    rel_path: file.rel_path.clone(),
                    url: file.url.clone(),
                    model,
                    lines_count: raw_lines.len(),
                    test_time: start.elapsed().as_secs_f64(),
                }));
            }
            Err(e) => return Err(e),
        };

        // A line with no query slot tokenised to nothing: distance 0.
        // Duplicates inherit the first occurrence's distance.
        let distances: Vec<f32> = line_query
            .iter()
            .map(|slot| slot.map_or(0.0, |s| unique_distances[s]))
            .collect();

        Ok(Some(FileOutcome::Scored(FileScore {
            rel_path: file.rel_path.clone(),
            url: file.url.clone(),
            model: index.name().to_string(),
            lines: raw_lines,
            distances,
            test_time: start.elapsed().as_secs_f64(),
        })))
    }

    /// Lazily score every target file. Per-file failures are logged and
    /// skipped; they never abort the run.
    pub fn test(&self, targets: &[Source]) -> TestRun<'_> {
        let selected = files::scan(targets, &self.scan_options, self.hooks.keep_file.as_ref());
        TestRun {
            classifier: self,
            files: selected.into_iter(),
            testing_lines: 0,
        }
    }

    /// Test `targets` and assemble the full report.
    ///
    /// # Errors
    ///
    /// `NoTestData` when the targets yield zero lines.
    pub fn process(&self, targets: &[Source], command: &str) -> Result<Report> {
        let start = Instant::now();
        let mut builder = ReportBuilder::new(
            targets.iter().map(ToString::to_string).collect(),
            self.baselines.clone(),
            &self.train_command,
            command,
        );

        let mut run = self.test(targets);
        for outcome in run.by_ref() {
            match outcome {
                FileOutcome::Scored(score) => {
                    let Some(index) = self.indexes.get(&score.model) else {
                        continue;
                    };
                    let emitted = assembler::collect(&score.distances, &self.config);
                    let outlier_lines = score
                        .distances
                        .iter()
                        .filter(|&&d| d >= self.config.threshold)
                        .count();
                    builder.add_scored(
                        &score.rel_path,
                        &score.url,
                        index,
                        &emitted,
                        &score.lines,
                        outlier_lines,
                        score.test_time,
                    );
                }
                FileOutcome::Unknown { rel_path, url } => builder.add_unknown(&rel_path, &url),
                FileOutcome::Skipped {
                    rel_path,
                    url,
                    model,
                    test_time,
                    ..
                } => builder.add_skipped(&rel_path, &url, &model, test_time),
            }
        }

        let testing_lines = run.testing_lines();
        let elapsed = start.elapsed().as_secs_f64();
        tracing::info!(
            speed = %format_speed(testing_lines, 0, elapsed),
            "testing done"
        );
        if testing_lines == 0 {
            return Err(Error::NoTestData);
        }
        Ok(builder.finish(self.training_lines_count, testing_lines, elapsed))
    }

    /// Persist to `path`: the `LGRD` magic, a little-endian format
    /// version, then the bincode body. The write is atomic (temp file +
    /// rename) so a crashed run never leaves a half-written model.
    ///
    /// # Errors
    ///
    /// I/O failures on the destination.
    pub fn save(&self, path: &Path) -> Result<()> {
        let body =
            bincode::serialize(self).map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let mut data = Vec::with_capacity(body.len() + 8);
        data.extend_from_slice(&MODEL_MAGIC);
        data.extend_from_slice(&MODEL_VERSION.to_le_bytes());
        data.extend_from_slice(&body);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &data)?;
        std::fs::rename(&tmp, path)?;
        tracing::info!(path = %path.display(), bytes = data.len(), "model written");
        Ok(())
    }

    /// Load a model saved by [`Classifier::save`] with default hooks.
    ///
    /// # Errors
    ///
    /// `InvalidModelFile` for a bad magic, an unsupported version or a
    /// malformed body; nothing is partially loaded in those cases.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_hooks(path, Hooks::default())
    }

    /// Load and re-bind the given hooks (they are never persisted).
    ///
    /// # Errors
    ///
    /// See [`Classifier::load`].
    pub fn load_with_hooks(path: &Path, hooks: Hooks) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidModelFile {
            path: path.to_path_buf(),
            reason,
        };
        let data = std::fs::read(path)?;
        if data.len() < 8 {
            return Err(invalid("truncated header".to_string()));
        }
        if data[..4] != MODEL_MAGIC {
            return Err(invalid("bad magic".to_string()));
        }
        let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if version != MODEL_VERSION {
            return Err(invalid(format!("unsupported version {version}")));
        }
        let mut classifier: Self = bincode::deserialize(&data[8..])
            .map_err(|_| invalid("malformed body".to_string()))?;
        classifier.hooks = hooks;
        tracing::info!(path = %path.display(), models = classifier.indexes.len(), "model loaded");
        Ok(classifier)
    }
}

/// Lazy per-file outcomes for one `test` call, counting lines as it
/// goes.
pub struct TestRun<'a> {
    classifier: &'a Classifier,
    files: std::vec::IntoIter<LogFile>,
    testing_lines: usize,
}

impl TestRun<'_> {
    /// Raw target lines read so far.
    pub const fn testing_lines(&self) -> usize {
        self.testing_lines
    }
}

impl Iterator for TestRun<'_> {
    type Item = FileOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let file = self.files.next()?;
            match self.classifier.test_file(&file) {
                Ok(Some(outcome)) => {
                    self.testing_lines += outcome.lines_count();
                    return Some(outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, file = %file.rel_path, "skipping file");
                }
            }
        }
    }
}

fn format_speed(lines: usize, bytes: u64, elapsed: f64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let (mb, kl) = (bytes as f64 / 1e6, lines as f64 / 1e3);
    let secs = elapsed.max(1e-9);
    format!(
        "{elapsed:.3}s at {:.3}MB/s ({:.3}kl/s) ({mb:.3} MB - {kl:.3} kilo-lines)",
        mb / secs,
        kl / secs
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn write_tree(root: &Path, entries: &[(&str, &str)]) {
        for (rel, content) in entries {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
    }

    fn trained(dir: &Path) -> Classifier {
        let mut classifier = Classifier::new(SiftConfig::default());
        classifier
            .train(&[Source::path(dir)], "logsift train test-baseline")
            .unwrap();
        classifier
    }

    const BASELINE: &str = "Server created successfully\nBootloader initialized\nKernel started normally\n";

    #[test]
    fn train_then_score_novel_line() {
        let base = tempfile::TempDir::new().unwrap();
        let target = tempfile::TempDir::new().unwrap();
        write_tree(base.path(), &[("console.log", BASELINE)]);
        write_tree(
            target.path(),
            &[(
                "console.log",
                "Server created successfully\nKernel panic unable to mount root\n",
            )],
        );

        let classifier = trained(base.path());
        let outcomes: Vec<_> = classifier.test(&[Source::path(target.path())]).collect();
        assert_eq!(outcomes.len(), 1);
        let FileOutcome::Scored(score) = &outcomes[0] else {
            panic!("expected a scored file, got {outcomes:?}");
        };
        assert!(score.distances[0] < 0.2, "known line: {:?}", score.distances);
        assert!(score.distances[1] > 0.5, "novel line: {:?}", score.distances);
    }

    #[test]
    fn train_records_counts_and_provenance() {
        let base = tempfile::TempDir::new().unwrap();
        write_tree(base.path(), &[("console.log", BASELINE)]);
        let classifier = trained(base.path());
        assert_eq!(classifier.training_lines(), 3);
        let index = classifier.models().next().unwrap();
        assert_eq!(index.sources().len(), 1);
        assert!(index.sources()[0].ends_with("console.log"));
        assert_eq!(classifier.train_command(), "logsift train test-baseline");
    }

    #[test]
    fn empty_baselines_fail_training() {
        let base = tempfile::TempDir::new().unwrap();
        let mut classifier = Classifier::new(SiftConfig::default());
        let err = classifier
            .train(&[Source::path(base.path())], "cmd")
            .unwrap_err();
        assert!(matches!(err, Error::NoTrainingData));
    }

    #[test]
    fn duplicate_lines_inherit_first_distance() {
        let base = tempfile::TempDir::new().unwrap();
        let target = tempfile::TempDir::new().unwrap();
        write_tree(base.path(), &[("app.log", "common baseline content here\n")]);
        write_tree(
            target.path(),
            &[(
                "app.log",
                "unexpected catastrophic meltdown\nsome filler words here\nunexpected catastrophic meltdown\n",
            )],
        );
        let classifier = trained(base.path());
        let outcomes: Vec<_> = classifier.test(&[Source::path(target.path())]).collect();
        let FileOutcome::Scored(score) = &outcomes[0] else {
            panic!("expected scored outcome");
        };
        assert_eq!(score.distances[0], score.distances[2]);
    }

    #[test]
    fn empty_tokenisation_scores_zero() {
        let base = tempfile::TempDir::new().unwrap();
        let target = tempfile::TempDir::new().unwrap();
        write_tree(base.path(), &[("app.log", "common baseline content here\n")]);
        // 64-char single tokens are nuisance-dropped by the tokenizer.
        let noise = "x".repeat(64);
        write_tree(target.path(), &[("app.log", &format!("{noise}\n"))]);
        let classifier = trained(base.path());
        let outcomes: Vec<_> = classifier.test(&[Source::path(target.path())]).collect();
        let FileOutcome::Scored(score) = &outcomes[0] else {
            panic!("expected scored outcome");
        };
        assert_eq!(score.distances, vec![0.0]);
    }

    #[test]
    fn single_model_routes_everything() {
        let base = tempfile::TempDir::new().unwrap();
        let target = tempfile::TempDir::new().unwrap();
        write_tree(base.path(), &[("console.log", BASELINE)]);
        write_tree(target.path(), &[("completely-different-name.txt", "Server created successfully\n")]);
        let classifier = trained(base.path());
        let outcomes: Vec<_> = classifier.test(&[Source::path(target.path())]).collect();
        assert!(
            matches!(&outcomes[0], FileOutcome::Scored(s) if s.model == "console.log"),
            "got {outcomes:?}"
        );
    }

    #[test]
    fn unknown_files_with_multiple_models() {
        let base = tempfile::TempDir::new().unwrap();
        let target = tempfile::TempDir::new().unwrap();
        write_tree(
            base.path(),
            &[("console.log", BASELINE), ("syslog/messages.log", "daemon himself started ok\n")],
        );
        write_tree(target.path(), &[("mystery.data.yaml", "unknown kind of file\n")]);
        let classifier = trained(base.path());
        let outcomes: Vec<_> = classifier.test(&[Source::path(target.path())]).collect();
        assert!(
            matches!(&outcomes[0], FileOutcome::Unknown { rel_path, .. } if rel_path == "mystery.data.yaml"),
            "got {outcomes:?}"
        );
    }

    #[test]
    fn job_output_cutoff_at_self_report() {
        let base = tempfile::TempDir::new().unwrap();
        write_tree(
            base.path(),
            &[(
                "job-output.txt",
                "normal task output line\nTASK [log-classify : run] **\nreport internals after marker\n",
            )],
        );
        let classifier = trained(base.path());
        // Only the line before the marker trains.
        assert_eq!(classifier.training_lines(), 1);
    }

    #[test]
    fn process_builds_report() {
        let base = tempfile::TempDir::new().unwrap();
        let target = tempfile::TempDir::new().unwrap();
        write_tree(base.path(), &[("console.log", BASELINE)]);
        write_tree(
            target.path(),
            &[(
                "console.log",
                "Server created successfully\nBootloader initialized\nKernel panic unable to mount\n",
            )],
        );
        let classifier = trained(base.path());
        let report = classifier
            .process(&[Source::path(target.path())], "logsift test test-target")
            .unwrap();
        assert_eq!(report.testing_lines_count, 3);
        assert_eq!(report.training_lines_count, 3);
        assert!(report.outlier_lines_count >= 1);
        assert!(report.outlier_lines_count <= report.testing_lines_count);
        let expected = 100.0
            - (report.outlier_lines_count as f64 / report.testing_lines_count as f64) * 100.0;
        assert!((report.reduction - expected).abs() < 1e-9);
        assert!(report.files.contains_key("console.log"));
        assert!(report.models.contains_key("console.log"));
    }

    #[test]
    fn process_without_lines_is_no_test_data() {
        let base = tempfile::TempDir::new().unwrap();
        let target = tempfile::TempDir::new().unwrap();
        write_tree(base.path(), &[("console.log", BASELINE)]);
        let classifier = trained(base.path());
        let err = classifier
            .process(&[Source::path(target.path())], "cmd")
            .unwrap_err();
        assert!(matches!(err, Error::NoTestData));
    }

    #[test]
    fn save_load_roundtrip() {
        let base = tempfile::TempDir::new().unwrap();
        let model_dir = tempfile::TempDir::new().unwrap();
        write_tree(base.path(), &[("console.log", BASELINE)]);
        let classifier = trained(base.path());

        let model_path = model_dir.path().join("model.bin");
        classifier.save(&model_path).unwrap();
        let loaded = Classifier::load(&model_path).unwrap();

        assert_eq!(loaded.training_lines(), classifier.training_lines());
        assert_eq!(loaded.train_command(), classifier.train_command());
        let (a, b): (Vec<_>, Vec<_>) = (
            classifier.models().map(Index::info).collect(),
            loaded.models().map(Index::info).collect(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn load_rejects_bad_magic() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"NOPE\x01\x00\x00\x00body").unwrap();
        let err = Classifier::load(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidModelFile { .. }));
    }

    #[test]
    fn load_rejects_wrong_version() {
        let base = tempfile::TempDir::new().unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        write_tree(base.path(), &[("console.log", BASELINE)]);
        let classifier = trained(base.path());
        let path = dir.path().join("model.bin");
        classifier.save(&path).unwrap();

        let mut data = std::fs::read(&path).unwrap();
        data[4..8].copy_from_slice(&99_u32.to_le_bytes());
        std::fs::write(&path, &data).unwrap();

        let err = Classifier::load(&path).unwrap_err();
        assert!(
            matches!(&err, Error::InvalidModelFile { reason, .. } if reason.contains("99")),
            "got {err:?}"
        );
    }

    #[test]
    fn load_rejects_truncated_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"LGR").unwrap();
        let err = Classifier::load(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidModelFile { .. }));
    }

    #[test]
    fn format_speed_shape() {
        let s = format_speed(2000, 3_000_000, 2.0);
        assert!(s.contains("kl/s"), "got {s}");
        assert!(s.contains("MB/s"), "got {s}");
    }
}
