//! A persisted model must behave exactly like the in-memory one.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use logsift::files::Source;
use logsift::model::Classifier;
use logsift::report::Report;
use logsift::SiftConfig;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

const BASELINE: &str = "database connection established\nschema migration applied\nlistening for requests\nshutting down gracefully\n";
const TARGET: &str = "database connection established\nunhandled exception in request loop\nlistening for requests\n";

/// The parts of a report that must be bit-identical across a round trip
/// (times and provenance commands may differ).
fn fingerprint(report: &Report) -> impl PartialEq + std::fmt::Debug + use<> {
    let files: Vec<_> = report
        .files
        .iter()
        .map(|(path, f)| {
            (
                path.clone(),
                f.model.clone(),
                f.scores.clone(),
                f.lines.clone(),
                f.mean_distance,
            )
        })
        .collect();
    (
        files,
        report.unknown_files.clone(),
        report.testing_lines_count,
        report.outlier_lines_count,
        report.anomalies_count,
        report.reduction.to_bits(),
    )
}

#[test]
fn saved_and_loaded_model_scores_identically() {
    let base = tempfile::TempDir::new().unwrap();
    let target = tempfile::TempDir::new().unwrap();
    let model_dir = tempfile::TempDir::new().unwrap();
    write(&base.path().join("server/app.log"), BASELINE);
    write(&target.path().join("server/app.log"), TARGET);

    let mut trained = Classifier::new(SiftConfig::default());
    trained
        .train(&[Source::path(base.path())], "logsift train")
        .unwrap();
    let direct = trained
        .process(&[Source::path(target.path())], "logsift test")
        .unwrap();

    let model_path = model_dir.path().join("model.bin");
    trained.save(&model_path).unwrap();
    let loaded = Classifier::load(&model_path).unwrap();
    let reloaded = loaded
        .process(&[Source::path(target.path())], "logsift test")
        .unwrap();

    assert_eq!(fingerprint(&direct), fingerprint(&reloaded));
    assert_eq!(direct.training_lines_count, reloaded.training_lines_count);
}

#[test]
fn model_survives_two_generations() {
    // save -> load -> save -> load keeps behavior stable.
    let base = tempfile::TempDir::new().unwrap();
    let target = tempfile::TempDir::new().unwrap();
    let model_dir = tempfile::TempDir::new().unwrap();
    write(&base.path().join("app.log"), BASELINE);
    write(&target.path().join("app.log"), TARGET);

    let mut trained = Classifier::new(SiftConfig::default());
    trained
        .train(&[Source::path(base.path())], "train")
        .unwrap();

    let first = model_dir.path().join("first.bin");
    let second = model_dir.path().join("second.bin");
    trained.save(&first).unwrap();
    let generation_one = Classifier::load(&first).unwrap();
    generation_one.save(&second).unwrap();
    let generation_two = Classifier::load(&second).unwrap();

    let a = generation_one
        .process(&[Source::path(target.path())], "test")
        .unwrap();
    let b = generation_two
        .process(&[Source::path(target.path())], "test")
        .unwrap();
    assert_eq!(fingerprint(&a), fingerprint(&b));
}

#[test]
fn loaded_model_keeps_thresholds() {
    let base = tempfile::TempDir::new().unwrap();
    let model_dir = tempfile::TempDir::new().unwrap();
    write(&base.path().join("app.log"), BASELINE);

    let config = SiftConfig {
        threshold: 0.4,
        merge_distance: 9,
        before_context: 1,
        after_context: 7,
        ..SiftConfig::default()
    };
    let mut trained = Classifier::new(config.clone());
    trained
        .train(&[Source::path(base.path())], "train")
        .unwrap();
    let path = model_dir.path().join("model.bin");
    trained.save(&path).unwrap();

    let loaded = Classifier::load(&path).unwrap();
    assert_eq!(*loaded.config(), config);
}

#[test]
fn reports_are_deterministic_across_runs() {
    let base = tempfile::TempDir::new().unwrap();
    let target = tempfile::TempDir::new().unwrap();
    write(&base.path().join("a/x.log"), BASELINE);
    write(&base.path().join("b/y.log"), "cache warmed quickly\nindex rebuilt fully\n");
    write(&target.path().join("a/x.log"), TARGET);
    write(&target.path().join("b/y.log"), "cache warmed quickly\ntotally unexpected corruption\n");

    let run = || {
        let mut classifier = Classifier::new(SiftConfig::default());
        classifier
            .train(&[Source::path(base.path())], "train")
            .unwrap();
        classifier
            .process(&[Source::path(target.path())], "test")
            .unwrap()
    };
    assert_eq!(fingerprint(&run()), fingerprint(&run()));
}
