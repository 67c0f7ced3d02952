use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use regex::Regex;

use logsift::config::{self, Settings, SiftConfig};
use logsift::files::{ScanOptions, Source};
use logsift::model::{Classifier, Hooks};
use logsift::report::Report;
use logsift::{router, tokenizer};

#[derive(Parser)]
#[command(
    name = "logsift",
    about = "Extract anomalous lines from CI job logs by comparing them against known-good runs"
)]
struct Cli {
    /// Print the full report as JSON instead of console lines
    #[arg(long, global = true)]
    json: bool,

    /// Write the JSON report to a file (suppresses console lines)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Show per-model progress details
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: .logsift.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Outlier distance threshold: 0.0 reports every line, 1.0 only
    /// clear anomalies
    #[arg(long, global = true)]
    threshold: Option<f32>,

    /// Line gap under which neighbouring anomalies merge into one block
    #[arg(long, global = true)]
    merge_distance: Option<usize>,

    /// Context lines before each anomaly
    #[arg(long, global = true)]
    before_context: Option<usize>,

    /// Context lines after each anomaly
    #[arg(long, global = true)]
    after_context: Option<usize>,

    /// Set both context sizes at once
    #[arg(long, global = true)]
    context_length: Option<usize>,

    /// Skip files whose basename matches this pattern (repeatable)
    #[arg(long = "ignore-file", global = true)]
    ignore_files: Vec<String>,

    /// Skip files whose relative path matches this pattern (repeatable)
    #[arg(long = "ignore-path", global = true)]
    ignore_paths: Vec<String>,

    /// Exclude matching lines from training and testing (repeatable)
    #[arg(long = "ignore-line", global = true)]
    ignore_lines: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on baselines and test targets in one pass
    Diff {
        /// Known-good log path (repeatable)
        #[arg(long = "baseline", required_unless_present = "baseline_builds")]
        baselines: Vec<PathBuf>,

        /// Known-good build descriptor JSON (repeatable)
        #[arg(long = "baseline-build")]
        baseline_builds: Vec<PathBuf>,

        /// Log paths under investigation
        #[arg(required_unless_present = "target_builds")]
        targets: Vec<PathBuf>,

        /// Build descriptor JSON under investigation (repeatable)
        #[arg(long = "target-build")]
        target_builds: Vec<PathBuf>,

        /// Also persist the trained model
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Train a model from baselines and persist it
    Train {
        /// Where to write the model
        #[arg(long)]
        model: PathBuf,

        /// Known-good log path (repeatable)
        #[arg(long = "baseline", required_unless_present = "baseline_builds")]
        baselines: Vec<PathBuf>,

        /// Known-good build descriptor JSON (repeatable)
        #[arg(long = "baseline-build")]
        baseline_builds: Vec<PathBuf>,
    },
    /// Test targets against a persisted model
    Test {
        /// Model file written by `train`
        #[arg(long)]
        model: PathBuf,

        /// Log paths under investigation
        #[arg(required_unless_present = "target_builds")]
        targets: Vec<PathBuf>,

        /// Build descriptor JSON under investigation (repeatable)
        #[arg(long = "target-build")]
        target_builds: Vec<PathBuf>,
    },
    /// Validate a model file and show what it contains
    Check {
        /// Model file to inspect
        #[arg(long)]
        model: PathBuf,
    },
    /// Show how one line is tokenised
    Tokenize { line: String },
    /// Tokenise a whole file, printing every line the normaliser changed
    TokenizeFile { path: PathBuf },
    /// Show which model name a relative path routes to
    ModelName { path: String },
    /// List how the files of a log tree group into models
    Groups { path: PathBuf },
}

/// Console runs historically default to three lines of leading and one
/// line of trailing context; the library default is two of each.
const CONSOLE_BEFORE_CONTEXT: usize = 3;
const CONSOLE_AFTER_CONTEXT: usize = 1;

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    match &cli.config {
        Some(path) => config::try_load_settings(path)?
            .with_context(|| format!("settings file not found: {}", path.display())),
        None => config::load_default_settings(),
    }
}

/// Resolve the effective detection config: CLI flags beat the settings
/// file, which beats the console defaults.
fn build_config(cli: &Cli, settings: &Settings) -> SiftConfig {
    let mut config = SiftConfig {
        before_context: CONSOLE_BEFORE_CONTEXT,
        after_context: CONSOLE_AFTER_CONTEXT,
        ..SiftConfig::default()
    };
    settings.apply(&mut config);
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    if let Some(merge) = cli.merge_distance {
        config.merge_distance = merge;
    }
    if let Some(before) = cli.before_context {
        config.before_context = before;
    }
    if let Some(after) = cli.after_context {
        config.after_context = after;
    }
    if let Some(both) = cli.context_length {
        config.before_context = both;
        config.after_context = both;
    }
    config
}

fn build_scan_options(cli: &Cli, settings: &Settings) -> ScanOptions {
    let mut files = settings.ignore_files.clone();
    files.extend(cli.ignore_files.iter().cloned());
    let mut paths = settings.ignore_paths.clone();
    paths.extend(cli.ignore_paths.iter().cloned());
    ScanOptions::new(&files, &paths)
}

/// The default hooks, with the tokenizer wrapped to reject ignored
/// lines outright when `--ignore-line` patterns are given.
fn build_hooks(cli: &Cli, settings: &Settings) -> Hooks {
    let mut patterns: Vec<Regex> = Vec::new();
    for source in settings.ignore_lines.iter().chain(&cli.ignore_lines) {
        match Regex::new(source) {
            Ok(re) => patterns.push(re),
            Err(e) => eprintln!("[logsift] invalid ignore-line pattern {source:?}: {e}"),
        }
    }
    let mut hooks = Hooks::default();
    if !patterns.is_empty() {
        hooks.tokenizer = Arc::new(move |line: &str| {
            if patterns.iter().any(|re| re.is_match(line)) {
                String::new()
            } else {
                tokenizer::process(line)
            }
        });
    }
    hooks
}

/// Plain paths plus build descriptors loaded from JSON files.
fn sources(paths: &[PathBuf], builds: &[PathBuf]) -> anyhow::Result<Vec<Source>> {
    let mut sources: Vec<Source> = paths.iter().map(Source::path).collect();
    for path in builds {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read build descriptor: {}", path.display()))?;
        let build: logsift::files::Build = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse build descriptor: {}", path.display()))?;
        sources.push(Source::Build(build));
    }
    Ok(sources)
}

fn command_line() -> String {
    std::env::args().collect::<Vec<String>>().join(" ")
}

/// Anomalies as `distance | file:line:<tab>text`, `--` between blocks.
fn print_console(report: &Report) {
    for (path, file) in &report.files {
        let mut last_pos: Option<usize> = None;
        for (i, &(pos, distance)) in file.scores.iter().enumerate() {
            if let Some(last) = last_pos
                && pos != last
                && pos != last + 1
            {
                println!("--");
            }
            println!("{distance:1.3} | {path}:{:04}:\t{}", pos + 1, file.lines[i]);
            last_pos = Some(pos);
        }
    }
}

fn emit(cli: &Cli, report: &Report) -> anyhow::Result<()> {
    if let Some(path) = &cli.output {
        std::fs::write(path, report.to_json().context("serialize report")?)
            .with_context(|| format!("failed to write report: {}", path.display()))?;
    }
    if cli.json {
        println!("{}", report.to_json().context("serialize report")?);
    } else if cli.output.is_none() {
        print_console(report);
    }
    Ok(())
}

fn cmd_diff(
    cli: &Cli,
    baselines: Vec<Source>,
    targets: Vec<Source>,
    save: Option<&Path>,
) -> anyhow::Result<i32> {
    let settings = load_settings(cli)?;
    let mut classifier =
        Classifier::with_hooks(build_config(cli, &settings), build_hooks(cli, &settings));
    classifier.set_scan_options(build_scan_options(cli, &settings));
    classifier.train(&baselines, &command_line())?;
    if let Some(path) = save {
        classifier.save(path)?;
    }
    let report = classifier.process(&targets, &command_line())?;
    emit(cli, &report)?;
    Ok(0)
}

fn cmd_train(cli: &Cli, model: &Path, baselines: Vec<Source>) -> anyhow::Result<i32> {
    let settings = load_settings(cli)?;
    let mut classifier =
        Classifier::with_hooks(build_config(cli, &settings), build_hooks(cli, &settings));
    classifier.set_scan_options(build_scan_options(cli, &settings));
    let lines = classifier.train(&baselines, &command_line())?;
    classifier.save(model)?;
    eprintln!(
        "[logsift] trained on {lines} lines, model written to {}",
        model.display()
    );
    Ok(0)
}

fn cmd_test(cli: &Cli, model: &Path, targets: Vec<Source>) -> anyhow::Result<i32> {
    let settings = load_settings(cli)?;
    let mut classifier = Classifier::load_with_hooks(model, build_hooks(cli, &settings))?;
    *classifier.config_mut() = build_config(cli, &settings);
    classifier.set_scan_options(build_scan_options(cli, &settings));
    let report = classifier.process(&targets, &command_line())?;
    emit(cli, &report)?;
    Ok(0)
}

fn cmd_check(model: &Path) -> anyhow::Result<i32> {
    let classifier = Classifier::load(model)?;
    eprintln!(
        "[logsift] {} is valid ({} lines trained)",
        model.display(),
        classifier.training_lines()
    );
    for index in classifier.models() {
        println!(
            "{}: {} [{}] from {} files",
            index.name(),
            index.info(),
            index.uuid(),
            index.sources().len()
        );
    }
    Ok(0)
}

fn cmd_tokenize(line: &str) -> i32 {
    println!("[{line}] => [{}]", tokenizer::process(line));
    0
}

/// Print every line the normaliser changed, with running word/token
/// tallies, to eyeball what the detector actually compares.
fn cmd_tokenize_file(path: &Path) -> anyhow::Result<i32> {
    use std::collections::HashSet;

    let Some(lines) = logsift::files::reader::LogLines::open(path)? else {
        eprintln!("[logsift] {} is empty", path.display());
        return Ok(0);
    };
    let mut words: HashSet<String> = HashSet::new();
    let mut tokens: HashSet<String> = HashSet::new();
    for line in lines {
        let line = line?;
        words.extend(line.split_whitespace().map(ToString::to_string));
        let processed = tokenizer::process(&line);
        tokens.extend(processed.split_whitespace().map(ToString::to_string));
        if line != processed {
            println!("   {line}");
            println!("-> {processed}");
        }
    }
    println!("Total words: {} Total tokens: {}", words.len(), tokens.len());
    Ok(0)
}

fn cmd_model_name(path: &str) -> i32 {
    println!("{}", router::model_name(path));
    0
}

/// Walk a tree and print each model name with the files feeding it.
fn cmd_groups(path: &Path) -> i32 {
    let mut groups: std::collections::BTreeMap<String, Vec<String>> =
        std::collections::BTreeMap::new();
    let files = logsift::files::scan(
        &[Source::path(path)],
        &ScanOptions::default(),
        &|_: &str| true,
    );
    for file in files {
        groups
            .entry(router::model_name(&file.rel_path))
            .or_default()
            .push(file.rel_path);
    }
    for (group, members) in groups {
        println!("{group}:");
        for member in members {
            println!("\t{member}");
        }
    }
    0
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "logsift=debug" } else { "logsift=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("LOGSIFT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Diff {
            baselines,
            baseline_builds,
            targets,
            target_builds,
            save,
        } => sources(baselines, baseline_builds).and_then(|base| {
            sources(targets, target_builds)
                .and_then(|tgt| cmd_diff(&cli, base, tgt, save.as_deref()))
        }),
        Commands::Train {
            model,
            baselines,
            baseline_builds,
        } => sources(baselines, baseline_builds).and_then(|base| cmd_train(&cli, model, base)),
        Commands::Test {
            model,
            targets,
            target_builds,
        } => sources(targets, target_builds).and_then(|tgt| cmd_test(&cli, model, tgt)),
        Commands::Check { model } => cmd_check(model),
        Commands::Tokenize { line } => Ok(cmd_tokenize(line)),
        Commands::TokenizeFile { path } => cmd_tokenize_file(path),
        Commands::ModelName { path } => Ok(cmd_model_name(path)),
        Commands::Groups { path } => Ok(cmd_groups(path)),
    };

    let exit_code = result.unwrap_or_else(|e| {
        eprintln!("[logsift] error: {e:#}");
        1
    });
    std::process::exit(exit_code);
}
