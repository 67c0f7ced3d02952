pub mod reader;

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Basename prefixes for machine-fact dumps that carry no useful words.
const DENY_FILES: [&str; 17] = [
    "lsof_network.txt",
    "uname.txt",
    "sysstat.txt",
    "df.txt",
    "rdo-trunk-deps-end.txt",
    "meminfo.txt",
    "repolist.txt",
    "hosts.txt",
    "lsof.txt",
    "lsmod.txt",
    "sysctl.txt",
    "cpuinfo.txt",
    "pstree.txt",
    "iotop.txt",
    "iostat.txt",
    "free.txt",
    "dstat.txt",
];

/// Binary and already-serialised content that word analysis cannot use.
/// Checked after stripping a trailing compression suffix, so `logo.png.gz`
/// is filtered like `logo.png`.
const DENY_EXTENSIONS: [&str; 28] = [
    ".ico", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".bmp", ".ttf", ".woff", ".woff2",
    ".eot", ".otf", ".tgz", ".tar", ".zip", ".jar", ".rpm", ".deb", ".pyc", ".pyo", ".so",
    ".key", ".pem", ".crt", ".csr", ".db", ".sqlite", ".journal",
];

const COMPRESSION_SUFFIXES: [&str; 3] = [".gz", ".bz2", ".xz"];

/// An external build descriptor whose logs were mirrored to disk.
///
/// Files under `local_path` get their public URL recomputed from
/// `log_url` so that reports and model provenance point at the original
/// log server rather than the local mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub uuid: String,
    pub log_url: String,
    pub local_path: PathBuf,
    #[serde(rename = "ref", default)]
    pub change_ref: String,
    #[serde(default)]
    pub project: String,
}

/// Where log lines come from: a plain path (file or directory) or a
/// mirrored build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Path(PathBuf),
    Build(Build),
}

impl Source {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// The on-disk tree that holds this source's files.
    pub fn root(&self) -> &Path {
        match self {
            Self::Path(path) => path,
            Self::Build(build) => &build.local_path,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Build(build) => write!(f, "{}", build.log_url),
        }
    }
}

/// One file selected by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    /// Path relative to the source root, `/`-separated.
    pub rel_path: String,
    /// Public identity: the build's log URL for mirrored content, the
    /// absolute path otherwise.
    pub url: String,
}

/// Caller-supplied deny filters. Invalid patterns are silently dropped.
#[derive(Debug, Default)]
pub struct ScanOptions {
    ignore_files: Vec<Regex>,
    ignore_paths: Vec<Regex>,
}

impl ScanOptions {
    pub fn new(ignore_files: &[String], ignore_paths: &[String]) -> Self {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect::<Vec<Regex>>()
        };
        Self {
            ignore_files: compile(ignore_files),
            ignore_paths: compile(ignore_paths),
        }
    }
}

fn denied_extension(name: &str) -> bool {
    // No bzip2 decoder in the stack: reading the raw bytes would poison
    // the word sets, so those payloads are filtered here.
    if name.ends_with(".bz2") {
        return true;
    }
    let base = COMPRESSION_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name);
    DENY_EXTENSIONS.iter().any(|ext| base.ends_with(ext))
}

fn keep(rel_path: &str, options: &ScanOptions, keep_file: &dyn Fn(&str) -> bool) -> bool {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    if DENY_FILES.iter().any(|deny| name.starts_with(deny)) {
        return false;
    }
    if denied_extension(name) {
        return false;
    }
    if options.ignore_files.iter().any(|re| re.is_match(name)) {
        return false;
    }
    if options.ignore_paths.iter().any(|re| re.is_match(rel_path)) {
        return false;
    }
    keep_file(rel_path)
}

/// Render a path relative to `root` with forward slashes.
fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

fn public_url(source: &Source, path: &Path, rel_path: &str) -> String {
    match source {
        Source::Path(_) => path.to_string_lossy().into_owned(),
        Source::Build(build) => {
            format!("{}/{}", build.log_url.trim_end_matches('/'), rel_path)
        }
    }
}

/// Recursively collect files under `dir`, entries sorted by name so the
/// walk order is stable across runs and platforms. `.git` trees are
/// skipped.
fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::debug!(dir = %dir.display(), "unreadable directory, skipping");
        return;
    };

    let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            if entry.file_name() == ".git" {
                continue;
            }
            collect_files(&path, files);
        } else {
            files.push(path);
        }
    }
}

/// Walk `sources` and return every log file that survives the filters,
/// in deterministic (depth-first, lexicographic) order. Empty files are
/// dropped.
pub fn scan(
    sources: &[Source],
    options: &ScanOptions,
    keep_file: &dyn Fn(&str) -> bool,
) -> Vec<LogFile> {
    let mut selected = Vec::new();
    for source in sources {
        let root = source.root();
        let mut candidates = Vec::new();
        if root.is_dir() {
            collect_files(root, &mut candidates);
        } else {
            candidates.push(root.to_path_buf());
        }

        for path in candidates {
            let rel_path = if root.is_dir() {
                relative(root, &path)
            } else {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            };
            if !keep(&rel_path, options, keep_file) {
                tracing::debug!(file = %rel_path, "filtered out");
                continue;
            }
            if std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0) == 0 {
                continue;
            }
            let url = public_url(source, &path, &rel_path);
            selected.push(LogFile {
                path,
                rel_path,
                url,
            });
        }
    }
    selected
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn keep_all(_: &str) -> bool {
        true
    }

    fn touch(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn walk_is_sorted_and_recursive() {
        let dir = tempfile::TempDir::new().unwrap();
        touch(&dir.path().join("b/inner.log"), "x");
        touch(&dir.path().join("a.log"), "x");
        touch(&dir.path().join("c.log"), "x");

        let files = scan(
            &[Source::path(dir.path())],
            &ScanOptions::default(),
            &keep_all,
        );
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["a.log", "b/inner.log", "c.log"]);
    }

    #[test]
    fn walk_deterministic() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["z.log", "m/q.log", "a/b/c.log"] {
            touch(&dir.path().join(name), "x");
        }
        let once = scan(
            &[Source::path(dir.path())],
            &ScanOptions::default(),
            &keep_all,
        );
        let twice = scan(
            &[Source::path(dir.path())],
            &ScanOptions::default(),
            &keep_all,
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn static_denylists_apply() {
        let dir = tempfile::TempDir::new().unwrap();
        touch(&dir.path().join("console.log"), "x");
        touch(&dir.path().join("cpuinfo.txt"), "x");
        touch(&dir.path().join("logo.png"), "x");
        touch(&dir.path().join("logo.png.gz"), "x");
        touch(&dir.path().join("messages.bz2"), "x");
        touch(&dir.path().join("host.key"), "x");

        let files = scan(
            &[Source::path(dir.path())],
            &ScanOptions::default(),
            &keep_all,
        );
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["console.log"]);
    }

    #[test]
    fn git_tree_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        touch(&dir.path().join(".git/config.log"), "x");
        touch(&dir.path().join("run.log"), "x");
        let files = scan(
            &[Source::path(dir.path())],
            &ScanOptions::default(),
            &keep_all,
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, "run.log");
    }

    #[test]
    fn empty_files_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        touch(&dir.path().join("empty.log"), "");
        touch(&dir.path().join("full.log"), "content");
        let files = scan(
            &[Source::path(dir.path())],
            &ScanOptions::default(),
            &keep_all,
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, "full.log");
    }

    #[test]
    fn caller_deny_regexes() {
        let dir = tempfile::TempDir::new().unwrap();
        touch(&dir.path().join("keep.log"), "x");
        touch(&dir.path().join("noisy.log"), "x");
        touch(&dir.path().join("sub/secret.log"), "x");

        let options = ScanOptions::new(&["^noisy".to_string()], &["^sub/".to_string()]);
        let files = scan(&[Source::path(dir.path())], &options, &keep_all);
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["keep.log"]);
    }

    #[test]
    fn invalid_deny_regex_dropped() {
        let options = ScanOptions::new(&["[invalid".to_string()], &[]);
        assert!(options.ignore_files.is_empty());
    }

    #[test]
    fn keep_file_hook_applies() {
        let dir = tempfile::TempDir::new().unwrap();
        touch(&dir.path().join("a.log"), "x");
        touch(&dir.path().join("b.log"), "x");
        let files = scan(
            &[Source::path(dir.path())],
            &ScanOptions::default(),
            &|rel| rel.starts_with('a'),
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, "a.log");
    }

    #[test]
    fn single_file_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("single.log");
        touch(&path, "x");
        let files = scan(&[Source::path(&path)], &ScanOptions::default(), &keep_all);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, "single.log");
    }

    #[test]
    fn build_source_urls_join_log_url() {
        let dir = tempfile::TempDir::new().unwrap();
        touch(&dir.path().join("job-output.txt"), "x");
        let build = Build {
            uuid: "b-1".to_string(),
            log_url: "https://logs.example.com/42/".to_string(),
            local_path: dir.path().to_path_buf(),
            change_ref: String::new(),
            project: String::new(),
        };
        let files = scan(
            &[Source::Build(build)],
            &ScanOptions::default(),
            &keep_all,
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].url, "https://logs.example.com/42/job-output.txt");
    }

    #[test]
    fn build_descriptor_parses_from_json() {
        let build: Build = serde_json::from_str(
            r#"{
                "uuid": "a1",
                "log_url": "https://logs/1/",
                "local_path": "/tmp/mirror",
                "ref": "refs/changes/1",
                "project": "acme"
            }"#,
        )
        .unwrap();
        assert_eq!(build.change_ref, "refs/changes/1");
        assert_eq!(build.local_path, PathBuf::from("/tmp/mirror"));
    }
}
