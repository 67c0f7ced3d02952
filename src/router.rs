use std::sync::LazyLock;

use regex::Regex;

use crate::tokenizer;

/// Words containing a digit, extended to the end of the current
/// path-safe run. These are per-run counters, build numbers, rotation
/// suffixes, anything that varies between two runs of the same job.
static DIGIT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"[a-z0-9]*[0-9][a-z0-9]*[^\s/-]*").unwrap()
});

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(&format!("(?i){}", tokenizer::UUID)).unwrap()
});

static SCRUB: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"[^a-zA-Z/._-]").unwrap()
});

/// Extensions that say something about the kind of content and therefore
/// survive into the model name.
const KNOWN_EXTENSIONS: [&str; 11] = [
    ".conf", ".audit", ".yaml", ".orig", ".log", ".xml", ".html", ".txt", ".py", ".json",
    ".yml",
];

/// CI pipeline directory segments: the component right after one of these
/// is a job name worth keeping in the model name.
const PIPELINE_SEGMENTS: [&str; 4] = ["check", "gate", "post", "periodic"];

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parent_name(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) => basename(dir),
        None => "",
    }
}

fn stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Map a relative log path to the name of the model that should learn it.
///
/// Rotated, numbered and otherwise per-run-decorated variants of the same
/// kind of file must land on the same name: `audit/audit.log`,
/// `audit/audit.log.1` and `audit/audit.log.2024-01-02` are one model.
/// Pure and deterministic: equal inputs give equal outputs across
/// processes.
pub fn model_name(rel_path: &str) -> String {
    let base = basename(rel_path);

    // The top-level job log is special and always its own model.
    if base.starts_with("job-output.txt") {
        return "job-output.txt".to_string();
    }
    // Container logs: `k8s_<container>-<pod>-…` groups by container.
    if base.starts_with("k8s_") {
        return base.split('-').next().unwrap_or(base).to_string();
    }

    let joined = format!("{}/{}", parent_name(rel_path), stem(base));
    let stripped = DIGIT_WORD.replace_all(&joined, "");
    let mut name = stripped.trim_start_matches('/').to_string();

    // Keep the job name when the file sits under a pipeline directory.
    let components: Vec<&str> = rel_path.split('/').collect();
    for (pos, component) in components.iter().enumerate() {
        if PIPELINE_SEGMENTS.contains(component)
            && let Some(job) = components.get(pos + 1)
        {
            name = format!("{job}/{name}");
            break;
        }
    }

    if name.is_empty() {
        name = stem(base).to_string();
    }

    for ext in KNOWN_EXTENSIONS {
        if rel_path.contains(ext) {
            name.push_str(ext);
        }
    }
    let name = name.replace(".log.txt", ".log");

    let name = UUID_RE.replace_all(&name, "");
    SCRUB.replace_all(&name, "").into_owned()
}
