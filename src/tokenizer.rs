use std::sync::LazyLock;

use regex::Regex;

const DAYS: &str = "sunday|monday|tuesday|wednesday|thursday|friday|saturday";
const SHORT_DAYS: &str = "mon|tue|wed|thu|fri|sat|sun";
const MONTHS: &str = "january|february|march|april|may|june|july|august|september|\
                      october|november|december";
const SHORT_MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";

pub(crate) const UUID: &str =
    "[0-9a-f]{8}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{12}";

const IPV4: &str = r"(?:(?:[01]?[0-9]?[0-9]|2[0-4][0-9]|2[5][0-5])\.){3}(?:[01]?[0-9]?[0-9]|2[0-4][0-9]|2[5][0-5])";

// Hex-group forms, with and without a `::` abbreviation. The bare `::`
// arm mirrors the address grammar; it over-matches scope operators in
// pasted code, which the detector tolerates.
const IPV6: &str = r"(?:[0-9A-Fa-f]{1,4}:){7}[0-9A-Fa-f]{1,4}|(?:[0-9A-Fa-f]{1,4}:){1,7}:(?:[0-9A-Fa-f]{1,4}(?::[0-9A-Fa-f]{1,4}){0,6})?|::(?:[0-9A-Fa-f]{1,4}(?::[0-9A-Fa-f]{1,4}){0,6})?";

const MAC: &str = "(?:[0-9A-F]{2}[:-]){5}[0-9A-F]{2}";

/// Compile a pattern known to be valid at build time.
#[allow(clippy::unwrap_used)] // every caller passes a literal exercised by tests
fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

/// Whole-line nuisance patterns: matching lines carry no signal and are
/// dropped before any other processing.
static RAW_LINE: LazyLock<Regex> = LazyLock::new(|| {
    re(concat!(
        // useless http traffic
        r#""GET / HTTP/1\.1""#,
        r#"|"OPTIONS \* HTTP/1\.0" 200"#,
        // ssh public key payloads
        r"|AAAA[A-Z][0-9]",
        // hashed passwords
        r"|\$[0-9]\$",
        // certificates
        r"|-----BEGIN",
        // git checkout noise
        r"|HEAD is now at|Change-Id: ",
        // download progress
        r"| ETA ",
        // yum mirror listings
        r"|\* [a-zA-Z]+: [a-zA-Z0-9.-]*$|Trying other mirror\.",
        // ssh scan attempts
        r#"|audit.*exe="/usr/sbin/sshd""#,
        r"|sshd.*[iI]nvalid user",
        r"|sshd.*Unable to connect using the available authentication methods",
        r"|unix_chkpwd.*: password check failed for user",
        r"|sshd.*: authentication failure",
        r"|sshd.*: Failed password for",
        // zuul shell wrappers
        r"|zuul.*echo BECOME-SUCCESS-",
        r"|^[^ ]{64}$",
        // debug dumps nobody reads
        r"|ovs-ofctl .* (?:dump-ports|dump-flows|show)\b",
        r"|(?:ip|eb)tables .* -L\b",
    ))
});

static PERCENT_ESCAPE: LazyLock<Regex> = LazyLock::new(|| re(r"(?:%[2-5][0-9a-fA-F])+"));

/// Words that are exactly 32, 40, 64 or 128 hash-alphabet characters long.
static POWER2: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)[0-9a-f]{128}|[0-9a-f+/]{64}|[0-9a-f]{40}|[0-9a-f]{32}"));

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| re(&format!("(?i){UUID}|tx[^ ]{{32}}")));

static HEAT_ID: LazyLock<Regex> = LazyLock::new(|| re(r"-[^ -]{12}(?:[- ]|$)"));

static GIT_RANGE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)[a-z0-9]{7}\.\.[a-z0-9]{7}"));

static SHA_PREAMBLE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)SHA256:[a-z0-9+/]{43}"));

static RANDOM_PATH: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)/tmp/ansible\.[a-z0-9_]{8}|/tmp/tmp[a-z0-9_]{6}|/tmp/tmp\.[a-z0-9]{10}")
});

static DATE: LazyLock<Regex> =
    LazyLock::new(|| re(&format!("(?i){DAYS}|{SHORT_DAYS}|{SHORT_MONTHS}|{MONTHS}")));

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| re(&format!("(?i){IPV4}|{IPV6}|{MAC}")));

static NUMBERS: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)0x[0-9a-f]+|[0-9]"));

static NON_ALPHA: LazyLock<Regex> = LazyLock::new(|| re(r"[^a-zA-Z_/\s]"));

/// Tokens that, when present, get their weight amplified so that
/// fault-indicating lines stand further away from benign neighbours.
const FAILURE_TOKENS: [&str; 3] = ["error", "fail", "warn"];

/// Minimum surviving token length. Anything shorter is line noise.
const MIN_TOKEN_LEN: usize = 4;

/// Normalise one log line into its stable bag of words.
///
/// Volatile substrings (timestamps, identifiers, addresses, counters) are
/// erased or collapsed into fixed placeholder tokens so that two runs of
/// the same job produce the same output for the same kind of line. The
/// result is a fixed point: running `process` on its own output returns
/// it unchanged.
pub fn process(line: &str) -> String {
    // Whole-line noise goes first, before paying for any substitution.
    if RAW_LINE.is_match(line) {
        return String::new();
    }
    let strip = PERCENT_ESCAPE.replace_all(line, " ");
    let strip = POWER2.replace_all(&strip, "RNGN");
    let strip = UUID_RE.replace_all(&strip, "RNGU");
    let strip = HEAT_ID.replace_all(&strip, " HEATID ");
    let strip = GIT_RANGE.replace_all(&strip, "RNGG");
    let strip = SHA_PREAMBLE.replace_all(&strip, "RNGH");
    let strip = RANDOM_PATH.replace_all(&strip, "RNGP");
    let strip = DATE.replace_all(&strip, "DATE");
    let strip = ADDRESS.replace_all(&strip, "RNGI");
    let strip = NUMBERS.replace_all(&strip, "");
    let strip = NON_ALPHA.replace_all(&strip, " ");

    let mut result = strip
        .split_whitespace()
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .collect::<Vec<&str>>()
        .join(" ");

    let lower = result.to_lowercase();
    for token in FAILURE_TOKENS {
        // The already-amplified check keeps process(process(x)) == process(x).
        if lower.contains(token) && !result.contains(&format!("{token}A")) {
            result.push_str(&format!(" {token}A {token}B {token}C {token}D"));
        }
    }
    result
}

/// Remove ansible `"stdout_lines": […]` / `"stderr_lines": […]` arrays
/// from a task-result line. The array duplicates the adjacent
/// `"stdout"` string value, so keeping both would double every word's
/// weight. Quotes and backslash escapes are honoured while looking for
/// the closing bracket; a line that does not scan cleanly is returned
/// unchanged.
pub fn strip_stdout_line_lists(line: &str) -> String {
    let mut line = line.to_string();
    for stream in ["stdout", "stderr"] {
        let token = format!("\"{stream}_lines\": ");
        let value = format!("\"{stream}\": ");
        if !(line.contains(&value) && line.contains(&token)) {
            continue;
        }
        let Some(start) = line.find(&token) else {
            continue;
        };
        let pos = start + token.len();
        if line[pos..].starts_with("[]") {
            continue;
        }
        if !line[pos..].starts_with("[\"") {
            tracing::debug!(line = %line, "unexpected list start, keeping line");
            return line;
        }

        let bytes = line.as_bytes();
        let mut quote = false;
        let mut escape = false;
        let mut i = pos;
        while i < bytes.len() {
            let c = bytes[i];
            if !escape {
                if c == b'"' {
                    quote = !quote;
                }
                if !quote && c == b']' {
                    break;
                }
            }
            escape = c == b'\\';
            i += 1;
        }
        if i == bytes.len() {
            tracing::debug!(line = %line, "unterminated list, keeping line");
            return line;
        }
        line = format!("{}{}", &line[..start], &line[i..]);
    }
    line
}
