//! Classification and realignment of test-runner transcript lines.
//!
//! The external test runner reports one summary line per unit:
//!
//! ```text
//! ok  \tgithub.com/acme/store\t0.012s
//! FAIL\tgithub.com/acme/api\t0.301s
//! ?   \tgithub.com/acme/cmd\t[no test files]
//! FAIL\tgithub.com/acme/broken [setup failed]
//! ```
//!
//! Unit names vary in length, so the third column drifts. The [`Realigner`]
//! pads the unit name of every status line to a width computed before the
//! run starts, so durations line up without buffering the transcript. It
//! also records every unit whose status line starts with `FAIL`.
//!
//! Recognition is two-tiered: a line must start with `ok`, `FAIL` or `?`,
//! and must then split into at least three tab-separated fields. Free text
//! that happens to start with one of the prefixes passes through untouched.

use std::sync::LazyLock;

use regex::Regex;

/// Setup failures use a space instead of a tab before the bracketed suffix.
static SETUP_FAILED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(FAIL\t.+) (\[setup failed\])$").expect("setup-failed regex is valid")
});

const STATUS_PREFIXES: [&str; 3] = ["ok", "FAIL", "?"];

/// Outcome reported by a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Ok,
    Fail,
    /// `?`: the unit has nothing to test.
    Skip,
    /// Any other leading token.
    Other,
}

impl UnitStatus {
    fn from_token(token: &str) -> Self {
        match token.trim_end() {
            "ok" => UnitStatus::Ok,
            "FAIL" => UnitStatus::Fail,
            "?" => UnitStatus::Skip,
            _ => UnitStatus::Other,
        }
    }
}

/// A recognised status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub status: UnitStatus,
    pub unit_name: String,
    /// Everything after the unit name, tab-joined.
    pub remainder: String,
}

impl TranscriptLine {
    /// Parses `line` (without its trailing newline). Returns `None` for
    /// anything that is not a status line.
    pub fn parse(line: &str) -> Option<Self> {
        let fields = status_fields(line)?;
        Some(Self {
            status: UnitStatus::from_token(&fields[0]),
            unit_name: fields[1].trim().to_string(),
            remainder: fields[2..].join("\t"),
        })
    }
}

fn is_status_prefixed(line: &str) -> bool {
    STATUS_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Normalises the setup-failed form and splits into at most four fields.
/// `None` unless the line is a status line with at least three fields.
fn status_fields(line: &str) -> Option<Vec<String>> {
    if !is_status_prefixed(line) {
        return None;
    }
    let normalized = SETUP_FAILED_RE.replace(line, "$1\t$2");
    let fields: Vec<String> = normalized.splitn(4, '\t').map(str::to_string).collect();
    (fields.len() >= 3).then_some(fields)
}

/// Rewrites status lines to a fixed unit-name width and collects failures.
///
/// Owned by a single line-processing loop; not shared.
#[derive(Debug, Clone)]
pub struct Realigner {
    width: usize,
    failed_units: Vec<String>,
}

impl Realigner {
    /// `width` is the longest unit name expected in the run, in bytes.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            failed_units: Vec::new(),
        }
    }

    /// Realigns a single line given without its trailing newline.
    pub fn realign(&mut self, line: &str) -> String {
        let Some(mut fields) = status_fields(line) else {
            return line.to_string();
        };

        let unit_name = fields[1].trim().to_string();
        // Names longer than the precomputed width stay unpadded.
        let padding = self.width.saturating_sub(unit_name.len());
        fields[1] = format!("{unit_name}{}", " ".repeat(padding));

        if line.starts_with("FAIL") {
            self.failed_units.push(unit_name);
        }

        fields.join("\t")
    }

    /// Realigns a raw chunk holding one line, preserving its line ending.
    pub fn realign_bytes(&mut self, raw: &[u8]) -> Vec<u8> {
        let (body, ending) = split_line_ending(raw);
        match std::str::from_utf8(body) {
            Ok(text) => {
                let mut out = self.realign(text).into_bytes();
                out.extend_from_slice(ending);
                out
            }
            Err(_) => raw.to_vec(),
        }
    }

    /// Units whose status line started with `FAIL`, in encounter order.
    pub fn failed_units(&self) -> &[String] {
        &self.failed_units
    }

    pub fn into_failed_units(self) -> Vec<String> {
        self.failed_units
    }
}

fn split_line_ending(raw: &[u8]) -> (&[u8], &[u8]) {
    match raw.strip_suffix(b"\n") {
        Some(body) => (body, &raw[body.len()..]),
        None => (raw, &[]),
    }
}

/// Longest line, in bytes, of a unit listing produced by the runner's
/// metadata query.
pub fn longest_name_len(listing: &str) -> usize {
    listing.lines().map(|line| line.trim_end().len()).max().unwrap_or(0)
}
