//! Incremental parser for the verbose test-runner transcript.
//!
//! ```text
//! === RUN   TestGet
//! --- PASS: TestGet (0.01s)
//! === RUN   TestPut
//!     store_test.go:42: want 1, got 2
//! --- FAIL: TestPut (0.10s)
//! FAIL
//! FAIL    github.com/acme/store   0.120s
//! ```
//!
//! Lines between a `=== RUN` and the matching `--- <RESULT>` belong to that
//! test. A unit summary line closes the unit and turns its tests into a
//! [`TestSuite`].

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use super::junit::{CaseOutcome, Report, TestCase, TestSuite};
use crate::transcript::{TranscriptLine, UnitStatus};

static RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=== RUN\s+(\S.*)$").expect("run regex is valid"));

static SWITCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^=== (?:PAUSE|CONT|NAME)\s+(\S.*)$").expect("switch regex is valid")
});

static RESULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*--- (PASS|FAIL|SKIP): (.+?) \((\d+(?:\.\d+)?)(?:s| seconds)\)$")
        .expect("result regex is valid")
});

#[derive(Debug)]
struct PendingTest {
    name: String,
    outcome: Option<CaseOutcome>,
    duration: Duration,
    output: Vec<String>,
}

impl PendingTest {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: None,
            duration: Duration::ZERO,
            output: Vec::new(),
        }
    }
}

/// Builds a [`Report`] one line at a time.
#[derive(Debug, Default)]
pub struct TranscriptParser {
    suites: Vec<TestSuite>,
    pending: Vec<PendingTest>,
    current: Option<usize>,
    unit_output: Vec<String>,
}

impl TranscriptParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line, without its line ending.
    pub fn push_line(&mut self, line: &str) {
        if let Some(caps) = RUN_RE.captures(line) {
            self.pending.push(PendingTest::new(caps[1].trim()));
            self.current = Some(self.pending.len() - 1);
            return;
        }

        if let Some(caps) = SWITCH_RE.captures(line) {
            let name = caps[1].trim();
            self.current = self.pending.iter().rposition(|t| t.name == name);
            return;
        }

        if let Some(caps) = RESULT_RE.captures(line) {
            self.finish_test(&caps[1], &caps[2], &caps[3]);
            return;
        }

        if let Some(summary) = TranscriptLine::parse(line) {
            if summary.status != UnitStatus::Other {
                self.close_unit(summary);
                return;
            }
        }

        // Bare verdict lines printed before the unit summary.
        if line == "PASS" || line == "FAIL" {
            return;
        }

        match self.current {
            Some(index) => self.pending[index].output.push(line.to_string()),
            None => self.unit_output.push(line.to_string()),
        }
    }

    fn finish_test(&mut self, result: &str, name: &str, seconds: &str) {
        let outcome = match result {
            "PASS" => CaseOutcome::Passed,
            "FAIL" => CaseOutcome::Failed,
            _ => CaseOutcome::Skipped,
        };
        let duration = parse_seconds(seconds);

        let index = match self
            .pending
            .iter()
            .rposition(|t| t.name == name && t.outcome.is_none())
        {
            Some(index) => index,
            None => {
                self.pending.push(PendingTest::new(name));
                self.pending.len() - 1
            }
        };

        let test = &mut self.pending[index];
        test.outcome = Some(outcome);
        test.duration = duration;
        self.current = Some(index);
    }

    fn close_unit(&mut self, summary: TranscriptLine) {
        let unit = summary.unit_name;
        let mut suite = TestSuite::new(&unit);
        suite.duration = summary
            .remainder
            .split_whitespace()
            .next()
            .and_then(|token| token.strip_suffix('s'))
            .map(parse_seconds)
            .unwrap_or_default();

        suite.cases = self
            .pending
            .drain(..)
            .map(|test| TestCase {
                name: test.name,
                classname: unit.clone(),
                duration: test.duration,
                // Started but never finished, e.g. the binary panicked.
                outcome: test.outcome.unwrap_or(CaseOutcome::Failed),
                output: test.output,
            })
            .collect();

        let output = std::mem::take(&mut self.unit_output);
        let remainder = summary.remainder.trim();
        if summary.status == UnitStatus::Fail && suite.cases.is_empty() {
            let message = if remainder.starts_with('[') {
                remainder.to_string()
            } else {
                "FAIL".to_string()
            };
            suite.cases.push(TestCase {
                name: unit.clone(),
                classname: unit.clone(),
                duration: suite.duration,
                outcome: CaseOutcome::Error(message),
                output,
            });
        } else {
            suite.output = output;
        }

        self.current = None;
        self.suites.push(suite);
    }

    /// Ends the transcript. Tests left without a unit summary are reported
    /// under a suite named after the first of them.
    pub fn finish(mut self) -> Report {
        if !self.pending.is_empty() {
            let unit = self.pending[0].name.clone();
            self.close_unit(TranscriptLine {
                status: UnitStatus::Fail,
                unit_name: unit,
                remainder: String::new(),
            });
        }
        Report {
            suites: self.suites,
        }
    }
}

/// Non-numeric, negative and out-of-range values read as zero.
fn parse_seconds(value: &str) -> Duration {
    value
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or_default()
}
