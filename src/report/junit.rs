//! JUnit XML report model and serialization.
//!
//! The model mirrors the JUnit schema consumed by CI systems: one
//! [`TestSuite`] per unit, one [`TestCase`] per test function.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <testsuites tests="3" failures="1" errors="0" skipped="1" time="0.120">
//!   <testsuite name="github.com/acme/store" tests="3" failures="1" errors="0" skipped="1" time="0.120" timestamp="2026-01-02T03:04:05">
//!     <testcase classname="github.com/acme/store" name="TestGet" time="0.010"/>
//!     <testcase classname="github.com/acme/store" name="TestPut" time="0.100">
//!       <failure message="Failed">store_test.go:42: want 1, got 2</failure>
//!     </testcase>
//!     <testcase classname="github.com/acme/store" name="TestSlow" time="0.000">
//!       <skipped message="Skipped"/>
//!     </testcase>
//!   </testsuite>
//! </testsuites>
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// Outcome of a single test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed,
    Failed,
    Skipped,
    /// The unit failed outside any test (setup or build failure).
    Error(String),
}

/// A single test function.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub classname: String,
    pub duration: Duration,
    pub outcome: CaseOutcome,
    pub output: Vec<String>,
}

/// All tests of one unit.
#[derive(Debug, Clone)]
pub struct TestSuite {
    pub name: String,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    pub cases: Vec<TestCase>,
    /// Unit-level output not attributed to a test.
    pub output: Vec<String>,
}

impl TestSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: Duration::ZERO,
            timestamp: Utc::now(),
            cases: Vec::new(),
            output: Vec::new(),
        }
    }

    fn count(&self, pred: impl Fn(&CaseOutcome) -> bool) -> usize {
        self.cases.iter().filter(|c| pred(&c.outcome)).count()
    }

    pub fn failures(&self) -> usize {
        self.count(|o| *o == CaseOutcome::Failed)
    }

    pub fn errors(&self) -> usize {
        self.count(|o| matches!(o, CaseOutcome::Error(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == CaseOutcome::Skipped)
    }
}

/// A whole run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub suites: Vec<TestSuite>,
}

impl Report {
    pub fn tests(&self) -> usize {
        self.suites.iter().map(|s| s.cases.len()).sum()
    }

    pub fn failures(&self) -> usize {
        self.suites.iter().map(TestSuite::failures).sum()
    }

    pub fn errors(&self) -> usize {
        self.suites.iter().map(TestSuite::errors).sum()
    }

    pub fn skipped(&self) -> usize {
        self.suites.iter().map(TestSuite::skipped).sum()
    }

    pub fn duration(&self) -> Duration {
        self.suites.iter().map(|s| s.duration).sum()
    }

    /// Serializes the report as JUnit XML.
    pub fn to_xml(&self) -> anyhow::Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut testsuites = BytesStart::new("testsuites");
        testsuites.push_attribute(("tests", self.tests().to_string().as_str()));
        testsuites.push_attribute(("failures", self.failures().to_string().as_str()));
        testsuites.push_attribute(("errors", self.errors().to_string().as_str()));
        testsuites.push_attribute(("skipped", self.skipped().to_string().as_str()));
        testsuites.push_attribute(("time", seconds(self.duration()).as_str()));
        writer.write_event(Event::Start(testsuites))?;

        for suite in &self.suites {
            write_testsuite(&mut writer, suite)?;
        }

        writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

        let mut xml = String::from_utf8(writer.into_inner())?;
        xml.push('\n');
        Ok(xml)
    }
}

fn write_testsuite<W: std::io::Write>(
    writer: &mut Writer<W>,
    suite: &TestSuite,
) -> anyhow::Result<()> {
    let mut testsuite = BytesStart::new("testsuite");
    testsuite.push_attribute(("name", suite.name.as_str()));
    testsuite.push_attribute(("tests", suite.cases.len().to_string().as_str()));
    testsuite.push_attribute(("failures", suite.failures().to_string().as_str()));
    testsuite.push_attribute(("errors", suite.errors().to_string().as_str()));
    testsuite.push_attribute(("skipped", suite.skipped().to_string().as_str()));
    testsuite.push_attribute(("time", seconds(suite.duration).as_str()));
    testsuite.push_attribute((
        "timestamp",
        suite
            .timestamp
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string()
            .as_str(),
    ));

    if suite.cases.is_empty() && suite.output.is_empty() {
        writer.write_event(Event::Empty(testsuite))?;
        return Ok(());
    }
    writer.write_event(Event::Start(testsuite))?;

    for case in &suite.cases {
        write_testcase(writer, case)?;
    }

    if !suite.output.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("system-out")))?;
        writer.write_event(Event::Text(BytesText::new(&sanitize(
            &suite.output.join("\n"),
        ))))?;
        writer.write_event(Event::End(BytesEnd::new("system-out")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    Ok(())
}

fn write_testcase<W: std::io::Write>(
    writer: &mut Writer<W>,
    case: &TestCase,
) -> anyhow::Result<()> {
    let mut testcase = BytesStart::new("testcase");
    testcase.push_attribute(("classname", case.classname.as_str()));
    testcase.push_attribute(("name", case.name.as_str()));
    testcase.push_attribute(("time", seconds(case.duration).as_str()));

    let (tag, message) = match &case.outcome {
        CaseOutcome::Passed => {
            writer.write_event(Event::Empty(testcase))?;
            return Ok(());
        }
        CaseOutcome::Failed => ("failure", "Failed".to_string()),
        CaseOutcome::Skipped => ("skipped", "Skipped".to_string()),
        CaseOutcome::Error(message) => ("error", message.clone()),
    };

    writer.write_event(Event::Start(testcase))?;

    let mut child = BytesStart::new(tag);
    child.push_attribute(("message", sanitize(&message).as_str()));
    if case.output.is_empty() {
        writer.write_event(Event::Empty(child))?;
    } else {
        writer.write_event(Event::Start(child))?;
        writer.write_event(Event::Text(BytesText::new(&sanitize(
            &case.output.join("\n"),
        ))))?;
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

fn seconds(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}

/// Drops characters that are not allowed in XML 1.0. Escaping is done by the
/// writer.
fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| {
            matches!(
                *c,
                '\t' | '\n' | '\r' | ' '..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..
            )
        })
        .collect()
}
