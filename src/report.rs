//! JUnit report generation from a test-runner transcript.
//!
//! This module turns the raw, verbose transcript of a test run into a JUnit
//! XML artifact. It is used in two places:
//!
//! - [`ReportBridge`] runs it as a background task fed by the executor while
//!   the runner is still producing output.
//! - The `junit-report` subcommand runs it over a saved transcript on stdin.

pub mod bridge;
pub mod junit;
pub mod parser;

pub use bridge::ReportBridge;
pub use junit::{CaseOutcome, Report, TestCase, TestSuite};
pub use parser::TranscriptParser;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Errors raised while producing a report. Never fatal to a test run.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to read test transcript: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to serialize JUnit report: {0}")]
    Serialize(anyhow::Error),

    #[error("failed to write JUnit report: {0}")]
    Write(#[source] std::io::Error),
}

/// Parses the transcript from `reader` until EOF, then writes the JUnit XML
/// to `writer`. Nothing is written before EOF.
pub async fn write_report<R, W>(reader: R, writer: &mut W) -> Result<Report, ReportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut parser = TranscriptParser::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(ReportError::Read)?;
        if n == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        parser.push_line(line.trim_end_matches(['\n', '\r']));
    }

    let report = parser.finish();
    let xml = report.to_xml().map_err(ReportError::Serialize)?;

    writer
        .write_all(xml.as_bytes())
        .await
        .map_err(ReportError::Write)?;
    writer.flush().await.map_err(ReportError::Write)?;

    Ok(report)
}

/// Prints a one-line summary of a generated report.
pub fn print_summary(report: &Report) {
    let failed = report.failures() + report.errors();
    let failed = if failed > 0 {
        console::style(failed).red()
    } else {
        console::style(failed).green()
    };
    eprintln!(
        "{} suites, {} tests, {} failed, {} skipped",
        report.suites.len(),
        report.tests(),
        failed,
        console::style(report.skipped()).yellow()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_report_from_transcript() {
        let transcript = "=== RUN   TestA\n\
                          --- PASS: TestA (0.01s)\n\
                          === RUN   TestB\n\
                          \tb_test.go:9: boom\n\
                          --- FAIL: TestB (0.02s)\n\
                          FAIL\n\
                          FAIL\tpkg/x\t0.03s\n\
                          ?   \tpkg/y\t[no test files]\n";

        let mut out = Vec::new();
        let report = write_report(transcript.as_bytes(), &mut out).await.unwrap();

        assert_eq!(report.suites.len(), 2);
        assert_eq!(report.tests(), 2);
        assert_eq!(report.failures(), 1);

        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains(r#"<testsuite name="pkg/x" tests="2" failures="1""#));
        assert!(xml.contains(r#"<testsuite name="pkg/y" tests="0""#));
        assert!(xml.contains("b_test.go:9: boom"));
    }

    #[tokio::test]
    async fn test_write_report_empty_transcript() {
        let mut out = Vec::new();
        let report = write_report(&b""[..], &mut out).await.unwrap();
        assert!(report.suites.is_empty());

        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains(r#"<testsuites tests="0" failures="0" errors="0" skipped="0""#));
    }
}
