//! Single-subprocess test execution with live transcript realignment.
//!
//! The [`Executor`] runs the external test runner once over the selected
//! units and streams its merged stdout/stderr line by line:
//!
//! ```text
//!               ┌──────── raw line ───────► ReportBridge (optional)
//! runner ──► lines ─┤
//!               └──► Realigner ──► console
//! ```
//!
//! Each raw line reaches the report sink before its realigned form reaches
//! the console. Before spawning, a metadata query (`go list` by default)
//! prints the unit names so the realigner knows the width to pad to.
//!
//! # Exit status
//!
//! | Runner exit | Meaning |
//! |-------------|---------|
//! | 0 | all units passed |
//! | 1 | ran to completion, some units failed |
//! | other, signal | the runner itself failed |

mod command;

pub use command::Command;

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use futures::stream::{self, Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::config::RunnerConfig;
use crate::report::ReportBridge;
use crate::transcript::{Realigner, longest_name_len};

/// Errors that end a test run.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("no packages to test")]
    EmptySelection,

    #[error("{command} failed: {output}")]
    MetadataQuery { command: String, output: String },

    #[error("failed to create JUnit output file {}: {source}", .path.display())]
    ReportCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("test command failed: {status}")]
    Failed { status: ExitStatus },

    #[error("failed to read test output: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write test output to console: {0}")]
    Console(#[source] std::io::Error),

    #[error("failed to write raw test output to report pipe: {0}")]
    ReportSink(#[source] std::io::Error),

    #[error("{} package(s) had failing tests:{}", .units.len(), failing_list(.units))]
    TestsFailed { units: Vec<String> },
}

fn failing_list(units: &[String]) -> String {
    units.iter().map(|unit| format!("\n\t{unit}")).collect()
}

/// Result of a test run.
///
/// `failed_units` is filled even when the run also ended in an error.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub failed_units: Vec<String>,
    pub error: Option<ExecutionError>,
}

impl RunOutcome {
    fn from_error(error: ExecutionError) -> Self {
        Self {
            failed_units: Vec::new(),
            error: Some(error),
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<(), ExecutionError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Runs the external test runner over a list of units.
#[derive(Debug, Clone)]
pub struct Executor {
    runner: RunnerConfig,
    project_dir: PathBuf,
}

impl Executor {
    /// Creates an executor running `runner` inside `project_dir`.
    pub fn new(runner: RunnerConfig, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            project_dir: project_dir.into(),
        }
    }

    /// Runs the tests of `units` in one subprocess.
    ///
    /// Realigned output is written to `console`. When `report_path` is set,
    /// the raw transcript also feeds a JUnit report written to that path; the
    /// report is complete when this returns.
    pub async fn run<W>(
        &self,
        units: &[String],
        passthrough: &[String],
        report_path: Option<&Path>,
        console: &mut W,
    ) -> RunOutcome
    where
        W: AsyncWrite + Unpin,
    {
        if units.is_empty() {
            return RunOutcome::from_error(ExecutionError::EmptySelection);
        }

        let width = match self.longest_unit_name(units).await {
            Ok(width) => width,
            Err(e) => return RunOutcome::from_error(e),
        };
        debug!("Aligning unit names to {} columns", width);

        let mut bridge = match report_path {
            Some(path) => match ReportBridge::start(path).await {
                Ok(bridge) => Some(bridge),
                Err(source) => {
                    return RunOutcome::from_error(ExecutionError::ReportCreate {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            },
            None => None,
        };

        let command = self.test_command(units, passthrough, bridge.is_some());
        info!("Running {} package(s)", units.len());
        debug!("Test command: {}", command.to_shell_string());

        let mut realigner = Realigner::new(width);
        let status = stream_output(&command, &mut realigner, bridge.as_mut(), console).await;

        if let Some(bridge) = bridge {
            bridge.finish().await;
        }

        let failed_units = realigner.into_failed_units();
        let error = match status {
            Err(e) => Some(e),
            Ok(status) if status.success() || status.code() == Some(1) => None,
            Ok(status) => Some(ExecutionError::Failed { status }),
        };
        let error = error.or_else(|| {
            (!failed_units.is_empty()).then(|| ExecutionError::TestsFailed {
                units: failed_units.clone(),
            })
        });

        RunOutcome {
            failed_units,
            error,
        }
    }

    /// `program test_args... passthrough... [verbose_flag] units...`
    fn test_command(&self, units: &[String], passthrough: &[String], verbose: bool) -> Command {
        let mut command = Command::new(&self.runner.program)
            .args(self.runner.test_args.iter().cloned())
            .args(passthrough.iter().cloned());
        if verbose && !self.runner.verbose_flag.is_empty() {
            command = command.arg(&self.runner.verbose_flag);
        }
        command
            .args(units.iter().cloned())
            .working_dir(&self.project_dir)
    }

    /// Runs the metadata query and returns the longest unit name it prints.
    async fn longest_unit_name(&self, units: &[String]) -> Result<usize, ExecutionError> {
        let command = Command::new(&self.runner.program)
            .args(self.runner.list_args.iter().cloned())
            .args(units.iter().cloned())
            .working_dir(&self.project_dir);

        let mut process = command.to_tokio();
        let output = process.output().await.map_err(|e| {
            ExecutionError::MetadataQuery {
                command: command.to_shell_string(),
                output: e.to_string(),
            }
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(ExecutionError::MetadataQuery {
                command: command.to_shell_string(),
                output: combined.trim_end().to_string(),
            });
        }

        Ok(longest_name_len(&combined))
    }
}

/// Spawns `command`, forwards every output line and waits for the exit
/// status. Returns only after the output is drained and the child has exited.
async fn stream_output<W>(
    command: &Command,
    realigner: &mut Realigner,
    mut report: Option<&mut ReportBridge>,
    console: &mut W,
) -> Result<ExitStatus, ExecutionError>
where
    W: AsyncWrite + Unpin,
{
    let mut child = command
        .to_tokio()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecutionError::Spawn {
            program: command.program.clone(),
            source,
        })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        ExecutionError::Read(std::io::Error::other("stdout not captured"))
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        ExecutionError::Read(std::io::Error::other("stderr not captured"))
    })?;

    let mut lines = stream::select(Box::pin(raw_lines(stdout)), Box::pin(raw_lines(stderr)));

    while let Some(line) = lines.next().await {
        let line = line.map_err(ExecutionError::Read)?;

        if let Some(report) = report.as_mut() {
            report
                .write(&line)
                .await
                .map_err(ExecutionError::ReportSink)?;
        }

        console
            .write_all(&realigner.realign_bytes(&line))
            .await
            .map_err(ExecutionError::Console)?;
        console.flush().await.map_err(ExecutionError::Console)?;
    }

    child.wait().await.map_err(ExecutionError::Read)
}

/// Newline-delimited chunks of `reader`, line endings included. The last
/// chunk may lack a newline.
fn raw_lines<R>(reader: R) -> impl Stream<Item = std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    stream::unfold(BufReader::new(reader), |mut reader| async move {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(line), reader)),
            Err(e) => Some((Err(e), reader)),
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tempfile::TempDir;

    use super::*;

    /// Prints each positional argument on its own line.
    const LIST_SCRIPT: &str = r#"for u in "$@"; do echo "$u"; done"#;

    fn runner(test_script: &str) -> RunnerConfig {
        RunnerConfig {
            program: "sh".to_string(),
            test_args: vec!["-c".to_string(), test_script.to_string(), "sh".to_string()],
            list_args: vec!["-c".to_string(), LIST_SCRIPT.to_string(), "sh".to_string()],
            verbose_flag: String::new(),
        }
    }

    fn units(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    async fn run(
        runner: RunnerConfig,
        units: &[String],
        report: Option<&Path>,
    ) -> (RunOutcome, String) {
        let temp = TempDir::new().unwrap();
        let executor = Executor::new(runner, temp.path());
        let mut console = Vec::new();
        let outcome = executor.run(units, &[], report, &mut console).await;
        (outcome, String::from_utf8(console).unwrap())
    }

    #[tokio::test]
    async fn test_realigns_and_collects_failures() {
        let script = r#"printf 'ok  \tpkgX\t0.01s\n'; printf 'FAIL\tpkgY\t0.02s\n' >&2; exit 1"#;
        let (outcome, console) = run(runner(script), &units(&["pkgX", "pkgY1"]), None).await;

        assert!(console.contains("ok  \tpkgX \t0.01s\n"));
        assert!(console.contains("FAIL\tpkgY \t0.02s\n"));
        assert_eq!(outcome.failed_units, ["pkgY"]);

        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, ExecutionError::TestsFailed { .. }));
        assert_eq!(err.to_string(), "1 package(s) had failing tests:\n\tpkgY");
    }

    #[tokio::test]
    async fn test_success() {
        let script = r#"printf 'ok  \tpkgX\t0.01s\n'; printf 'some output\n'"#;
        let (outcome, console) = run(runner(script), &units(&["pkgX"]), None).await;

        assert!(outcome.success());
        assert!(outcome.failed_units.is_empty());
        assert!(console.contains("some output\n"));
    }

    #[tokio::test]
    async fn test_units_are_passed_to_runner() {
        let script = r#"for u in "$@"; do printf 'ok  \t%s\t0.01s\n' "$u"; done"#;
        let (outcome, console) = run(runner(script), &units(&["./a", "./bbb"]), None).await;

        assert!(outcome.success());
        assert_eq!(console, "ok  \t./a  \t0.01s\nok  \t./bbb\t0.01s\n");
    }

    #[tokio::test]
    async fn test_failures_are_listed_in_order() {
        let script = r#"printf 'FAIL\tb\t1s\nok  \tc\t1s\nFAIL\ta [setup failed]\n'; exit 1"#;
        let (outcome, _) = run(runner(script), &units(&["a", "b", "c"]), None).await;

        assert_eq!(outcome.failed_units, ["b", "a"]);
        assert_eq!(
            outcome.into_result().unwrap_err().to_string(),
            "2 package(s) had failing tests:\n\tb\n\ta"
        );
    }

    #[tokio::test]
    async fn test_fatal_exit_status() {
        let script = r#"printf 'FAIL\tpkgX\t0.01s\n'; exit 2"#;
        let (outcome, _) = run(runner(script), &units(&["pkgX"]), None).await;

        assert_eq!(outcome.failed_units, ["pkgX"]);
        assert!(matches!(outcome.error, Some(ExecutionError::Failed { .. })));
    }

    #[tokio::test]
    async fn test_exit_one_without_failed_units_is_not_an_error() {
        let (outcome, _) = run(runner("exit 1"), &units(&["pkgX"]), None).await;
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let (outcome, console) = run(runner("exit 0"), &[], None).await;
        assert!(matches!(outcome.error, Some(ExecutionError::EmptySelection)));
        assert!(console.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_query_failure_aborts() {
        let mut config = runner(r#"printf 'ran\n'"#);
        config.list_args = vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()];
        let (outcome, console) = run(config, &units(&["pkgX"]), None).await;

        let err = outcome.error.unwrap();
        assert!(matches!(err, ExecutionError::MetadataQuery { .. }));
        assert!(err.to_string().contains("broken"));
        assert!(console.is_empty());
    }

    #[tokio::test]
    async fn test_report_is_written() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out/junit.xml");
        let script = r#"printf '=== RUN   TestA\n--- FAIL: TestA (0.01s)\nFAIL\n'
printf 'FAIL\tpkgX\t0.01s\n'
exit 1"#;

        let (outcome, console) = run(runner(script), &units(&["pkgX"]), Some(&path)).await;

        assert_eq!(outcome.failed_units, ["pkgX"]);
        assert!(console.contains("--- FAIL: TestA (0.01s)\n"));

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains(r#"<testsuite name="pkgX" tests="1" failures="1""#));
        assert!(xml.contains(r#"name="TestA""#));
    }

    #[tokio::test]
    async fn test_out_of_range_durations_keep_report_running() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("junit.xml");
        let script = r#"printf '=== RUN   TestHuge\n--- PASS: TestHuge (100000000000000000000000s)\n'
printf 'ok  \tpkgA\t1e30s\n'
i=0
while [ $i -lt 5000 ]; do printf 'ok  \tpkgB\t0.01s\n'; i=$((i+1)); done"#;

        let (outcome, console) = run(runner(script), &units(&["pkgA", "pkgB"]), Some(&path)).await;

        assert!(outcome.error.is_none(), "unexpected error: {:?}", outcome.error);
        assert_eq!(console.lines().count(), 5003);

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains(r#"<testsuite name="pkgA" tests="1""#));
        assert!(xml.contains(r#"<testsuite name="pkgB""#));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_report_write_failure_does_not_fail_run() {
        let script = r#"printf 'ok  \tpkgX\t0.01s\n'"#;
        let (outcome, console) =
            run(runner(script), &units(&["pkgX"]), Some(Path::new("/dev/full"))).await;

        assert!(outcome.error.is_none(), "unexpected error: {:?}", outcome.error);
        assert_eq!(console, "ok  \tpkgX\t0.01s\n");
    }

    #[tokio::test]
    async fn test_verbose_flag_only_with_report() {
        let temp = TempDir::new().unwrap();
        let mut config = runner(r#"printf '%s\n' "$@""#);
        config.verbose_flag = "-v".to_string();

        let (_, console) = run(config.clone(), &units(&["pkgX"]), None).await;
        assert_eq!(console, "pkgX\n");

        let path = temp.path().join("junit.xml");
        let (_, console) = run(config, &units(&["pkgX"]), Some(&path)).await;
        assert_eq!(console, "-v\npkgX\n");
    }

    #[tokio::test]
    async fn test_report_create_failure_aborts_before_spawn() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let (outcome, console) = run(
            runner(r#"printf 'ran\n'"#),
            &units(&["pkgX"]),
            Some(&blocker.join("junit.xml")),
        )
        .await;

        assert!(matches!(outcome.error, Some(ExecutionError::ReportCreate { .. })));
        assert!(console.is_empty());
    }

    struct BrokenConsole;

    impl AsyncWrite for BrokenConsole {
        fn poll_write(
            self: Pin<&mut Self>,
            _: &mut Context<'_>,
            _: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::other("console closed")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_console_failure_aborts() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("junit.xml");
        let executor = Executor::new(runner(r#"printf 'ok  \tpkgX\t1s\n'"#), temp.path());

        let outcome = executor
            .run(&units(&["pkgX"]), &[], Some(&path), &mut BrokenConsole)
            .await;

        assert!(matches!(outcome.error, Some(ExecutionError::Console(_))));
        // The report task is still completed.
        assert!(std::fs::read_to_string(&path).unwrap().contains("<testsuites"));
    }
}
