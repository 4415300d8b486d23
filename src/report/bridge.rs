//! Background JUnit report generation fed by a live test run.
//!
//! The bridge owns the write end of a bounded in-process pipe. A spawned task
//! reads the other end, parses the transcript as it arrives and writes the
//! XML artifact once the write end is closed:
//!
//! ```text
//! executor ── write() ──► duplex ──► report task ──► junit.xml
//!    │                                   │
//!    └───────── finish() ◄── oneshot ────┘
//! ```

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use super::{ReportError, write_report};

/// Capacity of the in-process pipe. Writers wait when the task falls behind.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Counts reported by a finished report task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub suites: usize,
    pub tests: usize,
    pub failures: usize,
}

/// Write end of a running report task.
pub struct ReportBridge {
    sink: DuplexStream,
    done: oneshot::Receiver<Result<ReportSummary, ReportError>>,
    path: PathBuf,
}

impl ReportBridge {
    /// Creates the report file at `path`, including missing parent
    /// directories, and starts the report task.
    pub async fn start(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = File::create(path).await?;

        let (sink, source) = tokio::io::duplex(PIPE_CAPACITY);
        let (tx, done) = oneshot::channel();

        tokio::spawn(async move {
            let result = async {
                let report = write_report(source, &mut file).await?;
                file.sync_all().await.map_err(ReportError::Write)?;
                Ok::<_, ReportError>(ReportSummary {
                    suites: report.suites.len(),
                    tests: report.tests(),
                    failures: report.failures() + report.errors(),
                })
            }
            .await;
            let _ = tx.send(result);
        });

        debug!("Started JUnit report task for {}", path.display());

        Ok(Self {
            sink,
            done,
            path: path.to_path_buf(),
        })
    }

    /// Forwards one raw transcript chunk to the report task.
    pub async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.sink.write_all(bytes).await
    }

    /// Closes the write end and waits for the report task to finish.
    ///
    /// Report failures are logged, never returned.
    pub async fn finish(self) -> Option<ReportSummary> {
        let Self {
            mut sink,
            done,
            path,
        } = self;

        if let Err(e) = sink.shutdown().await {
            error!("Failed to close JUnit report pipe: {}", e);
        }
        drop(sink);

        match done.await {
            Ok(Ok(summary)) => {
                info!(
                    "JUnit XML written to: {} ({} tests, {} failed)",
                    path.display(),
                    summary.tests,
                    summary.failures
                );
                Some(summary)
            }
            Ok(Err(e)) => {
                error!("JUnit report {} failed: {}", path.display(), e);
                None
            }
            Err(_) => {
                error!(
                    "JUnit report task for {} exited without a result",
                    path.display()
                );
                None
            }
        }
    }
}
