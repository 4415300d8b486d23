//! Entry points tying enumeration, selection, partitioning and execution
//! together.
//!
//! # Execution Flow
//!
//! ```text
//!   UnitLister                 Selector              Partition
//!       │                         │                      │
//!       │ list_units(exclude)     │                      │
//!       ▼                         │                      │
//!  all units ────────────────────►│ select_for_run(tags) │
//!                                 ▼                      │
//!                          selected units ──────────────►│ apply()
//!                                                        ▼
//!                                                     shard ──► Executor
//! ```
//!
//! Configuration, selection and partition errors are returned before any
//! subprocess is spawned.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tagshard::config::load_config;
//! use tagshard::discovery::DirectoryLister;
//! use tagshard::orchestrator::{RunRequest, run_tests};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = load_config(Path::new("tagshard.toml"))?.into_settings(&[])?;
//!     let lister = DirectoryLister::new(&settings.units.file_pattern)?;
//!
//!     let tags = vec!["integration".to_string()];
//!     let request = RunRequest {
//!         project_dir: Path::new("."),
//!         tags: &tags,
//!         partition: "0,4",
//!         ..Default::default()
//!     };
//!
//!     let outcome = run_tests(&request, &settings, &lister, &mut tokio::io::stdout()).await?;
//!     outcome.into_result()?;
//!     Ok(())
//! }
//! ```

use std::path::Path;

use tokio::io::AsyncWrite;
use tracing::info;

use crate::config::TestSettings;
use crate::discovery::UnitLister;
use crate::executor::{Executor, RunOutcome};
use crate::partition::{self, Partition, PartitionError};
use crate::selector::{self, SelectionError};

/// Errors raised before a run starts.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("failed to parse partition flag: {0}")]
    Partition(#[from] PartitionError),
}

/// Parameters of a test run.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub project_dir: &'a Path,
    /// Extra arguments passed to the runner before the unit list.
    pub passthrough: &'a [String],
    pub tags: &'a [String],
    pub report_path: Option<&'a Path>,
    /// `X,N` shard spec, empty for none.
    pub partition: &'a str,
}

impl Default for RunRequest<'_> {
    fn default() -> Self {
        Self {
            project_dir: Path::new("."),
            passthrough: &[],
            tags: &[],
            report_path: None,
            partition: "",
        }
    }
}

/// Lists the units under `project_dir` selected by `tags`.
///
/// An empty result is not an error.
pub fn list_tagged_units(
    project_dir: &Path,
    tags: &[String],
    settings: &TestSettings,
    lister: &dyn UnitLister,
) -> Result<Vec<String>, OrchestratorError> {
    let all_units = lister
        .list_units(project_dir, &settings.exclude)
        .map_err(SelectionError::from)?;
    Ok(selector::select(
        all_units,
        tags,
        &settings.tags,
        &settings.exclude,
    )?)
}

/// Resolves the units this invocation should test: selection by tags, then
/// the requested shard.
///
/// Fails when nothing is selected. An empty shard is returned as an empty
/// list.
pub fn units_to_test(
    project_dir: &Path,
    tags: &[String],
    partition_spec: &str,
    settings: &TestSettings,
    lister: &dyn UnitLister,
) -> Result<Vec<String>, OrchestratorError> {
    let partition = Partition::parse(partition_spec)?;

    let all_units = lister
        .list_units(project_dir, &settings.exclude)
        .map_err(SelectionError::from)?;
    let selected =
        selector::select_for_run(all_units, tags, &settings.tags, &settings.exclude)?;

    let shard = partition::apply(partition.as_ref(), &selected);
    info!(
        "Selected {} package(s), running {} ({})",
        selected.len(),
        shard.len(),
        partition::describe(partition.as_ref())
    );

    Ok(shard)
}

/// Selects units and runs their tests.
///
/// `Err` means the run never started. Execution failures, including failing
/// tests, are reported in the returned [`RunOutcome`].
pub async fn run_tests<W>(
    request: &RunRequest<'_>,
    settings: &TestSettings,
    lister: &dyn UnitLister,
    console: &mut W,
) -> Result<RunOutcome, OrchestratorError>
where
    W: AsyncWrite + Unpin,
{
    let units = units_to_test(
        request.project_dir,
        request.tags,
        request.partition,
        settings,
        lister,
    )?;

    if units.is_empty() {
        info!(
            "Partition {} has no packages to test, nothing to run",
            request.partition
        );
        return Ok(RunOutcome::default());
    }

    let executor = Executor::new(settings.runner.clone(), request.project_dir);
    Ok(executor
        .run(&units, request.passthrough, request.report_path, console)
        .await)
}
