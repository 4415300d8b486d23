//! tagshard: tag-aware, shardable test runs for multi-package repositories.
//!
//! tagshard selects the units (packages) of a repository by configured tags,
//! splits the selection into deterministic shards for parallel CI jobs, and
//! runs one shard through the external test runner in a single subprocess.
//! The runner's transcript is streamed to the console with its summary
//! columns realigned, and can be turned into a JUnit XML report on the fly.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Config**: TOML configuration and validated [`TestSettings`]
//! - **Discovery**: Enumerate units on disk
//! - **Tags / Selector**: Resolve requested tags and filter units
//! - **Partition**: Pick one balanced shard of the sorted unit list
//! - **Executor**: Run the runner subprocess and realign its output
//! - **Report**: Build JUnit XML from the transcript
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tagshard::config::load_config;
//! use tagshard::discovery::DirectoryLister;
//! use tagshard::orchestrator::list_tagged_units;
//!
//! let settings = load_config(Path::new("tagshard.toml"))?.into_settings(&[])?;
//! let lister = DirectoryLister::new(&settings.units.file_pattern)?;
//! let units = list_tagged_units(Path::new("."), &["integration".to_string()], &settings, &lister)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod discovery;
pub mod executor;
pub mod matcher;
pub mod orchestrator;
pub mod partition;
pub mod report;
pub mod selector;
pub mod tags;
pub mod transcript;

// Re-export commonly used types
pub use config::{Config, TestSettings, load_config};
pub use discovery::{DirectoryLister, UnitLister};
pub use executor::{ExecutionError, Executor, RunOutcome};
pub use matcher::Matcher;
pub use orchestrator::{RunRequest, list_tagged_units, run_tests, units_to_test};
pub use partition::Partition;
pub use tags::TagSet;
