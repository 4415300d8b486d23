//! Enumeration of testable units on disk.
//!
//! A unit is a directory that directly contains at least one file matching
//! the configured file pattern (`*.go` by default). Units are identified by
//! their path relative to the project root, prefixed with `./` (the root
//! itself is `.`), which is the form the external test runner accepts.
//!
//! # Pruning
//!
//! The walk never descends into:
//!
//! - hidden directories (name starts with `.`)
//! - directories whose name starts with `_`
//! - directories matched by the exclude [`Matcher`]
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tagshard::discovery::{DirectoryLister, UnitLister};
//! use tagshard::matcher::Matcher;
//!
//! let lister = DirectoryLister::new("*.go")?;
//! let exclude = Matcher::paths(["vendor"])?;
//! let units = lister.list_units(Path::new("."), &exclude)?;
//! for unit in &units {
//!     println!("{unit}");
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use glob::Pattern;
use tracing::debug;
use walkdir::WalkDir;

use crate::matcher::Matcher;

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Errors that can occur while enumerating units.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The project directory does not exist or is not a directory.
    #[error("project directory {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// The unit file pattern is not a valid glob.
    #[error("invalid unit file pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The directory walk failed.
    #[error("failed to list units in {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Enumerates the units under a project root.
pub trait UnitLister: Send + Sync {
    /// Lists units under `root`, skipping anything matched by `exclude`.
    ///
    /// The result is sorted and free of duplicates.
    fn list_units(&self, root: &Path, exclude: &Matcher) -> DiscoveryResult<Vec<String>>;
}

/// [`UnitLister`] that walks the filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryLister {
    file_pattern: Pattern,
}

impl DirectoryLister {
    /// Creates a lister treating directories with a file matching
    /// `file_pattern` as units.
    pub fn new(file_pattern: &str) -> DiscoveryResult<Self> {
        let file_pattern =
            Pattern::new(file_pattern).map_err(|source| DiscoveryError::InvalidPattern {
                pattern: file_pattern.to_string(),
                source,
            })?;
        Ok(Self { file_pattern })
    }
}

impl UnitLister for DirectoryLister {
    fn list_units(&self, root: &Path, exclude: &Matcher) -> DiscoveryResult<Vec<String>> {
        if !root.is_dir() {
            return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
        }

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                if name.starts_with('.') || name.starts_with('_') {
                    return false;
                }
                let unit = unit_id(root, entry.path());
                if exclude.matches(&unit) {
                    debug!("Pruning excluded directory {}", unit);
                    return false;
                }
                true
            });

        let mut units = BTreeSet::new();
        for entry in walker {
            let entry = entry.map_err(|source| DiscoveryError::Walk {
                root: root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if !self
                .file_pattern
                .matches(&entry.file_name().to_string_lossy())
            {
                continue;
            }
            if let Some(dir) = entry.path().parent() {
                units.insert(unit_id(root, dir));
            }
        }

        Ok(units.into_iter().collect())
    }
}

/// `./a/b` for `root/a/b`, `.` for `root`.
fn unit_id(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    let components: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if components.is_empty() {
        ".".to_string()
    } else {
        format!("./{}", components.join("/"))
    }
}
