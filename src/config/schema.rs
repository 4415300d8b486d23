//! Configuration schema definitions for tagshard.
//!
//! # Schema Overview
//!
//! ```text
//! Config (root)
//! ├── RunnerConfig           - External test runner invocation
//! ├── UnitsConfig            - How units are recognised on disk
//! ├── NamesPaths             - Global exclude rules
//! └── tags: name -> TagConfig
//!     └── NamesPathsExclude  - Per-tag exclude rules
//! ```
//!
//! Every section is optional; an empty file is a valid configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::matcher::{Matcher, MatcherError};

/// Root configuration structure for tagshard.
///
/// # TOML Structure
///
/// ```toml
/// [runner]
/// program = "go"
/// test_args = ["test"]
///
/// [exclude]
/// names = ["testdata"]
/// paths = ["vendor"]
///
/// [tags.integration]
/// names = ["integration"]
/// paths = ["test"]
///
/// [tags.integration.exclude]
/// paths = ["test/fixtures"]
/// ```
///
/// # Example
///
/// ```
/// use tagshard::config::Config;
///
/// let config: Config = toml::from_str(r#"
///     [tags.slow]
///     paths = ["bench"]
/// "#).unwrap();
///
/// assert_eq!(config.runner.program, "go");
/// assert!(config.tags.contains_key("slow"));
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// External test runner settings.
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Unit recognition settings.
    #[serde(default)]
    pub units: UnitsConfig,

    /// Units excluded from every run, regardless of tags.
    #[serde(default)]
    pub exclude: NamesPaths,

    /// Named unit sets selectable with `--tags`.
    #[serde(default)]
    pub tags: BTreeMap<String, TagConfig>,
}

/// How the external test runner is invoked.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `program` | `go` |
/// | `test_args` | `["test"]` |
/// | `list_args` | `["list"]` |
/// | `verbose_flag` | `-v` |
///
/// A test run executes `program test_args... <passthrough>... [verbose_flag]
/// units...`. The verbose flag is only added when a JUnit report is
/// requested, since the report is built from the verbose transcript. Set it
/// to `""` to never add it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_test_args")]
    pub test_args: Vec<String>,

    /// Arguments for the metadata query that prints one unit name per line.
    #[serde(default = "default_list_args")]
    pub list_args: Vec<String>,

    #[serde(default = "default_verbose_flag")]
    pub verbose_flag: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            test_args: default_test_args(),
            list_args: default_list_args(),
            verbose_flag: default_verbose_flag(),
        }
    }
}

fn default_program() -> String {
    "go".to_string()
}

fn default_test_args() -> Vec<String> {
    vec!["test".to_string()]
}

fn default_list_args() -> Vec<String> {
    vec!["list".to_string()]
}

fn default_verbose_flag() -> String {
    "-v".to_string()
}

/// How units are recognised on disk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UnitsConfig {
    /// Glob matched against file names. A directory holding at least one
    /// matching file is a unit.
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            file_pattern: default_file_pattern(),
        }
    }
}

fn default_file_pattern() -> String {
    "*.go".to_string()
}

/// Name regexes and path globs. A unit matches if either list matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NamesPaths {
    /// Regexes matched in full against each path component.
    #[serde(default)]
    pub names: Vec<String>,

    /// Globs matched against the unit path and its ancestors.
    #[serde(default)]
    pub paths: Vec<String>,
}

impl NamesPaths {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.paths.is_empty()
    }

    /// Compiles to `Any(names, paths)`.
    pub fn to_matcher(&self) -> Result<Matcher, MatcherError> {
        Ok(Matcher::any([
            Matcher::names(&self.names)?,
            Matcher::paths(&self.paths)?,
        ]))
    }
}

/// A tag definition: what it includes, minus what it excludes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TagConfig {
    #[serde(default)]
    pub names: Vec<String>,

    #[serde(default)]
    pub paths: Vec<String>,

    #[serde(default)]
    pub exclude: NamesPaths,
}

impl TagConfig {
    /// Compiles to `All(Any(names, paths), Not(exclude))`, or just the
    /// include part when there is nothing to exclude.
    pub fn to_matcher(&self) -> Result<Matcher, MatcherError> {
        let include = NamesPaths {
            names: self.names.clone(),
            paths: self.paths.clone(),
        }
        .to_matcher()?;

        if self.exclude.is_empty() {
            return Ok(include);
        }
        Ok(Matcher::all([
            include,
            Matcher::not(self.exclude.to_matcher()?),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.runner, RunnerConfig::default());
        assert_eq!(config.runner.program, "go");
        assert_eq!(config.runner.test_args, ["test"]);
        assert_eq!(config.runner.list_args, ["list"]);
        assert_eq!(config.runner.verbose_flag, "-v");
        assert_eq!(config.units.file_pattern, "*.go");
        assert!(config.exclude.is_empty());
        assert!(config.tags.is_empty());
    }

    #[test]
    fn test_partial_runner_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [runner]
            program = "gotestsum"
            "#,
        )
        .unwrap();
        assert_eq!(config.runner.program, "gotestsum");
        assert_eq!(config.runner.test_args, ["test"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [exclude]
            name = ["typo"]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_tag_matcher_with_exclude() {
        let config: Config = toml::from_str(
            r#"
            [tags.integration]
            names = ["integration"]
            paths = ["test"]

            [tags.integration.exclude]
            paths = ["test/foo"]
            "#,
        )
        .unwrap();

        let matcher = config.tags["integration"].to_matcher().unwrap();
        assert!(matcher.matches("./a/integration"));
        assert!(matcher.matches("./test/bar"));
        assert!(!matcher.matches("./test/foo"));
        assert!(!matcher.matches("./test/foo/deep"));
        assert!(!matcher.matches("./store"));
    }

    #[test]
    fn test_empty_names_paths_matches_nothing() {
        let matcher = NamesPaths::default().to_matcher().unwrap();
        assert!(!matcher.matches("./anything"));
        assert!(!matcher.matches("."));
    }
}
