//! Configuration loading and schema definitions for tagshard.
//!
//! This module loads the TOML configuration file and turns it into
//! [`TestSettings`], the validated form used by the rest of the crate: tag
//! names are checked, patterns are compiled and the global exclude rules are
//! merged with any excludes given on the command line.

pub mod schema;

pub use schema::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::matcher::{Matcher, MatcherError};
use crate::tags::{TagSet, TagSetError};

/// Default configuration file name, looked up in the project directory.
pub const DEFAULT_CONFIG_FILE: &str = "tagshard.toml";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid tag names: {0:?}")]
    InvalidTagName(Vec<String>),

    #[error(
        "tag names were defined multiple times (names must be unique in case-insensitive manner): {0:?}"
    )]
    DuplicateTag(Vec<String>),

    #[error("{0:?} is a reserved name that cannot be used as a tag name")]
    ReservedTagName(String),

    /// A name regex, path glob or unit file pattern does not compile.
    #[error("invalid pattern in {context}: {source}")]
    InvalidPattern {
        context: String,
        #[source]
        source: MatcherError,
    },
}

impl From<TagSetError> for ConfigError {
    fn from(err: TagSetError) -> Self {
        match err {
            TagSetError::ReservedTagName(name) => ConfigError::ReservedTagName(name),
            TagSetError::InvalidTagName(names) => ConfigError::InvalidTagName(names),
            TagSetError::DuplicateTag(names) => ConfigError::DuplicateTag(names),
        }
    }
}

/// Validated, immutable settings for a run.
#[derive(Debug, Clone)]
pub struct TestSettings {
    pub tags: TagSet,
    /// Global exclude rules merged with command-line excludes.
    pub exclude: Matcher,
    pub runner: RunnerConfig,
    pub units: UnitsConfig,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            tags: TagSet::default(),
            exclude: Matcher::nothing(),
            runner: RunnerConfig::default(),
            units: UnitsConfig::default(),
        }
    }
}

impl Config {
    /// Validates the configuration and builds [`TestSettings`].
    ///
    /// `extra_exclude` holds path globs that are excluded in addition to the
    /// configured `[exclude]` section.
    pub fn into_settings(self, extra_exclude: &[String]) -> Result<TestSettings, ConfigError> {
        let mut tags = Vec::with_capacity(self.tags.len());
        for (name, tag) in &self.tags {
            let matcher = tag
                .to_matcher()
                .map_err(|source| ConfigError::InvalidPattern {
                    context: format!("tag {name:?}"),
                    source,
                })?;
            tags.push((name.clone(), matcher));
        }
        let tags = TagSet::new(tags)?;

        let configured = self
            .exclude
            .to_matcher()
            .map_err(|source| ConfigError::InvalidPattern {
                context: "[exclude]".to_string(),
                source,
            })?;
        let exclude = if extra_exclude.is_empty() {
            configured
        } else {
            let extra =
                Matcher::paths(extra_exclude).map_err(|source| ConfigError::InvalidPattern {
                    context: "--exclude".to_string(),
                    source,
                })?;
            Matcher::any([configured, extra])
        };

        Ok(TestSettings {
            tags,
            exclude,
            runner: self.runner,
            units: self.units,
        })
    }
}

/// Loads tagshard configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, or does
/// not match the schema.
///
/// # Example
///
/// ```no_run
/// use tagshard::config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("tagshard.toml"))?;
/// println!("Runner: {}", config.runner.program);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(config)
}

/// Like [`load_config`], but a missing file yields the default
/// configuration.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(
            "No config file at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }
    load_config(path)
}

/// Loads tagshard configuration from a TOML string.
///
/// # Example
///
/// ```
/// use tagshard::config::load_config_str;
///
/// let config = load_config_str(r#"
///     [tags.integration]
///     names = ["integration"]
/// "#)?;
///
/// assert_eq!(config.tags.len(), 1);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_into_settings() {
        let config = load_config_str(
            r#"
            [exclude]
            paths = ["vendor"]

            [tags.Integration]
            names = ["integration"]

            [tags.slow]
            paths = ["bench"]
            "#,
        )
        .unwrap();

        let settings = config.into_settings(&["tools".to_string()]).unwrap();
        assert_eq!(
            settings.tags.names().collect::<Vec<_>>(),
            ["integration", "slow"]
        );
        assert!(settings.exclude.matches("./vendor/x"));
        assert!(settings.exclude.matches("./tools/gen"));
        assert!(!settings.exclude.matches("./store"));
    }

    #[test]
    fn test_tag_validation_errors() {
        let cases = [
            ("[tags.all]", "reserved"),
            ("[tags.NONE]", "reserved"),
            ("[tags.\"bad name\"]", "invalid tag names"),
            ("[tags.Foo]\n[tags.foo]", "defined multiple times"),
        ];
        for (toml, want) in cases {
            let err = load_config_str(toml)
                .unwrap()
                .into_settings(&[])
                .unwrap_err();
            assert!(
                err.to_string().contains(want),
                "{toml}: got {err}, want {want}"
            );
        }
    }

    #[test]
    fn test_duplicate_tags_are_sorted_lowercase() {
        let err = load_config_str("[tags.B]\n[tags.b]\n[tags.A]\n[tags.a]")
            .unwrap()
            .into_settings(&[])
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateTag(ref names) if names == &["a", "b"]
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = load_config_str("[tags.x]\nnames = [\"(\"]")
            .unwrap()
            .into_settings(&[])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
        assert!(err.to_string().contains("tag \"x\""));
    }

    #[test]
    fn test_load_config_errors() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.toml");
        let err = load_config(&missing).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());

        let broken = temp.path().join("broken.toml");
        std::fs::write(&broken, "[runner\n").unwrap();
        let err = load_config(&broken).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config_or_default(&temp.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config.runner.program, "go");
        assert!(config.tags.is_empty());
    }
}
