//! Unit selection by tag and exclude rules.
//!
//! Selection combines three inputs: the units found on disk, the tags
//! requested for the run (resolved through a [`TagSet`]), and the global
//! exclude matcher. A unit is kept unless the combined exclusion matches it:
//!
//! ```text
//! exclusion = exclude                      (no tags requested)
//! exclusion = Any(exclude, Not(tags))      (tags requested)
//! ```
//!
//! Output order is the input order. Partitioning sorts on its own.

use crate::discovery::DiscoveryError;
use crate::matcher::Matcher;
use crate::tags::TagSet;

/// Errors raised while selecting units.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// One or more requested tags are not configured.
    #[error(
        "tag(s) {} not defined in configuration: {}",
        quoted(.missing),
        valid_tags(.valid)
    )]
    UnknownTag {
        missing: Vec<String>,
        valid: Vec<String>,
    },

    /// A reserved tag was requested alongside other tags.
    #[error("if {0:?} tag is specified, it must be the only tag specified")]
    InvalidTagCombination(String),

    /// A run was requested but no unit survived selection.
    #[error("no packages to test")]
    NoUnitsSelected,

    /// Units could not be enumerated.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

fn quoted(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("{v:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn valid_tags(valid: &[String]) -> String {
    if valid.is_empty() {
        "no tags are defined".to_string()
    } else {
        format!("valid tags: {}", quoted(valid))
    }
}

/// Builds the matcher for units that must not run.
pub fn exclusion_matcher(
    tags: &[String],
    tag_set: &TagSet,
    exclude: &Matcher,
) -> Result<Matcher, SelectionError> {
    Ok(match tag_set.resolve(tags)? {
        Some(tag_matcher) => Matcher::any([exclude.clone(), Matcher::not(tag_matcher)]),
        None => exclude.clone(),
    })
}

/// Keeps the units of `all_units` that are not excluded. An empty result is
/// not an error here; see [`select_for_run`].
pub fn select(
    all_units: Vec<String>,
    tags: &[String],
    tag_set: &TagSet,
    exclude: &Matcher,
) -> Result<Vec<String>, SelectionError> {
    let exclusion = exclusion_matcher(tags, tag_set, exclude)?;
    Ok(all_units
        .into_iter()
        .filter(|unit| !exclusion.matches(unit))
        .collect())
}

/// Like [`select`], but fails with [`SelectionError::NoUnitsSelected`] when
/// nothing is left to run.
pub fn select_for_run(
    all_units: Vec<String>,
    tags: &[String],
    tag_set: &TagSet,
    exclude: &Matcher,
) -> Result<Vec<String>, SelectionError> {
    let units = select(all_units, tags, tag_set, exclude)?;
    if units.is_empty() {
        return Err(SelectionError::NoUnitsSelected);
    }
    Ok(units)
}
