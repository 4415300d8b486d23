//! Tag definitions and tag resolution.
//!
//! A tag is a named [`Matcher`] declared in configuration. A [`TagSet`] holds
//! every configured tag after validation, and [`TagSet::resolve`] turns the
//! tags requested for a run into a single matcher.
//!
//! # Reserved Tags
//!
//! Two names are reserved and may never be configured:
//!
//! | Name | Resolves to |
//! |------|-------------|
//! | `all` | union of every configured tag |
//! | `none` | everything not matched by any configured tag |
//!
//! A reserved tag must be the only tag requested.
//!
//! # Example
//!
//! ```
//! use tagshard::matcher::Matcher;
//! use tagshard::tags::TagSet;
//!
//! let tags = TagSet::new([
//!     ("Integration".to_string(), Matcher::names(["integration"]).unwrap()),
//! ])
//! .unwrap();
//!
//! // Keys are stored lowercased.
//! assert_eq!(tags.names().collect::<Vec<_>>(), ["integration"]);
//!
//! let matcher = tags.resolve(&["integration".to_string()]).unwrap().unwrap();
//! assert!(matcher.matches("./store/integration"));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::matcher::Matcher;
use crate::selector::SelectionError;

/// Reserved tag selecting the union of all tags.
pub const ALL_TAG_NAME: &str = "all";

/// Reserved tag selecting units matched by no tag.
pub const NONE_TAG_NAME: &str = "none";

static TAG_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("tag name regex is valid"));

/// Errors raised while validating configured tag names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagSetError {
    /// A tag uses one of the reserved names.
    #[error("{0:?} is a reserved name that cannot be used as a tag name")]
    ReservedTagName(String),

    /// One or more tag names contain characters outside `[A-Za-z0-9_-]`.
    #[error("invalid tag names: {0:?}")]
    InvalidTagName(Vec<String>),

    /// Two or more tag names are equal ignoring case. Holds the sorted
    /// lowercase forms.
    #[error(
        "tag names were defined multiple times (names must be unique in case-insensitive manner): {0:?}"
    )]
    DuplicateTag(Vec<String>),
}

/// Validated mapping of lowercase tag names to matchers.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    tags: BTreeMap<String, Matcher>,
}

impl TagSet {
    /// Validates `tags` and stores them under their lowercase names.
    ///
    /// Checks run in a fixed order: reserved names first, then invalid
    /// characters, then case-insensitive duplicates.
    pub fn new(tags: impl IntoIterator<Item = (String, Matcher)>) -> Result<Self, TagSetError> {
        let mut tags: Vec<(String, Matcher)> = tags.into_iter().collect();
        tags.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, _) in &tags {
            let lower = name.to_lowercase();
            if lower == ALL_TAG_NAME || lower == NONE_TAG_NAME {
                return Err(TagSetError::ReservedTagName(lower));
            }
        }

        let invalid: Vec<String> = tags
            .iter()
            .filter(|(name, _)| !TAG_NAME_RE.is_match(name))
            .map(|(name, _)| name.clone())
            .collect();
        if !invalid.is_empty() {
            return Err(TagSetError::InvalidTagName(invalid));
        }

        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for (name, _) in &tags {
            let lower = name.to_lowercase();
            if !seen.insert(lower.clone()) {
                duplicates.insert(lower);
            }
        }
        if !duplicates.is_empty() {
            return Err(TagSetError::DuplicateTag(duplicates.into_iter().collect()));
        }

        Ok(Self {
            tags: tags
                .into_iter()
                .map(|(name, matcher)| (name.to_lowercase(), matcher))
                .collect(),
        })
    }

    /// Sorted tag names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Matcher> {
        self.tags.get(name)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Union of every configured tag.
    pub fn union(&self) -> Matcher {
        Matcher::any(self.tags.values().cloned())
    }

    /// Resolves the requested tags into a single matcher.
    ///
    /// Returns `Ok(None)` when no tags were requested, meaning no tag filter
    /// applies.
    pub fn resolve(&self, requested: &[String]) -> Result<Option<Matcher>, SelectionError> {
        match requested {
            [] => return Ok(None),
            [only] if only == ALL_TAG_NAME => return Ok(Some(self.union())),
            [only] if only == NONE_TAG_NAME => return Ok(Some(Matcher::not(self.union()))),
            _ => {}
        }

        if let Some(reserved) = requested
            .iter()
            .find(|tag| *tag == ALL_TAG_NAME || *tag == NONE_TAG_NAME)
        {
            return Err(SelectionError::InvalidTagCombination(reserved.clone()));
        }

        let mut matchers = Vec::with_capacity(requested.len());
        let mut missing = Vec::new();
        for tag in requested {
            match self.tags.get(tag) {
                Some(matcher) => matchers.push(matcher.clone()),
                None => missing.push(tag.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(SelectionError::UnknownTag {
                missing,
                valid: self.tags.keys().cloned().collect(),
            });
        }

        Ok(Some(Matcher::any(matchers)))
    }
}
