//! Composable predicates over unit identifiers.
//!
//! A [`Matcher`] answers one question: does a unit (identified by a relative,
//! slash-separated path such as `./pkg/store`) belong to a set? Leaf matchers
//! test either the names of path components or the path itself; composite
//! matchers combine them with union, intersection and negation.
//!
//! # Matching Rules
//!
//! | Variant | Matches when |
//! |---------|--------------|
//! | [`Matcher::Name`] | any path component fully matches any of the regexes |
//! | [`Matcher::Path`] | the path, or one of its ancestors, matches any of the globs |
//! | [`Matcher::Any`] | at least one child matches (empty: never) |
//! | [`Matcher::All`] | every child matches (empty: always) |
//! | [`Matcher::Not`] | the child does not match |
//!
//! A leading `./` on the identifier is ignored, so `./vendor/x` and
//! `vendor/x` are equivalent.
//!
//! # Example
//!
//! ```
//! use tagshard::matcher::Matcher;
//!
//! let exclude = Matcher::any([
//!     Matcher::names(["testdata"]).unwrap(),
//!     Matcher::paths(["vendor"]).unwrap(),
//! ]);
//!
//! assert!(exclude.matches("./vendor/github.com/pkg"));
//! assert!(exclude.matches("./store/testdata"));
//! assert!(!exclude.matches("./store"));
//! ```

use glob::Pattern;
use regex::Regex;

/// Errors raised while compiling matcher patterns.
#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    /// A name pattern is not a valid regular expression.
    #[error("invalid name pattern {pattern:?}: {source}")]
    InvalidName {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A path pattern is not a valid glob.
    #[error("invalid path pattern {pattern:?}: {source}")]
    InvalidPath {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// A predicate over unit identifiers.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Matches if any path component fully matches any regex.
    Name(Vec<Regex>),
    /// Matches if the path or any of its ancestors matches any glob.
    Path(Vec<Pattern>),
    /// Union of the children.
    Any(Vec<Matcher>),
    /// Intersection of the children.
    All(Vec<Matcher>),
    /// Negation of the child.
    Not(Box<Matcher>),
}

impl Matcher {
    /// Builds a [`Matcher::Name`] from regex sources. Each pattern is anchored
    /// at both ends before compiling.
    pub fn names<I, S>(patterns: I) -> Result<Self, MatcherError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(&format!("^(?:{p})$")).map_err(|source| MatcherError::InvalidName {
                    pattern: p.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Matcher::Name(compiled))
    }

    /// Builds a [`Matcher::Path`] from glob sources.
    pub fn paths<I, S>(patterns: I) -> Result<Self, MatcherError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Pattern::new(normalize(p)).map_err(|source| MatcherError::InvalidPath {
                    pattern: p.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Matcher::Path(compiled))
    }

    /// Union of `matchers`.
    pub fn any(matchers: impl IntoIterator<Item = Matcher>) -> Self {
        Matcher::Any(matchers.into_iter().collect())
    }

    /// Intersection of `matchers`.
    pub fn all(matchers: impl IntoIterator<Item = Matcher>) -> Self {
        Matcher::All(matchers.into_iter().collect())
    }

    /// Negation of `matcher`.
    #[allow(clippy::should_implement_trait)]
    pub fn not(matcher: Matcher) -> Self {
        Matcher::Not(Box::new(matcher))
    }

    /// A matcher that matches nothing.
    pub fn nothing() -> Self {
        Matcher::Any(Vec::new())
    }

    /// Returns `true` if `unit` is matched.
    pub fn matches(&self, unit: &str) -> bool {
        let unit = normalize(unit);
        match self {
            Matcher::Name(regexes) => unit
                .split('/')
                .any(|component| regexes.iter().any(|re| re.is_match(component))),
            Matcher::Path(patterns) => ancestors(unit)
                .any(|prefix| patterns.iter().any(|pattern| pattern.matches(prefix))),
            Matcher::Any(children) => children.iter().any(|m| m.matches(unit)),
            Matcher::All(children) => children.iter().all(|m| m.matches(unit)),
            Matcher::Not(child) => !child.matches(unit),
        }
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.strip_prefix("./").unwrap_or(path);
    let trimmed = trimmed.trim_end_matches('/');
    if trimmed.is_empty() { "." } else { trimmed }
}

/// `a/b/c` yields `a`, `a/b`, `a/b/c`.
fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(move |(idx, _)| &path[..idx])
        .chain(std::iter::once(path))
}
