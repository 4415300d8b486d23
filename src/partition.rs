//! Deterministic sharding of a unit list.
//!
//! A [`Partition`] selects one of `total` contiguous, size-balanced slices of
//! the lexicographically sorted unit list. Shard sizes differ by at most one,
//! and lower-indexed shards are never smaller than higher-indexed ones:
//!
//! ```text
//! 10 units, 3 shards:   [a b c d] [e f g] [h i j]
//!                        shard 0   shard 1 shard 2
//! ```
//!
//! # Example
//!
//! ```
//! use tagshard::partition::{Partition, apply};
//!
//! let partition = Partition::parse("1,2").unwrap();
//! let units: Vec<String> = ["d", "a", "c", "b"].iter().map(|s| s.to_string()).collect();
//!
//! assert_eq!(apply(partition.as_ref(), &units), ["c", "d"]);
//! ```

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Errors raised while parsing a partition spec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    /// The spec is not two comma-separated fields.
    #[error("invalid partition format {0:?}: expected format X,N (e.g., 0,4)")]
    InvalidFormat(String),

    /// The total is not an integer, or is below one.
    #[error("partition total must be an integer of at least 1, got {value:?}")]
    InvalidTotal {
        value: String,
        #[source]
        source: Option<ParseIntError>,
    },

    /// The index is not an integer, or is outside `0..=max`.
    #[error("partition index must be an integer between 0 and {max}, got {value:?}")]
    InvalidIndex {
        value: String,
        max: usize,
        #[source]
        source: Option<ParseIntError>,
    },
}

/// One shard out of `total`. `index` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    index: usize,
    total: usize,
}

impl Partition {
    /// Creates a partition, validating `index < total` and `total >= 1`.
    pub fn new(index: usize, total: usize) -> Result<Self, PartitionError> {
        if total < 1 {
            return Err(PartitionError::InvalidTotal {
                value: total.to_string(),
                source: None,
            });
        }
        if index >= total {
            return Err(PartitionError::InvalidIndex {
                value: index.to_string(),
                max: total - 1,
                source: None,
            });
        }
        Ok(Self { index, total })
    }

    /// Parses an `X,N` spec. An empty spec means no partitioning.
    ///
    /// The total is checked first so that index errors can state the valid
    /// range.
    pub fn parse(spec: &str) -> Result<Option<Self>, PartitionError> {
        if spec.is_empty() {
            return Ok(None);
        }

        let fields: Vec<&str> = spec.split(',').collect();
        let [index, total] = fields.as_slice() else {
            return Err(PartitionError::InvalidFormat(spec.to_string()));
        };
        let (index, total) = (index.trim(), total.trim());

        let total = match total.parse::<i64>() {
            Ok(total) if total >= 1 => total,
            Ok(_) => {
                return Err(PartitionError::InvalidTotal {
                    value: total.to_string(),
                    source: None,
                });
            }
            Err(source) => {
                return Err(PartitionError::InvalidTotal {
                    value: total.to_string(),
                    source: Some(source),
                });
            }
        };
        let total = usize::try_from(total).map_err(|_| PartitionError::InvalidTotal {
            value: total.to_string(),
            source: None,
        })?;

        let index_error = |source| PartitionError::InvalidIndex {
            value: index.to_string(),
            max: total - 1,
            source,
        };
        let index = match index.parse::<i64>() {
            Ok(index) => usize::try_from(index).map_err(|_| index_error(None))?,
            Err(source) => return Err(index_error(Some(source))),
        };
        if index >= total {
            return Err(index_error(None));
        }

        Ok(Some(Self { index, total }))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns this shard of `units`.
    pub fn apply(&self, units: &[String]) -> Vec<String> {
        if units.is_empty() {
            return Vec::new();
        }

        let mut sorted = units.to_vec();
        sorted.sort();

        let len = sorted.len();
        let base = len / self.total;
        let remainder = len % self.total;

        let shard_size = |i: usize| if i < remainder { base + 1 } else { base };
        let start: usize = (0..self.index).map(shard_size).sum();
        if start >= len {
            return Vec::new();
        }
        let end = (start + shard_size(self.index)).min(len);

        sorted.drain(start..end).collect()
    }
}

/// Applies an optional partition. `None` returns `units` unchanged.
pub fn apply(partition: Option<&Partition>, units: &[String]) -> Vec<String> {
    match partition {
        Some(partition) => partition.apply(units),
        None => units.to_vec(),
    }
}

/// Human-readable description, e.g. `partition 2 of 5`.
pub fn describe(partition: Option<&Partition>) -> String {
    match partition {
        Some(p) => format!("partition {} of {}", p.index, p.total),
        None => "no partition".to_string(),
    }
}

/// Formats as the `X,N` spec accepted by [`Partition::parse`].
impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.index, self.total)
    }
}

impl FromStr for Partition {
    type Err = PartitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Partition::parse(s)?.ok_or_else(|| PartitionError::InvalidFormat(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_valid() {
        assert_eq!(Partition::parse("").unwrap(), None);
        assert_eq!(
            Partition::parse("0,4").unwrap(),
            Some(Partition { index: 0, total: 4 })
        );
        assert_eq!(
            Partition::parse("3,4").unwrap(),
            Some(Partition { index: 3, total: 4 })
        );
        assert_eq!(
            Partition::parse(" 1 , 3 ").unwrap(),
            Some(Partition { index: 1, total: 3 })
        );
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("14", r#"invalid partition format "14": expected format X,N (e.g., 0,4)"#),
            ("1,2,3", r#"invalid partition format "1,2,3": expected format X,N (e.g., 0,4)"#),
            ("a,4", r#"partition index must be an integer between 0 and 3, got "a""#),
            ("1,b", r#"partition total must be an integer of at least 1, got "b""#),
            ("1,0", r#"partition total must be an integer of at least 1, got "0""#),
            ("-1,4", r#"partition index must be an integer between 0 and 3, got "-1""#),
            ("4,4", r#"partition index must be an integer between 0 and 3, got "4""#),
        ];
        for (input, want) in cases {
            let err = Partition::parse(input).unwrap_err();
            assert_eq!(err.to_string(), want, "input {input:?}");
        }
    }

    #[test]
    fn test_non_integer_fields_use_index_and_total_variants() {
        let err = Partition::parse("a,4").unwrap_err();
        assert!(matches!(
            err,
            PartitionError::InvalidIndex {
                max: 3,
                source: Some(_),
                ..
            }
        ));
        assert!(std::error::Error::source(&err).is_some());

        assert!(matches!(
            Partition::parse("1,b"),
            Err(PartitionError::InvalidTotal {
                source: Some(_),
                ..
            })
        ));
        assert!(matches!(
            Partition::parse("0,-2"),
            Err(PartitionError::InvalidTotal { source: None, .. })
        ));
        assert!(matches!(
            Partition::parse("-1,4"),
            Err(PartitionError::InvalidIndex { source: None, .. })
        ));
    }

    #[test]
    fn test_new_rejects_out_of_range_without_wrapping() {
        assert!(matches!(
            Partition::new(usize::MAX, 4),
            Err(PartitionError::InvalidIndex { max: 3, .. })
        ));
        assert!(matches!(
            Partition::new(0, 0),
            Err(PartitionError::InvalidTotal { .. })
        ));

        let partition = Partition::new(usize::MAX - 1, usize::MAX).unwrap();
        assert_eq!(partition.index(), usize::MAX - 1);
        assert_eq!(partition.total(), usize::MAX);
    }

    #[test]
    fn test_display_round_trips() {
        for total in 1..8 {
            for index in 0..total {
                let partition = Partition::new(index, total).unwrap();
                let parsed: Partition = partition.to_string().parse().unwrap();
                assert_eq!(parsed, partition);
            }
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(None), "no partition");
        assert_eq!(
            describe(Some(&Partition::new(0, 4).unwrap())),
            "partition 0 of 4"
        );
        assert_eq!(
            describe(Some(&Partition::new(2, 5).unwrap())),
            "partition 2 of 5"
        );
    }

    #[test]
    fn test_apply_absent_returns_input_unchanged() {
        let units = strings(&["c", "a", "b"]);
        assert_eq!(apply(None, &units), units);
    }

    #[test]
    fn test_apply_empty_units() {
        let partition = Partition::new(0, 2).unwrap();
        assert!(partition.apply(&[]).is_empty());
    }

    #[test]
    fn test_apply_ten_units_three_shards() {
        let units = strings(&["j", "i", "h", "g", "f", "e", "d", "c", "b", "a"]);
        let shard = |i| Partition::new(i, 3).unwrap().apply(&units);
        assert_eq!(shard(0), ["a", "b", "c", "d"]);
        assert_eq!(shard(1), ["e", "f", "g"]);
        assert_eq!(shard(2), ["h", "i", "j"]);
    }

    #[test]
    fn test_apply_uneven() {
        let units = strings(&["e", "d", "c", "b", "a"]);
        assert_eq!(Partition::new(0, 2).unwrap().apply(&units), ["a", "b", "c"]);
        assert_eq!(Partition::new(1, 2).unwrap().apply(&units), ["d", "e"]);
    }

    #[test]
    fn test_apply_more_shards_than_units() {
        let units = strings(&["c", "b", "a"]);
        let partition = Partition::parse("3,4").unwrap();
        assert!(apply(partition.as_ref(), &units).is_empty());
    }

    #[test]
    fn test_shards_cover_every_unit_exactly_once() {
        for count in 0..25usize {
            let units: Vec<String> = (0..count).rev().map(|i| format!("unit{i:02}")).collect();
            let mut sorted = units.clone();
            sorted.sort();

            for total in 1..9 {
                let shards: Vec<Vec<String>> = (0..total)
                    .map(|i| Partition::new(i, total).unwrap().apply(&units))
                    .collect();

                let floor = count / total;
                let ceil = count.div_ceil(total);
                for shard in &shards {
                    assert!(shard.len() == floor || shard.len() == ceil);
                }
                for pair in shards.windows(2) {
                    assert!(pair[0].len() >= pair[1].len());
                }

                let joined: Vec<String> = shards.concat();
                assert_eq!(joined, sorted, "count={count} total={total}");
            }
        }
    }

    #[test]
    fn test_apply_is_deterministic_regardless_of_input_order() {
        let a = strings(&["x", "m", "b", "q", "c"]);
        let b = strings(&["c", "q", "b", "m", "x"]);
        let partition = Partition::new(1, 2).unwrap();
        assert_eq!(partition.apply(&a), partition.apply(&b));
        assert_eq!(partition.apply(&a), partition.apply(&a));
    }
}
