//! Cartesian grid of integer strategy parameters.

use std::str::FromStr;

use crate::domain::error::TurtleError;

#[derive(Debug, Clone, PartialEq)]
pub struct ParamRange {
    pub name: String,
    pub values: Vec<i64>,
}

impl ParamRange {
    pub fn new(name: &str, values: Vec<i64>) -> Self {
        ParamRange {
            name: name.to_string(),
            values,
        }
    }

    /// Parse a value list: `lo..hi` (end exclusive), `lo..=hi`, or
    /// comma-separated values.
    pub fn parse_values(name: &str, text: &str) -> Result<Self, TurtleError> {
        let invalid = |reason: String| TurtleError::InvalidGrid {
            reason: format!("{name}: {reason}"),
        };
        let parse = |s: &str| {
            s.trim()
                .parse::<i64>()
                .map_err(|e| invalid(format!("'{}' is not an integer: {e}", s.trim())))
        };

        let text = text.trim();
        let values: Vec<i64> = if let Some((lo, hi)) = text.split_once("..=") {
            (parse(lo)?..=parse(hi)?).collect()
        } else if let Some((lo, hi)) = text.split_once("..") {
            (parse(lo)?..parse(hi)?).collect()
        } else {
            text.split(',').map(parse).collect::<Result<_, _>>()?
        };

        if values.is_empty() {
            return Err(invalid(format!("'{text}' yields no values")));
        }
        Ok(ParamRange::new(name, values))
    }
}

/// `name=lo..hi`, as given on the command line.
impl FromStr for ParamRange {
    type Err = TurtleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, values) = s.split_once('=').ok_or_else(|| TurtleError::InvalidGrid {
            reason: format!("expected name=values, got '{s}'"),
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(TurtleError::InvalidGrid {
                reason: format!("missing parameter name in '{s}'"),
            });
        }
        ParamRange::parse_values(name, values)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamGrid {
    ranges: Vec<ParamRange>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a swept parameter. Names must be unique.
    pub fn add(&mut self, range: ParamRange) -> Result<(), TurtleError> {
        if self.ranges.iter().any(|r| r.name == range.name) {
            return Err(TurtleError::InvalidGrid {
                reason: format!("parameter '{}' given twice", range.name),
            });
        }
        self.ranges.push(range);
        Ok(())
    }

    pub fn ranges(&self) -> &[ParamRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of combinations.
    pub fn len(&self) -> usize {
        if self.ranges.is_empty() {
            return 0;
        }
        self.ranges.iter().map(|r| r.values.len()).product()
    }

    /// Every combination, first parameter varying slowest.
    pub fn combinations(&self) -> Vec<Vec<(String, i64)>> {
        if self.ranges.is_empty() {
            return Vec::new();
        }
        self.ranges.iter().fold(vec![Vec::new()], |acc, range| {
            acc.iter()
                .flat_map(|prefix| {
                    range.values.iter().map(move |&v| {
                        let mut combo = prefix.clone();
                        combo.push((range.name.clone(), v));
                        combo
                    })
                })
                .collect()
        })
    }
}
