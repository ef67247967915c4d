//! Unit exponent vectors
//!
//! A compound unit such as `kg m^2/s^2` is represented as an ordered list of
//! base units with their integer exponents: `[kg:1, m:2, s:-2]`. Unlike a
//! fixed SI dimension vector, the base units are arbitrary names, so two
//! vectors only compare equal when they spell the same units.

use std::fmt;
use serde::{Serialize, Deserialize};

/// A single base unit raised to a nonzero integer power
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitPower {
    /// Base unit name (e.g. "kg")
    pub unit: String,
    /// Nonzero exponent
    pub exponent: i32,
}

/// Mapping from base unit name to exponent.
///
/// Names are unique and insertion order is kept: cross-unit matching scans
/// the units of a target in the order they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitVector {
    powers: Vec<UnitPower>,
}

impl UnitVector {
    /// Dimensionless (empty) vector
    pub fn new() -> Self {
        UnitVector { powers: Vec::new() }
    }

    /// Build a vector from `(name, exponent)` pairs.
    ///
    /// Returns `None` if a name repeats or an exponent is zero.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, i32)]) -> Option<Self> {
        let mut vector = UnitVector::new();
        for (name, exponent) in pairs {
            if *exponent == 0 || !vector.push(name.as_ref(), *exponent) {
                return None;
            }
        }
        Some(vector)
    }

    /// Check if this is a dimensionless quantity
    pub fn is_dimensionless(&self) -> bool {
        self.powers.is_empty()
    }

    /// Number of distinct base units
    pub fn len(&self) -> usize {
        self.powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }

    /// Exponent of a base unit, if present
    pub fn get(&self, unit: &str) -> Option<i32> {
        self.powers.iter()
            .find(|p| p.unit == unit)
            .map(|p| p.exponent)
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.get(unit).is_some()
    }

    /// Iterate `(name, exponent)` in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> + '_ {
        self.powers.iter().map(|p| (p.unit.as_str(), p.exponent))
    }

    pub fn powers(&self) -> &[UnitPower] {
        &self.powers
    }

    /// Append a base unit. Returns false (and leaves the vector unchanged)
    /// if the name is already present.
    pub(crate) fn push(&mut self, unit: &str, exponent: i32) -> bool {
        if self.contains(unit) {
            return false;
        }
        self.powers.push(UnitPower { unit: unit.to_string(), exponent });
        true
    }
}

impl fmt::Display for UnitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.powers.is_empty() {
            return write!(f, "1");
        }

        let parts: Vec<String> = self.powers.iter()
            .map(|p| if p.exponent == 1 {
                p.unit.clone()
            } else {
                format!("{}^{}", p.unit, p.exponent)
            })
            .collect();

        write!(f, "{}", parts.join(" "))
    }
}
