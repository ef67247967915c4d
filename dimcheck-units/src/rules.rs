//! Conversion rule compiler
//!
//! Rule text is a `;`-separated list of clauses, each in one of two forms:
//!
//! - SI prefix shorthand: `W: M k m` defines `W` at scale 1 together with
//!   `MW`, `kW` and `mW` at their prefix scales.
//! - Equivalence chain: `1 m = 1e-3 km = 100 cm` states that all terms are
//!   the same quantity. A term without a number counts as 1.
//!
//! Units mentioned together end up in one dimension class, each with a
//! scale relative to the unit that founded the class. A clause whose *first*
//! unit is already known joins that unit's class; a clause that only shares
//! a later unit starts a new class and moves that unit into it.

use std::collections::HashMap;
use thiserror::Error;
use serde::Serialize;
use dimcheck_core::DimError;
use crate::parse::is_unit_name;
use crate::prefix::prefix_scale;

/// Identifier of a set of mutually convertible units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DimensionClass(pub u32);

/// Dimension class and relative scale of one unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnitEntry {
    pub class: DimensionClass,
    /// Size of one unit relative to the class anchor, as written in the
    /// rules: `1 m = 100 cm` gives m 1.0 and cm 0.01.
    pub scale: f64,
}

/// Unit name to (class, scale) lookup built from rule text
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConversionMapping {
    entries: HashMap<String, UnitEntry>,
}

impl ConversionMapping {
    pub fn new() -> Self {
        ConversionMapping { entries: HashMap::new() }
    }

    /// Compile rule text into a fresh mapping
    pub fn from_rules(rules: &str) -> Result<Self, RuleError> {
        let mut mapping = ConversionMapping::new();
        let mut next_class = 0;
        compile(rules, &mut mapping, &mut next_class)?;
        Ok(mapping)
    }

    pub fn get(&self, unit: &str) -> Option<&UnitEntry> {
        self.entries.get(unit)
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.entries.contains_key(unit)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when both units are known and share a dimension class
    pub fn same_class(&self, a: &str, b: &str) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(x), Some(y)) => x.class == y.class,
            _ => false,
        }
    }

    /// Units of one class, sorted by name
    pub fn members(&self, class: DimensionClass) -> Vec<&str> {
        let mut members: Vec<&str> = self.entries.iter()
            .filter(|(_, e)| e.class == class)
            .map(|(u, _)| u.as_str())
            .collect();
        members.sort_unstable();
        members
    }

    fn insert(&mut self, unit: String, entry: UnitEntry) {
        self.entries.insert(unit, entry);
    }
}

/// Errors in conversion rule text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("\"{0}\" unit contains unaccepted character")]
    InvalidUnitName(String),

    #[error("\"{0}\" is not SI prefix")]
    UnknownPrefix(String),

    #[error("malformed conversion term \"{0}\"")]
    MalformedTerm(String),

    #[error("syntax error of SI prefix in \"{0}\"")]
    PrefixSyntax(String),
}

impl From<RuleError> for DimError {
    fn from(err: RuleError) -> Self {
        let message = err.to_string();
        match err {
            RuleError::UnknownPrefix(prefix) => DimError::unknown_prefix(&prefix),
            RuleError::InvalidUnitName(clause)
            | RuleError::MalformedTerm(clause)
            | RuleError::PrefixSyntax(clause) => DimError::rule_syntax(message).with_clause(clause),
        }
    }
}

/// Fold `rules` into `mapping`, taking new class ids from `next_class`.
///
/// On error the mapping may hold the clauses before the failing one; callers
/// that need atomicity compile into a copy.
pub fn compile(
    rules: &str,
    mapping: &mut ConversionMapping,
    next_class: &mut u32,
) -> Result<(), RuleError> {
    for clause in rules.split(';').filter(|c| !c.trim().is_empty()) {
        let scales = clause_scales(clause)?;
        join_clause(&scales, mapping, next_class);
    }
    Ok(())
}

/// Local scales of one clause, first-mentioned unit first
fn clause_scales(clause: &str) -> Result<Vec<(String, f64)>, RuleError> {
    let fields: Vec<&str> = clause.split(':').collect();
    match fields.len() {
        n if n > 3 => Err(RuleError::PrefixSyntax(clause.trim().to_string())),
        2 => prefix_scales(fields[0], fields[1]),
        _ => chain_scales(clause),
    }
}

fn prefix_scales(unit: &str, prefixes: &str) -> Result<Vec<(String, f64)>, RuleError> {
    let unit = unit.trim();
    if !is_unit_name(unit) {
        return Err(RuleError::InvalidUnitName(unit.to_string()));
    }

    let mut scales = vec![(unit.to_string(), 1.0)];
    for prefix in prefixes.split_whitespace() {
        let factor = prefix_scale(prefix)
            .ok_or_else(|| RuleError::UnknownPrefix(prefix.to_string()))?;
        set_scale(&mut scales, format!("{}{}", prefix, unit), factor);
    }
    Ok(scales)
}

fn chain_scales(clause: &str) -> Result<Vec<(String, f64)>, RuleError> {
    let mut scales = Vec::new();
    for term in clause.split('=') {
        let (number, unit) = split_number_unit(term)
            .ok_or_else(|| RuleError::MalformedTerm(term.trim().to_string()))?;
        if !is_unit_name(unit) {
            return Err(RuleError::InvalidUnitName(unit.to_string()));
        }
        set_scale(&mut scales, unit.to_string(), 1.0 / number);
    }
    Ok(scales)
}

/// Split "1e-3 km" into (0.001, "km"); a term without a number is (1, term).
///
/// A leading word that starts like a number must be a finite, nonzero
/// number followed by a unit.
fn split_number_unit(term: &str) -> Option<(f64, &str)> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }

    let (head, rest) = term.split_once(char::is_whitespace).unwrap_or((term, ""));
    if !looks_numeric(head) {
        return Some((1.0, term));
    }

    let number = head.parse::<f64>().ok().filter(|n| n.is_finite() && *n != 0.0)?;
    let unit = rest.trim();
    (!unit.is_empty()).then_some((number, unit))
}

fn looks_numeric(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '.' | '+' | '-'))
}

/// Record a unit's scale; a repeated unit keeps its first position
fn set_scale(scales: &mut Vec<(String, f64)>, unit: String, scale: f64) {
    match scales.iter_mut().find(|(u, _)| *u == unit) {
        Some(existing) => existing.1 = scale,
        None => scales.push((unit, scale)),
    }
}

fn join_clause(scales: &[(String, f64)], mapping: &mut ConversionMapping, next_class: &mut u32) {
    let Some((first, first_scale)) = scales.first() else {
        return;
    };

    let (class, join) = match mapping.get(first) {
        Some(entry) => (entry.class, entry.scale / first_scale),
        None => {
            let class = DimensionClass(*next_class);
            *next_class += 1;
            (class, 1.0)
        }
    };

    for (unit, scale) in scales {
        mapping.insert(unit.clone(), UnitEntry { class, scale: join * scale });
    }
}
