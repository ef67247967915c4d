//! Convertibility check between a submitted unit and the accepted targets

use thiserror::Error;
use serde::Serialize;
use tracing::{debug, trace};
use dimcheck_core::DimError;
use crate::UnitVector;
use crate::index::ConversionIndex;
use crate::parse::{parse_unit, parse_target_list, TargetList, TargetListError};
use crate::rules::{ConversionMapping, RuleError};

/// Outcome of a convertibility check
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Convertibility {
    /// The input unit equals one of the targets, possibly after conversion
    pub convertible: bool,
    /// Multiply a value in the input unit by this to express it in the
    /// matched target unit. Always 1 when not convertible.
    pub factor: f64,
    /// Position of the matched unit in the target list
    pub target: Option<usize>,
}

impl Convertibility {
    fn matched(factor: f64, target: usize) -> Self {
        Convertibility { convertible: true, factor, target: Some(target) }
    }

    fn rejected() -> Self {
        Convertibility { convertible: false, factor: 1.0, target: None }
    }
}

/// Authoring errors raised while checking. Student input never causes one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckError {
    #[error("invalid conversion rules: {0}")]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Targets(#[from] TargetListError),
}

impl From<CheckError> for DimError {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::Rules(e) => e.into(),
            CheckError::Targets(e) => e.into(),
        }
    }
}

/// Per-session unit checker owning the cached conversion rules
#[derive(Debug, Clone, Default)]
pub struct UnitChecker {
    index: ConversionIndex,
}

impl UnitChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> &ConversionIndex {
        &self.index
    }

    /// Select the default rule preset by id
    pub fn assign_default_rules(&mut self, rule_id: u32, rules: &str) {
        self.index.assign_default(rule_id, rules);
    }

    /// Replace the question's additional rules
    pub fn assign_additional_rules(&mut self, rules: &str) {
        self.index.assign_additional(rules);
    }

    /// Compile the current rules, reporting rule errors to the author
    pub fn ensure_compiled(&mut self) -> Result<&ConversionMapping, RuleError> {
        self.index.ensure_compiled()
    }

    /// Check whether `input` equals one of the `=`-separated `targets`.
    ///
    /// A malformed `input` is simply not convertible. Errors are returned
    /// only for malformed rules or targets.
    pub fn check_convertibility(&mut self, input: &str, targets: &str) -> Result<Convertibility, CheckError> {
        match (input.trim().is_empty(), targets.trim().is_empty()) {
            (true, true) => return Ok(Convertibility::matched(1.0, 0)),
            (true, false) | (false, true) => return Ok(Convertibility::rejected()),
            (false, false) => {}
        }

        let unit = match parse_unit(input) {
            Ok(unit) => unit,
            Err(err) => {
                debug!(input, error = %err, "input unit does not parse");
                return Ok(Convertibility::rejected());
            }
        };

        let mapping = self.index.ensure_compiled()?;
        let targets = parse_target_list(targets)?;

        let result = match match_targets(&unit, &targets, mapping) {
            Some((factor, target)) => Convertibility::matched(factor, target),
            None => Convertibility::rejected(),
        };
        debug!(input, convertible = result.convertible, factor = result.factor, "checked unit");
        Ok(result)
    }
}

/// First target matching `unit`, with the accumulated conversion factor
pub fn match_targets(unit: &UnitVector, targets: &TargetList, mapping: &ConversionMapping) -> Option<(f64, usize)> {
    targets.iter()
        .enumerate()
        .find_map(|(i, target)| match_target(unit, target, mapping).map(|factor| (factor, i)))
}

fn match_target(unit: &UnitVector, target: &UnitVector, mapping: &ConversionMapping) -> Option<f64> {
    if unit.len() != target.len() {
        trace!(%unit, %target, "different number of base units");
        return None;
    }

    let mut factor = 1.0;
    for (name, exponent) in unit.iter() {
        let (scale, target_exponent) = match target.get(name) {
            Some(e) => (1.0, e),
            None => match convert_unit(name, target, mapping) {
                Some(found) => found,
                None => {
                    trace!(unit = name, %target, "no convertible unit in target");
                    return None;
                }
            },
        };

        if exponent != target_exponent {
            trace!(unit = name, exponent, target_exponent, "exponent mismatch");
            return None;
        }
        factor *= scale.powi(target_exponent);
    }

    if !factor.is_finite() || factor == 0.0 {
        trace!(%unit, %target, factor, "conversion factor out of range");
        return None;
    }
    Some(factor)
}

/// Scale ratio and exponent of the first target unit in `name`'s class
fn convert_unit(name: &str, target: &UnitVector, mapping: &ConversionMapping) -> Option<(f64, i32)> {
    let entry = mapping.get(name)?;
    target.iter().find_map(|(candidate, exponent)| {
        mapping.get(candidate)
            .filter(|c| c.class == entry.class)
            .map(|c| (entry.scale / c.scale, exponent))
    })
}
