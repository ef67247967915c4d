//! Unit string parsing - parse expressions like "kg m^2/s^2" or "m s^(-1)"

use thiserror::Error;
use serde::Serialize;
use dimcheck_core::DimError;
use crate::UnitVector;

/// Symbols that may never appear in a base unit name
pub const EXCLUDED_SYMBOLS: &str = "][)(}{><0123456789.,:;`~!@#^&*\\/?|_=+ -";

/// Errors for a malformed unit expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitParseError {
    #[error("only one '/' is allowed in a unit expression")]
    MultipleDivisors,

    #[error("'/' needs units on both sides")]
    MisplacedDivisor,

    #[error("unit \"{0}\" appears on both sides of '/'")]
    SharedUnit(String),

    #[error("duplicate unit \"{0}\"")]
    DuplicateUnit(String),

    #[error("\"{0}\" is not a valid unit name")]
    InvalidName(String),

    #[error("invalid exponent \"{0}\"")]
    InvalidExponent(String),

    #[error("'^' needs a unit name and an exponent in \"{0}\"")]
    DanglingCaret(String),
}

/// Errors for a malformed `=`-separated target list
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetListError {
    #[error("empty target unit \"\"")]
    BlankClause,

    #[error("invalid target unit \"{clause}\": {source}")]
    InvalidClause {
        clause: String,
        source: UnitParseError,
    },
}

impl From<UnitParseError> for DimError {
    fn from(err: UnitParseError) -> Self {
        DimError::unit_syntax(err.to_string())
    }
}

impl From<TargetListError> for DimError {
    fn from(err: TargetListError) -> Self {
        match err {
            TargetListError::BlankClause => DimError::target_syntax("", "empty target unit"),
            TargetListError::InvalidClause { clause, source } => {
                DimError::target_syntax(&clause, source.to_string())
            }
        }
    }
}

/// Ordered list of acceptable, mutually equivalent target units
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TargetList {
    targets: Vec<UnitVector>,
}

impl TargetList {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&UnitVector> {
        self.targets.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitVector> + '_ {
        self.targets.iter()
    }
}

/// Check a base unit name against the excluded symbol set
pub fn is_unit_name(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| c.is_whitespace() || EXCLUDED_SYMBOLS.contains(c))
}

/// Parse a unit string into a UnitVector
///
/// Supported formats:
/// - Blank: "" (dimensionless)
/// - Simple: "m", "kg"
/// - Powers: "m^2", "s^-1", "s^(-1)", "m ^ 2"
/// - Products: "kg m", "kg m^2"
/// - Quotients: "m/s", "kg/m^2", "J/(mol K)"
pub fn parse_unit(expr: &str) -> Result<UnitVector, UnitParseError> {
    parse_expression(expr, true)
}

fn parse_expression(expr: &str, allow_divisor: bool) -> Result<UnitVector, UnitParseError> {
    if expr.trim().is_empty() {
        return Ok(UnitVector::new());
    }

    match expr.find('/') {
        Some(_) if !allow_divisor => Err(UnitParseError::MultipleDivisors),
        Some(pos) => parse_quotient(expr, pos),
        None => parse_product(expr),
    }
}

/// Parse "numerator/denominator", where `pos` is the byte offset of '/'
fn parse_quotient(expr: &str, pos: usize) -> Result<UnitVector, UnitParseError> {
    if pos == 0 || pos + 1 >= expr.len() {
        return Err(UnitParseError::MisplacedDivisor);
    }

    let numerator = expr[..pos].trim();
    let mut denominator = expr[pos + 1..].trim();
    if let Some(inner) = denominator.strip_prefix('(').and_then(|d| d.strip_suffix(')')) {
        denominator = inner;
    }

    let mut quotient = parse_expression(numerator, false)?;
    let divisor = parse_expression(denominator, false)?;
    if quotient.is_empty() || divisor.is_empty() {
        return Err(UnitParseError::MisplacedDivisor);
    }

    for (unit, exponent) in divisor.iter() {
        if !quotient.push(unit, -exponent) {
            return Err(UnitParseError::SharedUnit(unit.to_string()));
        }
    }

    Ok(quotient)
}

/// Parse a space separated product like "kg m^2 s^-2"
fn parse_product(expr: &str) -> Result<UnitVector, UnitParseError> {
    let collapsed = collapse_carets(expr);
    let mut product = UnitVector::new();

    for token in collapsed.split(' ') {
        let (name, exponent) = match token.split_once('^') {
            Some((name, exponent)) => {
                if name.is_empty() || exponent.is_empty() {
                    return Err(UnitParseError::DanglingCaret(token.to_string()));
                }
                (name, Some(exponent))
            }
            None if token.is_empty() => continue,
            None => (token, None),
        };

        if !is_unit_name(name) {
            return Err(UnitParseError::InvalidName(name.to_string()));
        }

        let exponent = match exponent {
            Some(text) => parse_exponent(text)?,
            None => 1,
        };

        if !product.push(name, exponent) {
            return Err(UnitParseError::DuplicateUnit(name.to_string()));
        }
    }

    Ok(product)
}

/// Remove whitespace around every '^' so "m ^ 2" becomes "m^2"
fn collapse_carets(expr: &str) -> String {
    expr.split('^').map(str::trim).collect::<Vec<_>>().join("^")
}

/// Exponent after '^': "2", "-2" or "(-2)". Zero is rejected.
fn parse_exponent(text: &str) -> Result<i32, UnitParseError> {
    let exponent = if let Some(digits) = text.strip_prefix("(-").and_then(|t| t.strip_suffix(')')) {
        parse_digits(digits).map(|n| -n)
    } else if let Some(digits) = text.strip_prefix('-') {
        parse_digits(digits).map(|n| -n)
    } else {
        parse_digits(text)
    };

    exponent
        .filter(|&e| e != 0)
        .ok_or_else(|| UnitParseError::InvalidExponent(text.to_string()))
}

fn parse_digits(digits: &str) -> Option<i32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parse an `=`-separated list of equivalent units, such as "N = kg m/s^2"
///
/// Used when validating question authoring. Blank text is an empty list;
/// a blank or malformed clause fails with the clause text.
pub fn parse_target_list(text: &str) -> Result<TargetList, TargetListError> {
    if text.trim().is_empty() {
        return Ok(TargetList::default());
    }

    let targets = text.split('=')
        .map(|clause| {
            if clause.trim().is_empty() {
                return Err(TargetListError::BlankClause);
            }
            parse_unit(clause).map_err(|source| TargetListError::InvalidClause {
                clause: clause.trim().to_string(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TargetList { targets })
}
