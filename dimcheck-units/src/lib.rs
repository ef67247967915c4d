//! Dimcheck Units - unit algebra for answer checking
//!
//! Parses unit expressions such as `kg m^2/s^2` into ordered base-unit
//! vectors, compiles conversion rule text into dimension classes with
//! relative scales, and decides whether a submitted unit can be expressed
//! in one of a list of accepted target units.
//!
//! Units carry no built-in physics: `N` and `kg m/s^2` are only equal when
//! the target list says so, and `km` and `m` are only related once rules
//! such as `m: k` are in force.

mod vector;
mod parse;
mod prefix;
mod rules;
mod index;
mod checker;
mod presets;
mod validate;

pub use vector::{UnitVector, UnitPower};
pub use parse::{
    parse_unit, parse_target_list, is_unit_name,
    TargetList, UnitParseError, TargetListError, EXCLUDED_SYMBOLS,
};
pub use prefix::{prefix_scale, SI_PREFIXES};
pub use rules::{compile, ConversionMapping, UnitEntry, DimensionClass, RuleError};
pub use index::ConversionIndex;
pub use checker::{match_targets, UnitChecker, Convertibility, CheckError};
pub use presets::{RuleRegistry, RulePreset, PresetError, BUILTIN_RULES, COMMON_SI_RULES, FIRST_SITE_ID};
pub use validate::{validate_part, PartUnits};
