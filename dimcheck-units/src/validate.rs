//! Authoring-time validation of a question part's unit settings

use serde::{Serialize, Deserialize};
use dimcheck_core::DimError;
use crate::parse::parse_target_list;
use crate::presets::RuleRegistry;
use crate::rules::ConversionMapping;

/// Field names reported in `ErrorContext::field`
pub mod fields {
    pub const TARGETS: &str = "targets";
    pub const ADDITIONAL_RULES: &str = "additional_rules";
    pub const RULE_ID: &str = "rule_id";
}

/// Unit configuration of one question part
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartUnits {
    /// Default rule preset id
    #[serde(default)]
    pub rule_id: u32,
    /// Question-specific rules folded over the preset
    #[serde(default)]
    pub additional_rules: String,
    /// `=`-separated accepted units
    #[serde(default)]
    pub targets: String,
}

/// Check every field of `part`; an empty result means it is usable.
///
/// Fields are checked independently so the author sees every problem at
/// once: targets, then additional rules on their own, then the preset.
pub fn validate_part(registry: &RuleRegistry, part: &PartUnits) -> Vec<DimError> {
    let mut errors = Vec::new();

    if let Err(err) = parse_target_list(&part.targets) {
        errors.push(DimError::from(err).in_field(fields::TARGETS));
    }

    if let Err(err) = ConversionMapping::from_rules(&part.additional_rules) {
        errors.push(DimError::from(err).in_field(fields::ADDITIONAL_RULES));
    }

    match registry.get(part.rule_id) {
        None => errors.push(DimError::unknown_rule_id(part.rule_id).in_field(fields::RULE_ID)),
        Some(preset) => {
            if let Err(err) = ConversionMapping::from_rules(&preset.rules) {
                errors.push(DimError::from(err).in_field(fields::RULE_ID));
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::{RulePreset, BUILTIN_RULES};
    use dimcheck_core::codes;

    fn part(rule_id: u32, additional_rules: &str, targets: &str) -> PartUnits {
        PartUnits {
            rule_id,
            additional_rules: additional_rules.to_string(),
            targets: targets.to_string(),
        }
    }

    #[test]
    fn test_valid_part() {
        let errors = validate_part(&BUILTIN_RULES, &part(1, "1 cm = 0.3937 inch", "J = N m"));
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_empty_part_is_valid() {
        assert!(validate_part(&BUILTIN_RULES, &PartUnits::default()).is_empty());
    }

    #[test]
    fn test_bad_targets() {
        let errors = validate_part(&BUILTIN_RULES, &part(0, "", "m = m/s/s"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, codes::TARGET_SYNTAX);
        assert_eq!(errors[0].field(), Some(fields::TARGETS));
    }

    #[test]
    fn test_bad_additional_rules() {
        let errors = validate_part(&BUILTIN_RULES, &part(0, "m: k x", "m"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, codes::UNKNOWN_PREFIX);
        assert_eq!(errors[0].field(), Some(fields::ADDITIONAL_RULES));
    }

    #[test]
    fn test_unknown_rule_id() {
        let errors = validate_part(&BUILTIN_RULES, &part(7, "", "m"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, codes::UNKNOWN_RULE_ID);
        assert_eq!(errors[0].field(), Some(fields::RULE_ID));
    }

    #[test]
    fn test_site_preset() {
        let mut registry = RuleRegistry::new();
        registry.add_site_preset(RulePreset::new(100, "lengths", "m: k")).unwrap();
        assert!(validate_part(&registry, &part(100, "", "km")).is_empty());

        let errors = validate_part(&registry, &part(0, "", ""));
        assert_eq!(errors[0].code, codes::UNKNOWN_RULE_ID);
    }

    #[test]
    fn test_all_errors_reported() {
        let errors = validate_part(&BUILTIN_RULES, &part(99, "a:b:c:d", "m ="));
        let reported: Vec<_> = errors.iter().map(|e| e.field()).collect();
        assert_eq!(
            reported,
            vec![Some(fields::TARGETS), Some(fields::ADDITIONAL_RULES), Some(fields::RULE_ID)]
        );
    }
}
