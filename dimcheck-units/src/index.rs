//! Cached conversion mapping for a grading session
//!
//! Two rule layers are kept: the default preset (selected by id) and the
//! question's additional rules folded on top of it. Each layer is compiled
//! lazily and only rebuilt after its text changes.

use tracing::{debug, warn};
use crate::rules::{compile, ConversionMapping, RuleError};

/// A compiled layer: the mapping plus the next free class id
#[derive(Debug, Clone, Default, PartialEq)]
struct CompiledRules {
    mapping: ConversionMapping,
    next_class: u32,
}

/// Compile state of one rule layer: `None` until built, dropped on change
#[derive(Debug, Clone, Default, PartialEq)]
struct Layer {
    compiled: Option<CompiledRules>,
}

impl Layer {
    fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    fn invalidate(&mut self) {
        self.compiled = None;
    }

    /// Compile on first use. A failed build leaves the layer uncompiled.
    fn get_or_build<F>(&mut self, build: F) -> Result<&CompiledRules, RuleError>
    where
        F: FnOnce() -> Result<CompiledRules, RuleError>,
    {
        let compiled = match self.compiled.take() {
            Some(compiled) => compiled,
            None => build()?,
        };
        Ok(self.compiled.insert(compiled))
    }
}

/// Fold `rules` over a copy of `base`
fn build_layer(layer: &str, rules: &str, base: &CompiledRules) -> Result<CompiledRules, RuleError> {
    let mut mapping = base.mapping.clone();
    let mut next_class = base.next_class;

    compile(rules, &mut mapping, &mut next_class)
        .inspect_err(|err| warn!(layer, error = %err, "conversion rules failed to compile"))?;

    debug!(layer, units = mapping.len(), classes = next_class, "compiled conversion rules");
    Ok(CompiledRules { mapping, next_class })
}

/// Default and additional rule text with their compiled mappings
#[derive(Debug, Clone, Default)]
pub struct ConversionIndex {
    default_id: u32,
    default_rules: String,
    default_layer: Layer,
    additional_rules: String,
    merged_layer: Layer,
}

impl ConversionIndex {
    /// Empty index: default id 0, no rules, nothing compiled
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_id(&self) -> u32 {
        self.default_id
    }

    pub fn default_rules(&self) -> &str {
        &self.default_rules
    }

    pub fn additional_rules(&self) -> &str {
        &self.additional_rules
    }

    /// True once the merged mapping is compiled and current
    pub fn is_compiled(&self) -> bool {
        self.merged_layer.is_compiled()
    }

    pub fn is_default_compiled(&self) -> bool {
        self.default_layer.is_compiled()
    }

    /// Select the default rules. Re-selecting the current id does nothing;
    /// a new id drops both compiled layers and the additional rules.
    pub fn assign_default(&mut self, id: u32, rules: &str) {
        if id == self.default_id {
            return;
        }
        self.default_id = id;
        self.default_rules = rules.to_string();
        self.default_layer.invalidate();
        self.merged_layer.invalidate();
        self.additional_rules.clear();
    }

    /// Replace the additional rules; only the merged layer is dropped
    pub fn assign_additional(&mut self, rules: &str) {
        self.additional_rules = rules.to_string();
        self.merged_layer.invalidate();
    }

    /// Compile whatever is stale and return the merged mapping
    pub fn ensure_compiled(&mut self) -> Result<&ConversionMapping, RuleError> {
        let default_rules = &self.default_rules;
        let base = self.default_layer
            .get_or_build(|| build_layer("default", default_rules, &CompiledRules::default()))?;

        let additional_rules = &self.additional_rules;
        let merged = self.merged_layer
            .get_or_build(|| build_layer("additional", additional_rules, base))?;

        Ok(&merged.mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let index = ConversionIndex::new();
        assert_eq!(index.default_id(), 0);
        assert_eq!(index.default_rules(), "");
        assert!(!index.is_compiled());
    }

    #[test]
    fn test_compiles_lazily() {
        let mut index = ConversionIndex::new();
        index.assign_default(1, "m: k c");
        assert!(!index.is_default_compiled());

        let mapping = index.ensure_compiled().unwrap();
        assert_eq!(mapping.len(), 3);
        assert!(index.is_default_compiled());
        assert!(index.is_compiled());
    }

    #[test]
    fn test_additional_rules_extend_default() {
        let mut index = ConversionIndex::new();
        index.assign_default(1, "m: k c");
        index.assign_additional("1 cm = 0.3937 inch; s: m");

        let mapping = index.ensure_compiled().unwrap();
        assert!(mapping.same_class("km", "inch"));
        assert!(mapping.contains("ms"));
        // The default layer keeps its own mapping
        assert!(!mapping.same_class("m", "s"));
    }

    #[test]
    fn test_additional_classes_continue_numbering() {
        let mut index = ConversionIndex::new();
        index.assign_default(1, "m: k; s: m");
        index.assign_additional("g: k");

        let mapping = index.ensure_compiled().unwrap();
        let classes = [
            mapping.get("m").unwrap().class,
            mapping.get("s").unwrap().class,
            mapping.get("g").unwrap().class,
        ];
        assert_ne!(classes[0], classes[2]);
        assert_ne!(classes[1], classes[2]);
    }

    #[test]
    fn test_same_default_id_is_noop() {
        let mut index = ConversionIndex::new();
        index.assign_default(1, "m: k c");
        index.assign_additional("1 cm = 0.3937 inch");
        index.ensure_compiled().unwrap();

        index.assign_default(1, "s: m");
        assert_eq!(index.default_rules(), "m: k c");
        assert_eq!(index.additional_rules(), "1 cm = 0.3937 inch");
        assert!(index.is_compiled());
        assert!(index.ensure_compiled().unwrap().contains("inch"));
    }

    #[test]
    fn test_new_default_id_clears_additional() {
        let mut index = ConversionIndex::new();
        index.assign_default(1, "m: k c");
        index.assign_additional("1 cm = 0.3937 inch");
        index.ensure_compiled().unwrap();

        index.assign_default(2, "s: m");
        assert_eq!(index.additional_rules(), "");
        assert!(!index.is_default_compiled());
        assert!(!index.is_compiled());

        let mapping = index.ensure_compiled().unwrap();
        assert!(mapping.contains("ms"));
        assert!(!mapping.contains("inch"));
    }

    #[test]
    fn test_assign_additional_keeps_default_layer() {
        let mut index = ConversionIndex::new();
        index.assign_default(1, "m: k c");
        index.ensure_compiled().unwrap();

        index.assign_additional("g: k");
        assert!(index.is_default_compiled());
        assert!(!index.is_compiled());
    }

    #[test]
    fn test_failed_compile_is_not_installed() {
        let mut index = ConversionIndex::new();
        index.assign_default(1, "m: k c");
        index.assign_additional("g: k; m: q");

        assert_eq!(index.ensure_compiled(), Err(RuleError::UnknownPrefix("q".to_string())));
        assert!(index.is_default_compiled());
        assert!(!index.is_compiled());

        index.assign_additional("g: k");
        let mapping = index.ensure_compiled().unwrap();
        assert!(mapping.contains("kg"));
        assert!(mapping.contains("cm"));
    }

    #[test]
    fn test_layer_builds_once() {
        let mut layer = Layer::default();
        let mut builds = 0;
        for _ in 0..3 {
            layer.get_or_build(|| {
                builds += 1;
                Ok(CompiledRules::default())
            }).unwrap();
        }
        assert_eq!(builds, 1);

        layer.invalidate();
        assert!(layer.get_or_build(|| Err(RuleError::UnknownPrefix("q".to_string()))).is_err());
        assert!(!layer.is_compiled());
    }

    #[test]
    fn test_failed_default_compile_retries() {
        let mut index = ConversionIndex::new();
        index.assign_default(7, "m: nope");
        assert!(index.ensure_compiled().is_err());
        assert!(!index.is_default_compiled());
        assert!(index.ensure_compiled().is_err());
    }
}
