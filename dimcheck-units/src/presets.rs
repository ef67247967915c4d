//! Conversion rule presets - default rule texts selectable by id
//!
//! Ids 0 to 99 are reserved for built-in presets. Sites can add their own
//! presets from a JSON file, using ids from 100 upwards.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;
use serde::{Serialize, Deserialize};
use dimcheck_core::DimError;
use crate::rules::{ConversionMapping, RuleError};

/// First id available to site presets
pub const FIRST_SITE_ID: u32 = 100;

/// Common SI units with their usual prefixes
pub const COMMON_SI_RULES: &str = "
m: k c d m u n p f;
s: m u n p f;
g: k m u n p f;
mol: m u n p;
N: k m u n p f;
A: m u n p f;
J: k M G T P m u n p f;
J = 6.24150947e+18 eV;
eV: k M G T P m u;
W: k M G T P m u n p f;
Pa: k M G T P;
Hz: k M G T P E;
C: k m u n p f;
V: k M G m u n p f;
ohm: m k M G T P;
F: m u n p f;
T: k m u n p;
H: k m u n p;
";

/// Global registry of built-in presets
pub static BUILTIN_RULES: LazyLock<RuleRegistry> = LazyLock::new(RuleRegistry::builtin);

/// A named block of rule text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePreset {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub rules: String,
}

impl RulePreset {
    pub fn new(id: u32, name: &str, rules: &str) -> Self {
        RulePreset {
            id,
            name: name.to_string(),
            rules: rules.to_string(),
        }
    }
}

/// Errors while registering site presets
#[derive(Debug, Error)]
pub enum PresetError {
    #[error("preset id {0} is reserved for built-in rules (site presets start at 100)")]
    ReservedId(u32),

    #[error("duplicate preset id {0}")]
    DuplicateId(u32),

    #[error("preset {id} has invalid rules: {source}")]
    InvalidRules { id: u32, source: RuleError },

    #[error("malformed preset file: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<PresetError> for DimError {
    fn from(err: PresetError) -> Self {
        let message = err.to_string();
        match err {
            PresetError::InvalidRules { source, .. } => DimError::from(source).with_note(message),
            _ => DimError::invalid_preset(message),
        }
    }
}

/// Registry of rule presets keyed by id
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    presets: BTreeMap<u32, RulePreset>,
}

impl RuleRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in presets only
    pub fn builtin() -> Self {
        let mut registry = RuleRegistry::new();
        registry.register(RulePreset::new(0, "None", ""));
        registry.register(RulePreset::new(1, "Common SI units", COMMON_SI_RULES));
        registry
    }

    /// Get a preset by id
    pub fn get(&self, id: u32) -> Option<&RulePreset> {
        self.presets.get(&id)
    }

    /// All presets, ordered by id
    pub fn presets(&self) -> impl Iterator<Item = &RulePreset> + '_ {
        self.presets.values()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Add a site preset after checking its id and compiling its rules
    pub fn add_site_preset(&mut self, preset: RulePreset) -> Result<(), PresetError> {
        if preset.id < FIRST_SITE_ID {
            return Err(PresetError::ReservedId(preset.id));
        }
        if self.presets.contains_key(&preset.id) {
            return Err(PresetError::DuplicateId(preset.id));
        }
        ConversionMapping::from_rules(&preset.rules)
            .map_err(|source| PresetError::InvalidRules { id: preset.id, source })?;

        self.register(preset);
        Ok(())
    }

    /// Add every preset of a JSON array like `[{"id": 100, "name": "...", "rules": "..."}]`
    pub fn with_site_presets_json(mut self, json: &str) -> Result<Self, PresetError> {
        let presets: Vec<RulePreset> = serde_json::from_str(json)?;
        for preset in presets {
            self.add_site_preset(preset)?;
        }
        Ok(self)
    }

    fn register(&mut self, preset: RulePreset) {
        self.presets.insert(preset.id, preset);
    }
}
