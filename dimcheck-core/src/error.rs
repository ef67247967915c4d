//! Structured errors for question authors
//!
//! Malformed student units never become errors; they are simply graded as
//! not convertible. Everything that *does* surface as an error is an
//! authoring problem (rule text, target units, preset ids) and is reported
//! as a serializable value with a machine-readable code.

use serde::{Deserialize, Serialize};

/// Standard error codes (machine-readable)
pub mod codes {
    pub const UNIT_SYNTAX: &str = "UNIT_SYNTAX";
    pub const TARGET_SYNTAX: &str = "TARGET_SYNTAX";
    pub const RULE_SYNTAX: &str = "RULE_SYNTAX";
    pub const UNKNOWN_PREFIX: &str = "UNKNOWN_PREFIX";
    pub const UNKNOWN_RULE_ID: &str = "UNKNOWN_RULE_ID";
    pub const INVALID_PRESET: &str = "INVALID_PRESET";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Severity level of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Configuration still usable, result may be surprising
    Warning,
    /// The offending field must be fixed
    Error,
    /// Nothing can be checked until this is fixed
    Fatal,
}

/// Context about where an error occurred
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Authoring field the error belongs to (e.g. "targets", "additional_rules")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Offending clause, term or unit text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause: Option<String>,

    /// Propagation notes
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notes: Vec<String>,
}

/// Structured error for author-facing reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimError {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Suggestion for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// Where the error occurred
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    /// Severity level
    pub severity: Severity,
}

impl DimError {
    /// Create a new error
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            suggestion: None,
            context: None,
            severity: Severity::Error,
        }
    }

    /// Builder: add suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Builder: add context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Builder: set the authoring field
    pub fn in_field(mut self, field: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.field = Some(field.into());
        self
    }

    /// Builder: set the offending clause
    pub fn with_clause(mut self, clause: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.clause = Some(clause.into());
        self
    }

    /// Builder: add propagation note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.notes.push(note.into());
        self
    }

    /// Builder: set severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Field name from the context, if any
    pub fn field(&self) -> Option<&str> {
        self.context.as_ref().and_then(|c| c.field.as_deref())
    }

    // ========== Common Error Constructors ==========

    pub fn unit_syntax(details: impl Into<String>) -> Self {
        Self::new(codes::UNIT_SYNTAX, format!("Unit syntax error: {}", details.into()))
            .with_suggestion("Write units as space separated 'name^exponent' tokens with at most one '/'")
    }

    pub fn target_syntax(clause: &str, details: impl Into<String>) -> Self {
        Self::new(codes::TARGET_SYNTAX, format!("Invalid target unit \"{}\": {}", clause, details.into()))
            .with_clause(clause)
            .with_suggestion("Separate equivalent target units with '=', e.g. \"N = kg m/s^2\"")
    }

    pub fn rule_syntax(details: impl Into<String>) -> Self {
        Self::new(codes::RULE_SYNTAX, format!("Rule syntax error: {}", details.into()))
            .with_suggestion("Use 'unit: prefix prefix' or '1 unit = 100 other' clauses separated by ';'")
    }

    pub fn unknown_prefix(prefix: &str) -> Self {
        Self::new(codes::UNKNOWN_PREFIX, format!("\"{}\" is not an SI prefix", prefix))
            .with_clause(prefix)
            .with_suggestion("Known prefixes: y z a f p n u m c d da h k M G T P E Z Y")
    }

    pub fn unknown_rule_id(id: u32) -> Self {
        Self::new(codes::UNKNOWN_RULE_ID, format!("No conversion rule preset with id {}", id))
            .with_suggestion("Use list_rules to see the available presets")
    }

    pub fn invalid_preset(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PRESET, format!("Invalid rule preset: {}", details.into()))
            .with_severity(Severity::Warning)
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, format!("Internal error: {}", details.into()))
            .with_suggestion("This is a bug, please report it")
            .with_severity(Severity::Fatal)
    }
}

impl std::fmt::Display for DimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " (suggestion: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for DimError {}

impl From<serde_json::Error> for DimError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_preset(err.to_string())
    }
}
