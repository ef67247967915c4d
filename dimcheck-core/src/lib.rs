//! dimcheck Core - Shared error types
//!
//! This crate provides the types shared by every dimcheck crate:
//! - `DimError`: Structured, serializable errors for question authors
//! - `ErrorContext`: Which authoring field and clause an error belongs to
//! - `Severity`: How blocking an error is

mod error;

pub use error::{DimError, ErrorContext, Severity, codes};

#[cfg(test)]
mod tests {
    use super::*;

    mod error_tests {
        use super::*;

        #[test]
        fn test_error_construction() {
            let err = DimError::rule_syntax("too many ':'");
            assert_eq!(err.code, codes::RULE_SYNTAX);
            assert_eq!(err.severity, Severity::Error);
            assert!(err.suggestion.is_some());
        }

        #[test]
        fn test_error_with_field() {
            let err = DimError::unit_syntax("duplicate unit m")
                .in_field("targets")
                .with_clause("m^2 m");
            assert_eq!(err.field(), Some("targets"));
            let ctx = err.context.unwrap();
            assert_eq!(ctx.clause, Some("m^2 m".to_string()));
        }

        #[test]
        fn test_error_with_note() {
            let err = DimError::unknown_prefix("x")
                .with_note("while expanding 'm: k x'");
            let ctx = err.context.unwrap();
            assert_eq!(ctx.clause.as_deref(), Some("x"));
            assert_eq!(ctx.notes, vec!["while expanding 'm: k x'".to_string()]);
        }

        #[test]
        fn test_error_display() {
            let err = DimError::unknown_rule_id(42);
            let display = format!("{}", err);
            assert!(display.contains("UNKNOWN_RULE_ID"));
            assert!(display.contains("42"));
        }

        #[test]
        fn test_error_serializes_without_empty_fields() {
            let err = DimError::new(codes::INTERNAL, "boom");
            let json = serde_json::to_value(&err).unwrap();
            assert_eq!(json["code"], "INTERNAL");
            assert_eq!(json["severity"], "error");
            assert!(json.get("context").is_none());
            assert!(json.get("suggestion").is_none());
        }

        #[test]
        fn test_invalid_preset_is_warning() {
            let err = DimError::invalid_preset("id 3 is reserved");
            assert_eq!(err.severity, Severity::Warning);
        }

        #[test]
        fn test_from_json_error() {
            let bad: Result<Vec<u32>, _> = serde_json::from_str("[1,");
            let err: DimError = bad.unwrap_err().into();
            assert_eq!(err.code, codes::INVALID_PRESET);
        }
    }
}
