//! Error taxonomy shared by every codec stage.
use thiserror::Error;

pub type Result<T, E = CodecError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CodecError {
    /// A type string did not parse, or a value could not be reduced to any transform.
    #[error("unknown type `{name}`")]
    UnknownType {
        name: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A fragment's shape does not match what its declared type or node kind requires.
    #[error("cannot decode {expected}: found {found}")]
    ValueDecode { expected: String, found: String },

    /// A value handed to the encoder does not inhabit its declared type.
    #[error("value of type `{found}` cannot be encoded as `{declared}`")]
    ValueMismatch { declared: String, found: String },

    #[error("reference to undefined id `{id}`")]
    DanglingReference { id: String },

    #[error("don't know how to deserialize element `{tag}`")]
    UnknownElement { tag: String },

    /// The tree or document nests deeper than [`crate::fragment::MAX_DEPTH`].
    #[error("nesting exceeds {limit} levels")]
    TooDeep { limit: usize },

    /// A defect in the codec itself. Never recovered from.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error(transparent)]
    Schema(#[from] SchemaValidationError),

    #[error("malformed document text at JSON path {path}: {message}")]
    Json { path: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into(), source: None }
    }

    pub fn value_decode(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::ValueDecode { expected: expected.into(), found: found.into() }
    }

    pub fn mismatch(declared: impl ToString, found: impl ToString) -> Self {
        Self::ValueMismatch { declared: declared.to_string(), found: found.to_string() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalInvariant(message.into())
    }

    /// True when the error points at a codec defect rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalInvariant(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer of the offending node.
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: {}", self.message)
    }
}

#[derive(Debug, Clone, Error)]
#[error("document failed schema validation ({} violation(s)){}", .violations.len(), first_line(.violations))]
pub struct SchemaValidationError {
    pub violations: Vec<Violation>,
}

fn first_line(violations: &[Violation]) -> String {
    match violations.first() {
        Some(v) => format!(": {v}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_flagged() {
        assert!(CodecError::internal("stack underflow").is_internal());
        assert!(!CodecError::unknown_type("Foo").is_internal());
        assert!(!CodecError::DanglingReference { id: "p3".into() }.is_internal());
    }

    #[test]
    fn unknown_element_message() {
        let err = CodecError::UnknownElement { tag: "Frobnicate".into() };
        assert_eq!(err.to_string(), "don't know how to deserialize element `Frobnicate`");
    }

    #[test]
    fn schema_error_mentions_first_violation() {
        let err = SchemaValidationError {
            violations: vec![
                Violation { path: "/Add".into(), message: "missing `left`".into() },
                Violation { path: "".into(), message: "other".into() },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("2 violation(s)"));
        assert!(text.contains("/Add: missing `left`"));
    }
}
