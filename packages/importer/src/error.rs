//! Error types for the import engine.
//!
//! Only conditions that abort an entire import pass live here. Everything
//! recoverable (unknown tags, duplicate ids, conversion failures) flows
//! through the [`crate::diagnostics::DiagnosticSink`] instead and never
//! surfaces as an `Err`.

use thiserror::Error;

/// Fatal error type for the importer library.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The underlying XML document could not be tokenized.
    #[error("malformed document: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// Import specification could not be deserialized.
    #[error("invalid import spec: {0}")]
    SpecParse(#[from] serde_yaml_ng::Error),

    /// Import specification is structurally unusable.
    #[error("unusable import spec: {0}")]
    InvalidSpec(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for importer operations.
pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_spec_display() {
        let err = ImportError::InvalidSpec("empty dispatch table".to_string());
        assert_eq!(err.to_string(), "unusable import spec: empty dispatch table");
    }

    #[test]
    fn test_xml_parse_is_fatal_variant() {
        let parse_err = roxmltree::Document::parse("<unclosed>").unwrap_err();
        let err = ImportError::from(parse_err);
        assert!(err.to_string().starts_with("malformed document"));
    }
}
