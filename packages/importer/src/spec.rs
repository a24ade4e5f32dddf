//! Declarative import specifications.
//!
//! An import spec is a YAML document describing a handler tree. Loading it
//! produces the immutable [`Handler`] composition the engine interprets;
//! [`ImportSpec::validate`] catches configurations that would silently do
//! nothing.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ImportError, Result};
use crate::handlers::Handler;

/// A loaded import specification.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportSpec {
    /// Optional human-readable name, echoed in logs.
    #[serde(default)]
    pub name: Option<String>,
    /// The handler applied to the document element.
    pub root: Handler,
}

impl ImportSpec {
    /// Parse a spec from YAML text.
    ///
    /// # Errors
    /// Returns [`ImportError::SpecParse`] when the YAML does not describe a
    /// handler tree.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let spec: ImportSpec = serde_yaml_ng::from_str(yaml)?;
        Ok(spec)
    }

    /// Load a spec from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml(&yaml).map_err(|err| match err {
            ImportError::SpecParse(inner) => {
                ImportError::InvalidSpec(format!("{}: {inner}", path.display()))
            }
            other => other,
        })
    }

    /// Structural sanity checks beyond what deserialization enforces.
    ///
    /// Returns one message per finding; an empty list means the spec is
    /// usable. Findings are not fatal, they flag handlers that can never
    /// have an effect.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut findings = Vec::new();
        self.root.visit(&mut |handler| match handler {
            Handler::Dispatch(h) => {
                if h.routes.is_empty() && h.default.is_none() {
                    findings.push("dispatch with no routes and no default".to_string());
                }
            }
            Handler::Chain(h) => {
                if h.handlers.is_empty() {
                    findings.push("chain with no handlers".to_string());
                }
            }
            Handler::Conditional(h) => {
                if h.cases.is_empty() && h.otherwise.is_empty() {
                    findings.push("conditional with no cases and no otherwise".to_string());
                }
                for case in &h.cases {
                    if case.when.trim().is_empty() {
                        findings.push("conditional case with an empty predicate".to_string());
                    }
                }
            }
            Handler::Switch(h) => {
                if h.cases.is_empty() && h.default.is_empty() {
                    findings.push(format!(
                        "switch on '{}' with no cases and no default",
                        h.attribute
                    ));
                }
            }
            Handler::Create(h) => {
                if h.type_name.trim().is_empty() {
                    findings.push("create with an empty type".to_string());
                }
            }
            Handler::Link(h) => {
                if h.strategies.is_empty() {
                    findings.push("link with no strategies".to_string());
                }
            }
            _ => {}
        });
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"
name: library
root:
  handler: dispatch
  routes:
    book:
      handler: create
      type: Book
      children:
        - handler: property
          attribute: title
          property: title
        - handler: reference
          attribute: author
          property: author
    author:
      handler: create
      type: Author
"#;

    #[test]
    fn test_load_and_validate_clean_spec() {
        let spec = ImportSpec::from_yaml(SPEC).expect("valid spec");
        assert_eq!(spec.name.as_deref(), Some("library"));
        assert!(spec.validate().is_empty());
    }

    #[test]
    fn test_unknown_handler_kind_is_a_parse_error() {
        let yaml = "root:\n  handler: teleport\n";
        assert!(matches!(
            ImportSpec::from_yaml(yaml),
            Err(ImportError::SpecParse(_))
        ));
    }

    #[test]
    fn test_validate_flags_empty_composites() {
        let yaml = r#"
root:
  handler: chain
  handlers:
    - handler: dispatch
    - handler: conditional
    - handler: switch
      attribute: kind
    - handler: link
      strategies: []
"#;
        let spec = ImportSpec::from_yaml(yaml).expect("parses");
        let findings = spec.validate();
        assert_eq!(findings.len(), 4);
    }
}
