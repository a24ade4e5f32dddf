//! The import engine: one forward pass over a document.

use std::fs;
use std::path::Path;

use roxmltree::Document;

use crate::context::ExecutionContext;
use crate::diagnostics::{Diagnostic, Severity};
use crate::error::Result;
use crate::expr::{DefaultEvaluator, PredicateEvaluator};
use crate::model::ModelGateway;
use crate::spec::ImportSpec;
use crate::xml::Cursor;

/// Outcome summary of one import pass.
#[derive(Debug)]
pub struct ImportReport {
    /// Number of objects created in the model.
    pub objects_created: usize,
    /// Everything the pass had to say, in stream order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ImportReport {
    /// Number of error-level diagnostics.
    #[must_use]
    pub fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Number of warning-level diagnostics.
    #[must_use]
    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Whether the pass completed without error-level diagnostics.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors() == 0
    }
}

/// Drives a handler tree over documents.
///
/// The engine is immutable once built; every import pass gets its own
/// context, so one engine can serve many documents (also concurrently, each
/// pass with its own model borrow).
pub struct ImportEngine {
    spec: ImportSpec,
    evaluator: Box<dyn PredicateEvaluator + Send + Sync>,
}

impl ImportEngine {
    /// Build an engine with the built-in predicate evaluator.
    #[must_use]
    pub fn new(spec: ImportSpec) -> Self {
        Self::with_evaluator(spec, Box::new(DefaultEvaluator))
    }

    /// Build an engine with a custom predicate evaluator.
    #[must_use]
    pub fn with_evaluator(
        spec: ImportSpec,
        evaluator: Box<dyn PredicateEvaluator + Send + Sync>,
    ) -> Self {
        Self { spec, evaluator }
    }

    /// The spec this engine interprets.
    #[must_use]
    pub fn spec(&self) -> &ImportSpec {
        &self.spec
    }

    /// Import one document given as text.
    ///
    /// The document is consumed in a single forward pass. Recoverable
    /// problems land in the report; only a malformed document is an `Err`.
    pub fn import_str(
        &self,
        xml: &str,
        resource: &str,
        model: &mut dyn ModelGateway,
    ) -> Result<ImportReport> {
        let name = self.spec.name.as_deref().unwrap_or("unnamed");
        tracing::info!(spec = name, resource, "Importing document");

        let doc = Document::parse(xml)?;
        let mut ctx = ExecutionContext::new(model, self.evaluator.as_ref(), resource);
        let mut cursor = Cursor::new(&doc);
        self.spec.root.run(&mut cursor, &mut ctx)?;
        ctx.finish();

        let report = ImportReport {
            objects_created: ctx.created,
            diagnostics: std::mem::take(&mut ctx.diagnostics).into_entries(),
        };
        tracing::info!(
            resource,
            objects = report.objects_created,
            errors = report.errors(),
            warnings = report.warnings(),
            "Import finished"
        );
        Ok(report)
    }

    /// Import one document from a file.
    pub fn import_file(&self, path: &Path, model: &mut dyn ModelGateway) -> Result<ImportReport> {
        let xml = fs::read_to_string(path)?;
        let resource = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.import_str(&xml, &resource, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InMemoryModel;
    use crate::value::Value;

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
      children:
        - handler: property
          attribute: name
          property: name
"#;

    fn engine() -> ImportEngine {
        ImportEngine::new(ImportSpec::from_yaml(SPEC).expect("valid spec"))
    }

    #[test]
    fn test_import_in_declaration_order() {
        let xml = r#"<library>
            <author id="a1" name="Le Guin"/>
            <book id="b1" title="The Dispossessed" author="a1"/>
        </library>"#;

        let mut model = InMemoryModel::new();
        let report = engine().import_str(xml, "lib.xml", &mut model).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.objects_created, 2);

        let book = model.find_by_external_id("b1").unwrap();
        let author = model.find_by_external_id("a1").unwrap();
        assert_eq!(model.reference(book, "author"), Some(&[author][..]));
    }

    #[test]
    fn test_forward_reference_is_backpatched() {
        // Same outcome when the referent arrives after the reference.
        let xml = r#"<library>
            <book id="b1" title="The Dispossessed" author="a1"/>
            <author id="a1" name="Le Guin"/>
        </library>"#;

        let mut model = InMemoryModel::new();
        let report = engine().import_str(xml, "lib.xml", &mut model).unwrap();

        assert!(report.is_clean());
        let book = model.find_by_external_id("b1").unwrap();
        let author = model.find_by_external_id("a1").unwrap();
        assert_eq!(model.reference(book, "author"), Some(&[author][..]));
        assert_eq!(
            model.property(author, "name"),
            Some(&Value::Str("Le Guin".into()))
        );
    }

    #[test]
    fn test_dangling_reference_is_reported_once() {
        let xml = r#"<library>
            <book id="b1" title="Orphaned" author="ghost"/>
        </library>"#;

        let mut model = InMemoryModel::new();
        let report = engine().import_str(xml, "lib.xml", &mut model).unwrap();

        assert_eq!(report.errors(), 1);
        assert!(report.diagnostics[0].message.contains("ghost"));
        // The book itself was still imported.
        assert!(model.find_by_external_id("b1").is_some());
    }

    #[test]
    fn test_unknown_elements_do_not_derail() {
        let xml = r#"<library>
            <frontmatter><title>ignored</title></frontmatter>
            <book id="b1" title="Kept"/>
        </library>"#;

        let mut model = InMemoryModel::new();
        let report = engine().import_str(xml, "lib.xml", &mut model).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.objects_created, 1);
    }

    #[test]
    fn test_malformed_document_is_fatal() {
        let mut model = InMemoryModel::new();
        let result = engine().import_str("<library>", "bad.xml", &mut model);
        assert!(result.is_err());
    }
}
