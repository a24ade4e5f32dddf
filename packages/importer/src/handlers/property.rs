//! Assignment handlers: attribute, text and raw-XML properties, and
//! id-based references.
//!
//! All of them are leaves: they read from the current element without
//! moving the cursor. Writes against a pending target are deferred through
//! the resolution protocol, so the model gateway only ever sees concrete
//! objects.

use serde::Deserialize;

use crate::context::ExecutionContext;
use crate::convert::ValueFormat;
use crate::diagnostics::{Location, Severity};
use crate::env::THIS;
use crate::error::Result;
use crate::model::ObjectId;
use crate::value::Value;
use crate::xml::Cursor;

/// Write `value` as a property of `target`, deferring while the target is
/// pending.
fn assign_property<'i>(
    ctx: &mut ExecutionContext<'i>,
    target: &Value,
    property: &'i str,
    value: Value,
    location: Location,
) {
    if target.is_null() {
        ctx.report(
            Severity::Warning,
            location,
            format!("no target object for property '{property}'"),
        );
        return;
    }
    ctx.deref(target, move |ctx, resolved| match resolved.as_object() {
        Some(obj) => ctx.model.set_property(obj, property, value),
        None => ctx.report(
            Severity::Error,
            location,
            format!("target for property '{property}' is not an object"),
        ),
    });
}

/// Assigns a converted attribute value as a property of the target object
/// (`THIS` unless `target_var` says otherwise). A missing attribute leaves
/// the property unset; a conversion failure is reported and also leaves it
/// unset.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyAssignHandler {
    pub attribute: String,
    pub property: String,
    #[serde(default)]
    pub format: ValueFormat,
    #[serde(default)]
    pub target_var: Option<String>,
}

impl PropertyAssignHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let Some(raw) = cursor.attribute(&self.attribute) else {
            return Ok(Value::Null);
        };
        let location = cursor.location(&ctx.resource);
        match self.format.convert(raw) {
            Ok(value) => {
                let target = ctx.env.get_or_null(self.target_var.as_deref().unwrap_or(THIS));
                assign_property(ctx, &target, &self.property, value.clone(), location);
                Ok(value)
            }
            Err(err) => {
                ctx.report(
                    Severity::Error,
                    location,
                    format!("attribute '{}': {err}", self.attribute),
                );
                Ok(Value::Null)
            }
        }
    }
}

/// Assigns the element's concatenated text content as a property.
#[derive(Debug, Clone, Deserialize)]
pub struct TextAssignHandler {
    pub property: String,
    #[serde(default)]
    pub format: ValueFormat,
    #[serde(default)]
    pub target_var: Option<String>,
}

impl TextAssignHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let raw = cursor.element_text();
        let location = cursor.location(&ctx.resource);
        match self.format.convert(&raw) {
            Ok(value) => {
                let target = ctx.env.get_or_null(self.target_var.as_deref().unwrap_or(THIS));
                assign_property(ctx, &target, &self.property, value.clone(), location);
                Ok(value)
            }
            Err(err) => {
                ctx.report(
                    Severity::Error,
                    location,
                    format!("text content: {err}"),
                );
                Ok(Value::Null)
            }
        }
    }
}

/// Assigns the element's raw serialized subtree as a string property.
///
/// Used for mixed-content payloads that the model stores verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct RawXmlAssignHandler {
    pub property: String,
    #[serde(default)]
    pub target_var: Option<String>,
}

impl RawXmlAssignHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let location = cursor.location(&ctx.resource);
        let value = Value::Str(cursor.raw_subtree().unwrap_or_default().to_string());
        let target = ctx.env.get_or_null(self.target_var.as_deref().unwrap_or(THIS));
        assign_property(ctx, &target, &self.property, value.clone(), location);
        Ok(value)
    }
}

/// Resolves ids from an attribute and writes them as references of the
/// target object. Both sides may still be pending; the write happens once
/// everything has resolved, preserving the attribute's id order even when
/// the referents arrive out of order. The result is the resolved value, or
/// the list of them with `multiple`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceAssignHandler {
    pub attribute: String,
    pub property: String,
    /// Split the attribute on whitespace and append each id.
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub target_var: Option<String>,
}

impl ReferenceAssignHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let Some(raw) = cursor.attribute(&self.attribute) else {
            return Ok(Value::Null);
        };
        let location = cursor.location(&ctx.resource);
        let target = ctx.env.get_or_null(self.target_var.as_deref().unwrap_or(THIS));
        if target.is_null() {
            ctx.report(
                Severity::Warning,
                location,
                format!("no target object for reference '{}'", self.property),
            );
            return Ok(Value::Null);
        }

        let ids: Vec<&'i str> = if self.multiple {
            raw.split_whitespace().collect()
        } else {
            vec![raw.trim()]
        };
        let multiple = self.multiple;
        let property: &'i str = self.property.as_str();

        // Resolve every id up front; the batched write below sees the ids
        // in attribute order no matter when each referent arrives.
        let mut referents = Vec::with_capacity(ids.len());
        let mut args: Vec<(String, Value)> = Vec::with_capacity(ids.len() + 1);
        args.push((String::new(), target));
        for id in ids {
            let value = ctx.identity.resolve(id, &location);
            referents.push(value.clone());
            args.push((id.to_string(), value));
        }

        let write_location = location.clone();
        ctx.deref_all(
            args,
            Box::new(move |ctx, resolved| {
                let mut values = resolved.into_iter().map(|(_, v)| v);
                let target = values.next().unwrap_or_default();
                let objects: Option<Vec<ObjectId>> = values.map(|v| v.as_object()).collect();
                match (target.as_object(), objects) {
                    (Some(obj), Some(others)) => {
                        if multiple {
                            for other in others {
                                ctx.model.append_reference(obj, property, other);
                            }
                        } else if let Some(first) = others.first() {
                            ctx.model.set_reference(obj, property, vec![*first]);
                        }
                    }
                    _ => ctx.report(
                        Severity::Error,
                        write_location,
                        format!("reference '{property}' did not resolve to objects"),
                    ),
                }
            }),
        );

        if multiple {
            Ok(Value::List(referents))
        } else {
            Ok(referents.into_iter().next().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Location;
    use crate::expr::DefaultEvaluator;
    use crate::model::InMemoryModel;
    use roxmltree::Document;

    fn loc() -> Location {
        Location::new("test.xml", 1, 1)
    }

    #[test]
    fn test_property_converts_and_writes() {
        let doc = Document::parse(r#"<item pages="250"/>"#).unwrap();
        let mut model = InMemoryModel::new();
        let evaluator = DefaultEvaluator;
        let handler = PropertyAssignHandler {
            attribute: "pages".to_string(),
            property: "pages".to_string(),
            format: ValueFormat::Integer,
            target_var: None,
        };
        let mut ctx = ExecutionContext::new(&mut model, &evaluator, "test.xml");
        let this = ctx.create_object("Item", "i", false, &loc());
        let _shadowed = ctx.env.bind(THIS, this.clone());

        let mut cursor = Cursor::new(&doc);
        handler.run(&mut cursor, &mut ctx).unwrap();

        let obj = this.as_object().expect("object");
        assert_eq!(ctx.model.property(obj, "pages"), Some(&Value::Int(250)));
    }

    #[test]
    fn test_property_missing_attribute_is_silent() {
        let doc = Document::parse(r#"<item/>"#).unwrap();
        let mut model = InMemoryModel::new();
        let evaluator = DefaultEvaluator;
        let handler = PropertyAssignHandler {
            attribute: "pages".to_string(),
            property: "pages".to_string(),
            format: ValueFormat::Integer,
            target_var: None,
        };
        let mut ctx = ExecutionContext::new(&mut model, &evaluator, "test.xml");

        let mut cursor = Cursor::new(&doc);
        let result = handler.run(&mut cursor, &mut ctx).unwrap();
        assert_eq!(result, Value::Null);
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn test_property_conversion_failure_leaves_unset() {
        let doc = Document::parse(r#"<item pages="many"/>"#).unwrap();
        let mut model = InMemoryModel::new();
        let evaluator = DefaultEvaluator;
        let handler = PropertyAssignHandler {
            attribute: "pages".to_string(),
            property: "pages".to_string(),
            format: ValueFormat::Integer,
            target_var: None,
        };
        let mut ctx = ExecutionContext::new(&mut model, &evaluator, "test.xml");
        let this = ctx.create_object("Item", "i", false, &loc());
        let _shadowed = ctx.env.bind(THIS, this.clone());

        let mut cursor = Cursor::new(&doc);
        handler.run(&mut cursor, &mut ctx).unwrap();

        let obj = this.as_object().expect("object");
        assert_eq!(ctx.model.property(obj, "pages"), None);
        assert_eq!(ctx.diagnostics.count(Severity::Error), 1);
    }

    #[test]
    fn test_text_assign() {
        let doc = Document::parse(r#"<title> The <i>Left</i> Hand </title>"#).unwrap();
        let mut model = InMemoryModel::new();
        let evaluator = DefaultEvaluator;
        let handler = TextAssignHandler {
            property: "title".to_string(),
            format: ValueFormat::Text,
            target_var: None,
        };
        let mut ctx = ExecutionContext::new(&mut model, &evaluator, "test.xml");
        let this = ctx.create_object("Book", "b", false, &loc());
        let _shadowed = ctx.env.bind(THIS, this.clone());

        let mut cursor = Cursor::new(&doc);
        handler.run(&mut cursor, &mut ctx).unwrap();

        let obj = this.as_object().expect("object");
        assert_eq!(
            ctx.model.property(obj, "title"),
            Some(&Value::Str("The Left Hand".into()))
        );
    }

    #[test]
    fn test_raw_xml_assign_keeps_markup() {
        let doc = Document::parse(r#"<root><body>keep <b>this</b></body></root>"#).unwrap();
        let mut model = InMemoryModel::new();
        let evaluator = DefaultEvaluator;
        let handler = RawXmlAssignHandler {
            property: "body".to_string(),
            target_var: None,
        };
        let mut ctx = ExecutionContext::new(&mut model, &evaluator, "test.xml");
        let this = ctx.create_object("Doc", "d", false, &loc());
        let _shadowed = ctx.env.bind(THIS, this.clone());

        let mut cursor = Cursor::new(&doc);
        cursor.advance();
        handler.run(&mut cursor, &mut ctx).unwrap();

        let obj = this.as_object().expect("object");
        assert_eq!(
            ctx.model.property(obj, "body"),
            Some(&Value::Str("<body>keep <b>this</b></body>".into()))
        );
    }

    #[test]
    fn test_reference_defers_until_referent_exists() {
        let doc = Document::parse(r#"<item author="a1"/>"#).unwrap();
        let mut model = InMemoryModel::new();
        let evaluator = DefaultEvaluator;
        let handler = ReferenceAssignHandler {
            attribute: "author".to_string(),
            property: "author".to_string(),
            multiple: false,
            target_var: None,
        };
        let mut ctx = ExecutionContext::new(&mut model, &evaluator, "test.xml");
        let this = ctx.create_object("Book", "b", false, &loc());
        let _shadowed = ctx.env.bind(THIS, this.clone());

        let mut cursor = Cursor::new(&doc);
        handler.run(&mut cursor, &mut ctx).unwrap();

        let obj = this.as_object().expect("object");
        assert_eq!(ctx.model.reference(obj, "author"), None);

        let author = ctx.create_object("Author", "a1", false, &loc());
        let author_obj = author.as_object().expect("object");
        assert_eq!(
            ctx.model.reference(obj, "author"),
            Some(&[author_obj][..])
        );
    }

    #[test]
    fn test_reference_multiple_appends_in_order() {
        let doc = Document::parse(r#"<item authors="a1 a2"/>"#).unwrap();
        let mut model = InMemoryModel::new();
        let evaluator = DefaultEvaluator;
        let handler = ReferenceAssignHandler {
            attribute: "authors".to_string(),
            property: "authors".to_string(),
            multiple: true,
            target_var: None,
        };
        let mut ctx = ExecutionContext::new(&mut model, &evaluator, "test.xml");
        let a1 = ctx.create_object("Author", "a1", false, &loc());
        let a2 = ctx.create_object("Author", "a2", false, &loc());
        let this = ctx.create_object("Book", "b", false, &loc());
        let _shadowed = ctx.env.bind(THIS, this.clone());

        let mut cursor = Cursor::new(&doc);
        let result = handler.run(&mut cursor, &mut ctx).unwrap();
        assert_eq!(result, Value::List(vec![a1.clone(), a2.clone()]));

        let obj = this.as_object().expect("object");
        let expected = [
            a1.as_object().expect("object"),
            a2.as_object().expect("object"),
        ];
        assert_eq!(ctx.model.reference(obj, "authors"), Some(&expected[..]));
    }

    #[test]
    fn test_reference_multiple_keeps_attribute_order_for_late_referents() {
        let doc = Document::parse(r#"<item authors="a1 a2"/>"#).unwrap();
        let mut model = InMemoryModel::new();
        let evaluator = DefaultEvaluator;
        let handler = ReferenceAssignHandler {
            attribute: "authors".to_string(),
            property: "authors".to_string(),
            multiple: true,
            target_var: None,
        };
        let mut ctx = ExecutionContext::new(&mut model, &evaluator, "test.xml");
        let this = ctx.create_object("Book", "b", false, &loc());
        let _shadowed = ctx.env.bind(THIS, this.clone());

        let mut cursor = Cursor::new(&doc);
        handler.run(&mut cursor, &mut ctx).unwrap();

        // Referents arrive in the opposite order of the attribute.
        let a2 = ctx.create_object("Author", "a2", false, &loc());
        let a1 = ctx.create_object("Author", "a1", false, &loc());

        let obj = this.as_object().expect("object");
        let expected = [
            a1.as_object().expect("object"),
            a2.as_object().expect("object"),
        ];
        assert_eq!(ctx.model.reference(obj, "authors"), Some(&expected[..]));
    }
}
