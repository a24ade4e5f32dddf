//! Tag-based routing of child elements.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::context::ExecutionContext;
use crate::diagnostics::Severity;
use crate::error::Result;
use crate::handlers::{finish_element, Handler};
use crate::value::Value;
use crate::xml::{Cursor, Event};

/// Routes each child element of the current element to a handler by tag
/// name. Children without a route fall back to `default`, or are skipped
/// silently so unknown vocabulary never derails an import.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchHandler {
    #[serde(default)]
    pub routes: BTreeMap<String, Handler>,
    #[serde(default)]
    pub default: Option<Box<Handler>>,
}

impl DispatchHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let Event::Start(enclosing) = cursor.current() else {
            return Ok(Value::Null);
        };
        cursor.advance();

        loop {
            match cursor.current() {
                Event::Start(child) => {
                    let tag = child.tag_name().name();
                    let entry = cursor.offset();
                    match self.routes.get(tag) {
                        Some(handler) => {
                            handler.run(cursor, ctx)?;
                        }
                        None => match &self.default {
                            Some(handler) => {
                                handler.run(cursor, ctx)?;
                            }
                            None => {
                                tracing::debug!(tag, "No route for element, skipping subtree");
                            }
                        },
                    }
                    finish_element(cursor, entry);

                    // A handler that consumed part of the subtree left the
                    // stream mispositioned. Recover by resynchronizing
                    // forward to the child's end tag.
                    if !cursor.at_end_of(child) {
                        let location = cursor.location(&ctx.resource);
                        ctx.report(
                            Severity::Error,
                            location,
                            format!("handler for <{tag}> left the element unfinished; resynchronizing"),
                        );
                        while !cursor.at_end_of(child) && !cursor.is_eof() {
                            cursor.advance();
                        }
                    }
                    cursor.advance();
                }
                Event::End(node) if node.id() == enclosing.id() => break,
                Event::End(node) => {
                    // Only reachable when resynchronization overshot.
                    let location = cursor.location(&ctx.resource);
                    ctx.report(
                        Severity::Error,
                        location,
                        format!("unexpected end of <{}>", node.tag_name().name()),
                    );
                    break;
                }
                Event::Eof => break,
            }
        }
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::DefaultEvaluator;
    use crate::handlers::lifecycle::CreateHandler;
    use crate::model::InMemoryModel;
    use roxmltree::Document;

    fn dispatch_to_create(tag: &str, type_name: &str) -> DispatchHandler {
        let mut routes = BTreeMap::new();
        routes.insert(
            tag.to_string(),
            Handler::Create(CreateHandler {
                type_name: type_name.to_string(),
                id_attribute: "id".to_string(),
                join_duplicates: false,
                fill_var: None,
                children: Vec::new(),
            }),
        );
        DispatchHandler {
            routes,
            default: None,
        }
    }

    #[test]
    fn test_routes_by_tag_and_skips_unknown() {
        let doc =
            Document::parse(r#"<root><item id="a"/><noise><deep/></noise><item id="b"/></root>"#)
                .unwrap();
        let mut model = InMemoryModel::new();
        let evaluator = DefaultEvaluator;
        let handler = dispatch_to_create("item", "Item");
        let mut ctx = ExecutionContext::new(&mut model, &evaluator, "test.xml");

        let mut cursor = Cursor::new(&doc);
        handler.run(&mut cursor, &mut ctx).unwrap();

        assert_eq!(ctx.created, 2);
        assert!(ctx.diagnostics.is_empty());
        let root = cursor.current_node().unwrap();
        assert_eq!(root.tag_name().name(), "root");
    }

    #[test]
    fn test_default_route_catches_the_rest() {
        let doc = Document::parse(r#"<root><x id="1"/><y id="2"/></root>"#).unwrap();
        let mut model = InMemoryModel::new();
        let evaluator = DefaultEvaluator;
        let handler = DispatchHandler {
            routes: BTreeMap::new(),
            default: Some(Box::new(Handler::Create(CreateHandler {
                type_name: "Any".to_string(),
                id_attribute: "id".to_string(),
                join_duplicates: false,
                fill_var: None,
                children: Vec::new(),
            }))),
        };
        let mut ctx = ExecutionContext::new(&mut model, &evaluator, "test.xml");

        let mut cursor = Cursor::new(&doc);
        handler.run(&mut cursor, &mut ctx).unwrap();
        assert_eq!(ctx.created, 2);
    }

    #[test]
    fn test_leaf_route_consumes_nothing_itself() {
        // A no-op route leaves the cursor untouched; the loop must still
        // consume the child and carry on without a diagnostic.
        let doc = Document::parse(r#"<root><skipme><inner/></skipme><item id="a"/></root>"#)
            .unwrap();
        let mut model = InMemoryModel::new();
        let evaluator = DefaultEvaluator;
        let mut handler = dispatch_to_create("item", "Item");
        handler
            .routes
            .insert("skipme".to_string(), Handler::NoOp);
        let mut ctx = ExecutionContext::new(&mut model, &evaluator, "test.xml");

        let mut cursor = Cursor::new(&doc);
        handler.run(&mut cursor, &mut ctx).unwrap();

        assert_eq!(ctx.created, 1);
        assert!(ctx.diagnostics.is_empty());
    }
}
