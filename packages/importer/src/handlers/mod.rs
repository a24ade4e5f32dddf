//! The handler variant set.
//!
//! A handler is one immutable, config-only interpreter node; a tree of
//! handlers is the compiled import specification. Handlers carry no per-run
//! state, so one tree can serve any number of concurrent imports, each with
//! its own [`ExecutionContext`].
//!
//! Invocation contract: a handler is entered with the cursor on the start
//! event of its element and must leave the cursor on the matching end event.
//! Leaf handlers that only read attributes or text do not move the cursor
//! themselves; the dispatch loop (or the enclosing composite handler)
//! consumes the rest of the subtree for them.

pub mod control;
pub mod dispatch;
pub mod lifecycle;
pub mod link;
pub mod property;

use serde::Deserialize;

use crate::context::ExecutionContext;
use crate::diagnostics::Severity;
use crate::error::Result;
use crate::value::Value;
use crate::xml::Cursor;

pub use control::{ChainHandler, Case, ConditionalHandler, SwitchHandler};
pub use dispatch::DispatchHandler;
pub use lifecycle::{CreateHandler, ForwardHandler, RefHandler};
pub use link::{LinkHandler, LinkStrategy};
pub use property::{
    PropertyAssignHandler, RawXmlAssignHandler, ReferenceAssignHandler, TextAssignHandler,
};

/// One interpreter node of the import specification.
///
/// The variant set is closed; the declarative configuration maps 1:1 onto
/// it by tag name.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "handler", rename_all = "kebab-case")]
pub enum Handler {
    /// Route child elements to handlers by tag name.
    Dispatch(DispatchHandler),
    /// Run handlers in order, threading each result into one binding.
    Chain(ChainHandler),
    /// Run the first case whose predicate holds, waiting on pending
    /// variables through the resolution protocol.
    Conditional(ConditionalHandler),
    /// Route on an attribute value.
    Switch(SwitchHandler),
    /// Create (or join onto) an id-bound object.
    Create(CreateHandler),
    /// Declare that an object will arrive later, via a fillable slot.
    Forward(ForwardHandler),
    /// Resolve one or more ids and import nested handlers against them.
    Ref(RefHandler),
    /// Assign a converted attribute value as a property.
    Property(PropertyAssignHandler),
    /// Assign the element's text content as a property.
    Text(TextAssignHandler),
    /// Assign the element's raw serialized subtree as a property.
    RawXml(RawXmlAssignHandler),
    /// Resolve ids from an attribute and write them as references.
    Reference(ReferenceAssignHandler),
    /// Attach a value to its context object through linking strategies.
    Link(LinkHandler),
    /// Do nothing.
    NoOp,
    /// Discard the current element's whole subtree.
    SkipSubtree,
    /// Record a diagnostic message.
    Log(LogHandler),
}

impl Handler {
    /// Interpret the current element with this handler.
    ///
    /// # Errors
    /// Only a malformed token stream is fatal; everything recoverable goes
    /// into the context's diagnostic sink.
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        match self {
            Handler::Dispatch(h) => h.run(cursor, ctx),
            Handler::Chain(h) => h.run(cursor, ctx),
            Handler::Conditional(h) => h.run(cursor, ctx),
            Handler::Switch(h) => h.run(cursor, ctx),
            Handler::Create(h) => h.run(cursor, ctx),
            Handler::Forward(h) => h.run(cursor, ctx),
            Handler::Ref(h) => h.run(cursor, ctx),
            Handler::Property(h) => h.run(cursor, ctx),
            Handler::Text(h) => h.run(cursor, ctx),
            Handler::RawXml(h) => h.run(cursor, ctx),
            Handler::Reference(h) => h.run(cursor, ctx),
            Handler::Link(h) => h.run(cursor, ctx),
            Handler::NoOp => Ok(Value::Null),
            Handler::SkipSubtree => {
                cursor.skip_subtree();
                Ok(Value::Null)
            }
            Handler::Log(h) => h.run(cursor, ctx),
        }
    }

    /// Depth-first walk over this handler and everything nested in it.
    pub fn visit(&self, visitor: &mut impl FnMut(&Handler)) {
        visitor(self);
        match self {
            Handler::Dispatch(h) => {
                for child in h.routes.values() {
                    child.visit(visitor);
                }
                if let Some(default) = &h.default {
                    default.visit(visitor);
                }
            }
            Handler::Chain(h) => {
                for child in &h.handlers {
                    child.visit(visitor);
                }
            }
            Handler::Conditional(h) => {
                for case in &h.cases {
                    for child in &case.then {
                        child.visit(visitor);
                    }
                }
                for child in &h.otherwise {
                    child.visit(visitor);
                }
            }
            Handler::Switch(h) => {
                for children in h.cases.values() {
                    for child in children {
                        child.visit(visitor);
                    }
                }
                for child in &h.default {
                    child.visit(visitor);
                }
            }
            Handler::Create(h) => {
                for child in &h.children {
                    child.visit(visitor);
                }
            }
            Handler::Forward(h) => {
                for child in &h.children {
                    child.visit(visitor);
                }
            }
            Handler::Ref(h) => {
                for child in &h.children {
                    child.visit(visitor);
                }
            }
            _ => {}
        }
    }

    /// Total number of handler nodes in this tree.
    #[must_use]
    pub fn count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_| count += 1);
        count
    }
}

/// Handler that records a configured diagnostic message.
#[derive(Debug, Clone, Deserialize)]
pub struct LogHandler {
    pub message: String,
    #[serde(default = "default_log_severity")]
    pub severity: Severity,
}

fn default_log_severity() -> Severity {
    Severity::Info
}

impl LogHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let location = cursor.location(&ctx.resource);
        ctx.report(self.severity, location, self.message.clone());
        Ok(Value::Null)
    }
}

/// Run a handler list in order against the same stream, returning the last
/// result.
pub(crate) fn run_sequence<'i>(
    handlers: &'i [Handler],
    cursor: &mut Cursor<'i>,
    ctx: &mut ExecutionContext<'i>,
) -> Result<Value> {
    let mut last = Value::Null;
    for handler in handlers {
        last = handler.run(cursor, ctx)?;
    }
    Ok(last)
}

/// If nothing consumed the element entered at `entry`, consume it now so
/// the handler leaves the cursor on its matching end event.
pub(crate) fn finish_element(cursor: &mut Cursor<'_>, entry: usize) {
    if cursor.offset() == entry {
        cursor.skip_subtree();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tagged_variants() {
        let yaml = r#"
handler: chain
handlers:
  - handler: no-op
  - handler: skip-subtree
  - handler: log
    message: hello
    severity: warning
"#;
        let handler: Handler = serde_yaml_ng::from_str(yaml).expect("valid handler yaml");
        let Handler::Chain(chain) = &handler else {
            unreachable!("expected chain");
        };
        assert_eq!(chain.handlers.len(), 3);
        assert!(matches!(chain.handlers[0], Handler::NoOp));
        assert!(matches!(chain.handlers[1], Handler::SkipSubtree));
        assert_eq!(handler.count(), 4);
    }

    #[test]
    fn test_deserialize_nested_dispatch() {
        let yaml = r#"
handler: dispatch
routes:
  book:
    handler: create
    type: Book
    children:
      - handler: property
        attribute: title
        property: title
  junk:
    handler: skip-subtree
"#;
        let handler: Handler = serde_yaml_ng::from_str(yaml).expect("valid handler yaml");
        assert_eq!(handler.count(), 4);
    }
}
