//! Control-flow handlers: sequencing, attribute switching and predicate
//! conditionals.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::context::ExecutionContext;
use crate::diagnostics::{Location, Severity};
use crate::error::Result;
use crate::handlers::{finish_element, run_sequence, Handler};
use crate::value::Value;
use crate::xml::Cursor;

fn default_chain_var() -> String {
    "RESULT".to_string()
}

/// Runs handlers in order against the same element, threading each step's
/// result through one variable (`RESULT` by default) so later steps can
/// pick it up.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainHandler {
    #[serde(default = "default_chain_var")]
    pub var: String,
    #[serde(default)]
    pub handlers: Vec<Handler>,
}

impl ChainHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let entry = cursor.offset();
        let shadowed = ctx.env.bind(&self.var, Value::Null);

        let mut last = Value::Null;
        let mut outcome = Ok(());
        for handler in &self.handlers {
            match handler.run(cursor, ctx) {
                Ok(value) => {
                    ctx.env.rebind(&self.var, value.clone());
                    last = value;
                }
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        ctx.env.restore(&self.var, shadowed);
        finish_element(cursor, entry);
        outcome.map(|()| last)
    }
}

/// Routes on an attribute of the current element. Falls back to `default`
/// (when non-empty) if the attribute is missing or no case matches.
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchHandler {
    pub attribute: String,
    #[serde(default)]
    pub cases: BTreeMap<String, Vec<Handler>>,
    #[serde(default)]
    pub default: Vec<Handler>,
}

impl SwitchHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let entry = cursor.offset();
        let selected = cursor
            .attribute(&self.attribute)
            .and_then(|value| self.cases.get(value))
            .or(if self.default.is_empty() {
                None
            } else {
                Some(&self.default)
            });

        let result = match selected {
            Some(handlers) => run_sequence(handlers, cursor, ctx),
            None => Ok(Value::Null),
        };
        finish_element(cursor, entry);
        result
    }
}

/// One predicate/body pair of a conditional.
#[derive(Debug, Clone, Deserialize)]
pub struct Case {
    pub when: String,
    #[serde(default)]
    pub then: Vec<Handler>,
}

/// Runs the first case whose predicate holds against the named argument
/// variables.
///
/// If any argument is still pending, evaluation is deferred: the element's
/// subtree is consumed from the main stream now and the winning branch runs
/// later, against a replay of it, once every argument has resolved. The
/// document itself is still read strictly forward.
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionalHandler {
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cases: Vec<Case>,
    #[serde(default)]
    pub otherwise: Vec<Handler>,
}

impl ConditionalHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let entry = cursor.offset();
        let location = cursor.location(&ctx.resource);
        let values: Vec<(String, Value)> = self
            .args
            .iter()
            .map(|name| (name.clone(), ctx.env.get_or_null(name)))
            .collect();

        if values.iter().any(|(_, v)| v.is_pending()) {
            let node = cursor.current_node();
            cursor.skip_subtree();
            ctx.deref_all(
                values,
                Box::new(move |ctx, resolved| {
                    let branch = self.select(ctx, &resolved, &location);
                    if let (Some(handlers), Some(node)) = (branch, node) {
                        let mut replay = Cursor::subtree(node);
                        if let Err(err) = run_sequence(handlers, &mut replay, ctx) {
                            ctx.report(
                                Severity::Error,
                                location,
                                format!("deferred branch failed: {err}"),
                            );
                        }
                    }
                }),
            );
            return Ok(Value::Null);
        }

        let result = match self.select(ctx, &values, &location) {
            Some(handlers) => run_sequence(handlers, cursor, ctx),
            None => Ok(Value::Null),
        };
        finish_element(cursor, entry);
        result
    }

    /// Pick the first case whose predicate holds. Predicate failures are
    /// reported and treated as "does not hold".
    fn select(
        &self,
        ctx: &mut ExecutionContext<'_>,
        values: &[(String, Value)],
        location: &Location,
    ) -> Option<&[Handler]> {
        for case in &self.cases {
            match ctx.evaluator.eval(&case.when, values) {
                Ok(true) => return Some(&case.then),
                Ok(false) => {}
                Err(err) => ctx.report(
                    Severity::Error,
                    location.clone(),
                    format!("predicate '{}': {err}", case.when),
                ),
            }
        }
        if self.otherwise.is_empty() {
            None
        } else {
            Some(&self.otherwise)
        }
    }
}
