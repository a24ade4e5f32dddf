//! Linking strategies: attaching an imported value to its context object.
//!
//! A link handler carries an ordered strategy chain. Each strategy either
//! applies and stops the chain, or passes the pair on to the next one; a
//! pair nobody accepts is reported. Strategies only decide once both sides
//! are concrete, so pending values defer through the resolution protocol.

use serde::Deserialize;

use crate::context::ExecutionContext;
use crate::diagnostics::{Location, Severity};
use crate::env::THIS;
use crate::error::Result;
use crate::value::Value;
use crate::xml::Cursor;

fn default_value_var() -> String {
    "RESULT".to_string()
}

fn default_target_var() -> String {
    THIS.to_string()
}

/// One step of a linking chain.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum LinkStrategy {
    /// Set a single-valued reference if it is still unset; otherwise pass
    /// the pair on.
    SetSingle { property: String },
    /// Append to a reference collection. Always applies to object pairs.
    Append { property: String },
    /// Accept the pair and do nothing. Terminal.
    Ignore,
}

type NextStrategy<'i> = Box<dyn FnOnce(&mut ExecutionContext<'i>, Value, Value) + 'i>;

impl LinkStrategy {
    /// Try to attach `value` to `target`; hand the pair to `next` when this
    /// strategy does not apply.
    fn try_link<'i>(
        &'i self,
        ctx: &mut ExecutionContext<'i>,
        target: Value,
        value: Value,
        location: Location,
        next: NextStrategy<'i>,
    ) {
        // Applicability depends on the concrete values.
        if value.is_pending() {
            let pending = value.clone();
            ctx.deref(&pending, move |ctx, resolved| {
                self.try_link(ctx, target, resolved.clone(), location, next);
            });
            return;
        }
        if target.is_pending() {
            let pending = target.clone();
            ctx.deref(&pending, move |ctx, resolved| {
                self.try_link(ctx, resolved.clone(), value, location, next);
            });
            return;
        }

        match self {
            LinkStrategy::SetSingle { property } => {
                match (target.as_object(), value.as_object()) {
                    (Some(obj), Some(other)) => {
                        let unset = ctx
                            .model
                            .reference(obj, property)
                            .is_none_or(<[_]>::is_empty);
                        if unset {
                            ctx.model.set_reference(obj, property, vec![other]);
                        } else {
                            next(ctx, target, value);
                        }
                    }
                    _ => next(ctx, target, value),
                }
            }
            LinkStrategy::Append { property } => match (target.as_object(), value.as_object()) {
                (Some(obj), Some(other)) => ctx.model.append_reference(obj, property, other),
                _ => next(ctx, target, value),
            },
            LinkStrategy::Ignore => {}
        }
    }
}

/// Attaches the value bound under `value_var` to the object bound under
/// `target_var` by running the strategy chain.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkHandler {
    #[serde(default = "default_value_var")]
    pub value_var: String,
    #[serde(default = "default_target_var")]
    pub target_var: String,
    pub strategies: Vec<LinkStrategy>,
}

impl LinkHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let location = cursor.location(&ctx.resource);
        let value = ctx.env.get_or_null(&self.value_var);
        let target = ctx.env.get_or_null(&self.target_var);
        if value.is_null() {
            // Nothing was produced; not every element yields a linkable
            // value, so stay quiet.
            return Ok(Value::Null);
        }
        apply(&self.strategies, 0, ctx, target, value, location);
        Ok(Value::Null)
    }
}

/// Run the strategy at `index`, wiring the rest of the chain up as its
/// fallback.
fn apply<'i>(
    strategies: &'i [LinkStrategy],
    index: usize,
    ctx: &mut ExecutionContext<'i>,
    target: Value,
    value: Value,
    location: Location,
) {
    let Some(strategy) = strategies.get(index) else {
        ctx.report(
            Severity::Warning,
            location,
            "no linking strategy accepted the value",
        );
        return;
    };
    let next_location = location.clone();
    let next: NextStrategy<'i> = Box::new(move |ctx, target, value| {
        apply(strategies, index + 1, ctx, target, value, next_location);
    });
    strategy.try_link(ctx, target, value, location, next);
}
