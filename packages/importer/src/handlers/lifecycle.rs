//! Object lifecycle handlers: creation, forward declaration and reference
//! by id.

use serde::Deserialize;

use crate::context::ExecutionContext;
use crate::diagnostics::Severity;
use crate::env::{SCOPE, THIS};
use crate::error::Result;
use crate::handlers::{finish_element, run_sequence, Handler};
use crate::value::{PendingRef, Value};
use crate::xml::Cursor;

fn default_id_attribute() -> String {
    "id".to_string()
}

fn default_ref_attribute() -> String {
    "ref".to_string()
}

fn default_slot_var() -> String {
    "SLOT".to_string()
}

fn default_true() -> bool {
    true
}

/// Creates an object from the current element and binds its id.
///
/// The created object becomes `THIS` and `SCOPE` for the nested handlers.
/// With `join_duplicates`, a repeated id silently reuses the existing object
/// so that later occurrences merge into it; without it, a repeated id is an
/// error and the object created first stays authoritative.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHandler {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    #[serde(default)]
    pub join_duplicates: bool,
    /// Variable holding a forward-declaration slot this object should fill.
    #[serde(default)]
    pub fill_var: Option<String>,
    #[serde(default)]
    pub children: Vec<Handler>,
}

impl CreateHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let entry = cursor.offset();
        let location = cursor.location(&ctx.resource);

        let Some(external_id) = cursor.attribute(&self.id_attribute) else {
            ctx.report(
                Severity::Error,
                location,
                format!(
                    "missing id attribute '{}' on <{}>",
                    self.id_attribute,
                    cursor.tag_name().unwrap_or("?")
                ),
            );
            cursor.skip_subtree();
            return Ok(Value::Null);
        };

        let value = ctx.create_object(&self.type_name, external_id, self.join_duplicates, &location);

        if let Some(var) = &self.fill_var {
            let slot = match ctx.env.get(var) {
                Some(Value::Pending(PendingRef::Slot(slot))) => Some(*slot),
                _ => None,
            };
            match slot {
                Some(slot) => {
                    if let Some(obj) = value.as_object() {
                        ctx.fill_slot(slot, obj, &location);
                    }
                }
                None => ctx.report(
                    Severity::Warning,
                    location.clone(),
                    format!("no forward declaration bound under '{var}'"),
                ),
            }
        }

        let saved_this = ctx.env.bind(THIS, value.clone());
        let saved_scope = ctx.env.bind(SCOPE, value.clone());
        let nested = run_sequence(&self.children, cursor, ctx);
        ctx.env.restore(SCOPE, saved_scope);
        ctx.env.restore(THIS, saved_this);

        finish_element(cursor, entry);
        nested.map(|_| value)
    }
}

/// Declares that an object for the current element's id will arrive later.
///
/// Opens a forward-declaration slot and binds it under `slot_var` so a later
/// creation (a [`CreateHandler`] with `fill_var`) can fill it. The element's
/// id is demanded as well, so `THIS` is the pending object and the usual
/// assignment handlers defer through the resolution protocol.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwardHandler {
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    #[serde(default = "default_slot_var")]
    pub slot_var: String,
    #[serde(default)]
    pub children: Vec<Handler>,
}

impl ForwardHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let entry = cursor.offset();
        let location = cursor.location(&ctx.resource);

        let Some(external_id) = cursor.attribute(&self.id_attribute) else {
            ctx.report(
                Severity::Error,
                location,
                format!(
                    "missing id attribute '{}' on <{}>",
                    self.id_attribute,
                    cursor.tag_name().unwrap_or("?")
                ),
            );
            cursor.skip_subtree();
            return Ok(Value::Null);
        };

        let slot = ctx.identity.new_slot(&location);
        let slot_value = ctx.identity.slot_value(slot);
        let value = ctx.identity.resolve(external_id, &location);

        let saved_slot = ctx.env.bind(&self.slot_var, slot_value);
        let saved_this = ctx.env.bind(THIS, value.clone());
        let saved_scope = ctx.env.bind(SCOPE, value.clone());
        let nested = run_sequence(&self.children, cursor, ctx);
        ctx.env.restore(SCOPE, saved_scope);
        ctx.env.restore(THIS, saved_this);
        ctx.env.restore(&self.slot_var, saved_slot);

        finish_element(cursor, entry);
        nested.map(|_| value)
    }
}

/// Resolves one or more ids from an attribute and imports the nested
/// handlers against each resolved object in turn.
///
/// With `multiple`, the attribute is split on whitespace and the subtree is
/// replayed once per id; the last resolved value is the handler's result.
/// `result_id_attribute` maps an additional id onto the resolved object.
#[derive(Debug, Clone, Deserialize)]
pub struct RefHandler {
    #[serde(default = "default_ref_attribute")]
    pub id_attribute: String,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default = "default_true")]
    pub mandatory: bool,
    #[serde(default)]
    pub result_id_attribute: Option<String>,
    #[serde(default)]
    pub children: Vec<Handler>,
}

impl RefHandler {
    pub fn run<'i>(
        &'i self,
        cursor: &mut Cursor<'i>,
        ctx: &mut ExecutionContext<'i>,
    ) -> Result<Value> {
        let entry = cursor.offset();
        let location = cursor.location(&ctx.resource);

        let Some(raw) = cursor.attribute(&self.id_attribute) else {
            if self.mandatory {
                ctx.report(
                    Severity::Error,
                    location,
                    format!(
                        "missing reference attribute '{}' on <{}>",
                        self.id_attribute,
                        cursor.tag_name().unwrap_or("?")
                    ),
                );
            }
            cursor.skip_subtree();
            return Ok(Value::Null);
        };

        let ids: Vec<&'i str> = if self.multiple {
            raw.split_whitespace().collect()
        } else {
            vec![raw.trim()]
        };
        if ids.is_empty() || ids.iter().all(|id| id.is_empty()) {
            if self.mandatory {
                ctx.report(
                    Severity::Error,
                    location,
                    format!("empty reference attribute '{}'", self.id_attribute),
                );
            }
            cursor.skip_subtree();
            return Ok(Value::Null);
        }

        let node = cursor.current_node();
        let mut last = Value::Null;

        if self.multiple {
            // The element is consumed once from the main stream; each id
            // gets its own replay of the subtree.
            for id in &ids {
                let value = ctx.identity.resolve(id, &location);
                let saved_this = ctx.env.bind(THIS, value.clone());
                let saved_scope = ctx.env.bind(SCOPE, value.clone());
                let nested = match node {
                    Some(node) => {
                        let mut replay = Cursor::subtree(node);
                        run_sequence(&self.children, &mut replay, ctx)
                    }
                    None => Ok(Value::Null),
                };
                ctx.env.restore(SCOPE, saved_scope);
                ctx.env.restore(THIS, saved_this);
                nested?;
                last = value;
            }
            cursor.skip_subtree();
        } else {
            let value = ctx.identity.resolve(ids[0], &location);
            let saved_this = ctx.env.bind(THIS, value.clone());
            let saved_scope = ctx.env.bind(SCOPE, value.clone());
            let nested = run_sequence(&self.children, cursor, ctx);
            ctx.env.restore(SCOPE, saved_scope);
            ctx.env.restore(THIS, saved_this);
            nested?;
            finish_element(cursor, entry);
            last = value;
        }

        if let Some(attr) = &self.result_id_attribute {
            if let Some(alternate) = cursor.attribute(attr) {
                if let Some(primary) = ids.last() {
                    match ctx.assign_alias(alternate, primary, &location) {
                        Ok(()) => {
                            let target = last.clone();
                            ctx.deref(&target, move |ctx, v| {
                                if let Some(obj) = v.as_object() {
                                    ctx.model.assign_alternate_id(obj, alternate);
                                }
                            });
                        }
                        Err(_) => ctx.report(
                            Severity::Error,
                            location.clone(),
                            format!("alternate id '{alternate}' is already bound"),
                        ),
                    }
                }
            }
        }

        Ok(last)
    }
}
