//! Per-document execution context.
//!
//! One context exists per import pass and is threaded by reference through
//! every handler invocation. It owns the variable environment, the identity
//! registry and the diagnostic sink, and borrows the model gateway and the
//! predicate evaluator. Contexts are never shared between passes, so
//! concurrent imports of different documents need no locking.

use crate::diagnostics::{DiagnosticSink, Location, Severity};
use crate::env::Environment;
use crate::expr::PredicateEvaluator;
use crate::identity::{AliasOutcome, IdentityRegistry, SlotId};
use crate::model::{ModelGateway, ObjectId};
use crate::value::Value;

/// All per-document mutable state of one import pass.
pub struct ExecutionContext<'i> {
    pub model: &'i mut dyn ModelGateway,
    pub evaluator: &'i dyn PredicateEvaluator,
    pub env: Environment,
    pub identity: IdentityRegistry<'i>,
    pub diagnostics: DiagnosticSink,
    /// Name of the document being imported, used in diagnostic locations.
    pub resource: String,
    /// Number of objects created during this pass.
    pub created: usize,
}

impl<'i> ExecutionContext<'i> {
    /// Create a fresh context for one document.
    pub fn new(
        model: &'i mut dyn ModelGateway,
        evaluator: &'i dyn PredicateEvaluator,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            model,
            evaluator,
            env: Environment::new(),
            identity: IdentityRegistry::new(),
            diagnostics: DiagnosticSink::new(),
            resource: resource.into(),
            created: 0,
        }
    }

    /// Record a diagnostic.
    pub fn report(&mut self, severity: Severity, location: Location, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Error => tracing::warn!(%location, message, "Import diagnostic"),
            _ => tracing::debug!(%location, message, "Import diagnostic"),
        }
        self.diagnostics.report(severity, location, message);
    }

    /// Create an object bound to `external_id`, backpatching waiters.
    ///
    /// With `join_duplicates` an existing object under the same id is reused
    /// silently (upsert). Without it, a repeated id is a reported error and
    /// the previous binding is kept, so subsequent writes still land on the
    /// object created first.
    pub fn create_object(
        &mut self,
        type_name: &str,
        external_id: &str,
        join_duplicates: bool,
        location: &Location,
    ) -> Value {
        if let Some(existing) = self.identity.resolve_existing_only(external_id) {
            if join_duplicates {
                tracing::debug!(external_id, "Joined duplicate onto existing object");
            } else {
                self.report(
                    Severity::Error,
                    location.clone(),
                    format!("duplicate id '{external_id}': keeping the object created first"),
                );
            }
            return Value::Object(existing);
        }

        let obj = self.model.create_object(type_name, external_id);
        self.created += 1;
        let value = Value::Object(obj);
        match self.identity.bind(external_id, obj) {
            Ok(waiters) => {
                for waiter in waiters {
                    waiter(self, &value);
                }
            }
            // Unreachable after the resolve_existing_only check; keep the
            // previous binding anyway.
            Err(existing) => {
                self.report(
                    Severity::Error,
                    location.clone(),
                    format!("duplicate id '{external_id}': keeping the object created first"),
                );
                return Value::Object(existing);
            }
        }
        value
    }

    /// Fill a forward-declaration slot and run its waiters.
    pub fn fill_slot(&mut self, slot: SlotId, obj: ObjectId, location: &Location) {
        match self.identity.fill_slot(slot, obj) {
            Ok(waiters) => {
                let value = Value::Object(obj);
                for waiter in waiters {
                    waiter(self, &value);
                }
            }
            Err(_) => {
                self.report(
                    Severity::Error,
                    location.clone(),
                    "forward declaration filled twice; keeping the first value",
                );
            }
        }
    }

    /// Map an additional external id onto the object behind `primary_id`.
    ///
    /// Anything already waiting on the alternate id is backpatched, either
    /// immediately or once the primary id resolves.
    pub fn assign_alias(
        &mut self,
        alternate_id: &str,
        primary_id: &str,
        location: &Location,
    ) -> std::result::Result<(), ObjectId> {
        match self.identity.alias(alternate_id, primary_id, location)? {
            AliasOutcome::Linked => {}
            AliasOutcome::Completed(obj, waiters) => {
                let value = Value::Object(obj);
                for waiter in waiters {
                    waiter(self, &value);
                }
            }
        }
        Ok(())
    }

    /// Consume a possibly-pending value.
    ///
    /// A concrete value invokes `consumer` synchronously. A pending value
    /// registers it to run, exactly once and in registration order, when the
    /// identity resolves. Consumers may demand further ids themselves.
    pub fn deref(
        &mut self,
        value: &Value,
        consumer: impl FnOnce(&mut ExecutionContext<'i>, &Value) + 'i,
    ) {
        match value {
            Value::Pending(pending) => match self.identity.pending_object(*pending) {
                Some(obj) => consumer(self, &Value::Object(obj)),
                None => self.identity.add_waiter(*pending, Box::new(consumer)),
            },
            concrete => consumer(self, concrete),
        }
    }

    /// Dereference a whole argument list, then hand the concrete values on.
    ///
    /// Used by conditional handlers: predicate evaluation waits until every
    /// referenced variable has resolved.
    pub fn deref_all(
        &mut self,
        mut values: Vec<(String, Value)>,
        consumer: Box<dyn FnOnce(&mut ExecutionContext<'i>, Vec<(String, Value)>) + 'i>,
    ) {
        match values.iter().position(|(_, v)| v.is_pending()) {
            Some(index) => {
                let pending = values[index].1.clone();
                self.deref(&pending, move |ctx, resolved| {
                    values[index].1 = resolved.clone();
                    ctx.deref_all(values, consumer);
                });
            }
            None => consumer(self, values),
        }
    }

    /// End-of-import sweep: report every identity that never resolved.
    pub fn finish(&mut self) {
        for dangling in self.identity.dangling() {
            let location = match &dangling {
                crate::identity::Dangling::Reference { location, .. }
                | crate::identity::Dangling::Slot { location } => location.clone(),
            };
            self.report(Severity::Error, location, dangling.to_string());
        }
    }
}
