//! Scoped variable environment for one import pass.
//!
//! Bindings follow a strict save/restore discipline: [`Environment::bind`]
//! returns the shadowed binding (or its absence) and the caller restores it
//! on every exit path, so sibling subtrees never observe each other's
//! variables.

use std::collections::HashMap;

use crate::value::Value;

/// Conventional name for the object currently being populated.
pub const THIS: &str = "THIS";

/// Conventional name for the object nested lookups are evaluated against.
///
/// `SCOPE` starts out equal to `THIS` and diverges only when a handler
/// explicitly rebinds it.
pub const SCOPE: &str = "SCOPE";

/// Record of a shadowed binding, handed back to [`Environment::restore`].
#[derive(Debug)]
#[must_use = "the shadowed binding must be restored"]
pub struct Shadowed(Option<Value>);

/// Name-to-value mapping with stack-disciplined shadowing.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
}

impl Environment {
    /// Create an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, returning the shadowed binding.
    pub fn bind(&mut self, name: &str, value: Value) -> Shadowed {
        Shadowed(self.values.insert(name.to_string(), value))
    }

    /// Overwrite `name` inside an already established scope.
    ///
    /// Used by pipeline handlers that thread a result through one binding;
    /// the surrounding `bind`/`restore` pair still reinstates the outer
    /// value.
    pub fn rebind(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Reinstate the binding that was shadowed by a matching [`bind`].
    ///
    /// [`bind`]: Environment::bind
    pub fn restore(&mut self, name: &str, shadowed: Shadowed) {
        match shadowed.0 {
            Some(value) => {
                self.values.insert(name.to_string(), value);
            }
            None => {
                self.values.remove(name);
            }
        }
    }

    /// Current value bound under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Current value bound under `name`, or `Value::Null`.
    #[must_use]
    pub fn get_or_null(&self, name: &str) -> Value {
        self.values.get(name).cloned().unwrap_or(Value::Null)
    }
}
