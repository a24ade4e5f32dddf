//! Identity registry and forward-reference resolution protocol.
//!
//! The registry is the single owner of object identity. External ids map to
//! either a concrete object or a [`ResolutionId`] naming a pending
//! resolution; all other parts of the engine refer to identities through
//! ids and indices, never through owning pointers.
//!
//! A resolution is created the first time an id is demanded before any
//! object carries it. Continuations registered against a resolution run in
//! registration order, exactly once, when the id is eventually bound
//! (backpatching). Separately, forward-declaration slots provide a second
//! channel for "a value will arrive here later" that is not keyed by
//! external id. Anything still pending at document end is a dangling
//! reference.
//!
//! The registry itself never invokes continuations: binding and filling
//! return the drained waiter list so the execution context can run them
//! once the registry borrow has ended. That is what lets a continuation
//! demand further ids while it runs.

use std::collections::HashMap;
use std::fmt;

use crate::context::ExecutionContext;
use crate::diagnostics::Location;
use crate::model::ObjectId;
use crate::value::{PendingRef, Value};

/// Index of a pending resolution inside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolutionId(usize);

impl ResolutionId {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }
}

/// Index of a forward-declaration slot inside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

impl SlotId {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }
}

/// Deferred consumer of a value that was pending when it was demanded.
pub type Continuation<'i> = Box<dyn FnOnce(&mut ExecutionContext<'i>, &Value) + 'i>;

/// An identity that is still unresolved at the end of the pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Dangling {
    /// An id was demanded but no object was ever created under it.
    Reference { external_id: String, location: Location },
    /// A forward-declaration slot was never filled.
    Slot { location: Location },
}

impl fmt::Display for Dangling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dangling::Reference { external_id, .. } => {
                write!(f, "dangling reference: id '{external_id}' was never created")
            }
            Dangling::Slot { .. } => {
                write!(f, "forward declaration was never filled")
            }
        }
    }
}

/// Successful outcome of an alias assignment.
pub enum AliasOutcome<'i> {
    /// The alternate id now tracks the primary; nothing is ready to run.
    Linked,
    /// The alternate id had an open resolution and the primary was already
    /// concrete; the caller runs the drained waiters with the object.
    Completed(ObjectId, Vec<Continuation<'i>>),
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Object(ObjectId),
    Pending(ResolutionId),
}

struct ResolutionState<'i> {
    external_id: String,
    resolved: Option<ObjectId>,
    waiters: Vec<Continuation<'i>>,
    first_demand: Location,
}

struct SlotState<'i> {
    filled: Option<ObjectId>,
    waiters: Vec<Continuation<'i>>,
    declared_at: Location,
}

/// Registry mapping external ids to objects or pending resolutions.
#[derive(Default)]
pub struct IdentityRegistry<'i> {
    entries: HashMap<String, Entry>,
    resolutions: Vec<ResolutionState<'i>>,
    slots: Vec<SlotState<'i>>,
}

impl<'i> IdentityRegistry<'i> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            resolutions: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Resolve an id to a concrete object or a pending token.
    ///
    /// Demanding an unknown id creates a resolution for it; the caller is
    /// responsible for consuming a pending result through
    /// [`ExecutionContext::deref`].
    pub fn resolve(&mut self, external_id: &str, location: &Location) -> Value {
        if let Some(entry) = self.entries.get(external_id) {
            return match *entry {
                Entry::Object(obj) => Value::Object(obj),
                Entry::Pending(rid) => match self.resolutions[rid.0].resolved {
                    Some(obj) => Value::Object(obj),
                    None => Value::Pending(PendingRef::Id(rid)),
                },
            };
        }

        let rid = ResolutionId(self.resolutions.len());
        self.resolutions.push(ResolutionState {
            external_id: external_id.to_string(),
            resolved: None,
            waiters: Vec::new(),
            first_demand: location.clone(),
        });
        self.entries
            .insert(external_id.to_string(), Entry::Pending(rid));
        tracing::debug!(external_id, "Id demanded before creation, resolution opened");
        Value::Pending(PendingRef::Id(rid))
    }

    /// Return the concrete object for an id only if one already exists.
    ///
    /// Never creates a resolution; used for test-and-reuse during
    /// deduplication.
    #[must_use]
    pub fn resolve_existing_only(&self, external_id: &str) -> Option<ObjectId> {
        match self.entries.get(external_id)? {
            Entry::Object(obj) => Some(*obj),
            Entry::Pending(rid) => self.resolutions[rid.0].resolved,
        }
    }

    /// Bind an id to a concrete object, backpatching any open resolution.
    ///
    /// Returns the drained waiter list for the caller to invoke. If the id
    /// is already bound to a concrete object the previous binding is kept
    /// and the existing object is returned as the error value.
    pub fn bind(
        &mut self,
        external_id: &str,
        obj: ObjectId,
    ) -> Result<Vec<Continuation<'i>>, ObjectId> {
        match self.entries.get(external_id) {
            Some(Entry::Object(existing)) => Err(*existing),
            Some(Entry::Pending(rid)) => {
                let rid = *rid;
                let state = &mut self.resolutions[rid.0];
                if let Some(existing) = state.resolved {
                    return Err(existing);
                }
                state.resolved = Some(obj);
                tracing::debug!(external_id, waiters = state.waiters.len(), "Backpatched id");
                Ok(std::mem::take(&mut state.waiters))
            }
            None => {
                self.entries
                    .insert(external_id.to_string(), Entry::Object(obj));
                Ok(Vec::new())
            }
        }
    }

    /// Map an additional id onto whatever `primary` currently denotes.
    ///
    /// If the alternate id is itself already bound, the existing object is
    /// returned as the error value and nothing changes. An open resolution
    /// under the alternate id is completed through the primary instead of
    /// being overwritten, so waiters registered before the alias keep the
    /// exactly-once guarantee.
    pub fn alias(
        &mut self,
        alternate_id: &str,
        primary_id: &str,
        location: &Location,
    ) -> Result<AliasOutcome<'i>, ObjectId> {
        if let Some(existing) = self.resolve_existing_only(alternate_id) {
            return Err(existing);
        }
        let open_alternate = match self.entries.get(alternate_id) {
            Some(Entry::Pending(rid)) => Some(*rid),
            _ => None,
        };
        // Demanding the primary id guarantees an entry to share.
        let primary = self.resolve(primary_id, location);

        let Some(rid_alt) = open_alternate else {
            if let Some(entry) = self.entries.get(primary_id).copied() {
                self.entries.insert(alternate_id.to_string(), entry);
            }
            return Ok(AliasOutcome::Linked);
        };

        match primary {
            Value::Object(obj) => {
                let waiters = self.complete(rid_alt, obj);
                Ok(AliasOutcome::Completed(obj, waiters))
            }
            Value::Pending(pending) => {
                // Complete the alternate's resolution, draining its
                // waiters, once the primary is backpatched.
                self.add_waiter(
                    pending,
                    Box::new(move |ctx, value| {
                        if let Some(obj) = value.as_object() {
                            let waiters = ctx.identity.complete(rid_alt, obj);
                            let value = value.clone();
                            for waiter in waiters {
                                waiter(ctx, &value);
                            }
                        }
                    }),
                );
                Ok(AliasOutcome::Linked)
            }
            // resolve only yields concrete objects or pending tokens.
            _ => Ok(AliasOutcome::Linked),
        }
    }

    /// Resolve an open resolution, draining its waiters.
    fn complete(&mut self, rid: ResolutionId, obj: ObjectId) -> Vec<Continuation<'i>> {
        let state = &mut self.resolutions[rid.0];
        if state.resolved.is_some() {
            return Vec::new();
        }
        state.resolved = Some(obj);
        std::mem::take(&mut state.waiters)
    }

    /// Allocate a fresh forward-declaration slot.
    pub fn new_slot(&mut self, location: &Location) -> SlotId {
        let sid = SlotId(self.slots.len());
        self.slots.push(SlotState {
            filled: None,
            waiters: Vec::new(),
            declared_at: location.clone(),
        });
        sid
    }

    /// The value currently denoted by a slot.
    #[must_use]
    pub fn slot_value(&self, slot: SlotId) -> Value {
        match self.slots[slot.0].filled {
            Some(obj) => Value::Object(obj),
            None => Value::Pending(PendingRef::Slot(slot)),
        }
    }

    /// Fill a forward-declaration slot, draining its waiters.
    ///
    /// Filling an already-filled slot returns the previous object as the
    /// error value; the previous fill is kept.
    pub fn fill_slot(
        &mut self,
        slot: SlotId,
        obj: ObjectId,
    ) -> Result<Vec<Continuation<'i>>, ObjectId> {
        let state = &mut self.slots[slot.0];
        if let Some(existing) = state.filled {
            return Err(existing);
        }
        state.filled = Some(obj);
        Ok(std::mem::take(&mut state.waiters))
    }

    /// The concrete object behind a pending token, if resolution happened.
    #[must_use]
    pub fn pending_object(&self, pending: PendingRef) -> Option<ObjectId> {
        match pending {
            PendingRef::Id(rid) => self.resolutions[rid.0].resolved,
            PendingRef::Slot(sid) => self.slots[sid.0].filled,
        }
    }

    /// Register a continuation to run when the pending token resolves.
    pub fn add_waiter(&mut self, pending: PendingRef, continuation: Continuation<'i>) {
        match pending {
            PendingRef::Id(rid) => self.resolutions[rid.0].waiters.push(continuation),
            PendingRef::Slot(sid) => self.slots[sid.0].waiters.push(continuation),
        }
    }

    /// Everything still unresolved, for the end-of-import sweep.
    #[must_use]
    pub fn dangling(&self) -> Vec<Dangling> {
        let mut out = Vec::new();
        for state in &self.resolutions {
            if state.resolved.is_none() {
                out.push(Dangling::Reference {
                    external_id: state.external_id.clone(),
                    location: state.first_demand.clone(),
                });
            }
        }
        for state in &self.slots {
            if state.filled.is_none() {
                out.push(Dangling::Slot {
                    location: state.declared_at.clone(),
                });
            }
        }
        out
    }
}

impl fmt::Debug for IdentityRegistry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("entries", &self.entries.len())
            .field("resolutions", &self.resolutions.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}
