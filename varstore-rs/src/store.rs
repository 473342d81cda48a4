//! Scoped variable store.
//!
//! A [`Store`] owns a stack of [`Context`] layers.  Index 0 is the base
//! context; pushed overlays sit above it and the topmost layer receives
//! writes.  Stores form a tree through [`Store::fork`]: a child sees its own
//! stack plus the *base* context of every ancestor, nearest first, while a
//! parent never sees anything of its children.
//!
//! Lookup order for a name:
//!
//! 1. own stack, top → bottom
//! 2. each ancestor's base context, nearest ancestor first
//!
//! The identifier `super` names the parent store and `super.<path>` is
//! forwarded to it, for both reads and writes.
//!
//! `Store` is a cheap handle; clones refer to the same store.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StoreError;
use crate::notify::{self, Notification};
use crate::path;
use crate::value::{Context, Function, Value};

const SUPER: &str = "super";
const SUPER_PREFIX: &str = "super.";

struct StoreInner {
    name: String,
    parent: Option<Store>,
    stack: RwLock<Vec<Context>>,
    watchers: Mutex<HashMap<String, Vec<Function>>>,
}

/// A named, hierarchically scoped variable container.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.name)
            .field("depth", &self.depth())
            .field("parent", &self.inner.parent.as_ref().map(Store::name))
            .finish()
    }
}

impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Store {
    // ── Construction ──────────────────────────────────────────────────────────

    /// Create an empty root store.
    pub fn new(name: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_parent(name, Context::new(), None)
    }

    /// Create a root store whose base context is `state`.
    pub fn with_state(name: impl Into<String>, state: Context) -> Result<Self, StoreError> {
        Self::with_parent(name, state, None)
    }

    /// Create a store with an optional parent.  Fails if `name` is blank.
    pub fn with_parent(
        name: impl Into<String>,
        state: Context,
        parent: Option<Store>,
    ) -> Result<Self, StoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StoreError::NameRequired);
        }
        Ok(Store {
            inner: Arc::new(StoreInner {
                name,
                parent,
                stack: RwLock::new(vec![state]),
                watchers: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Create a child store whose parent is `self`.
    pub fn fork(&self, name: impl Into<String>) -> Result<Store, StoreError> {
        self.fork_with_state(name, Context::new())
    }

    pub fn fork_with_state(&self, name: impl Into<String>, state: Context) -> Result<Store, StoreError> {
        Store::with_parent(name, state, Some(self.clone()))
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parent(&self) -> Option<&Store> {
        self.inner.parent.as_ref()
    }

    /// Number of contexts on the stack (1 when nothing has been pushed).
    pub fn depth(&self) -> usize {
        self.read_stack().len()
    }

    /// A copy of the base context (overlays are never included).
    pub fn get_store(&self) -> Context {
        self.read_stack().first().cloned().unwrap_or_default()
    }

    fn read_stack(&self) -> RwLockReadGuard<'_, Vec<Context>> {
        self.inner.stack.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_stack(&self) -> RwLockWriteGuard<'_, Vec<Context>> {
        self.inner.stack.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_watchers(&self) -> MutexGuard<'_, HashMap<String, Vec<Function>>> {
        self.inner.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_parent(&self) -> Result<&Store, StoreError> {
        self.parent().ok_or_else(|| StoreError::SuperUndefined {
            store: self.inner.name.clone(),
        })
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Whether `id` resolves anywhere in this store's scope chain.
    pub fn exists(&self, id: &str) -> Result<bool, StoreError> {
        if id == SUPER {
            return Ok(self.parent().is_some());
        }
        if let Some(rest) = id.strip_prefix(SUPER_PREFIX) {
            return self.require_parent()?.exists(rest);
        }
        Ok(self.lookup(id)?.is_some())
    }

    /// The value bound to `id`, or [`Value::Unset`] if nothing is found.
    pub fn get_value(&self, id: &str) -> Result<Value, StoreError> {
        if id == SUPER {
            return Ok(Value::Store(self.require_parent()?.clone()));
        }
        if let Some(rest) = id.strip_prefix(SUPER_PREFIX) {
            return self.require_parent()?.get_value(rest);
        }
        Ok(self.lookup(id)?.unwrap_or_default())
    }

    fn lookup(&self, id: &str) -> Result<Option<Value>, StoreError> {
        {
            let stack = self.read_stack();
            for context in stack.iter().rev() {
                if let Some(v) = path::resolve(context, id)? {
                    return Ok(Some(v.clone()));
                }
            }
        }

        let mut ancestor = self.parent();
        while let Some(store) = ancestor {
            let stack = store.read_stack();
            if let Some(base) = stack.first() {
                if let Some(v) = path::resolve(base, id)? {
                    return Ok(Some(v.clone()));
                }
            }
            ancestor = store.parent();
        }
        Ok(None)
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Assign `value` at `id` in the topmost context and notify subscribers.
    ///
    /// A bare `super` always names the parent store and cannot be assigned.
    pub fn set_value(&self, id: &str, value: impl Into<Value>) -> Result<bool, StoreError> {
        let value = value.into();
        if id == SUPER {
            return Err(StoreError::invalid_path(id, "`super` names the parent store"));
        }
        if let Some(rest) = id.strip_prefix(SUPER_PREFIX) {
            return self.require_parent()?.set_value(rest, value);
        }

        let assigned = {
            let mut stack = self.write_stack();
            match stack.last_mut() {
                Some(top) => path::assign(top, id, value.clone())?,
                None => false,
            }
        };
        tracing::trace!(store = %self.inner.name, id, assigned, "set value");
        self.touch(id, Some(value))?;
        Ok(assigned)
    }

    /// Merge `state` over the base context.  No-op unless `state` is a mapping.
    pub fn update_state(&self, state: &Value) {
        let mut stack = self.write_stack();
        if let Some(base) = stack.first_mut() {
            if let Some(merged) = path::merge(base, state) {
                *base = merged;
            }
        }
    }

    /// Push a new writable overlay.
    pub fn push_context(&self, context: Context) {
        let mut stack = self.write_stack();
        stack.push(context);
        tracing::trace!(store = %self.inner.name, depth = stack.len(), "push context");
    }

    /// Pop and return the topmost overlay.
    ///
    /// The base context is never removed: with no overlays this returns
    /// `None` and leaves the store unchanged.
    pub fn pop_context(&self) -> Option<Context> {
        let mut stack = self.write_stack();
        if stack.len() <= 1 {
            tracing::warn!(store = %self.inner.name, "refusing to pop the base context");
            return None;
        }
        let popped = stack.pop();
        tracing::trace!(store = %self.inner.name, depth = stack.len(), "pop context");
        popped
    }

    // ── Subscriptions ─────────────────────────────────────────────────────────

    /// Register `handler` (a callable value) to be notified when `key` is touched.
    pub fn subscribe(&self, key: &str, handler: Value) -> Result<(), StoreError> {
        let handler = validate_subscription(key, handler)?;
        self.lock_watchers()
            .entry(key.to_owned())
            .or_default()
            .push(handler);
        Ok(())
    }

    /// Remove a previously registered handler.  Returns whether one was removed.
    pub fn unsubscribe(&self, key: &str, handler: &Value) -> Result<bool, StoreError> {
        let handler = validate_subscription(key, handler.clone())?;
        let mut watchers = self.lock_watchers();
        let Some(list) = watchers.get_mut(key) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|h| !h.ptr_eq(&handler));
        let removed = list.len() != before;
        if list.is_empty() {
            watchers.remove(key);
        }
        Ok(removed)
    }

    /// Schedule every handler registered for `id`.
    ///
    /// When `value` is `None` the current value of `id` is sent.  Handlers
    /// run later, off the caller's stack.
    pub fn touch(&self, id: &str, value: Option<Value>) -> Result<(), StoreError> {
        let handlers = match self.lock_watchers().get(id) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return Ok(()),
        };
        let value = match value {
            Some(v) => v,
            None => self.get_value(id)?,
        };
        notify::schedule(Notification {
            id: id.to_owned(),
            value,
            handlers,
        });
        Ok(())
    }
}

fn validate_subscription(key: &str, handler: Value) -> Result<Function, StoreError> {
    if key.trim().is_empty() {
        return Err(StoreError::MissingKey);
    }
    match handler {
        Value::Function(f) => Ok(f),
        _ => Err(StoreError::MissingHandler),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
