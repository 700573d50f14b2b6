// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value modifiers.
//!
//! A modifier rewrites the resolved value of one property on one object
//! before it is returned. Bindings and animation overlays plug in here: an
//! animation player attaches a modifier that blends its sampled value into
//! the base value, and invalidates it whenever the animation advances.
//!
//! The chain runs in insertion order on every resolution. Each modifier works
//! on a scratch copy; its result is kept only if it succeeds, so a failing
//! modifier leaves the value the previous one produced.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;

use crate::error::{ModifierError, PropertyError};
use crate::id::{ModifierHandle, ObjectKey, PropertyTypeId};
use crate::manager::PropertyManager;
use crate::value::PropertyValue;

/// A modifier callback.
///
/// User context is whatever the closure captures.
pub type ValueModifier = dyn Fn(&mut PropertyValue) -> Result<(), ModifierError>;

struct ModifierEntry {
    handle: ModifierHandle,
    callback: Rc<ValueModifier>,
    valid: Cell<bool>,
}

impl fmt::Debug for ModifierEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierEntry")
            .field("handle", &self.handle)
            .field("valid", &self.valid.get())
            .finish_non_exhaustive()
    }
}

/// The modifiers attached to one property storage.
#[derive(Debug, Default)]
pub(crate) struct ModifierChain {
    entries: Vec<ModifierEntry>,
}

impl ModifierChain {
    pub(crate) fn push(
        &mut self,
        handle: ModifierHandle,
        callback: Rc<ValueModifier>,
    ) -> Result<(), PropertyError> {
        self.entries.try_reserve(1)?;
        self.entries.push(ModifierEntry {
            handle,
            callback,
            valid: Cell::new(false),
        });
        Ok(())
    }

    pub(crate) fn remove(&mut self, handle: ModifierHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        self.entries.len() != before
    }

    pub(crate) fn invalidate(&self, handle: ModifierHandle) -> bool {
        self.find(handle).map(|e| e.valid.set(false)).is_some()
    }

    pub(crate) fn is_valid(&self, handle: ModifierHandle) -> Option<bool> {
        self.find(handle).map(|e| e.valid.get())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Runs the chain over `value`.
    ///
    /// On failure `value` holds the result of the last modifier that
    /// succeeded, the remaining modifiers are skipped, and the failing one
    /// keeps its validity flag.
    pub(crate) fn apply(&self, value: &mut PropertyValue) -> Result<(), ModifierError> {
        for entry in &self.entries {
            let mut scratch = value.clone();
            (entry.callback)(&mut scratch)?;
            if scratch.data_type() != value.data_type() {
                return Err(ModifierError::new("modifier changed the value kind"));
            }
            *value = scratch;
            entry.valid.set(true);
        }
        Ok(())
    }

    fn find(&self, handle: ModifierHandle) -> Option<&ModifierEntry> {
        self.entries.iter().find(|e| e.handle == handle)
    }
}

impl PropertyManager {
    /// Appends a modifier to the chain of `property` on `object`.
    ///
    /// The modifier runs on every later resolution of the property on that
    /// object, after the modifiers added before it. Adding a modifier marks
    /// the property changed and raises its change flags; it does not dispatch
    /// notifications.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::UnsupportedOperation`] for struct, array and
    /// pointer properties, [`PropertyError::StaleObject`],
    /// [`PropertyError::UnknownPropertyType`], or
    /// [`PropertyError::AllocationFailure`].
    pub fn add_value_modifier<F>(
        &mut self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
        modifier: F,
    ) -> Result<ModifierHandle, PropertyError>
    where
        F: Fn(&mut PropertyValue) -> Result<(), ModifierError> + 'static,
    {
        let property = property.into();
        self.require_stack(property, "value modifiers")?;
        self.require_object(object)?;
        let handle = ModifierHandle(self.next_handle());
        let pushed = self
            .storage_entry(property, object)
            .and_then(|storage| storage.modifiers.push(handle, Rc::new(modifier)));
        if let Err(err) = pushed {
            self.collect_if_orphaned(property, object);
            return Err(err);
        }
        self.touch(object, property);
        Ok(handle)
    }

    /// Removes a modifier. Modifiers may be removed in any order.
    ///
    /// Returns `false` if the modifier is not attached.
    pub fn remove_value_modifier(
        &mut self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
        handle: ModifierHandle,
    ) -> bool {
        let property = property.into();
        let removed = self
            .storage_mut(property, object)
            .is_some_and(|s| s.modifiers.remove(handle));
        if removed {
            self.touch(object, property);
            self.collect_if_orphaned(property, object);
        }
        removed
    }

    /// Marks a modifier as needing recomputation.
    ///
    /// Nothing is recomputed now; the next resolution runs the modifier again
    /// and the property's storage is flagged changed.
    /// Returns `false` if the modifier is not attached.
    pub fn invalidate_value_modifier(
        &mut self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
        handle: ModifierHandle,
    ) -> bool {
        let property = property.into();
        let Some(storage) = self.storage_mut(property, object) else {
            return false;
        };
        if !storage.modifiers.invalidate(handle) {
            return false;
        }
        storage.flags |= crate::flags::StorageFlags::CHANGED;
        true
    }

    /// Returns whether a modifier has run successfully since it was added or
    /// last invalidated, or `None` if it is not attached.
    #[must_use]
    pub fn is_value_modifier_valid(
        &self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
        handle: ModifierHandle,
    ) -> Option<bool> {
        self.storage(property.into(), object)?
            .modifiers
            .is_valid(handle)
    }
}
