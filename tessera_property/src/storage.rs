// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-type and per-object property storage.
//!
//! Each registered property type owns a [`TypeStorage`]: a map from object key
//! to the [`PropertyStorage`] of that property on that object, plus the
//! type-scoped notification handlers.
//!
//! A property storage holds the value-source stack, the modifier chain and
//! the instance-scoped notification handlers. The stack is kept sorted by
//! [`Precedence`], lowest first; within one precedence level entries stay in
//! insertion order, so the last entry is always the one that wins. Objects
//! usually carry one or two sources per property, so the stack lives inline
//! in a `SmallVec`.
//!
//! A storage whose stack is empty is *orphaned*. It is kept only while
//! modifiers, handlers or the non-copyable flag still refer to it, and never
//! dropped while a dispatch over its handlers is running.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::PropertyError;
use crate::flags::StorageFlags;
use crate::id::{ObjectKey, PropertyTypeId, SourceOwner, ValueSourceHandle};
use crate::manager::PropertyManager;
use crate::modifier::ModifierChain;
use crate::notify::HandlerList;
use crate::value::PropertyValue;

/// Inline capacity of a value-source stack.
const INLINE_SOURCES: usize = 2;

/// The precedence level of a value source.
///
/// Higher levels win. The derived ordering follows declaration order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    /// Values from class (template) definitions.
    Class,
    /// Values applied by styles.
    Style,
    /// Values applied by a state manager.
    StateManager,
    /// The local value written by [`PropertyManager::set`].
    ///
    /// At most one local source exists per property and object.
    Local,
}

/// One entry of a value-source stack.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueSourceEntry {
    pub(crate) value: PropertyValue,
    pub(crate) owner: SourceOwner,
    pub(crate) precedence: Precedence,
    pub(crate) handle: ValueSourceHandle,
}

impl ValueSourceEntry {
    /// Returns the value of this source, before modifiers.
    #[must_use]
    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// Returns who attached the source.
    #[must_use]
    pub fn owner(&self) -> SourceOwner {
        self.owner
    }

    /// Returns the precedence level.
    #[must_use]
    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// Returns the handle identifying the source.
    #[must_use]
    pub fn handle(&self) -> ValueSourceHandle {
        self.handle
    }
}

pub(crate) type SourceStack = SmallVec<[ValueSourceEntry; INLINE_SOURCES]>;

/// Storage of one property on one object.
#[derive(Debug, Default)]
pub(crate) struct PropertyStorage {
    pub(crate) flags: StorageFlags,
    pub(crate) sources: SourceStack,
    pub(crate) modifiers: ModifierChain,
    pub(crate) handlers: HandlerList,
}

impl PropertyStorage {
    /// The winning entry.
    pub(crate) fn top(&self) -> Option<&ValueSourceEntry> {
        self.sources.last()
    }

    pub(crate) fn is_orphaned(&self) -> bool {
        self.sources.is_empty()
    }

    pub(crate) fn is_collectable(&self) -> bool {
        self.is_orphaned()
            && self.modifiers.is_empty()
            && self.handlers.is_empty()
            && !self.handlers.is_dispatching()
            && !self.flags.intersects(StorageFlags::RETAINING)
    }

    /// Where a new entry of `precedence` goes: after every entry at or below
    /// its level.
    pub(crate) fn insert_position(&self, precedence: Precedence) -> usize {
        self.sources
            .iter()
            .position(|e| e.precedence > precedence)
            .unwrap_or(self.sources.len())
    }

    pub(crate) fn local_index(&self) -> Option<usize> {
        self.sources
            .iter()
            .rposition(|e| e.precedence == Precedence::Local)
    }

    pub(crate) fn source_index(
        &self,
        handle: ValueSourceHandle,
        owner: SourceOwner,
    ) -> Option<usize> {
        self.sources
            .iter()
            .position(|e| e.handle == handle && e.owner == owner)
    }

    /// The value that would win if the entry at `idx` were removed.
    pub(crate) fn top_without(&self, idx: usize) -> Option<&PropertyValue> {
        let len = self.sources.len();
        if idx + 1 == len {
            len.checked_sub(2)
                .and_then(|i| self.sources.get(i))
                .map(|e| &e.value)
        } else {
            self.top().map(|e| &e.value)
        }
    }

    /// Inserts `entry`, replacing any local entry when it is local itself.
    ///
    /// Returns the replaced entry. Capacity must have been reserved.
    pub(crate) fn insert(&mut self, entry: ValueSourceEntry) -> Option<ValueSourceEntry> {
        let replaced = if entry.precedence == Precedence::Local {
            self.local_index().map(|idx| self.sources.remove(idx))
        } else {
            None
        };
        let at = self.insert_position(entry.precedence);
        self.sources.insert(at, entry);
        self.flags.remove(StorageFlags::REMOVED);
        replaced
    }

    pub(crate) fn remove_at(&mut self, idx: usize) -> ValueSourceEntry {
        let entry = self.sources.remove(idx);
        if self.sources.is_empty() {
            self.flags |= StorageFlags::REMOVED;
        }
        entry
    }
}

/// Storage of one property type across all objects.
#[derive(Debug, Default)]
pub(crate) struct TypeStorage {
    pub(crate) storages: HashMap<ObjectKey, PropertyStorage>,
    pub(crate) handlers: HandlerList,
}

impl PropertyManager {
    pub(crate) fn type_storage(
        &self,
        property: PropertyTypeId,
    ) -> Result<&TypeStorage, PropertyError> {
        self.types
            .get(&property)
            .ok_or(PropertyError::UnknownPropertyType(property))
    }

    pub(crate) fn type_storage_mut(
        &mut self,
        property: PropertyTypeId,
    ) -> Result<&mut TypeStorage, PropertyError> {
        self.types
            .get_mut(&property)
            .ok_or(PropertyError::UnknownPropertyType(property))
    }

    pub(crate) fn storage(
        &self,
        property: PropertyTypeId,
        object: ObjectKey,
    ) -> Option<&PropertyStorage> {
        self.types.get(&property)?.storages.get(&object)
    }

    pub(crate) fn storage_mut(
        &mut self,
        property: PropertyTypeId,
        object: ObjectKey,
    ) -> Option<&mut PropertyStorage> {
        self.types.get_mut(&property)?.storages.get_mut(&object)
    }

    /// Returns the storage for `object`, creating it if needed.
    pub(crate) fn storage_entry(
        &mut self,
        property: PropertyTypeId,
        object: ObjectKey,
    ) -> Result<&mut PropertyStorage, PropertyError> {
        let ts = self.type_storage_mut(property)?;
        if !ts.storages.contains_key(&object) {
            ts.storages.try_reserve(1)?;
        }
        Ok(ts.storages.entry(object).or_default())
    }

    /// Drops the storage if nothing refers to it any more.
    pub(crate) fn collect_if_orphaned(&mut self, property: PropertyTypeId, object: ObjectKey) {
        if let Some(ts) = self.types.get_mut(&property) {
            if ts
                .storages
                .get(&object)
                .is_some_and(PropertyStorage::is_collectable)
            {
                ts.storages.remove(&object);
            }
        }
    }

    /// Returns the value sources of `property` on `object`, lowest precedence
    /// first. The last entry is the one that wins.
    #[must_use]
    pub fn value_sources(
        &self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
    ) -> &[ValueSourceEntry] {
        self.storage(property.into(), object)
            .map_or(&[], |s| s.sources.as_slice())
    }

    /// Returns `true` if `object` has a local value for `property`.
    #[must_use]
    pub fn has_local(&self, object: ObjectKey, property: impl Into<PropertyTypeId>) -> bool {
        self.storage(property.into(), object)
            .is_some_and(|s| s.local_index().is_some())
    }

    /// Returns `true` if `object` holds storage for `property`, including
    /// orphaned storage kept alive by handlers, modifiers or flags.
    #[must_use]
    pub fn has_storage(&self, object: ObjectKey, property: impl Into<PropertyTypeId>) -> bool {
        self.storage(property.into(), object).is_some()
    }

    /// Controls whether `property` on `object` is copied by
    /// [`PropertyManager::copy_property`] and [`PropertyManager::copy_properties`].
    ///
    /// A non-copyable property keeps its storage even without value sources.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::StaleObject`],
    /// [`PropertyError::UnknownPropertyType`], or
    /// [`PropertyError::AllocationFailure`].
    pub fn set_property_copyable(
        &mut self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
        copyable: bool,
    ) -> Result<(), PropertyError> {
        let property = property.into();
        self.require_object(object)?;
        if copyable {
            if let Some(storage) = self.storage_mut(property, object) {
                storage.flags.remove(StorageFlags::NON_COPYABLE);
                self.collect_if_orphaned(property, object);
            }
        } else {
            self.storage_entry(property, object)?.flags |= StorageFlags::NON_COPYABLE;
        }
        Ok(())
    }

    /// Returns `false` if `property` on `object` was marked non-copyable.
    #[must_use]
    pub fn is_property_copyable(
        &self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
    ) -> bool {
        !self.has_storage_flag(object, property.into(), StorageFlags::NON_COPYABLE)
    }

    /// Returns `true` if `property` on `object` changed since the flag was
    /// last cleared.
    #[must_use]
    pub fn is_property_changed(
        &self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
    ) -> bool {
        self.has_storage_flag(object, property.into(), StorageFlags::CHANGED)
    }

    /// Clears the changed flag of `property` on `object`.
    pub fn clear_property_changed(
        &mut self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
    ) {
        if let Some(storage) = self.storage_mut(property.into(), object) {
            storage.flags.remove(StorageFlags::CHANGED);
        }
    }

    /// Returns `true` if the last value source of `property` on `object` was
    /// removed while its storage was kept alive.
    #[must_use]
    pub fn was_property_removed(
        &self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
    ) -> bool {
        self.has_storage_flag(object, property.into(), StorageFlags::REMOVED)
    }

    fn has_storage_flag(
        &self,
        object: ObjectKey,
        property: PropertyTypeId,
        flag: StorageFlags,
    ) -> bool {
        self.storage(property, object)
            .is_some_and(|s| s.flags.contains(flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: f32, precedence: Precedence, handle: u64) -> ValueSourceEntry {
        ValueSourceEntry {
            value: PropertyValue::Float(value),
            owner: SourceOwner::new(7),
            precedence,
            handle: ValueSourceHandle(handle),
        }
    }

    fn values(storage: &PropertyStorage) -> alloc::vec::Vec<f32> {
        storage
            .sources
            .iter()
            .filter_map(|e| e.value.get::<f32>())
            .collect()
    }

    #[test]
    fn stack_is_sorted_by_precedence() {
        let mut storage = PropertyStorage::default();
        storage.insert(entry(3.0, Precedence::StateManager, 1));
        storage.insert(entry(1.0, Precedence::Class, 2));
        storage.insert(entry(2.0, Precedence::Style, 3));
        assert_eq!(values(&storage), [1.0, 2.0, 3.0]);
        assert_eq!(storage.top().unwrap().precedence, Precedence::StateManager);
    }

    #[test]
    fn last_added_wins_within_a_level() {
        let mut storage = PropertyStorage::default();
        storage.insert(entry(1.0, Precedence::Style, 1));
        storage.insert(entry(2.0, Precedence::Style, 2));
        storage.insert(entry(0.5, Precedence::Class, 3));
        assert_eq!(values(&storage), [0.5, 1.0, 2.0]);
    }

    #[test]
    fn local_replaces_local() {
        let mut storage = PropertyStorage::default();
        storage.insert(entry(1.0, Precedence::Local, 1));
        storage.insert(entry(5.0, Precedence::Style, 2));
        let replaced = storage.insert(entry(2.0, Precedence::Local, 3)).unwrap();
        assert_eq!(replaced.handle, ValueSourceHandle(1));
        assert_eq!(values(&storage), [5.0, 2.0]);
        assert_eq!(storage.local_index(), Some(1));
    }

    #[test]
    fn removal_by_handle_and_owner() {
        let mut storage = PropertyStorage::default();
        storage.insert(entry(1.0, Precedence::Style, 1));
        assert_eq!(storage.source_index(ValueSourceHandle(1), SourceOwner::MANAGER), None);
        let idx = storage
            .source_index(ValueSourceHandle(1), SourceOwner::new(7))
            .unwrap();
        assert_eq!(storage.top_without(idx), None);
        storage.remove_at(idx);
        assert!(storage.is_orphaned());
        assert!(storage.flags.contains(StorageFlags::REMOVED));
        assert!(storage.is_collectable());
    }

    #[test]
    fn top_without_falls_back_to_next_entry() {
        let mut storage = PropertyStorage::default();
        storage.insert(entry(1.0, Precedence::Class, 1));
        storage.insert(entry(2.0, Precedence::Local, 2));
        assert_eq!(storage.top_without(1), Some(&PropertyValue::Float(1.0)));
        assert_eq!(storage.top_without(0), Some(&PropertyValue::Float(2.0)));
    }

    #[test]
    fn non_copyable_storage_is_retained() {
        let mut storage = PropertyStorage::default();
        storage.flags |= StorageFlags::NON_COPYABLE;
        assert!(storage.is_orphaned());
        assert!(!storage.is_collectable());
    }
}
