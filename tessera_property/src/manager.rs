// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The property manager and its mutation engine.
//!
//! Every mutation that changes what a property resolves to goes through the
//! same three steps:
//!
//! 1. **Stage**: reserve capacity and compute the effective value the
//!    property would have after the edit, running the modifier chain on it.
//!    A failure here returns an error and leaves the committed state alone.
//! 2. **Commit**: apply the edit to the value-source stack, which can no
//!    longer fail, and raise the type's change flags on the object.
//! 3. **Dispatch**: notify instance handlers, then type handlers.
//!
//! Removals cannot be refused: if the modifier chain fails while staging a
//! removal, the failure is logged and the notification carries the value the
//! chain had produced up to that point.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::{HashMap, HashSet};

use crate::compound::ArrayData;
use crate::error::{ModifierError, PropertyError};
use crate::flags::{ChangeFlags, StorageFlags};
use crate::group::GroupList;
use crate::id::{ObjectKey, PropertyType, PropertyTypeId, SourceOwner, ValueSourceHandle};
use crate::notify::{ChangeReason, PropertyChange};
use crate::object::{ObjectArena, ObjectKind};
use crate::registry::TypeRegistry;
use crate::resource::PathResolver;
use crate::storage::{Precedence, TypeStorage, ValueSourceEntry};
use crate::value::{PropertyKind, PropertyValue, check_kind};

/// Owns every property type, object key and property value of one scene.
///
/// The manager is single-threaded. Notification handlers receive
/// `&mut PropertyManager` and may mutate it while a dispatch is running.
///
/// # Example
///
/// ```rust
/// use tessera_property::{Precedence, PropertyManager, PropertyTypeBuilder, SourceOwner};
///
/// let mut manager = PropertyManager::new();
/// let opacity = manager
///     .register(PropertyTypeBuilder::new("Opacity", 1.0_f32))
///     .unwrap();
/// let node = manager.create_object().unwrap();
///
/// let style = SourceOwner::new(1);
/// manager
///     .add_value_source(node, opacity, 0.5, Precedence::Style, style)
///     .unwrap();
/// assert_eq!(manager.get(node, opacity).unwrap(), Some(0.5));
///
/// // The local value wins over the style value.
/// manager.set(node, opacity, 0.25).unwrap();
/// assert_eq!(manager.get(node, opacity).unwrap(), Some(0.25));
///
/// // Removing it uncovers the style value again.
/// assert!(manager.remove_local(node, opacity));
/// assert_eq!(manager.get(node, opacity).unwrap(), Some(0.5));
/// ```
pub struct PropertyManager {
    pub(crate) registry: TypeRegistry,
    pub(crate) types: HashMap<PropertyTypeId, TypeStorage>,
    pub(crate) objects: ObjectArena,
    pub(crate) groups: HashMap<ObjectKey, GroupList>,
    pub(crate) arrays: HashMap<ObjectKey, ArrayData>,
    pub(crate) path_resolver: Option<Rc<dyn PathResolver>>,
    change_masks: HashMap<ObjectKey, ChangeFlags>,
    layout_suspended: u32,
    pending_layout: HashSet<ObjectKey>,
    next_handle: u64,
}

impl fmt::Debug for PropertyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyManager")
            .field("property_types", &self.registry.len())
            .field("objects", &self.objects.len())
            .field("groups", &self.groups.len())
            .field("arrays", &self.arrays.len())
            .field("has_path_resolver", &self.path_resolver.is_some())
            .field("layout_suspended", &self.layout_suspended)
            .finish_non_exhaustive()
    }
}

impl Default for PropertyManager {
    fn default() -> Self {
        Self::new()
    }
}

/// An edit of one value-source stack.
#[derive(Debug)]
pub(crate) enum SourceEdit {
    Insert(ValueSourceEntry),
    Remove(usize),
}

/// An edit whose outcome has been computed but not applied.
#[derive(Debug)]
pub(crate) struct StagedChange {
    object: ObjectKey,
    property: PropertyTypeId,
    edit: SourceEdit,
    effective: Option<PropertyValue>,
    reason: ChangeReason,
}

impl PropertyManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: TypeRegistry::default(),
            types: HashMap::new(),
            objects: ObjectArena::default(),
            groups: HashMap::new(),
            arrays: HashMap::new(),
            path_resolver: None,
            change_masks: HashMap::new(),
            layout_suspended: 0,
            pending_layout: HashSet::new(),
            next_handle: 0,
        }
    }

    /// Sets the local value of `property` on `object`.
    ///
    /// The local value is owned by the manager and replaces any previous
    /// local value; dropping the old value releases whatever it owned.
    ///
    /// # Errors
    ///
    /// - [`PropertyError::ReadOnly`] if the type is read-only.
    /// - [`PropertyError::ModifierFailure`] if the modifier chain rejects the
    ///   new value; the previous value stays in place.
    /// - [`PropertyError::StaleObject`], [`PropertyError::UnknownPropertyType`],
    ///   [`PropertyError::TypeMismatch`] or [`PropertyError::AllocationFailure`].
    pub fn set<T: PropertyKind>(
        &mut self,
        object: ObjectKey,
        property: PropertyType<T>,
        value: T,
    ) -> Result<(), PropertyError> {
        self.set_value(object, property.id(), value.into_value())
    }

    /// Untyped variant of [`PropertyManager::set`].
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::set`].
    pub fn set_value(
        &mut self,
        object: ObjectKey,
        property: PropertyTypeId,
        value: PropertyValue,
    ) -> Result<(), PropertyError> {
        let descriptor = self.descriptor(property)?;
        if descriptor.is_read_only() {
            return Err(PropertyError::ReadOnly {
                name: descriptor.name().into(),
            });
        }
        self.insert_source(object, property, value, Precedence::Local, SourceOwner::MANAGER)
            .map(|_| ())
    }

    /// Attaches a value source at `precedence`.
    ///
    /// The caller owns the source and removes it with
    /// [`PropertyManager::remove_value_source`]. Within one precedence level
    /// the most recently added source wins. A source at
    /// [`Precedence::Local`] replaces the existing local value.
    ///
    /// Read-only types accept value sources.
    ///
    /// # Errors
    ///
    /// [`PropertyError::UnsupportedOperation`] for struct, array and pointer
    /// properties, plus the errors of [`PropertyManager::set`] other than
    /// [`PropertyError::ReadOnly`].
    pub fn add_value_source<T: PropertyKind>(
        &mut self,
        object: ObjectKey,
        property: PropertyType<T>,
        value: T,
        precedence: Precedence,
        owner: SourceOwner,
    ) -> Result<ValueSourceHandle, PropertyError> {
        self.add_value_source_value(object, property.id(), value.into_value(), precedence, owner)
    }

    /// Untyped variant of [`PropertyManager::add_value_source`].
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::add_value_source`].
    pub fn add_value_source_value(
        &mut self,
        object: ObjectKey,
        property: PropertyTypeId,
        value: PropertyValue,
        precedence: Precedence,
        owner: SourceOwner,
    ) -> Result<ValueSourceHandle, PropertyError> {
        self.require_stack(property, "value sources")?;
        self.insert_source(object, property, value, precedence, owner)
    }

    /// Removes the value source identified by `handle` and `owner`.
    ///
    /// Returns `false` if no such source is attached. Removal always
    /// succeeds once the source is found.
    pub fn remove_value_source(
        &mut self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
        handle: ValueSourceHandle,
        owner: SourceOwner,
    ) -> bool {
        let property = property.into();
        let Some(idx) = self
            .storage(property, object)
            .and_then(|s| s.source_index(handle, owner))
        else {
            return false;
        };
        self.remove_source_at(object, property, idx)
    }

    /// Removes the local value of `property` on `object`.
    ///
    /// Returns `false` if there was none.
    pub fn remove_local(&mut self, object: ObjectKey, property: impl Into<PropertyTypeId>) -> bool {
        let property = property.into();
        let Some(idx) = self
            .storage(property, object)
            .and_then(|s| s.local_index())
        else {
            return false;
        };
        self.remove_source_at(object, property, idx)
    }

    fn remove_source_at(
        &mut self,
        object: ObjectKey,
        property: PropertyTypeId,
        idx: usize,
    ) -> bool {
        self.process_change(object, property, SourceEdit::Remove(idx), ChangeReason::ValueRemoved)
            .is_ok()
    }

    pub(crate) fn insert_source(
        &mut self,
        object: ObjectKey,
        property: PropertyTypeId,
        mut value: PropertyValue,
        precedence: Precedence,
        owner: SourceOwner,
    ) -> Result<ValueSourceHandle, PropertyError> {
        self.require_object(object)?;
        let descriptor = self.descriptor(property)?;
        check_kind(descriptor.data_type(), value.data_type())?;
        if let (PropertyValue::Array(array), PropertyValue::Array(default)) =
            (&value, descriptor.default_value())
        {
            check_kind(default.element(), array.element())?;
        }
        self.check_nesting(object, &value)?;
        if let PropertyValue::Pointer(pointer) = &mut value {
            pointer.attach(object, self.path_resolver.as_deref());
        }
        let handle = ValueSourceHandle(self.next_handle());
        let entry = ValueSourceEntry {
            value,
            owner,
            precedence,
            handle,
        };
        self.process_change(
            object,
            property,
            SourceEdit::Insert(entry),
            ChangeReason::ValueChanged,
        )?;
        Ok(handle)
    }

    /// Stages, commits and dispatches one edit.
    pub(crate) fn process_change(
        &mut self,
        object: ObjectKey,
        property: PropertyTypeId,
        edit: SourceEdit,
        reason: ChangeReason,
    ) -> Result<(), PropertyError> {
        let staged = match self.stage(object, property, edit, reason) {
            Ok(staged) => staged,
            Err(err) => {
                self.collect_if_orphaned(property, object);
                return Err(err);
            }
        };
        let change = self.commit(staged);
        self.dispatch(&change);
        Ok(())
    }

    pub(crate) fn stage(
        &mut self,
        object: ObjectKey,
        property: PropertyTypeId,
        edit: SourceEdit,
        reason: ChangeReason,
    ) -> Result<StagedChange, PropertyError> {
        let removal = matches!(edit, SourceEdit::Remove(_));
        if !removal {
            self.change_masks.try_reserve(1)?;
        }
        let storage = self.storage_entry(property, object)?;
        let staged_top = match &edit {
            SourceEdit::Insert(entry) => {
                storage.sources.try_reserve(1)?;
                match storage.top() {
                    Some(top) if top.precedence > entry.precedence => Some(&top.value),
                    _ => Some(&entry.value),
                }
            }
            SourceEdit::Remove(idx) => storage.top_without(*idx),
        };
        let mut effective = staged_top.cloned();
        let outcome = match effective.as_mut() {
            Some(value) => storage.modifiers.apply(value),
            None => Ok(()),
        };
        if let Err(source) = outcome {
            if !removal {
                return Err(self.modifier_failure(property, source));
            }
            log::warn!("modifier failed after a removal of {property} on {object:?}: {source}");
        }
        Ok(StagedChange {
            object,
            property,
            edit,
            effective,
            reason,
        })
    }

    pub(crate) fn commit(&mut self, staged: StagedChange) -> PropertyChange {
        let StagedChange {
            object,
            property,
            edit,
            effective,
            reason,
        } = staged;
        let mut displaced = None;
        if let Some(storage) = self.storage_mut(property, object) {
            displaced = match edit {
                SourceEdit::Insert(entry) => storage.insert(entry),
                SourceEdit::Remove(idx) => Some(storage.remove_at(idx)),
            };
            storage.flags |= StorageFlags::CHANGED;
        }
        self.raise_type_flags(object, property);
        if let Some(old) = displaced {
            // A struct or array value is owned by the property holding it.
            if !self.holds_compound(object, property, &old.value) {
                self.release_compound(&old.value);
            }
        }
        PropertyChange {
            object,
            property,
            reason,
            value: effective,
        }
    }

    /// Marks the property changed without touching its stack.
    pub(crate) fn touch(&mut self, object: ObjectKey, property: PropertyTypeId) {
        if let Some(storage) = self.storage_mut(property, object) {
            storage.flags |= StorageFlags::CHANGED;
        }
        self.raise_type_flags(object, property);
    }

    fn raise_type_flags(&mut self, object: ObjectKey, property: PropertyTypeId) {
        let mut flags = self
            .registry
            .get(property)
            .map_or(ChangeFlags::empty(), |d| d.change_flags());
        if self.layout_suspended > 0 && flags.contains(ChangeFlags::LAYOUT) {
            flags.remove(ChangeFlags::LAYOUT);
            self.pending_layout.insert(object);
        }
        if !flags.is_empty() {
            *self.change_masks.entry(object).or_default() |= flags;
        }
    }

    /// Suspends propagation of [`ChangeFlags::LAYOUT`].
    ///
    /// Calls nest. Objects whose layout-affecting properties change while
    /// suspended receive the flag once, when the outermost
    /// [`PropertyManager::resume_layout_invalidation`] runs.
    pub fn suspend_layout_invalidation(&mut self) {
        self.layout_suspended += 1;
    }

    /// Undoes one [`PropertyManager::suspend_layout_invalidation`].
    pub fn resume_layout_invalidation(&mut self) {
        let Some(depth) = self.layout_suspended.checked_sub(1) else {
            log::warn!("resume_layout_invalidation called without a matching suspend");
            return;
        };
        self.layout_suspended = depth;
        if depth == 0 {
            for object in self.pending_layout.drain() {
                *self.change_masks.entry(object).or_default() |= ChangeFlags::LAYOUT;
            }
        }
    }

    /// Returns `true` while layout invalidation is suspended.
    #[must_use]
    pub fn is_layout_invalidation_suspended(&self) -> bool {
        self.layout_suspended > 0
    }

    /// Returns the change flags accumulated on `object`.
    #[must_use]
    pub fn change_flags(&self, object: ObjectKey) -> ChangeFlags {
        self.change_masks.get(&object).copied().unwrap_or_default()
    }

    /// Returns and clears the change flags accumulated on `object`.
    pub fn take_change_flags(&mut self, object: ObjectKey) -> ChangeFlags {
        self.change_masks.remove(&object).unwrap_or_default()
    }

    /// Copies `property` from `source` to `target` as a local value.
    ///
    /// The winning value source is copied before modifiers run. Struct and
    /// array values are copied deeply, so `target` gets its own fields and
    /// elements. Returns `false` if `source` has no copyable value.
    ///
    /// # Errors
    ///
    /// Any error of staging the value on `target`; `target` is left unchanged.
    pub fn copy_property(
        &mut self,
        source: ObjectKey,
        target: ObjectKey,
        property: impl Into<PropertyTypeId>,
    ) -> Result<bool, PropertyError> {
        let property = property.into();
        self.require_object(source)?;
        self.require_object(target)?;
        let Some(value) = self
            .storage(property, source)
            .filter(|s| !s.flags.contains(StorageFlags::NON_COPYABLE))
            .and_then(|s| s.top())
            .map(|e| e.value.clone())
        else {
            return Ok(false);
        };
        let mut batch = Vec::new();
        batch.try_reserve(1)?;
        batch.push((property, value));
        self.write_batch(target, batch).map(|n| n > 0)
    }

    /// Copies every copyable property of `source` to `target`.
    ///
    /// All values are staged before any is committed, so either every
    /// property is copied or `target` is left unchanged. Returns the number
    /// of properties copied.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::copy_property`].
    pub fn copy_properties(
        &mut self,
        source: ObjectKey,
        target: ObjectKey,
    ) -> Result<usize, PropertyError> {
        self.require_object(source)?;
        self.require_object(target)?;
        let batch = self.copyable_values(source)?;
        self.write_batch(target, batch)
    }

    /// The winning base value of every copyable property on `object`, in
    /// property type order.
    pub(crate) fn copyable_values(
        &self,
        object: ObjectKey,
    ) -> Result<Vec<(PropertyTypeId, PropertyValue)>, PropertyError> {
        let mut values = Vec::new();
        for (&property, ts) in &self.types {
            let Some(top) = ts
                .storages
                .get(&object)
                .filter(|s| !s.flags.contains(StorageFlags::NON_COPYABLE))
                .and_then(|s| s.top())
            else {
                continue;
            };
            values.try_reserve(1)?;
            values.push((property, top.value.clone()));
        }
        values.sort_by_key(|(property, _)| *property);
        Ok(values)
    }

    /// Writes `values` to `target` as local values, all or nothing.
    pub(crate) fn write_batch(
        &mut self,
        target: ObjectKey,
        values: Vec<(PropertyTypeId, PropertyValue)>,
    ) -> Result<usize, PropertyError> {
        let mut created = Vec::new();
        let mut staged = Vec::new();
        if let Err(err) = self.stage_batch(target, values, &mut created, &mut staged) {
            for change in &staged {
                self.collect_if_orphaned(change.property, target);
            }
            for value in &created {
                self.release_compound(value);
            }
            return Err(err);
        }
        let count = staged.len();
        let mut changes = Vec::new();
        changes.reserve_exact(count);
        for change in staged {
            changes.push(self.commit(change));
        }
        for change in &changes {
            self.dispatch(change);
        }
        Ok(count)
    }

    fn stage_batch(
        &mut self,
        target: ObjectKey,
        values: Vec<(PropertyTypeId, PropertyValue)>,
        created: &mut Vec<PropertyValue>,
        staged: &mut Vec<StagedChange>,
    ) -> Result<(), PropertyError> {
        staged.try_reserve(values.len())?;
        for (property, value) in values {
            let mut value = match value {
                PropertyValue::Struct(_) | PropertyValue::Array(_) => {
                    created.try_reserve(1)?;
                    let copy = self.copy_value(&value)?;
                    created.push(copy.clone());
                    copy
                }
                other => other,
            };
            check_kind(self.descriptor(property)?.data_type(), value.data_type())?;
            if let PropertyValue::Pointer(pointer) = &mut value {
                pointer.detach();
                pointer.attach(target, self.path_resolver.as_deref());
            }
            let entry = ValueSourceEntry {
                value,
                owner: SourceOwner::MANAGER,
                precedence: Precedence::Local,
                handle: ValueSourceHandle(self.next_handle()),
            };
            let edit = SourceEdit::Insert(entry);
            match self.stage(target, property, edit, ChangeReason::ValueChanged) {
                Ok(change) => staged.push(change),
                Err(err) => {
                    self.collect_if_orphaned(property, target);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Drops every property storage of `object`.
    ///
    /// No notifications are dispatched. Struct and array values held by the
    /// dropped value sources are destroyed. Storage whose handlers are being
    /// dispatched right now is emptied instead and dropped once the dispatch
    /// finishes.
    pub fn remove_object_properties(&mut self, object: ObjectKey) {
        let mut removed = 0_usize;
        let mut owned = Vec::new();
        for ts in self.types.values_mut() {
            let Some(storage) = ts.storages.get_mut(&object) else {
                continue;
            };
            owned.extend(
                storage
                    .sources
                    .drain(..)
                    .map(|e| e.value)
                    .filter(PropertyValue::is_compound),
            );
            if storage.handlers.is_dispatching() {
                storage.modifiers.clear();
                storage.handlers.clear();
                storage.flags = StorageFlags::empty();
            } else {
                ts.storages.remove(&object);
            }
            removed += 1;
        }
        if removed > 0 {
            log::debug!("removed {removed} property storages of {object:?}");
        }
        for value in &owned {
            self.release_compound(value);
        }
    }

    /// Severs the links `object` holds to the rest of the manager.
    ///
    /// Drops its group associations and accumulated change flags, and
    /// detaches its path pointers. Property values stay in place.
    pub fn unlink_properties(&mut self, object: ObjectKey) {
        self.groups.remove(&object);
        self.change_masks.remove(&object);
        self.pending_layout.remove(&object);
        for ts in self.types.values_mut() {
            if let Some(storage) = ts.storages.get_mut(&object) {
                for entry in &mut storage.sources {
                    if let PropertyValue::Pointer(pointer) = &mut entry.value {
                        pointer.detach();
                    }
                }
            }
        }
    }

    /// Destroys `object`: removes its properties, unlinks it and frees its key.
    ///
    /// Destroying a group also removes it from every object it was
    /// associated with. Destroying a struct or array also destroys the struct
    /// and array values it holds.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::StaleObject`] if the key is not live.
    pub fn destroy_object(&mut self, object: ObjectKey) -> Result<(), PropertyError> {
        let kind = self.require_object(object)?;
        self.destroy_key(object, kind);
        Ok(())
    }

    pub(crate) fn destroy_key(&mut self, object: ObjectKey, kind: ObjectKind) {
        self.remove_object_properties(object);
        self.unlink_properties(object);
        if kind == ObjectKind::Group {
            self.groups.retain(|_, list| {
                list.retain(|g| *g != object);
                !list.is_empty()
            });
        }
        let items = self.arrays.remove(&object).map(|data| data.items);
        if self.objects.remove(object).is_some() {
            log::debug!("destroyed {kind:?} {object:?}");
        }
        for value in items.iter().flatten() {
            self.release_compound(value);
        }
    }

    pub(crate) fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Fails unless the type carries a value-source stack.
    pub(crate) fn require_stack(
        &self,
        property: PropertyTypeId,
        operation: &'static str,
    ) -> Result<(), PropertyError> {
        let data_type = self.descriptor(property)?.data_type();
        if data_type.supports_stack() {
            Ok(())
        } else {
            Err(PropertyError::UnsupportedOperation {
                data_type,
                operation,
            })
        }
    }

    pub(crate) fn modifier_failure(
        &self,
        property: PropertyTypeId,
        source: ModifierError,
    ) -> PropertyError {
        PropertyError::ModifierFailure {
            property: self
                .registry
                .get(property)
                .map_or_else(|| alloc::format!("{property}"), |d| d.name().into()),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PropertyTypeBuilder;
    use core::cell::Cell;

    fn setup() -> (PropertyManager, PropertyType<f32>, ObjectKey) {
        let mut manager = PropertyManager::new();
        let width = manager
            .register(
                PropertyTypeBuilder::new("Width", 0.0_f32)
                    .change_flags(ChangeFlags::LAYOUT | ChangeFlags::RENDER),
            )
            .unwrap();
        let node = manager.create_object().unwrap();
        (manager, width, node)
    }

    #[test]
    fn set_replaces_the_single_local() {
        let (mut manager, width, node) = setup();
        manager.set(node, width, 1.0).unwrap();
        manager.set(node, width, 2.0).unwrap();
        let sources = manager.value_sources(node, width);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].value(), &PropertyValue::Float(2.0));
        assert_eq!(sources[0].owner(), SourceOwner::MANAGER);
        assert_eq!(sources[0].precedence(), Precedence::Local);
    }

    #[test]
    fn failed_modifier_keeps_committed_state() {
        let (mut manager, width, node) = setup();
        manager.set(node, width, 1.0).unwrap();
        manager
            .add_value_modifier(node, width, |v| match v {
                PropertyValue::Float(f) if *f < 0.0 => Err(ModifierError::new("negative width")),
                _ => Ok(()),
            })
            .unwrap();

        let err = manager.set(node, width, -5.0).unwrap_err();
        assert!(matches!(err, PropertyError::ModifierFailure { .. }));
        assert_eq!(manager.get(node, width).unwrap(), Some(1.0));
        assert_eq!(manager.value_sources(node, width).len(), 1);
    }

    #[test]
    fn removal_is_not_refused_by_modifiers() {
        let (mut manager, width, node) = setup();
        let owner = SourceOwner::new(3);
        manager.set(node, width, 4.0).unwrap();
        let handle = manager
            .add_value_source(node, width, 3.0, Precedence::Class, owner)
            .unwrap();
        let last = Rc::new(Cell::new(0.0));
        let seen = last.clone();
        manager
            .add_notification_handler(Some(node), width, move |_, change| {
                if let Some(PropertyValue::Float(f)) = change.value {
                    seen.set(f);
                }
            })
            .unwrap();
        manager
            .add_value_modifier(node, width, |v| match v {
                PropertyValue::Float(f) if *f < 4.0 => Err(ModifierError::new("too small")),
                _ => Ok(()),
            })
            .unwrap();

        assert!(manager.remove_local(node, width));
        assert_eq!(last.get(), 3.0);
        assert!(manager.remove_value_source(node, width, handle, owner));
        assert!(manager.value_sources(node, width).is_empty());
        // Kept alive by the handler and the modifier.
        assert!(manager.has_storage(node, width));
        assert!(manager.was_property_removed(node, width));
    }

    #[test]
    fn change_flags_accumulate_and_drain() {
        let (mut manager, width, node) = setup();
        manager.set(node, width, 1.0).unwrap();
        assert_eq!(
            manager.change_flags(node),
            ChangeFlags::LAYOUT | ChangeFlags::RENDER
        );
        assert_eq!(
            manager.take_change_flags(node),
            ChangeFlags::LAYOUT | ChangeFlags::RENDER
        );
        assert!(manager.change_flags(node).is_empty());
    }

    #[test]
    fn layout_bit_is_batched_until_outermost_resume() {
        let (mut manager, width, node) = setup();
        manager.suspend_layout_invalidation();
        manager.suspend_layout_invalidation();
        manager.set(node, width, 1.0).unwrap();
        manager.set(node, width, 2.0).unwrap();
        assert_eq!(manager.change_flags(node), ChangeFlags::RENDER);

        manager.resume_layout_invalidation();
        assert!(manager.is_layout_invalidation_suspended());
        assert_eq!(manager.change_flags(node), ChangeFlags::RENDER);

        manager.resume_layout_invalidation();
        assert!(!manager.is_layout_invalidation_suspended());
        assert_eq!(
            manager.change_flags(node),
            ChangeFlags::LAYOUT | ChangeFlags::RENDER
        );

        // Unbalanced resumes are ignored.
        manager.resume_layout_invalidation();
        assert!(!manager.is_layout_invalidation_suspended());
    }

    #[test]
    fn read_only_rejects_set_but_accepts_sources() {
        let mut manager = PropertyManager::new();
        let actual = manager
            .register(PropertyTypeBuilder::new("ActualWidth", 0.0_f32).read_only(true))
            .unwrap();
        let node = manager.create_object().unwrap();
        assert_eq!(
            manager.set(node, actual, 1.0),
            Err(PropertyError::ReadOnly {
                name: "ActualWidth".into()
            })
        );
        manager
            .add_value_source(node, actual, 2.0, Precedence::StateManager, SourceOwner::new(9))
            .unwrap();
        assert_eq!(manager.get(node, actual).unwrap(), Some(2.0));
    }

    #[test]
    fn stale_objects_are_rejected() {
        let (mut manager, width, node) = setup();
        manager.destroy_object(node).unwrap();
        assert_eq!(
            manager.set(node, width, 1.0),
            Err(PropertyError::StaleObject(node))
        );
        assert_eq!(manager.destroy_object(node), Err(PropertyError::StaleObject(node)));
    }

    #[test]
    fn copy_properties_skips_non_copyable() {
        let (mut manager, width, source) = setup();
        let height = manager
            .register(PropertyTypeBuilder::new("Height", 0.0_f32))
            .unwrap();
        let target = manager.create_object().unwrap();
        manager.set(source, width, 10.0).unwrap();
        manager.set(source, height, 20.0).unwrap();
        manager.set_property_copyable(source, height, false).unwrap();

        assert_eq!(manager.copy_properties(source, target).unwrap(), 1);
        assert_eq!(manager.get(target, width).unwrap(), Some(10.0));
        assert_eq!(manager.get(target, height).unwrap(), None);
        assert!(!manager.copy_property(source, target, height).unwrap());
    }

    #[test]
    fn copy_properties_is_all_or_nothing() {
        let (mut manager, width, source) = setup();
        let height = manager
            .register(PropertyTypeBuilder::new("Height", 0.0_f32))
            .unwrap();
        let target = manager.create_object().unwrap();
        manager.set(source, width, 10.0).unwrap();
        manager.set(source, height, 20.0).unwrap();
        manager
            .add_value_modifier(target, height, |_| Err(ModifierError::new("locked")))
            .unwrap();

        assert!(manager.copy_properties(source, target).is_err());
        assert!(manager.value_sources(target, width).is_empty());
        assert!(manager.value_sources(target, height).is_empty());
        assert!(!manager.has_storage(target, width));
    }

    #[test]
    fn teardown_drops_storage_and_links() {
        let (mut manager, width, node) = setup();
        manager.set(node, width, 1.0).unwrap();
        manager.remove_object_properties(node);
        assert!(!manager.has_storage(node, width));
        assert!(!manager.change_flags(node).is_empty());
        manager.unlink_properties(node);
        assert!(manager.change_flags(node).is_empty());
        assert!(manager.contains_object(node));
    }

    #[test]
    fn unregister_checks_live_storage() {
        let (mut manager, width, node) = setup();
        manager.set(node, width, 1.0).unwrap();
        assert_eq!(
            manager.unregister_property_type(width),
            Err(PropertyError::TypeInUse {
                name: "Width".into(),
                live: 1
            })
        );
        manager.remove_local(node, width);
        manager.unregister_property_type(width).unwrap();
        assert!(manager.property_type(width).is_none());
    }
}
