// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property groups.
//!
//! A group is an object key of kind [`ObjectKind::Group`] that holds property
//! values like any other object. Associating it with objects makes its values
//! a fallback for them: a lookup that finds no value on the object itself
//! tries its groups, most recently added first.

use alloc::vec::Vec;

use smallvec::SmallVec;

use crate::error::PropertyError;
use crate::id::ObjectKey;
use crate::manager::PropertyManager;
use crate::object::ObjectKind;

/// The groups associated with one object, in association order.
pub(crate) type GroupList = SmallVec<[ObjectKey; 2]>;

impl PropertyManager {
    /// Creates an empty property group.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::AllocationFailure`] if the arena cannot grow.
    pub fn create_property_group(&mut self) -> Result<ObjectKey, PropertyError> {
        self.objects.insert(ObjectKind::Group)
    }

    /// Associates `group` with `object`.
    ///
    /// Returns `false` if the group is already associated. No notifications
    /// are dispatched.
    ///
    /// # Errors
    ///
    /// - [`PropertyError::NotAGroup`] if `group` is not a property group.
    /// - [`PropertyError::GroupCycle`] if `object` is reachable from `group`
    ///   through group associations, including `group == object`.
    /// - [`PropertyError::StaleObject`] or [`PropertyError::AllocationFailure`].
    pub fn add_property_group(
        &mut self,
        object: ObjectKey,
        group: ObjectKey,
    ) -> Result<bool, PropertyError> {
        self.require_object(object)?;
        self.require_group(group)?;
        if self.has_property_group(object, group) {
            return Ok(false);
        }
        if self.group_reaches(group, object) {
            return Err(PropertyError::GroupCycle { object, group });
        }
        self.groups.try_reserve(1)?;
        let list = self.groups.entry(object).or_default();
        list.try_reserve(1)?;
        list.push(group);
        Ok(true)
    }

    /// Removes the association of `group` with `object`.
    ///
    /// Returns `false` if the group was not associated.
    pub fn remove_property_group(&mut self, object: ObjectKey, group: ObjectKey) -> bool {
        let Some(list) = self.groups.get_mut(&object) else {
            return false;
        };
        let Some(idx) = list.iter().position(|g| *g == group) else {
            return false;
        };
        list.remove(idx);
        if list.is_empty() {
            self.groups.remove(&object);
        }
        true
    }

    /// Returns `true` if `group` is associated with `object`.
    #[must_use]
    pub fn has_property_group(&self, object: ObjectKey, group: ObjectKey) -> bool {
        self.property_groups(object).contains(&group)
    }

    /// Returns the groups associated with `object`, oldest first.
    #[must_use]
    pub fn property_groups(&self, object: ObjectKey) -> &[ObjectKey] {
        self.groups.get(&object).map_or(&[], |list| list.as_slice())
    }

    /// Associates every group of `source` with `target` as well.
    ///
    /// Groups `target` already has are skipped. Either all groups are added
    /// or, on error, none. Returns the number of groups added.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::add_property_group`].
    pub fn copy_property_groups(
        &mut self,
        source: ObjectKey,
        target: ObjectKey,
    ) -> Result<usize, PropertyError> {
        self.require_object(source)?;
        self.require_object(target)?;
        let mut additions = Vec::new();
        for &group in self.property_groups(source) {
            if self.has_property_group(target, group) || additions.contains(&group) {
                continue;
            }
            if self.group_reaches(group, target) {
                return Err(PropertyError::GroupCycle {
                    object: target,
                    group,
                });
            }
            additions.try_reserve(1)?;
            additions.push(group);
        }
        if additions.is_empty() {
            return Ok(0);
        }

        let mut list: GroupList = self.property_groups(target).iter().copied().collect();
        list.try_reserve(additions.len())?;
        list.extend(additions.iter().copied());
        self.groups.try_reserve(1)?;
        self.groups.insert(target, list);
        Ok(additions.len())
    }

    /// Copies every copyable property value of `source` into `target` as
    /// local values.
    ///
    /// All values are staged before any is committed, so on error `target`
    /// is left unchanged. Returns the number of properties copied.
    ///
    /// # Errors
    ///
    /// [`PropertyError::NotAGroup`] if either key is not a group, plus any
    /// error of staging a value on `target`.
    pub fn copy_property_group_content(
        &mut self,
        source: ObjectKey,
        target: ObjectKey,
    ) -> Result<usize, PropertyError> {
        self.require_group(source)?;
        self.require_group(target)?;
        let values = self.copyable_values(source)?;
        self.write_batch(target, values)
    }

    fn require_group(&self, group: ObjectKey) -> Result<(), PropertyError> {
        match self.require_object(group)? {
            ObjectKind::Group => Ok(()),
            _ => Err(PropertyError::NotAGroup(group)),
        }
    }

    /// Returns `true` if `target` is `from` or reachable from it through
    /// group associations.
    fn group_reaches(&self, from: ObjectKey, target: ObjectKey) -> bool {
        from == target
            || self
                .property_groups(from)
                .iter()
                .any(|g| self.group_reaches(*g, target))
    }
}
