// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value resolution.
//!
//! A lookup of `property` on `object` proceeds as follows:
//!
//! 1. The object's own storage, if it has at least one value source. Storage
//!    kept alive only by handlers, modifiers or flags does not count.
//! 2. Otherwise the object's property groups, most recently added first.
//!    Groups may have groups of their own; those are searched the same way.
//! 3. For the `*_inherited` getters, if the type is inherited and the object
//!    is a scene node, the same lookup on its parent, up to the root.
//!
//! The winning value source of the storage found is then run through that
//! storage's modifier chain. When the value comes from a group, the chains of
//! the storages it passed through run after it, ending with the object's own.

use crate::error::{ModifierError, PropertyError};
use crate::id::{ObjectKey, PropertyType, PropertyTypeId};
use crate::manager::PropertyManager;
use crate::object::{ObjectKind, ParentLookup};
use crate::storage::{PropertyStorage, TypeStorage};
use crate::value::{PropertyKind, PropertyValue};

/// A resolved value and the modifier failure that cut its chain short.
struct Resolved {
    value: PropertyValue,
    failure: Option<ModifierError>,
}

impl PropertyManager {
    /// Resolves `property` on `object`.
    ///
    /// Returns `Ok(None)` if neither the object nor its groups have a value.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::ModifierFailure`] if a modifier fails.
    pub fn get<T: PropertyKind>(
        &self,
        object: ObjectKey,
        property: PropertyType<T>,
    ) -> Result<Option<T>, PropertyError> {
        Ok(self
            .get_value(object, property.id())?
            .and_then(|v| T::try_from_value(v).ok()))
    }

    /// Untyped variant of [`PropertyManager::get`].
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::get`].
    pub fn get_value(
        &self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
    ) -> Result<Option<PropertyValue>, PropertyError> {
        let property = property.into();
        match self.resolve(object, property) {
            None => Ok(None),
            Some(Resolved {
                failure: Some(source),
                ..
            }) => Err(self.modifier_failure(property, source)),
            Some(Resolved { value, .. }) => Ok(Some(value)),
        }
    }

    /// Resolves `property` on `object`, falling back to the type's default.
    ///
    /// Never fails: a modifier failure is logged and the value the chain had
    /// produced so far is returned.
    ///
    /// # Panics
    ///
    /// Panics if the property type is not registered.
    #[must_use]
    pub fn get_default<T: PropertyKind>(&self, object: ObjectKey, property: PropertyType<T>) -> T {
        let value = self
            .resolve_lenient(object, property.id())
            .unwrap_or_else(|| self.default_value(property.id()).clone());
        typed(value)
    }

    /// Untyped variant of [`PropertyManager::get_default`].
    ///
    /// # Panics
    ///
    /// Panics if the property type is not registered.
    #[must_use]
    pub fn get_value_default(
        &self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
    ) -> PropertyValue {
        let property = property.into();
        self.resolve_lenient(object, property)
            .unwrap_or_else(|| self.default_value(property).clone())
    }

    /// Resolves `property` on `object`, walking up the scene graph for
    /// inherited types.
    ///
    /// The walk continues while the type is inherited and the current object
    /// is a scene node, and ends at the root with `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::ModifierFailure`] if a modifier fails on the
    /// object that provides the value.
    pub fn get_inherited<T: PropertyKind>(
        &self,
        object: ObjectKey,
        property: PropertyType<T>,
        parents: &(impl ParentLookup + ?Sized),
    ) -> Result<Option<T>, PropertyError> {
        Ok(self
            .get_inherited_value(object, property.id(), parents)?
            .and_then(|v| T::try_from_value(v).ok()))
    }

    /// Untyped variant of [`PropertyManager::get_inherited`].
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::get_inherited`].
    pub fn get_inherited_value(
        &self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
        parents: &(impl ParentLookup + ?Sized),
    ) -> Result<Option<PropertyValue>, PropertyError> {
        let property = property.into();
        let mut found = None;
        self.walk_ancestors(object, property, parents, |manager, current| {
            found = manager.get_value(current, property).transpose();
            found.is_some()
        });
        found.transpose()
    }

    /// Resolves an inherited property, falling back to the type's default.
    ///
    /// # Panics
    ///
    /// Panics if the property type is not registered.
    #[must_use]
    pub fn get_inherited_default<T: PropertyKind>(
        &self,
        object: ObjectKey,
        property: PropertyType<T>,
        parents: &(impl ParentLookup + ?Sized),
    ) -> T {
        let mut found = None;
        self.walk_ancestors(object, property.id(), parents, |manager, current| {
            found = manager.resolve_lenient(current, property.id());
            found.is_some()
        });
        typed(found.unwrap_or_else(|| self.default_value(property.id()).clone()))
    }

    /// Visits `object` and then its ancestors until `visit` returns `true`.
    ///
    /// The walk is bounded by the number of live objects, so a cyclic parent
    /// lookup terminates.
    fn walk_ancestors(
        &self,
        object: ObjectKey,
        property: PropertyTypeId,
        parents: &(impl ParentLookup + ?Sized),
        mut visit: impl FnMut(&Self, ObjectKey) -> bool,
    ) {
        let inherited = self
            .registry
            .get(property)
            .is_some_and(|d| d.is_inherited());
        let mut current = object;
        for _ in 0..=self.objects.len() {
            if visit(self, current) {
                return;
            }
            if !inherited || self.objects.kind(current) != Some(ObjectKind::Node) {
                return;
            }
            match parents.parent(current) {
                Some(parent) => current = parent,
                None => return,
            }
        }
        log::warn!("parent chain of {object:?} does not reach a root");
    }

    fn resolve(&self, object: ObjectKey, property: PropertyTypeId) -> Option<Resolved> {
        let ts = self.types.get(&property)?;
        self.resolve_in(ts, object)
    }

    /// Resolves without failing; modifier failures are logged.
    pub(crate) fn resolve_lenient(
        &self,
        object: ObjectKey,
        property: PropertyTypeId,
    ) -> Option<PropertyValue> {
        let Resolved { value, failure } = self.resolve(object, property)?;
        if let Some(source) = failure {
            log::warn!("using partially modified value of {property} on {object:?}: {source}");
        }
        Some(value)
    }

    /// Resolves on `object` alone or through its groups.
    ///
    /// A storage without sources still runs its modifier chain over the
    /// value its groups provide.
    fn resolve_in(&self, ts: &TypeStorage, object: ObjectKey) -> Option<Resolved> {
        let own = ts.storages.get(&object);
        let mut resolved = match own.and_then(PropertyStorage::top) {
            Some(top) => Resolved {
                value: top.value.clone(),
                failure: None,
            },
            // Groups cannot form cycles; see `add_property_group`.
            None => self
                .groups
                .get(&object)?
                .iter()
                .rev()
                .find_map(|group| self.resolve_in(ts, *group))?,
        };
        if let Some(storage) = own.filter(|_| resolved.failure.is_none()) {
            resolved.failure = storage.modifiers.apply(&mut resolved.value).err();
        }
        Some(resolved)
    }

    fn default_value(&self, property: PropertyTypeId) -> &PropertyValue {
        match self.registry.get(property) {
            Some(descriptor) => descriptor.default_value(),
            None => panic!("property type {property} is not registered"),
        }
    }
}

fn typed<T: PropertyKind>(value: PropertyValue) -> T {
    match T::try_from_value(value) {
        Ok(value) => value,
        Err(value) => panic!(
            "property value of kind {:?} does not hold {:?}",
            value.data_type(),
            T::DATA_TYPE
        ),
    }
}
