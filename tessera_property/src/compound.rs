// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct and array values.
//!
//! Neither kind stores its contents inline. A [`StructValue`] is a handle to a
//! synthetic object key of kind [`ObjectKind::Struct`] whose fields are
//! ordinary properties on that key. An [`ArrayValue`] is a handle to a key of
//! kind [`ObjectKind::Array`] whose elements live in the manager, all of one
//! fixed [`PropertyDataType`].
//!
//! A struct or array value is owned by the property, field or element holding
//! it. Overwriting or removing it, or destroying its holder, destroys the key
//! and everything nested inside. Copying properties between objects copies
//! struct and array contents deeply; storing one handle in two places is not
//! tracked and leaves the second holder with a stale key once the first lets
//! go. Values cannot contain themselves, directly or through nesting.

use alloc::vec::Vec;

use crate::error::PropertyError;
use crate::id::{ObjectKey, PropertyType, PropertyTypeId, SourceOwner};
use crate::manager::PropertyManager;
use crate::metadata::PropertyTypeDescriptor;
use crate::object::ObjectKind;
use crate::storage::Precedence;
use crate::value::{PropertyDataType, PropertyKind, PropertyValue, check_kind};

/// A handle to a struct: a bag of properties.
///
/// The default value is the null struct, which has no fields and is used as
/// the default of struct-typed properties.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructValue {
    key: ObjectKey,
}

impl Default for StructValue {
    fn default() -> Self {
        Self {
            key: ObjectKey::NULL,
        }
    }
}

impl StructValue {
    /// Returns the key the fields are stored on.
    ///
    /// The key accepts every property operation, so fields can carry value
    /// sources and modifiers like any other property.
    #[must_use]
    pub fn key(self) -> ObjectKey {
        self.key
    }

    /// Returns `true` for the null struct.
    #[must_use]
    pub fn is_null(self) -> bool {
        self.key.is_null()
    }
}

/// A handle to an array with a fixed element kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayValue {
    key: ObjectKey,
    element: PropertyDataType,
}

impl ArrayValue {
    /// The null array of `element`s.
    ///
    /// Used as the default of array-typed properties.
    #[must_use]
    pub fn empty(element: PropertyDataType) -> Self {
        Self {
            key: ObjectKey::NULL,
            element,
        }
    }

    /// Returns the key the elements are stored under.
    #[must_use]
    pub fn key(self) -> ObjectKey {
        self.key
    }

    /// Returns the element kind.
    #[must_use]
    pub fn element(self) -> PropertyDataType {
        self.element
    }

    /// Returns `true` for a null array.
    #[must_use]
    pub fn is_null(self) -> bool {
        self.key.is_null()
    }
}

/// The elements behind a live array key.
#[derive(Clone, Debug)]
pub(crate) struct ArrayData {
    pub(crate) element: PropertyDataType,
    pub(crate) items: Vec<PropertyValue>,
}

/// A detached copy of a value, with struct and array contents read out.
enum Snapshot {
    Plain(PropertyValue),
    Struct(Vec<(PropertyTypeDescriptor, Snapshot)>),
    Array(PropertyDataType, Vec<Snapshot>),
}

impl PropertyManager {
    /// Creates an empty struct.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::AllocationFailure`] if the arena cannot grow.
    pub fn create_struct(&mut self) -> Result<StructValue, PropertyError> {
        let key = self.objects.insert(ObjectKind::Struct)?;
        Ok(StructValue { key })
    }

    /// Sets a field of `structure`.
    ///
    /// # Errors
    ///
    /// [`PropertyError::StaleObject`] if the struct was destroyed (or is the
    /// null struct), plus the errors of [`PropertyManager::set`].
    pub fn set_field<T: PropertyKind>(
        &mut self,
        structure: StructValue,
        field: PropertyType<T>,
        value: T,
    ) -> Result<(), PropertyError> {
        let key = self.live_compound(structure.key, ObjectKind::Struct)?;
        self.set_value(key, field.id(), value.into_value())
    }

    /// Resolves a field of `structure`.
    ///
    /// # Errors
    ///
    /// [`PropertyError::StaleObject`], or the errors of
    /// [`PropertyManager::get`].
    pub fn get_field<T: PropertyKind>(
        &self,
        structure: StructValue,
        field: PropertyType<T>,
    ) -> Result<Option<T>, PropertyError> {
        let key = self.live_compound(structure.key, ObjectKind::Struct)?;
        self.get(key, field)
    }

    /// Removes a field of `structure`. Returns `false` if it was not set.
    ///
    /// # Errors
    ///
    /// [`PropertyError::StaleObject`] if the struct was destroyed.
    pub fn remove_field(
        &mut self,
        structure: StructValue,
        field: impl Into<PropertyTypeId>,
    ) -> Result<bool, PropertyError> {
        let key = self.live_compound(structure.key, ObjectKind::Struct)?;
        Ok(self.remove_local(key, field))
    }

    /// Returns every field of `structure` with its resolved value, in
    /// property type order.
    ///
    /// # Errors
    ///
    /// [`PropertyError::StaleObject`] or [`PropertyError::AllocationFailure`].
    pub fn struct_fields(
        &self,
        structure: StructValue,
    ) -> Result<Vec<(PropertyTypeId, PropertyValue)>, PropertyError> {
        let key = self.live_compound(structure.key, ObjectKind::Struct)?;
        let mut fields = Vec::new();
        for (&property, ts) in &self.types {
            if !ts.storages.get(&key).is_some_and(|s| !s.is_orphaned()) {
                continue;
            }
            if let Some(value) = self.resolve_lenient(key, property) {
                fields.try_reserve(1)?;
                fields.push((property, value));
            }
        }
        fields.sort_by_key(|(property, _)| *property);
        Ok(fields)
    }

    /// Creates an empty array of `element`s.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::AllocationFailure`] if the arena cannot grow.
    pub fn create_array(&mut self, element: PropertyDataType) -> Result<ArrayValue, PropertyError> {
        self.arrays.try_reserve(1)?;
        let key = self.objects.insert(ObjectKind::Array)?;
        self.arrays.insert(
            key,
            ArrayData {
                element,
                items: Vec::new(),
            },
        );
        Ok(ArrayValue { key, element })
    }

    /// Returns the number of elements.
    ///
    /// # Errors
    ///
    /// [`PropertyError::StaleObject`] if the array was destroyed.
    pub fn array_len(&self, array: ArrayValue) -> Result<usize, PropertyError> {
        Ok(self.array_data(array)?.items.len())
    }

    /// Returns every element.
    ///
    /// # Errors
    ///
    /// [`PropertyError::StaleObject`] if the array was destroyed.
    pub fn array_items(&self, array: ArrayValue) -> Result<&[PropertyValue], PropertyError> {
        Ok(&self.array_data(array)?.items)
    }

    /// Returns the element at `index`.
    ///
    /// # Errors
    ///
    /// [`PropertyError::StaleObject`] or [`PropertyError::IndexOutOfBounds`].
    pub fn array_value(
        &self,
        array: ArrayValue,
        index: usize,
    ) -> Result<&PropertyValue, PropertyError> {
        let items = &self.array_data(array)?.items;
        items.get(index).ok_or(PropertyError::IndexOutOfBounds {
            index,
            len: items.len(),
        })
    }

    /// Returns the element at `index` as a `T`.
    ///
    /// # Errors
    ///
    /// [`PropertyError::TypeMismatch`] if the array does not hold `T`s, plus
    /// the errors of [`PropertyManager::array_value`].
    pub fn array_get<T: PropertyKind>(
        &self,
        array: ArrayValue,
        index: usize,
    ) -> Result<T, PropertyError> {
        check_kind(self.array_data(array)?.element, T::DATA_TYPE)?;
        let value = self.array_value(array, index)?;
        value.get::<T>().ok_or(PropertyError::TypeMismatch {
            expected: T::DATA_TYPE,
            found: value.data_type(),
        })
    }

    /// Appends an element.
    ///
    /// # Errors
    ///
    /// - [`PropertyError::TypeMismatch`] if the value is not of the element kind.
    /// - [`PropertyError::CompoundCycle`] if the array would contain itself.
    /// - [`PropertyError::StaleObject`] or [`PropertyError::AllocationFailure`].
    pub fn array_push(
        &mut self,
        array: ArrayValue,
        value: impl Into<PropertyValue>,
    ) -> Result<(), PropertyError> {
        let value = value.into();
        self.check_element(array, &value)?;
        let items = &mut self.array_data_mut(array)?.items;
        items.try_reserve(1)?;
        items.push(value);
        Ok(())
    }

    /// Replaces the element at `index`, destroying a struct or array it held.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::array_push`], plus
    /// [`PropertyError::IndexOutOfBounds`].
    pub fn array_set(
        &mut self,
        array: ArrayValue,
        index: usize,
        value: impl Into<PropertyValue>,
    ) -> Result<(), PropertyError> {
        let value = value.into();
        self.check_element(array, &value)?;
        let items = &mut self.array_data_mut(array)?.items;
        let len = items.len();
        let slot = items
            .get_mut(index)
            .ok_or(PropertyError::IndexOutOfBounds { index, len })?;
        let old = core::mem::replace(slot, value);
        if old.compound_key() != items[index].compound_key() {
            self.release_compound(&old);
        }
        Ok(())
    }

    /// Removes and returns the element at `index`.
    ///
    /// A struct or array element passes to the caller, who destroys it with
    /// [`PropertyManager::destroy_object`] or stores it elsewhere.
    ///
    /// # Errors
    ///
    /// [`PropertyError::StaleObject`] or [`PropertyError::IndexOutOfBounds`].
    pub fn array_remove(
        &mut self,
        array: ArrayValue,
        index: usize,
    ) -> Result<PropertyValue, PropertyError> {
        let items = &mut self.array_data_mut(array)?.items;
        if index >= items.len() {
            return Err(PropertyError::IndexOutOfBounds {
                index,
                len: items.len(),
            });
        }
        Ok(items.remove(index))
    }

    /// Copies `value`, giving struct and array values fresh keys with copies
    /// of their contents.
    ///
    /// Other values are cloned. Pointers are copied as they are.
    ///
    /// # Errors
    ///
    /// [`PropertyError::StaleObject`] if a struct or array was destroyed, or
    /// [`PropertyError::AllocationFailure`].
    pub fn copy_value(&mut self, value: &PropertyValue) -> Result<PropertyValue, PropertyError> {
        let snapshot = self.snapshot(value)?;
        self.materialize(snapshot)
    }

    /// Copies `value` into another manager.
    ///
    /// Struct fields are mapped to property types of `target` by name; types
    /// `target` does not know yet are registered there. Object pointers are
    /// copied verbatim and mean nothing to `target` unless the caller maps
    /// them.
    ///
    /// # Errors
    ///
    /// [`PropertyError::TypeMismatch`] if a field name is registered in
    /// `target` with a different kind, plus the errors of
    /// [`PropertyManager::copy_value`].
    pub fn clone_value_into(
        &self,
        value: &PropertyValue,
        target: &mut Self,
    ) -> Result<PropertyValue, PropertyError> {
        let snapshot = self.snapshot(value)?;
        target.materialize(snapshot)
    }

    /// Destroys the key behind a live struct or array value.
    pub(crate) fn release_compound(&mut self, value: &PropertyValue) {
        let Some(key) = value.compound_key() else {
            return;
        };
        if let Some(kind @ (ObjectKind::Struct | ObjectKind::Array)) = self.objects.kind(key) {
            self.destroy_key(key, kind);
        }
    }

    /// Returns `true` if a value source of `property` on `object` still holds
    /// the struct or array behind `value`.
    pub(crate) fn holds_compound(
        &self,
        object: ObjectKey,
        property: PropertyTypeId,
        value: &PropertyValue,
    ) -> bool {
        value.compound_key().is_some_and(|key| {
            self.value_sources(object, property)
                .iter()
                .any(|e| e.value.compound_key() == Some(key))
        })
    }

    /// Fails if storing `value` in `container` would nest a destroyed or
    /// cyclic struct or array.
    pub(crate) fn check_nesting(
        &self,
        container: ObjectKey,
        value: &PropertyValue,
    ) -> Result<(), PropertyError> {
        let Some(key) = value.compound_key() else {
            return Ok(());
        };
        if !self.objects.contains(key) {
            return Err(PropertyError::StaleObject(key));
        }
        if self.compound_reaches(key, container) {
            return Err(PropertyError::CompoundCycle {
                container,
                value: key,
            });
        }
        Ok(())
    }

    fn compound_reaches(&self, from: ObjectKey, target: ObjectKey) -> bool {
        from == target
            || self
                .nested_keys(from)
                .any(|nested| self.compound_reaches(nested, target))
    }

    /// Keys of the structs and arrays stored directly inside `key`.
    fn nested_keys(&self, key: ObjectKey) -> impl Iterator<Item = ObjectKey> + '_ {
        let fields = self
            .types
            .values()
            .filter_map(move |ts| ts.storages.get(&key))
            .flat_map(|s| s.sources.iter().map(|e| &e.value));
        let items = self.arrays.get(&key).into_iter().flat_map(|d| d.items.iter());
        fields.chain(items).filter_map(PropertyValue::compound_key)
    }

    fn live_compound(
        &self,
        key: ObjectKey,
        expected: ObjectKind,
    ) -> Result<ObjectKey, PropertyError> {
        if self.objects.kind(key) == Some(expected) {
            Ok(key)
        } else {
            Err(PropertyError::StaleObject(key))
        }
    }

    fn array_data(&self, array: ArrayValue) -> Result<&ArrayData, PropertyError> {
        self.arrays
            .get(&array.key)
            .ok_or(PropertyError::StaleObject(array.key))
    }

    fn array_data_mut(&mut self, array: ArrayValue) -> Result<&mut ArrayData, PropertyError> {
        self.arrays
            .get_mut(&array.key)
            .ok_or(PropertyError::StaleObject(array.key))
    }

    fn check_element(&self, array: ArrayValue, value: &PropertyValue) -> Result<(), PropertyError> {
        check_kind(self.array_data(array)?.element, value.data_type())?;
        self.check_nesting(array.key, value)
    }

    fn snapshot(&self, value: &PropertyValue) -> Result<Snapshot, PropertyError> {
        let Some(key) = value.compound_key() else {
            return Ok(Snapshot::Plain(value.clone()));
        };
        match value {
            PropertyValue::Array(array) => {
                let data = self.array_data(*array)?;
                let mut items = Vec::new();
                items.try_reserve(data.items.len())?;
                for item in &data.items {
                    items.push(self.snapshot(item)?);
                }
                Ok(Snapshot::Array(data.element, items))
            }
            _ => {
                let key = self.live_compound(key, ObjectKind::Struct)?;
                let mut fields = Vec::new();
                let mut properties: Vec<_> = self
                    .types
                    .iter()
                    .filter_map(|(id, ts)| ts.storages.get(&key)?.top().map(|top| (*id, top)))
                    .collect();
                properties.sort_by_key(|(id, _)| *id);
                fields.try_reserve(properties.len())?;
                for (id, top) in properties {
                    let descriptor = self.descriptor(id)?.clone();
                    fields.push((descriptor, self.snapshot(&top.value)?));
                }
                Ok(Snapshot::Struct(fields))
            }
        }
    }

    fn materialize(&mut self, snapshot: Snapshot) -> Result<PropertyValue, PropertyError> {
        match snapshot {
            Snapshot::Plain(value) => Ok(value),
            Snapshot::Struct(fields) => {
                let key = self.objects.insert(ObjectKind::Struct)?;
                for (descriptor, field) in fields {
                    if let Err(err) = self.materialize_field(key, &descriptor, field) {
                        self.destroy_key(key, ObjectKind::Struct);
                        return Err(err);
                    }
                }
                Ok(PropertyValue::Struct(StructValue { key }))
            }
            Snapshot::Array(element, snapshots) => {
                let array = self.create_array(element)?;
                for item in snapshots {
                    if let Err(err) = self.materialize_item(array, item) {
                        self.destroy_key(array.key, ObjectKind::Array);
                        return Err(err);
                    }
                }
                Ok(PropertyValue::Array(array))
            }
        }
    }

    fn materialize_item(&mut self, array: ArrayValue, item: Snapshot) -> Result<(), PropertyError> {
        let value = self.materialize(item)?;
        let created = value.clone();
        if let Err(err) = self.array_push(array, value) {
            self.release_compound(&created);
            return Err(err);
        }
        Ok(())
    }

    fn materialize_field(
        &mut self,
        key: ObjectKey,
        descriptor: &PropertyTypeDescriptor,
        field: Snapshot,
    ) -> Result<(), PropertyError> {
        let property = match self.find_property_type_by_name(descriptor.name()) {
            Some(property) => {
                check_kind(self.descriptor(property)?.data_type(), descriptor.data_type())?;
                property
            }
            None => self.register_property_type(descriptor.clone())?,
        };
        let value = self.materialize(field)?;
        let created = value.clone();
        // Fields of a copy bypass the read-only check like any other copy.
        if let Err(err) =
            self.insert_source(key, property, value, Precedence::Local, SourceOwner::MANAGER)
        {
            self.release_compound(&created);
            return Err(err);
        }
        Ok(())
    }
}
