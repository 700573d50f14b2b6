// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property type registry.
//!
//! Types are registered once and looked up by id or, in O(1), by name.
//! Unregistering frees the slot; the generation in [`PropertyTypeId`] keeps
//! old ids from aliasing a later registration.

use alloc::borrow::Cow;
use alloc::string::ToString;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::error::PropertyError;
use crate::id::{PropertyType, PropertyTypeId};
use crate::manager::PropertyManager;
use crate::metadata::{PropertyTypeBuilder, PropertyTypeDescriptor};
use crate::storage::TypeStorage;
use crate::value::{PropertyKind, check_kind};

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    descriptor: Option<PropertyTypeDescriptor>,
}

/// Descriptor slots plus the name index.
#[derive(Clone, Debug, Default)]
pub(crate) struct TypeRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_name: HashMap<Cow<'static, str>, PropertyTypeId>,
}

impl TypeRegistry {
    /// Inserts `descriptor`, or returns the id it is already registered under.
    ///
    /// The flag is `true` for a new registration.
    pub(crate) fn insert(
        &mut self,
        descriptor: PropertyTypeDescriptor,
    ) -> Result<(PropertyTypeId, bool), PropertyError> {
        if let Some(&id) = self.by_name.get(descriptor.name()) {
            return if self.get(id) == Some(&descriptor) {
                Ok((id, false))
            } else {
                Err(PropertyError::NameConflict {
                    name: descriptor.name().to_string(),
                })
            };
        }

        self.by_name.try_reserve(1)?;
        let id = if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation = slot.generation.wrapping_add(1);
            PropertyTypeId::new(idx, slot.generation)
        } else {
            let idx =
                u32::try_from(self.slots.len()).map_err(|_| PropertyError::AllocationFailure)?;
            self.slots.try_reserve(1)?;
            self.free
                .try_reserve(self.slots.len() + 1 - self.free.len())?;
            self.slots.push(Slot {
                generation: 1,
                descriptor: None,
            });
            PropertyTypeId::new(idx, 1)
        };
        self.by_name.insert(descriptor.name_key().clone(), id);
        self.slots[id.index() as usize].descriptor = Some(descriptor);
        Ok((id, true))
    }

    pub(crate) fn remove(&mut self, id: PropertyTypeId) -> Option<PropertyTypeDescriptor> {
        let slot = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|s| s.generation == id.generation())?;
        let descriptor = slot.descriptor.take()?;
        self.by_name.remove(descriptor.name());
        self.free.push(id.index());
        Some(descriptor)
    }

    pub(crate) fn get(&self, id: PropertyTypeId) -> Option<&PropertyTypeDescriptor> {
        self.slots
            .get(id.index() as usize)
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.descriptor.as_ref())
    }

    pub(crate) fn by_name(&self, name: &str) -> Option<PropertyTypeId> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_name.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (PropertyTypeId, &PropertyTypeDescriptor)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            #[expect(clippy::cast_possible_truncation, reason = "slot count fits in u32")]
            let id = PropertyTypeId::new(i as u32, s.generation);
            s.descriptor.as_ref().map(|d| (id, d))
        })
    }
}

impl PropertyManager {
    /// Registers a property type.
    ///
    /// Registering a descriptor identical to an existing one returns the
    /// existing id.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::NameConflict`] if the name is bound to a
    /// different descriptor, or [`PropertyError::AllocationFailure`].
    pub fn register_property_type(
        &mut self,
        descriptor: PropertyTypeDescriptor,
    ) -> Result<PropertyTypeId, PropertyError> {
        self.types.try_reserve(1)?;
        let (id, fresh) = self.registry.insert(descriptor)?;
        if fresh {
            self.types.insert(id, TypeStorage::default());
            log::debug!(
                "registered property type `{}` as {id}",
                self.registry.get(id).map_or("", PropertyTypeDescriptor::name)
            );
        }
        Ok(id)
    }

    /// Registers a property type from a typed builder.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::register_property_type`].
    pub fn register<T: PropertyKind>(
        &mut self,
        builder: PropertyTypeBuilder<T>,
    ) -> Result<PropertyType<T>, PropertyError> {
        self.register_property_type(builder.build())
            .map(PropertyType::from_id)
    }

    /// Unregisters a property type.
    ///
    /// Type-scoped notification handlers are dropped with it.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::TypeInUse`] while any object still holds
    /// storage for the type, or [`PropertyError::UnknownPropertyType`].
    pub fn unregister_property_type(
        &mut self,
        property: impl Into<PropertyTypeId>,
    ) -> Result<(), PropertyError> {
        let property = property.into();
        let live = self.type_storage(property)?.storages.len();
        if live > 0 {
            return Err(PropertyError::TypeInUse {
                name: self.descriptor(property)?.name().to_string(),
                live,
            });
        }
        self.types.remove(&property);
        if let Some(descriptor) = self.registry.remove(property) {
            log::debug!(
                "unregistered property type `{}` ({property})",
                descriptor.name()
            );
        }
        Ok(())
    }

    /// Looks up a property type by name.
    #[must_use]
    pub fn find_property_type_by_name(&self, name: &str) -> Option<PropertyTypeId> {
        self.registry.by_name(name)
    }

    /// Returns the descriptor of a registered property type.
    #[must_use]
    pub fn property_type(
        &self,
        property: impl Into<PropertyTypeId>,
    ) -> Option<&PropertyTypeDescriptor> {
        self.registry.get(property.into())
    }

    /// Returns a typed handle for a registered property type.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::UnknownPropertyType`], or
    /// [`PropertyError::TypeMismatch`] if the type does not hold `T`.
    pub fn typed<T: PropertyKind>(
        &self,
        property: PropertyTypeId,
    ) -> Result<PropertyType<T>, PropertyError> {
        check_kind(self.descriptor(property)?.data_type(), T::DATA_TYPE)?;
        Ok(PropertyType::from_id(property))
    }

    /// Returns an iterator over all registered property types.
    pub fn property_types(
        &self,
    ) -> impl Iterator<Item = (PropertyTypeId, &PropertyTypeDescriptor)> {
        self.registry.iter()
    }

    /// Returns the number of registered property types.
    #[must_use]
    pub fn property_type_count(&self) -> usize {
        self.registry.len()
    }

    pub(crate) fn descriptor(
        &self,
        property: PropertyTypeId,
    ) -> Result<&PropertyTypeDescriptor, PropertyError> {
        self.registry
            .get(property)
            .ok_or(PropertyError::UnknownPropertyType(property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::ChangeFlags;
    use crate::value::PropertyDataType;
    use alloc::vec;

    #[test]
    fn registry_reuses_slots() {
        let mut registry = TypeRegistry::default();
        let (width, fresh) = registry
            .insert(PropertyTypeDescriptor::new("Width", 0.0_f32))
            .unwrap();
        assert!(fresh);
        assert_eq!(registry.by_name("Width"), Some(width));

        assert!(registry.remove(width).is_some());
        assert_eq!(registry.by_name("Width"), None);
        assert!(registry.get(width).is_none());

        let (height, _) = registry
            .insert(PropertyTypeDescriptor::new("Height", 0.0_f32))
            .unwrap();
        assert_eq!(height.index(), width.index());
        assert_ne!(height, width);
        assert!(registry.get(width).is_none());
    }

    #[test]
    fn identical_registration_is_idempotent() {
        let mut manager = PropertyManager::new();
        let a = manager
            .register_property_type(PropertyTypeDescriptor::new("Opacity", 1.0_f32))
            .unwrap();
        let b = manager
            .register_property_type(PropertyTypeDescriptor::new("Opacity", 1.0_f32))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(manager.property_type_count(), 1);
    }

    #[test]
    fn conflicting_registration_is_rejected() {
        let mut manager = PropertyManager::new();
        manager
            .register_property_type(PropertyTypeDescriptor::new("Opacity", 1.0_f32))
            .unwrap();
        let err = manager
            .register_property_type(
                PropertyTypeDescriptor::new("Opacity", 1.0_f32)
                    .with_change_flags(ChangeFlags::RENDER),
            )
            .unwrap_err();
        assert_eq!(
            err,
            PropertyError::NameConflict {
                name: "Opacity".into()
            }
        );
    }

    #[test]
    fn typed_checks_data_kind() {
        let mut manager = PropertyManager::new();
        let id = manager
            .register_property_type(PropertyTypeDescriptor::new("Count", 0_i32))
            .unwrap();
        assert!(manager.typed::<i32>(id).is_ok());
        assert_eq!(
            manager.typed::<f32>(id).unwrap_err(),
            PropertyError::TypeMismatch {
                expected: PropertyDataType::Int,
                found: PropertyDataType::Float,
            }
        );
    }

    #[test]
    fn unregister_frees_name() {
        let mut manager = PropertyManager::new();
        let id = manager
            .register_property_type(PropertyTypeDescriptor::new("Width", 0.0_f32))
            .unwrap();
        manager.unregister_property_type(id).unwrap();
        assert_eq!(manager.find_property_type_by_name("Width"), None);
        assert_eq!(
            manager.unregister_property_type(id),
            Err(PropertyError::UnknownPropertyType(id))
        );
    }

    #[test]
    fn iteration_in_slot_order() {
        let mut manager = PropertyManager::new();
        manager
            .register_property_type(PropertyTypeDescriptor::new("Width", 0.0_f32))
            .unwrap();
        manager
            .register_property_type(PropertyTypeDescriptor::new("Height", 0.0_f32))
            .unwrap();
        let names: Vec<_> = manager.property_types().map(|(_, d)| d.name()).collect();
        assert_eq!(names, vec!["Width", "Height"]);
    }
}
