// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property type descriptors.
//!
//! This module provides [`PropertyTypeDescriptor`], the immutable definition of
//! a property type, and [`PropertyTypeBuilder`] for typed construction.

use alloc::borrow::Cow;
use core::marker::PhantomData;

use crate::flags::ChangeFlags;
use crate::value::{PropertyDataType, PropertyKind, PropertyValue};

/// The definition of a property type.
///
/// The data kind is that of the default value.
///
/// # Example
///
/// ```rust
/// use tessera_property::{ChangeFlags, PropertyDataType, PropertyTypeDescriptor};
///
/// let opacity = PropertyTypeDescriptor::new("Opacity", 1.0_f32)
///     .with_inherited(true)
///     .with_change_flags(ChangeFlags::RENDER);
///
/// assert_eq!(opacity.name(), "Opacity");
/// assert_eq!(opacity.data_type(), PropertyDataType::Float);
/// assert!(opacity.is_inherited());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyTypeDescriptor {
    name: Cow<'static, str>,
    default_value: PropertyValue,
    inherited: bool,
    change_flags: ChangeFlags,
    read_only: bool,
}

impl PropertyTypeDescriptor {
    /// Creates a descriptor with the given name and default value.
    ///
    /// The type is not inherited, affects no change flags and is writable.
    #[must_use]
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        default_value: impl Into<PropertyValue>,
    ) -> Self {
        Self {
            name: name.into(),
            default_value: default_value.into(),
            inherited: false,
            change_flags: ChangeFlags::empty(),
            read_only: false,
        }
    }

    /// Sets whether missing values fall back to the scene-graph parent.
    #[must_use]
    pub fn with_inherited(mut self, inherited: bool) -> Self {
        self.inherited = inherited;
        self
    }

    /// Sets the flags a change of this property raises on its object.
    #[must_use]
    pub fn with_change_flags(mut self, flags: ChangeFlags) -> Self {
        self.change_flags = flags;
        self
    }

    /// Sets whether [`PropertyManager::set`](crate::PropertyManager::set) is
    /// rejected for this type.
    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Returns the property name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_key(&self) -> &Cow<'static, str> {
        &self.name
    }

    /// Returns the data kind.
    #[must_use]
    #[inline]
    pub fn data_type(&self) -> PropertyDataType {
        self.default_value.data_type()
    }

    /// Returns the compiled default value.
    #[must_use]
    #[inline]
    pub fn default_value(&self) -> &PropertyValue {
        &self.default_value
    }

    /// Returns whether the type inherits from the scene-graph parent.
    #[must_use]
    #[inline]
    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    /// Returns the change flags raised by a change.
    #[must_use]
    #[inline]
    pub fn change_flags(&self) -> ChangeFlags {
        self.change_flags
    }

    /// Returns whether the type rejects local values.
    #[must_use]
    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Typed builder for a [`PropertyTypeDescriptor`].
///
/// Register the result with
/// [`PropertyManager::register`](crate::PropertyManager::register) to get a
/// [`PropertyType<T>`](crate::PropertyType) handle.
///
/// # Example
///
/// ```rust
/// use tessera_property::{ChangeFlags, PropertyManager, PropertyTypeBuilder};
///
/// let mut manager = PropertyManager::new();
/// let width = manager
///     .register(PropertyTypeBuilder::new("Width", 0.0_f32).change_flags(ChangeFlags::LAYOUT))
///     .unwrap();
///
/// let node = manager.create_object().unwrap();
/// assert_eq!(manager.get_default(node, width), 0.0);
/// ```
#[derive(Debug)]
pub struct PropertyTypeBuilder<T> {
    descriptor: PropertyTypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PropertyKind> PropertyTypeBuilder<T> {
    /// Creates a builder with the given name and default value.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, default_value: T) -> Self {
        Self {
            descriptor: PropertyTypeDescriptor::new(name, default_value.into_value()),
            _marker: PhantomData,
        }
    }

    /// Sets whether missing values fall back to the scene-graph parent.
    #[must_use]
    pub fn inherited(mut self, inherited: bool) -> Self {
        self.descriptor.inherited = inherited;
        self
    }

    /// Sets the change flags raised by a change.
    #[must_use]
    pub fn change_flags(mut self, flags: ChangeFlags) -> Self {
        self.descriptor.change_flags = flags;
        self
    }

    /// Marks the type read-only.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.descriptor.read_only = read_only;
        self
    }

    /// Returns the finished descriptor.
    #[must_use]
    pub fn build(self) -> PropertyTypeDescriptor {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peniko::Color;

    #[test]
    fn descriptor_defaults() {
        let descriptor = PropertyTypeDescriptor::new("Visible", true);
        assert_eq!(descriptor.data_type(), PropertyDataType::Bool);
        assert_eq!(descriptor.default_value(), &PropertyValue::Bool(true));
        assert!(!descriptor.is_inherited());
        assert!(!descriptor.is_read_only());
        assert!(descriptor.change_flags().is_empty());
    }

    #[test]
    fn builder_sets_every_field() {
        let descriptor = PropertyTypeBuilder::new("ClearColor", Color::new([0.4, 0.4, 0.4, 1.0]))
            .inherited(true)
            .change_flags(ChangeFlags::RENDER)
            .read_only(true)
            .build();
        assert_eq!(descriptor.name(), "ClearColor");
        assert_eq!(descriptor.data_type(), PropertyDataType::Color);
        assert!(descriptor.is_inherited());
        assert!(descriptor.is_read_only());
        assert_eq!(descriptor.change_flags(), ChangeFlags::RENDER);
    }

    #[test]
    fn descriptors_compare_by_content() {
        let a = PropertyTypeDescriptor::new("Width", 0.0_f32);
        let b = PropertyTypeBuilder::new("Width", 0.0_f32).build();
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_change_flags(ChangeFlags::LAYOUT));
    }
}
