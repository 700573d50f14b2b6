// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identification types.
//!
//! This module provides [`PropertyTypeId`] for runtime property type
//! identification, [`PropertyType<T>`] for type-safe property keys, and the
//! opaque handles returned by the manager when attaching value sources,
//! modifiers and notification handlers.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::num::NonZeroU64;

/// A runtime property type identifier.
///
/// A slot index plus a generation counter. Unregistering a type frees its
/// slot; a later registration that reuses the slot bumps the generation, so a
/// stale `PropertyTypeId` never aliases the new type.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyTypeId {
    index: u32,
    generation: u32,
}

impl PropertyTypeId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index of this id.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation of this id.
    #[must_use]
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for PropertyTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyTypeId")
            .field(&self.index)
            .field(&self.generation)
            .finish()
    }
}

impl fmt::Display for PropertyTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyTypeId({}v{})", self.index, self.generation)
    }
}

/// A type-safe property type key.
///
/// This wraps a [`PropertyTypeId`] with a phantom parameter `T` naming the
/// Rust type the property resolves to (`f32`, [`Color`](peniko::Color),
/// [`Matrix4x4Value`](crate::Matrix4x4Value), ...). Handles are produced by
/// [`PropertyManager::register`](crate::PropertyManager::register) or
/// [`PropertyManager::typed`](crate::PropertyManager::typed), both of which
/// check that the registered data kind matches `T`.
pub struct PropertyType<T> {
    id: PropertyTypeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PropertyType<T> {
    pub(crate) const fn from_id(id: PropertyTypeId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Returns the underlying property type id.
    #[must_use]
    #[inline]
    pub const fn id(self) -> PropertyTypeId {
        self.id
    }
}

// Manual trait implementations to avoid requiring T: Clone, etc.

impl<T> Copy for PropertyType<T> {}

impl<T> Clone for PropertyType<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for PropertyType<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for PropertyType<T> {}

impl<T> Hash for PropertyType<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for PropertyType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyType")
            .field("id", &self.id)
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}

impl<T> From<PropertyType<T>> for PropertyTypeId {
    #[inline]
    fn from(property: PropertyType<T>) -> Self {
        property.id
    }
}

/// Identity of an object known to a [`PropertyManager`](crate::PropertyManager).
///
/// Scene nodes, property groups and the synthetic keys behind struct and
/// array values all share this key space.
///
/// ## Semantics
///
/// - On creation, a fresh slot is allocated with generation `1`.
/// - On destruction, the slot is freed; existing keys for that slot go stale.
/// - On reuse of a freed slot, its generation is incremented.
///
/// Stale keys never alias a different live object because the generation
/// must match.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey(u32, u32);

impl ObjectKey {
    /// A key that never refers to a live object.
    ///
    /// Used by empty struct and array values.
    pub const NULL: Self = Self(u32::MAX, 0);

    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }

    /// Returns `true` for [`ObjectKey::NULL`].
    #[must_use]
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("ObjectKey(null)")
        } else {
            f.debug_tuple("ObjectKey").field(&self.0).field(&self.1).finish()
        }
    }
}

/// Identifies who attached a value source.
///
/// Removal requires both the [`ValueSourceHandle`] and the owner that added
/// it, so one subsystem cannot detach another's values by accident.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceOwner(u64);

impl SourceOwner {
    /// The owner used for values attached by
    /// [`PropertyManager::set`](crate::PropertyManager::set).
    pub const MANAGER: Self = Self(0);

    /// Creates an owner identity from a caller-chosen raw value.
    ///
    /// Zero is reserved for [`SourceOwner::MANAGER`]; use
    /// [`SourceOwner::try_new`] for raw values that may be zero.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is zero. In a `const` context this is a compile error.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        assert!(raw != 0, "owner 0 is reserved for the manager");
        Self(raw)
    }

    /// Creates an owner identity, or `None` if `raw` is the reserved zero.
    #[must_use]
    pub const fn try_new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(raw) => Some(Self::from_non_zero(raw)),
            None => None,
        }
    }

    /// Creates an owner identity from a value that cannot be reserved.
    #[must_use]
    pub const fn from_non_zero(raw: NonZeroU64) -> Self {
        Self(raw.get())
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Handle to a value source attached with
/// [`PropertyManager::add_value_source`](crate::PropertyManager::add_value_source).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValueSourceHandle(pub(crate) u64);

/// Handle to a modifier attached with
/// [`PropertyManager::add_value_modifier`](crate::PropertyManager::add_value_modifier).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModifierHandle(pub(crate) u64);

/// Handle to a notification handler attached with
/// [`PropertyManager::add_notification_handler`](crate::PropertyManager::add_notification_handler).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NotificationHandle(pub(crate) u64);
