// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Not finding a value is never an error: lookups return `Ok(None)` and the
//! `*_default` getters substitute the compiled default instead.

use alloc::borrow::Cow;
use alloc::string::String;

use crate::id::{ObjectKey, PropertyTypeId};
use crate::value::PropertyDataType;

/// Opaque failure reported by a value modifier callback.
///
/// A modifier failure aborts the current resolution pass only.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ModifierError {
    message: Cow<'static, str>,
}

impl ModifierError {
    /// Creates a modifier error with the given message.
    #[must_use]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned by [`PropertyManager`](crate::PropertyManager) operations.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum PropertyError {
    /// Reserving memory for storage or a value source failed.
    #[error("allocation failed while growing property storage")]
    AllocationFailure,

    /// A value of one data kind was used where another was required.
    #[error("type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        /// The kind required by the property type, struct or array.
        expected: PropertyDataType,
        /// The kind that was supplied.
        found: PropertyDataType,
    },

    /// A modifier callback failed while resolving a property.
    #[error("modifier failed while resolving `{property}`: {source}")]
    ModifierFailure {
        /// Name of the property being resolved.
        property: String,
        /// The error returned by the callback.
        source: ModifierError,
    },

    /// The property type id is not (or no longer) registered.
    #[error("unknown property type {0}")]
    UnknownPropertyType(PropertyTypeId),

    /// The name is already bound to a different property type.
    #[error("property name `{name}` is already registered with a different definition")]
    NameConflict {
        /// The conflicting name.
        name: String,
    },

    /// The property type still has live properties attached.
    #[error("property type `{name}` still has {live} live properties")]
    TypeInUse {
        /// Name of the property type.
        name: String,
        /// Number of objects still holding storage for the type.
        live: usize,
    },

    /// The object key is stale or was never created by this manager.
    #[error("stale object key {0:?}")]
    StaleObject(ObjectKey),

    /// The key does not refer to a property group.
    #[error("{0:?} is not a property group")]
    NotAGroup(ObjectKey),

    /// Associating the group would make a group reachable from itself.
    #[error("associating group {group:?} with {object:?} would create a cycle")]
    GroupCycle {
        /// The object receiving the group.
        object: ObjectKey,
        /// The group being associated.
        group: ObjectKey,
    },

    /// Storing the struct or array value would make it contain itself.
    #[error("storing {value:?} in {container:?} would create a cycle")]
    CompoundCycle {
        /// The object, struct or array receiving the value.
        container: ObjectKey,
        /// The key behind the struct or array value.
        value: ObjectKey,
    },

    /// The property type is read-only and cannot receive local values.
    #[error("property `{name}` is read-only")]
    ReadOnly {
        /// Name of the property type.
        name: String,
    },

    /// The operation is not available for the data kind.
    #[error("{operation} is not supported for {data_type:?} properties")]
    UnsupportedOperation {
        /// The data kind of the property type.
        data_type: PropertyDataType,
        /// Short description of the rejected operation.
        operation: &'static str,
    },

    /// An array index was out of range.
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The array length.
        len: usize,
    },
}

impl From<hashbrown::TryReserveError> for PropertyError {
    fn from(_: hashbrown::TryReserveError) -> Self {
        Self::AllocationFailure
    }
}

impl From<alloc::collections::TryReserveError> for PropertyError {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        Self::AllocationFailure
    }
}

impl From<smallvec::CollectionAllocErr> for PropertyError {
    fn from(_: smallvec::CollectionAllocErr) -> Self {
        Self::AllocationFailure
    }
}
