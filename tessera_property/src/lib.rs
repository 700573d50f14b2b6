// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tessera Property: a typed, precedence-ordered property engine.
//!
//! Every stylable or animatable value of a scene (colors, transforms, floats,
//! resource references, nested structs and arrays) is a *property*: a value of
//! a registered [`PropertyTypeDescriptor`] attached to an [`ObjectKey`]. The
//! [`PropertyManager`] owns all of them.
//!
//! ## Core Concepts
//!
//! ### Value sources
//!
//! A property on an object holds a stack of value sources, each at a
//! [`Precedence`]:
//!
//! - **Class** - template defaults
//! - **Style** - values applied by styles
//! - **`StateManager`** - values applied by state transitions
//! - **Local** - the single value written by [`PropertyManager::set`]
//!
//! The highest level wins; within a level the most recently added source
//! wins. Without any source the lookup falls back to the object's property
//! groups and, for inherited types, to its parent.
//!
//! ### Modifiers and notifications
//!
//! Modifiers post-process the winning value on every read, in insertion
//! order. Notification handlers run after every committed change, and may
//! mutate the manager while they run.
//!
//! ### Change flags
//!
//! Each type declares [`ChangeFlags`] (layout, render, ...) that are raised on
//! an object whenever one of its properties of that type changes. Layout
//! invalidation can be suspended and batched.
//!
//! ## Quick Start
//!
//! ```rust
//! use peniko::Color;
//! use tessera_property::{ChangeFlags, PropertyManager, PropertyTypeBuilder};
//!
//! let mut manager = PropertyManager::new();
//! let clear_color = manager
//!     .register(
//!         PropertyTypeBuilder::new("ClearColor", Color::new([0.4, 0.4, 0.4, 1.0]))
//!             .change_flags(ChangeFlags::RENDER),
//!     )
//!     .unwrap();
//!
//! let scene = manager.create_object().unwrap();
//! assert_eq!(manager.get(scene, clear_color).unwrap(), None);
//! assert_eq!(
//!     manager.get_default(scene, clear_color),
//!     Color::new([0.4, 0.4, 0.4, 1.0])
//! );
//!
//! // Property groups share values between objects.
//! let theme = manager.create_property_group().unwrap();
//! manager.set(theme, clear_color, Color::BLACK).unwrap();
//! manager.add_property_group(scene, theme).unwrap();
//! assert_eq!(manager.get(scene, clear_color).unwrap(), Some(Color::BLACK));
//! assert_eq!(manager.take_change_flags(theme), ChangeFlags::RENDER);
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. The `std` feature (on by
//! default) only forwards to `glam` and `peniko`; enable `libm` instead for
//! `no_std` float math.

#![no_std]

extern crate alloc;

mod compound;
mod error;
mod flags;
mod group;
mod id;
mod manager;
mod matrix;
mod metadata;
mod modifier;
mod notify;
mod object;
mod registry;
mod resolve;
mod resource;
mod storage;
mod value;

pub use compound::{ArrayValue, StructValue};
pub use error::{ModifierError, PropertyError};
pub use flags::ChangeFlags;
pub use id::{
    ModifierHandle, NotificationHandle, ObjectKey, PropertyType, PropertyTypeId, SourceOwner,
    ValueSourceHandle,
};
pub use manager::PropertyManager;
pub use matrix::{Matrix3x3Value, Matrix4x4Value, Srt2D, Srt3D};
pub use metadata::{PropertyTypeBuilder, PropertyTypeDescriptor};
pub use modifier::ValueModifier;
pub use notify::{ChangeReason, NotificationHandler, PropertyChange};
pub use object::{ObjectKind, ParentLookup};
pub use resource::{
    PathResolver, PendingUrl, PointerValue, Resource, ResourceHandle, ResourceIdValue,
    ResourceResolver,
};
pub use storage::{Precedence, ValueSourceEntry};
pub use value::{PropertyDataType, PropertyKind, PropertyValue};
