// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource and pointer values, plus the collaborator interfaces that
//! resolve them.
//!
//! Resolution is two-phase. Any thread may produce a [`PendingUrl`]; the
//! engine applies it, and performs every storage mutation, on the thread that
//! owns the [`PropertyManager`](crate::PropertyManager).

use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::PropertyError;
use crate::id::{ObjectKey, PropertyTypeId, SourceOwner};
use crate::manager::PropertyManager;
use crate::notify::{ChangeReason, PropertyChange};
use crate::storage::Precedence;
use crate::value::{PropertyDataType, PropertyValue};

/// An engine resource (texture, mesh, localized string, ...).
///
/// Implemented by the resource manager; the property engine only needs
/// identity and the URL it was loaded from.
pub trait Resource: fmt::Debug {
    /// The URL the resource was loaded from.
    fn url(&self) -> &str;
}

/// Resolves resource URLs to loaded resources.
pub trait ResourceResolver {
    /// Returns the resource for `url`, if it is loaded.
    fn resolve(&self, url: &str) -> Option<Rc<dyn Resource>>;
}

impl<F> ResourceResolver for F
where
    F: Fn(&str) -> Option<Rc<dyn Resource>>,
{
    #[inline]
    fn resolve(&self, url: &str) -> Option<Rc<dyn Resource>> {
        self(url)
    }
}

/// Resolves object-relative paths for pointer values.
pub trait PathResolver {
    /// Resolves `path` relative to `base`.
    fn resolve_path(&self, base: ObjectKey, path: &str) -> Option<ObjectKey>;
}

impl<F> PathResolver for F
where
    F: Fn(ObjectKey, &str) -> Option<ObjectKey>,
{
    #[inline]
    fn resolve_path(&self, base: ObjectKey, path: &str) -> Option<ObjectKey> {
        self(base, path)
    }
}

/// A non-owning reference to a resolved resource.
///
/// The resource manager owns the resource; the handle goes dead once it is
/// unloaded.
#[derive(Clone, Debug)]
pub struct ResourceHandle(Weak<dyn Resource>);

impl ResourceHandle {
    /// Creates a handle that does not keep `resource` alive.
    #[must_use]
    pub fn new(resource: &Rc<dyn Resource>) -> Self {
        Self(Rc::downgrade(resource))
    }

    /// Returns the resource if it is still loaded.
    #[must_use]
    pub fn upgrade(&self) -> Option<Rc<dyn Resource>> {
        self.0.upgrade()
    }

    /// Returns `true` if both handles refer to the same resource.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

/// A resource reference by URL.
#[derive(Clone, Debug)]
pub struct ResourceIdValue {
    url: String,
    localized: bool,
    resource: Option<ResourceHandle>,
}

impl ResourceIdValue {
    /// Creates an unresolved reference to `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            localized: false,
            resource: None,
        }
    }

    /// Creates an unresolved reference to a localized resource.
    ///
    /// Properties holding localized references are re-notified by
    /// [`PropertyManager::notify_localization_changed`].
    #[must_use]
    pub fn localized(url: impl Into<String>) -> Self {
        Self {
            localized: true,
            ..Self::new(url)
        }
    }

    /// Returns the URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns `true` if the reference names a localized resource.
    #[must_use]
    pub fn is_localized(&self) -> bool {
        self.localized
    }

    /// Returns the resolved resource, if it was resolved and is still loaded.
    #[must_use]
    pub fn resource(&self) -> Option<Rc<dyn Resource>> {
        self.resource.as_ref().and_then(ResourceHandle::upgrade)
    }

    /// Returns `true` if a resolution is recorded and still alive.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resource().is_some()
    }

    /// Points the reference at a different URL, dropping any resolution.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
        self.resource = None;
    }

    /// Resolves the URL through `resolver`.
    ///
    /// Returns `true` if a resource was found.
    pub fn refresh(&mut self, resolver: &(impl ResourceResolver + ?Sized)) -> bool {
        self.resource = resolver.resolve(&self.url).map(|r| ResourceHandle::new(&r));
        self.resource.is_some()
    }
}

impl PartialEq for ResourceIdValue {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
            && self.localized == other.localized
            && match (&self.resource, &other.resource) {
                (None, None) => true,
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            }
    }
}

/// A reference to an object or resource.
#[derive(Clone, Debug, Default)]
pub enum PointerValue {
    /// Points at nothing.
    #[default]
    Null,
    /// A raw external identity.
    Object(ObjectKey),
    /// An owned resource, released when the value is overwritten or dropped.
    Resource(Rc<dyn Resource>),
    /// A path resolved against the owning object when the value is attached.
    Path {
        /// The relative path.
        path: String,
        /// The object the path resolved to while attached.
        resolved: Option<ObjectKey>,
    },
}

impl PointerValue {
    /// Creates an unresolved relative path.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            resolved: None,
        }
    }

    /// Returns the object this pointer currently refers to.
    #[must_use]
    pub fn target(&self) -> Option<ObjectKey> {
        match self {
            Self::Object(key) => Some(*key),
            Self::Path { resolved, .. } => *resolved,
            Self::Null | Self::Resource(_) => None,
        }
    }

    /// Returns the owned resource, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&Rc<dyn Resource>> {
        match self {
            Self::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    /// Returns `true` if this is a path that has not been resolved.
    #[must_use]
    pub fn is_unresolved_path(&self) -> bool {
        matches!(self, Self::Path { resolved: None, .. })
    }

    /// Resolves a relative path against `base`.
    pub(crate) fn attach(&mut self, base: ObjectKey, resolver: Option<&dyn PathResolver>) {
        if let Self::Path { path, resolved } = self {
            *resolved = resolver.and_then(|r| r.resolve_path(base, path));
        }
    }

    /// Forgets a relative path resolution.
    pub(crate) fn detach(&mut self) {
        if let Self::Path { resolved, .. } = self {
            *resolved = None;
        }
    }
}

impl PartialEq for PointerValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Resource(a), Self::Resource(b)) => Rc::ptr_eq(a, b),
            (
                Self::Path {
                    path: a,
                    resolved: ra,
                },
                Self::Path {
                    path: b,
                    resolved: rb,
                },
            ) => a == b && ra == rb,
            _ => false,
        }
    }
}

/// A URL discovered off the main thread, waiting to be applied.
///
/// This is plain data and can be sent across threads; apply it with
/// [`PropertyManager::apply_pending_url`](crate::PropertyManager::apply_pending_url).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingUrl {
    /// The object holding the property.
    pub object: ObjectKey,
    /// The resource id or pointer property.
    pub property: PropertyTypeId,
    /// The URL to resolve.
    pub url: String,
}

impl PropertyManager {
    /// Installs the resolver used to attach pointer paths.
    ///
    /// Paths attached before the resolver was installed stay unresolved until
    /// [`PropertyManager::resolve_pointer_paths`] runs.
    pub fn set_path_resolver(&mut self, resolver: impl PathResolver + 'static) {
        self.path_resolver = Some(Rc::new(resolver));
    }

    /// Removes the path resolver. Already resolved paths keep their target.
    pub fn clear_path_resolver(&mut self) {
        self.path_resolver = None;
    }

    /// Resolves every resource reference of `property` on `object` again.
    ///
    /// All value sources are refreshed, not only the winning one. Handlers
    /// are notified with [`ChangeReason::ResourceRefreshed`]. Returns `true`
    /// if the winning reference resolved, `false` if it did not or `object`
    /// holds no value.
    ///
    /// # Errors
    ///
    /// [`PropertyError::UnsupportedOperation`] unless the property holds
    /// resource ids, or [`PropertyError::UnknownPropertyType`].
    pub fn refresh_resource(
        &mut self,
        object: ObjectKey,
        property: impl Into<PropertyTypeId>,
        resolver: &(impl ResourceResolver + ?Sized),
    ) -> Result<bool, PropertyError> {
        let property = property.into();
        let data_type = self.descriptor(property)?.data_type();
        if data_type != PropertyDataType::ResourceId {
            return Err(PropertyError::UnsupportedOperation {
                data_type,
                operation: "resource refresh",
            });
        }
        let Some(storage) = self
            .storage_mut(property, object)
            .filter(|s| !s.is_orphaned())
        else {
            return Ok(false);
        };
        for entry in &mut storage.sources {
            if let PropertyValue::ResourceId(id) = &mut entry.value {
                id.refresh(resolver);
            }
        }
        let resolved = storage.top().is_some_and(|top| {
            matches!(&top.value, PropertyValue::ResourceId(id) if id.is_resolved())
        });
        self.touch(object, property);
        let value = self.resolve_lenient(object, property);
        self.dispatch(&PropertyChange {
            object,
            property,
            reason: ChangeReason::ResourceRefreshed,
            value,
        });
        Ok(resolved)
    }

    /// Refreshes every resource id property on every object.
    ///
    /// Returns the number of properties whose winning reference resolved.
    pub fn refresh_all_resources(&mut self, resolver: &(impl ResourceResolver + ?Sized)) -> usize {
        let targets = self.holders_of(PropertyDataType::ResourceId, |_| true);
        targets
            .into_iter()
            .filter(|(object, property)| {
                matches!(self.refresh_resource(*object, *property, resolver), Ok(true))
            })
            .count()
    }

    /// Applies a URL produced by a background loader.
    ///
    /// For resource id properties the URL becomes the new local value, keeping
    /// the localized marker of the value it replaces, and is resolved right
    /// away. For pointer properties the resolved resource becomes the new
    /// local value; nothing changes if it is not loaded. Returns `true` if the
    /// URL resolved.
    ///
    /// # Errors
    ///
    /// [`PropertyError::UnsupportedOperation`] for other kinds, plus the
    /// errors of [`PropertyManager::add_value_source`].
    pub fn apply_pending_url(
        &mut self,
        pending: PendingUrl,
        resolver: &(impl ResourceResolver + ?Sized),
    ) -> Result<bool, PropertyError> {
        let PendingUrl {
            object,
            property,
            url,
        } = pending;
        match self.descriptor(property)?.data_type() {
            PropertyDataType::ResourceId => {
                let localized = self
                    .storage(property, object)
                    .and_then(|s| s.top())
                    .is_some_and(|top| {
                        matches!(&top.value, PropertyValue::ResourceId(id) if id.is_localized())
                    });
                let mut value = if localized {
                    ResourceIdValue::localized(url)
                } else {
                    ResourceIdValue::new(url)
                };
                let resolved = value.refresh(resolver);
                self.insert_source(
                    object,
                    property,
                    PropertyValue::ResourceId(value),
                    Precedence::Local,
                    SourceOwner::MANAGER,
                )?;
                Ok(resolved)
            }
            PropertyDataType::Pointer => {
                let Some(resource) = resolver.resolve(&url) else {
                    return Ok(false);
                };
                self.insert_source(
                    object,
                    property,
                    PropertyValue::Pointer(PointerValue::Resource(resource)),
                    Precedence::Local,
                    SourceOwner::MANAGER,
                )?;
                Ok(true)
            }
            data_type => Err(PropertyError::UnsupportedOperation {
                data_type,
                operation: "pending URLs",
            }),
        }
    }

    /// Attaches every unresolved pointer path through the installed
    /// [`PathResolver`].
    ///
    /// Returns the number of paths that resolved.
    pub fn resolve_pointer_paths(&mut self) -> usize {
        let Some(resolver) = self.path_resolver.clone() else {
            return 0;
        };
        let mut attached = Vec::new();
        for (&property, ts) in &mut self.types {
            for (&object, storage) in &mut ts.storages {
                let mut changed = false;
                for entry in &mut storage.sources {
                    if let PropertyValue::Pointer(pointer) = &mut entry.value {
                        if pointer.is_unresolved_path() {
                            pointer.attach(object, Some(&*resolver));
                            changed |= pointer.target().is_some();
                        }
                    }
                }
                if changed {
                    attached.push((object, property));
                }
            }
        }
        for &(object, property) in &attached {
            self.touch(object, property);
        }
        attached.len()
    }

    /// Notifies handlers of every property whose winning value is a localized
    /// resource id, with [`ChangeReason::LocalizationChanged`].
    ///
    /// Call after switching the active locale. Returns the number of
    /// properties notified.
    pub fn notify_localization_changed(&mut self) -> usize {
        let targets = self.holders_of(PropertyDataType::ResourceId, |value| {
            matches!(value, PropertyValue::ResourceId(id) if id.is_localized())
        });
        for &(object, property) in &targets {
            self.touch(object, property);
            let value = self.resolve_lenient(object, property);
            self.dispatch(&PropertyChange {
                object,
                property,
                reason: ChangeReason::LocalizationChanged,
                value,
            });
        }
        targets.len()
    }

    /// Every (object, property) of `data_type` whose winning value passes
    /// `filter`, in a stable order.
    fn holders_of(
        &self,
        data_type: PropertyDataType,
        filter: impl Fn(&PropertyValue) -> bool,
    ) -> Vec<(ObjectKey, PropertyTypeId)> {
        let filter = &filter;
        let mut holders: Vec<_> = self
            .types
            .iter()
            .filter(|(id, _)| {
                self.registry
                    .get(**id)
                    .is_some_and(|d| d.data_type() == data_type)
            })
            .flat_map(|(id, ts)| {
                ts.storages
                    .iter()
                    .filter(move |(_, s)| s.top().is_some_and(|top| filter(&top.value)))
                    .map(move |(object, _)| (*object, *id))
            })
            .collect();
        holders.sort_unstable();
        holders
    }
}
