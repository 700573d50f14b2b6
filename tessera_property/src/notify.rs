// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change notifications.
//!
//! Handlers receive `&mut PropertyManager`, so they may set properties or
//! add and remove handlers while a dispatch is running. [`HandlerList`] keeps
//! that safe:
//!
//! - A dispatch pass only visits the entries that existed when it started;
//!   handlers added meanwhile run from the next pass on.
//! - Removing a handler while any pass over the list is active only marks the
//!   entry dead. Dead entries are skipped, and physically dropped once the
//!   outermost pass finishes.
//!
//! Entry indices therefore never shift under a running pass, so no sibling is
//! skipped or visited twice.

use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::id::{NotificationHandle, ObjectKey, PropertyTypeId};
use crate::manager::PropertyManager;
use crate::value::PropertyValue;

/// Why a notification was dispatched.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChangeReason {
    /// A value source was added or replaced.
    ValueChanged,
    /// A value source was removed.
    ValueRemoved,
    /// A resource reference was resolved again.
    ResourceRefreshed,
    /// The active locale changed and the property names a localized resource.
    LocalizationChanged,
}

/// A committed property change.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChange {
    /// The object (or group) whose property changed.
    pub object: ObjectKey,
    /// The property type.
    pub property: PropertyTypeId,
    /// Why the change was dispatched.
    pub reason: ChangeReason,
    /// The effective value after modifiers, or `None` if the property no
    /// longer has a value on `object`.
    pub value: Option<PropertyValue>,
}

/// A notification callback.
pub type NotificationHandler = dyn Fn(&mut PropertyManager, &PropertyChange);

#[derive(Debug)]
struct Slot<H: ?Sized> {
    handle: NotificationHandle,
    handler: Rc<H>,
    live: bool,
}

/// An ordered handler list that tolerates mutation during dispatch.
pub(crate) struct HandlerList<H: ?Sized = NotificationHandler> {
    slots: Vec<Slot<H>>,
    depth: u32,
}

impl<H: ?Sized> Default for HandlerList<H> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            depth: 0,
        }
    }
}

impl<H: ?Sized> core::fmt::Debug for HandlerList<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerList")
            .field("live", &self.live_count())
            .field("slots", &self.slots.len())
            .field("depth", &self.depth)
            .finish()
    }
}

impl<H: ?Sized> HandlerList<H> {
    /// Appends a handler. During a pass it runs from the next pass on.
    pub(crate) fn push(&mut self, handle: NotificationHandle, handler: Rc<H>) {
        self.slots.push(Slot {
            handle,
            handler,
            live: true,
        });
    }

    /// Removes a handler, or marks it dead while a pass is active.
    pub(crate) fn remove(&mut self, handle: NotificationHandle) -> bool {
        let Some(idx) = self
            .slots
            .iter()
            .position(|s| s.live && s.handle == handle)
        else {
            return false;
        };
        if self.depth > 0 {
            self.slots[idx].live = false;
        } else {
            self.slots.remove(idx);
        }
        true
    }

    /// Removes every handler, softly while a pass is active.
    pub(crate) fn clear(&mut self) {
        if self.depth > 0 {
            for slot in &mut self.slots {
                slot.live = false;
            }
        } else {
            self.slots.clear();
        }
    }

    /// Starts a pass and returns the number of entries it covers.
    pub(crate) fn enter(&mut self) -> usize {
        self.depth += 1;
        self.slots.len()
    }

    /// Returns the handler at `idx` if it is still live.
    pub(crate) fn live_at(&self, idx: usize) -> Option<Rc<H>> {
        self.slots
            .get(idx)
            .filter(|s| s.live)
            .map(|s| Rc::clone(&s.handler))
    }

    /// Ends a pass, compacting dead entries once no pass is active.
    pub(crate) fn exit(&mut self) {
        debug_assert!(self.depth > 0, "unbalanced HandlerList::exit");
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.slots.retain(|s| s.live);
        }
    }

    pub(crate) fn is_dispatching(&self) -> bool {
        self.depth > 0
    }

    pub(crate) fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.live).count()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live_count() == 0
    }
}

/// Where a dispatch pass reads its handlers from.
#[derive(Copy, Clone, Debug)]
pub(crate) enum HandlerScope {
    /// Handlers registered for one object.
    Instance(ObjectKey),
    /// Handlers registered for the whole property type.
    Type,
}

impl PropertyManager {
    /// Registers a notification handler.
    ///
    /// With `Some(object)` the handler only sees changes of `property` on that
    /// object; with `None` it sees changes of `property` on every object.
    /// Instance handlers run before type handlers, each in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::UnknownPropertyType`](crate::PropertyError::UnknownPropertyType),
    /// [`PropertyError::StaleObject`](crate::PropertyError::StaleObject), or
    /// [`PropertyError::UnsupportedOperation`](crate::PropertyError::UnsupportedOperation)
    /// for struct, array and pointer properties.
    pub fn add_notification_handler<F>(
        &mut self,
        object: Option<ObjectKey>,
        property: impl Into<PropertyTypeId>,
        handler: F,
    ) -> Result<NotificationHandle, crate::PropertyError>
    where
        F: Fn(&mut Self, &PropertyChange) + 'static,
    {
        let property = property.into();
        self.require_stack(property, "notification handlers")?;
        let handle = NotificationHandle(self.next_handle());
        let handler: Rc<NotificationHandler> = Rc::new(handler);
        match object {
            Some(object) => {
                self.require_object(object)?;
                self.storage_entry(property, object)?
                    .handlers
                    .push(handle, handler);
            }
            None => self
                .type_storage_mut(property)?
                .handlers
                .push(handle, handler),
        }
        Ok(handle)
    }

    /// Removes a notification handler.
    ///
    /// Safe to call from inside a handler, including for the running handler
    /// itself. Returns `false` if the handler was not registered.
    pub fn remove_notification_handler(
        &mut self,
        object: Option<ObjectKey>,
        property: impl Into<PropertyTypeId>,
        handle: NotificationHandle,
    ) -> bool {
        let property = property.into();
        match object {
            Some(object) => {
                let removed = self
                    .storage_mut(property, object)
                    .is_some_and(|s| s.handlers.remove(handle));
                if removed {
                    self.collect_if_orphaned(property, object);
                }
                removed
            }
            None => self
                .types
                .get_mut(&property)
                .is_some_and(|ts| ts.handlers.remove(handle)),
        }
    }

    /// Dispatches `change` to instance handlers, then to type handlers.
    pub(crate) fn dispatch(&mut self, change: &PropertyChange) {
        log::trace!(
            "dispatching {:?} for {:?} on {:?}",
            change.reason,
            change.property,
            change.object
        );
        self.dispatch_scope(HandlerScope::Instance(change.object), change);
        self.dispatch_scope(HandlerScope::Type, change);
        self.collect_if_orphaned(change.property, change.object);
    }

    fn dispatch_scope(&mut self, scope: HandlerScope, change: &PropertyChange) {
        let Some(len) = self
            .handler_list_mut(scope, change.property)
            .map(HandlerList::enter)
        else {
            return;
        };
        for idx in 0..len {
            // The list may have been torn down by a handler; stop quietly.
            let Some(list) = self.handler_list_mut(scope, change.property) else {
                return;
            };
            if let Some(handler) = list.live_at(idx) {
                handler(self, change);
            }
        }
        if let Some(list) = self.handler_list_mut(scope, change.property) {
            list.exit();
        }
    }

    fn handler_list_mut(
        &mut self,
        scope: HandlerScope,
        property: PropertyTypeId,
    ) -> Option<&mut HandlerList> {
        match scope {
            HandlerScope::Instance(object) => {
                self.storage_mut(property, object).map(|s| &mut s.handlers)
            }
            HandlerScope::Type => self.types.get_mut(&property).map(|ts| &mut ts.handlers),
        }
    }
}
