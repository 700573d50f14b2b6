// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Object registration and parent lookup.
//!
//! Every key the manager stores properties for comes from one generational
//! arena. The arena also records what a key stands for: only [`ObjectKind::Node`]
//! keys take part in parent-chain inheritance; groups and the synthetic keys
//! behind struct and array values are opaque.

use alloc::vec::Vec;

use crate::error::PropertyError;
use crate::id::ObjectKey;
use crate::manager::PropertyManager;

/// What an [`ObjectKey`] stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A scene object. Inherited properties fall back to its parent.
    Node,
    /// A property group.
    Group,
    /// The field bag behind a struct value.
    Struct,
    /// The element storage behind an array value.
    Array,
}

/// Supplies the scene-graph parent of a node for inherited lookups.
///
/// Closures `Fn(ObjectKey) -> Option<ObjectKey>` implement this trait.
pub trait ParentLookup {
    /// Returns the parent of `object`, or `None` at the root.
    fn parent(&self, object: ObjectKey) -> Option<ObjectKey>;
}

impl<F> ParentLookup for F
where
    F: Fn(ObjectKey) -> Option<ObjectKey>,
{
    #[inline]
    fn parent(&self, object: ObjectKey) -> Option<ObjectKey> {
        self(object)
    }
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    kind: Option<ObjectKind>,
}

/// Generational slots for object keys.
#[derive(Clone, Debug, Default)]
pub(crate) struct ObjectArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl ObjectArena {
    pub(crate) fn insert(&mut self, kind: ObjectKind) -> Result<ObjectKey, PropertyError> {
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.kind = Some(kind);
            self.live += 1;
            return Ok(ObjectKey::new(idx, slot.generation));
        }
        // The last index is reserved for `ObjectKey::NULL`.
        let idx = u32::try_from(self.slots.len())
            .ok()
            .filter(|idx| *idx < u32::MAX)
            .ok_or(PropertyError::AllocationFailure)?;
        self.slots.try_reserve(1)?;
        // Keep room for every slot in `free` so `remove` never allocates.
        self.free
            .try_reserve(self.slots.len() + 1 - self.free.len())?;
        self.slots.push(Slot {
            generation: 1,
            kind: Some(kind),
        });
        self.live += 1;
        Ok(ObjectKey::new(idx, 1))
    }

    pub(crate) fn remove(&mut self, key: ObjectKey) -> Option<ObjectKind> {
        let slot = self.slot_mut(key)?;
        let kind = slot.kind.take();
        #[expect(clippy::cast_possible_truncation, reason = "keys are built from u32 indices")]
        self.free.push(key.idx() as u32);
        self.live -= 1;
        kind
    }

    pub(crate) fn kind(&self, key: ObjectKey) -> Option<ObjectKind> {
        self.slots
            .get(key.idx())
            .filter(|s| s.generation == key.generation())
            .and_then(|s| s.kind)
    }

    pub(crate) fn contains(&self, key: ObjectKey) -> bool {
        self.kind(key).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    fn slot_mut(&mut self, key: ObjectKey) -> Option<&mut Slot> {
        self.slots
            .get_mut(key.idx())
            .filter(|s| s.generation == key.generation() && s.kind.is_some())
    }
}

impl PropertyManager {
    /// Registers a new scene object.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::AllocationFailure`] if the arena cannot grow.
    pub fn create_object(&mut self) -> Result<ObjectKey, PropertyError> {
        self.objects.insert(ObjectKind::Node)
    }

    /// Returns `true` if `object` is live.
    #[must_use]
    pub fn contains_object(&self, object: ObjectKey) -> bool {
        self.objects.contains(object)
    }

    /// Returns what `object` stands for, or `None` if it is stale.
    #[must_use]
    pub fn object_kind(&self, object: ObjectKey) -> Option<ObjectKind> {
        self.objects.kind(object)
    }

    /// Returns the number of live keys of every kind.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub(crate) fn require_object(&self, object: ObjectKey) -> Result<ObjectKind, PropertyError> {
        self.objects
            .kind(object)
            .ok_or(PropertyError::StaleObject(object))
    }
}
