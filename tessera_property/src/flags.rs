// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change and storage flags.

bitflags::bitflags! {
    /// Invalidation domains a property change affects.
    ///
    /// Each property type carries a mask; every committed change ORs it into
    /// the owning object's accumulated mask, which the embedder drains with
    /// [`PropertyManager::take_change_flags`](crate::PropertyManager::take_change_flags).
    /// Bits above the named ones are free for embedder use.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ChangeFlags: u32 {
        /// The object must be measured again.
        ///
        /// Propagation of this bit is batched while layout invalidation is
        /// suspended.
        const LAYOUT    = 1 << 0;
        /// The object must be arranged again.
        const ARRANGE   = 1 << 1;
        /// The object must be rendered again.
        const RENDER    = 1 << 2;
        /// The object's final transform must be recomputed.
        const TRANSFORM = 1 << 3;
        /// Descendants that inherit the property must be refreshed.
        const INHERITED = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Bookkeeping flags on a single property storage.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub(crate) struct StorageFlags: u8 {
        /// Skipped by property copies.
        const NON_COPYABLE = 0b0000_0001;
        /// The last value source was removed.
        const REMOVED      = 0b0000_0010;
        /// A change was committed since the flag was last cleared.
        const CHANGED      = 0b0000_0100;
    }
}

impl StorageFlags {
    /// Flags that keep an otherwise empty storage alive.
    pub(crate) const RETAINING: Self = Self::NON_COPYABLE;
}
