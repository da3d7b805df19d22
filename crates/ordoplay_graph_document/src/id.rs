// SPDX-License-Identifier: MIT OR Apache-2.0
//! Numeric handles for graphs, nodes, pins and links.
//!
//! Every handle is a distinct newtype so a `NodeId` can never be passed where
//! a `LinkId` is expected. Ids are handed out by a per-document [`IdCounter`]
//! that only ever moves forward: a deleted id is a tombstone and is never
//! reallocated to a different entity.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// The zero handle, used on the wire for "unset". Also the `Default`.
            pub const NONE: Self = Self(0);

            /// Get the raw id value
            pub fn value(self) -> u64 {
                self.0
            }

            /// Whether this handle is the unset sentinel
            pub fn is_none(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

define_handle!(
    /// Identifier of an open graph document inside a manager
    GraphId,
    "graph"
);
define_handle!(
    /// Identifier of a node within one document
    NodeId,
    "node"
);
define_handle!(
    /// Identifier of a pin. A pin currently shares its owning node's id.
    PinId,
    "pin"
);
define_handle!(
    /// Identifier of a link within one document
    LinkId,
    "link"
);

impl PinId {
    /// The pin belonging to a node
    pub fn of_node(node: NodeId) -> Self {
        Self(node.0)
    }

    /// The node that owns this pin
    pub fn node(self) -> NodeId {
        NodeId(self.0)
    }
}

impl From<NodeId> for PinId {
    fn from(node: NodeId) -> Self {
        Self::of_node(node)
    }
}

/// Largest id a document may hold.
///
/// Matches the integer range JSON readers represent exactly, and leaves the
/// counter room to keep allocating after a loaded document.
pub const MAX_ID: u64 = (1 << 53) - 1;

/// Monotonic id source. Never hands out zero and never goes backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdCounter {
    next: u64,
}

impl IdCounter {
    /// Create a counter whose first id is 1
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Create a counter that continues after the largest id already in use
    pub fn after(max_existing: u64) -> Self {
        Self {
            next: max_existing.saturating_add(1).max(1),
        }
    }

    /// Allocate the next raw id
    pub fn allocate(&mut self) -> u64 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }

    /// Peek at the id the next call to [`allocate`](Self::allocate) returns
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Make sure `id` can never be handed out again
    pub fn reserve(&mut self, id: u64) {
        if id >= self.next {
            self.next = id.saturating_add(1);
        }
    }
}

impl Default for IdCounter {
    fn default() -> Self {
        Self::new()
    }
}
