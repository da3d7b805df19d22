// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::id::{LinkId, NodeId, PinId};

/// A directed link between two pins.
///
/// A pin id equals the id of the node it belongs to, so a link is one edge
/// per node pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkData {
    /// Unique link id within the owning document
    pub id: LinkId,
    /// Source (output) pin
    pub from_pin: PinId,
    /// Target (input) pin
    pub to_pin: PinId,
}

impl LinkData {
    /// Create a new link
    pub fn new(id: LinkId, from_pin: PinId, to_pin: PinId) -> Self {
        Self { id, from_pin, to_pin }
    }

    /// Node owning the source pin
    pub fn from_node(&self) -> NodeId {
        self.from_pin.node()
    }

    /// Node owning the target pin
    pub fn to_node(&self) -> NodeId {
        self.to_pin.node()
    }

    /// Check if this link touches a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node() == node_id || self.to_node() == node_id
    }

    /// Check if this link touches a specific pin
    pub fn involves_pin(&self, pin_id: PinId) -> bool {
        self.from_pin == pin_id || self.to_pin == pin_id
    }
}
