// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph document.

use crate::id::NodeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A 2D position or offset in graph space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// Horizontal component
    #[serde(default)]
    pub x: f32,
    /// Vertical component
    #[serde(default)]
    pub y: f32,
}

impl Vec2 {
    /// The origin
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new vector
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Whether both components are finite. Only finite values survive JSON.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A node instance in a graph document.
///
/// `node_type` is an opaque tag owned by the domain layer (behavior tree,
/// state machine, ...). The document never interprets it; only registered
/// validation rules do.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// Unique id within the owning document
    pub id: NodeId,
    /// Domain type tag, e.g. `BT_Selector`
    pub node_type: String,
    /// Display name
    pub name: String,
    /// Position in graph space
    pub position: Vec2,
    /// Free-form key/value overrides, kept in insertion order
    pub parameters: IndexMap<String, String>,
    /// Ordered children. Order is traversal order for tree consumers.
    pub children: Vec<NodeId>,
    /// Optional node that wraps this one
    pub decorator_child: Option<NodeId>,
}

impl NodeData {
    /// Create a node with no children and no parameters.
    ///
    /// The display name defaults to the type tag.
    pub fn new(id: NodeId, node_type: impl Into<String>, position: Vec2) -> Self {
        let node_type = node_type.into();
        Self {
            id,
            name: node_type.clone(),
            node_type,
            position,
            parameters: IndexMap::new(),
            children: Vec::new(),
            decorator_child: None,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether this node has any ordered children
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// All outgoing structural edges: ordered children first, then the decorator
    pub fn structural_targets(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().copied().chain(self.decorator_child)
    }

    /// Whether `other` is referenced as a child or as the decorator
    pub fn references(&self, other: NodeId) -> bool {
        self.decorator_child == Some(other) || self.children.contains(&other)
    }

    /// Get a parameter value
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}
