// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph document: owns one graph's nodes and links.
//!
//! Nodes and links live in insertion-ordered maps, so lookups are O(1) while
//! iteration (and therefore serialization) keeps creation order. Ids come from
//! per-document counters and are never reused after a delete.
//!
//! Deleting a node does not cascade: links touching it and references from
//! other nodes' children or decorator slot stay behind as tombstoned ids.
//! See [`GraphDocument::dangling_references`] for how they surface.

use crate::editor_state::EditorState;
use crate::id::{IdCounter, LinkId, NodeId, PinId, MAX_ID};
use crate::link::LinkData;
use crate::node::{NodeData, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Descriptive metadata carried by a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphMetadata {
    /// Author name
    pub author: String,
    /// Creation timestamp (seconds since the Unix epoch, as text)
    pub created: String,
    /// Free-form tags
    pub tags: Vec<String>,
}

impl GraphMetadata {
    /// Metadata for a document created now
    pub fn new(author: impl Into<String>) -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string();
        Self {
            author: author.into(),
            created,
            tags: Vec::new(),
        }
    }
}

impl Default for GraphMetadata {
    fn default() -> Self {
        Self {
            author: "Unknown".to_string(),
            created: String::new(),
            tags: Vec::new(),
        }
    }
}

/// Error from a rejected document mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Link not found
    #[error("Link not found: {0}")]
    LinkNotFound(LinkId),

    /// Pin's owning node not found
    #[error("Pin not found: {0}")]
    PinNotFound(PinId),

    /// Id is already present in the document
    #[error("Node already exists: {0}")]
    NodeExists(NodeId),

    /// Id is already present in the document
    #[error("Link already exists: {0}")]
    LinkExists(LinkId),

    /// Id is outside the range a document may hold
    #[error("Id {0} is out of range")]
    IdOutOfRange(u64),

    /// Position has a NaN or infinite component
    #[error("Position of {0} must be finite")]
    NonFinitePosition(NodeId),

    /// Link would connect a node to itself
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// The two pins are already linked
    #[error("Pins already connected: {0} -> {1}")]
    DuplicateLink(PinId, PinId),

    /// Node cannot be its own child or decorator
    #[error("{0} cannot reference itself")]
    SelfReference(NodeId),

    /// Child is already in the parent's child list
    #[error("{child} is already a child of {parent}")]
    AlreadyChild {
        /// Parent node
        parent: NodeId,
        /// Child node
        child: NodeId,
    },

    /// Child is not in the parent's child list
    #[error("{child} is not a child of {parent}")]
    NotAChild {
        /// Parent node
        parent: NodeId,
        /// Child node
        child: NodeId,
    },
}

fn rejected<T>(err: GraphError) -> Result<T, GraphError> {
    tracing::warn!("Graph edit rejected: {err}");
    Err(err)
}

/// A single graph document
#[derive(Debug, Clone)]
pub struct GraphDocument {
    /// Document type, e.g. `BehaviorTree`
    pub graph_type: String,
    /// Graph kind used by the editor to pick a domain layer
    pub graph_kind: String,
    /// Descriptive metadata
    pub metadata: GraphMetadata,
    /// Persisted view state
    pub editor_state: EditorState,
    root_node: Option<NodeId>,
    nodes: IndexMap<NodeId, NodeData>,
    links: IndexMap<LinkId, LinkData>,
    node_ids: IdCounter,
    link_ids: IdCounter,
    dirty: bool,
}

impl GraphDocument {
    /// Create a new empty document
    pub fn new(graph_type: impl Into<String>, graph_kind: impl Into<String>) -> Self {
        Self {
            graph_type: graph_type.into(),
            graph_kind: graph_kind.into(),
            metadata: GraphMetadata::default(),
            editor_state: EditorState::default(),
            root_node: None,
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            node_ids: IdCounter::new(),
            link_ids: IdCounter::new(),
            dirty: false,
        }
    }

    /// Rebuild a document from already-parsed parts.
    ///
    /// Counters continue after the largest id present so new entities never
    /// collide with loaded ones.
    pub(crate) fn from_parts(
        graph_type: String,
        graph_kind: String,
        metadata: GraphMetadata,
        editor_state: EditorState,
        root_node: Option<NodeId>,
        nodes: IndexMap<NodeId, NodeData>,
        links: IndexMap<LinkId, LinkData>,
    ) -> Self {
        let max_node = nodes.keys().map(|id| id.0).max().unwrap_or(0);
        let max_link = links.keys().map(|id| id.0).max().unwrap_or(0);
        Self {
            graph_type,
            graph_kind,
            metadata,
            editor_state,
            root_node,
            nodes,
            links,
            node_ids: IdCounter::after(max_node),
            link_ids: IdCounter::after(max_link),
            dirty: false,
        }
    }

    // ---- nodes -------------------------------------------------------------

    /// Create a node and return its freshly allocated id
    ///
    /// A non-finite position is replaced by the origin.
    pub fn create_node(&mut self, node_type: impl Into<String>, position: Vec2) -> NodeId {
        let id = NodeId(self.node_ids.allocate());
        let position = if position.is_finite() {
            position
        } else {
            tracing::warn!("Created {id} at the origin: position {position:?} is not finite");
            Vec2::ZERO
        };
        let node = NodeData::new(id, node_type, position);
        tracing::debug!("Created {} ({})", id, node.node_type);
        self.nodes.insert(id, node);
        self.dirty = true;
        id
    }

    /// Remove a node.
    ///
    /// Links touching the node and references to it from other nodes are
    /// left in place, and the id is never handed out again.
    pub fn delete_node(&mut self, node_id: NodeId) -> Option<NodeData> {
        let Some(node) = self.nodes.shift_remove(&node_id) else {
            tracing::warn!("Cannot delete {node_id}: not found");
            return None;
        };
        tracing::debug!("Deleted {node_id}");
        self.dirty = true;
        Some(node)
    }

    /// Reinsert a previously removed node under its original id.
    ///
    /// `index` is clamped to the node count. Used by undo/redo so a node
    /// comes back where it was in iteration order.
    pub fn restore_node(&mut self, index: usize, node: NodeData) -> Result<(), GraphError> {
        if node.id.is_none() || node.id.0 > MAX_ID {
            return rejected(GraphError::IdOutOfRange(node.id.0));
        }
        if self.nodes.contains_key(&node.id) {
            return rejected(GraphError::NodeExists(node.id));
        }
        if !node.position.is_finite() {
            return rejected(GraphError::NonFinitePosition(node.id));
        }
        self.node_ids.reserve(node.id.0);
        let index = index.min(self.nodes.len());
        self.nodes.shift_insert(index, node.id, node);
        self.dirty = true;
        Ok(())
    }

    /// Get a node by id
    pub fn node(&self, node_id: NodeId) -> Option<&NodeData> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by id.
    ///
    /// Direct edits bypass dirty tracking; call [`mark_dirty`](Self::mark_dirty).
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(&node_id)
    }

    /// Whether a node with this id currently exists
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Position of a node in iteration order
    pub fn node_index(&self, node_id: NodeId) -> Option<usize> {
        self.nodes.get_index_of(&node_id)
    }

    /// Get all nodes in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.nodes.values()
    }

    /// Get all node ids in creation order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Id the next created node will receive
    pub fn next_node_id(&self) -> NodeId {
        NodeId(self.node_ids.peek())
    }

    fn existing_node_mut(&mut self, node_id: NodeId) -> Result<&mut NodeData, GraphError> {
        match self.nodes.get_mut(&node_id) {
            Some(node) => Ok(node),
            None => rejected(GraphError::NodeNotFound(node_id)),
        }
    }

    fn require_node(&self, node_id: NodeId) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node_id) {
            Ok(())
        } else {
            rejected(GraphError::NodeNotFound(node_id))
        }
    }

    /// Move a node. Non-finite positions are rejected.
    pub fn update_node_position(&mut self, node_id: NodeId, position: Vec2) -> Result<(), GraphError> {
        let node = self.existing_node_mut(node_id)?;
        if !position.is_finite() {
            return rejected(GraphError::NonFinitePosition(node_id));
        }
        node.position = position;
        self.dirty = true;
        Ok(())
    }

    /// Replace a node's parameter map
    pub fn update_node_parameters(
        &mut self,
        node_id: NodeId,
        parameters: IndexMap<String, String>,
    ) -> Result<(), GraphError> {
        self.existing_node_mut(node_id)?.parameters = parameters;
        self.dirty = true;
        Ok(())
    }

    /// Set a single parameter, returning the previous value
    pub fn set_node_parameter(
        &mut self,
        node_id: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, GraphError> {
        let previous = self
            .existing_node_mut(node_id)?
            .parameters
            .insert(key.into(), value.into());
        self.dirty = true;
        Ok(previous)
    }

    /// Change a node's display name
    pub fn rename_node(&mut self, node_id: NodeId, name: impl Into<String>) -> Result<(), GraphError> {
        self.existing_node_mut(node_id)?.name = name.into();
        self.dirty = true;
        Ok(())
    }

    // ---- tree structure ----------------------------------------------------

    /// Root node, if one is set
    pub fn root_node(&self) -> Option<NodeId> {
        self.root_node
    }

    /// Set or clear the root node, returning the previous root
    pub fn set_root_node(&mut self, root: Option<NodeId>) -> Result<Option<NodeId>, GraphError> {
        if let Some(root) = root {
            self.require_node(root)?;
        }
        let previous = std::mem::replace(&mut self.root_node, root);
        self.dirty = true;
        Ok(previous)
    }

    /// Append a child to a parent's ordered child list
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        let len = self.node(parent).map_or(0, |node| node.children.len());
        self.insert_child(parent, len, child)
    }

    /// Insert a child at `index` (clamped) in a parent's ordered child list
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), GraphError> {
        if parent == child {
            return rejected(GraphError::SelfReference(parent));
        }
        self.require_node(child)?;
        let node = self.existing_node_mut(parent)?;
        if node.children.contains(&child) {
            return rejected(GraphError::AlreadyChild { parent, child });
        }
        let index = index.min(node.children.len());
        node.children.insert(index, child);
        self.dirty = true;
        Ok(())
    }

    /// Remove a child from a parent's list, returning the index it held
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<usize, GraphError> {
        let node = self.existing_node_mut(parent)?;
        let Some(index) = node.children.iter().position(|id| *id == child) else {
            return rejected(GraphError::NotAChild { parent, child });
        };
        node.children.remove(index);
        self.dirty = true;
        Ok(index)
    }

    /// Set or clear a node's decorator child, returning the previous one
    pub fn set_decorator_child(
        &mut self,
        parent: NodeId,
        decorator: Option<NodeId>,
    ) -> Result<Option<NodeId>, GraphError> {
        if let Some(decorator) = decorator {
            if decorator == parent {
                return rejected(GraphError::SelfReference(parent));
            }
            self.require_node(decorator)?;
        }
        let node = self.existing_node_mut(parent)?;
        let previous = std::mem::replace(&mut node.decorator_child, decorator);
        self.dirty = true;
        Ok(previous)
    }

    // ---- links -------------------------------------------------------------

    /// Connect two pins and return the new link id
    pub fn connect_pins(&mut self, from_pin: PinId, to_pin: PinId) -> Result<LinkId, GraphError> {
        if !self.nodes.contains_key(&from_pin.node()) {
            return rejected(GraphError::PinNotFound(from_pin));
        }
        if !self.nodes.contains_key(&to_pin.node()) {
            return rejected(GraphError::PinNotFound(to_pin));
        }
        if from_pin == to_pin {
            return rejected(GraphError::SelfLoop);
        }
        if self
            .links
            .values()
            .any(|link| link.from_pin == from_pin && link.to_pin == to_pin)
        {
            return rejected(GraphError::DuplicateLink(from_pin, to_pin));
        }

        let id = LinkId(self.link_ids.allocate());
        self.links.insert(id, LinkData::new(id, from_pin, to_pin));
        tracing::debug!("Connected {from_pin} -> {to_pin} as {id}");
        self.dirty = true;
        Ok(id)
    }

    /// Remove a link
    pub fn disconnect_link(&mut self, link_id: LinkId) -> Option<LinkData> {
        let Some(link) = self.links.shift_remove(&link_id) else {
            tracing::warn!("Cannot disconnect {link_id}: not found");
            return None;
        };
        self.dirty = true;
        Some(link)
    }

    /// Reinsert a previously removed link under its original id
    pub fn restore_link(&mut self, index: usize, link: LinkData) -> Result<(), GraphError> {
        if link.id.is_none() || link.id.0 > MAX_ID {
            return rejected(GraphError::IdOutOfRange(link.id.0));
        }
        if self.links.contains_key(&link.id) {
            return rejected(GraphError::LinkExists(link.id));
        }
        self.link_ids.reserve(link.id.0);
        let index = index.min(self.links.len());
        self.links.shift_insert(index, link.id, link);
        self.dirty = true;
        Ok(())
    }

    /// Get a link by id
    pub fn link(&self, link_id: LinkId) -> Option<&LinkData> {
        self.links.get(&link_id)
    }

    /// Position of a link in iteration order
    pub fn link_index(&self, link_id: LinkId) -> Option<usize> {
        self.links.get_index_of(&link_id)
    }

    /// Get all links in creation order
    pub fn links(&self) -> impl Iterator<Item = &LinkData> {
        self.links.values()
    }

    /// Get links touching a node
    pub fn links_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &LinkData> {
        self.links.values().filter(move |link| link.involves_node(node_id))
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    // ---- structure checks --------------------------------------------------

    /// Whether the child/decorator edge set contains a cycle.
    ///
    /// Every node is tried as a DFS root so cycles in subgraphs that are not
    /// reachable from the root are found too.
    pub fn has_cycles(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// A node that closes a cycle, if any.
    ///
    /// Iterative DFS with an explicit recursion stack; edges to missing nodes
    /// are ignored.
    pub fn find_cycle(&self) -> Option<NodeId> {
        let mut visited: HashSet<NodeId> = HashSet::with_capacity(self.nodes.len());
        let mut on_stack: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<(NodeId, usize)> = Vec::new();

        for &start in self.nodes.keys() {
            if !visited.insert(start) {
                continue;
            }
            on_stack.insert(start);
            stack.push((start, 0));

            while let Some((node_id, cursor)) = stack.last_mut() {
                let node_id = *node_id;
                let next = self
                    .nodes
                    .get(&node_id)
                    .and_then(|node| node.structural_targets().nth(*cursor));

                let Some(target) = next else {
                    on_stack.remove(&node_id);
                    stack.pop();
                    continue;
                };
                *cursor += 1;

                if !self.nodes.contains_key(&target) {
                    continue;
                }
                if on_stack.contains(&target) {
                    return Some(target);
                }
                if visited.insert(target) {
                    on_stack.insert(target);
                    stack.push((target, 0));
                }
            }
        }

        None
    }

    /// Ids of nodes that list `child` as a child or decorator
    pub fn parents_of(&self, child: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .values()
            .filter(move |node| node.references(child))
            .map(|node| node.id)
    }

    // ---- dirty tracking ----------------------------------------------------

    /// Whether the document changed since it was loaded or saved
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the document as modified
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Mark the document as saved
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

impl Default for GraphDocument {
    fn default() -> Self {
        Self::new("Graph", "Graph")
    }
}
