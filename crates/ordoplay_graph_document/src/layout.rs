// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic hierarchical auto-layout.
//!
//! A single post-order pass from the root: children are packed left to right
//! under their parent, a parent is centered over its children, and a
//! decorator sits beside the node it decorates on the same row. There is no
//! crossing minimization; the target graphs are shallow trees.

use crate::document::GraphDocument;
use crate::editor_state::LayoutDirection;
use crate::id::NodeId;
use crate::node::Vec2;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Layout parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Growth direction. Only vertical directions are implemented.
    pub direction: LayoutDirection,
    /// Width reserved for every node
    pub node_width: f32,
    /// Height of a node
    pub node_height: f32,
    /// Gap between horizontally adjacent nodes
    pub horizontal_spacing: f32,
    /// Distance between rows
    pub vertical_spacing: f32,
    /// X of the leftmost subtree
    pub start_x: f32,
    /// Y of the root row
    pub start_y: f32,
    /// Deepest row that is laid out; deeper nodes keep their position
    pub max_depth: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::TopToBottom,
            node_width: 200.0,
            node_height: 80.0,
            horizontal_spacing: 40.0,
            vertical_spacing: 150.0,
            start_x: 0.0,
            start_y: 0.0,
            max_depth: 64,
        }
    }
}

impl LayoutConfig {
    /// Same config with a different direction
    pub fn with_direction(mut self, direction: LayoutDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Horizontal space consumed by a leaf
    pub fn leaf_width(&self) -> f32 {
        self.node_width + self.horizontal_spacing
    }

    /// Whether every distance is a finite number
    pub fn is_finite(&self) -> bool {
        [
            self.node_width,
            self.node_height,
            self.horizontal_spacing,
            self.vertical_spacing,
            self.start_x,
            self.start_y,
        ]
        .iter()
        .all(|value| value.is_finite())
    }

    fn row_y(&self, depth: usize) -> f32 {
        let offset = depth as f32 * self.vertical_spacing;
        match self.direction {
            LayoutDirection::BottomToTop => self.start_y - offset,
            _ => self.start_y + offset,
        }
    }
}

/// Reason auto-layout refused to run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// Horizontal layouts are not implemented
    #[error("Layout direction {0} is not supported")]
    UnsupportedDirection(LayoutDirection),

    /// No root node set
    #[error("Graph has no root node")]
    NoRoot,

    /// Root id does not resolve
    #[error("Root node {0} does not exist")]
    MissingRoot(NodeId),

    /// Nothing to lay out
    #[error("Graph has no nodes")]
    EmptyGraph,

    /// A spacing or origin is NaN or infinite
    #[error("Layout config contains a non-finite value")]
    NonFiniteConfig,
}

struct Placement {
    width: f32,
    x: Option<f32>,
}

struct TreeLayout<'a> {
    doc: &'a GraphDocument,
    config: &'a LayoutConfig,
    visited: HashSet<NodeId>,
    positions: IndexMap<NodeId, Vec2>,
}

impl<'a> TreeLayout<'a> {
    fn new(doc: &'a GraphDocument, config: &'a LayoutConfig) -> Self {
        Self {
            doc,
            config,
            visited: HashSet::with_capacity(doc.node_count()),
            positions: IndexMap::with_capacity(doc.node_count()),
        }
    }

    fn place(&mut self, node_id: NodeId, start_x: f32, depth: usize) -> Placement {
        let doc = self.doc;
        let Some(node) = doc.node(node_id) else {
            tracing::debug!("Layout skipped missing {node_id}");
            return Placement { width: 0.0, x: None };
        };
        let leaf = Placement {
            width: self.config.leaf_width(),
            x: None,
        };
        if depth > self.config.max_depth {
            tracing::warn!("Layout depth limit reached at {node_id}");
            return leaf;
        }
        if !self.visited.insert(node_id) {
            tracing::debug!("Layout revisited {node_id}, skipping");
            return leaf;
        }

        let mut cursor = start_x;
        let mut span: Option<(f32, f32)> = None;
        for &child in &node.children {
            let placed = self.place(child, cursor, depth + 1);
            if let Some(child_x) = placed.x {
                span = Some(match span {
                    Some((first, _)) => (first, child_x),
                    None => (child_x, child_x),
                });
            }
            cursor += placed.width;
        }

        let width = self.config.node_width;
        let x = match span {
            Some((first, last)) => {
                let children_span = last + width - first;
                first + children_span / 2.0 - width / 2.0
            }
            None => start_x,
        };
        self.positions.insert(node_id, Vec2::new(x, self.config.row_y(depth)));

        if let Some(decorator) = node.decorator_child {
            self.place(decorator, x + self.config.leaf_width(), depth);
        }

        let consumed = cursor - start_x;
        Placement {
            width: if consumed > 0.0 { consumed } else { self.config.leaf_width() },
            x: Some(x),
        }
    }
}

impl GraphDocument {
    /// Lay out the tree hanging from the root node.
    ///
    /// Returns the number of nodes moved. On error nothing is moved. Nodes
    /// not reachable from the root keep their positions.
    pub fn auto_layout(&mut self, config: &LayoutConfig) -> Result<usize, LayoutError> {
        let positions = match self.compute_layout(config) {
            Ok(positions) => positions,
            Err(err) => {
                tracing::warn!("Auto-layout rejected: {err}");
                return Err(err);
            }
        };

        let count = positions.len();
        for (node_id, position) in positions {
            if let Some(node) = self.node_mut(node_id) {
                node.position = position;
            }
        }
        self.mark_dirty();
        tracing::info!("Auto-layout placed {count} nodes ({})", config.direction);
        Ok(count)
    }

    /// Compute layout positions without applying them
    pub fn compute_layout(&self, config: &LayoutConfig) -> Result<IndexMap<NodeId, Vec2>, LayoutError> {
        if !config.direction.is_vertical() {
            return Err(LayoutError::UnsupportedDirection(config.direction));
        }
        if !config.is_finite() {
            return Err(LayoutError::NonFiniteConfig);
        }
        let root = self.root_node().ok_or(LayoutError::NoRoot)?;
        if !self.contains_node(root) {
            return Err(LayoutError::MissingRoot(root));
        }
        if self.is_empty() {
            return Err(LayoutError::EmptyGraph);
        }

        let mut layout = TreeLayout::new(self, config);
        layout.place(root, config.start_x, 0);
        Ok(layout.positions)
    }
}
