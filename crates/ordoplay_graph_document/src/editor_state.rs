// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transient view state persisted with a document.
//!
//! Only [`EditorState::layout_direction`] is read by document algorithms;
//! the rest round-trips for the editor's benefit.

use crate::id::NodeId;
use crate::node::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction in which a tree grows when auto-laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LayoutDirection {
    /// Root at the top, children below
    #[default]
    TopToBottom,
    /// Root at the bottom, children above
    BottomToTop,
    /// Root on the left, children to the right
    LeftToRight,
    /// Root on the right, children to the left
    RightToLeft,
}

impl LayoutDirection {
    /// Wire name of this direction
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopToBottom => "TopToBottom",
            Self::BottomToTop => "BottomToTop",
            Self::LeftToRight => "LeftToRight",
            Self::RightToLeft => "RightToLeft",
        }
    }

    /// Whether the tree grows along the vertical axis
    pub fn is_vertical(&self) -> bool {
        matches!(self, Self::TopToBottom | Self::BottomToTop)
    }
}

impl fmt::Display for LayoutDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised direction name
#[derive(Debug, thiserror::Error)]
#[error("Unknown layout direction: {0}")]
pub struct UnknownDirection(pub String);

impl FromStr for LayoutDirection {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TopToBottom" => Ok(Self::TopToBottom),
            "BottomToTop" => Ok(Self::BottomToTop),
            "LeftToRight" => Ok(Self::LeftToRight),
            "RightToLeft" => Ok(Self::RightToLeft),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}

impl From<String> for LayoutDirection {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|err: UnknownDirection| {
            tracing::warn!("{err}, falling back to {}", Self::default());
            Self::default()
        })
    }
}

impl From<LayoutDirection> for String {
    fn from(value: LayoutDirection) -> Self {
        value.as_str().to_string()
    }
}

/// Editor view state saved alongside the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorState {
    /// Zoom factor
    pub zoom: f32,
    /// Canvas scroll offset
    pub scroll_offset: Vec2,
    /// Currently selected nodes
    pub selected_nodes: Vec<NodeId>,
    /// Direction used by auto-layout
    pub layout_direction: LayoutDirection,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            scroll_offset: Vec2::ZERO,
            selected_nodes: Vec::new(),
            layout_direction: LayoutDirection::TopToBottom,
        }
    }
}

impl EditorState {
    /// Check if a node is selected
    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selected_nodes.contains(&id)
    }

    /// Add a node to the selection (idempotent)
    pub fn select(&mut self, id: NodeId) {
        if !self.is_selected(id) {
            self.selected_nodes.push(id);
        }
    }

    /// Remove a node from the selection
    pub fn deselect(&mut self, id: NodeId) {
        self.selected_nodes.retain(|selected| *selected != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direction_parse() {
        assert_eq!("BottomToTop".parse::<LayoutDirection>().unwrap(), LayoutDirection::BottomToTop);
        assert!("Diagonal".parse::<LayoutDirection>().is_err());
    }

    #[test]
    fn test_unknown_direction_falls_back() {
        let state: EditorState = serde_json::from_value(json!({
            "layoutDirection": "Sideways"
        }))
        .unwrap();
        assert_eq!(state.layout_direction, LayoutDirection::TopToBottom);
        assert_eq!(state.zoom, 1.0);
    }

    #[test]
    fn test_editor_state_wire_names() {
        let mut state = EditorState::default();
        state.select(NodeId(3));
        state.select(NodeId(3));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["selectedNodes"], json!([3]));
        assert_eq!(value["layoutDirection"], json!("TopToBottom"));
        assert_eq!(value["scrollOffset"], json!({"x": 0.0, "y": 0.0}));
    }

    #[test]
    fn test_select_and_deselect() {
        let mut state = EditorState::default();
        state.select(NodeId(1));
        state.select(NodeId(2));
        state.deselect(NodeId(1));
        state.deselect(NodeId(9));
        assert!(!state.is_selected(NodeId(1)));
        assert_eq!(state.selected_nodes, vec![NodeId(2)]);
    }
}
