// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undoable graph edits.
//!
//! Every command captures what it needs to revert itself the first time it
//! runs. Redo never allocates new ids: a recreated node or link comes back
//! under the id it had, at the position it had in iteration order.

use crate::document::{GraphDocument, GraphError};
use crate::history::{Command, CommandError};
use crate::id::{LinkId, NodeId, PinId};
use crate::layout::LayoutConfig;
use crate::link::LinkData;
use crate::node::{NodeData, Vec2};
use indexmap::IndexMap;

fn not_executed(description: &str) -> CommandError {
    CommandError::InvalidState(format!("'{description}' has not been executed"))
}

/// Command to create a node
#[derive(Debug, Clone)]
pub struct CreateNodeCommand {
    /// Type tag of the new node
    pub node_type: String,
    /// Initial position
    pub position: Vec2,
    created: Option<(usize, NodeData)>,
}

impl CreateNodeCommand {
    /// Create a new create-node command
    pub fn new(node_type: impl Into<String>, position: Vec2) -> Self {
        Self {
            node_type: node_type.into(),
            position,
            created: None,
        }
    }

    /// Id of the node, once executed
    pub fn node_id(&self) -> Option<NodeId> {
        self.created.as_ref().map(|(_, node)| node.id)
    }
}

impl Command<GraphDocument> for CreateNodeCommand {
    fn description(&self) -> &str {
        "Create Node"
    }

    fn execute(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        match self.created.clone() {
            Some((index, node)) => doc.restore_node(index, node)?,
            None => {
                let id = doc.create_node(self.node_type.clone(), self.position);
                let index = doc.node_index(id).unwrap_or_default();
                let node = doc.node(id).cloned().ok_or_else(|| not_executed("Create Node"))?;
                self.created = Some((index, node));
            }
        }
        Ok(())
    }

    fn undo(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let id = self.node_id().ok_or_else(|| not_executed("Create Node"))?;
        let index = doc.node_index(id).unwrap_or_default();
        let node = doc
            .delete_node(id)
            .ok_or(GraphError::NodeNotFound(id))?;
        // Keep edits made after creation (e.g. renames) for redo.
        self.created = Some((index, node));
        Ok(())
    }
}

/// Command to delete a node.
///
/// References to the node from other nodes and links are left in place, so
/// undo only needs to bring the node itself back.
#[derive(Debug, Clone)]
pub struct DeleteNodeCommand {
    /// Node to delete
    pub node_id: NodeId,
    removed: Option<(usize, NodeData)>,
}

impl DeleteNodeCommand {
    /// Create a new delete command
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            removed: None,
        }
    }
}

impl Command<GraphDocument> for DeleteNodeCommand {
    fn description(&self) -> &str {
        "Delete Node"
    }

    fn execute(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let index = doc
            .node_index(self.node_id)
            .ok_or(GraphError::NodeNotFound(self.node_id))?;
        let node = doc
            .delete_node(self.node_id)
            .ok_or(GraphError::NodeNotFound(self.node_id))?;
        self.removed = Some((index, node));
        Ok(())
    }

    fn undo(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let (index, node) = self.removed.clone().ok_or_else(|| not_executed("Delete Node"))?;
        doc.restore_node(index, node)?;
        Ok(())
    }
}

/// Command to move a node
#[derive(Debug, Clone)]
pub struct MoveNodeCommand {
    /// Node being moved
    pub node_id: NodeId,
    /// Destination
    pub to: Vec2,
    from: Option<Vec2>,
}

impl MoveNodeCommand {
    /// Create a new move command
    pub fn new(node_id: NodeId, to: Vec2) -> Self {
        Self {
            node_id,
            to,
            from: None,
        }
    }
}

impl Command<GraphDocument> for MoveNodeCommand {
    fn description(&self) -> &str {
        "Move Node"
    }

    fn execute(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let from = doc
            .node(self.node_id)
            .map(|node| node.position)
            .ok_or(GraphError::NodeNotFound(self.node_id))?;
        doc.update_node_position(self.node_id, self.to)?;
        self.from = Some(from);
        Ok(())
    }

    fn undo(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let from = self.from.ok_or_else(|| not_executed("Move Node"))?;
        doc.update_node_position(self.node_id, from)?;
        Ok(())
    }
}

/// Command to replace a node's parameters
#[derive(Debug, Clone)]
pub struct SetParametersCommand {
    /// Node being edited
    pub node_id: NodeId,
    /// New parameter map
    pub parameters: IndexMap<String, String>,
    previous: Option<IndexMap<String, String>>,
}

impl SetParametersCommand {
    /// Create a new parameter command
    pub fn new(node_id: NodeId, parameters: IndexMap<String, String>) -> Self {
        Self {
            node_id,
            parameters,
            previous: None,
        }
    }
}

impl Command<GraphDocument> for SetParametersCommand {
    fn description(&self) -> &str {
        "Edit Parameters"
    }

    fn execute(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let previous = doc
            .node(self.node_id)
            .map(|node| node.parameters.clone())
            .ok_or(GraphError::NodeNotFound(self.node_id))?;
        doc.update_node_parameters(self.node_id, self.parameters.clone())?;
        self.previous = Some(previous);
        Ok(())
    }

    fn undo(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let previous = self.previous.clone().ok_or_else(|| not_executed("Edit Parameters"))?;
        doc.update_node_parameters(self.node_id, previous)?;
        Ok(())
    }
}

/// Command to link two pins
#[derive(Debug, Clone)]
pub struct ConnectPinsCommand {
    /// Source pin
    pub from_pin: PinId,
    /// Target pin
    pub to_pin: PinId,
    created: Option<(usize, LinkData)>,
}

impl ConnectPinsCommand {
    /// Create a new connect command
    pub fn new(from_pin: PinId, to_pin: PinId) -> Self {
        Self {
            from_pin,
            to_pin,
            created: None,
        }
    }

    /// Id of the link, once executed
    pub fn link_id(&self) -> Option<LinkId> {
        self.created.map(|(_, link)| link.id)
    }
}

impl Command<GraphDocument> for ConnectPinsCommand {
    fn description(&self) -> &str {
        "Connect Pins"
    }

    fn execute(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        match self.created {
            Some((index, link)) => doc.restore_link(index, link)?,
            None => {
                let id = doc.connect_pins(self.from_pin, self.to_pin)?;
                let index = doc.link_index(id).unwrap_or_default();
                self.created = Some((index, LinkData::new(id, self.from_pin, self.to_pin)));
            }
        }
        Ok(())
    }

    fn undo(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let id = self.link_id().ok_or_else(|| not_executed("Connect Pins"))?;
        doc.disconnect_link(id)
            .ok_or(GraphError::LinkNotFound(id))?;
        Ok(())
    }
}

/// Command to remove a link
#[derive(Debug, Clone)]
pub struct DisconnectLinkCommand {
    /// Link to remove
    pub link_id: LinkId,
    removed: Option<(usize, LinkData)>,
}

impl DisconnectLinkCommand {
    /// Create a new disconnect command
    pub fn new(link_id: LinkId) -> Self {
        Self {
            link_id,
            removed: None,
        }
    }
}

impl Command<GraphDocument> for DisconnectLinkCommand {
    fn description(&self) -> &str {
        "Disconnect Link"
    }

    fn execute(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let index = doc
            .link_index(self.link_id)
            .ok_or(GraphError::LinkNotFound(self.link_id))?;
        let link = doc
            .disconnect_link(self.link_id)
            .ok_or(GraphError::LinkNotFound(self.link_id))?;
        self.removed = Some((index, link));
        Ok(())
    }

    fn undo(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let (index, link) = self.removed.ok_or_else(|| not_executed("Disconnect Link"))?;
        doc.restore_link(index, link)?;
        Ok(())
    }
}

/// Command to insert a node into a parent's ordered child list
#[derive(Debug, Clone)]
pub struct AddChildCommand {
    /// Parent node
    pub parent: NodeId,
    /// Child node
    pub child: NodeId,
    /// Insertion index; `None` appends
    pub index: Option<usize>,
}

impl AddChildCommand {
    /// Append `child` to `parent`
    pub fn new(parent: NodeId, child: NodeId) -> Self {
        Self {
            parent,
            child,
            index: None,
        }
    }

    /// Insert at a specific index instead of appending
    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl Command<GraphDocument> for AddChildCommand {
    fn description(&self) -> &str {
        "Add Child"
    }

    fn execute(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        match self.index {
            Some(index) => doc.insert_child(self.parent, index, self.child)?,
            None => doc.add_child(self.parent, self.child)?,
        }
        Ok(())
    }

    fn undo(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        doc.remove_child(self.parent, self.child)?;
        Ok(())
    }
}

/// Command to auto-layout the whole tree
#[derive(Debug, Clone)]
pub struct AutoLayoutCommand {
    /// Layout parameters
    pub config: LayoutConfig,
    previous: Option<IndexMap<NodeId, Vec2>>,
}

impl AutoLayoutCommand {
    /// Create a new layout command
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            previous: None,
        }
    }
}

impl Command<GraphDocument> for AutoLayoutCommand {
    fn description(&self) -> &str {
        "Auto Layout"
    }

    fn execute(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let previous = doc.nodes().map(|node| (node.id, node.position)).collect();
        doc.auto_layout(&self.config)?;
        self.previous = Some(previous);
        Ok(())
    }

    fn undo(&mut self, doc: &mut GraphDocument) -> Result<(), CommandError> {
        let previous = self.previous.as_ref().ok_or_else(|| not_executed("Auto Layout"))?;
        for (node_id, position) in previous {
            if let Some(node) = doc.node_mut(*node_id) {
                node.position = *position;
            }
        }
        doc.mark_dirty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor_state::LayoutDirection;
    use crate::history::CommandHistory;

    fn snapshot(doc: &GraphDocument) -> serde_json::Value {
        doc.to_json().unwrap()
    }

    #[test]
    fn test_create_undo_redo_keeps_id() {
        let mut doc = GraphDocument::default();
        let mut history = CommandHistory::new();
        let before = snapshot(&doc);

        history
            .execute_command(Box::new(CreateNodeCommand::new("Leaf", Vec2::new(1.0, 2.0))), &mut doc)
            .unwrap();
        let after = snapshot(&doc);
        let id = doc.node_ids().next().unwrap();

        history.undo(&mut doc).unwrap();
        assert_eq!(snapshot(&doc), before);
        assert!(doc.node(id).is_none());

        history.redo(&mut doc).unwrap();
        assert_eq!(snapshot(&doc), after);
        assert!(doc.node(id).is_some());

        // The counter never went backwards.
        assert!(doc.create_node("Leaf", Vec2::ZERO) > id);
    }

    #[test]
    fn test_delete_undo_restores_position_in_order() {
        let mut doc = GraphDocument::default();
        let a = doc.create_node("A", Vec2::ZERO);
        let b = doc.create_node("B", Vec2::ZERO);
        let c = doc.create_node("C", Vec2::ZERO);
        let mut history = CommandHistory::new();
        let before = snapshot(&doc);

        history.execute_command(Box::new(DeleteNodeCommand::new(b)), &mut doc).unwrap();
        assert_eq!(doc.node_ids().collect::<Vec<_>>(), vec![a, c]);

        history.undo(&mut doc).unwrap();
        assert_eq!(snapshot(&doc), before);

        history.redo(&mut doc).unwrap();
        assert!(doc.node(b).is_none());
    }

    #[test]
    fn test_delete_unknown_node_fails_without_recording() {
        let mut doc = GraphDocument::default();
        let mut history = CommandHistory::new();
        let err = history
            .execute_command(Box::new(DeleteNodeCommand::new(NodeId(4))), &mut doc)
            .unwrap_err();
        assert_eq!(err, CommandError::Graph(GraphError::NodeNotFound(NodeId(4))));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_move_and_parameters() {
        let mut doc = GraphDocument::default();
        let id = doc.create_node("Wait", Vec2::ZERO);
        doc.set_node_parameter(id, "duration", "1").unwrap();
        let mut history = CommandHistory::new();
        let before = snapshot(&doc);

        history
            .execute_command(Box::new(MoveNodeCommand::new(id, Vec2::new(30.0, 40.0))), &mut doc)
            .unwrap();
        let mut params = IndexMap::new();
        params.insert("duration".to_string(), "5".to_string());
        history
            .execute_command(Box::new(SetParametersCommand::new(id, params)), &mut doc)
            .unwrap();

        assert_eq!(doc.node(id).unwrap().parameter("duration"), Some("5"));
        assert_eq!(history.undo_description(), Some("Edit Parameters"));

        history.undo(&mut doc).unwrap();
        history.undo(&mut doc).unwrap();
        assert_eq!(snapshot(&doc), before);
    }

    #[test]
    fn test_connect_and_disconnect_round_trip() {
        let mut doc = GraphDocument::default();
        let a = doc.create_node("A", Vec2::ZERO);
        let b = doc.create_node("B", Vec2::ZERO);
        let mut history = CommandHistory::new();

        history
            .execute_command(Box::new(ConnectPinsCommand::new(a.into(), b.into())), &mut doc)
            .unwrap();
        let link = doc.links().next().unwrap().id;
        let connected = snapshot(&doc);

        history
            .execute_command(Box::new(DisconnectLinkCommand::new(link)), &mut doc)
            .unwrap();
        assert_eq!(doc.link_count(), 0);

        history.undo(&mut doc).unwrap();
        assert_eq!(snapshot(&doc), connected);

        history.undo(&mut doc).unwrap();
        assert_eq!(doc.link_count(), 0);
        history.redo(&mut doc).unwrap();
        assert_eq!(doc.link(link).map(|l| l.to_node()), Some(b));
    }

    #[test]
    fn test_add_child_undo() {
        let mut doc = GraphDocument::default();
        let parent = doc.create_node("BT_Sequence", Vec2::ZERO);
        let first = doc.create_node("A", Vec2::ZERO);
        let second = doc.create_node("B", Vec2::ZERO);
        doc.add_child(parent, second).unwrap();
        let mut history = CommandHistory::new();

        history
            .execute_command(Box::new(AddChildCommand::new(parent, first).at(0)), &mut doc)
            .unwrap();
        assert_eq!(doc.node(parent).unwrap().children, vec![first, second]);

        history.undo(&mut doc).unwrap();
        assert_eq!(doc.node(parent).unwrap().children, vec![second]);
    }

    #[test]
    fn test_auto_layout_undo_restores_positions() {
        let mut doc = GraphDocument::default();
        let root = doc.create_node("BT_Selector", Vec2::new(3.0, 3.0));
        let leaf = doc.create_node("Leaf", Vec2::new(-7.0, 9.0));
        doc.add_child(root, leaf).unwrap();
        doc.set_root_node(Some(root)).unwrap();
        let before = snapshot(&doc);
        let mut history = CommandHistory::new();

        history
            .execute_command(Box::new(AutoLayoutCommand::new(LayoutConfig::default())), &mut doc)
            .unwrap();
        assert_ne!(snapshot(&doc), before);

        history.undo(&mut doc).unwrap();
        assert_eq!(snapshot(&doc), before);

        let horizontal = LayoutConfig::default().with_direction(LayoutDirection::RightToLeft);
        assert!(history
            .execute_command(Box::new(AutoLayoutCommand::new(horizontal)), &mut doc)
            .is_err());
        assert!(history.can_redo());
    }

    #[test]
    fn test_failed_undo_can_be_retried() {
        let mut doc = GraphDocument::default();
        let id = doc.create_node("Wait", Vec2::ZERO);
        doc.set_node_parameter(id, "duration", "1").unwrap();
        let mut history = CommandHistory::new();

        let mut params = IndexMap::new();
        params.insert("duration".to_string(), "5".to_string());
        history
            .execute_command(Box::new(SetParametersCommand::new(id, params)), &mut doc)
            .unwrap();

        let index = doc.node_index(id).unwrap();
        let node = doc.delete_node(id).unwrap();
        assert_eq!(
            history.undo(&mut doc),
            Err(CommandError::Graph(GraphError::NodeNotFound(id)))
        );
        assert!(history.can_undo());

        doc.restore_node(index, node).unwrap();
        assert_eq!(history.undo(&mut doc), Ok(true));
        assert_eq!(doc.node(id).unwrap().parameter("duration"), Some("1"));
    }

    #[test]
    fn test_failed_link_restore_keeps_removed_link() {
        let mut doc = GraphDocument::default();
        let a = doc.create_node("A", Vec2::ZERO);
        let b = doc.create_node("B", Vec2::ZERO);
        let link = doc.connect_pins(a.into(), b.into()).unwrap();
        let mut history = CommandHistory::new();

        history
            .execute_command(Box::new(DisconnectLinkCommand::new(link)), &mut doc)
            .unwrap();
        doc.restore_link(0, LinkData::new(link, b.into(), a.into())).unwrap();
        assert_eq!(
            history.undo(&mut doc),
            Err(CommandError::Graph(GraphError::LinkExists(link)))
        );

        doc.disconnect_link(link).unwrap();
        assert_eq!(history.undo(&mut doc), Ok(true));
        assert_eq!(doc.link(link).map(|l| l.to_node()), Some(b));
    }
}
