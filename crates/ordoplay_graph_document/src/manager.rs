// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of open graph documents.
//!
//! The manager owns every open [`GraphDocument`] together with its undo
//! history and backing path. It is constructed by the host and passed
//! around explicitly; there is no global instance.

use crate::commands::AutoLayoutCommand;
use crate::document::{GraphDocument, GraphMetadata};
use crate::history::{Command, CommandError, CommandHistory};
use crate::id::{GraphId, IdCounter};
use crate::layout::{LayoutConfig, LayoutError};
use crate::migration::{self, MigrationError};
use crate::serialization::SerializationError;
use crate::settings::GraphEngineSettings;
use crate::storage::{FsStorage, GraphStorage};
use crate::validation::{NodeRuleRegistry, ValidationError};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Error raised by the graph manager
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// No open graph has this id
    #[error("Graph not found: {0}")]
    GraphNotFound(GraphId),

    /// Reading or writing the backing file failed
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File could not be migrated to the current schema
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    /// Document could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// An undoable edit failed
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// The document broke a structural rule
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Auto-layout refused to run
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    /// Graph was never saved or loaded, so it has no path
    #[error("Graph {0} has no file path")]
    NoPath(GraphId),
}

struct GraphEntry {
    document: GraphDocument,
    history: CommandHistory<GraphDocument>,
    path: Option<PathBuf>,
}

/// Owns open graph documents and tracks the focused one
pub struct NodeGraphManager<S: GraphStorage = FsStorage> {
    storage: S,
    settings: GraphEngineSettings,
    rules: NodeRuleRegistry,
    graphs: IndexMap<GraphId, GraphEntry>,
    active: Option<GraphId>,
    graph_ids: IdCounter,
}

impl NodeGraphManager<FsStorage> {
    /// Create a manager backed by the file system with default settings
    pub fn new() -> Self {
        Self::with_storage(FsStorage, GraphEngineSettings::default())
    }
}

impl Default for NodeGraphManager<FsStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphStorage> NodeGraphManager<S> {
    /// Create a manager with explicit storage and settings
    pub fn with_storage(storage: S, settings: GraphEngineSettings) -> Self {
        let rules = settings.rule_registry();
        Self {
            storage,
            settings,
            rules,
            graphs: IndexMap::new(),
            active: None,
            graph_ids: IdCounter::new(),
        }
    }

    /// Engine settings
    pub fn settings(&self) -> &GraphEngineSettings {
        &self.settings
    }

    /// Backing storage
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Validation rules used by [`Self::validate_graph`]
    pub fn rules(&self) -> &NodeRuleRegistry {
        &self.rules
    }

    /// Register domain rules
    pub fn rules_mut(&mut self) -> &mut NodeRuleRegistry {
        &mut self.rules
    }

    // ---- Lifecycle ----

    /// Create an empty graph and make it active
    pub fn create_graph(
        &mut self,
        graph_type: impl Into<String>,
        graph_kind: impl Into<String>,
    ) -> GraphId {
        let mut document = GraphDocument::new(graph_type, graph_kind);
        document.metadata = GraphMetadata::new(self.settings.default_author.clone());
        let id = self.insert_graph(document, None);
        tracing::info!("Created graph {id}");
        id
    }

    /// Take ownership of an existing document and make it active
    pub fn open_document(&mut self, document: GraphDocument) -> GraphId {
        self.insert_graph(document, None)
    }

    /// Load a graph file, migrating older schemas, and make it active.
    ///
    /// Nothing is registered if reading, parsing or migration fails.
    pub fn load_graph(&mut self, path: impl AsRef<Path>) -> Result<GraphId, ManagerError> {
        let path = path.as_ref();
        match self.read_document(path) {
            Ok(document) => {
                let id = self.insert_graph(document, Some(path.to_path_buf()));
                tracing::info!("Loaded graph {id} from {}", path.display());
                Ok(id)
            }
            Err(err) => {
                tracing::warn!("Failed to load graph from {}: {err}", path.display());
                Err(err)
            }
        }
    }

    fn read_document(&self, path: &Path) -> Result<GraphDocument, ManagerError> {
        let bytes = self.storage.read(path).map_err(|source| ManagerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let json: serde_json::Value = serde_json::from_slice(&bytes)?;
        let mut document = migration::load_with_migration(&json)?;
        document.clear_dirty();
        Ok(document)
    }

    /// Save a graph as schema v2 and remember `path` for later saves
    pub fn save_graph(&mut self, id: GraphId, path: impl AsRef<Path>) -> Result<(), ManagerError> {
        let path = path.as_ref();
        let pretty = self.settings.pretty_json;
        let entry = self.graphs.get_mut(&id).ok_or(ManagerError::GraphNotFound(id))?;

        let text = entry.document.to_json_string(pretty)?;
        self.storage
            .write(path, text.as_bytes())
            .map_err(|source| ManagerError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        entry.document.clear_dirty();
        entry.path = Some(path.to_path_buf());
        tracing::info!("Saved graph {id} to {}", path.display());
        Ok(())
    }

    /// Save a graph to the path it was loaded from or last saved to
    pub fn save_graph_in_place(&mut self, id: GraphId) -> Result<(), ManagerError> {
        let entry = self.graphs.get(&id).ok_or(ManagerError::GraphNotFound(id))?;
        let path = entry.path.clone().ok_or(ManagerError::NoPath(id))?;
        self.save_graph(id, path)
    }

    /// Close a graph and hand back its document.
    ///
    /// If the closed graph was active, the most recently opened remaining
    /// graph becomes active.
    pub fn close_graph(&mut self, id: GraphId) -> Option<GraphDocument> {
        let entry = self.graphs.shift_remove(&id)?;
        if self.active == Some(id) {
            self.active = self.graphs.last().map(|(&next, _)| next);
        }
        if entry.document.is_dirty() {
            tracing::warn!("Closed graph {id} with unsaved changes");
        } else {
            tracing::debug!("Closed graph {id}");
        }
        Some(entry.document)
    }

    fn insert_graph(&mut self, document: GraphDocument, path: Option<PathBuf>) -> GraphId {
        let id = GraphId(self.graph_ids.allocate());
        self.graphs.insert(
            id,
            GraphEntry {
                document,
                history: CommandHistory::with_max_depth(self.settings.history_depth),
                path,
            },
        );
        self.active = Some(id);
        id
    }

    // ---- Lookup ----

    /// Focus a graph
    pub fn set_active_graph(&mut self, id: GraphId) -> Result<(), ManagerError> {
        if !self.graphs.contains_key(&id) {
            tracing::warn!("Cannot activate unknown graph {id}");
            return Err(ManagerError::GraphNotFound(id));
        }
        self.active = Some(id);
        Ok(())
    }

    /// Id of the focused graph
    pub fn active_graph_id(&self) -> Option<GraphId> {
        self.active
    }

    /// The focused graph
    pub fn active_graph(&self) -> Option<&GraphDocument> {
        self.active.and_then(|id| self.get_graph(id))
    }

    /// The focused graph, mutably
    pub fn active_graph_mut(&mut self) -> Option<&mut GraphDocument> {
        let id = self.active?;
        self.get_graph_mut(id)
    }

    /// Get an open graph
    pub fn get_graph(&self, id: GraphId) -> Option<&GraphDocument> {
        self.graphs.get(&id).map(|entry| &entry.document)
    }

    /// Get an open graph mutably.
    ///
    /// Edits made here bypass the undo history.
    pub fn get_graph_mut(&mut self, id: GraphId) -> Option<&mut GraphDocument> {
        self.graphs.get_mut(&id).map(|entry| &mut entry.document)
    }

    /// Open graph ids, oldest first
    pub fn graph_ids(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.graphs.keys().copied()
    }

    /// Number of open graphs
    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// Backing file of a graph, if it has one
    pub fn graph_path(&self, id: GraphId) -> Option<&Path> {
        self.graphs.get(&id).and_then(|entry| entry.path.as_deref())
    }

    /// Whether any open graph has unsaved changes
    pub fn has_unsaved_changes(&self) -> bool {
        self.graphs.values().any(|entry| entry.document.is_dirty())
    }

    // ---- Editing ----

    /// Run an undoable command against a graph
    pub fn execute_command(
        &mut self,
        id: GraphId,
        command: Box<dyn Command<GraphDocument>>,
    ) -> Result<(), ManagerError> {
        let entry = self.entry_mut(id)?;
        entry.history.execute_command(command, &mut entry.document)?;
        Ok(())
    }

    /// Undo the last command on a graph. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self, id: GraphId) -> Result<bool, ManagerError> {
        let entry = self.entry_mut(id)?;
        Ok(entry.history.undo(&mut entry.document)?)
    }

    /// Redo the last undone command on a graph. Returns `false` if there was nothing to redo.
    pub fn redo(&mut self, id: GraphId) -> Result<bool, ManagerError> {
        let entry = self.entry_mut(id)?;
        Ok(entry.history.redo(&mut entry.document)?)
    }

    /// Whether a graph has something to undo
    pub fn can_undo(&self, id: GraphId) -> bool {
        self.graphs.get(&id).is_some_and(|entry| entry.history.can_undo())
    }

    /// Whether a graph has something to redo
    pub fn can_redo(&self, id: GraphId) -> bool {
        self.graphs.get(&id).is_some_and(|entry| entry.history.can_redo())
    }

    /// Undo history of a graph
    pub fn history(&self, id: GraphId) -> Option<&CommandHistory<GraphDocument>> {
        self.graphs.get(&id).map(|entry| &entry.history)
    }

    /// Check a graph against the registered rules
    pub fn validate_graph(&self, id: GraphId) -> Result<(), ManagerError> {
        let entry = self.graphs.get(&id).ok_or(ManagerError::GraphNotFound(id))?;
        entry.document.validate_graph(&self.rules)?;
        Ok(())
    }

    /// Lay out a graph as an undoable step.
    ///
    /// Spacing comes from the settings, direction from the graph's editor state.
    pub fn auto_layout_graph(&mut self, id: GraphId) -> Result<(), ManagerError> {
        let config = self.layout_config_for(id)?;
        let entry = self.entry_mut(id)?;
        match entry
            .history
            .execute_command(Box::new(AutoLayoutCommand::new(config)), &mut entry.document)
        {
            Ok(()) => Ok(()),
            Err(CommandError::Layout(err)) => Err(ManagerError::Layout(err)),
            Err(err) => Err(err.into()),
        }
    }

    fn layout_config_for(&self, id: GraphId) -> Result<LayoutConfig, ManagerError> {
        let document = self.get_graph(id).ok_or(ManagerError::GraphNotFound(id))?;
        Ok(self
            .settings
            .layout
            .clone()
            .with_direction(document.editor_state.layout_direction))
    }

    fn entry_mut(&mut self, id: GraphId) -> Result<&mut GraphEntry, ManagerError> {
        self.graphs.get_mut(&id).ok_or(ManagerError::GraphNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{AddChildCommand, CreateNodeCommand};
    use crate::editor_state::LayoutDirection;
    use crate::node::Vec2;
    use crate::storage::MemoryStorage;

    fn manager() -> NodeGraphManager<MemoryStorage> {
        NodeGraphManager::with_storage(MemoryStorage::new(), GraphEngineSettings::default())
    }

    #[test]
    fn test_create_sets_active() {
        let mut manager = manager();
        let first = manager.create_graph("BehaviorTree", "BehaviorTree");
        let second = manager.create_graph("StateMachine", "StateMachine");

        assert_ne!(first, second);
        assert_eq!(manager.active_graph_id(), Some(second));
        assert_eq!(manager.graph_ids().collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(manager.get_graph(first).unwrap().graph_type, "BehaviorTree");
    }

    #[test]
    fn test_close_active_falls_back_to_latest() {
        let mut manager = manager();
        let a = manager.create_graph("A", "A");
        let b = manager.create_graph("B", "B");
        let c = manager.create_graph("C", "C");

        manager.set_active_graph(c).unwrap();
        assert!(manager.close_graph(c).is_some());
        assert_eq!(manager.active_graph_id(), Some(b));

        // Closing an inactive graph keeps focus.
        manager.close_graph(a);
        assert_eq!(manager.active_graph_id(), Some(b));

        manager.close_graph(b);
        assert_eq!(manager.active_graph_id(), None);
        assert!(manager.active_graph().is_none());
        assert!(manager.close_graph(b).is_none());
    }

    #[test]
    fn test_set_active_unknown_graph() {
        let mut manager = manager();
        let id = manager.create_graph("A", "A");
        assert!(matches!(
            manager.set_active_graph(GraphId(99)),
            Err(ManagerError::GraphNotFound(_))
        ));
        assert_eq!(manager.active_graph_id(), Some(id));
    }

    #[test]
    fn test_save_then_load() {
        let mut manager = manager();
        let id = manager.create_graph("BehaviorTree", "BehaviorTree");
        {
            let doc = manager.get_graph_mut(id).unwrap();
            let root = doc.create_node("BT_Selector", Vec2::new(1.0, 2.0));
            doc.set_root_node(Some(root)).unwrap();
        }
        assert!(manager.has_unsaved_changes());

        manager.save_graph(id, "trees/ai.json").unwrap();
        assert!(!manager.has_unsaved_changes());
        assert_eq!(manager.graph_path(id), Some(Path::new("trees/ai.json")));

        let loaded = manager.load_graph("trees/ai.json").unwrap();
        assert_eq!(manager.active_graph_id(), Some(loaded));
        let doc = manager.get_graph(loaded).unwrap();
        assert_eq!(doc.node_count(), 1);
        assert!(doc.root_node().is_some());
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_load_failure_registers_nothing() {
        let mut manager = manager();
        manager.storage().insert("bad.json", "{ not json");
        manager
            .storage()
            .insert("future.json", r#"{"schemaVersion": 7, "graphKind": "X", "data": {}}"#);

        assert!(matches!(
            manager.load_graph("missing.json"),
            Err(ManagerError::Io { .. })
        ));
        assert!(matches!(manager.load_graph("bad.json"), Err(ManagerError::Json(_))));
        assert!(matches!(
            manager.load_graph("future.json"),
            Err(ManagerError::Migration(MigrationError::UnsupportedVersion(7)))
        ));
        assert_eq!(manager.graph_count(), 0);
        assert_eq!(manager.active_graph_id(), None);
    }

    #[test]
    fn test_load_migrates_legacy_file() {
        let mut manager = manager();
        manager.storage().insert(
            "legacy.json",
            r#"{
                "rootNodeId": 1,
                "nodes": [
                    {"id": 1, "type": "BT_Sequence", "name": "Root", "childIds": [2]},
                    {"id": 2, "type": "BT_Action", "name": "Act"}
                ]
            }"#,
        );

        let id = manager.load_graph("legacy.json").unwrap();
        manager.validate_graph(id).unwrap();
        manager.save_graph_in_place(id).unwrap();

        let saved = manager.storage().get(Path::new("legacy.json")).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&saved).unwrap();
        assert_eq!(json["schemaVersion"], 2);
        assert_eq!(json["data"]["nodes"][0]["children"], serde_json::json!([2]));
    }

    #[test]
    fn test_save_in_place_without_path() {
        let mut manager = manager();
        let id = manager.create_graph("A", "A");
        assert!(matches!(
            manager.save_graph_in_place(id),
            Err(ManagerError::NoPath(_))
        ));
    }

    #[test]
    fn test_per_graph_history() {
        let mut manager = manager();
        let a = manager.create_graph("A", "A");
        let b = manager.create_graph("B", "B");

        manager
            .execute_command(a, Box::new(CreateNodeCommand::new("Node", Vec2::ZERO)))
            .unwrap();
        assert!(manager.can_undo(a));
        assert!(!manager.can_undo(b));

        assert!(manager.undo(a).unwrap());
        assert_eq!(manager.get_graph(a).unwrap().node_count(), 0);
        assert!(manager.can_redo(a));
        assert!(!manager.undo(b).unwrap());

        assert!(manager.redo(a).unwrap());
        assert_eq!(manager.get_graph(a).unwrap().node_count(), 1);
        assert!(matches!(
            manager.undo(GraphId(42)),
            Err(ManagerError::GraphNotFound(_))
        ));
    }

    #[test]
    fn test_validation_uses_registered_rules() {
        let mut manager = manager();
        let id = manager.create_graph("BehaviorTree", "BehaviorTree");
        manager.get_graph_mut(id).unwrap().create_node("BT_Parallel", Vec2::ZERO);
        manager.validate_graph(id).unwrap();

        manager.rules_mut().register_composite("BT_Parallel");
        let err = manager.validate_graph(id).unwrap_err();
        assert!(err.to_string().contains("0 children"));
    }

    #[test]
    fn test_auto_layout_uses_document_direction() {
        let mut manager = manager();
        let id = manager.create_graph("BehaviorTree", "BehaviorTree");
        let (root, leaf) = {
            let doc = manager.get_graph_mut(id).unwrap();
            let root = doc.create_node("BT_Selector", Vec2::ZERO);
            let leaf = doc.create_node("BT_Action", Vec2::new(500.0, 500.0));
            doc.set_root_node(Some(root)).unwrap();
            (root, leaf)
        };
        manager
            .execute_command(id, Box::new(AddChildCommand::new(root, leaf)))
            .unwrap();

        manager.auto_layout_graph(id).unwrap();
        let doc = manager.get_graph(id).unwrap();
        assert!(doc.node(root).unwrap().position.y < doc.node(leaf).unwrap().position.y);

        // Undo restores the pre-layout position.
        manager.undo(id).unwrap();
        assert_eq!(
            manager.get_graph(id).unwrap().node(leaf).unwrap().position,
            Vec2::new(500.0, 500.0)
        );

        manager.get_graph_mut(id).unwrap().editor_state.layout_direction =
            LayoutDirection::LeftToRight;
        assert!(matches!(
            manager.auto_layout_graph(id),
            Err(ManagerError::Layout(LayoutError::UnsupportedDirection(_)))
        ));
    }
}
