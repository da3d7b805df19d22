// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph documents for `OrdoPlay` Editor.
//!
//! This crate provides the document model behind tree-shaped editor graphs
//! such as behavior trees and state machines:
//! - Node and link CRUD with tombstoned ids
//! - On-demand structural validation and cycle detection
//! - Hierarchical auto-layout
//! - Schema v2 JSON with migration from older files
//! - Undo/redo through commands
//!
//! ## Architecture
//!
//! [`GraphDocument`] is the single source of truth for one graph. Node type
//! tags are opaque here; domain rules are registered in a
//! [`NodeRuleRegistry`]. [`NodeGraphManager`] owns every open document along
//! with its undo history and backing file.

pub mod commands;
pub mod document;
pub mod editor_state;
pub mod history;
pub mod id;
pub mod layout;
pub mod link;
pub mod manager;
pub mod migration;
pub mod node;
pub mod serialization;
pub mod settings;
pub mod storage;
pub mod validation;

pub use document::{GraphDocument, GraphError, GraphMetadata};
pub use editor_state::{EditorState, LayoutDirection};
pub use history::{Command, CommandError, CommandHistory};
pub use id::{GraphId, LinkId, NodeId, PinId};
pub use layout::{LayoutConfig, LayoutError};
pub use link::LinkData;
pub use manager::{ManagerError, NodeGraphManager};
pub use migration::{load_with_migration, MigrationError, SchemaVersion};
pub use node::{NodeData, Vec2};
pub use serialization::{SerializationError, SCHEMA_VERSION};
pub use settings::{GraphEngineSettings, SettingsError};
pub use storage::{FsStorage, GraphStorage, MemoryStorage};
pub use validation::{DanglingReference, NodeRuleRegistry, ValidationError};
