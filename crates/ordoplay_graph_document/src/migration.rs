// SPDX-License-Identifier: MIT OR Apache-2.0
//! Schema detection and migration to schema v2.
//!
//! Every migration is a pure `Value -> Value` transform. Only the final v2
//! tree is handed to [`GraphDocument::from_json`], so a failed migration
//! never produces a half-built document. Running the migrator on v2 input is
//! a no-op.

use crate::document::GraphDocument;
use crate::editor_state::EditorState;
use crate::serialization::{SerializationError, SCHEMA_VERSION};
use serde_json::{json, Map, Value};

/// Schema a JSON tree was written with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// Flat legacy behavior-tree layout (v0)
    LegacyBehaviorTree,
    /// Blueprint layout tagged with `blueprint_version` (v1)
    Blueprint,
    /// Current envelope (v2)
    Current,
    /// Explicitly tagged with a version this build does not know
    Future(u64),
}

impl SchemaVersion {
    /// Numeric schema version
    pub fn number(&self) -> u64 {
        match self {
            Self::LegacyBehaviorTree => 0,
            Self::Blueprint => 1,
            Self::Current => SCHEMA_VERSION,
            Self::Future(version) => *version,
        }
    }
}

/// Error migrating or loading a document
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Top level is not a JSON object
    #[error("Graph JSON must be an object")]
    NotAnObject,

    /// Schema is newer than this build supports
    #[error("Schema version {0} is newer than supported version 2")]
    UnsupportedVersion(u64),

    /// The migrated tree could not be turned into a document
    #[error("Failed to read migrated graph: {0}")]
    Document(#[from] SerializationError),
}

const VERSION_KEYS: [&str; 2] = ["schemaVersion", "schema_version"];
const DEFAULT_LEGACY_TYPE: &str = "BehaviorTree";
const DEFAULT_BLUEPRINT_TYPE: &str = "Blueprint";
const MIGRATED_TAG: &str = "migrated";

fn explicit_version(json: &Value) -> Option<u64> {
    VERSION_KEYS
        .iter()
        .find_map(|key| json.get(*key))
        .and_then(Value::as_u64)
}

/// Detect which schema a JSON tree uses.
///
/// An explicit `schemaVersion`/`schema_version` wins over structural
/// inference, so a future schema reusing v2 field names is not mistaken for
/// v2.
pub fn detect_schema_version(json: &Value) -> SchemaVersion {
    match explicit_version(json) {
        Some(SCHEMA_VERSION) => return SchemaVersion::Current,
        Some(1) => return SchemaVersion::Blueprint,
        Some(0) => return SchemaVersion::LegacyBehaviorTree,
        Some(version) => return SchemaVersion::Future(version),
        None => {}
    }

    if json.get("graphKind").is_some() && json.get("data").is_some() {
        SchemaVersion::Current
    } else if json.get("blueprint_version").is_some() {
        SchemaVersion::Blueprint
    } else {
        SchemaVersion::LegacyBehaviorTree
    }
}

/// Bring any supported schema up to v2 without building a document
pub fn migrate_to_current(json: &Value) -> Result<Value, MigrationError> {
    if !json.is_object() {
        return Err(MigrationError::NotAnObject);
    }
    match detect_schema_version(json) {
        SchemaVersion::Current => Ok(json.clone()),
        SchemaVersion::Blueprint => migrate_v1_blueprint_to_v2(json),
        SchemaVersion::LegacyBehaviorTree => migrate_legacy_bt_to_v2(json),
        SchemaVersion::Future(version) => Err(MigrationError::UnsupportedVersion(version)),
    }
}

/// Detect, migrate and build a document
pub fn load_with_migration(json: &Value) -> Result<GraphDocument, MigrationError> {
    let version = detect_schema_version(json);
    let migrated = migrate_to_current(json)?;
    if version != SchemaVersion::Current {
        tracing::info!("Migrated graph from schema v{} to v{SCHEMA_VERSION}", version.number());
    }
    Ok(GraphDocument::from_json(&migrated)?)
}

fn string_or(json: &Value, key: &str, fallback: &str) -> Value {
    json.get(key)
        .and_then(Value::as_str)
        .map_or_else(|| json!(fallback), |text| json!(text))
}

fn default_metadata() -> Value {
    json!({
        "author": "Unknown",
        "created": "",
        "tags": [MIGRATED_TAG],
    })
}

/// Keep a legacy editor state if it is present, filling missing fields
fn editor_state_or_default(json: &Value) -> Value {
    let mut state = match serde_json::to_value(EditorState::default()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    if let Some(Value::Object(legacy)) = json.get("editorState") {
        for (key, value) in legacy {
            state.insert(key.clone(), value.clone());
        }
    }
    Value::Object(state)
}

/// Collapse `childIds` into `children`, preferring `children` when both exist
fn normalize_legacy_node(node: &Value) -> Value {
    let Value::Object(fields) = node else {
        return node.clone();
    };
    let mut fields = fields.clone();
    let legacy_children = fields.remove("childIds");
    if !fields.contains_key("children") {
        fields.insert(
            "children".to_string(),
            legacy_children.unwrap_or_else(|| json!([])),
        );
    }
    Value::Object(fields)
}

/// Wrap a flat v0 behavior tree in the v2 envelope
pub fn migrate_legacy_bt_to_v2(json: &Value) -> Result<Value, MigrationError> {
    if !json.is_object() {
        return Err(MigrationError::NotAnObject);
    }

    let nodes: Vec<Value> = json
        .get("nodes")
        .and_then(Value::as_array)
        .map(|nodes| nodes.iter().map(normalize_legacy_node).collect())
        .unwrap_or_default();
    let links = json.get("links").cloned().unwrap_or_else(|| json!([]));
    let root = json.get("rootNodeId").cloned().unwrap_or_else(|| json!(0));
    tracing::debug!("Migrating legacy behavior tree with {} nodes", nodes.len());

    Ok(json!({
        "schemaVersion": SCHEMA_VERSION,
        "type": string_or(json, "type", DEFAULT_LEGACY_TYPE),
        "graphKind": string_or(json, "graphKind", DEFAULT_LEGACY_TYPE),
        "metadata": default_metadata(),
        "editorState": editor_state_or_default(json),
        "data": {
            "rootNodeId": root,
            "nodes": nodes,
            "links": links,
        },
    }))
}

/// Re-wrap a v1 blueprint in the v2 envelope.
///
/// The `data` block is kept verbatim; blueprint internals are not rewritten
/// here. Without a `data` block an empty graph is produced.
pub fn migrate_v1_blueprint_to_v2(json: &Value) -> Result<Value, MigrationError> {
    if !json.is_object() {
        return Err(MigrationError::NotAnObject);
    }

    let data = json.get("data").cloned().unwrap_or_else(|| {
        json!({
            "rootNodeId": 0,
            "nodes": [],
            "links": [],
        })
    });

    Ok(json!({
        "schemaVersion": SCHEMA_VERSION,
        "type": string_or(json, "type", DEFAULT_BLUEPRINT_TYPE),
        "graphKind": string_or(json, "graphKind", DEFAULT_BLUEPRINT_TYPE),
        "metadata": json.get("metadata").cloned().unwrap_or_else(default_metadata),
        "editorState": editor_state_or_default(json),
        "data": data,
    }))
}
