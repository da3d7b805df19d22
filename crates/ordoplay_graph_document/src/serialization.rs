// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON (de)serialization of graph documents, schema v2.
//!
//! ```text
//! { schemaVersion: 2, type, graphKind,
//!   metadata: { author, created, tags },
//!   editorState: { zoom, scrollOffset, selectedNodes, layoutDirection },
//!   data: { rootNodeId, nodes: [...], links: [...] } }
//! ```
//!
//! Reading is lenient: missing optional fields take defaults, a missing
//! node name falls back to the type tag, and non-string parameter values
//! are stringified. Writing always emits the full v2 shape.

use crate::document::{GraphDocument, GraphMetadata};
use crate::editor_state::EditorState;
use crate::id::{LinkId, NodeId, PinId, MAX_ID};
use crate::link::LinkData;
use crate::node::{NodeData, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Schema version written by [`GraphDocument::to_json`]
pub const SCHEMA_VERSION: u64 = 2;

const OUTPUT_PIN: &str = "output";
const INPUT_PIN: &str = "input";

/// Error reading or writing a document
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// Malformed JSON or wrong field types
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document declares a schema other than v2
    #[error("Expected schema version 2, found {0}")]
    UnsupportedVersion(u64),

    /// Zero is reserved for "unset"
    #[error("Node id 0 is reserved")]
    ReservedNodeId,

    /// Zero is reserved for "unset"
    #[error("Link id 0 is reserved")]
    ReservedLinkId,

    /// Two nodes share an id
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// Two links share an id
    #[error("Duplicate link id: {0}")]
    DuplicateLink(LinkId),

    /// An id too large to keep allocating after
    #[error("Id {0} is out of range")]
    IdOutOfRange(u64),

    /// JSON has no encoding for NaN or infinity
    #[error("Non-finite value in {0}")]
    NonFinite(String),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_version: Option<u64>,
    #[serde(rename = "type", default)]
    graph_type: String,
    #[serde(default)]
    graph_kind: String,
    #[serde(default)]
    metadata: GraphMetadata,
    #[serde(default)]
    editor_state: EditorState,
    #[serde(default)]
    data: GraphData,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GraphData {
    root_node_id: NodeId,
    nodes: Vec<NodeRecord>,
    links: Vec<LinkRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRecord {
    id: NodeId,
    #[serde(rename = "type", default)]
    node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    position: Vec2,
    #[serde(default)]
    children: Vec<NodeId>,
    #[serde(default, deserialize_with = "lenient_string_map")]
    parameters: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decorator_child_id: Option<NodeId>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkRecord {
    id: LinkId,
    from_pin: PinRef,
    to_pin: PinRef,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum PinRef {
    Endpoint(PinEndpoint),
    Bare(NodeId),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PinEndpoint {
    node_id: NodeId,
    #[serde(default)]
    pin_id: String,
}

impl PinRef {
    fn new(pin: PinId, slot: &str) -> Self {
        Self::Endpoint(PinEndpoint {
            node_id: pin.node(),
            pin_id: slot.to_string(),
        })
    }

    fn pin(&self) -> PinId {
        match self {
            Self::Endpoint(endpoint) => PinId::of_node(endpoint.node_id),
            Self::Bare(node) => PinId::of_node(*node),
        }
    }
}

fn lenient_string_map<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<IndexMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => (key, text),
            other => (key, other.to_string()),
        })
        .collect())
}

fn optional_node(id: NodeId) -> Option<NodeId> {
    (!id.is_none()).then_some(id)
}

impl From<&NodeData> for NodeRecord {
    fn from(node: &NodeData) -> Self {
        Self {
            id: node.id,
            node_type: node.node_type.clone(),
            name: Some(node.name.clone()),
            position: node.position,
            children: node.children.clone(),
            parameters: node.parameters.clone(),
            decorator_child_id: node.decorator_child,
        }
    }
}

impl From<NodeRecord> for NodeData {
    fn from(record: NodeRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.unwrap_or_else(|| record.node_type.clone()),
            node_type: record.node_type,
            position: record.position,
            parameters: record.parameters,
            children: record.children,
            decorator_child: record.decorator_child_id.and_then(optional_node),
        }
    }
}

impl GraphDocument {
    /// Serialize to a schema v2 JSON tree
    pub fn to_json(&self) -> Result<Value, SerializationError> {
        self.check_finite()?;
        let file = GraphFile {
            schema_version: Some(SCHEMA_VERSION),
            graph_type: self.graph_type.clone(),
            graph_kind: self.graph_kind.clone(),
            metadata: self.metadata.clone(),
            editor_state: self.editor_state.clone(),
            data: GraphData {
                root_node_id: self.root_node().unwrap_or(NodeId::NONE),
                nodes: self.nodes().map(NodeRecord::from).collect(),
                links: self
                    .links()
                    .map(|link| LinkRecord {
                        id: link.id,
                        from_pin: PinRef::new(link.from_pin, OUTPUT_PIN),
                        to_pin: PinRef::new(link.to_pin, INPUT_PIN),
                    })
                    .collect(),
            },
        };
        Ok(serde_json::to_value(file)?)
    }

    fn check_finite(&self) -> Result<(), SerializationError> {
        if !self.editor_state.zoom.is_finite() {
            return Err(SerializationError::NonFinite("editorState.zoom".to_string()));
        }
        if !self.editor_state.scroll_offset.is_finite() {
            return Err(SerializationError::NonFinite(
                "editorState.scrollOffset".to_string(),
            ));
        }
        match self.nodes().find(|node| !node.position.is_finite()) {
            Some(node) => Err(SerializationError::NonFinite(format!(
                "position of {}",
                node.id
            ))),
            None => Ok(()),
        }
    }

    /// Serialize to JSON text
    pub fn to_json_string(&self, pretty: bool) -> Result<String, SerializationError> {
        let value = self.to_json()?;
        let text = if pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(text)
    }

    /// Rebuild a document from a schema v2 JSON tree.
    ///
    /// Id counters continue after the largest loaded id. The result is not
    /// dirty.
    pub fn from_json(value: &Value) -> Result<Self, SerializationError> {
        let file = GraphFile::deserialize(value)?;
        if let Some(version) = file.schema_version {
            if version != SCHEMA_VERSION {
                return Err(SerializationError::UnsupportedVersion(version));
            }
        }

        let mut nodes = IndexMap::with_capacity(file.data.nodes.len());
        for record in file.data.nodes {
            if record.id.is_none() {
                return Err(SerializationError::ReservedNodeId);
            }
            if record.id.value() > MAX_ID {
                return Err(SerializationError::IdOutOfRange(record.id.value()));
            }
            let node = NodeData::from(record);
            if nodes.contains_key(&node.id) {
                return Err(SerializationError::DuplicateNode(node.id));
            }
            nodes.insert(node.id, node);
        }

        let mut links = IndexMap::with_capacity(file.data.links.len());
        for record in file.data.links {
            if record.id.is_none() {
                return Err(SerializationError::ReservedLinkId);
            }
            if record.id.value() > MAX_ID {
                return Err(SerializationError::IdOutOfRange(record.id.value()));
            }
            if links.contains_key(&record.id) {
                return Err(SerializationError::DuplicateLink(record.id));
            }
            let link = LinkData::new(record.id, record.from_pin.pin(), record.to_pin.pin());
            links.insert(link.id, link);
        }

        let doc = Self::from_parts(
            file.graph_type,
            file.graph_kind,
            file.metadata,
            file.editor_state,
            optional_node(file.data.root_node_id),
            nodes,
            links,
        );
        tracing::debug!(
            "Parsed {} graph with {} nodes and {} links",
            doc.graph_kind,
            doc.node_count(),
            doc.link_count()
        );
        Ok(doc)
    }

    /// Parse JSON text as a schema v2 document
    pub fn from_json_str(text: &str) -> Result<Self, SerializationError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }
}
