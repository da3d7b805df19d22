// SPDX-License-Identifier: MIT OR Apache-2.0
//! On-demand structural validation.
//!
//! The engine does not know what a node type means. Domain layers register
//! per-type rules in a [`NodeRuleRegistry`]; [`GraphDocument::validate_graph`]
//! runs the generic checks first and then those rules, stopping at the first
//! failure.

use crate::document::GraphDocument;
use crate::id::{LinkId, NodeId, PinId};
use crate::node::NodeData;
use indexmap::IndexMap;
use std::fmt;

/// A rule checked against every node of a registered type
pub type NodeRule = Box<dyn Fn(&NodeData) -> Result<(), String> + Send + Sync>;

/// First violated validation rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The document is empty
    #[error("Graph has no nodes")]
    NoNodes,

    /// `root_node` points at a node that does not exist
    #[error("Root node {0} does not exist")]
    MissingRoot(NodeId),

    /// The child/decorator edges form a cycle
    #[error("Graph contains a cycle through {0}")]
    Cycle(NodeId),

    /// A registered node rule failed
    #[error("{message}")]
    Rule {
        /// Offending node
        node: NodeId,
        /// Its type tag
        node_type: String,
        /// Message produced by the rule
        message: String,
    },
}

/// Registry mapping node type tags to validation rules
#[derive(Default)]
pub struct NodeRuleRegistry {
    rules: IndexMap<String, Vec<NodeRule>>,
}

impl NodeRuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry requiring at least one child for each listed composite type
    pub fn with_composites<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for node_type in types {
            registry.register_composite(node_type);
        }
        registry
    }

    /// Register a rule for a node type. Rules run in registration order.
    pub fn register<F>(&mut self, node_type: impl Into<String>, rule: F)
    where
        F: Fn(&NodeData) -> Result<(), String> + Send + Sync + 'static,
    {
        self.rules
            .entry(node_type.into())
            .or_default()
            .push(Box::new(rule));
    }

    /// Require nodes of this type to own at least one ordered child
    pub fn register_composite(&mut self, node_type: impl Into<String>) {
        self.register(node_type, |node| {
            if node.children.is_empty() {
                Err(format!(
                    "Composite node '{}' ({}) of type {} has 0 children",
                    node.name, node.id, node.node_type
                ))
            } else {
                Ok(())
            }
        });
    }

    /// Whether any rule is registered for this type
    pub fn has_rules(&self, node_type: &str) -> bool {
        self.rules.get(node_type).is_some_and(|rules| !rules.is_empty())
    }

    /// Types with at least one rule, in registration order
    pub fn registered_types(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Run every rule registered for the node's type
    pub fn check(&self, node: &NodeData) -> Result<(), String> {
        let Some(rules) = self.rules.get(&node.node_type) else {
            return Ok(());
        };
        rules.iter().try_for_each(|rule| rule(node))
    }
}

impl fmt::Debug for NodeRuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.rules.iter().map(|(ty, rules)| (ty, rules.len())))
            .finish()
    }
}

/// A reference to an id that no longer resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DanglingReference {
    /// The root id points nowhere
    Root(NodeId),
    /// A parent lists a missing child
    Child {
        /// Node holding the reference
        parent: NodeId,
        /// Missing child
        child: NodeId,
    },
    /// A parent's decorator slot points nowhere
    Decorator {
        /// Node holding the reference
        parent: NodeId,
        /// Missing decorator
        decorator: NodeId,
    },
    /// A link endpoint's node is gone
    LinkEndpoint {
        /// Link holding the reference
        link: LinkId,
        /// Missing pin
        pin: PinId,
    },
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root(id) => write!(f, "root references missing {id}"),
            Self::Child { parent, child } => write!(f, "{parent} lists missing child {child}"),
            Self::Decorator { parent, decorator } => {
                write!(f, "{parent} has missing decorator {decorator}")
            }
            Self::LinkEndpoint { link, pin } => write!(f, "{link} references missing {pin}"),
        }
    }
}

impl GraphDocument {
    /// Check the document, returning the first violated rule.
    ///
    /// Order: at least one node, the root (if set) resolves, no cycles, then
    /// registered per-type rules over nodes in creation order. Dangling
    /// child, decorator and link references are logged but do not fail.
    pub fn validate_graph(&self, rules: &NodeRuleRegistry) -> Result<(), ValidationError> {
        let result = self.run_checks(rules);
        if let Err(err) = &result {
            tracing::warn!("Validation failed: {err}");
        }
        result
    }

    fn run_checks(&self, rules: &NodeRuleRegistry) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::NoNodes);
        }

        if let Some(root) = self.root_node() {
            if !self.contains_node(root) {
                return Err(ValidationError::MissingRoot(root));
            }
        }

        if let Some(node) = self.find_cycle() {
            return Err(ValidationError::Cycle(node));
        }

        for node in self.nodes() {
            rules.check(node).map_err(|message| ValidationError::Rule {
                node: node.id,
                node_type: node.node_type.clone(),
                message,
            })?;
        }

        for dangling in self.dangling_references() {
            tracing::warn!("Dangling reference: {dangling}");
        }

        Ok(())
    }

    /// Every reference to a node id that no longer exists
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut found = Vec::new();

        if let Some(root) = self.root_node() {
            if !self.contains_node(root) {
                found.push(DanglingReference::Root(root));
            }
        }

        for node in self.nodes() {
            for &child in &node.children {
                if !self.contains_node(child) {
                    found.push(DanglingReference::Child { parent: node.id, child });
                }
            }
            if let Some(decorator) = node.decorator_child {
                if !self.contains_node(decorator) {
                    found.push(DanglingReference::Decorator { parent: node.id, decorator });
                }
            }
        }

        for link in self.links() {
            for pin in [link.from_pin, link.to_pin] {
                if !self.contains_node(pin.node()) {
                    found.push(DanglingReference::LinkEndpoint { link: link.id, pin });
                }
            }
        }

        found
    }

    /// Strip every dangling reference, returning how many were removed
    pub fn purge_dangling_references(&mut self) -> usize {
        let dangling = self.dangling_references();
        if dangling.is_empty() {
            return 0;
        }

        let mut stale_links = Vec::new();
        for reference in &dangling {
            match *reference {
                DanglingReference::Root(_) => {
                    // Clearing the root cannot fail.
                    let _ = self.set_root_node(None);
                }
                DanglingReference::Child { parent, child } => {
                    if let Some(node) = self.node_mut(parent) {
                        node.children.retain(|id| *id != child);
                    }
                }
                DanglingReference::Decorator { parent, .. } => {
                    if let Some(node) = self.node_mut(parent) {
                        node.decorator_child = None;
                    }
                }
                DanglingReference::LinkEndpoint { link, .. } => {
                    if !stale_links.contains(&link) {
                        stale_links.push(link);
                    }
                }
            }
        }
        for link in stale_links {
            self.disconnect_link(link);
        }

        self.mark_dirty();
        tracing::info!("Purged {} dangling references", dangling.len());
        dangling.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Vec2;

    fn bt_rules() -> NodeRuleRegistry {
        NodeRuleRegistry::with_composites(["BT_Selector", "BT_Sequence"])
    }

    #[test]
    fn test_empty_graph_fails_with_no_nodes() {
        let doc = GraphDocument::default();
        let err = doc.validate_graph(&bt_rules()).unwrap_err();
        assert_eq!(err, ValidationError::NoNodes);
        assert!(err.to_string().contains("no nodes"));
    }

    #[test]
    fn test_childless_selector_fails_with_zero_children() {
        let mut doc = GraphDocument::default();
        doc.create_node("BT_Selector", Vec2::ZERO);

        let err = doc.validate_graph(&bt_rules()).unwrap_err();
        assert!(err.to_string().contains("0 children"), "{err}");
    }

    #[test]
    fn test_registered_types_follow_registration_order() {
        let registry = NodeRuleRegistry::with_composites(["BT_Sequence", "BT_Selector"]);
        assert_eq!(
            registry.registered_types().collect::<Vec<_>>(),
            vec!["BT_Sequence", "BT_Selector"]
        );
        assert_eq!(NodeRuleRegistry::new().registered_types().count(), 0);
    }

    #[test]
    fn test_unregistered_type_is_not_checked() {
        let mut doc = GraphDocument::default();
        doc.create_node("BT_Parallel", Vec2::ZERO);
        assert!(doc.validate_graph(&bt_rules()).is_ok());
    }

    #[test]
    fn test_missing_root_fails() {
        let mut doc = GraphDocument::default();
        let root = doc.create_node("Leaf", Vec2::ZERO);
        doc.create_node("Leaf", Vec2::ZERO);
        doc.set_root_node(Some(root)).unwrap();
        doc.delete_node(root);

        assert_eq!(
            doc.validate_graph(&NodeRuleRegistry::new()),
            Err(ValidationError::MissingRoot(root))
        );
    }

    #[test]
    fn test_cycle_checked_before_rules() {
        let mut doc = GraphDocument::default();
        let a = doc.create_node("BT_Sequence", Vec2::ZERO);
        let b = doc.create_node("BT_Selector", Vec2::ZERO);
        doc.add_child(a, b).unwrap();
        doc.add_child(b, a).unwrap();
        doc.create_node("BT_Selector", Vec2::ZERO);

        assert!(matches!(
            doc.validate_graph(&bt_rules()),
            Err(ValidationError::Cycle(_))
        ));
    }

    #[test]
    fn test_custom_rule_registration() {
        let mut rules = NodeRuleRegistry::new();
        rules.register("Wait", |node| match node.parameter("duration") {
            Some(_) => Ok(()),
            None => Err(format!("{} needs a duration", node.id)),
        });
        assert!(rules.has_rules("Wait"));

        let mut doc = GraphDocument::default();
        let wait = doc.create_node("Wait", Vec2::ZERO);
        assert!(doc.validate_graph(&rules).is_err());

        doc.set_node_parameter(wait, "duration", "2").unwrap();
        assert!(doc.validate_graph(&rules).is_ok());
    }

    #[test]
    fn test_dangling_references_are_reported_not_fatal() {
        let mut doc = GraphDocument::default();
        let parent = doc.create_node("BT_Selector", Vec2::ZERO);
        let child = doc.create_node("Leaf", Vec2::ZERO);
        let deco = doc.create_node("Deco", Vec2::ZERO);
        doc.add_child(parent, child).unwrap();
        doc.set_decorator_child(parent, Some(deco)).unwrap();
        let link = doc.connect_pins(parent.into(), child.into()).unwrap();

        doc.delete_node(child);
        doc.delete_node(deco);

        let dangling = doc.dangling_references();
        assert_eq!(
            dangling,
            vec![
                DanglingReference::Child { parent, child },
                DanglingReference::Decorator { parent, decorator: deco },
                DanglingReference::LinkEndpoint { link, pin: child.into() },
            ]
        );
        assert!(doc.validate_graph(&NodeRuleRegistry::new()).is_ok());
    }

    #[test]
    fn test_purge_dangling_references() {
        let mut doc = GraphDocument::default();
        let parent = doc.create_node("BT_Selector", Vec2::ZERO);
        let child = doc.create_node("Leaf", Vec2::ZERO);
        doc.add_child(parent, child).unwrap();
        doc.connect_pins(parent.into(), child.into()).unwrap();
        doc.delete_node(child);

        assert_eq!(doc.purge_dangling_references(), 2);
        assert!(doc.dangling_references().is_empty());
        assert!(doc.node(parent).unwrap().children.is_empty());
        assert_eq!(doc.link_count(), 0);
        assert_eq!(doc.purge_dangling_references(), 0);
    }
}
