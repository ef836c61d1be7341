use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("static regex is valid"));

/// A labeled, colored vertex. Identity is `id`; `label` and `color` are display attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub color: String,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            color: color.into(),
        }
    }
}

/// A directed, labeled relationship between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub label: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.into(),
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}

/// Rejections raised by [`Graph::validate`] and the manual editing operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("Node with ID '{0}' already exists")]
    DuplicateNode(String),

    #[error("Node '{0}' does not exist")]
    UnknownNode(String),

    #[error("'{0}' is not a #RRGGBB hex color")]
    InvalidColor(String),

    #[error("Source and target cannot be the same node ('{0}')")]
    SelfLoop(String),

    #[error("Edge between '{from}' and '{to}' already exists")]
    DuplicateEdge { from: String, to: String },

    #[error("No edge at index {0}")]
    UnknownEdge(usize),

    #[error("'{0}' cannot be used as a file name")]
    InvalidFileName(String),

    #[error("graph is inconsistent: duplicate node ids {duplicates:?}, dangling edges {dangling:?}")]
    Inconsistent {
        duplicates: Vec<String>,
        dangling: Vec<String>,
    },
}

/// Ordered nodes plus ordered edges. Nothing here enforces uniqueness or referential
/// integrity on construction; [`Graph::validate`] reports both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Check that node ids are unique and every edge references an existing node.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) && !duplicates.contains(&node.id) {
                duplicates.push(node.id.clone());
            }
        }

        let dangling: Vec<String> = self
            .edges
            .iter()
            .filter(|e| !seen.contains(e.source.as_str()) || !seen.contains(e.target.as_str()))
            .map(|e| format!("{} -> {}", e.source, e.target))
            .collect();

        if duplicates.is_empty() && dangling.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Inconsistent { duplicates, dangling })
        }
    }

    /// Edges whose endpoints are not both present.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| !self.contains_node(&e.source) || !self.contains_node(&e.target))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Manual editing
    // ------------------------------------------------------------------------

    pub fn add_node(&mut self, id: &str, label: &str, color: &str) -> Result<&Node, ValidationError> {
        let id = strip_quotes(id.trim());
        let label = strip_quotes(label.trim());
        if id.is_empty() {
            return Err(ValidationError::Empty { field: "Node ID" });
        }
        if label.is_empty() {
            return Err(ValidationError::Empty { field: "Node label" });
        }
        check_color(color)?;
        if self.contains_node(&id) {
            return Err(ValidationError::DuplicateNode(id));
        }

        self.nodes.push(Node::new(id, label, color.trim()));
        Ok(&self.nodes[self.nodes.len() - 1])
    }

    pub fn add_edge(&mut self, source: &str, target: &str, label: &str) -> Result<&Edge, ValidationError> {
        let source = source.trim();
        let target = target.trim();
        for endpoint in [source, target] {
            if !self.contains_node(endpoint) {
                return Err(ValidationError::UnknownNode(endpoint.to_string()));
            }
        }
        if source == target {
            return Err(ValidationError::SelfLoop(source.to_string()));
        }
        let label = strip_quotes(label.trim());
        if label.is_empty() {
            return Err(ValidationError::Empty { field: "Relationship label" });
        }
        if self.edges.iter().any(|e| e.source == source && e.target == target) {
            return Err(ValidationError::DuplicateEdge {
                from: source.to_string(),
                to: target.to_string(),
            });
        }

        self.edges.push(Edge::new(source, target, label));
        Ok(&self.edges[self.edges.len() - 1])
    }

    pub fn update_node(&mut self, id: &str, label: &str, color: &str) -> Result<&Node, ValidationError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(ValidationError::Empty { field: "Label" });
        }
        check_color(color)?;
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| ValidationError::UnknownNode(id.to_string()))?;
        node.label = label.to_string();
        node.color = color.trim().to_string();
        Ok(node)
    }

    /// Remove a node together with every edge touching it. Returns the number of edges removed.
    pub fn remove_node(&mut self, id: &str) -> Result<usize, ValidationError> {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        if self.nodes.len() == before {
            return Err(ValidationError::UnknownNode(id.to_string()));
        }
        let edges_before = self.edges.len();
        self.edges.retain(|e| !e.touches(id));
        Ok(edges_before - self.edges.len())
    }

    pub fn remove_edge(&mut self, index: usize) -> Result<Edge, ValidationError> {
        if index >= self.edges.len() {
            return Err(ValidationError::UnknownEdge(index));
        }
        Ok(self.edges.remove(index))
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

fn strip_quotes(s: &str) -> String {
    s.chars().filter(|c| *c != '"' && *c != '\'').collect()
}

fn check_color(color: &str) -> Result<(), ValidationError> {
    if HEX_COLOR.is_match(color.trim()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidColor(color.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Graph {
        Graph::from_parts(
            vec![
                Node::new("A", "Alpha", "#FF6B6B"),
                Node::new("B", "Beta", "#4ECDC4"),
                Node::new("C", "Gamma", "#45B7D1"),
            ],
            vec![Edge::new("A", "B", "x"), Edge::new("B", "C", "y")],
        )
    }

    #[test]
    fn test_validate_accepts_consistent_graph() {
        assert!(abc().validate().is_ok());
        assert!(Graph::new().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_duplicates_and_dangling_edges() {
        let mut g = abc();
        g.nodes.push(Node::new("A", "Again", "#FF6B6B"));
        g.edges.push(Edge::new("C", "Z", "dangles"));

        match g.validate() {
            Err(ValidationError::Inconsistent { duplicates, dangling }) => {
                assert_eq!(duplicates, vec!["A".to_string()]);
                assert_eq!(dangling, vec!["C -> Z".to_string()]);
            }
            other => panic!("Expected Inconsistent, got {:?}", other),
        }
        assert_eq!(g.dangling_edges().len(), 1);
    }

    #[test]
    fn test_add_node_strips_quotes_and_rejects_duplicates() {
        let mut g = Graph::new();
        let node = g.add_node("  \"rust\" ", "Rust's Book", "#96CEB4").unwrap();
        assert_eq!(node.id, "rust");
        assert_eq!(node.label, "Rusts Book");

        assert_eq!(
            g.add_node("rust", "Again", "#96CEB4").unwrap_err(),
            ValidationError::DuplicateNode("rust".to_string())
        );
        assert!(matches!(
            g.add_node("", "Label", "#96CEB4"),
            Err(ValidationError::Empty { .. })
        ));
        assert!(matches!(
            g.add_node("x", "X", "red"),
            Err(ValidationError::InvalidColor(_))
        ));
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn test_add_edge_checks_endpoints_self_loops_and_duplicates() {
        let mut g = abc();

        assert_eq!(
            g.add_edge("A", "Q", "rel").unwrap_err(),
            ValidationError::UnknownNode("Q".to_string())
        );
        assert_eq!(
            g.add_edge("A", "A", "rel").unwrap_err(),
            ValidationError::SelfLoop("A".to_string())
        );
        assert!(matches!(
            g.add_edge("A", "B", "again"),
            Err(ValidationError::DuplicateEdge { .. })
        ));
        assert!(matches!(
            g.add_edge("A", "C", "   "),
            Err(ValidationError::Empty { .. })
        ));

        // Reverse direction is a different edge
        g.add_edge("B", "A", "back").unwrap();
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn test_update_node_keeps_id() {
        let mut g = abc();
        g.update_node("B", "Bravo", "#FECA57").unwrap();
        let b = g.node("B").unwrap();
        assert_eq!(b.label, "Bravo");
        assert_eq!(b.color, "#FECA57");
        assert!(g.update_node("B", " ", "#FECA57").is_err());
        assert!(g.update_node("nope", "X", "#FECA57").is_err());
    }

    #[test]
    fn test_remove_node_cascades_to_edges() {
        let mut g = abc();
        let removed = g.remove_node("B").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(g.node_count(), 2);
        assert!(g.edges.is_empty());
        assert!(g.remove_node("B").is_err());
    }

    #[test]
    fn test_remove_edge_by_index() {
        let mut g = abc();
        let edge = g.remove_edge(0).unwrap();
        assert_eq!(edge, Edge::new("A", "B", "x"));
        assert_eq!(g.edges, vec![Edge::new("B", "C", "y")]);
        assert_eq!(g.remove_edge(5).unwrap_err(), ValidationError::UnknownEdge(5));
    }

    #[test]
    fn test_clear_empties_graph() {
        let mut g = abc();
        g.clear();
        assert!(g.is_empty());
    }
}
