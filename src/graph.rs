use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grid::Justify;

/// Role a node plays in the diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Actor,
    Activity,
    Grouping,
    Media,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    Association,
    Include,
    Extend,
}

/// Display-only key/value pair attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: String,
}

/// Display payload for media nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Responsive span hints per breakpoint; the widest configured breakpoint
/// wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md: Option<u32>,
}

impl SpanHint {
    pub fn effective(&self) -> Option<u32> {
        self.md.or(self.sm).or(self.xs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Explicit size overrides; otherwise derived from label length and the
    /// kind's base size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<SpanHint>,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Node {
            id: id.into(),
            label: label.into(),
            kind,
            parent_id: None,
            width: None,
            height: None,
            icon: None,
            media: None,
            properties: Vec::new(),
            hint: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        kind: EdgeKind,
    ) -> Self {
        Edge {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind,
            label: None,
        }
    }
}

/// Grid arrangement options for one grouping container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justify: Option<Justify>,
    /// Ordered direct children; derived from node declaration order when
    /// empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

/// Flat graph description produced by the tree-parsing collaborator.
///
/// Caller-guaranteed invariants: node ids are unique, `parent_id` references
/// form a forest. Edges or grouping children referencing unknown ids are
/// tolerated and skipped where they would need geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub grids: BTreeMap<String, GroupingMeta>,
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Ordered direct children of a grouping: the explicit list from the
    /// grid metadata when present, else every node naming it as parent, in
    /// declaration order.
    pub fn grouping_children(&self, grouping_id: &str) -> Vec<String> {
        if let Some(meta) = self.grids.get(grouping_id)
            && !meta.children.is_empty()
        {
            return meta.children.clone();
        }
        self.nodes
            .iter()
            .filter(|n| n.parent_id.as_deref() == Some(grouping_id))
            .map(|n| n.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_graph() {
        let raw = r#"{
            "nodes": [
                {"id": "sys", "label": "Billing", "kind": "GROUPING"},
                {"id": "a", "label": "Customer", "kind": "ACTOR"},
                {"id": "u1", "label": "Pay invoice", "kind": "ACTIVITY", "parentId": "sys",
                 "hint": {"md": 4}}
            ],
            "edges": [
                {"id": "e1", "source": "a", "target": "u1", "kind": "ASSOCIATION"}
            ],
            "grids": {"sys": {"columns": 2}}
        }"#;
        let graph: Graph = serde_json::from_str(raw).unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[2].parent_id.as_deref(), Some("sys"));
        assert_eq!(graph.nodes[2].hint.unwrap().effective(), Some(4));
        assert_eq!(graph.grids["sys"].columns, Some(2));
    }

    #[test]
    fn grouping_children_derived_from_parent_ids() {
        let graph = Graph {
            nodes: vec![
                Node::new("g", "Boundary", NodeKind::Grouping),
                Node::new("b", "B", NodeKind::Activity).with_parent("g"),
                Node::new("a", "A", NodeKind::Activity).with_parent("g"),
                Node::new("x", "X", NodeKind::Actor),
            ],
            edges: Vec::new(),
            grids: BTreeMap::new(),
        };
        assert_eq!(graph.grouping_children("g"), vec!["b", "a"]);
    }

    #[test]
    fn explicit_child_list_wins() {
        let mut grids = BTreeMap::new();
        grids.insert(
            "g".to_string(),
            GroupingMeta {
                children: vec!["a".to_string(), "b".to_string()],
                ..GroupingMeta::default()
            },
        );
        let graph = Graph {
            nodes: vec![
                Node::new("g", "Boundary", NodeKind::Grouping),
                Node::new("b", "B", NodeKind::Activity).with_parent("g"),
                Node::new("a", "A", NodeKind::Activity).with_parent("g"),
            ],
            edges: Vec::new(),
            grids,
        };
        assert_eq!(graph.grouping_children("g"), vec!["a", "b"]);
    }

    #[test]
    fn span_hint_prefers_widest_breakpoint() {
        let hint = SpanHint {
            xs: Some(2),
            sm: Some(3),
            md: None,
        };
        assert_eq!(hint.effective(), Some(3));
        assert_eq!(SpanHint::default().effective(), None);
    }
}
