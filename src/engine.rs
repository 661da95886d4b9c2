//! Layered auto-layout behind a small engine seam.
//!
//! The adapter in [`crate::layout`] builds a box tree and an option bag;
//! any [`LayeredEngine`] turns that into positions. The default engine
//! drives `dagre_rust` in compound mode so grouping containers become
//! clusters.

use crate::error::{LayoutError, Result};
use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Flow direction of the layered layout.
pub const OPT_DIRECTION: &str = "direction";
/// Distance between consecutive layers.
pub const OPT_LAYER_SPACING: &str = "spacing.layer";
/// Distance between nodes within a layer.
pub const OPT_NODE_SPACING: &str = "spacing.node";
/// Distance kept between parallel edges.
pub const OPT_EDGE_SPACING: &str = "spacing.edge";
/// Distance between disconnected components.
pub const OPT_COMPONENT_SPACING: &str = "spacing.component";
/// Inset containers keep around their children.
pub const OPT_PADDING: &str = "padding";
/// Whether containers are opened (`INCLUDE_CHILDREN`) or opaque (`FLAT`).
pub const OPT_HIERARCHY: &str = "hierarchy";
/// Requested edge routing style.
pub const OPT_EDGE_ROUTING: &str = "edge-routing";

pub const DIRECTION_RIGHT: &str = "RIGHT";
pub const DIRECTION_DOWN: &str = "DOWN";
pub const HIERARCHY_INCLUDE_CHILDREN: &str = "INCLUDE_CHILDREN";
pub const HIERARCHY_FLAT: &str = "FLAT";
pub const EDGE_ROUTING_ORTHOGONAL: &str = "ORTHOGONAL";

/// String-keyed option bag passed to the engine.
pub type EngineOptions = BTreeMap<String, String>;

/// One box in the tree handed to the engine. Children positions are
/// relative to their parent; `x`/`y` of `None` means "not placed yet".
#[derive(Debug, Clone, Default)]
pub struct LayoutBox {
    pub id: String,
    pub width: f32,
    pub height: f32,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub children: Vec<LayoutBox>,
}

impl LayoutBox {
    pub fn new(id: impl Into<String>, width: f32, height: f32) -> Self {
        LayoutBox {
            id: id.into(),
            width,
            height,
            x: None,
            y: None,
            children: Vec::new(),
        }
    }

    /// The virtual canvas all top-level boxes hang off.
    pub fn root(children: Vec<LayoutBox>) -> Self {
        LayoutBox {
            id: String::new(),
            width: 0.0,
            height: 0.0,
            x: Some(0.0),
            y: Some(0.0),
            children,
        }
    }
}

/// Connection the engine should rank along.
#[derive(Debug, Clone)]
pub struct EngineEdge {
    pub from: String,
    pub to: String,
}

/// Seam between the adapter and a concrete layout algorithm.
pub trait LayeredEngine {
    /// Position every box in `root`, returning the same tree with
    /// parent-relative coordinates filled in.
    fn arrange(
        &self,
        root: LayoutBox,
        edges: &[EngineEdge],
        options: &EngineOptions,
    ) -> Result<LayoutBox>;
}

/// Default engine: layered layout via `dagre_rust`, compound mode when
/// the hierarchy is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct DagreEngine;

struct Registration {
    id: String,
    width: f32,
    height: f32,
    parent: Option<String>,
    is_container: bool,
}

impl LayeredEngine for DagreEngine {
    fn arrange(
        &self,
        mut root: LayoutBox,
        edges: &[EngineEdge],
        options: &EngineOptions,
    ) -> Result<LayoutBox> {
        if root.children.is_empty() {
            root.x = Some(0.0);
            root.y = Some(0.0);
            return Ok(root);
        }

        let include_children = options
            .get(OPT_HIERARCHY)
            .map(|v| v != HIERARCHY_FLAT)
            .unwrap_or(true);

        let mut registrations: Vec<Registration> = Vec::new();
        for child in &root.children {
            collect_registrations(child, None, include_children, &mut registrations);
        }
        let registered: HashSet<&str> = registrations.iter().map(|r| r.id.as_str()).collect();
        let compound_enabled =
            include_children && registrations.iter().any(|r| r.parent.is_some());

        let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
            DagreGraph::new(Some(GraphOption {
                directed: Some(true),
                multigraph: Some(false),
                compound: Some(compound_enabled),
            }));

        let mut graph_config = DagreConfig::default();
        graph_config.rankdir = Some(rankdir(options).to_string());
        graph_config.nodesep = Some(spacing(options, OPT_NODE_SPACING, 120.0));
        graph_config.ranksep = Some(spacing(options, OPT_LAYER_SPACING, 120.0));
        graph_config.marginx = Some(8.0);
        graph_config.marginy = Some(8.0);
        dagre_graph.set_graph(graph_config);

        for (idx, reg) in registrations.iter().enumerate() {
            let mut node = DagreNode::default();
            node.width = reg.width;
            node.height = reg.height;
            node.order = Some(idx);
            dagre_graph.set_node(reg.id.clone(), Some(node));
        }
        if compound_enabled {
            for reg in &registrations {
                if let Some(parent) = &reg.parent {
                    let _ = dagre_graph.set_parent(&reg.id, Some(parent.clone()));
                }
            }
            // Chain top-level containers with invisible edges so sibling
            // clusters cannot land on top of each other.
            let top_containers: Vec<String> = root
                .children
                .iter()
                .filter(|c| !c.children.is_empty())
                .map(|c| c.id.clone())
                .collect();
            for pair in top_containers.windows(2) {
                let mut edge_label = DagreEdge::default();
                edge_label.minlen = Some(1.0);
                let _ = dagre_graph.set_edge(&pair[0], &pair[1], Some(edge_label), None);
            }
        }

        // In flat mode edges into nested children attach to the opaque
        // top-level box that contains them.
        let promote: HashMap<String, String> = if include_children {
            HashMap::new()
        } else {
            let mut map = HashMap::new();
            for child in &root.children {
                map_to_ancestor(child, &child.id, &mut map);
            }
            map
        };

        let mut edge_set: HashSet<(String, String)> = HashSet::new();
        for edge in edges {
            let from = promote.get(&edge.from).cloned().unwrap_or_else(|| edge.from.clone());
            let to = promote.get(&edge.to).cloned().unwrap_or_else(|| edge.to.clone());
            if from == to {
                continue;
            }
            if !registered.contains(from.as_str()) || !registered.contains(to.as_str()) {
                continue;
            }
            if !edge_set.insert((from.clone(), to.clone())) {
                continue;
            }
            let edge_label = DagreEdge::default();
            let _ = dagre_graph.set_edge(&from, &to, Some(edge_label), None);
        }

        dagre_layout::run_layout(&mut dagre_graph);

        // Dagre reports centers; convert to top-left corners using the
        // post-layout size so grown clusters stay aligned.
        let mut absolute: HashMap<String, (f32, f32)> = HashMap::new();
        for reg in &registrations {
            if let Some(node) = dagre_graph.node(&reg.id) {
                absolute.insert(
                    reg.id.clone(),
                    (node.x - node.width / 2.0, node.y - node.height / 2.0),
                );
            }
        }
        // Containers the engine did not place get the bounding box of
        // their placed children.
        for reg in &registrations {
            if !reg.is_container || absolute.contains_key(&reg.id) {
                continue;
            }
            let mut min_x = f32::INFINITY;
            let mut min_y = f32::INFINITY;
            for other in &registrations {
                if other.parent.as_deref() == Some(reg.id.as_str()) {
                    if let Some(&(x, y)) = absolute.get(&other.id) {
                        min_x = min_x.min(x);
                        min_y = min_y.min(y);
                    }
                }
            }
            if min_x.is_finite() && min_y.is_finite() {
                absolute.insert(reg.id.clone(), (min_x, min_y));
            }
        }

        let placed_top_level = root
            .children
            .iter()
            .filter(|c| absolute.contains_key(&c.id))
            .count();
        if placed_top_level == 0 {
            return Err(LayoutError::engine("no positions produced"));
        }

        let (mut shift_x, mut shift_y) = (f32::INFINITY, f32::INFINITY);
        for child in &root.children {
            if let Some(&(x, y)) = absolute.get(&child.id) {
                shift_x = shift_x.min(x);
                shift_y = shift_y.min(y);
            }
        }

        for child in &mut root.children {
            apply_positions(child, (0.0, 0.0), (shift_x, shift_y), &absolute);
        }
        root.x = Some(0.0);
        root.y = Some(0.0);
        Ok(root)
    }
}

fn collect_registrations(
    node: &LayoutBox,
    parent: Option<&str>,
    include_children: bool,
    out: &mut Vec<Registration>,
) {
    out.push(Registration {
        id: node.id.clone(),
        width: node.width,
        height: node.height,
        parent: parent.map(str::to_string),
        is_container: !node.children.is_empty(),
    });
    if include_children {
        for child in &node.children {
            collect_registrations(child, Some(&node.id), include_children, out);
        }
    }
}

fn map_to_ancestor(node: &LayoutBox, top: &str, out: &mut HashMap<String, String>) {
    for child in &node.children {
        out.insert(child.id.clone(), top.to_string());
        map_to_ancestor(child, top, out);
    }
}

fn apply_positions(
    node: &mut LayoutBox,
    parent_abs: (f32, f32),
    shift: (f32, f32),
    absolute: &HashMap<String, (f32, f32)>,
) {
    let abs = absolute
        .get(&node.id)
        .map(|&(x, y)| (x - shift.0, y - shift.1));
    if let Some((x, y)) = abs {
        node.x = Some(x - parent_abs.0);
        node.y = Some(y - parent_abs.1);
    }
    let next = abs.unwrap_or(parent_abs);
    for child in &mut node.children {
        apply_positions(child, next, shift, absolute);
    }
}

fn rankdir(options: &EngineOptions) -> &'static str {
    match options.get(OPT_DIRECTION).map(String::as_str) {
        Some(DIRECTION_DOWN) => "tb",
        _ => "lr",
    }
}

fn spacing(options: &EngineOptions, key: &str, fallback: f32) -> f32 {
    options
        .get(key)
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(direction: &str) -> EngineOptions {
        let mut opts = EngineOptions::new();
        opts.insert(OPT_DIRECTION.to_string(), direction.to_string());
        opts.insert(OPT_LAYER_SPACING.to_string(), "120".to_string());
        opts.insert(OPT_NODE_SPACING.to_string(), "160".to_string());
        opts.insert(
            OPT_HIERARCHY.to_string(),
            HIERARCHY_INCLUDE_CHILDREN.to_string(),
        );
        opts
    }

    fn edge(from: &str, to: &str) -> EngineEdge {
        EngineEdge {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    #[test]
    fn empty_root_is_a_no_op() {
        let root = LayoutBox::root(Vec::new());
        let out = DagreEngine
            .arrange(root, &[], &options(DIRECTION_RIGHT))
            .unwrap();
        assert_eq!(out.x, Some(0.0));
        assert!(out.children.is_empty());
    }

    #[test]
    fn rightward_flow_ranks_target_after_source() {
        let root = LayoutBox::root(vec![
            LayoutBox::new("a", 140.0, 140.0),
            LayoutBox::new("b", 160.0, 160.0),
        ]);
        let out = DagreEngine
            .arrange(root, &[edge("a", "b")], &options(DIRECTION_RIGHT))
            .unwrap();
        let a = out.children.iter().find(|c| c.id == "a").unwrap();
        let b = out.children.iter().find(|c| c.id == "b").unwrap();
        assert!(a.x.is_some() && a.y.is_some());
        assert!(b.x.unwrap() > a.x.unwrap());
    }

    #[test]
    fn downward_flow_ranks_target_below_source() {
        let root = LayoutBox::root(vec![
            LayoutBox::new("a", 100.0, 100.0),
            LayoutBox::new("b", 100.0, 100.0),
        ]);
        let out = DagreEngine
            .arrange(root, &[edge("a", "b")], &options(DIRECTION_DOWN))
            .unwrap();
        let a = out.children.iter().find(|c| c.id == "a").unwrap();
        let b = out.children.iter().find(|c| c.id == "b").unwrap();
        assert!(b.y.unwrap() > a.y.unwrap());
    }

    #[test]
    fn duplicate_and_self_edges_are_ignored() {
        let root = LayoutBox::root(vec![
            LayoutBox::new("a", 100.0, 100.0),
            LayoutBox::new("b", 100.0, 100.0),
        ]);
        let edges = vec![edge("a", "b"), edge("a", "b"), edge("a", "a")];
        let out = DagreEngine
            .arrange(root, &edges, &options(DIRECTION_RIGHT))
            .unwrap();
        assert_eq!(out.children.len(), 2);
        assert!(out.children.iter().all(|c| c.x.is_some()));
    }

    #[test]
    fn container_children_come_back_parent_relative() {
        let mut container = LayoutBox::new("g", 240.0, 240.0);
        container.children.push(LayoutBox::new("inner", 160.0, 160.0));
        let root = LayoutBox::root(vec![container, LayoutBox::new("solo", 140.0, 140.0)]);
        let out = DagreEngine
            .arrange(
                root,
                &[edge("inner", "solo")],
                &options(DIRECTION_RIGHT),
            )
            .unwrap();
        let g = out.children.iter().find(|c| c.id == "g").unwrap();
        assert!(g.x.is_some());
        let inner = g.children.iter().find(|c| c.id == "inner").unwrap();
        // Relative to the container, not the canvas.
        assert!(inner.x.is_some());
    }

    #[test]
    fn flat_hierarchy_keeps_nested_children_unplaced() {
        let mut container = LayoutBox::new("g", 240.0, 240.0);
        container.children.push(LayoutBox::new("inner", 160.0, 160.0));
        let root = LayoutBox::root(vec![container, LayoutBox::new("solo", 140.0, 140.0)]);
        let mut opts = options(DIRECTION_RIGHT);
        opts.insert(OPT_HIERARCHY.to_string(), HIERARCHY_FLAT.to_string());
        let out = DagreEngine
            .arrange(root, &[edge("inner", "solo")], &opts)
            .unwrap();
        let g = out.children.iter().find(|c| c.id == "g").unwrap();
        assert!(g.x.is_some());
        assert!(g.children[0].x.is_none());
    }

    #[test]
    fn top_level_positions_are_normalized_to_origin() {
        let root = LayoutBox::root(vec![
            LayoutBox::new("a", 100.0, 100.0),
            LayoutBox::new("b", 100.0, 100.0),
        ]);
        let out = DagreEngine
            .arrange(root, &[edge("a", "b")], &options(DIRECTION_RIGHT))
            .unwrap();
        let min_x = out
            .children
            .iter()
            .filter_map(|c| c.x)
            .fold(f32::INFINITY, f32::min);
        let min_y = out
            .children
            .iter()
            .filter_map(|c| c.y)
            .fold(f32::INFINITY, f32::min);
        assert_eq!(min_x, 0.0);
        assert_eq!(min_y, 0.0);
    }
}
