//! Adapter between the diagram graph and the layered engine.
//!
//! The pipeline per pass: size every node, resolve grouping grids
//! bottom-up, hand a box tree plus an option bag to the engine, then
//! flatten the placed tree back into parent-relative records. Grid
//! plans stay authoritative for containers, so whatever the engine did
//! inside a grouping is overwritten by the grid placements.

use crate::config::{Algorithm, Direction, Hierarchy, LayoutConfig};
use crate::engine::{
    DIRECTION_DOWN, DIRECTION_RIGHT, EDGE_ROUTING_ORTHOGONAL, EngineEdge, EngineOptions,
    HIERARCHY_FLAT, HIERARCHY_INCLUDE_CHILDREN, LayeredEngine, LayoutBox, OPT_COMPONENT_SPACING,
    OPT_DIRECTION, OPT_EDGE_ROUTING, OPT_EDGE_SPACING, OPT_HIERARCHY, OPT_LAYER_SPACING,
    OPT_NODE_SPACING, OPT_PADDING,
};
use crate::error::Result;
use crate::graph::{Graph, Node, NodeKind};
use crate::grid::{self, GridChild, GridPlan, GridSpec};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Estimated glyph advance used to grow boxes under long labels.
const CHAR_WIDTH: f32 = 8.0;
/// Horizontal slack added around a label.
const LABEL_PADDING: f32 = 48.0;
/// Width added per three span units when grid hints are honored.
const SPAN_BOOST: f32 = 80.0;

/// Base size per node kind, the floor before label growth.
pub fn base_size(kind: NodeKind) -> (f32, f32) {
    match kind {
        NodeKind::Actor => (140.0, 140.0),
        NodeKind::Activity => (160.0, 160.0),
        NodeKind::Grouping => (240.0, 240.0),
        NodeKind::Media => (160.0, 160.0),
    }
}

fn node_size(node: &Node, config: &LayoutConfig) -> (f32, f32) {
    let (base_w, base_h) = base_size(node.kind);
    let boost = if config.grid {
        match node.hint.as_ref().and_then(|h| h.effective()) {
            Some(span) if span > 0 => (span as f32 / 3.0) * SPAN_BOOST,
            _ => 0.0,
        }
    } else {
        0.0
    };
    let label_width = node.label.chars().count() as f32 * CHAR_WIDTH + LABEL_PADDING;
    let width = node.width.unwrap_or_else(|| (base_w + boost).max(label_width));
    let height = node.height.unwrap_or(base_h);
    (width, height)
}

/// One placed node. `x`/`y` are relative to the parent when
/// `parent_id` is set, absolute otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub parent_id: Option<String>,
}

/// Flattened result of one layout pass, parents before children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResult {
    pub nodes: Vec<LayoutNode>,
    pub grids: BTreeMap<String, GridPlan>,
}

impl LayoutResult {
    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Option bag mirroring the effective config, in the engine's terms.
pub fn engine_options(config: &LayoutConfig) -> EngineOptions {
    let layer = config.layer_spacing();
    let mut options = EngineOptions::new();
    options.insert(
        OPT_DIRECTION.to_string(),
        match config.direction {
            Direction::Right => DIRECTION_RIGHT,
            Direction::Down => DIRECTION_DOWN,
        }
        .to_string(),
    );
    options.insert(OPT_LAYER_SPACING.to_string(), format_spacing(layer));
    options.insert(
        OPT_NODE_SPACING.to_string(),
        format_spacing((layer * 1.4).max(120.0)),
    );
    options.insert(
        OPT_EDGE_SPACING.to_string(),
        format_spacing((layer * 0.9).max(80.0)),
    );
    options.insert(
        OPT_COMPONENT_SPACING.to_string(),
        format_spacing(layer.max(120.0)),
    );
    options.insert(
        OPT_PADDING.to_string(),
        format_spacing(config.container_padding()),
    );
    options.insert(
        OPT_HIERARCHY.to_string(),
        match config.hierarchy {
            Hierarchy::IncludeChildren => HIERARCHY_INCLUDE_CHILDREN,
            Hierarchy::Flat => HIERARCHY_FLAT,
        }
        .to_string(),
    );
    options.insert(
        OPT_EDGE_ROUTING.to_string(),
        EDGE_ROUTING_ORTHOGONAL.to_string(),
    );
    options
}

fn format_spacing(value: f32) -> String {
    format!("{value}")
}

/// Run one full layout pass over `graph`.
pub fn compute_layout_sync(
    graph: &Graph,
    config: &LayoutConfig,
    engine: &dyn LayeredEngine,
) -> Result<LayoutResult> {
    let parents = effective_parents(graph);
    let children_of = ordered_children(graph, &parents);
    let plans = resolve_grids(graph, config, &children_of);

    let claimed: HashSet<&str> = children_of
        .values()
        .flatten()
        .map(String::as_str)
        .collect();
    let mut root = LayoutBox::root(
        graph
            .nodes
            .iter()
            .filter(|n| !claimed.contains(n.id.as_str()))
            .map(|n| build_box(&n.id, graph, config, &children_of, &plans))
            .collect(),
    );

    let placed = match config.algorithm {
        Algorithm::None => {
            place_bypass(&mut root, &plans);
            root
        }
        Algorithm::Layered => {
            let edges: Vec<EngineEdge> = graph
                .edges
                .iter()
                .map(|e| EngineEdge {
                    from: e.source.clone(),
                    to: e.target.clone(),
                })
                .collect();
            engine.arrange(root, &edges, &engine_options(config))?
        }
    };

    let mut nodes = Vec::with_capacity(graph.nodes.len());
    for child in &placed.children {
        flatten(child, None, &mut nodes);
    }
    backfill_parents(graph, &mut nodes);
    impose_grid_plans(&mut nodes, &plans);

    Ok(LayoutResult {
        nodes,
        grids: plans,
    })
}

/// Runtime-agnostic async entry; the work itself is CPU-bound.
pub async fn compute_layout(
    graph: &Graph,
    config: &LayoutConfig,
    engine: &dyn LayeredEngine,
) -> Result<LayoutResult> {
    compute_layout_sync(graph, config, engine)
}

/// Containment as the pipeline sees it: `parentId` first, explicit
/// grouping member lists override. Unknown and self references drop out.
fn effective_parents(graph: &Graph) -> HashMap<String, String> {
    let known: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    let mut parents = HashMap::new();
    for node in &graph.nodes {
        if let Some(parent) = &node.parent_id
            && known.contains(parent.as_str())
            && parent != &node.id
        {
            parents.insert(node.id.clone(), parent.clone());
        }
    }
    for (grouping_id, meta) in &graph.grids {
        if !known.contains(grouping_id.as_str()) {
            continue;
        }
        for child in &meta.children {
            if known.contains(child.as_str()) && child != grouping_id {
                parents.insert(child.clone(), grouping_id.clone());
            }
        }
    }
    parents
}

fn ordered_children(
    graph: &Graph,
    parents: &HashMap<String, String>,
) -> HashMap<String, Vec<String>> {
    let mut children_of: HashMap<String, Vec<String>> = HashMap::new();
    for parent_id in parents.values() {
        if children_of.contains_key(parent_id) {
            continue;
        }
        let is_grouping = graph
            .node(parent_id)
            .map(|n| n.kind == NodeKind::Grouping)
            .unwrap_or(false);
        let members: Vec<String> = if is_grouping {
            graph
                .grouping_children(parent_id)
                .into_iter()
                .filter(|child| parents.get(child) == Some(parent_id))
                .collect()
        } else {
            graph
                .nodes
                .iter()
                .filter(|n| parents.get(&n.id) == Some(parent_id))
                .map(|n| n.id.clone())
                .collect()
        };
        children_of.insert(parent_id.clone(), members);
    }
    children_of
}

fn resolve_grids(
    graph: &Graph,
    config: &LayoutConfig,
    children_of: &HashMap<String, Vec<String>>,
) -> BTreeMap<String, GridPlan> {
    let mut plans = BTreeMap::new();
    let mut visiting = HashSet::new();
    for node in &graph.nodes {
        if node.kind == NodeKind::Grouping {
            resolve_grid(&node.id, graph, config, children_of, &mut plans, &mut visiting);
        }
    }
    plans
}

fn resolve_grid(
    grouping_id: &str,
    graph: &Graph,
    config: &LayoutConfig,
    children_of: &HashMap<String, Vec<String>>,
    plans: &mut BTreeMap<String, GridPlan>,
    visiting: &mut HashSet<String>,
) {
    if plans.contains_key(grouping_id) || !visiting.insert(grouping_id.to_string()) {
        return;
    }
    let mut grid_children = Vec::new();
    if let Some(members) = children_of.get(grouping_id) {
        for child_id in members {
            let Some(child) = graph.node(child_id) else {
                continue;
            };
            let (width, height) = if child.kind == NodeKind::Grouping {
                resolve_grid(child_id, graph, config, children_of, plans, visiting);
                let (base_w, base_h) = base_size(NodeKind::Grouping);
                plans
                    .get(child_id)
                    .map(|p| (p.width, p.height))
                    .unwrap_or((base_w, base_h + grid::LABEL_BAND))
            } else {
                node_size(child, config)
            };
            grid_children.push(GridChild {
                id: child.id.clone(),
                width,
                height,
                span: child.hint.as_ref().and_then(|h| h.effective()),
            });
        }
    }

    let grouping = graph.node(grouping_id);
    let (base_w, base_h) = base_size(NodeKind::Grouping);
    let meta = graph.grids.get(grouping_id);
    let spec = GridSpec {
        columns: meta.and_then(|m| m.columns).unwrap_or(grid::DEFAULT_COLUMNS),
        rows: meta.and_then(|m| m.rows),
        spacing: meta.and_then(|m| m.spacing).unwrap_or(grid::DEFAULT_SPACING),
        justify: meta.and_then(|m| m.justify).unwrap_or_default(),
        base_width: grouping.and_then(|n| n.width).unwrap_or(base_w),
        base_height: grouping.and_then(|n| n.height).unwrap_or(base_h),
        padding: config.container_padding(),
    };
    plans.insert(grouping_id.to_string(), grid::arrange(&grid_children, &spec));
}

fn build_box(
    node_id: &str,
    graph: &Graph,
    config: &LayoutConfig,
    children_of: &HashMap<String, Vec<String>>,
    plans: &BTreeMap<String, GridPlan>,
) -> LayoutBox {
    let Some(node) = graph.node(node_id) else {
        return LayoutBox::new(node_id, 0.0, 0.0);
    };
    let (width, height) = match plans.get(node_id) {
        Some(plan) => (plan.width, plan.height),
        None => node_size(node, config),
    };
    let mut layout_box = LayoutBox::new(node_id, width, height);
    if let Some(members) = children_of.get(node_id) {
        for member in members {
            layout_box
                .children
                .push(build_box(member, graph, config, children_of, plans));
        }
    }
    layout_box
}

/// Skip the engine entirely: grid slots for grouping members, origin
/// for everything else.
fn place_bypass(root: &mut LayoutBox, plans: &BTreeMap<String, GridPlan>) {
    for child in &mut root.children {
        child.x = Some(0.0);
        child.y = Some(0.0);
        place_bypass_children(child, plans);
    }
}

fn place_bypass_children(node: &mut LayoutBox, plans: &BTreeMap<String, GridPlan>) {
    let plan = plans.get(&node.id);
    for child in &mut node.children {
        let slot = plan.and_then(|p| p.placements.iter().find(|s| s.id == child.id));
        match slot {
            Some(slot) => {
                child.x = Some(slot.x);
                child.y = Some(slot.y);
            }
            None => {
                child.x = Some(0.0);
                child.y = Some(0.0);
            }
        }
        place_bypass_children(child, plans);
    }
}

fn flatten(node: &LayoutBox, parent: Option<&str>, out: &mut Vec<LayoutNode>) {
    out.push(LayoutNode {
        id: node.id.clone(),
        x: node.x.unwrap_or(0.0),
        y: node.y.unwrap_or(0.0),
        width: node.width,
        height: node.height,
        parent_id: parent.map(str::to_string),
    });
    for child in &node.children {
        flatten(child, Some(&node.id), out);
    }
}

/// Restore containment the box tree dropped, e.g. a member excluded
/// from its grouping's explicit child list.
fn backfill_parents(graph: &Graph, nodes: &mut [LayoutNode]) {
    let known: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    for node in nodes.iter_mut() {
        if node.parent_id.is_none()
            && let Some(source) = graph.node(&node.id)
            && let Some(parent) = &source.parent_id
            && known.contains(parent.as_str())
            && parent != &node.id
        {
            node.parent_id = Some(parent.clone());
        }
    }
}

/// Grid plans win over whatever the engine decided inside a grouping.
fn impose_grid_plans(nodes: &mut [LayoutNode], plans: &BTreeMap<String, GridPlan>) {
    for node in nodes.iter_mut() {
        if let Some(plan) = plans.get(&node.id) {
            node.width = plan.width;
            node.height = plan.height;
        }
    }
    for node in nodes.iter_mut() {
        if let Some(parent) = node.parent_id.clone()
            && let Some(plan) = plans.get(&parent)
            && let Some(slot) = plan.placements.iter().find(|s| s.id == node.id)
        {
            node.x = slot.x;
            node.y = slot.y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DagreEngine;
    use crate::error::LayoutError;
    use crate::graph::{Edge, EdgeKind, SpanHint};

    struct FailingEngine;

    impl LayeredEngine for FailingEngine {
        fn arrange(
            &self,
            _root: LayoutBox,
            _edges: &[EngineEdge],
            _options: &EngineOptions,
        ) -> Result<LayoutBox> {
            Err(LayoutError::engine("boom"))
        }
    }

    /// Puts every box at (999, 999) to prove who has the last word.
    struct ScrambleEngine;

    impl LayeredEngine for ScrambleEngine {
        fn arrange(
            &self,
            mut root: LayoutBox,
            _edges: &[EngineEdge],
            _options: &EngineOptions,
        ) -> Result<LayoutBox> {
            fn mark(node: &mut LayoutBox) {
                node.x = Some(999.0);
                node.y = Some(999.0);
                for child in &mut node.children {
                    mark(child);
                }
            }
            for child in &mut root.children {
                mark(child);
            }
            Ok(root)
        }
    }

    fn bypass_config() -> LayoutConfig {
        LayoutConfig {
            algorithm: Algorithm::None,
            ..LayoutConfig::default()
        }
    }

    fn grouped_graph() -> Graph {
        Graph {
            nodes: vec![
                Node::new("sys", "System", NodeKind::Grouping),
                Node::new("login", "Login", NodeKind::Activity).with_parent("sys"),
                Node::new("browse", "Browse", NodeKind::Activity).with_parent("sys"),
                Node::new("user", "User", NodeKind::Actor),
            ],
            edges: vec![Edge::new("e1", "user", "login", EdgeKind::Association)],
            grids: BTreeMap::new(),
        }
    }

    #[test]
    fn bypass_places_grouping_members_on_their_grid_slots() {
        let graph = grouped_graph();
        let result = compute_layout_sync(&graph, &bypass_config(), &DagreEngine).unwrap();
        let plan = result.grids.get("sys").unwrap();
        let sys = result.node("sys").unwrap();
        assert_eq!(sys.width, plan.width);
        assert_eq!(sys.height, plan.height);
        let slot = plan.placements.iter().find(|s| s.id == "login").unwrap();
        let login = result.node("login").unwrap();
        assert_eq!((login.x, login.y), (slot.x, slot.y));
        assert_eq!(login.parent_id.as_deref(), Some("sys"));
    }

    #[test]
    fn bypass_is_deterministic() {
        let graph = grouped_graph();
        let first = compute_layout_sync(&graph, &bypass_config(), &DagreEngine).unwrap();
        let second = compute_layout_sync(&graph, &bypass_config(), &DagreEngine).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ungrouped_nodes_sit_at_origin_in_bypass() {
        let graph = grouped_graph();
        let result = compute_layout_sync(&graph, &bypass_config(), &DagreEngine).unwrap();
        let user = result.node("user").unwrap();
        assert_eq!((user.x, user.y), (0.0, 0.0));
        assert_eq!(user.parent_id, None);
    }

    #[test]
    fn long_labels_widen_nodes() {
        let graph = Graph {
            nodes: vec![Node::new("n", "x".repeat(30), NodeKind::Activity)],
            edges: Vec::new(),
            grids: BTreeMap::new(),
        };
        let result = compute_layout_sync(&graph, &bypass_config(), &DagreEngine).unwrap();
        // 30 chars * 8 + 48 beats the 160 base.
        assert_eq!(result.node("n").unwrap().width, 288.0);
        assert_eq!(result.node("n").unwrap().height, 160.0);
    }

    #[test]
    fn explicit_sizes_win_over_estimates() {
        let graph = Graph {
            nodes: vec![
                Node::new("n", "a label that would grow", NodeKind::Activity).with_size(90.0, 70.0),
            ],
            edges: Vec::new(),
            grids: BTreeMap::new(),
        };
        let result = compute_layout_sync(&graph, &bypass_config(), &DagreEngine).unwrap();
        assert_eq!(result.node("n").unwrap().width, 90.0);
        assert_eq!(result.node("n").unwrap().height, 70.0);
    }

    #[test]
    fn span_hints_boost_width_only_when_grid_is_on() {
        let mut node = Node::new("n", "Hub", NodeKind::Activity);
        node.hint = Some(SpanHint {
            xs: None,
            sm: None,
            md: Some(6),
        });
        let graph = Graph {
            nodes: vec![node],
            edges: Vec::new(),
            grids: BTreeMap::new(),
        };
        let mut config = bypass_config();
        config.grid = true;
        let boosted = compute_layout_sync(&graph, &config, &DagreEngine).unwrap();
        // 160 base + (6 / 3) * 80.
        assert_eq!(boosted.node("n").unwrap().width, 320.0);
        config.grid = false;
        let plain = compute_layout_sync(&graph, &config, &DagreEngine).unwrap();
        assert_eq!(plain.node("n").unwrap().width, 160.0);
    }

    #[test]
    fn engine_errors_surface_and_bypass_never_asks() {
        let graph = grouped_graph();
        let layered = LayoutConfig::default();
        let result = compute_layout_sync(&graph, &layered, &FailingEngine);
        assert!(matches!(result, Err(LayoutError::EngineFailed(_))));
        // The bypass path returns a full result without the engine.
        assert!(compute_layout_sync(&graph, &bypass_config(), &FailingEngine).is_ok());
    }

    #[test]
    fn grid_plan_overrides_engine_positions() {
        let graph = grouped_graph();
        let result = compute_layout_sync(&graph, &LayoutConfig::default(), &ScrambleEngine).unwrap();
        let plan = result.grids.get("sys").unwrap();
        let slot = plan.placements.iter().find(|s| s.id == "browse").unwrap();
        let browse = result.node("browse").unwrap();
        assert_eq!((browse.x, browse.y), (slot.x, slot.y));
        assert_eq!(result.node("sys").unwrap().width, plan.width);
        // Nodes outside any grid keep what the engine said.
        assert_eq!(result.node("user").unwrap().x, 999.0);
    }

    #[test]
    fn unknown_parents_are_treated_as_roots() {
        let graph = Graph {
            nodes: vec![Node::new("n", "Stray", NodeKind::Activity).with_parent("ghost")],
            edges: Vec::new(),
            grids: BTreeMap::new(),
        };
        let result = compute_layout_sync(&graph, &bypass_config(), &DagreEngine).unwrap();
        let stray = result.node("n").unwrap();
        assert_eq!(stray.parent_id, None);
        assert_eq!((stray.x, stray.y), (0.0, 0.0));
    }

    #[test]
    fn nested_groupings_resolve_inner_first() {
        let graph = Graph {
            nodes: vec![
                Node::new("outer", "Outer", NodeKind::Grouping),
                Node::new("inner", "Inner", NodeKind::Grouping).with_parent("outer"),
                Node::new("leaf", "Leaf", NodeKind::Activity).with_parent("inner"),
            ],
            edges: Vec::new(),
            grids: BTreeMap::new(),
        };
        let result = compute_layout_sync(&graph, &bypass_config(), &DagreEngine).unwrap();
        let outer = result.grids.get("outer").unwrap();
        let inner = result.grids.get("inner").unwrap();
        // The outer grid packed the inner container at its grown size.
        assert!(outer.width > inner.width);
        let order: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["outer", "inner", "leaf"]);
    }

    #[test]
    fn members_outside_the_explicit_list_keep_their_parent() {
        let mut grids = BTreeMap::new();
        grids.insert(
            "sys".to_string(),
            crate::graph::GroupingMeta {
                columns: None,
                rows: None,
                spacing: None,
                justify: None,
                children: vec!["login".to_string()],
            },
        );
        let graph = Graph {
            nodes: vec![
                Node::new("sys", "System", NodeKind::Grouping),
                Node::new("login", "Login", NodeKind::Activity).with_parent("sys"),
                Node::new("extra", "Extra", NodeKind::Activity).with_parent("sys"),
            ],
            edges: Vec::new(),
            grids,
        };
        let result = compute_layout_sync(&graph, &bypass_config(), &DagreEngine).unwrap();
        // Not packed by the grid, but containment survives.
        let extra = result.node("extra").unwrap();
        assert_eq!(extra.parent_id.as_deref(), Some("sys"));
        assert!(
            result
                .grids
                .get("sys")
                .unwrap()
                .placements
                .iter()
                .all(|s| s.id != "extra")
        );
    }
}
