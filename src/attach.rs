//! Attachment planning for floating edges.
//!
//! Every edge gets a side and a slot at each endpoint before any
//! geometry is resolved: endpoints sharing a host grouping face each
//! other along the grid, endpoints of boundary-crossing edges pick the
//! side nearest the far node, and edges meeting the same node side fan
//! out over stable fractional offsets. The planner also fixes how many
//! handles each node renders per side, so live anchors and planned
//! slots agree.

use crate::config::LayoutConfig;
use crate::engine::LayeredEngine;
use crate::error::Result;
use crate::geometry::{Rect, Role, Side};
use crate::graph::{EdgeKind, Graph, Media, NodeKind, Property};
use crate::grid::{GridPlan, GridSlot};
use crate::layout::{LayoutNode, LayoutResult, compute_layout, compute_layout_sync};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Offset pairs consumed outward from the center as more edges share a
/// side, keeping early arrivals where they were.
const SPREAD_PAIRS: [(f32, f32); 5] = [
    (0.2, 0.8),
    (0.1, 0.9),
    (0.3, 0.7),
    (0.15, 0.85),
    (0.4, 0.6),
];

/// Handles per field direction on one node side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandleCounts {
    pub source: usize,
    pub target: usize,
}

/// Handle counts for all four sides of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandleLayout {
    pub top: HandleCounts,
    pub right: HandleCounts,
    pub bottom: HandleCounts,
    pub left: HandleCounts,
}

impl HandleLayout {
    pub fn side(&self, side: Side) -> HandleCounts {
        match side {
            Side::Top => self.top,
            Side::Right => self.right,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
        }
    }

    pub fn count(&self, side: Side, role: Role) -> usize {
        let counts = self.side(side);
        match role {
            Role::Source => counts.source,
            Role::Target => counts.target,
        }
    }

    fn bump(&mut self, side: Side, role: Role, count: usize) {
        let counts = match side {
            Side::Top => &mut self.top,
            Side::Right => &mut self.right,
            Side::Bottom => &mut self.bottom,
            Side::Left => &mut self.left,
        };
        match role {
            Role::Source => counts.source = counts.source.max(count),
            Role::Target => counts.target = counts.target.max(count),
        }
    }
}

static BASELINE_HANDLES: Lazy<BTreeMap<NodeKind, HandleLayout>> = Lazy::new(|| {
    let mut table = BTreeMap::new();
    table.insert(
        NodeKind::Actor,
        HandleLayout {
            top: HandleCounts {
                source: 0,
                target: 1,
            },
            right: HandleCounts {
                source: 2,
                target: 0,
            },
            bottom: HandleCounts {
                source: 0,
                target: 1,
            },
            left: HandleCounts {
                source: 1,
                target: 0,
            },
        },
    );
    table.insert(
        NodeKind::Activity,
        HandleLayout {
            top: HandleCounts {
                source: 1,
                target: 1,
            },
            right: HandleCounts {
                source: 2,
                target: 1,
            },
            bottom: HandleCounts {
                source: 1,
                target: 1,
            },
            left: HandleCounts {
                source: 2,
                target: 1,
            },
        },
    );
    let grouping_side = HandleCounts {
        source: 2,
        target: 2,
    };
    table.insert(
        NodeKind::Grouping,
        HandleLayout {
            top: grouping_side,
            right: grouping_side,
            bottom: grouping_side,
            left: grouping_side,
        },
    );
    table.insert(NodeKind::Media, HandleLayout::default());
    table
});

/// Minimum handles a node kind always renders, before planning tops
/// them up.
pub fn baseline_handles(kind: NodeKind) -> HandleLayout {
    BASELINE_HANDLES.get(&kind).copied().unwrap_or_default()
}

/// Fractional positions along a side for `count` handles: center
/// first, then symmetric pairs working outward.
pub fn anchor_offsets(count: usize) -> Vec<f32> {
    if count == 0 {
        return Vec::new();
    }
    let mut offsets = vec![0.5];
    if count == 1 {
        return offsets;
    }
    let mut remaining = count - 1;
    for (near, far) in SPREAD_PAIRS {
        if remaining == 0 {
            break;
        }
        offsets.push(near);
        remaining -= 1;
        if remaining == 0 {
            break;
        }
        offsets.push(far);
        remaining -= 1;
    }
    if remaining > 0 {
        let last = remaining.saturating_sub(1).max(1) as f32;
        for idx in 0..remaining {
            let value = 0.05 + (idx as f32 / last) * 0.9;
            offsets.push((value * 10_000.0).round() / 10_000.0);
        }
    }
    offsets.truncate(count);
    offsets
}

fn handle_id(side: Side, role: Role, index: usize, total: usize) -> String {
    format!("{}-{}-{}-of-{}", side.label(), role.label(), index, total)
}

/// Whether both endpoints of an edge share a host grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeClass {
    Internal,
    External,
}

/// One endpoint's planned anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAttachment {
    pub side: Side,
    pub handle_id: String,
    /// Fraction along the side, 0 at the top-left end.
    pub offset: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeAttachment {
    pub edge_id: String,
    pub class: EdgeClass,
    pub source: EndpointAttachment,
    pub target: EndpointAttachment,
}

/// Result of one planning pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentPlan {
    pub edges: BTreeMap<String, EdgeAttachment>,
    pub handles: BTreeMap<String, HandleLayout>,
}

struct PlanContext<'a> {
    layout: &'a LayoutResult,
    index: HashMap<&'a str, &'a LayoutNode>,
    absolute: HashMap<String, (f32, f32)>,
    hosts: HashMap<String, Option<String>>,
}

impl<'a> PlanContext<'a> {
    fn new(graph: &'a Graph, layout: &'a LayoutResult) -> Self {
        let index: HashMap<&str, &LayoutNode> =
            layout.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        // Parents come before children, one forward pass accumulates
        // absolute origins.
        let mut absolute: HashMap<String, (f32, f32)> = HashMap::new();
        for node in &layout.nodes {
            let (px, py) = node
                .parent_id
                .as_ref()
                .and_then(|p| absolute.get(p))
                .copied()
                .unwrap_or((0.0, 0.0));
            absolute.insert(node.id.clone(), (px + node.x, py + node.y));
        }
        let mut hosts = HashMap::new();
        for node in &graph.nodes {
            hosts.insert(node.id.clone(), find_host(graph, &node.id));
        }
        PlanContext {
            layout,
            index,
            absolute,
            hosts,
        }
    }

    fn host(&self, id: &str) -> Option<&str> {
        self.hosts.get(id).and_then(|h| h.as_deref())
    }

    /// Absolute box; unknown ids become a zero box at the origin.
    fn rect(&self, id: &str) -> Rect {
        match self.index.get(id) {
            Some(node) => {
                let (x, y) = self.absolute.get(id).copied().unwrap_or((0.0, 0.0));
                Rect {
                    x,
                    y,
                    width: node.width,
                    height: node.height,
                }
            }
            None => Rect::default(),
        }
    }
}

/// Host grouping of a node: itself when it is a grouping, otherwise
/// the nearest grouping up the parent chain.
fn find_host(graph: &Graph, start: &str) -> Option<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = start;
    loop {
        if !seen.insert(current) {
            return None;
        }
        let node = graph.node(current)?;
        if node.kind == NodeKind::Grouping {
            return Some(node.id.clone());
        }
        current = node.parent_id.as_deref()?;
    }
}

fn slot_in<'p>(plan: &'p GridPlan, id: &str) -> Option<&'p GridSlot> {
    plan.placements.iter().find(|s| s.id == id)
}

fn grid_is_horizontal(plan: &GridPlan) -> bool {
    plan.columns >= plan.rows
}

/// Plan sides and slots for every edge in `graph` against one layout.
pub fn plan_attachments(graph: &Graph, layout: &LayoutResult) -> AttachmentPlan {
    let ctx = PlanContext::new(graph, layout);

    struct Pending {
        edge_id: String,
        source: String,
        target: String,
        class: EdgeClass,
        source_side: Side,
        target_side: Side,
    }

    let mut pending = Vec::with_capacity(graph.edges.len());
    for edge in &graph.edges {
        let source_host = ctx.host(&edge.source);
        let target_host = ctx.host(&edge.target);
        let (class, source_side, target_side) =
            if let Some(host) = source_host.filter(|h| Some(*h) == target_host) {
                let (s, t) = internal_sides(&ctx, &edge.source, &edge.target, host);
                (EdgeClass::Internal, s, t)
            } else {
                (
                    EdgeClass::External,
                    external_side(&ctx, &edge.source, &edge.target, source_host),
                    external_side(&ctx, &edge.target, &edge.source, target_host),
                )
            };
        pending.push(Pending {
            edge_id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            class,
            source_side,
            target_side,
        });
    }

    // Fan-out buckets: all endpoints landing on the same node side and
    // role share one offset ladder, in edge-id order.
    let mut buckets: BTreeMap<(String, Side, Role), Vec<String>> = BTreeMap::new();
    for p in &pending {
        buckets
            .entry((p.source.clone(), p.source_side, Role::Source))
            .or_default()
            .push(p.edge_id.clone());
        buckets
            .entry((p.target.clone(), p.target_side, Role::Target))
            .or_default()
            .push(p.edge_id.clone());
    }

    let mut planned: HashMap<(String, Side, Role), usize> = HashMap::new();
    let mut assigned: HashMap<(String, Role), EndpointAttachment> = HashMap::new();
    for ((node_id, side, role), mut edge_ids) in buckets {
        edge_ids.sort();
        let baseline = graph
            .node(&node_id)
            .map(|n| baseline_handles(n.kind))
            .unwrap_or_default();
        let total = baseline.count(side, role).max(edge_ids.len());
        let offsets = anchor_offsets(total);
        for (idx, edge_id) in edge_ids.iter().enumerate() {
            assigned.insert(
                (edge_id.clone(), role),
                EndpointAttachment {
                    side,
                    handle_id: handle_id(side, role, idx + 1, total),
                    offset: offsets[idx],
                },
            );
        }
        planned.insert((node_id, side, role), edge_ids.len());
    }

    let mut handles = BTreeMap::new();
    for node in &graph.nodes {
        let mut layout_handles = baseline_handles(node.kind);
        for side in [Side::Top, Side::Right, Side::Bottom, Side::Left] {
            for role in [Role::Source, Role::Target] {
                if let Some(&count) = planned.get(&(node.id.clone(), side, role)) {
                    layout_handles.bump(side, role, count);
                }
            }
        }
        handles.insert(node.id.clone(), layout_handles);
    }

    let mut edges = BTreeMap::new();
    for p in pending {
        let (Some(source), Some(target)) = (
            assigned.get(&(p.edge_id.clone(), Role::Source)),
            assigned.get(&(p.edge_id.clone(), Role::Target)),
        ) else {
            continue;
        };
        edges.insert(
            p.edge_id.clone(),
            EdgeAttachment {
                edge_id: p.edge_id,
                class: p.class,
                source: source.clone(),
                target: target.clone(),
            },
        );
    }

    AttachmentPlan { edges, handles }
}

/// Both endpoints live in `host`: face each other along the grid when
/// both have slots, otherwise fall back to the grid's main axis.
fn internal_sides(ctx: &PlanContext, source: &str, target: &str, host: &str) -> (Side, Side) {
    let plan = ctx.layout.grids.get(host);
    if let Some(plan) = plan
        && let Some(source_slot) = slot_in(plan, source)
        && let Some(target_slot) = slot_in(plan, target)
    {
        if source_slot.row == target_slot.row {
            return if target_slot.column >= source_slot.column {
                (Side::Right, Side::Left)
            } else {
                (Side::Left, Side::Right)
            };
        }
        return if target_slot.row >= source_slot.row {
            (Side::Bottom, Side::Top)
        } else {
            (Side::Top, Side::Bottom)
        };
    }

    let source_center = ctx.rect(source).center();
    let target_center = ctx.rect(target).center();
    let dx = target_center.x - source_center.x;
    let dy = target_center.y - source_center.y;
    let horizontal = plan
        .map(grid_is_horizontal)
        .unwrap_or(dx.abs() >= dy.abs());
    if horizontal {
        if dx >= 0.0 {
            (Side::Right, Side::Left)
        } else {
            (Side::Left, Side::Right)
        }
    } else if dy >= 0.0 {
        (Side::Bottom, Side::Top)
    } else {
        (Side::Top, Side::Bottom)
    }
}

/// Side for one endpoint of a boundary-crossing edge. Hosted nodes use
/// their grid placement relative to the grid's midline; everything
/// else compares center deltas, with a 2:1 bias against leaving
/// through the host's main axis.
fn external_side(ctx: &PlanContext, node_id: &str, other_id: &str, host: Option<&str>) -> Side {
    let plan = host.and_then(|h| ctx.layout.grids.get(h));
    if let Some(plan) = plan
        && let Some(slot) = slot_in(plan, node_id)
    {
        let horizontal = grid_is_horizontal(plan);
        if horizontal && plan.rows > 1 {
            return if (slot.row as f32) <= (plan.rows as f32 - 1.0) / 2.0 {
                Side::Top
            } else {
                Side::Bottom
            };
        }
        if !horizontal && plan.columns > 1 {
            return if (slot.column as f32) <= (plan.columns as f32 - 1.0) / 2.0 {
                Side::Left
            } else {
                Side::Right
            };
        }
    }

    let own = ctx.rect(node_id).center();
    let other = ctx.rect(other_id).center();
    let dx = other.x - own.x;
    let dy = other.y - own.y;
    let prefer_vertical = match plan.map(grid_is_horizontal) {
        Some(true) => dy.abs() >= dx.abs() * 0.5,
        Some(false) => dx.abs() < dy.abs() * 0.5,
        None => dy.abs() > dx.abs(),
    };
    if prefer_vertical {
        if dy >= 0.0 { Side::Bottom } else { Side::Top }
    } else if dx >= 0.0 {
        Side::Right
    } else {
        Side::Left
    }
}

// ── View assembly ──

/// Renderable node; position is relative to `parent_id` when set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub z_index: i32,
    pub handles: HandleLayout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub class: EdgeClass,
    pub source_attachment: EndpointAttachment,
    pub target_attachment: EndpointAttachment,
}

/// Everything a renderer needs for one frame, parents before children.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramView {
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
}

/// Groupings paint under everything else.
const GROUPING_Z: i32 = 0;
const NODE_Z: i32 = 10;

fn default_edge_label(kind: EdgeKind) -> Option<String> {
    match kind {
        EdgeKind::Include => Some("<<include>>".to_string()),
        EdgeKind::Extend => Some("<<extend>>".to_string()),
        EdgeKind::Association => None,
    }
}

/// Combine a placed layout with its attachment plan into a view.
pub fn assemble_view(graph: &Graph, layout: &LayoutResult) -> DiagramView {
    let plan = plan_attachments(graph, layout);

    let mut nodes = Vec::with_capacity(layout.nodes.len());
    for placed in &layout.nodes {
        let Some(source) = graph.node(&placed.id) else {
            continue;
        };
        nodes.push(ViewNode {
            id: placed.id.clone(),
            label: source.label.clone(),
            kind: source.kind,
            parent_id: placed.parent_id.clone(),
            x: placed.x,
            y: placed.y,
            width: placed.width,
            height: placed.height,
            z_index: if source.kind == NodeKind::Grouping {
                GROUPING_Z
            } else {
                NODE_Z
            },
            handles: plan.handles.get(&placed.id).copied().unwrap_or_default(),
            icon: source.icon.clone(),
            media: source.media.clone(),
            properties: source.properties.clone(),
        });
    }

    let mut edges = Vec::with_capacity(graph.edges.len());
    for edge in &graph.edges {
        let Some(attachment) = plan.edges.get(&edge.id) else {
            continue;
        };
        edges.push(ViewEdge {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            kind: edge.kind,
            label: edge.label.clone().or_else(|| default_edge_label(edge.kind)),
            class: attachment.class,
            source_attachment: attachment.source.clone(),
            target_attachment: attachment.target.clone(),
        });
    }

    DiagramView { nodes, edges }
}

/// Layout plus planning in one call.
pub fn compute_view_sync(
    graph: &Graph,
    config: &LayoutConfig,
    engine: &dyn LayeredEngine,
) -> Result<DiagramView> {
    let layout = compute_layout_sync(graph, config, engine)?;
    Ok(assemble_view(graph, &layout))
}

/// Runtime-agnostic async entry; the work itself is CPU-bound.
pub async fn compute_view(
    graph: &Graph,
    config: &LayoutConfig,
    engine: &dyn LayeredEngine,
) -> Result<DiagramView> {
    let layout = compute_layout(graph, config, engine).await?;
    Ok(assemble_view(graph, &layout))
}
