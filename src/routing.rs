//! Live edge geometry.
//!
//! The planner decides sides and slots once per layout pass; this
//! module turns those decisions into concrete geometry against
//! whatever the canvas currently shows. Positions are resolved fresh
//! every frame, so dragging a node (or its grouping) drags every
//! attached edge with it.

use crate::attach::{EndpointAttachment, ViewEdge};
use crate::geometry::{Point, Rect, Role, Side};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Length of the straight stub an edge keeps before its first turn.
const STUB: f32 = 20.0;
/// Radius of the rounded corners in the emitted path.
const CORNER_RADIUS: f32 = 5.0;
/// Distance labels float away from the path, perpendicular to it.
const LABEL_CLEARANCE: f32 = 20.0;
/// Step between label tiers along the path direction.
const LABEL_TIER_STEP: f32 = 12.0;

/// Node state as the canvas currently shows it; `position` is relative
/// to the parent.
#[derive(Debug, Clone)]
pub struct LiveNode {
    pub id: String,
    pub position: Point,
    pub parent_id: Option<String>,
    pub width: f32,
    pub height: f32,
}

/// Snapshot of the canvas for one routing frame.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub nodes: Vec<LiveNode>,
}

impl Scene {
    /// A scene exactly as a freshly computed view describes it.
    pub fn from_view(view: &crate::attach::DiagramView) -> Self {
        Scene {
            nodes: view
                .nodes
                .iter()
                .map(|n| LiveNode {
                    id: n.id.clone(),
                    position: Point::new(n.x, n.y),
                    parent_id: n.parent_id.clone(),
                    width: n.width,
                    height: n.height,
                })
                .collect(),
        }
    }
}

/// Measured anchor a node currently renders, center in node-local
/// coordinates.
#[derive(Debug, Clone)]
pub struct LiveAnchor {
    pub id: String,
    pub side: Side,
    pub center: Point,
}

/// Source of measured anchors. The analytic fallback makes this
/// optional; renderers that measure real handle elements report them
/// here.
pub trait LiveAnchors {
    fn live_anchors(&self, node_id: &str, role: Role) -> Vec<LiveAnchor>;
}

/// No measured anchors at all; every endpoint resolves analytically.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLiveAnchors;

impl LiveAnchors for NoLiveAnchors {
    fn live_anchors(&self, _node_id: &str, _role: Role) -> Vec<LiveAnchor> {
        Vec::new()
    }
}

/// Placed label for one routed edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedLabel {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// Resolved geometry for one edge on the current scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedEdge {
    pub id: String,
    pub source: Point,
    pub target: Point,
    /// Orthogonal polyline from source to target, endpoints included.
    pub points: Vec<Point>,
    /// SVG path over `points` with rounded corners.
    pub path: String,
    /// Rotation of the arrow marker at the target, degrees.
    pub marker_angle: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<RoutedLabel>,
}

/// Routes edges against one scene. Absolute origins are memoized for
/// the router's lifetime, so use one router per frame.
pub struct EdgeRouter<'a> {
    index: HashMap<&'a str, &'a LiveNode>,
    absolute: HashMap<String, Point>,
}

impl<'a> EdgeRouter<'a> {
    pub fn new(scene: &'a Scene) -> Self {
        EdgeRouter {
            index: scene.nodes.iter().map(|n| (n.id.as_str(), n)).collect(),
            absolute: HashMap::new(),
        }
    }

    /// Route one planned edge. Returns `None` when either endpoint is
    /// missing from the scene.
    pub fn route(&mut self, edge: &ViewEdge, anchors: &dyn LiveAnchors) -> Option<RoutedEdge> {
        self.route_between(
            &edge.id,
            &edge.source,
            &edge.target,
            Some(&edge.source_attachment),
            Some(&edge.target_attachment),
            edge.label.as_deref(),
            anchors,
        )
    }

    /// Route with explicit (possibly absent) attachments. Unplanned
    /// endpoints face each other across the dominant axis at the side
    /// midpoint.
    #[allow(clippy::too_many_arguments)]
    pub fn route_between(
        &mut self,
        edge_id: &str,
        source_id: &str,
        target_id: &str,
        source_attachment: Option<&EndpointAttachment>,
        target_attachment: Option<&EndpointAttachment>,
        label: Option<&str>,
        anchors: &dyn LiveAnchors,
    ) -> Option<RoutedEdge> {
        let source_rect = self.live_rect(source_id)?;
        let target_rect = self.live_rect(target_id)?;

        let (fallback_source, fallback_target) = facing_sides(source_rect, target_rect);
        let (source_side, source_point) = resolve_endpoint(
            source_rect,
            source_attachment,
            fallback_source,
            &anchors.live_anchors(source_id, Role::Source),
        );
        let (target_side, target_point) = resolve_endpoint(
            target_rect,
            target_attachment,
            fallback_target,
            &anchors.live_anchors(target_id, Role::Target),
        );

        let points = waypoints(source_point, source_side, target_point, target_side);
        let label = label.map(|text| {
            let at = label_anchor(&points, edge_id, source_point, target_point);
            RoutedLabel {
                text: text.to_string(),
                x: at.x,
                y: at.y,
            }
        });

        Some(RoutedEdge {
            id: edge_id.to_string(),
            source: source_point,
            target: target_point,
            path: rounded_path(&points),
            points,
            marker_angle: marker_angle(target_side),
            label,
        })
    }

    fn live_rect(&mut self, id: &str) -> Option<Rect> {
        let node = self.index.get(id).copied()?;
        let origin = self.absolute_origin(id)?;
        Some(Rect {
            x: origin.x,
            y: origin.y,
            width: node.width,
            height: node.height,
        })
    }

    /// Absolute origin of a node: its own position plus every ancestor
    /// position. Unknown parents count as the canvas root.
    fn absolute_origin(&mut self, id: &str) -> Option<Point> {
        if let Some(point) = self.absolute.get(id) {
            return Some(*point);
        }
        let mut chain: Vec<&'a LiveNode> = Vec::new();
        let mut seen: HashSet<&'a str> = HashSet::new();
        let mut base = Point::default();
        let mut cursor = self.index.get(id).copied();
        while let Some(node) = cursor {
            if !seen.insert(node.id.as_str()) {
                break;
            }
            chain.push(node);
            cursor = match node.parent_id.as_deref() {
                Some(parent_id) => {
                    if let Some(origin) = self.absolute.get(parent_id) {
                        base = *origin;
                        None
                    } else {
                        self.index.get(parent_id).copied()
                    }
                }
                None => None,
            };
        }
        let mut origin = base;
        for node in chain.iter().rev() {
            origin = Point::new(origin.x + node.position.x, origin.y + node.position.y);
            self.absolute.insert(node.id.clone(), origin);
        }
        if chain.is_empty() { None } else { Some(origin) }
    }
}

/// Pick the endpoint's side and point: a measured anchor matching the
/// planned handle wins, then any measured anchor on the planned side,
/// then the planned side resolved analytically.
fn resolve_endpoint(
    rect: Rect,
    attachment: Option<&EndpointAttachment>,
    fallback_side: Side,
    live: &[LiveAnchor],
) -> (Side, Point) {
    let Some(attachment) = attachment else {
        return (fallback_side, analytic_anchor(rect, fallback_side, 0.5));
    };
    if let Some(anchor) = live.iter().find(|a| a.id == attachment.handle_id) {
        return (
            anchor.side,
            Point::new(rect.x + anchor.center.x, rect.y + anchor.center.y),
        );
    }
    if let Some(anchor) = live.iter().find(|a| a.side == attachment.side) {
        return (
            anchor.side,
            Point::new(rect.x + anchor.center.x, rect.y + anchor.center.y),
        );
    }
    (
        attachment.side,
        analytic_anchor(rect, attachment.side, attachment.offset),
    )
}

/// Point on a side at a fractional offset from its top-left end.
fn analytic_anchor(rect: Rect, side: Side, offset: f32) -> Point {
    match side {
        Side::Left => Point::new(rect.x, rect.y + rect.height * offset),
        Side::Right => Point::new(rect.x + rect.width, rect.y + rect.height * offset),
        Side::Top => Point::new(rect.x + rect.width * offset, rect.y),
        Side::Bottom => Point::new(rect.x + rect.width * offset, rect.y + rect.height),
    }
}

/// Sides two unplanned endpoints use: the dominant center delta picks
/// the axis, its sign picks the pair.
fn facing_sides(source: Rect, target: Rect) -> (Side, Side) {
    let s = source.center();
    let t = target.center();
    let dx = t.x - s.x;
    let dy = t.y - s.y;
    if dx.abs() >= dy.abs() {
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

/// Arrow rotation at the target, by the side the edge enters through.
fn marker_angle(target_side: Side) -> f32 {
    match target_side {
        Side::Top => 90.0,
        Side::Bottom => -90.0,
        Side::Left => 0.0,
        Side::Right => 180.0,
    }
}

/// Orthogonal waypoints: a stub out of each side, then a single mid
/// line or corner between the stub ends.
fn waypoints(source: Point, source_side: Side, target: Point, target_side: Side) -> Vec<Point> {
    let (sx, sy) = source_side.outward();
    let s2 = Point::new(source.x + sx * STUB, source.y + sy * STUB);
    let (tx, ty) = target_side.outward();
    let t2 = Point::new(target.x + tx * STUB, target.y + ty * STUB);

    let mut points = vec![source, s2];
    match (source_side.is_vertical(), target_side.is_vertical()) {
        (true, true) => {
            let mid_x = (s2.x + t2.x) / 2.0;
            points.push(Point::new(mid_x, s2.y));
            points.push(Point::new(mid_x, t2.y));
        }
        (false, false) => {
            let mid_y = (s2.y + t2.y) / 2.0;
            points.push(Point::new(s2.x, mid_y));
            points.push(Point::new(t2.x, mid_y));
        }
        // One horizontal exit, one vertical: a single corner joins the
        // stub ends.
        (true, false) => points.push(Point::new(s2.x, t2.y)),
        (false, true) => points.push(Point::new(t2.x, s2.y)),
    }
    points.push(t2);
    points.push(target);
    points.dedup_by(|a, b| a.x == b.x && a.y == b.y);
    points
}

fn toward(from: Point, to: Point, distance: f32) -> Point {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = (dx * dx + dy * dy).sqrt();
    if length <= f32::EPSILON {
        return from;
    }
    Point::new(
        from.x + dx / length * distance,
        from.y + dy / length * distance,
    )
}

/// SVG path over the polyline, corners rounded with quadratic curves.
fn rounded_path(points: &[Point]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = format!("M {:.2} {:.2}", points[0].x, points[0].y);
    for idx in 1..points.len() {
        let current = points[idx];
        if idx + 1 < points.len() {
            let prev = points[idx - 1];
            let next = points[idx + 1];
            let len_in = ((current.x - prev.x).powi(2) + (current.y - prev.y).powi(2)).sqrt();
            let len_out = ((next.x - current.x).powi(2) + (next.y - current.y).powi(2)).sqrt();
            let radius = CORNER_RADIUS.min(len_in / 2.0).min(len_out / 2.0);
            if radius > 0.1 {
                let entry = toward(current, prev, radius);
                let exit = toward(current, next, radius);
                d.push_str(&format!(
                    " L {:.2} {:.2} Q {:.2} {:.2} {:.2} {:.2}",
                    entry.x, entry.y, current.x, current.y, exit.x, exit.y
                ));
                continue;
            }
        }
        d.push_str(&format!(" L {:.2} {:.2}", current.x, current.y));
    }
    d
}

/// Point halfway along the polyline by arc length.
fn midpoint_by_length(points: &[Point]) -> Point {
    match points {
        [] => Point::default(),
        [only] => *only,
        _ => {
            let total: f32 = points
                .windows(2)
                .map(|w| ((w[1].x - w[0].x).powi(2) + (w[1].y - w[0].y).powi(2)).sqrt())
                .sum();
            let mut remaining = total / 2.0;
            for w in points.windows(2) {
                let length = ((w[1].x - w[0].x).powi(2) + (w[1].y - w[0].y).powi(2)).sqrt();
                if length >= remaining && length > 0.0 {
                    let t = remaining / length;
                    return Point::new(
                        w[0].x + (w[1].x - w[0].x) * t,
                        w[0].y + (w[1].y - w[0].y) * t,
                    );
                }
                remaining -= length;
            }
            points[points.len() - 1]
        }
    }
}

/// Label anchor: path midpoint nudged off the line, with a per-edge
/// tier so parallel labels do not stack on the same spot.
fn label_anchor(points: &[Point], edge_id: &str, source: Point, target: Point) -> Point {
    let mid = midpoint_by_length(points);
    let dx = target.x - source.x;
    let dy = target.y - source.y;
    let hash = edge_id
        .chars()
        .fold(0u32, |acc, c| acc.wrapping_add(c as u32));
    let tier = (hash % 5) as f32 - 2.0;
    if dx.abs() >= dy.abs() {
        let clearance = if dy >= 0.0 {
            -LABEL_CLEARANCE
        } else {
            LABEL_CLEARANCE
        };
        Point::new(mid.x + tier * LABEL_TIER_STEP, mid.y + clearance)
    } else {
        let clearance = if dx >= 0.0 {
            -LABEL_CLEARANCE
        } else {
            LABEL_CLEARANCE
        };
        Point::new(mid.x + clearance, mid.y + tier * LABEL_TIER_STEP)
    }
}
