//! Parametric paths
//!
//! A path is an ordered polyline with a per-vertex corner style. Sharp
//! vertices meet in a point; round vertices are replaced by a quadratic
//! Bézier blend between their shrunk neighbor segments. Paths are
//! stored as wires and can be rebuilt in place under the same handle
//! while the user keeps drawing.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use truck_modeling::{Edge, Point3, Vertex, Wire, builder};

use super::point3;
use crate::error::{CadError, CadResult};
use crate::registry::{Handle, Shape, ShapeRegistry};

/// Points closer than this are considered the same point and merged.
pub const SAME_POINT_TOLERANCE: f32 = 0.001;

/// Fraction of the shorter neighbor segment consumed by a round-corner
/// blend on each side. Below 0.5 so two adjacent round corners never
/// swallow a segment completely.
const CORNER_BLEND: f32 = 0.4;

/// How a path vertex is joined to its neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CornerStyle {
    /// Segments meet in a sharp vertex.
    #[default]
    Sharp,
    /// The vertex is blended with a rounded corner.
    Round,
}

/// One prepared path vertex: either a single kernel vertex, or the
/// in/out pair of a corner blend.
enum Node {
    Sharp(Vertex),
    Round {
        incoming: Vertex,
        outgoing: Vertex,
        control: Point3,
    },
}

impl Node {
    fn entry(&self) -> &Vertex {
        match self {
            Node::Sharp(v) => v,
            Node::Round { incoming, .. } => incoming,
        }
    }

    fn exit(&self) -> &Vertex {
        match self {
            Node::Sharp(v) => v,
            Node::Round { outgoing, .. } => outgoing,
        }
    }
}

/// Drop consecutive points closer than [`SAME_POINT_TOLERANCE`]; for
/// closed paths the seam between last and first point counts as
/// consecutive too.
fn dedup_points(
    points: &[Vec3],
    corners: &[CornerStyle],
    closed: bool,
) -> (Vec<Vec3>, Vec<CornerStyle>) {
    let mut out_points: Vec<Vec3> = Vec::with_capacity(points.len());
    let mut out_corners: Vec<CornerStyle> = Vec::with_capacity(points.len());
    for (&p, &c) in points.iter().zip(corners) {
        if out_points
            .last()
            .is_some_and(|last| last.distance(p) < SAME_POINT_TOLERANCE)
        {
            continue;
        }
        out_points.push(p);
        out_corners.push(c);
    }
    if closed && out_points.len() > 1 {
        let first = out_points[0];
        if out_points
            .last()
            .is_some_and(|last| last.distance(first) < SAME_POINT_TOLERANCE)
        {
            out_points.pop();
            out_corners.pop();
        }
    }
    (out_points, out_corners)
}

/// Build the wire for a point/corner sequence.
fn build_wire(points: &[Vec3], corners: &[CornerStyle], closed: bool) -> CadResult<Wire> {
    if points.len() != corners.len() {
        return Err(CadError::InvalidParameter(format!(
            "corner style count {} does not match point count {}",
            corners.len(),
            points.len()
        )));
    }

    let (points, corners) = dedup_points(points, corners, closed);
    let minimum = if closed { 3 } else { 2 };
    if points.len() < minimum {
        return Err(CadError::InvalidParameter(format!(
            "a path needs at least {} distinct points, got {}",
            minimum,
            points.len()
        )));
    }

    let n = points.len();
    let nodes: Vec<Node> = (0..n)
        .map(|i| {
            // Endpoints of an open path have a neighbor on one side
            // only, so they are always sharp.
            let blend = corners[i] == CornerStyle::Round && (closed || (i > 0 && i < n - 1));
            if !blend {
                return Node::Sharp(builder::vertex(point3(points[i])));
            }
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            let cut = CORNER_BLEND * prev.distance(points[i]).min(next.distance(points[i]));
            let entry = points[i] + (prev - points[i]).normalize() * cut;
            let exit = points[i] + (next - points[i]).normalize() * cut;
            Node::Round {
                incoming: builder::vertex(point3(entry)),
                outgoing: builder::vertex(point3(exit)),
                control: point3(points[i]),
            }
        })
        .collect();

    let mut edges: Vec<Edge> = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        if let Node::Round {
            incoming,
            outgoing,
            control,
        } = node
        {
            edges.push(builder::bezier(incoming, outgoing, vec![*control]));
        }
        let is_last = i == n - 1;
        if !is_last || closed {
            let next = &nodes[(i + 1) % n];
            edges.push(builder::line(node.exit(), next.entry()));
        }
    }
    Ok(edges.into())
}

/// Build a wire from ordered points and store it under a fresh handle.
///
/// Requires at least 2 distinct points (3 if `closed`).
pub fn create_path(
    registry: &mut ShapeRegistry,
    points: &[Vec3],
    corners: &[CornerStyle],
    closed: bool,
) -> CadResult<Handle> {
    let wire = build_wire(points, corners, closed)?;
    let handle = registry.store(Shape::Wire(wire));
    tracing::debug!(handle = %handle, points = points.len(), closed, "created path");
    Ok(handle)
}

/// Rebuild the path stored under `handle` from new points, preserving
/// the handle (and its accumulated transform) for callers tracking a
/// live sketch.
pub fn update_path(
    registry: &mut ShapeRegistry,
    handle: &Handle,
    points: &[Vec3],
    corners: &[CornerStyle],
    closed: bool,
) -> CadResult<Handle> {
    if !registry.contains(handle) {
        return Err(CadError::NotFound(handle.clone()));
    }
    let wire = build_wire(points, corners, closed)?;
    registry.store_with(Shape::Wire(wire), handle);
    Ok(handle.clone())
}
