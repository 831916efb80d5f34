// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hit testing against cached paint geometry.
//!
//! Node and port tests are rect-contains-point against the rects cached by
//! the last layout pass. Link picking measures analytic distance to the two
//! flattened cubics with a fixed tolerance, which behaves like probing a
//! slightly widened stroke without rasterizing anything.

use crate::link::Link;
use crate::model::GraphModel;
use crate::node::NodeId;
use crate::painter::{link_bounds, link_control_points, LINK_WIDTH};
use egui::Pos2;

/// Pick tolerance around a link's centerline (graph units at 1:1 zoom):
/// half of a stroke widened to 1.2 times the painted link thickness.
pub const LINK_HIT_TOLERANCE: f32 = LINK_WIDTH * 1.2 * 0.5;

const FLATTEN_STEPS: usize = 24;

/// What sits under a graph-space point. Nodes win over links; within a node,
/// ports win over the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    /// A node body (not over any port).
    NodeBody(NodeId),
    /// An input port, by node and port index.
    Input(NodeId, usize),
    /// An output port, by node and port index.
    Output(NodeId, usize),
    /// A link, by index into the model's link list.
    Link(usize),
}

/// Graph-space anchor points of a link's curve, resolved from the endpoint
/// nodes' cached port rects. `None` when an endpoint dangles.
pub fn link_anchors(model: &GraphModel, link: &Link) -> Option<(Pos2, Pos2)> {
    let src = model.node(link.src_node)?;
    let dst = model.node(link.dst_node)?;
    let start = src.output_link_point(src.find_output(&link.src_output)?);
    let end = dst.input_link_point(dst.find_input(&link.dst_input)?);
    Some((start, end))
}

/// Index of the first link whose curve passes within tolerance of `pos`.
pub fn find_link_at(model: &GraphModel, pos: Pos2) -> Option<usize> {
    for (index, link) in model.links().iter().enumerate() {
        let Some((start, end)) = link_anchors(model, link) else {
            continue;
        };
        let points = link_control_points(start, end);
        if !link_bounds(&points, LINK_HIT_TOLERANCE).contains(pos) {
            continue;
        }
        let first = [points[0], points[1], points[2], points[3]];
        let second = [points[4], points[5], points[6], points[7]];
        let distance = distance_to_cubic(&first, pos).min(distance_to_cubic(&second, pos));
        if distance <= LINK_HIT_TOLERANCE {
            return Some(index);
        }
    }
    None
}

/// Classify the target under a graph-space point.
pub fn hit_test(model: &GraphModel, pos: Pos2) -> Option<HitTarget> {
    for node in model.nodes() {
        if !node.paint_rect().contains(pos) {
            continue;
        }
        if let Some(index) = node.find_output_at(pos) {
            return Some(HitTarget::Output(node.id, index));
        }
        if let Some(index) = node.find_input_at(pos) {
            return Some(HitTarget::Input(node.id, index));
        }
        return Some(HitTarget::NodeBody(node.id));
    }
    find_link_at(model, pos).map(HitTarget::Link)
}

fn cubic_point(curve: &[Pos2; 4], t: f32) -> Pos2 {
    let u = 1.0 - t;
    let w0 = u * u * u;
    let w1 = 3.0 * u * u * t;
    let w2 = 3.0 * u * t * t;
    let w3 = t * t * t;
    Pos2::new(
        w0 * curve[0].x + w1 * curve[1].x + w2 * curve[2].x + w3 * curve[3].x,
        w0 * curve[0].y + w1 * curve[1].y + w2 * curve[2].y + w3 * curve[3].y,
    )
}

fn distance_to_segment(pos: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return (pos - a).length();
    }
    let t = ((pos - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (pos - (a + ab * t)).length()
}

fn distance_to_cubic(curve: &[Pos2; 4], pos: Pos2) -> f32 {
    let mut prev = curve[0];
    let mut best = f32::MAX;
    for step in 1..=FLATTEN_STEPS {
        let next = cubic_point(curve, step as f32 / FLATTEN_STEPS as f32);
        best = best.min(distance_to_segment(pos, prev, next));
        prev = next;
    }
    best
}
