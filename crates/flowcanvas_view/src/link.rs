// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link definitions: directed output-to-input connections between nodes.

use crate::node::NodeId;
use egui::Rect;

/// A directed connection from one node's output port to another node's
/// input port.
///
/// Endpoints are held as node IDs plus port names, never as owning
/// references: a link must not extend a node's lifetime, and the model's
/// cascade rule removes links when either endpoint node goes away. The
/// cached paint rect is the curve's padded bounding region, used only to
/// accelerate link picking; it is refreshed on every repaint.
#[derive(Debug, Clone)]
pub struct Link {
    /// Source node.
    pub src_node: NodeId,
    /// Name of the output port on the source node.
    pub src_output: String,
    /// Destination node.
    pub dst_node: NodeId,
    /// Name of the input port on the destination node.
    pub dst_input: String,
    /// Selected flag; at most one link is selected at a time.
    pub selected: bool,
    /// Cached graph-space bounds of the painted curve.
    pub paint_rect: Rect,
}

impl Link {
    /// Create a link between the named ports.
    pub fn new(
        src_node: NodeId,
        src_output: impl Into<String>,
        dst_node: NodeId,
        dst_input: impl Into<String>,
    ) -> Self {
        Self {
            src_node,
            src_output: src_output.into(),
            dst_node,
            dst_input: dst_input.into(),
            selected: false,
            paint_rect: Rect::ZERO,
        }
    }

    /// Check if this link touches a specific node at either end.
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.src_node == node_id || self.dst_node == node_id
    }

    /// Check if this link has the given endpoints.
    pub fn connects(
        &self,
        src_node: NodeId,
        src_output: &str,
        dst_node: NodeId,
        dst_input: &str,
    ) -> bool {
        self.src_node == src_node
            && self.dst_node == dst_node
            && self.src_output == src_output
            && self.dst_input == dst_input
    }
}
