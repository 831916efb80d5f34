// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions: the placed, positioned unit of the canvas.

use crate::geometry::Grid;
use crate::port::Port;
use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Validation status of a node, surfaced as a banner when painting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// The node carries warnings.
    pub warnings: bool,
    /// The node carries errors; takes precedence over warnings.
    pub errors: bool,
}

/// Host-supplied description of a node to insert: display data and ports.
///
/// What the node *does* is the host's business; the canvas only edits and
/// draws it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Displayed name.
    pub name: String,
    /// Optional free-text contents block painted under the header.
    pub contents: Option<String>,
    /// Header fill color.
    pub header_color: [u8; 3],
    /// Input ports, top to bottom.
    pub inputs: Vec<Port>,
    /// Output ports, top to bottom.
    pub outputs: Vec<Port>,
}

impl NodeSpec {
    /// Create a spec with no ports.
    pub fn new(name: impl Into<String>, header_color: [u8; 3]) -> Self {
        Self {
            name: name.into(),
            contents: None,
            header_color,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Append an input port.
    pub fn with_input(mut self, port: Port) -> Self {
        self.inputs.push(port);
        self
    }

    /// Append an output port.
    pub fn with_output(mut self, port: Port) -> Self {
        self.outputs.push(port);
        self
    }

    /// Set the contents annotation.
    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }
}

/// A node instance on the canvas.
///
/// The paint rect caches the node's graph-space footprint and is recomputed
/// from content by the painter on every repaint; port paint rects likewise.
/// Hit tests are only valid once a repaint has run.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique instance ID.
    pub id: NodeId,
    /// Displayed name.
    pub name: String,
    /// Optional free-text contents block.
    pub contents: Option<String>,
    /// Header fill color.
    pub header_color: [u8; 3],
    /// Input ports.
    pub inputs: Vec<Port>,
    /// Output ports.
    pub outputs: Vec<Port>,
    /// Part of an active execution sequence; disabled nodes paint dimmed.
    pub enabled: bool,
    /// Selected flag, mirrored by the canvas selection set.
    pub selected: bool,
    /// Warning/error banner state.
    pub status: NodeStatus,
    paint_rect: Rect,
    input_paint_rects: Vec<Rect>,
    output_paint_rects: Vec<Rect>,
}

impl Node {
    /// Create a node from a spec at a grid-snapped position.
    pub fn new(spec: NodeSpec, pos: Pos2, grid: &Grid) -> Self {
        Self::with_id(NodeId::new(), spec, pos, grid)
    }

    /// Create a node with an explicit ID (used when loading a document).
    pub fn with_id(id: NodeId, spec: NodeSpec, pos: Pos2, grid: &Grid) -> Self {
        Self {
            id,
            name: spec.name,
            contents: spec.contents,
            header_color: spec.header_color,
            inputs: spec.inputs,
            outputs: spec.outputs,
            enabled: true,
            selected: false,
            status: NodeStatus::default(),
            paint_rect: Rect::from_min_size(grid.snap_pos(pos), Vec2::ZERO),
            input_paint_rects: Vec::new(),
            output_paint_rects: Vec::new(),
        }
    }

    /// Graph-space position (paint rect origin).
    pub fn pos(&self) -> Pos2 {
        self.paint_rect.min
    }

    /// Move the node, optionally snapping to the grid.
    pub fn set_pos(&mut self, pos: Pos2, grid: &Grid, snap: bool) {
        let pos = if snap { grid.snap_pos(pos) } else { pos };
        self.paint_rect = Rect::from_min_size(pos, self.paint_rect.size());
    }

    /// Cached graph-space footprint.
    pub fn paint_rect(&self) -> Rect {
        self.paint_rect
    }

    /// Replace the cached footprint; called by the painter during layout.
    pub fn set_paint_rect(&mut self, rect: Rect) {
        self.paint_rect = rect;
    }

    /// Index of the input port whose paint rect contains `pos`.
    pub fn find_input_at(&self, pos: Pos2) -> Option<usize> {
        self.input_paint_rects.iter().position(|r| r.contains(pos))
    }

    /// Index of the output port whose paint rect contains `pos`.
    pub fn find_output_at(&self, pos: Pos2) -> Option<usize> {
        self.output_paint_rects.iter().position(|r| r.contains(pos))
    }

    /// Index of the input port named `name`.
    pub fn find_input(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name == name)
    }

    /// Index of the output port named `name`.
    pub fn find_output(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    /// Set the cached paint rect of an input port.
    pub fn set_input_paint_rect(&mut self, index: usize, rect: Rect) {
        if index >= self.input_paint_rects.len() {
            self.input_paint_rects.resize(index + 1, Rect::ZERO);
        }
        self.input_paint_rects[index] = rect;
    }

    /// Cached paint rect of an input port.
    pub fn input_paint_rect(&self, index: usize) -> Rect {
        self.input_paint_rects.get(index).copied().unwrap_or(Rect::ZERO)
    }

    /// Set the cached paint rect of an output port.
    pub fn set_output_paint_rect(&mut self, index: usize, rect: Rect) {
        if index >= self.output_paint_rects.len() {
            self.output_paint_rects.resize(index + 1, Rect::ZERO);
        }
        self.output_paint_rects[index] = rect;
    }

    /// Cached paint rect of an output port.
    pub fn output_paint_rect(&self, index: usize) -> Rect {
        self.output_paint_rects.get(index).copied().unwrap_or(Rect::ZERO)
    }

    /// Graph-space anchor where links attach to an input (left edge midpoint).
    pub fn input_link_point(&self, index: usize) -> Pos2 {
        match self.input_paint_rects.get(index) {
            Some(rect) => Pos2::new(rect.min.x, rect.center().y),
            None => Pos2::ZERO,
        }
    }

    /// Graph-space anchor where links attach to an output (right edge midpoint).
    pub fn output_link_point(&self, index: usize) -> Pos2 {
        match self.output_paint_rects.get(index) {
            Some(rect) => Pos2::new(rect.max.x, rect.center().y),
            None => Pos2::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_snaps_position() {
        let grid = Grid::new(10.0, 1000.0);
        let node = Node::new(NodeSpec::new("Test", [90, 120, 160]), Pos2::new(13.0, 27.0), &grid);
        assert_eq!(node.pos(), Pos2::new(10.0, 30.0));
    }

    #[test]
    fn test_port_lookup_by_name_and_position() {
        let grid = Grid::default();
        let spec = NodeSpec::new("Test", [0, 0, 0])
            .with_input(Port::execute("In"))
            .with_output(Port::execute("Out"));
        let mut node = Node::new(spec, Pos2::ZERO, &grid);
        node.set_input_paint_rect(0, Rect::from_min_size(Pos2::new(0.0, 20.0), Vec2::new(40.0, 20.0)));
        node.set_output_paint_rect(0, Rect::from_min_size(Pos2::new(100.0, 20.0), Vec2::new(40.0, 20.0)));

        assert_eq!(node.find_input("In"), Some(0));
        assert_eq!(node.find_output("Out"), Some(0));
        assert_eq!(node.find_input_at(Pos2::new(10.0, 30.0)), Some(0));
        assert_eq!(node.find_output_at(Pos2::new(110.0, 30.0)), Some(0));
        assert_eq!(node.find_input_at(Pos2::new(110.0, 30.0)), None);
        assert_eq!(node.input_link_point(0), Pos2::new(0.0, 30.0));
        assert_eq!(node.output_link_point(0), Pos2::new(140.0, 30.0));
    }
}
