// SPDX-License-Identifier: MIT OR Apache-2.0
//! Auto-layout: repositions nodes along detected execution/data flow.
//!
//! Entry nodes (no incoming execution link, at least one sequence-start
//! output in use) seed a forward walk along execution links; each node's
//! pull-flagged data sources are placed to its immediate left before the
//! node itself is placed. Layout is best effort: nodes unreachable from any
//! entry are left untouched, and link topology is never mutated.

use crate::geometry::Grid;
use crate::model::GraphModel;
use crate::node::NodeId;
use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Formatter tuning, persisted with the editor's preferences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FormatSettings {
    /// Horizontal gap between a node and its successors/sources.
    pub horz_spacing: f32,
    /// Vertical gap between stacked siblings and collision-shifted nodes.
    pub vert_spacing: f32,
    /// Snap formatted positions to the grid.
    pub snap_to_grid: bool,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            horz_spacing: 40.0,
            vert_spacing: 10.0,
            snap_to_grid: true,
        }
    }
}

struct LinkInfo {
    src: NodeId,
    dst: NodeId,
    execution: bool,
    pull: bool,
    begin_sequence: bool,
}

struct Formatter<'a> {
    settings: &'a FormatSettings,
    grid: &'a Grid,
    links: Vec<LinkInfo>,
    sizes: HashMap<NodeId, Vec2>,
    pending: HashSet<NodeId>,
    visiting: HashSet<NodeId>,
    placed: Vec<Rect>,
    formatted: HashMap<NodeId, Pos2>,
}

/// Arrange the given nodes. Returns the new position of every node the walk
/// reached; the caller applies them (and decides whether that counts as a
/// modification).
pub fn format_nodes(
    model: &GraphModel,
    nodes: &HashSet<NodeId>,
    grid: &Grid,
    settings: &FormatSettings,
) -> HashMap<NodeId, Pos2> {
    let links: Vec<LinkInfo> = model
        .links()
        .iter()
        .filter_map(|link| {
            let src = model.node(link.src_node)?;
            let flags = src.outputs[src.find_output(&link.src_output)?].flags;
            Some(LinkInfo {
                src: link.src_node,
                dst: link.dst_node,
                execution: flags.execute,
                pull: flags.pull && !flags.execute,
                begin_sequence: flags.begin_sequence,
            })
        })
        .collect();

    let mut formatter = Formatter {
        settings,
        grid,
        links,
        sizes: model
            .nodes()
            .map(|node| (node.id, node.paint_rect().size()))
            .collect(),
        pending: nodes.clone(),
        visiting: HashSet::new(),
        placed: Vec::new(),
        formatted: HashMap::new(),
    };

    let entries: Vec<(NodeId, Pos2)> = model
        .nodes()
        .filter(|node| nodes.contains(&node.id))
        .filter(|node| formatter.is_entry(node.id))
        .map(|node| (node.id, node.pos()))
        .collect();
    for (entry, pos) in entries {
        formatter.visit(entry, pos);
    }
    formatter.formatted
}

impl Formatter<'_> {
    fn is_entry(&self, id: NodeId) -> bool {
        let has_incoming_execution = self
            .links
            .iter()
            .any(|link| link.dst == id && link.execution);
        let starts_sequence = self
            .links
            .iter()
            .any(|link| link.src == id && link.begin_sequence);
        !has_incoming_execution && starts_sequence
    }

    /// Place `id` at or below `candidate`, then lay out its pull sources and
    /// execution successors. Returns the placed rect, or `None` when the
    /// node was outside the requested set or already handled.
    fn visit(&mut self, id: NodeId, candidate: Pos2) -> Option<Rect> {
        if !self.pending.contains(&id) || self.formatted.contains_key(&id) {
            return None;
        }
        let size = *self.sizes.get(&id)?;
        // Guards against link cycles: a node already on the visit stack must
        // not be re-entered through its own pull sources.
        if !self.visiting.insert(id) {
            return None;
        }

        // Data sources feeding this node sit to its immediate left.
        let pull_sources: Vec<NodeId> = self
            .links
            .iter()
            .filter(|link| link.dst == id && link.pull)
            .map(|link| link.src)
            .collect();
        for src in pull_sources {
            if let Some(src_size) = self.sizes.get(&src).copied() {
                let src_candidate = Pos2::new(
                    candidate.x - self.settings.horz_spacing - src_size.x,
                    candidate.y,
                );
                self.visit(src, src_candidate);
            }
        }

        let rect = self.place(id, candidate, size);

        let successors: Vec<NodeId> = self
            .links
            .iter()
            .filter(|link| link.src == id && link.execution)
            .map(|link| link.dst)
            .collect();
        let mut next = Pos2::new(rect.max.x + self.settings.horz_spacing, rect.min.y);
        for dst in successors {
            if let Some(placed) = self.visit(dst, next) {
                next.y = placed.max.y + self.settings.vert_spacing;
            }
        }
        Some(rect)
    }

    /// Resolve collisions by shifting the candidate below whichever placed
    /// rect it hits, one collider at a time, until it fits.
    fn place(&mut self, id: NodeId, candidate: Pos2, size: Vec2) -> Rect {
        let mut pos = if self.settings.snap_to_grid {
            self.grid.snap_pos(candidate)
        } else {
            candidate
        };
        let mut rect = Rect::from_min_size(pos, size);
        loop {
            let collider = self.placed.iter().find(|placed| placed.intersects(rect));
            match collider {
                Some(collider) => {
                    pos.y = collider.max.y + self.settings.vert_spacing;
                    if self.settings.snap_to_grid {
                        pos = self.grid.snap_pos(pos);
                        if pos.y <= rect.min.y {
                            pos.y += self.grid.spacing.y;
                        }
                    }
                    rect = Rect::from_min_size(pos, size);
                }
                None => break,
            }
        }
        self.placed.push(rect);
        self.formatted.insert(id, rect.min);
        rect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Link;
    use crate::node::NodeSpec;
    use crate::painter::{DefaultGraphPainter, GraphPainter, MonoTextMetrics};
    use crate::port::Port;

    fn layout_all(model: &mut GraphModel, grid: &Grid) {
        let painter = DefaultGraphPainter::new();
        let metrics = MonoTextMetrics::default();
        for node in model.nodes_mut() {
            painter.update_node_layout(&metrics, grid, node);
        }
    }

    fn apply(model: &mut GraphModel, positions: &HashMap<NodeId, Pos2>, grid: &Grid) {
        for (id, pos) in positions {
            if let Some(node) = model.node_mut(*id) {
                node.set_pos(*pos, grid, false);
            }
        }
    }

    #[test]
    fn test_linear_chain_left_to_right_without_overlap() {
        let grid = Grid::default();
        let mut model = GraphModel::new();
        let entry = model.add_node(
            NodeSpec::new("Entry", [0, 0, 0]).with_output(Port::begin_sequence("Start")),
            Pos2::new(0.0, 0.0),
            &grid,
        );
        let mut chain = vec![entry];
        for index in 0..4 {
            let id = model.add_node(
                NodeSpec::new(format!("Step {index}"), [0, 0, 0])
                    .with_input(Port::execute("In"))
                    .with_output(Port::execute("Out")),
                Pos2::new(0.0, 0.0),
                &grid,
            );
            chain.push(id);
        }
        for pair in chain.windows(2) {
            let output = if pair[0] == entry { "Start" } else { "Out" };
            model.add_link(Link::new(pair[0], output, pair[1], "In"));
        }
        layout_all(&mut model, &grid);

        let all: HashSet<NodeId> = model.nodes().map(|n| n.id).collect();
        let positions = format_nodes(&model, &all, &grid, &FormatSettings::default());
        assert_eq!(positions.len(), chain.len());
        apply(&mut model, &positions, &grid);
        layout_all(&mut model, &grid);

        for pair in chain.windows(2) {
            let left = model.node(pair[0]).unwrap().pos().x;
            let right = model.node(pair[1]).unwrap().pos().x;
            assert!(right > left, "chain must advance left to right");
        }
        let rects: Vec<Rect> = model.nodes().map(|n| n.paint_rect()).collect();
        for (i, a) in rects.iter().enumerate() {
            for b in rects.iter().skip(i + 1) {
                assert!(!a.intersects(*b), "formatted nodes must not overlap");
            }
        }
    }

    #[test]
    fn test_pull_source_placed_left_of_consumer() {
        let grid = Grid::default();
        let mut model = GraphModel::new();
        let type_id = crate::port::PortTypeId::new();
        let entry = model.add_node(
            NodeSpec::new("Entry", [0, 0, 0]).with_output(Port::begin_sequence("Start")),
            Pos2::new(0.0, 0.0),
            &grid,
        );
        let consumer = model.add_node(
            NodeSpec::new("Consumer", [0, 0, 0])
                .with_input(Port::execute("In"))
                .with_input(Port::data("Value", type_id, [120, 200, 120])),
            Pos2::new(0.0, 0.0),
            &grid,
        );
        let source = model.add_node(
            NodeSpec::new("Source", [0, 0, 0])
                .with_output(Port::data("Value", type_id, [120, 200, 120]).with_pull()),
            Pos2::new(500.0, 500.0),
            &grid,
        );
        model.add_link(Link::new(entry, "Start", consumer, "In"));
        model.add_link(Link::new(source, "Value", consumer, "Value"));
        layout_all(&mut model, &grid);

        let all: HashSet<NodeId> = model.nodes().map(|n| n.id).collect();
        let positions = format_nodes(&model, &all, &grid, &FormatSettings::default());
        let source_pos = positions[&source];
        let consumer_pos = positions[&consumer];
        assert!(source_pos.x < consumer_pos.x);
    }

    #[test]
    fn test_cyclic_pull_links_terminate() {
        let grid = Grid::default();
        let mut model = GraphModel::new();
        let type_id = crate::port::PortTypeId::new();
        let data_out = || Port::data("Value", type_id, [120, 200, 120]).with_pull();
        let entry = model.add_node(
            NodeSpec::new("Entry", [0, 0, 0]).with_output(Port::begin_sequence("Start")),
            Pos2::new(0.0, 0.0),
            &grid,
        );
        let consumer = model.add_node(
            NodeSpec::new("Consumer", [0, 0, 0])
                .with_input(Port::execute("In"))
                .with_input(Port::data("Value", type_id, [120, 200, 120])),
            Pos2::new(0.0, 0.0),
            &grid,
        );
        let x = model.add_node(
            NodeSpec::new("X", [0, 0, 0])
                .with_input(Port::data("Loop", type_id, [120, 200, 120]))
                .with_output(data_out()),
            Pos2::new(400.0, 0.0),
            &grid,
        );
        let y = model.add_node(
            NodeSpec::new("Y", [0, 0, 0])
                .with_input(Port::data("Loop", type_id, [120, 200, 120]))
                .with_output(data_out()),
            Pos2::new(400.0, 200.0),
            &grid,
        );
        model.add_link(Link::new(entry, "Start", consumer, "In"));
        model.add_link(Link::new(x, "Value", consumer, "Value"));
        // Mutual pull links: X and Y feed each other.
        model.add_link(Link::new(y, "Value", x, "Loop"));
        model.add_link(Link::new(x, "Value", y, "Loop"));
        layout_all(&mut model, &grid);

        let all: HashSet<NodeId> = model.nodes().map(|n| n.id).collect();
        let positions = format_nodes(&model, &all, &grid, &FormatSettings::default());
        assert_eq!(positions.len(), 4);
        assert!(positions[&x].x < positions[&consumer].x);
    }

    #[test]
    fn test_unreachable_node_left_untouched() {
        let grid = Grid::default();
        let mut model = GraphModel::new();
        let entry = model.add_node(
            NodeSpec::new("Entry", [0, 0, 0]).with_output(Port::begin_sequence("Start")),
            Pos2::new(0.0, 0.0),
            &grid,
        );
        let next = model.add_node(
            NodeSpec::new("Next", [0, 0, 0]).with_input(Port::execute("In")),
            Pos2::new(0.0, 200.0),
            &grid,
        );
        let island = model.add_node(
            NodeSpec::new("Island", [0, 0, 0]).with_input(Port::execute("In")),
            Pos2::new(700.0, 700.0),
            &grid,
        );
        model.add_link(Link::new(entry, "Start", next, "In"));
        layout_all(&mut model, &grid);

        let all: HashSet<NodeId> = model.nodes().map(|n| n.id).collect();
        let positions = format_nodes(&model, &all, &grid, &FormatSettings::default());
        assert!(positions.contains_key(&entry));
        assert!(positions.contains_key(&next));
        assert!(!positions.contains_key(&island));
    }
}
