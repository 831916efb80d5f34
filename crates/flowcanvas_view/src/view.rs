// SPDX-License-Identifier: MIT OR Apache-2.0
//! The canvas widget: owns the graph model, viewport, selection and the
//! active drag, and brokers every mutation through host callbacks.
//!
//! The widget is single threaded; all mutation happens synchronously on the
//! UI thread in response to input. Hosts observe changes through
//! [`CanvasHost`] notifications and never mutate the model directly.

use crate::doc::{GraphDoc, LoadReport};
use crate::formatter::{format_nodes, FormatSettings};
use crate::geometry::{Grid, Viewport, DELTA_ZOOM};
use crate::hit;
use crate::interaction::DragState;
use crate::link::Link;
use crate::model::GraphModel;
use crate::node::{Node, NodeId, NodeSpec};
use crate::painter::{
    Camera, DefaultGraphPainter, GraphPainter, PainterSettings, TextMetrics, UiTextMetrics,
};
use egui::{Pos2, Rect, Rounding, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default gap used when chain-inserting a node next to an existing one.
pub const DEFAULT_NODE_SPACING: f32 = 40.0;

const CONFIRM_REMOVE_SELECTION: &str = "Are you sure you want to remove the selection?";
const CONFIRM_FORMAT: &str = "Format selected nodes?";

/// An insertable node type offered by the host's quick-search catalog.
#[derive(Debug, Clone)]
pub struct QuickSearchOption {
    /// Displayed label.
    pub label: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Optional external help link.
    pub help_url: Option<String>,
    /// The node to create when picked.
    pub spec: NodeSpec,
}

/// Current selection. Node and link selection are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Nothing selected.
    #[default]
    None,
    /// One or more selected nodes.
    Nodes(Vec<NodeId>),
    /// A single selected link, by index.
    Link(usize),
}

impl Selection {
    /// Selected node IDs (empty for link/none selection).
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Selection::Nodes(nodes) => nodes,
            _ => &[],
        }
    }

    /// True when nothing is selected.
    pub fn is_none(&self) -> bool {
        matches!(self, Selection::None)
    }
}

/// Host collaborator: connection policy, quick-search catalog, confirmations
/// and change notifications. All calls are synchronous on the UI thread.
pub trait CanvasHost {
    /// Whether these two ports may be connected.
    fn can_create_link(
        &self,
        src_node: NodeId,
        src_output: &str,
        dst_node: NodeId,
        dst_input: &str,
    ) -> bool {
        let _ = (src_node, src_output, dst_node, dst_input);
        true
    }

    /// Node types offered at `pos`, optionally seeded by an origin port.
    fn quick_search_options(
        &mut self,
        pos: Pos2,
        origin: Option<(NodeId, usize)>,
    ) -> Vec<QuickSearchOption> {
        let _ = (pos, origin);
        Vec::new()
    }

    /// Let the user pick one of the offered options; `None` cancels.
    fn pick_quick_search_option(&mut self, options: &[QuickSearchOption]) -> Option<usize> {
        let _ = options;
        None
    }

    /// Blocking yes/no confirmation for destructive operations.
    fn confirm(&mut self, message: &str) -> bool {
        let _ = message;
        true
    }

    /// A node was removed (links referencing it are reported separately).
    fn on_node_removed(&mut self, node: &Node) {
        let _ = node;
    }

    /// A link was created.
    fn on_link_created(&mut self, link: &Link) {
        let _ = link;
    }

    /// A link was removed.
    fn on_link_removed(&mut self, link: &Link) {
        let _ = link;
    }

    /// The selection changed.
    fn on_selection_changed(&mut self, selection: &Selection) {
        let _ = selection;
    }

    /// The graph was modified; mark documents dirty, recompile, etc.
    fn on_modified(&mut self) {}

    /// Whether a dragged payload could drop at `pos`.
    fn accepts_drop(&self, payload: &str, pos: Pos2) -> bool {
        let _ = (payload, pos);
        false
    }

    /// Resolve a dropped payload into a node to insert at `pos`.
    fn resolve_drop(&mut self, payload: &str, pos: Pos2) -> Option<NodeSpec> {
        let _ = (payload, pos);
        None
    }
}

/// Structured canvas configuration, persisted with editor preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasSettings {
    /// Grid cell spacing (graph units).
    pub grid_spacing: f32,
    /// Half extent of the scrollable canvas (graph units).
    pub grid_half_extent: f32,
    /// Snap node positions to the grid.
    pub snap_to_grid: bool,
    /// Painter color scheme.
    pub painter: PainterSettings,
    /// Auto-layout tuning.
    pub format: FormatSettings,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            grid_spacing: 10.0,
            grid_half_extent: 8192.0,
            snap_to_grid: true,
            painter: PainterSettings::default(),
            format: FormatSettings::default(),
        }
    }
}

/// The node-graph canvas widget.
pub struct CanvasView {
    pub(crate) model: GraphModel,
    pub(crate) viewport: Viewport,
    pub(crate) grid: Grid,
    pub(crate) settings: CanvasSettings,
    pub(crate) painter: Box<dyn GraphPainter>,
    pub(crate) selection: Selection,
    pub(crate) drag: Option<DragState>,
    pub(crate) press: Option<PressState>,
    pub(crate) view_size: Vec2,
    pub(crate) has_focus: bool,
    pub(crate) enabled: bool,
    pub(crate) time: f64,
}

/// A pointer press that has not yet committed to a drag.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PressState {
    pub(crate) button: egui::PointerButton,
    pub(crate) pos: Pos2,
    pub(crate) intent: PressIntent,
    pub(crate) dragged: bool,
}

/// What the pointer went down on, resolved at press time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PressIntent {
    Scroll,
    Node(NodeId),
    Output(NodeId, usize),
    RewireInput(NodeId, usize),
    RubberBand,
    None,
}

impl Default for CanvasView {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasView {
    /// Canvas with the stock painter and default settings.
    pub fn new() -> Self {
        Self::with_painter(Box::new(DefaultGraphPainter::new()))
    }

    /// Canvas with a custom painter.
    pub fn with_painter(painter: Box<dyn GraphPainter>) -> Self {
        let settings = CanvasSettings::default();
        Self {
            model: GraphModel::new(),
            viewport: Viewport::new(),
            grid: Grid::new(settings.grid_spacing, settings.grid_half_extent),
            settings,
            painter,
            selection: Selection::None,
            drag: None,
            press: None,
            view_size: Vec2::new(800.0, 600.0),
            has_focus: false,
            enabled: true,
            time: 0.0,
        }
    }

    /// The graph model (read only; mutate through canvas operations).
    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    /// The scroll/zoom viewport.
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Mutable viewport access (programmatic scroll/zoom).
    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// The snapping grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Current settings.
    pub fn settings(&self) -> &CanvasSettings {
        &self.settings
    }

    /// Replace the settings, rebuilding the grid.
    pub fn set_settings(&mut self, settings: CanvasSettings) {
        self.grid = Grid::new(settings.grid_spacing, settings.grid_half_extent);
        self.settings = settings;
    }

    /// Current selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Whether a drag gesture is in flight.
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Whether the canvas accepts input and paints its content.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the canvas (e.g. while no document is open).
    ///
    /// Disabling terminates any live drag through its exit path.
    pub fn set_enabled(&mut self, host: &mut dyn CanvasHost, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        if !enabled {
            self.focus_lost(host);
        }
        self.enabled = enabled;
    }

    /// Replace the graph with a loaded document.
    pub fn load(&mut self, host: &mut dyn CanvasHost, doc: &GraphDoc) -> LoadReport {
        let (model, report) = doc.instantiate(&self.grid);
        self.model = model;
        self.drag = None;
        self.press = None;
        self.set_selection(host, Selection::None);
        self.refresh_sequences();
        tracing::info!(
            name = %doc.name,
            nodes = self.model.node_count(),
            links = self.model.links().len(),
            dropped = report.dropped_links.len(),
            "loaded graph"
        );
        report
    }

    /// Snapshot the graph into a document.
    pub fn to_doc(&self, name: impl Into<String>) -> GraphDoc {
        GraphDoc::from_model(name, &self.model)
    }

    /// Remove all nodes and links.
    pub fn clear(&mut self, host: &mut dyn CanvasHost) {
        self.model.clear();
        self.drag = None;
        self.press = None;
        self.set_selection(host, Selection::None);
    }

    /// Insert a node at a graph position (snapped to the grid).
    pub fn add_node(&mut self, host: &mut dyn CanvasHost, spec: NodeSpec, pos: Pos2) -> NodeId {
        let id = self.model.add_node(spec, pos, &self.grid);
        self.refresh_sequences();
        self.mark_modified(host);
        id
    }

    /// Insert a node, select it and scroll it into view.
    pub fn add_node_focused(
        &mut self,
        host: &mut dyn CanvasHost,
        spec: NodeSpec,
        pos: Pos2,
    ) -> NodeId {
        let id = self.add_node(host, spec, pos);
        self.select_node(host, id);
        if let Some(rect) = self.model.node(id).map(|node| node.paint_rect()) {
            self.scroll_to_fit(rect);
        }
        id
    }

    /// Remove a node, cascading its links.
    pub fn remove_node(&mut self, host: &mut dyn CanvasHost, id: NodeId) -> bool {
        let Some((node, links)) = self.model.remove_node(id) else {
            return false;
        };
        if !self.selection.is_none() {
            let remaining: Vec<NodeId> = self
                .selection
                .nodes()
                .iter()
                .copied()
                .filter(|selected| *selected != id)
                .collect();
            let next = if remaining.is_empty() {
                Selection::None
            } else {
                Selection::Nodes(remaining)
            };
            self.set_selection(host, next);
        }
        tracing::debug!(node = ?id, cascaded_links = links.len(), "removed node");
        for link in &links {
            host.on_link_removed(link);
        }
        host.on_node_removed(&node);
        self.refresh_sequences();
        self.mark_modified(host);
        true
    }

    /// Create a link after validating endpoints and asking the host.
    ///
    /// Duplicate links and rejected connections are no-ops, not errors.
    pub fn create_link(
        &mut self,
        host: &mut dyn CanvasHost,
        src_node: NodeId,
        src_output: &str,
        dst_node: NodeId,
        dst_input: &str,
    ) -> bool {
        if self
            .model
            .resolve_link(src_node, src_output, dst_node, dst_input)
            .is_err()
        {
            return false;
        }
        if self
            .model
            .find_link(src_node, src_output, dst_node, dst_input)
            .is_some()
        {
            return false;
        }
        if !host.can_create_link(src_node, src_output, dst_node, dst_input) {
            return false;
        }
        let index = self
            .model
            .add_link(Link::new(src_node, src_output, dst_node, dst_input));
        host.on_link_created(&self.model.links()[index]);
        self.refresh_sequences();
        self.mark_modified(host);
        true
    }

    /// Remove a link by index.
    pub fn remove_link(&mut self, host: &mut dyn CanvasHost, index: usize) -> bool {
        if matches!(self.selection, Selection::Link(_)) {
            self.set_selection(host, Selection::None);
        }
        let Some(link) = self.model.remove_link(index) else {
            return false;
        };
        host.on_link_removed(&link);
        self.refresh_sequences();
        self.mark_modified(host);
        true
    }

    /// Select a single node.
    pub fn select_node(&mut self, host: &mut dyn CanvasHost, id: NodeId) {
        if self.model.node(id).is_some() {
            self.set_selection(host, Selection::Nodes(vec![id]));
        }
    }

    /// Select a single link.
    pub fn select_link(&mut self, host: &mut dyn CanvasHost, index: usize) {
        if index < self.model.links().len() {
            self.set_selection(host, Selection::Link(index));
        }
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self, host: &mut dyn CanvasHost) {
        self.set_selection(host, Selection::None);
    }

    /// Select a node and scroll it into the center of the view.
    pub fn select_and_focus_node(&mut self, host: &mut dyn CanvasHost, id: NodeId) {
        let Some(center) = self.model.node(id).map(|node| node.paint_rect().center()) else {
            return;
        };
        self.select_node(host, id);
        self.center_on(center);
    }

    /// Remove whatever is selected, after host confirmation.
    pub fn remove_selection(&mut self, host: &mut dyn CanvasHost) {
        match self.selection.clone() {
            Selection::Nodes(nodes) => {
                if !host.confirm(CONFIRM_REMOVE_SELECTION) {
                    return;
                }
                for id in nodes {
                    self.remove_node(host, id);
                }
            }
            Selection::Link(index) => {
                if !host.confirm(CONFIRM_REMOVE_SELECTION) {
                    return;
                }
                self.remove_link(host, index);
            }
            Selection::None => {}
        }
    }

    /// Auto-layout the selected nodes, after host confirmation.
    pub fn format_selection(&mut self, host: &mut dyn CanvasHost) {
        let nodes: HashSet<NodeId> = self.selection.nodes().iter().copied().collect();
        if nodes.is_empty() {
            return;
        }
        if !host.confirm(CONFIRM_FORMAT) {
            return;
        }
        let positions = format_nodes(&self.model, &nodes, &self.grid, &self.settings.format);
        if positions.is_empty() {
            return;
        }
        for (id, pos) in &positions {
            if let Some(node) = self.model.node_mut(*id) {
                node.set_pos(*pos, &self.grid, false);
            }
        }
        self.mark_modified(host);
    }

    /// Scroll so that `pos` (graph space) lands at the view center.
    pub fn center_on(&mut self, pos: Pos2) {
        let offset = pos.to_vec2() * self.viewport.zoom() - self.view_size * 0.5;
        self.viewport.scroll_offset = Vec2::new(
            offset.x.clamp(self.grid.bounds.min.x, self.grid.bounds.max.x),
            offset.y.clamp(self.grid.bounds.min.y, self.grid.bounds.max.y),
        );
    }

    /// Scroll the minimum amount that brings `rect` (graph space) fully into
    /// view; no-op when it is already visible.
    pub fn scroll_to_fit(&mut self, rect: Rect) {
        let view = Rect::from_min_size(Pos2::ZERO, self.view_size);
        let client = self.viewport.graph_to_client_rect(rect);
        let mut delta = Vec2::ZERO;
        if client.max.x > view.max.x {
            delta.x = view.max.x - client.max.x;
        }
        if client.min.x < view.min.x {
            delta.x = view.min.x - client.min.x;
        }
        if client.max.y > view.max.y {
            delta.y = view.max.y - client.max.y;
        }
        if client.min.y < view.min.y {
            delta.y = view.min.y - client.min.y;
        }
        if delta != Vec2::ZERO {
            self.viewport.scroll(delta, &self.grid);
        }
    }

    /// Whether a drag payload may drop at the given graph position.
    pub fn drag_over(&self, host: &dyn CanvasHost, payload: &str, pos: Pos2) -> bool {
        host.accepts_drop(payload, pos)
    }

    /// Drop an external payload, inserting whatever node the host resolves.
    pub fn drop_payload(
        &mut self,
        host: &mut dyn CanvasHost,
        payload: &str,
        pos: Pos2,
    ) -> Option<NodeId> {
        let spec = host.resolve_drop(payload, pos)?;
        Some(self.add_node(host, spec, pos))
    }

    /// Open quick search at `pos`, optionally seeded by an origin output and
    /// filtered by a typed character; creates and auto-wires the picked node.
    pub fn quick_search_insert(
        &mut self,
        host: &mut dyn CanvasHost,
        pos: Pos2,
        origin: Option<(NodeId, usize)>,
        filter: Option<char>,
    ) -> Option<NodeId> {
        let mut options = host.quick_search_options(pos, origin);
        if let Some(ch) = filter {
            let ch = ch.to_ascii_lowercase();
            options.retain(|option| {
                option
                    .label
                    .chars()
                    .next()
                    .is_some_and(|first| first.to_ascii_lowercase() == ch)
            });
        }
        if options.is_empty() {
            return None;
        }
        let index = host.pick_quick_search_option(&options)?;
        let option = options.get(index)?.clone();
        let id = self.add_node(host, option.spec, pos);
        if let Some((src_node, src_output)) = origin {
            self.auto_wire(host, src_node, src_output, id);
        }
        Some(id)
    }

    /// Wire a freshly inserted node to the originating output: execution
    /// outputs take the first execution input, data outputs the first input
    /// of the same type. No compatible input is a quiet no-op.
    pub(crate) fn auto_wire(
        &mut self,
        host: &mut dyn CanvasHost,
        src_node: NodeId,
        src_output: usize,
        new_node: NodeId,
    ) {
        let Some((src_name, src_execute, src_type)) = self.model.node(src_node).and_then(|node| {
            node.outputs
                .get(src_output)
                .map(|port| (port.name.clone(), port.flags.execute, port.type_id))
        }) else {
            return;
        };
        let Some(dst_name) = self.model.node(new_node).and_then(|node| {
            node.inputs
                .iter()
                .find(|input| {
                    if src_execute {
                        input.flags.execute
                    } else {
                        input.type_id == src_type
                    }
                })
                .map(|input| input.name.clone())
        }) else {
            return;
        };
        self.create_link(host, src_node, &src_name, new_node, &dst_name);
    }

    /// Re-derive node enable state from sequence reachability.
    ///
    /// Graphs that use no sequence-start outputs keep every node enabled.
    pub(crate) fn refresh_sequences(&mut self) {
        let uses_sequences = self
            .model
            .nodes()
            .any(|node| node.outputs.iter().any(|output| output.flags.begin_sequence));
        if !uses_sequences {
            for node in self.model.nodes_mut() {
                node.enabled = true;
            }
            return;
        }
        let active = self.model.sequence_nodes();
        for node in self.model.nodes_mut() {
            node.enabled = active.contains(&node.id);
        }
    }

    pub(crate) fn mark_modified(&mut self, host: &mut dyn CanvasHost) {
        host.on_modified();
    }

    pub(crate) fn set_selection(&mut self, host: &mut dyn CanvasHost, selection: Selection) {
        if selection == self.selection {
            return;
        }
        for node in self.model.nodes_mut() {
            node.selected = false;
        }
        for link in self.model.links_mut() {
            link.selected = false;
        }
        match &selection {
            Selection::Nodes(nodes) => {
                for id in nodes {
                    if let Some(node) = self.model.node_mut(*id) {
                        node.selected = true;
                    }
                }
            }
            Selection::Link(index) => {
                if let Some(link) = self.model.links_mut().get_mut(*index) {
                    link.selected = true;
                }
            }
            Selection::None => {}
        }
        self.selection = selection;
        host.on_selection_changed(&self.selection);
    }

    /// Recompute node and link paint geometry. Must run before hit tests.
    pub fn refresh_layout(&mut self, metrics: &dyn TextMetrics) {
        let painter = &*self.painter;
        for node in self.model.nodes_mut() {
            painter.update_node_layout(metrics, &self.grid, node);
        }
        let mut bounds = Vec::with_capacity(self.model.links().len());
        for link in self.model.links() {
            let rect = hit::link_anchors(&self.model, link).map(|(start, end)| {
                let points = crate::painter::link_control_points(start, end);
                crate::painter::link_bounds(&points, crate::painter::LINK_WIDTH)
            });
            bounds.push(rect.unwrap_or(Rect::ZERO));
        }
        for (link, rect) in self.model.links_mut().iter_mut().zip(bounds) {
            link.paint_rect = rect;
        }
    }

    /// Whether the idle timer should keep repainting: focus, an active drag
    /// or a live selection (the selection pulse animates).
    pub fn wants_repaint(&self) -> bool {
        self.has_focus || self.drag.is_some() || !self.selection.is_none()
    }

    /// Render the canvas into the available space and process input.
    pub fn show(&mut self, ui: &mut egui::Ui, host: &mut dyn CanvasHost) -> egui::Response {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        self.view_size = rect.size();
        self.time = ui.input(|input| input.time);
        let origin = rect.min;

        if !self.enabled {
            let paint = ui.painter_at(rect);
            paint.rect_filled(rect, Rounding::ZERO, self.painter.background_color());
            return response;
        }

        if response.drag_started() || response.clicked() {
            response.request_focus();
        }
        self.has_focus = response.has_focus();

        let events = ui.input(|input| input.events.clone());
        for event in events {
            match event {
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    ..
                } => {
                    let local = pos - origin.to_vec2();
                    if pressed {
                        if rect.contains(pos) {
                            self.pointer_pressed(button, local);
                        }
                    } else {
                        self.pointer_released(host, button, local);
                    }
                }
                egui::Event::PointerMoved(pos) => {
                    self.pointer_moved(host, pos - origin.to_vec2());
                }
                egui::Event::Key {
                    key,
                    pressed: true,
                    modifiers,
                    ..
                } if self.has_focus => {
                    self.on_key(host, key, modifiers);
                }
                _ => {}
            }
        }

        if let Some(hover) = response.hover_pos() {
            let scroll = ui.input(|input| input.smooth_scroll_delta.y);
            if scroll != 0.0 {
                let zoom = self.viewport.zoom() + scroll * DELTA_ZOOM;
                self.viewport.zoom_at(hover - origin.to_vec2(), zoom);
            }
        }

        if self.drag.is_some() && !ui.input(|input| input.focused) {
            self.focus_lost(host);
        }

        let paint = ui.painter_at(rect);
        paint.rect_filled(rect, Rounding::ZERO, self.painter.background_color());
        let camera = Camera::new(self.viewport, origin);
        let metrics = UiTextMetrics::new(ui.ctx());
        self.refresh_layout(&metrics);

        let painter = &*self.painter;
        painter.paint_grid(&paint, &camera, &self.grid);

        let mut link_rects = Vec::with_capacity(self.model.links().len());
        for link in self.model.links() {
            let Some((start, end)) = hit::link_anchors(&self.model, link) else {
                link_rects.push(Rect::ZERO);
                continue;
            };
            let color = self
                .model
                .node(link.src_node)
                .and_then(|node| {
                    node.find_output(&link.src_output)
                        .map(|index| node.outputs[index].color)
                })
                .map_or(egui::Color32::WHITE, |[r, g, b]| {
                    egui::Color32::from_rgb(r, g, b)
                });
            link_rects.push(painter.paint_link(
                &paint,
                &camera,
                start,
                end,
                color,
                link.selected,
                self.time,
                1.0,
            ));
        }
        for (link, rect) in self.model.links_mut().iter_mut().zip(link_rects) {
            link.paint_rect = rect;
        }

        if let Some(drag) = &self.drag {
            drag.paint(&paint, &camera, self);
        }

        for node in self.model.nodes().rev() {
            self.painter
                .paint_node(&paint, &camera, &metrics, node, self.time);
        }

        if self.wants_repaint() {
            ui.ctx().request_repaint_after(std::time::Duration::from_millis(33));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::painter::MonoTextMetrics;
    use crate::port::Port;

    struct QuietHost {
        drop_spec: Option<NodeSpec>,
    }

    impl CanvasHost for QuietHost {
        fn accepts_drop(&self, _payload: &str, _pos: Pos2) -> bool {
            self.drop_spec.is_some()
        }

        fn resolve_drop(&mut self, _payload: &str, _pos: Pos2) -> Option<NodeSpec> {
            self.drop_spec.clone()
        }
    }

    fn quiet() -> QuietHost {
        QuietHost { drop_spec: None }
    }

    #[test]
    fn test_document_round_trip_through_view() {
        let mut host = quiet();
        let mut view = CanvasView::new();
        let a = view.add_node(
            &mut host,
            NodeSpec::new("A", [90, 120, 160]).with_output(Port::execute("Out")),
            Pos2::new(20.0, 40.0),
        );
        let b = view.add_node(
            &mut host,
            NodeSpec::new("B", [90, 120, 160]).with_input(Port::execute("In")),
            Pos2::new(300.0, 40.0),
        );
        view.create_link(&mut host, a, "Out", b, "In");

        let doc = view.to_doc("graph");
        let mut restored = CanvasView::new();
        let report = restored.load(&mut host, &doc);
        assert!(report.is_clean());
        assert_eq!(restored.model().node_count(), 2);
        assert!(restored.model().find_link(a, "Out", b, "In").is_some());
    }

    #[test]
    fn test_center_on_and_scroll_to_fit() {
        let mut view = CanvasView::new();
        view.view_size = Vec2::new(800.0, 600.0);
        view.center_on(Pos2::new(1000.0, 1000.0));
        assert_eq!(view.viewport().scroll_offset, Vec2::new(600.0, 700.0));

        // Already-visible rects do not move the viewport.
        let offset = view.viewport().scroll_offset;
        view.scroll_to_fit(Rect::from_min_size(
            Pos2::new(1000.0, 1000.0),
            Vec2::new(50.0, 50.0),
        ));
        assert_eq!(view.viewport().scroll_offset, offset);

        view.scroll_to_fit(Rect::from_min_size(Pos2::ZERO, Vec2::new(50.0, 50.0)));
        assert_eq!(view.viewport().scroll_offset, Vec2::ZERO);
    }

    #[test]
    fn test_drop_payload_inserts_host_resolved_node() {
        let mut host = QuietHost {
            drop_spec: Some(NodeSpec::new("Dropped", [120, 90, 160])),
        };
        let mut view = CanvasView::new();
        assert!(view.drag_over(&host, "asset:thing", Pos2::new(50.0, 50.0)));
        let id = view
            .drop_payload(&mut host, "asset:thing", Pos2::new(52.0, 47.0))
            .unwrap();
        let node = view.model().node(id).unwrap();
        assert_eq!(node.name, "Dropped");
        assert_eq!(node.pos(), Pos2::new(50.0, 50.0));
    }

    #[test]
    fn test_sequence_state_dims_unreachable_nodes() {
        let mut host = quiet();
        let mut view = CanvasView::new();
        let entry = view.add_node(
            &mut host,
            NodeSpec::new("Entry", [0, 0, 0]).with_output(Port::begin_sequence("Start")),
            Pos2::ZERO,
        );
        let step = view.add_node(
            &mut host,
            NodeSpec::new("Step", [0, 0, 0])
                .with_input(Port::execute("In"))
                .with_output(Port::execute("Out")),
            Pos2::new(300.0, 0.0),
        );
        assert!(!view.model().node(step).unwrap().enabled);

        view.create_link(&mut host, entry, "Start", step, "In");
        assert!(view.model().node(step).unwrap().enabled);

        view.refresh_layout(&MonoTextMetrics::default());
        let links: Vec<usize> = view.model().links_to(step, "In");
        assert_eq!(links.len(), 1);
        view.remove_link(&mut host, links[0]);
        assert!(!view.model().node(step).unwrap().enabled);
    }

    #[test]
    fn test_disabled_canvas_ignores_input_and_exits_drag() {
        let mut host = quiet();
        let mut view = CanvasView::new();
        let a = view.add_node(
            &mut host,
            NodeSpec::new("A", [90, 120, 160]).with_output(Port::execute("Out")),
            Pos2::ZERO,
        );
        view.refresh_layout(&MonoTextMetrics::default());
        let from = view.model().node(a).unwrap().output_paint_rect(0).center();
        view.pointer_pressed(egui::PointerButton::Primary, from);
        view.pointer_moved(&mut host, from + Vec2::splat(20.0));
        assert!(view.is_dragging());

        view.set_enabled(&mut host, false);
        assert!(!view.is_dragging());
        view.pointer_pressed(egui::PointerButton::Primary, from);
        view.pointer_moved(&mut host, from + Vec2::splat(20.0));
        assert!(!view.is_dragging());

        view.set_enabled(&mut host, true);
        view.pointer_pressed(egui::PointerButton::Primary, from);
        view.pointer_moved(&mut host, from + Vec2::splat(20.0));
        assert!(view.is_dragging());
        view.focus_lost(&mut host);
    }

    #[test]
    fn test_set_settings_rebuilds_grid() {
        let mut view = CanvasView::new();
        let settings = CanvasSettings {
            grid_spacing: 25.0,
            grid_half_extent: 1000.0,
            ..CanvasSettings::default()
        };
        view.set_settings(settings);
        assert_eq!(view.grid().spacing, Vec2::splat(25.0));
        assert_eq!(view.grid().bounds.max, Pos2::new(1000.0, 1000.0));
        assert_eq!(view.grid().snap_pos(Pos2::new(30.0, 30.0)), Pos2::new(25.0, 25.0));
    }
}
