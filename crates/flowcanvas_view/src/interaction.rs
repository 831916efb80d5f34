// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pointer and keyboard interaction: the drag state machine.
//!
//! A pointer press classifies its target but commits to nothing; once the
//! pointer travels past a small threshold the press becomes one of four
//! modal drags (pan, move-selection, create-link, rubber-band). A press that
//! never travels is a click and resolves to plain selection on release.
//! Only one drag exists at a time; focus loss forces the drag's exit path.

use crate::hit::{self, HitTarget};
use crate::node::NodeId;
use crate::painter::Camera;
use crate::view::{CanvasView, PressIntent, PressState, Selection, DEFAULT_NODE_SPACING};
use egui::{Key, Modifiers, PointerButton, Pos2, Rect};

const DRAG_THRESHOLD: f32 = 3.0;

/// The active modal drag.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DragState {
    /// Pan the viewport with the pointer.
    Scroll { prev: Pos2 },
    /// Move every selected node by the pointer delta; snapping is deferred
    /// to drag end so motion stays smooth.
    MoveSelection { prev: Pos2 },
    /// Drag a new link out of an output port.
    CreateLink {
        src_node: NodeId,
        src_output: usize,
        end: Pos2,
    },
    /// Grow a rubber-band rect, continuously re-selecting what it touches.
    RubberBand { start: Pos2, end: Pos2 },
}

impl DragState {
    /// Draw the drag's in-progress visual (pending link or selection rect).
    pub(crate) fn paint(&self, paint: &egui::Painter, camera: &Camera, view: &CanvasView) {
        match self {
            DragState::CreateLink {
                src_node,
                src_output,
                end,
            } => {
                let Some(node) = view.model.node(*src_node) else {
                    return;
                };
                let start = node.output_link_point(*src_output);
                let color = node
                    .outputs
                    .get(*src_output)
                    .map_or(egui::Color32::WHITE, |port| {
                        let [r, g, b] = port.color;
                        egui::Color32::from_rgb(r, g, b)
                    });
                view.painter
                    .paint_link(paint, camera, start, *end, color, false, view.time, 1.0);
            }
            DragState::RubberBand { start, end } => {
                view.painter
                    .paint_selection_rect(paint, camera, Rect::from_two_pos(*start, *end));
            }
            DragState::Scroll { .. } | DragState::MoveSelection { .. } => {}
        }
    }
}

impl CanvasView {
    /// Handle a pointer press at a client position.
    pub fn pointer_pressed(&mut self, button: PointerButton, pos: Pos2) {
        if !self.enabled || self.drag.is_some() || self.press.is_some() {
            return;
        }
        let graph = self.viewport.client_to_graph(pos);
        let intent = match button {
            PointerButton::Middle | PointerButton::Secondary => PressIntent::Scroll,
            PointerButton::Primary => match hit::hit_test(&self.model, graph) {
                Some(HitTarget::Output(id, index)) => PressIntent::Output(id, index),
                Some(HitTarget::Input(id, index)) => {
                    let incoming = self
                        .model
                        .node(id)
                        .and_then(|node| node.inputs.get(index))
                        .map(|input| self.model.links_to(id, &input.name).len())
                        .unwrap_or(0);
                    if incoming == 1 {
                        PressIntent::RewireInput(id, index)
                    } else {
                        PressIntent::None
                    }
                }
                Some(HitTarget::NodeBody(id)) => PressIntent::Node(id),
                Some(HitTarget::Link(_)) | None => PressIntent::RubberBand,
            },
            _ => PressIntent::None,
        };
        self.press = Some(PressState {
            button,
            pos,
            intent,
            dragged: false,
        });
    }

    /// Handle pointer motion at a client position.
    pub fn pointer_moved(&mut self, host: &mut dyn crate::view::CanvasHost, pos: Pos2) {
        if let Some(press) = &mut self.press {
            if !press.dragged && (pos - press.pos).length() > DRAG_THRESHOLD {
                press.dragged = true;
                let press = *press;
                self.begin_drag(host, press);
            }
        }
        let Some(mut drag) = self.drag.take() else {
            return;
        };
        match &mut drag {
            DragState::Scroll { prev } => {
                let delta = pos - *prev;
                self.viewport.scroll(delta, &self.grid);
                *prev = pos;
            }
            DragState::MoveSelection { prev } => {
                let delta = self.viewport.client_to_graph_vec(pos - *prev);
                let selected = self.selection.nodes().to_vec();
                for id in selected {
                    if let Some(node) = self.model.node_mut(id) {
                        let target = node.pos() + delta;
                        node.set_pos(target, &self.grid, false);
                    }
                }
                *prev = pos;
            }
            DragState::CreateLink { end, .. } => {
                *end = self.viewport.client_to_graph(pos);
            }
            DragState::RubberBand { start, end } => {
                *end = self.viewport.client_to_graph(pos);
                let rect = Rect::from_two_pos(*start, *end);
                let touched: Vec<NodeId> = self
                    .model
                    .nodes()
                    .filter(|node| rect.intersects(node.paint_rect()))
                    .map(|node| node.id)
                    .collect();
                let selection = if touched.is_empty() {
                    Selection::None
                } else {
                    Selection::Nodes(touched)
                };
                self.set_selection(host, selection);
            }
        }
        self.drag = Some(drag);
    }

    /// Handle a pointer release at a client position.
    pub fn pointer_released(
        &mut self,
        host: &mut dyn crate::view::CanvasHost,
        button: PointerButton,
        pos: Pos2,
    ) {
        let Some(press) = self.press else {
            return;
        };
        if press.button != button {
            return;
        }
        self.press = None;
        let graph = self.viewport.client_to_graph(pos);
        if let Some(drag) = self.drag.take() {
            self.exit_drag(host, drag, graph, false);
        } else if !press.dragged && button == PointerButton::Primary {
            self.click_select(host, graph);
        }
    }

    /// Losing input focus terminates the drag through its exit path; a move
    /// still snaps, an in-flight link is abandoned.
    pub fn focus_lost(&mut self, host: &mut dyn crate::view::CanvasHost) {
        self.press = None;
        self.has_focus = false;
        if let Some(drag) = self.drag.take() {
            let pos = match drag {
                DragState::CreateLink { end, .. } => end,
                DragState::RubberBand { end, .. } => end,
                _ => Pos2::ZERO,
            };
            self.exit_drag(host, drag, pos, true);
        }
    }

    /// Handle a key press.
    pub fn on_key(&mut self, host: &mut dyn crate::view::CanvasHost, key: Key, modifiers: Modifiers) {
        if !self.enabled || self.drag.is_some() {
            return;
        }
        match key {
            Key::Delete => self.remove_selection(host),
            Key::F if modifiers.command => self.format_selection(host),
            _ => {
                if modifiers.any() {
                    return;
                }
                let name = key.name();
                let mut chars = name.chars();
                if let (Some(ch), None) = (chars.next(), chars.next()) {
                    if ch.is_ascii_alphanumeric() {
                        self.chain_insert(host, ch);
                    }
                }
            }
        }
    }

    fn begin_drag(&mut self, host: &mut dyn crate::view::CanvasHost, press: PressState) {
        let graph = self.viewport.client_to_graph(press.pos);
        self.drag = match press.intent {
            PressIntent::Scroll => Some(DragState::Scroll { prev: press.pos }),
            PressIntent::Node(id) => {
                if self.selection.nodes().len() < 2 {
                    self.set_selection(host, Selection::Nodes(vec![id]));
                }
                Some(DragState::MoveSelection { prev: press.pos })
            }
            PressIntent::Output(id, index) => Some(DragState::CreateLink {
                src_node: id,
                src_output: index,
                end: graph,
            }),
            PressIntent::RewireInput(id, index) => self.begin_rewire(host, id, index, graph),
            PressIntent::RubberBand => Some(DragState::RubberBand {
                start: graph,
                end: graph,
            }),
            PressIntent::None => None,
        };
        if let Some(drag) = &self.drag {
            tracing::debug!(?drag, "drag begins");
        }
    }

    /// Detach the input's single incoming link and continue dragging as if
    /// the gesture had started from its original source output.
    fn begin_rewire(
        &mut self,
        host: &mut dyn crate::view::CanvasHost,
        node: NodeId,
        input: usize,
        graph: Pos2,
    ) -> Option<DragState> {
        let input_name = self.model.node(node)?.inputs.get(input)?.name.clone();
        let indices = self.model.links_to(node, &input_name);
        let &[index] = &indices[..] else {
            return None;
        };
        let link = self.model.links()[index].clone();
        let src_output = self
            .model
            .node(link.src_node)?
            .find_output(&link.src_output)?;
        self.remove_link(host, index);
        Some(DragState::CreateLink {
            src_node: link.src_node,
            src_output,
            end: graph,
        })
    }

    fn exit_drag(
        &mut self,
        host: &mut dyn crate::view::CanvasHost,
        drag: DragState,
        graph: Pos2,
        abandoned: bool,
    ) {
        tracing::debug!(?drag, abandoned, "drag ends");
        match drag {
            DragState::Scroll { .. } | DragState::RubberBand { .. } => {}
            DragState::MoveSelection { .. } => {
                let snap = self.settings.snap_to_grid;
                let selected = self.selection.nodes().to_vec();
                for id in selected {
                    if let Some(node) = self.model.node_mut(id) {
                        let pos = node.pos();
                        node.set_pos(pos, &self.grid, snap);
                    }
                }
                self.mark_modified(host);
            }
            DragState::CreateLink {
                src_node,
                src_output,
                ..
            } => {
                if abandoned {
                    return;
                }
                match hit::hit_test(&self.model, graph) {
                    Some(HitTarget::Input(dst_node, dst_input)) => {
                        let names = self.model.node(src_node).and_then(|src| {
                            let dst = self.model.node(dst_node)?;
                            Some((
                                src.outputs.get(src_output)?.name.clone(),
                                dst.inputs.get(dst_input)?.name.clone(),
                            ))
                        });
                        if let Some((src_name, dst_name)) = names {
                            self.create_link(host, src_node, &src_name, dst_node, &dst_name);
                        }
                    }
                    _ => {
                        self.quick_search_insert(host, graph, Some((src_node, src_output)), None);
                    }
                }
            }
        }
    }

    fn click_select(&mut self, host: &mut dyn crate::view::CanvasHost, graph: Pos2) {
        match hit::hit_test(&self.model, graph) {
            Some(
                HitTarget::NodeBody(id) | HitTarget::Input(id, _) | HitTarget::Output(id, _),
            ) => self.set_selection(host, Selection::Nodes(vec![id])),
            Some(HitTarget::Link(index)) => self.set_selection(host, Selection::Link(index)),
            None => self.set_selection(host, Selection::None),
        }
    }

    /// Letter-key chain insert: quick search anchored at the single selected
    /// node's first output, pre-filtered by the typed character.
    fn chain_insert(&mut self, host: &mut dyn crate::view::CanvasHost, ch: char) {
        let &[id] = self.selection.nodes() else {
            return;
        };
        let Some(node) = self.model.node(id) else {
            return;
        };
        if node.outputs.is_empty() {
            return;
        }
        let rect = node.paint_rect();
        let pos = Pos2::new(rect.max.x + DEFAULT_NODE_SPACING, rect.min.y);
        self.quick_search_insert(host, pos, Some((id, 0)), Some(ch));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Link;
    use crate::node::NodeSpec;
    use crate::painter::MonoTextMetrics;
    use crate::port::Port;
    use crate::view::{CanvasHost, QuickSearchOption};

    #[derive(Default)]
    struct TestHost {
        reject_links: bool,
        links_created: usize,
        links_removed: usize,
        nodes_removed: usize,
        modified: usize,
        selections: Vec<Selection>,
        options: Vec<QuickSearchOption>,
        pick: Option<usize>,
    }

    impl CanvasHost for TestHost {
        fn can_create_link(&self, _: NodeId, _: &str, _: NodeId, _: &str) -> bool {
            !self.reject_links
        }

        fn quick_search_options(
            &mut self,
            _pos: Pos2,
            _origin: Option<(NodeId, usize)>,
        ) -> Vec<QuickSearchOption> {
            self.options.clone()
        }

        fn pick_quick_search_option(&mut self, _options: &[QuickSearchOption]) -> Option<usize> {
            self.pick
        }

        fn on_node_removed(&mut self, _node: &crate::node::Node) {
            self.nodes_removed += 1;
        }

        fn on_link_created(&mut self, _link: &Link) {
            self.links_created += 1;
        }

        fn on_link_removed(&mut self, _link: &Link) {
            self.links_removed += 1;
        }

        fn on_selection_changed(&mut self, selection: &Selection) {
            self.selections.push(selection.clone());
        }

        fn on_modified(&mut self) {
            self.modified += 1;
        }
    }

    fn exec_spec(name: &str) -> NodeSpec {
        NodeSpec::new(name, [90, 120, 160])
            .with_input(Port::execute("In"))
            .with_output(Port::execute("Out"))
    }

    fn two_node_view(host: &mut TestHost) -> (CanvasView, NodeId, NodeId) {
        let mut view = CanvasView::new();
        let a = view.add_node(host, exec_spec("A"), Pos2::new(0.0, 0.0));
        let b = view.add_node(host, exec_spec("B"), Pos2::new(300.0, 0.0));
        view.refresh_layout(&MonoTextMetrics::default());
        (view, a, b)
    }

    fn drag(view: &mut CanvasView, host: &mut TestHost, from: Pos2, to: Pos2) {
        view.pointer_pressed(PointerButton::Primary, from);
        view.pointer_moved(host, from + egui::Vec2::splat(DRAG_THRESHOLD + 1.0));
        view.pointer_moved(host, to);
        view.pointer_released(host, PointerButton::Primary, to);
    }

    #[test]
    fn test_drag_creates_link() {
        let mut host = TestHost::default();
        let (mut view, a, b) = two_node_view(&mut host);
        let from = view.model().node(a).unwrap().output_paint_rect(0).center();
        let to = view.model().node(b).unwrap().input_paint_rect(0).center();

        drag(&mut view, &mut host, from, to);

        assert_eq!(view.model().links().len(), 1);
        assert!(view.model().find_link(a, "Out", b, "In").is_some());
        assert_eq!(host.links_created, 1);
    }

    #[test]
    fn test_rejected_link_is_not_created() {
        let mut host = TestHost {
            reject_links: true,
            ..TestHost::default()
        };
        let (mut view, a, b) = two_node_view(&mut host);
        let from = view.model().node(a).unwrap().output_paint_rect(0).center();
        let to = view.model().node(b).unwrap().input_paint_rect(0).center();

        drag(&mut view, &mut host, from, to);

        assert_eq!(view.model().links().len(), 0);
        assert_eq!(host.links_created, 0);
    }

    #[test]
    fn test_rubber_band_selects_touched_nodes() {
        let mut host = TestHost::default();
        let mut view = CanvasView::new();
        let a = view.add_node(&mut host, exec_spec("A"), Pos2::new(10.0, 10.0));
        let b = view.add_node(&mut host, exec_spec("B"), Pos2::new(100.0, 10.0));
        let far = view.add_node(&mut host, exec_spec("Far"), Pos2::new(500.0, 500.0));
        view.refresh_layout(&MonoTextMetrics::default());

        drag(&mut view, &mut host, Pos2::new(0.0, 0.0), Pos2::new(150.0, 150.0));

        let selected = view.selection().nodes();
        assert!(selected.contains(&a));
        assert!(selected.contains(&b));
        assert!(!selected.contains(&far));
    }

    #[test]
    fn test_move_defers_snap_to_drag_end() {
        let mut host = TestHost::default();
        let (mut view, a, _) = two_node_view(&mut host);
        let body = Pos2::new(
            view.model().node(a).unwrap().paint_rect().center().x,
            view.model().node(a).unwrap().paint_rect().min.y + 2.0,
        );

        view.pointer_pressed(PointerButton::Primary, body);
        view.pointer_moved(&mut host, body + egui::Vec2::new(7.0, 7.0));
        let mid_drag = view.model().node(a).unwrap().pos();
        assert_eq!(mid_drag, Pos2::new(7.0, 7.0));

        view.pointer_released(&mut host, PointerButton::Primary, body + egui::Vec2::new(7.0, 7.0));
        let final_pos = view.model().node(a).unwrap().pos();
        assert_eq!(final_pos, Pos2::new(10.0, 10.0));
    }

    #[test]
    fn test_click_selects_node_over_link_and_is_exclusive() {
        let mut host = TestHost::default();
        let (mut view, a, b) = two_node_view(&mut host);
        view.create_link(&mut host, a, "Out", b, "In");
        view.refresh_layout(&MonoTextMetrics::default());

        let start = view.model().node(a).unwrap().output_link_point(0);
        let end = view.model().node(b).unwrap().input_link_point(0);
        let mid = Pos2::new((start.x + end.x) * 0.5, (start.y + end.y) * 0.5);
        view.pointer_pressed(PointerButton::Primary, mid);
        view.pointer_released(&mut host, PointerButton::Primary, mid);
        assert_eq!(view.selection(), &Selection::Link(0));
        assert!(view.selection().nodes().is_empty());

        let body = view.model().node(a).unwrap().paint_rect().center();
        view.pointer_pressed(PointerButton::Primary, body);
        view.pointer_released(&mut host, PointerButton::Primary, body);
        assert_eq!(view.selection(), &Selection::Nodes(vec![a]));
        assert!(!view.model().links()[0].selected);
    }

    #[test]
    fn test_rewire_detaches_single_incoming_link() {
        let mut host = TestHost::default();
        let (mut view, a, b) = two_node_view(&mut host);
        view.create_link(&mut host, a, "Out", b, "In");
        view.refresh_layout(&MonoTextMetrics::default());

        let from = view.model().node(b).unwrap().input_paint_rect(0).center();
        // Drag off into empty space; quick search offers nothing, so the
        // detached link is simply gone.
        drag(&mut view, &mut host, from, Pos2::new(600.0, 300.0));

        assert_eq!(view.model().links().len(), 0);
        assert_eq!(host.links_removed, 1);
    }

    #[test]
    fn test_link_release_on_empty_runs_quick_search_and_auto_wires() {
        let mut host = TestHost {
            options: vec![QuickSearchOption {
                label: "Step".to_owned(),
                description: None,
                help_url: None,
                spec: exec_spec("Step"),
            }],
            pick: Some(0),
            ..TestHost::default()
        };
        let (mut view, a, _) = two_node_view(&mut host);
        let from = view.model().node(a).unwrap().output_paint_rect(0).center();

        drag(&mut view, &mut host, from, Pos2::new(200.0, 400.0));

        assert_eq!(view.model().node_count(), 3);
        assert_eq!(view.model().links().len(), 1);
        let new_id = view
            .model()
            .nodes()
            .find(|node| node.name == "Step")
            .map(|node| node.id)
            .unwrap();
        assert!(view.model().find_link(a, "Out", new_id, "In").is_some());
    }

    #[test]
    fn test_pan_scrolls_viewport() {
        let mut host = TestHost::default();
        let (mut view, _, _) = two_node_view(&mut host);
        view.pointer_pressed(PointerButton::Middle, Pos2::new(100.0, 100.0));
        view.pointer_moved(&mut host, Pos2::new(130.0, 120.0));
        view.pointer_released(&mut host, PointerButton::Middle, Pos2::new(130.0, 120.0));
        assert_eq!(view.viewport().scroll_offset, egui::Vec2::new(-30.0, -20.0));
    }

    #[test]
    fn test_focus_loss_abandons_pending_link() {
        let mut host = TestHost::default();
        let (mut view, a, _) = two_node_view(&mut host);
        let from = view.model().node(a).unwrap().output_paint_rect(0).center();
        view.pointer_pressed(PointerButton::Primary, from);
        view.pointer_moved(&mut host, from + egui::Vec2::new(50.0, 50.0));
        assert!(view.is_dragging());

        view.focus_lost(&mut host);
        assert!(!view.is_dragging());
        assert_eq!(view.model().links().len(), 0);
        assert_eq!(view.model().node_count(), 2);
    }

    #[test]
    fn test_focus_loss_snaps_moved_selection() {
        let mut host = TestHost::default();
        let (mut view, a, _) = two_node_view(&mut host);
        let body = view.model().node(a).unwrap().paint_rect().center();

        view.pointer_pressed(PointerButton::Primary, body);
        view.pointer_moved(&mut host, body + egui::Vec2::new(7.0, 7.0));
        assert_eq!(view.model().node(a).unwrap().pos(), Pos2::new(7.0, 7.0));

        view.focus_lost(&mut host);
        assert!(!view.is_dragging());
        assert_eq!(view.model().node(a).unwrap().pos(), Pos2::new(10.0, 10.0));
    }

    #[test]
    fn test_delete_key_removes_selection_after_confirm() {
        let mut host = TestHost::default();
        let (mut view, a, b) = two_node_view(&mut host);
        view.create_link(&mut host, a, "Out", b, "In");
        view.select_node(&mut host, b);

        view.on_key(&mut host, Key::Delete, Modifiers::NONE);

        assert_eq!(view.model().node_count(), 1);
        assert_eq!(view.model().links().len(), 0);
        assert_eq!(host.nodes_removed, 1);
        assert_eq!(host.links_removed, 1);
        assert!(view.selection().is_none());
    }

    #[test]
    fn test_format_key_arranges_selected_chain() {
        let mut host = TestHost::default();
        let mut view = CanvasView::new();
        let entry = view.add_node(
            &mut host,
            NodeSpec::new("Entry", [0, 0, 0]).with_output(Port::begin_sequence("Start")),
            Pos2::new(0.0, 0.0),
        );
        let next = view.add_node(&mut host, exec_spec("Next"), Pos2::new(0.0, 300.0));
        view.create_link(&mut host, entry, "Start", next, "In");
        view.refresh_layout(&MonoTextMetrics::default());
        view.set_selection(&mut host, Selection::Nodes(vec![entry, next]));

        view.on_key(&mut host, Key::F, Modifiers::COMMAND);

        let entry_rect = view.model().node(entry).unwrap().paint_rect();
        let next_pos = view.model().node(next).unwrap().pos();
        assert!(next_pos.x > entry_rect.max.x);
    }
}
