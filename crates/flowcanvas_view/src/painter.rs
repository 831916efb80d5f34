// SPDX-License-Identifier: MIT OR Apache-2.0
//! Painting: node/link layout and the default canvas painter.
//!
//! All layout happens in graph space; screen conversion is applied per point
//! through a [`Camera`] at draw time, so cached paint rects stay valid across
//! scrolling and zooming. Stroke widths and font sizes scale with zoom.

use crate::geometry::{Grid, Viewport};
use crate::node::Node;
use egui::epaint::CubicBezierShape;
use egui::{Align2, Color32, FontId, Mesh, Pos2, Rect, Rounding, Shape, Stroke, Vec2};
use serde::{Deserialize, Serialize};

/// Corner radius of node bodies.
pub const NODE_BEVEL: f32 = 15.0;
/// Header alpha for enabled nodes.
pub const NODE_HEADER_ALPHA: u8 = 200;
/// Header alpha for disabled nodes.
pub const NODE_HEADER_ALPHA_DISABLED: u8 = 80;
/// Horizontal padding around the header text.
pub const NODE_HEADER_TEXT_BORDER_X: f32 = 8.0;
/// Vertical padding around the header text.
pub const NODE_HEADER_TEXT_BORDER_Y: f32 = 2.0;
/// Padding around the status banner text.
pub const NODE_STATUS_TEXT_BORDER: Vec2 = Vec2::new(8.0, 2.0);
/// Padding around the contents text.
pub const NODE_CONTENTS_TEXT_BORDER: Vec2 = Vec2::new(8.0, 2.0);
/// Wrap width of the contents text.
pub const NODE_CONTENTS_TEXT_MAX_WIDTH: f32 = 300.0;
/// Height cap of the contents text.
pub const NODE_CONTENTS_TEXT_MAX_HEIGHT: f32 = 200.0;
/// Gap between the input and output columns.
pub const NODE_INPUT_OUTPUT_HORZ_SPACING: f32 = 40.0;
/// Gap between stacked ports.
pub const NODE_INPUT_OUTPUT_VERT_SPACING: f32 = 5.0;
/// Border around a port icon.
pub const NODE_PORT_ICON_BORDER: f32 = 5.0;
/// Port icon size.
pub const NODE_PORT_ICON_SIZE: Vec2 = Vec2::new(11.0, 11.0);
/// Padding around a port name.
pub const NODE_PORT_NAME_BORDER: f32 = 2.0;
/// Inset of output spacer lines from the node's right edge.
pub const NODE_OUTPUT_SPACER_OFFSET: f32 = 3.0;
/// Length of output spacer lines.
pub const NODE_OUTPUT_SPACER_WIDTH: f32 = 80.0;
/// Link stroke width at 1:1 zoom.
pub const LINK_WIDTH: f32 = 2.0;
/// Minimum alpha of the selection pulse.
pub const ALPHA_HIGHLIGHT_MIN: f32 = 0.3;
/// Maximum alpha of the selection pulse.
pub const ALPHA_HIGHLIGHT_MAX: f32 = 1.0;
/// Selection pulse frequency (cycles per second).
pub const ALPHA_HIGHLIGHT_SPEED: f32 = 0.8;
/// Base font size at 1:1 zoom.
pub const FONT_SIZE: f32 = 12.0;

const NODE_HEADER_TEXT_COLOR: Color32 = Color32::from_rgb(60, 60, 60);
const NODE_ERROR_FILL_COLOR: Color32 = Color32::from_rgb(210, 66, 66);
const NODE_WARNING_FILL_COLOR: Color32 = Color32::from_rgb(255, 255, 0);
const NODE_STATUS_TEXT_COLOR: Color32 = Color32::from_rgb(60, 60, 60);
const NODE_BODY_FILL_COLOR: Color32 = Color32::from_rgba_premultiplied(40, 40, 40, 200);
const NODE_BODY_FILL_COLOR_DISABLED: Color32 = Color32::from_rgba_premultiplied(40, 40, 40, 80);
const NODE_BODY_OUTLINE_COLOR: Color32 = Color32::from_rgba_premultiplied(40, 40, 40, 200);
const NODE_BODY_OUTLINE_COLOR_HIGHLIGHT: Color32 = Color32::from_rgb(250, 232, 12);
const NODE_CONTENTS_FILL_COLOR: Color32 = Color32::from_rgba_premultiplied(40, 40, 40, 200);
const NODE_CONTENTS_TEXT_COLOR: Color32 = Color32::from_rgb(255, 255, 255);
const NODE_PORT_NAME_COLOR: Color32 = Color32::from_rgb(240, 240, 240);
const NODE_OUTPUT_SPACER_COLOR: Color32 = Color32::from_rgba_premultiplied(120, 120, 120, 140);
const SELECTION_FILL_COLOR: Color32 = Color32::from_rgba_premultiplied(0, 56, 83, 100);
const SELECTION_OUTLINE_COLOR: Color32 = Color32::from_rgb(0, 162, 232);

const NODE_ERROR_TEXT: &str = "Error!";
const NODE_WARNING_TEXT: &str = "Warning!";

/// Text measurement abstraction so layout can run headless.
///
/// The live widget measures with egui's font atlas; tests use
/// [`MonoTextMetrics`].
pub trait TextMetrics {
    /// Size of a single line of text at 1:1 zoom.
    fn measure(&self, text: &str) -> Vec2;

    /// Size of text wrapped at `max_width`, at 1:1 zoom.
    fn measure_wrapped(&self, text: &str, max_width: f32) -> Vec2;
}

/// Fixed-advance metrics; deterministic, no font atlas required.
#[derive(Debug, Clone, Copy)]
pub struct MonoTextMetrics {
    /// Advance per character.
    pub char_width: f32,
    /// Line height.
    pub line_height: f32,
}

impl Default for MonoTextMetrics {
    fn default() -> Self {
        Self {
            char_width: 7.0,
            line_height: 14.0,
        }
    }
}

impl TextMetrics for MonoTextMetrics {
    fn measure(&self, text: &str) -> Vec2 {
        Vec2::new(
            text.chars().count() as f32 * self.char_width,
            self.line_height,
        )
    }

    fn measure_wrapped(&self, text: &str, max_width: f32) -> Vec2 {
        let per_line = (max_width / self.char_width).floor().max(1.0) as usize;
        let mut lines = 0usize;
        let mut width: f32 = 0.0;
        for line in text.lines() {
            let chars = line.chars().count().max(1);
            lines += chars.div_ceil(per_line);
            width = width.max(chars.min(per_line) as f32 * self.char_width);
        }
        Vec2::new(width, lines.max(1) as f32 * self.line_height)
    }
}

/// Metrics backed by egui's font atlas.
pub struct UiTextMetrics<'a> {
    ctx: &'a egui::Context,
}

impl<'a> UiTextMetrics<'a> {
    /// Wrap a context for measurement.
    pub fn new(ctx: &'a egui::Context) -> Self {
        Self { ctx }
    }
}

impl TextMetrics for UiTextMetrics<'_> {
    fn measure(&self, text: &str) -> Vec2 {
        self.ctx.fonts(|fonts| {
            fonts
                .layout_no_wrap(
                    text.to_owned(),
                    FontId::proportional(FONT_SIZE),
                    Color32::WHITE,
                )
                .size()
        })
    }

    fn measure_wrapped(&self, text: &str, max_width: f32) -> Vec2 {
        self.ctx.fonts(|fonts| {
            fonts
                .layout(
                    text.to_owned(),
                    FontId::proportional(FONT_SIZE),
                    Color32::WHITE,
                    max_width,
                )
                .size()
        })
    }
}

/// Graph-to-screen mapping for one frame: the viewport plus the widget's
/// screen origin.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    viewport: Viewport,
    origin: Pos2,
}

impl Camera {
    /// Build a camera from the viewport and the widget rect origin.
    pub fn new(viewport: Viewport, origin: Pos2) -> Self {
        Self { viewport, origin }
    }

    /// Current zoom factor.
    pub fn scale(&self) -> f32 {
        self.viewport.zoom()
    }

    /// Graph-space point to screen.
    pub fn to_screen(&self, pos: Pos2) -> Pos2 {
        self.origin + self.viewport.graph_to_client(pos).to_vec2()
    }

    /// Graph-space rect to screen.
    pub fn to_screen_rect(&self, rect: Rect) -> Rect {
        Rect::from_min_max(self.to_screen(rect.min), self.to_screen(rect.max))
    }

    /// Screen point to graph space.
    pub fn to_graph(&self, pos: Pos2) -> Pos2 {
        self.viewport.client_to_graph(pos - self.origin.to_vec2())
    }

    /// Screen rect to graph space.
    pub fn to_graph_rect(&self, rect: Rect) -> Rect {
        Rect::from_min_max(self.to_graph(rect.min), self.to_graph(rect.max))
    }
}

/// Persisted painter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PainterSettings {
    /// Canvas fill color (RGBA).
    pub background_color: [u8; 4],
    /// Fine and coarse grid line colors (RGBA).
    pub grid_line_colors: [[u8; 4]; 2],
}

impl Default for PainterSettings {
    fn default() -> Self {
        Self {
            background_color: [60, 60, 60, 255],
            grid_line_colors: [[68, 68, 68, 255], [48, 48, 48, 255]],
        }
    }
}

fn settings_color(rgba: [u8; 4]) -> Color32 {
    Color32::from_rgba_unmultiplied(rgba[0], rgba[1], rgba[2], rgba[3])
}

/// Selection pulse alpha at the given time.
pub fn pulse_alpha(time: f64) -> f32 {
    let sin_a = (time as f32 * ALPHA_HIGHLIGHT_SPEED * std::f32::consts::TAU).sin();
    let swing = ALPHA_HIGHLIGHT_MIN + sin_a * ((ALPHA_HIGHLIGHT_MAX - ALPHA_HIGHLIGHT_MIN) * 0.5);
    (ALPHA_HIGHLIGHT_MIN + swing.clamp(0.0, 1.0)).min(1.0)
}

/// Control points of a link curve: two cubic beziers joined at the midpoint.
///
/// Points flow horizontally out of the source and into the destination when
/// the link runs left to right; when it runs backwards the tangents bend
/// vertically, capped so the curve never overshoots the midpoint.
pub fn link_control_points(start: Pos2, end: Pos2) -> [Pos2; 8] {
    let left_to_right = start.x < end.x;
    let vertical_sign = if start.y < end.y { 1.0 } else { -1.0 };
    let mid = Pos2::new((start.x + end.x) * 0.5, (start.y + end.y) * 0.5);

    let mut points = [Pos2::ZERO; 8];
    points[0] = start;
    {
        let offset = (mid.x - start.x).abs() * 0.5;
        points[1].x = start.x + offset;
        points[1].y = if left_to_right {
            start.y
        } else {
            let extent = (mid.y - start.y).abs() * 0.95;
            start.y + (offset * 0.5 * vertical_sign).clamp(-extent, extent)
        };
    }
    points[2] = points[1].lerp(mid, 0.75);
    points[3] = mid;
    points[7] = end;
    {
        let offset = (mid.x - end.x).abs() * 0.5;
        points[6].x = end.x - offset;
        points[6].y = if left_to_right {
            end.y
        } else {
            let extent = (mid.y - end.y).abs() * 0.95;
            end.y - (offset * 0.5 * vertical_sign).clamp(-extent, extent)
        };
    }
    points[5] = points[6].lerp(mid, 0.75);
    points[4] = mid;

    // Near-horizontal curves glitch when control points sit a hair off the
    // start's y axis; flatten them outright.
    for point in points.iter_mut().skip(1) {
        if (point.y - start.y).abs() <= 1.0 {
            point.y = start.y;
        }
    }
    points
}

/// Padded axis-aligned bounds of a link curve.
///
/// The control point hull over-estimates the true curve bounds; that is fine
/// for picking and invalidation.
pub fn link_bounds(points: &[Pos2; 8], width: f32) -> Rect {
    let mut bounds = Rect::from_min_max(points[0], points[0]);
    for point in &points[1..] {
        bounds.extend_with(*point);
    }
    bounds.expand(width)
}

/// Per-node layout produced during measurement, consumed when painting.
#[derive(Debug, Clone, Copy, Default)]
struct NodeLayout {
    header: Vec2,
    contents: Vec2,
    status: Vec2,
}

/// Draws the canvas: grid, nodes, links and the selection rect.
///
/// Implementations own the visual style; the canvas widget owns what gets
/// drawn when. Layout methods are pure so hit tests and the formatter can
/// run without a paint surface.
pub trait GraphPainter {
    /// Canvas fill color.
    fn background_color(&self) -> Color32;

    /// Recompute a node's paint rect and port paint rects from its content.
    fn update_node_layout(&self, metrics: &dyn TextMetrics, grid: &Grid, node: &mut Node);

    /// Paint the background grid.
    fn paint_grid(&self, painter: &egui::Painter, camera: &Camera, grid: &Grid);

    /// Paint one node. `time` drives the selection pulse.
    fn paint_node(
        &self,
        painter: &egui::Painter,
        camera: &Camera,
        metrics: &dyn TextMetrics,
        node: &Node,
        time: f64,
    );

    /// Paint a link curve between two graph-space anchors and return its
    /// padded graph-space bounds. `width_scale` widens the stroke for the
    /// pick pass.
    fn paint_link(
        &self,
        painter: &egui::Painter,
        camera: &Camera,
        start: Pos2,
        end: Pos2,
        color: Color32,
        highlight: bool,
        time: f64,
        width_scale: f32,
    ) -> Rect;

    /// Paint the rubber-band selection rect (graph space).
    fn paint_selection_rect(&self, painter: &egui::Painter, camera: &Camera, rect: Rect);
}

/// The stock painter: beveled nodes with gradient headers, dual-bezier links
/// and a two-tone grid.
#[derive(Debug, Default)]
pub struct DefaultGraphPainter {
    /// Colors; serialized with the editor's preferences.
    pub settings: PainterSettings,
}

impl DefaultGraphPainter {
    /// Painter with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    fn header_size(&self, metrics: &dyn TextMetrics, node: &Node) -> Vec2 {
        let name = if node.name.is_empty() { " " } else { &node.name };
        let text = metrics.measure(name);
        Vec2::new(
            NODE_HEADER_TEXT_BORDER_X + text.x + NODE_HEADER_TEXT_BORDER_X,
            NODE_HEADER_TEXT_BORDER_Y + text.y + NODE_HEADER_TEXT_BORDER_Y,
        )
    }

    fn status_size(&self, metrics: &dyn TextMetrics, node: &Node) -> Vec2 {
        let text = if node.status.errors {
            NODE_ERROR_TEXT
        } else if node.status.warnings {
            NODE_WARNING_TEXT
        } else {
            return Vec2::ZERO;
        };
        metrics.measure(text) + NODE_STATUS_TEXT_BORDER * 2.0
    }

    fn contents_size(&self, metrics: &dyn TextMetrics, node: &Node) -> Vec2 {
        match &node.contents {
            Some(contents) => {
                let text = metrics.measure_wrapped(contents, NODE_CONTENTS_TEXT_MAX_WIDTH);
                Vec2::new(
                    text.x + NODE_CONTENTS_TEXT_BORDER.x * 2.0,
                    text.y.min(NODE_CONTENTS_TEXT_MAX_HEIGHT) + NODE_CONTENTS_TEXT_BORDER.y * 2.0,
                )
            }
            None => Vec2::ZERO,
        }
    }

    fn port_size(&self, metrics: &dyn TextMetrics, name: &str) -> Vec2 {
        let icon = NODE_PORT_ICON_SIZE + Vec2::splat(NODE_PORT_ICON_BORDER * 2.0);
        let name = metrics.measure(name) + Vec2::splat(NODE_PORT_NAME_BORDER * 2.0);
        Vec2::new(icon.x + name.x, icon.y.max(name.y))
    }

    fn node_layout(&self, metrics: &dyn TextMetrics, node: &Node) -> NodeLayout {
        NodeLayout {
            header: self.header_size(metrics, node),
            contents: self.contents_size(metrics, node),
            status: self.status_size(metrics, node),
        }
    }

    fn paint_header(&self, painter: &egui::Painter, camera: &Camera, node: &Node, rect: Rect) {
        let alpha = if node.enabled {
            NODE_HEADER_ALPHA
        } else {
            NODE_HEADER_ALPHA_DISABLED
        };
        let [r, g, b] = node.header_color;
        let left = Color32::from_rgba_unmultiplied(r, g, b, alpha);
        let right = lerp_color(left, Color32::from_rgba_unmultiplied(255, 255, 255, alpha), 0.6);

        let screen = camera.to_screen_rect(rect);
        let mut mesh = Mesh::default();
        mesh.colored_vertex(screen.left_top(), left);
        mesh.colored_vertex(screen.right_top(), right);
        mesh.colored_vertex(screen.right_bottom(), right);
        mesh.colored_vertex(screen.left_bottom(), left);
        mesh.add_triangle(0, 1, 2);
        mesh.add_triangle(0, 2, 3);
        painter.add(Shape::mesh(mesh));

        let scale = camera.scale();
        painter.text(
            camera.to_screen(
                rect.min + Vec2::new(NODE_HEADER_TEXT_BORDER_X, NODE_HEADER_TEXT_BORDER_Y),
            ),
            Align2::LEFT_TOP,
            &node.name,
            FontId::proportional(FONT_SIZE * scale),
            NODE_HEADER_TEXT_COLOR,
        );
    }

    fn paint_contents(&self, painter: &egui::Painter, camera: &Camera, node: &Node, rect: Rect) {
        let Some(contents) = &node.contents else {
            return;
        };
        painter.rect_filled(
            camera.to_screen_rect(rect),
            Rounding::ZERO,
            NODE_CONTENTS_FILL_COLOR,
        );
        let scale = camera.scale();
        let galley = painter.layout(
            contents.clone(),
            FontId::proportional(FONT_SIZE * scale),
            NODE_CONTENTS_TEXT_COLOR,
            NODE_CONTENTS_TEXT_MAX_WIDTH * scale,
        );
        painter.galley(
            camera.to_screen(rect.min + NODE_CONTENTS_TEXT_BORDER),
            galley,
            NODE_CONTENTS_TEXT_COLOR,
        );
    }

    fn paint_status(&self, painter: &egui::Painter, camera: &Camera, node: &Node, rect: Rect) {
        let (text, fill) = if node.status.errors {
            (NODE_ERROR_TEXT, NODE_ERROR_FILL_COLOR)
        } else if node.status.warnings {
            (NODE_WARNING_TEXT, NODE_WARNING_FILL_COLOR)
        } else {
            return;
        };
        painter.rect_filled(camera.to_screen_rect(rect), Rounding::ZERO, fill);
        painter.text(
            camera.to_screen(rect.min + NODE_STATUS_TEXT_BORDER),
            Align2::LEFT_TOP,
            text,
            FontId::proportional(FONT_SIZE * camera.scale()),
            NODE_STATUS_TEXT_COLOR,
        );
    }

    fn paint_port_icon(
        &self,
        painter: &egui::Painter,
        camera: &Camera,
        pos: Pos2,
        color: Color32,
        active: bool,
    ) {
        let scale = camera.scale();
        if active {
            let points = vec![
                camera.to_screen(pos),
                camera.to_screen(pos + Vec2::new(NODE_PORT_ICON_SIZE.x, NODE_PORT_ICON_SIZE.y * 0.5)),
                camera.to_screen(pos + Vec2::new(0.0, NODE_PORT_ICON_SIZE.y)),
            ];
            painter.add(Shape::convex_polygon(points, color, Stroke::NONE));
        } else {
            painter.circle_filled(
                camera.to_screen(pos + NODE_PORT_ICON_SIZE * 0.5),
                NODE_PORT_ICON_SIZE.x * 0.5 * scale,
                color,
            );
        }
    }

    fn paint_inputs(&self, painter: &egui::Painter, camera: &Camera, node: &Node) {
        let icon = NODE_PORT_ICON_SIZE + Vec2::splat(NODE_PORT_ICON_BORDER * 2.0);
        for (index, port) in node.inputs.iter().enumerate() {
            let rect = node.input_paint_rect(index);
            let mut icon_pos = rect.min + Vec2::splat(NODE_PORT_ICON_BORDER);
            if icon.y < rect.height() {
                icon_pos.y += (rect.height() - icon.y) * 0.5;
            }
            let [r, g, b] = port.color;
            self.paint_port_icon(
                painter,
                camera,
                icon_pos,
                Color32::from_rgb(r, g, b),
                port.flags.execute && node.enabled,
            );
            painter.text(
                camera.to_screen(Pos2::new(rect.min.x + icon.x, rect.center().y)),
                Align2::LEFT_CENTER,
                &port.name,
                FontId::proportional(FONT_SIZE * camera.scale()),
                NODE_PORT_NAME_COLOR,
            );
        }
    }

    fn paint_outputs(&self, painter: &egui::Painter, camera: &Camera, node: &Node) {
        let icon = NODE_PORT_ICON_SIZE + Vec2::splat(NODE_PORT_ICON_BORDER * 2.0);
        let scale = camera.scale();
        let spacer_stroke = Stroke::new(scale, NODE_OUTPUT_SPACER_COLOR);
        for (index, port) in node.outputs.iter().enumerate() {
            let rect = node.output_paint_rect(index);
            let mut icon_pos = Pos2::new(
                rect.max.x - NODE_PORT_ICON_SIZE.x - NODE_PORT_ICON_BORDER,
                rect.min.y + NODE_PORT_ICON_BORDER,
            );
            if icon.y < rect.height() {
                icon_pos.y += (rect.height() - icon.y) * 0.5;
            }
            let [r, g, b] = port.color;
            self.paint_port_icon(
                painter,
                camera,
                icon_pos,
                Color32::from_rgb(r, g, b),
                port.flags.execute && node.enabled,
            );
            painter.text(
                camera.to_screen(Pos2::new(rect.max.x - icon.x, rect.center().y)),
                Align2::RIGHT_CENTER,
                &port.name,
                FontId::proportional(FONT_SIZE * scale),
                NODE_PORT_NAME_COLOR,
            );

            let right = rect.max.x - NODE_OUTPUT_SPACER_OFFSET;
            let left = right - NODE_OUTPUT_SPACER_WIDTH;
            if port.flags.spacer_above && index > 0 {
                let y = rect.min.y - NODE_INPUT_OUTPUT_VERT_SPACING * 0.5;
                painter.line_segment(
                    [
                        camera.to_screen(Pos2::new(left, y)),
                        camera.to_screen(Pos2::new(right, y)),
                    ],
                    spacer_stroke,
                );
            }
            if port.flags.spacer_below && index + 1 < node.outputs.len() {
                let y = rect.max.y + NODE_INPUT_OUTPUT_VERT_SPACING * 0.5;
                painter.line_segment(
                    [
                        camera.to_screen(Pos2::new(left, y)),
                        camera.to_screen(Pos2::new(right, y)),
                    ],
                    spacer_stroke,
                );
            }
        }
    }
}

impl GraphPainter for DefaultGraphPainter {
    fn background_color(&self) -> Color32 {
        settings_color(self.settings.background_color)
    }

    fn update_node_layout(&self, metrics: &dyn TextMetrics, grid: &Grid, node: &mut Node) {
        let layout = self.node_layout(metrics, node);
        let head = Vec2::new(
            layout.header.x.max(layout.status.x).max(layout.contents.x),
            layout.header.y + layout.status.y + layout.contents.y,
        );

        let mut total_inputs = Vec2::ZERO;
        for port in &node.inputs {
            let size = self.port_size(metrics, &port.name);
            total_inputs.x = total_inputs.x.max(size.x);
            total_inputs.y += size.y + NODE_INPUT_OUTPUT_VERT_SPACING;
        }
        total_inputs.y += NODE_INPUT_OUTPUT_VERT_SPACING;

        let mut total_outputs = Vec2::ZERO;
        for port in &node.outputs {
            let size = self.port_size(metrics, &port.name);
            total_outputs.x = total_outputs.x.max(size.x);
            total_outputs.y += size.y + NODE_INPUT_OUTPUT_VERT_SPACING;
        }
        total_outputs.y += NODE_INPUT_OUTPUT_VERT_SPACING;

        let paint_size = Vec2::new(
            head.x
                .max(total_inputs.x + NODE_INPUT_OUTPUT_HORZ_SPACING + total_outputs.x),
            head.y + total_inputs.y.max(total_outputs.y),
        );
        let paint_rect = Rect::from_min_size(node.pos(), grid.snap_size(paint_size));
        node.set_paint_rect(paint_rect);

        let mut input_pos = Pos2::new(
            paint_rect.min.x,
            paint_rect.min.y + head.y + NODE_INPUT_OUTPUT_VERT_SPACING,
        );
        for index in 0..node.inputs.len() {
            let size = self.port_size(metrics, &node.inputs[index].name);
            node.set_input_paint_rect(index, Rect::from_min_size(input_pos, size));
            input_pos.y += size.y + NODE_INPUT_OUTPUT_VERT_SPACING;
        }

        let mut output_pos = Pos2::new(
            paint_rect.max.x - total_outputs.x,
            paint_rect.min.y + head.y + NODE_INPUT_OUTPUT_VERT_SPACING,
        );
        for index in 0..node.outputs.len() {
            let size = self.port_size(metrics, &node.outputs[index].name);
            // Right-align within the output column.
            let min = Pos2::new(output_pos.x + total_outputs.x - size.x, output_pos.y);
            node.set_output_paint_rect(index, Rect::from_min_size(min, size));
            output_pos.y += size.y + NODE_INPUT_OUTPUT_VERT_SPACING;
        }
    }

    fn paint_grid(&self, painter: &egui::Painter, camera: &Camera, grid: &Grid) {
        let fine = Stroke::new(1.0, settings_color(self.settings.grid_line_colors[0]));
        let coarse = Stroke::new(1.0, settings_color(self.settings.grid_line_colors[1]));
        let visible = camera
            .to_graph_rect(painter.clip_rect())
            .intersect(grid.bounds);
        if visible.width() <= 0.0 || visible.height() <= 0.0 {
            return;
        }

        let spacing = grid.spacing;
        let mut x = (visible.min.x / spacing.x).floor() * spacing.x;
        while x <= visible.max.x {
            let stroke = if (x / spacing.x).round() as i64 % 10 == 0 {
                coarse
            } else {
                fine
            };
            painter.line_segment(
                [
                    camera.to_screen(Pos2::new(x, visible.min.y)),
                    camera.to_screen(Pos2::new(x, visible.max.y)),
                ],
                stroke,
            );
            x += spacing.x;
        }
        let mut y = (visible.min.y / spacing.y).floor() * spacing.y;
        while y <= visible.max.y {
            let stroke = if (y / spacing.y).round() as i64 % 10 == 0 {
                coarse
            } else {
                fine
            };
            painter.line_segment(
                [
                    camera.to_screen(Pos2::new(visible.min.x, y)),
                    camera.to_screen(Pos2::new(visible.max.x, y)),
                ],
                stroke,
            );
            y += spacing.y;
        }
    }

    fn paint_node(
        &self,
        painter: &egui::Painter,
        camera: &Camera,
        metrics: &dyn TextMetrics,
        node: &Node,
        time: f64,
    ) {
        let paint_rect = node.paint_rect();
        let layout = self.node_layout(metrics, node);
        let head_height = layout.header.y + layout.status.y + layout.contents.y;
        let scale = camera.scale();
        let bevel = NODE_BEVEL * scale;

        let body_rect = Rect::from_min_max(
            Pos2::new(paint_rect.min.x, paint_rect.min.y + head_height),
            paint_rect.max,
        );
        let body_fill = if node.enabled {
            NODE_BODY_FILL_COLOR
        } else {
            NODE_BODY_FILL_COLOR_DISABLED
        };
        painter.rect_filled(
            camera.to_screen_rect(body_rect),
            Rounding {
                nw: 0.0,
                ne: 0.0,
                sw: bevel,
                se: bevel,
            },
            body_fill,
        );

        let header_rect = Rect::from_min_size(
            paint_rect.min,
            Vec2::new(paint_rect.width(), layout.header.y),
        );
        self.paint_header(painter, camera, node, header_rect);

        let contents_rect = Rect::from_min_size(
            Pos2::new(paint_rect.min.x, paint_rect.min.y + layout.header.y),
            Vec2::new(paint_rect.width(), layout.contents.y),
        );
        self.paint_contents(painter, camera, node, contents_rect);

        let status_rect = Rect::from_min_size(
            Pos2::new(
                paint_rect.min.x,
                paint_rect.min.y + layout.header.y + layout.contents.y,
            ),
            Vec2::new(paint_rect.width(), layout.status.y),
        );
        self.paint_status(painter, camera, node, status_rect);

        let outline = if node.selected {
            NODE_BODY_OUTLINE_COLOR_HIGHLIGHT.gamma_multiply(pulse_alpha(time))
        } else {
            NODE_BODY_OUTLINE_COLOR
        };
        painter.rect_stroke(
            camera.to_screen_rect(paint_rect),
            Rounding::same(bevel),
            Stroke::new(scale, outline),
        );

        self.paint_inputs(painter, camera, node);
        self.paint_outputs(painter, camera, node);
    }

    fn paint_link(
        &self,
        painter: &egui::Painter,
        camera: &Camera,
        start: Pos2,
        end: Pos2,
        color: Color32,
        highlight: bool,
        time: f64,
        width_scale: f32,
    ) -> Rect {
        let color = if highlight {
            color.gamma_multiply(pulse_alpha(time))
        } else {
            color
        };
        let points = link_control_points(start, end);
        let width = LINK_WIDTH * width_scale;
        let stroke = Stroke::new(width * camera.scale(), color);
        let screen: Vec<Pos2> = points.iter().map(|p| camera.to_screen(*p)).collect();
        painter.add(CubicBezierShape::from_points_stroke(
            [screen[0], screen[1], screen[2], screen[3]],
            false,
            Color32::TRANSPARENT,
            stroke,
        ));
        painter.add(CubicBezierShape::from_points_stroke(
            [screen[4], screen[5], screen[6], screen[7]],
            false,
            Color32::TRANSPARENT,
            stroke,
        ));
        link_bounds(&points, width)
    }

    fn paint_selection_rect(&self, painter: &egui::Painter, camera: &Camera, rect: Rect) {
        let screen = camera.to_screen_rect(rect);
        painter.rect_filled(screen, Rounding::ZERO, SELECTION_FILL_COLOR);
        painter.rect_stroke(screen, Rounding::ZERO, Stroke::new(1.0, SELECTION_OUTLINE_COLOR));
    }
}

fn lerp_color(a: Color32, b: Color32, t: f32) -> Color32 {
    let lerp = |x: u8, y: u8| -> u8 {
        (f32::from(x) + (f32::from(y) - f32::from(x)) * t).round() as u8
    };
    Color32::from_rgba_unmultiplied(
        lerp(a.r(), b.r()),
        lerp(a.g(), b.g()),
        lerp(a.b(), b.b()),
        lerp(a.a(), b.a()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeSpec;
    use crate::port::Port;

    fn layout_node(spec: NodeSpec) -> Node {
        let grid = Grid::default();
        let mut node = Node::new(spec, Pos2::new(100.0, 100.0), &grid);
        DefaultGraphPainter::new().update_node_layout(&MonoTextMetrics::default(), &grid, &mut node);
        node
    }

    #[test]
    fn test_layout_fits_both_port_columns() {
        let node = layout_node(
            NodeSpec::new("Node", [90, 120, 160])
                .with_input(Port::execute("In"))
                .with_input(Port::execute("Another Input"))
                .with_output(Port::execute("Out")),
        );
        let painter = DefaultGraphPainter::new();
        let metrics = MonoTextMetrics::default();
        let widest_input = painter.port_size(&metrics, "Another Input").x;
        let output = painter.port_size(&metrics, "Out").x;
        assert!(
            node.paint_rect().width() >= widest_input + NODE_INPUT_OUTPUT_HORZ_SPACING + output
        );
    }

    #[test]
    fn test_layout_places_ports_inside_node() {
        let node = layout_node(
            NodeSpec::new("Node", [90, 120, 160])
                .with_input(Port::execute("In"))
                .with_output(Port::execute("Out"))
                .with_output(Port::execute("Other")),
        );
        let rect = node.paint_rect();
        assert!(rect.contains_rect(node.input_paint_rect(0)));
        assert!(rect.contains_rect(node.output_paint_rect(0)));
        assert!(rect.contains_rect(node.output_paint_rect(1)));
        // Outputs hug the right edge; stacked ports do not overlap.
        assert!(node.output_paint_rect(0).max.x > rect.center().x);
        assert!(node.output_paint_rect(1).min.y >= node.output_paint_rect(0).max.y);
    }

    #[test]
    fn test_layout_size_snapped_to_grid() {
        let node = layout_node(NodeSpec::new("Node", [0, 0, 0]).with_input(Port::execute("In")));
        let size = node.paint_rect().size();
        assert_eq!(size.x % 10.0, 0.0);
        assert_eq!(size.y % 10.0, 0.0);
    }

    #[test]
    fn test_link_control_points_anchor_endpoints() {
        let start = Pos2::new(10.0, 20.0);
        let end = Pos2::new(200.0, 120.0);
        let points = link_control_points(start, end);
        assert_eq!(points[0], start);
        assert_eq!(points[7], end);
        assert_eq!(points[3], points[4]);
        assert_eq!(points[3], Pos2::new(105.0, 70.0));
    }

    #[test]
    fn test_link_control_points_flat_when_horizontal() {
        let start = Pos2::new(0.0, 50.0);
        let end = Pos2::new(100.0, 50.4);
        let points = link_control_points(start, end);
        for point in &points {
            assert_eq!(point.y, 50.0);
        }
    }

    #[test]
    fn test_link_bounds_padded_by_width() {
        let points = link_control_points(Pos2::new(0.0, 0.0), Pos2::new(100.0, 60.0));
        let bounds = link_bounds(&points, 2.0);
        assert!(bounds.min.x <= -2.0 + 1e-3);
        assert!(bounds.max.x >= 102.0 - 1e-3);
        assert!(bounds.contains(Pos2::new(50.0, 30.0)));
    }

    #[test]
    fn test_pulse_alpha_stays_in_range() {
        for step in 0..100 {
            let alpha = pulse_alpha(f64::from(step) * 0.05);
            assert!((ALPHA_HIGHLIGHT_MIN..=1.0).contains(&alpha));
        }
    }
}
