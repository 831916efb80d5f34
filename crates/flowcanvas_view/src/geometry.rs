// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph-space geometry: the snapping grid and the scroll/zoom viewport.
//!
//! Node positions live in graph space; the widget surface works in client
//! (pixel) space. [`Viewport`] converts between the two:
//!
//! - `client_to_graph(p) = (p + scroll_offset) / zoom`
//! - `graph_to_client(p) = p * zoom - scroll_offset`
//!
//! Displacement vectors scale by zoom but ignore the scroll offset.

use egui::{Pos2, Rect, Vec2};

/// Smallest allowed zoom factor.
pub const MIN_ZOOM: f32 = 0.28;
/// Largest allowed zoom factor.
pub const MAX_ZOOM: f32 = 1.6;
/// Zoom increment per wheel unit.
pub const DELTA_ZOOM: f32 = 0.001;

/// The snapping grid: cell spacing plus the scrollable bounds of the canvas.
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    /// Grid cell spacing (graph units).
    pub spacing: Vec2,
    /// Scrollable extent of the canvas (graph units).
    pub bounds: Rect,
}

impl Grid {
    /// Create a grid with uniform spacing and symmetric bounds.
    pub fn new(spacing: f32, half_extent: f32) -> Self {
        Self {
            spacing: Vec2::splat(spacing),
            bounds: Rect::from_min_max(
                Pos2::new(-half_extent, -half_extent),
                Pos2::new(half_extent, half_extent),
            ),
        }
    }

    /// Snap a graph-space point to the nearest grid line on each axis.
    pub fn snap_pos(&self, pos: Pos2) -> Pos2 {
        Pos2::new(snap(pos.x, self.spacing.x), snap(pos.y, self.spacing.y))
    }

    /// Snap a size up or down to the nearest multiple of the grid spacing.
    pub fn snap_size(&self, size: Vec2) -> Vec2 {
        Vec2::new(snap(size.x, self.spacing.x), snap(size.y, self.spacing.y))
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(10.0, 8192.0)
    }
}

/// Round `value` to the nearest multiple of `spacing` using the signed
/// remainder; values within half a cell snap to the nearer line.
fn snap(value: f32, spacing: f32) -> f32 {
    if spacing <= 0.0 {
        return value;
    }
    let rem = value % spacing;
    if rem.abs() <= spacing * 0.5 {
        value - rem
    } else {
        value - rem + spacing.copysign(rem)
    }
}

/// Scroll/zoom state mapping between graph space and client (pixel) space.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    /// Scroll offset in client pixels.
    pub scroll_offset: Vec2,
    /// Zoom factor, clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    zoom: f32,
}

impl Viewport {
    /// Viewport at the origin with 1:1 zoom.
    pub fn new() -> Self {
        Self {
            scroll_offset: Vec2::ZERO,
            zoom: 1.0,
        }
    }

    /// Current zoom factor.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Set the zoom factor, clamped to the valid range.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Convert a client-space point to graph space.
    pub fn client_to_graph(&self, pos: Pos2) -> Pos2 {
        Pos2::new(
            (pos.x + self.scroll_offset.x) / self.zoom,
            (pos.y + self.scroll_offset.y) / self.zoom,
        )
    }

    /// Convert a client-space displacement to graph space.
    pub fn client_to_graph_vec(&self, delta: Vec2) -> Vec2 {
        delta / self.zoom
    }

    /// Convert a client-space rectangle to graph space.
    pub fn client_to_graph_rect(&self, rect: Rect) -> Rect {
        Rect::from_min_size(
            self.client_to_graph(rect.min),
            rect.size() / self.zoom,
        )
    }

    /// Convert a graph-space point to client space.
    pub fn graph_to_client(&self, pos: Pos2) -> Pos2 {
        Pos2::new(
            pos.x * self.zoom - self.scroll_offset.x,
            pos.y * self.zoom - self.scroll_offset.y,
        )
    }

    /// Convert a graph-space displacement to client space.
    pub fn graph_to_client_vec(&self, delta: Vec2) -> Vec2 {
        delta * self.zoom
    }

    /// Convert a graph-space rectangle to client space.
    pub fn graph_to_client_rect(&self, rect: Rect) -> Rect {
        Rect::from_min_size(
            self.graph_to_client(rect.min),
            rect.size() * self.zoom,
        )
    }

    /// Scroll by a client-space delta, clamping the offset to the grid bounds.
    pub fn scroll(&mut self, delta: Vec2, grid: &Grid) {
        self.scroll_offset.x =
            (self.scroll_offset.x - delta.x).clamp(grid.bounds.min.x, grid.bounds.max.x);
        self.scroll_offset.y =
            (self.scroll_offset.y - delta.y).clamp(grid.bounds.min.y, grid.bounds.max.y);
    }

    /// Change zoom while keeping the graph point under `focus` (a client
    /// position) stationary on screen.
    pub fn zoom_at(&mut self, focus: Pos2, zoom: f32) {
        let graph_focus = self.client_to_graph(focus);
        self.set_zoom(zoom);
        let new_focus = self.graph_to_client(graph_focus);
        self.scroll_offset += new_focus - focus;
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}
