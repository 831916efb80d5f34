// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interactive node-graph canvas widget.
//!
//! This crate provides an embeddable graph editing surface:
//! - Pan/zoom viewport with a snapping grid
//! - Nodes with typed input/output ports, links as bezier curves
//! - Rubber-band selection, node dragging, link dragging and rewiring
//! - Quick-search node insertion with auto-wiring
//! - Best-effort auto-layout along execution/data flow
//!
//! ## Architecture
//!
//! [`CanvasView`] owns the graph model, viewport, selection and the active
//! drag; the host embeds it, feeds it input and observes mutations through
//! the [`CanvasHost`] trait. Rendering goes through the [`GraphPainter`]
//! contract so headless tests and alternate renderers share the exact
//! layout and hit-test geometry.

pub mod doc;
pub mod formatter;
pub mod geometry;
pub mod hit;
mod interaction;
pub mod link;
pub mod model;
pub mod node;
pub mod painter;
pub mod port;
pub mod view;

pub use doc::{DocLink, DocNode, GraphDoc, LoadReport};
pub use formatter::FormatSettings;
pub use geometry::{Grid, Viewport};
pub use hit::HitTarget;
pub use link::Link;
pub use model::{GraphModel, LinkError};
pub use node::{Node, NodeId, NodeSpec, NodeStatus};
pub use painter::{DefaultGraphPainter, GraphPainter, PainterSettings, TextMetrics};
pub use port::{Port, PortFlags, PortTypeId};
pub use view::{CanvasHost, CanvasSettings, CanvasView, QuickSearchOption, Selection};
