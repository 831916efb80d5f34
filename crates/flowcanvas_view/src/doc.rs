// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serializable document form of a graph.
//!
//! Live [`Node`](crate::node::Node)s cache paint rects and selection state
//! that do not belong on disk; the document types here carry only identity,
//! position and the node spec. Documents round-trip through RON like the
//! rest of the editor's assets.

use crate::geometry::Grid;
use crate::link::Link;
use crate::model::{GraphModel, LinkError};
use crate::node::{Node, NodeId, NodeSpec};
use egui::Pos2;
use serde::{Deserialize, Serialize};

/// A node as stored in a document: identity, position and spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocNode {
    /// Stable node ID, preserved across save/load.
    pub id: NodeId,
    /// Graph-space position.
    pub position: [f32; 2],
    /// Display data and ports.
    pub spec: NodeSpec,
    /// Whether the node was enabled when saved.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// A link as stored in a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocLink {
    /// Source node ID.
    pub src_node: NodeId,
    /// Source output port name.
    pub src_output: String,
    /// Destination node ID.
    pub dst_node: NodeId,
    /// Destination input port name.
    pub dst_input: String,
}

/// Serializable snapshot of a graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDoc {
    /// Document name.
    pub name: String,
    /// Nodes in z-order (front first).
    pub nodes: Vec<DocNode>,
    /// Links.
    pub links: Vec<DocLink>,
}

/// Outcome of loading a document: links whose endpoints no longer resolve
/// are dropped rather than failing the whole load.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Links skipped during load, with the reason each failed to resolve.
    pub dropped_links: Vec<(DocLink, LinkError)>,
}

impl LoadReport {
    /// True when every link resolved.
    pub fn is_clean(&self) -> bool {
        self.dropped_links.is_empty()
    }
}

impl GraphDoc {
    /// Snapshot a live model into a document.
    pub fn from_model(name: impl Into<String>, model: &GraphModel) -> Self {
        let nodes = model
            .nodes()
            .map(|node| DocNode {
                id: node.id,
                position: [node.pos().x, node.pos().y],
                spec: NodeSpec {
                    name: node.name.clone(),
                    contents: node.contents.clone(),
                    header_color: node.header_color,
                    inputs: node.inputs.clone(),
                    outputs: node.outputs.clone(),
                },
                enabled: node.enabled,
            })
            .collect();
        let links = model
            .links()
            .iter()
            .map(|link| DocLink {
                src_node: link.src_node,
                src_output: link.src_output.clone(),
                dst_node: link.dst_node,
                dst_input: link.dst_input.clone(),
            })
            .collect();
        Self {
            name: name.into(),
            nodes,
            links,
        }
    }

    /// Rebuild a live model from this document.
    ///
    /// Node positions snap to the grid on the way in. Links that fail to
    /// resolve are reported and skipped, never silently kept.
    pub fn instantiate(&self, grid: &Grid) -> (GraphModel, LoadReport) {
        let mut model = GraphModel::new();
        for doc_node in &self.nodes {
            let pos = Pos2::new(doc_node.position[0], doc_node.position[1]);
            let mut node = Node::with_id(doc_node.id, doc_node.spec.clone(), pos, grid);
            node.enabled = doc_node.enabled;
            model.insert_node(node);
        }
        let mut report = LoadReport::default();
        for doc_link in &self.links {
            match model.resolve_link(
                doc_link.src_node,
                &doc_link.src_output,
                doc_link.dst_node,
                &doc_link.dst_input,
            ) {
                Ok(()) => {
                    model.add_link(Link::new(
                        doc_link.src_node,
                        doc_link.src_output.clone(),
                        doc_link.dst_node,
                        doc_link.dst_input.clone(),
                    ));
                }
                Err(err) => {
                    tracing::warn!(
                        src = %doc_link.src_output,
                        dst = %doc_link.dst_input,
                        error = %err,
                        "dropping unresolvable link"
                    );
                    report.dropped_links.push((doc_link.clone(), err));
                }
            }
        }
        (model, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::Port;

    fn sample_model() -> (GraphModel, NodeId, NodeId) {
        let grid = Grid::default();
        let mut model = GraphModel::new();
        let a = model.add_node(
            NodeSpec::new("A", [90, 120, 160]).with_output(Port::execute("Out")),
            Pos2::new(10.0, 20.0),
            &grid,
        );
        let b = model.add_node(
            NodeSpec::new("B", [160, 90, 90]).with_input(Port::execute("In")),
            Pos2::new(250.0, 20.0),
            &grid,
        );
        model.add_link(Link::new(a, "Out", b, "In"));
        (model, a, b)
    }

    #[test]
    fn test_document_round_trip_preserves_graph() {
        let (model, a, b) = sample_model();
        let doc = GraphDoc::from_model("test", &model);

        let text = ron::to_string(&doc).unwrap();
        let parsed: GraphDoc = ron::from_str(&text).unwrap();

        let (restored, report) = parsed.instantiate(&Grid::default());
        assert!(report.is_clean());
        assert_eq!(restored.node_count(), 2);
        assert_eq!(restored.node(a).unwrap().pos(), Pos2::new(10.0, 20.0));
        assert!(restored.find_link(a, "Out", b, "In").is_some());
    }

    #[test]
    fn test_load_drops_unresolvable_links() {
        let (model, a, b) = sample_model();
        let mut doc = GraphDoc::from_model("test", &model);
        doc.links.push(DocLink {
            src_node: a,
            src_output: "Missing".to_owned(),
            dst_node: b,
            dst_input: "In".to_owned(),
        });

        let (restored, report) = doc.instantiate(&Grid::default());
        assert_eq!(restored.links().len(), 1);
        assert_eq!(report.dropped_links.len(), 1);
        assert!(matches!(
            report.dropped_links[0].1,
            LinkError::OutputNotFound { .. }
        ));
    }
}
