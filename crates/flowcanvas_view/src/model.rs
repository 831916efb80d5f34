// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph model: the canvas's node and link collections.
//!
//! Nodes are stored in insertion order; hit tests scan front to back in
//! that order, so freshly added nodes sit behind existing ones. Links
//! reference nodes by ID and are removed in cascade with either endpoint.

use crate::geometry::Grid;
use crate::link::Link;
use crate::node::{Node, NodeId, NodeSpec};
use egui::Pos2;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Error when resolving a link's endpoints against the model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// Endpoint node does not exist.
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Source output port does not exist on the source node.
    #[error("output port `{port}` not found on node {node:?}")]
    OutputNotFound {
        /// Source node.
        node: NodeId,
        /// Missing port name.
        port: String,
    },

    /// Destination input port does not exist on the destination node.
    #[error("input port `{port}` not found on node {node:?}")]
    InputNotFound {
        /// Destination node.
        node: NodeId,
        /// Missing port name.
        port: String,
    },
}

/// Node and link collections owned by the canvas.
#[derive(Debug, Default)]
pub struct GraphModel {
    nodes: IndexMap<NodeId, Node>,
    links: Vec<Link>,
}

impl GraphModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all nodes and links.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
    }

    /// Create a node from a spec and record it after existing nodes.
    pub fn add_node(&mut self, spec: NodeSpec, pos: Pos2, grid: &Grid) -> NodeId {
        let node = Node::new(spec, pos, grid);
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Insert a prebuilt node (used when loading a document).
    pub fn insert_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and every link where it is source or destination.
    ///
    /// Returns the node and the cascaded links so the caller can notify the
    /// host about each removal.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<(Node, Vec<Link>)> {
        let node = self.nodes.shift_remove(&node_id)?;
        let mut removed = Vec::new();
        self.links.retain(|link| {
            if link.involves_node(node_id) {
                removed.push(link.clone());
                false
            } else {
                true
            }
        });
        Some((node, removed))
    }

    /// Get a node by ID.
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID.
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> {
        self.nodes.values()
    }

    /// All nodes, mutable.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// First node (in insertion order) whose paint rect contains the point.
    ///
    /// Valid only after a repaint has refreshed the paint rects.
    pub fn find_node_at(&self, pos: Pos2) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|node| node.paint_rect().contains(pos))
            .map(|node| node.id)
    }

    /// All links.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// All links, mutable (paint rect refresh during repaint).
    pub fn links_mut(&mut self) -> &mut [Link] {
        &mut self.links
    }

    /// Validate that a link's endpoints resolve to existing ports.
    pub fn resolve_link(
        &self,
        src_node: NodeId,
        src_output: &str,
        dst_node: NodeId,
        dst_input: &str,
    ) -> Result<(), LinkError> {
        let src = self
            .nodes
            .get(&src_node)
            .ok_or(LinkError::NodeNotFound(src_node))?;
        src.find_output(src_output)
            .ok_or_else(|| LinkError::OutputNotFound {
                node: src_node,
                port: src_output.to_owned(),
            })?;
        let dst = self
            .nodes
            .get(&dst_node)
            .ok_or(LinkError::NodeNotFound(dst_node))?;
        dst.find_input(dst_input)
            .ok_or_else(|| LinkError::InputNotFound {
                node: dst_node,
                port: dst_input.to_owned(),
            })?;
        Ok(())
    }

    /// Append a link whose endpoints have already been validated.
    pub fn add_link(&mut self, link: Link) -> usize {
        self.links.push(link);
        self.links.len() - 1
    }

    /// Remove a link by index.
    pub fn remove_link(&mut self, index: usize) -> Option<Link> {
        if index < self.links.len() {
            Some(self.links.remove(index))
        } else {
            None
        }
    }

    /// Remove every link into the named input. Returns the removed links.
    pub fn remove_links_to_input(&mut self, node_id: NodeId, input: &str) -> Vec<Link> {
        let mut removed = Vec::new();
        self.links.retain(|link| {
            if link.dst_node == node_id && link.dst_input == input {
                removed.push(link.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Remove every link out of the named output. Returns the removed links.
    pub fn remove_links_from_output(&mut self, node_id: NodeId, output: &str) -> Vec<Link> {
        let mut removed = Vec::new();
        self.links.retain(|link| {
            if link.src_node == node_id && link.src_output == output {
                removed.push(link.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Index of the link with the given endpoints.
    pub fn find_link(
        &self,
        src_node: NodeId,
        src_output: &str,
        dst_node: NodeId,
        dst_input: &str,
    ) -> Option<usize> {
        self.links
            .iter()
            .position(|link| link.connects(src_node, src_output, dst_node, dst_input))
    }

    /// Indices of all links into the named input.
    pub fn links_to(&self, node_id: NodeId, input: &str) -> Vec<usize> {
        self.links
            .iter()
            .enumerate()
            .filter(|(_, link)| link.dst_node == node_id && link.dst_input == input)
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether the link's source output carries execution flow.
    pub fn link_is_execution(&self, link: &Link) -> bool {
        self.output_flags(link).is_some_and(|f| f.execute)
    }

    /// Whether the link's source output is pull-capable data.
    pub fn link_is_pull(&self, link: &Link) -> bool {
        self.output_flags(link).is_some_and(|f| f.pull && !f.execute)
    }

    fn output_flags(&self, link: &Link) -> Option<crate::port::PortFlags> {
        let src = self.nodes.get(&link.src_node)?;
        let index = src.find_output(&link.src_output)?;
        Some(src.outputs[index].flags)
    }

    /// Nodes reachable by walking execution links forward from every
    /// `begin_sequence` output: the set of currently "active" nodes.
    pub fn sequence_nodes(&self) -> HashSet<NodeId> {
        let mut active = HashSet::new();
        for node in self.nodes.values() {
            for output in &node.outputs {
                if output.flags.begin_sequence {
                    self.unroll_from(node.id, &mut active);
                }
            }
        }
        active
    }

    fn unroll_from(&self, node_id: NodeId, active: &mut HashSet<NodeId>) {
        if !active.insert(node_id) {
            return;
        }
        for link in &self.links {
            if link.src_node == node_id && self.link_is_execution(link) {
                self.unroll_from(link.dst_node, active);
            }
        }
    }
}
