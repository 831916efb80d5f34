// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque semantic type of the data carried by a port.
///
/// The canvas never interprets the type beyond equality; the host's
/// connection predicate owns compatibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortTypeId(pub Uuid);

impl PortTypeId {
    /// Create a new random type ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortTypeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability flags of a port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortFlags {
    /// Carries control flow rather than data.
    pub execute: bool,
    /// Starts an execution sequence (outputs only).
    pub begin_sequence: bool,
    /// Data can be pulled on demand through this port; the formatter walks
    /// pull links backward.
    pub pull: bool,
    /// The port can be removed by the host.
    pub removable: bool,
    /// Paint a separator line above this port in the port list.
    pub spacer_above: bool,
    /// Paint a separator line below this port in the port list.
    pub spacer_below: bool,
}

/// A named, typed connection point on a node.
///
/// Direction is implied by which list (inputs or outputs) the port sits in;
/// names are unique within a node and direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique per node and direction.
    pub name: String,
    /// Semantic type.
    pub type_id: PortTypeId,
    /// Capability flags.
    pub flags: PortFlags,
    /// Icon/link color.
    pub color: [u8; 3],
}

impl Port {
    /// Create a data port.
    pub fn data(name: impl Into<String>, type_id: PortTypeId, color: [u8; 3]) -> Self {
        Self {
            name: name.into(),
            type_id,
            flags: PortFlags::default(),
            color,
        }
    }

    /// Create an execution port.
    pub fn execute(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: PortTypeId(Uuid::nil()),
            flags: PortFlags {
                execute: true,
                ..PortFlags::default()
            },
            color: [200, 200, 200],
        }
    }

    /// Create an execution port that starts a sequence.
    pub fn begin_sequence(name: impl Into<String>) -> Self {
        let mut port = Self::execute(name);
        port.flags.begin_sequence = true;
        port
    }

    /// Mark the port as pull-capable.
    pub fn with_pull(mut self) -> Self {
        self.flags.pull = true;
        self
    }

    /// Mark the port as removable.
    pub fn with_removable(mut self) -> Self {
        self.flags.removable = true;
        self
    }
}
