//! Identifier types shared across the crate.
//!
//! Ids are plain `i32` so they cross the Slint boundary unchanged.

pub type NodeId = i32;
pub type GroupId = i32;
pub type LinkId = i32;
pub type RerouteId = i32;
pub type GraphId = i32;
pub type WidgetId = i32;

/// Graph id of the root graph.
pub const ROOT_GRAPH_ID: GraphId = 0;

/// Pseudo node holding a subgraph's input boundary slots.
///
/// Inside a subgraph, links start from these slots, so they behave as
/// outputs.
pub const SUBGRAPH_INPUT_ID: NodeId = -10;

/// Pseudo node holding a subgraph's output boundary slots (behave as inputs).
pub const SUBGRAPH_OUTPUT_ID: NodeId = -20;

/// Which side of a node a slot sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotKind {
    Input,
    Output,
}

impl SlotKind {
    pub fn opposite(self) -> SlotKind {
        match self {
            SlotKind::Input => SlotKind::Output,
            SlotKind::Output => SlotKind::Input,
        }
    }

    pub fn is_input(self) -> bool {
        self == SlotKind::Input
    }

    pub fn from_is_input(is_input: bool) -> SlotKind {
        if is_input {
            SlotKind::Input
        } else {
            SlotKind::Output
        }
    }
}

/// A slot on a specific node: `(node, index, kind)`.
///
/// Also the key under which DOM-measured slot layouts are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotRef {
    pub node: NodeId,
    pub index: usize,
    pub kind: SlotKind,
}

impl SlotRef {
    pub const fn input(node: NodeId, index: usize) -> Self {
        Self {
            node,
            index,
            kind: SlotKind::Input,
        }
    }

    pub const fn output(node: NodeId, index: usize) -> Self {
        Self {
            node,
            index,
            kind: SlotKind::Output,
        }
    }

    /// Slot on a subgraph boundary pseudo node.
    pub fn is_boundary(&self) -> bool {
        self.node == SUBGRAPH_INPUT_ID || self.node == SUBGRAPH_OUTPUT_ID
    }
}

/// A node addressed across graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub graph: GraphId,
    pub node: NodeId,
}

impl NodeRef {
    pub const fn new(graph: GraphId, node: NodeId) -> Self {
        Self { graph, node }
    }
}
