//! Vertex bookkeeping: identifiers, per-pass state, and edge sets.

use std::fmt;

use smallvec::SmallVec;

use crate::graph::detector::DetectorNode;
use crate::graph::topic::AnyTopic;

/// Unique identifier for a vertex in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexId(pub u32);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VertexId({})", self.0)
    }
}

impl VertexId {
    /// Returns the vertex id as a slot index.
    #[inline]
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-pass vertex state.
///
/// Doubles as the white/grey/black marker of the topological sort and as
/// the evaluation gate during the traversal sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VertexState {
    /// Untouched this pass (white).
    #[default]
    Clear,
    /// Holds unprocessed data, or is on the DFS stack (grey).
    Processing,
    /// Fully processed this pass (black).
    Done,
}

/// Classification of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    /// A typed data channel.
    Topic,
    /// A user compute node.
    Detector,
}

/// Edge list with inline capacity for the common small fan-in/fan-out.
pub(crate) type EdgeVec = SmallVec<[VertexId; 4]>;

/// The node payload of a vertex slot.
pub(crate) enum VertexNode {
    /// A topic channel, type-erased.
    Topic(Box<dyn AnyTopic>),
    /// A detector. `None` only while the detector is temporarily moved out
    /// during its own processing.
    Detector(Option<DetectorNode>),
}

/// A graph-owned vertex: node payload plus pass-state and edge sets.
///
/// Immediate edges drive the topological sort and the traversal; future
/// edges only inform diagnostics and are excluded from cycle detection.
pub(crate) struct VertexSlot {
    /// Diagnostic name (the node's type name).
    pub name: &'static str,
    /// Per-pass state.
    pub state: VertexState,
    /// Immediate successors.
    pub out_edges: EdgeVec,
    /// Immediate predecessors.
    pub in_edges: EdgeVec,
    /// Future successors (publications landing in a later pass).
    pub future_out_edges: EdgeVec,
    /// Future predecessors.
    pub future_in_edges: EdgeVec,
    /// The node itself.
    pub node: VertexNode,
}

impl VertexSlot {
    pub(crate) fn new(name: &'static str, node: VertexNode) -> Self {
        Self {
            name,
            state: VertexState::Clear,
            out_edges: EdgeVec::new(),
            in_edges: EdgeVec::new(),
            future_out_edges: EdgeVec::new(),
            future_in_edges: EdgeVec::new(),
            node,
        }
    }

    pub(crate) fn kind(&self) -> VertexKind {
        match self.node {
            VertexNode::Topic(_) => VertexKind::Topic,
            VertexNode::Detector(_) => VertexKind::Detector,
        }
    }

    pub(crate) fn as_topic(&self) -> Option<&dyn AnyTopic> {
        match &self.node {
            VertexNode::Topic(t) => Some(t.as_ref()),
            VertexNode::Detector(_) => None,
        }
    }

    pub(crate) fn as_topic_mut(&mut self) -> Option<&mut dyn AnyTopic> {
        match &mut self.node {
            VertexNode::Topic(t) => Some(t.as_mut()),
            VertexNode::Detector(_) => None,
        }
    }
}

impl fmt::Debug for VertexSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexSlot")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("state", &self.state)
            .field("out_edges", &self.out_edges)
            .field("in_edges", &self.in_edges)
            .finish_non_exhaustive()
    }
}
