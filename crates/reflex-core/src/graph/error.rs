//! Error types for graph construction and evaluation.

use crate::graph::topic::TopicStateId;
use crate::graph::vertex::VertexId;
use crate::timeout::TimerError;

/// Coarse classification of engine failures.
///
/// Every concrete error maps onto one of these kinds; callers that only
/// care about policy (fail the pass vs. abort configuration) can match on
/// the kind instead of the full variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The graph itself is malformed: a cycle over immediate edges, an
    /// out-of-bounds edge, an exceeded bounded-build capacity, or a
    /// duplicate topic registration.
    BadConfiguration,
    /// A topic was resolved or dispatched to without ever being registered.
    MissingBinding,
    /// A runtime contract was broken: publishing an undeclared type,
    /// re-arming a busy timer slot in the bounded build, or enqueueing two
    /// future publications for the same topic.
    ContractViolation,
}

/// Errors that can occur during graph construction and evaluation.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The immediate-edge subgraph contains a cycle through the named
    /// vertex.
    #[error("cycle detected involving vertex: {0}")]
    CycleDetected(String),

    /// An edge points at a vertex that is not part of this graph.
    #[error("edge target {0} is not a vertex of this graph")]
    EdgeOutOfBounds(VertexId),

    /// A bounded-build capacity was exceeded.
    #[error("capacity exceeded: {what} (limit {limit})")]
    CapacityExceeded {
        /// Which container overflowed.
        what: &'static str,
        /// The configured limit.
        limit: usize,
    },

    /// A topic for this type is already registered.
    #[error("duplicate topic registration: {0}")]
    DuplicateTopic(&'static str),

    /// The topic-state id does not fit the bounded registry.
    #[error("topic state id {id} out of range for bounded registry (capacity {capacity})")]
    TopicIdOutOfRange {
        /// The offending id.
        id: TopicStateId,
        /// The registry capacity.
        capacity: usize,
    },

    /// Anonymous topic states cannot live in the bounded registry.
    #[error("anonymous topic state cannot be registered in a bounded registry: {0}")]
    AnonymousTopic(&'static str),

    /// A topic was resolved that was never registered (bounded build).
    #[error("topic not registered: {0}")]
    TopicNotRegistered(&'static str),

    /// A detector published a type it did not declare at wiring time.
    #[error("publish of undeclared topic: {0}")]
    UndeclaredPublish(&'static str),

    /// A detector future-published or timeout-published a type it did not
    /// declare a future edge for at wiring time.
    #[error("future publish of undeclared topic: {0}")]
    UndeclaredFuturePublish(&'static str),

    /// A second input for the same topic was enqueued in the bounded build.
    #[error("input already queued for topic: {0}")]
    DuplicateQueuedInput(&'static str),

    /// A topic carried more values in one pass than the bounded build
    /// allows.
    #[error("too many values published to topic {topic} in one pass (limit {limit})")]
    TopicValuesExceeded {
        /// The overflowing topic.
        topic: &'static str,
        /// The configured limit.
        limit: usize,
    },

    /// Timer service failure.
    #[error("timer error: {0}")]
    Timer(#[from] TimerError),
}

impl GraphError {
    /// Returns the coarse [`ErrorKind`] of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CycleDetected(_)
            | Self::EdgeOutOfBounds(_)
            | Self::CapacityExceeded { .. }
            | Self::DuplicateTopic(_)
            | Self::TopicIdOutOfRange { .. }
            | Self::AnonymousTopic(_)
            | Self::TopicValuesExceeded { .. } => ErrorKind::BadConfiguration,
            Self::TopicNotRegistered(_) => ErrorKind::MissingBinding,
            Self::UndeclaredPublish(_)
            | Self::UndeclaredFuturePublish(_)
            | Self::DuplicateQueuedInput(_) => ErrorKind::ContractViolation,
            Self::Timer(e) => e.kind(),
        }
    }
}
