//! # Topic/detector graph
//!
//! The data model and evaluation engine: typed topics, detector compute
//! nodes, and the single-pass evaluation algorithm over their DAG.
//!
//! ## Overview
//!
//! - **[`Topic<T>`]**: typed channel holding the current-pass values of `T`
//! - **[`TopicState`]**: capability trait for values carried by topics
//! - **[`Detector`] / [`Subscriber<T>`]**: user compute nodes
//! - **[`Graph`]**: vertex ownership, toposort, evaluation, output list
//! - **[`EvalContext`]**: the side-effect surface handed to detectors
//! - **[`Lag<T>`]**: built-in one-pass feedback detector
//!
//! ## Key design points
//!
//! 1. **One input per pass**: every `evaluate()` consumes at most one
//!    entry from the input queue, so each output list describes exactly
//!    one cause.
//! 2. **Topological traversal**: dependencies always evaluate before
//!    their dependents; the sort runs lazily whenever the topology
//!    changed.
//! 3. **Future edges close loops**: feedback travels through the input
//!    queue into the next pass and is excluded from cycle detection.
//! 4. **Declared effects only**: a detector's publications are declared
//!    at wiring time and enforced at run time.

pub(crate) mod context;
pub(crate) mod detector;
pub(crate) mod engine;
pub(crate) mod error;
pub(crate) mod input;
pub(crate) mod lag;
pub(crate) mod registry;
pub(crate) mod topic;
pub(crate) mod vertex;

#[cfg(test)]
mod tests;

pub use context::EvalContext;
pub use detector::{Detector, DetectorHandle, Subscriber, Wiring};
pub use engine::{Graph, GraphMetrics};
pub use error::{ErrorKind, GraphError};
pub use lag::{Lag, Lagged};
pub use topic::{Topic, TopicReader, TopicState, TopicStateId, ANONYMOUS_TOPIC_STATE};
pub use vertex::{VertexId, VertexKind, VertexState};
