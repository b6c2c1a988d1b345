//! # Reflex Core
//!
//! A synchronous, data-flow evaluation engine for embedded and systems
//! software. Application logic is expressed as a DAG of **topics** (typed
//! data channels) and **detectors** (pure, type-constrained compute
//! nodes). External inputs enter a FIFO queue; each evaluation pass
//! dispatches one input, propagates derived values in a single
//! topologically ordered sweep, and exposes the set of topics that
//! changed.
//!
//! ## Design principles
//!
//! 1. **Single-threaded, cooperative, synchronous**: no operation
//!    suspends; `evaluate()` runs to completion.
//! 2. **One input per pass**: every output list describes exactly one
//!    cause, which makes graphs deterministic and replayable.
//! 3. **Acyclic by construction**: feedback is expressed through future
//!    publications that cross passes instead of edges that close cycles.
//! 4. **Bounded-memory option**: the bounded configuration pins every
//!    capacity at construction time for constrained targets.
//!
//! ## Example
//!
//! ```rust
//! use reflex_core::{Detector, EvalContext, Graph, Subscriber, TopicState};
//!
//! #[derive(Debug, Clone, Default)]
//! struct Celsius(f64);
//! impl TopicState for Celsius {}
//!
//! #[derive(Debug, Clone, Default)]
//! struct Overheated(bool);
//! impl TopicState for Overheated {}
//!
//! #[derive(Default)]
//! struct ThresholdDetector;
//!
//! impl Subscriber<Celsius> for ThresholdDetector {
//!     fn evaluate(&mut self, value: &Celsius, ctx: &mut EvalContext<'_>) {
//!         ctx.publish(Overheated(value.0 > 90.0));
//!     }
//! }
//! impl Detector for ThresholdDetector {}
//!
//! # fn main() -> Result<(), reflex_core::Error> {
//! let mut graph = Graph::new();
//! graph.add_detector(ThresholdDetector, |_, w| {
//!     w.subscribe::<Celsius>().publishes::<Overheated>();
//! })?;
//!
//! graph.push(Celsius(96.5))?;
//! graph.evaluate()?;
//! assert!(graph.topic::<Overheated>()?.new_value().unwrap().0);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analyzer;
pub mod config;
pub mod container;
pub mod graph;
pub mod snapshot;
pub mod timeout;

pub use config::{limits, GraphConfig, RegistryMode};
pub use container::{OutputHandler, ProcessorContainer};
pub use graph::{
    Detector, DetectorHandle, ErrorKind, EvalContext, Graph, GraphError, GraphMetrics, Lag,
    Lagged, Subscriber, Topic, TopicReader, TopicState, TopicStateId, VertexId, VertexKind,
    VertexState, Wiring, ANONYMOUS_TOPIC_STATE,
};
pub use snapshot::{GraphStateStore, ResumeFromSnapshot, SnapshotError, StateSnapshot};
pub use timeout::manual::{ManualClock, ManualTimerDriver, TimerFiring};
pub use timeout::{
    NoopTimerDriver, TimeoutHandle, TimeoutPublisherService, TimerDriver, TimerError,
};

/// Result type for reflex-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type aggregating every module's failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Graph construction or evaluation errors.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Timer service errors.
    #[error("timer error: {0}")]
    Timer(#[from] TimerError),

    /// Snapshot composition errors.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl Error {
    /// Returns the coarse [`ErrorKind`] of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Graph(e) => e.kind(),
            Self::Timer(e) => e.kind(),
            Self::Snapshot(e) => e.kind(),
        }
    }
}
