//! One-pass lag: the built-in feedback detector.
//!
//! `Lag<T>` subscribes to `Topic<T>` and future-publishes [`Lagged<T>`]
//! carrying the observed value. Downstream detectors subscribe to
//! `Lagged<T>` to see the previous pass's value of `T` without creating a
//! cycle:
//!
//! ```text
//!   Topic<T> ──▶ Lag<T> ┄┄future┄┄▶ Topic<Lagged<T>> ──▶ consumers
//! ```
//!
//! Prefer `Lag<T>` over an ad-hoc future publication when downstream parts
//! of the graph also consume the looped value; the lag makes the one-pass
//! delay explicit in the topology.

use std::marker::PhantomData;

use crate::graph::context::EvalContext;
use crate::graph::detector::{Detector, DetectorHandle, Subscriber};
use crate::graph::engine::Graph;
use crate::graph::error::GraphError;
use crate::graph::topic::TopicState;

/// The output of [`Lag<T>`]: the value `T` held one pass ago.
///
/// Anonymous by design; snapshots capture the live `T`, not its echo.
#[derive(Debug, Clone, Default)]
pub struct Lagged<T: TopicState> {
    /// The lagged value.
    pub data: T,
}

impl<T: TopicState + Clone + Default> TopicState for Lagged<T> {}

/// Detector that delays `Topic<T>` by exactly one pass.
///
/// Added with [`Graph::add_lag`].
pub struct Lag<T> {
    _marker: PhantomData<fn(T)>,
}

impl<T> Default for Lag<T> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: TopicState + Clone + Default> Subscriber<T> for Lag<T> {
    fn evaluate(&mut self, value: &T, ctx: &mut EvalContext<'_>) {
        ctx.publish_future(Lagged {
            data: value.clone(),
        });
    }
}

impl<T: TopicState + Clone + Default> Detector for Lag<T> {}

impl Graph {
    /// Adds the built-in [`Lag<T>`] detector for `Topic<T>`.
    ///
    /// # Errors
    ///
    /// Propagates wiring errors, as [`add_detector`](Self::add_detector).
    pub fn add_lag<T: TopicState + Clone + Default>(
        &mut self,
    ) -> Result<DetectorHandle<Lag<T>>, GraphError> {
        self.add_detector(Lag::default(), |_, wiring| {
            wiring.subscribe::<T>().future_publishes::<Lagged<T>>();
        })
    }
}
