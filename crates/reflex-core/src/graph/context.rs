//! The evaluation context handed to detectors.
//!
//! Detectors are pure with respect to topic values within a pass: their
//! only side effects go through this context: immediate publication,
//! future publication, and timer operations. Immediate publications are
//! buffered and applied by the engine right after the detector's three
//! evaluation phases complete, at the detector's position in the
//! traversal; future publications and timer operations take effect
//! immediately.

use std::any::Any;

use smallvec::SmallVec;

use crate::graph::error::GraphError;
use crate::graph::input::InputQueue;
use crate::graph::registry::TopicRegistry;
use crate::graph::topic::TopicState;
use crate::graph::vertex::VertexId;
use crate::timeout::{TimeoutHandle, TimeoutPublisherService, TypedTimerDispatch};

/// One buffered immediate publication.
pub(crate) struct PendingPublish {
    pub topic: VertexId,
    pub value: Box<dyn Any>,
    pub type_name: &'static str,
}

/// Buffer of immediate publications produced by one detector evaluation.
pub(crate) type PendingPublishes = SmallVec<[PendingPublish; 4]>;

/// Side-effect surface available to a detector during its evaluation.
///
/// A context is only valid for the duration of one detector's processing;
/// every operation is checked against the declarations the detector made
/// at wiring time. A violated declaration does not panic: it fails the
/// current `evaluate()` call with a contract-violation error.
pub struct EvalContext<'a> {
    pub(crate) registry: &'a TopicRegistry,
    pub(crate) timers: &'a mut TimeoutPublisherService,
    pub(crate) input_queue: &'a mut InputQueue,
    pub(crate) pending: &'a mut PendingPublishes,
    pub(crate) publish_targets: &'a [VertexId],
    pub(crate) future_targets: &'a [VertexId],
    pub(crate) violation: &'a mut Option<GraphError>,
}

impl EvalContext<'_> {
    /// Publishes `value` to `Topic<T>` within the current pass.
    ///
    /// Requires a `publishes::<T>()` declaration. Values from several
    /// publishers concatenate on the topic in traversal order; the topic
    /// delivers them downstream later in the same pass.
    pub fn publish<T: TopicState + Clone + Default>(&mut self, value: T) {
        let Some(topic) = self.registry.lookup::<T>() else {
            self.fail(GraphError::UndeclaredPublish(std::any::type_name::<T>()));
            return;
        };
        if !self.publish_targets.contains(&topic) {
            self.fail(GraphError::UndeclaredPublish(std::any::type_name::<T>()));
            return;
        }
        self.pending.push(PendingPublish {
            topic,
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        });
    }

    /// Enqueues `value` for the next evaluation pass.
    ///
    /// Requires a `future_publishes::<T>()` (or timeout) declaration. This
    /// is the acyclic feedback mechanism: the value lands in the input
    /// queue and reaches `Topic<T>` in a subsequent pass.
    pub fn publish_future<T: TopicState + Clone + Default>(&mut self, value: T) {
        let Some(topic) = self.lookup_future_target::<T>() else {
            return;
        };
        if let Err(e) =
            self.input_queue
                .enqueue(topic, Box::new(value), std::any::type_name::<T>())
        {
            self.fail(e);
        }
    }

    /// Schedules `value` for publication `delay_ms` from now on the given
    /// timer handle.
    ///
    /// Requires a `timeout_publishes::<T>()` declaration and a handle
    /// acquired at wiring time. In the bounded build the slot must be
    /// empty; otherwise scheduling a pending handle resets it.
    pub fn schedule_timeout<T: TopicState + Clone + Default>(
        &mut self,
        value: T,
        delay_ms: u64,
        handle: TimeoutHandle,
    ) {
        let Some(topic) = self.lookup_future_target::<T>() else {
            return;
        };
        let dispatcher = Box::new(TypedTimerDispatch { topic, value });
        if let Err(e) = self
            .timers
            .schedule_timeout_erased(dispatcher, delay_ms, handle)
        {
            self.fail(GraphError::Timer(e));
        }
    }

    /// Cancels the scheduled timeout for `handle`; a no-op on an empty
    /// slot.
    pub fn cancel_timeout(&mut self, handle: TimeoutHandle) {
        self.timers.cancel(handle);
    }

    /// Returns true iff the timeout slot for `handle` is empty (never
    /// armed, fired, or cancelled).
    #[must_use]
    pub fn has_timeout_expired(&self, handle: TimeoutHandle) -> bool {
        self.timers.has_expired(handle)
    }

    /// Milliseconds since the epoch; may jump due to time sync. Typically
    /// used to stamp published values.
    #[must_use]
    pub fn wall_time_ms(&self) -> u64 {
        self.timers.wall_time_ms()
    }

    /// Strictly monotonic milliseconds since an unspecified origin.
    #[must_use]
    pub fn monotonic_time_ms(&self) -> u64 {
        self.timers.monotonic_time_ms()
    }

    fn lookup_future_target<T: TopicState + Clone + Default>(&mut self) -> Option<VertexId> {
        match self.registry.lookup::<T>() {
            Some(topic) if self.future_targets.contains(&topic) => Some(topic),
            _ => {
                self.fail(GraphError::UndeclaredFuturePublish(
                    std::any::type_name::<T>(),
                ));
                None
            }
        }
    }

    fn fail(&mut self, error: GraphError) {
        if self.violation.is_none() {
            *self.violation = Some(error);
        }
    }
}
