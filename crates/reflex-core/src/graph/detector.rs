//! Detectors: user compute nodes.
//!
//! A detector subscribes to a set of topics, publishes to another set, and
//! may keep per-instance state across passes. Implementations provide:
//!
//! - [`Detector`], with optional [`begin_evaluation`](Detector::begin_evaluation)
//!   and [`complete_evaluation`](Detector::complete_evaluation) hooks for
//!   summarising across multiple inputs of one pass;
//! - one [`Subscriber<T>`] impl per subscribed topic-state type.
//!
//! The wiring closure passed to [`Graph::add_detector`](crate::Graph::add_detector)
//! is the construction contract: it declares exactly one subscription per
//! `Subscriber` impl and one publishing, future-publishing, timeout or
//! periodic intent per produced type. The engine enforces the declarations
//! structurally: publishing an undeclared type at run time is a contract
//! violation surfaced by `evaluate()`.
//!
//! Within a pass, a detector is evaluated at most once, in three phases:
//! `begin_evaluation`, one `evaluate` call per new value on each subscribed
//! topic (in subscription order), then `complete_evaluation`.

use std::any::Any;
use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::graph::context::EvalContext;
use crate::graph::engine::Graph;
use crate::graph::error::GraphError;
use crate::graph::topic::{AnyTopic, Topic, TopicState};
use crate::graph::vertex::{EdgeVec, VertexId};
use crate::timeout::{TimeoutHandle, TypedTimerDispatch};

/// A unit of logic in the graph.
///
/// Detectors are compartmentalized algorithms with fixed input types
/// (subscriptions) and fixed output types (publications), both declared at
/// wiring time. The evaluation hooks have empty default bodies; detectors
/// that summarise across several `evaluate` calls publish from
/// `complete_evaluation`.
pub trait Detector: Any {
    /// Called before any `evaluate` call of the pass.
    fn begin_evaluation(&mut self, ctx: &mut EvalContext<'_>) {
        let _ = ctx;
    }

    /// Called after all `evaluate` calls of the pass.
    fn complete_evaluation(&mut self, ctx: &mut EvalContext<'_>) {
        let _ = ctx;
    }
}

/// The subscriber behavior for one topic-state type.
///
/// A detector implements `Subscriber<T>` once per subscribed `T`; the
/// engine invokes [`evaluate`](Self::evaluate) once per value the topic
/// carries in the pass, in publication order.
pub trait Subscriber<T: TopicState> {
    /// Consumes one input value.
    fn evaluate(&mut self, value: &T, ctx: &mut EvalContext<'_>);
}

/// Type-erased edge from a topic into one subscriber of a detector.
///
/// Detectors own a small ordered list of these, one per subscribed type;
/// the list order is the subscription order and drives the evaluation
/// order within a pass.
pub(crate) trait SubscriptionDispatch {
    /// The topic vertex this dispatcher reads from.
    fn topic_vertex(&self) -> VertexId;
    /// Invokes the subscriber once per value held by `topic`.
    fn dispatch(&self, topic: &dyn AnyTopic, detector: &mut dyn Detector, ctx: &mut EvalContext<'_>);
}

struct TypedDispatcher<D, T> {
    topic: VertexId,
    _marker: PhantomData<fn(D, T)>,
}

impl<D, T> SubscriptionDispatch for TypedDispatcher<D, T>
where
    D: Detector + Subscriber<T>,
    T: TopicState + Clone + Default,
{
    fn topic_vertex(&self) -> VertexId {
        self.topic
    }

    fn dispatch(
        &self,
        topic: &dyn AnyTopic,
        detector: &mut dyn Detector,
        ctx: &mut EvalContext<'_>,
    ) {
        let topic = (topic as &dyn Any)
            .downcast_ref::<Topic<T>>()
            .expect("dispatcher bound to a topic of another type");
        let detector = (detector as &mut dyn Any)
            .downcast_mut::<D>()
            .expect("dispatcher bound to a detector of another type");
        for value in topic.values() {
            detector.evaluate(value, ctx);
        }
    }
}

/// A wired detector as stored in its vertex slot.
pub(crate) struct DetectorNode {
    pub imp: Box<dyn Detector>,
    /// Subscription dispatchers in subscription order.
    pub dispatchers: SmallVec<[Box<dyn SubscriptionDispatch>; 4]>,
    /// Topics this detector may publish immediately.
    pub publish_targets: EdgeVec,
    /// Topics this detector may future-publish or timeout-publish.
    pub future_targets: EdgeVec,
}

/// Typed handle to a detector added to a graph.
///
/// Used to read the detector back ([`Graph::detector`](crate::Graph::detector))
/// or to remove it ([`Graph::remove_detector`](crate::Graph::remove_detector)).
pub struct DetectorHandle<D: Detector> {
    pub(crate) id: VertexId,
    pub(crate) _marker: PhantomData<fn() -> D>,
}

impl<D: Detector> std::fmt::Debug for DetectorHandle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle").field("id", &self.id).finish()
    }
}

impl<D: Detector> Clone for DetectorHandle<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: Detector> Copy for DetectorHandle<D> {}

impl<D: Detector> DetectorHandle<D> {
    /// The vertex id of the detector.
    #[must_use]
    pub fn vertex(&self) -> VertexId {
        self.id
    }
}

/// Construction-time declaration surface of a detector.
///
/// Passed to the wiring closure of
/// [`Graph::add_detector`](crate::Graph::add_detector). Every method
/// latches the first error and turns the rest of the wiring into no-ops;
/// `add_detector` unwinds the half-wired vertex and reports the error.
pub struct Wiring<'g, D: Detector> {
    pub(crate) graph: &'g mut Graph,
    pub(crate) id: VertexId,
    pub(crate) dispatchers: SmallVec<[Box<dyn SubscriptionDispatch>; 4]>,
    pub(crate) publish_targets: EdgeVec,
    pub(crate) future_targets: EdgeVec,
    pub(crate) error: Option<GraphError>,
    pub(crate) _marker: PhantomData<fn(D)>,
}

impl<D: Detector> Wiring<'_, D> {
    /// Declares a subscription to `Topic<T>`.
    ///
    /// Records an in-edge from the topic to this detector and appends a
    /// dispatcher; within a pass, subscribed topics are evaluated in the
    /// order they were subscribed.
    pub fn subscribe<T>(&mut self) -> &mut Self
    where
        D: Subscriber<T>,
        T: TopicState + Clone + Default,
    {
        if self.error.is_some() {
            return self;
        }
        match self.graph.resolve_topic::<T>() {
            Ok(topic) => {
                if let Err(e) = self.graph.insert_edge(topic, self.id) {
                    self.error = Some(e);
                    return self;
                }
                self.dispatchers.push(Box::new(TypedDispatcher::<D, T> {
                    topic,
                    _marker: PhantomData,
                }));
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Declares that this detector publishes `T` within the pass.
    ///
    /// Records an out-edge from this detector to `Topic<T>`.
    pub fn publishes<T>(&mut self) -> &mut Self
    where
        T: TopicState + Clone + Default,
    {
        if self.error.is_some() {
            return self;
        }
        match self.graph.resolve_topic::<T>() {
            Ok(topic) => {
                if let Err(e) = self.graph.insert_edge(self.id, topic) {
                    self.error = Some(e);
                    return self;
                }
                self.publish_targets.push(topic);
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Declares that this detector publishes `T` into a future pass.
    ///
    /// Records a future edge only, so the publication does not constrain
    /// the topological order, which is what lets feedback loops stay
    /// acyclic.
    pub fn future_publishes<T>(&mut self) -> &mut Self
    where
        T: TopicState + Clone + Default,
    {
        if self.error.is_some() {
            return self;
        }
        match self.graph.resolve_topic::<T>() {
            Ok(topic) => {
                self.graph.mark_future_edge(self.id, topic);
                self.future_targets.push(topic);
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Declares that this detector publishes `T` through the timer
    /// service.
    ///
    /// Equivalent to a future-publishing declaration; timed values travel
    /// through the input queue like any future publication.
    pub fn timeout_publishes<T>(&mut self) -> &mut Self
    where
        T: TopicState + Clone + Default,
    {
        self.future_publishes::<T>()
    }

    /// Registers a periodic publication of `T::default()` every
    /// `period_ms`.
    ///
    /// The metronome period becomes the GCD of all registered periods;
    /// call [`Graph::start_periodic`](crate::Graph::start_periodic) to arm
    /// it.
    pub fn periodic_publishes<T>(&mut self, period_ms: u64) -> &mut Self
    where
        T: TopicState + Clone + Default,
    {
        if self.error.is_some() {
            return self;
        }
        match self.graph.resolve_topic::<T>() {
            Ok(topic) => {
                self.graph.mark_future_edge(self.id, topic);
                self.future_targets.push(topic);
                let dispatcher = Box::new(TypedTimerDispatch {
                    topic,
                    value: T::default(),
                });
                if let Err(e) = self
                    .graph
                    .timers
                    .schedule_periodic_erased(dispatcher, period_ms)
                {
                    self.error = Some(GraphError::Timer(e));
                }
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Acquires a fresh one-shot timer handle for this detector to keep.
    #[must_use]
    pub fn unique_timer_handle(&mut self) -> TimeoutHandle {
        self.graph.timers.unique_handle()
    }
}
