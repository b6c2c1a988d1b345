//! The graph: vertex ownership, topological order, single-pass evaluation.
//!
//! A [`Graph`] owns all vertices (topics and detectors), maintains a valid
//! topological order across topology changes, and evaluates one pass at a
//! time. A pass consumes at most one entry from the input queue, publishes
//! it into its topic, sweeps every vertex in topological order, and
//! rebuilds the output list from the topics that hold values.
//!
//! # Evaluation
//!
//! ```text
//!  push(T)/timer ──▶ input queue ──▶ evaluate()
//!                                      │ 1. re-sort if dirty
//!                                      │ 2. clear pass-states
//!                                      │ 3. dequeue one input → Topic<T>
//!                                      │ 4. traverse in topo order
//!                                      │      topic: Done, mark children
//!                                      │      detector: begin/dispatch*/complete
//!                                      │ 5. compose output list
//!                                      ▼
//!                              output_list(): &[Arc<dyn TopicState>]
//! ```
//!
//! The topological sort is a depth-first search over immediate out-edges
//! that reuses the per-vertex pass-state as its white/grey/black marker;
//! future edges are ignored, which is what keeps feedback loops legal.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::config::{GraphConfig, RegistryMode};
use crate::graph::context::{EvalContext, PendingPublishes};
use crate::graph::detector::{Detector, DetectorHandle, DetectorNode, Wiring};
use crate::graph::error::GraphError;
use crate::graph::input::InputQueue;
use crate::graph::registry::TopicRegistry;
use crate::graph::topic::{Topic, TopicReader, TopicState};
use crate::graph::vertex::{VertexId, VertexKind, VertexNode, VertexSlot, VertexState};
use crate::timeout::{NoopTimerDriver, TimeoutHandle, TimeoutPublisherService, TimerDriver};

const SLOT_INVARIANT: &str = "vertex slot vacated while reachable";

/// Counters tracked across evaluation passes.
#[derive(Debug, Clone, Default)]
pub struct GraphMetrics {
    /// Total `evaluate()` passes run.
    pub passes: u64,
    /// Total inputs consumed from the input queue.
    pub inputs_consumed: u64,
    /// Total values published into topics.
    pub values_published: u64,
    /// Total timer firings delivered into the input queue.
    pub timer_firings: u64,
}

/// A graph of topics and detectors with input, evaluation and output APIs.
///
/// The graph owns every vertex. Topics are created on demand (dynamic
/// registry) or pre-registered (bounded registry); detectors are added
/// with [`add_detector`](Self::add_detector) and the graph creates the
/// topics needed to satisfy their declared dependencies.
///
/// Typical control flow: external events are translated into topic states
/// and passed to [`push`](Self::push); [`evaluate_if_pending`](Self::evaluate_if_pending)
/// runs in a loop until false; after each pass
/// [`output_list`](Self::output_list) is inspected for values that must be
/// passed onwards.
pub struct Graph {
    config: GraphConfig,
    pub(crate) vertices: Vec<Option<VertexSlot>>,
    /// Topologically sorted evaluation order; stale iff `needs_sorting`.
    order: Vec<VertexId>,
    pub(crate) registry: TopicRegistry,
    pub(crate) input_queue: InputQueue,
    pub(crate) timers: TimeoutPublisherService,
    output_list: Vec<std::sync::Arc<dyn TopicState>>,
    needs_sorting: bool,
    metrics: GraphMetrics,
}

impl Graph {
    /// Creates an unbounded, dynamic-registry graph with a no-op timer
    /// driver.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Creates a graph with the given configuration.
    #[must_use]
    pub fn with_config(config: GraphConfig) -> Self {
        let registry = match config.registry {
            RegistryMode::Dynamic => TopicRegistry::dynamic(),
            RegistryMode::Bounded => TopicRegistry::bounded(config.max_topics),
        };
        let timers = TimeoutPublisherService::new(
            Box::new(NoopTimerDriver),
            config.max_timeouts,
            config.max_periodic_timers,
            config.is_bounded(),
        );
        let input_queue = InputQueue::new(config.is_bounded());
        debug!("graph initialized");
        Self {
            config,
            vertices: Vec::new(),
            order: Vec::new(),
            registry,
            input_queue,
            timers,
            output_list: Vec::new(),
            needs_sorting: false,
            metrics: GraphMetrics::default(),
        }
    }

    /// Installs the embedder's timer driver.
    ///
    /// Must happen before any timer is scheduled; armings programmed on
    /// the previous driver are not migrated.
    pub fn set_timer_driver(&mut self, driver: Box<dyn TimerDriver>) {
        self.timers.set_driver(driver);
    }

    // ---- Topic registration and lookup ----

    /// Registers `Topic<T>` as a vertex of this graph.
    ///
    /// Required for every topic in the bounded build, before any detector
    /// that depends on it is wired; optional in the dynamic build.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateTopic`] when `T` is already
    /// registered, [`GraphError::AnonymousTopic`] /
    /// [`GraphError::TopicIdOutOfRange`] for ids the bounded registry
    /// cannot hold, and [`GraphError::CapacityExceeded`] when the topic or
    /// vertex capacity is exhausted.
    pub fn register_topic<T: TopicState + Clone + Default>(
        &mut self,
    ) -> Result<VertexId, GraphError> {
        self.registry.check_insert::<T>()?;
        if self.registry.len() >= self.config.max_topics {
            return Err(GraphError::CapacityExceeded {
                what: "topics",
                limit: self.config.max_topics,
            });
        }
        let id = self.alloc_vertex(
            std::any::type_name::<T>(),
            VertexNode::Topic(Box::new(Topic::<T>::new())),
        )?;
        self.registry
            .insert::<T>(id)
            .expect("registration was validated");
        Ok(id)
    }

    /// Resolves the unique topic vertex for `T`.
    ///
    /// In the dynamic build the topic is created on first use; in the
    /// bounded build it must have been pre-registered.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::TopicNotRegistered`] in the bounded build for
    /// an unregistered topic, or any [`register_topic`](Self::register_topic)
    /// error in the dynamic build.
    pub fn resolve_topic<T: TopicState + Clone + Default>(
        &mut self,
    ) -> Result<VertexId, GraphError> {
        if let Some(id) = self.registry.lookup::<T>() {
            return Ok(id);
        }
        match self.config.registry {
            RegistryMode::Dynamic => self.register_topic::<T>(),
            RegistryMode::Bounded => {
                Err(GraphError::TopicNotRegistered(std::any::type_name::<T>()))
            }
        }
    }

    /// Returns a read view of `Topic<T>` and its pass-state.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::TopicNotRegistered`] when `T` has no topic in
    /// this graph.
    pub fn topic<T: TopicState + Clone + Default>(
        &self,
    ) -> Result<TopicReader<'_, T>, GraphError> {
        let Some(id) = self.registry.lookup::<T>() else {
            return Err(GraphError::TopicNotRegistered(std::any::type_name::<T>()));
        };
        let slot = self.vertices[id.index()].as_ref().expect(SLOT_INVARIANT);
        let topic = (slot.as_topic().expect("registry entry is not a topic") as &dyn Any)
            .downcast_ref::<Topic<T>>()
            .expect("registry entry topic type mismatch");
        Ok(TopicReader {
            state: slot.state,
            topic,
        })
    }

    // ---- Detector registration ----

    /// Adds a detector to the graph.
    ///
    /// The wiring closure receives the detector (for handle storage and
    /// the like) and the [`Wiring`] surface on which it must declare every
    /// subscription and publishing intent; see [`Wiring`] for the
    /// contract.
    ///
    /// # Errors
    ///
    /// Any error latched during wiring (unresolvable topic, exceeded
    /// capacity, timer misconfiguration) unwinds the half-added vertex and
    /// is returned.
    pub fn add_detector<D, F>(
        &mut self,
        detector: D,
        wire: F,
    ) -> Result<DetectorHandle<D>, GraphError>
    where
        D: Detector,
        F: FnOnce(&mut D, &mut Wiring<'_, D>),
    {
        let id = self.alloc_vertex(std::any::type_name::<D>(), VertexNode::Detector(None))?;
        let mut detector = detector;
        let mut wiring = Wiring {
            graph: self,
            id,
            dispatchers: SmallVec::new(),
            publish_targets: SmallVec::new(),
            future_targets: SmallVec::new(),
            error: None,
            _marker: PhantomData,
        };
        wire(&mut detector, &mut wiring);
        let Wiring {
            dispatchers,
            publish_targets,
            future_targets,
            error,
            ..
        } = wiring;
        if let Some(error) = error {
            self.unlink_vertex(id);
            self.vertices[id.index()] = None;
            return Err(error);
        }
        let slot = self.vertices[id.index()].as_mut().expect(SLOT_INVARIANT);
        slot.node = VertexNode::Detector(Some(DetectorNode {
            imp: Box::new(detector),
            dispatchers,
            publish_targets,
            future_targets,
        }));
        self.needs_sorting = true;
        Ok(DetectorHandle {
            id,
            _marker: PhantomData,
        })
    }

    /// Returns a shared reference to an added detector.
    ///
    /// `None` when the detector was removed.
    #[must_use]
    pub fn detector<D: Detector>(&self, handle: DetectorHandle<D>) -> Option<&D> {
        let slot = self.vertices.get(handle.id.index())?.as_ref()?;
        match &slot.node {
            VertexNode::Detector(Some(node)) => {
                (node.imp.as_ref() as &dyn Any).downcast_ref::<D>()
            }
            _ => None,
        }
    }

    /// Returns a mutable reference to an added detector.
    #[must_use]
    pub fn detector_mut<D: Detector>(&mut self, handle: DetectorHandle<D>) -> Option<&mut D> {
        let slot = self.vertices.get_mut(handle.id.index())?.as_mut()?;
        match &mut slot.node {
            VertexNode::Detector(Some(node)) => {
                (node.imp.as_mut() as &mut dyn Any).downcast_mut::<D>()
            }
            _ => None,
        }
    }

    /// Removes a detector: tears down its subscriptions, edges and vertex,
    /// and marks the graph for re-sorting. The topics it used stay.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EdgeOutOfBounds`] when the handle no longer
    /// names a detector of this graph.
    pub fn remove_detector<D: Detector>(
        &mut self,
        handle: DetectorHandle<D>,
    ) -> Result<(), GraphError> {
        let is_detector = self
            .vertices
            .get(handle.id.index())
            .and_then(Option::as_ref)
            .is_some_and(|slot| slot.kind() == VertexKind::Detector);
        if !is_detector {
            return Err(GraphError::EdgeOutOfBounds(handle.id));
        }
        self.unlink_vertex(handle.id);
        self.vertices[handle.id.index()] = None;
        self.needs_sorting = true;
        Ok(())
    }

    // ---- Input and evaluation ----

    /// Enqueues a publication of `value` for a future pass.
    ///
    /// Non-blocking, never evaluates; the value reaches `Topic<T>` when a
    /// subsequent [`evaluate`](Self::evaluate) call dequeues it.
    ///
    /// # Errors
    ///
    /// Topic resolution errors as in [`resolve_topic`](Self::resolve_topic);
    /// [`GraphError::DuplicateQueuedInput`] when the bounded build already
    /// holds a pending input for this topic.
    pub fn push<T: TopicState + Clone + Default>(&mut self, value: T) -> Result<(), GraphError> {
        let topic = self.resolve_topic::<T>()?;
        self.input_queue
            .enqueue(topic, Box::new(value), std::any::type_name::<T>())
    }

    /// Returns true iff inputs are pending evaluation.
    ///
    /// Each pass consumes a single input, so a flush loop keeps calling
    /// [`evaluate`](Self::evaluate) until this is false.
    #[must_use]
    pub fn has_data_pending(&self) -> bool {
        !self.input_queue.is_empty()
    }

    /// Evaluates one pass if data is pending; returns whether it did.
    ///
    /// # Errors
    ///
    /// Propagates [`evaluate`](Self::evaluate) errors.
    pub fn evaluate_if_pending(&mut self) -> Result<bool, GraphError> {
        if self.has_data_pending() {
            self.evaluate()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Runs a single evaluation pass.
    ///
    /// Re-sorts if the topology changed, clears every pass-state, dequeues
    /// and publishes at most one input, traverses all vertices in
    /// topological order, and composes the output list. With an empty
    /// input queue this is a successful no-op pass with an empty output
    /// list.
    ///
    /// # Errors
    ///
    /// [`GraphError::CycleDetected`] / [`GraphError::EdgeOutOfBounds`] for
    /// malformed topologies, capacity errors in the bounded build, and
    /// contract violations committed by detectors during the pass.
    pub fn evaluate(&mut self) -> Result<(), GraphError> {
        if self.needs_sorting {
            self.topo_sort()?;
        }
        for slot in self.vertices.iter_mut().flatten() {
            slot.state = VertexState::Clear;
        }
        self.output_list.clear();
        if let Some(input) = self.input_queue.dequeue() {
            self.publish_into(input.topic, input.value, input.type_name)?;
            self.metrics.inputs_consumed += 1;
        }
        for position in 0..self.order.len() {
            let id = self.order[position];
            let kind = self.vertices[id.index()]
                .as_ref()
                .expect(SLOT_INVARIANT)
                .kind();
            match kind {
                VertexKind::Topic => self.process_topic(id),
                VertexKind::Detector => self.process_detector(id)?,
            }
        }
        self.compose_output_list();
        self.metrics.passes += 1;
        Ok(())
    }

    /// The values published during the last pass, one entry per topic
    /// value, in topological order across topics and insertion order
    /// within a topic.
    ///
    /// Valid until the next [`evaluate`](Self::evaluate) call; consumers
    /// either copy values out or finish inspection before then.
    #[must_use]
    pub fn output_list(&self) -> &[std::sync::Arc<dyn TopicState>] {
        &self.output_list
    }

    /// Returns the evaluation counters.
    #[must_use]
    pub fn metrics(&self) -> &GraphMetrics {
        &self.metrics
    }

    /// Number of live vertices (topics plus detectors).
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.iter().flatten().count()
    }

    /// Number of inputs waiting in the queue.
    #[must_use]
    pub fn pending_inputs(&self) -> usize {
        self.input_queue.len()
    }

    // ---- Timer service surface ----

    /// Read access to the timer service (handles, expiry queries).
    #[must_use]
    pub fn timer_service(&self) -> &TimeoutPublisherService {
        &self.timers
    }

    /// Mutable access to the timer service.
    #[must_use]
    pub fn timer_service_mut(&mut self) -> &mut TimeoutPublisherService {
        &mut self.timers
    }

    /// Arms the metronome for all registered periodic publications.
    pub fn start_periodic(&mut self) {
        self.timers.start_periodic();
    }

    /// Embedder entry point: the one-shot timer for `handle` fired.
    ///
    /// Publishes the stored value into the input queue and frees the slot;
    /// silently skips slots cleared by cancellation.
    ///
    /// # Errors
    ///
    /// Only the bounded build can fail here, when the input queue already
    /// holds an entry for the timed topic.
    pub fn timeout_expired(&mut self, handle: TimeoutHandle) -> Result<(), GraphError> {
        if self.timers.timeout_expired(handle, &mut self.input_queue)? {
            self.metrics.timer_firings += 1;
        }
        Ok(())
    }

    /// Embedder entry point: the metronome ticked.
    ///
    /// Advances every periodic series and publishes those that reached
    /// their period.
    ///
    /// # Errors
    ///
    /// As for [`timeout_expired`](Self::timeout_expired).
    pub fn metronome_fired(&mut self) -> Result<(), GraphError> {
        let dispatched = self.timers.metronome_fired(&mut self.input_queue)?;
        self.metrics.timer_firings += dispatched;
        Ok(())
    }

    // ---- Wiring support (crate-internal) ----

    pub(crate) fn insert_edge(&mut self, from: VertexId, to: VertexId) -> Result<(), GraphError> {
        let out_len = self.vertices[from.index()]
            .as_ref()
            .expect(SLOT_INVARIANT)
            .out_edges
            .len();
        if out_len >= self.config.max_out_edges {
            return Err(GraphError::CapacityExceeded {
                what: "out-edges",
                limit: self.config.max_out_edges,
            });
        }
        let in_len = self.vertices[to.index()]
            .as_ref()
            .expect(SLOT_INVARIANT)
            .in_edges
            .len();
        if in_len >= self.config.max_in_edges {
            return Err(GraphError::CapacityExceeded {
                what: "in-edges",
                limit: self.config.max_in_edges,
            });
        }
        self.vertices[from.index()]
            .as_mut()
            .expect(SLOT_INVARIANT)
            .out_edges
            .push(to);
        self.vertices[to.index()]
            .as_mut()
            .expect(SLOT_INVARIANT)
            .in_edges
            .push(from);
        self.needs_sorting = true;
        Ok(())
    }

    pub(crate) fn mark_future_edge(&mut self, from: VertexId, to: VertexId) {
        self.vertices[from.index()]
            .as_mut()
            .expect(SLOT_INVARIANT)
            .future_out_edges
            .push(to);
        self.vertices[to.index()]
            .as_mut()
            .expect(SLOT_INVARIANT)
            .future_in_edges
            .push(from);
    }

    #[allow(clippy::cast_possible_truncation)] // vertex ids are u32 by construction
    pub(crate) fn slots(&self) -> impl Iterator<Item = (VertexId, &VertexSlot)> {
        self.vertices
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|slot| (VertexId(index as u32), slot)))
    }

    // ---- Internals ----

    fn alloc_vertex(
        &mut self,
        name: &'static str,
        node: VertexNode,
    ) -> Result<VertexId, GraphError> {
        if self.vertex_count() >= self.config.max_vertices {
            return Err(GraphError::CapacityExceeded {
                what: "vertices",
                limit: self.config.max_vertices,
            });
        }
        #[allow(clippy::cast_possible_truncation)] // bounded by max_vertices
        let id = VertexId(self.vertices.len() as u32);
        self.vertices.push(Some(VertexSlot::new(name, node)));
        self.needs_sorting = true;
        Ok(id)
    }

    /// Removes every edge that touches `id`, in both directions and both
    /// edge sets.
    fn unlink_vertex(&mut self, id: VertexId) {
        let Some(slot) = self.vertices[id.index()].as_ref() else {
            return;
        };
        let in_edges = slot.in_edges.clone();
        let out_edges = slot.out_edges.clone();
        let future_in = slot.future_in_edges.clone();
        let future_out = slot.future_out_edges.clone();
        for from in in_edges {
            if let Some(slot) = self.vertices[from.index()].as_mut() {
                slot.out_edges.retain(|v| *v != id);
            }
        }
        for to in out_edges {
            if let Some(slot) = self.vertices[to.index()].as_mut() {
                slot.in_edges.retain(|v| *v != id);
            }
        }
        for from in future_in {
            if let Some(slot) = self.vertices[from.index()].as_mut() {
                slot.future_out_edges.retain(|v| *v != id);
            }
        }
        for to in future_out {
            if let Some(slot) = self.vertices[to.index()].as_mut() {
                slot.future_in_edges.retain(|v| *v != id);
            }
        }
    }

    /// Depth-first topological sort over immediate edges.
    ///
    /// Reverse post-order becomes the new evaluation order. A grey
    /// successor is a back edge, hence a cycle; an edge into a vacated
    /// slot is an out-of-bounds edge. Both fail the sort.
    fn topo_sort(&mut self) -> Result<(), GraphError> {
        for slot in self.vertices.iter_mut().flatten() {
            slot.state = VertexState::Clear;
        }
        let live: Vec<VertexId> = self.slots().map(|(id, _)| id).collect();
        let mut sorted = Vec::with_capacity(live.len());
        for id in live {
            if self.vertices[id.index()]
                .as_ref()
                .expect(SLOT_INVARIANT)
                .state
                == VertexState::Clear
            {
                self.dfs_visit(id, &mut sorted)?;
            }
        }
        sorted.reverse();
        debug!(vertices = sorted.len(), "topological sort complete");
        self.order = sorted;
        self.needs_sorting = false;
        Ok(())
    }

    fn dfs_visit(
        &mut self,
        id: VertexId,
        sorted: &mut Vec<VertexId>,
    ) -> Result<(), GraphError> {
        self.vertices[id.index()]
            .as_mut()
            .expect(SLOT_INVARIANT)
            .state = VertexState::Processing;
        let successors = self.vertices[id.index()]
            .as_ref()
            .expect(SLOT_INVARIANT)
            .out_edges
            .clone();
        for successor in successors {
            let state = match self
                .vertices
                .get(successor.index())
                .and_then(Option::as_ref)
            {
                Some(slot) => slot.state,
                None => return Err(GraphError::EdgeOutOfBounds(successor)),
            };
            match state {
                VertexState::Clear => self.dfs_visit(successor, sorted)?,
                VertexState::Processing => {
                    let name = self.vertices[successor.index()]
                        .as_ref()
                        .expect(SLOT_INVARIANT)
                        .name;
                    warn!(vertex = name, "cycle detected");
                    return Err(GraphError::CycleDetected(name.to_string()));
                }
                VertexState::Done => {}
            }
        }
        self.vertices[id.index()]
            .as_mut()
            .expect(SLOT_INVARIANT)
            .state = VertexState::Done;
        sorted.push(id);
        Ok(())
    }

    fn publish_into(
        &mut self,
        topic: VertexId,
        value: Box<dyn Any>,
        type_name: &'static str,
    ) -> Result<(), GraphError> {
        let limit = self.config.max_topic_values;
        let slot = self.vertices[topic.index()].as_mut().expect(SLOT_INVARIANT);
        let state = slot.state;
        let topic_node = slot
            .as_topic_mut()
            .expect("published vertex is not a topic");
        if state != VertexState::Processing {
            topic_node.clear();
        }
        if topic_node.len() >= limit {
            return Err(GraphError::TopicValuesExceeded {
                topic: type_name,
                limit,
            });
        }
        topic_node.append_erased(value);
        slot.state = VertexState::Processing;
        self.metrics.values_published += 1;
        Ok(())
    }

    fn process_topic(&mut self, id: VertexId) {
        let slot = self.vertices[id.index()].as_mut().expect(SLOT_INVARIANT);
        match slot.state {
            VertexState::Clear => {
                // Untouched this pass; drop the previous pass's values.
                slot.as_topic_mut()
                    .expect("topic vertex without a topic node")
                    .clear();
            }
            VertexState::Processing => {
                slot.state = VertexState::Done;
                let successors = slot.out_edges.clone();
                for successor in successors {
                    if let Some(slot) = self.vertices[successor.index()].as_mut() {
                        slot.state = VertexState::Processing;
                    }
                }
            }
            VertexState::Done => {}
        }
    }

    fn process_detector(&mut self, id: VertexId) -> Result<(), GraphError> {
        let index = id.index();
        if self.vertices[index].as_ref().expect(SLOT_INVARIANT).state
            != VertexState::Processing
        {
            return Ok(());
        }
        let mut node = {
            let slot = self.vertices[index].as_mut().expect(SLOT_INVARIANT);
            match &mut slot.node {
                VertexNode::Detector(node) => {
                    node.take().expect("detector is already being processed")
                }
                VertexNode::Topic(_) => unreachable!("topic vertex processed as detector"),
            }
        };
        let mut pending: PendingPublishes = SmallVec::new();
        let mut violation: Option<GraphError> = None;
        {
            let DetectorNode {
                imp,
                dispatchers,
                publish_targets,
                future_targets,
            } = &mut node;
            let mut ctx = EvalContext {
                registry: &self.registry,
                timers: &mut self.timers,
                input_queue: &mut self.input_queue,
                pending: &mut pending,
                publish_targets: publish_targets.as_slice(),
                future_targets: future_targets.as_slice(),
                violation: &mut violation,
            };
            imp.begin_evaluation(&mut ctx);
            for dispatcher in dispatchers.iter() {
                let topic_slot = self.vertices[dispatcher.topic_vertex().index()]
                    .as_ref()
                    .expect(SLOT_INVARIANT);
                if topic_slot.state == VertexState::Done {
                    let topic = topic_slot
                        .as_topic()
                        .expect("subscription bound to a non-topic vertex");
                    dispatcher.dispatch(topic, imp.as_mut(), &mut ctx);
                }
            }
            imp.complete_evaluation(&mut ctx);
        }
        {
            let slot = self.vertices[index].as_mut().expect(SLOT_INVARIANT);
            match &mut slot.node {
                VertexNode::Detector(stored) => *stored = Some(node),
                VertexNode::Topic(_) => unreachable!("topic vertex processed as detector"),
            }
            slot.state = VertexState::Done;
        }
        if let Some(error) = violation {
            return Err(error);
        }
        for publish in pending {
            self.publish_into(publish.topic, publish.value, publish.type_name)?;
        }
        Ok(())
    }

    fn compose_output_list(&mut self) {
        for id in &self.order {
            let slot = self.vertices[id.index()].as_ref().expect(SLOT_INVARIANT);
            if slot.kind() == VertexKind::Topic && slot.state == VertexState::Done {
                slot.as_topic()
                    .expect("topic vertex without a topic node")
                    .collect_states(&mut self.output_list);
            }
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("vertices", &self.vertex_count())
            .field("pending_inputs", &self.input_queue.len())
            .field("needs_sorting", &self.needs_sorting)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
