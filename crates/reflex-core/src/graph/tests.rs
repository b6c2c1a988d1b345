//! Unit tests for graph construction, evaluation, feedback, timers and
//! bounded-build boundaries.

use std::any::Any;
use std::sync::Arc;

use crate::config::GraphConfig;
use crate::graph::context::EvalContext;
use crate::graph::detector::{Detector, Subscriber};
use crate::graph::engine::Graph;
use crate::graph::error::{ErrorKind, GraphError};
use crate::graph::lag::Lagged;
use crate::graph::topic::{TopicState, TopicStateId};
use crate::graph::vertex::VertexState;
use crate::snapshot::{ResumeFromSnapshot, StateSnapshot};
use crate::timeout::manual::{ManualClock, TimerFiring};
use crate::timeout::TimeoutHandle;

// ---- Shared topic states ----

#[derive(Debug, Clone, Default)]
struct Reading {
    value: i64,
}
impl TopicState for Reading {}

#[derive(Debug, Clone, Default)]
struct Echo {
    value: i64,
}
impl TopicState for Echo {}

// ---- Helpers ----

/// Drains every pending pass; returns how many ran.
fn drain(graph: &mut Graph) -> u32 {
    let mut passes = 0;
    while graph.evaluate_if_pending().unwrap() {
        passes += 1;
    }
    passes
}

/// Advances simulated time, delivering each firing and draining the
/// passes it triggers; returns how many passes ran.
fn forward_time_and_evaluate(graph: &mut Graph, clock: &ManualClock, ms: u64) -> u32 {
    let mut budget = ms;
    let mut passes = 0;
    while let Some(firing) = clock.advance_until_firing(&mut budget) {
        match firing {
            TimerFiring::Timeout(handle) => graph.timeout_expired(handle).unwrap(),
            TimerFiring::Metronome => graph.metronome_fired().unwrap(),
        }
        passes += drain(graph);
    }
    passes
}

// ---- Pass-through ----

#[derive(Default)]
struct EchoDetector;

impl Subscriber<Reading> for EchoDetector {
    fn evaluate(&mut self, value: &Reading, ctx: &mut EvalContext<'_>) {
        ctx.publish(Echo { value: value.value });
    }
}
impl Detector for EchoDetector {}

fn echo_graph() -> Graph {
    let mut graph = Graph::new();
    graph
        .add_detector(EchoDetector, |_, w| {
            w.subscribe::<Reading>().publishes::<Echo>();
        })
        .unwrap();
    graph
}

#[test]
fn test_pass_through() {
    let mut graph = echo_graph();
    graph.push(Reading { value: 110 }).unwrap();
    graph.evaluate().unwrap();

    let echo = graph.topic::<Echo>().unwrap();
    assert!(echo.has_new_value());
    assert_eq!(echo.new_value().unwrap().value, 110);

    // The input topic holds its value in the same pass, exactly once.
    let reading = graph.topic::<Reading>().unwrap();
    assert_eq!(reading.values().len(), 1);
    assert_eq!(reading.new_value().unwrap().value, 110);

    // Output list: both values, upstream before downstream.
    let outputs = graph.output_list();
    assert_eq!(outputs.len(), 2);
    assert_eq!(
        (outputs[0].as_ref() as &dyn Any)
            .downcast_ref::<Reading>()
            .unwrap()
            .value,
        110
    );
    assert_eq!(
        (outputs[1].as_ref() as &dyn Any)
            .downcast_ref::<Echo>()
            .unwrap()
            .value,
        110
    );
}

#[test]
fn test_evaluate_with_empty_queue_is_noop_pass() {
    let mut graph = echo_graph();
    graph.evaluate().unwrap();
    assert!(graph.output_list().is_empty());
    assert_eq!(graph.metrics().passes, 1);
    assert_eq!(graph.metrics().inputs_consumed, 0);
}

#[test]
fn test_one_input_consumed_per_pass() {
    let mut graph = echo_graph();
    graph.push(Reading { value: 1 }).unwrap();
    graph.push(Reading { value: 2 }).unwrap();
    assert_eq!(graph.pending_inputs(), 2);

    graph.evaluate().unwrap();
    assert_eq!(graph.pending_inputs(), 1);
    assert_eq!(graph.topic::<Echo>().unwrap().new_value().unwrap().value, 1);

    graph.evaluate().unwrap();
    assert_eq!(graph.pending_inputs(), 0);
    assert_eq!(graph.topic::<Echo>().unwrap().new_value().unwrap().value, 2);
}

#[test]
fn test_no_vertex_left_processing() {
    let mut graph = echo_graph();
    graph.push(Reading { value: 7 }).unwrap();
    graph.evaluate().unwrap();
    for (_, slot) in graph.slots() {
        assert_ne!(slot.state, VertexState::Processing, "{}", slot.name);
    }
}

#[test]
fn test_values_clear_between_passes() {
    let mut graph = echo_graph();
    graph.push(Reading { value: 1 }).unwrap();
    graph.evaluate().unwrap();
    assert!(graph.topic::<Echo>().unwrap().has_new_value());

    // A no-op pass sweeps the previous values away.
    graph.evaluate().unwrap();
    let echo = graph.topic::<Echo>().unwrap();
    assert!(!echo.has_new_value());
    assert!(echo.values().is_empty());
}

#[test]
fn test_evaluate_if_pending() {
    let mut graph = echo_graph();
    assert!(!graph.has_data_pending());
    assert!(!graph.evaluate_if_pending().unwrap());

    graph.push(Reading { value: 5 }).unwrap();
    assert!(graph.has_data_pending());
    assert!(graph.evaluate_if_pending().unwrap());
    assert!(!graph.has_data_pending());
}

#[test]
fn test_metrics_counters() {
    let mut graph = echo_graph();
    graph.push(Reading { value: 1 }).unwrap();
    graph.evaluate().unwrap();
    graph.evaluate().unwrap();

    let metrics = graph.metrics();
    assert_eq!(metrics.passes, 2);
    assert_eq!(metrics.inputs_consumed, 1);
    // One input value plus one echo.
    assert_eq!(metrics.values_published, 2);
}

// ---- Cycle and contract detection ----

#[derive(Debug, Clone, Default)]
struct Ping;
impl TopicState for Ping {}

#[derive(Debug, Clone, Default)]
struct Pong;
impl TopicState for Pong {}

#[derive(Default)]
struct Forward;
impl Subscriber<Ping> for Forward {
    fn evaluate(&mut self, _value: &Ping, ctx: &mut EvalContext<'_>) {
        ctx.publish(Pong);
    }
}
impl Detector for Forward {}

#[derive(Default)]
struct Backward;
impl Subscriber<Pong> for Backward {
    fn evaluate(&mut self, _value: &Pong, ctx: &mut EvalContext<'_>) {
        ctx.publish(Ping);
    }
}
impl Detector for Backward {}

#[test]
fn test_cycle_detected_on_first_evaluate() {
    let mut graph = Graph::new();
    graph
        .add_detector(Forward, |_, w| {
            w.subscribe::<Ping>().publishes::<Pong>();
        })
        .unwrap();
    graph
        .add_detector(Backward, |_, w| {
            w.subscribe::<Pong>().publishes::<Ping>();
        })
        .unwrap();

    graph.push(Ping).unwrap();
    let err = graph.evaluate().unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected(_)));
    assert_eq!(err.kind(), ErrorKind::BadConfiguration);
}

#[test]
fn test_cycle_resolved_by_removing_detector() {
    let mut graph = Graph::new();
    graph
        .add_detector(Forward, |_, w| {
            w.subscribe::<Ping>().publishes::<Pong>();
        })
        .unwrap();
    let backward = graph
        .add_detector(Backward, |_, w| {
            w.subscribe::<Pong>().publishes::<Ping>();
        })
        .unwrap();

    graph.push(Ping).unwrap();
    assert!(graph.evaluate().is_err());

    graph.remove_detector(backward).unwrap();
    graph.push(Ping).unwrap();
    // The queue still holds the first push; both drain cleanly now.
    assert_eq!(drain(&mut graph), 2);
    assert!(graph.topic::<Pong>().unwrap().has_new_value());
}

#[test]
fn test_future_edge_breaks_cycle() {
    // Same shape as the cycle test, but the backward edge is a future
    // publication, which toposort ignores.
    #[derive(Default)]
    struct FutureBackward;
    impl Subscriber<Pong> for FutureBackward {
        fn evaluate(&mut self, _value: &Pong, ctx: &mut EvalContext<'_>) {
            // One echo round only, or the graph would ping forever.
            ctx.publish_future(Ping);
        }
    }
    impl Detector for FutureBackward {}

    let mut graph = Graph::new();
    graph
        .add_detector(Forward, |_, w| {
            w.subscribe::<Ping>().publishes::<Pong>();
        })
        .unwrap();
    graph
        .add_detector(FutureBackward, |_, w| {
            w.subscribe::<Pong>().future_publishes::<Ping>();
        })
        .unwrap();

    graph.push(Ping).unwrap();
    graph.evaluate().unwrap();
    // The feedback landed in the queue, not in this pass.
    assert!(graph.has_data_pending());
}

#[test]
fn test_undeclared_publish_is_contract_violation() {
    #[derive(Default)]
    struct Rogue;
    impl Subscriber<Ping> for Rogue {
        fn evaluate(&mut self, _value: &Ping, ctx: &mut EvalContext<'_>) {
            ctx.publish(Pong); // never declared
        }
    }
    impl Detector for Rogue {}

    let mut graph = Graph::new();
    graph
        .add_detector(Rogue, |_, w| {
            w.subscribe::<Ping>();
        })
        .unwrap();

    graph.push(Ping).unwrap();
    let err = graph.evaluate().unwrap_err();
    assert!(matches!(err, GraphError::UndeclaredPublish(_)));
    assert_eq!(err.kind(), ErrorKind::ContractViolation);
}

#[test]
fn test_wiring_error_unwinds_detector() {
    let mut config = GraphConfig::bounded();
    config.max_topics = 4;
    let mut graph = Graph::with_config(config);

    // Bounded build: subscribing to an unregistered topic fails the
    // wiring and the detector never joins the graph.
    let err = graph
        .add_detector(NamedEchoDetector, |_, w| {
            w.subscribe::<NamedReading>().publishes::<NamedEcho>();
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingBinding);
    assert_eq!(graph.vertex_count(), 0);
}

// ---- Multiple publishers, multiple values ----

#[derive(Debug, Clone, Default)]
struct Shared {
    tag: i64,
}
impl TopicState for Shared {}

#[derive(Default)]
struct Tagger {
    tag: i64,
}
impl Subscriber<Ping> for Tagger {
    fn evaluate(&mut self, _value: &Ping, ctx: &mut EvalContext<'_>) {
        ctx.publish(Shared { tag: self.tag });
    }
}
impl Detector for Tagger {}

#[derive(Default)]
struct SharedCollector {
    seen: Vec<i64>,
}
impl Subscriber<Shared> for SharedCollector {
    fn evaluate(&mut self, value: &Shared, _ctx: &mut EvalContext<'_>) {
        self.seen.push(value.tag);
    }
}
impl Detector for SharedCollector {}

#[test]
fn test_publishers_concatenate_on_one_topic() {
    let mut graph = Graph::new();
    graph
        .add_detector(Tagger { tag: 1 }, |_, w| {
            w.subscribe::<Ping>().publishes::<Shared>();
        })
        .unwrap();
    graph
        .add_detector(Tagger { tag: 2 }, |_, w| {
            w.subscribe::<Ping>().publishes::<Shared>();
        })
        .unwrap();
    let collector = graph
        .add_detector(SharedCollector::default(), |_, w| {
            w.subscribe::<Shared>();
        })
        .unwrap();

    graph.push(Ping).unwrap();
    graph.evaluate().unwrap();

    // Both publications land on the topic in one pass and dispatch once
    // each, in the topic's insertion order.
    let topic_values: Vec<i64> = graph
        .topic::<Shared>()
        .unwrap()
        .values()
        .iter()
        .map(|v| v.tag)
        .collect();
    let seen = &graph.detector(collector).unwrap().seen;
    assert_eq!(seen.len(), 2);
    assert_eq!(seen, &topic_values);
    let mut sorted = seen.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2]);
}

// ---- Subscribe-order guarantee ----

#[derive(Default)]
struct BothPublisher;
impl Subscriber<Ping> for BothPublisher {
    fn evaluate(&mut self, _value: &Ping, ctx: &mut EvalContext<'_>) {
        ctx.publish(Reading { value: 1 });
        ctx.publish(Echo { value: 2 });
    }
}
impl Detector for BothPublisher {}

#[derive(Default)]
struct OrderProbe {
    calls: Vec<&'static str>,
}
impl Subscriber<Reading> for OrderProbe {
    fn evaluate(&mut self, _value: &Reading, _ctx: &mut EvalContext<'_>) {
        self.calls.push("reading");
    }
}
impl Subscriber<Echo> for OrderProbe {
    fn evaluate(&mut self, _value: &Echo, _ctx: &mut EvalContext<'_>) {
        self.calls.push("echo");
    }
}
impl Detector for OrderProbe {}

#[test]
fn test_subscribe_order_drives_evaluate_order() {
    let mut graph = Graph::new();
    graph
        .add_detector(BothPublisher, |_, w| {
            w.subscribe::<Ping>()
                .publishes::<Reading>()
                .publishes::<Echo>();
        })
        .unwrap();
    // Subscribed echo-first even though the publisher produces
    // reading-first.
    let probe = graph
        .add_detector(OrderProbe::default(), |_, w| {
            w.subscribe::<Echo>().subscribe::<Reading>();
        })
        .unwrap();

    graph.push(Ping).unwrap();
    graph.evaluate().unwrap();

    assert_eq!(
        graph.detector(probe).unwrap().calls,
        vec!["echo", "reading"]
    );
}

// ---- Splitter / concentrator ----

#[derive(Debug, Clone, Default)]
struct FanIn;
impl TopicState for FanIn {}

#[derive(Debug, Clone, Default)]
struct FanCount {
    count: u32,
}
impl TopicState for FanCount {}

#[derive(Default)]
struct Concentrator {
    seen: u32,
}
impl Detector for Concentrator {
    fn begin_evaluation(&mut self, _ctx: &mut EvalContext<'_>) {
        self.seen = 0;
    }
    fn complete_evaluation(&mut self, ctx: &mut EvalContext<'_>) {
        ctx.publish(FanCount { count: self.seen });
    }
}

macro_rules! fan_topics {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, Default)]
            struct $name;
            impl TopicState for $name {}
            impl Subscriber<$name> for Concentrator {
                fn evaluate(&mut self, _value: &$name, _ctx: &mut EvalContext<'_>) {
                    self.seen += 1;
                }
            }
        )+

        #[derive(Default)]
        struct Splitter;
        impl Subscriber<FanIn> for Splitter {
            fn evaluate(&mut self, _value: &FanIn, ctx: &mut EvalContext<'_>) {
                $( ctx.publish($name); )+
            }
        }
        impl Detector for Splitter {}

        fn wire_fan(graph: &mut Graph) {
            graph
                .add_detector(Splitter, |_, w| {
                    w.subscribe::<FanIn>();
                    $( w.publishes::<$name>(); )+
                })
                .unwrap();
            graph
                .add_detector(Concentrator::default(), |_, w| {
                    $( w.subscribe::<$name>(); )+
                    w.publishes::<FanCount>();
                })
                .unwrap();
        }
    };
}

fan_topics!(
    F01, F02, F03, F04, F05, F06, F07, F08, F09, F10, F11, F12, F13, F14, F15, F16, F17,
);

#[test]
fn test_splitter_concentrator_seventeen_ways() {
    let mut graph = Graph::new();
    wire_fan(&mut graph);

    graph.push(FanIn).unwrap();
    graph.evaluate().unwrap();

    assert_eq!(graph.topic::<FanCount>().unwrap().new_value().unwrap().count, 17);
}

// ---- Counter with reset ----

#[derive(Debug, Clone, Default)]
struct EventHappened;
impl TopicState for EventHappened {}

#[derive(Debug, Clone, Default)]
struct EventCount {
    count: i64,
}
impl TopicState for EventCount {}

#[derive(Debug, Clone, Default)]
struct Reset;
impl TopicState for Reset {}

#[derive(Default)]
struct EventCounter {
    count: i64,
}
impl Subscriber<EventHappened> for EventCounter {
    fn evaluate(&mut self, _value: &EventHappened, _ctx: &mut EvalContext<'_>) {
        self.count += 1;
    }
}
impl Subscriber<Reset> for EventCounter {
    fn evaluate(&mut self, _value: &Reset, _ctx: &mut EvalContext<'_>) {
        self.count = 0;
    }
}
impl Detector for EventCounter {
    fn complete_evaluation(&mut self, ctx: &mut EvalContext<'_>) {
        ctx.publish(EventCount { count: self.count });
    }
}

#[derive(Default)]
struct ResetDetector;
impl Subscriber<EventCount> for ResetDetector {
    fn evaluate(&mut self, value: &EventCount, ctx: &mut EvalContext<'_>) {
        if value.count >= 5 {
            ctx.publish_future(Reset);
        }
    }
}
impl Detector for ResetDetector {}

#[test]
fn test_counter_with_reset_feedback() {
    let mut graph = Graph::new();
    graph
        .add_detector(EventCounter::default(), |_, w| {
            w.subscribe::<EventHappened>()
                .subscribe::<Reset>()
                .publishes::<EventCount>();
        })
        .unwrap();
    graph
        .add_detector(ResetDetector, |_, w| {
            w.subscribe::<EventCount>().future_publishes::<Reset>();
        })
        .unwrap();

    let mut counts = Vec::new();
    let mut passes = 0;
    for _ in 0..7 {
        graph.push(EventHappened).unwrap();
        while graph.evaluate_if_pending().unwrap() {
            passes += 1;
            counts.push(graph.topic::<EventCount>().unwrap().new_value().unwrap().count);
        }
    }

    // Seven external events; the queued reset makes an eighth pass with
    // no new event.
    assert_eq!(passes, 8);
    assert_eq!(counts, vec![1, 2, 3, 4, 5, 0, 1, 2]);
}

// ---- Lag feedback ----

#[derive(Debug, Clone, Default)]
struct Start;
impl TopicState for Start {}

#[derive(Debug, Clone, Default)]
struct Step {
    i: u32,
}
impl TopicState for Step {}

#[derive(Default)]
struct Stepper;
impl Subscriber<Start> for Stepper {
    fn evaluate(&mut self, _value: &Start, ctx: &mut EvalContext<'_>) {
        ctx.publish(Step { i: 1 });
    }
}
impl Subscriber<Lagged<Step>> for Stepper {
    fn evaluate(&mut self, value: &Lagged<Step>, ctx: &mut EvalContext<'_>) {
        if value.data.i < 5 {
            ctx.publish(Step { i: value.data.i + 1 });
        }
    }
}
impl Detector for Stepper {}

#[test]
fn test_lag_feedback_counts_to_five() {
    let mut graph = Graph::new();
    graph
        .add_detector(Stepper, |_, w| {
            w.subscribe::<Start>()
                .subscribe::<Lagged<Step>>()
                .publishes::<Step>();
        })
        .unwrap();
    graph.add_lag::<Step>().unwrap();

    graph.push(Start).unwrap();

    let mut steps = Vec::new();
    while graph.evaluate_if_pending().unwrap() {
        let step = graph.topic::<Step>().unwrap();
        if step.has_new_value() {
            steps.push(step.new_value().unwrap().i);
        }
    }

    assert_eq!(steps, vec![1, 2, 3, 4, 5]);
    assert!(!graph.has_data_pending());
}

// ---- Timer-driven feedback ----

#[derive(Debug, Clone, Default)]
struct Tick;
impl TopicState for Tick {}

struct Heartbeat {
    handle: TimeoutHandle,
}
impl Subscriber<Tick> for Heartbeat {
    fn evaluate(&mut self, _value: &Tick, ctx: &mut EvalContext<'_>) {
        ctx.schedule_timeout(Tick, 200, self.handle);
    }
}
impl Detector for Heartbeat {}

#[test]
fn test_timeout_republishes_tick() {
    let clock = ManualClock::new();
    let mut graph = Graph::new();
    graph.set_timer_driver(Box::new(clock.driver()));
    graph
        .add_detector(
            Heartbeat {
                handle: TimeoutHandle::INVALID,
            },
            |d, w| {
                w.subscribe::<Tick>().timeout_publishes::<Tick>();
                d.handle = w.unique_timer_handle();
            },
        )
        .unwrap();

    graph.push(Tick).unwrap();
    assert_eq!(drain(&mut graph), 1);

    // The pass armed a 200 ms timeout that republishes the tick.
    assert_eq!(forward_time_and_evaluate(&mut graph, &clock, 200), 1);
    assert!(graph.topic::<Tick>().unwrap().has_new_value());

    // Each firing re-arms; a full second carries five more beats.
    assert_eq!(forward_time_and_evaluate(&mut graph, &clock, 1000), 5);
}

#[derive(Debug, Clone, Default)]
struct Arm;
impl TopicState for Arm {}

#[derive(Debug, Clone, Default)]
struct Disarm;
impl TopicState for Disarm {}

#[derive(Debug, Clone, Default)]
struct Fired;
impl TopicState for Fired {}

struct OneShot {
    handle: TimeoutHandle,
}
impl Subscriber<Arm> for OneShot {
    fn evaluate(&mut self, _value: &Arm, ctx: &mut EvalContext<'_>) {
        ctx.schedule_timeout(Fired, 500, self.handle);
    }
}
impl Subscriber<Disarm> for OneShot {
    fn evaluate(&mut self, _value: &Disarm, ctx: &mut EvalContext<'_>) {
        ctx.cancel_timeout(self.handle);
    }
}
impl Detector for OneShot {}

#[test]
fn test_cancel_suppresses_timed_publication() {
    let clock = ManualClock::new();
    let mut graph = Graph::new();
    graph.set_timer_driver(Box::new(clock.driver()));
    let mut armed_handle = TimeoutHandle::INVALID;
    graph
        .add_detector(
            OneShot {
                handle: TimeoutHandle::INVALID,
            },
            |d, w| {
                w.subscribe::<Arm>()
                    .subscribe::<Disarm>()
                    .timeout_publishes::<Fired>();
                d.handle = w.unique_timer_handle();
                armed_handle = d.handle;
            },
        )
        .unwrap();

    graph.push(Arm).unwrap();
    drain(&mut graph);
    assert!(!graph.timer_service().has_expired(armed_handle));

    graph.push(Disarm).unwrap();
    drain(&mut graph);
    assert!(graph.timer_service().has_expired(armed_handle));

    // No firing within any horizon, and even a stale expiry delivery
    // publishes nothing.
    assert_eq!(forward_time_and_evaluate(&mut graph, &clock, 10_000), 0);
    graph.timeout_expired(armed_handle).unwrap();
    assert!(!graph.has_data_pending());
}

// ---- Periodic publishing ----

#[derive(Debug, Clone, Default)]
struct Pulse9;
impl TopicState for Pulse9 {}

#[derive(Debug, Clone, Default)]
struct Pulse15;
impl TopicState for Pulse15 {}

#[derive(Debug, Clone, Default)]
struct Pulse45;
impl TopicState for Pulse45 {}

#[derive(Default)]
struct PulseSources;
impl Detector for PulseSources {}

#[test]
fn test_periodic_series_share_metronome() {
    let clock = ManualClock::new();
    let mut graph = Graph::new();
    graph.set_timer_driver(Box::new(clock.driver()));
    graph
        .add_detector(PulseSources, |_, w| {
            w.periodic_publishes::<Pulse9>(9)
                .periodic_publishes::<Pulse15>(15)
                .periodic_publishes::<Pulse45>(45);
        })
        .unwrap();

    assert_eq!(graph.timer_service().metronome_period_ms(), 3);
    graph.start_periodic();

    let mut counts = (0u32, 0u32, 0u32);
    let mut budget = 90;
    while let Some(firing) = clock.advance_until_firing(&mut budget) {
        assert_eq!(firing, TimerFiring::Metronome);
        graph.metronome_fired().unwrap();
        while graph.evaluate_if_pending().unwrap() {
            if graph.topic::<Pulse9>().unwrap().has_new_value() {
                counts.0 += 1;
            }
            if graph.topic::<Pulse15>().unwrap().has_new_value() {
                counts.1 += 1;
            }
            if graph.topic::<Pulse45>().unwrap().has_new_value() {
                counts.2 += 1;
            }
        }
    }

    assert_eq!(counts, (10, 6, 2));
}

// ---- Resume from snapshot ----

#[derive(Debug, Clone, Default, PartialEq)]
struct PersistedCount {
    value: i64,
}
impl TopicState for PersistedCount {
    fn id(&self) -> TopicStateId {
        11
    }
}

#[derive(Default)]
struct ResumableCounter {
    count: i64,
}
impl Subscriber<ResumeFromSnapshot> for ResumableCounter {
    fn evaluate(&mut self, value: &ResumeFromSnapshot, _ctx: &mut EvalContext<'_>) {
        if let Some(persisted) = value.snapshot.get::<PersistedCount>() {
            self.count = persisted.value;
        }
    }
}
impl Subscriber<EventHappened> for ResumableCounter {
    fn evaluate(&mut self, _value: &EventHappened, _ctx: &mut EvalContext<'_>) {
        self.count += 1;
    }
}
impl Detector for ResumableCounter {
    fn complete_evaluation(&mut self, ctx: &mut EvalContext<'_>) {
        ctx.publish(PersistedCount { value: self.count });
    }
}

#[test]
fn test_resume_from_snapshot_protocol() {
    let mut graph = Graph::new();
    graph
        .add_detector(ResumableCounter::default(), |_, w| {
            w.subscribe::<ResumeFromSnapshot>()
                .subscribe::<EventHappened>()
                .publishes::<PersistedCount>();
        })
        .unwrap();

    let persisted: Vec<Arc<dyn TopicState>> = vec![Arc::new(PersistedCount { value: 40 })];
    let snapshot = Arc::new(StateSnapshot::prime(&persisted).unwrap());
    graph.push(ResumeFromSnapshot { snapshot }).unwrap();
    graph.evaluate().unwrap();
    assert_eq!(
        graph.topic::<PersistedCount>().unwrap().new_value().unwrap().value,
        40
    );

    graph.push(EventHappened).unwrap();
    graph.evaluate().unwrap();
    assert_eq!(
        graph.topic::<PersistedCount>().unwrap().new_value().unwrap().value,
        41
    );
}

#[test]
fn test_snapshot_store_folds_output_lists() {
    use crate::snapshot::GraphStateStore;

    let mut graph = Graph::new();
    graph
        .add_detector(ResumableCounter::default(), |_, w| {
            w.subscribe::<ResumeFromSnapshot>()
                .subscribe::<EventHappened>()
                .publishes::<PersistedCount>();
        })
        .unwrap();

    let mut store = GraphStateStore::new();
    for _ in 0..3 {
        graph.push(EventHappened).unwrap();
        graph.evaluate().unwrap();
        store.take_new_snapshot(graph.output_list()).unwrap();
    }

    assert_eq!(store.latest().version(), 3);
    assert_eq!(
        store.latest().get::<PersistedCount>(),
        Some(&PersistedCount { value: 3 })
    );
    assert_eq!(
        store.previous().unwrap().get::<PersistedCount>(),
        Some(&PersistedCount { value: 2 })
    );
}

// ---- Bounded build ----

#[derive(Debug, Clone, Default)]
struct NamedReading {
    value: i64,
}
impl TopicState for NamedReading {
    fn id(&self) -> TopicStateId {
        0
    }
}

#[derive(Debug, Clone, Default)]
struct NamedEcho {
    value: i64,
}
impl TopicState for NamedEcho {
    fn id(&self) -> TopicStateId {
        1
    }
}

#[derive(Debug, Clone, Default)]
struct NamedExtra;
impl TopicState for NamedExtra {
    fn id(&self) -> TopicStateId {
        2
    }
}

#[derive(Default)]
struct NamedEchoDetector;
impl Subscriber<NamedReading> for NamedEchoDetector {
    fn evaluate(&mut self, value: &NamedReading, ctx: &mut EvalContext<'_>) {
        ctx.publish(NamedEcho { value: value.value });
    }
}
impl Detector for NamedEchoDetector {}

#[test]
fn test_bounded_requires_registration() {
    let mut graph = Graph::with_config(GraphConfig::bounded());
    let err = graph.push(NamedReading { value: 1 }).unwrap_err();
    assert!(matches!(err, GraphError::TopicNotRegistered(_)));
    assert_eq!(err.kind(), ErrorKind::MissingBinding);

    graph.register_topic::<NamedReading>().unwrap();
    graph.register_topic::<NamedEcho>().unwrap();
    graph
        .add_detector(NamedEchoDetector, |_, w| {
            w.subscribe::<NamedReading>().publishes::<NamedEcho>();
        })
        .unwrap();

    graph.push(NamedReading { value: 9 }).unwrap();
    graph.evaluate().unwrap();
    assert_eq!(graph.topic::<NamedEcho>().unwrap().new_value().unwrap().value, 9);
}

#[test]
fn test_bounded_topic_capacity() {
    let mut config = GraphConfig::bounded();
    config.max_topics = 2;
    let mut graph = Graph::with_config(config);

    graph.register_topic::<NamedReading>().unwrap();
    graph.register_topic::<NamedEcho>().unwrap();
    let err = graph.register_topic::<NamedExtra>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadConfiguration);
}

#[test]
fn test_bounded_duplicate_registration() {
    let mut graph = Graph::with_config(GraphConfig::bounded());
    graph.register_topic::<NamedReading>().unwrap();
    let err = graph.register_topic::<NamedReading>().unwrap_err();
    assert!(matches!(err, GraphError::DuplicateTopic(_)));
}

#[test]
fn test_bounded_one_pending_input_per_topic() {
    let mut graph = Graph::with_config(GraphConfig::bounded());
    graph.register_topic::<NamedReading>().unwrap();

    graph.push(NamedReading { value: 1 }).unwrap();
    let err = graph.push(NamedReading { value: 2 }).unwrap_err();
    assert!(matches!(err, GraphError::DuplicateQueuedInput(_)));
    assert_eq!(err.kind(), ErrorKind::ContractViolation);

    // Consuming the pending input frees the topic's queue slot.
    graph.evaluate().unwrap();
    graph.push(NamedReading { value: 2 }).unwrap();
}

#[derive(Default)]
struct Burst {
    values: u32,
}
impl Subscriber<NamedReading> for Burst {
    fn evaluate(&mut self, _value: &NamedReading, ctx: &mut EvalContext<'_>) {
        for i in 0..self.values {
            ctx.publish(NamedEcho { value: i64::from(i) });
        }
    }
}
impl Detector for Burst {}

#[test]
fn test_bounded_topic_value_capacity() {
    let mut config = GraphConfig::bounded();
    config.max_topic_values = 2;
    let mut graph = Graph::with_config(config);
    graph.register_topic::<NamedReading>().unwrap();
    graph.register_topic::<NamedEcho>().unwrap();
    graph
        .add_detector(Burst { values: 3 }, |_, w| {
            w.subscribe::<NamedReading>().publishes::<NamedEcho>();
        })
        .unwrap();

    graph.push(NamedReading { value: 0 }).unwrap();
    let err = graph.evaluate().unwrap_err();
    assert!(matches!(err, GraphError::TopicValuesExceeded { limit: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::BadConfiguration);
}

struct TimerHog {
    handles: Vec<TimeoutHandle>,
}
impl Subscriber<NamedReading> for TimerHog {
    fn evaluate(&mut self, _value: &NamedReading, ctx: &mut EvalContext<'_>) {
        for handle in &self.handles {
            ctx.schedule_timeout(NamedEcho { value: 0 }, 100, *handle);
        }
    }
}
impl Detector for TimerHog {}

#[test]
fn test_bounded_timeout_capacity() {
    let mut config = GraphConfig::bounded();
    config.max_timeouts = 2;
    let mut graph = Graph::with_config(config);
    graph.register_topic::<NamedReading>().unwrap();
    graph.register_topic::<NamedEcho>().unwrap();
    graph
        .add_detector(TimerHog { handles: Vec::new() }, |d, w| {
            w.subscribe::<NamedReading>().timeout_publishes::<NamedEcho>();
            d.handles = (0..3).map(|_| w.unique_timer_handle()).collect();
        })
        .unwrap();

    graph.push(NamedReading { value: 0 }).unwrap();
    let err = graph.evaluate().unwrap_err();
    assert!(matches!(
        err,
        GraphError::Timer(crate::timeout::TimerError::TimeoutsExceeded(2))
    ));
    assert_eq!(err.kind(), ErrorKind::BadConfiguration);
}

// ---- Detector management ----

#[test]
fn test_detector_accessors() {
    let mut graph = Graph::new();
    let probe = graph
        .add_detector(OrderProbe::default(), |_, w| {
            w.subscribe::<Echo>();
        })
        .unwrap();

    assert!(graph.detector(probe).unwrap().calls.is_empty());
    graph.detector_mut(probe).unwrap().calls.push("seed");
    assert_eq!(graph.detector(probe).unwrap().calls, vec!["seed"]);

    graph.remove_detector(probe).unwrap();
    assert!(graph.detector(probe).is_none());
    assert!(graph.remove_detector(probe).is_err());
}

#[test]
fn test_removed_detector_stops_receiving() {
    let mut graph = echo_graph();
    let probe = graph
        .add_detector(OrderProbe::default(), |_, w| {
            w.subscribe::<Echo>();
        })
        .unwrap();

    graph.push(Reading { value: 1 }).unwrap();
    graph.evaluate().unwrap();
    assert_eq!(graph.detector(probe).unwrap().calls.len(), 1);

    graph.remove_detector(probe).unwrap();

    // The rest of the graph keeps evaluating.
    graph.push(Reading { value: 2 }).unwrap();
    graph.evaluate().unwrap();
    assert_eq!(graph.topic::<Echo>().unwrap().new_value().unwrap().value, 2);
}
