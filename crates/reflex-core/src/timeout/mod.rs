//! Timed topic publication.
//!
//! [`TimeoutPublisherService`] injects topic values into the graph at
//! specified times, either as one-shot timeouts or as periodic series. The
//! service never owns real timers: the embedder supplies a [`TimerDriver`]
//! that programs the platform's clocks, and calls back through
//! [`Graph::timeout_expired`](crate::Graph::timeout_expired) and
//! [`Graph::metronome_fired`](crate::Graph::metronome_fired) when they
//! fire. Fired values are delivered into the graph input queue and consumed
//! by subsequent evaluation passes, never mid-pass.
//!
//! All periodic series share a single underlying timer, the **metronome**,
//! whose period is the greatest common divisor of every registered period.
//! Each series accumulates elapsed metronome time and dispatches whenever
//! the accumulator reaches its own period.

pub mod manual;

use std::fmt;

use fxhash::FxHashMap;
use tracing::debug;

use crate::graph::error::ErrorKind;
use crate::graph::input::InputQueue;
use crate::graph::topic::TopicState;
use crate::graph::vertex::VertexId;
use crate::graph::GraphError;

/// Opaque identifier of a one-shot timer slot.
///
/// Acquired through [`Wiring::unique_timer_handle`](crate::Wiring::unique_timer_handle)
/// (or [`TimeoutPublisherService::unique_handle`]); a detector that drives
/// multiple concurrent timers holds multiple handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutHandle(pub u32);

impl TimeoutHandle {
    /// The reserved never-armed sentinel.
    pub const INVALID: TimeoutHandle = TimeoutHandle(0);

    /// Returns whether this handle was vended by a service.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for TimeoutHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeoutHandle({})", self.0)
    }
}

/// Errors raised by the timer service.
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    /// The handle was never acquired from this service.
    #[error("timer handle {0} is invalid")]
    InvalidHandle(TimeoutHandle),

    /// The slot is already armed (bounded build only).
    #[error("timer slot {0} is already armed")]
    SlotBusy(TimeoutHandle),

    /// Too many concurrently armed timeouts (bounded build only).
    #[error("too many concurrent timeouts (limit {0})")]
    TimeoutsExceeded(usize),

    /// Too many periodic series (bounded build only).
    #[error("too many periodic series (limit {0})")]
    PeriodicExceeded(usize),

    /// Periodic periods must be positive.
    #[error("periodic period must be positive")]
    ZeroPeriod,
}

impl TimerError {
    /// Returns the coarse [`ErrorKind`] of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHandle(_) | Self::SlotBusy(_) => ErrorKind::ContractViolation,
            Self::TimeoutsExceeded(_) | Self::PeriodicExceeded(_) | Self::ZeroPeriod => {
                ErrorKind::BadConfiguration
            }
        }
    }
}

/// Platform timer integration supplied by the embedder.
///
/// The service calls these hooks to program real timers; the embedder calls
/// [`Graph::timeout_expired`](crate::Graph::timeout_expired) and
/// [`Graph::metronome_fired`](crate::Graph::metronome_fired) when they
/// fire. [`manual::ManualTimerDriver`] is a ready-made simulated driver for
/// tests and host-side runs.
pub trait TimerDriver {
    /// Programs the one-shot timer for `handle` to expire `delay_ms` from
    /// now.
    fn set_timeout(&mut self, delay_ms: u64, handle: TimeoutHandle);
    /// Starts the one-shot timer for `handle`.
    fn start(&mut self, handle: TimeoutHandle);
    /// Cancels the one-shot timer for `handle`.
    fn cancel(&mut self, handle: TimeoutHandle);
    /// Starts the shared periodic timer with the given period.
    fn start_metronome(&mut self, period_ms: u64);
    /// Stops the shared periodic timer.
    fn cancel_metronome(&mut self);
    /// Milliseconds since the epoch; may jump due to time sync.
    fn wall_time_ms(&self) -> u64;
    /// Strictly monotonic milliseconds since an unspecified origin.
    fn monotonic_time_ms(&self) -> u64;
}

/// A driver for graphs that never schedule timers.
///
/// All hooks are no-ops and both clocks are pinned at zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTimerDriver;

impl TimerDriver for NoopTimerDriver {
    fn set_timeout(&mut self, _delay_ms: u64, _handle: TimeoutHandle) {}
    fn start(&mut self, _handle: TimeoutHandle) {}
    fn cancel(&mut self, _handle: TimeoutHandle) {}
    fn start_metronome(&mut self, _period_ms: u64) {}
    fn cancel_metronome(&mut self) {}
    fn wall_time_ms(&self) -> u64 {
        0
    }
    fn monotonic_time_ms(&self) -> u64 {
        0
    }
}

/// Type-erased pending publication held by a timer slot or periodic
/// series.
pub(crate) trait TimerDispatch {
    fn dispatch(&self, queue: &mut InputQueue) -> Result<(), GraphError>;
}

pub(crate) struct TypedTimerDispatch<T: TopicState + Clone + Default> {
    pub topic: VertexId,
    pub value: T,
}

impl<T: TopicState + Clone + Default> TimerDispatch for TypedTimerDispatch<T> {
    fn dispatch(&self, queue: &mut InputQueue) -> Result<(), GraphError> {
        queue.enqueue(
            self.topic,
            Box::new(self.value.clone()),
            std::any::type_name::<T>(),
        )
    }
}

/// A periodic publishing series: period, elapsed-time accumulator and the
/// dispatcher fired whenever the accumulator reaches the period.
struct PeriodicSeries {
    period_ms: u64,
    accumulator_ms: u64,
    dispatcher: Box<dyn TimerDispatch>,
}

/// Schedules one-shot and periodic injections of topic values.
///
/// Owned by the [`Graph`](crate::Graph); detectors reach it through their
/// evaluation context, the embedder through the graph's firing entry
/// points.
pub struct TimeoutPublisherService {
    driver: Box<dyn TimerDriver>,
    slots: FxHashMap<TimeoutHandle, Box<dyn TimerDispatch>>,
    periodic: Vec<PeriodicSeries>,
    metronome_period_ms: u64,
    next_handle: u32,
    max_timeouts: usize,
    max_periodic: usize,
    bounded: bool,
}

impl TimeoutPublisherService {
    pub(crate) fn new(
        driver: Box<dyn TimerDriver>,
        max_timeouts: usize,
        max_periodic: usize,
        bounded: bool,
    ) -> Self {
        Self {
            driver,
            slots: FxHashMap::default(),
            periodic: Vec::new(),
            metronome_period_ms: 0,
            next_handle: 0,
            max_timeouts,
            max_periodic,
            bounded,
        }
    }

    pub(crate) fn set_driver(&mut self, driver: Box<dyn TimerDriver>) {
        self.driver = driver;
    }

    /// Returns a fresh, never [`TimeoutHandle::INVALID`], timer handle.
    pub fn unique_handle(&mut self) -> TimeoutHandle {
        self.next_handle += 1;
        TimeoutHandle(self.next_handle)
    }

    /// Returns true iff the slot for `handle` is empty (never armed,
    /// already fired, or cancelled).
    #[must_use]
    pub fn has_expired(&self, handle: TimeoutHandle) -> bool {
        !self.slots.contains_key(&handle)
    }

    /// The current metronome period: the GCD of all registered periodic
    /// periods, or zero when no series is registered.
    #[must_use]
    pub fn metronome_period_ms(&self) -> u64 {
        self.metronome_period_ms
    }

    /// Number of currently armed one-shot slots.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.slots.len()
    }

    /// Arms the metronome with the current metronome period, provided any
    /// periodic series is registered.
    pub fn start_periodic(&mut self) {
        if self.metronome_period_ms > 0 {
            self.driver.start_metronome(self.metronome_period_ms);
        }
    }

    /// Cancels the one-shot timer for `handle` and frees the slot.
    ///
    /// Idempotent: cancelling an empty slot is a no-op, and no value is
    /// ever published for a cancelled arming even if the underlying timer
    /// still fires.
    pub fn cancel(&mut self, handle: TimeoutHandle) {
        if self.slots.remove(&handle).is_some() {
            self.driver.cancel(handle);
        }
    }

    /// Milliseconds since the epoch, from the driver's wall clock.
    #[must_use]
    pub fn wall_time_ms(&self) -> u64 {
        self.driver.wall_time_ms()
    }

    /// Strictly monotonic milliseconds, from the driver's monotonic clock.
    #[must_use]
    pub fn monotonic_time_ms(&self) -> u64 {
        self.driver.monotonic_time_ms()
    }

    pub(crate) fn schedule_timeout_erased(
        &mut self,
        dispatcher: Box<dyn TimerDispatch>,
        delay_ms: u64,
        handle: TimeoutHandle,
    ) -> Result<(), TimerError> {
        if !handle.is_valid() || handle.0 > self.next_handle {
            return Err(TimerError::InvalidHandle(handle));
        }
        if self.bounded {
            if self.slots.contains_key(&handle) {
                return Err(TimerError::SlotBusy(handle));
            }
            if self.slots.len() >= self.max_timeouts {
                return Err(TimerError::TimeoutsExceeded(self.max_timeouts));
            }
        } else if self.slots.remove(&handle).is_some() {
            // Re-arming a pending handle resets it.
            self.driver.cancel(handle);
        }
        debug!(handle = handle.0, delay_ms, "timeout scheduled");
        self.slots.insert(handle, dispatcher);
        self.driver.set_timeout(delay_ms, handle);
        self.driver.start(handle);
        Ok(())
    }

    pub(crate) fn schedule_periodic_erased(
        &mut self,
        dispatcher: Box<dyn TimerDispatch>,
        period_ms: u64,
    ) -> Result<(), TimerError> {
        if period_ms == 0 {
            return Err(TimerError::ZeroPeriod);
        }
        if self.bounded && self.periodic.len() >= self.max_periodic {
            return Err(TimerError::PeriodicExceeded(self.max_periodic));
        }
        self.metronome_period_ms = gcd(self.metronome_period_ms, period_ms);
        self.periodic.push(PeriodicSeries {
            period_ms,
            accumulator_ms: 0,
            dispatcher,
        });
        Ok(())
    }

    /// Fires the dispatcher for `handle`, if its slot is non-empty, and
    /// frees the slot. A cleared slot (post-cancellation race) is silently
    /// skipped.
    pub(crate) fn timeout_expired(
        &mut self,
        handle: TimeoutHandle,
        queue: &mut InputQueue,
    ) -> Result<bool, GraphError> {
        match self.slots.remove(&handle) {
            Some(dispatcher) => {
                dispatcher.dispatch(queue)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Advances every periodic series by one metronome period and fires
    /// the series whose accumulators reached their period. Returns the
    /// number of dispatched series.
    pub(crate) fn metronome_fired(&mut self, queue: &mut InputQueue) -> Result<u64, GraphError> {
        let step = self.metronome_period_ms;
        let mut dispatched: u64 = 0;
        for series in &mut self.periodic {
            series.accumulator_ms += step;
            if series.accumulator_ms >= series.period_ms {
                series.dispatcher.dispatch(queue)?;
                series.accumulator_ms = 0;
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }
}

impl fmt::Debug for TimeoutPublisherService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutPublisherService")
            .field("armed", &self.slots.len())
            .field("periodic_series", &self.periodic.len())
            .field("metronome_period_ms", &self.metronome_period_ms)
            .finish_non_exhaustive()
    }
}

/// Euclidean greatest common divisor; `gcd(0, n) == n`.
fn gcd(mut lhs: u64, mut rhs: u64) -> u64 {
    while rhs != 0 {
        let tmp = rhs;
        rhs = lhs % rhs;
        lhs = tmp;
    }
    lhs
}
