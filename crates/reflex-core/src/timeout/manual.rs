//! A simulated timer driver with a manually advanced clock.
//!
//! [`ManualClock`] and [`ManualTimerDriver`] share state: the driver (owned
//! by the graph's timer service) records armings, the clock (held by the
//! embedder or a test) advances time and reports which timers fired. The
//! embedder then delivers each firing through
//! [`Graph::timeout_expired`](crate::Graph::timeout_expired) or
//! [`Graph::metronome_fired`](crate::Graph::metronome_fired) and drains the
//! resulting evaluation passes, interleaving time and evaluation exactly
//! the way a platform timer integration would.
//!
//! ```rust,ignore
//! let clock = ManualClock::new();
//! let mut graph = Graph::new();
//! graph.set_timer_driver(Box::new(clock.driver()));
//! // ... wire detectors, push, evaluate ...
//! let mut budget = 1000;
//! while let Some(firing) = clock.advance_until_firing(&mut budget) {
//!     match firing {
//!         TimerFiring::Timeout(handle) => graph.timeout_expired(handle)?,
//!         TimerFiring::Metronome => graph.metronome_fired()?,
//!     }
//!     while graph.evaluate_if_pending()? {}
//! }
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use super::{TimeoutHandle, TimerDriver};

/// A timer event reported by [`ManualClock::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFiring {
    /// The one-shot timer for this handle expired.
    Timeout(TimeoutHandle),
    /// The metronome ticked.
    Metronome,
}

#[derive(Debug, Default)]
struct ManualState {
    now_ms: u64,
    wall_offset_ms: u64,
    /// Delays staged by `set_timeout`, armed by `start`.
    staged: Vec<(TimeoutHandle, u64)>,
    /// Armed one-shots: handle and absolute deadline.
    armed: Vec<(TimeoutHandle, u64)>,
    metronome_period_ms: Option<u64>,
    metronome_next_ms: u64,
}

impl ManualState {
    /// Absolute time of the next firing, if any.
    fn next_deadline(&self) -> Option<(u64, Option<TimeoutHandle>)> {
        let one_shot = self
            .armed
            .iter()
            .min_by_key(|(handle, deadline)| (*deadline, handle.0))
            .copied();
        let metronome = self
            .metronome_period_ms
            .map(|_| self.metronome_next_ms);
        match (one_shot, metronome) {
            (Some((handle, deadline)), Some(tick)) if deadline <= tick => {
                Some((deadline, Some(handle)))
            }
            (_, Some(tick)) => Some((tick, None)),
            (Some((handle, deadline)), None) => Some((deadline, Some(handle))),
            (None, None) => None,
        }
    }

    fn pop_firing_at(&mut self, deadline: u64, handle: Option<TimeoutHandle>) -> TimerFiring {
        match handle {
            Some(handle) => {
                self.armed
                    .retain(|(armed_handle, _)| *armed_handle != handle);
                TimerFiring::Timeout(handle)
            }
            None => {
                self.metronome_next_ms = deadline
                    + self
                        .metronome_period_ms
                        .expect("metronome fired without a period");
                TimerFiring::Metronome
            }
        }
    }
}

/// The embedder-facing half of the simulated timer pair.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Rc<RefCell<ManualState>>,
}

impl ManualClock {
    /// Creates a clock at time zero with no armed timers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the driver half, to be installed into a graph.
    #[must_use]
    pub fn driver(&self) -> ManualTimerDriver {
        ManualTimerDriver {
            state: Rc::clone(&self.state),
        }
    }

    /// Current monotonic time.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.state.borrow().now_ms
    }

    /// Sets the wall-clock offset relative to the monotonic clock. The
    /// wall clock may jump; the monotonic clock never does.
    pub fn set_wall_offset_ms(&self, offset_ms: u64) {
        self.state.borrow_mut().wall_offset_ms = offset_ms;
    }

    /// Advances the clock toward the next firing, spending at most
    /// `*budget_ms`.
    ///
    /// If a firing is reached within the budget, the clock stops at the
    /// firing time, the spent time is subtracted from `*budget_ms` and the
    /// firing is returned. Otherwise the full budget is consumed and
    /// `None` is returned. Calling this in a loop interleaves firings with
    /// re-armings performed by the delivered evaluation passes.
    pub fn advance_until_firing(&self, budget_ms: &mut u64) -> Option<TimerFiring> {
        let mut state = self.state.borrow_mut();
        match state.next_deadline() {
            Some((deadline, handle)) if deadline.saturating_sub(state.now_ms) <= *budget_ms => {
                *budget_ms -= deadline.saturating_sub(state.now_ms);
                state.now_ms = deadline;
                Some(state.pop_firing_at(deadline, handle))
            }
            _ => {
                state.now_ms += *budget_ms;
                *budget_ms = 0;
                None
            }
        }
    }

    /// Advances the clock by `ms`, collecting every firing in time order.
    ///
    /// Firings are reported after the fact; use
    /// [`advance_until_firing`](Self::advance_until_firing) when the
    /// handler needs to re-arm timers between firings.
    pub fn advance(&self, ms: u64) -> Vec<TimerFiring> {
        let mut budget = ms;
        let mut firings = Vec::new();
        while let Some(firing) = self.advance_until_firing(&mut budget) {
            firings.push(firing);
        }
        firings
    }
}

/// The graph-facing half of the simulated timer pair.
#[derive(Debug, Clone)]
pub struct ManualTimerDriver {
    state: Rc<RefCell<ManualState>>,
}

impl TimerDriver for ManualTimerDriver {
    fn set_timeout(&mut self, delay_ms: u64, handle: TimeoutHandle) {
        let mut state = self.state.borrow_mut();
        state.staged.retain(|(staged, _)| *staged != handle);
        state.staged.push((handle, delay_ms));
    }

    fn start(&mut self, handle: TimeoutHandle) {
        let mut state = self.state.borrow_mut();
        let Some(position) = state.staged.iter().position(|(staged, _)| *staged == handle)
        else {
            return;
        };
        let (_, delay_ms) = state.staged.swap_remove(position);
        let deadline = state.now_ms + delay_ms;
        state.armed.retain(|(armed, _)| *armed != handle);
        state.armed.push((handle, deadline));
    }

    fn cancel(&mut self, handle: TimeoutHandle) {
        let mut state = self.state.borrow_mut();
        state.staged.retain(|(staged, _)| *staged != handle);
        state.armed.retain(|(armed, _)| *armed != handle);
    }

    fn start_metronome(&mut self, period_ms: u64) {
        let mut state = self.state.borrow_mut();
        state.metronome_period_ms = Some(period_ms);
        state.metronome_next_ms = state.now_ms + period_ms;
    }

    fn cancel_metronome(&mut self) {
        self.state.borrow_mut().metronome_period_ms = None;
    }

    fn wall_time_ms(&self) -> u64 {
        let state = self.state.borrow();
        state.now_ms + state.wall_offset_ms
    }

    fn monotonic_time_ms(&self) -> u64 {
        self.state.borrow().now_ms
    }
}
