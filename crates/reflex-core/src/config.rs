//! Engine configuration.
//!
//! [`GraphConfig`] selects the registry mode and carries the capacity limits
//! of the bounded build. The default configuration is fully dynamic: topics
//! are created lazily and no capacity is enforced. [`GraphConfig::bounded`]
//! produces the constrained-target configuration, where every container has
//! a fixed capacity drawn from the [`limits`] constants and exceeding a
//! limit is a configuration fault.

/// Default capacity limits for the bounded build.
///
/// These are deliberately small; constrained targets should tune them to
/// the actual graph via a custom [`GraphConfig`].
pub mod limits {
    /// Maximum number of vertices (topics plus detectors).
    pub const MAX_VERTICES: usize = 64;
    /// Maximum immediate out-edges per vertex.
    pub const MAX_OUT_EDGES: usize = 8;
    /// Maximum immediate in-edges per vertex.
    pub const MAX_IN_EDGES: usize = 8;
    /// Maximum values a single topic may carry in one evaluation pass.
    pub const MAX_TOPIC_VALUES: usize = 8;
    /// Maximum number of registered topics (bounded registry capacity).
    pub const MAX_TOPICS: usize = 32;
    /// Maximum number of concurrently armed one-shot timeouts.
    pub const MAX_TIMEOUTS: usize = 8;
    /// Maximum number of periodic publishing series.
    pub const MAX_PERIODIC_TIMERS: usize = 4;
}

/// Topic registry mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryMode {
    /// Topics are created lazily on first use, keyed by runtime type
    /// identity.
    #[default]
    Dynamic,
    /// Topics live in a fixed-capacity slot array indexed by their stable
    /// topic-state id and must be pre-registered before any detector that
    /// depends on them is wired.
    Bounded,
}

/// Build-time configuration for a [`Graph`](crate::Graph).
///
/// Two recognized shapes:
///
/// - [`GraphConfig::default`]: dynamic registry, no capacity limits.
/// - [`GraphConfig::bounded`]: bounded registry, capacities from [`limits`].
///
/// Both shapes are interchangeable at the API level; behaviour only
/// differs where capacities bite (capacity faults, one pending input per
/// topic, timer slot reuse).
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Registry mode (dynamic lookup vs. id-indexed slot array).
    pub registry: RegistryMode,
    /// Maximum number of vertices in the graph.
    pub max_vertices: usize,
    /// Maximum immediate out-edges per vertex.
    pub max_out_edges: usize,
    /// Maximum immediate in-edges per vertex.
    pub max_in_edges: usize,
    /// Maximum values a topic may carry in a single pass.
    pub max_topic_values: usize,
    /// Maximum number of registered topics.
    pub max_topics: usize,
    /// Maximum number of concurrently armed one-shot timeouts.
    pub max_timeouts: usize,
    /// Maximum number of periodic publishing series.
    pub max_periodic_timers: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            registry: RegistryMode::Dynamic,
            max_vertices: usize::MAX,
            max_out_edges: usize::MAX,
            max_in_edges: usize::MAX,
            max_topic_values: usize::MAX,
            max_topics: usize::MAX,
            max_timeouts: usize::MAX,
            max_periodic_timers: usize::MAX,
        }
    }
}

impl GraphConfig {
    /// Returns the bounded-build configuration with the default [`limits`].
    #[must_use]
    pub fn bounded() -> Self {
        Self {
            registry: RegistryMode::Bounded,
            max_vertices: limits::MAX_VERTICES,
            max_out_edges: limits::MAX_OUT_EDGES,
            max_in_edges: limits::MAX_IN_EDGES,
            max_topic_values: limits::MAX_TOPIC_VALUES,
            max_topics: limits::MAX_TOPICS,
            max_timeouts: limits::MAX_TIMEOUTS,
            max_periodic_timers: limits::MAX_PERIODIC_TIMERS,
        }
    }

    /// Returns whether this configuration enforces bounded-build semantics.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.registry == RegistryMode::Bounded
    }
}
