//! Cross-pass state capture.
//!
//! A [`StateSnapshot`] is an immutable map from topic-state id to the
//! latest value published under that id, built by folding successive
//! output lists. Only named topic states (positive id) participate;
//! anonymous states exist purely for intra-graph signalling.
//!
//! [`GraphStateStore`] keeps the latest snapshot plus one lookback. The
//! resume protocol closes the loop back into the graph: at startup the
//! application pushes a [`ResumeFromSnapshot`] carrying a primed snapshot,
//! and every stateful detector subscribes to it and initialises its state
//! from the snapshot, at most once per graph lifetime, in the same pass
//! ordering as any external input.

use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::graph::error::ErrorKind;
use crate::graph::topic::{type_state_id, TopicState, TopicStateId, ANONYMOUS_TOPIC_STATE};

/// Errors raised while composing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Two values with the same topic-state id arrived in one extension.
    ///
    /// Output lists concatenate topic by topic, so duplicates of one named
    /// type come consecutively; two of them in a single pass means two
    /// publishers share a named type, which is a graph design error.
    #[error("duplicate topic state id {0} in one snapshot extension")]
    DuplicateStateId(TopicStateId),
}

impl SnapshotError {
    /// Returns the coarse [`ErrorKind`] of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateStateId(_) => ErrorKind::ContractViolation,
        }
    }
}

/// The collection of named topic states the graph has produced so far.
///
/// Immutable once constructed; shared by reference between holders.
pub struct StateSnapshot {
    states: BTreeMap<TopicStateId, Arc<dyn TopicState>>,
    version: u32,
}

impl StateSnapshot {
    /// The T=0 snapshot: version 0, no states.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            states: BTreeMap::new(),
            version: 0,
        }
    }

    /// Builds a version-0 snapshot from a list of initial values.
    ///
    /// Anonymous values are ignored.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::DuplicateStateId`] when the list carries two
    /// consecutive values of the same named id.
    pub fn prime(initial: &[Arc<dyn TopicState>]) -> Result<Self, SnapshotError> {
        let mut snapshot = Self::empty();
        snapshot.fold(initial)?;
        Ok(snapshot)
    }

    /// Builds the successor of `previous` by overwriting the entries for
    /// every named value in `outputs`.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::DuplicateStateId`] when `outputs` carries two
    /// consecutive values of the same named id.
    pub fn extend(
        previous: &StateSnapshot,
        outputs: &[Arc<dyn TopicState>],
    ) -> Result<Self, SnapshotError> {
        let mut snapshot = Self {
            states: previous.states.clone(),
            version: previous.version + 1,
        };
        snapshot.fold(outputs)?;
        debug!(version = snapshot.version, states = snapshot.states.len(), "snapshot extended");
        Ok(snapshot)
    }

    fn fold(&mut self, values: &[Arc<dyn TopicState>]) -> Result<(), SnapshotError> {
        // Output lists are concatenated topic by topic, so a named type
        // published twice in one pass shows up as consecutive entries.
        let mut previous_id = ANONYMOUS_TOPIC_STATE;
        for value in values {
            let id = value.id();
            if id == ANONYMOUS_TOPIC_STATE {
                continue;
            }
            if id == previous_id {
                return Err(SnapshotError::DuplicateStateId(id));
            }
            previous_id = id;
            self.states.insert(id, Arc::clone(value));
        }
        Ok(())
    }

    /// Returns the stored value for a topic-state id.
    #[must_use]
    pub fn get_by_id(&self, id: TopicStateId) -> Option<&Arc<dyn TopicState>> {
        self.states.get(&id)
    }

    /// Returns the stored value of type `T`, downcast.
    #[must_use]
    pub fn get<T: TopicState + Default>(&self) -> Option<&T> {
        let state = self.get_by_id(type_state_id::<T>())?;
        (state.as_ref() as &dyn Any).downcast_ref::<T>()
    }

    /// The snapshot version; incremented at every extension.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of named states stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns whether the snapshot stores no states.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Iterates the stored values in id order.
    pub fn topic_values(&self) -> impl Iterator<Item = &Arc<dyn TopicState>> {
        self.states.values()
    }
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSnapshot")
            .field("version", &self.version)
            .field("states", &self.states.len())
            .finish_non_exhaustive()
    }
}

/// Keeper of the latest [`StateSnapshot`] and one lookback.
pub struct GraphStateStore {
    lookback: VecDeque<Arc<StateSnapshot>>,
}

/// How many snapshots the store retains.
const MAX_LOOKBACK: usize = 2;

impl GraphStateStore {
    /// Creates a store holding the empty T=0 snapshot.
    #[must_use]
    pub fn new() -> Self {
        let mut lookback = VecDeque::with_capacity(MAX_LOOKBACK);
        lookback.push_back(Arc::new(StateSnapshot::empty()));
        Self { lookback }
    }

    /// Extends the latest snapshot with a pass's output list and appends
    /// the result.
    ///
    /// # Errors
    ///
    /// Propagates [`StateSnapshot::extend`] errors; the store is unchanged
    /// on failure.
    pub fn take_new_snapshot(
        &mut self,
        outputs: &[Arc<dyn TopicState>],
    ) -> Result<(), SnapshotError> {
        let next = StateSnapshot::extend(self.latest(), outputs)?;
        self.lookback.push_back(Arc::new(next));
        if self.lookback.len() > MAX_LOOKBACK {
            self.lookback.pop_front();
        }
        Ok(())
    }

    /// The most recent snapshot. Always present; possibly empty.
    #[must_use]
    pub fn latest(&self) -> &Arc<StateSnapshot> {
        self.lookback.back().expect("state store is never empty")
    }

    /// The snapshot before the latest, if one was taken already.
    #[must_use]
    pub fn previous(&self) -> Option<&Arc<StateSnapshot>> {
        if self.lookback.len() < MAX_LOOKBACK {
            return None;
        }
        self.lookback.front()
    }
}

impl Default for GraphStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GraphStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphStateStore")
            .field("latest_version", &self.latest().version())
            .finish_non_exhaustive()
    }
}

/// Topic state carrying a snapshot for the resume protocol.
///
/// Anonymous on purpose: a snapshot must never capture the topic that
/// redistributes snapshots, or it would grow mirror-against-mirror.
#[derive(Debug, Clone, Default)]
pub struct ResumeFromSnapshot {
    /// The snapshot to resume from.
    pub snapshot: Arc<StateSnapshot>,
}

impl TopicState for ResumeFromSnapshot {}
