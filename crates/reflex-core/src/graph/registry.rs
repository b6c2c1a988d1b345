//! Type-indexed topic lookup.
//!
//! Maps a topic-state type `T` to the unique `Topic<T>` vertex of the
//! graph. Two interchangeable configurations:
//!
//! - **Dynamic**: a hash map keyed by runtime type identity; topics are
//!   created lazily on first resolve.
//! - **Bounded**: a fixed-capacity slot array indexed by the type's stable
//!   topic-state id, giving O(1) lookup with zero allocation after
//!   construction. All topics must be pre-registered.

use std::any::TypeId;

use fxhash::FxHashMap;

use crate::graph::error::GraphError;
use crate::graph::topic::{type_state_id, TopicState, ANONYMOUS_TOPIC_STATE};
use crate::graph::vertex::VertexId;

/// A bounded-registry entry.
#[derive(Debug, Clone, Copy)]
struct RegisteredTopic {
    vertex: VertexId,
    type_id: TypeId,
}

/// Type-indexed mapping from topic-state types to their topic vertices.
pub(crate) enum TopicRegistry {
    /// General associative lookup keyed by runtime type identity.
    Dynamic(FxHashMap<TypeId, VertexId>),
    /// Fixed-capacity array indexed by topic-state id.
    Bounded(Box<[Option<RegisteredTopic>]>),
}

impl TopicRegistry {
    pub(crate) fn dynamic() -> Self {
        Self::Dynamic(FxHashMap::default())
    }

    pub(crate) fn bounded(capacity: usize) -> Self {
        Self::Bounded(vec![None; capacity].into_boxed_slice())
    }

    /// Looks up the topic vertex for `T`, if registered.
    pub(crate) fn lookup<T: TopicState + Default>(&self) -> Option<VertexId> {
        match self {
            Self::Dynamic(map) => map.get(&TypeId::of::<T>()).copied(),
            Self::Bounded(slots) => {
                let id = type_state_id::<T>();
                if id == ANONYMOUS_TOPIC_STATE {
                    return None;
                }
                let slot = slots.get(usize::try_from(id).ok()?)?;
                slot.as_ref()
                    .filter(|entry| entry.type_id == TypeId::of::<T>())
                    .map(|entry| entry.vertex)
            }
        }
    }

    /// Validates that `T` can be registered, without mutating the registry.
    pub(crate) fn check_insert<T: TopicState + Default>(&self) -> Result<(), GraphError> {
        match self {
            Self::Dynamic(map) => {
                if map.contains_key(&TypeId::of::<T>()) {
                    return Err(GraphError::DuplicateTopic(std::any::type_name::<T>()));
                }
            }
            Self::Bounded(slots) => {
                let id = type_state_id::<T>();
                if id == ANONYMOUS_TOPIC_STATE {
                    return Err(GraphError::AnonymousTopic(std::any::type_name::<T>()));
                }
                let index = usize::try_from(id).map_err(|_| GraphError::TopicIdOutOfRange {
                    id,
                    capacity: slots.len(),
                })?;
                match slots.get(index) {
                    None => {
                        return Err(GraphError::TopicIdOutOfRange {
                            id,
                            capacity: slots.len(),
                        })
                    }
                    Some(Some(_)) => {
                        return Err(GraphError::DuplicateTopic(std::any::type_name::<T>()))
                    }
                    Some(None) => {}
                }
            }
        }
        Ok(())
    }

    /// Registers the topic vertex for `T`.
    ///
    /// Callers run [`check_insert`](Self::check_insert) first; this method
    /// only fails on the conditions that check validates.
    pub(crate) fn insert<T: TopicState + Default>(
        &mut self,
        vertex: VertexId,
    ) -> Result<(), GraphError> {
        self.check_insert::<T>()?;
        match self {
            Self::Dynamic(map) => {
                map.insert(TypeId::of::<T>(), vertex);
            }
            Self::Bounded(slots) => {
                let index = usize::try_from(type_state_id::<T>())
                    .expect("check_insert admitted a negative topic id");
                slots[index] = Some(RegisteredTopic {
                    vertex,
                    type_id: TypeId::of::<T>(),
                });
            }
        }
        Ok(())
    }

    /// Number of registered topics.
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Dynamic(map) => map.len(),
            Self::Bounded(slots) => slots.iter().filter(|slot| slot.is_some()).count(),
        }
    }
}
