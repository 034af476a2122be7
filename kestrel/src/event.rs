//! Topics, queries, and the events that flow through them.

use crate::hash::{IdHashBuilder, next_id};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashSet;
use std::fmt::{Debug, Display as FmtDisplay, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// The identity of a [Topic].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TopicId(u64);

/// A set of topics touched by a commit, or read by a cell.
pub type TopicSet = HashSet<TopicId, IdHashBuilder>;

/// A typed channel that events are emitted on.
///
/// Topics compare by identity. Creating two topics with the same name creates two distinct channels.
pub struct Topic<V> {
    id: TopicId,
    name: Arc<str>,
    _marker: PhantomData<fn(V) -> V>,
}

impl<V> Topic<V> {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Topic {
            id: TopicId(next_id()),
            name: name.into(),
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> TopicId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<V> Clone for Topic<V> {
    fn clone(&self) -> Self {
        Topic {
            id: self.id,
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V> PartialEq for Topic<V> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<V> Eq for Topic<V> {}

impl<V> Hash for Topic<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<V> Debug for Topic<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Topic({}#{})", self.name, self.id.0)
    }
}

/// The identity of a [Query].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct QueryId(u64);

/// A handle for looking up a cell with state `S` in a [LiveCells][crate::LiveCells] registry.
pub struct Query<S> {
    id: QueryId,
    name: Arc<str>,
    _marker: PhantomData<fn() -> S>,
}

impl<S> Query<S> {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Query {
            id: QueryId(next_id()),
            name: name.into(),
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The same query, claiming a different state type.
    #[cfg(test)]
    pub(crate) fn retyped<T>(&self) -> Query<T> {
        Query {
            id: self.id,
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<S> Clone for Query<S> {
    fn clone(&self) -> Self {
        Query {
            id: self.id,
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<S> PartialEq for Query<S> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<S> Eq for Query<S> {}

impl<S> Debug for Query<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Query({}#{})", self.name, self.id.0)
    }
}

/// A unique task ID.
///
/// Assigned by the engine when a task is spawned, and carried by every event the task emits.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Debug, Display,
)]
#[display("task {_0}")]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn new(id: usize) -> TaskId {
        TaskId(id)
    }
}

trait Payload: Any + Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + Debug> Payload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct EventInner {
    topic: TopicId,
    topic_name: Arc<str>,
    value: Box<dyn Payload>,
    provenance: TaskId,
}

/// A single occurrence of a value on a topic.
///
/// Events are immutable and compare by identity: two events carrying equal values on the same
/// topic are still different events.
#[derive(Clone)]
pub struct Event(Arc<EventInner>);

impl Event {
    pub fn new<V: Any + Send + Sync + Debug>(topic: &Topic<V>, value: V, provenance: TaskId) -> Self {
        Event(Arc::new(EventInner {
            topic: topic.id,
            topic_name: topic.name.clone(),
            value: Box::new(value),
            provenance,
        }))
    }

    pub fn topic(&self) -> TopicId {
        self.0.topic
    }

    pub fn provenance(&self) -> TaskId {
        self.0.provenance
    }

    /// Reads the value if, and only if, this event was emitted on `topic`.
    pub fn extract<V: 'static>(&self, topic: &Topic<V>) -> Option<&V> {
        if self.0.topic != topic.id {
            return None;
        }
        (*self.0.value).as_any().downcast_ref()
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Event {}

impl FmtDisplay for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={:?}", self.0.topic_name, self.0.value)
    }
}

impl Debug for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Event({}={:?} from {})",
            self.0.topic_name, self.0.value, self.0.provenance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_compare_by_identity() {
        let a = Topic::<u32>::new("mode");
        let b = Topic::<u32>::new("mode");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn extract_requires_matching_topic() {
        let a = Topic::<u32>::new("a");
        let b = Topic::<u32>::new("a");
        let event = Event::new(&a, 5, TaskId(0));

        assert_eq!(event.extract(&a), Some(&5));
        assert_eq!(event.extract(&b), None);
        assert_eq!(event.to_string(), "a=5");
    }

    #[test]
    fn events_compare_by_identity() {
        let topic = Topic::<u32>::new("a");
        let first = Event::new(&topic, 1, TaskId(0));
        let second = Event::new(&topic, 1, TaskId(0));
        assert_ne!(first, second);
        assert_eq!(first, first.clone());
    }
}
