//! Timelines that cells read from, and the per-cell cursors that read them.
//!
//! A source is append-only, or an overlay of an append-only source. Every cell bound to a source
//! gets its own [Cursor], which remembers how much of the source that cell has already absorbed.
//! Cursors are pulled lazily, when someone asks for the cell's state.

mod causal;
mod delta;
mod temporal;

pub use causal::CausalEventSource;
pub use delta::TemporalEventSourceDelta;
pub use temporal::TemporalEventSource;

use crate::cell::ErasedCell;
use crate::event::{Event, TopicSet};
use crate::graph::EventGraph;
use hifitime::Duration;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub trait EventSource: Send + Sync {
    fn cursor(&self) -> Box<dyn Cursor>;
}

/// One cell's read position in an [EventSource].
pub trait Cursor: Send {
    /// Brings `cell` up to date with everything this cursor has not consumed yet.
    fn step_up(&mut self, cell: &mut dyn ErasedCell);
}

/// A committed event graph, with the topics it touches computed once up front.
pub struct Commit {
    graph: EventGraph<Event>,
    topics: TopicSet,
}

impl Commit {
    pub fn new(graph: EventGraph<Event>) -> Self {
        let mut topics = TopicSet::default();
        graph.for_each_atom(|event| {
            topics.insert(event.topic());
        });
        Commit { graph, topics }
    }

    pub fn graph(&self) -> &EventGraph<Event> {
        &self.graph
    }

    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }
}

impl Debug for Commit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Commit({})", self.graph)
    }
}

#[derive(Clone, Debug)]
pub enum TimePoint {
    /// Time passes with nothing happening.
    Delta(Duration),
    Commit(Arc<Commit>),
}

impl TimePoint {
    /// How far this point moves the clock.
    pub fn duration(&self) -> Duration {
        match self {
            TimePoint::Delta(d) => *d,
            TimePoint::Commit(_) => Duration::ZERO,
        }
    }

    /// Deltas always step the cell. Commits are only evaluated if the cell listens to one of
    /// their topics.
    pub(crate) fn advance(&self, cell: &mut dyn ErasedCell) {
        match self {
            TimePoint::Delta(d) => cell.step(*d),
            TimePoint::Commit(commit) => {
                if cell.is_interested_in(&commit.topics) {
                    cell.apply(&commit.graph);
                }
            }
        }
    }
}

/// Pairs every commit in `points` with the time it happened at.
pub fn timed_commits(points: &[TimePoint]) -> Vec<(Duration, Arc<Commit>)> {
    let mut now = Duration::ZERO;
    let mut result = Vec::new();
    for point in points {
        match point {
            TimePoint::Delta(d) => now = now + *d,
            TimePoint::Commit(commit) => result.push((now, commit.clone())),
        }
    }
    result
}
