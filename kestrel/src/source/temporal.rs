use super::{Commit, Cursor, EventSource, TimePoint};
use crate::cell::ErasedCell;
use crate::event::Event;
use crate::graph::EventGraph;
use anyhow::{Result, bail};
use hifitime::Duration;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Default)]
struct Points {
    points: Vec<TimePoint>,
    end: Duration,
}

/// The committed timeline of a simulation: an append-only list of deltas and commits.
///
/// Cloning the source clones the handle, not the timeline.
#[derive(Clone, Default)]
pub struct TemporalEventSource(Arc<RwLock<Points>>);

impl TemporalEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a source from existing points, merging runs of adjacent deltas.
    pub fn from_points(points: impl IntoIterator<Item = TimePoint>) -> Self {
        let mut result = Points::default();
        for point in points {
            result.end = result.end + point.duration();
            match (result.points.last_mut(), point) {
                (Some(TimePoint::Delta(last)), TimePoint::Delta(d)) => *last = *last + d,
                (_, point) => result.points.push(point),
            }
        }
        TemporalEventSource(Arc::new(RwLock::new(result)))
    }

    /// Appends a wait. Zero-length waits are dropped.
    pub fn add_delta(&self, delta: Duration) -> Result<()> {
        if delta.is_negative() {
            bail!("cannot append a negative delta of {delta} to a timeline");
        }
        if delta == Duration::ZERO {
            return Ok(());
        }
        let mut inner = self.0.write();
        inner.end = inner.end + delta;
        inner.points.push(TimePoint::Delta(delta));
        Ok(())
    }

    /// Appends a commit at the current end of the timeline. Empty graphs are dropped.
    pub fn add_commit(&self, graph: EventGraph<Event>) {
        if graph.is_empty() {
            return;
        }
        self.0
            .write()
            .points
            .push(TimePoint::Commit(Arc::new(Commit::new(graph))));
    }

    /// A snapshot of the timeline so far.
    pub fn points(&self) -> Vec<TimePoint> {
        self.0.read().points.clone()
    }

    pub fn len(&self) -> usize {
        self.0.read().points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().points.is_empty()
    }

    /// The sum of every delta.
    pub fn end_time(&self) -> Duration {
        self.0.read().end
    }

    pub(crate) fn with_points<T>(&self, f: impl FnOnce(&[TimePoint]) -> T) -> T {
        f(&self.0.read().points)
    }
}

impl EventSource for TemporalEventSource {
    fn cursor(&self) -> Box<dyn Cursor> {
        Box::new(TemporalCursor {
            source: self.clone(),
            index: 0,
        })
    }
}

struct TemporalCursor {
    source: TemporalEventSource,
    index: usize,
}

impl Cursor for TemporalCursor {
    fn step_up(&mut self, cell: &mut dyn ErasedCell) {
        let inner = self.source.0.read();
        for point in &inner.points[self.index..] {
            point.advance(cell);
        }
        self.index = inner.points.len();
    }
}
