//! An overlay that patches a committed timeline without touching it.

use super::{Commit, Cursor, EventSource, TemporalEventSource, TimePoint};
use crate::cell::ErasedCell;
use crate::error::KernelError;
use crate::event::Event;
use crate::graph::EventGraph;
use hifitime::Duration;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound::{self, Excluded, Included, Unbounded};
use std::sync::Arc;

#[derive(Default)]
struct Edits {
    /// Every time in this map is claimed: base commits at that time are hidden, and the listed
    /// commits (possibly none) are emitted instead.
    commits: BTreeMap<Duration, Vec<Arc<Commit>>>,
    /// The merged stream never runs past the frontier. `None` follows the base to its end.
    frontier: Option<Duration>,
}

/// A [TemporalEventSource] with some of its commits replaced, removed, or added.
///
/// The base is never written to. Reading the overlay merges the base's points with the edits on
/// the fly: base commits at an edited time are dropped in favor of the edit, and base deltas are
/// split exactly where an edit falls inside them. Base points that survive unchanged are passed
/// through as-is, so commits keep their identity.
///
/// An overlay can also act as the live timeline of an incremental re-simulation. It then has a
/// frontier, the time up to which the new run has progressed. Every base commit at or before the
/// frontier (after the resume time) is hidden, and new commits can only be added at or after it.
#[derive(Clone)]
pub struct TemporalEventSourceDelta {
    base: TemporalEventSource,
    /// Distinct times of the base's commits, ascending.
    base_commit_times: Arc<[Duration]>,
    edits: Arc<RwLock<Edits>>,
}

impl TemporalEventSourceDelta {
    /// A static overlay. The base must not grow while the overlay is in use.
    pub fn new(base: TemporalEventSource) -> Self {
        let mut times: Vec<Duration> = base.with_points(|points| {
            super::timed_commits(points)
                .into_iter()
                .map(|(time, _)| time)
                .collect()
        });
        times.dedup();
        TemporalEventSourceDelta {
            base,
            base_commit_times: times.into(),
            edits: Arc::new(RwLock::new(Edits::default())),
        }
    }

    /// An overlay for re-simulating from `start`.
    ///
    /// Everything before `start` is the base, unchanged. The base's commits at `start` are
    /// already hidden, and the merged stream ends at `start` until the frontier is advanced.
    pub fn resume_from(base: TemporalEventSource, start: Duration) -> Self {
        let result = Self::new(base);
        {
            let mut edits = result.edits.write();
            edits.frontier = Some(start);
            for time in result.claimable(Included(start), Included(start)) {
                edits.commits.entry(*time).or_default();
            }
        }
        result
    }

    /// Base commit times within the bounds. The times are sorted and unique.
    fn claimable(&self, from: Bound<Duration>, to: Bound<Duration>) -> &[Duration] {
        let times = &self.base_commit_times[..];
        let lo = match from {
            Included(t) => times.partition_point(|time| *time < t),
            Excluded(t) => times.partition_point(|time| *time <= t),
            Unbounded => 0,
        };
        let hi = match to {
            Included(t) => times.partition_point(|time| *time <= t),
            Excluded(t) => times.partition_point(|time| *time < t),
            Unbounded => times.len(),
        };
        &times[lo..hi.max(lo)]
    }

    pub fn base(&self) -> &TemporalEventSource {
        &self.base
    }

    pub fn frontier(&self) -> Option<Duration> {
        self.edits.read().frontier
    }

    fn check_frontier(edits: &Edits, time: Duration) -> Result<(), KernelError> {
        match edits.frontier {
            Some(frontier) if time < frontier => {
                Err(KernelError::EditBeforeFrontier { time, frontier })
            }
            _ => Ok(()),
        }
    }

    /// Adds a commit at `time`. The first edit at a time hides every base commit there.
    ///
    /// An empty graph still claims the time.
    pub fn put(&self, time: Duration, graph: EventGraph<Event>) -> Result<(), KernelError> {
        let mut edits = self.edits.write();
        Self::check_frontier(&edits, time)?;
        let commits = edits.commits.entry(time).or_default();
        if !graph.is_empty() {
            commits.push(Arc::new(Commit::new(graph)));
        }
        Ok(())
    }

    /// Hides everything at `time`, both base commits and earlier edits.
    pub fn delete(&self, time: Duration) -> Result<(), KernelError> {
        let mut edits = self.edits.write();
        Self::check_frontier(&edits, time)?;
        edits.commits.insert(time, Vec::new());
        Ok(())
    }

    /// Extends the merged stream to `time`, hiding the base commits passed over on the way.
    ///
    /// Has no effect on an overlay without a frontier, or if `time` is not past the frontier.
    pub fn advance_frontier(&self, time: Duration) {
        let mut edits = self.edits.write();
        let Some(frontier) = edits.frontier else {
            return;
        };
        if time <= frontier {
            return;
        }
        for claimed in self.claimable(Excluded(frontier), Included(time)) {
            edits.commits.entry(*claimed).or_default();
        }
        edits.frontier = Some(time);
    }

    /// Removes the frontier. The merged stream then follows the base to its end.
    pub fn release(&self) {
        self.edits.write().frontier = None;
    }

    /// A snapshot of the merged stream.
    pub fn points(&self) -> Vec<TimePoint> {
        let mut position = Position::default();
        let mut result = Vec::new();
        self.drain(&mut position, |point| result.push(point));
        result
    }

    /// Bakes the merged stream into a new standalone source.
    pub fn materialize(&self) -> TemporalEventSource {
        TemporalEventSource::from_points(self.points())
    }

    fn drain(&self, position: &mut Position, mut f: impl FnMut(TimePoint)) {
        let edits = self.edits.read();
        self.base.with_points(|base| {
            while let Some(point) = position.next(base, &edits) {
                f(point);
            }
        });
    }
}

impl EventSource for TemporalEventSourceDelta {
    fn cursor(&self) -> Box<dyn Cursor> {
        Box::new(DeltaCursor {
            overlay: self.clone(),
            position: Position::default(),
        })
    }
}

struct DeltaCursor {
    overlay: TemporalEventSourceDelta,
    position: Position,
}

impl Cursor for DeltaCursor {
    fn step_up(&mut self, cell: &mut dyn ErasedCell) {
        self.overlay
            .drain(&mut self.position, |point| point.advance(cell));
    }
}

/// How far a reader has come through the merged stream.
#[derive(Default)]
struct Position {
    /// The next base point to consider.
    base_index: usize,
    /// The time at which the point at `base_index` starts.
    base_time: Duration,
    /// The time the merged stream has reached.
    emitted: Duration,
    /// How many edit commits at `edit_time` have been emitted.
    edit_time: Option<Duration>,
    edit_index: usize,
}

impl Position {
    fn next(&mut self, base: &[TimePoint], edits: &Edits) -> Option<TimePoint> {
        // Base deltas that end at or before the emitted time are fully accounted for.
        while let Some(TimePoint::Delta(d)) = base.get(self.base_index) {
            if self.base_time + *d > self.emitted {
                break;
            }
            self.base_time = self.base_time + *d;
            self.base_index += 1;
        }

        if let Some(commits) = edits.commits.get(&self.emitted) {
            while self.base_time == self.emitted
                && matches!(base.get(self.base_index), Some(TimePoint::Commit(_)))
            {
                self.base_index += 1;
            }
            if self.edit_time != Some(self.emitted) {
                self.edit_time = Some(self.emitted);
                self.edit_index = 0;
            }
            if let Some(commit) = commits.get(self.edit_index) {
                self.edit_index += 1;
                return Some(TimePoint::Commit(commit.clone()));
            }
        } else if self.base_time == self.emitted {
            if let Some(TimePoint::Commit(commit)) = base.get(self.base_index) {
                self.base_index += 1;
                return Some(TimePoint::Commit(commit.clone()));
            }
        }

        let base_end = match base.get(self.base_index) {
            Some(TimePoint::Delta(d)) => Some(self.base_time + *d),
            _ => None,
        };
        let next_edit = edits
            .commits
            .range((Excluded(self.emitted), Unbounded))
            .next()
            .map(|(time, _)| *time);
        let target = [base_end, next_edit, edits.frontier]
            .into_iter()
            .flatten()
            .min()?;
        if target <= self.emitted {
            return None;
        }

        let step = target - self.emitted;
        let point = match base.get(self.base_index) {
            Some(TimePoint::Delta(d)) if self.base_time == self.emitted && *d == step => {
                TimePoint::Delta(*d)
            }
            _ => TimePoint::Delta(step),
        };
        self.emitted = target;
        Some(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::tests::counter;
    use crate::event::Topic;
    use crate::source::tests::{render, write};
    use hifitime::TimeUnits;

    struct Fixture {
        topic: Topic<i64>,
        base: TemporalEventSource,
    }

    /// `+10, n=1, +10, n=2, +10`
    fn fixture() -> anyhow::Result<Fixture> {
        let topic = Topic::<i64>::new("n");
        let base = TemporalEventSource::new();
        base.add_delta(10.seconds())?;
        base.add_commit(write(&topic, 1));
        base.add_delta(10.seconds())?;
        base.add_commit(write(&topic, 2));
        base.add_delta(10.seconds())?;
        Ok(Fixture { topic, base })
    }

    fn total(points: &[TimePoint]) -> Duration {
        points
            .iter()
            .fold(Duration::ZERO, |acc, point| acc + point.duration())
    }

    #[test]
    fn claimable_times_respect_the_bounds() -> anyhow::Result<()> {
        let Fixture { base, .. } = fixture()?;
        let overlay = TemporalEventSourceDelta::new(base);
        let (ten, twenty) = (10.seconds(), 20.seconds());

        assert_eq!(overlay.claimable(Included(ten), Included(ten)), [ten]);
        assert_eq!(overlay.claimable(Excluded(ten), Included(twenty)), [twenty]);
        assert!(overlay.claimable(Excluded(ten), Excluded(twenty)).is_empty());
        assert_eq!(overlay.claimable(Unbounded, Unbounded), [ten, twenty]);
        assert!(overlay.claimable(Excluded(twenty), Included(ten)).is_empty());
        Ok(())
    }

    #[test]
    fn no_edits_passes_the_base_through() -> anyhow::Result<()> {
        let Fixture { base, .. } = fixture()?;
        let overlay = TemporalEventSourceDelta::new(base.clone());
        let merged = overlay.points();
        assert_eq!(render(&merged), ["+10", "n=1", "+10", "n=2", "+10"]);

        for (original, copy) in base.points().iter().zip(&merged) {
            if let (TimePoint::Commit(a), TimePoint::Commit(b)) = (original, copy) {
                assert!(Arc::ptr_eq(a, b));
            }
        }
        Ok(())
    }

    #[test]
    fn insertion_splits_a_delta() -> anyhow::Result<()> {
        let Fixture { topic, base } = fixture()?;
        let overlay = TemporalEventSourceDelta::new(base.clone());
        overlay.put(15.seconds(), write(&topic, 7))?;

        let merged = overlay.points();
        assert_eq!(
            render(&merged),
            ["+10", "n=1", "+5", "n=7", "+5", "n=2", "+10"]
        );
        assert_eq!(total(&merged), base.end_time());
        assert_eq!(render(&base.points()), ["+10", "n=1", "+10", "n=2", "+10"]);
        Ok(())
    }

    #[test]
    fn an_edit_replaces_every_base_commit_at_its_time() -> anyhow::Result<()> {
        let Fixture { topic, base } = fixture()?;
        let overlay = TemporalEventSourceDelta::new(base);
        overlay.put(10.seconds(), write(&topic, 7))?;
        overlay.put(10.seconds(), write(&topic, 8))?;

        assert_eq!(
            render(&overlay.points()),
            ["+10", "n=7", "n=8", "+10", "n=2", "+10"]
        );
        Ok(())
    }

    #[test]
    fn deletion_leaves_the_time_intact() -> anyhow::Result<()> {
        let Fixture { base, .. } = fixture()?;
        let overlay = TemporalEventSourceDelta::new(base);
        overlay.delete(20.seconds())?;

        let merged = overlay.points();
        assert_eq!(render(&merged), ["+10", "n=1", "+10", "+10"]);
        assert_eq!(total(&merged), 30.seconds());
        assert_eq!(render(&overlay.materialize().points()), ["+10", "n=1", "+20"]);
        Ok(())
    }

    #[test]
    fn consecutive_edits_do_not_drift() -> anyhow::Result<()> {
        let Fixture { topic, base } = fixture()?;
        let overlay = TemporalEventSourceDelta::new(base);
        let times: Vec<Duration> = [12_100i64, 14_300, 16_700, 19_999]
            .into_iter()
            .map(|millis| millis.milliseconds())
            .collect();
        for (i, time) in times.iter().enumerate() {
            overlay.put(*time, write(&topic, 100 + i as i64))?;
        }

        let merged = overlay.points();
        let mut expected = vec![10.seconds()];
        expected.extend(times.iter().copied());
        expected.push(20.seconds());
        let found: Vec<Duration> = crate::source::timed_commits(&merged)
            .into_iter()
            .map(|(time, _)| time)
            .collect();
        assert_eq!(found, expected);
        assert_eq!(total(&merged), 30.seconds());
        assert_eq!(merged.len(), 13);
        Ok(())
    }

    #[test]
    fn edits_past_the_end_extend_the_stream() -> anyhow::Result<()> {
        let Fixture { topic, base } = fixture()?;
        let overlay = TemporalEventSourceDelta::new(base);
        overlay.put(45.seconds(), write(&topic, 9))?;

        assert_eq!(
            render(&overlay.points()),
            ["+10", "n=1", "+10", "n=2", "+10", "+15", "n=9"]
        );
        Ok(())
    }

    #[test]
    fn the_frontier_caps_and_claims() -> anyhow::Result<()> {
        let Fixture { topic, base } = fixture()?;
        let overlay = TemporalEventSourceDelta::resume_from(base, 10.seconds());
        assert_eq!(render(&overlay.points()), ["+10"]);

        overlay.put(10.seconds(), write(&topic, 5))?;
        assert_eq!(render(&overlay.points()), ["+10", "n=5"]);

        overlay.advance_frontier(25.seconds());
        assert_eq!(render(&overlay.points()), ["+10", "n=5", "+10", "+5"]);

        assert_eq!(
            overlay.put(20.seconds(), write(&topic, 6)),
            Err(KernelError::EditBeforeFrontier {
                time: 20.seconds(),
                frontier: 25.seconds()
            })
        );
        assert!(overlay.delete(24.seconds()).is_err());

        overlay.advance_frontier(40.seconds());
        overlay.put(40.seconds(), write(&topic, 6))?;
        assert_eq!(
            render(&overlay.materialize().points()),
            ["+10", "n=5", "+30", "n=6"]
        );
        Ok(())
    }

    #[test]
    fn cursors_follow_the_frontier() -> anyhow::Result<()> {
        let Fixture { topic, base } = fixture()?;
        let overlay = TemporalEventSourceDelta::resume_from(base, 20.seconds());
        let mut cell = counter(&topic);
        let mut cursor = overlay.cursor();

        cursor.step_up(&mut cell);
        assert_eq!(*cell.state(), 1);

        overlay.put(20.seconds(), write(&topic, 10))?;
        cursor.step_up(&mut cell);
        assert_eq!(*cell.state(), 11);

        overlay.put(20.seconds(), write(&topic, 100))?;
        overlay.advance_frontier(30.seconds());
        cursor.step_up(&mut cell);
        cursor.step_up(&mut cell);
        assert_eq!(*cell.state(), 111);
        Ok(())
    }

    #[test]
    fn release_follows_the_base_again() -> anyhow::Result<()> {
        let Fixture { topic, base } = fixture()?;
        let overlay = TemporalEventSourceDelta::resume_from(base, 5.seconds());
        overlay.put(5.seconds(), write(&topic, 3))?;
        overlay.release();
        assert_eq!(
            render(&overlay.points()),
            ["+5", "n=3", "+5", "n=1", "+10", "n=2", "+10"]
        );
        Ok(())
    }
}
