//! The simulation engine.
//!
//! Runs on a single logical thread. Pending work is a queue of `(time, key, task)` jobs. Each
//! iteration takes every job at the earliest time as one batch, runs each job in its own
//! [TaskFrame] over the shared root cells, and commits the concurrent combination of their graphs
//! to the timeline. Jobs released during a batch (say, by a task completing) run in a later batch
//! at the same instant.
//!
//! Task keys are derived from the schedule rather than from execution order, so a batch is
//! always processed in the same order whether the run is fresh or incremental.

use crate::error::KernelError;
use crate::event::{Event, TaskId};
use crate::graph::EventGraph;
use crate::live_cells::LiveCells;
use crate::model::MissionModel;
use crate::plan::{DirectiveId, Schedule};
use crate::results::{ActivitySpan, CommitRecord, Profiles, SimulationResults, push_segment};
use crate::source::{TemporalEventSource, TemporalEventSourceDelta, timed_commits};
use crate::task::{
    Activity, Breadcrumb, Breadcrumbs, Interrupt, Scheduler, Suspend, TaskContext, TaskFrame,
};
use crate::{Result, Time};
use hifitime::Duration;
use serde::{Deserialize, Serialize};
use slab::Slab;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{debug, info, info_span, trace};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Daemons are numbered in registration order.
    Daemon(u32),
    Directive(DirectiveId),
}

/// A stable identity for a task: where it came from, and which child of which child it is.
///
/// Unlike [TaskId], the key of a task does not depend on how the run got to it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub origin: Origin,
    pub path: SmallVec<u32, 4>,
}

impl TaskKey {
    fn root(origin: Origin) -> Self {
        TaskKey {
            origin,
            path: SmallVec::new(),
        }
    }

    fn child(&self, index: u32) -> Self {
        let mut path = self.path.clone();
        path.push(index);
        TaskKey {
            origin: self.origin,
            path,
        }
    }

    pub fn directive(&self) -> Option<DirectiveId> {
        match self.origin {
            Origin::Directive(id) => Some(id),
            Origin::Daemon(_) => None,
        }
    }
}

impl Display for TaskKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.origin {
            Origin::Daemon(i) => write!(f, "daemon {i}")?,
            Origin::Directive(id) => write!(f, "{id}")?,
        }
        for index in &self.path {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Outcome {
    Completed,
    Suspended(Suspend),
}

#[derive(Clone, Debug)]
struct StepRecord {
    time: Duration,
    /// Length of the task's log when the step ended.
    log_len: usize,
    outcome: Outcome,
}

#[derive(Clone)]
struct TaskEntry {
    activity: Arc<dyn Activity>,
    key: TaskKey,
    parent: Option<TaskId>,
    spawned_at: Duration,
    log: Breadcrumbs,
    steps: Vec<StepRecord>,
    children: Vec<TaskId>,
}

impl TaskEntry {
    fn new(activity: Arc<dyn Activity>, key: TaskKey, parent: Option<TaskId>, at: Duration) -> Self {
        TaskEntry {
            activity,
            key,
            parent,
            spawned_at: at,
            log: Breadcrumbs::default(),
            steps: Vec::new(),
            children: Vec::new(),
        }
    }

    fn completed_at(&self) -> Option<Duration> {
        self.steps
            .last()
            .filter(|step| step.outcome == Outcome::Completed)
            .map(|step| step.time)
    }

    /// Forgets every step at or after `time`.
    fn truncate(&mut self, time: Duration) {
        let kept = self.steps.partition_point(|step| step.time < time);
        self.steps.truncate(kept);
        self.log
            .truncate(self.steps.last().map_or(0, |step| step.log_len));
    }
}

/// The task table.
#[derive(Clone, Default)]
struct Tasks(Slab<TaskEntry>);

impl Tasks {
    fn insert(&mut self, entry: TaskEntry) -> TaskId {
        TaskId(self.0.insert(entry))
    }

    fn get(&self, task: TaskId) -> Result<&TaskEntry, KernelError> {
        self.0.get(task.0).ok_or(KernelError::UnknownTask { task })
    }

    fn get_mut(&mut self, task: TaskId) -> Result<&mut TaskEntry, KernelError> {
        self.0.get_mut(task.0).ok_or(KernelError::UnknownTask { task })
    }
}

impl Scheduler for Tasks {
    fn spawn(
        &mut self,
        parent: TaskId,
        activity: Arc<dyn Activity>,
        at: Duration,
    ) -> Result<TaskId, KernelError> {
        let entry = self.get(parent)?;
        let key = entry.key.child(entry.children.len() as u32);
        let child = self.insert(TaskEntry::new(activity, key, Some(parent), at));
        self.get_mut(parent)?.children.push(child);
        Ok(child)
    }

    fn is_complete(&self, task: TaskId) -> Result<bool, KernelError> {
        Ok(self.get(task)?.completed_at().is_some())
    }

    fn children_complete(&self, task: TaskId) -> Result<bool, KernelError> {
        for child in &self.get(task)?.children {
            if !self.is_complete(*child)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Everything a completed run leaves behind for the next run to build on.
#[derive(Clone)]
pub(crate) struct Checkpoint {
    timeline: TemporalEventSource,
    tasks: Tasks,
    /// `(scheduled at, wake time)` of every expiry wake-up.
    wake_log: Vec<(Duration, Duration)>,
    profiles: Profiles,
    schedule: Schedule,
    horizon: Duration,
    results: SimulationResults,
}

enum Timeline {
    Fresh(TemporalEventSource),
    Patched(TemporalEventSourceDelta),
}

impl Timeline {
    fn advance_to(&self, time: Duration) -> Result<()> {
        match self {
            Timeline::Fresh(source) => source.add_delta(time - source.end_time()),
            Timeline::Patched(overlay) => {
                overlay.advance_frontier(time);
                Ok(())
            }
        }
    }

    fn commit(&self, time: Duration, graph: EventGraph<Event>) -> Result<()> {
        match self {
            Timeline::Fresh(source) => source.add_commit(graph),
            Timeline::Patched(overlay) => overlay.put(time, graph)?,
        }
        Ok(())
    }

    fn finish(self) -> TemporalEventSource {
        match self {
            Timeline::Fresh(source) => source,
            Timeline::Patched(overlay) => overlay.materialize(),
        }
    }
}

/// The earliest time at which two schedules differ, if they do.
fn resume_point(old: &Schedule, new: &Schedule) -> Option<Duration> {
    let mut earliest: Option<Duration> = None;
    let mut touch = |time: Duration| {
        earliest = Some(earliest.map_or(time, |e| e.min(time)));
    };
    for (id, before) in old {
        match new.get(id) {
            None => touch(before.time),
            Some(after) if !after.same_as(before) => {
                touch(before.time);
                touch(after.time);
            }
            Some(_) => {}
        }
    }
    for (id, after) in new {
        if !old.contains_key(id) {
            touch(after.time);
        }
    }
    earliest
}

/// Simulates `schedule`, reusing `previous` where the schedule has not changed.
///
/// Returns the results, and a checkpoint if the run was not cancelled.
pub(crate) fn simulate(
    model: &MissionModel,
    start: Time,
    horizon: Duration,
    schedule: &Schedule,
    previous: Option<&Checkpoint>,
    cancel: &dyn Fn() -> bool,
) -> Result<(SimulationResults, Option<Checkpoint>)> {
    let span = info_span!("simulate", directives = schedule.len(), %horizon);
    let _enter = span.enter();

    let mut simulation = match previous.filter(|checkpoint| checkpoint.horizon == horizon) {
        Some(checkpoint) => match resume_point(&checkpoint.schedule, schedule) {
            Some(resume) if resume == Duration::ZERO => {
                Simulation::fresh(model, start, horizon, schedule)?
            }
            Some(resume) if resume < horizon => {
                Simulation::resume(model, start, horizon, schedule, checkpoint, resume)?
            }
            _ => {
                info!("no change before the horizon, reusing previous results");
                let mut checkpoint = checkpoint.clone();
                checkpoint.schedule = schedule.clone();
                return Ok((checkpoint.results.clone(), Some(checkpoint)));
            }
        },
        None => Simulation::fresh(model, start, horizon, schedule)?,
    };

    let completed = simulation.run(cancel)?;
    if !completed {
        info!("simulation cancelled, returning partial results");
    }
    let (results, checkpoint) = simulation.finish(schedule, !completed);
    Ok((results, completed.then_some(checkpoint)))
}

struct Simulation<'a> {
    model: &'a MissionModel,
    start: Time,
    horizon: Duration,
    timeline: Timeline,
    cells: Arc<LiveCells>,
    tasks: Tasks,
    queue: BTreeSet<(Duration, TaskKey, TaskId)>,
    waiters: BTreeMap<TaskId, Vec<TaskId>>,
    awaiting_children: BTreeSet<TaskId>,
    wakes: BTreeSet<Duration>,
    wake_log: Vec<(Duration, Duration)>,
    profiles: Profiles,
}

impl<'a> Simulation<'a> {
    fn new(
        model: &'a MissionModel,
        start: Time,
        horizon: Duration,
        timeline: Timeline,
        cells: Arc<LiveCells>,
    ) -> Self {
        Simulation {
            model,
            start,
            horizon,
            timeline,
            cells,
            tasks: Tasks::default(),
            queue: BTreeSet::new(),
            waiters: BTreeMap::new(),
            awaiting_children: BTreeSet::new(),
            wakes: BTreeSet::new(),
            wake_log: Vec::new(),
            profiles: Profiles::new(),
        }
    }

    fn fresh(
        model: &'a MissionModel,
        start: Time,
        horizon: Duration,
        schedule: &Schedule,
    ) -> Result<Self> {
        debug!("starting a fresh simulation");
        let source = TemporalEventSource::new();
        let cells = model.instantiate(Arc::new(source.clone()));
        let mut simulation = Self::new(model, start, horizon, Timeline::Fresh(source), cells);

        for (i, daemon) in model.daemons().iter().enumerate() {
            let key = TaskKey::root(Origin::Daemon(i as u32));
            simulation.start_task(daemon.clone(), key, Duration::ZERO);
        }
        simulation.start_directives(schedule, Duration::ZERO);
        simulation.sample(Duration::ZERO)?;
        Ok(simulation)
    }

    /// Rebuilds the state of the previous run as of `resume`, on top of an overlay of its timeline.
    fn resume(
        model: &'a MissionModel,
        start: Time,
        horizon: Duration,
        schedule: &Schedule,
        checkpoint: &Checkpoint,
        resume: Duration,
    ) -> Result<Self> {
        let overlay = TemporalEventSourceDelta::resume_from(checkpoint.timeline.clone(), resume);
        let cells = model.instantiate(Arc::new(overlay.clone()));
        let mut simulation = Self::new(model, start, horizon, Timeline::Patched(overlay), cells);

        let carried = |task: &TaskId| {
            checkpoint
                .tasks
                .0
                .get(task.0)
                .is_some_and(|entry| entry.spawned_at < resume)
        };
        let mut tasks = checkpoint.tasks.clone();
        tasks.0.retain(|_, entry| entry.spawned_at < resume);

        for (index, entry) in tasks.0.iter_mut() {
            entry.truncate(resume);
            entry.children.retain(|child| carried(child));

            let task = TaskId(index);
            // Every carried task ran at least once, when it was spawned.
            let Some(last) = entry.steps.last() else {
                continue;
            };
            match last.outcome {
                Outcome::Completed => {}
                Outcome::Suspended(Suspend::DeferFor(delay)) => {
                    simulation
                        .queue
                        .insert((last.time + delay, entry.key.clone(), task));
                }
                Outcome::Suspended(Suspend::AwaitCompletionOf(other)) => {
                    simulation.waiters.entry(other).or_default().push(task);
                }
                Outcome::Suspended(Suspend::AwaitChildren) => {
                    simulation.awaiting_children.insert(task);
                }
            }
        }
        info!(
            %resume,
            carried_tasks = tasks.0.len(),
            dropped_tasks = checkpoint.tasks.0.len() - tasks.0.len(),
            "re-simulating incrementally"
        );
        simulation.tasks = tasks;
        simulation.start_directives(schedule, resume);

        for &(scheduled, wake) in &checkpoint.wake_log {
            if scheduled < resume {
                simulation.wake_log.push((scheduled, wake));
                if wake >= resume {
                    simulation.wakes.insert(wake);
                }
            }
        }

        simulation.profiles = checkpoint.profiles.clone();
        for profile in simulation.profiles.values_mut() {
            let kept = profile.partition_point(|segment| segment.start < resume);
            profile.truncate(kept);
        }
        Ok(simulation)
    }

    fn start_task(&mut self, activity: Arc<dyn Activity>, key: TaskKey, at: Duration) {
        if at >= self.horizon {
            return;
        }
        let task = self.tasks.insert(TaskEntry::new(activity, key.clone(), None, at));
        self.queue.insert((at, key, task));
    }

    fn start_directives(&mut self, schedule: &Schedule, from: Duration) {
        for (id, directive) in schedule {
            if directive.time >= from {
                let key = TaskKey::root(Origin::Directive(*id));
                self.start_task(directive.activity.clone(), key, directive.time);
            }
        }
    }

    /// Runs batches until the horizon. Returns false if cancelled.
    fn run(&mut self, cancel: &dyn Fn() -> bool) -> Result<bool> {
        loop {
            if cancel() {
                return Ok(false);
            }
            let next_job = self.queue.first().map(|(time, _, _)| *time);
            let next_wake = self.wakes.first().copied();
            let Some(time) = [next_job, next_wake].into_iter().flatten().min() else {
                break;
            };
            if time >= self.horizon {
                break;
            }
            self.batch(time)?;
        }
        self.timeline.advance_to(self.horizon)?;
        Ok(true)
    }

    fn batch(&mut self, time: Duration) -> Result<()> {
        self.timeline.advance_to(time)?;
        self.wakes.remove(&time);

        let mut jobs = Vec::new();
        while let Some(job) = self.queue.first() {
            if job.0 != time {
                break;
            }
            jobs.extend(self.queue.pop_first());
        }
        debug!(%time, jobs = jobs.len(), "batch");

        let context = self.cells.clone();
        let mut graphs = Vec::with_capacity(jobs.len());
        for (_, _, task) in jobs {
            graphs.push(TaskFrame::run(task, context.clone(), &mut |task, frame| {
                self.step(task, time, frame)
            })?);
        }
        let graph = EventGraph::concurrently_all(graphs);
        if !graph.is_empty() {
            trace!(%time, events = %graph, "commit");
        }
        self.timeline.commit(time, graph)?;

        self.sample(time)?;
        self.schedule_expiry(time);
        Ok(())
    }

    fn step(&mut self, task: TaskId, time: Duration, frame: &mut TaskFrame<TaskId>) -> Result<()> {
        let entry = self.tasks.get_mut(task)?;
        if entry.completed_at().is_some() {
            return Err(KernelError::TaskAlreadyCompleted { task }.into());
        }
        if !entry.steps.is_empty() {
            entry.log.push(Breadcrumb::Advance(time));
        }
        let activity = entry.activity.clone();
        let spawned_at = entry.spawned_at;
        let mut log = std::mem::take(&mut entry.log);

        let step = {
            let mut ctx =
                TaskContext::new(task, spawned_at, self.start, &mut log, frame, &mut self.tasks);
            activity.run(&mut ctx)
        };

        let entry = self.tasks.get_mut(task)?;
        entry.log = log;
        let outcome = match step {
            Ok(()) => Outcome::Completed,
            Err(Interrupt::Suspend(reason)) => Outcome::Suspended(reason),
            Err(Interrupt::Failed(error)) => {
                return Err(error.context(format!(
                    "activity {} ({}) failed at {time}",
                    activity.name(),
                    entry.key
                )));
            }
        };
        entry.steps.push(StepRecord {
            time,
            log_len: entry.log.len(),
            outcome,
        });
        trace!(%task, ?outcome, "stepped");

        match outcome {
            Outcome::Completed => self.complete(task, time),
            Outcome::Suspended(Suspend::DeferFor(delay)) => self.resume_at(task, time + delay),
            Outcome::Suspended(Suspend::AwaitCompletionOf(other)) => {
                self.waiters.entry(other).or_default().push(task);
                Ok(())
            }
            Outcome::Suspended(Suspend::AwaitChildren) => {
                self.awaiting_children.insert(task);
                Ok(())
            }
        }
    }

    fn resume_at(&mut self, task: TaskId, time: Duration) -> Result<()> {
        let key = self.tasks.get(task)?.key.clone();
        self.queue.insert((time, key, task));
        Ok(())
    }

    fn complete(&mut self, task: TaskId, time: Duration) -> Result<()> {
        for waiter in self.waiters.remove(&task).unwrap_or_default() {
            self.resume_at(waiter, time)?;
        }
        if let Some(parent) = self.tasks.get(task)?.parent {
            if self.awaiting_children.contains(&parent) && self.tasks.children_complete(parent)? {
                self.awaiting_children.remove(&parent);
                self.resume_at(parent, time)?;
            }
        }
        Ok(())
    }

    fn sample(&mut self, time: Duration) -> Result<()> {
        for (name, value) in self.model.sample_all(&self.cells) {
            let profile = self.profiles.entry(name.to_string()).or_default();
            push_segment(profile, time, value?);
        }
        Ok(())
    }

    /// Schedules a wake-up for the soonest cell expiry.
    fn schedule_expiry(&mut self, time: Duration) {
        let soonest = self
            .model
            .cell_ids()
            .filter_map(|query| self.cells.expiry_of(query).flatten())
            .filter(|expiry| *expiry > Duration::ZERO)
            .min();
        if let Some(expiry) = soonest {
            let wake = time + expiry;
            if wake < self.horizon && self.wakes.insert(wake) {
                trace!(%time, %wake, "scheduled expiry wake-up");
                self.wake_log.push((time, wake));
            }
        }
    }

    fn finish(self, schedule: &Schedule, partial: bool) -> (SimulationResults, Checkpoint) {
        let timeline = self.timeline.finish();
        let commits = timed_commits(&timeline.points())
            .into_iter()
            .map(|(time, commit)| CommitRecord {
                time,
                graph: commit.graph().to_string(),
            })
            .collect();

        let mut spans: Vec<ActivitySpan> = self
            .tasks
            .0
            .iter()
            .filter(|(_, entry)| !entry.steps.is_empty())
            .map(|(_, entry)| ActivitySpan {
                key: entry.key.clone(),
                directive: entry.key.directive(),
                name: entry.activity.name().to_string(),
                start: entry.spawned_at,
                end: entry.completed_at(),
            })
            .collect();
        spans.sort_by(|a, b| a.key.cmp(&b.key));

        let results = SimulationResults {
            start: self.start,
            horizon: self.horizon,
            profiles: self.profiles.clone(),
            spans,
            timeline: commits,
            partial,
        };
        let checkpoint = Checkpoint {
            timeline,
            tasks: self.tasks,
            wake_log: self.wake_log,
            profiles: self.profiles,
            schedule: schedule.clone(),
            horizon: self.horizon,
            results: results.clone(),
        };
        (results, checkpoint)
    }
}
