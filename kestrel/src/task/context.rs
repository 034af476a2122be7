use super::{Activity, Breadcrumb, Breadcrumbs, Interrupt, Suspend};
use crate::error::KernelError;
use crate::event::{Event, Query, TaskId, Topic};
use crate::time::duration_to_epoch;
use crate::{Duration, Time};
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use super::TaskFrame;

/// What a running task needs from the engine's task table.
pub(crate) trait Scheduler {
    /// Registers a child of `parent`, starting at `at`. The caller is responsible for running it.
    fn spawn(
        &mut self,
        parent: TaskId,
        activity: Arc<dyn Activity>,
        at: Duration,
    ) -> Result<TaskId, KernelError>;
    fn is_complete(&self, task: TaskId) -> Result<bool, KernelError>;
    fn children_complete(&self, task: TaskId) -> Result<bool, KernelError>;
}

/// A task's handle on the simulation while it runs.
///
/// Every way an activity can observe or affect the simulation goes through here.
pub struct TaskContext<'a> {
    task: TaskId,
    now: Duration,
    plan_start: Time,
    log: &'a mut Breadcrumbs,
    replayed: usize,
    frame: &'a mut TaskFrame<TaskId>,
    scheduler: &'a mut dyn Scheduler,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        task: TaskId,
        spawned_at: Duration,
        plan_start: Time,
        log: &'a mut Breadcrumbs,
        frame: &'a mut TaskFrame<TaskId>,
        scheduler: &'a mut dyn Scheduler,
    ) -> Self {
        TaskContext {
            task,
            now: spawned_at,
            plan_start,
            log,
            replayed: 0,
            frame,
            scheduler,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task
    }

    /// Time since plan start.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Absolute time.
    pub fn time(&self) -> Time {
        duration_to_epoch(self.plan_start.to_tai_duration() + self.now)
    }

    /// Whether earlier decisions are still being replayed.
    pub fn is_replaying(&self) -> bool {
        self.replayed < self.log.len()
    }

    fn recorded(&mut self) -> Option<Breadcrumb> {
        let crumb = self.log.get(self.replayed)?.clone();
        self.replayed += 1;
        Some(crumb)
    }

    fn diverged(&self, expected: &'static str, found: &Breadcrumb) -> Interrupt {
        KernelError::ReplayDiverged {
            task: self.task,
            expected,
            found: found.kind(),
        }
        .into()
    }

    pub fn get<S: Clone + Send + Sync + 'static>(
        &mut self,
        query: &Query<S>,
    ) -> Result<S, Interrupt> {
        match self.recorded() {
            None => {
                let state = self.frame.get_state(query)?;
                self.log.push(Breadcrumb::Read(Arc::new(state.clone())));
                self.replayed += 1;
                Ok(state)
            }
            Some(Breadcrumb::Read(value)) => match value.downcast_ref::<S>() {
                Some(state) => Ok(state.clone()),
                None => Err(KernelError::StateTypeMismatch {
                    name: query.name().to_string(),
                }
                .into()),
            },
            Some(other) => Err(self.diverged("read", &other)),
        }
    }

    /// Emits an event. Emits that were already made on an earlier run of this task are skipped.
    pub fn emit<V: Any + Send + Sync + Debug>(&mut self, topic: &Topic<V>, value: V) {
        if !self.is_replaying() {
            self.frame.emit(Event::new(topic, value, self.task));
        }
    }

    /// Starts `activity` as a child of this task, concurrently with the rest of this task.
    pub fn spawn(&mut self, activity: impl Activity) -> Result<TaskId, Interrupt> {
        match self.recorded() {
            None => {
                let child = self.scheduler.spawn(self.task, Arc::new(activity), self.now)?;
                self.frame.signal(child);
                self.log.push(Breadcrumb::Spawn(child));
                self.replayed += 1;
                Ok(child)
            }
            Some(Breadcrumb::Spawn(child)) => Ok(child),
            Some(other) => Err(self.diverged("spawn", &other)),
        }
    }

    /// Spawns `activity` and waits for it to complete.
    pub fn call(&mut self, activity: impl Activity) -> Result<TaskId, Interrupt> {
        let child = self.spawn(activity)?;
        self.wait_for_activity(child)?;
        Ok(child)
    }

    /// Passes a suspension point: replays it if it was already passed, continues immediately if
    /// `ready`, and suspends otherwise.
    fn suspension_point(&mut self, ready: bool, reason: Suspend) -> Result<(), Interrupt> {
        match self.recorded() {
            Some(Breadcrumb::Advance(time)) => {
                self.now = time;
                Ok(())
            }
            Some(other) => Err(self.diverged("advance", &other)),
            None if ready => {
                self.log.push(Breadcrumb::Advance(self.now));
                self.replayed += 1;
                Ok(())
            }
            None => Err(Interrupt::Suspend(reason)),
        }
    }

    /// Suspends for `duration`. A zero delay continues immediately.
    pub fn delay(&mut self, duration: Duration) -> Result<(), Interrupt> {
        if duration.is_negative() {
            return Err(KernelError::NegativeDelay {
                task: self.task,
                requested: duration,
            }
            .into());
        }
        self.suspension_point(duration == Duration::ZERO, Suspend::DeferFor(duration))
    }

    /// Suspends until `time` since plan start.
    pub fn delay_until(&mut self, time: Duration) -> Result<(), Interrupt> {
        if time < self.now {
            return Err(KernelError::DelayIntoPast {
                task: self.task,
                now: self.now,
                until: time,
            }
            .into());
        }
        self.delay(time - self.now)
    }

    pub fn wait_for_activity(&mut self, task: TaskId) -> Result<(), Interrupt> {
        let ready = if self.is_replaying() {
            false
        } else {
            self.scheduler.is_complete(task)?
        };
        self.suspension_point(ready, Suspend::AwaitCompletionOf(task))
    }

    /// Waits until every child spawned so far has completed.
    pub fn wait_for_children(&mut self) -> Result<(), Interrupt> {
        let ready = !self.is_replaying() && self.scheduler.children_complete(self.task)?;
        self.suspension_point(ready, Suspend::AwaitChildren)
    }
}
