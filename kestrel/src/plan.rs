use crate::config::SimulationConfig;
use crate::engine::{self, Checkpoint};
use crate::error::KernelError;
use crate::model::MissionModel;
use crate::resource::SerializedValue;
use crate::results::SimulationResults;
use crate::task::Activity;
use crate::time::offset_from;
use crate::{Duration, Result, Time, anyhow, bail};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

/// A unique directive ID.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Debug, Display,
)]
#[display("directive {_0}")]
pub struct DirectiveId(u32);

impl DirectiveId {
    pub fn new(id: u32) -> DirectiveId {
        DirectiveId(id)
    }
}

/// An activity placed in the plan.
#[derive(Clone)]
pub(crate) struct Directive {
    /// Offset from plan start.
    pub(crate) time: Duration,
    pub(crate) activity: Arc<dyn Activity>,
}

impl Directive {
    /// Whether the two would simulate identically.
    pub(crate) fn same_as(&self, other: &Directive) -> bool {
        self.time == other.time
            && std::ptr::addr_eq(Arc::as_ptr(&self.activity), Arc::as_ptr(&other.activity))
    }
}

pub(crate) type Schedule = BTreeMap<DirectiveId, Directive>;

/// A plan instance for iterative editing and simulating.
///
/// Edits are cheap. Simulation happens on [Plan::simulate], or lazily on the first query after an
/// edit. With [SimulationConfig::incremental] set, each simulation only redoes the part of the
/// previous one that the edits since then could have changed.
pub struct Plan {
    model: Arc<MissionModel>,
    start: Time,
    config: SimulationConfig,
    directives: Schedule,
    id_counter: u32,
    checkpoint: Option<Checkpoint>,
    results: Option<SimulationResults>,
    stale: bool,
}

impl Plan {
    pub fn new(model: Arc<MissionModel>, start: Time, config: SimulationConfig) -> Self {
        Plan {
            model,
            start,
            config,
            directives: Schedule::new(),
            id_counter: 0,
            checkpoint: None,
            results: None,
            stale: true,
        }
    }

    pub fn start(&self) -> Time {
        self.start
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    fn offset(&self, time: Time) -> Result<Duration> {
        let offset = offset_from(self.start, time);
        if offset.is_negative() {
            bail!("cannot place an activity at {time}, before plan start at {}", self.start);
        }
        Ok(offset)
    }

    fn directive_mut(&mut self, id: DirectiveId) -> Result<&mut Directive, KernelError> {
        self.directives
            .get_mut(&id)
            .ok_or(KernelError::UnknownDirective { directive: id })
    }

    /// Inserts a new activity into the plan, and returns its unique ID.
    pub fn insert(&mut self, time: Time, activity: impl Activity) -> Result<DirectiveId> {
        let time = self.offset(time)?;
        let id = DirectiveId::new(self.id_counter);
        self.id_counter += 1;
        self.directives.insert(
            id,
            Directive {
                time,
                activity: Arc::new(activity),
            },
        );
        self.stale = true;
        Ok(id)
    }

    /// Removes an activity from the plan, by ID.
    pub fn remove(&mut self, id: DirectiveId) -> Result<()> {
        self.directives
            .remove(&id)
            .ok_or(KernelError::UnknownDirective { directive: id })?;
        self.stale = true;
        Ok(())
    }

    /// Moves an activity to a new start time, keeping its ID.
    pub fn move_to(&mut self, id: DirectiveId, time: Time) -> Result<()> {
        let time = self.offset(time)?;
        self.directive_mut(id)?.time = time;
        self.stale = true;
        Ok(())
    }

    /// Swaps in a different activity at the same time, keeping the ID.
    pub fn replace(&mut self, id: DirectiveId, activity: impl Activity) -> Result<()> {
        self.directive_mut(id)?.activity = Arc::new(activity);
        self.stale = true;
        Ok(())
    }

    pub fn simulate(&mut self) -> Result<&SimulationResults> {
        self.simulate_with(|| false)
    }

    /// Simulates, checking `cancel` between batches.
    ///
    /// A cancelled run still returns results, marked partial. It is not used as a base for later
    /// incremental runs, and the plan stays stale.
    pub fn simulate_with(&mut self, cancel: impl Fn() -> bool) -> Result<&SimulationResults> {
        let previous = self.checkpoint.as_ref().filter(|_| self.config.incremental);
        let (results, checkpoint) = engine::simulate(
            &self.model,
            self.start,
            self.config.horizon,
            &self.directives,
            previous,
            &cancel,
        )?;
        if let Some(checkpoint) = checkpoint {
            self.checkpoint = Some(checkpoint);
            self.stale = false;
        }
        Ok(self.results.insert(results))
    }

    /// The most recent results, complete or partial. `None` before the first simulation.
    pub fn results(&self) -> Option<&SimulationResults> {
        self.results.as_ref()
    }

    fn current(&mut self) -> Result<&SimulationResults> {
        if self.stale || self.results.is_none() {
            self.simulate()?;
        }
        self.results
            .as_ref()
            .ok_or_else(|| anyhow!("the plan has not been simulated"))
    }

    fn check_resource(&self, name: &str) -> Result<(), KernelError> {
        if self.model.resource_names().any(|n| n == name) {
            Ok(())
        } else {
            Err(KernelError::UnknownResource {
                name: name.to_string(),
            })
        }
    }

    /// The value of a resource at `time`, simulating first if the plan changed.
    pub fn sample(&mut self, resource: &str, time: Time) -> Result<SerializedValue> {
        self.check_resource(resource)?;
        let offset = offset_from(self.start, time);
        let results = self.current()?;
        match results.sample(resource, offset) {
            Some(value) => Ok(value.clone()),
            None => bail!("{resource} has no value at {time}"),
        }
    }

    /// Simulates if needed and returns a view into a section of a resource's profile.
    ///
    /// The first entry is the value in effect at the start of the range, which may have been set
    /// before it.
    pub fn view(
        &mut self,
        resource: &str,
        bounds: impl RangeBounds<Time>,
    ) -> Result<Vec<(Time, SerializedValue)>> {
        self.check_resource(resource)?;
        let start = self.start;
        let from = match bounds.start_bound() {
            Bound::Included(t) | Bound::Excluded(t) => offset_from(start, *t),
            Bound::Unbounded => Duration::MIN,
        };
        let to = match bounds.end_bound() {
            Bound::Included(t) => offset_from(start, *t) + Duration::from_total_nanoseconds(1),
            Bound::Excluded(t) => offset_from(start, *t),
            Bound::Unbounded => Duration::MAX,
        };
        let results = self.current()?;
        Ok(results
            .view(resource, from, to)
            .iter()
            .map(|segment| (start + segment.start, segment.value.clone()))
            .collect())
    }
}
