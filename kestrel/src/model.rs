//! Mission models: the cells, resources and daemons a plan is simulated against.

use crate::cell::Cell;
use crate::error::KernelError;
use crate::event::{Query, QueryId};
use crate::live_cells::LiveCells;
use crate::resource::SerializedValue;
use crate::source::EventSource;
use crate::task::Activity;
use std::sync::Arc;

type Installer = Box<dyn Fn(&LiveCells) + Send + Sync>;
type Sampler = Box<dyn Fn(&LiveCells) -> Result<SerializedValue, KernelError> + Send + Sync>;

struct RegisteredCell {
    query: QueryId,
    install: Installer,
}

struct RegisteredResource {
    name: String,
    sample: Sampler,
}

/// The registry of everything a simulation needs before any activity runs.
///
/// Cells are kept in their initial state. Every simulation run starts from fresh duplicates.
#[derive(Default)]
pub struct MissionModel {
    cells: Vec<RegisteredCell>,
    resources: Vec<RegisteredResource>,
    daemons: Vec<Arc<dyn Activity>>,
}

impl MissionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cell in its initial state, and returns the query for reading it.
    pub fn add_cell<S: Clone + Send + Sync + 'static>(
        &mut self,
        name: &str,
        cell: Cell<S>,
    ) -> Query<S> {
        let query = Query::new(name);
        let handle = query.clone();
        self.cells.push(RegisteredCell {
            query: query.id(),
            install: Box::new(move |cells: &LiveCells| cells.put(&handle, cell.duplicate())),
        });
        query
    }

    /// Registers a named resource: a view of a cell's state that is profiled over the run.
    pub fn add_resource<S: Clone + Send + Sync + 'static>(
        &mut self,
        name: impl Into<String>,
        query: &Query<S>,
        sample: impl Fn(&S) -> SerializedValue + Send + Sync + 'static,
    ) {
        let query = query.clone();
        self.resources.push(RegisteredResource {
            name: name.into(),
            sample: Box::new(
                move |cells: &LiveCells| -> Result<SerializedValue, KernelError> {
                    Ok(sample(&cells.get_state(&query)?))
                },
            ),
        });
    }

    /// Registers an activity that starts with every simulation, at plan start.
    pub fn add_daemon(&mut self, activity: impl Activity) {
        self.daemons.push(Arc::new(activity));
    }

    /// A root registry over `source`, holding fresh copies of every cell.
    pub(crate) fn instantiate(&self, source: Arc<dyn EventSource>) -> Arc<LiveCells> {
        let cells = LiveCells::new(source);
        for cell in &self.cells {
            (cell.install)(&cells);
        }
        Arc::new(cells)
    }

    pub(crate) fn cell_ids(&self) -> impl Iterator<Item = QueryId> + '_ {
        self.cells.iter().map(|cell| cell.query)
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|resource| resource.name.as_str())
    }

    pub(crate) fn sample_all(
        &self,
        cells: &LiveCells,
    ) -> impl Iterator<Item = (&str, Result<SerializedValue, KernelError>)> {
        self.resources
            .iter()
            .map(move |resource| (resource.name.as_str(), (resource.sample)(cells)))
    }

    pub(crate) fn daemons(&self) -> &[Arc<dyn Activity>] {
        &self.daemons
    }
}
