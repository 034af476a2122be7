//! Lazily advanced, layered registries of cells.

use crate::cell::{Cell, ErasedCell};
use crate::error::KernelError;
use crate::event::{Query, QueryId};
use crate::hash::IdHashBuilder;
use crate::source::{Cursor, EventSource};
use hifitime::Duration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct Slot {
    cell: Box<dyn ErasedCell>,
    cursor: Box<dyn Cursor>,
}

impl Slot {
    fn step_up(&mut self) -> &mut dyn ErasedCell {
        self.cursor.step_up(&mut *self.cell);
        &mut *self.cell
    }
}

/// Maps queries to cells, each bound to a cursor over this layer's [EventSource].
///
/// Cells are only brought up to date when they are read. A layer with a parent inherits the
/// parent's cells: the first read of a cell this layer does not have duplicates the parent's
/// (already current) cell and binds the copy to this layer's own source. From then on the copy
/// only sees this layer's events. Parents are never written to.
pub struct LiveCells {
    source: Arc<dyn EventSource>,
    parent: Option<Arc<LiveCells>>,
    cells: Mutex<HashMap<QueryId, Slot, IdHashBuilder>>,
}

impl LiveCells {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        LiveCells {
            source,
            parent: None,
            cells: Mutex::default(),
        }
    }

    pub fn with_parent(source: Arc<dyn EventSource>, parent: Arc<LiveCells>) -> Self {
        LiveCells {
            parent: Some(parent),
            ..Self::new(source)
        }
    }

    /// Registers `cell` in this layer, reading from the start of this layer's source.
    pub fn put<S: Clone + Send + Sync + 'static>(&self, query: &Query<S>, cell: Cell<S>) {
        let cursor = self.source.cursor();
        self.cells.lock().insert(
            query.id(),
            Slot {
                cell: Box::new(cell),
                cursor,
            },
        );
    }

    /// Whether this layer or an ancestor has the cell.
    pub fn contains(&self, query: QueryId) -> bool {
        self.cells.lock().contains_key(&query)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.contains(query))
    }

    /// Runs `f` on the up-to-date cell for `query`, copying it down from an ancestor if needed.
    fn with_cell<T>(&self, query: QueryId, f: impl FnOnce(&mut dyn ErasedCell) -> T) -> Option<T> {
        let mut cells = self.cells.lock();
        if let Some(slot) = cells.get_mut(&query) {
            return Some(f(slot.step_up()));
        }
        let cell = self.parent.as_ref()?.duplicate_cell(query)?;
        let slot = cells.entry(query).or_insert(Slot {
            cell,
            cursor: self.source.cursor(),
        });
        Some(f(slot.step_up()))
    }

    /// An up-to-date copy of the cell for `query`, from this layer or the nearest ancestor with it.
    fn duplicate_cell(&self, query: QueryId) -> Option<Box<dyn ErasedCell>> {
        self.with_cell(query, |cell| cell.duplicate_erased())
    }

    /// A copy of the current state of the cell for `query`.
    pub fn get_state<S: Clone + Send + Sync + 'static>(
        &self,
        query: &Query<S>,
    ) -> Result<S, KernelError> {
        self.with_cell(query.id(), |cell| {
            cell.as_any()
                .downcast_ref::<Cell<S>>()
                .map(Cell::duplicate_state)
        })
        .ok_or_else(|| KernelError::UnknownQuery {
            name: query.name().to_string(),
        })?
        .ok_or_else(|| KernelError::StateTypeMismatch {
            name: query.name().to_string(),
        })
    }

    pub fn get_expiry<S>(&self, query: &Query<S>) -> Result<Option<Duration>, KernelError> {
        self.expiry_of(query.id())
            .ok_or_else(|| KernelError::UnknownQuery {
                name: query.name().to_string(),
            })
    }

    /// The expiry of any cell, by id. `None` if the cell is unknown.
    pub(crate) fn expiry_of(&self, query: QueryId) -> Option<Option<Duration>> {
        self.with_cell(query, |cell| cell.expiry())
    }
}
