use super::{Cursor, EventSource};
use crate::cell::ErasedCell;
use crate::event::Event;
use crate::graph::EventGraph;
use parking_lot::RwLock;
use std::sync::Arc;

/// A causally ordered list of graphs with no notion of time between them.
///
/// Used for the events of a single task branch within one instant.
#[derive(Clone, Default)]
pub struct CausalEventSource(Arc<RwLock<Vec<EventGraph<Event>>>>);

impl CausalEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, graph: EventGraph<Event>) {
        self.0.write().push(graph);
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Everything in this source, sequentially followed by `suffix`.
    pub fn commit(&self, suffix: EventGraph<Event>) -> EventGraph<Event> {
        self.0
            .read()
            .iter()
            .rev()
            .fold(suffix, |acc, graph| EventGraph::sequentially(graph.clone(), acc))
    }
}

impl EventSource for CausalEventSource {
    fn cursor(&self) -> Box<dyn Cursor> {
        Box::new(CausalCursor {
            source: self.clone(),
            index: 0,
        })
    }
}

struct CausalCursor {
    source: CausalEventSource,
    index: usize,
}

impl Cursor for CausalCursor {
    fn step_up(&mut self, cell: &mut dyn ErasedCell) {
        let graphs = self.source.0.read();
        for graph in &graphs[self.index..] {
            cell.apply(graph);
        }
        self.index = graphs.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::tests::counter;
    use crate::event::Topic;
    use crate::source::tests::write;

    #[test]
    fn commit_prefixes_in_order() {
        let topic = Topic::<i64>::new("n");
        let source = CausalEventSource::new();
        assert!(source.is_empty());
        assert!(source.commit(EventGraph::empty()).is_empty());

        source.add(write(&topic, 1));
        source.add(write(&topic, 2));
        let graph = source.commit(write(&topic, 3));
        assert_eq!(graph.to_string(), "n=1; n=2; n=3");
    }

    #[test]
    fn cursor_applies_each_graph_once() {
        let topic = Topic::<i64>::new("n");
        let source = CausalEventSource::new();
        let mut cell = counter(&topic);
        let mut cursor = source.cursor();

        source.add(write(&topic, 1));
        cursor.step_up(&mut cell);
        source.add(write(&topic, 10));
        cursor.step_up(&mut cell);
        cursor.step_up(&mut cell);
        assert_eq!(*cell.state(), 11);
    }
}
