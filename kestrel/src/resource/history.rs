use crate::cell::{Applicator, Cell};
use crate::effect::GraphTrait;
use crate::evaluator::Evaluator;
use crate::event::Topic;
use crate::graph::EventGraph;
use crate::selector::Selector;

/// Keeps every write ever made, with its causal structure.
///
/// Useful for checking exactly what a cell has seen, down to ordering.
pub struct History;

impl Applicator<EventGraph<String>, EventGraph<String>> for History {
    fn apply(&self, state: &mut EventGraph<String>, effect: &EventGraph<String>) {
        *state = EventGraph::sequentially(state.clone(), effect.clone());
    }
}

pub fn history(writes: &Topic<String>, evaluator: Evaluator) -> Cell<EventGraph<String>> {
    Cell::new(
        EventGraph::empty(),
        History,
        GraphTrait,
        Selector::new(writes, |s: &String| EventGraph::atom(s.clone())),
        evaluator,
    )
}
