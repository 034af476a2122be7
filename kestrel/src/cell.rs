//! Cells: one piece of simulated state, and the rules for evolving it.

use crate::effect::EffectTrait;
use crate::evaluator::Evaluator;
use crate::event::{Event, TopicSet};
use crate::graph::EventGraph;
use crate::selector::Selector;
use hifitime::Duration;
use std::any::Any;
use std::sync::Arc;

/// Domain rules for a cell with state `S` that absorbs effects of type `Eff`.
pub trait Applicator<S: Clone, Eff>: Send + Sync {
    /// Produces an independent copy of `state`.
    ///
    /// The default clones. Override it if a clone of `S` would still share mutable structure.
    fn duplicate(&self, state: &S) -> S {
        state.clone()
    }

    /// Advances continuous dynamics. Most cells have none.
    fn step(&self, _state: &mut S, _elapsed: Duration) {}

    /// Applying the algebra's empty effect must leave the state unchanged.
    fn apply(&self, state: &mut S, effect: &Eff);

    /// How long until the state needs attention without any new event.
    fn expiry(&self, _state: &S) -> Option<Duration> {
        None
    }
}

trait Behavior<S>: Send + Sync {
    fn duplicate(&self, state: &S) -> S;
    fn step(&self, state: &mut S, elapsed: Duration);
    fn apply(&self, state: &mut S, graph: &EventGraph<Event>);
    fn apply_until(
        &self,
        state: &mut S,
        graph: &EventGraph<Event>,
        stop: &Event,
        include_stop: bool,
    ) -> bool;
    fn is_interested_in(&self, topics: &TopicSet) -> bool;
    fn expiry(&self, state: &S) -> Option<Duration>;
}

struct Binding<S: Clone, Eff> {
    applicator: Arc<dyn Applicator<S, Eff>>,
    algebra: Arc<dyn EffectTrait<Eff>>,
    selector: Selector<Eff>,
    evaluator: Evaluator,
}

impl<S: Clone, Eff: Clone + 'static> Behavior<S> for Binding<S, Eff> {
    fn duplicate(&self, state: &S) -> S {
        self.applicator.duplicate(state)
    }

    fn step(&self, state: &mut S, elapsed: Duration) {
        self.applicator.step(state, elapsed);
    }

    fn apply(&self, state: &mut S, graph: &EventGraph<Event>) {
        let effect = self
            .evaluator
            .evaluate(&*self.algebra, &mut |e: &Event| self.selector.select(e), graph)
            .unwrap_or_else(|| self.algebra.empty());
        self.applicator.apply(state, &effect);
    }

    fn apply_until(
        &self,
        state: &mut S,
        graph: &EventGraph<Event>,
        stop: &Event,
        include_stop: bool,
    ) -> bool {
        let (effect, reached) = self.evaluator.evaluate_until(
            &*self.algebra,
            &mut |e: &Event| self.selector.select(e),
            graph,
            stop,
            include_stop,
        );
        let effect = effect.unwrap_or_else(|| self.algebra.empty());
        self.applicator.apply(state, &effect);
        reached
    }

    fn is_interested_in(&self, topics: &TopicSet) -> bool {
        self.selector.matches_any(topics)
    }

    fn expiry(&self, state: &S) -> Option<Duration> {
        self.applicator.expiry(state)
    }
}

/// Owns one state value, plus the fixed rules for advancing it by time or by events.
pub struct Cell<S> {
    state: S,
    behavior: Arc<dyn Behavior<S>>,
}

impl<S: Clone + Send + Sync + 'static> Cell<S> {
    pub fn new<Eff: Clone + 'static>(
        state: S,
        applicator: impl Applicator<S, Eff> + 'static,
        algebra: impl EffectTrait<Eff> + 'static,
        selector: Selector<Eff>,
        evaluator: Evaluator,
    ) -> Self {
        Cell {
            state,
            behavior: Arc::new(Binding {
                applicator: Arc::new(applicator),
                algebra: Arc::new(algebra),
                selector,
                evaluator,
            }),
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// A copy of the state that shares no mutable structure with this cell.
    pub fn duplicate_state(&self) -> S {
        self.behavior.duplicate(&self.state)
    }

    pub fn step(&mut self, elapsed: Duration) {
        self.behavior.step(&mut self.state, elapsed);
    }

    /// Folds `graph` with this cell's algebra and applies the result.
    ///
    /// Applies the algebra's empty effect if no event in the graph was selected.
    pub fn apply(&mut self, graph: &EventGraph<Event>) {
        self.behavior.apply(&mut self.state, graph);
    }

    /// Like [Cell::apply], but only up to `stop`. Returns whether `stop` was in the graph.
    pub fn apply_until(
        &mut self,
        graph: &EventGraph<Event>,
        stop: &Event,
        include_stop: bool,
    ) -> bool {
        self.behavior
            .apply_until(&mut self.state, graph, stop, include_stop)
    }

    pub fn is_interested_in(&self, topics: &TopicSet) -> bool {
        self.behavior.is_interested_in(topics)
    }

    pub fn expiry(&self) -> Option<Duration> {
        self.behavior.expiry(&self.state)
    }

    pub fn duplicate(&self) -> Self {
        Cell {
            state: self.duplicate_state(),
            behavior: self.behavior.clone(),
        }
    }
}

/// A [Cell] with its state type erased, for registries holding many kinds of cells.
pub trait ErasedCell: Send {
    fn step(&mut self, elapsed: Duration);
    fn apply(&mut self, graph: &EventGraph<Event>);
    fn is_interested_in(&self, topics: &TopicSet) -> bool;
    fn expiry(&self) -> Option<Duration>;
    fn duplicate_erased(&self) -> Box<dyn ErasedCell>;
    fn as_any(&self) -> &dyn Any;
}

impl<S: Clone + Send + Sync + 'static> ErasedCell for Cell<S> {
    fn step(&mut self, elapsed: Duration) {
        Cell::step(self, elapsed)
    }

    fn apply(&mut self, graph: &EventGraph<Event>) {
        Cell::apply(self, graph)
    }

    fn is_interested_in(&self, topics: &TopicSet) -> bool {
        Cell::is_interested_in(self, topics)
    }

    fn expiry(&self) -> Option<Duration> {
        Cell::expiry(self)
    }

    fn duplicate_erased(&self) -> Box<dyn ErasedCell> {
        Box::new(self.duplicate())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::effect::Additive;
    use crate::event::{TaskId, Topic};

    pub(crate) struct Sum;

    impl Applicator<i64, i64> for Sum {
        fn apply(&self, state: &mut i64, effect: &i64) {
            *state += effect;
        }
    }

    pub(crate) fn counter(topic: &Topic<i64>) -> Cell<i64> {
        Cell::new(
            0,
            Sum,
            Additive,
            Selector::new(topic, |n| *n),
            Evaluator::default(),
        )
    }

    #[test]
    fn apply_folds_only_selected_events() {
        let topic = Topic::<i64>::new("n");
        let other = Topic::<i64>::new("m");
        let mut cell = counter(&topic);

        let graph = EventGraph::sequentially_all([
            EventGraph::atom(Event::new(&topic, 2, TaskId(0))),
            EventGraph::atom(Event::new(&other, 100, TaskId(0))),
            EventGraph::atom(Event::new(&topic, 3, TaskId(0))),
        ]);
        cell.apply(&graph);
        assert_eq!(*cell.state(), 5);

        cell.apply(&EventGraph::empty());
        assert_eq!(*cell.state(), 5);
    }

    #[test]
    fn apply_until_stops_at_the_event() {
        let topic = Topic::<i64>::new("n");
        let stop = Event::new(&topic, 3, TaskId(0));
        let graph = EventGraph::sequentially_all([
            EventGraph::atom(Event::new(&topic, 2, TaskId(0))),
            EventGraph::atom(stop.clone()),
            EventGraph::atom(Event::new(&topic, 7, TaskId(0))),
        ]);

        let mut cell = counter(&topic);
        assert!(cell.apply_until(&graph, &stop, false));
        assert_eq!(*cell.state(), 2);

        let mut cell = counter(&topic);
        assert!(cell.apply_until(&graph, &stop, true));
        assert_eq!(*cell.state(), 5);
    }

    #[test]
    fn duplicates_are_independent() {
        let topic = Topic::<i64>::new("n");
        let mut cell = counter(&topic);
        let copy = cell.duplicate();

        cell.apply(&EventGraph::atom(Event::new(&topic, 4, TaskId(0))));
        assert_eq!(*cell.state(), 4);
        assert_eq!(*copy.state(), 0);
    }
}
