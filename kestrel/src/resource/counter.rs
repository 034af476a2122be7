use crate::cell::{Applicator, Cell};
use crate::effect::Additive;
use crate::evaluator::Evaluator;
use crate::event::Topic;
use crate::selector::Selector;

/// Adds every increment it receives. Concurrent increments commute.
pub struct Counter;

impl Applicator<i64, i64> for Counter {
    fn apply(&self, state: &mut i64, effect: &i64) {
        *state += effect;
    }
}

pub fn counter(initial: i64, increments: &Topic<i64>, evaluator: Evaluator) -> Cell<i64> {
    Cell::new(
        initial,
        Counter,
        Additive,
        Selector::new(increments, |n| *n),
        evaluator,
    )
}
