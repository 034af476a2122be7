use crate::cell::{Applicator, Cell};
use crate::effect::Additive;
use crate::evaluator::Evaluator;
use crate::event::Topic;
use crate::selector::Selector;
use hifitime::{Duration, TimeUnits};
use serde::{Deserialize, Serialize};
use std::ops::Add;

/// A value changing at a constant rate, per `basis` of time.
///
/// Elapsed time is accumulated exactly and only folded into the value when an effect arrives, so
/// the value at a given time does not depend on how the time in between was chopped up.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Linear {
    value: f64,
    rate: f64,
    basis: Duration,
    elapsed: Duration,
}

impl Linear {
    pub fn new(value: f64, rate: f64) -> Self {
        Linear {
            value,
            rate,
            ..Default::default()
        }
    }

    pub fn with_basis(mut self, basis: Duration) -> Self {
        self.basis = basis;
        self
    }

    pub fn value(&self) -> f64 {
        let measure = self.elapsed.to_seconds() / self.basis.to_seconds();
        self.value + self.rate * measure
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn settle(&mut self) {
        self.value = self.value();
        self.elapsed = Duration::ZERO;
    }
}

impl Default for Linear {
    fn default() -> Self {
        Linear {
            value: 0.0,
            rate: 0.0,
            basis: 1.seconds(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Changes to a [Linear] value and rate. Concurrent changes add up.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct LinearEffect {
    pub value: f64,
    pub rate: f64,
}

impl LinearEffect {
    pub fn add_value(value: f64) -> Self {
        LinearEffect { value, rate: 0.0 }
    }

    pub fn add_rate(rate: f64) -> Self {
        LinearEffect { value: 0.0, rate }
    }
}

impl Add for LinearEffect {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        LinearEffect {
            value: self.value + rhs.value,
            rate: self.rate + rhs.rate,
        }
    }
}

struct LinearApplicator;

impl Applicator<Linear, LinearEffect> for LinearApplicator {
    fn step(&self, state: &mut Linear, elapsed: Duration) {
        state.elapsed = state.elapsed + elapsed;
    }

    fn apply(&self, state: &mut Linear, effect: &LinearEffect) {
        if *effect == LinearEffect::default() {
            return;
        }
        state.settle();
        state.value += effect.value;
        state.rate += effect.rate;
    }
}

pub fn linear(initial: Linear, changes: &Topic<LinearEffect>, evaluator: Evaluator) -> Cell<Linear> {
    Cell::new(
        initial,
        LinearApplicator,
        Additive,
        Selector::new(changes, |effect| *effect),
        evaluator,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, TaskId};
    use crate::graph::EventGraph;

    #[test]
    fn value_follows_the_rate() {
        let topic = Topic::<LinearEffect>::new("battery");
        let mut cell = linear(Linear::new(10.0, -0.5), &topic, Evaluator::default());
        cell.step(4.seconds());
        assert_eq!(cell.state().value(), 8.0);

        cell.apply(&EventGraph::concurrently(
            EventGraph::atom(Event::new(&topic, LinearEffect::add_rate(1.5), TaskId(0))),
            EventGraph::atom(Event::new(&topic, LinearEffect::add_value(2.0), TaskId(1))),
        ));
        assert_eq!(cell.state().rate(), 1.0);
        cell.step(2.seconds());
        assert_eq!(cell.state().value(), 12.0);
    }

    #[test]
    fn basis_scales_the_rate() {
        let state = Linear::new(0.0, 60.0).with_basis(1.minutes());
        let topic = Topic::<LinearEffect>::new("x");
        let mut cell = linear(state, &topic, Evaluator::default());
        cell.step(30.seconds());
        assert_eq!(cell.state().value(), 30.0);
    }
}
