use crate::cell::{Applicator, Cell};
use crate::effect::EffectTrait;
use crate::evaluator::Evaluator;
use crate::event::Topic;
use crate::selector::Selector;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A value that is overwritten by writes, and remembers whether the last write was contested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Register<T> {
    value: T,
    conflicted: bool,
}

impl<T> Register<T> {
    pub fn new(value: T) -> Self {
        Register {
            value,
            conflicted: false,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Whether the value came out of concurrent writes that disagreed.
    pub fn is_conflicted(&self) -> bool {
        self.conflicted
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegisterEffect<T> {
    write: Option<T>,
    conflicted: bool,
}

impl<T> RegisterEffect<T> {
    pub fn set(value: T) -> Self {
        RegisterEffect {
            write: Some(value),
            conflicted: false,
        }
    }

    pub fn write(&self) -> Option<&T> {
        self.write.as_ref()
    }

    pub fn is_conflicted(&self) -> bool {
        self.conflicted
    }
}

/// Last write wins. Concurrent writes of the same value merge; differing ones keep the leftmost
/// and flag a conflict.
#[derive(Copy, Clone, Default, Debug)]
pub struct RegisterTrait;

impl<T: Clone + PartialEq + Send + Sync> EffectTrait<RegisterEffect<T>> for RegisterTrait {
    fn empty(&self) -> RegisterEffect<T> {
        RegisterEffect {
            write: None,
            conflicted: false,
        }
    }

    fn sequentially(
        &self,
        prefix: RegisterEffect<T>,
        suffix: RegisterEffect<T>,
    ) -> RegisterEffect<T> {
        if suffix.write.is_some() {
            suffix
        } else {
            RegisterEffect {
                write: prefix.write,
                conflicted: prefix.conflicted || suffix.conflicted,
            }
        }
    }

    fn concurrently(&self, left: RegisterEffect<T>, right: RegisterEffect<T>) -> RegisterEffect<T> {
        let disagree = matches!((&left.write, &right.write), (Some(a), Some(b)) if a != b);
        RegisterEffect {
            conflicted: left.conflicted || right.conflicted || disagree,
            write: left.write.or(right.write),
        }
    }
}

struct RegisterApplicator;

impl<T: Clone + Send + Sync> Applicator<Register<T>, RegisterEffect<T>> for RegisterApplicator {
    fn apply(&self, state: &mut Register<T>, effect: &RegisterEffect<T>) {
        if let Some(value) = &effect.write {
            state.value = value.clone();
            state.conflicted = effect.conflicted;
        }
    }
}

pub fn register<T: Clone + PartialEq + Debug + Send + Sync + 'static>(
    initial: T,
    writes: &Topic<T>,
    evaluator: Evaluator,
) -> Cell<Register<T>> {
    Cell::new(
        Register::new(initial),
        RegisterApplicator,
        RegisterTrait,
        Selector::new(writes, |value: &T| RegisterEffect::set(value.clone())),
        evaluator,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, TaskId};
    use crate::graph::EventGraph;

    fn set(value: i32) -> RegisterEffect<i32> {
        RegisterEffect::set(value)
    }

    #[test]
    fn last_write_wins() {
        let effect = RegisterTrait.sequentially(set(1), set(2));
        assert_eq!(effect, set(2));

        let effect = RegisterTrait.sequentially(set(1), RegisterTrait.empty());
        assert_eq!(effect, set(1));
    }

    #[test]
    fn disagreeing_concurrent_writes_conflict() {
        let agree = RegisterTrait.concurrently(set(1), set(1));
        assert_eq!(agree, set(1));

        let disagree = RegisterTrait.concurrently(set(1), set(2));
        assert_eq!(disagree.write(), Some(&1));
        assert!(disagree.is_conflicted());

        let resolved = RegisterTrait.sequentially(disagree, set(3));
        assert!(!resolved.is_conflicted());
    }

    #[test]
    fn concurrent_conflicts_are_associative() {
        let values = [1, 2, 2];
        for (a, b, c) in [(0, 1, 2), (1, 2, 0), (2, 0, 1), (1, 0, 2)] {
            let (a, b, c) = (set(values[a]), set(values[b]), set(values[c]));
            let left = RegisterTrait.concurrently(
                RegisterTrait.concurrently(a.clone(), b.clone()),
                c.clone(),
            );
            let right = RegisterTrait.concurrently(a, RegisterTrait.concurrently(b, c));
            assert_eq!(left, right);
        }
    }

    #[test]
    fn the_cell_tracks_the_flag() {
        let topic = Topic::<i32>::new("mode");
        let mut cell = register(0, &topic, Evaluator::default());
        cell.apply(&EventGraph::concurrently(
            EventGraph::atom(Event::new(&topic, 4, TaskId(0))),
            EventGraph::atom(Event::new(&topic, 5, TaskId(1))),
        ));
        assert_eq!(*cell.state().get(), 4);
        assert!(cell.state().is_conflicted());

        cell.apply(&EventGraph::empty());
        assert!(cell.state().is_conflicted());

        cell.apply(&EventGraph::atom(Event::new(&topic, 6, TaskId(0))));
        assert_eq!(cell.state(), &Register::new(6));
    }
}
