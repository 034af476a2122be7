//! Strategies for folding an [EventGraph] under an [EffectTrait].
//!
//! Every strategy takes a substitution from events to optional effects. `None` stands for the
//! empty effect; it combines with the other operand unchanged and never reaches the algebra, so a
//! graph where nothing matched evaluates to `None` rather than to a tree of empties.
//!
//! All strategies can stop early at a designated event. After the stop event is reached, nothing
//! later is evaluated. A sequential node with the stop in its suffix keeps its prefix; a concurrent
//! node with the stop in one branch returns only that branch, since "the effect so far" only means
//! something along the stop event's own causal path.

mod iterative;
mod memoized;
mod recursive;

use crate::effect::EffectTrait;
use crate::graph::EventGraph;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluator {
    /// Direct recursion. Fastest, but limited by stack depth.
    Recursive,
    /// An explicit continuation stack. Safe on arbitrarily deep graphs.
    #[default]
    Iterative,
    /// Non-recursive, with results cached by node identity. Rarely faster than
    /// [Evaluator::Iterative] once the substitution dominates, but shared subtrees are only folded once.
    Memoized,
}

impl Evaluator {
    pub fn evaluate<E, Eff: Clone>(
        self,
        algebra: &dyn EffectTrait<Eff>,
        substitution: &mut dyn FnMut(&E) -> Option<Eff>,
        graph: &EventGraph<E>,
    ) -> Option<Eff> {
        self.run(algebra, substitution, graph, &|_| false, false).0
    }

    /// Evaluates up to the first occurrence of `stop`, and reports whether it was found.
    ///
    /// `include_stop` decides whether the stop event's own effect is part of the result.
    pub fn evaluate_until<E: PartialEq, Eff: Clone>(
        self,
        algebra: &dyn EffectTrait<Eff>,
        substitution: &mut dyn FnMut(&E) -> Option<Eff>,
        graph: &EventGraph<E>,
        stop: &E,
        include_stop: bool,
    ) -> (Option<Eff>, bool) {
        self.run(algebra, substitution, graph, &|e| e == stop, include_stop)
    }

    fn run<E, Eff: Clone>(
        self,
        algebra: &dyn EffectTrait<Eff>,
        substitution: &mut dyn FnMut(&E) -> Option<Eff>,
        graph: &EventGraph<E>,
        is_stop: &dyn Fn(&E) -> bool,
        include_stop: bool,
    ) -> (Option<Eff>, bool) {
        let mut leaf = Leaf {
            substitution,
            is_stop,
            include_stop,
        };
        match self {
            Evaluator::Recursive => recursive::evaluate(algebra, &mut leaf, graph),
            Evaluator::Iterative => iterative::evaluate(algebra, &mut leaf, graph),
            Evaluator::Memoized => memoized::evaluate(algebra, &mut leaf, graph),
        }
    }
}

/// How every strategy treats a single event.
struct Leaf<'a, E, Eff> {
    substitution: &'a mut dyn FnMut(&E) -> Option<Eff>,
    is_stop: &'a dyn Fn(&E) -> bool,
    include_stop: bool,
}

impl<E, Eff> Leaf<'_, E, Eff> {
    fn visit(&mut self, event: &E) -> (Option<Eff>, bool) {
        if (self.is_stop)(event) {
            let effect = if self.include_stop {
                (self.substitution)(event)
            } else {
                None
            };
            (effect, true)
        } else {
            ((self.substitution)(event), false)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Op {
    Sequentially,
    Concurrently,
}

impl Op {
    fn join<Eff>(
        self,
        algebra: &dyn EffectTrait<Eff>,
        a: Option<Eff>,
        b: Option<Eff>,
    ) -> Option<Eff> {
        match (a, b) {
            (Some(a), Some(b)) => Some(match self {
                Op::Sequentially => algebra.sequentially(a, b),
                Op::Concurrently => algebra.concurrently(a, b),
            }),
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// Combines the two children of a node, given which of them held the stop event.
    fn finish<Eff>(
        self,
        algebra: &dyn EffectTrait<Eff>,
        (left, left_found): (Option<Eff>, bool),
        (right, right_found): (Option<Eff>, bool),
    ) -> (Option<Eff>, bool) {
        if left_found {
            (left, true)
        } else if right_found {
            match self {
                Op::Sequentially => (self.join(algebra, left, right), true),
                Op::Concurrently => (right, true),
            }
        } else {
            (self.join(algebra, left, right), false)
        }
    }
}
