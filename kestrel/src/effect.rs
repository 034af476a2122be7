//! Algebras for folding event graphs into effects.

use crate::graph::EventGraph;
use std::ops::Add;

/// How a consumer interprets the shape of an [EventGraph].
///
/// Implementations must make `empty` a two-sided identity of both operators, and both operators
/// associative. `concurrently` only needs to be commutative where the domain needs branch order to
/// be irrelevant; the kernel always presents branches in the same fixed order.
pub trait EffectTrait<Eff>: Send + Sync {
    fn empty(&self) -> Eff;
    fn sequentially(&self, prefix: Eff, suffix: Eff) -> Eff;
    fn concurrently(&self, left: Eff, right: Eff) -> Eff;
}

/// The identity algebra: rebuilds the graph it folds.
#[derive(Copy, Clone, Default, Debug)]
pub struct GraphTrait;

impl<E: Send + Sync> EffectTrait<EventGraph<E>> for GraphTrait {
    fn empty(&self) -> EventGraph<E> {
        EventGraph::empty()
    }

    fn sequentially(&self, prefix: EventGraph<E>, suffix: EventGraph<E>) -> EventGraph<E> {
        EventGraph::sequentially(prefix, suffix)
    }

    fn concurrently(&self, left: EventGraph<E>, right: EventGraph<E>) -> EventGraph<E> {
        EventGraph::concurrently(left, right)
    }
}

/// Sums, regardless of ordering.
#[derive(Copy, Clone, Default, Debug)]
pub struct Additive;

impl<T: Default + Add<Output = T> + Send + Sync> EffectTrait<T> for Additive {
    fn empty(&self) -> T {
        T::default()
    }

    fn sequentially(&self, prefix: T, suffix: T) -> T {
        prefix + suffix
    }

    fn concurrently(&self, left: T, right: T) -> T {
        left + right
    }
}

/// Collects every write, in traversal order.
#[derive(Copy, Clone, Default, Debug)]
pub struct Collect;

impl<T: Send + Sync> EffectTrait<Vec<T>> for Collect {
    fn empty(&self) -> Vec<T> {
        Vec::new()
    }

    fn sequentially(&self, mut prefix: Vec<T>, suffix: Vec<T>) -> Vec<T> {
        prefix.extend(suffix);
        prefix
    }

    fn concurrently(&self, left: Vec<T>, right: Vec<T>) -> Vec<T> {
        self.sequentially(left, right)
    }
}
