use super::EventGraph;
use crate::effect::{EffectTrait, GraphTrait};
use crate::evaluator::Evaluator;
use std::marker::PhantomData;

/// Anything that can be folded into an effect, given an algebra and a substitution for its events.
///
/// [EventGraph] is the concrete case. [EffectExpression::map] and [EffectExpression::substitute]
/// view an expression over events `E` as an expression over some other event type without
/// rebuilding the tree: the transformation is folded into the substitution and only runs when the
/// expression is finally evaluated.
pub trait EffectExpression<E> {
    fn evaluate_with<Eff: Clone>(
        &self,
        algebra: &dyn EffectTrait<Eff>,
        substitution: &mut dyn FnMut(&E) -> Option<Eff>,
    ) -> Option<Eff>;

    /// Folds every event into an effect, substituting `algebra.empty()` for an empty expression.
    fn evaluate<Eff: Clone>(
        &self,
        algebra: &dyn EffectTrait<Eff>,
        mut substitution: impl FnMut(&E) -> Eff,
    ) -> Eff {
        self.evaluate_with(algebra, &mut |e| Some(substitution(e)))
            .unwrap_or_else(|| algebra.empty())
    }

    fn map<B, F: Fn(&E) -> B>(self, f: F) -> Mapped<Self, F, E>
    where
        Self: Sized,
    {
        Mapped {
            inner: self,
            f,
            _marker: PhantomData,
        }
    }

    fn substitute<B, F: Fn(&E) -> EventGraph<B>>(self, f: F) -> Substituted<Self, F, E>
    where
        Self: Sized,
    {
        Substituted {
            inner: self,
            f,
            _marker: PhantomData,
        }
    }

    /// Builds the concrete graph this expression stands for.
    fn materialize(&self) -> EventGraph<E>
    where
        E: Clone + Send + Sync,
    {
        self.evaluate(&GraphTrait, |e| EventGraph::atom(e.clone()))
    }
}

impl<E> EffectExpression<E> for EventGraph<E> {
    fn evaluate_with<Eff: Clone>(
        &self,
        algebra: &dyn EffectTrait<Eff>,
        substitution: &mut dyn FnMut(&E) -> Option<Eff>,
    ) -> Option<Eff> {
        Evaluator::Iterative.evaluate(algebra, substitution, self)
    }
}

/// An expression over `A` viewed as an expression over `f(A)`.
pub struct Mapped<G, F, A> {
    inner: G,
    f: F,
    _marker: PhantomData<fn(&A)>,
}

impl<A, B, G: EffectExpression<A>, F: Fn(&A) -> B> EffectExpression<B> for Mapped<G, F, A> {
    fn evaluate_with<Eff: Clone>(
        &self,
        algebra: &dyn EffectTrait<Eff>,
        substitution: &mut dyn FnMut(&B) -> Option<Eff>,
    ) -> Option<Eff> {
        self.inner
            .evaluate_with(algebra, &mut |a| substitution(&(self.f)(a)))
    }
}

/// An expression over `A` where every event is replaced by a whole graph over `B`.
pub struct Substituted<G, F, A> {
    inner: G,
    f: F,
    _marker: PhantomData<fn(&A)>,
}

impl<A, B, G: EffectExpression<A>, F: Fn(&A) -> EventGraph<B>> EffectExpression<B>
    for Substituted<G, F, A>
{
    fn evaluate_with<Eff: Clone>(
        &self,
        algebra: &dyn EffectTrait<Eff>,
        substitution: &mut dyn FnMut(&B) -> Option<Eff>,
    ) -> Option<Eff> {
        self.inner.evaluate_with(algebra, &mut |a| {
            (self.f)(a).evaluate_with(algebra, &mut *substitution)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Collect;

    #[test]
    fn map_is_applied_at_evaluation_time() {
        let graph = EventGraph::sequentially(EventGraph::atom(1), EventGraph::atom(2));
        let mapped = graph.clone().map(|x: &i32| x * 10);
        assert_eq!(mapped.evaluate::<Vec<i32>>(&Collect, |x| vec![*x]), vec![10, 20]);
        assert_eq!(mapped.materialize().to_string(), "10; 20");
    }

    #[test]
    fn substitute_expands_each_event() {
        let graph = EventGraph::concurrently(EventGraph::atom(1), EventGraph::atom(2));
        let expanded = graph.substitute(|x: &i32| {
            EventGraph::sequentially(EventGraph::atom(*x), EventGraph::atom(-*x))
        });
        assert_eq!(expanded.materialize().to_string(), "(1; -1) | (2; -2)");
    }

    #[test]
    fn empty_expressions_fall_back_to_the_algebra() {
        let graph = EventGraph::<i32>::empty().map(|x| *x);
        assert_eq!(graph.evaluate::<Vec<i32>>(&Collect, |x: &i32| vec![*x]), Vec::<i32>::new());
    }
}
