use super::{Leaf, Op};
use crate::effect::EffectTrait;
use crate::graph::{EventGraph, Node};

pub(super) fn evaluate<E, Eff>(
    algebra: &dyn EffectTrait<Eff>,
    leaf: &mut Leaf<E, Eff>,
    graph: &EventGraph<E>,
) -> (Option<Eff>, bool) {
    let (op, a, b) = match graph.node() {
        None => return (None, false),
        Some(Node::Atom(e)) => return leaf.visit(e),
        Some(Node::Sequentially(a, b)) => (Op::Sequentially, a, b),
        Some(Node::Concurrently(a, b)) => (Op::Concurrently, a, b),
    };

    let left = evaluate(algebra, leaf, a);
    if left.1 {
        return left;
    }
    let right = evaluate(algebra, leaf, b);
    op.finish(algebra, left, right)
}
