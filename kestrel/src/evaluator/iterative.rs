use super::{Leaf, Op};
use crate::effect::EffectTrait;
use crate::graph::{EventGraph, Node};

/// What to do with a value once a subtree has been folded.
enum Continuation<'g, E, Eff> {
    /// Nothing; the value is the result.
    Empty,
    /// The value is a left operand. Fold `right` next.
    Right { op: Op, right: &'g EventGraph<E> },
    /// The value is a right operand. Combine it with `left`.
    Combine { op: Op, left: Option<Eff> },
}

pub(super) fn evaluate<E, Eff>(
    algebra: &dyn EffectTrait<Eff>,
    leaf: &mut Leaf<E, Eff>,
    graph: &EventGraph<E>,
) -> (Option<Eff>, bool) {
    let mut stack = vec![Continuation::Empty];
    let mut current = graph;

    loop {
        // Descend the left spine, leaving the right siblings on the stack.
        let (mut value, mut found) = loop {
            match current.node() {
                None => break (None, false),
                Some(Node::Atom(e)) => break leaf.visit(e),
                Some(Node::Sequentially(a, b)) => {
                    stack.push(Continuation::Right {
                        op: Op::Sequentially,
                        right: b,
                    });
                    current = a;
                }
                Some(Node::Concurrently(a, b)) => {
                    stack.push(Continuation::Right {
                        op: Op::Concurrently,
                        right: b,
                    });
                    current = a;
                }
            }
        };

        // Climb until some right sibling still needs folding.
        loop {
            match stack.pop() {
                None | Some(Continuation::Empty) => return (value, found),
                Some(Continuation::Right { op, right }) => {
                    if found {
                        // The stop is on the left; the right sibling is never visited.
                        continue;
                    }
                    stack.push(Continuation::Combine { op, left: value });
                    current = right;
                    break;
                }
                Some(Continuation::Combine { op, left }) => {
                    (value, found) = op.finish(algebra, (left, false), (value, found));
                }
            }
        }
    }
}
