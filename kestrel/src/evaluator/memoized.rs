use super::{Leaf, Op};
use crate::effect::EffectTrait;
use crate::graph::{EventGraph, Node};
use std::collections::HashMap;

struct Frame<'g, E> {
    graph: &'g EventGraph<E>,
    parent: Option<usize>,
    /// How many children have been handed out so far.
    visited: u8,
}

/// Walks the graph through parent pointers instead of a call stack, folding each distinct node
/// once. Subtrees shared between branches are looked up in the cache instead of being folded again.
pub(super) fn evaluate<E, Eff: Clone>(
    algebra: &dyn EffectTrait<Eff>,
    leaf: &mut Leaf<E, Eff>,
    graph: &EventGraph<E>,
) -> (Option<Eff>, bool) {
    let mut cache: HashMap<usize, (Option<Eff>, bool), ahash::RandomState> = HashMap::default();
    let mut frames = vec![Frame {
        graph,
        parent: None,
        visited: 0,
    }];
    let mut current = 0;

    loop {
        let Frame {
            graph: here,
            visited,
            ..
        } = frames[current];
        let key = here.identity();

        let done = if cache.contains_key(&key) {
            true
        } else {
            match here.node() {
                None => {
                    cache.insert(key, (None, false));
                    true
                }
                Some(Node::Atom(e)) => {
                    let result = leaf.visit(e);
                    cache.insert(key, result);
                    true
                }
                Some(Node::Sequentially(a, b)) | Some(Node::Concurrently(a, b)) => {
                    let op = match here.node() {
                        Some(Node::Sequentially(..)) => Op::Sequentially,
                        _ => Op::Concurrently,
                    };
                    match visited {
                        0 => {
                            frames[current].visited = 1;
                            frames.push(Frame {
                                graph: a,
                                parent: Some(current),
                                visited: 0,
                            });
                            current = frames.len() - 1;
                            false
                        }
                        1 if cached(&cache, a).1 => {
                            // The stop is in the left child; the right child is never folded.
                            let left = cached(&cache, a);
                            cache.insert(key, left);
                            true
                        }
                        1 => {
                            frames[current].visited = 2;
                            frames.push(Frame {
                                graph: b,
                                parent: Some(current),
                                visited: 0,
                            });
                            current = frames.len() - 1;
                            false
                        }
                        _ => {
                            let result = op.finish(algebra, cached(&cache, a), cached(&cache, b));
                            cache.insert(key, result);
                            true
                        }
                    }
                }
            }
        };

        if done {
            match frames[current].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }

    cache.remove(&graph.identity()).unwrap_or((None, false))
}

fn cached<E, Eff: Clone>(
    cache: &HashMap<usize, (Option<Eff>, bool), ahash::RandomState>,
    graph: &EventGraph<E>,
) -> (Option<Eff>, bool) {
    cache
        .get(&graph.identity())
        .cloned()
        .unwrap_or((None, false))
}
