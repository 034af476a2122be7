//! Immutable series-parallel graphs of events.
//!
//! An [EventGraph] is the record of everything that happened at one instant of simulated time, and
//! of the causal order between those things. Events that happened one after another are joined with
//! [EventGraph::sequentially]; events in unordered branches are joined with [EventGraph::concurrently].
//!
//! Graphs are never mutated. Appending to a graph builds a new node that points at the old one, so
//! long histories share almost all of their structure. Because of that sharing, graphs are compared by
//! node identity rather than by shape: two graphs built separately are different graphs, even if they
//! print the same. Use [EventGraph::shape_eq] when you really need a structural comparison.

mod display;
mod expr;

pub use expr::{EffectExpression, Mapped, Substituted};

use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub enum Node<E> {
    Atom(E),
    Sequentially(EventGraph<E>, EventGraph<E>),
    Concurrently(EventGraph<E>, EventGraph<E>),
}

/// A series-parallel graph of events. `None` is the empty graph.
pub struct EventGraph<E>(Option<Arc<Node<E>>>);

impl<E> EventGraph<E> {
    pub const fn empty() -> Self {
        EventGraph(None)
    }

    pub fn atom(event: E) -> Self {
        EventGraph(Some(Arc::new(Node::Atom(event))))
    }

    /// `prefix` happened strictly before `suffix`.
    ///
    /// Empty is an identity on either side, so no node is allocated when one side is empty.
    pub fn sequentially(prefix: Self, suffix: Self) -> Self {
        if prefix.is_empty() {
            suffix
        } else if suffix.is_empty() {
            prefix
        } else {
            EventGraph(Some(Arc::new(Node::Sequentially(prefix, suffix))))
        }
    }

    /// `left` and `right` happened in unordered branches.
    pub fn concurrently(left: Self, right: Self) -> Self {
        if left.is_empty() {
            right
        } else if right.is_empty() {
            left
        } else {
            EventGraph(Some(Arc::new(Node::Concurrently(left, right))))
        }
    }

    pub fn sequentially_all(graphs: impl IntoIterator<Item = Self>) -> Self {
        graphs
            .into_iter()
            .fold(Self::empty(), |acc, next| Self::sequentially(acc, next))
    }

    pub fn concurrently_all(graphs: impl IntoIterator<Item = Self>) -> Self {
        graphs
            .into_iter()
            .fold(Self::empty(), |acc, next| Self::concurrently(acc, next))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// The top node, or `None` for the empty graph.
    pub fn node(&self) -> Option<&Node<E>> {
        self.0.as_deref()
    }

    /// An address that is unique to this node while it is alive. Zero for the empty graph.
    pub(crate) fn identity(&self) -> usize {
        self.0
            .as_ref()
            .map(|node| Arc::as_ptr(node) as *const () as usize)
            .unwrap_or(0)
    }

    /// Calls `f` on every event, left to right, without recursion.
    pub fn for_each_atom(&self, mut f: impl FnMut(&E)) {
        let mut stack = vec![self];
        while let Some(graph) = stack.pop() {
            match graph.node() {
                None => {}
                Some(Node::Atom(e)) => f(e),
                Some(Node::Sequentially(a, b)) | Some(Node::Concurrently(a, b)) => {
                    stack.push(b);
                    stack.push(a);
                }
            }
        }
    }

    /// Removes every event that fails `predicate`.
    ///
    /// Returns this exact graph (by identity) if nothing was removed, and otherwise shares every
    /// untouched subtree with this one.
    pub fn filter(&self, mut predicate: impl FnMut(&E) -> bool) -> Self {
        self.filter_inner(&mut predicate)
    }

    fn filter_inner(&self, predicate: &mut impl FnMut(&E) -> bool) -> Self {
        let mut stack = vec![Filter::Enter(self)];
        let mut done = Vec::new();
        while let Some(frame) = stack.pop() {
            match frame {
                Filter::Enter(graph) => match graph.node() {
                    None => done.push(Self::empty()),
                    Some(Node::Atom(e)) => done.push(if predicate(e) {
                        graph.clone()
                    } else {
                        Self::empty()
                    }),
                    Some(Node::Sequentially(a, b) | Node::Concurrently(a, b)) => {
                        stack.push(Filter::Join(graph));
                        stack.push(Filter::Enter(b));
                        stack.push(Filter::Enter(a));
                    }
                },
                Filter::Join(graph) => {
                    let (x, y) = pop_pair(&mut done);
                    done.push(graph.rejoin(x, y));
                }
                Filter::Split(..) | Filter::Close(..) => {}
            }
        }
        done.pop().unwrap_or_default()
    }

    /// Filters relative to a designated `stop` event.
    ///
    /// With `exclude_before` unset, keeps the matching events up to and including `stop`. With it
    /// set, keeps the matching events strictly after `stop`, so that a filter can resume where an
    /// earlier one left off. Inside a concurrent node that holds `stop`, only the branch holding it is
    /// kept. The flag reports whether `stop` was found.
    pub fn filter_around(
        &self,
        mut predicate: impl FnMut(&E) -> bool,
        stop: &E,
        exclude_before: bool,
    ) -> (Self, bool)
    where
        E: PartialEq,
    {
        let mut reached = false;
        let graph = self.filter_around_inner(&mut predicate, stop, exclude_before, &mut reached);
        (graph, reached)
    }

    fn filter_around_inner(
        &self,
        predicate: &mut impl FnMut(&E) -> bool,
        stop: &E,
        exclude_before: bool,
        reached: &mut bool,
    ) -> Self
    where
        E: PartialEq,
    {
        let mut stack = vec![Filter::Enter(self)];
        let mut done = Vec::new();
        while let Some(frame) = stack.pop() {
            match frame {
                Filter::Enter(graph) => match graph.node() {
                    None => done.push(Self::empty()),
                    Some(Node::Atom(e)) => {
                        let keep = if *reached {
                            exclude_before && predicate(e)
                        } else {
                            *reached = e == stop;
                            !exclude_before && predicate(e)
                        };
                        done.push(if keep { graph.clone() } else { Self::empty() });
                    }
                    Some(Node::Sequentially(a, b)) => {
                        stack.push(Filter::Join(graph));
                        stack.push(Filter::Enter(b));
                        stack.push(Filter::Enter(a));
                    }
                    Some(Node::Concurrently(a, _)) => {
                        stack.push(Filter::Split(graph, *reached));
                        stack.push(Filter::Enter(a));
                    }
                },
                // The left branch of a concurrent node is done.
                Filter::Split(graph, before) => {
                    if !before && *reached {
                        // The stop was in the left branch, whose result is already on top.
                        continue;
                    }
                    if let Some(Node::Concurrently(_, b)) = graph.node() {
                        stack.push(Filter::Close(graph, before));
                        stack.push(Filter::Enter(b));
                    }
                }
                Filter::Close(graph, before) => {
                    let (x, y) = pop_pair(&mut done);
                    done.push(if !before && *reached {
                        y
                    } else {
                        graph.rejoin(x, y)
                    });
                }
                Filter::Join(graph) => {
                    let (x, y) = pop_pair(&mut done);
                    done.push(graph.rejoin(x, y));
                }
            }
        }
        done.pop().unwrap_or_default()
    }

    /// Joins the filtered children of this node with its own operator, reusing this node if
    /// neither changed.
    fn rejoin(&self, x: Self, y: Self) -> Self {
        match self.node() {
            Some(Node::Sequentially(a, b)) => self.rebuild(a, b, x, y, Self::sequentially),
            Some(Node::Concurrently(a, b)) => self.rebuild(a, b, x, y, Self::concurrently),
            _ => self.clone(),
        }
    }

    fn rebuild(
        &self,
        a: &Self,
        b: &Self,
        x: Self,
        y: Self,
        join: fn(Self, Self) -> Self,
    ) -> Self {
        if x == *a && y == *b {
            self.clone()
        } else {
            join(x, y)
        }
    }

    /// Removes every occurrence of `event`.
    pub fn remove(&self, event: &E) -> Self
    where
        E: PartialEq,
    {
        self.filter(|e| e != event)
    }

    /// Structural comparison, for tests and diagnostics.
    ///
    /// Unlike `==`, this walks both graphs and compares their shape and atoms.
    pub fn shape_eq(&self, other: &Self) -> bool
    where
        E: PartialEq,
    {
        let mut stack = vec![(self, other)];
        while let Some((left, right)) = stack.pop() {
            if left == right {
                continue;
            }
            match (left.node(), right.node()) {
                (Some(Node::Atom(a)), Some(Node::Atom(b))) if a == b => {}
                (Some(Node::Sequentially(a, b)), Some(Node::Sequentially(c, d)))
                | (Some(Node::Concurrently(a, b)), Some(Node::Concurrently(c, d))) => {
                    stack.push((a, c));
                    stack.push((b, d));
                }
                _ => return false,
            }
        }
        true
    }
}

/// Work items for the non-recursive filters.
enum Filter<'a, E> {
    Enter(&'a EventGraph<E>),
    /// Both children are filtered.
    Join(&'a EventGraph<E>),
    /// The left child of a concurrent node is filtered. Carries whether the stop was reached
    /// before entering the node.
    Split(&'a EventGraph<E>, bool),
    /// Both children of a concurrent node are filtered.
    Close(&'a EventGraph<E>, bool),
}

/// Pops the results for the left and right children of a node.
fn pop_pair<E>(done: &mut Vec<EventGraph<E>>) -> (EventGraph<E>, EventGraph<E>) {
    let right = done.pop().unwrap_or_default();
    let left = done.pop().unwrap_or_default();
    (left, right)
}

impl<E> Clone for EventGraph<E> {
    fn clone(&self) -> Self {
        EventGraph(self.0.clone())
    }
}

impl<E> Default for EventGraph<E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<E> PartialEq for EventGraph<E> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
impl<E> Eq for EventGraph<E> {}

impl<E> Hash for EventGraph<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

// Histories can be millions of nodes deep. Unlink them with a heap stack instead of recursing.
impl<E> Drop for EventGraph<E> {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        if let Some(node) = self.0.take() {
            stack.push(node);
        }
        while let Some(node) = stack.pop() {
            if let Some(Node::Sequentially(mut a, mut b) | Node::Concurrently(mut a, mut b)) =
                Arc::into_inner(node)
            {
                stack.extend(a.0.take());
                stack.extend(b.0.take());
            }
        }
    }
}
