use super::{EventGraph, Node};
use std::fmt::{Debug, Display, Formatter, Result};

#[derive(Copy, Clone, PartialEq)]
enum Context {
    Top,
    Sequential,
    Concurrent,
}

enum Work<'a, E> {
    Visit(&'a EventGraph<E>, Context),
    Text(&'static str),
}

/// Writes `a; b` for sequential composition and `a | b` for concurrent composition.
///
/// Parentheses are only needed where the operator changes; both operators are associative, so a
/// run of the same operator reads the same whichever way it was nested.
fn render<E>(
    graph: &EventGraph<E>,
    f: &mut Formatter<'_>,
    atom: &dyn Fn(&E, &mut Formatter<'_>) -> Result,
) -> Result {
    let mut stack = vec![Work::Visit(graph, Context::Top)];
    while let Some(work) = stack.pop() {
        let (graph, parent) = match work {
            Work::Text(text) => {
                f.write_str(text)?;
                continue;
            }
            Work::Visit(graph, parent) => (graph, parent),
        };
        let (a, b, context, separator) = match graph.node() {
            None => continue,
            Some(Node::Atom(e)) => {
                atom(e, f)?;
                continue;
            }
            Some(Node::Sequentially(a, b)) => (a, b, Context::Sequential, "; "),
            Some(Node::Concurrently(a, b)) => (a, b, Context::Concurrent, " | "),
        };
        let wrap = parent != Context::Top && parent != context;
        // Pushed in reverse.
        if wrap {
            stack.push(Work::Text(")"));
        }
        stack.push(Work::Visit(b, context));
        stack.push(Work::Text(separator));
        stack.push(Work::Visit(a, context));
        if wrap {
            stack.push(Work::Text("("));
        }
    }
    Ok(())
}

impl<E: Display> Display for EventGraph<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        render(self, f, &|e, f| write!(f, "{e}"))
    }
}

impl<E: Debug> Debug for EventGraph<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "EventGraph(")?;
        render(self, f, &|e, f| write!(f, "{e:?}"))?;
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(s: &str) -> EventGraph<String> {
        EventGraph::atom(s.to_string())
    }

    #[test]
    fn empty_renders_as_nothing() {
        assert_eq!(EventGraph::<String>::empty().to_string(), "");
    }

    #[test]
    fn parentheses_only_where_the_operator_changes() {
        let graph = EventGraph::sequentially(
            atom("a"),
            EventGraph::sequentially(
                EventGraph::concurrently(atom("b"), atom("c")),
                atom("d"),
            ),
        );
        assert_eq!(graph.to_string(), "a; (b | c); d");

        let graph = EventGraph::concurrently(
            EventGraph::concurrently(atom("a"), atom("b")),
            EventGraph::sequentially(atom("c"), atom("d")),
        );
        assert_eq!(graph.to_string(), "a | b | (c; d)");
    }

    #[test]
    fn debug_wraps_the_rendering() {
        let graph = EventGraph::sequentially(EventGraph::atom(1), EventGraph::atom(2));
        assert_eq!(format!("{graph:?}"), "EventGraph(1; 2)");
    }

    #[test]
    fn deep_graphs_render_without_recursion() {
        let mut graph = EventGraph::empty();
        for i in 0..200_000u32 {
            graph = EventGraph::sequentially(graph, EventGraph::atom(i));
        }
        let text = graph.to_string();
        assert!(text.starts_with("0; 1; 2; "));
        assert!(text.ends_with("; 199999"));
    }
}
