use hifitime::TimeUnits;
use kestrel::resource::{Register, RegisterEffect, RegisterTrait, register};
use kestrel::*;
use proptest::prelude::*;

const EVALUATORS: [Evaluator; 3] = [
    Evaluator::Recursive,
    Evaluator::Iterative,
    Evaluator::Memoized,
];

fn graphs() -> impl Strategy<Value = EventGraph<u32>> {
    let leaf = prop_oneof![
        1 => Just(EventGraph::empty()),
        4 => (0u32..20).prop_map(EventGraph::atom),
    ];
    leaf.prop_recursive(6, 64, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| EventGraph::sequentially(a, b)),
            (inner.clone(), inner).prop_map(|(a, b)| EventGraph::concurrently(a, b)),
        ]
    })
}

fn collect(evaluator: Evaluator, graph: &EventGraph<u32>) -> Option<Vec<u32>> {
    evaluator.evaluate::<u32, Vec<u32>>(&Collect, &mut |e: &u32| Some(vec![*e]), graph)
}

fn sum(evaluator: Evaluator, graph: &EventGraph<u32>) -> Option<u64> {
    evaluator.evaluate::<u32, u64>(&Additive, &mut |e: &u32| Some(*e as u64), graph)
}

/// Last write wins in sequence, concurrent differing writes conflict.
fn last_write(evaluator: Evaluator, graph: &EventGraph<u32>) -> Option<RegisterEffect<u32>> {
    evaluator.evaluate::<u32, RegisterEffect<u32>>(
        &RegisterTrait,
        &mut |e: &u32| Some(RegisterEffect::set(*e % 3)),
        graph,
    )
}

proptest! {
    #[test]
    fn sequential_composition_is_associative(a in graphs(), b in graphs(), c in graphs()) {
        let left = EventGraph::sequentially(EventGraph::sequentially(a.clone(), b.clone()), c.clone());
        let right = EventGraph::sequentially(a, EventGraph::sequentially(b, c));
        for evaluator in EVALUATORS {
            prop_assert_eq!(collect(evaluator, &left), collect(evaluator, &right));
            prop_assert_eq!(sum(evaluator, &left), sum(evaluator, &right));
            prop_assert_eq!(last_write(evaluator, &left), last_write(evaluator, &right));
        }
    }

    #[test]
    fn concurrent_composition_is_associative(a in graphs(), b in graphs(), c in graphs()) {
        let left = EventGraph::concurrently(EventGraph::concurrently(a.clone(), b.clone()), c.clone());
        let right = EventGraph::concurrently(a, EventGraph::concurrently(b, c));
        for evaluator in EVALUATORS {
            prop_assert_eq!(collect(evaluator, &left), collect(evaluator, &right));
            prop_assert_eq!(sum(evaluator, &left), sum(evaluator, &right));
            prop_assert_eq!(last_write(evaluator, &left), last_write(evaluator, &right));
        }
    }

    #[test]
    fn empty_is_an_identity(a in graphs()) {
        for evaluator in EVALUATORS {
            let expected = collect(evaluator, &a);
            for graph in [
                EventGraph::sequentially(EventGraph::empty(), a.clone()),
                EventGraph::sequentially(a.clone(), EventGraph::empty()),
                EventGraph::concurrently(EventGraph::empty(), a.clone()),
                EventGraph::concurrently(a.clone(), EventGraph::empty()),
            ] {
                prop_assert_eq!(collect(evaluator, &graph), expected.clone());
            }
        }
    }

    #[test]
    fn evaluators_agree(graph in graphs(), stop in 0u32..20, include_stop in any::<bool>()) {
        let reference = collect(Evaluator::Recursive, &graph);
        let reference_until = Evaluator::Recursive.evaluate_until::<u32, Vec<u32>>(
            &Collect, &mut |e: &u32| Some(vec![*e]), &graph, &stop, include_stop,
        );
        for evaluator in [Evaluator::Iterative, Evaluator::Memoized] {
            prop_assert_eq!(collect(evaluator, &graph), reference.clone());
            prop_assert_eq!(sum(evaluator, &graph), sum(Evaluator::Recursive, &graph));
            let until = evaluator.evaluate_until::<u32, Vec<u32>>(
                &Collect, &mut |e: &u32| Some(vec![*e]), &graph, &stop, include_stop,
            );
            prop_assert_eq!(until, reference_until.clone());
        }
    }

    #[test]
    fn filtering_everything_in_keeps_the_graph(graph in graphs()) {
        prop_assert_eq!(graph.filter(|_| true), graph);
    }

    #[test]
    fn uninteresting_commits_can_be_skipped(
        commits in prop::collection::vec((any::<bool>(), 0i64..5, 0u32..4), 1..30),
    ) {
        let watched = Topic::<i64>::new("watched");
        let ignored = Topic::<i64>::new("ignored");
        let query = Query::<Register<i64>>::new("register");

        let everything = TemporalEventSource::new();
        let interesting = TemporalEventSource::new();
        for (on_watched, value, gap) in commits {
            let topic = if on_watched { &watched } else { &ignored };
            let graph = EventGraph::atom(Event::new(topic, value, TaskId::new(0)));
            everything.add_delta((gap as i64).seconds()).map_err(|e| TestCaseError::fail(e.to_string()))?;
            interesting.add_delta((gap as i64).seconds()).map_err(|e| TestCaseError::fail(e.to_string()))?;
            everything.add_commit(graph.clone());
            if on_watched {
                interesting.add_commit(graph);
            }
        }

        let read = |source: TemporalEventSource| {
            let cells = LiveCells::new(std::sync::Arc::new(source));
            cells.put(&query, register(0, &watched, Evaluator::default()));
            cells.get_state(&query)
        };
        let all = read(everything).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let only = read(interesting).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(all, only);
    }
}
