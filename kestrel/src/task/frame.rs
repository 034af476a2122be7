use crate::error::KernelError;
use crate::event::{Event, Query};
use crate::graph::EventGraph;
use crate::live_cells::LiveCells;
use crate::source::CausalEventSource;
use anyhow::Result;
use std::sync::Arc;

struct Branch<Job> {
    base: CausalEventSource,
    context: Arc<LiveCells>,
    job: Job,
}

/// The events of one task, and of every task it forks, within a single instant.
///
/// Each [TaskFrame::signal] closes the current run of events and records a branch point. The
/// signalled job then runs in its own frame, seeing the cells as they were at the branch point.
/// Once every job has run, [TaskFrame::run] folds the branches back into one graph: everything
/// before a branch point, followed by what came after it in this frame concurrently with what the
/// forked job did.
pub struct TaskFrame<Job> {
    branches: Vec<Branch<Job>>,
    tip: CausalEventSource,
    previous_cells: Arc<LiveCells>,
    cells: Arc<LiveCells>,
}

impl<Job> TaskFrame<Job> {
    fn new(context: Arc<LiveCells>) -> Self {
        let tip = CausalEventSource::new();
        let cells = Arc::new(LiveCells::with_parent(Arc::new(tip.clone()), context.clone()));
        TaskFrame {
            branches: Vec::new(),
            tip,
            previous_cells: context,
            cells,
        }
    }

    /// Runs `job` and everything it signals, returning the graph of all their events.
    pub fn run<F>(job: Job, context: Arc<LiveCells>, executor: &mut F) -> Result<EventGraph<Event>>
    where
        F: FnMut(Job, &mut TaskFrame<Job>) -> Result<()>,
    {
        let mut frame = TaskFrame::new(context);
        executor(job, &mut frame)?;

        let mut graph = frame.tip.commit(EventGraph::empty());
        for branch in frame.branches.into_iter().rev() {
            let forked = TaskFrame::run(branch.job, branch.context, executor)?;
            graph = branch
                .base
                .commit(EventGraph::concurrently(graph, forked));
        }
        Ok(graph)
    }

    pub fn emit(&mut self, event: Event) {
        self.tip.add(EventGraph::atom(event));
    }

    pub fn get_state<S: Clone + Send + Sync + 'static>(
        &self,
        query: &Query<S>,
    ) -> Result<S, KernelError> {
        self.cells.get_state(query)
    }

    /// Forks `job` off at this point.
    pub fn signal(&mut self, job: Job) {
        if self.tip.is_empty() {
            self.branches.push(Branch {
                base: CausalEventSource::new(),
                context: self.previous_cells.clone(),
                job,
            });
        } else {
            let base = std::mem::take(&mut self.tip);
            self.branches.push(Branch {
                base,
                context: self.cells.clone(),
                job,
            });
            self.previous_cells = self.cells.clone();
            self.cells = Arc::new(LiveCells::with_parent(
                Arc::new(self.tip.clone()),
                self.previous_cells.clone(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::tests::counter;
    use crate::event::{TaskId, Topic};
    use crate::source::TemporalEventSource;

    struct Job {
        before: Vec<i64>,
        fork: Option<Box<Job>>,
        after: Vec<i64>,
    }

    fn emits(values: &[i64]) -> Job {
        Job {
            before: values.to_vec(),
            fork: None,
            after: Vec::new(),
        }
    }

    /// Runs `job` over a root holding one counter, and returns the graph plus the state each job
    /// saw at its end, in execution order.
    fn run(job: Job) -> Result<(String, Vec<i64>)> {
        let topic = Topic::<i64>::new("n");
        let query = Query::new("n");
        let root = Arc::new(LiveCells::new(Arc::new(TemporalEventSource::new())));
        root.put(&query, counter(&topic));

        let mut seen = Vec::new();
        let mut executor = |job: Job, frame: &mut TaskFrame<Job>| -> Result<()> {
            for v in job.before {
                frame.emit(Event::new(&topic, v, TaskId(0)));
            }
            if let Some(fork) = job.fork {
                frame.signal(*fork);
            }
            for v in job.after {
                frame.emit(Event::new(&topic, v, TaskId(0)));
            }
            seen.push(frame.get_state(&query)?);
            Ok(())
        };
        let graph = TaskFrame::run(job, root.clone(), &mut executor)?;
        assert_eq!(root.get_state(&query)?, 0);
        Ok((graph.to_string(), seen))
    }

    #[test]
    fn forks_branch_after_the_preceding_events() -> Result<()> {
        let (graph, seen) = run(Job {
            before: vec![1],
            fork: Some(Box::new(emits(&[10]))),
            after: vec![2],
        })?;
        assert_eq!(graph, "n=1; (n=2 | n=10)");
        assert_eq!(seen, [3, 11]);
        Ok(())
    }

    #[test]
    fn forking_with_nothing_before_is_plain_concurrency() -> Result<()> {
        let (graph, seen) = run(Job {
            before: Vec::new(),
            fork: Some(Box::new(emits(&[10]))),
            after: vec![2],
        })?;
        assert_eq!(graph, "n=2 | n=10");
        assert_eq!(seen, [2, 10]);
        Ok(())
    }

    #[test]
    fn nested_forks_fold_back_in_order() -> Result<()> {
        let (graph, _) = run(Job {
            before: vec![1],
            fork: Some(Box::new(Job {
                before: vec![10],
                fork: Some(Box::new(emits(&[100]))),
                after: vec![20],
            })),
            after: vec![2],
        })?;
        assert_eq!(graph, "n=1; (n=2 | (n=10; (n=20 | n=100)))");
        Ok(())
    }
}
