use crate::event::TaskId;
use crate::plan::DirectiveId;
use derive_more::with_trait::Error as DeriveError;
use hifitime::Duration;
use std::fmt::{Display, Formatter};

/// Violations detected by the kernel itself.
///
/// Structural violations (unknown queries, replay divergence) mean an invariant is broken somewhere
/// else and abort the run. Temporal violations are rejected at the call site that made them.
#[derive(Clone, Debug, PartialEq, DeriveError)]
pub enum KernelError {
    UnknownQuery { name: String },
    StateTypeMismatch { name: String },
    NegativeDelay { task: TaskId, requested: Duration },
    DelayIntoPast { task: TaskId, now: Duration, until: Duration },
    TaskAlreadyCompleted { task: TaskId },
    UnknownTask { task: TaskId },
    ReplayDiverged { task: TaskId, expected: &'static str, found: &'static str },
    EditBeforeFrontier { time: Duration, frontier: Duration },
    UnknownDirective { directive: DirectiveId },
    UnknownResource { name: String },
}

impl Display for KernelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelError::UnknownQuery { name } => {
                write!(f, "cell {name} is not registered in any live cell layer")
            }
            KernelError::StateTypeMismatch { name } => {
                write!(f, "cell {name} was read with the wrong state type")
            }
            KernelError::NegativeDelay { task, requested } => {
                write!(f, "{task} requested a negative delay of {requested}")
            }
            KernelError::DelayIntoPast { task, now, until } => {
                write!(f, "{task} requested a delay until {until}, but it is already {now}")
            }
            KernelError::TaskAlreadyCompleted { task } => {
                write!(f, "{task} has already completed and cannot be stepped again")
            }
            KernelError::UnknownTask { task } => write!(f, "{task} does not exist"),
            KernelError::ReplayDiverged {
                task,
                expected,
                found,
            } => write!(
                f,
                "{task} diverged from its recorded history: expected {expected}, found {found}"
            ),
            KernelError::EditBeforeFrontier { time, frontier } => write!(
                f,
                "cannot edit the timeline at {time}, it is already final up to {frontier}"
            ),
            KernelError::UnknownDirective { directive } => {
                write!(f, "could not find activity with id {directive:?}")
            }
            KernelError::UnknownResource { name } => write!(f, "no resource named {name}"),
        }
    }
}
