//! Activities, and the replay machinery that lets them suspend without threads.
//!
//! An activity is ordinary straight-line code that takes a [TaskContext]. When it needs to wait
//! it returns early with [Interrupt::Suspend], and when the engine resumes it, it is simply run
//! again from the top. Everything the task observed or decided on earlier runs is kept in its
//! [Breadcrumbs]: reads return their recorded values, spawns return their recorded children,
//! suspension points that were already passed return immediately, and emits are skipped. Once the
//! log runs out, execution is live again.
//!
//! Activities must be deterministic in everything they do through the context.

mod context;
mod frame;

pub(crate) use context::Scheduler;
pub use context::TaskContext;
pub use frame::TaskFrame;

use crate::error::KernelError;
use crate::event::TaskId;
use derive_more::{Deref, DerefMut};
use hifitime::Duration;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub trait Activity: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn run(&self, ctx: &mut TaskContext<'_>) -> Step;
}

/// The result of running a task up to its next suspension point, or to completion.
pub type Step = Result<(), Interrupt>;

#[derive(Debug)]
pub enum Interrupt {
    Suspend(Suspend),
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for Interrupt {
    fn from(error: anyhow::Error) -> Self {
        Interrupt::Failed(error)
    }
}

impl From<KernelError> for Interrupt {
    fn from(error: KernelError) -> Self {
        Interrupt::Failed(error.into())
    }
}

/// Why a task stopped before completing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Suspend {
    DeferFor(Duration),
    AwaitCompletionOf(TaskId),
    AwaitChildren,
}

/// One recorded decision of a task.
#[derive(Clone)]
pub enum Breadcrumb {
    Read(Arc<dyn Any + Send + Sync>),
    Spawn(TaskId),
    /// A suspension point was passed, and execution continued at this time.
    Advance(Duration),
}

impl Breadcrumb {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Breadcrumb::Read(_) => "read",
            Breadcrumb::Spawn(_) => "spawn",
            Breadcrumb::Advance(_) => "advance",
        }
    }
}

impl Debug for Breadcrumb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Breadcrumb::Read(_) => write!(f, "Read"),
            Breadcrumb::Spawn(id) => write!(f, "Spawn({id})"),
            Breadcrumb::Advance(t) => write!(f, "Advance({t})"),
        }
    }
}

#[derive(Clone, Debug, Default, Deref, DerefMut)]
pub struct Breadcrumbs(Vec<Breadcrumb>);

/// An [Activity] made from a name and a closure.
pub struct FnActivity<F> {
    name: String,
    f: F,
}

impl<F: Fn(&mut TaskContext<'_>) -> Step + Send + Sync + 'static> Activity for FnActivity<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut TaskContext<'_>) -> Step {
        (self.f)(ctx)
    }
}

pub fn activity_fn<F: Fn(&mut TaskContext<'_>) -> Step + Send + Sync + 'static>(
    name: impl Into<String>,
    f: F,
) -> FnActivity<F> {
    FnActivity {
        name: name.into(),
        f,
    }
}
