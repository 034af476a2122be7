//! # Kestrel
//!
//! A deterministic discrete event simulation kernel for mission planning, with incremental
//! re-simulation.
//!
//! Kestrel simulates the evolution of a mission model's state under a plan of activities. It is
//! built for schedulers and planning tools that edit a plan many times and re-simulate after every
//! edit: when the plan changes, only the part of the previous simulation that the change could
//! have affected is redone, and the results are identical to simulating the edited plan from
//! scratch.
//!
//! ## Concepts
//!
//! ### Events & Event Graphs
//!
//! Activities do not mutate state directly. They emit [Event]s onto [Topic]s, and everything
//! emitted at a single instant is collected into an [EventGraph] that records which events happened
//! in sequence and which happened concurrently. Graphs are committed to a timeline, interleaved with
//! the passage of time.
//!
//! ### Cells & Effect Algebras
//!
//! A [Cell] owns one piece of state. It reads the timeline through a [Selector], which picks out
//! the events it cares about and converts them to its effect type, and an [EffectTrait] algebra that
//! says what sequential and concurrent composition of those effects means. Two concurrent writes to
//! a [Register](resource::Register) are a conflict, while two concurrent increments of a
//! [counter](resource::counter) just add up. The [resource] module has ready-made cells for the
//! common cases.
//!
//! Cells can also evolve continuously between events, and can ask to be looked at again after a
//! given time (their *expiry*), which is how alarms and thresholds are modelled.
//!
//! ### Activities & Replay
//!
//! An [Activity] is plain straight-line code that receives a [TaskContext]. It reads cells, emits
//! events, spawns children and waits, all through the context. Waiting suspends the task by
//! returning [Interrupt::Suspend]; when it is resumed it is simply run again from the top, with
//! everything it did before replayed from a log of [Breadcrumb]s. Activities must therefore be
//! deterministic in everything they do through the context.
//!
//! ### Incremental Simulation
//!
//! A [Plan] keeps a checkpoint of its last complete run. When the plan is edited, the engine finds
//! the earliest time the edit touches, keeps everything before it, and lays a
//! [TemporalEventSourceDelta] over the old timeline so that only the new commits from that point
//! on are recomputed. Tasks that started before that point are resumed by replay.
//!
//! ## Quick-start
//!
//! ```
//! use hifitime::TimeUnits;
//! use kestrel::resource::{SerializedValue, counter};
//! use kestrel::*;
//! use std::sync::Arc;
//!
//! let ticks = Topic::<i64>::new("ticks");
//!
//! let mut model = MissionModel::new();
//! let count = model.add_cell("count", counter(0, &ticks, Evaluator::default()));
//! model.add_resource("count", &count, |n| SerializedValue::Int(*n));
//!
//! let start = Time::from_tai_seconds(0.0);
//! let mut plan = Plan::new(Arc::new(model), start, SimulationConfig::default());
//!
//! let tick = ticks.clone();
//! plan.insert(
//!     start + 10.seconds(),
//!     activity_fn("tick twice", move |ctx| {
//!         ctx.emit(&tick, 1);
//!         ctx.delay(5.seconds())?;
//!         ctx.emit(&tick, 1);
//!         Ok(())
//!     }),
//! )?;
//!
//! assert_eq!(plan.sample("count", start + 12.seconds())?, SerializedValue::Int(1));
//! assert_eq!(plan.sample("count", start + 15.seconds())?, SerializedValue::Int(2));
//! # Ok::<(), kestrel::Error>(())
//! ```

pub mod cell;
pub mod config;
pub mod effect;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod graph;
mod hash;
pub mod live_cells;
pub mod model;
pub mod plan;
pub mod resource;
pub mod results;
pub mod selector;
pub mod source;
pub mod task;
pub mod time;

pub use anyhow::{Context, Error, Result, anyhow, bail};
pub use hifitime::{Duration, Epoch as Time};

pub use cell::{Applicator, Cell, ErasedCell};
pub use config::SimulationConfig;
pub use effect::{Additive, Collect, EffectTrait, GraphTrait};
pub use engine::{Origin, TaskKey};
pub use error::KernelError;
pub use evaluator::Evaluator;
pub use event::{Event, Query, QueryId, TaskId, Topic, TopicId, TopicSet};
pub use graph::{EffectExpression, EventGraph};
pub use live_cells::LiveCells;
pub use model::MissionModel;
pub use plan::{DirectiveId, Plan};
pub use results::{ActivitySpan, CommitRecord, ProfileSegment, Profiles, SimulationResults};
pub use selector::Selector;
pub use source::{
    CausalEventSource, Commit, Cursor, EventSource, TemporalEventSource,
    TemporalEventSourceDelta, TimePoint,
};
pub use task::{
    Activity, Breadcrumb, Breadcrumbs, FnActivity, Interrupt, Step, Suspend, TaskContext,
    TaskFrame, activity_fn,
};
