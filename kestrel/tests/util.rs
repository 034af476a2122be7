#![allow(dead_code)]

use kestrel::resource::{SerializedValue, Stopwatch, StopwatchCommand, counter, history, stopwatch};
use kestrel::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

pub struct TestModel {
    pub model: Arc<MissionModel>,
    pub writes: Topic<String>,
    pub ticks: Topic<i64>,
    pub commands: Topic<StopwatchCommand>,
    pub log: Query<EventGraph<String>>,
    pub count: Query<i64>,
    pub timer: Query<Stopwatch>,
}

/// A model with a history of string writes, a counter of ticks and a stopwatch, all profiled.
pub fn test_model(evaluator: Evaluator) -> TestModel {
    build(evaluator, |_| None)
}

/// [test_model], plus a daemon that ticks every `period`, `count` times.
pub fn ticking_model(evaluator: Evaluator, period: Duration, count: usize) -> TestModel {
    build(evaluator, |ticks| {
        Some(Ticker {
            topic: ticks.clone(),
            period,
            count,
        })
    })
}

fn build(evaluator: Evaluator, daemon: impl FnOnce(&Topic<i64>) -> Option<Ticker>) -> TestModel {
    let writes = Topic::new("writes");
    let ticks = Topic::new("ticks");
    let commands = Topic::new("commands");

    let mut model = MissionModel::new();
    let log = model.add_cell("log", history(&writes, evaluator));
    let count = model.add_cell("count", counter(0, &ticks, evaluator));
    let timer = model.add_cell("timer", stopwatch(&commands, evaluator));
    model.add_resource("log", &log, |graph| SerializedValue::Text(graph.to_string()));
    model.add_resource("count", &count, |n| SerializedValue::Int(*n));
    model.add_resource("ringing", &timer, |timer| SerializedValue::Bool(timer.is_ringing()));
    if let Some(ticker) = daemon(&ticks) {
        model.add_daemon(ticker);
    }

    TestModel {
        model: Arc::new(model),
        writes,
        ticks,
        commands,
        log,
        count,
        timer,
    }
}

pub fn seconds(s: i64) -> Time {
    Time::from_tai_seconds(s as f64)
}

/// Routes engine logs through the test harness. Set `RUST_LOG` to see them.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn new_plan(model: &TestModel, horizon: Duration, incremental: bool) -> Plan {
    init_logging();
    Plan::new(
        model.model.clone(),
        seconds(0),
        SimulationConfig {
            horizon,
            evaluator: Evaluator::default(),
            incremental,
        },
    )
}

/// Writes one value, immediately.
pub struct Write {
    pub topic: Topic<String>,
    pub value: String,
}

impl Write {
    pub fn new(topic: &Topic<String>, value: impl Into<String>) -> Self {
        Write {
            topic: topic.clone(),
            value: value.into(),
        }
    }
}

impl Activity for Write {
    fn name(&self) -> &str {
        "write"
    }

    fn run(&self, ctx: &mut TaskContext<'_>) -> Step {
        ctx.emit(&self.topic, self.value.clone());
        Ok(())
    }
}

/// Writes each value at its offset from the activity's start, and counts the writes that were
/// actually emitted rather than replayed.
pub struct WriteSeries {
    pub topic: Topic<String>,
    pub writes: Vec<(Duration, String)>,
    pub emitted: Arc<AtomicUsize>,
}

impl WriteSeries {
    pub fn new(topic: &Topic<String>, writes: &[(Duration, &str)]) -> (Self, Arc<AtomicUsize>) {
        let emitted = Arc::new(AtomicUsize::new(0));
        (
            WriteSeries {
                topic: topic.clone(),
                writes: writes
                    .iter()
                    .map(|(offset, value)| (*offset, value.to_string()))
                    .collect(),
                emitted: emitted.clone(),
            },
            emitted,
        )
    }
}

impl Activity for WriteSeries {
    fn name(&self) -> &str {
        "write series"
    }

    fn run(&self, ctx: &mut TaskContext<'_>) -> Step {
        let start = ctx.now();
        for (offset, value) in &self.writes {
            ctx.delay_until(start + *offset)?;
            if !ctx.is_replaying() {
                self.emitted.fetch_add(1, Ordering::SeqCst);
            }
            ctx.emit(&self.topic, value.clone());
        }
        Ok(())
    }
}

/// Emits a tick every `period`, `count` times.
pub struct Ticker {
    pub topic: Topic<i64>,
    pub period: Duration,
    pub count: usize,
}

impl Activity for Ticker {
    fn name(&self) -> &str {
        "ticker"
    }

    fn run(&self, ctx: &mut TaskContext<'_>) -> Step {
        for _ in 0..self.count {
            ctx.emit(&self.topic, 1);
            ctx.delay(self.period)?;
        }
        Ok(())
    }
}

/// Starts the stopwatch with an alarm.
pub struct StartTimer {
    pub commands: Topic<StopwatchCommand>,
    pub alarm: Duration,
}

impl Activity for StartTimer {
    fn name(&self) -> &str {
        "start timer"
    }

    fn run(&self, ctx: &mut TaskContext<'_>) -> Step {
        ctx.emit(&self.commands, StopwatchCommand::Reset);
        ctx.emit(&self.commands, StopwatchCommand::SetAlarm(Some(self.alarm)));
        ctx.emit(&self.commands, StopwatchCommand::Start);
        Ok(())
    }
}
