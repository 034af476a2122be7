use crate::cell::{Applicator, Cell};
use crate::effect::Collect;
use crate::evaluator::Evaluator;
use crate::event::Topic;
use crate::selector::Selector;
use hifitime::Duration;
use serde::{Deserialize, Serialize};

/// A clock that can be started, stopped and reset, with an optional alarm.
///
/// A running stopwatch with a pending alarm expires when the alarm is due, which makes the engine
/// wake up and sample resources at that time even if nothing else happens.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Stopwatch {
    elapsed: Duration,
    running: bool,
    alarm: Option<Duration>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Stopwatch {
            elapsed: Duration::ZERO,
            running: false,
            alarm: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the alarm is set and has gone off.
    pub fn is_ringing(&self) -> bool {
        self.alarm.is_some_and(|alarm| self.elapsed >= alarm)
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum StopwatchCommand {
    Start,
    Stop,
    Reset,
    /// Rings once the elapsed time reaches the given duration.
    SetAlarm(Option<Duration>),
}

struct StopwatchApplicator;

impl Applicator<Stopwatch, Vec<StopwatchCommand>> for StopwatchApplicator {
    fn step(&self, state: &mut Stopwatch, elapsed: Duration) {
        if state.running {
            state.elapsed = state.elapsed + elapsed;
        }
    }

    fn apply(&self, state: &mut Stopwatch, commands: &Vec<StopwatchCommand>) {
        for command in commands {
            match command {
                StopwatchCommand::Start => state.running = true,
                StopwatchCommand::Stop => state.running = false,
                StopwatchCommand::Reset => state.elapsed = Duration::ZERO,
                StopwatchCommand::SetAlarm(alarm) => state.alarm = *alarm,
            }
        }
    }

    fn expiry(&self, state: &Stopwatch) -> Option<Duration> {
        let alarm = state.alarm?;
        (state.running && alarm > state.elapsed).then(|| alarm - state.elapsed)
    }
}

pub fn stopwatch(commands: &Topic<StopwatchCommand>, evaluator: Evaluator) -> Cell<Stopwatch> {
    Cell::new(
        Stopwatch::new(),
        StopwatchApplicator,
        Collect,
        Selector::new(commands, |command| vec![*command]),
        evaluator,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, TaskId};
    use crate::graph::EventGraph;
    use hifitime::TimeUnits;

    fn send(cell: &mut Cell<Stopwatch>, topic: &Topic<StopwatchCommand>, commands: &[StopwatchCommand]) {
        cell.apply(&EventGraph::sequentially_all(
            commands
                .iter()
                .map(|c| EventGraph::atom(Event::new(topic, *c, TaskId(0)))),
        ));
    }

    #[test]
    fn only_runs_when_started() {
        let topic = Topic::new("watch");
        let mut cell = stopwatch(&topic, Evaluator::default());
        cell.step(5.seconds());
        assert_eq!(cell.state().elapsed(), Duration::ZERO);

        send(&mut cell, &topic, &[StopwatchCommand::Start]);
        cell.step(5.seconds());
        send(&mut cell, &topic, &[StopwatchCommand::Stop]);
        cell.step(5.seconds());
        assert_eq!(cell.state().elapsed(), 5.seconds());

        send(&mut cell, &topic, &[StopwatchCommand::Reset, StopwatchCommand::Start]);
        assert_eq!(cell.state().elapsed(), Duration::ZERO);
        assert!(cell.state().is_running());
    }

    #[test]
    fn alarms_drive_expiry() {
        let topic = Topic::new("watch");
        let mut cell = stopwatch(&topic, Evaluator::default());
        send(
            &mut cell,
            &topic,
            &[StopwatchCommand::SetAlarm(Some(10.seconds())), StopwatchCommand::Start],
        );
        assert_eq!(cell.expiry(), Some(10.seconds()));

        cell.step(4.seconds());
        assert_eq!(cell.expiry(), Some(6.seconds()));

        cell.step(6.seconds());
        assert_eq!(cell.expiry(), None);
        assert!(cell.state().is_ringing());
    }
}
