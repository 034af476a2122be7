use crate::model::Satellite;
use hifitime::TimeUnits;
use kestrel::resource::{LinearEffect, StopwatchCommand};
use kestrel::{Activity, Duration, Step, TaskContext};

/// Charges the battery from a number of potatoes for a fixed time.
pub struct RechargePotato {
    sat: Satellite,
    potatoes: u32,
    duration: Duration,
}

impl RechargePotato {
    /// Charge rate of a single potato, in Wh per hour.
    const RATE: f64 = 5.0;

    pub fn new(sat: &Satellite, potatoes: u32, duration: Duration) -> Self {
        RechargePotato {
            sat: sat.clone(),
            potatoes,
            duration,
        }
    }
}

impl Activity for RechargePotato {
    fn name(&self) -> &str {
        "recharge potato"
    }

    fn run(&self, ctx: &mut TaskContext<'_>) -> Step {
        let rate = Self::RATE * self.potatoes as f64;

        ctx.emit(&self.sat.mode, "recharging".to_string());
        ctx.emit(&self.sat.battery, LinearEffect::add_rate(rate));
        ctx.emit(&self.sat.alarm, StopwatchCommand::Reset);
        ctx.emit(&self.sat.alarm, StopwatchCommand::SetAlarm(Some(self.duration)));
        ctx.emit(&self.sat.alarm, StopwatchCommand::Start);

        // Let the alarm go off before wrapping up.
        ctx.delay(self.duration + 1.seconds())?;

        ctx.emit(&self.sat.battery, LinearEffect::add_rate(-rate));
        ctx.emit(&self.sat.alarm, StopwatchCommand::Stop);
        ctx.emit(&self.sat.mode, "idle".to_string());
        Ok(())
    }
}
