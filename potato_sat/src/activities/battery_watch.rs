use crate::model::{LOW_BATTERY, Satellite};
use kestrel::{Activity, Duration, Step, TaskContext};
use tracing::warn;

/// Checks the battery every `period` and switches to safe mode when it runs low.
pub struct BatteryWatch {
    sat: Satellite,
    period: Duration,
}

impl BatteryWatch {
    pub fn new(sat: &Satellite, period: Duration) -> Self {
        BatteryWatch {
            sat: sat.clone(),
            period,
        }
    }
}

impl Activity for BatteryWatch {
    fn name(&self) -> &str {
        "battery watch"
    }

    fn run(&self, ctx: &mut TaskContext<'_>) -> Step {
        loop {
            let level = ctx.get(&self.sat.battery_level)?.value();
            let mode = ctx.get(&self.sat.current_mode)?;
            if level < LOW_BATTERY && mode.get() != "safe" {
                if !ctx.is_replaying() {
                    warn!(time = %ctx.time(), level, "battery low, entering safe mode");
                }
                ctx.emit(&self.sat.mode, "safe".to_string());
            }
            ctx.delay(self.period)?;
        }
    }
}
