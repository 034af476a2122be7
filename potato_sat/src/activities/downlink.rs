use crate::model::{LOW_BATTERY, Satellite};
use hifitime::TimeUnits;
use kestrel::resource::LinearEffect;
use kestrel::{Activity, Step, TaskContext};
use tracing::info;

/// Sends data to the ground, unless the battery is too low to do it safely.
pub struct Downlink {
    sat: Satellite,
    megabytes: f64,
}

impl Downlink {
    /// Megabytes per second.
    const BANDWIDTH: f64 = 0.05;
    /// Extra power draw of the radio, in Wh per hour.
    const DRAW: f64 = 8.0;

    pub fn new(sat: &Satellite, megabytes: f64) -> Self {
        Downlink {
            sat: sat.clone(),
            megabytes,
        }
    }
}

impl Activity for Downlink {
    fn name(&self) -> &str {
        "downlink"
    }

    fn run(&self, ctx: &mut TaskContext<'_>) -> Step {
        let level = ctx.get(&self.sat.battery_level)?.value();
        if level < LOW_BATTERY {
            if !ctx.is_replaying() {
                info!(time = %ctx.time(), level, "skipping downlink");
            }
            return Ok(());
        }

        ctx.emit(&self.sat.mode, "downlink".to_string());
        ctx.emit(&self.sat.battery, LinearEffect::add_rate(-Self::DRAW));
        ctx.delay((self.megabytes / Self::BANDWIDTH).seconds())?;
        ctx.emit(&self.sat.battery, LinearEffect::add_rate(Self::DRAW));
        ctx.emit(&self.sat.downlinks, 1);
        ctx.emit(&self.sat.mode, "idle".to_string());
        Ok(())
    }
}

/// A ground station pass: several downlinks, one after the other.
pub struct Pass {
    sat: Satellite,
    files: Vec<f64>,
}

impl Pass {
    pub fn new(sat: &Satellite, files: Vec<f64>) -> Self {
        Pass {
            sat: sat.clone(),
            files,
        }
    }
}

impl Activity for Pass {
    fn name(&self) -> &str {
        "pass"
    }

    fn run(&self, ctx: &mut TaskContext<'_>) -> Step {
        for megabytes in &self.files {
            ctx.call(Downlink::new(&self.sat, *megabytes))?;
        }
        Ok(())
    }
}
