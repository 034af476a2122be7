use hifitime::TimeUnits;
use kestrel::resource::{
    Linear, LinearEffect, Register, SerializedValue, StopwatchCommand, counter, linear, register,
    stopwatch,
};
use kestrel::{Evaluator, MissionModel, Query, Topic};

/// Battery charge below which the satellite goes into safe mode, in Wh.
pub const LOW_BATTERY: f64 = 20.0;

/// Handles on everything activities touch. Cheap to clone.
#[derive(Clone)]
pub struct Satellite {
    pub battery: Topic<LinearEffect>,
    pub mode: Topic<String>,
    pub alarm: Topic<StopwatchCommand>,
    pub downlinks: Topic<i64>,

    pub battery_level: Query<Linear>,
    pub current_mode: Query<Register<String>>,
}

pub fn build(evaluator: Evaluator) -> (MissionModel, Satellite) {
    let battery = Topic::new("battery");
    let mode = Topic::new("mode");
    let alarm = Topic::new("alarm");
    let downlinks = Topic::new("downlinks");

    let mut model = MissionModel::new();

    // Charge in Wh, with a constant housekeeping drain of 1 Wh per hour.
    let battery_level = model.add_cell(
        "battery",
        linear(Linear::new(50.0, -1.0).with_basis(1.hours()), &battery, evaluator),
    );
    let current_mode = model.add_cell("mode", register("idle".to_string(), &mode, evaluator));
    let recharge_timer = model.add_cell("recharge timer", stopwatch(&alarm, evaluator));
    let downlink_count = model.add_cell("downlinks", counter(0, &downlinks, evaluator));

    model.add_resource("battery", &battery_level, |b| b.value().into());
    model.add_resource("battery_rate", &battery_level, |b| b.rate().into());
    model.add_resource("mode", &current_mode, |m| m.get().as_str().into());
    model.add_resource("mode_conflicted", &current_mode, |m| m.is_conflicted().into());
    model.add_resource("recharge_complete", &recharge_timer, |t| t.is_ringing().into());
    model.add_resource("downlinks", &downlink_count, |n| SerializedValue::Int(*n));

    let satellite = Satellite {
        battery,
        mode,
        alarm,
        downlinks,
        battery_level,
        current_mode,
    };
    model.add_daemon(crate::activities::BatteryWatch::new(&satellite, 2.hours()));
    (model, satellite)
}
