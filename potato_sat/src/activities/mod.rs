mod battery_watch;
mod downlink;
mod recharge_potato;

pub use battery_watch::BatteryWatch;
pub use downlink::{Downlink, Pass};
pub use recharge_potato::RechargePotato;
