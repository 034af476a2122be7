use crate::evaluator::Evaluator;
use hifitime::{Duration, TimeUnits};
use serde::{Deserialize, Serialize};

/// Settings for simulating a [Plan](crate::plan::Plan).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// How far past plan start to simulate. Nothing at or after the horizon runs.
    #[serde(with = "seconds")]
    pub horizon: Duration,
    /// The evaluator mission models should build their cells with.
    pub evaluator: Evaluator,
    /// Reuse the previous run where the plan has not changed.
    pub incremental: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            horizon: 1.days(),
            evaluator: Evaluator::default(),
            incremental: true,
        }
    }
}

/// Durations written as a number of seconds.
mod seconds {
    use hifitime::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.to_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "horizon must be a non-negative number of seconds, got {seconds}"
            )));
        }
        Ok(Duration::from_seconds(seconds))
    }
}
