//! What a simulation run produces.

use crate::Time;
use crate::engine::TaskKey;
use crate::plan::DirectiveId;
use crate::resource::SerializedValue;
use hifitime::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The value of a resource from `start` until the next segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileSegment {
    pub start: Duration,
    pub value: SerializedValue,
}

/// Resource name to its profile, in time order.
pub type Profiles = BTreeMap<String, Vec<ProfileSegment>>;

/// Appends `value` at `time`, unless the profile already has that value.
///
/// A second sample at the same time replaces the first.
pub(crate) fn push_segment(profile: &mut Vec<ProfileSegment>, start: Duration, value: SerializedValue) {
    if let Some(last) = profile.last_mut() {
        if last.value == value {
            return;
        }
        if last.start == start {
            last.value = value;
            let len = profile.len();
            if len >= 2 && profile[len - 2].value == profile[len - 1].value {
                profile.pop();
            }
            return;
        }
    }
    profile.push(ProfileSegment { start, value });
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySpan {
    pub key: TaskKey,
    /// The directive this task descends from. `None` for daemons and their children.
    pub directive: Option<DirectiveId>,
    pub name: String,
    pub start: Duration,
    /// `None` if the task had not completed by the end of the run.
    pub end: Option<Duration>,
}

/// One committed event graph, rendered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub time: Duration,
    pub graph: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    pub start: Time,
    pub horizon: Duration,
    pub profiles: Profiles,
    /// Sorted by key.
    pub spans: Vec<ActivitySpan>,
    pub timeline: Vec<CommitRecord>,
    /// Set when the run was cancelled before reaching the horizon.
    pub partial: bool,
}

impl SimulationResults {
    /// The value of a resource at `time`.
    pub fn sample(&self, resource: &str, time: Duration) -> Option<&SerializedValue> {
        let profile = self.profiles.get(resource)?;
        let index = profile.partition_point(|segment| segment.start <= time);
        index.checked_sub(1).map(|i| &profile[i].value)
    }

    /// The segments of a resource's profile that overlap `[from, to)`.
    pub fn view(&self, resource: &str, from: Duration, to: Duration) -> &[ProfileSegment] {
        let Some(profile) = self.profiles.get(resource) else {
            return &[];
        };
        let first = profile
            .partition_point(|segment| segment.start <= from)
            .saturating_sub(1);
        let last = profile.partition_point(|segment| segment.start < to);
        &profile[first..last.max(first)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hifitime::TimeUnits;

    fn profile() -> Vec<ProfileSegment> {
        let mut profile = Vec::new();
        push_segment(&mut profile, 0.seconds(), SerializedValue::Int(0));
        push_segment(&mut profile, 0.seconds(), SerializedValue::Int(1));
        push_segment(&mut profile, 5.seconds(), SerializedValue::Int(1));
        push_segment(&mut profile, 10.seconds(), SerializedValue::Int(2));
        push_segment(&mut profile, 20.seconds(), SerializedValue::Int(3));
        push_segment(&mut profile, 20.seconds(), SerializedValue::Int(2));
        profile
    }

    #[test]
    fn only_changes_are_recorded() {
        let starts: Vec<_> = profile().iter().map(|s| s.start).collect();
        assert_eq!(starts, [0.seconds(), 10.seconds()]);
    }

    #[test]
    fn sample_and_view() {
        let results = SimulationResults {
            start: Time::from_tai_seconds(0.0),
            horizon: 30.seconds(),
            profiles: [("x".to_string(), profile())].into_iter().collect(),
            spans: Vec::new(),
            timeline: Vec::new(),
            partial: false,
        };
        assert_eq!(results.sample("x", 9.seconds()), Some(&SerializedValue::Int(1)));
        assert_eq!(results.sample("x", 10.seconds()), Some(&SerializedValue::Int(2)));
        assert_eq!(results.sample("x", -1.seconds()), None);
        assert_eq!(results.sample("y", 1.seconds()), None);

        assert_eq!(results.view("x", 3.seconds(), 8.seconds()).len(), 1);
        assert_eq!(results.view("x", 3.seconds(), 12.seconds()).len(), 2);
        assert_eq!(results.view("x", 10.seconds(), 12.seconds())[0].start, 10.seconds());
    }
}
