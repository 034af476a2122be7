//! Conversions between absolute [Time]s and offsets from plan start.
//!
//! The kernel works in offsets internally. Absolute times are all TAI.

use crate::{Duration, Time};
use hifitime::TimeScale::TAI;

pub fn epoch_to_duration(time: Time) -> Duration {
    time.to_tai_duration()
}

pub const fn duration_to_epoch(duration: Duration) -> Time {
    Time {
        duration,
        time_scale: TAI,
    }
}

/// How long after `start` the given `time` is. Negative if it is before.
pub fn offset_from(start: Time, time: Time) -> Duration {
    epoch_to_duration(time) - epoch_to_duration(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hifitime::TimeUnits;

    #[test]
    fn offsets_round_trip() {
        let start = Time::from_tai_seconds(100.0);
        let later = duration_to_epoch(epoch_to_duration(start) + 5.seconds());
        assert_eq!(offset_from(start, later), 5.seconds());
        assert_eq!(offset_from(later, start), -5.seconds());
    }
}
