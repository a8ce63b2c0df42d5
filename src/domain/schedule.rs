//! Fixed-cadence cycle scheduling.
//!
//! Cycles start on multiples of the interval measured from the first cycle.
//! A cycle that runs past its slot is followed immediately by the next one;
//! cycles never overlap and are never skipped.

use std::time::Duration;

use crate::domain::trader_config::ScheduleSettings;
use crate::ports::clock_port::Clock;

/// Delay before the next cycle. `now` and `cycle_started` are measured from
/// the schedule start.
pub fn next_cycle_delay(now: Duration, cycle_started: Duration, interval: Duration) -> Duration {
    if interval.is_zero() || now.saturating_sub(cycle_started) >= interval {
        return Duration::ZERO;
    }
    let interval_nanos = interval.as_nanos();
    let into_slot = now.as_nanos() % interval_nanos;
    let remaining = interval_nanos - into_slot;
    Duration::from_nanos(u64::try_from(remaining).unwrap_or(u64::MAX))
}

/// Run `cycle` on the schedule until the timeout; returns the number of cycles run.
pub fn run_schedule(
    clock: &dyn Clock,
    schedule: &ScheduleSettings,
    cycle: &mut dyn FnMut(u64),
) -> u64 {
    let start = clock.elapsed();
    let mut count = 0;
    loop {
        let started = clock.elapsed().saturating_sub(start);
        if started >= schedule.timeout {
            log::info!("schedule timeout of {:?} reached", schedule.timeout);
            break;
        }

        count += 1;
        cycle(count);
        if schedule.once {
            break;
        }

        let now = clock.elapsed().saturating_sub(start);
        let delay = next_cycle_delay(now, started, schedule.interval);
        if now + delay >= schedule.timeout {
            log::info!("no cycle slot left before the {:?} timeout", schedule.timeout);
            break;
        }
        if delay.is_zero() {
            log::warn!(
                "cycle {} took {:?}, longer than the {:?} interval; starting next cycle now",
                count,
                now - started,
                schedule.interval
            );
        } else {
            log::debug!("next cycle in {:?}", delay);
        }
        clock.sleep(delay);
    }
    count
}
