//! Bounded waits for the broker listener to catch up.
//!
//! Every asynchronous request is followed by a wait on a readiness predicate
//! with a timeout. A timeout is not an error: the caller logs it and reads
//! whatever the session holds.

use std::time::Duration;

use crate::ports::clock_port::Clock;

#[derive(Debug, Clone, PartialEq)]
pub struct SettleTimeouts {
    pub positions: Duration,
    pub orders: Duration,
    pub bars: Duration,
    pub order_id: Duration,
    /// Fixed pause after each submission before the next dependent action.
    pub submit: Duration,
    pub cancel: Duration,
    pub poll: Duration,
}

impl Default for SettleTimeouts {
    fn default() -> Self {
        SettleTimeouts {
            positions: Duration::from_secs(2),
            orders: Duration::from_secs(2),
            bars: Duration::from_secs(5),
            order_id: Duration::from_secs(2),
            submit: Duration::from_secs(3),
            cancel: Duration::from_secs(2),
            poll: Duration::from_millis(50),
        }
    }
}

/// Poll `ready` until it holds or `timeout` elapses on `clock`. Returns
/// whether it became ready.
pub fn wait_until(
    clock: &dyn Clock,
    timeout: Duration,
    poll: Duration,
    ready: &dyn Fn() -> bool,
) -> bool {
    let deadline = clock.elapsed() + timeout;
    let poll = poll.max(Duration::from_millis(1));
    loop {
        if ready() {
            return true;
        }
        let now = clock.elapsed();
        if now >= deadline {
            return false;
        }
        clock.sleep(poll.min(deadline - now));
    }
}
