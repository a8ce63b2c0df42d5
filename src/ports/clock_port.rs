//! Time source port. Tests substitute a virtual clock so settle waits and the
//! polling cadence run instantly.

use std::time::Duration;

pub trait Clock {
    /// Time since the clock was created.
    fn elapsed(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}
