//! Time source used when the data model needs "now".
//!
//! `Event` timestamps default to the current time. Reading the wall clock
//! inside constructors makes those values untestable, so construction takes
//! a `Clock` and tests pass a `FixedClock`.

use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the current time as unix seconds.
pub trait Clock {
    fn now(&self) -> i64;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        // A clock set before 1970 reports the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_its_instant() {
        assert_eq!(FixedClock(1_700_000_000).now(), 1_700_000_000);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
