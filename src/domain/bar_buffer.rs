//! Bounded per-request bar storage.
//!
//! Bars arrive one callback at a time from the broker listener. The buffer keeps
//! the newest `capacity` bars in timestamp order, evicting the oldest on overflow.

use std::collections::VecDeque;

use crate::domain::bar::Bar;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Appended,
    /// The bar carried the newest bar's timestamp and replaced it.
    Merged,
    /// The oldest bar was dropped to make room.
    Evicted,
    /// Older than the newest bar, or malformed.
    Rejected,
}

#[derive(Debug, Clone)]
pub struct BarBuffer {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl BarBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.bars.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.bars.clear();
    }

    pub fn push(&mut self, bar: Bar) -> PushOutcome {
        if !bar.is_well_formed() {
            return PushOutcome::Rejected;
        }
        if let Some(last) = self.bars.back_mut() {
            if bar.timestamp == last.timestamp {
                *last = bar;
                return PushOutcome::Merged;
            }
            if bar.timestamp < last.timestamp {
                return PushOutcome::Rejected;
            }
        }
        let evicted = if self.is_full() {
            self.bars.pop_front();
            true
        } else {
            false
        };
        self.bars.push_back(bar);
        if evicted {
            PushOutcome::Evicted
        } else {
            PushOutcome::Appended
        }
    }

    /// Oldest to newest.
    pub fn to_vec(&self) -> Vec<Bar> {
        self.bars.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 6, 14)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap()
    }

    fn bar(minute: u32, close: f64) -> Bar {
        Bar {
            timestamp: at(minute),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn filling_appends() {
        let mut buf = BarBuffer::new(3);
        assert_eq!(buf.push(bar(0, 1.0)), PushOutcome::Appended);
        assert_eq!(buf.push(bar(5, 2.0)), PushOutcome::Appended);
        assert_eq!(buf.push(bar(10, 3.0)), PushOutcome::Appended);
        assert!(buf.is_full());
    }

    #[test]
    fn full_evicts_oldest() {
        let mut buf = BarBuffer::new(2);
        buf.push(bar(0, 1.0));
        buf.push(bar(5, 2.0));
        assert_eq!(buf.push(bar(10, 3.0)), PushOutcome::Evicted);

        let closes: Vec<f64> = buf.to_vec().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![2.0, 3.0]);
    }

    #[test]
    fn same_timestamp_merges_into_newest() {
        let mut buf = BarBuffer::new(5);
        buf.push(bar(0, 1.0));
        buf.push(bar(5, 2.0));
        assert_eq!(buf.push(bar(5, 2.5)), PushOutcome::Merged);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.to_vec()[1].close, 2.5);
    }

    #[test]
    fn older_timestamp_rejected() {
        let mut buf = BarBuffer::new(5);
        buf.push(bar(10, 1.0));
        assert_eq!(buf.push(bar(5, 2.0)), PushOutcome::Rejected);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn malformed_bar_rejected() {
        let mut buf = BarBuffer::new(5);
        let mut broken = bar(0, 1.0);
        broken.high = 0.0;
        assert_eq!(buf.push(broken), PushOutcome::Rejected);
        assert!(buf.is_empty());
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let mut buf = BarBuffer::new(0);
        buf.push(bar(0, 1.0));
        assert_eq!(buf.push(bar(5, 2.0)), PushOutcome::Evicted);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn clear_empties() {
        let mut buf = BarBuffer::new(3);
        buf.push(bar(0, 1.0));
        buf.clear();
        assert!(buf.is_empty());
    }
}
