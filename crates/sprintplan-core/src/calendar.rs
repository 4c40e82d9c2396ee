//! Working-time enumeration for a sprint window.
//!
//! Weekends are non-working. Each working day contributes two slots: a
//! morning (notionally 09:00-12:00) and an afternoon (notionally
//! 14:00-17:00), three hours each. Only date + period are modeled; the
//! notional clock times never enter any computation.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::{Period, Slot};

/// Capacity of a single half-day slot, in hours
pub const SLOT_HOURS: f64 = 3.0;

/// The ordered sequence of working half-day slots in a sprint window.
///
/// Construction enumerates the whole window once; the slot list is the
/// iteration backbone for the capacity ledger and the placement scan, so its
/// order is the canonical slot order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SprintCalendar {
    start: NaiveDate,
    end: NaiveDate,
    slots: Vec<Slot>,
}

impl SprintCalendar {
    /// Enumerate working slots over `[start, end]`, both inclusive
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        let mut slots = Vec::new();
        let mut date = start;
        while date <= end {
            if Self::is_working_day(date) {
                slots.push(Slot::morning(date));
                slots.push(Slot::afternoon(date));
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Self { start, end, slots }
    }

    /// Saturday and Sunday are non-working
    pub fn is_working_day(date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// All working slots in order
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// First working slot of the window, if any
    pub fn first_slot(&self) -> Option<Slot> {
        self.slots.first().copied()
    }

    /// Last working slot of the window, if any
    pub fn last_slot(&self) -> Option<Slot> {
        self.slots.last().copied()
    }

    /// Is this slot a working slot inside the window?
    pub fn contains(&self, slot: Slot) -> bool {
        slot.date >= self.start && slot.date <= self.end && Self::is_working_day(slot.date)
    }

    /// Working slots at or after `from`, in order.
    ///
    /// `from` need not itself be a working slot; the walk starts at the first
    /// working slot that is not before it.
    pub fn slots_from(&self, from: Slot) -> impl Iterator<Item = Slot> + '_ {
        let idx = self.slots.partition_point(|s| *s < from);
        self.slots[idx..].iter().copied()
    }

    /// Distinct working days in the window, in order
    pub fn working_dates(&self) -> Vec<NaiveDate> {
        self.slots
            .iter()
            .filter(|s| s.period == Period::Morning)
            .map(|s| s.date)
            .collect()
    }
}
