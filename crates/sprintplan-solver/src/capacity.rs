//! Per-executor capacity tracking over the sprint's working slots.
//!
//! Every executor starts with 3 hours in each working half-day slot (6 per
//! day), reduced to zero wherever a day-off applies. The ledger only ever
//! decreases after construction; the scheduler owns it exclusively during
//! its pass.

use std::collections::BTreeMap;

use sprintplan_core::{
    DayOff, DayOffPeriod, Email, Executor, Period, Slot, SprintCalendar, SLOT_HOURS,
};
use thiserror::Error;
use tracing::warn;

/// Attempt to consume more than a slot has left
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapacityError {
    #[error("no ledger entry for {email} at {slot}")]
    UnknownSlot { email: Email, slot: Slot },

    #[error("consuming {hours}h exceeds the {remaining}h remaining for {email} at {slot}")]
    Overdraw {
        email: Email,
        slot: Slot,
        hours: f64,
        remaining: f64,
    },
}

/// Remaining working hours per executor per slot
#[derive(Clone, Debug)]
pub struct CapacityLedger {
    // BTreeMaps keep executor and slot iteration deterministic
    remaining: BTreeMap<Email, BTreeMap<Slot, f64>>,
}

impl CapacityLedger {
    /// Seed the ledger from the calendar and apply day-offs.
    ///
    /// Day-offs outside the sprint window are ignored. Day-offs naming an
    /// email that is not a configured executor are warned about and ignored.
    pub fn new(calendar: &SprintCalendar, executors: &[Executor], dayoffs: &[DayOff]) -> Self {
        let mut remaining: BTreeMap<Email, BTreeMap<Slot, f64>> = BTreeMap::new();

        for executor in executors {
            let slots = calendar
                .slots()
                .iter()
                .map(|slot| (*slot, SLOT_HOURS))
                .collect();
            remaining.insert(executor.email.clone(), slots);
        }

        for dayoff in dayoffs {
            let Some(slots) = remaining.get_mut(&dayoff.email) else {
                warn!(
                    email = %dayoff.email,
                    date = %dayoff.date,
                    "day-off for unknown executor ignored"
                );
                continue;
            };

            let zeroed: &[Period] = match dayoff.period {
                DayOffPeriod::Full => &[Period::Morning, Period::Afternoon],
                DayOffPeriod::Morning => &[Period::Morning],
                DayOffPeriod::Afternoon => &[Period::Afternoon],
            };
            for period in zeroed {
                // Absent entries are dates outside the window: ignored
                if let Some(hours) = slots.get_mut(&Slot::new(dayoff.date, *period)) {
                    *hours = 0.0;
                }
            }
        }

        Self { remaining }
    }

    /// Hours still available for `email` at `slot` (0 for unknown entries)
    pub fn remaining(&self, email: &str, slot: Slot) -> f64 {
        self.remaining
            .get(email)
            .and_then(|slots| slots.get(&slot))
            .copied()
            .unwrap_or(0.0)
    }

    /// Hours still available for `email` across the whole window
    pub fn total_remaining(&self, email: &str) -> f64 {
        self.remaining
            .get(email)
            .map(|slots| slots.values().sum())
            .unwrap_or(0.0)
    }

    /// Debit `hours` from `email` at `slot`
    pub fn consume(&mut self, email: &str, slot: Slot, hours: f64) -> Result<(), CapacityError> {
        let entry = self
            .remaining
            .get_mut(email)
            .and_then(|slots| slots.get_mut(&slot))
            .ok_or_else(|| CapacityError::UnknownSlot {
                email: email.to_string(),
                slot,
            })?;

        if hours > *entry + f64::EPSILON {
            return Err(CapacityError::Overdraw {
                email: email.to_string(),
                slot,
                hours,
                remaining: *entry,
            });
        }
        *entry = (*entry - hours).max(0.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use sprintplan_core::Discipline;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn one_week() -> SprintCalendar {
        SprintCalendar::new(date(2024, 3, 18), date(2024, 3, 22))
    }

    #[test]
    fn fresh_ledger_has_six_hours_per_day() {
        let executors = vec![Executor::new("a@x", Discipline::Backend)];
        let ledger = CapacityLedger::new(&one_week(), &executors, &[]);

        assert_eq!(ledger.remaining("a@x", Slot::morning(date(2024, 3, 18))), 3.0);
        assert_eq!(ledger.remaining("a@x", Slot::afternoon(date(2024, 3, 18))), 3.0);
        assert_eq!(ledger.total_remaining("a@x"), 30.0);
    }

    #[test]
    fn full_dayoff_zeroes_both_periods() {
        let executors = vec![Executor::new("a@x", Discipline::Backend)];
        let dayoffs = vec![DayOff::new("a@x", date(2024, 3, 18), DayOffPeriod::Full)];
        let ledger = CapacityLedger::new(&one_week(), &executors, &dayoffs);

        assert_eq!(ledger.remaining("a@x", Slot::morning(date(2024, 3, 18))), 0.0);
        assert_eq!(ledger.remaining("a@x", Slot::afternoon(date(2024, 3, 18))), 0.0);
        assert_eq!(ledger.total_remaining("a@x"), 24.0);
    }

    #[test]
    fn half_dayoffs_zero_one_period_each() {
        let executors = vec![Executor::new("a@x", Discipline::Qa)];
        let dayoffs = vec![
            DayOff::new("a@x", date(2024, 3, 19), DayOffPeriod::Morning),
            DayOff::new("a@x", date(2024, 3, 20), DayOffPeriod::Afternoon),
        ];
        let ledger = CapacityLedger::new(&one_week(), &executors, &dayoffs);

        assert_eq!(ledger.remaining("a@x", Slot::morning(date(2024, 3, 19))), 0.0);
        assert_eq!(ledger.remaining("a@x", Slot::afternoon(date(2024, 3, 19))), 3.0);
        assert_eq!(ledger.remaining("a@x", Slot::morning(date(2024, 3, 20))), 3.0);
        assert_eq!(ledger.remaining("a@x", Slot::afternoon(date(2024, 3, 20))), 0.0);
    }

    #[test]
    fn morning_plus_afternoon_equal_full() {
        let executors = vec![Executor::new("a@x", Discipline::Backend)];
        let dayoffs = vec![
            DayOff::new("a@x", date(2024, 3, 21), DayOffPeriod::Morning),
            DayOff::new("a@x", date(2024, 3, 21), DayOffPeriod::Afternoon),
        ];
        let ledger = CapacityLedger::new(&one_week(), &executors, &dayoffs);
        assert_eq!(ledger.remaining("a@x", Slot::morning(date(2024, 3, 21))), 0.0);
        assert_eq!(ledger.remaining("a@x", Slot::afternoon(date(2024, 3, 21))), 0.0);
    }

    #[test]
    fn dayoffs_outside_window_are_ignored() {
        let executors = vec![Executor::new("a@x", Discipline::Backend)];
        let dayoffs = vec![DayOff::new("a@x", date(2024, 4, 1), DayOffPeriod::Full)];
        let ledger = CapacityLedger::new(&one_week(), &executors, &dayoffs);
        assert_eq!(ledger.total_remaining("a@x"), 30.0);
    }

    #[test]
    fn dayoff_for_unknown_executor_is_ignored() {
        let executors = vec![Executor::new("a@x", Discipline::Backend)];
        let dayoffs = vec![DayOff::new("ghost@x", date(2024, 3, 18), DayOffPeriod::Full)];
        let ledger = CapacityLedger::new(&one_week(), &executors, &dayoffs);
        assert_eq!(ledger.total_remaining("a@x"), 30.0);
        assert_eq!(ledger.total_remaining("ghost@x"), 0.0);
    }

    #[test]
    fn consume_debits_and_rejects_overdraw() {
        let executors = vec![Executor::new("a@x", Discipline::Backend)];
        let mut ledger = CapacityLedger::new(&one_week(), &executors, &[]);
        let slot = Slot::morning(date(2024, 3, 18));

        ledger.consume("a@x", slot, 2.0).unwrap();
        assert_eq!(ledger.remaining("a@x", slot), 1.0);

        let err = ledger.consume("a@x", slot, 1.5).unwrap_err();
        assert!(matches!(err, CapacityError::Overdraw { .. }));
        // Failed consume leaves the slot untouched
        assert_eq!(ledger.remaining("a@x", slot), 1.0);
    }

    #[test]
    fn consume_unknown_executor_fails() {
        let mut ledger = CapacityLedger::new(&one_week(), &[], &[]);
        let err = ledger
            .consume("a@x", Slot::morning(date(2024, 3, 18)), 1.0)
            .unwrap_err();
        assert!(matches!(err, CapacityError::UnknownSlot { .. }));
    }
}
