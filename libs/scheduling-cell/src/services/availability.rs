// libs/scheduling-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use tracing::debug;

use crate::models::{AvailabilityRule, Provider, SchedulingError, SlotCandidate, SLOT_DURATION_MINUTES};
use crate::store::SchedulingStore;

/// Derives the bookable slots for a provider on a date from the weekly
/// recurring rules. Occupancy is not considered here; see `ConflictService`.
pub struct AvailabilityService {
    store: Arc<dyn SchedulingStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Ordered candidate slots for (provider, date), before occupancy.
    ///
    /// An inactive provider and a past date both yield an empty sequence;
    /// neither is an error. The result is a pure function of the rule set,
    /// the date and the duration policy.
    pub async fn enumerate_slots(
        &self,
        provider: &Provider,
        date: NaiveDate,
    ) -> Result<Vec<SlotCandidate>, SchedulingError> {
        if !provider.accepts_bookings() {
            debug!("Provider {} is inactive, no slots", provider.id);
            return Ok(vec![]);
        }

        // Never enumerate into the past, by provider-local wall-clock date.
        if date < Local::now().date_naive() {
            return Ok(vec![]);
        }

        let rules = self.store
            .rules_for_day(provider.id, day_of_week(date))
            .await?;

        Ok(slots_from_rules(&rules, date))
    }
}

/// 0 = Sunday .. 6 = Saturday, matching the stored rule convention.
pub fn day_of_week(date: NaiveDate) -> i32 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

fn slots_from_rules(rules: &[AvailabilityRule], date: NaiveDate) -> Vec<SlotCandidate> {
    let mut candidates = Vec::new();
    for rule in rules {
        if !rule.enabled() {
            continue;
        }
        candidates.extend(partition_rule(rule, date));
    }

    // Overlapping rules may produce the same start twice; keep first seen.
    candidates.sort_by_key(|c| c.start_time);
    candidates.dedup_by_key(|c| c.start_time);
    candidates
}

/// Partitions [start_time, end_time) into consecutive fixed-duration slots,
/// discarding any trailing remainder shorter than the duration. A rule whose
/// window cannot fit a single slot contributes nothing.
fn partition_rule(rule: &AvailabilityRule, date: NaiveDate) -> Vec<SlotCandidate> {
    let duration = Duration::minutes(SLOT_DURATION_MINUTES);
    let mut slots = Vec::new();
    let mut cursor = rule.start_time;

    loop {
        let (slot_end, wrapped) = cursor.overflowing_add_signed(duration);
        if wrapped != 0 || slot_end > rule.end_time {
            break;
        }
        slots.push(SlotCandidate {
            date,
            start_time: cursor,
            end_time: slot_end,
        });
        cursor = slot_end;
    }

    slots
}
