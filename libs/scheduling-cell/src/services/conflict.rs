// libs/scheduling-cell/src/services/conflict.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use crate::models::{AppointmentStatus, SchedulingError, SlotCandidate};
use crate::store::SchedulingStore;

/// Filters candidate slots against the persisted appointment set. The result
/// is a snapshot as of the read, not a reservation; the allocator must still
/// expect the claim itself to lose a race.
pub struct ConflictService {
    store: Arc<dyn SchedulingStore>,
}

impl ConflictService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Candidates whose start time is not held by any non-cancelled
    /// appointment for (provider, date), input order preserved.
    ///
    /// A failed occupancy read surfaces as `StoreUnavailable` and yields no
    /// candidates; "store down" must never read as "fully available".
    pub async fn filter_available(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        candidates: Vec<SlotCandidate>,
    ) -> Result<Vec<SlotCandidate>, SchedulingError> {
        let occupied = self.occupied_start_times(provider_id, date).await?;

        let open: Vec<SlotCandidate> = candidates.into_iter()
            .filter(|candidate| !occupied.contains(&candidate.start_time))
            .collect();

        debug!("{} open slots for provider {} on {} ({} starts occupied)",
               open.len(), provider_id, date, occupied.len());

        Ok(open)
    }

    async fn occupied_start_times(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<HashSet<NaiveTime>, SchedulingError> {
        let appointments = self.store.appointments_for_day(provider_id, date).await?;

        Ok(appointments.iter()
            .filter(|apt| apt.status != AppointmentStatus::Cancelled)
            .map(|apt| apt.start_time)
            .collect())
    }
}
