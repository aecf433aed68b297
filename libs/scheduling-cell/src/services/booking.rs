// libs/scheduling-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    Appointment, AutoBookRequest, BookSlotRequest, NewAppointment, Provider,
    SchedulingError, SlotCandidate, TimeOfDay,
};
use crate::services::availability::AvailabilityService;
use crate::services::conflict::ConflictService;
use crate::store::{ProviderDirectory, SchedulingStore, StoreError, SupabaseStore};

/// The only component that creates appointment rows. Owns the claim protocol:
/// re-validates availability at claim time and leans on the store's
/// uniqueness guarantee rather than any in-process lock, because concurrent
/// requests may run across processes.
pub struct BookingService {
    store: Arc<dyn SchedulingStore>,
    directory: Arc<dyn ProviderDirectory>,
    availability: AvailabilityService,
    conflict: ConflictService,
}

impl BookingService {
    pub fn new(store: Arc<dyn SchedulingStore>, directory: Arc<dyn ProviderDirectory>) -> Self {
        let availability = AvailabilityService::new(Arc::clone(&store));
        let conflict = ConflictService::new(Arc::clone(&store));
        Self {
            store,
            directory,
            availability,
            conflict,
        }
    }

    pub fn from_config(config: &AppConfig, auth_token: Option<String>) -> Self {
        let store = Arc::new(SupabaseStore::new(config, auth_token));
        Self::new(store.clone(), store)
    }

    /// Claimable slots for (provider, date): enumeration filtered by
    /// occupancy. An unknown provider is an error; an inactive one simply has
    /// no slots.
    pub async fn open_slots(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<SlotCandidate>, SchedulingError> {
        let provider = self.directory.fetch_provider(provider_id).await?
            .ok_or(SchedulingError::ProviderUnavailable)?;

        let candidates = self.availability.enumerate_slots(&provider, date).await?;
        self.conflict.filter_available(provider.id, date, candidates).await
    }

    /// Books the exact slot the patient picked.
    ///
    /// Checks run in order, first failure wins: past date, inactive provider,
    /// requested start not among the open slots. A lost claim race also
    /// surfaces as `SlotUnavailable` - the caller asked for this specific
    /// slot, so there is no fallback to a different one.
    pub async fn book_manual(&self, request: BookSlotRequest) -> Result<Appointment, SchedulingError> {
        info!("Booking slot {} {} with provider {} for patient {}",
              request.date, request.start_time, request.provider_id, request.patient_id);

        if request.date < Local::now().date_naive() {
            return Err(SchedulingError::InvalidDate);
        }

        let provider = self.require_active_provider(request.provider_id).await?;

        let candidates = self.availability.enumerate_slots(&provider, request.date).await?;
        let open = self.conflict.filter_available(provider.id, request.date, candidates).await?;

        let slot = open.into_iter()
            .find(|candidate| candidate.start_time == request.start_time)
            .ok_or(SchedulingError::SlotUnavailable)?;

        match self.claim(request.patient_id, provider.id, &slot, request.notes).await {
            Ok(appointment) => {
                info!("Appointment {} booked at {} {}",
                      appointment.id, appointment.appointment_date, appointment.start_time);
                Ok(appointment)
            }
            Err(StoreError::Conflict) => {
                warn!("Lost claim race for {} {} with provider {}",
                      slot.date, slot.start_time, provider.id);
                Err(SchedulingError::SlotUnavailable)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Books the open slot closest to the preferred time-of-day seed,
    /// retrying the next-closest candidate on a lost race until one claim
    /// succeeds or the candidate list is exhausted. Bounded by the finite
    /// list, never by time.
    pub async fn book_first_fit(&self, request: AutoBookRequest) -> Result<Appointment, SchedulingError> {
        info!("First-fit booking for patient {} on {} ({})",
              request.patient_id, request.target_date, request.preferred_time_of_day);

        if request.target_date < Local::now().date_naive() {
            return Err(SchedulingError::InvalidDate);
        }

        let provider_id = match request.provider_id {
            Some(id) => id,
            None => self.resolve_recent_provider(request.patient_id).await?,
        };
        let provider = self.require_active_provider(provider_id).await?;

        let seed = TimeOfDay::parse(&request.preferred_time_of_day).seed_time();

        let candidates = self.availability.enumerate_slots(&provider, request.target_date).await?;
        let open = self.conflict.filter_available(provider.id, request.target_date, candidates).await?;
        let ordered = order_by_seed_distance(open, seed);

        for slot in ordered {
            match self.claim(request.patient_id, provider.id, &slot, request.notes.clone()).await {
                Ok(appointment) => {
                    info!("First-fit claimed {} {} for patient {}",
                          appointment.appointment_date, appointment.start_time, request.patient_id);
                    return Ok(appointment);
                }
                Err(StoreError::Conflict) => {
                    debug!("Slot {} {} lost to a concurrent claim, trying next candidate",
                           slot.date, slot.start_time);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SchedulingError::NoSlotAvailable)
    }

    async fn claim(
        &self,
        patient_id: Uuid,
        provider_id: Uuid,
        slot: &SlotCandidate,
        notes: Option<String>,
    ) -> Result<Appointment, StoreError> {
        self.store.insert_appointment(NewAppointment {
            patient_id,
            provider_id,
            appointment_date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            notes,
        }).await
    }

    async fn require_active_provider(&self, provider_id: Uuid) -> Result<Provider, SchedulingError> {
        let provider = self.directory.fetch_provider(provider_id).await?
            .ok_or(SchedulingError::ProviderUnavailable)?;

        if !provider.accepts_bookings() {
            return Err(SchedulingError::ProviderUnavailable);
        }

        Ok(provider)
    }

    async fn resolve_recent_provider(&self, patient_id: Uuid) -> Result<Uuid, SchedulingError> {
        self.store.most_recent_provider(patient_id).await?
            .ok_or(SchedulingError::NoProviderContext)
    }
}

/// Ascending absolute distance from the seed time, ties broken by the
/// earlier slot.
fn order_by_seed_distance(mut candidates: Vec<SlotCandidate>, seed: NaiveTime) -> Vec<SlotCandidate> {
    candidates.sort_by_key(|candidate| {
        let distance = (candidate.start_time - seed).num_minutes().abs();
        (distance, candidate.start_time)
    });
    candidates
}
