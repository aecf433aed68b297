// libs/scheduling-cell/src/store/mod.rs
//
// Store seams for the scheduling core. Every operation takes the store as an
// explicit collaborator so tests can substitute the in-memory implementation
// for the Supabase-backed one.
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, AvailabilityRule,
    CreateAvailabilityRuleRequest, NewAppointment, Provider, SchedulingError,
};

pub mod supabase;
pub mod memory;

pub use supabase::SupabaseStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another row already claims the same (provider, date, start_time).
    #[error("row already exists")]
    Conflict,

    #[error("row not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for SchedulingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => SchedulingError::SlotUnavailable,
            StoreError::NotFound => SchedulingError::NotFound,
            StoreError::Unavailable(msg) => SchedulingError::StoreUnavailable(msg),
        }
    }
}

/// Persistence operations the scheduling core relies on. The insert must be
/// atomic with respect to duplicate (provider, date, start_time) claims among
/// non-cancelled rows; it is the only serialization point in the system.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    /// Active weekly rules for one provider on one day-of-week (0 = Sunday),
    /// ordered by start time.
    async fn rules_for_day(
        &self,
        provider_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityRule>, StoreError>;

    /// All active rules for a provider, ordered by day then start time.
    async fn rules_for_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<AvailabilityRule>, StoreError>;

    async fn insert_rule(
        &self,
        request: CreateAvailabilityRuleRequest,
    ) -> Result<AvailabilityRule, StoreError>;

    /// Soft delete: clears the active flag, never removes the row.
    async fn deactivate_rule(&self, rule_id: Uuid) -> Result<AvailabilityRule, StoreError>;

    /// Non-cancelled appointments for (provider, date), ordered by start time.
    async fn appointments_for_day(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Provider of the patient's most recent appointment, if any.
    async fn most_recent_provider(&self, patient_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, StoreError>;

    /// The claim. Inserts with status `pending`; fails with
    /// `StoreError::Conflict` when a non-cancelled row already holds the slot.
    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError>;

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        cancellation_reason: Option<String>,
    ) -> Result<Appointment, StoreError>;
}

/// Read-only view of the provider directory collaborator.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn fetch_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, StoreError>;
}
