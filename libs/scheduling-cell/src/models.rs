// libs/scheduling-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime};
use std::fmt;

/// Uniform appointment length. The duration policy is system-wide, not
/// per-provider, so it lives in code rather than the provider row.
pub const SLOT_DURATION_MINUTES: i64 = 30;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

/// Directory view of a schedulable provider. Owned by the provider-directory
/// collaborator; this cell only reads the identifier and active flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub is_active: Option<bool>,
}

impl Provider {
    pub fn accepts_bookings(&self) -> bool {
        self.is_active.unwrap_or(false)
    }
}

/// One weekly recurring availability window for a provider.
/// Soft-deleted via `is_active` so historical slot provenance stays auditable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: Uuid,
    pub provider_id: Uuid,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl AvailabilityRule {
    pub fn enabled(&self) -> bool {
        self.is_active.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    /// Terminal statuses accept no further transition; a cancellation reason
    /// may still be recorded on `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self,
            AppointmentStatus::Cancelled |
            AppointmentStatus::Completed |
            AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

/// A bookable interval produced by slot enumeration. Derived, never persisted;
/// recomputed on every allocation attempt because occupancy can change
/// between reads.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SlotCandidate {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Insert payload for the claim. Status is not a field: every appointment is
/// created as `pending` by the store, never in any other state.
#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub notes: Option<String>,
}

// ==============================================================================
// TIME-OF-DAY PREFERENCE (prediction consumer boundary)
// ==============================================================================

/// Coarse preference bucket supplied by the automatic-booking path. The input
/// is a free-form string; unknown values are not errors and fall back to the
/// afternoon seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "morning" => TimeOfDay::Morning,
            "evening" => TimeOfDay::Evening,
            _ => TimeOfDay::Afternoon,
        }
    }

    /// Seed time the candidate ordering measures distance from. Policy
    /// constants, not invariants.
    pub fn seed_time(&self) -> NaiveTime {
        match self {
            TimeOfDay::Morning => NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            TimeOfDay::Afternoon => NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            TimeOfDay::Evening => NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookSlotRequest {
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoBookRequest {
    pub patient_id: Uuid,
    /// Absent means "the provider this patient saw most recently".
    pub provider_id: Option<Uuid>,
    pub target_date: NaiveDate,
    pub preferred_time_of_day: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAvailabilityRuleRequest {
    pub provider_id: Uuid,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
    pub cancelled_by: CancelledBy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Provider,
    System,
}

impl fmt::Display for CancelledBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelledBy::Patient => write!(f, "patient"),
            CancelledBy::Provider => write!(f, "provider"),
            CancelledBy::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordOutcomeRequest {
    /// `completed` or `no_show`; anything else is rejected.
    pub outcome: AppointmentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentSearchQuery {
    pub patient_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// ERROR TAXONOMY
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulingError {
    #[error("Requested date is in the past")]
    InvalidDate,

    #[error("Provider is inactive or unknown")]
    ProviderUnavailable,

    #[error("Requested slot is not available")]
    SlotUnavailable,

    #[error("No bookable slot remains on the requested date")]
    NoSlotAvailable,

    #[error("No provider specified and no recent appointment to infer one from")]
    NoProviderContext,

    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}
