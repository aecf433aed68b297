// libs/scheduling-cell/src/services/lifecycle.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentStatus, CancelAppointmentRequest, SchedulingError,
};
use crate::store::SchedulingStore;

/// Status transitions for existing appointments. Creation is the allocator's
/// job; everything after `pending` lands here.
pub struct AppointmentLifecycleService {
    store: Arc<dyn SchedulingStore>,
}

impl AppointmentLifecycleService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        debug!("Validating status transition from {:?} to {:?}", current_status, new_status);

        let valid_transitions = self.get_valid_transitions(current_status);

        if !valid_transitions.contains(new_status) {
            warn!("Invalid status transition attempted: {:?} -> {:?}", current_status, new_status);
            return Err(SchedulingError::InvalidStatusTransition(*current_status));
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::NoShow => vec![],
        }
    }

    pub async fn confirm(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        debug!("Confirming appointment: {}", appointment_id);

        let current = self.get_current(appointment_id).await?;
        self.validate_status_transition(&current.status, &AppointmentStatus::Confirmed)?;

        let confirmed = self.store
            .update_status(appointment_id, AppointmentStatus::Confirmed, None)
            .await?;

        info!("Appointment {} confirmed", appointment_id);
        Ok(confirmed)
    }

    /// Cancel with a required reason. An already-cancelled appointment is
    /// otherwise immutable, but its cancellation reason may still be amended.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Cancelling appointment: {}", appointment_id);

        let current = self.get_current(appointment_id).await?;
        let cancellation_note = format!("Cancelled by {}: {}", request.cancelled_by, request.reason);

        if current.status != AppointmentStatus::Cancelled {
            self.validate_status_transition(&current.status, &AppointmentStatus::Cancelled)?;
        }

        let cancelled = self.store
            .update_status(appointment_id, AppointmentStatus::Cancelled, Some(cancellation_note))
            .await?;

        info!("Appointment {} cancelled by {}", appointment_id, request.cancelled_by);
        Ok(cancelled)
    }

    /// Record the post-visit outcome for a confirmed appointment. Only
    /// `completed` and `no_show` are outcomes; anything else is rejected.
    pub async fn record_outcome(
        &self,
        appointment_id: Uuid,
        outcome: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Recording outcome {:?} for appointment: {}", outcome, appointment_id);

        let current = self.get_current(appointment_id).await?;

        if !matches!(outcome, AppointmentStatus::Completed | AppointmentStatus::NoShow) {
            return Err(SchedulingError::InvalidStatusTransition(current.status));
        }

        self.validate_status_transition(&current.status, &outcome)?;

        let updated = self.store
            .update_status(appointment_id, outcome, None)
            .await?;

        info!("Appointment {} recorded as {}", appointment_id, outcome);
        Ok(updated)
    }

    async fn get_current(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.store.get_appointment(appointment_id).await?
            .ok_or(SchedulingError::NotFound)
    }
}
