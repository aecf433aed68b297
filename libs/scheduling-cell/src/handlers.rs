// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use serde::Deserialize;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    AppointmentSearchQuery, AutoBookRequest, BookSlotRequest, CancelAppointmentRequest,
    CreateAvailabilityRuleRequest, RecordOutcomeRequest, SchedulingError,
};
use crate::services::{
    AppointmentLifecycleService, BookingService, ScheduleService,
};
use crate::store::{SchedulingStore, SupabaseStore};

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct OpenSlotsQuery {
    pub provider_id: Uuid,
    pub date: NaiveDate,
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

/// Booking failures must name the reason so the UI can redirect the user
/// appropriately (re-pick slot vs. re-pick provider vs. retry later).
fn map_scheduling_error(err: SchedulingError) -> AppError {
    match err {
        SchedulingError::InvalidDate => {
            AppError::BadRequest("Appointments cannot be booked in the past".to_string())
        }
        SchedulingError::ProviderUnavailable => {
            AppError::NotFound("Provider is not accepting appointments".to_string())
        }
        SchedulingError::SlotUnavailable => {
            AppError::Conflict("Requested slot is no longer available".to_string())
        }
        SchedulingError::NoSlotAvailable => {
            AppError::Conflict("No open slot remains on the requested date".to_string())
        }
        SchedulingError::NoProviderContext => {
            AppError::BadRequest("No provider specified and no appointment history to infer one".to_string())
        }
        SchedulingError::NotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        SchedulingError::InvalidStatusTransition(status) => {
            AppError::BadRequest(format!("Appointment cannot be modified in status: {}", status))
        }
        SchedulingError::StoreUnavailable(msg) => AppError::ExternalService(msg),
    }
}

fn store_for(state: &AppConfig, token: &str) -> Arc<SupabaseStore> {
    Arc::new(SupabaseStore::new(state, Some(token.to_string())))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

/// Manual booking of an exact slot chosen by the patient.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::from_config(&state, Some(auth.token().to_string()));

    let appointment = booking_service.book_manual(request).await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Automatic booking used by the prediction consumer: a coarse time-of-day
/// preference instead of an exact slot.
#[axum::debug_handler]
pub async fn auto_book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<AutoBookRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::from_config(&state, Some(auth.token().to_string()));

    let appointment = booking_service.book_first_fit(request).await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Open (claimable) slots for a provider on a date, for the booking screen's
/// slot grid.
#[axum::debug_handler]
pub async fn get_open_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<OpenSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::from_config(&state, Some(auth.token().to_string()));

    let slots = booking_service.open_slots(query.provider_id, query.date).await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "provider_id": query.provider_id,
        "date": query.date,
        "slots": slots
    })))
}

// ==============================================================================
// APPOINTMENT LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let store = store_for(&state, auth.token());

    let appointments = store.search_appointments(&query).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let count = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let store = store_for(&state, auth.token());

    let appointment = store.get_appointment(appointment_id).await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

    Ok(Json(json!({ "appointment": appointment })))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let lifecycle_service = AppointmentLifecycleService::new(store_for(&state, auth.token()));

    let appointment = lifecycle_service.confirm(appointment_id).await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let lifecycle_service = AppointmentLifecycleService::new(store_for(&state, auth.token()));

    let appointment = lifecycle_service.cancel(appointment_id, request).await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Post-visit outcome (`completed` / `no_show`), recorded by staff after the
/// appointment's date has passed.
#[axum::debug_handler]
pub async fn record_appointment_outcome(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RecordOutcomeRequest>,
) -> Result<Json<Value>, AppError> {
    let lifecycle_service = AppointmentLifecycleService::new(store_for(&state, auth.token()));

    let appointment = lifecycle_service.record_outcome(appointment_id, request.outcome).await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// AVAILABILITY RULE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_availability_rule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateAvailabilityRuleRequest>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(store_for(&state, auth.token()));

    let rule = schedule_service.create_rule(request).await
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "rule": rule
    })))
}

#[axum::debug_handler]
pub async fn get_provider_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(store_for(&state, auth.token()));

    let rules = schedule_service.provider_rules(provider_id).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "provider_id": provider_id,
        "rules": rules
    })))
}

/// Soft delete: the rule row is kept with its active flag cleared.
#[axum::debug_handler]
pub async fn deactivate_availability_rule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(rule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(store_for(&state, auth.token()));

    let rule = schedule_service.deactivate_rule(rule_id).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "rule": rule
    })))
}
