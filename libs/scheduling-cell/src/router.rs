// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, delete},
};

use shared_config::AppConfig;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        // Booking surface - thin callers over the allocator
        .route("/", post(handlers::book_appointment))
        .route("/auto", post(handlers::auto_book_appointment))
        .route("/slots", get(handlers::get_open_slots))
        .route("/search", get(handlers::search_appointments))

        // Availability rule management (soft-delete via active flag)
        .route("/availability", post(handlers::create_availability_rule))
        .route("/availability/providers/{provider_id}", get(handlers::get_provider_availability))
        .route("/availability/{rule_id}", delete(handlers::deactivate_availability_rule))

        // Appointment lifecycle
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/outcome", post(handlers::record_appointment_outcome))

        .with_state(state)
}
