// libs/scheduling-cell/src/store/memory.rs
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, AvailabilityRule,
    CreateAvailabilityRuleRequest, NewAppointment, Provider,
};
use super::{ProviderDirectory, SchedulingStore, StoreError};

#[derive(Default)]
struct State {
    providers: Vec<Provider>,
    rules: Vec<AvailabilityRule>,
    appointments: Vec<Appointment>,
}

/// In-memory store used by tests. The mutex-guarded insert-if-absent mirrors
/// the partial unique index the hosted store enforces, so claim races behave
/// the same way here as in production.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_provider(&self, provider_id: Uuid, is_active: bool) {
        let mut state = self.state.lock().unwrap();
        state.providers.push(Provider {
            id: provider_id,
            is_active: Some(is_active),
        });
    }

    pub fn add_rule(
        &self,
        provider_id: Uuid,
        day_of_week: i32,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Uuid {
        let rule_id = Uuid::new_v4();
        let mut state = self.state.lock().unwrap();
        state.rules.push(AvailabilityRule {
            id: rule_id,
            provider_id,
            day_of_week,
            start_time,
            end_time,
            is_active: Some(true),
            created_at: Utc::now(),
        });
        rule_id
    }

    /// Raw insert bypassing the claim, for seeding occupancy in any status.
    pub fn push_appointment(
        &self,
        patient_id: Uuid,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        status: AppointmentStatus,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        state.appointments.push(Appointment {
            id,
            patient_id,
            provider_id,
            appointment_date: date,
            start_time,
            end_time,
            status,
            notes: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn appointment_count(&self) -> usize {
        self.state.lock().unwrap().appointments.len()
    }
}

fn slot_taken(appointments: &[Appointment], provider_id: Uuid, date: NaiveDate, start: NaiveTime) -> bool {
    appointments.iter().any(|apt| {
        apt.provider_id == provider_id
            && apt.appointment_date == date
            && apt.start_time == start
            && apt.status != AppointmentStatus::Cancelled
    })
}

#[async_trait]
impl SchedulingStore for MemoryStore {
    async fn rules_for_day(
        &self,
        provider_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityRule>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut rules: Vec<AvailabilityRule> = state.rules.iter()
            .filter(|r| r.provider_id == provider_id && r.day_of_week == day_of_week && r.enabled())
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.start_time);
        Ok(rules)
    }

    async fn rules_for_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<AvailabilityRule>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut rules: Vec<AvailabilityRule> = state.rules.iter()
            .filter(|r| r.provider_id == provider_id && r.enabled())
            .cloned()
            .collect();
        rules.sort_by_key(|r| (r.day_of_week, r.start_time));
        Ok(rules)
    }

    async fn insert_rule(
        &self,
        request: CreateAvailabilityRuleRequest,
    ) -> Result<AvailabilityRule, StoreError> {
        let rule = AvailabilityRule {
            id: Uuid::new_v4(),
            provider_id: request.provider_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            is_active: Some(true),
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().rules.push(rule.clone());
        Ok(rule)
    }

    async fn deactivate_rule(&self, rule_id: Uuid) -> Result<AvailabilityRule, StoreError> {
        let mut state = self.state.lock().unwrap();
        let rule = state.rules.iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or(StoreError::NotFound)?;
        rule.is_active = Some(false);
        Ok(rule.clone())
    }

    async fn appointments_for_day(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut appointments: Vec<Appointment> = state.appointments.iter()
            .filter(|apt| {
                apt.provider_id == provider_id
                    && apt.appointment_date == date
                    && apt.status != AppointmentStatus::Cancelled
            })
            .cloned()
            .collect();
        appointments.sort_by_key(|apt| apt.start_time);
        Ok(appointments)
    }

    async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut appointments: Vec<Appointment> = state.appointments.iter()
            .filter(|apt| {
                query.patient_id.map_or(true, |id| apt.patient_id == id)
                    && query.provider_id.map_or(true, |id| apt.provider_id == id)
                    && query.date.map_or(true, |d| apt.appointment_date == d)
                    && query.status.map_or(true, |s| apt.status == s)
            })
            .cloned()
            .collect();
        appointments.sort_by_key(|apt| (apt.appointment_date, apt.start_time));

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let mut appointments: Vec<Appointment> = appointments.into_iter().skip(offset).collect();
        if let Some(limit) = query.limit {
            appointments.truncate(limit.max(0) as usize);
        }
        Ok(appointments)
    }

    async fn most_recent_provider(&self, patient_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.appointments.iter()
            .filter(|apt| apt.patient_id == patient_id)
            .max_by_key(|apt| (apt.appointment_date, apt.start_time))
            .map(|apt| apt.provider_id))
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.appointments.iter().find(|apt| apt.id == appointment_id).cloned())
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut state = self.state.lock().unwrap();

        if slot_taken(&state.appointments, new.provider_id, new.appointment_date, new.start_time) {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            provider_id: new.provider_id,
            appointment_date: new.appointment_date,
            start_time: new.start_time,
            end_time: new.end_time,
            status: AppointmentStatus::Pending,
            notes: new.notes,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        state.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        cancellation_reason: Option<String>,
    ) -> Result<Appointment, StoreError> {
        let mut state = self.state.lock().unwrap();
        let appointment = state.appointments.iter_mut()
            .find(|apt| apt.id == appointment_id)
            .ok_or(StoreError::NotFound)?;
        appointment.status = status;
        if let Some(reason) = cancellation_reason {
            appointment.cancellation_reason = Some(reason);
        }
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }
}

#[async_trait]
impl ProviderDirectory for MemoryStore {
    async fn fetch_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.providers.iter().find(|p| p.id == provider_id).cloned())
    }
}
