// libs/scheduling-cell/src/store/supabase.rs
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, AvailabilityRule,
    CreateAvailabilityRuleRequest, NewAppointment, Provider,
};
use super::{ProviderDirectory, SchedulingStore, StoreError};

impl From<SupabaseError> for StoreError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Conflict(_) => StoreError::Conflict,
            SupabaseError::NotFound(_) => StoreError::NotFound,
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// PostgREST-backed store. Constructed per request with the caller's bearer
/// token so row-level security applies to every query.
pub struct SupabaseStore {
    client: SupabaseClient,
    auth_token: Option<String>,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig, auth_token: Option<String>) -> Self {
        Self {
            client: SupabaseClient::new(config),
            auth_token,
        }
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        headers
    }

    fn parse_appointments(rows: Vec<Value>) -> Result<Vec<Appointment>, StoreError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| StoreError::Unavailable(format!("Failed to parse appointments: {}", e)))
    }

    /// Rules parse leniently: a malformed row is skipped rather than failing
    /// the whole enumeration, which degrades to fewer candidates.
    fn parse_rules(rows: Vec<Value>) -> Vec<AvailabilityRule> {
        rows.into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!("Skipping malformed availability rule: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl SchedulingStore for SupabaseStore {
    async fn rules_for_day(
        &self,
        provider_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityRule>, StoreError> {
        let path = format!(
            "/rest/v1/availability_slots?provider_id=eq.{}&day_of_week=eq.{}&is_active=eq.true&order=start_time.asc",
            provider_id, day_of_week
        );
        let result: Vec<Value> = self.client
            .request(Method::GET, &path, self.token(), None)
            .await?;

        Ok(Self::parse_rules(result))
    }

    async fn rules_for_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<AvailabilityRule>, StoreError> {
        let path = format!(
            "/rest/v1/availability_slots?provider_id=eq.{}&is_active=eq.true&order=day_of_week.asc,start_time.asc",
            provider_id
        );
        let result: Vec<Value> = self.client
            .request(Method::GET, &path, self.token(), None)
            .await?;

        Ok(Self::parse_rules(result))
    }

    async fn insert_rule(
        &self,
        request: CreateAvailabilityRuleRequest,
    ) -> Result<AvailabilityRule, StoreError> {
        let rule_data = json!({
            "provider_id": request.provider_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "is_active": true,
            "created_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self.client.request_with_headers(
            Method::POST,
            "/rest/v1/availability_slots",
            self.token(),
            Some(rule_data),
            Some(Self::representation_headers()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| StoreError::Unavailable("Failed to create availability rule".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| StoreError::Unavailable(format!("Failed to parse created rule: {}", e)))
    }

    async fn deactivate_rule(&self, rule_id: Uuid) -> Result<AvailabilityRule, StoreError> {
        let path = format!("/rest/v1/availability_slots?id=eq.{}", rule_id);
        let update = json!({ "is_active": false });

        let result: Vec<Value> = self.client.request_with_headers(
            Method::PATCH,
            &path,
            self.token(),
            Some(update),
            Some(Self::representation_headers()),
        ).await?;

        let row = result.into_iter().next().ok_or(StoreError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| StoreError::Unavailable(format!("Failed to parse updated rule: {}", e)))
    }

    async fn appointments_for_day(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&appointment_date=eq.{}&status=neq.cancelled&order=start_time.asc",
            provider_id, date
        );
        let result: Vec<Value> = self.client
            .request(Method::GET, &path, self.token(), None)
            .await?;

        Self::parse_appointments(result)
    }

    async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut query_parts = Vec::new();

        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(provider_id) = query.provider_id {
            query_parts.push(format!("provider_id=eq.{}", provider_id));
        }
        if let Some(date) = query.date {
            query_parts.push(format!("appointment_date=eq.{}", date));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }

        let mut path = format!(
            "/rest/v1/appointments?{}&order=appointment_date.asc,start_time.asc",
            query_parts.join("&")
        );

        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let result: Vec<Value> = self.client
            .request(Method::GET, &path, self.token(), None)
            .await?;

        Self::parse_appointments(result)
    }

    async fn most_recent_provider(&self, patient_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=appointment_date.desc,start_time.desc&limit=1",
            patient_id
        );
        let result: Vec<Value> = self.client
            .request(Method::GET, &path, self.token(), None)
            .await?;

        let appointments = Self::parse_appointments(result)?;
        Ok(appointments.first().map(|apt| apt.provider_id))
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.client
            .request(Method::GET, &path, self.token(), None)
            .await?;

        Ok(Self::parse_appointments(result)?.into_iter().next())
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        debug!("Claiming slot {} {} for provider {}",
               new.appointment_date, new.start_time, new.provider_id);

        let now = Utc::now();
        let appointment_data = json!({
            "patient_id": new.patient_id,
            "provider_id": new.provider_id,
            "appointment_date": new.appointment_date,
            "start_time": new.start_time.format("%H:%M:%S").to_string(),
            "end_time": new.end_time.format("%H:%M:%S").to_string(),
            "status": AppointmentStatus::Pending.to_string(),
            "notes": new.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        // The partial unique index over (provider_id, appointment_date,
        // start_time) where status <> 'cancelled' turns a lost race into a
        // 409, which maps to StoreError::Conflict.
        let result: Vec<Value> = self.client.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            self.token(),
            Some(appointment_data),
            Some(Self::representation_headers()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| StoreError::Unavailable("Failed to create appointment".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| StoreError::Unavailable(format!("Failed to parse created appointment: {}", e)))
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        cancellation_reason: Option<String>,
    ) -> Result<Appointment, StoreError> {
        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(status.to_string()));
        if let Some(reason) = cancellation_reason {
            update_data.insert("cancellation_reason".to_string(), json!(reason));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.client.request_with_headers(
            Method::PATCH,
            &path,
            self.token(),
            Some(Value::Object(update_data)),
            Some(Self::representation_headers()),
        ).await?;

        let row = result.into_iter().next().ok_or(StoreError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| StoreError::Unavailable(format!("Failed to parse updated appointment: {}", e)))
    }
}

#[async_trait]
impl ProviderDirectory for SupabaseStore {
    async fn fetch_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, StoreError> {
        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let result: Vec<Value> = self.client
            .request(Method::GET, &path, self.token(), None)
            .await?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| StoreError::Unavailable(format!("Failed to parse provider: {}", e))),
            None => Ok(None),
        }
    }
}
