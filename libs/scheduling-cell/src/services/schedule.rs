// libs/scheduling-cell/src/services/schedule.rs
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::debug;
use uuid::Uuid;

use crate::models::{AvailabilityRule, CreateAvailabilityRuleRequest};
use crate::store::SchedulingStore;

/// Weekly availability rule management for providers. Rules are tombstoned
/// via the active flag, never hard-deleted, so past appointments keep their
/// slot provenance.
pub struct ScheduleService {
    store: Arc<dyn SchedulingStore>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    pub async fn create_rule(
        &self,
        request: CreateAvailabilityRuleRequest,
    ) -> Result<AvailabilityRule> {
        if request.start_time >= request.end_time {
            return Err(anyhow!("Start time must be before end time"));
        }

        if request.day_of_week < 0 || request.day_of_week > 6 {
            return Err(anyhow!("Day of week must be between 0 (Sunday) and 6 (Saturday)"));
        }

        let rule = self.store.insert_rule(request).await?;
        debug!("Availability rule created with ID: {}", rule.id);

        Ok(rule)
    }

    /// Active rules for a provider, ordered by day then start time.
    pub async fn provider_rules(&self, provider_id: Uuid) -> Result<Vec<AvailabilityRule>> {
        debug!("Fetching availability rules for provider: {}", provider_id);
        let rules = self.store.rules_for_provider(provider_id).await?;
        Ok(rules)
    }

    pub async fn deactivate_rule(&self, rule_id: Uuid) -> Result<AvailabilityRule> {
        debug!("Deactivating availability rule: {}", rule_id);
        let rule = self.store.deactivate_rule(rule_id).await?;
        Ok(rule)
    }
}
