use std::sync::Arc;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Weekday};
use uuid::Uuid;

use scheduling_cell::models::{AppointmentStatus, Provider, SLOT_DURATION_MINUTES};
use scheduling_cell::services::availability::day_of_week;
use scheduling_cell::services::{AvailabilityService, ConflictService};
use scheduling_cell::store::{MemoryStore, SchedulingStore};

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn next_monday() -> NaiveDate {
    let mut date = Local::now().date_naive() + Duration::days(1);
    while date.weekday() != Weekday::Mon {
        date += Duration::days(1);
    }
    date
}

fn active_provider(provider_id: Uuid) -> Provider {
    Provider { id: provider_id, is_active: Some(true) }
}

fn setup() -> (Arc<MemoryStore>, AvailabilityService, ConflictService, Uuid, NaiveDate) {
    let store = Arc::new(MemoryStore::new());
    let provider_id = Uuid::new_v4();
    store.add_provider(provider_id, true);

    let availability = AvailabilityService::new(store.clone() as Arc<dyn SchedulingStore>);
    let conflict = ConflictService::new(store.clone() as Arc<dyn SchedulingStore>);
    (store, availability, conflict, provider_id, next_monday())
}

#[tokio::test]
async fn test_two_hour_window_yields_four_slots() {
    let (store, availability, _, provider_id, date) = setup();
    store.add_rule(provider_id, 1, time(9, 0), time(11, 0));

    let slots = availability
        .enumerate_slots(&active_provider(provider_id), date)
        .await
        .unwrap();

    let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start_time).collect();
    assert_eq!(starts, vec![time(9, 0), time(9, 30), time(10, 0), time(10, 30)]);
}

#[tokio::test]
async fn test_inactive_provider_has_no_slots() {
    let (store, availability, _, provider_id, date) = setup();
    store.add_rule(provider_id, 1, time(9, 0), time(11, 0));

    let inactive = Provider { id: provider_id, is_active: Some(false) };
    let slots = availability.enumerate_slots(&inactive, date).await.unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_past_date_has_no_slots() {
    let (store, availability, _, provider_id, _) = setup();
    let yesterday = Local::now().date_naive() - Duration::days(1);
    store.add_rule(provider_id, day_of_week(yesterday), time(9, 0), time(11, 0));

    let slots = availability
        .enumerate_slots(&active_provider(provider_id), yesterday)
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_day_without_rules_has_no_slots() {
    let (store, availability, _, provider_id, date) = setup();
    // Rule on Tuesday, query for Monday
    store.add_rule(provider_id, 2, time(9, 0), time(11, 0));

    let slots = availability
        .enumerate_slots(&active_provider(provider_id), date)
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_enumeration_is_idempotent() {
    let (store, availability, _, provider_id, date) = setup();
    store.add_rule(provider_id, 1, time(9, 0), time(12, 0));
    store.add_rule(provider_id, 1, time(14, 0), time(16, 0));

    let provider = active_provider(provider_id);
    let first = availability.enumerate_slots(&provider, date).await.unwrap();
    let second = availability.enumerate_slots(&provider, date).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_multiple_rules_concatenate_in_start_order() {
    let (store, availability, _, provider_id, date) = setup();
    store.add_rule(provider_id, 1, time(14, 0), time(15, 0));
    store.add_rule(provider_id, 1, time(9, 0), time(10, 0));

    let slots = availability
        .enumerate_slots(&active_provider(provider_id), date)
        .await
        .unwrap();

    let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start_time).collect();
    assert_eq!(starts, vec![time(9, 0), time(9, 30), time(14, 0), time(14, 30)]);
}

#[tokio::test]
async fn test_every_candidate_spans_the_duration_policy() {
    let (store, availability, _, provider_id, date) = setup();
    store.add_rule(provider_id, 1, time(8, 0), time(12, 30));

    let slots = availability
        .enumerate_slots(&active_provider(provider_id), date)
        .await
        .unwrap();

    assert!(!slots.is_empty());
    for slot in slots {
        assert_eq!(slot.date, date);
        assert_eq!(slot.end_time - slot.start_time, Duration::minutes(SLOT_DURATION_MINUTES));
    }
}

#[tokio::test]
async fn test_deactivated_rule_contributes_no_slots() {
    let (store, availability, _, provider_id, date) = setup();
    let rule_id = store.add_rule(provider_id, 1, time(9, 0), time(11, 0));
    store.deactivate_rule(rule_id).await.unwrap();

    let slots = availability
        .enumerate_slots(&active_provider(provider_id), date)
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_filter_removes_occupied_starts() {
    let (store, availability, conflict, provider_id, date) = setup();
    store.add_rule(provider_id, 1, time(9, 0), time(11, 0));
    store.push_appointment(
        Uuid::new_v4(), provider_id, date,
        time(9, 0), time(9, 30), AppointmentStatus::Pending,
    );

    let candidates = availability
        .enumerate_slots(&active_provider(provider_id), date)
        .await
        .unwrap();
    let open = conflict
        .filter_available(provider_id, date, candidates)
        .await
        .unwrap();

    let starts: Vec<NaiveTime> = open.iter().map(|s| s.start_time).collect();
    assert_eq!(starts, vec![time(9, 30), time(10, 0), time(10, 30)]);
}

#[tokio::test]
async fn test_cancelled_appointment_frees_its_slot() {
    let (store, availability, conflict, provider_id, date) = setup();
    store.add_rule(provider_id, 1, time(9, 0), time(11, 0));
    store.push_appointment(
        Uuid::new_v4(), provider_id, date,
        time(9, 0), time(9, 30), AppointmentStatus::Cancelled,
    );
    store.push_appointment(
        Uuid::new_v4(), provider_id, date,
        time(9, 30), time(10, 0), AppointmentStatus::Confirmed,
    );

    let candidates = availability
        .enumerate_slots(&active_provider(provider_id), date)
        .await
        .unwrap();
    let open = conflict
        .filter_available(provider_id, date, candidates)
        .await
        .unwrap();

    let starts: Vec<NaiveTime> = open.iter().map(|s| s.start_time).collect();
    assert_eq!(starts, vec![time(9, 0), time(10, 0), time(10, 30)]);
}
