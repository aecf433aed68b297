use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Weekday};
use uuid::Uuid;

use scheduling_cell::models::{
    AppointmentStatus, AutoBookRequest, BookSlotRequest, SchedulingError,
};
use scheduling_cell::services::availability::day_of_week;
use scheduling_cell::services::BookingService;
use scheduling_cell::store::MemoryStore;

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// First Monday strictly after today, so bookings are never in the past.
fn next_monday() -> NaiveDate {
    let mut date = Local::now().date_naive() + Duration::days(1);
    while date.weekday() != Weekday::Mon {
        date += Duration::days(1);
    }
    date
}

/// Provider with a Monday 09:00-11:00 window: slots 09:00, 09:30, 10:00, 10:30.
fn monday_morning_setup() -> (Arc<MemoryStore>, BookingService, Uuid, NaiveDate) {
    let store = Arc::new(MemoryStore::new());
    let provider_id = Uuid::new_v4();
    store.add_provider(provider_id, true);
    store.add_rule(provider_id, 1, time(9, 0), time(11, 0));

    let service = BookingService::new(store.clone(), store.clone());
    (store, service, provider_id, next_monday())
}

fn manual_request(provider_id: Uuid, date: NaiveDate, start: NaiveTime) -> BookSlotRequest {
    BookSlotRequest {
        patient_id: Uuid::new_v4(),
        provider_id,
        date,
        start_time: start,
        notes: None,
    }
}

fn auto_request(
    provider_id: Option<Uuid>,
    patient_id: Uuid,
    date: NaiveDate,
    preference: &str,
) -> AutoBookRequest {
    AutoBookRequest {
        patient_id,
        provider_id,
        target_date: date,
        preferred_time_of_day: preference.to_string(),
        notes: None,
    }
}

// ==============================================================================
// MANUAL BOOKING
// ==============================================================================

#[tokio::test]
async fn test_book_manual_success() {
    let (_store, service, provider_id, date) = monday_morning_setup();

    let appointment = service
        .book_manual(manual_request(provider_id, date, time(9, 30)))
        .await
        .expect("booking an open slot should succeed");

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.appointment_date, date);
    assert_eq!(appointment.start_time, time(9, 30));
    assert_eq!(appointment.end_time, time(10, 0));
}

#[tokio::test]
async fn test_book_manual_past_date_rejected() {
    let (store, service, provider_id, _) = monday_morning_setup();
    let yesterday = Local::now().date_naive() - Duration::days(1);

    let result = service
        .book_manual(manual_request(provider_id, yesterday, time(9, 0)))
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidDate));
    assert_eq!(store.appointment_count(), 0);
}

#[tokio::test]
async fn test_book_manual_inactive_provider_rejected() {
    let store = Arc::new(MemoryStore::new());
    let provider_id = Uuid::new_v4();
    store.add_provider(provider_id, false);
    store.add_rule(provider_id, 1, time(9, 0), time(11, 0));
    let service = BookingService::new(store.clone(), store.clone());

    let result = service
        .book_manual(manual_request(provider_id, next_monday(), time(9, 0)))
        .await;

    assert_matches!(result, Err(SchedulingError::ProviderUnavailable));
}

#[tokio::test]
async fn test_book_manual_unknown_provider_rejected() {
    let store = Arc::new(MemoryStore::new());
    let service = BookingService::new(store.clone(), store.clone());

    let result = service
        .book_manual(manual_request(Uuid::new_v4(), next_monday(), time(9, 0)))
        .await;

    assert_matches!(result, Err(SchedulingError::ProviderUnavailable));
}

#[tokio::test]
async fn test_book_manual_occupied_slot_rejected() {
    let (store, service, provider_id, date) = monday_morning_setup();
    store.push_appointment(
        Uuid::new_v4(), provider_id, date,
        time(9, 0), time(9, 30), AppointmentStatus::Pending,
    );

    let result = service
        .book_manual(manual_request(provider_id, date, time(9, 0)))
        .await;

    assert_matches!(result, Err(SchedulingError::SlotUnavailable));
}

#[tokio::test]
async fn test_book_manual_start_outside_rules_rejected() {
    let (_store, service, provider_id, date) = monday_morning_setup();

    let result = service
        .book_manual(manual_request(provider_id, date, time(12, 0)))
        .await;

    assert_matches!(result, Err(SchedulingError::SlotUnavailable));
}

#[tokio::test]
async fn test_book_manual_same_slot_twice_fails_second_time() {
    let (store, service, provider_id, date) = monday_morning_setup();

    service
        .book_manual(manual_request(provider_id, date, time(10, 0)))
        .await
        .expect("first booking should succeed");

    let second = service
        .book_manual(manual_request(provider_id, date, time(10, 0)))
        .await;

    assert_matches!(second, Err(SchedulingError::SlotUnavailable));
    assert_eq!(store.appointment_count(), 1);
}

#[tokio::test]
async fn test_concurrent_manual_claims_exactly_one_wins() {
    let (store, service, provider_id, date) = monday_morning_setup();

    let first = service.book_manual(manual_request(provider_id, date, time(9, 0)));
    let second = service.book_manual(manual_request(provider_id, date, time(9, 0)));
    let (first, second) = tokio::join!(first, second);

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one concurrent claim must win");

    let loser = if first.is_ok() { second } else { first };
    assert_matches!(loser, Err(SchedulingError::SlotUnavailable));
    assert_eq!(store.appointment_count(), 1);
}

#[tokio::test]
async fn test_bookings_for_distinct_slots_are_independent() {
    let (store, service, provider_id, date) = monday_morning_setup();

    let first = service.book_manual(manual_request(provider_id, date, time(9, 0)));
    let second = service.book_manual(manual_request(provider_id, date, time(10, 30)));
    let (first, second) = tokio::join!(first, second);

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(store.appointment_count(), 2);
}

// ==============================================================================
// FIRST-FIT BOOKING
// ==============================================================================

#[tokio::test]
async fn test_first_fit_books_seed_time_when_open() {
    let (_store, service, provider_id, date) = monday_morning_setup();

    let appointment = service
        .book_first_fit(auto_request(Some(provider_id), Uuid::new_v4(), date, "morning"))
        .await
        .expect("first-fit should claim a slot");

    // 10:00 is the morning seed and it is open
    assert_eq!(appointment.start_time, time(10, 0));
    assert_eq!(appointment.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn test_first_fit_takes_closest_remaining_slot() {
    let (store, service, provider_id, date) = monday_morning_setup();
    for start in [time(9, 0), time(9, 30), time(10, 0)] {
        store.push_appointment(
            Uuid::new_v4(), provider_id, date,
            start, start + Duration::minutes(30), AppointmentStatus::Confirmed,
        );
    }

    let appointment = service
        .book_first_fit(auto_request(Some(provider_id), Uuid::new_v4(), date, "morning"))
        .await
        .expect("one slot is still open");

    assert_eq!(appointment.start_time, time(10, 30));
}

#[tokio::test]
async fn test_first_fit_fully_booked_day_fails_without_writes() {
    let (store, service, provider_id, date) = monday_morning_setup();
    for start in [time(9, 0), time(9, 30), time(10, 0), time(10, 30)] {
        store.push_appointment(
            Uuid::new_v4(), provider_id, date,
            start, start + Duration::minutes(30), AppointmentStatus::Pending,
        );
    }
    let before = store.appointment_count();

    let result = service
        .book_first_fit(auto_request(Some(provider_id), Uuid::new_v4(), date, "morning"))
        .await;

    assert_matches!(result, Err(SchedulingError::NoSlotAvailable));
    assert_eq!(store.appointment_count(), before);
}

#[tokio::test]
async fn test_first_fit_unknown_bucket_uses_afternoon_seed() {
    let store = Arc::new(MemoryStore::new());
    let provider_id = Uuid::new_v4();
    store.add_provider(provider_id, true);
    let date = next_monday();
    store.add_rule(provider_id, day_of_week(date), time(9, 0), time(16, 0));
    let service = BookingService::new(store.clone(), store.clone());

    let appointment = service
        .book_first_fit(auto_request(Some(provider_id), Uuid::new_v4(), date, "sometime"))
        .await
        .expect("first-fit should claim a slot");

    assert_eq!(appointment.start_time, time(14, 0));
}

#[tokio::test]
async fn test_first_fit_resolves_most_recent_provider() {
    let store = Arc::new(MemoryStore::new());
    let patient_id = Uuid::new_v4();
    let old_provider = Uuid::new_v4();
    let recent_provider = Uuid::new_v4();
    store.add_provider(old_provider, true);
    store.add_provider(recent_provider, true);

    let date = next_monday();
    store.add_rule(recent_provider, day_of_week(date), time(9, 0), time(11, 0));

    let history_base = Local::now().date_naive() - Duration::days(30);
    store.push_appointment(
        patient_id, old_provider, history_base,
        time(9, 0), time(9, 30), AppointmentStatus::Completed,
    );
    store.push_appointment(
        patient_id, recent_provider, history_base + Duration::days(14),
        time(9, 0), time(9, 30), AppointmentStatus::Completed,
    );

    let service = BookingService::new(store.clone(), store.clone());
    let appointment = service
        .book_first_fit(auto_request(None, patient_id, date, "morning"))
        .await
        .expect("provider should resolve from history");

    assert_eq!(appointment.provider_id, recent_provider);
}

#[tokio::test]
async fn test_first_fit_without_history_fails() {
    let store = Arc::new(MemoryStore::new());
    let service = BookingService::new(store.clone(), store.clone());

    let result = service
        .book_first_fit(auto_request(None, Uuid::new_v4(), next_monday(), "morning"))
        .await;

    assert_matches!(result, Err(SchedulingError::NoProviderContext));
}

#[tokio::test]
async fn test_first_fit_past_date_rejected_before_provider_resolution() {
    let store = Arc::new(MemoryStore::new());
    let service = BookingService::new(store.clone(), store.clone());
    let yesterday = Local::now().date_naive() - Duration::days(1);

    let result = service
        .book_first_fit(auto_request(None, Uuid::new_v4(), yesterday, "morning"))
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidDate));
}

// ==============================================================================
// UNIQUENESS INVARIANT
// ==============================================================================

#[tokio::test]
async fn test_no_two_active_appointments_share_a_start_time() {
    let (store, service, provider_id, date) = monday_morning_setup();

    // Saturate the morning through a mix of manual and first-fit bookings.
    let _ = service.book_manual(manual_request(provider_id, date, time(9, 0))).await;
    for _ in 0..6 {
        let _ = service
            .book_first_fit(auto_request(Some(provider_id), Uuid::new_v4(), date, "morning"))
            .await;
    }

    let open = service.open_slots(provider_id, date).await.unwrap();
    assert!(open.is_empty(), "all four slots should be claimed");
    assert_eq!(store.appointment_count(), 4);
}
