//! Capacity linearizability under concurrent reservation attempts.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use gatelist::error::LedgerError;
use gatelist::ledger::BookingLedger;
use gatelist_core::SubjectId;
use gatelist_store::{MemoryStore, Store};
use gatelist_testing::{FixedClock, published_event, test_context};
use proptest::prelude::*;
use std::sync::Arc;

fn ledger_over(store: MemoryStore) -> (BookingLedger, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::at(Utc::now()));
    let ctx = test_context(store, Arc::clone(&clock));
    (BookingLedger::new(ctx), clock)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_never_oversell() {
    const CAPACITY: u32 = 3;
    const CALLERS: usize = 16;

    let store = MemoryStore::new();
    let (ledger, clock) = ledger_over(store.clone());

    let event = published_event(CAPACITY, clock.now() + Duration::hours(1));
    let event_id = event.id;
    store.insert_event(event).await.unwrap();

    let mut handles = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.create_reservation(SubjectId::new(), event_id).await
        }));
    }

    let mut confirmed = 0u32;
    let mut positions = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if outcome.is_waitlist {
            positions.push(outcome.waitlist_position.unwrap());
        } else {
            confirmed += 1;
        }
    }

    // Exactly CAPACITY confirmed; everyone else waitlisted with distinct,
    // gapless FIFO positions.
    assert_eq!(confirmed, CAPACITY);
    positions.sort_unstable();
    let expected: Vec<u32> = (1..=(CALLERS as u32 - CAPACITY)).collect();
    assert_eq!(positions, expected);

    let event = store.get_event(event_id).await.unwrap().unwrap();
    assert_eq!(event.registered_count, CAPACITY);
    assert_eq!(event.waitlist_count, CALLERS as u32 - CAPACITY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_subject_racing_itself_reserves_once() {
    let store = MemoryStore::new();
    let (ledger, clock) = ledger_over(store.clone());

    let event = published_event(10, clock.now() + Duration::hours(1));
    let event_id = event.id;
    store.insert_event(event).await.unwrap();

    let subject = SubjectId::new();
    let a = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.create_reservation(subject, event_id).await })
    };
    let b = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.create_reservation(subject, event_id).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::AlreadyReserved)))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(duplicates, 1);

    let event = store.get_event(event_id).await.unwrap().unwrap();
    assert_eq!(event.registered_count, 1);
    assert_eq!(event.waitlist_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_seat_race_resolves_to_one_confirmed_one_waitlisted() {
    let store = MemoryStore::new();
    let (ledger, clock) = ledger_over(store.clone());

    let event = published_event(1, clock.now() + Duration::hours(1));
    let event_id = event.id;
    store.insert_event(event).await.unwrap();

    let subject_a = SubjectId::new();
    let subject_b = SubjectId::new();
    let a = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.create_reservation(subject_a, event_id).await })
    };
    let b = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.create_reservation(subject_b, event_id).await })
    };
    let outcome_a = a.await.unwrap().unwrap();
    let outcome_b = b.await.unwrap().unwrap();

    // Exactly one of the racers won the seat.
    assert_ne!(outcome_a.is_waitlist, outcome_b.is_waitlist);
    let (winner, winner_subject, waiter) = if outcome_a.is_waitlist {
        (&outcome_b, subject_b, &outcome_a)
    } else {
        (&outcome_a, subject_a, &outcome_b)
    };
    assert_eq!(waiter.waitlist_position, Some(1));

    // The winner cancels; the waiter is promoted into the seat.
    ledger.cancel_reservation(winner.booking_id, winner_subject).await.unwrap();
    let promoted = ledger.promote_from_waitlist(event_id).await.unwrap();
    assert_eq!(promoted, Some(waiter.booking_id));

    let booking = store.get_booking(waiter.booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, gatelist_core::BookingStatus::Confirmed);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // For any capacity and demand, the counters land exactly on
    // min(capacity, demand) confirmed with the remainder waitlisted.
    #[test]
    fn capacity_invariant_holds_for_any_demand(capacity in 0u32..8, demand in 1usize..24) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let store = MemoryStore::new();
            let (ledger, clock) = ledger_over(store.clone());

            let event = published_event(capacity, clock.now() + Duration::hours(1));
            let event_id = event.id;
            store.insert_event(event).await.unwrap();

            for _ in 0..demand {
                ledger.create_reservation(SubjectId::new(), event_id).await.unwrap();
            }

            let event = store.get_event(event_id).await.unwrap().unwrap();
            let expected_confirmed = capacity.min(demand as u32);
            prop_assert!(event.registered_count <= capacity);
            prop_assert_eq!(event.registered_count, expected_confirmed);
            prop_assert_eq!(event.waitlist_count, demand as u32 - expected_confirmed);
            Ok(())
        })?;
    }
}
