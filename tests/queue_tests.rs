//! End-to-end queue scenarios against the in-memory store.

mod common;

use common::{engine, manual_clock, payload, seeded_store};
use turnoflow::error::Error;
use turnoflow::models::TurnState;
use turnoflow::repository::Store;

// ===== Admission =====

#[tokio::test]
async fn admission_fills_the_bays_then_queues() {
    let (store, shop) = seeded_store(2).await;
    let engine = engine(store, manual_clock());

    let t1 = engine.create(shop.id, payload("ABC123")).await.unwrap();
    let t2 = engine.create(shop.id, payload("DEF456")).await.unwrap();
    assert_eq!(t1.state, TurnState::InService);
    assert_eq!(t2.state, TurnState::InService);

    let status = engine.status(shop.id).await.unwrap();
    assert_eq!(
        status
            .in_service
            .iter()
            .map(|s| s.turn_number)
            .collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(status.waiting.is_empty());

    // Third arrival with both bays taken waits.
    let t3 = engine.create(shop.id, payload("GHI789")).await.unwrap();
    assert_eq!(t3.state, TurnState::Waiting);
    let status = engine.status(shop.id).await.unwrap();
    assert_eq!(
        status
            .waiting
            .iter()
            .map(|s| s.turn_number)
            .collect::<Vec<_>>(),
        vec![3]
    );
}

// ===== Promotion =====

#[tokio::test]
async fn finalize_frees_a_bay_and_promotes() {
    let (store, shop) = seeded_store(2).await;
    let clock = manual_clock();
    let engine = engine(store.clone(), clock.clone());

    let t1 = engine.create(shop.id, payload("ABC123")).await.unwrap();
    engine.create(shop.id, payload("DEF456")).await.unwrap();
    clock.advance(chrono::Duration::minutes(1));
    let t3 = engine.create(shop.id, payload("GHI789")).await.unwrap();

    engine.finalize(t1.id).await.unwrap();

    let status = engine.status(shop.id).await.unwrap();
    let in_service: Vec<i32> = status.in_service.iter().map(|s| s.turn_number).collect();
    assert_eq!(in_service, vec![2, 3]);
    assert!(status.waiting.is_empty());

    let promoted = store
        .list_non_terminal(shop.id)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.id == t3.id)
        .unwrap();
    assert_eq!(promoted.state, TurnState::InService);
    assert!(promoted.started_at.is_some());
}

// ===== Duplicate plates =====

#[tokio::test]
async fn duplicate_plate_is_rejected_until_the_turn_closes() {
    let (store, shop) = seeded_store(2).await;
    let engine = engine(store, manual_clock());

    let t1 = engine.create(shop.id, payload("ABC123")).await.unwrap();
    assert_eq!(t1.turn_number, 1);

    let err = engine.create(shop.id, payload("ABC123")).await.unwrap_err();
    match err {
        Error::DuplicatePlate { turn_number } => assert_eq!(turn_number, 1),
        other => panic!("expected DuplicatePlate, got {other:?}"),
    }

    engine.cancel(t1.id, "ABC123").await.unwrap();

    // Re-admission works and the number moves forward, never back.
    let t2 = engine.create(shop.id, payload("ABC123")).await.unwrap();
    assert_eq!(t2.turn_number, 2);
}

// ===== Cancellation =====

#[tokio::test]
async fn cancelling_a_waiter_leaves_service_untouched() {
    let (store, shop) = seeded_store(1).await;
    let engine = engine(store, manual_clock());

    let t1 = engine.create(shop.id, payload("AAA111")).await.unwrap();
    let t2 = engine.create(shop.id, payload("BBB222")).await.unwrap();

    engine.cancel(t2.id, "BBB222").await.unwrap();

    let status = engine.status(shop.id).await.unwrap();
    assert_eq!(status.in_service[0].turn_number, t1.turn_number);
    assert!(status.waiting.is_empty());
}

#[tokio::test]
async fn cancelling_in_service_promotes_the_waiter() {
    let (store, shop) = seeded_store(1).await;
    let engine = engine(store.clone(), manual_clock());

    let t1 = engine.create(shop.id, payload("AAA111")).await.unwrap();
    let t2 = engine.create(shop.id, payload("BBB222")).await.unwrap();

    engine.cancel(t1.id, "AAA111").await.unwrap();

    let status = engine.status(shop.id).await.unwrap();
    assert_eq!(status.in_service[0].turn_number, t2.turn_number);
    assert!(status.waiting.is_empty());

    let promoted = store
        .list_non_terminal(shop.id)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.id == t2.id)
        .unwrap();
    assert!(promoted.started_at.is_some());
}

#[tokio::test]
async fn finalize_rejects_a_waiting_turn() {
    let (store, shop) = seeded_store(1).await;
    let engine = engine(store, manual_clock());

    engine.create(shop.id, payload("AAA111")).await.unwrap();
    let waiting = engine.create(shop.id, payload("BBB222")).await.unwrap();

    let err = engine.finalize(waiting.id).await.unwrap_err();
    assert!(matches!(err, Error::StateConflict { state: "WAITING" }));
}

// ===== Invariant properties =====

#[tokio::test]
async fn turn_numbers_form_a_prefix_of_the_positive_integers() {
    let (store, shop) = seeded_store(2).await;
    let engine = engine(store.clone(), manual_clock());

    let plates = ["AA111A", "BB222B", "CC333C", "DD444D", "EE555E"];
    let mut ids = Vec::new();
    for plate in plates {
        ids.push(engine.create(shop.id, payload(plate)).await.unwrap());
    }
    engine.finalize(ids[0].id).await.unwrap();
    engine.cancel(ids[2].id, plates[2]).await.unwrap();
    engine.create(shop.id, payload("FF666F")).await.unwrap();

    let mut numbers: Vec<i32> = store
        .list_by_plate_substring(shop.id, "")
        .await
        .unwrap()
        .iter()
        .map(|t| t.turn_number)
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=6).collect::<Vec<i32>>());
}

#[tokio::test]
async fn no_waiter_exists_while_a_bay_is_free() {
    let (store, shop) = seeded_store(3).await;
    let engine = engine(store.clone(), manual_clock());

    let mut ids = Vec::new();
    for plate in ["AA111A", "BB222B", "CC333C", "DD444D", "EE555E"] {
        ids.push(engine.create(shop.id, payload(plate)).await.unwrap().id);
    }
    for id in &ids[..3] {
        engine.finalize(*id).await.unwrap();
    }

    let turns = store.list_non_terminal(shop.id).await.unwrap();
    let in_service = turns
        .iter()
        .filter(|t| t.state == TurnState::InService)
        .count() as i32;
    let waiting = turns
        .iter()
        .filter(|t| t.state == TurnState::Waiting)
        .count();

    assert!(in_service <= shop.capacity);
    if in_service < shop.capacity {
        assert_eq!(waiting, 0);
    }
}

#[tokio::test]
async fn status_reads_are_idempotent() {
    let (store, shop) = seeded_store(2).await;
    let engine = engine(store, manual_clock());

    for plate in ["AA111A", "BB222B", "CC333C"] {
        engine.create(shop.id, payload(plate)).await.unwrap();
    }

    let first = engine.status(shop.id).await.unwrap();
    let second = engine.status(shop.id).await.unwrap();

    let key = |s: &turnoflow::services::queue::WorkshopStatus| {
        (
            s.name.clone(),
            s.capacity,
            s.in_service
                .iter()
                .map(|t| t.turn_number)
                .collect::<Vec<_>>(),
            s.waiting.iter().map(|t| t.turn_number).collect::<Vec<_>>(),
        )
    };
    assert_eq!(key(&first), key(&second));
}

#[tokio::test]
async fn workshops_do_not_interfere() {
    let store = std::sync::Arc::new(turnoflow::repository::MemStore::new());
    let mut shop_a = turnoflow::models::Workshop::new("Taller A");
    shop_a.capacity = 1;
    let mut shop_b = turnoflow::models::Workshop::new("Taller B");
    shop_b.capacity = 1;
    store.insert_workshop(&shop_a).await.unwrap();
    store.insert_workshop(&shop_b).await.unwrap();

    let engine = engine(store, manual_clock());

    // Interleave operations across the two workshops.
    let a1 = engine.create(shop_a.id, payload("AAA111")).await.unwrap();
    let b1 = engine.create(shop_b.id, payload("AAA111")).await.unwrap();
    let _a2 = engine.create(shop_a.id, payload("BBB222")).await.unwrap();
    engine.finalize(b1.id).await.unwrap();
    engine.finalize(a1.id).await.unwrap();
    let b2 = engine.create(shop_b.id, payload("BBB222")).await.unwrap();

    // Each workshop numbers independently and ends in its own state.
    assert_eq!(a1.turn_number, 1);
    assert_eq!(b1.turn_number, 1);
    assert_eq!(b2.turn_number, 2);

    let status_a = engine.status(shop_a.id).await.unwrap();
    assert_eq!(status_a.in_service[0].turn_number, 2);
    assert!(status_a.waiting.is_empty());

    let status_b = engine.status(shop_b.id).await.unwrap();
    assert_eq!(status_b.in_service[0].turn_number, 2);
    assert!(status_b.waiting.is_empty());
}

#[tokio::test]
async fn deleting_a_workshop_cascades_to_its_turns() {
    let (store, shop) = seeded_store(2).await;
    let engine = engine(store.clone(), manual_clock());
    engine.create(shop.id, payload("AAA111")).await.unwrap();

    store.delete_workshop(shop.id).await.unwrap();

    assert!(store.get_workshop(shop.id).await.unwrap().is_none());
    assert!(store.list_by_plate_substring(shop.id, "").await.unwrap().is_empty());
    let err = engine.status(shop.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound("workshop")));
}
