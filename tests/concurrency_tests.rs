//! Races on a single workshop: every interleaving must preserve the
//! numbering, capacity and plate-uniqueness invariants.

mod common;

use common::{engine, manual_clock, payload, seeded_store};
use std::collections::HashSet;
use std::sync::Arc;
use turnoflow::error::Error;
use turnoflow::models::TurnState;
use turnoflow::repository::Store;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_never_collide_on_numbers() {
    let (store, shop) = seeded_store(3).await;
    let engine = Arc::new(engine(store.clone(), manual_clock()));

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = engine.clone();
        let shop_id = shop.id;
        handles.push(tokio::spawn(async move {
            engine.create(shop_id, payload(&format!("PL{i:03}"))).await
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        let turn = handle.await.unwrap().unwrap();
        assert!(numbers.insert(turn.turn_number), "number reused");
    }
    assert_eq!(numbers.len(), 20);
    assert_eq!(*numbers.iter().max().unwrap(), 20);

    let turns = store.list_non_terminal(shop.id).await.unwrap();
    let in_service = turns
        .iter()
        .filter(|t| t.state == TurnState::InService)
        .count();
    let waiting = turns
        .iter()
        .filter(|t| t.state == TurnState::Waiting)
        .count();
    assert_eq!(in_service, 3);
    assert_eq!(waiting, 17);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn finalizes_racing_creates_keep_the_capacity_bound() {
    let (store, shop) = seeded_store(3).await;
    let engine = Arc::new(engine(store.clone(), manual_clock()));

    let mut seeded = Vec::new();
    for i in 0..3 {
        seeded.push(
            engine
                .create(shop.id, payload(&format!("SEED{i}")))
                .await
                .unwrap(),
        );
    }

    let mut handles = Vec::new();
    for turn in seeded {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.finalize(turn.id).await.map(|_| None)
        }));
    }
    for i in 0..5 {
        let engine = engine.clone();
        let shop_id = shop.id;
        handles.push(tokio::spawn(async move {
            engine
                .create(shop_id, payload(&format!("NEW{i:02}")))
                .await
                .map(Some)
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
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

    assert!(in_service <= 3);
    if in_service < 3 {
        assert_eq!(waiting, 0, "waiter left behind with a free bay");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_cancels_of_one_turn_succeed_exactly_once() {
    let (store, shop) = seeded_store(1).await;
    let engine = Arc::new(engine(store, manual_clock()));
    let turn = engine.create(shop.id, payload("AAA111")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        let id = turn.id;
        handles.push(tokio::spawn(
            async move { engine.cancel(id, "AAA111").await },
        ));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(Error::StateConflict { state: "CANCELLED" }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creates_with_one_plate_admit_exactly_one() {
    let (store, shop) = seeded_store(2).await;
    let engine = Arc::new(engine(store, manual_clock()));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = engine.clone();
        let shop_id = shop.id;
        handles.push(tokio::spawn(async move {
            engine.create(shop_id, payload("UNICA1")).await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(Error::DuplicatePlate { turn_number }) => assert_eq!(turn_number, 1),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(admitted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_finalizes_promote_two_distinct_waiters() {
    let (store, shop) = seeded_store(2).await;
    let engine = Arc::new(engine(store.clone(), manual_clock()));

    let t1 = engine.create(shop.id, payload("AAA111")).await.unwrap();
    let t2 = engine.create(shop.id, payload("BBB222")).await.unwrap();
    engine.create(shop.id, payload("CCC333")).await.unwrap();
    engine.create(shop.id, payload("DDD444")).await.unwrap();

    let (a, b) = tokio::join!(
        {
            let engine = engine.clone();
            async move { engine.finalize(t1.id).await }
        },
        {
            let engine = engine.clone();
            async move { engine.finalize(t2.id).await }
        }
    );
    a.unwrap();
    b.unwrap();

    let turns = store.list_non_terminal(shop.id).await.unwrap();
    let in_service: Vec<i32> = turns
        .iter()
        .filter(|t| t.state == TurnState::InService)
        .map(|t| t.turn_number)
        .collect();
    assert_eq!(in_service, vec![3, 4]);
    assert!(turns.iter().all(|t| t.state != TurnState::Waiting));
}
