//! Shared fixtures for the integration suites.
#![allow(dead_code)] // each suite uses its own subset

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use turnoflow::config::Config;
use turnoflow::models::Workshop;
use turnoflow::repository::{MemStore, Store};
use turnoflow::services::clock::ManualClock;
use turnoflow::services::notifier::Notifier;
use turnoflow::services::queue::{NewTurn, QueueEngine};

pub const ADMIN_TOKEN: &str = "taller-admin-token";

pub fn test_config() -> Config {
    Config {
        database_url: "unused-in-tests".into(),
        port: 0,
        worker_threads: None,
        request_deadline_ms: 5_000,
        admin_token: ADMIN_TOKEN.into(),
        notifier_queue_size: 64,
    }
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::starting_at(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
    ))
}

pub async fn seeded_store(capacity: i32) -> (Arc<MemStore>, Workshop) {
    let store = Arc::new(MemStore::new());
    let mut shop = Workshop::new("Taller Mendoza");
    shop.capacity = capacity;
    store.insert_workshop(&shop).await.unwrap();
    (store, shop)
}

pub fn engine(store: Arc<MemStore>, clock: Arc<ManualClock>) -> QueueEngine {
    QueueEngine::new(store, clock, Notifier::new(64), Duration::from_secs(5))
}

pub fn payload(plate: &str) -> NewTurn {
    NewTurn {
        customer_name: "Lucia Moran".into(),
        phone: "2615566778".into(),
        vehicle_model: "VW Gol".into(),
        plate: plate.into(),
        problem: Some("ruido en la suspension".into()),
    }
}
