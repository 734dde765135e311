//! In-memory store backend.
//!
//! Used by the test suites and for running the service locally without
//! Postgres. A transaction clones the committed state, mutates the clone, and
//! swaps it back on commit; the clone is discarded on rollback or drop. The
//! whole store is serialised behind one async mutex, which is the coarsest
//! legal reading of the locking contract (everything serialises at the
//! workshop lock and then some).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::turn::TurnStamp;
use crate::models::{Turn, TurnState, Workshop};
use crate::repository::store::{Store, StoreTx};

#[derive(Default, Clone)]
struct MemData {
    workshops: HashMap<Uuid, Workshop>,
    turns: HashMap<Uuid, Turn>,
}

#[derive(Default, Clone)]
pub struct MemStore {
    data: Arc<Mutex<MemData>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = self.data.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemTx { guard, working }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get_workshop(&self, id: Uuid) -> Result<Option<Workshop>> {
        Ok(self.data.lock().await.workshops.get(&id).cloned())
    }

    async fn list_workshops(&self) -> Result<Vec<Workshop>> {
        let mut workshops: Vec<Workshop> =
            self.data.lock().await.workshops.values().cloned().collect();
        workshops.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(workshops)
    }

    async fn list_non_terminal(&self, workshop_id: Uuid) -> Result<Vec<Turn>> {
        let mut turns: Vec<Turn> = self
            .data
            .lock()
            .await
            .turns
            .values()
            .filter(|t| t.workshop_id == workshop_id && !t.is_terminal())
            .cloned()
            .collect();
        turns.sort_by_key(|t| t.turn_number);
        Ok(turns)
    }

    async fn list_by_plate_substring(
        &self,
        workshop_id: Uuid,
        plate_query: &str,
    ) -> Result<Vec<Turn>> {
        let needle = plate_query.to_uppercase();
        let mut turns: Vec<Turn> = self
            .data
            .lock()
            .await
            .turns
            .values()
            .filter(|t| t.workshop_id == workshop_id && t.plate.to_uppercase().contains(&needle))
            .cloned()
            .collect();
        turns.sort_by_key(|t| t.turn_number);
        Ok(turns)
    }

    async fn insert_workshop(&self, workshop: &Workshop) -> Result<()> {
        self.data
            .lock()
            .await
            .workshops
            .insert(workshop.id, workshop.clone());
        Ok(())
    }

    async fn update_capacity(&self, id: Uuid, capacity: i32) -> Result<()> {
        if capacity < 1 {
            return Err(Error::Validation("capacity must be >= 1".into()));
        }
        let mut data = self.data.lock().await;
        let workshop = data
            .workshops
            .get_mut(&id)
            .ok_or(Error::NotFound("workshop"))?;
        workshop.capacity = capacity;
        Ok(())
    }

    async fn delete_workshop(&self, id: Uuid) -> Result<()> {
        let mut data = self.data.lock().await;
        data.workshops
            .remove(&id)
            .ok_or(Error::NotFound("workshop"))?;
        data.turns.retain(|_, t| t.workshop_id != id);
        Ok(())
    }
}

struct MemTx {
    guard: OwnedMutexGuard<MemData>,
    working: MemData,
}

#[async_trait]
impl StoreTx for MemTx {
    async fn lock_workshop(&mut self, id: Uuid) -> Result<Option<Workshop>> {
        Ok(self.working.workshops.get(&id).cloned())
    }

    async fn lock_turn(&mut self, id: Uuid) -> Result<Option<Turn>> {
        Ok(self.working.turns.get(&id).cloned())
    }

    async fn get_turn(&mut self, id: Uuid) -> Result<Option<Turn>> {
        Ok(self.working.turns.get(&id).cloned())
    }

    async fn max_turn_number(&mut self, workshop_id: Uuid) -> Result<i32> {
        Ok(self
            .working
            .turns
            .values()
            .filter(|t| t.workshop_id == workshop_id)
            .map(|t| t.turn_number)
            .max()
            .unwrap_or(0))
    }

    async fn count_in_service(&mut self, workshop_id: Uuid) -> Result<i64> {
        Ok(self
            .working
            .turns
            .values()
            .filter(|t| t.workshop_id == workshop_id && t.state == TurnState::InService)
            .count() as i64)
    }

    async fn find_non_terminal_by_plate(
        &mut self,
        workshop_id: Uuid,
        plate: &str,
    ) -> Result<Option<Turn>> {
        Ok(self
            .working
            .turns
            .values()
            .find(|t| t.workshop_id == workshop_id && t.plate == plate && !t.is_terminal())
            .cloned())
    }

    async fn oldest_waiting(&mut self, workshop_id: Uuid) -> Result<Option<Turn>> {
        Ok(self
            .working
            .turns
            .values()
            .filter(|t| t.workshop_id == workshop_id && t.state == TurnState::Waiting)
            .min_by_key(|t| (t.created_at, t.turn_number))
            .cloned())
    }

    async fn insert_turn(&mut self, turn: &Turn) -> Result<()> {
        self.working.turns.insert(turn.id, turn.clone());
        Ok(())
    }

    async fn update_turn_state(
        &mut self,
        id: Uuid,
        state: TurnState,
        stamp: TurnStamp,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let turn = self.working.turns.get_mut(&id).ok_or(Error::NotFound("turn"))?;
        turn.state = state;
        match stamp {
            TurnStamp::Started => turn.started_at = Some(at),
            TurnStamp::Finalized => turn.finalized_at = Some(at),
            TurnStamp::Cancelled => turn.cancelled_at = Some(at),
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut guard = self.guard;
        *guard = self.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
