//! The appointment queue engine.
//!
//! Owns the turn state machine, the per-workshop numbering, the capacity
//! bound and the promotion rule. Every mutating command runs inside one store
//! transaction with the workshop row lock held, so commands on the same
//! workshop execute as if serial. All I/O goes through [`Store`].

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::turn::{normalize_plate, TurnStamp};
use crate::models::{Turn, TurnState, TurnSummary, Workshop};
use crate::repository::store::{Store, StoreTx};
use crate::services::clock::Clock;
use crate::services::notifier::Notifier;

/// Create payload as it reaches the engine. The HTTP layer has already done
/// shape validation; the engine re-validates only the invariants it owns.
#[derive(Clone, Debug)]
pub struct NewTurn {
    pub customer_name: String,
    pub phone: String,
    pub vehicle_model: String,
    pub plate: String,
    pub problem: Option<String>,
}

#[derive(Clone, Debug)]
pub struct WorkshopStatus {
    pub name: String,
    pub capacity: i32,
    pub in_service: Vec<TurnSummary>,
    pub waiting: Vec<TurnSummary>,
}

pub struct QueueEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    deadline: Duration,
}

impl QueueEngine {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifier: Notifier,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            deadline,
        }
    }

    /// Admit a new turn: straight into service while a bay is free, otherwise
    /// into the waiting queue. Fires the created-turn notification after the
    /// commit, never on rollback.
    pub async fn create(&self, workshop_id: Uuid, payload: NewTurn) -> Result<Turn> {
        let mut tx = self.store.begin().await?;
        let outcome = timeout(
            self.deadline,
            self.create_in_tx(tx.as_mut(), workshop_id, payload),
        )
        .await;
        match outcome {
            Ok(Ok(turn)) => {
                tx.commit().await?;
                self.notifier.turn_created(turn.clone());
                Ok(turn)
            }
            Ok(Err(err)) => {
                roll_back(tx).await;
                Err(err)
            }
            Err(_) => Err(Error::Timeout), // dropping the tx rolls it back
        }
    }

    /// Finish an in-service turn and pull the next waiter into the freed bay.
    pub async fn finalize(&self, turn_id: Uuid) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let outcome = timeout(self.deadline, self.finalize_in_tx(tx.as_mut(), turn_id)).await;
        match outcome {
            Ok(Ok(())) => tx.commit().await,
            Ok(Err(err)) => {
                roll_back(tx).await;
                Err(err)
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Cancel a turn. The presented plate must match the stored one; this is
    /// the anti-abuse check behind the public cancel endpoint.
    pub async fn cancel(&self, turn_id: Uuid, presented_plate: &str) -> Result<Turn> {
        let mut tx = self.store.begin().await?;
        let outcome = timeout(
            self.deadline,
            self.cancel_in_tx(tx.as_mut(), turn_id, presented_plate),
        )
        .await;
        match outcome {
            Ok(Ok(turn)) => {
                tx.commit().await?;
                Ok(turn)
            }
            Ok(Err(err)) => {
                roll_back(tx).await;
                Err(err)
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Cancel the unique active turn holding this plate in the workshop.
    pub async fn cancel_by_plate(&self, workshop_id: Uuid, presented_plate: &str) -> Result<Turn> {
        let mut tx = self.store.begin().await?;
        let outcome = timeout(
            self.deadline,
            self.cancel_by_plate_in_tx(tx.as_mut(), workshop_id, presented_plate),
        )
        .await;
        match outcome {
            Ok(Ok(turn)) => {
                tx.commit().await?;
                Ok(turn)
            }
            Ok(Err(err)) => {
                roll_back(tx).await;
                Err(err)
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Public queue snapshot: non-terminal turns split by state, no locks.
    pub async fn status(&self, workshop_id: Uuid) -> Result<WorkshopStatus> {
        timeout(self.deadline, async {
            let workshop = self
                .store
                .get_workshop(workshop_id)
                .await?
                .ok_or(Error::NotFound("workshop"))?;
            let turns = self.store.list_non_terminal(workshop_id).await?;

            let mut in_service = Vec::new();
            let mut waiting = Vec::new();
            for turn in &turns {
                match turn.state {
                    TurnState::InService => in_service.push(TurnSummary::from(turn)),
                    TurnState::Waiting => waiting.push(TurnSummary::from(turn)),
                    _ => {}
                }
            }

            Ok(WorkshopStatus {
                name: workshop.name,
                capacity: workshop.capacity,
                in_service,
                waiting,
            })
        })
        .await
        .map_err(|_| Error::Timeout)?
    }

    /// Listing for the admin surface. Without a plate query: active turns
    /// only. With one: every matching turn, terminal included, so customers
    /// can be looked up after the fact.
    pub async fn list(&self, workshop_id: Uuid, plate_query: Option<&str>) -> Result<Vec<Turn>> {
        timeout(self.deadline, async {
            self.store
                .get_workshop(workshop_id)
                .await?
                .ok_or(Error::NotFound("workshop"))?;

            match plate_query.map(str::trim).filter(|q| !q.is_empty()) {
                Some(query) => self.store.list_by_plate_substring(workshop_id, query).await,
                None => self.store.list_non_terminal(workshop_id).await,
            }
        })
        .await
        .map_err(|_| Error::Timeout)?
    }

    async fn create_in_tx(
        &self,
        tx: &mut dyn StoreTx,
        workshop_id: Uuid,
        payload: NewTurn,
    ) -> Result<Turn> {
        let workshop = tx
            .lock_workshop(workshop_id)
            .await?
            .ok_or(Error::NotFound("workshop"))?;

        let plate = normalize_plate(&payload.plate);
        if plate.is_empty() {
            return Err(Error::Validation("patente must not be empty".into()));
        }

        if let Some(existing) = tx.find_non_terminal_by_plate(workshop_id, &plate).await? {
            return Err(Error::DuplicatePlate {
                turn_number: existing.turn_number,
            });
        }

        // Terminal rows count too: numbers are never reused.
        let turn_number = tx.max_turn_number(workshop_id).await? + 1;

        let in_service = tx.count_in_service(workshop_id).await?;
        let now = self.clock.now();
        let (state, started_at) = if in_service < i64::from(workshop.capacity) {
            (TurnState::InService, Some(now))
        } else {
            (TurnState::Waiting, None)
        };

        let turn = Turn {
            id: Uuid::new_v4(),
            workshop_id,
            turn_number,
            customer_name: payload.customer_name,
            phone: payload.phone,
            vehicle_model: payload.vehicle_model,
            plate,
            problem: payload.problem,
            state,
            created_at: now,
            started_at,
            finalized_at: None,
            cancelled_at: None,
        };
        tx.insert_turn(&turn).await?;

        tracing::debug!(
            workshop_id = %workshop_id,
            turn_number,
            state = %turn.state,
            "turn admitted"
        );
        Ok(turn)
    }

    async fn finalize_in_tx(&self, tx: &mut dyn StoreTx, turn_id: Uuid) -> Result<()> {
        let probe = tx.get_turn(turn_id).await?.ok_or(Error::NotFound("turn"))?;

        // Workshop lock first, then the turn; state is re-checked under the
        // lock since it may have moved between the probe and here.
        let workshop = tx
            .lock_workshop(probe.workshop_id)
            .await?
            .ok_or(Error::NotFound("workshop"))?;
        let turn = tx.lock_turn(turn_id).await?.ok_or(Error::NotFound("turn"))?;

        if turn.state != TurnState::InService {
            return Err(Error::StateConflict {
                state: turn.state.as_str(),
            });
        }

        tx.update_turn_state(
            turn.id,
            TurnState::Finalized,
            TurnStamp::Finalized,
            self.clock.now(),
        )
        .await?;

        self.promote_next(tx, &workshop).await
    }

    async fn cancel_in_tx(
        &self,
        tx: &mut dyn StoreTx,
        turn_id: Uuid,
        presented_plate: &str,
    ) -> Result<Turn> {
        let probe = tx.get_turn(turn_id).await?.ok_or(Error::NotFound("turn"))?;

        let workshop = tx
            .lock_workshop(probe.workshop_id)
            .await?
            .ok_or(Error::NotFound("workshop"))?;
        let turn = tx.lock_turn(turn_id).await?.ok_or(Error::NotFound("turn"))?;

        if normalize_plate(presented_plate) != turn.plate {
            return Err(Error::Forbidden);
        }

        self.cancel_locked(tx, &workshop, turn).await
    }

    async fn cancel_by_plate_in_tx(
        &self,
        tx: &mut dyn StoreTx,
        workshop_id: Uuid,
        presented_plate: &str,
    ) -> Result<Turn> {
        let workshop = tx
            .lock_workshop(workshop_id)
            .await?
            .ok_or(Error::NotFound("workshop"))?;

        let plate = normalize_plate(presented_plate);
        let found = tx
            .find_non_terminal_by_plate(workshop_id, &plate)
            .await?
            .ok_or(Error::NotFound("turn"))?;
        let turn = tx
            .lock_turn(found.id)
            .await?
            .ok_or(Error::NotFound("turn"))?;

        self.cancel_locked(tx, &workshop, turn).await
    }

    async fn cancel_locked(
        &self,
        tx: &mut dyn StoreTx,
        workshop: &Workshop,
        turn: Turn,
    ) -> Result<Turn> {
        if turn.is_terminal() {
            return Err(Error::StateConflict {
                state: turn.state.as_str(),
            });
        }

        let prior_state = turn.state;
        tx.update_turn_state(
            turn.id,
            TurnState::Cancelled,
            TurnStamp::Cancelled,
            self.clock.now(),
        )
        .await?;

        tracing::info!(
            workshop_id = %workshop.id,
            turn_number = turn.turn_number,
            prior_state = %prior_state,
            "turn cancelled"
        );

        // Only an in-service cancellation frees a bay.
        if prior_state == TurnState::InService {
            self.promote_next(tx, workshop).await?;
        }
        Ok(turn)
    }

    /// Move the oldest waiter into service, at most one per freed slot. Skips
    /// promotion while the in-service count still meets capacity, which is
    /// how a shrunken capacity drains without evictions.
    async fn promote_next(&self, tx: &mut dyn StoreTx, workshop: &Workshop) -> Result<()> {
        let in_service = tx.count_in_service(workshop.id).await?;
        if in_service >= i64::from(workshop.capacity) {
            return Ok(());
        }

        if let Some(waiter) = tx.oldest_waiting(workshop.id).await? {
            tx.update_turn_state(
                waiter.id,
                TurnState::InService,
                TurnStamp::Started,
                self.clock.now(),
            )
            .await?;
            tracing::info!(
                workshop_id = %workshop.id,
                turn_number = waiter.turn_number,
                "promoted waiting turn into service"
            );
        }
        Ok(())
    }
}

async fn roll_back(tx: Box<dyn StoreTx>) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "transaction rollback failed");
    }
}
