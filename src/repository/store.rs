//! Storage contract consumed by the queue engine.
//!
//! The engine only ever talks to these two traits. [`Store`] hands out
//! transactions and answers lock-free read queries; [`StoreTx`] exposes the
//! pessimistic locks and filtered lookups the engine's invariants rest on.
//! Dropping a [`StoreTx`] without committing rolls it back, so locks are
//! released on every exit path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::turn::TurnStamp;
use crate::models::{Turn, TurnState, Workshop};

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> Result<()>;

    // Lock-free reads for the status/listing endpoints. These may observe a
    // turn mid-transition; the endpoints are advisory.

    async fn get_workshop(&self, id: Uuid) -> Result<Option<Workshop>>;

    async fn list_workshops(&self) -> Result<Vec<Workshop>>;

    /// Non-terminal turns of one workshop, ordered by turn_number ascending.
    async fn list_non_terminal(&self, workshop_id: Uuid) -> Result<Vec<Turn>>;

    /// All turns (terminal included) whose plate contains the query,
    /// case-insensitive, ordered by turn_number ascending.
    async fn list_by_plate_substring(
        &self,
        workshop_id: Uuid,
        plate_query: &str,
    ) -> Result<Vec<Turn>>;

    // Administrative surface. Workshops are created and destroyed by external
    // admin tooling; these calls back that tooling and the test suites.

    async fn insert_workshop(&self, workshop: &Workshop) -> Result<()>;

    /// Capacity changes never evict turns already in service.
    async fn update_capacity(&self, id: Uuid, capacity: i32) -> Result<()>;

    /// Destroying a workshop cascades to all of its turns.
    async fn delete_workshop(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Pessimistic write lock on the workshop row. This is the
    /// synchronisation root: all mutating commands on one workshop serialise
    /// here.
    async fn lock_workshop(&mut self, id: Uuid) -> Result<Option<Workshop>>;

    /// Pessimistic write lock on a turn row. Only taken after the parent
    /// workshop lock is held.
    async fn lock_turn(&mut self, id: Uuid) -> Result<Option<Turn>>;

    /// Unlocked read, used to discover a turn's workshop before taking the
    /// workshop lock. State must be re-checked after [`lock_turn`].
    async fn get_turn(&mut self, id: Uuid) -> Result<Option<Turn>>;

    /// Highest turn_number ever issued in the workshop, terminal rows
    /// included. Zero for an empty workshop.
    async fn max_turn_number(&mut self, workshop_id: Uuid) -> Result<i32>;

    async fn count_in_service(&mut self, workshop_id: Uuid) -> Result<i64>;

    /// The at-most-one turn with this plate in a non-terminal state.
    async fn find_non_terminal_by_plate(
        &mut self,
        workshop_id: Uuid,
        plate: &str,
    ) -> Result<Option<Turn>>;

    /// Promotion candidate: oldest WAITING turn by created_at, ties broken by
    /// lower turn_number, locked for update.
    async fn oldest_waiting(&mut self, workshop_id: Uuid) -> Result<Option<Turn>>;

    async fn insert_turn(&mut self, turn: &Turn) -> Result<()>;

    /// Transition a turn and stamp the matching timestamp column.
    async fn update_turn_state(
        &mut self,
        id: Uuid,
        state: TurnState,
        stamp: TurnStamp,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
