//! Postgres-backed store. Row locks are `SELECT ... FOR UPDATE`; the
//! isolation level stays at the server default (read committed) because the
//! locks, not isolation, carry the correctness argument.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::turn::TurnStamp;
use crate::models::{Turn, TurnState, Workshop};
use crate::repository::store::{Store, StoreTx};

const TURN_COLUMNS: &str = "id, workshop_id, turn_number, customer_name, phone, vehicle_model, \
     plate, problem, state, created_at, started_at, finalized_at, cancelled_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn workshop_from_row(row: &PgRow) -> Workshop {
    Workshop {
        id: row.get("id"),
        name: row.get("name"),
        address: row.get("address"),
        logo: row.get("logo"),
        capacity: row.get("capacity"),
    }
}

fn turn_from_row(row: &PgRow) -> Result<Turn> {
    let state: String = row.get("state");
    let state = state
        .parse::<TurnState>()
        .map_err(|_| Error::Internal(anyhow::anyhow!("unknown turn state in database: {state}")))?;

    Ok(Turn {
        id: row.get("id"),
        workshop_id: row.get("workshop_id"),
        turn_number: row.get("turn_number"),
        customer_name: row.get("customer_name"),
        phone: row.get("phone"),
        vehicle_model: row.get("vehicle_model"),
        plate: row.get("plate"),
        problem: row.get("problem"),
        state,
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        finalized_at: row.get("finalized_at"),
        cancelled_at: row.get("cancelled_at"),
    })
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_workshop(&self, id: Uuid) -> Result<Option<Workshop>> {
        let row = sqlx::query("SELECT id, name, address, logo, capacity FROM workshops WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(workshop_from_row))
    }

    async fn list_workshops(&self) -> Result<Vec<Workshop>> {
        let rows =
            sqlx::query("SELECT id, name, address, logo, capacity FROM workshops ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(workshop_from_row).collect())
    }

    async fn list_non_terminal(&self, workshop_id: Uuid) -> Result<Vec<Turn>> {
        let rows = sqlx::query(&format!(
            "SELECT {TURN_COLUMNS} FROM turns \
             WHERE workshop_id = $1 AND state IN ('WAITING', 'IN_SERVICE') \
             ORDER BY turn_number ASC"
        ))
        .bind(workshop_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(turn_from_row).collect()
    }

    async fn list_by_plate_substring(
        &self,
        workshop_id: Uuid,
        plate_query: &str,
    ) -> Result<Vec<Turn>> {
        let pattern = format!(
            "%{}%",
            plate_query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
        );
        let rows = sqlx::query(&format!(
            "SELECT {TURN_COLUMNS} FROM turns \
             WHERE workshop_id = $1 AND plate ILIKE $2 \
             ORDER BY turn_number ASC"
        ))
        .bind(workshop_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(turn_from_row).collect()
    }

    async fn insert_workshop(&self, workshop: &Workshop) -> Result<()> {
        sqlx::query(
            "INSERT INTO workshops (id, name, address, logo, capacity) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(workshop.id)
        .bind(&workshop.name)
        .bind(&workshop.address)
        .bind(&workshop.logo)
        .bind(workshop.capacity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_capacity(&self, id: Uuid, capacity: i32) -> Result<()> {
        if capacity < 1 {
            return Err(Error::Validation("capacity must be >= 1".into()));
        }
        let result = sqlx::query("UPDATE workshops SET capacity = $2 WHERE id = $1")
            .bind(id)
            .bind(capacity)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("workshop"));
        }
        Ok(())
    }

    async fn delete_workshop(&self, id: Uuid) -> Result<()> {
        // Turns go with the workshop via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM workshops WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("workshop"));
        }
        Ok(())
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_workshop(&mut self, id: Uuid) -> Result<Option<Workshop>> {
        let row = sqlx::query(
            "SELECT id, name, address, logo, capacity FROM workshops WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.as_ref().map(workshop_from_row))
    }

    async fn lock_turn(&mut self, id: Uuid) -> Result<Option<Turn>> {
        let row = sqlx::query(&format!(
            "SELECT {TURN_COLUMNS} FROM turns WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(turn_from_row).transpose()
    }

    async fn get_turn(&mut self, id: Uuid) -> Result<Option<Turn>> {
        let row = sqlx::query(&format!("SELECT {TURN_COLUMNS} FROM turns WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(turn_from_row).transpose()
    }

    async fn max_turn_number(&mut self, workshop_id: Uuid) -> Result<i32> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(turn_number), 0) AS max_number FROM turns WHERE workshop_id = $1",
        )
        .bind(workshop_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.get("max_number"))
    }

    async fn count_in_service(&mut self, workshop_id: Uuid) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS in_service FROM turns \
             WHERE workshop_id = $1 AND state = 'IN_SERVICE'",
        )
        .bind(workshop_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.get("in_service"))
    }

    async fn find_non_terminal_by_plate(
        &mut self,
        workshop_id: Uuid,
        plate: &str,
    ) -> Result<Option<Turn>> {
        let row = sqlx::query(&format!(
            "SELECT {TURN_COLUMNS} FROM turns \
             WHERE workshop_id = $1 AND plate = $2 AND state IN ('WAITING', 'IN_SERVICE')"
        ))
        .bind(workshop_id)
        .bind(plate)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(turn_from_row).transpose()
    }

    async fn oldest_waiting(&mut self, workshop_id: Uuid) -> Result<Option<Turn>> {
        // FOR UPDATE keeps two finalizers from promoting the same waiter.
        let row = sqlx::query(&format!(
            "SELECT {TURN_COLUMNS} FROM turns \
             WHERE workshop_id = $1 AND state = 'WAITING' \
             ORDER BY created_at ASC, turn_number ASC \
             LIMIT 1 FOR UPDATE"
        ))
        .bind(workshop_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(turn_from_row).transpose()
    }

    async fn insert_turn(&mut self, turn: &Turn) -> Result<()> {
        sqlx::query(
            "INSERT INTO turns \
                 (id, workshop_id, turn_number, customer_name, phone, vehicle_model, \
                  plate, problem, state, created_at, started_at, finalized_at, cancelled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(turn.id)
        .bind(turn.workshop_id)
        .bind(turn.turn_number)
        .bind(&turn.customer_name)
        .bind(&turn.phone)
        .bind(&turn.vehicle_model)
        .bind(&turn.plate)
        .bind(&turn.problem)
        .bind(turn.state.as_str())
        .bind(turn.created_at)
        .bind(turn.started_at)
        .bind(turn.finalized_at)
        .bind(turn.cancelled_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_turn_state(
        &mut self,
        id: Uuid,
        state: TurnState,
        stamp: TurnStamp,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let sql = match stamp {
            TurnStamp::Started => "UPDATE turns SET state = $2, started_at = $3 WHERE id = $1",
            TurnStamp::Finalized => "UPDATE turns SET state = $2, finalized_at = $3 WHERE id = $1",
            TurnStamp::Cancelled => "UPDATE turns SET state = $2, cancelled_at = $3 WHERE id = $1",
        };
        let result = sqlx::query(sql)
            .bind(id)
            .bind(state.as_str())
            .bind(at)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("turn"));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
