use accrual_domain::{Event, EventName, EventState, Meta};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::error::StoreError;

/// Postgres `SQLSTATE` for `lock_not_available`, raised by `FOR UPDATE NOWAIT`
/// when the row is already locked by another transaction.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// The six transactional operations the accrual adapter's daemons perform
/// against the durable event table.
#[async_trait::async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert-or-ignore a `new`/`order_created` row. Idempotent on `uuid`.
    async fn save_order_created(&self, event: &Event) -> Result<(), StoreError>;

    /// Atomically reserve the oldest `new`/`order_created` row under a
    /// skip-locked lock, transitioning it to `processing`. `Ok(None)` when
    /// no eligible row exists.
    async fn reserve_order_created(&self) -> Result<Option<Event>, StoreError>;

    /// Transition an `order_created` row to `failed` and birth a companion
    /// `accrual_failed` row, atomically.
    async fn set_failed(&self, event: &Event) -> Result<(), StoreError>;

    /// Transition an `order_created` row to `finished` and birth a companion
    /// `accrual_started` row, atomically.
    async fn set_finished(&self, event: &Event) -> Result<(), StoreError>;

    /// Insert-or-ignore a `new` row of one of the accrual-kind names.
    async fn create_accrual_event(&self, uuid: &str, name: EventName, meta: &Meta) -> Result<(), StoreError>;

    /// Atomically reserve one `new` outbox-kind row under a `NOWAIT` lock,
    /// transitioning it to `processing`. `Ok(None)` both when no row exists
    /// and when every eligible row is already locked.
    async fn first_outbox_event(&self) -> Result<Option<Event>, StoreError>;

    /// Unconditional state update by uuid.
    async fn set_state(&self, uuid: &str, state: EventState) -> Result<(), StoreError>;
}

/// `EventRepository` backed by a Postgres connection pool.
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn update_state_tx(
        tx: &mut Transaction<'_, Postgres>,
        uuid: &str,
        state: EventState,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE events SET state = $1 WHERE uuid = $2")
            .bind(state.as_str())
            .bind(uuid)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn insert_new_tx(
        tx: &mut Transaction<'_, Postgres>,
        uuid: &str,
        name: EventName,
        meta: &Meta,
    ) -> Result<(), StoreError> {
        let message = serde_json::to_value(meta)?;
        sqlx::query(
            "INSERT INTO events(uuid, state, name, message) VALUES ($1, $2, $3, $4)
             ON CONFLICT (uuid) DO NOTHING",
        )
        .bind(uuid)
        .bind(EventState::New.as_str())
        .bind(name.as_str())
        .bind(message)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    fn row_to_event(row: &sqlx::postgres::PgRow) -> Result<Event, StoreError> {
        let uuid: String = row.try_get("uuid")?;
        let name_str: String = row.try_get("name")?;
        let state_str: String = row.try_get("state")?;
        let message: serde_json::Value = row.try_get("message")?;
        let created_at = row
            .try_get("created_at")
            .unwrap_or_else(|_: sqlx::Error| chrono::Utc::now());

        let name = EventName::parse(&name_str)
            .ok_or_else(|| StoreError::UnknownVariant(name_str.clone()))?;
        let state = EventState::parse(&state_str)
            .ok_or_else(|| StoreError::UnknownVariant(state_str.clone()))?;
        let meta: Meta = serde_json::from_value(message)?;

        Ok(Event {
            uuid,
            name,
            state,
            meta,
            created_at,
        })
    }

    /// `true` if `err` is the `lock_not_available` error `NOWAIT` raises on contention.
    fn is_lock_not_available(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE))
    }
}

#[async_trait::async_trait]
impl EventRepository for PgEventRepository {
    async fn save_order_created(&self, event: &Event) -> Result<(), StoreError> {
        let message = serde_json::to_value(&event.meta)?;
        sqlx::query(
            "INSERT INTO events(uuid, state, name, message) VALUES ($1, $2, $3, $4)
             ON CONFLICT (uuid) DO NOTHING",
        )
        .bind(&event.uuid)
        .bind(EventState::New.as_str())
        .bind(EventName::OrderCreated.as_str())
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reserve_order_created(&self) -> Result<Option<Event>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT uuid, state, name, message FROM events
             WHERE name = $1 AND state = $2
             ORDER BY created_at ASC
             FOR UPDATE SKIP LOCKED
             LIMIT 1",
        )
        .bind(EventName::OrderCreated.as_str())
        .bind(EventState::New.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut event = Self::row_to_event(&row)?;
        Self::update_state_tx(&mut tx, &event.uuid, EventState::Processing).await?;
        tx.commit().await?;

        event.state = EventState::Processing;
        Ok(Some(event))
    }

    async fn set_failed(&self, event: &Event) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::update_state_tx(&mut tx, &event.uuid, EventState::Failed).await?;
        Self::insert_new_tx(&mut tx, &uuid_v4(), EventName::AccrualFailed, &event.meta).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_finished(&self, event: &Event) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::update_state_tx(&mut tx, &event.uuid, EventState::Finished).await?;
        Self::insert_new_tx(&mut tx, &uuid_v4(), EventName::AccrualStarted, &event.meta).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_accrual_event(&self, uuid: &str, name: EventName, meta: &Meta) -> Result<(), StoreError> {
        let message = serde_json::to_value(meta)?;
        sqlx::query(
            "INSERT INTO events(uuid, state, name, message) VALUES ($1, $2, $3, $4)
             ON CONFLICT (uuid) DO NOTHING",
        )
        .bind(uuid)
        .bind(EventState::New.as_str())
        .bind(name.as_str())
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn first_outbox_event(&self) -> Result<Option<Event>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let outbox_names: Vec<&str> = EventName::OUTBOX_KINDS.iter().map(|n| n.as_str()).collect();

        let row = match sqlx::query(
            "SELECT uuid, name, message FROM events
             WHERE name = ANY($1) AND state = $2
             FOR UPDATE NOWAIT
             LIMIT 1",
        )
        .bind(&outbox_names)
        .bind(EventState::New.as_str())
        .fetch_optional(&mut *tx)
        .await
        {
            Ok(row) => row,
            Err(err) if Self::is_lock_not_available(&err) => {
                tx.rollback().await?;
                metrics::counter!("store.outbox_lock_contention_total").increment(1);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let uuid: String = row.try_get("uuid")?;
        let name_str: String = row.try_get("name")?;
        let message: serde_json::Value = row.try_get("message")?;
        let name = EventName::parse(&name_str).ok_or_else(|| StoreError::UnknownVariant(name_str.clone()))?;
        let meta: Meta = serde_json::from_value(message)?;

        Self::update_state_tx(&mut tx, &uuid, EventState::Processing).await?;
        tx.commit().await?;

        Ok(Some(Event {
            uuid,
            name,
            state: EventState::Processing,
            meta,
            created_at: chrono::Utc::now(),
        }))
    }

    async fn set_state(&self, uuid: &str, state: EventState) -> Result<(), StoreError> {
        sqlx::query("UPDATE events SET state = $1 WHERE uuid = $2")
            .bind(state.as_str())
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn uuid_v4() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn lock_not_available_detection_ignores_other_codes() {
        // sqlx::Error doesn't construct easily outside a live connection;
        // this exercises the non-database branch of the matcher.
        let err = sqlx::Error::RowNotFound;
        assert!(!PgEventRepository::is_lock_not_available(&err));
    }
}
