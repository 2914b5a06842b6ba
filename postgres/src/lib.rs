//! `PostgreSQL` event store implementation for the sahabul booking platform.
//!
//! Provides a production event store implementing the `EventStore` trait
//! from `sahabul-core`:
//!
//! - Event persistence with optimistic concurrency (the slot-conflict
//!   guarantee of the booking ledger rests on this append path)
//! - State snapshots for fast aggregate rebuilds
//! - Connection pooling via sqlx
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE events (
//!     stream_id  TEXT NOT NULL,
//!     version    BIGINT NOT NULL,
//!     event_type TEXT NOT NULL,
//!     event_data BYTEA NOT NULL,
//!     metadata   JSONB,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     PRIMARY KEY (stream_id, version)
//! );
//! ```
//!
//! The `(stream_id, version)` primary key is the hard backstop: even if two
//! service instances race past the in-transaction version check, only one
//! insert can win; the loser maps to `ConcurrencyConflict`.
//!
//! # Example
//!
//! ```ignore
//! use sahabul_postgres::PostgresEventStore;
//!
//! let store = PostgresEventStore::connect("postgres://localhost/sahabul").await?;
//! store.migrate().await?;
//! ```

#![forbid(unsafe_code)]

use sahabul_core::event::SerializedEvent;
use sahabul_core::event_store::{EventStore, EventStoreError};
use sahabul_core::stream::{StreamId, Version};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// Postgres unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

/// Production event store backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Connect to the database and build a store with a default pool.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::DatabaseError` if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, EventStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
        Ok(Self::from_pool(pool))
    }

    /// Build a store from an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool (read models share it).
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `events` and `snapshots` tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::DatabaseError` if a statement fails.
    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS events (
                stream_id  TEXT NOT NULL,
                version    BIGINT NOT NULL,
                event_type TEXT NOT NULL,
                event_data BYTEA NOT NULL,
                metadata   JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (stream_id, version)
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at)",
            "CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type)",
            r"
            CREATE TABLE IF NOT EXISTS snapshots (
                stream_id  TEXT PRIMARY KEY,
                version    BIGINT NOT NULL,
                state_data BYTEA NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            ",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
        }

        Ok(())
    }

    fn map_insert_error(
        error: sqlx::Error,
        stream_id: &StreamId,
        expected: Version,
        actual: Version,
    ) -> EventStoreError {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.code().as_deref() == Some(UNIQUE_VIOLATION) {
                // Another writer inserted the same version concurrently.
                return EventStoreError::ConcurrencyConflict {
                    stream_id: stream_id.clone(),
                    expected,
                    actual,
                };
            }
        }
        EventStoreError::DatabaseError(error.to_string())
    }
}

impl EventStore for PostgresEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            let row =
                sqlx::query("SELECT COALESCE(MAX(version), 0) AS version FROM events WHERE stream_id = $1")
                    .bind(stream_id.as_str())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            let current_raw: i64 = row
                .try_get("version")
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
            #[allow(clippy::cast_sign_loss)] // Versions are never negative
            let current = Version::new(current_raw as u64);

            if let Some(expected) = expected_version {
                if expected != current {
                    metrics::counter!("event_store.append.conflict").increment(1);
                    return Err(EventStoreError::ConcurrencyConflict {
                        stream_id,
                        expected,
                        actual: current,
                    });
                }
            }

            let mut version = current;
            for event in &events {
                version = version.next();
                #[allow(clippy::cast_possible_wrap)] // Version values stay far below i64::MAX
                sqlx::query(
                    r"
                    INSERT INTO events (stream_id, version, event_type, event_data, metadata)
                    VALUES ($1, $2, $3, $4, $5)
                    ",
                )
                .bind(stream_id.as_str())
                .bind(version.value() as i64)
                .bind(&event.event_type)
                .bind(&event.data)
                .bind(&event.metadata)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Self::map_insert_error(e, &stream_id, expected_version.unwrap_or(current), current)
                })?;
            }

            tx.commit()
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            metrics::counter!("event_store.append.events").increment(events.len() as u64);
            tracing::debug!(
                stream_id = %stream_id,
                new_version = %version,
                event_count = events.len(),
                "Appended events"
            );

            Ok(version)
        })
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            #[allow(clippy::cast_possible_wrap)] // Version values stay far below i64::MAX
            let from = from_version.map_or(0_i64, |v| v.value() as i64);

            let rows = sqlx::query(
                r"
                SELECT event_type, event_data, metadata
                FROM events
                WHERE stream_id = $1 AND version >= $2
                ORDER BY version ASC
                ",
            )
            .bind(stream_id.as_str())
            .bind(from)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            rows.into_iter()
                .map(|row| {
                    Ok(SerializedEvent::new(
                        row.try_get("event_type")
                            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?,
                        row.try_get("event_data")
                            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?,
                        row.try_get("metadata")
                            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?,
                    ))
                })
                .collect()
        })
    }

    fn save_snapshot(
        &self,
        stream_id: StreamId,
        version: Version,
        state: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            #[allow(clippy::cast_possible_wrap)] // Version values stay far below i64::MAX
            sqlx::query(
                r"
                INSERT INTO snapshots (stream_id, version, state_data, created_at)
                VALUES ($1, $2, $3, now())
                ON CONFLICT (stream_id)
                DO UPDATE SET version = $2, state_data = $3, created_at = now()
                ",
            )
            .bind(stream_id.as_str())
            .bind(version.value() as i64)
            .bind(&state)
            .execute(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            Ok(())
        })
    }

    fn load_snapshot(
        &self,
        stream_id: StreamId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<(Version, Vec<u8>)>, EventStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT version, state_data FROM snapshots WHERE stream_id = $1",
            )
            .bind(stream_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            row.map(|row| {
                let version_raw: i64 = row
                    .try_get("version")
                    .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
                let state: Vec<u8> = row
                    .try_get("state_data")
                    .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
                #[allow(clippy::cast_sign_loss)] // Versions are never negative
                Ok((Version::new(version_raw as u64), state))
            })
            .transpose()
        })
    }
}
