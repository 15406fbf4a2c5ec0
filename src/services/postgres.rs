use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{CandidateQuery, Channel, Coordinates, Message, Profile, Signal, SignalKind};
use crate::services::store::{ChannelActivity, InsertOutcome, Store, StoreError};

/// Signal kind as stored in the `signal_kind` Postgres enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "signal_kind", rename_all = "lowercase")]
pub enum SignalKindColumn {
    Like,
    Pass,
}

impl From<SignalKind> for SignalKindColumn {
    fn from(value: SignalKind) -> Self {
        match value {
            SignalKind::Like => SignalKindColumn::Like,
            SignalKind::Pass => SignalKindColumn::Pass,
        }
    }
}

impl From<SignalKindColumn> for SignalKind {
    fn from(value: SignalKindColumn) -> Self {
        match value {
            SignalKindColumn::Like => SignalKind::Like,
            SignalKindColumn::Pass => SignalKind::Pass,
        }
    }
}

const PROFILE_COLUMNS: &str = r#"
    user_id, display_name, age, gender, gender_interests, tags,
    latitude, longitude, completion, created_at
"#;

const CHANNEL_COLUMNS: &str = "id, user_a, user_b, created_at, last_message_id, last_message_at";

const MESSAGE_COLUMNS: &str = "id, channel_id, sender_id, body, read, read_at, created_at";

/// PostgreSQL-backed store
///
/// The ledger invariants rest on the schema in `./migrations`: the `signals` primary key
/// covers the ordered pair regardless of kind, and `channels_pair_unique` covers the
/// canonical member pair. A unique violation on insert is answered by reading the row
/// that won the race.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store from a connection string and run pending migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn profile_from_row(row: &PgRow) -> Result<Profile, StoreError> {
    let age: i16 = row.try_get("age")?;
    let completion: i16 = row.try_get("completion")?;
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;

    Ok(Profile {
        user_id: row.try_get("user_id")?,
        display_name: row.try_get("display_name")?,
        age: u8::try_from(age)
            .map_err(|_| StoreError::InvalidData(format!("age out of range: {}", age)))?,
        gender: row.try_get("gender")?,
        gender_interests: row.try_get("gender_interests")?,
        tags: row.try_get("tags")?,
        location: latitude
            .zip(longitude)
            .map(|(lat, lon)| Coordinates::new(lat, lon)),
        completion: completion.clamp(0, 100) as u8,
        created_at: row.try_get("created_at")?,
    })
}

fn channel_from_row(row: &PgRow) -> Result<Channel, StoreError> {
    Ok(Channel {
        id: row.try_get("id")?,
        user_a: row.try_get("user_a")?,
        user_b: row.try_get("user_b")?,
        created_at: row.try_get("created_at")?,
        last_message_id: row.try_get("last_message_id")?,
        last_message_at: row.try_get("last_message_at")?,
    })
}

fn message_from_row(row: &PgRow) -> Result<Message, StoreError> {
    Ok(Message {
        id: row.try_get("id")?,
        channel_id: row.try_get("channel_id")?,
        sender_id: row.try_get("sender_id")?,
        body: row.try_get("body")?,
        read: row.try_get("read")?,
        read_at: row.try_get("read_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let query = format!("SELECT {} FROM profiles WHERE user_id = $1", PROFILE_COLUMNS);

        let row = sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn display_names(&self, user_ids: &[String]) -> Result<HashMap<String, String>, StoreError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query("SELECT user_id, display_name FROM profiles WHERE user_id = ANY($1)")
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<(String, String), StoreError> {
                Ok((row.try_get("user_id")?, row.try_get("display_name")?))
            })
            .collect()
    }

    async fn interest_refs(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT interest_id FROM profile_interests WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get("interest_id").map_err(StoreError::from))
            .collect()
    }

    async fn candidate_window(&self, query: &CandidateQuery) -> Result<Vec<Profile>, StoreError> {
        // $2: viewer gender for the reciprocal filter, NULL when undeclared
        // $3: genders the viewer wants to see, NULL when unrestricted
        let sql = format!(
            r#"
            SELECT {}
            FROM profiles
            WHERE NOT (user_id = ANY($1))
              AND (
                $2::TEXT IS NULL
                OR EXISTS (
                    SELECT 1 FROM unnest(gender_interests) AS gi
                    WHERE lower(gi) = lower($2) OR lower(gi) = 'all'
                )
              )
              AND ($3::TEXT[] IS NULL OR lower(gender) = ANY($3))
            ORDER BY created_at DESC, user_id ASC
            LIMIT $4
            "#,
            PROFILE_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(&query.exclude_user_ids)
            .bind(query.viewer_gender.as_deref())
            .bind(query.preferred_genders.as_ref())
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!("Candidate window returned {} profiles", rows.len());

        rows.iter().map(profile_from_row).collect()
    }

    async fn outgoing_signal_targets(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT to_user_id FROM signals WHERE from_user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get("to_user_id").map_err(StoreError::from))
            .collect()
    }

    async fn blocked_users(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT blocked_id FROM blocks WHERE blocker_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get("blocked_id").map_err(StoreError::from))
            .collect()
    }

    async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM blocks WHERE blocker_id = $1 AND blocked_id = $2")
            .bind(blocker_id)
            .bind(blocked_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn insert_block(
        &self,
        blocker_id: &str,
        blocked_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO blocks (blocker_id, blocked_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (blocker_id, blocked_id) DO NOTHING
            "#,
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<InsertOutcome<SignalKind>, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO signals (from_user_id, to_user_id, kind, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&signal.from_user)
        .bind(&signal.to_user)
        .bind(SignalKindColumn::from(signal.kind))
        .bind(signal.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::debug!(
                    "Recorded signal: {} -> {} ({})",
                    signal.from_user,
                    signal.to_user,
                    signal.kind
                );
                Ok(InsertOutcome::Inserted(signal.kind))
            }
            Err(e) if is_unique_violation(&e) => {
                let existing = self
                    .find_signal(&signal.from_user, &signal.to_user)
                    .await?
                    .ok_or_else(|| {
                        StoreError::InvalidData(format!(
                            "signal {} -> {} missing after unique violation",
                            signal.from_user, signal.to_user
                        ))
                    })?;
                Ok(InsertOutcome::Existing(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_signal(&self, from_user: &str, to_user: &str) -> Result<Option<SignalKind>, StoreError> {
        let row = sqlx::query("SELECT kind FROM signals WHERE from_user_id = $1 AND to_user_id = $2")
            .bind(from_user)
            .bind(to_user)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_get::<SignalKindColumn, _>("kind").map(SignalKind::from))
            .transpose()
            .map_err(Into::into)
    }

    async fn insert_channel(&self, channel: &Channel) -> Result<InsertOutcome<Channel>, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO channels (id, user_a, user_b, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(channel.id)
        .bind(&channel.user_a)
        .bind(&channel.user_b)
        .bind(channel.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted(channel.clone())),
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!(
                    "Channel {} <-> {} already created by a concurrent writer",
                    channel.user_a,
                    channel.user_b
                );
                let existing = self
                    .find_channel_between(&channel.user_a, &channel.user_b)
                    .await?
                    .ok_or_else(|| {
                        StoreError::InvalidData(format!(
                            "channel {} <-> {} missing after unique violation",
                            channel.user_a, channel.user_b
                        ))
                    })?;
                Ok(InsertOutcome::Existing(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_channel(&self, channel_id: Uuid) -> Result<Option<Channel>, StoreError> {
        let query = format!("SELECT {} FROM channels WHERE id = $1", CHANNEL_COLUMNS);

        let row = sqlx::query(&query)
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(channel_from_row).transpose()
    }

    async fn find_channel_between(&self, first: &str, second: &str) -> Result<Option<Channel>, StoreError> {
        let (user_a, user_b) = crate::models::canonical_pair(first, second);
        let query = format!(
            "SELECT {} FROM channels WHERE user_a = $1 AND user_b = $2",
            CHANNEL_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(user_a)
            .bind(user_b)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(channel_from_row).transpose()
    }

    async fn channels_for(&self, user_id: &str) -> Result<Vec<Channel>, StoreError> {
        // GREATEST ignores NULLs, so channels without messages sort by creation time
        let query = format!(
            r#"
            SELECT {}
            FROM channels
            WHERE user_a = $1 OR user_b = $1
            ORDER BY GREATEST(created_at, last_message_at) DESC
            "#,
            CHANNEL_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(channel_from_row).collect()
    }

    async fn channel_activity_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChannelActivity>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, GREATEST(created_at, last_message_at) AS active_at
            FROM channels
            WHERE (user_a = $1 OR user_b = $1)
              AND GREATEST(created_at, last_message_at) > $2
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ChannelActivity, StoreError> {
                Ok(ChannelActivity {
                    channel_id: row.try_get("id")?,
                    at: row.try_get("active_at")?,
                })
            })
            .collect()
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, channel_id, sender_id, body, read, read_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id)
        .bind(message.channel_id)
        .bind(&message.sender_id)
        .bind(&message.body)
        .bind(message.read)
        .bind(message.read_at)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_last_message(
        &self,
        channel_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE channels
            SET last_message_id = $2, last_message_at = $3
            WHERE id = $1
              AND (last_message_at IS NULL OR last_message_at <= $3)
            "#,
        )
        .bind(channel_id)
        .bind(message_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, StoreError> {
        let query = format!("SELECT {} FROM messages WHERE id = $1", MESSAGE_COLUMNS);

        let row = sqlx::query(&query)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    async fn messages(&self, channel_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let query = format!(
            "SELECT {} FROM messages WHERE channel_id = $1 ORDER BY created_at ASC",
            MESSAGE_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(channel_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn messages_after(
        &self,
        channel_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Vec<Message>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM messages
            WHERE channel_id = $1 AND created_at > $2
            ORDER BY created_at ASC
            "#,
            MESSAGE_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(channel_id)
            .bind(after)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn mark_read(
        &self,
        channel_id: Uuid,
        reader_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET read = TRUE, read_at = $3
            WHERE channel_id = $1 AND sender_id <> $2 AND NOT read
            "#,
        )
        .bind(channel_id)
        .bind(reader_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn unread_count(&self, channel_id: Uuid, reader_id: &str) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS unread
            FROM messages
            WHERE channel_id = $1 AND sender_id <> $2 AND NOT read
            "#,
        )
        .bind(channel_id)
        .bind(reader_id)
        .fetch_one(&self.pool)
        .await?;

        let unread: i64 = row.try_get("unread")?;
        Ok(unread.max(0) as u64)
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
