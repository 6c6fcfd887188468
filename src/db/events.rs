//! Event and roster database operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, Result};

/// Event record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: String,
    pub title: String,
    /// 0 means unlimited
    pub capacity: i64,
    pub registration_deadline: String,
    pub end_date: String,
    pub created_at: String,
}

impl Event {
    pub fn deadline(&self) -> Result<DateTime<Utc>> {
        parse_instant(&self.registration_deadline)
    }

    pub fn ends_at(&self) -> Result<DateTime<Utc>> {
        parse_instant(&self.end_date)
    }
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Invalid stored instant '{}': {}", value, e)))
}

/// A row in an event's roster
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RosterEntry {
    pub event_id: String,
    pub attendee_id: String,
    pub guardian_id: String,
    pub is_child: bool,
    pub registered_at: String,
}

/// Event repository
pub struct EventRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EventRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, title, capacity, registration_deadline, end_date, created_at
            FROM events
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(event)
    }

    pub async fn create(
        &self,
        id: &str,
        title: &str,
        capacity: i64,
        registration_deadline: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (id, title, capacity, registration_deadline, end_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(capacity)
        .bind(registration_deadline.to_rfc3339())
        .bind(end_date.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Current roster for an event, in registration order
    pub async fn roster(&self, event_id: &str) -> Result<Vec<RosterEntry>> {
        let entries = sqlx::query_as::<_, RosterEntry>(
            r#"
            SELECT event_id, attendee_id, guardian_id, is_child, registered_at
            FROM event_attendees
            WHERE event_id = ?
            ORDER BY registered_at ASC, attendee_id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn roster_size(&self, event_id: &str) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM event_attendees WHERE event_id = ?")
                .bind(event_id)
                .fetch_one(self.pool)
                .await?;

        Ok(row.0)
    }
}
