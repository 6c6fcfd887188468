//! Database layer
//!
//! SQLite persistence for guardians, events, rosters and waiver records.

mod events;
mod guardians;
mod waivers;

pub use events::{Event, EventRepository, RosterEntry};
pub use guardians::{Attendee, Child, Guardian, GuardianRepository};
pub use waivers::{WaiverRecord, WaiverRepository};

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::error::Result;

/// Create the connection pool and initialize the schema
pub async fn create_pool(url: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables if they do not exist
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS guardians (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            email TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS children (
            id TEXT PRIMARY KEY,
            guardian_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_children_guardian ON children(guardian_id);

        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            capacity INTEGER NOT NULL DEFAULT 0,
            registration_deadline TEXT NOT NULL,
            end_date TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS event_attendees (
            event_id TEXT NOT NULL,
            attendee_id TEXT NOT NULL,
            guardian_id TEXT NOT NULL,
            is_child INTEGER NOT NULL DEFAULT 0,
            registered_at TEXT NOT NULL,
            PRIMARY KEY (event_id, attendee_id)
        );

        CREATE INDEX IF NOT EXISTS idx_attendees_guardian ON event_attendees(guardian_id);

        CREATE TABLE IF NOT EXISTS registered_events (
            attendee_id TEXT NOT NULL,
            event_id TEXT NOT NULL,
            PRIMARY KEY (attendee_id, event_id)
        );

        CREATE TABLE IF NOT EXISTS waivers (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            storage_key TEXT NOT NULL,
            file_name TEXT NOT NULL,
            guardian_id TEXT NOT NULL,
            child_id TEXT,
            is_for_child INTEGER NOT NULL DEFAULT 0,
            template_id TEXT,
            event_id TEXT NOT NULL,
            uploaded_by TEXT,
            uploaded_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_waivers_event ON waivers(event_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_waivers_completed_identity
            ON waivers(event_id, template_id, guardian_id, IFNULL(child_id, ''))
            WHERE kind = 'completed';

        CREATE TABLE IF NOT EXISTS signed_waivers (
            owner_id TEXT NOT NULL,
            waiver_id TEXT NOT NULL,
            PRIMARY KEY (owner_id, waiver_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    init_schema(&pool).await.unwrap();
    pool
}
