//! Registration state machine
//!
//! Register and unregister are the only transitions; both touch two
//! aggregates (the event's roster and the attendee's registered-events
//! list) inside one transaction. A commit failure rolls both back and
//! propagates to the caller.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{Attendee, EventRepository, GuardianRepository};
use crate::error::{AppError, Result};
use crate::storage::ObjectStore;

use super::cascade;

/// Result of a register call, split by attendee kind
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub registered_user_ids: Vec<String>,
    pub registered_child_ids: Vec<String>,
}

/// Result of an unregister call
#[derive(Debug, Clone, Serialize)]
pub struct UnregistrationOutcome {
    pub removed_user_ids: Vec<String>,
    pub removed_child_ids: Vec<String>,
}

/// Registration service over the shared pool
pub struct RegistrationService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RegistrationService<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Register attendees for an event.
    ///
    /// Attendees already on the roster are skipped; if every requested
    /// attendee is already registered the whole call fails with
    /// `NoOpRejected` so the caller knows nothing changed. Capacity is
    /// checked against the attendees actually being added.
    pub async fn register(
        &self,
        event_id: &str,
        guardian_id: &str,
        attendee_ids: &[String],
    ) -> Result<RegistrationOutcome> {
        let guardians = GuardianRepository::new(self.pool);
        let events = EventRepository::new(self.pool);

        guardians
            .get(guardian_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Guardian not found: {}", guardian_id)))?;
        let event = events
            .get(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event not found: {}", event_id)))?;

        if Utc::now() > event.deadline()? {
            return Err(AppError::DeadlinePassed);
        }

        let resolved = guardians.resolve_attendees(guardian_id, attendee_ids).await?;

        let mut tx = self.pool.begin().await?;

        let existing: Vec<(String,)> =
            sqlx::query_as("SELECT attendee_id FROM event_attendees WHERE event_id = ?")
                .bind(event_id)
                .fetch_all(&mut *tx)
                .await?;
        let roster_size = existing.len() as i64;

        let new_attendees: Vec<&Attendee> = resolved
            .iter()
            .filter(|a| !existing.iter().any(|(id,)| id == a.id()))
            .collect();

        if new_attendees.is_empty() {
            return Err(AppError::NoOpRejected(
                "Every requested attendee is already registered".to_string(),
            ));
        }

        if event.capacity > 0 && roster_size + new_attendees.len() as i64 > event.capacity {
            return Err(AppError::CapacityExceeded {
                capacity: event.capacity,
                registered: roster_size,
                requested: new_attendees.len(),
            });
        }

        let now = Utc::now().to_rfc3339();
        for attendee in &new_attendees {
            sqlx::query(
                r#"
                INSERT INTO event_attendees (event_id, attendee_id, guardian_id, is_child, registered_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(event_id)
            .bind(attendee.id())
            .bind(guardian_id)
            .bind(attendee.is_child())
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT OR IGNORE INTO registered_events (attendee_id, event_id) VALUES (?, ?)",
            )
            .bind(attendee.id())
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
        }

        // Both aggregates or neither; an abort here reaches the caller
        tx.commit().await?;

        let mut outcome = RegistrationOutcome {
            registered_user_ids: Vec::new(),
            registered_child_ids: Vec::new(),
        };
        for attendee in new_attendees {
            if attendee.is_child() {
                outcome.registered_child_ids.push(attendee.id().to_string());
            } else {
                outcome.registered_user_ids.push(attendee.id().to_string());
            }
        }

        tracing::info!(
            "Registered {} attendee(s) for event {}",
            outcome.registered_user_ids.len() + outcome.registered_child_ids.len(),
            event_id
        );

        Ok(outcome)
    }

    /// Unregister attendees from an event, cascading completed-waiver
    /// cleanup for each removed attendee.
    pub async fn unregister(
        &self,
        event_id: &str,
        guardian_id: &str,
        attendee_ids: &[String],
        store: &dyn ObjectStore,
    ) -> Result<UnregistrationOutcome> {
        let guardians = GuardianRepository::new(self.pool);
        let events = EventRepository::new(self.pool);

        guardians
            .get(guardian_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Guardian not found: {}", guardian_id)))?;
        let event = events
            .get(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event not found: {}", event_id)))?;

        if Utc::now() > event.ends_at()? {
            return Err(AppError::EventEnded);
        }

        let resolved = guardians.resolve_attendees(guardian_id, attendee_ids).await?;

        let mut tx = self.pool.begin().await?;

        let existing: Vec<(String,)> =
            sqlx::query_as("SELECT attendee_id FROM event_attendees WHERE event_id = ?")
                .bind(event_id)
                .fetch_all(&mut *tx)
                .await?;

        let present: Vec<&Attendee> = resolved
            .iter()
            .filter(|a| existing.iter().any(|(id,)| id == a.id()))
            .collect();

        if present.is_empty() {
            return Err(AppError::NoOpRejected(
                "None of the requested attendees are registered".to_string(),
            ));
        }

        let mut storage_keys = Vec::new();
        for attendee in &present {
            let outcome = cascade::cascade_remove_tx(&mut tx, event_id, attendee).await?;
            storage_keys.extend(outcome.storage_keys);
        }

        tx.commit().await?;

        // Artifact deletion is best-effort after the records are gone
        cascade::delete_artifacts(store, &storage_keys).await;

        let mut outcome = UnregistrationOutcome {
            removed_user_ids: Vec::new(),
            removed_child_ids: Vec::new(),
        };
        for attendee in present {
            if attendee.is_child() {
                outcome.removed_child_ids.push(attendee.id().to_string());
            } else {
                outcome.removed_user_ids.push(attendee.id().to_string());
            }
        }

        tracing::info!(
            "Unregistered {} attendee(s) from event {}",
            outcome.removed_user_ids.len() + outcome.removed_child_ids.len(),
            event_id
        );

        Ok(outcome)
    }
}
