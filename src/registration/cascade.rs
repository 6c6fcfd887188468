//! Cascading unregistration
//!
//! Removing an attendee from an event also removes their completed
//! waivers: the tracking records and owner back-references go in the same
//! transaction as the roster entry; the stored artifacts are deleted
//! best-effort afterwards. An orphaned object in storage is acceptable,
//! a dangling record is not.

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::db::{Attendee, GuardianRepository};
use crate::error::{AppError, Result};
use crate::storage::ObjectStore;

/// What one cascade removed
#[derive(Debug, Clone, Default)]
pub struct CascadeOutcome {
    pub removed_waiver_ids: Vec<String>,
    pub storage_keys: Vec<String>,
}

/// Remove one attendee's roster entry, completed waivers and
/// back-references inside an open transaction.
///
/// Returns the storage keys of deleted waiver records; the caller deletes
/// those objects after the transaction commits.
pub async fn cascade_remove_tx(
    tx: &mut Transaction<'_, Sqlite>,
    event_id: &str,
    attendee: &Attendee,
) -> Result<CascadeOutcome> {
    sqlx::query("DELETE FROM event_attendees WHERE event_id = ? AND attendee_id = ?")
        .bind(event_id)
        .bind(attendee.id())
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM registered_events WHERE attendee_id = ? AND event_id = ?")
        .bind(attendee.id())
        .bind(event_id)
        .execute(&mut **tx)
        .await?;

    let is_child = attendee.is_child();
    let waivers: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT id, storage_key
        FROM waivers
        WHERE event_id = ? AND kind = 'completed'
          AND ((? AND child_id = ?) OR (NOT ? AND child_id IS NULL AND guardian_id = ?))
        "#,
    )
    .bind(event_id)
    .bind(is_child)
    .bind(attendee.id())
    .bind(is_child)
    .bind(attendee.id())
    .fetch_all(&mut **tx)
    .await?;

    let mut outcome = CascadeOutcome::default();
    for (waiver_id, storage_key) in waivers {
        sqlx::query("DELETE FROM waivers WHERE id = ?")
            .bind(&waiver_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM signed_waivers WHERE waiver_id = ?")
            .bind(&waiver_id)
            .execute(&mut **tx)
            .await?;
        outcome.removed_waiver_ids.push(waiver_id);
        outcome.storage_keys.push(storage_key);
    }

    Ok(outcome)
}

/// Best-effort artifact deletion; a storage failure is logged and never
/// blocks the cascade.
pub async fn delete_artifacts(store: &dyn ObjectStore, keys: &[String]) {
    for key in keys {
        if let Err(e) = store.delete(key).await {
            tracing::warn!(
                "Failed to delete waiver artifact {}: {}. Leaving orphaned object.",
                key,
                e
            );
        }
    }
}

/// Administrative removal of a participant from one event
pub async fn remove_participant(
    pool: &SqlitePool,
    store: &dyn ObjectStore,
    event_id: &str,
    participant_id: &str,
    is_child: bool,
) -> Result<CascadeOutcome> {
    let attendee = resolve_participant(pool, participant_id, is_child).await?;

    let registered: Option<(String,)> = sqlx::query_as(
        "SELECT attendee_id FROM event_attendees WHERE event_id = ? AND attendee_id = ?",
    )
    .bind(event_id)
    .bind(attendee.id().to_string())
    .fetch_optional(pool)
    .await?;
    if registered.is_none() {
        return Err(AppError::NotFound(format!(
            "Participant {} is not registered for event {}",
            participant_id, event_id
        )));
    }

    let mut tx = pool.begin().await?;
    let outcome = cascade_remove_tx(&mut tx, event_id, &attendee).await?;
    tx.commit().await?;

    delete_artifacts(store, &outcome.storage_keys).await;

    Ok(outcome)
}

/// Cascade across every event an attendee is registered for; used by the
/// child-deletion flow. Runs one transaction per affected event.
pub async fn remove_attendee_everywhere(
    pool: &SqlitePool,
    store: &dyn ObjectStore,
    attendee: &Attendee,
) -> Result<Vec<CascadeOutcome>> {
    let events: Vec<(String,)> =
        sqlx::query_as("SELECT event_id FROM registered_events WHERE attendee_id = ?")
            .bind(attendee.id())
            .fetch_all(pool)
            .await?;

    let mut outcomes = Vec::new();
    for (event_id,) in events {
        let mut tx = pool.begin().await?;
        let outcome = cascade_remove_tx(&mut tx, &event_id, attendee).await?;
        tx.commit().await?;

        delete_artifacts(store, &outcome.storage_keys).await;
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

async fn resolve_participant(
    pool: &SqlitePool,
    participant_id: &str,
    is_child: bool,
) -> Result<Attendee> {
    if is_child {
        let guardians = GuardianRepository::new(pool);
        let guardian_id = guardians
            .guardian_of_child(participant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Child not found: {}", participant_id)))?;
        Ok(Attendee::Child {
            id: participant_id.to_string(),
            guardian_id,
        })
    } else {
        Ok(Attendee::Guardian {
            id: participant_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, EventRepository, WaiverRepository};
    use crate::storage::memory::MemoryStore;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    async fn seed(pool: &SqlitePool) {
        let guardians = GuardianRepository::new(pool);
        guardians.create("g1", "Dana Smith", None).await.unwrap();
        guardians.add_child("c1", "g1", "Alex Smith").await.unwrap();

        let events = EventRepository::new(pool);
        events
            .create(
                "ev1",
                "Spring Campout",
                10,
                Utc::now() + Duration::days(7),
                Utc::now() + Duration::days(8),
            )
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO event_attendees (event_id, attendee_id, guardian_id, is_child, registered_at) VALUES ('ev1', 'c1', 'g1', 1, ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO registered_events (attendee_id, event_id) VALUES ('c1', 'ev1')")
            .execute(pool)
            .await
            .unwrap();
    }

    async fn seed_completed_waiver(pool: &SqlitePool, key: &str) -> String {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO waivers (id, kind, storage_key, file_name, guardian_id, child_id,
                                 is_for_child, template_id, event_id, uploaded_by, uploaded_at)
            VALUES (?, 'completed', ?, 'liability-signed.pdf', 'g1', 'c1', 1, 'tmpl-1', 'ev1', 'g1', ?)
            "#,
        )
        .bind(&id)
        .bind(key)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .unwrap();
        sqlx::query("INSERT OR IGNORE INTO signed_waivers (owner_id, waiver_id) VALUES ('c1', ?)")
            .bind(&id)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_cascade_removes_waivers_and_references() {
        let pool = test_pool().await;
        seed(&pool).await;

        let key_a = "waivers/completed/ev1/c1/a.pdf";
        let key_b = "waivers/completed/ev1/c1/b.pdf";
        seed_completed_waiver(&pool, key_a).await;
        // Second template's waiver for the same child
        let id_b = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO waivers (id, kind, storage_key, file_name, guardian_id, child_id,
                                 is_for_child, template_id, event_id, uploaded_by, uploaded_at)
            VALUES (?, 'completed', ?, 'medical-signed.pdf', 'g1', 'c1', 1, 'tmpl-2', 'ev1', 'g1', ?)
            "#,
        )
        .bind(&id_b)
        .bind(key_b)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

        let store = MemoryStore::new()
            .with_object(key_a, vec![1])
            .with_object(key_b, vec![2]);

        let outcome = remove_participant(&pool, &store, "ev1", "c1", true)
            .await
            .unwrap();
        assert_eq!(outcome.removed_waiver_ids.len(), 2);

        // Both artifacts attempted and gone
        assert_eq!(store.delete_calls.lock().unwrap().len(), 2);
        assert_eq!(store.object_count(), 0);

        // No records, no back-references
        let waivers = WaiverRepository::new(&pool);
        assert!(waivers.list_for_event("ev1").await.unwrap().is_empty());

        let guardians = GuardianRepository::new(&pool);
        assert!(guardians.signed_waivers("c1").await.unwrap().is_empty());
        assert!(guardians.registered_events("c1").await.unwrap().is_empty());

        let events = EventRepository::new(&pool);
        assert_eq!(events.roster_size("ev1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_block_record_deletion() {
        let pool = test_pool().await;
        seed(&pool).await;

        let key = "waivers/completed/ev1/c1/a.pdf";
        seed_completed_waiver(&pool, key).await;

        let mut store = MemoryStore::new().with_object(key, vec![1]);
        store.fail_deletes = true;

        let outcome = remove_participant(&pool, &store, "ev1", "c1", true)
            .await
            .unwrap();
        assert_eq!(outcome.removed_waiver_ids.len(), 1);

        // Delete was attempted, failed, and the record is still gone
        assert_eq!(store.delete_calls.lock().unwrap().len(), 1);
        assert_eq!(store.object_count(), 1);
        let waivers = WaiverRepository::new(&pool);
        assert!(waivers.list_for_event("ev1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_unregistered_participant_is_not_found() {
        let pool = test_pool().await;
        seed(&pool).await;
        let store = MemoryStore::new();

        let err = remove_participant(&pool, &store, "ev1", "g1", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_attendee_everywhere() {
        let pool = test_pool().await;
        seed(&pool).await;

        // Register the child for a second event too
        let events = EventRepository::new(&pool);
        events
            .create(
                "ev2",
                "Summer Campout",
                10,
                Utc::now() + Duration::days(30),
                Utc::now() + Duration::days(31),
            )
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO event_attendees (event_id, attendee_id, guardian_id, is_child, registered_at) VALUES ('ev2', 'c1', 'g1', 1, ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO registered_events (attendee_id, event_id) VALUES ('c1', 'ev2')")
            .execute(&pool)
            .await
            .unwrap();

        let store = MemoryStore::new();
        let attendee = Attendee::Child {
            id: "c1".to_string(),
            guardian_id: "g1".to_string(),
        };

        let outcomes = remove_attendee_everywhere(&pool, &store, &attendee)
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);

        let guardians = GuardianRepository::new(&pool);
        assert!(guardians.registered_events("c1").await.unwrap().is_empty());
        assert_eq!(events.roster_size("ev1").await.unwrap(), 0);
        assert_eq!(events.roster_size("ev2").await.unwrap(), 0);
    }
}
