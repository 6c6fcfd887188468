//! Waiver record reconciliation
//!
//! One `completed` waiver exists per (event, template, participant
//! identity). Re-signing updates that record in place and leaves the
//! owner's signed-waiver references alone; a first signing creates the
//! record and links it to the owner exactly once. The artifact upload and
//! the record upsert succeed or fail together per participant: a record
//! failure triggers a compensating delete of the just-uploaded object.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::WaiverRecord;
use crate::error::Result;
use crate::storage::{waiver_key, ObjectStore, WaiverKind};

use super::Participant;

/// Reconciles signed artifacts with their tracking records
pub struct Reconciler<'a> {
    pool: &'a SqlitePool,
    store: &'a dyn ObjectStore,
}

/// Result of reconciling one participant
#[derive(Debug, Clone)]
pub struct ReconciledWaiver {
    pub waiver_id: String,
    pub storage_key: String,
    pub url: String,
}

impl<'a> Reconciler<'a> {
    pub fn new(pool: &'a SqlitePool, store: &'a dyn ObjectStore) -> Self {
        Self { pool, store }
    }

    /// Upload one participant's artifact and upsert its record
    pub async fn reconcile(
        &self,
        event_id: &str,
        template: &WaiverRecord,
        guardian_id: &str,
        participant: &Participant,
        artifact: Vec<u8>,
    ) -> Result<ReconciledWaiver> {
        let file_name = signed_file_name(&template.file_name);
        let key = waiver_key(WaiverKind::Completed, event_id, &participant.id, &file_name);

        let url = self.store.put(&key, artifact, "application/pdf").await?;

        match self
            .upsert_record(event_id, template, guardian_id, participant, &key, &file_name)
            .await
        {
            Ok(waiver_id) => Ok(ReconciledWaiver {
                waiver_id,
                storage_key: key,
                url,
            }),
            Err(e) => {
                // Compensate: don't leave an untracked artifact behind
                if let Err(del) = self.store.delete(&key).await {
                    tracing::warn!(
                        "Failed to clean up artifact {} after record failure: {}",
                        key,
                        del
                    );
                }
                Err(e)
            }
        }
    }

    async fn upsert_record(
        &self,
        event_id: &str,
        template: &WaiverRecord,
        guardian_id: &str,
        participant: &Participant,
        storage_key: &str,
        file_name: &str,
    ) -> Result<String> {
        let child_id = participant.is_child.then(|| participant.id.clone());
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let existing: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM waivers
            WHERE kind = 'completed' AND event_id = ? AND template_id = ? AND guardian_id = ?
              AND IFNULL(child_id, '') = IFNULL(?, '')
            "#,
        )
        .bind(event_id)
        .bind(&template.id)
        .bind(guardian_id)
        .bind(&child_id)
        .fetch_optional(&mut *tx)
        .await?;

        let waiver_id = match existing {
            Some((id,)) => {
                // Re-signing: refresh the record, references already exist
                sqlx::query(
                    r#"
                    UPDATE waivers
                    SET storage_key = ?, file_name = ?, uploaded_by = ?, uploaded_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(storage_key)
                .bind(file_name)
                .bind(guardian_id)
                .bind(&now)
                .bind(&id)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => {
                let id = Uuid::new_v4().to_string();
                sqlx::query(
                    r#"
                    INSERT INTO waivers (id, kind, storage_key, file_name, guardian_id, child_id,
                                         is_for_child, template_id, event_id, uploaded_by, uploaded_at)
                    VALUES (?, 'completed', ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&id)
                .bind(storage_key)
                .bind(file_name)
                .bind(guardian_id)
                .bind(&child_id)
                .bind(participant.is_child)
                .bind(&template.id)
                .bind(event_id)
                .bind(guardian_id)
                .bind(&now)
                .execute(&mut *tx)
                .await?;

                // The owner's list is a set; retries can't double-link
                sqlx::query(
                    "INSERT OR IGNORE INTO signed_waivers (owner_id, waiver_id) VALUES (?, ?)",
                )
                .bind(&participant.id)
                .bind(&id)
                .execute(&mut *tx)
                .await?;
                id
            }
        };

        tx.commit().await?;
        Ok(waiver_id)
    }
}

/// Completed-artifact file name derived from the template's
fn signed_file_name(template_file_name: &str) -> String {
    let stem = template_file_name
        .strip_suffix(".pdf")
        .unwrap_or(template_file_name);
    format!("{}-signed.pdf", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, GuardianRepository, WaiverRepository};
    use crate::storage::memory::MemoryStore;

    async fn seed_template(pool: &SqlitePool) -> WaiverRecord {
        let guardians = GuardianRepository::new(pool);
        guardians.create("g1", "Dana Smith", None).await.unwrap();
        guardians.add_child("c1", "g1", "Alex Smith").await.unwrap();

        let waivers = WaiverRepository::new(pool);
        waivers
            .create_template("ev1", "g1", "waivers/template/ev1/g1/liability.pdf", "liability.pdf")
            .await
            .unwrap()
    }

    fn child_participant() -> Participant {
        Participant {
            id: "c1".to_string(),
            name: "Alex Smith".to_string(),
            is_child: true,
        }
    }

    #[tokio::test]
    async fn test_first_signing_creates_and_links() {
        let pool = test_pool().await;
        let template = seed_template(&pool).await;
        let store = MemoryStore::new();

        let reconciler = Reconciler::new(&pool, &store);
        let result = reconciler
            .reconcile("ev1", &template, "g1", &child_participant(), vec![1, 2, 3])
            .await
            .unwrap();

        assert_eq!(
            result.storage_key,
            "waivers/completed/ev1/c1/liability-signed.pdf"
        );
        assert!(store.contains(&result.storage_key));

        let guardians = GuardianRepository::new(&pool);
        assert_eq!(
            guardians.signed_waivers("c1").await.unwrap(),
            vec![result.waiver_id.clone()]
        );

        let waivers = WaiverRepository::new(&pool);
        let record = waivers.get(&result.waiver_id).await.unwrap().unwrap();
        assert_eq!(record.kind, "completed");
        assert_eq!(record.child_id.as_deref(), Some("c1"));
        assert!(record.is_for_child);
        assert_eq!(record.template_id.as_deref(), Some(template.id.as_str()));
    }

    #[tokio::test]
    async fn test_resigning_updates_in_place() {
        let pool = test_pool().await;
        let template = seed_template(&pool).await;
        let store = MemoryStore::new();

        let reconciler = Reconciler::new(&pool, &store);
        let first = reconciler
            .reconcile("ev1", &template, "g1", &child_participant(), vec![1])
            .await
            .unwrap();
        let second = reconciler
            .reconcile("ev1", &template, "g1", &child_participant(), vec![2])
            .await
            .unwrap();

        assert_eq!(first.waiver_id, second.waiver_id);

        // One record, one reference, key reflects the second signing
        let waivers = WaiverRepository::new(&pool);
        let records = waivers
            .completed_for_participant("ev1", "c1", true)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].storage_key, second.storage_key);

        let guardians = GuardianRepository::new(&pool);
        assert_eq!(guardians.signed_waivers("c1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_guardian_self_signing_has_no_child_reference() {
        let pool = test_pool().await;
        let template = seed_template(&pool).await;
        let store = MemoryStore::new();

        let participant = Participant {
            id: "g1".to_string(),
            name: "Dana Smith".to_string(),
            is_child: false,
        };

        let reconciler = Reconciler::new(&pool, &store);
        let result = reconciler
            .reconcile("ev1", &template, "g1", &participant, vec![1])
            .await
            .unwrap();

        let waivers = WaiverRepository::new(&pool);
        let record = waivers.get(&result.waiver_id).await.unwrap().unwrap();
        assert!(record.child_id.is_none());
        assert!(!record.is_for_child);

        let guardians = GuardianRepository::new(&pool);
        assert_eq!(guardians.signed_waivers("g1").await.unwrap().len(), 1);
    }

    #[test]
    fn test_signed_file_name() {
        assert_eq!(signed_file_name("liability.pdf"), "liability-signed.pdf");
        assert_eq!(signed_file_name("release"), "release-signed.pdf");
    }
}
