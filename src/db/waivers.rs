//! Waiver record database operations

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;

/// Waiver tracking record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WaiverRecord {
    pub id: String,
    pub kind: String,
    pub storage_key: String,
    pub file_name: String,
    pub guardian_id: String,
    pub child_id: Option<String>,
    pub is_for_child: bool,
    pub template_id: Option<String>,
    pub event_id: String,
    pub uploaded_by: Option<String>,
    pub uploaded_at: String,
}

/// Waiver repository
pub struct WaiverRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WaiverRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Option<WaiverRecord>> {
        let record = sqlx::query_as::<_, WaiverRecord>(
            r#"
            SELECT id, kind, storage_key, file_name, guardian_id, child_id,
                   is_for_child, template_id, event_id, uploaded_by, uploaded_at
            FROM waivers
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Get a template waiver for an event
    pub async fn get_template(&self, event_id: &str, template_id: &str) -> Result<Option<WaiverRecord>> {
        let record = sqlx::query_as::<_, WaiverRecord>(
            r#"
            SELECT id, kind, storage_key, file_name, guardian_id, child_id,
                   is_for_child, template_id, event_id, uploaded_by, uploaded_at
            FROM waivers
            WHERE id = ? AND event_id = ? AND kind = 'template'
            "#,
        )
        .bind(template_id)
        .bind(event_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Create a template waiver record
    pub async fn create_template(
        &self,
        event_id: &str,
        guardian_id: &str,
        storage_key: &str,
        file_name: &str,
    ) -> Result<WaiverRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO waivers (id, kind, storage_key, file_name, guardian_id,
                                 child_id, is_for_child, template_id, event_id,
                                 uploaded_by, uploaded_at)
            VALUES (?, 'template', ?, ?, ?, NULL, 0, NULL, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(storage_key)
        .bind(file_name)
        .bind(guardian_id)
        .bind(event_id)
        .bind(guardian_id)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.get(&id).await?.ok_or_else(|| {
            crate::error::AppError::Internal("Failed to fetch created template waiver".to_string())
        })
    }

    /// All waiver records for an event
    pub async fn list_for_event(&self, event_id: &str) -> Result<Vec<WaiverRecord>> {
        let records = sqlx::query_as::<_, WaiverRecord>(
            r#"
            SELECT id, kind, storage_key, file_name, guardian_id, child_id,
                   is_for_child, template_id, event_id, uploaded_by, uploaded_at
            FROM waivers
            WHERE event_id = ?
            ORDER BY uploaded_at ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Completed waivers for one participant at one event.
    ///
    /// For a child participant the identity is the child id; for a
    /// guardian-as-self it is the guardian id with no child reference.
    pub async fn completed_for_participant(
        &self,
        event_id: &str,
        participant_id: &str,
        is_child: bool,
    ) -> Result<Vec<WaiverRecord>> {
        let records = sqlx::query_as::<_, WaiverRecord>(
            r#"
            SELECT id, kind, storage_key, file_name, guardian_id, child_id,
                   is_for_child, template_id, event_id, uploaded_by, uploaded_at
            FROM waivers
            WHERE event_id = ? AND kind = 'completed'
              AND ((? AND child_id = ?) OR (NOT ? AND child_id IS NULL AND guardian_id = ?))
            "#,
        )
        .bind(event_id)
        .bind(is_child)
        .bind(participant_id)
        .bind(is_child)
        .bind(participant_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }
}
