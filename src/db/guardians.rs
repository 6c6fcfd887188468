//! Guardian and child database operations

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, Result};

/// Guardian account record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Guardian {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub created_at: String,
}

/// Child profile owned by a guardian
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Child {
    pub id: String,
    pub guardian_id: String,
    pub display_name: String,
    pub created_at: String,
}

/// A resolved registration target: the guardian themself or one of
/// their children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attendee {
    Guardian { id: String },
    Child { id: String, guardian_id: String },
}

impl Attendee {
    /// The id used in rosters and back-reference lists
    pub fn id(&self) -> &str {
        match self {
            Attendee::Guardian { id } => id,
            Attendee::Child { id, .. } => id,
        }
    }

    pub fn is_child(&self) -> bool {
        matches!(self, Attendee::Child { .. })
    }
}

/// Guardian repository
pub struct GuardianRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GuardianRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Guardian>> {
        let guardian = sqlx::query_as::<_, Guardian>(
            "SELECT id, display_name, email, created_at FROM guardians WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(guardian)
    }

    pub async fn create(&self, id: &str, display_name: &str, email: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO guardians (id, display_name, email, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(display_name)
        .bind(email)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// List a guardian's children
    pub async fn children(&self, guardian_id: &str) -> Result<Vec<Child>> {
        let children = sqlx::query_as::<_, Child>(
            r#"
            SELECT id, guardian_id, display_name, created_at
            FROM children
            WHERE guardian_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(guardian_id)
        .fetch_all(self.pool)
        .await?;

        Ok(children)
    }

    pub async fn add_child(&self, id: &str, guardian_id: &str, display_name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO children (id, guardian_id, display_name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(guardian_id)
        .bind(display_name)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Find which guardian owns a child id
    pub async fn guardian_of_child(&self, child_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT guardian_id FROM children WHERE id = ?")
                .bind(child_id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(|(id,)| id))
    }

    /// Resolve attendee ids against a guardian's family.
    ///
    /// Every id must be either the guardian's own id or one of their
    /// children's ids; anything else is an authorization failure, not a
    /// silent filter. Duplicate ids are collapsed, order preserved.
    pub async fn resolve_attendees(
        &self,
        guardian_id: &str,
        attendee_ids: &[String],
    ) -> Result<Vec<Attendee>> {
        if attendee_ids.is_empty() {
            return Err(AppError::BadRequest("No attendees requested".to_string()));
        }

        let children = self.children(guardian_id).await?;

        let mut resolved = Vec::new();
        for id in attendee_ids {
            if resolved.iter().any(|a: &Attendee| a.id() == id) {
                continue;
            }
            if id == guardian_id {
                resolved.push(Attendee::Guardian { id: id.clone() });
            } else if children.iter().any(|c| &c.id == id) {
                resolved.push(Attendee::Child {
                    id: id.clone(),
                    guardian_id: guardian_id.to_string(),
                });
            } else {
                return Err(AppError::Forbidden(format!(
                    "Attendee {} is not part of guardian {}'s family",
                    id, guardian_id
                )));
            }
        }

        Ok(resolved)
    }

    /// Events an attendee (guardian or child) is registered for
    pub async fn registered_events(&self, attendee_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT event_id FROM registered_events WHERE attendee_id = ?")
                .bind(attendee_id)
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Waiver ids linked to an attendee's signed-waiver list
    pub async fn signed_waivers(&self, owner_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT waiver_id FROM signed_waivers WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_resolve_attendees_family_only() {
        let pool = test_pool().await;
        let repo = GuardianRepository::new(&pool);

        repo.create("g1", "Dana Smith", None).await.unwrap();
        repo.add_child("c1", "g1", "Alex Smith").await.unwrap();
        repo.create("g2", "Robin Jones", None).await.unwrap();
        repo.add_child("c2", "g2", "Sam Jones").await.unwrap();

        let resolved = repo
            .resolve_attendees("g1", &["g1".to_string(), "c1".to_string()])
            .await
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(!resolved[0].is_child());
        assert!(resolved[1].is_child());

        // Someone else's child is rejected, not filtered
        let err = repo
            .resolve_attendees("g1", &["c2".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_resolve_attendees_dedupes() {
        let pool = test_pool().await;
        let repo = GuardianRepository::new(&pool);

        repo.create("g1", "Dana Smith", None).await.unwrap();

        let resolved = repo
            .resolve_attendees("g1", &["g1".to_string(), "g1".to_string()])
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[tokio::test]
    async fn test_guardian_of_child() {
        let pool = test_pool().await;
        let repo = GuardianRepository::new(&pool);

        repo.create("g1", "Dana Smith", None).await.unwrap();
        repo.add_child("c1", "g1", "Alex Smith").await.unwrap();

        assert_eq!(
            repo.guardian_of_child("c1").await.unwrap(),
            Some("g1".to_string())
        );
        assert_eq!(repo.guardian_of_child("nope").await.unwrap(), None);
    }
}
