//! Waiver signing orchestration
//!
//! One batch: fetch the template, resolve anchors (fatal before any
//! upload), transform them once, then composite and reconcile each
//! participant independently. The batch reports per-participant outcomes
//! instead of collapsing to a single pass/fail.

use chrono::Local;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::TemplateCalibration;
use crate::db::{GuardianRepository, WaiverRepository};
use crate::error::{AppError, Result};
use crate::pdf::{
    compose_signed_waiver, date_render_point, page_size, resolve_anchors,
    signature_render_point, SignatureOverlay, TokenStream,
};
use crate::storage::ObjectStore;

use super::{Participant, Reconciler};

/// A successfully signed participant
#[derive(Debug, Clone, Serialize)]
pub struct SignedArtifact {
    pub participant_id: String,
    pub waiver_id: String,
    pub url: String,
}

/// A participant whose signing failed
#[derive(Debug, Clone, Serialize)]
pub struct SignFailure {
    pub participant_id: String,
    pub error: String,
}

/// Partial-success result for a signing batch
#[derive(Debug, Clone, Serialize)]
pub struct SignOutcome {
    pub signed: Vec<SignedArtifact>,
    pub failures: Vec<SignFailure>,
}

/// Orchestrates a signing batch
pub struct SigningService<'a> {
    pool: &'a SqlitePool,
    store: &'a dyn ObjectStore,
    calibration: &'a TemplateCalibration,
}

impl<'a> SigningService<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        store: &'a dyn ObjectStore,
        calibration: &'a TemplateCalibration,
    ) -> Self {
        Self {
            pool,
            store,
            calibration,
        }
    }

    pub async fn sign(
        &self,
        event_id: &str,
        template_id: &str,
        guardian_id: &str,
        guardian_name: &str,
        signature_image: &[u8],
        participants: &[Participant],
    ) -> Result<SignOutcome> {
        if participants.is_empty() {
            return Err(AppError::BadRequest("No participants provided".to_string()));
        }
        self.authorize_participants(guardian_id, participants).await?;

        let waivers = WaiverRepository::new(self.pool);
        let template = waivers
            .get_template(event_id, template_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Template waiver {} not found for event {}",
                    template_id, event_id
                ))
            })?;

        let template_bytes = self.store.get(&template.storage_key).await?;
        let signature = image::load_from_memory(signature_image)?;

        // Anchors resolve once per template, before anything is uploaded
        let doc = lopdf::Document::load_mem(&template_bytes)?;
        let anchors = resolve_anchors(TokenStream::new(&doc), self.calibration)?;

        let pages = doc.get_pages();
        let signature_page = *pages
            .get(&anchors.signature.page)
            .ok_or(AppError::Pdf(lopdf::Error::PageNumberNotFound(
                anchors.signature.page,
            )))?;
        let signature_at = signature_render_point(
            &anchors.signature,
            &page_size(&doc, signature_page)?,
            self.calibration,
        );

        let date_at = match &anchors.date {
            Some(anchor) => {
                let date_page = *pages.get(&anchor.page).ok_or(AppError::Pdf(
                    lopdf::Error::PageNumberNotFound(anchor.page),
                ))?;
                Some(date_render_point(
                    anchor,
                    &page_size(&doc, date_page)?,
                    self.calibration,
                ))
            }
            None => None,
        };
        drop(doc);

        let date_text = Local::now().format("%-m/%-d/%Y").to_string();
        let overlay = SignatureOverlay {
            template: &template_bytes,
            signature: &signature,
            guardian_name,
            signature_at,
            date_at,
            date_text: &date_text,
        };

        let reconciler = Reconciler::new(self.pool, self.store);
        let mut outcome = SignOutcome {
            signed: Vec::new(),
            failures: Vec::new(),
        };

        for participant in participants {
            let artifact =
                match compose_signed_waiver(&overlay, &participant.name, self.calibration) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(
                            "Failed to composite waiver for participant {}: {}",
                            participant.id,
                            e
                        );
                        outcome.failures.push(SignFailure {
                            participant_id: participant.id.clone(),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

            match reconciler
                .reconcile(event_id, &template, guardian_id, participant, artifact)
                .await
            {
                Ok(reconciled) => outcome.signed.push(SignedArtifact {
                    participant_id: participant.id.clone(),
                    waiver_id: reconciled.waiver_id,
                    url: reconciled.url,
                }),
                Err(e) => {
                    tracing::warn!(
                        "Failed to reconcile waiver for participant {}: {}",
                        participant.id,
                        e
                    );
                    outcome.failures.push(SignFailure {
                        participant_id: participant.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Signed {} of {} participant(s) for event {} template {}",
            outcome.signed.len(),
            participants.len(),
            event_id,
            template_id
        );

        Ok(outcome)
    }

    /// Every participant must be the guardian themself or one of their
    /// children, with the child flag agreeing with reality.
    async fn authorize_participants(
        &self,
        guardian_id: &str,
        participants: &[Participant],
    ) -> Result<()> {
        let guardians = GuardianRepository::new(self.pool);
        let ids: Vec<String> = participants.iter().map(|p| p.id.clone()).collect();
        let resolved = guardians.resolve_attendees(guardian_id, &ids).await?;

        for participant in participants {
            let attendee = resolved
                .iter()
                .find(|a| a.id() == participant.id)
                .ok_or_else(|| {
                    AppError::Forbidden(format!(
                        "Participant {} could not be resolved",
                        participant.id
                    ))
                })?;
            if attendee.is_child() != participant.is_child {
                return Err(AppError::BadRequest(format!(
                    "Participant {} child flag does not match the family record",
                    participant.id
                )));
            }
        }

        Ok(())
    }
}
