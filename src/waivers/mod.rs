//! Waiver fulfillment
//!
//! Takes a signed batch request (template, signature image, participants),
//! composites one artifact per participant and reconciles the waiver
//! records idempotently.

mod reconciler;
mod signing;

pub use reconciler::Reconciler;
pub use signing::{SignFailure, SignOutcome, SignedArtifact, SigningService};

use serde::{Deserialize, Serialize};

/// One participant in a signing batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Guardian id for a self-signing, child id for a child
    pub id: String,
    pub name: String,
    pub is_child: bool,
}
