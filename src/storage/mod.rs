//! Object storage for waiver artifacts
//!
//! S3-compatible storage behind a small trait so the signing and cascade
//! services can be exercised against an in-memory store in tests.

mod s3_client;

pub use s3_client::S3Client;

use async_trait::async_trait;

use crate::error::Result;

/// Kind of waiver artifact, used in the storage key layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiverKind {
    Template,
    Completed,
}

impl WaiverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaiverKind::Template => "template",
            WaiverKind::Completed => "completed",
        }
    }
}

/// Deterministic key layout: `waivers/{kind}/{eventId}/{ownerId}/{fileName}`
///
/// The owner segment is the participant id for completed waivers and the
/// uploading guardian id for templates.
pub fn waiver_key(kind: WaiverKind, event_id: &str, owner_id: &str, file_name: &str) -> String {
    format!(
        "waivers/{}/{}/{}/{}",
        kind.as_str(),
        event_id,
        owner_id,
        sanitize_file_name(file_name)
    )
}

/// Strip path separators and control characters from an uploaded file name
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        "unnamed.pdf".to_string()
    } else {
        cleaned
    }
}

/// Abstract object store used by the waiver services
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object, returning a URL for retrieval
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    /// Fetch an object's bytes
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete an object
    async fn delete(&self, key: &str) -> Result<()>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiver_key_layout() {
        let key = waiver_key(WaiverKind::Completed, "ev-1", "child-9", "liability.pdf");
        assert_eq!(key, "waivers/completed/ev-1/child-9/liability.pdf");

        let key = waiver_key(WaiverKind::Template, "ev-1", "guardian-2", "liability.pdf");
        assert_eq!(key, "waivers/template/ev-1/guardian-2/liability.pdf");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name(""), "unnamed.pdf");
        assert_eq!(sanitize_file_name("waiver v2.pdf"), "waiver v2.pdf");
    }
}
