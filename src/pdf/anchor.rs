//! Anchor resolution
//!
//! Folds the scanned token stream into signature and date anchors. The
//! signature anchor prefers an exact token match over a prefix fallback;
//! within each class the first token in scan order (page ascending, then
//! stream order) wins. The date anchor matches one specific underscore
//! glyph run by exact geometry and is optional.

use crate::config::TemplateCalibration;
use crate::error::{AppError, Result};

use super::scanner::TextToken;

/// A located position in a template's text layer
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
    pub page: u32,
    pub source_text: String,
}

impl Anchor {
    fn from_token(token: &TextToken) -> Self {
        Anchor {
            x: token.x,
            y: token.y,
            page: token.page,
            source_text: token.text.clone(),
        }
    }
}

/// Result of an anchor scan over one template
#[derive(Debug, Clone)]
pub struct ResolvedAnchors {
    pub signature: Anchor,
    /// Absent when the template has no recognizable date line
    pub date: Option<Anchor>,
}

/// Accumulator for the scan fold; keeps only the first candidate of
/// each class.
#[derive(Default)]
struct AnchorScan {
    exact: Option<Anchor>,
    fallback: Option<Anchor>,
    date: Option<Anchor>,
}

impl AnchorScan {
    fn observe(&mut self, token: &TextToken, cal: &TemplateCalibration) {
        let normalized: String = token
            .text
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        if normalized == cal.signature_token {
            if self.exact.is_none() {
                self.exact = Some(Anchor::from_token(token));
            }
        } else if normalized.starts_with(&cal.signature_prefix) && self.fallback.is_none() {
            self.fallback = Some(Anchor::from_token(token));
        }

        if self.date.is_none() && is_date_underline(token, cal) {
            self.date = Some(Anchor::from_token(token));
        }
    }

    fn finish(self) -> Result<ResolvedAnchors> {
        let signature = self.exact.or(self.fallback).ok_or_else(|| {
            AppError::AnchorNotFound(
                "template has no signature line the scanner recognizes".to_string(),
            )
        })?;

        Ok(ResolvedAnchors {
            signature,
            date: self.date,
        })
    }
}

fn is_date_underline(token: &TextToken, cal: &TemplateCalibration) -> bool {
    token.text.len() == cal.date_underscore_len
        && token.text.bytes().all(|b| b == b'_')
        && (token.x - cal.date_expected_x).abs() <= cal.date_tolerance
        && (token.y - cal.date_expected_y).abs() <= cal.date_tolerance
        && (token.width - cal.date_expected_width).abs() <= cal.date_tolerance
}

/// Fold a token stream into resolved anchors.
///
/// Fails with `AnchorNotFound` when no signature candidate exists; a
/// missing date line is not an error. A scan error from the underlying
/// stream aborts resolution.
pub fn resolve_anchors<I>(tokens: I, cal: &TemplateCalibration) -> Result<ResolvedAnchors>
where
    I: IntoIterator<Item = Result<TextToken>>,
{
    let mut scan = AnchorScan::default();
    for token in tokens {
        scan.observe(&token?, cal);
    }
    scan.finish()
}
