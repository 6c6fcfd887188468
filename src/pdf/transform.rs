//! Text-layer to render-space coordinate transforms
//!
//! Anchors live in the percentage-like text-layer space (origin top-left,
//! growing downward); stamping happens in page render space (points,
//! origin bottom-left, growing upward). The scale factors are calibration
//! values for a template family, not physical constants.

use crate::config::TemplateCalibration;

use super::anchor::Anchor;
use super::scanner::PageSize;

/// A position in page render space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPoint {
    pub x: f64,
    pub y: f64,
    pub page: u32,
}

/// Transform the signature anchor into render space
pub fn signature_render_point(
    anchor: &Anchor,
    page: &PageSize,
    cal: &TemplateCalibration,
) -> RenderPoint {
    RenderPoint {
        x: anchor.x / 100.0 * cal.signature_scale_x * page.width,
        y: page.height - anchor.y / 100.0 * cal.signature_scale_y * page.height,
        page: anchor.page,
    }
}

/// Transform the date anchor into render space.
///
/// Uses the date-line scale factors, which differ from the signature
/// scales because the date underline was calibrated against a different
/// template assumption.
pub fn date_render_point(
    anchor: &Anchor,
    page: &PageSize,
    cal: &TemplateCalibration,
) -> RenderPoint {
    RenderPoint {
        x: anchor.x / 100.0 * cal.date_scale_x * page.width,
        y: page.height - anchor.y / 100.0 * cal.date_scale_y * page.height,
        page: anchor.page,
    }
}
