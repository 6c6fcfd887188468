//! Waiver compositor
//!
//! Stamps the signature overlay onto a fresh copy of the template for one
//! participant: optional date text, the raster signature image, the
//! guardian's name centered under the image, and the participant's name
//! centered below that. Each participant gets an untouched reload of the
//! template bytes, so a failed stamp never contaminates the next one.

use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::config::TemplateCalibration;
use crate::error::{AppError, Result};

use super::transform::RenderPoint;

// Resource names namespaced to avoid clashing with the template's own
const FONT_NAME: &str = "ThOverlayF";
const IMAGE_NAME: &str = "ThOverlaySig";

/// Per-batch stamping inputs shared by every participant
pub struct SignatureOverlay<'a> {
    pub template: &'a [u8],
    pub signature: &'a DynamicImage,
    pub guardian_name: &'a str,
    pub signature_at: RenderPoint,
    pub date_at: Option<RenderPoint>,
    pub date_text: &'a str,
}

/// Produce one participant's signed artifact
pub fn compose_signed_waiver(
    overlay: &SignatureOverlay<'_>,
    participant_name: &str,
    cal: &TemplateCalibration,
) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(overlay.template)?;
    let pages = doc.get_pages();

    let sig_page = *pages
        .get(&overlay.signature_at.page)
        .ok_or(AppError::Pdf(lopdf::Error::PageNumberNotFound(
            overlay.signature_at.page,
        )))?;

    // Date goes on its own anchor's page, which may differ from the
    // signature page
    if let Some(date_at) = &overlay.date_at {
        let date_page = *pages
            .get(&date_at.page)
            .ok_or(AppError::Pdf(lopdf::Error::PageNumberNotFound(date_at.page)))?;
        ensure_font(&mut doc, date_page)?;
        append_operations(
            &mut doc,
            date_page,
            text_ops(cal.date_font_size, date_at.x, date_at.y, overlay.date_text),
        )?;
    }

    ensure_font(&mut doc, sig_page)?;
    let (img_width, img_height) = embed_signature_image(&mut doc, sig_page, overlay.signature)?;

    let scale = cal.signature_image_scale as f64;
    let stamped_width = img_width as f64 * scale;
    let stamped_height = img_height as f64 * scale;

    let sig_x = overlay.signature_at.x;
    let sig_y = overlay.signature_at.y;

    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                stamped_width.into(),
                0.0_f64.into(),
                0.0_f64.into(),
                stamped_height.into(),
                sig_x.into(),
                sig_y.into(),
            ],
        ),
        Operation::new("Do", vec![IMAGE_NAME.into()]),
        Operation::new("Q", vec![]),
    ];

    let center_x = sig_x + stamped_width / 2.0;

    let guardian_y = sig_y - (stamped_height + cal.guardian_name_gap);
    ops.extend(text_ops(
        cal.name_font_size,
        centered_x(center_x, overlay.guardian_name, cal.name_font_size),
        guardian_y,
        overlay.guardian_name,
    ));

    let participant_y = guardian_y - (cal.name_font_size + cal.participant_name_gap);
    ops.extend(text_ops(
        cal.name_font_size,
        centered_x(center_x, participant_name, cal.name_font_size),
        participant_y,
        participant_name,
    ));

    append_operations(&mut doc, sig_page, ops)?;

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}

/// Approximate centering for Helvetica; average glyph advance is about
/// half the font size
fn centered_x(center: f64, text: &str, font_size: f64) -> f64 {
    let width = text.chars().count() as f64 * font_size * 0.5;
    center - width / 2.0
}

fn text_ops(font_size: f64, x: f64, y: f64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![FONT_NAME.into(), font_size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Register the overlay font in a page's resources, once
fn ensure_font(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    {
        let resources = doc.get_or_create_resources(page_id)?.as_dict_mut()?;
        if !resources.has(b"Font") {
            resources.set("Font", Dictionary::new());
        }
        if resources.get(b"Font")?.as_dict()?.has(FONT_NAME.as_bytes()) {
            return Ok(());
        }
    }

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    doc.get_or_create_resources(page_id)?
        .as_dict_mut()?
        .get_mut(b"Font")?
        .as_dict_mut()?
        .set(FONT_NAME, Object::Reference(font_id));

    Ok(())
}

/// Embed the signature raster as an image XObject on a page, returning
/// its native pixel dimensions
fn embed_signature_image(
    doc: &mut Document,
    page_id: ObjectId,
    signature: &DynamicImage,
) -> Result<(u32, u32)> {
    let rgb = signature.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    );
    // Raw pixels are valid without a filter; compression is just smaller
    let _ = stream.compress();
    let image_id = doc.add_object(Object::Stream(stream));

    let resources = doc.get_or_create_resources(page_id)?.as_dict_mut()?;
    if !resources.has(b"XObject") {
        resources.set("XObject", Dictionary::new());
    }
    resources
        .get_mut(b"XObject")?
        .as_dict_mut()?
        .set(IMAGE_NAME, Object::Reference(image_id));

    Ok((width, height))
}

fn append_operations(doc: &mut Document, page_id: ObjectId, ops: Vec<Operation>) -> Result<()> {
    let existing = doc.get_page_content(page_id)?;
    let mut content = Content::decode(&existing)?;
    content.operations.extend(ops);
    let encoded = content.encode()?;
    doc.change_page_content(page_id, encoded)?;
    Ok(())
}
