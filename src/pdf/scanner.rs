//! PDF text-layer scanner
//!
//! Walks a document's content streams and yields one token per shown text
//! run, with its page number and position in text-layer units. The text
//! layer is a percentage-like space: the full page spans 0..50 units on
//! each axis, origin top-left, growing downward. Positions are recovered
//! from the text-positioning operators (Td/TD/Tm); rotation and skew are
//! not modeled, which is sufficient for the flat waiver templates this
//! server stamps.

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

use crate::error::{AppError, Result};

/// Full-page extent of the text layer, per axis
pub const TEXT_LAYER_SPAN: f64 = 50.0;

/// Average Helvetica glyph advance as a fraction of the font size
const AVG_GLYPH_WIDTH: f64 = 0.5;

/// A text run with its page and text-layer position
#[derive(Debug, Clone, PartialEq)]
pub struct TextToken {
    /// 1-based page number
    pub page: u32,
    pub text: String,
    pub x: f64,
    pub y: f64,
    /// Approximate rendered width in text-layer units
    pub width: f64,
}

/// Page dimensions in PDF user-space points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Lazy forward-only token stream over a document.
///
/// Pages are decoded one at a time as the iterator advances; iterator
/// exhaustion is the completion signal. A malformed page surfaces as an
/// `Err` item, after which the stream fuses.
pub struct TokenStream<'a> {
    doc: &'a Document,
    pages: std::vec::IntoIter<(u32, ObjectId)>,
    current: std::vec::IntoIter<TextToken>,
    failed: bool,
}

impl<'a> TokenStream<'a> {
    pub fn new(doc: &'a Document) -> Self {
        let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
        TokenStream {
            doc,
            pages: pages.into_iter(),
            current: Vec::new().into_iter(),
            failed: false,
        }
    }
}

impl Iterator for TokenStream<'_> {
    type Item = Result<TextToken>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(token) = self.current.next() {
                return Some(Ok(token));
            }
            match self.pages.next() {
                Some((number, page_id)) => match scan_page(self.doc, number, page_id) {
                    Ok(tokens) => self.current = tokens.into_iter(),
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                },
                None => return None,
            }
        }
    }
}

/// Resolve a page's MediaBox, following Parent inheritance
pub fn page_size(doc: &Document, page_id: ObjectId) -> Result<PageSize> {
    let mut dict = doc.get_dictionary(page_id)?;
    loop {
        if let Ok(obj) = dict.get(b"MediaBox") {
            let array = match obj {
                Object::Array(a) => a.clone(),
                Object::Reference(id) => doc.get_object(*id)?.as_array()?.clone(),
                _ => {
                    return Err(AppError::Internal(
                        "MediaBox is not an array".to_string(),
                    ))
                }
            };
            let nums: Vec<f64> = array.iter().filter_map(number).collect();
            if nums.len() == 4 {
                return Ok(PageSize {
                    width: nums[2] - nums[0],
                    height: nums[3] - nums[1],
                });
            }
            return Err(AppError::Internal("Malformed MediaBox".to_string()));
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(id)) => dict = doc.get_dictionary(*id)?,
            // US Letter default when no MediaBox is declared anywhere
            _ => {
                return Ok(PageSize {
                    width: 612.0,
                    height: 792.0,
                })
            }
        }
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Latin-1 style decoding; anchor text is plain ASCII in practice
fn decode_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn scan_page(doc: &Document, page_number: u32, page_id: ObjectId) -> Result<Vec<TextToken>> {
    let size = page_size(doc, page_id)?;
    let content_data = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_data)?;

    let mut tokens = Vec::new();

    // Text state: translation from Td/TD/Tm, font size from Tf
    let mut tx = 0.0_f64;
    let mut ty = 0.0_f64;
    let mut font_size = 12.0_f64;

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => {
                tx = 0.0;
                ty = 0.0;
            }
            "Tf" => {
                if let Some(size) = op.operands.get(1).and_then(number) {
                    font_size = size;
                }
            }
            "Td" | "TD" => {
                if let (Some(dx), Some(dy)) = (
                    op.operands.first().and_then(number),
                    op.operands.get(1).and_then(number),
                ) {
                    tx += dx;
                    ty += dy;
                }
            }
            "Tm" => {
                if let (Some(e), Some(f)) = (
                    op.operands.get(4).and_then(number),
                    op.operands.get(5).and_then(number),
                ) {
                    tx = e;
                    ty = f;
                }
            }
            "Tj" | "'" => {
                if let Some(Object::String(bytes, _)) = op.operands.last() {
                    push_token(&mut tokens, page_number, &size, tx, ty, font_size, bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(parts)) = op.operands.first() {
                    let mut combined = Vec::new();
                    for part in parts {
                        if let Object::String(bytes, _) = part {
                            combined.extend_from_slice(bytes);
                        }
                    }
                    if !combined.is_empty() {
                        push_token(
                            &mut tokens,
                            page_number,
                            &size,
                            tx,
                            ty,
                            font_size,
                            &combined,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    Ok(tokens)
}

fn push_token(
    tokens: &mut Vec<TextToken>,
    page: u32,
    size: &PageSize,
    tx: f64,
    ty: f64,
    font_size: f64,
    bytes: &[u8],
) {
    let text = decode_text(bytes);
    let user_width = text.chars().count() as f64 * font_size * AVG_GLYPH_WIDTH;
    tokens.push(TextToken {
        page,
        text,
        x: tx * TEXT_LAYER_SPAN / size.width,
        y: (size.height - ty) * TEXT_LAYER_SPAN / size.height,
        width: user_width * TEXT_LAYER_SPAN / size.width,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testutil::{build_pdf, build_pdf_pages, text_layer};
    use lopdf::Document;

    #[test]
    fn test_scan_single_token_position() {
        let bytes = build_pdf(&[("Signature", 100.0, 150.0)]);
        let doc = Document::load_mem(&bytes).unwrap();

        let tokens: Vec<TextToken> = TokenStream::new(&doc)
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].page, 1);
        assert_eq!(tokens[0].text, "Signature");

        let (x, y) = text_layer(100.0, 150.0);
        assert!((tokens[0].x - x).abs() < 1e-6);
        assert!((tokens[0].y - y).abs() < 1e-6);
        assert!(tokens[0].width > 0.0);
    }

    #[test]
    fn test_scan_pages_in_order() {
        let bytes = build_pdf_pages(&[
            &[("first page", 50.0, 700.0)],
            &[("second page", 50.0, 700.0)],
        ]);
        let doc = Document::load_mem(&bytes).unwrap();

        let tokens: Vec<TextToken> = TokenStream::new(&doc)
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].page, 1);
        assert_eq!(tokens[1].page, 2);
    }

    #[test]
    fn test_page_size_from_media_box() {
        let bytes = build_pdf(&[]);
        let doc = Document::load_mem(&bytes).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();

        let size = page_size(&doc, page_id).unwrap();
        assert_eq!(size.width, 612.0);
        assert_eq!(size.height, 792.0);
    }

    #[test]
    fn test_malformed_pdf_is_a_scan_error() {
        assert!(Document::load_mem(b"not a pdf").is_err());
    }
}
