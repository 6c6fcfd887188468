//! PDF waiver processing
//!
//! Scans a waiver template's text layer to locate the signature and date
//! anchors, transforms them into page render coordinates, and stamps the
//! signature overlay onto a fresh copy of the template per participant.

mod anchor;
mod compositor;
mod scanner;
mod transform;

pub use anchor::{resolve_anchors, Anchor, ResolvedAnchors};
pub use compositor::{compose_signed_waiver, SignatureOverlay};
pub use scanner::{page_size, PageSize, TextToken, TokenStream};
pub use transform::{date_render_point, signature_render_point, RenderPoint};

#[cfg(test)]
pub mod testutil {
    //! Builders for small in-memory PDFs used across the pdf tests

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    pub const PAGE_WIDTH: f64 = 612.0;
    pub const PAGE_HEIGHT: f64 = 792.0;

    /// Build a single-page letter-size PDF with the given text runs at
    /// user-space positions.
    pub fn build_pdf(texts: &[(&str, f64, f64)]) -> Vec<u8> {
        build_pdf_pages(&[texts])
    }

    /// Build a multi-page PDF; one entry per page.
    pub fn build_pdf_pages(pages: &[&[(&str, f64, f64)]]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for texts in pages {
            let mut operations = Vec::new();
            for (text, x, y) in texts.iter() {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
                operations.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(*text)],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// Text-layer coordinates for a user-space position on the test page
    pub fn text_layer(x: f64, y: f64) -> (f64, f64) {
        (
            x * 50.0 / PAGE_WIDTH,
            (PAGE_HEIGHT - y) * 50.0 / PAGE_HEIGHT,
        )
    }
}
