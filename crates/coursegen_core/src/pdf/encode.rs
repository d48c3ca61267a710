//! Serializes a laid-out document into PDF bytes.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use thiserror::Error;

use super::layout::{DrawOp, LaidOutDocument, Page, Rgb};
use super::metrics::FontFace;

/// Baseline offset below the top of a text line, as a fraction of font size.
const ASCENT: f32 = 0.8;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF assembly error: {0}")]
    Lopdf(#[from] lopdf::Error),

    #[error("PDF write error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maps text onto WinAnsiEncoding. Latin-1 passes through, a few typographic
/// characters map into the 0x80 block, and the rest becomes `?`.
pub fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2026}' => 0x85,
            c if (c as u32) < 0x80 && !c.is_control() => c as u8,
            c if (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => b'?',
        })
        .collect()
}

fn color_operands(Rgb(r, g, b): Rgb) -> Vec<Object> {
    [r, g, b]
        .iter()
        .map(|c| Object::Real(*c as f32 / 255.0))
        .collect()
}

fn page_operations(page: &Page, page_height: f32) -> Vec<Operation> {
    let mut ops = Vec::new();
    for op in &page.ops {
        match op {
            DrawOp::Rect { x, y, width, height, fill } => {
                ops.push(Operation::new("rg", color_operands(*fill)));
                ops.push(Operation::new(
                    "re",
                    vec![
                        (*x).into(),
                        (page_height - y - height).into(),
                        (*width).into(),
                        (*height).into(),
                    ],
                ));
                ops.push(Operation::new("f", vec![]));
            }
            DrawOp::Text { x, y, face, size, color, text } => {
                let baseline = page_height - y - ASCENT * size;
                ops.push(Operation::new("rg", color_operands(*color)));
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![face.resource_name().into(), (*size).into()]));
                ops.push(Operation::new("Td", vec![(*x).into(), baseline.into()]));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::String(to_win_ansi(text), StringFormat::Literal)],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
        }
    }
    ops
}

/// Builds the PDF: one Type1 font per face, one content stream per page.
pub fn encode(document: &LaidOutDocument) -> Result<Vec<u8>, PdfError> {
    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();

    let mut fonts = lopdf::Dictionary::new();
    for face in FontFace::ALL {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => face.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(face.resource_name(), font_id);
    }
    let resources_id = doc.add_object(dictionary! {
        "Font" => fonts,
    });

    let geometry = document.geometry;
    let mut kids = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = Content {
            operations: page_operations(page, geometry.height),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                geometry.width.into(),
                geometry.height.into(),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}
