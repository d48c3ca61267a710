//! Printable export of a module: layout, then PDF encoding.

pub mod encode;
pub mod layout;
pub mod metrics;

use std::sync::LazyLock;

use regex::Regex;

pub use encode::PdfError;
pub use layout::{layout_module, LaidOutDocument, PageGeometry};

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_\- ]").expect("valid file name regex"));

/// Renders the module title, lesson and (optional) quiz into a PDF.
pub fn render_pdf(title: &str, lesson: &str, quiz_raw: &str) -> Result<Vec<u8>, PdfError> {
    let laid_out = layout_module(title, lesson, quiz_raw);
    tracing::debug!(pages = laid_out.pages.len(), "Laid out module PDF");
    encode::encode(&laid_out)
}

/// Download name for a module export, e.g. `Ownership & Borrowing` →
/// `Ownership  Borrowing.pdf`.
pub fn export_file_name(title: &str) -> String {
    let stem = UNSAFE_FILE_CHARS.replace_all(title, "");
    let stem = stem.trim();
    if stem.is_empty() {
        "module.pdf".to_string()
    } else {
        format!("{stem}.pdf")
    }
}
