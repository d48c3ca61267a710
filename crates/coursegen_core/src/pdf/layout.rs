//! Page layout for exported modules.
//!
//! Markdown is interpreted line by line and turned into positioned draw
//! operations. Coordinates are measured from the top-left corner of the page
//! with `y` marking the top of a line; the encoder flips them for PDF.

use std::sync::LazyLock;

use regex::Regex;

use super::metrics::{line_height, text_width, FontFace};

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,2}\s*(.+)").expect("valid heading regex"));
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([*\-+]|\d+\.)\s+(.*)$").expect("valid list item regex"));
static INLINE_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*([^*]+)\*\*|\*([^*]+)\*").expect("valid inline span regex")
});

const BODY_SIZE: f32 = 12.0;
const CODE_SIZE: f32 = 11.0;
const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 16.0;
const QUIZ_HEADER_SIZE: f32 = 14.0;
const MIN_HEADING_SIZE: f32 = 10.0;
const HEADING_GAP: f32 = 6.0;
const LIST_INDENT: f32 = 18.0;
const CODE_PAD_H: f32 = 8.0;
const CODE_PAD_V: f32 = 6.0;
const CODE_MIN_RECT: f32 = 40.0;

pub const BLACK: Rgb = Rgb(0, 0, 0);
const CODE_FILL: Rgb = Rgb(30, 41, 59);
const CODE_TEXT: Rgb = Rgb(173, 216, 230);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PageGeometry {
    /// A4 in points with a 40pt margin.
    pub const A4: PageGeometry = PageGeometry {
        width: 595.28,
        height: 841.89,
        margin: 40.0,
    };

    pub fn usable_width(&self) -> f32 {
        self.width - self.margin * 2.0
    }

    pub fn right_bound(&self) -> f32 {
        self.width - self.margin
    }

    /// Lowest `y` any line may reach.
    pub fn bottom(&self) -> f32 {
        self.height - self.margin
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        face: FontFace,
        size: f32,
        color: Rgb,
        text: String,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Rgb,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutDocument {
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
}

/// Lays out a module: title, lesson body, then the quiz section when present.
pub fn layout_module(title: &str, lesson: &str, quiz_raw: &str) -> LaidOutDocument {
    layout_module_with(PageGeometry::A4, title, lesson, quiz_raw)
}

pub fn layout_module_with(
    geometry: PageGeometry,
    title: &str,
    lesson: &str,
    quiz_raw: &str,
) -> LaidOutDocument {
    let mut layout = Layout::new(geometry);

    let title = title.trim();
    let title = if title.is_empty() { "Module" } else { title };
    layout.fitted_block(title, TITLE_SIZE);

    layout.markdown(lesson);

    if !quiz_raw.trim().is_empty() {
        layout.y += 10.0;
        layout.wrapped_text("Quiz Questions", FontFace::Bold, QUIZ_HEADER_SIZE, geometry.margin);
        layout.y += HEADING_GAP;
        layout.markdown(quiz_raw);
    }

    layout.finish()
}

//=========================================================================================
// Text Measurement Helpers
//=========================================================================================

/// Breaks a token into the longest prefixes that fit `max_width`. A single
/// glyph wider than the limit still gets its own piece.
pub fn split_long_token(token: &str, face: FontFace, size: f32, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut chunk = String::new();
    for ch in token.chars() {
        let mut candidate = chunk.clone();
        candidate.push(ch);
        if text_width(face, size, &candidate) > max_width {
            if chunk.is_empty() {
                pieces.push(candidate);
            } else {
                pieces.push(std::mem::take(&mut chunk));
                chunk.push(ch);
            }
        } else {
            chunk = candidate;
        }
    }
    if !chunk.is_empty() {
        pieces.push(chunk);
    }
    pieces
}

/// Greedy word wrap. With `split_long` set, words wider than `max_width` are
/// cut by [`split_long_token`]; otherwise they are left whole on their own line.
pub fn wrap_words(text: &str, face: FontFace, size: f32, max_width: f32, split_long: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let pieces = if split_long && text_width(face, size, word) > max_width {
            split_long_token(word, face, size, max_width)
        } else {
            vec![word.to_string()]
        };
        for piece in pieces {
            let candidate = if current.is_empty() {
                piece.clone()
            } else {
                format!("{current} {piece}")
            };
            if current.is_empty() || text_width(face, size, &candidate) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, piece));
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Shrinks the font one point at a time from `preferred` until the widest
/// wrapped line fits, stopping at `min`. At the floor long words are cut.
pub fn fit_text_to_width(
    text: &str,
    face: FontFace,
    preferred: f32,
    min: f32,
    max_width: f32,
) -> (f32, Vec<String>) {
    let mut size = preferred;
    while size >= min {
        let lines = wrap_words(text, face, size, max_width, false);
        let widest = lines
            .iter()
            .map(|l| text_width(face, size, l))
            .fold(0.0_f32, f32::max);
        if widest <= max_width + 0.001 {
            return (size, lines);
        }
        size -= 1.0;
    }
    (min, wrap_words(text, face, min, max_width, true))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

/// Splits a line into plain, `**bold**` and `*italic*` runs.
pub fn parse_inline(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;
    for caps in INLINE_SPAN.captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            spans.push(Span {
                text: line[last..whole.start()].to_string(),
                bold: false,
                italic: false,
            });
        }
        match (caps.get(1), caps.get(2)) {
            (Some(bold), _) => spans.push(Span {
                text: bold.as_str().to_string(),
                bold: true,
                italic: false,
            }),
            (None, Some(italic)) => spans.push(Span {
                text: italic.as_str().to_string(),
                bold: false,
                italic: true,
            }),
            (None, None) => {}
        }
        last = whole.end();
    }
    if last < line.len() {
        spans.push(Span {
            text: line[last..].to_string(),
            bold: false,
            italic: false,
        });
    }
    spans
}

//=========================================================================================
// The Layout Cursor
//=========================================================================================

struct Layout {
    geometry: PageGeometry,
    pages: Vec<Page>,
    y: f32,
    in_code_block: bool,
}

impl Layout {
    fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![Page::default()],
            y: geometry.margin,
            in_code_block: false,
        }
    }

    fn finish(self) -> LaidOutDocument {
        LaidOutDocument {
            geometry: self.geometry,
            pages: self.pages,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = self.geometry.margin;
    }

    /// Starts a new page when `height` more points would pass the bottom margin.
    fn ensure_space_for(&mut self, height: f32) {
        if self.y + height > self.geometry.bottom() && self.y > self.geometry.margin {
            self.new_page();
        }
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn text(&mut self, x: f32, face: FontFace, size: f32, color: Rgb, text: &str) {
        self.push(DrawOp::Text {
            x,
            y: self.y,
            face,
            size,
            color,
            text: text.to_string(),
        });
    }

    /// Title and headings: shrink to fit, keep the block together when it fits
    /// on one page.
    fn fitted_block(&mut self, text: &str, preferred: f32) {
        let (size, lines) = fit_text_to_width(
            text,
            FontFace::Bold,
            preferred,
            MIN_HEADING_SIZE,
            self.geometry.usable_width(),
        );
        let lh = line_height(size);
        self.ensure_space_for(lines.len() as f32 * lh + HEADING_GAP);
        for line in &lines {
            self.ensure_space_for(lh);
            self.text(self.geometry.margin, FontFace::Bold, size, BLACK, line);
            self.y += lh;
        }
        self.y += HEADING_GAP;
    }

    fn wrapped_text(&mut self, text: &str, face: FontFace, size: f32, start_x: f32) {
        let lh = line_height(size);
        let width = self.geometry.right_bound() - start_x;
        let lines = wrap_words(text, face, size, width, true);
        if lines.is_empty() {
            self.ensure_space_for(lh);
        }
        for line in &lines {
            self.ensure_space_for(lh);
            self.text(start_x, face, size, BLACK, line);
            self.y += lh;
        }
        if lines.is_empty() {
            self.y += lh;
        }
    }

    /// Mixed-style runs wrapped word by word against the right margin.
    fn inline_spans(&mut self, spans: &[Span], size: f32, start_x: f32) {
        let lh = line_height(size);
        let right = self.geometry.right_bound();
        let available = right - start_x;
        let space = text_width(FontFace::Regular, size, " ");
        let mut x = start_x;

        self.ensure_space_for(lh);
        for span in spans {
            let face = if span.bold {
                FontFace::Bold
            } else if span.italic {
                FontFace::Italic
            } else {
                FontFace::Regular
            };

            let mut chars = span.text.char_indices().peekable();
            while let Some(&(start, ch)) = chars.peek() {
                if ch.is_whitespace() {
                    let mut count = 0;
                    while chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
                        chars.next();
                        count += 1;
                    }
                    let width = space * count as f32;
                    if width > right - x {
                        self.next_line(&mut x, start_x, lh);
                    } else {
                        x += width;
                    }
                    continue;
                }

                let mut end = span.text.len();
                while let Some(&(idx, c)) = chars.peek() {
                    if c.is_whitespace() {
                        end = idx;
                        break;
                    }
                    chars.next();
                }
                let word = &span.text[start..end];

                let pieces = if text_width(face, size, word) > available {
                    split_long_token(word, face, size, available)
                } else {
                    vec![word.to_string()]
                };
                for piece in pieces {
                    let width = text_width(face, size, &piece);
                    if width > right - x && x > start_x {
                        self.next_line(&mut x, start_x, lh);
                    }
                    self.text(x, face, size, BLACK, &piece);
                    x += width;
                }
            }
        }
        self.y += lh;
    }

    fn next_line(&mut self, x: &mut f32, start_x: f32, lh: f32) {
        self.y += lh;
        self.ensure_space_for(lh);
        *x = start_x;
    }

    fn code_line(&mut self, raw: &str) {
        let lh = line_height(CODE_SIZE);
        let margin = self.geometry.margin;
        let usable = self.geometry.usable_width();
        let normalized = raw.replace('\t', "    ");

        let char_width = text_width(FontFace::Mono, CODE_SIZE, " ");
        let per_line = (((usable - CODE_PAD_H * 2.0) / char_width).floor() as usize).max(1);
        let chars: Vec<char> = normalized.chars().collect();
        let chunks: Vec<String> = if chars.is_empty() {
            vec![String::new()]
        } else {
            chars.chunks(per_line).map(|c| c.iter().collect()).collect()
        };

        for chunk in chunks {
            self.ensure_space_for(lh + CODE_PAD_V);
            let text_w = text_width(FontFace::Mono, CODE_SIZE, &chunk).min(usable);
            let rect_w = (text_w + CODE_PAD_H * 2.0).min(usable).max(CODE_MIN_RECT);
            self.push(DrawOp::Rect {
                x: margin - CODE_PAD_H / 2.0,
                y: self.y - CODE_PAD_V / 2.0,
                width: rect_w,
                height: lh + CODE_PAD_V,
                fill: CODE_FILL,
            });
            if !chunk.trim().is_empty() {
                self.text(margin + 2.0, FontFace::Mono, CODE_SIZE, CODE_TEXT, &chunk);
            }
            self.y += lh;
        }
    }

    fn markdown(&mut self, markdown: &str) {
        let margin = self.geometry.margin;
        for raw in markdown.lines() {
            if self.y > self.geometry.bottom() {
                self.new_page();
            }

            if raw.trim().starts_with("```") {
                self.in_code_block = !self.in_code_block;
                if !self.in_code_block {
                    self.y += line_height(CODE_SIZE);
                }
                continue;
            }
            if self.in_code_block {
                self.code_line(raw);
                continue;
            }

            if let Some(caps) = HEADING.captures(raw) {
                let text = caps[1].trim_start_matches('#').replace("**", "");
                let text = text.trim();
                if !text.is_empty() {
                    self.fitted_block(text, HEADING_SIZE);
                    continue;
                }
            }

            if let Some(caps) = LIST_ITEM.captures(raw) {
                let lh = line_height(BODY_SIZE);
                self.ensure_space_for(lh);
                self.text(margin, FontFace::Regular, BODY_SIZE, BLACK, "\u{2022}");
                let spans = strip_markers(parse_inline(&caps[2]));
                self.inline_spans(&spans, BODY_SIZE, margin + LIST_INDENT);
                continue;
            }

            let spans = strip_markers(parse_inline(raw));
            match spans.as_slice() {
                [] => self.wrapped_text("", FontFace::Regular, BODY_SIZE, margin),
                [only] if !only.bold && !only.italic => {
                    let text = only.text.clone();
                    self.wrapped_text(&text, FontFace::Regular, BODY_SIZE, margin);
                }
                _ => self.inline_spans(&spans, BODY_SIZE, margin),
            }
        }
    }
}

/// Drops stray `*` left over from unbalanced emphasis.
fn strip_markers(spans: Vec<Span>) -> Vec<Span> {
    spans
        .into_iter()
        .map(|s| Span {
            text: s.text.replace('*', ""),
            ..s
        })
        .collect()
}
