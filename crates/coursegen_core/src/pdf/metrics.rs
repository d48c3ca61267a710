//! Glyph widths for the standard Type1 fonts used in exported documents.
//!
//! Widths are in thousandths of the font size, taken from the Adobe core font
//! metrics for every glyph `encode::to_win_ansi` can emit: printable ASCII,
//! the WinAnsi punctuation block and Latin-1. Helvetica-Oblique shares the
//! Helvetica widths and every Courier glyph is 600 wide.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFace {
    Regular,
    Bold,
    Italic,
    Mono,
}

impl FontFace {
    pub fn base_font(self) -> &'static str {
        match self {
            FontFace::Regular => "Helvetica",
            FontFace::Bold => "Helvetica-Bold",
            FontFace::Italic => "Helvetica-Oblique",
            FontFace::Mono => "Courier",
        }
    }

    /// Resource name used inside page content streams.
    pub fn resource_name(self) -> &'static str {
        match self {
            FontFace::Regular => "F1",
            FontFace::Bold => "F2",
            FontFace::Italic => "F3",
            FontFace::Mono => "F4",
        }
    }

    pub const ALL: [FontFace; 4] = [
        FontFace::Regular,
        FontFace::Bold,
        FontFace::Italic,
        FontFace::Mono,
    ];
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

/// U+00A0 through U+00FF.
#[rustfmt::skip]
const HELVETICA_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

#[rustfmt::skip]
const HELVETICA_BOLD_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278,
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556,
];

const COURIER_WIDTH: u16 = 600;

/// Widths of the WinAnsi 0x80-0x9F glyphs that text is mapped onto.
fn punctuation_width(bold: bool, ch: char) -> Option<u16> {
    let width = match ch {
        '\u{2022}' => 350,
        '\u{2013}' => 556,
        '\u{2014}' | '\u{2026}' => 1000,
        '\u{2018}' | '\u{2019}' if bold => 278,
        '\u{2018}' | '\u{2019}' => 222,
        '\u{201C}' | '\u{201D}' if bold => 500,
        '\u{201C}' | '\u{201D}' => 333,
        _ => return None,
    };
    Some(width)
}

fn glyph_width(face: FontFace, ch: char) -> u16 {
    if face == FontFace::Mono {
        return COURIER_WIDTH;
    }
    let bold = face == FontFace::Bold;
    let (ascii, latin1) = if bold {
        (&HELVETICA_BOLD, &HELVETICA_BOLD_LATIN1)
    } else {
        (&HELVETICA, &HELVETICA_LATIN1)
    };
    match ch {
        ' '..='~' => ascii[ch as usize - 32],
        '\u{A0}'..='\u{FF}' => latin1[ch as usize - 0xA0],
        // Anything else is drawn as '?'.
        _ => punctuation_width(bold, ch).unwrap_or(ascii['?' as usize - 32]),
    }
}

/// Width of `text` in points when set in `face` at `size`.
pub fn text_width(face: FontFace, size: f32, text: &str) -> f32 {
    let units: u32 = text.chars().map(|c| glyph_width(face, c) as u32).sum();
    units as f32 * size / 1000.0
}

/// Line advance used throughout the layout: 1.4 × size, never below 14pt.
pub fn line_height(size: f32) -> f32 {
    (size * 1.4).round().max(14.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_the_metric_tables() {
        assert_eq!(text_width(FontFace::Regular, 10.0, "Hi"), (722.0 + 222.0) / 100.0);
        assert_eq!(text_width(FontFace::Bold, 10.0, "Hi"), (722.0 + 278.0) / 100.0);
        assert_eq!(text_width(FontFace::Mono, 10.0, "iiii"), 24.0);
        assert_eq!(text_width(FontFace::Italic, 12.0, "x"), text_width(FontFace::Regular, 12.0, "x"));
    }

    #[test]
    fn typographic_punctuation_uses_its_real_width() {
        assert_eq!(text_width(FontFace::Regular, 10.0, "\u{2014}"), 10.0);
        assert_eq!(text_width(FontFace::Bold, 10.0, "\u{2026}"), 10.0);
        assert_eq!(text_width(FontFace::Regular, 10.0, "\u{2019}"), 2.22);
        assert_eq!(text_width(FontFace::Regular, 10.0, "\u{2022}"), 3.5);
        assert_eq!(text_width(FontFace::Regular, 10.0, "\u{E9}"), 5.56);
        assert_eq!(text_width(FontFace::Bold, 10.0, "\u{C6}"), 10.0);
        // Unmappable glyphs are drawn and measured as '?'.
        assert_eq!(
            text_width(FontFace::Bold, 10.0, "\u{4E2D}"),
            text_width(FontFace::Bold, 10.0, "?")
        );
    }

    #[test]
    fn line_height_has_a_floor() {
        assert_eq!(line_height(8.0), 14.0);
        assert_eq!(line_height(12.0), 17.0);
        assert_eq!(line_height(18.0), 25.0);
    }
}
