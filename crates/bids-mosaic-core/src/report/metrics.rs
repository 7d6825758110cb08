//! Helvetica advance widths and line wrapping.

/// Advance widths (1/1000 em) of the standard Helvetica AFM, ASCII 32..=126
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

/// Width used for characters outside the table
const DEFAULT_WIDTH: u16 = 556;

fn char_width(c: char) -> f32 {
    let units = match c as u32 {
        code @ 32..=126 => HELVETICA_WIDTHS[(code - 32) as usize],
        _ => DEFAULT_WIDTH,
    };
    f32::from(units) / 1000.0
}

/// Width of `text` in points at `font_size`
#[must_use]
pub fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width).sum::<f32>() * font_size
}

/// Break `text` wherever the next character would overflow `max_width`.
///
/// Every line holds at least one character, so a column narrower than a
/// single glyph still terminates.
#[must_use]
pub fn wrap_chars(text: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut width = 0.0;

    for c in text.chars() {
        let w = char_width(c) * font_size;
        if !line.is_empty() && width + w > max_width {
            lines.push(std::mem::take(&mut line));
            width = 0.0;
        }
        line.push(c);
        width += w;
    }
    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

/// Greedy word wrap; words wider than the line fall back to [`wrap_chars`].
#[must_use]
pub fn wrap_words(text: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let space = char_width(' ') * font_size;
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut width = 0.0;

        for word in paragraph.split_whitespace() {
            let word_width = text_width(word, font_size);
            if word_width > max_width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let mut pieces = wrap_chars(word, max_width, font_size);
                let last = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
                width = text_width(&last, font_size);
                line = last;
                continue;
            }

            if line.is_empty() {
                width = word_width;
                line.push_str(word);
            } else if width + space + word_width <= max_width {
                width += space + word_width;
                line.push(' ');
                line.push_str(word);
            } else {
                lines.push(std::mem::replace(&mut line, word.to_string()));
                width = word_width;
            }
        }
        lines.push(line);
    }
    lines
}
