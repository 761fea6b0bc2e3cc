//! Advance widths of the standard Helvetica faces, in 1/1000 em, used to
//! measure and wrap text without embedding a font.

const MM_PER_POINT: f32 = 25.4 / 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

// ASCII 32..=126
#[rustfmt::skip]
const REGULAR: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

pub fn char_width(c: char, weight: FontWeight) -> u16 {
    let table = match weight {
        FontWeight::Regular => &REGULAR,
        FontWeight::Bold => &BOLD,
    };
    match c {
        ' '..='~' => table[c as usize - 32],
        '•' => 350,
        '©' | '®' => 737,
        '…' => 1000,
        '–' => 556,
        '—' => 1000,
        '‘' | '’' => 222,
        '“' | '”' => 333,
        _ => 556,
    }
}

/// Width of `text` set at `size` points, in millimetres.
pub fn text_width_mm(text: &str, weight: FontWeight, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| char_width(c, weight) as u32).sum();
    units as f32 / 1000.0 * size * MM_PER_POINT
}

/// Greedy word wrap to `max_width` millimetres. A word wider than a whole
/// line is broken between characters.
pub fn wrap_text(text: &str, weight: FontWeight, size: f32, max_width: f32) -> Vec<String> {
    let fits = |candidate: &str| text_width_mm(candidate, weight, size) <= max_width;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        for c in word.chars() {
            current.push(c);
            if !fits(&current) && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
