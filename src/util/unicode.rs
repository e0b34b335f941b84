use unicode_segmentation::UnicodeSegmentation;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of a string in terminal cells.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Display width of a single character in terminal cells.
pub fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

/// Truncate a string to fit within `max_cells`, appending `…` when truncated.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if max_cells == 0 {
        return String::new();
    }
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    if max_cells == 1 {
        return "\u{2026}".to_string();
    }
    let budget = max_cells - 1;
    let mut width = 0;
    let mut out = String::new();
    for g in s.graphemes(true) {
        let gw = display_width(g);
        if width + gw > budget {
            break;
        }
        width += gw;
        out.push_str(g);
    }
    out.push('\u{2026}');
    out
}

/// Truncate or right-pad with spaces to exactly `cells` terminal cells.
pub fn fit_to_width(s: &str, cells: usize) -> String {
    let mut out = truncate_to_width(s, cells);
    let mut w = display_width(&out);
    while w < cells {
        out.push(' ');
        w += 1;
    }
    out
}

/// Byte offset of the next grapheme boundary after `offset`, or None at end.
pub fn next_boundary(s: &str, offset: usize) -> Option<usize> {
    if offset >= s.len() {
        return None;
    }
    match s[offset..].grapheme_indices(true).nth(1) {
        Some((i, _)) => Some(offset + i),
        None => Some(s.len()),
    }
}

/// Byte offset of the previous grapheme boundary before `offset`, or None at start.
pub fn prev_boundary(s: &str, offset: usize) -> Option<usize> {
    if offset == 0 {
        return None;
    }
    let mut last = 0;
    for (i, _) in s[..offset].grapheme_indices(true) {
        last = i;
    }
    Some(last)
}

/// Display column of a byte offset within `s`.
pub fn offset_to_col(s: &str, offset: usize) -> usize {
    display_width(&s[..offset.min(s.len())])
}
