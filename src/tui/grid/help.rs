use crate::store::DataStore;
use crate::tui::screen::{CellStyle, Screen};
use crate::util::unicode;

use super::GridView;

/// Key reference shown as a full-screen replacement frame. Dismissed with
/// the same keys that open it, or Escape.
pub fn draw<S: DataStore>(grid: &GridView<S>, screen: &mut Screen) {
    let (width, height) = grid.term_size();
    let width = usize::from(width);

    let lines: &[(&str, &str)] = &[
        ("", ""),
        ("  navigate", ""),
        ("    ↑/↓, j/k", "move selection"),
        ("    PgUp/PgDn", "move a page"),
        ("    Home/End", "first / last row"),
        ("    Tab", "toggle row / cell focus"),
        ("    ←/→", "change column (cell focus)"),
        ("", ""),
        ("  edit", ""),
        ("    Enter, F2", "edit the focused cell"),
        ("    Tab / Shift+Tab", "stage field, move to the next"),
        ("    Enter", "validate and save the whole row"),
        ("    Esc", "discard staged edits"),
        ("", ""),
        ("  organize", ""),
        ("    s, F3", "cycle sort on the focused column"),
        ("    Space", "mark row (multi-select)"),
        ("    Shift+↑/↓", "extend the marked range"),
        ("    Ctrl+A", "mark all rows"),
        ("    Delete", "delete marked rows"),
        ("    /, Ctrl+F", "live filter (re: or /…/ for regex)"),
        ("", ""),
        ("  board (group: queries)", ""),
        ("    ←/→ ↑/↓", "move between lanes and cards"),
        ("    Space", "pick up / drop a card"),
        ("    Enter", "drop the carried card"),
        ("    Esc", "cancel a carry"),
        ("", ""),
        ("  views", ""),
        ("    F6 / F7 / F8", "save / load / list named views"),
        ("", ""),
        ("  q, Ctrl+C, Esc", "quit"),
    ];

    screen.set_text(
        2,
        0,
        &unicode::truncate_to_width("taskdeck keys", width.saturating_sub(2)),
        CellStyle::fg(grid.theme.header).bold().underlined(),
    );

    for (i, (keys, action)) in lines.iter().enumerate() {
        let y = i + 1;
        if y >= usize::from(height) {
            break;
        }
        let y = y as u16;
        if action.is_empty() {
            screen.set_text(
                0,
                y,
                &unicode::truncate_to_width(keys, width),
                CellStyle::fg(grid.theme.accent).bold(),
            );
        } else {
            let end = screen.set_text(0, y, keys, CellStyle::fg(grid.theme.text_bright));
            let pad = 24u16.saturating_sub(end);
            screen.set_text(
                end + pad,
                y,
                &unicode::truncate_to_width(action, width.saturating_sub(24)),
                CellStyle::fg(grid.theme.text),
            );
        }
    }
}
