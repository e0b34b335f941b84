use crate::model::{Entity, TaskStatus, Value};
use crate::query::ViewKind;
use crate::store::DataStore;
use crate::tui::screen::{CellStyle, Screen};
use crate::util::unicode;

use super::GridView;
use super::help;
use super::kanban;
use super::layout::column_offsets;
use super::state::{Mode, NavMode, PromptKind};

/// Paint one frame into the compositor's back buffer. Pure with respect to
/// the grid: rendering never mutates view state.
pub fn draw<S: DataStore>(grid: &GridView<S>, screen: &mut Screen) {
    screen.set_cursor(None);
    if grid.state.show_help {
        help::draw(grid, screen);
        return;
    }
    match grid.view_kind {
        ViewKind::Kanban => kanban::draw(grid, screen),
        ViewKind::Table => draw_table(grid, screen),
    }
    draw_status_row(grid, screen);
}

fn draw_table<S: DataStore>(grid: &GridView<S>, screen: &mut Screen) {
    let (_, height) = grid.term_size();
    let offsets = column_offsets(&grid.columns);

    draw_header(grid, screen, &offsets);

    let visible = grid.visible_rows();
    for slot in 0..visible {
        let vi = grid.state.scroll_offset + slot;
        let Some(&row_idx) = grid.view_rows.get(vi) else {
            break;
        };
        let y = (1 + slot) as u16;
        if y >= height.saturating_sub(1) {
            break;
        }
        draw_row(grid, screen, &offsets, vi, row_idx, y);
    }
}

fn draw_header<S: DataStore>(grid: &GridView<S>, screen: &mut Screen, offsets: &[usize]) {
    for (ci, column) in grid.columns.iter().enumerate() {
        let mut label = column.name.clone();
        if grid.state.sort_column.as_deref() == Some(column.name.as_str()) {
            let arrow = match grid.state.sort_dir {
                super::state::SortDirection::Asc => " \u{25B2}",
                super::state::SortDirection::Desc => " \u{25BC}",
                super::state::SortDirection::None => "",
            };
            label.push_str(arrow);
        }
        let mut style = CellStyle::fg(grid.theme.header).bold();
        if grid.state.nav_mode == NavMode::Cell && ci == grid.state.selected_col {
            style = style.underlined();
        }
        screen.set_text(
            offsets[ci] as u16,
            0,
            &unicode::fit_to_width(&label, column.width),
            style,
        );
    }
}

fn draw_row<S: DataStore>(
    grid: &GridView<S>,
    screen: &mut Screen,
    offsets: &[usize],
    vi: usize,
    row_idx: usize,
    y: u16,
) {
    let entity = &grid.rows[row_idx];
    let selected = vi == grid.state.selected_row;
    let marked = grid.state.multi_select.contains(&vi);

    if marked {
        screen.set_text(0, y, "\u{258C}", CellStyle::fg(grid.theme.multi_mark));
    }
    if selected {
        screen.set_text(1, y, ">", CellStyle::fg(grid.theme.highlight).bold());
    }

    let editing_col = match (&grid.state.edit, selected) {
        (Some(edit), true) if grid.state.mode == Mode::Editing => Some(edit.column.as_str()),
        _ => None,
    };

    for (ci, column) in grid.columns.iter().enumerate() {
        let x = offsets[ci] as u16;
        if editing_col == Some(column.name.as_str()) {
            draw_edit_cell(grid, screen, x, y, column.width);
            continue;
        }
        let value = entity.field(&column.name);
        let text = match &value {
            Some(v) => grid.schema.format(grid.domain, &column.name, v),
            None => String::new(),
        };
        let mut style = cell_style(grid, entity, &column.name, &value);
        if selected {
            style = style.on(grid.theme.selection_bg);
            if grid.state.nav_mode == NavMode::Cell && ci == grid.state.selected_col {
                style = style.bold();
                style.fg = Some(grid.theme.text_bright);
            }
        }
        screen.set_text(x, y, &unicode::fit_to_width(&text, column.width), style);
    }
}

/// Base styling for a cell value: priority heat, status color, overdue
/// dates in the error color.
fn cell_style<S: DataStore>(
    grid: &GridView<S>,
    entity: &Entity,
    column: &str,
    value: &Option<Value>,
) -> CellStyle {
    let theme = grid.theme;
    match (column, value) {
        ("priority", Some(Value::Int(p))) => CellStyle::fg(theme.priority_color(*p as u8)),
        ("status", Some(Value::Str(s))) => match TaskStatus::parse(s) {
            Some(status) => CellStyle::fg(theme.status_color(status)),
            None => CellStyle::fg(theme.text),
        },
        ("due", Some(Value::Date(d))) => {
            if *d < grid.today && !is_done(entity) {
                CellStyle::fg(theme.error).bold()
            } else {
                CellStyle::fg(theme.text)
            }
        }
        ("id", _) | ("created", _) | ("done_on", _) => CellStyle::fg(theme.dim),
        ("group", _) => CellStyle::fg(theme.accent),
        _ => CellStyle::fg(theme.text),
    }
}

fn is_done(entity: &Entity) -> bool {
    matches!(entity, Entity::Task(t) if t.status == TaskStatus::Done)
}

/// The in-flight edit buffer, horizontally scrolled so the cursor stays
/// visible, with the terminal cursor parked on it.
fn draw_edit_cell<S: DataStore>(
    grid: &GridView<S>,
    screen: &mut Screen,
    x: u16,
    y: u16,
    width: usize,
) {
    let Some(edit) = &grid.state.edit else {
        return;
    };
    let style = CellStyle::fg(grid.theme.text_bright).on(grid.theme.edit_bg);
    let cursor_col = unicode::offset_to_col(&edit.buffer, edit.cursor);

    let (window, cursor_in_window) = if cursor_col < width {
        (edit.buffer.clone(), cursor_col)
    } else {
        // Scroll the window so the cursor sits on the last cell
        let skip_cols = cursor_col + 1 - width;
        let mut skipped = 0;
        let mut start = edit.buffer.len();
        for (i, ch) in edit.buffer.char_indices() {
            if skipped >= skip_cols {
                start = i;
                break;
            }
            skipped += unicode::char_width(ch);
        }
        (edit.buffer[start..].to_string(), cursor_col - skipped)
    };

    screen.set_text(x, y, &unicode::fit_to_width(&window, width), style);
    screen.set_cursor(Some((x + cursor_in_window as u16, y)));
}

fn draw_status_row<S: DataStore>(grid: &GridView<S>, screen: &mut Screen) {
    let (width, height) = grid.term_size();
    if height == 0 {
        return;
    }
    let y = height - 1;
    let width = usize::from(width);

    if let Some(prompt) = &grid.state.prompt {
        let label = match prompt.kind {
            PromptKind::Filter => "/",
            PromptKind::SaveView => "save view: ",
            PromptKind::LoadView => "load view: ",
        };
        let line = format!("{label}{}", prompt.buffer);
        let end = screen.set_text(
            0,
            y,
            &unicode::truncate_to_width(&line, width),
            CellStyle::fg(grid.theme.accent),
        );
        screen.set_cursor(Some((end, y)));
        return;
    }

    if let Some(edit) = &grid.state.edit
        && let Some(error) = &edit.error
    {
        screen.set_text(
            0,
            y,
            &unicode::truncate_to_width(error, width),
            CellStyle::fg(grid.theme.error).bold(),
        );
        return;
    }

    if let Some((message, is_error)) = &grid.status {
        let style = if *is_error {
            CellStyle::fg(grid.theme.error).bold()
        } else {
            CellStyle::fg(grid.theme.success)
        };
        screen.set_text(0, y, &unicode::truncate_to_width(message, width), style);
        return;
    }

    let mut summary = format!("{} rows · {}", grid.row_count(), grid.query);
    if let Some(filter) = &grid.state.filter {
        summary.push_str(&format!(" · filter: {filter}"));
    }
    if grid.state.mode == Mode::MultiSelecting {
        summary.push_str(&format!(" · {} selected", grid.state.multi_select.len()));
    }
    summary.push_str(" · ? help");
    screen.set_text(
        0,
        y,
        &unicode::truncate_to_width(&summary, width),
        CellStyle::fg(grid.theme.dim),
    );
}
