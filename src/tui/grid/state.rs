use std::collections::BTreeSet;

use indexmap::IndexMap;

/// Top-level interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browsing,
    Editing,
    MultiSelecting,
}

/// Which axis the arrow keys move along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMode {
    Row,
    Cell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    None,
    Asc,
    Desc,
}

impl SortDirection {
    pub fn cycled(self) -> SortDirection {
        match self {
            SortDirection::None => SortDirection::Asc,
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::None,
        }
    }
}

/// An in-flight cell edit plus the row's staged pending edits.
#[derive(Debug, Clone)]
pub struct EditSession {
    /// Column currently being edited.
    pub column: String,
    pub buffer: String,
    /// Byte offset into `buffer`.
    pub cursor: usize,
    /// Staged raw values per column, in staging order. In-memory only
    /// until the whole row commits.
    pub pending: IndexMap<String, String>,
    /// Inline validation error for the open field.
    pub error: Option<String>,
}

impl EditSession {
    pub fn open(column: String, initial: String) -> EditSession {
        let cursor = initial.len();
        EditSession {
            column,
            buffer: initial,
            cursor,
            pending: IndexMap::new(),
            error: None,
        }
    }
}

/// Inline one-line prompts at the bottom of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Live row filter (`/`, Ctrl+F).
    Filter,
    /// Name under which to save the current view (F6).
    SaveView,
    /// Name of a view to load (F7).
    LoadView,
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub buffer: String,
}

/// Navigation, selection, and edit state owned by the grid renderer.
/// Mutated only by its own input handlers.
#[derive(Debug, Clone)]
pub struct GridState {
    pub mode: Mode,
    pub nav_mode: NavMode,
    pub selected_row: usize,
    pub selected_col: usize,
    pub scroll_offset: usize,
    /// Row indices (into the visible row list) with multi-select marks.
    pub multi_select: BTreeSet<usize>,
    /// Anchor for Shift+Up/Down contiguous range extension.
    pub range_anchor: Option<usize>,
    pub sort_column: Option<String>,
    pub sort_dir: SortDirection,
    pub edit: Option<EditSession>,
    pub prompt: Option<Prompt>,
    /// Applied live filter text (substring, `re:`, or `/pat/`).
    pub filter: Option<String>,
    pub show_help: bool,
    pub should_quit: bool,
}

impl Default for GridState {
    fn default() -> Self {
        GridState {
            mode: Mode::Browsing,
            nav_mode: NavMode::Row,
            selected_row: 0,
            selected_col: 0,
            scroll_offset: 0,
            multi_select: BTreeSet::new(),
            range_anchor: None,
            sort_column: None,
            sort_dir: SortDirection::None,
            edit: None,
            prompt: None,
            filter: None,
            show_help: false,
            should_quit: false,
        }
    }
}

impl GridState {
    /// Clamp `selected_row` into `[0, row_count)` (0 when empty) and pull
    /// the scroll window over it.
    pub fn clamp(&mut self, row_count: usize, visible_rows: usize) {
        if row_count == 0 {
            self.selected_row = 0;
            self.scroll_offset = 0;
            return;
        }
        self.selected_row = self.selected_row.min(row_count - 1);
        self.ensure_visible(visible_rows);
    }

    /// Restore `scroll_offset <= selected_row <= scroll_offset + visible - 1`.
    pub fn ensure_visible(&mut self, visible_rows: usize) {
        if visible_rows == 0 {
            return;
        }
        if self.selected_row < self.scroll_offset {
            self.scroll_offset = self.selected_row;
        } else if self.selected_row >= self.scroll_offset + visible_rows {
            self.scroll_offset = self.selected_row + 1 - visible_rows;
        }
    }

    /// Move the selection by `delta`, clamped; no-op at the edges.
    pub fn move_selection(&mut self, delta: isize, row_count: usize, visible_rows: usize) {
        if row_count == 0 {
            return;
        }
        let max = row_count - 1;
        let target = self.selected_row.saturating_add_signed(delta).min(max);
        self.selected_row = target;
        self.ensure_visible(visible_rows);
    }

    pub fn page(&mut self, down: bool, row_count: usize, visible_rows: usize) {
        let delta = visible_rows.max(1) as isize;
        self.move_selection(if down { delta } else { -delta }, row_count, visible_rows);
    }

    pub fn jump_home(&mut self, visible_rows: usize) {
        self.selected_row = 0;
        self.ensure_visible(visible_rows);
    }

    pub fn jump_end(&mut self, row_count: usize, visible_rows: usize) {
        if row_count == 0 {
            return;
        }
        self.selected_row = row_count - 1;
        self.ensure_visible(visible_rows);
    }

    pub fn move_column(&mut self, delta: isize, column_count: usize) {
        if column_count == 0 {
            return;
        }
        self.selected_col = self
            .selected_col
            .saturating_add_signed(delta)
            .min(column_count - 1);
    }

    pub fn toggle_nav_mode(&mut self) {
        self.nav_mode = match self.nav_mode {
            NavMode::Row => NavMode::Cell,
            NavMode::Cell => NavMode::Row,
        };
    }

    /// Invariant check used by tests: the scroll window covers the
    /// selection.
    pub fn selection_in_window(&self, visible_rows: usize) -> bool {
        self.scroll_offset <= self.selected_row
            && (visible_rows == 0
                || self.selected_row <= self.scroll_offset + visible_rows - 1)
    }
}
