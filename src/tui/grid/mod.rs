pub mod help;
pub mod input;
pub mod kanban;
pub mod layout;
pub mod render;
pub mod state;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use regex::Regex;
use tracing::warn;

use crate::config::Config;
use crate::model::{Domain, Entity, SchemaRegistry};
use crate::query::eval::compare_values;
use crate::query::{EvalError, Evaluator, QuerySpec, ViewKind};
use crate::store::DataStore;

use super::screen::Screen;
use super::theme::Theme;
use kanban::KanbanState;
use layout::{Column, allocate_columns};
use state::{GridState, SortDirection};

/// Debounce window for terminal resize storms during a drag.
const RESIZE_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("terminal error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// The interactive grid: a query's rows, the navigation/edit state machine,
/// and the kanban lane state when grouping.
pub struct GridView<'a, S: DataStore> {
    pub domain: Domain,
    /// Evaluated rows in evaluator order; the stable base the view indexes
    /// into.
    pub rows: Vec<Entity>,
    /// Indices into `rows` after live filter and interactive sort.
    pub view_rows: Vec<usize>,
    pub columns: Vec<Column>,
    pub state: GridState,
    pub kanban: Option<KanbanState>,
    pub view_kind: ViewKind,
    pub group_field: Option<String>,
    pub store: &'a mut S,
    pub schema: &'a SchemaRegistry,
    pub theme: &'a Theme,
    pub today: NaiveDate,
    /// Transient status line: (message, is_error).
    pub status: Option<(String, bool)>,
    pub allow_sensitive_edits: bool,
    pub data_dir: PathBuf,
    /// Source query string, kept for view bundles and the status line.
    pub query: String,
    pub spec: QuerySpec,
    default_columns: Vec<String>,
    term_size: (u16, u16),
}

impl<'a, S: DataStore> GridView<'a, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: &'a mut S,
        schema: &'a SchemaRegistry,
        theme: &'a Theme,
        config: &Config,
        spec: QuerySpec,
        query: String,
        data_dir: PathBuf,
        today: NaiveDate,
        term_size: (u16, u16),
    ) -> Result<Self, GridError> {
        let default_columns = config.default_columns(spec.domain);
        let mut grid = GridView {
            domain: spec.domain,
            rows: Vec::new(),
            view_rows: Vec::new(),
            columns: Vec::new(),
            state: GridState::default(),
            kanban: None,
            view_kind: ViewKind::Table,
            group_field: None,
            store,
            schema,
            theme,
            today,
            status: None,
            allow_sensitive_edits: false,
            data_dir,
            query,
            spec,
            default_columns,
            term_size,
        };
        grid.refresh()?;
        Ok(grid)
    }

    /// Re-run the query, reallocate columns, and rebuild the view. Multi-
    /// select marks do not survive a refresh (row identity may change).
    pub fn refresh(&mut self) -> Result<(), GridError> {
        let result = {
            let evaluator = Evaluator::new(&*self.store, self.schema, self.today);
            evaluator.evaluate(&self.spec, &self.default_columns)?
        };
        self.rows = result.rows;
        self.view_kind = result.view;
        self.group_field = result.group_by.clone();
        self.columns = allocate_columns(
            &result.columns,
            self.schema,
            self.domain,
            usize::from(self.term_size.0),
        );
        if !result.warnings.is_empty() {
            self.set_status(result.warnings.join("; "), false);
        }
        self.state.multi_select.clear();
        self.state.range_anchor = None;
        self.rebuild_view();
        Ok(())
    }

    /// Recompute `view_rows` from the live filter and interactive sort,
    /// then clamp the selection. Never touches the evaluator.
    pub fn rebuild_view(&mut self) {
        let filter_fn = self.state.filter.as_deref().map(compile_filter);
        self.view_rows = (0..self.rows.len())
            .filter(|&i| match &filter_fn {
                Some(matcher) => matcher(&self.rows[i]),
                None => true,
            })
            .collect();

        if let (Some(col), dir) = (&self.state.sort_column, self.state.sort_dir)
            && dir != SortDirection::None
        {
            let rows = &self.rows;
            let col = col.clone();
            self.view_rows.sort_by(|&a, &b| {
                let ord = compare_values(rows[a].field(&col), rows[b].field(&col));
                match dir {
                    SortDirection::Desc => ord.reverse(),
                    _ => ord,
                }
            });
        }

        let visible = self.visible_rows();
        self.state.clamp(self.view_rows.len(), visible);

        if self.view_kind == ViewKind::Kanban
            && let Some(field) = self.group_field.clone()
        {
            let focus = self.kanban.as_ref().map(|k| (k.lane, k.card));
            let mut lanes = KanbanState::build(&self.rows, &self.view_rows, &field);
            if let Some((lane, card)) = focus {
                lanes.focus(lane, card);
            }
            self.kanban = Some(lanes);
        } else {
            self.kanban = None;
        }
    }

    /// Data rows that fit the viewport (header + status row reserved).
    pub fn visible_rows(&self) -> usize {
        usize::from(self.term_size.1).saturating_sub(2)
    }

    pub fn row_count(&self) -> usize {
        self.view_rows.len()
    }

    pub fn term_size(&self) -> (u16, u16) {
        self.term_size
    }

    pub fn current_entity(&self) -> Option<&Entity> {
        let idx = *self.view_rows.get(self.state.selected_row)?;
        self.rows.get(idx)
    }

    pub fn current_column(&self) -> Option<&Column> {
        self.columns.get(self.state.selected_col)
    }

    pub fn set_status(&mut self, message: impl Into<String>, is_error: bool) {
        self.status = Some((message.into(), is_error));
    }

    pub fn apply_resize(&mut self, width: u16, height: u16) {
        self.term_size = (width, height);
        self.columns = allocate_columns(
            &self.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>(),
            self.schema,
            self.domain,
            usize::from(width),
        );
        let visible = self.visible_rows();
        self.state.clamp(self.view_rows.len(), visible);
    }
}

/// Compile a live-filter string into a row predicate. `re:pat` and
/// `/pat/` are regular expressions; anything else is a case-insensitive
/// substring. An invalid regex degrades to a literal substring match.
fn compile_filter(filter: &str) -> Box<dyn Fn(&Entity) -> bool> {
    let pattern = filter
        .strip_prefix("re:")
        .or_else(|| {
            filter
                .strip_prefix('/')
                .and_then(|rest| rest.strip_suffix('/'))
                .filter(|inner| !inner.is_empty())
        })
        .map(str::to_string);

    let regex = pattern
        .as_deref()
        .and_then(|p| Regex::new(&format!("(?i){p}")).ok());

    match regex {
        Some(re) => Box::new(move |entity| re.is_match(&filter_haystack(entity))),
        None => {
            let needle = pattern.unwrap_or_else(|| filter.to_string()).to_lowercase();
            Box::new(move |entity| filter_haystack(entity).contains(&needle))
        }
    }
}

/// Fixed searchable-field set shared with the evaluator's free-text stage.
fn filter_haystack(entity: &Entity) -> String {
    let mut parts = Vec::new();
    for field in ["text", "project", "description", "name"] {
        if let Some(v) = entity.field(field) {
            parts.push(v.render().to_lowercase());
        }
    }
    parts.join(" ")
}

/// Run the interactive grid until the user exits. Single-threaded: the
/// loop blocks on the next terminal event, applies it, repaints, and
/// blocks again.
#[allow(clippy::too_many_arguments)]
pub fn run_interactive<S: DataStore>(
    store: &mut S,
    schema: &SchemaRegistry,
    theme: &Theme,
    config: &Config,
    spec: QuerySpec,
    query: String,
    data_dir: PathBuf,
    today: NaiveDate,
) -> Result<(), GridError> {
    let (width, height) = crossterm::terminal::size()?;
    let mut grid = GridView::new(
        store, schema, theme, config, spec, query, data_dir, today, (width, height),
    )?;
    let mut screen = Screen::new(width, height);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    // Restore the terminal even if a draw panics
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let result = event_loop(&mut grid, &mut screen, &mut stdout);

    let last = crate::store::state::UiState {
        last_query: Some(grid.query.clone()),
        last_view: Some(
            match grid.view_kind {
                ViewKind::Kanban => "kanban",
                ViewKind::Table => "table",
            }
            .to_string(),
        ),
    };
    let _ = crate::store::state::write_ui_state(&grid.data_dir, &last);

    disable_raw_mode()?;
    execute!(stdout, LeaveAlternateScreen)?;
    result
}

fn event_loop<S: DataStore>(
    grid: &mut GridView<S>,
    screen: &mut Screen,
    stdout: &mut impl Write,
) -> Result<(), GridError> {
    loop {
        screen.clear_all();
        render::draw(grid, screen);
        if let Err(e) = screen.render(stdout) {
            // Degrade: the compositor scheduled a full refresh for the
            // next frame; the loop itself survives
            warn!(error = %e, "frame dropped");
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                input::handle_key(grid, key);
            }
            Event::Resize(w, h) => {
                let (w, h) = settle_resize(w, h)?;
                screen.resize(w, h);
                grid.apply_resize(w, h);
            }
            _ => {}
        }

        if grid.state.should_quit {
            break;
        }
    }
    Ok(())
}

/// Coalesce a burst of resize events behind a short debounce window so a
/// drag does not thrash buffer reallocation.
fn settle_resize(mut width: u16, mut height: u16) -> io::Result<(u16, u16)> {
    while event::poll(RESIZE_DEBOUNCE)? {
        match event::read()? {
            Event::Resize(w, h) => {
                width = w;
                height = h;
            }
            // Non-resize events during the window are rare; dropping a
            // key during an active drag is acceptable
            _ => {}
        }
    }
    Ok((width, height))
}
