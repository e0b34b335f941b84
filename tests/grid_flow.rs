//! Interactive-grid flows driven through the public key-handling entry
//! point, with no terminal attached: multi-field edit staging and the
//! kanban card-move state machine.

use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::path::PathBuf;

use taskdeck::config::Config;
use taskdeck::model::{Entity, SchemaRegistry, Task, TaskStatus, Value};
use taskdeck::query::{ParserContext, ViewKind, parse_query};
use taskdeck::store::{DataProvider, MemoryStore};
use taskdeck::tui::grid::input::handle_key;
use taskdeck::tui::grid::state::{Mode, NavMode};
use taskdeck::tui::{GridView, Theme};

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

fn task(id: u64, text: &str, status: TaskStatus) -> Entity {
    Entity::Task(Task {
        id,
        text: text.into(),
        project: None,
        priority: Some(2),
        due: None,
        status,
        tags: vec![],
        created: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
        done_on: None,
        notes: None,
        extras: BTreeMap::new(),
    })
}

struct Harness {
    schema: SchemaRegistry,
    theme: Theme,
    config: Config,
}

impl Harness {
    fn new() -> Harness {
        Harness {
            schema: SchemaRegistry::new(),
            theme: Theme::default(),
            config: Config::default(),
        }
    }

    fn grid<'a>(
        &'a self,
        store: &'a mut MemoryStore,
        query: &str,
    ) -> GridView<'a, MemoryStore> {
        let ctx = ParserContext {
            schema: &self.schema,
            project_names: &[],
        };
        let spec = parse_query(query, &ctx).unwrap();
        GridView::new(
            store,
            &self.schema,
            &self.theme,
            &self.config,
            spec,
            query.to_string(),
            PathBuf::from("/tmp"),
            today(),
            (100, 24),
        )
        .unwrap()
    }
}

fn type_text(grid: &mut GridView<'_, MemoryStore>, text: &str) {
    for c in text.chars() {
        handle_key(grid, key(KeyCode::Char(c)));
    }
}

#[test]
fn multi_field_edit_stages_then_commits_atomically() {
    let harness = Harness::new();
    let mut store = MemoryStore::with_entities([task(1, "draft report", TaskStatus::Todo)]);
    let mut grid = harness.grid(&mut store, "task");

    // Focus the text column and open the editor
    grid.state.nav_mode = NavMode::Cell;
    grid.state.selected_col = 1;
    handle_key(&mut grid, key(KeyCode::Enter));
    assert_eq!(grid.state.mode, Mode::Editing);
    type_text(&mut grid, " v2");

    // Stage and hop to priority, set it to 1
    handle_key(&mut grid, key(KeyCode::Tab)); // -> project
    handle_key(&mut grid, key(KeyCode::Tab)); // -> priority
    handle_key(&mut grid, key(KeyCode::Backspace));
    type_text(&mut grid, "1");

    // Nothing persisted while staged
    let rows = grid.store.entities(taskdeck::model::Domain::Task).unwrap();
    assert_eq!(rows[0].field("text"), Some(Value::Str("draft report".into())));

    handle_key(&mut grid, key(KeyCode::Enter));
    assert_eq!(grid.state.mode, Mode::Browsing);
    let rows = grid.store.entities(taskdeck::model::Domain::Task).unwrap();
    assert_eq!(
        rows[0].field("text"),
        Some(Value::Str("draft report v2".into()))
    );
    assert_eq!(rows[0].field("priority"), Some(Value::Int(1)));
}

#[test]
fn failed_validation_keeps_all_fields_unpersisted() {
    let harness = Harness::new();
    let mut store = MemoryStore::with_entities([task(1, "draft report", TaskStatus::Todo)]);
    let mut grid = harness.grid(&mut store, "task");

    grid.state.nav_mode = NavMode::Cell;
    grid.state.selected_col = 1;
    handle_key(&mut grid, key(KeyCode::Enter));
    type_text(&mut grid, " v2");
    handle_key(&mut grid, key(KeyCode::Tab)); // -> project
    handle_key(&mut grid, key(KeyCode::Tab)); // -> priority
    handle_key(&mut grid, key(KeyCode::Backspace));
    type_text(&mut grid, "7"); // out of range
    handle_key(&mut grid, key(KeyCode::Enter));

    // Re-opened on the failing field, all-or-nothing honored
    assert_eq!(grid.state.mode, Mode::Editing);
    assert_eq!(grid.state.edit.as_ref().unwrap().column, "priority");
    assert!(grid.state.edit.as_ref().unwrap().error.is_some());
    let rows = grid.store.entities(taskdeck::model::Domain::Task).unwrap();
    assert_eq!(rows[0].field("text"), Some(Value::Str("draft report".into())));
    assert_eq!(rows[0].field("priority"), Some(Value::Int(2)));

    // Fixing the field lets the whole row through
    handle_key(&mut grid, key(KeyCode::Backspace));
    type_text(&mut grid, "1");
    handle_key(&mut grid, key(KeyCode::Enter));
    assert_eq!(grid.state.mode, Mode::Browsing);
    let rows = grid.store.entities(taskdeck::model::Domain::Task).unwrap();
    assert_eq!(
        rows[0].field("text"),
        Some(Value::Str("draft report v2".into()))
    );
    assert_eq!(rows[0].field("priority"), Some(Value::Int(1)));
}

#[test]
fn kanban_move_persists_group_and_lands_first_in_lane() {
    // Lanes: doing | done | todo (group values sort ascending).
    let harness = Harness::new();
    let mut store = MemoryStore::with_entities([
        task(1, "first todo", TaskStatus::Todo),
        task(2, "second todo", TaskStatus::Todo),
        task(3, "in flight", TaskStatus::Doing),
        task(4, "shipped", TaskStatus::Done),
    ]);
    let mut grid = harness.grid(&mut store, "task group:status");
    assert_eq!(grid.view_kind, ViewKind::Kanban);
    {
        let kanban = grid.kanban.as_ref().unwrap();
        let keys: Vec<&str> = kanban.lanes.iter().map(|l| l.key.as_str()).collect();
        assert_eq!(keys, vec!["doing", "done", "todo"]);
    }

    // Walk to the todo lane and pick up its first card (task 1)
    handle_key(&mut grid, key(KeyCode::Right));
    handle_key(&mut grid, key(KeyCode::Right));
    handle_key(&mut grid, key(KeyCode::Char(' ')));
    assert!(grid.kanban.as_ref().unwrap().moving.is_some());

    // Carry it into the doing lane; it inserts at position 0
    handle_key(&mut grid, key(KeyCode::Left));
    handle_key(&mut grid, key(KeyCode::Left));
    handle_key(&mut grid, key(KeyCode::Enter));

    // Persisted through the store
    let rows = grid.store.entities(taskdeck::model::Domain::Task).unwrap();
    let moved = rows.iter().find(|r| r.key() == "1").unwrap();
    assert_eq!(moved.field("status"), Some(Value::Str("doing".into())));

    // And first in the doing lane on the next render
    let kanban = grid.kanban.as_ref().unwrap();
    assert!(kanban.moving.is_none());
    let doing = kanban.lanes.iter().find(|l| l.key == "doing").unwrap();
    let first_row = doing.items[0];
    assert_eq!(grid.rows[first_row].key(), "1");
}

#[test]
fn kanban_cancel_restores_lanes() {
    let harness = Harness::new();
    let mut store = MemoryStore::with_entities([
        task(1, "a", TaskStatus::Todo),
        task(2, "b", TaskStatus::Doing),
    ]);
    let mut grid = harness.grid(&mut store, "task group:status");

    handle_key(&mut grid, key(KeyCode::Char(' ')));
    handle_key(&mut grid, key(KeyCode::Right));
    handle_key(&mut grid, key(KeyCode::Esc));

    let kanban = grid.kanban.as_ref().unwrap();
    assert!(kanban.moving.is_none());
    assert_eq!(kanban.lanes.len(), 2);
    let rows = grid.store.entities(taskdeck::model::Domain::Task).unwrap();
    assert_eq!(
        rows.iter()
            .find(|r| r.key() == "2")
            .unwrap()
            .field("status"),
        Some(Value::Str("doing".into()))
    );
}

#[test]
fn navigation_invariants_hold_under_stress() {
    let harness = Harness::new();
    let mut store = MemoryStore::with_entities(
        (1..=100).map(|i| task(i, &format!("row {i}"), TaskStatus::Todo)),
    );
    let mut grid = harness.grid(&mut store, "task");
    let visible = grid.visible_rows();

    let script = [
        KeyCode::Down,
        KeyCode::PageDown,
        KeyCode::PageDown,
        KeyCode::Up,
        KeyCode::End,
        KeyCode::Down,
        KeyCode::Home,
        KeyCode::Up,
        KeyCode::PageUp,
        KeyCode::PageDown,
    ];
    for code in script {
        handle_key(&mut grid, key(code));
        assert!(grid.state.selected_row < grid.row_count());
        assert!(grid.state.selection_in_window(visible));
    }
}
