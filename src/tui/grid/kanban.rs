use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use indexmap::IndexMap;

use crate::model::{Entity, Value};
use crate::store::DataStore;
use crate::tui::screen::{CellStyle, Screen};
use crate::util::unicode;

use super::GridView;

/// One kanban column: rows sharing a group-field value. `items` index into
/// the grid's base row list. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KanbanLane {
    pub key: String,
    pub items: Vec<usize>,
}

/// A picked-up card's original position, for cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOrigin {
    pub row: usize,
    pub from_lane: usize,
    pub from_pos: usize,
}

/// Lane layout plus the focus/move state machine for the board view.
#[derive(Debug, Clone)]
pub struct KanbanState {
    pub lanes: Vec<KanbanLane>,
    /// Focused lane index.
    pub lane: usize,
    /// Focused card position within the lane.
    pub card: usize,
    /// Some while a card is picked up and travelling.
    pub moving: Option<MoveOrigin>,
}

impl KanbanState {
    /// Partition the visible rows into lanes by the group field's rendered
    /// value, preserving the evaluator's lane ordering.
    pub fn build(rows: &[Entity], view_rows: &[usize], group_field: &str) -> KanbanState {
        let mut lanes: IndexMap<String, Vec<usize>> = IndexMap::new();
        for &idx in view_rows {
            let key = rows[idx]
                .field(group_field)
                .map(|v| v.render())
                .unwrap_or_default();
            lanes.entry(key).or_default().push(idx);
        }
        KanbanState {
            lanes: lanes
                .into_iter()
                .map(|(key, items)| KanbanLane { key, items })
                .collect(),
            lane: 0,
            card: 0,
            moving: None,
        }
    }

    /// Restore a previous focus position, clamped to the new layout.
    pub fn focus(&mut self, lane: usize, card: usize) {
        self.lane = lane.min(self.lanes.len().saturating_sub(1));
        let len = self.lanes.get(self.lane).map_or(0, |l| l.items.len());
        self.card = card.min(len.saturating_sub(1));
    }

    pub fn focused_row(&self) -> Option<usize> {
        self.lanes.get(self.lane)?.items.get(self.card).copied()
    }

    fn clamp_card(&mut self) {
        let len = self.lanes.get(self.lane).map_or(0, |l| l.items.len());
        self.card = self.card.min(len.saturating_sub(1));
    }

    /// Move lane focus; when a card is picked up, carry it into the
    /// adjacent lane instead.
    fn lane_step(&mut self, delta: isize) {
        if self.lanes.is_empty() {
            return;
        }
        let target = self
            .lane
            .saturating_add_signed(delta)
            .min(self.lanes.len() - 1);
        if target == self.lane {
            return;
        }
        if self.moving.is_some() {
            let item = self.lanes[self.lane].items.remove(self.card);
            let pos = self.card.min(self.lanes[target].items.len());
            self.lanes[target].items.insert(pos, item);
            self.lane = target;
            self.card = pos;
        } else {
            self.lane = target;
            self.clamp_card();
        }
    }

    /// Move card focus within the lane; when picked up, reorder instead.
    fn card_step(&mut self, delta: isize) {
        let Some(lane) = self.lanes.get_mut(self.lane) else {
            return;
        };
        if lane.items.is_empty() {
            return;
        }
        let target = self
            .card
            .saturating_add_signed(delta)
            .min(lane.items.len() - 1);
        if target == self.card {
            return;
        }
        if self.moving.is_some() {
            lane.items.swap(self.card, target);
        }
        self.card = target;
    }

    fn pick_up(&mut self) {
        if self.moving.is_some() {
            return;
        }
        if let Some(row) = self.focused_row() {
            self.moving = Some(MoveOrigin {
                row,
                from_lane: self.lane,
                from_pos: self.card,
            });
        }
    }
}

pub fn handle_key<S: DataStore>(grid: &mut GridView<S>, key: KeyEvent) {
    match (key.modifiers, key.code) {
        (m, KeyCode::Char('c')) if m.contains(KeyModifiers::CONTROL) => {
            grid.state.should_quit = true;
        }
        (_, KeyCode::Char('q')) => {
            grid.state.should_quit = true;
        }
        (_, KeyCode::Char('?') | KeyCode::Char('h')) => {
            grid.state.show_help = true;
        }
        (_, KeyCode::Esc) => {
            let moving = grid.kanban.as_ref().is_some_and(|k| k.moving.is_some());
            if moving {
                cancel_move(grid);
            } else {
                grid.state.should_quit = true;
            }
        }
        (_, KeyCode::Left) => {
            if let Some(k) = grid.kanban.as_mut() {
                k.lane_step(-1);
            }
        }
        (_, KeyCode::Right) => {
            if let Some(k) = grid.kanban.as_mut() {
                k.lane_step(1);
            }
        }
        (_, KeyCode::Up) => {
            if let Some(k) = grid.kanban.as_mut() {
                k.card_step(-1);
            }
        }
        (_, KeyCode::Down) => {
            if let Some(k) = grid.kanban.as_mut() {
                k.card_step(1);
            }
        }
        (_, KeyCode::Char(' ')) => {
            let moving = grid.kanban.as_ref().is_some_and(|k| k.moving.is_some());
            if moving {
                commit_move(grid);
            } else if let Some(k) = grid.kanban.as_mut() {
                k.pick_up();
            }
        }
        (_, KeyCode::Enter) => {
            let moving = grid.kanban.as_ref().is_some_and(|k| k.moving.is_some());
            if moving {
                commit_move(grid);
            }
        }
        _ => {}
    }
}

/// Persist the travelling card's new lane through the store and keep the
/// in-memory position. On failure the board snaps back.
fn commit_move<S: DataStore>(grid: &mut GridView<S>) {
    let Some(field) = grid.group_field.clone() else {
        return;
    };
    let (row_idx, lane_key) = {
        let Some(k) = grid.kanban.as_mut() else {
            return;
        };
        let Some(_origin) = k.moving.take() else {
            return;
        };
        let Some(row_idx) = k.focused_row() else {
            return;
        };
        (row_idx, k.lanes[k.lane].key.clone())
    };
    let entity_key = grid.rows[row_idx].key();
    match grid
        .store
        .move_group_field(grid.domain, &entity_key, &field, &lane_key)
    {
        Ok(()) => {
            grid.rows[row_idx].set_field(&field, &lane_key);
            grid.rows[row_idx].attach("group", Value::Str(lane_key.clone()));
            grid.set_status(format!("moved to {lane_key}"), false);
        }
        Err(e) => {
            grid.set_status(e.to_string(), true);
            grid.rebuild_view();
        }
    }
}

/// Drop the card back where it was picked up.
fn cancel_move<S: DataStore>(grid: &mut GridView<S>) {
    if let Some(k) = grid.kanban.as_mut() {
        k.moving = None;
    }
    grid.rebuild_view();
}

/// Paint the board: equal-width side-by-side lanes, focused card marked,
/// a travelling card shown in transit.
pub fn draw<S: DataStore>(grid: &GridView<S>, screen: &mut Screen) {
    let Some(kanban) = &grid.kanban else {
        return;
    };
    let (width, height) = grid.term_size();
    let width = usize::from(width);
    let height = usize::from(height);
    if height < 3 || kanban.lanes.is_empty() {
        return;
    }

    let lane_count = kanban.lanes.len();
    let gap = 1;
    let lane_width = (width.saturating_sub(gap * (lane_count - 1)) / lane_count).max(8);
    let card_rows = height - 3; // title, lane header, status

    screen.set_text(
        0,
        0,
        &unicode::truncate_to_width(&format!("{} · board", grid.query), width),
        CellStyle::fg(grid.theme.dim),
    );

    for (li, lane) in kanban.lanes.iter().enumerate() {
        let x = (li * (lane_width + gap)) as u16;
        let focused_lane = li == kanban.lane;
        let header_style = if focused_lane {
            CellStyle::fg(grid.theme.highlight).bold().underlined()
        } else {
            CellStyle::fg(grid.theme.header).underlined()
        };
        let header = format!("{} ({})", lane.key, lane.items.len());
        screen.set_text(
            x,
            1,
            &unicode::fit_to_width(&header, lane_width),
            header_style,
        );

        // Keep the focused card visible; other lanes start at the top
        let offset = if focused_lane && kanban.card >= card_rows {
            kanban.card + 1 - card_rows
        } else {
            0
        };

        for (ci, &row_idx) in lane.items.iter().enumerate().skip(offset).take(card_rows) {
            let y = (2 + ci - offset) as u16;
            let entity = &grid.rows[row_idx];
            let label = card_label(entity);
            let focused_card = focused_lane && ci == kanban.card;
            let in_transit = focused_card && kanban.moving.is_some();
            let mut style = CellStyle::fg(grid.theme.text);
            let mut marker = "  ";
            if in_transit {
                style = CellStyle::fg(grid.theme.multi_mark).bold();
                marker = "* ";
            } else if focused_card {
                style = CellStyle::fg(grid.theme.text_bright).on(grid.theme.selection_bg);
                marker = "> ";
            }
            let text = format!("{marker}{label}");
            screen.set_text(x, y, &unicode::fit_to_width(&text, lane_width), style);
        }
    }
}

fn card_label(entity: &Entity) -> String {
    match entity {
        Entity::Task(t) => format!("{} {}", t.id, t.text),
        Entity::Project(p) => p.name.clone(),
        Entity::TimeLog(l) => format!(
            "{} {}",
            l.id,
            l.description.clone().unwrap_or_default()
        ),
    }
}
