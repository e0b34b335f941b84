//! End-to-end query-language scenarios: parse → evaluate over an
//! in-memory store, with "now" pinned.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

use taskdeck::model::{
    Domain, Entity, SchemaRegistry, Task, TaskStatus, Value, dates,
};
use taskdeck::query::{EvaluationResult, Evaluator, ParserContext, parse_query};
use taskdeck::store::MemoryStore;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn task(id: u64, text: &str) -> Task {
    Task {
        id,
        text: text.into(),
        project: None,
        priority: None,
        due: None,
        status: TaskStatus::Todo,
        tags: vec![],
        created: date(2025, 5, 1),
        done_on: None,
        notes: None,
        extras: BTreeMap::new(),
    }
}

fn run_query(query: &str, store: &MemoryStore, today: NaiveDate) -> EvaluationResult {
    let schema = SchemaRegistry::new();
    let ctx = ParserContext {
        schema: &schema,
        project_names: &[],
    };
    let spec = parse_query(query, &ctx).unwrap();
    assert!(spec.is_valid(), "parse errors: {:?}", spec.errors);
    Evaluator::new(store, &schema, today)
        .evaluate(&spec, &["id".into(), "text".into()])
        .unwrap()
}

#[test]
fn scenario_due_today_with_priority_cap() {
    let today = date(2025, 6, 2);
    let mut due_today = task(1, "due today");
    due_today.due = Some(today);
    due_today.priority = Some(1);
    let mut due_tomorrow = task(2, "due tomorrow");
    due_tomorrow.due = Some(date(2025, 6, 3));
    due_tomorrow.priority = Some(1);
    let store =
        MemoryStore::with_entities([Entity::Task(due_today), Entity::Task(due_tomorrow)]);

    let result = run_query("task due:today p<=2", &store, today);
    let keys: Vec<String> = result.rows.iter().map(|r| r.key()).collect();
    assert_eq!(keys, vec!["1"]);
}

#[test]
fn scenario_sort_ascending_with_projection() {
    let today = date(2025, 6, 2);
    let dues = [date(2025, 1, 3), date(2025, 1, 1), date(2025, 1, 2)];
    let mut store = MemoryStore::new();
    for (i, due) in dues.iter().enumerate() {
        let mut t = task(i as u64 + 1, "x");
        t.due = Some(*due);
        store.insert(Entity::Task(t));
    }

    let result = run_query("task cols:id,text sort:due+", &store, today);
    let dues_out: Vec<Option<Value>> = result.rows.iter().map(|r| r.field("due")).collect();
    assert_eq!(
        dues_out,
        vec![
            Some(Value::Date(date(2025, 1, 1))),
            Some(Value::Date(date(2025, 1, 2))),
            Some(Value::Date(date(2025, 1, 3))),
        ]
    );
    assert_eq!(result.columns, vec!["id", "text"]);
}

#[test]
fn scenario_priority_normalization() {
    let schema = SchemaRegistry::new();
    let today = date(2025, 6, 1);
    for input in ["P2", "p2", "2"] {
        assert_eq!(
            schema.normalize(Domain::Task, "priority", input, today),
            Ok("2".to_string())
        );
    }
    assert!(schema.normalize(Domain::Task, "priority", "p5", today).is_err());
}

#[test]
fn scenario_date_normalization() {
    let today = date(2025, 6, 1);
    assert_eq!(dates::resolve_date("+7", today), Ok(date(2025, 6, 8)));
    assert_eq!(dates::resolve_date("eom", today), Ok(date(2025, 6, 30)));
}

#[test]
fn filter_and_semantics_hold_for_random_clause_pairs() {
    // AND semantics against a naive reference: a row is in the combined
    // result iff it passes both single-clause queries independently.
    let today = date(2025, 6, 2);
    let mut store = MemoryStore::new();
    for i in 1..=12u64 {
        let mut t = task(i, &format!("item {i}"));
        t.priority = Some((i % 3 + 1) as u8);
        t.status = match i % 3 {
            0 => TaskStatus::Todo,
            1 => TaskStatus::Doing,
            _ => TaskStatus::Done,
        };
        if i % 2 == 0 {
            t.due = Some(date(2025, 6, (i as u32 % 28) + 1));
        }
        store.insert(Entity::Task(t));
    }

    let clause_pairs = [
        ("p<=2", "status:doing"),
        ("p>=2", "due"),
        ("status:done", "p1"),
        ("due>=2025-06-05", "p<=3"),
    ];
    for (a, b) in clause_pairs {
        let combined = run_query(&format!("task {a} {b}"), &store, today);
        let only_a = run_query(&format!("task {a}"), &store, today);
        let only_b = run_query(&format!("task {b}"), &store, today);
        let a_keys: Vec<String> = only_a.rows.iter().map(|r| r.key()).collect();
        let b_keys: Vec<String> = only_b.rows.iter().map(|r| r.key()).collect();
        let mut expected: Vec<String> = store
            .tasks
            .iter()
            .map(|e| e.key())
            .filter(|k| a_keys.contains(k) && b_keys.contains(k))
            .collect();
        let mut got: Vec<String> = combined.rows.iter().map(|r| r.key()).collect();
        expected.sort();
        got.sort();
        assert_eq!(got, expected, "clauses: {a} AND {b}");
    }
}

#[test]
fn projection_round_trip_is_stable() {
    let today = date(2025, 6, 2);
    let mut store = MemoryStore::new();
    for i in 1..=5u64 {
        let mut t = task(i, &format!("t{i}"));
        t.project = Some("acme".into());
        store.insert(Entity::Task(t));
    }
    let narrow = run_query("task cols:id,text", &store, today);
    let _wide = run_query("task cols:id,text,project", &store, today);
    let narrow_again = run_query("task cols:id,text", &store, today);

    assert_eq!(narrow.columns, narrow_again.columns);
    assert_eq!(narrow.rows.len(), narrow_again.rows.len());
    for (a, b) in narrow.rows.iter().zip(narrow_again.rows.iter()) {
        for col in &narrow.columns {
            assert_eq!(a.field(col), b.field(col));
        }
    }
}

#[test]
fn sort_is_deterministic_across_runs() {
    let today = date(2025, 6, 2);
    let mut store = MemoryStore::new();
    for i in 1..=20u64 {
        let mut t = task(i, "same text");
        t.priority = Some((i % 2 + 1) as u8);
        store.insert(Entity::Task(t));
    }
    let first = run_query("task sort:priority+,text+", &store, today);
    let second = run_query("task sort:priority+,text+", &store, today);
    let a: Vec<String> = first.rows.iter().map(|r| r.key()).collect();
    let b: Vec<String> = second.rows.iter().map(|r| r.key()).collect();
    assert_eq!(a, b);
    // Ties on both keys keep insertion order (stable sort)
    let p1_keys: Vec<String> = first
        .rows
        .iter()
        .filter(|r| r.field("priority") == Some(Value::Int(1)))
        .map(|r| r.key())
        .collect();
    let mut sorted = p1_keys.clone();
    sorted.sort_by_key(|k| k.parse::<u64>().unwrap());
    assert_eq!(p1_keys, sorted);
}
