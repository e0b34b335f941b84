use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The three entity collections the console manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Task,
    Project,
    TimeLog,
}

impl Domain {
    /// Normalize a user-typed domain token. `None` for unrecognized input.
    pub fn parse(token: &str) -> Option<Domain> {
        match token.to_ascii_lowercase().as_str() {
            "task" | "tasks" => Some(Domain::Task),
            "project" | "projects" => Some(Domain::Project),
            "timelog" | "timelogs" | "time" => Some(Domain::TimeLog),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Task => "task",
            Domain::Project => "project",
            Domain::TimeLog => "timelog",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field value as seen by the query evaluator and the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    List(Vec<String>),
}

impl Value {
    /// Plain-text rendering, used when no schema formatter applies.
    pub fn render(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Float(x) => format!("{:.1}", x),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::List(items) => items.join(","),
        }
    }

    /// Numeric view for relational operators, when one exists.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Task status lanes. Doubles as the default kanban group field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
}

impl TaskStatus {
    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s.to_ascii_lowercase().as_str() {
            "todo" => Some(TaskStatus::Todo),
            "doing" => Some(TaskStatus::Doing),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
        }
    }
}

/// A tracked task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub text: String,
    #[serde(default)]
    pub project: Option<String>,
    /// 1 (highest) to 3 (lowest).
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub due: Option<NaiveDate>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created: NaiveDate,
    #[serde(default)]
    pub done_on: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Evaluator-injected computed fields (metrics, relations). Never persisted.
    #[serde(skip)]
    pub extras: BTreeMap<String, Value>,
}

/// A project, keyed by unique name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_project_status")]
    pub status: String,
    pub created: NaiveDate,
    #[serde(skip)]
    pub extras: BTreeMap<String, Value>,
}

fn default_project_status() -> String {
    "active".to_string()
}

/// A logged block of time against a project and optionally a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeLog {
    pub id: u64,
    #[serde(default)]
    pub task_id: Option<u64>,
    #[serde(default)]
    pub project: Option<String>,
    pub date: NaiveDate,
    pub minutes: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(skip)]
    pub extras: BTreeMap<String, Value>,
}

/// One row flowing through the query pipeline and the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entity {
    Task(Task),
    Project(Project),
    TimeLog(TimeLog),
}

impl Entity {
    pub fn domain(&self) -> Domain {
        match self {
            Entity::Task(_) => Domain::Task,
            Entity::Project(_) => Domain::Project,
            Entity::TimeLog(_) => Domain::TimeLog,
        }
    }

    /// Stable key within the entity's collection: numeric id for tasks and
    /// timelogs, unique name for projects.
    pub fn key(&self) -> String {
        match self {
            Entity::Task(t) => t.id.to_string(),
            Entity::Project(p) => p.name.clone(),
            Entity::TimeLog(l) => l.id.to_string(),
        }
    }

    /// Look up a field by name. Known fields resolve through an exhaustive
    /// match; anything else falls back to the `extras` map so computed
    /// metrics and relations read like ordinary fields.
    pub fn field(&self, name: &str) -> Option<Value> {
        let known = match self {
            Entity::Task(t) => match name {
                "id" => Some(Value::Int(t.id as i64)),
                "text" => Some(Value::Str(t.text.clone())),
                "project" => t.project.clone().map(Value::Str),
                "priority" => t.priority.map(|p| Value::Int(i64::from(p))),
                "due" => t.due.map(Value::Date),
                "status" => Some(Value::Str(t.status.as_str().to_string())),
                "tags" => {
                    if t.tags.is_empty() {
                        None
                    } else {
                        Some(Value::List(t.tags.clone()))
                    }
                }
                "created" => Some(Value::Date(t.created)),
                "done_on" => t.done_on.map(Value::Date),
                "notes" => t.notes.clone().map(Value::Str),
                _ => return self.extra(name),
            },
            Entity::Project(p) => match name {
                "name" => Some(Value::Str(p.name.clone())),
                "description" => p.description.clone().map(Value::Str),
                "status" => Some(Value::Str(p.status.clone())),
                "created" => Some(Value::Date(p.created)),
                _ => return self.extra(name),
            },
            Entity::TimeLog(l) => match name {
                "id" => Some(Value::Int(l.id as i64)),
                "task" => l.task_id.map(|id| Value::Int(id as i64)),
                "project" => l.project.clone().map(Value::Str),
                "date" => Some(Value::Date(l.date)),
                "minutes" => Some(Value::Int(i64::from(l.minutes))),
                "description" => l.description.clone().map(Value::Str),
                _ => return self.extra(name),
            },
        };
        known
    }

    fn extra(&self, name: &str) -> Option<Value> {
        let extras = match self {
            Entity::Task(t) => &t.extras,
            Entity::Project(p) => &p.extras,
            Entity::TimeLog(l) => &l.extras,
        };
        extras.get(name).cloned()
    }

    /// Attach a computed field. Used by the evaluator for metrics and
    /// relation-derived columns.
    pub fn attach(&mut self, name: &str, value: Value) {
        let extras = match self {
            Entity::Task(t) => &mut t.extras,
            Entity::Project(p) => &mut p.extras,
            Entity::TimeLog(l) => &mut l.extras,
        };
        extras.insert(name.to_string(), value);
    }

    /// Write a normalized value into a known field. Returns false when the
    /// field does not exist or cannot be set on this entity; the schema
    /// registry is responsible for validating before this is called.
    pub fn set_field(&mut self, name: &str, canon: &str) -> bool {
        match self {
            Entity::Task(t) => match name {
                "text" => {
                    t.text = canon.to_string();
                    true
                }
                "project" => {
                    t.project = non_empty(canon);
                    true
                }
                "priority" => match canon.parse::<u8>() {
                    Ok(p) if (1..=3).contains(&p) => {
                        t.priority = Some(p);
                        true
                    }
                    _ if canon.is_empty() => {
                        t.priority = None;
                        true
                    }
                    _ => false,
                },
                "due" => match canon {
                    "" => {
                        t.due = None;
                        true
                    }
                    _ => match NaiveDate::parse_from_str(canon, "%Y-%m-%d") {
                        Ok(d) => {
                            t.due = Some(d);
                            true
                        }
                        Err(_) => false,
                    },
                },
                "status" => match TaskStatus::parse(canon) {
                    Some(s) => {
                        t.status = s;
                        true
                    }
                    None => false,
                },
                "tags" => {
                    t.tags = canon
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                    true
                }
                "notes" => {
                    t.notes = non_empty(canon);
                    true
                }
                _ => false,
            },
            Entity::Project(p) => match name {
                "description" => {
                    p.description = non_empty(canon);
                    true
                }
                "status" => {
                    p.status = canon.to_string();
                    true
                }
                _ => false,
            },
            Entity::TimeLog(l) => match name {
                "project" => {
                    l.project = non_empty(canon);
                    true
                }
                "date" => match NaiveDate::parse_from_str(canon, "%Y-%m-%d") {
                    Ok(d) => {
                        l.date = d;
                        true
                    }
                    Err(_) => false,
                },
                "minutes" => match canon.parse::<u32>() {
                    Ok(m) => {
                        l.minutes = m;
                        true
                    }
                    Err(_) => false,
                },
                "description" => {
                    l.description = non_empty(canon);
                    true
                }
                _ => false,
            },
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}
