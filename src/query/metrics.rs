use chrono::{Days, NaiveDate};

use crate::model::{Domain, Entity, Project, Task, TimeLog, Value};
use crate::store::{DataProvider, StoreError};

/// An immutable copy of all three collections, taken once per evaluation.
/// Metric and relation resolvers join across it freely.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub tasks: Vec<Entity>,
    pub projects: Vec<Entity>,
    pub timelogs: Vec<Entity>,
}

impl Snapshot {
    pub fn load(provider: &dyn DataProvider) -> Result<Snapshot, StoreError> {
        Ok(Snapshot {
            tasks: provider.entities(Domain::Task)?,
            projects: provider.entities(Domain::Project)?,
            timelogs: provider.entities(Domain::TimeLog)?,
        })
    }

    pub fn rows(&self, domain: Domain) -> &[Entity] {
        match domain {
            Domain::Task => &self.tasks,
            Domain::Project => &self.projects,
            Domain::TimeLog => &self.timelogs,
        }
    }

    fn timelogs_typed(&self) -> impl Iterator<Item = &TimeLog> {
        self.timelogs.iter().filter_map(|e| match e {
            Entity::TimeLog(l) => Some(l),
            _ => None,
        })
    }

    fn tasks_typed(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter_map(|e| match e {
            Entity::Task(t) => Some(t),
            _ => None,
        })
    }

    fn project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find_map(|e| match e {
            Entity::Project(p) if p.name == name => Some(p),
            _ => None,
        })
    }
}

/// Computes one derived column for one row. `None` means the metric does
/// not apply to this row (it is simply not attached).
pub type MetricFn = fn(&Entity, &Snapshot, NaiveDate) -> Option<Value>;

/// Resolve a metric name for a domain. Unknown names return `None`; the
/// evaluator logs and moves on.
pub fn metric_resolver(domain: Domain, name: &str) -> Option<MetricFn> {
    match (domain, name) {
        (Domain::Task, "time_total") => Some(task_time_total),
        (Domain::Task, "time_week") => Some(task_time_week),
        (Domain::Task, "age_days") => Some(task_age_days),
        (Domain::Project, "task_count") => Some(project_task_count),
        (Domain::Project, "open_tasks") => Some(project_open_tasks),
        (Domain::Project, "time_week") => Some(project_time_week),
        (Domain::TimeLog, "hours") => Some(timelog_hours),
        _ => None,
    }
}

/// Attaches relation-derived fields to one row. Unresolvable relations
/// for a domain are a no-op by contract (relations are additive).
pub type RelationFn = fn(&mut Entity, &Snapshot);

pub fn relation_resolver(domain: Domain, name: &str) -> Option<RelationFn> {
    match (domain, name) {
        (Domain::Task, "project") => Some(task_with_project),
        (Domain::TimeLog, "project") => Some(timelog_with_project),
        (Domain::TimeLog, "task") => Some(timelog_with_task),
        _ => None,
    }
}

fn as_task(e: &Entity) -> Option<&Task> {
    match e {
        Entity::Task(t) => Some(t),
        _ => None,
    }
}

fn as_project(e: &Entity) -> Option<&Project> {
    match e {
        Entity::Project(p) => Some(p),
        _ => None,
    }
}

fn as_timelog(e: &Entity) -> Option<&TimeLog> {
    match e {
        Entity::TimeLog(l) => Some(l),
        _ => None,
    }
}

fn within_week(date: NaiveDate, today: NaiveDate) -> bool {
    let week_ago = today.checked_sub_days(Days::new(6)).unwrap_or(today);
    date >= week_ago && date <= today
}

fn task_time_total(e: &Entity, snap: &Snapshot, _today: NaiveDate) -> Option<Value> {
    let task = as_task(e)?;
    let total: i64 = snap
        .timelogs_typed()
        .filter(|l| l.task_id == Some(task.id))
        .map(|l| i64::from(l.minutes))
        .sum();
    Some(Value::Int(total))
}

fn task_time_week(e: &Entity, snap: &Snapshot, today: NaiveDate) -> Option<Value> {
    let task = as_task(e)?;
    let total: i64 = snap
        .timelogs_typed()
        .filter(|l| l.task_id == Some(task.id) && within_week(l.date, today))
        .map(|l| i64::from(l.minutes))
        .sum();
    Some(Value::Int(total))
}

fn task_age_days(e: &Entity, _snap: &Snapshot, today: NaiveDate) -> Option<Value> {
    let task = as_task(e)?;
    Some(Value::Int((today - task.created).num_days()))
}

fn project_task_count(e: &Entity, snap: &Snapshot, _today: NaiveDate) -> Option<Value> {
    let project = as_project(e)?;
    let count = snap
        .tasks_typed()
        .filter(|t| t.project.as_deref() == Some(project.name.as_str()))
        .count();
    Some(Value::Int(count as i64))
}

fn project_open_tasks(e: &Entity, snap: &Snapshot, _today: NaiveDate) -> Option<Value> {
    let project = as_project(e)?;
    let count = snap
        .tasks_typed()
        .filter(|t| {
            t.project.as_deref() == Some(project.name.as_str())
                && t.status != crate::model::TaskStatus::Done
        })
        .count();
    Some(Value::Int(count as i64))
}

fn project_time_week(e: &Entity, snap: &Snapshot, today: NaiveDate) -> Option<Value> {
    let project = as_project(e)?;
    let total: i64 = snap
        .timelogs_typed()
        .filter(|l| {
            l.project.as_deref() == Some(project.name.as_str()) && within_week(l.date, today)
        })
        .map(|l| i64::from(l.minutes))
        .sum();
    Some(Value::Int(total))
}

fn timelog_hours(e: &Entity, _snap: &Snapshot, _today: NaiveDate) -> Option<Value> {
    let log = as_timelog(e)?;
    Some(Value::Float(f64::from(log.minutes) / 60.0))
}

fn task_with_project(e: &mut Entity, snap: &Snapshot) {
    let Some(name) = as_task(e).and_then(|t| t.project.clone()) else {
        return;
    };
    let Some(project) = snap.project_by_name(&name) else {
        return;
    };
    let status = project.status.clone();
    let description = project.description.clone();
    e.attach("project_status", Value::Str(status));
    if let Some(desc) = description {
        e.attach("project_description", Value::Str(desc));
    }
}

fn timelog_with_project(e: &mut Entity, snap: &Snapshot) {
    let Some(name) = as_timelog(e).and_then(|l| l.project.clone()) else {
        return;
    };
    let Some(project) = snap.project_by_name(&name) else {
        return;
    };
    let name = project.name.clone();
    let status = project.status.clone();
    e.attach("project_name", Value::Str(name));
    e.attach("project_status", Value::Str(status));
}

fn timelog_with_task(e: &mut Entity, snap: &Snapshot) {
    let Some(task_id) = as_timelog(e).and_then(|l| l.task_id) else {
        return;
    };
    let Some(task) = snap.tasks_typed().find(|t| t.id == task_id) else {
        return;
    };
    let text = task.text.clone();
    e.attach("task_text", Value::Str(text));
}
