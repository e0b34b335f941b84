use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::model::{Domain, Entity, Project, SchemaRegistry, Task, TaskStatus, TimeLog};

use super::lock::DirLock;
use super::{DataProvider, DataStore, StoreError};

/// How many rotated `.bak.N` copies to keep per data file.
const BACKUP_DEPTH: u32 = 3;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskFile {
    next_id: u64,
    items: Vec<Task>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProjectFile {
    items: Vec<Project>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LogFile {
    next_id: u64,
    items: Vec<TimeLog>,
}

/// JSON-file-backed store: one file per collection under the data
/// directory, advisory-locked writes, atomic temp-file replacement, and
/// rotating backups.
pub struct JsonStore {
    dir: PathBuf,
    schema: SchemaRegistry,
    tasks: TaskFile,
    projects: ProjectFile,
    timelogs: LogFile,
}

impl JsonStore {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|e| StoreError::Write {
            path: dir.to_path_buf(),
            source: e,
        })?;
        Ok(JsonStore {
            dir: dir.to_path_buf(),
            schema: SchemaRegistry::new(),
            tasks: load_file(&dir.join("tasks.json"))?,
            projects: load_file(&dir.join("projects.json"))?,
            timelogs: load_file(&dir.join("timelogs.json"))?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of all known projects, for the query parser's multi-word
    /// `@project` consumption.
    pub fn project_names(&self) -> Vec<String> {
        self.projects.items.iter().map(|p| p.name.clone()).collect()
    }

    pub fn add_task(
        &mut self,
        text: String,
        project: Option<String>,
        priority: Option<u8>,
        due: Option<NaiveDate>,
        tags: Vec<String>,
        today: NaiveDate,
    ) -> Result<u64, StoreError> {
        self.tasks.next_id += 1;
        let id = self.tasks.next_id;
        self.tasks.items.push(Task {
            id,
            text,
            project,
            priority,
            due,
            status: TaskStatus::Todo,
            tags,
            created: today,
            done_on: None,
            notes: None,
            extras: Default::default(),
        });
        self.save(Domain::Task)?;
        Ok(id)
    }

    pub fn add_project(
        &mut self,
        name: String,
        description: Option<String>,
        today: NaiveDate,
    ) -> Result<(), StoreError> {
        if self.projects.items.iter().any(|p| p.name == name) {
            return Err(StoreError::Validation(
                crate::model::ValidationError::Invalid {
                    field: "name".into(),
                    message: format!("project '{name}' already exists"),
                },
            ));
        }
        self.projects.items.push(Project {
            name,
            description,
            status: "active".into(),
            created: today,
            extras: Default::default(),
        });
        self.save(Domain::Project)
    }

    pub fn add_log(
        &mut self,
        project: Option<String>,
        minutes: u32,
        description: Option<String>,
        task_id: Option<u64>,
        date: NaiveDate,
    ) -> Result<u64, StoreError> {
        self.timelogs.next_id += 1;
        let id = self.timelogs.next_id;
        self.timelogs.items.push(TimeLog {
            id,
            task_id,
            project,
            date,
            minutes,
            description,
            extras: Default::default(),
        });
        self.save(Domain::TimeLog)?;
        Ok(id)
    }

    pub fn mark_done(&mut self, id: u64, today: NaiveDate) -> Result<(), StoreError> {
        let task = self
            .tasks
            .items
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound {
                domain: Domain::Task,
                key: id.to_string(),
            })?;
        task.status = TaskStatus::Done;
        task.done_on = Some(today);
        self.save(Domain::Task)
    }

    fn path_for(&self, domain: Domain) -> PathBuf {
        let name = match domain {
            Domain::Task => "tasks.json",
            Domain::Project => "projects.json",
            Domain::TimeLog => "timelogs.json",
        };
        self.dir.join(name)
    }

    fn save(&self, domain: Domain) -> Result<(), StoreError> {
        let _lock = DirLock::acquire_default(&self.dir)?;
        let path = self.path_for(domain);
        match domain {
            Domain::Task => save_file(&path, &self.tasks),
            Domain::Project => save_file(&path, &self.projects),
            Domain::TimeLog => save_file(&path, &self.timelogs),
        }
    }

    /// Reload one collection from disk, detecting whether the given
    /// (key, field) changed relative to our cached copy. This is the
    /// conflict gate for edits staged while another process wrote.
    fn check_conflict(
        &self,
        domain: Domain,
        key: &str,
        field: &str,
    ) -> Result<(), StoreError> {
        let fresh = read_entities(&self.dir, domain)?;
        let cached = self.cached_entity(domain, key);
        let disk = fresh.iter().find(|e| e.key() == key);
        match (cached, disk) {
            (Some(ours), Some(theirs)) => {
                if ours.field(field) != theirs.field(field) {
                    Err(StoreError::EditConflict {
                        domain,
                        key: key.to_string(),
                        field: field.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            (Some(_), None) => Err(StoreError::EditConflict {
                domain,
                key: key.to_string(),
                field: field.to_string(),
            }),
            (None, _) => Err(StoreError::NotFound {
                domain,
                key: key.to_string(),
            }),
        }
    }

    /// Re-read one collection from disk so externally-added rows survive
    /// our next whole-file save.
    fn reload(&mut self, domain: Domain) -> Result<(), StoreError> {
        match domain {
            Domain::Task => self.tasks = load_file(&self.path_for(domain))?,
            Domain::Project => self.projects = load_file(&self.path_for(domain))?,
            Domain::TimeLog => self.timelogs = load_file(&self.path_for(domain))?,
        }
        Ok(())
    }

    fn cached_entity(&self, domain: Domain, key: &str) -> Option<Entity> {
        match domain {
            Domain::Task => self
                .tasks
                .items
                .iter()
                .find(|t| t.id.to_string() == key)
                .cloned()
                .map(Entity::Task),
            Domain::Project => self
                .projects
                .items
                .iter()
                .find(|p| p.name == key)
                .cloned()
                .map(Entity::Project),
            Domain::TimeLog => self
                .timelogs
                .items
                .iter()
                .find(|l| l.id.to_string() == key)
                .cloned()
                .map(Entity::TimeLog),
        }
    }

    fn write_field(
        &mut self,
        domain: Domain,
        key: &str,
        field: &str,
        value: &str,
        require_editable: bool,
    ) -> Result<(), StoreError> {
        if require_editable {
            let editable = self.schema.get(domain, field).is_some_and(|s| s.editable);
            if !editable {
                return Err(StoreError::NotEditable {
                    domain,
                    field: field.to_string(),
                });
            }
        }
        self.schema.validate(domain, field, value)?;
        self.check_conflict(domain, key, field)?;
        self.reload(domain)?;

        let applied = match domain {
            Domain::Task => self
                .tasks
                .items
                .iter_mut()
                .find(|t| t.id.to_string() == key)
                .map(|t| {
                    let mut e = Entity::Task(t.clone());
                    let ok = e.set_field(field, value);
                    if ok && let Entity::Task(updated) = e {
                        *t = updated;
                    }
                    ok
                }),
            Domain::Project => self
                .projects
                .items
                .iter_mut()
                .find(|p| p.name == key)
                .map(|p| {
                    let mut e = Entity::Project(p.clone());
                    let ok = e.set_field(field, value);
                    if ok && let Entity::Project(updated) = e {
                        *p = updated;
                    }
                    ok
                }),
            Domain::TimeLog => self
                .timelogs
                .items
                .iter_mut()
                .find(|l| l.id.to_string() == key)
                .map(|l| {
                    let mut e = Entity::TimeLog(l.clone());
                    let ok = e.set_field(field, value);
                    if ok && let Entity::TimeLog(updated) = e {
                        *l = updated;
                    }
                    ok
                }),
        };
        match applied {
            Some(true) => self.save(domain),
            Some(false) => Err(StoreError::NotEditable {
                domain,
                field: field.to_string(),
            }),
            None => Err(StoreError::NotFound {
                domain,
                key: key.to_string(),
            }),
        }
    }
}

impl DataProvider for JsonStore {
    fn entities(&self, domain: Domain) -> Result<Vec<Entity>, StoreError> {
        let rows = match domain {
            Domain::Task => self.tasks.items.iter().cloned().map(Entity::Task).collect(),
            Domain::Project => self
                .projects
                .items
                .iter()
                .cloned()
                .map(Entity::Project)
                .collect(),
            Domain::TimeLog => self
                .timelogs
                .items
                .iter()
                .cloned()
                .map(Entity::TimeLog)
                .collect(),
        };
        Ok(rows)
    }
}

impl DataStore for JsonStore {
    fn apply_edit(
        &mut self,
        domain: Domain,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.write_field(domain, key, field, value, true)
    }

    fn delete_entities(&mut self, domain: Domain, keys: &[String]) -> Result<(), StoreError> {
        self.reload(domain)?;
        match domain {
            Domain::Task => self.tasks.items.retain(|t| !keys.contains(&t.id.to_string())),
            Domain::Project => self.projects.items.retain(|p| !keys.contains(&p.name)),
            Domain::TimeLog => self
                .timelogs
                .items
                .retain(|l| !keys.contains(&l.id.to_string())),
        }
        self.save(domain)
    }

    fn move_group_field(
        &mut self,
        domain: Domain,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.write_field(domain, key, field, value, false)
    }
}

fn load_file<T: Default + DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            source: e,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn read_entities(dir: &Path, domain: Domain) -> Result<Vec<Entity>, StoreError> {
    match domain {
        Domain::Task => {
            let file: TaskFile = load_file(&dir.join("tasks.json"))?;
            Ok(file.items.into_iter().map(Entity::Task).collect())
        }
        Domain::Project => {
            let file: ProjectFile = load_file(&dir.join("projects.json"))?;
            Ok(file.items.into_iter().map(Entity::Project).collect())
        }
        Domain::TimeLog => {
            let file: LogFile = load_file(&dir.join("timelogs.json"))?;
            Ok(file.items.into_iter().map(Entity::TimeLog).collect())
        }
    }
}

/// Rotate `.bak.1` → `.bak.2` → … and copy the current file to `.bak.1`,
/// then write the new content to a temp file and atomically replace.
fn save_file<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    if path.exists() {
        rotate_backups(path);
    }
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    let content = serde_json::to_string_pretty(data).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| StoreError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    tmp.persist(path).map_err(|e| StoreError::Write {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

fn rotate_backups(path: &Path) {
    let bak = |n: u32| PathBuf::from(format!("{}.bak.{n}", path.display()));
    for n in (1..BACKUP_DEPTH).rev() {
        let _ = fs::rename(bak(n), bak(n + 1));
    }
    let _ = fs::copy(path, bak(1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_open_empty_dir() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::open(tmp.path()).unwrap();
        assert!(store.entities(Domain::Task).unwrap().is_empty());
    }

    #[test]
    fn test_add_and_reload() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::open(tmp.path()).unwrap();
        let id = store
            .add_task("write tests".into(), Some("acme".into()), Some(1), None, vec![], today())
            .unwrap();
        assert_eq!(id, 1);
        store.add_project("acme".into(), None, today()).unwrap();

        let reopened = JsonStore::open(tmp.path()).unwrap();
        let tasks = reopened.entities(Domain::Task).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            tasks[0].field("text"),
            Some(crate::model::Value::Str("write tests".into()))
        );
        assert_eq!(reopened.project_names(), vec!["acme"]);
    }

    #[test]
    fn test_ids_are_monotonic_across_delete() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::open(tmp.path()).unwrap();
        let a = store
            .add_task("a".into(), None, None, None, vec![], today())
            .unwrap();
        store
            .delete_entities(Domain::Task, &[a.to_string()])
            .unwrap();
        let b = store
            .add_task("b".into(), None, None, None, vec![], today())
            .unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_apply_edit_persists() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::open(tmp.path()).unwrap();
        store
            .add_task("a".into(), None, None, None, vec![], today())
            .unwrap();
        store
            .apply_edit(Domain::Task, "1", "priority", "2")
            .unwrap();

        let reopened = JsonStore::open(tmp.path()).unwrap();
        let tasks = reopened.entities(Domain::Task).unwrap();
        assert_eq!(tasks[0].field("priority"), Some(crate::model::Value::Int(2)));
    }

    #[test]
    fn test_edit_conflict_detected() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::open(tmp.path()).unwrap();
        store
            .add_task("a".into(), None, None, None, vec![], today())
            .unwrap();

        // Another process rewrites the task's text on disk
        let mut other = JsonStore::open(tmp.path()).unwrap();
        other
            .apply_edit(Domain::Task, "1", "text", "changed elsewhere")
            .unwrap();

        let result = store.apply_edit(Domain::Task, "1", "text", "my edit");
        assert!(matches!(result, Err(StoreError::EditConflict { .. })));
        // A non-conflicting field still applies
        store
            .apply_edit(Domain::Task, "1", "priority", "3")
            .unwrap();
    }

    #[test]
    fn test_mark_done() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::open(tmp.path()).unwrap();
        store
            .add_task("a".into(), None, None, None, vec![], today())
            .unwrap();
        store.mark_done(1, today()).unwrap();
        let tasks = store.entities(Domain::Task).unwrap();
        assert_eq!(
            tasks[0].field("status"),
            Some(crate::model::Value::Str("done".into()))
        );
        assert_eq!(
            tasks[0].field("done_on"),
            Some(crate::model::Value::Date(today()))
        );
    }

    #[test]
    fn test_backup_rotation() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::open(tmp.path()).unwrap();
        for i in 0..3 {
            store
                .add_task(format!("t{i}"), None, None, None, vec![], today())
                .unwrap();
        }
        assert!(tmp.path().join("tasks.json.bak.1").exists());
        assert!(tmp.path().join("tasks.json.bak.2").exists());
    }

    #[test]
    fn test_duplicate_project_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::open(tmp.path()).unwrap();
        store.add_project("acme".into(), None, today()).unwrap();
        assert!(store.add_project("acme".into(), None, today()).is_err());
    }
}
