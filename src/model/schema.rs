use chrono::NaiveDate;

use super::dates;
use super::entity::{Domain, TaskStatus, Value};

/// Value-level validation failure, surfaced inline at the point of entry
/// (query filter value or cell edit).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown field '{field}' for {domain}")]
    UnknownField { domain: Domain, field: String },
    #[error("{field}: {message}")]
    Invalid { field: String, message: String },
}

impl ValidationError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// How a field's values are normalized, validated, and displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, trimmed on entry.
    Text,
    /// Date in any accepted input format, stored as ISO.
    Date,
    /// Priority 1..=3, accepts `P1`/`p1`/`1`.
    Priority,
    /// Lowercased comma-joined tag list.
    Tags,
    /// Task status lane.
    TaskStatus,
    /// Project lifecycle status.
    ProjectStatus,
    /// Non-negative whole minutes.
    Minutes,
    /// Read-only integer (ids).
    Id,
    /// Read-only date set by the system.
    SystemDate,
}

/// Per-(domain, field) schema entry. Defined once at startup and immutable
/// thereafter; `normalize` is idempotent for every kind.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kind: FieldKind,
    pub editable: bool,
    pub sensitive: bool,
    pub hint: &'static str,
    /// Fixed column width, or None for a flexible column.
    pub fixed_width: Option<usize>,
    pub min_width: usize,
}

impl FieldSchema {
    /// Normalize raw input to the canonical stored form. `today` anchors
    /// relative date input; callers inject it so evaluation and tests can
    /// pin "now".
    pub fn normalize(&self, raw: &str, today: NaiveDate) -> Result<String, ValidationError> {
        let raw = raw.trim();
        match self.kind {
            FieldKind::Text => Ok(raw.to_string()),
            FieldKind::Date | FieldKind::SystemDate => {
                if raw.is_empty() {
                    return Ok(String::new());
                }
                let date = dates::resolve_date(raw, today)
                    .map_err(|e| ValidationError::invalid(self.name, e.to_string()))?;
                Ok(date.format("%Y-%m-%d").to_string())
            }
            FieldKind::Priority => {
                if raw.is_empty() {
                    return Ok(String::new());
                }
                let digits = raw.strip_prefix(['p', 'P']).unwrap_or(raw);
                match digits.parse::<u8>() {
                    Ok(n) if (1..=3).contains(&n) => Ok(n.to_string()),
                    _ => Err(ValidationError::invalid(
                        self.name,
                        format!("'{raw}' is not a priority (use 1, 2, or 3)"),
                    )),
                }
            }
            FieldKind::Tags => {
                let tags: Vec<String> = raw
                    .split(',')
                    .map(|t| t.trim().to_ascii_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect();
                Ok(tags.join(","))
            }
            FieldKind::TaskStatus => match TaskStatus::parse(raw) {
                Some(s) => Ok(s.as_str().to_string()),
                None => Err(ValidationError::invalid(
                    self.name,
                    format!("'{raw}' is not a status (use todo, doing, or done)"),
                )),
            },
            FieldKind::ProjectStatus => {
                let lower = raw.to_ascii_lowercase();
                match lower.as_str() {
                    "active" | "archived" => Ok(lower),
                    _ => Err(ValidationError::invalid(
                        self.name,
                        format!("'{raw}' is not a project status (use active or archived)"),
                    )),
                }
            }
            FieldKind::Minutes => match raw.parse::<u32>() {
                Ok(n) => Ok(n.to_string()),
                Err(_) => Err(ValidationError::invalid(
                    self.name,
                    format!("'{raw}' is not a whole number of minutes"),
                )),
            },
            FieldKind::Id => match raw.parse::<u64>() {
                Ok(n) => Ok(n.to_string()),
                Err(_) => Err(ValidationError::invalid(
                    self.name,
                    format!("'{raw}' is not an id"),
                )),
            },
        }
    }

    /// Validate an already-normalized value. Normalization does the heavy
    /// lifting; this re-checks the canonical form so stored data can be
    /// verified without re-normalizing.
    pub fn validate(&self, canon: &str) -> Result<(), ValidationError> {
        match self.kind {
            FieldKind::Text | FieldKind::Tags => Ok(()),
            FieldKind::Date | FieldKind::SystemDate => {
                if canon.is_empty() || NaiveDate::parse_from_str(canon, "%Y-%m-%d").is_ok() {
                    Ok(())
                } else {
                    Err(ValidationError::invalid(
                        self.name,
                        format!("'{canon}' is not an ISO date"),
                    ))
                }
            }
            FieldKind::Priority => match canon {
                "" | "1" | "2" | "3" => Ok(()),
                _ => Err(ValidationError::invalid(
                    self.name,
                    format!("'{canon}' is out of the 1-3 priority range"),
                )),
            },
            FieldKind::TaskStatus => {
                if TaskStatus::parse(canon).is_some() {
                    Ok(())
                } else {
                    Err(ValidationError::invalid(
                        self.name,
                        format!("'{canon}' is not a status"),
                    ))
                }
            }
            FieldKind::ProjectStatus => match canon {
                "active" | "archived" => Ok(()),
                _ => Err(ValidationError::invalid(
                    self.name,
                    format!("'{canon}' is not a project status"),
                )),
            },
            FieldKind::Minutes => canon.parse::<u32>().map(|_| ()).map_err(|_| {
                ValidationError::invalid(self.name, format!("'{canon}' is not minutes"))
            }),
            FieldKind::Id => canon.parse::<u64>().map(|_| ()).map_err(|_| {
                ValidationError::invalid(self.name, format!("'{canon}' is not an id"))
            }),
        }
    }

    /// Display-only rendering. Never used as the stored value.
    pub fn format(&self, value: &Value) -> String {
        match (self.kind, value) {
            (FieldKind::Priority, Value::Int(n)) => format!("P{n}"),
            (FieldKind::Minutes, Value::Int(n)) => format_minutes(*n),
            (FieldKind::Tags, Value::List(tags)) => tags.join(","),
            _ => value.render(),
        }
    }
}

fn format_minutes(n: i64) -> String {
    if n >= 60 {
        let h = n / 60;
        let m = n % 60;
        if m == 0 {
            format!("{h}h")
        } else {
            format!("{h}h{m:02}")
        }
    } else {
        format!("{n}m")
    }
}

/// Single source of truth for how a raw field value becomes a validated,
/// displayable value. Built once at startup; immutable thereafter.
#[derive(Debug)]
pub struct SchemaRegistry {
    task: Vec<FieldSchema>,
    project: Vec<FieldSchema>,
    timelog: Vec<FieldSchema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

const fn field(
    name: &'static str,
    kind: FieldKind,
    editable: bool,
    hint: &'static str,
    fixed_width: Option<usize>,
    min_width: usize,
) -> FieldSchema {
    FieldSchema {
        name,
        kind,
        editable,
        sensitive: false,
        hint,
        fixed_width,
        min_width,
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let task = vec![
            field("id", FieldKind::Id, false, "task id", Some(4), 2),
            field("text", FieldKind::Text, true, "what to do", None, 16),
            field("project", FieldKind::Text, true, "project name", Some(12), 6),
            field("priority", FieldKind::Priority, true, "1-3", Some(4), 2),
            field("due", FieldKind::Date, true, "due date", Some(10), 8),
            field(
                "status",
                FieldKind::TaskStatus,
                true,
                "todo/doing/done",
                Some(6),
                4,
            ),
            field("tags", FieldKind::Tags, true, "comma-separated", Some(14), 6),
            field("created", FieldKind::SystemDate, false, "", Some(10), 8),
            field("done_on", FieldKind::SystemDate, false, "", Some(10), 8),
            FieldSchema {
                name: "notes",
                kind: FieldKind::Text,
                editable: true,
                sensitive: true,
                hint: "free-form notes",
                fixed_width: None,
                min_width: 8,
            },
        ];
        let project = vec![
            field("name", FieldKind::Text, false, "project name", Some(14), 6),
            field(
                "description",
                FieldKind::Text,
                true,
                "what it is",
                None,
                12,
            ),
            field(
                "status",
                FieldKind::ProjectStatus,
                true,
                "active/archived",
                Some(8),
                6,
            ),
            field("created", FieldKind::SystemDate, false, "", Some(10), 8),
        ];
        let timelog = vec![
            field("id", FieldKind::Id, false, "entry id", Some(4), 2),
            field("task", FieldKind::Id, false, "linked task id", Some(5), 2),
            field("project", FieldKind::Text, true, "project name", Some(12), 6),
            field("date", FieldKind::Date, true, "log date", Some(10), 8),
            field("minutes", FieldKind::Minutes, true, "minutes spent", Some(6), 4),
            field(
                "description",
                FieldKind::Text,
                true,
                "what was done",
                None,
                12,
            ),
        ];
        SchemaRegistry {
            task,
            project,
            timelog,
        }
    }

    /// All schemas for a domain, in canonical column order.
    pub fn fields(&self, domain: Domain) -> &[FieldSchema] {
        match domain {
            Domain::Task => &self.task,
            Domain::Project => &self.project,
            Domain::TimeLog => &self.timelog,
        }
    }

    /// Schema for one field. `None` means the field is unknown and callers
    /// treat the value as free-form, non-validated.
    pub fn get(&self, domain: Domain, name: &str) -> Option<&FieldSchema> {
        self.fields(domain).iter().find(|f| f.name == name)
    }

    /// Names of all known fields for a domain, for parser validation.
    pub fn field_names(&self, domain: Domain) -> Vec<&'static str> {
        self.fields(domain).iter().map(|f| f.name).collect()
    }

    pub fn normalize(
        &self,
        domain: Domain,
        name: &str,
        raw: &str,
        today: NaiveDate,
    ) -> Result<String, ValidationError> {
        match self.get(domain, name) {
            Some(schema) => schema.normalize(raw, today),
            None => Err(ValidationError::UnknownField {
                domain,
                field: name.to_string(),
            }),
        }
    }

    pub fn validate(
        &self,
        domain: Domain,
        name: &str,
        canon: &str,
    ) -> Result<(), ValidationError> {
        match self.get(domain, name) {
            Some(schema) => schema.validate(canon),
            None => Err(ValidationError::UnknownField {
                domain,
                field: name.to_string(),
            }),
        }
    }

    /// Display formatting; unknown fields fall back to the value's plain
    /// rendering.
    pub fn format(&self, domain: Domain, name: &str, value: &Value) -> String {
        match self.get(domain, name) {
            Some(schema) => schema.format(value),
            None => value.render(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_priority_normalization() {
        let reg = SchemaRegistry::new();
        for input in ["P2", "p2", "2"] {
            assert_eq!(
                reg.normalize(Domain::Task, "priority", input, today()),
                Ok("2".to_string()),
                "input {input}"
            );
        }
        assert!(reg.normalize(Domain::Task, "priority", "p5", today()).is_err());
        assert!(reg.normalize(Domain::Task, "priority", "0", today()).is_err());
        assert!(reg.normalize(Domain::Task, "priority", "abc", today()).is_err());
    }

    #[test]
    fn test_date_normalization() {
        let reg = SchemaRegistry::new();
        assert_eq!(
            reg.normalize(Domain::Task, "due", "+7", today()),
            Ok("2025-06-08".to_string())
        );
        assert_eq!(
            reg.normalize(Domain::Task, "due", "eom", today()),
            Ok("2025-06-30".to_string())
        );
        let err = reg
            .normalize(Domain::Task, "due", "whenever", today())
            .unwrap_err();
        assert!(err.to_string().contains("yyyy-mm-dd"));
    }

    #[test]
    fn test_normalize_idempotent_for_all_kinds() {
        let reg = SchemaRegistry::new();
        let cases = [
            (Domain::Task, "text", "  Write the report "),
            (Domain::Task, "due", "+7"),
            (Domain::Task, "priority", "P1"),
            (Domain::Task, "tags", "Work, URGENT"),
            (Domain::Task, "status", "Doing"),
            (Domain::Project, "status", "Active"),
            (Domain::TimeLog, "minutes", "90"),
        ];
        for (domain, name, raw) in cases {
            let once = reg.normalize(domain, name, raw, today()).unwrap();
            let twice = reg.normalize(domain, name, &once, today()).unwrap();
            assert_eq!(once, twice, "{domain}/{name} not idempotent");
        }
    }

    #[test]
    fn test_validate_checks_canonical_form() {
        let reg = SchemaRegistry::new();
        assert!(reg.validate(Domain::Task, "priority", "2").is_ok());
        assert!(reg.validate(Domain::Task, "priority", "9").is_err());
        assert!(reg.validate(Domain::Task, "due", "2025-06-08").is_ok());
        assert!(reg.validate(Domain::Task, "due", "tomorrow").is_err());
        assert!(reg.validate(Domain::Task, "bogus", "x").is_err());
    }

    #[test]
    fn test_unknown_field() {
        let reg = SchemaRegistry::new();
        assert!(reg.get(Domain::Task, "velocity").is_none());
        assert_eq!(
            reg.normalize(Domain::Task, "velocity", "3", today()),
            Err(ValidationError::UnknownField {
                domain: Domain::Task,
                field: "velocity".into()
            })
        );
    }

    #[test]
    fn test_display_format() {
        let reg = SchemaRegistry::new();
        assert_eq!(
            reg.format(Domain::Task, "priority", &Value::Int(1)),
            "P1"
        );
        assert_eq!(
            reg.format(Domain::TimeLog, "minutes", &Value::Int(90)),
            "1h30"
        );
        assert_eq!(
            reg.format(Domain::TimeLog, "minutes", &Value::Int(45)),
            "45m"
        );
        assert_eq!(
            reg.format(Domain::TimeLog, "minutes", &Value::Int(120)),
            "2h"
        );
        // Unknown field falls back to plain rendering
        assert_eq!(
            reg.format(Domain::Task, "time_week", &Value::Int(30)),
            "30"
        );
    }

    #[test]
    fn test_editability_flags() {
        let reg = SchemaRegistry::new();
        assert!(!reg.get(Domain::Task, "id").unwrap().editable);
        assert!(reg.get(Domain::Task, "text").unwrap().editable);
        assert!(reg.get(Domain::Task, "notes").unwrap().sensitive);
        assert!(!reg.get(Domain::Project, "name").unwrap().editable);
    }
}
