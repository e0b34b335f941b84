use std::cmp::Ordering;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::model::{Domain, Entity, FieldKind, SchemaRegistry, Value, dates};
use crate::store::{DataProvider, StoreError};

use super::metrics::{Snapshot, metric_resolver, relation_resolver};
use super::spec::{FilterClause, FilterOp, QuerySpec, SortDir, SortKey, ViewKind};

/// How the dataset was traversed. The in-memory provider always scans;
/// `Indexed` is reserved for index-backed providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Scan,
    Indexed,
}

/// The immutable product of one query execution.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub rows: Vec<Entity>,
    /// Final projected column list, including the synthetic `group` column
    /// when grouping.
    pub columns: Vec<String>,
    pub actual_row_count: usize,
    /// Pre-filter dataset size.
    pub estimated_row_count: usize,
    pub strategy: Strategy,
    /// Caller-visible warnings (e.g. unknown projection columns).
    pub warnings: Vec<String>,
    pub view: ViewKind,
    pub group_by: Option<String>,
}

/// Whole-query failures. Row-level problems never surface here; they
/// degrade (row excluded, metric skipped) and are logged instead.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("query has {0} validation error(s); fix them before evaluating")]
    InvalidSpec(usize),
    #[error("could not resolve dataset for {domain}: {source}")]
    Provider {
        domain: Domain,
        source: StoreError,
    },
}

/// Executes a validated `QuerySpec` against a dataset snapshot. All stages
/// operate on copies; the provider's data is never mutated.
pub struct Evaluator<'a> {
    provider: &'a dyn DataProvider,
    schema: &'a SchemaRegistry,
    today: NaiveDate,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        provider: &'a dyn DataProvider,
        schema: &'a SchemaRegistry,
        today: NaiveDate,
    ) -> Self {
        Evaluator {
            provider,
            schema,
            today,
        }
    }

    pub fn evaluate(
        &self,
        spec: &QuerySpec,
        default_columns: &[String],
    ) -> Result<EvaluationResult, EvalError> {
        if !spec.is_valid() {
            return Err(EvalError::InvalidSpec(spec.errors.len()));
        }
        let domain = spec.domain;

        // 1. Resolve dataset
        let mut rows = self
            .provider
            .entities(domain)
            .map_err(|source| EvalError::Provider { domain, source })?;
        let estimated_row_count = rows.len();

        // 2. Filters: AND across fields, AND within a field
        rows.retain(|row| {
            spec.filters.iter().all(|(field, clauses)| {
                clauses.iter().all(|c| self.clause_matches(row, field, c))
            })
        });

        // 3. Free-text search over the fixed searchable field set
        if !spec.free_text.is_empty() {
            rows.retain(|row| {
                let haystack = searchable_text(row);
                spec.free_text
                    .iter()
                    .all(|term| haystack.contains(&term.to_lowercase()))
            });
        }

        // 4-5. Relations and metrics join across the full snapshot
        let needs_snapshot =
            !spec.directives.relations.is_empty() || !spec.directives.metrics.is_empty();
        if needs_snapshot {
            let snapshot = Snapshot::load(self.provider)
                .map_err(|source| EvalError::Provider { domain, source })?;
            for name in &spec.directives.relations {
                match relation_resolver(domain, name) {
                    Some(resolve) => {
                        for row in &mut rows {
                            resolve(row, &snapshot);
                        }
                    }
                    None => {
                        debug!(domain = %domain, relation = %name, "relation not defined; skipping");
                    }
                }
            }
            for name in &spec.directives.metrics {
                match metric_resolver(domain, name) {
                    Some(compute) => {
                        for row in &mut rows {
                            if let Some(value) = compute(row, &snapshot, self.today) {
                                row.attach(name, value);
                            }
                        }
                    }
                    None => {
                        warn!(domain = %domain, metric = %name, "unknown metric; not attached");
                    }
                }
            }
        }

        // 6. Sort: explicit keys, else smart defaults
        let sort_keys = self.effective_sort(spec);
        if !sort_keys.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, &sort_keys));
        }

        // 7. Group: stable-sort by group value so lanes are contiguous,
        //    and attach the synthetic `group` column
        if let Some(group_field) = &spec.directives.group_by {
            rows.sort_by(|a, b| {
                group_key(a, group_field).cmp(&group_key(b, group_field))
            });
            for row in &mut rows {
                let key = group_key(row, group_field);
                row.attach("group", Value::Str(key));
            }
        }

        // 8. Column projection
        let mut warnings = Vec::new();
        let requested: Vec<String> = if spec.directives.columns.is_empty() {
            default_columns.to_vec()
        } else {
            spec.directives.columns.clone()
        };
        let mut columns = Vec::new();
        if spec.directives.group_by.is_some() {
            columns.push("group".to_string());
        }
        for col in requested {
            if columns.contains(&col) {
                continue;
            }
            let known = self.schema.get(domain, &col).is_some()
                || rows.iter().any(|r| r.field(&col).is_some());
            if known {
                columns.push(col);
            } else {
                warnings.push(format!("unknown column '{col}' omitted"));
            }
        }

        // 9. Limit
        if let Some(limit) = spec.directives.limit {
            rows.truncate(limit);
        }

        let view = spec.directives.view.unwrap_or({
            if spec.directives.group_by.is_some() {
                ViewKind::Kanban
            } else {
                ViewKind::Table
            }
        });

        Ok(EvaluationResult {
            actual_row_count: rows.len(),
            estimated_row_count,
            strategy: Strategy::Scan,
            warnings,
            view,
            group_by: spec.directives.group_by.clone(),
            columns,
            rows,
        })
    }

    fn effective_sort(&self, spec: &QuerySpec) -> Vec<SortKey> {
        if !spec.directives.sort.is_empty() {
            return spec.directives.sort.clone();
        }
        if let Some(group) = &spec.directives.group_by {
            return vec![SortKey {
                field: group.clone(),
                dir: SortDir::Asc,
            }];
        }
        if spec.has_filter_on("due") {
            return vec![SortKey {
                field: "due".into(),
                dir: SortDir::Asc,
            }];
        }
        if spec.has_filter_on("priority") {
            return vec![SortKey {
                field: "priority".into(),
                dir: SortDir::Asc,
            }];
        }
        Vec::new()
    }

    fn clause_matches(&self, row: &Entity, field: &str, clause: &FilterClause) -> bool {
        let is_date_field = self
            .schema
            .get(row.domain(), field)
            .is_some_and(|s| matches!(s.kind, FieldKind::Date | FieldKind::SystemDate));

        match clause.op {
            FilterOp::Exists => row
                .field(field)
                .is_some_and(|v| !v.render().is_empty()),
            FilterOp::Contains => match row.field(field) {
                Some(Value::List(items)) => items
                    .iter()
                    .any(|i| i.eq_ignore_ascii_case(&clause.value)),
                Some(v) => v
                    .render()
                    .to_lowercase()
                    .contains(&clause.value.to_lowercase()),
                None => false,
            },
            FilterOp::Like => row.field(field).is_some_and(|v| {
                v.render()
                    .to_lowercase()
                    .contains(&clause.value.to_lowercase())
            }),
            FilterOp::Eq => row
                .field(field)
                .is_some_and(|v| v.render().eq_ignore_ascii_case(&clause.value)),
            FilterOp::Loose => {
                if is_date_field {
                    self.date_matches(row, field, FilterOp::Loose, &clause.value)
                } else {
                    row.field(field)
                        .is_some_and(|v| v.render().eq_ignore_ascii_case(&clause.value))
                }
            }
            FilterOp::Lt | FilterOp::Gt | FilterOp::Le | FilterOp::Ge => {
                if is_date_field {
                    self.date_matches(row, field, clause.op, &clause.value)
                } else {
                    let (Some(lhs), Some(rhs)) = (
                        row.field(field).and_then(|v| v.as_number()),
                        Value::Str(clause.value.clone()).as_number(),
                    ) else {
                        // Non-numeric comparison excludes the row
                        return false;
                    };
                    match clause.op {
                        FilterOp::Lt => lhs < rhs,
                        FilterOp::Gt => lhs > rhs,
                        FilterOp::Le => lhs <= rhs,
                        FilterOp::Ge => lhs >= rhs,
                        _ => unreachable!(),
                    }
                }
            }
        }
    }

    /// Date clause semantics, evaluated against "now" at evaluation time
    /// with date-only comparison. Unresolvable tokens fail closed: the
    /// clause rejects every row.
    fn date_matches(&self, row: &Entity, field: &str, op: FilterOp, value: &str) -> bool {
        let Some(Value::Date(d)) = row.field(field) else {
            return false;
        };
        if op == FilterOp::Loose {
            if value.eq_ignore_ascii_case("overdue") {
                return d < self.today;
            }
            let Ok(target) = dates::resolve_date(value, self.today) else {
                debug!(field, value, "unresolvable date token; clause matches nothing");
                return false;
            };
            // Horizon tokens mean "on or before"; day tokens mean equality.
            return if is_horizon_token(value) {
                d <= target
            } else {
                d == target
            };
        }
        let Ok(target) = dates::resolve_date(value, self.today) else {
            debug!(field, value, "unresolvable date token; clause matches nothing");
            return false;
        };
        match op {
            FilterOp::Lt => d < target,
            FilterOp::Gt => d > target,
            FilterOp::Le => d <= target,
            FilterOp::Ge => d >= target,
            _ => d == target,
        }
    }
}

/// Horizon tokens describe a window ending at the resolved date (`eow`,
/// `eom`, `+N`, `2w`); day tokens (`today`, ISO dates) name one day.
fn is_horizon_token(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    if lower == "eow" || lower == "eom" {
        return true;
    }
    if lower.starts_with(['+', '-']) {
        return true;
    }
    lower.len() >= 2
        && lower.ends_with(['d', 'w', 'm', 'y'])
        && lower[..lower.len() - 1].bytes().all(|b| b.is_ascii_digit())
}

/// Fixed searchable-field contract for free-text search.
fn searchable_text(row: &Entity) -> String {
    let mut parts = Vec::new();
    for field in ["text", "project", "description", "name"] {
        if let Some(v) = row.field(field) {
            parts.push(v.render().to_lowercase());
        }
    }
    parts.join(" ")
}

fn group_key(row: &Entity, field: &str) -> String {
    row.field(field).map(|v| v.render()).unwrap_or_default()
}

fn compare_rows(a: &Entity, b: &Entity, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ord = compare_values(a.field(&key.field), b.field(&key.field));
        let ord = match key.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    // Equal on all keys: stable sort preserves the pre-sort order
    Ordering::Equal
}

/// Type-aware value ordering: numbers numerically, dates chronologically,
/// everything else case-insensitively; absent values sort last ascending.
/// Shared with the grid's interactive column sort.
pub(crate) fn compare_values(a: Option<Value>, b: Option<Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            if let (Value::Date(x), Value::Date(y)) = (&a, &b) {
                return x.cmp(y);
            }
            if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
                return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            }
            a.render().to_lowercase().cmp(&b.render().to_lowercase())
        }
    }
}

/// Convenience wrapper: `today` derived from the local clock.
pub fn today_local() -> NaiveDate {
    chrono::Local::now().date_naive()
}
