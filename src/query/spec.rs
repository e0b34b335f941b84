use indexmap::IndexMap;

use crate::model::Domain;

/// Comparison operator in a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// `=` exact match.
    Eq,
    /// `:` loose match: case-insensitive equality, with date-keyword
    /// resolution on date fields.
    Loose,
    /// `~` case-insensitive substring.
    Like,
    Lt,
    Gt,
    Le,
    Ge,
    /// Bare field name: the field must be present and non-empty.
    Exists,
    /// List membership (tags).
    Contains,
}

impl FilterOp {
    pub fn symbol(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Loose => ":",
            FilterOp::Like => "~",
            FilterOp::Lt => "<",
            FilterOp::Gt => ">",
            FilterOp::Le => "<=",
            FilterOp::Ge => ">=",
            FilterOp::Exists => "exists",
            FilterOp::Contains => "contains",
        }
    }
}

/// A single `(operator, value)` constraint on one field. Multiple clauses
/// on the same field AND-combine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub dir: SortDir,
}

/// Requested layout for the interactive renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Table,
    Kanban,
}

/// Presentation directives: they shape the output, never the row set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    pub columns: Vec<String>,
    pub sort: Vec<SortKey>,
    pub limit: Option<usize>,
    pub group_by: Option<String>,
    pub metrics: Vec<String>,
    pub relations: Vec<String>,
    pub view: Option<ViewKind>,
}

/// Recoverable parse problems, accumulated per query. A spec carrying any
/// of these is never evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown domain '{0}' (expected task, project, or timelog)")]
    UnknownDomain(String),
    #[error("empty query")]
    EmptyQuery,
    #[error("unknown field '{field}' for {domain}")]
    UnknownField { domain: Domain, field: String },
    #[error("bad {directive} directive: {message}")]
    BadDirective {
        directive: &'static str,
        message: String,
    },
}

/// Structured form of a parsed query. Created fresh per invocation and
/// treated as immutable once evaluation begins.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub domain: Domain,
    /// Field name → AND-combined clauses, in first-seen order.
    pub filters: IndexMap<String, Vec<FilterClause>>,
    pub directives: Directives,
    pub free_text: Vec<String>,
    /// Accumulated recoverable errors; non-empty means do not evaluate.
    pub errors: Vec<ParseError>,
}

impl QuerySpec {
    pub fn new(domain: Domain) -> Self {
        QuerySpec {
            domain,
            filters: IndexMap::new(),
            directives: Directives::default(),
            free_text: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_filter(&mut self, field: &str, op: FilterOp, value: impl Into<String>) {
        self.filters
            .entry(field.to_string())
            .or_default()
            .push(FilterClause {
                op,
                value: value.into(),
            });
    }

    /// Whether any clause constrains the given field.
    pub fn has_filter_on(&self, field: &str) -> bool {
        self.filters.get(field).is_some_and(|c| !c.is_empty())
    }
}
